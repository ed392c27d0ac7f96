//! LLVM-style text format for kiln IR.
//!
//! Output format:
//! ```text
//! define spir_func i32 @add(i32 %a, i32 %b) nounwind {
//! entry:
//!   %0 = add i32 %a, %b
//!   ret i32 %0
//! }
//! ```
//!
//! Unnamed values are numbered `%N` in layout order; unnamed blocks are
//! labelled `bbN` by position.

use std::collections::HashMap;
use std::fmt::{self, Write as _};

use crate::constant::ConstKind;
use crate::function::{CallConv, FnAttr, Function, ParamAttr};
use crate::global::Linkage;
use crate::instruction::{BinaryOp, CastOp, FCmpOp, ICmpOp, Instruction, MemFlags, Op};
use crate::metadata::{CompositeTag, DiNode, DwarfEncoding, MdNode, MdOperand, QualifierTag};
use crate::module::Module;
use crate::types::{FloatType, StructType, Type, TypeTable};
use crate::value::{BlockRef, ConstRef, FuncRef, MdRef, TypeRef, ValueRef};

/// Render a type.
pub fn type_to_string(types: &TypeTable, ty: TypeRef) -> String {
    let mut s = String::new();
    write_type(&mut s, types, ty);
    s
}

fn write_type(out: &mut String, types: &TypeTable, ty: TypeRef) {
    match types.get(ty) {
        Type::Void => out.push_str("void"),
        Type::Int(bits) => {
            let _ = write!(out, "i{bits}");
        }
        Type::Float(ft) => out.push_str(match ft {
            FloatType::F16 => "half",
            FloatType::F32 => "float",
            FloatType::F64 => "double",
        }),
        Type::Ptr {
            pointee,
            addr_space,
        } => {
            write_type(out, types, *pointee);
            if *addr_space != 0 {
                let _ = write!(out, " addrspace({addr_space})");
            }
            out.push('*');
        }
        Type::Vector { elem, len } => {
            let _ = write!(out, "<{len} x ");
            write_type(out, types, *elem);
            out.push('>');
        }
        Type::Array { elem, len } => {
            let _ = write!(out, "[{len} x ");
            write_type(out, types, *elem);
            out.push(']');
        }
        Type::Struct(StructType {
            name: Some(name), ..
        }) => {
            let _ = write!(out, "%{name}");
        }
        Type::Struct(s) => write_struct_body(out, types, s),
        Type::Function {
            ret,
            params,
            vararg,
        } => {
            write_type(out, types, *ret);
            out.push_str(" (");
            for (i, p) in params.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                write_type(out, types, *p);
            }
            if *vararg {
                out.push_str(if params.is_empty() { "..." } else { ", ..." });
            }
            out.push(')');
        }
    }
}

fn write_struct_body(out: &mut String, types: &TypeTable, s: &StructType) {
    let Some(fields) = &s.body else {
        out.push_str("opaque");
        return;
    };
    let (open, close) = if s.packed { ("<{", "}>") } else { ("{", "}") };
    if fields.is_empty() {
        let _ = write!(out, "{open}{close}");
        return;
    }
    out.push_str(open);
    out.push(' ');
    for (i, f) in fields.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        write_type(out, types, *f);
    }
    out.push(' ');
    out.push_str(close);
}

fn fmt_binary_op(op: BinaryOp) -> &'static str {
    match op {
        BinaryOp::Add => "add",
        BinaryOp::Sub => "sub",
        BinaryOp::Mul => "mul",
        BinaryOp::UDiv => "udiv",
        BinaryOp::SDiv => "sdiv",
        BinaryOp::URem => "urem",
        BinaryOp::SRem => "srem",
        BinaryOp::Shl => "shl",
        BinaryOp::LShr => "lshr",
        BinaryOp::AShr => "ashr",
        BinaryOp::And => "and",
        BinaryOp::Or => "or",
        BinaryOp::Xor => "xor",
        BinaryOp::FAdd => "fadd",
        BinaryOp::FSub => "fsub",
        BinaryOp::FMul => "fmul",
        BinaryOp::FDiv => "fdiv",
        BinaryOp::FRem => "frem",
    }
}

fn fmt_icmp_op(op: ICmpOp) -> &'static str {
    match op {
        ICmpOp::Eq => "eq",
        ICmpOp::Ne => "ne",
        ICmpOp::Ugt => "ugt",
        ICmpOp::Uge => "uge",
        ICmpOp::Ult => "ult",
        ICmpOp::Ule => "ule",
        ICmpOp::Sgt => "sgt",
        ICmpOp::Sge => "sge",
        ICmpOp::Slt => "slt",
        ICmpOp::Sle => "sle",
    }
}

fn fmt_fcmp_op(op: FCmpOp) -> &'static str {
    match op {
        FCmpOp::False => "false",
        FCmpOp::Oeq => "oeq",
        FCmpOp::Ogt => "ogt",
        FCmpOp::Oge => "oge",
        FCmpOp::Olt => "olt",
        FCmpOp::Ole => "ole",
        FCmpOp::One => "one",
        FCmpOp::Ord => "ord",
        FCmpOp::Ueq => "ueq",
        FCmpOp::Ugt => "ugt",
        FCmpOp::Uge => "uge",
        FCmpOp::Ult => "ult",
        FCmpOp::Ule => "ule",
        FCmpOp::Une => "une",
        FCmpOp::Uno => "uno",
        FCmpOp::True => "true",
    }
}

pub(crate) fn fmt_cast_op(op: CastOp) -> &'static str {
    match op {
        CastOp::Trunc => "trunc",
        CastOp::ZExt => "zext",
        CastOp::SExt => "sext",
        CastOp::FpTrunc => "fptrunc",
        CastOp::FpExt => "fpext",
        CastOp::FpToUi => "fptoui",
        CastOp::FpToSi => "fptosi",
        CastOp::UiToFp => "uitofp",
        CastOp::SiToFp => "sitofp",
        CastOp::PtrToInt => "ptrtoint",
        CastOp::IntToPtr => "inttoptr",
        CastOp::Bitcast => "bitcast",
        CastOp::AddrSpaceCast => "addrspacecast",
    }
}

fn fmt_linkage(linkage: Linkage) -> &'static str {
    match linkage {
        Linkage::External => "",
        Linkage::Internal => "internal ",
        Linkage::Private => "private ",
        Linkage::AvailableExternally => "available_externally ",
        Linkage::Common => "common ",
    }
}

fn fmt_call_conv(cc: CallConv) -> &'static str {
    match cc {
        CallConv::SpirKernel => "spir_kernel",
        CallConv::SpirFunc => "spir_func",
    }
}

fn fmt_fn_attr(attr: FnAttr) -> &'static str {
    match attr {
        FnAttr::NoUnwind => "nounwind",
        FnAttr::ReadNone => "readnone",
        FnAttr::ReadOnly => "readonly",
        FnAttr::AlwaysInline => "alwaysinline",
        FnAttr::NoInline => "noinline",
        FnAttr::Convergent => "convergent",
        FnAttr::ReferencedIndirectly => "\"referenced-indirectly\"",
    }
}

fn fmt_param_attr(attr: ParamAttr) -> &'static str {
    match attr {
        ParamAttr::ZExt => "zeroext",
        ParamAttr::SExt => "signext",
        ParamAttr::ByVal => "byval",
        ParamAttr::StructRet => "sret",
        ParamAttr::NoAlias => "noalias",
        ParamAttr::NoCapture => "nocapture",
        ParamAttr::ReadOnly => "readonly",
        ParamAttr::ReadNone => "readnone",
    }
}

fn escape_string(s: &[u8]) -> String {
    let mut out = String::new();
    for &b in s {
        if b == b'"' || b == b'\\' || !(0x20..0x7f).contains(&b) {
            let _ = write!(out, "\\{b:02X}");
        } else {
            out.push(b as char);
        }
    }
    out
}

fn fmt_float(ty: Option<FloatType>, bits: u64) -> String {
    match ty {
        Some(FloatType::F16) => format!("0xH{:04X}", bits & 0xffff),
        Some(FloatType::F32) => fmt_f64(f64::from(f32::from_bits(bits as u32))),
        _ => fmt_f64(f64::from_bits(bits)),
    }
}

fn fmt_f64(v: f64) -> String {
    if v.is_finite() && v.fract() == 0.0 && v.abs() < 1e15 {
        format!("{v:.1}")
    } else {
        format!("0x{:016X}", v.to_bits())
    }
}

/// Render a constant without its type.
pub fn const_to_string(module: &Module, c: ConstRef) -> String {
    let constant = module.constant(c);
    let types = &module.types;
    match &constant.kind {
        ConstKind::Int(v) => {
            if types.int_width(constant.ty) == Some(1) {
                if v.sign() == num_bigint::Sign::NoSign {
                    "false".to_string()
                } else {
                    "true".to_string()
                }
            } else {
                v.to_string()
            }
        }
        ConstKind::Float(bits) => fmt_float(types.float_type(constant.ty), *bits),
        ConstKind::Null => match types.get(constant.ty) {
            Type::Ptr { .. } => "null".to_string(),
            Type::Int(1) => "false".to_string(),
            Type::Int(_) => "0".to_string(),
            Type::Float(_) => fmt_float(types.float_type(constant.ty), 0),
            _ => "zeroinitializer".to_string(),
        },
        ConstKind::Undef => "undef".to_string(),
        ConstKind::Aggregate(elems) => {
            let body = elems
                .iter()
                .map(|e| typed_const(module, *e))
                .collect::<Vec<_>>()
                .join(", ");
            match types.get(constant.ty) {
                Type::Vector { .. } => format!("<{body}>"),
                Type::Array { .. } => format!("[{body}]"),
                _ => format!("{{ {body} }}"),
            }
        }
        ConstKind::Bytes(bytes) => format!("c\"{}\"", escape_string(bytes)),
        ConstKind::GlobalAddr(g) => format!("@{}", module.global(*g).name),
        ConstKind::FuncAddr(f) => format!("@{}", module.function(*f).name),
        ConstKind::Cast(op, inner) => format!(
            "{} ({} to {})",
            fmt_cast_op(*op),
            typed_const(module, *inner),
            type_to_string(types, constant.ty)
        ),
    }
}

fn typed_const(module: &Module, c: ConstRef) -> String {
    format!(
        "{} {}",
        type_to_string(&module.types, module.constant(c).ty),
        const_to_string(module, c)
    )
}

/// Display context that tracks value numbering within one function.
struct DisplayCtx<'a> {
    module: &'a Module,
    func: FuncRef,
    value_names: HashMap<ValueRef, String>,
    block_names: Vec<String>,
}

impl<'a> DisplayCtx<'a> {
    fn new(module: &'a Module, func: FuncRef) -> Self {
        let f = module.function(func);
        let mut ctx = Self {
            module,
            func,
            value_names: HashMap::new(),
            block_names: Vec::new(),
        };
        let mut taken: HashMap<String, u32> = HashMap::new();
        let mut next = 0u32;
        let mut assign = |name: Option<&str>, taken: &mut HashMap<String, u32>| -> String {
            match name {
                Some(n) => {
                    let count = taken.entry(n.to_string()).or_insert(0);
                    *count += 1;
                    if *count == 1 {
                        n.to_string()
                    } else {
                        format!("{n}{}", *count - 1)
                    }
                }
                None => {
                    let s = next.to_string();
                    next += 1;
                    s
                }
            }
        };
        for (i, p) in f.params.iter().enumerate() {
            let name = assign(p.name.as_deref(), &mut taken);
            ctx.value_names.insert(ValueRef::Arg(i as u32), name);
        }
        for (bi, bb) in f.blocks.iter().enumerate() {
            let label = match &bb.name {
                Some(n) => assign(Some(n.as_str()), &mut taken),
                None => format!("bb{bi}"),
            };
            ctx.block_names.push(label);
            for &inst in &bb.insts {
                let i = f.inst(inst);
                if module.types.is_void(i.ty) {
                    continue;
                }
                let name = assign(i.name.as_deref(), &mut taken);
                ctx.value_names.insert(ValueRef::Inst(inst), name);
            }
        }
        ctx
    }

    /// Format a value reference without its type.
    fn fmt_val(&self, v: ValueRef) -> String {
        match v {
            ValueRef::Inst(_) | ValueRef::Arg(_) => match self.value_names.get(&v) {
                Some(n) => format!("%{n}"),
                None => "%<badref>".to_string(),
            },
            ValueRef::Const(c) => const_to_string(self.module, c),
            ValueRef::Global(g) => format!("@{}", self.module.global(g).name),
            ValueRef::Func(f) => format!("@{}", self.module.function(f).name),
        }
    }

    fn fmt_ty(&self, ty: TypeRef) -> String {
        type_to_string(&self.module.types, ty)
    }

    /// Format `<type> <value>`.
    fn fmt_typed(&self, v: ValueRef) -> String {
        let ty = self.module.value_type(self.func, v);
        format!("{} {}", self.fmt_ty(ty), self.fmt_val(v))
    }

    fn fmt_typed_list(&self, vs: &[ValueRef]) -> String {
        vs.iter()
            .map(|v| self.fmt_typed(*v))
            .collect::<Vec<_>>()
            .join(", ")
    }

    fn fmt_block(&self, b: BlockRef) -> String {
        format!("%{}", self.block_names[b.index() as usize])
    }
}

fn fmt_mem_suffix(flags: &MemFlags) -> String {
    let mut s = String::new();
    if let Some(a) = flags.align {
        let _ = write!(s, ", align {a}");
    }
    if flags.nontemporal {
        s.push_str(", !nontemporal");
    }
    s
}

/// Format a single instruction. Returns the formatted string (without leading indent).
fn fmt_inst(ctx: &DisplayCtx<'_>, r: ValueRef, inst: &Instruction) -> String {
    let types = &ctx.module.types;
    let result = if types.is_void(inst.ty) {
        String::new()
    } else {
        format!("{} = ", ctx.fmt_val(r))
    };
    let body = match &inst.op {
        Op::Binary {
            op,
            lhs,
            rhs,
            flags,
        } => {
            let mut name = fmt_binary_op(*op).to_string();
            if flags.nuw {
                name.push_str(" nuw");
            }
            if flags.nsw {
                name.push_str(" nsw");
            }
            format!("{name} {}, {}", ctx.fmt_typed(*lhs), ctx.fmt_val(*rhs))
        }
        Op::FNeg(v) => format!("fneg {}", ctx.fmt_typed(*v)),
        Op::ICmp(op, a, b) => format!(
            "icmp {} {}, {}",
            fmt_icmp_op(*op),
            ctx.fmt_typed(*a),
            ctx.fmt_val(*b)
        ),
        Op::FCmp(op, a, b) => format!(
            "fcmp {} {}, {}",
            fmt_fcmp_op(*op),
            ctx.fmt_typed(*a),
            ctx.fmt_val(*b)
        ),
        Op::Select {
            cond,
            on_true,
            on_false,
        } => format!(
            "select {}, {}, {}",
            ctx.fmt_typed(*cond),
            ctx.fmt_typed(*on_true),
            ctx.fmt_typed(*on_false)
        ),
        Op::Cast(op, v) => format!(
            "{} {} to {}",
            fmt_cast_op(*op),
            ctx.fmt_typed(*v),
            ctx.fmt_ty(inst.ty)
        ),
        Op::Alloca { ty, align } => match align {
            Some(a) => format!("alloca {}, align {a}", ctx.fmt_ty(*ty)),
            None => format!("alloca {}", ctx.fmt_ty(*ty)),
        },
        Op::Load { ptr, flags } => format!(
            "load {}{}, {}{}",
            if flags.volatile { "volatile " } else { "" },
            ctx.fmt_ty(inst.ty),
            ctx.fmt_typed(*ptr),
            fmt_mem_suffix(flags)
        ),
        Op::Store { value, ptr, flags } => format!(
            "store {}{}, {}{}",
            if flags.volatile { "volatile " } else { "" },
            ctx.fmt_typed(*value),
            ctx.fmt_typed(*ptr),
            fmt_mem_suffix(flags)
        ),
        Op::MemCpy {
            dst,
            src,
            size,
            align,
            volatile,
        } => format!(
            "memcpy {}, {}, {}{}{}",
            ctx.fmt_typed(*dst),
            ctx.fmt_typed(*src),
            ctx.fmt_typed(*size),
            align.map(|a| format!(", align {a}")).unwrap_or_default(),
            if *volatile { ", volatile" } else { "" }
        ),
        Op::MemSet {
            dst,
            byte,
            size,
            align,
            volatile,
        } => format!(
            "memset {}, {}, {}{}{}",
            ctx.fmt_typed(*dst),
            ctx.fmt_typed(*byte),
            ctx.fmt_typed(*size),
            align.map(|a| format!(", align {a}")).unwrap_or_default(),
            if *volatile { ", volatile" } else { "" }
        ),
        Op::Gep {
            source_ty,
            base,
            indices,
            inbounds,
        } => format!(
            "getelementptr {}{}, {}, {}",
            if *inbounds { "inbounds " } else { "" },
            ctx.fmt_ty(*source_ty),
            ctx.fmt_typed(*base),
            ctx.fmt_typed_list(indices)
        ),
        Op::LifetimeStart { size, ptr } => {
            format!("lifetime.start i64 {size}, {}", ctx.fmt_typed(*ptr))
        }
        Op::LifetimeEnd { size, ptr } => {
            format!("lifetime.end i64 {size}, {}", ctx.fmt_typed(*ptr))
        }
        Op::ExtractElement { vector, index } => format!(
            "extractelement {}, {}",
            ctx.fmt_typed(*vector),
            ctx.fmt_typed(*index)
        ),
        Op::InsertElement {
            vector,
            element,
            index,
        } => format!(
            "insertelement {}, {}, {}",
            ctx.fmt_typed(*vector),
            ctx.fmt_typed(*element),
            ctx.fmt_typed(*index)
        ),
        Op::ShuffleVector { lhs, rhs, mask } => {
            let lanes = mask
                .iter()
                .map(|m| match m {
                    Some(i) => format!("i32 {i}"),
                    None => "i32 undef".to_string(),
                })
                .collect::<Vec<_>>()
                .join(", ");
            format!(
                "shufflevector {}, {}, <{} x i32> <{lanes}>",
                ctx.fmt_typed(*lhs),
                ctx.fmt_typed(*rhs),
                mask.len()
            )
        }
        Op::ExtractValue { aggregate, indices } => format!(
            "extractvalue {}, {}",
            ctx.fmt_typed(*aggregate),
            join_indices(indices)
        ),
        Op::InsertValue {
            aggregate,
            value,
            indices,
        } => format!(
            "insertvalue {}, {}, {}",
            ctx.fmt_typed(*aggregate),
            ctx.fmt_typed(*value),
            join_indices(indices)
        ),
        Op::Call {
            callee,
            args,
            call_conv,
            ..
        } => format!(
            "call {} {} {}({})",
            fmt_call_conv(*call_conv),
            ctx.fmt_ty(inst.ty),
            ctx.fmt_val(*callee),
            ctx.fmt_typed_list(args)
        ),
        Op::Phi(incoming) => {
            let edges = incoming
                .iter()
                .map(|(v, b)| format!("[ {}, {} ]", ctx.fmt_val(*v), ctx.fmt_block(*b)))
                .collect::<Vec<_>>()
                .join(", ");
            format!("phi {} {edges}", ctx.fmt_ty(inst.ty))
        }
        Op::DbgDeclare {
            address,
            variable,
            expr,
        } => format!(
            "call void @llvm.dbg.declare({}, !{}, !{})",
            ctx.fmt_typed(*address),
            variable.index(),
            expr.index()
        ),
        Op::DbgValue {
            value,
            variable,
            expr,
        } => format!(
            "call void @llvm.dbg.value({}, !{}, !{})",
            ctx.fmt_typed(*value),
            variable.index(),
            expr.index()
        ),
        Op::Br(target) => format!("br label {}", ctx.fmt_block(*target)),
        Op::CondBr {
            cond,
            then_bb,
            else_bb,
        } => format!(
            "br {}, label {}, label {}",
            ctx.fmt_typed(*cond),
            ctx.fmt_block(*then_bb),
            ctx.fmt_block(*else_bb)
        ),
        Op::Switch {
            value,
            default,
            cases,
        } => {
            let ty = ctx.fmt_ty(ctx.module.value_type(ctx.func, *value));
            let arms = cases
                .iter()
                .map(|(c, b)| format!("{ty} {c}, label {}", ctx.fmt_block(*b)))
                .collect::<Vec<_>>()
                .join(" ");
            format!(
                "switch {}, label {} [{}{}{}]",
                ctx.fmt_typed(*value),
                ctx.fmt_block(*default),
                if arms.is_empty() { "" } else { " " },
                arms,
                if arms.is_empty() { "" } else { " " }
            )
        }
        Op::Ret(Some(v)) => format!("ret {}", ctx.fmt_typed(*v)),
        Op::Ret(None) => "ret void".to_string(),
        Op::Unreachable => "unreachable".to_string(),
    };
    let mut line = format!("{result}{body}");
    if let Some(loc) = inst.debug_loc {
        let _ = write!(line, ", !dbg !{}", loc.index());
    }
    for (kind, md) in &inst.metadata {
        let _ = write!(line, ", !{kind} !{}", md.index());
    }
    line
}

fn join_indices(indices: &[u32]) -> String {
    indices
        .iter()
        .map(|i| i.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

fn fmt_function_header(ctx: &DisplayCtx<'_>, f: &Function) -> String {
    let params = f
        .params
        .iter()
        .enumerate()
        .map(|(i, p)| {
            let mut s = ctx.fmt_ty(p.ty);
            for a in &p.attrs {
                s.push(' ');
                s.push_str(fmt_param_attr(*a));
            }
            if !f.is_declaration() {
                s.push(' ');
                s.push_str(&ctx.fmt_val(ValueRef::Arg(i as u32)));
            }
            s
        })
        .collect::<Vec<_>>();
    let mut params = params.join(", ");
    if ctx.module.types.signature(f.ty).is_some_and(|(_, _, va)| va) {
        params.push_str(if f.params.is_empty() { "..." } else { ", ..." });
    }
    let mut header = format!(
        "{} {}{} {} @{}({params})",
        if f.is_declaration() { "declare" } else { "define" },
        fmt_linkage(f.linkage),
        fmt_call_conv(f.call_conv),
        ctx.fmt_ty(f.ret_ty),
        f.name
    );
    for a in &f.attrs {
        header.push(' ');
        header.push_str(fmt_fn_attr(*a));
    }
    if let Some(sp) = f.subprogram {
        let _ = write!(header, " !dbg !{}", sp.index());
    }
    header
}

fn fmt_md_operand(module: &Module, op: &MdOperand) -> String {
    match op {
        MdOperand::Null => "null".to_string(),
        MdOperand::Node(n) => format!("!{}", n.index()),
        MdOperand::String(s) => format!("!\"{}\"", escape_string(s.as_bytes())),
        MdOperand::Const(c) => typed_const(module, *c),
        MdOperand::Func(f) => {
            let func = module.function(*f);
            format!("{} @{}", type_to_string(&module.types, func.ptr_ty), func.name)
        }
        MdOperand::Global(g) => {
            let gv = module.global(*g);
            format!("{} @{}", type_to_string(&module.types, gv.ptr_ty), gv.name)
        }
    }
}

fn opt_ref(r: &Option<MdRef>) -> String {
    match r {
        Some(r) => format!("!{}", r.index()),
        None => "null".to_string(),
    }
}

fn ref_list(rs: &[MdRef]) -> String {
    let items = rs
        .iter()
        .map(|r| format!("!{}", r.index()))
        .collect::<Vec<_>>()
        .join(", ");
    format!("!{{{items}}}")
}

fn fmt_di(module: &Module, node: &DiNode) -> String {
    match node {
        DiNode::File {
            filename,
            directory,
        } => format!("!DIFile(filename: {filename:?}, directory: {directory:?})"),
        DiNode::CompileUnit {
            language,
            file,
            producer,
            optimized,
        } => format!(
            "distinct !DICompileUnit(language: {language}, file: !{}, producer: {producer:?}, isOptimized: {optimized})",
            file.index()
        ),
        DiNode::BasicType {
            name,
            size_bits,
            encoding,
        } => {
            let enc = match encoding {
                DwarfEncoding::Address => "DW_ATE_address",
                DwarfEncoding::Boolean => "DW_ATE_boolean",
                DwarfEncoding::Float => "DW_ATE_float",
                DwarfEncoding::Signed => "DW_ATE_signed",
                DwarfEncoding::SignedChar => "DW_ATE_signed_char",
                DwarfEncoding::Unsigned => "DW_ATE_unsigned",
                DwarfEncoding::UnsignedChar => "DW_ATE_unsigned_char",
                DwarfEncoding::Unspecified => "DW_ATE_unspecified",
            };
            format!("!DIBasicType(name: {name:?}, size: {size_bits}, encoding: {enc})")
        }
        DiNode::PointerType {
            base,
            size_bits,
            addr_space,
        } => format!(
            "!DIDerivedType(tag: DW_TAG_pointer_type, baseType: {}, size: {size_bits}{})",
            opt_ref(base),
            addr_space
                .map(|a| format!(", dwarfAddressSpace: {a}"))
                .unwrap_or_default()
        ),
        DiNode::QualifiedType { tag, base } => {
            let tag = match tag {
                QualifierTag::Const => "DW_TAG_const_type",
                QualifierTag::Volatile => "DW_TAG_volatile_type",
                QualifierTag::Restrict => "DW_TAG_restrict_type",
                QualifierTag::Atomic => "DW_TAG_atomic_type",
            };
            format!("!DIDerivedType(tag: {tag}, baseType: {})", opt_ref(base))
        }
        DiNode::ArrayType {
            base,
            size_bits,
            counts,
        } => format!(
            "!DICompositeType(tag: DW_TAG_array_type, baseType: {}, size: {size_bits}, elements: {counts:?})",
            opt_ref(base)
        ),
        DiNode::VectorType {
            base,
            size_bits,
            count,
        } => format!(
            "!DICompositeType(tag: DW_TAG_array_type, baseType: {}, size: {size_bits}, flags: DIFlagVector, elements: [{count}])",
            opt_ref(base)
        ),
        DiNode::Typedef {
            name,
            base,
            file,
            line,
            scope,
        } => format!(
            "!DIDerivedType(tag: DW_TAG_typedef, name: {name:?}, scope: {}, file: {}, line: {line}, baseType: {})",
            opt_ref(scope),
            opt_ref(file),
            opt_ref(base)
        ),
        DiNode::Enumerator { name, value } => {
            format!("!DIEnumerator(name: {name:?}, value: {value})")
        }
        DiNode::EnumType {
            name,
            base,
            file,
            line,
            scope,
            size_bits,
            elements,
            flags,
        } => format!(
            "!DICompositeType(tag: DW_TAG_enumeration_type, name: {name:?}, scope: {}, file: {}, line: {line}, baseType: {}, size: {size_bits}, flags: {}, elements: {})",
            opt_ref(scope),
            opt_ref(file),
            opt_ref(base),
            flags.0,
            ref_list(elements)
        ),
        DiNode::CompositeType {
            tag,
            name,
            file,
            line,
            scope,
            size_bits,
            flags,
            identifier,
            elements,
        } => {
            let tag = match tag {
                CompositeTag::Class => "DW_TAG_class_type",
                CompositeTag::Structure => "DW_TAG_structure_type",
                CompositeTag::Union => "DW_TAG_union_type",
            };
            format!(
                "distinct !DICompositeType(tag: {tag}, name: {name:?}, scope: {}, file: {}, line: {line}, size: {size_bits}, flags: {}, elements: {}, identifier: {identifier:?})",
                opt_ref(scope),
                opt_ref(file),
                flags.0,
                ref_list(elements)
            )
        }
        DiNode::Member {
            name,
            file,
            line,
            scope,
            base,
            size_bits,
            offset_bits,
            flags,
        } => format!(
            "!DIDerivedType(tag: DW_TAG_member, name: {name:?}, scope: {}, file: {}, line: {line}, baseType: {}, size: {size_bits}, offset: {offset_bits}, flags: {})",
            opt_ref(scope),
            opt_ref(file),
            opt_ref(base),
            flags.0
        ),
        DiNode::Inheritance {
            derived,
            base,
            offset_bits,
            flags,
        } => format!(
            "!DIDerivedType(tag: DW_TAG_inheritance, scope: {}, baseType: {}, offset: {offset_bits}, flags: {})",
            opt_ref(derived),
            opt_ref(base),
            flags.0
        ),
        DiNode::PtrToMember {
            pointee,
            class,
            size_bits,
        } => format!(
            "!DIDerivedType(tag: DW_TAG_ptr_to_member_type, baseType: {}, extraData: {}, size: {size_bits})",
            opt_ref(pointee),
            opt_ref(class)
        ),
        DiNode::SubroutineType { types, flags } => {
            let items = types.iter().map(opt_ref).collect::<Vec<_>>().join(", ");
            format!("!DISubroutineType(flags: {}, types: !{{{items}}})", flags.0)
        }
        DiNode::TemplateTypeParameter { name, ty } => {
            format!("!DITemplateTypeParameter(name: {name:?}, type: {})", opt_ref(ty))
        }
        DiNode::TemplateValueParameter { name, ty, value } => format!(
            "!DITemplateValueParameter(name: {name:?}, type: {}, value: {})",
            opt_ref(ty),
            value
                .map(|c| typed_const(module, c))
                .unwrap_or_else(|| "null".to_string())
        ),
        DiNode::TemplateTemplateParameter { name, template } => format!(
            "!DITemplateValueParameter(tag: DW_TAG_GNU_template_template_param, name: {name:?}, value: {template:?})"
        ),
        DiNode::TemplateParameterPack { name, elements } => format!(
            "!DITemplateValueParameter(tag: DW_TAG_GNU_template_parameter_pack, name: {name:?}, value: {})",
            ref_list(elements)
        ),
        DiNode::GlobalVariable {
            name,
            linkage_name,
            scope,
            file,
            line,
            ty,
            local,
            definition,
            static_member,
        } => format!(
            "distinct !DIGlobalVariable(name: {name:?}, linkageName: {linkage_name:?}, scope: {}, file: {}, line: {line}, type: {}, isLocal: {local}, isDefinition: {definition}, declaration: {})",
            opt_ref(scope),
            opt_ref(file),
            opt_ref(ty),
            opt_ref(static_member)
        ),
        DiNode::GlobalVariableExpression { var, expr } => format!(
            "!DIGlobalVariableExpression(var: !{}, expr: !{})",
            var.index(),
            expr.index()
        ),
        DiNode::Subprogram {
            name,
            linkage_name,
            scope,
            file,
            line,
            ty,
            scope_line,
            flags,
            local,
            definition,
            optimized,
            unit,
            declaration,
            template_params,
        } => format!(
            "distinct !DISubprogram(name: {name:?}, linkageName: {linkage_name:?}, scope: {}, file: {}, line: {line}, type: {}, isLocal: {local}, isDefinition: {definition}, scopeLine: {scope_line}, flags: {}, isOptimized: {optimized}, unit: {}, declaration: {}, templateParams: {})",
            opt_ref(scope),
            opt_ref(file),
            opt_ref(ty),
            flags.0,
            opt_ref(unit),
            opt_ref(declaration),
            ref_list(template_params)
        ),
        DiNode::LexicalBlock {
            scope,
            file,
            line,
            column,
        } => format!(
            "distinct !DILexicalBlock(scope: {}, file: {}, line: {line}, column: {column})",
            opt_ref(scope),
            opt_ref(file)
        ),
        DiNode::LexicalBlockFile {
            scope,
            file,
            discriminator,
        } => format!(
            "!DILexicalBlockFile(scope: {}, file: {}, discriminator: {discriminator})",
            opt_ref(scope),
            opt_ref(file)
        ),
        DiNode::Namespace {
            scope,
            name,
            export_symbols,
        } => format!(
            "!DINamespace(name: {name:?}, scope: {}, exportSymbols: {export_symbols})",
            opt_ref(scope)
        ),
        DiNode::Location {
            line,
            column,
            scope,
            inlined_at,
        } => format!(
            "!DILocation(line: {line}, column: {column}, scope: !{}{})",
            scope.index(),
            inlined_at
                .map(|i| format!(", inlinedAt: !{}", i.index()))
                .unwrap_or_default()
        ),
        DiNode::LocalVariable {
            name,
            scope,
            file,
            line,
            ty,
            arg,
            flags,
        } => format!(
            "!DILocalVariable(name: {name:?}, {}scope: {}, file: {}, line: {line}, type: {}, flags: {})",
            if *arg > 0 { format!("arg: {arg}, ") } else { String::new() },
            opt_ref(scope),
            opt_ref(file),
            opt_ref(ty),
            flags.0
        ),
        DiNode::Expression(ops) => format!(
            "!DIExpression({})",
            ops.iter()
                .map(|o| o.to_string())
                .collect::<Vec<_>>()
                .join(", ")
        ),
    }
}

/// Displays one function.
pub struct FunctionDisplay<'a> {
    module: &'a Module,
    func: FuncRef,
}

impl Module {
    /// Text form of a single function.
    pub fn display_function(&self, func: FuncRef) -> FunctionDisplay<'_> {
        FunctionDisplay { module: self, func }
    }
}

impl fmt::Display for FunctionDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let func = self.module.function(self.func);
        let ctx = DisplayCtx::new(self.module, self.func);
        write!(f, "{}", fmt_function_header(&ctx, func))?;
        if func.is_declaration() {
            return writeln!(f);
        }
        writeln!(f, " {{")?;
        for (bi, bb) in func.blocks.iter().enumerate() {
            if bi > 0 {
                writeln!(f)?;
            }
            writeln!(f, "{}:", ctx.block_names[bi])?;
            for &inst in &bb.insts {
                let line = fmt_inst(&ctx, ValueRef::Inst(inst), func.inst(inst));
                writeln!(f, "  {line}")?;
            }
        }
        writeln!(f, "}}")
    }
}

impl fmt::Display for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "; ModuleID = '{}'", self.name)?;
        if let Some(triple) = &self.triple {
            writeln!(f, "target triple = \"{triple}\"")?;
        }

        let named: Vec<_> = self
            .types
            .iter()
            .filter_map(|(r, t)| match t {
                Type::Struct(s) => s.name.as_ref().map(|n| (r, n, s)),
                _ => None,
            })
            .collect();
        if !named.is_empty() {
            writeln!(f)?;
        }
        for (_, name, s) in named {
            let mut body = String::new();
            write_struct_body(&mut body, &self.types, s);
            writeln!(f, "%{name} = type {body}")?;
        }

        let globals: Vec<_> = self.live_globals().collect();
        if !globals.is_empty() {
            writeln!(f)?;
        }
        for (_, g) in globals {
            let kind = if g.constant { "constant" } else { "global" };
            let space = if g.addr_space != 0 {
                format!("addrspace({}) ", g.addr_space)
            } else {
                String::new()
            };
            let ty = type_to_string(&self.types, g.value_ty);
            let mut line = match g.initializer {
                Some(init) => format!(
                    "@{} = {}{}{space}{kind} {ty} {}",
                    g.name,
                    fmt_linkage(g.linkage),
                    if g.unnamed_addr { "unnamed_addr " } else { "" },
                    const_to_string(self, init)
                ),
                None => format!(
                    "@{} = {}{}{space}{kind} {ty}",
                    g.name,
                    if g.linkage == Linkage::External {
                        "external "
                    } else {
                        fmt_linkage(g.linkage)
                    },
                    if g.unnamed_addr { "unnamed_addr " } else { "" },
                ),
            };
            if let Some(a) = g.align {
                let _ = write!(line, ", align {a}");
            }
            for d in &g.debug {
                let _ = write!(line, ", !dbg !{}", d.index());
            }
            writeln!(f, "{line}")?;
        }

        for func in self.func_refs() {
            writeln!(f)?;
            write!(f, "{}", self.display_function(func))?;
        }

        if !self.named_metadata.is_empty() || !self.module_flags.is_empty() {
            writeln!(f)?;
        }
        for (name, nodes) in &self.named_metadata {
            writeln!(f, "!{name} = {}", ref_list(nodes))?;
        }
        for flag in &self.module_flags {
            writeln!(
                f,
                "!llvm.module.flags = !{{i32 {}, !{:?}, i32 {}}}",
                flag.behavior as u32, flag.key, flag.value
            )?;
        }
        for (i, node) in self.metadata.iter().enumerate() {
            let body = match node {
                MdNode::Tuple(ops) => format!(
                    "!{{{}}}",
                    ops.iter()
                        .map(|o| fmt_md_operand(self, o))
                        .collect::<Vec<_>>()
                        .join(", ")
                ),
                MdNode::Di(di) => fmt_di(self, di),
            };
            writeln!(f, "!{i} = {body}")?;
        }
        Ok(())
    }
}
