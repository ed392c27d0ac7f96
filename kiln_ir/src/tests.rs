//! Tests for the kiln IR builder, display and verifier.

use crate::builder::Builder;
use crate::function::{FnAttr, Param};
use crate::global::Linkage;
use crate::instruction::{ICmpOp, MemFlags, Op};
use crate::metadata::{DiNode, MdNode, MdOperand};
use crate::module::Module;
use crate::types::FloatType;
use crate::value::{BlockRef, FuncRef, ValueRef};

fn add_i32_function(module: &mut Module, name: &str, nparams: usize) -> FuncRef {
    let i32_ty = module.types.int(32);
    let fn_ty = module.types.function(i32_ty, vec![i32_ty; nparams], false);
    module.add_function(name, fn_ty)
}

fn build_add(module: &mut Module) -> FuncRef {
    let f = add_i32_function(module, "add", 2);
    module.function_mut(f).params[0].name = Some("a".into());
    module.function_mut(f).params[1].name = Some("b".into());
    let mut b = Builder::new(module, f);
    let entry = b.create_block(Some("entry".into()));
    b.switch_to_block(entry);
    let sum = b.add(ValueRef::Arg(0), ValueRef::Arg(1));
    b.ret(Some(sum));
    f
}

#[test]
fn build_add_function() {
    let mut module = Module::new("m");
    let f = build_add(&mut module);
    let func = module.function(f);

    assert_eq!(func.instructions.len(), 2);
    assert_eq!(func.blocks.len(), 1);
    assert!(!func.is_declaration());
    let ops: Vec<_> = func.live_insts().map(|(_, i)| &i.op).collect();
    assert!(matches!(ops[0], Op::Binary { .. }));
    assert!(matches!(ops[1], Op::Ret(Some(_))));
    assert!(module.verify().is_ok());
}

#[test]
fn display_add_function() {
    let mut module = Module::new("m");
    let f = build_add(&mut module);
    module.function_mut(f).add_attr(FnAttr::NoUnwind);
    let text = module.display_function(f).to_string();
    assert_eq!(
        text,
        "define spir_func i32 @add(i32 %a, i32 %b) nounwind {\n\
         entry:\n  %0 = add i32 %a, %b\n  ret i32 %0\n}\n"
    );
}

#[test]
fn display_declaration_omits_param_names() {
    let mut module = Module::new("m");
    let f = add_i32_function(&mut module, "ext", 1);
    module.function_mut(f).params[0].name = Some("x".into());
    assert_eq!(
        module.display_function(f).to_string(),
        "declare spir_func i32 @ext(i32)\n"
    );
}

#[test]
fn function_names_are_unique() {
    let mut module = Module::new("m");
    let a = add_i32_function(&mut module, "f", 0);
    let b = add_i32_function(&mut module, "f", 0);
    assert_eq!(module.function(a).name, "f");
    assert_eq!(module.function(b).name, "f.1");
    assert_eq!(module.get_function("f.1"), Some(b));
}

#[test]
fn named_struct_suffixes() {
    let mut module = Module::new("m");
    let a = module.types.create_struct("S");
    let b = module.types.create_struct("S");
    assert_ne!(a, b);
    assert_eq!(module.types.struct_name(b), Some("S.1"));
    assert_eq!(module.types.named_struct("S"), a);
    assert!(module.types.is_opaque_struct(a));
}

#[test]
fn recursive_struct_through_pointer() {
    let mut module = Module::new("m");
    let node = module.types.create_struct("Node");
    let next = module.types.ptr(node, 1);
    let i32_ty = module.types.int(32);
    module.types.set_struct_body(node, vec![i32_ty, next], false);
    assert_eq!(module.types.struct_fields(node), &[i32_ty, next]);
    let text = module.to_string();
    assert!(text.contains("%Node = type { i32, %Node addrspace(1)* }"), "{text}");
}

#[test]
fn integer_constants_are_normalized() {
    let mut module = Module::new("m");
    let i8_ty = module.types.int(8);
    let a = module.const_int(i8_ty, 255);
    let b = module.const_int(i8_ty, -1);
    assert_eq!(a, b);
    assert_eq!(module.constant(a).as_i64(), Some(-1));
    assert_eq!(module.constant(a).as_u64(8), Some(255));

    let t = module.const_bool(true);
    assert_eq!(crate::display::const_to_string(&module, t), "true");
}

#[test]
fn float_constants_print_exactly() {
    let mut module = Module::new("m");
    let f32_ty = module.types.float(FloatType::F32);
    let half = module.types.float(FloatType::F16);
    let one = module.const_float(f32_ty, 1.0);
    let h = module.const_float(half, 1.0);
    assert_eq!(crate::display::const_to_string(&module, one), "1.0");
    assert_eq!(crate::display::const_to_string(&module, h), "0xH3C00");
}

#[test]
fn data_layout_sizes() {
    let mut module = Module::new("m");
    let layout = module.layout;
    let types = &mut module.types;
    let i8_ty = types.int(8);
    let i16_ty = types.int(16);
    let i32_ty = types.int(32);
    let f32_ty = types.float(FloatType::F32);
    let s = types.literal_struct(vec![i8_ty, i32_ty, i16_ty], false);
    let p = types.literal_struct(vec![i8_ty, i32_ty], true);
    let v3 = types.vector(f32_ty, 3);
    let arr = types.array(s, 4);

    assert_eq!(layout.field_offsets(types, s), vec![0, 4, 8]);
    assert_eq!(layout.size_of(types, s), 12);
    assert_eq!(layout.align_of(types, s), 4);
    assert_eq!(layout.size_of(types, p), 5);
    assert_eq!(layout.size_of(types, v3), 16);
    assert_eq!(layout.size_of(types, arr), 48);
}

#[test]
fn replace_uses_and_erase() {
    let mut module = Module::new("m");
    let i32_ty = module.types.int(32);
    let f = add_i32_function(&mut module, "f", 1);
    let g = module.add_global("placeholder.x", i32_ty, 0, Linkage::Private);

    let mut b = Builder::new(&mut module, f);
    let entry = b.create_block(None);
    b.switch_to_block(entry);
    let fake = b.load(i32_ty, ValueRef::Global(g), MemFlags::default(), None);
    let sum = b.add(fake, fake);
    b.ret(Some(sum));

    assert!(!module.verify().is_ok());

    let func = module.function_mut(f);
    let n = func.replace_all_uses(fake, ValueRef::Arg(0));
    assert_eq!(n, 2);
    if let Some(i) = fake.as_inst() {
        func.erase_inst(i);
        assert!(func.inst(i).is_erased());
    }
    module.erase_global(g);

    assert_eq!(module.function(f).uses(ValueRef::Arg(0)).len(), 1);
    assert!(module.get_global("placeholder.x").is_none());
    let result = module.verify();
    assert!(result.is_ok(), "{result}");
}

#[test]
fn diamond_predecessors_and_phi() {
    let mut module = Module::new("m");
    let f = add_i32_function(&mut module, "pick", 1);
    let mut b = Builder::new(&mut module, f);
    let entry = b.create_block(Some("entry".into()));
    let left = b.create_block(Some("left".into()));
    let right = b.create_block(Some("right".into()));
    let join = b.create_block(Some("join".into()));

    b.switch_to_block(entry);
    let zero = ValueRef::Const(b.module().const_i32(0));
    let cond = b.icmp(ICmpOp::Slt, ValueRef::Arg(0), zero, Some("neg"));
    b.cond_br(cond, left, right);
    b.switch_to_block(left);
    b.br(join);
    b.switch_to_block(right);
    b.br(join);
    b.switch_to_block(join);
    let one = ValueRef::Const(b.module().const_i32(1));
    let i32_ty = b.module().types.int(32);
    let phi = b.phi(i32_ty, vec![(one, left)], Some("r"));
    b.ret(Some(ValueRef::Inst(phi)));
    // Incoming added after the return was placed; the phi stays first.
    b.add_incoming(phi, ValueRef::Arg(0), right);

    let func = module.function(f);
    assert_eq!(func.predecessors(join), vec![left, right]);
    assert_eq!(func.successors(entry), vec![left, right]);
    assert_eq!(func.first_non_phi(join), 1);
    let result = module.verify();
    assert!(result.is_ok(), "{result}");

    let text = module.display_function(f).to_string();
    assert!(text.contains("%neg = icmp slt i32 %0, 0"), "{text}");
    assert!(text.contains("%r = phi i32 [ 1, %left ], [ %0, %right ]"), "{text}");
}

#[test]
fn entry_alloca_goes_before_other_code() {
    let mut module = Module::new("m");
    let f = add_i32_function(&mut module, "f", 0);
    let i32_ty = module.types.int(32);
    let mut b = Builder::new(&mut module, f);
    let entry = b.create_block(None);
    b.switch_to_block(entry);
    let one = ValueRef::Const(b.module().const_i32(1));
    let first = b.entry_alloca(i32_ty, Some(4), None);
    b.store(one, first, MemFlags::aligned(4));
    let second = b.entry_alloca(i32_ty, Some(4), None);
    let v = b.load(i32_ty, second, MemFlags::aligned(4), None);
    b.ret(Some(v));

    let func = module.function(f);
    let ops: Vec<_> = func.block_insts(BlockRef(0)).map(|(_, i)| &i.op).collect();
    assert!(matches!(ops[0], Op::Alloca { .. }));
    assert!(matches!(ops[1], Op::Alloca { .. }));
    assert!(matches!(ops[2], Op::Store { .. }));
    assert_eq!(func.entry_alloca_end(), 2);
}

#[test]
fn insert_param_renumbers_arguments() {
    let mut module = Module::new("m");
    let f = build_add(&mut module);
    let i32_ty = module.types.int(32);
    let func = module.function_mut(f);
    func.insert_param(
        0,
        Param {
            ty: i32_ty,
            name: Some("ret".into()),
            attrs: Vec::new(),
        },
    );
    let (_, add) = func.live_insts().next().unwrap_or_else(|| panic!("empty"));
    assert_eq!(
        add.op.operands(),
        vec![ValueRef::Arg(1), ValueRef::Arg(2)]
    );
}

#[test]
fn verifier_reports_missing_terminator() {
    let mut module = Module::new("m");
    let f = add_i32_function(&mut module, "broken", 2);
    let mut b = Builder::new(&mut module, f);
    let entry = b.create_block(None);
    b.switch_to_block(entry);
    b.add(ValueRef::Arg(0), ValueRef::Arg(1));

    let result = module.verify();
    assert_eq!(result.errors.len(), 1);
    assert!(result.errors[0]
        .message
        .starts_with("block does not end with a terminator"));
    assert!(result.to_string().contains("[func @broken, bb0]"));
}

#[test]
fn verifier_reports_return_type_mismatch() {
    let mut module = Module::new("m");
    let f = add_i32_function(&mut module, "bad_ret", 0);
    let mut b = Builder::new(&mut module, f);
    let entry = b.create_block(None);
    b.switch_to_block(entry);
    let c = ValueRef::Const(b.module().const_i64(7));
    b.ret(Some(c));

    let result = module.verify();
    assert!(!result.is_ok());
    assert!(result.errors[0].message.contains("return of i64"));
}

#[test]
fn module_text_lists_metadata() {
    let mut module = Module::new("kernels");
    let file = module.add_md(MdNode::Di(DiNode::File {
        filename: "a.cl".into(),
        directory: "/src".into(),
    }));
    let tuple = module.md_tuple(vec![MdOperand::Node(file), MdOperand::string("x")]);
    module.add_named_metadata("opencl.used.extensions", tuple);
    let text = module.to_string();
    assert!(text.starts_with("; ModuleID = 'kernels'\n"));
    assert!(text.contains("!opencl.used.extensions = !{!1}"), "{text}");
    assert!(
        text.contains("!0 = !DIFile(filename: \"a.cl\", directory: \"/src\")"),
        "{text}"
    );
    assert_eq!(module.named_metadata("opencl.used.extensions"), &[tuple]);
}

#[test]
fn self_referential_loop_node() {
    let mut module = Module::new("m");
    let unroll = module.md_tuple(vec![MdOperand::string("llvm.loop.unroll.enable")]);
    let lp = module.md_self_ref(vec![MdOperand::Node(unroll)]);
    let ops = module.md(lp).as_tuple().unwrap_or(&[]).to_vec();
    assert_eq!(ops[0], MdOperand::Node(lp));
    assert_eq!(ops[1], MdOperand::Node(unroll));
}

#[test]
fn null_constants_print_per_type() {
    let mut module = Module::new("m");
    let i1 = module.types.int(1);
    let i32_ty = module.types.int(32);
    let f32_ty = module.types.float(FloatType::F32);
    let v4 = module.types.vector(i32_ty, 4);
    let ptr = module.types.ptr(i32_ty, 1);
    let cases = [(i1, "false"), (i32_ty, "0"), (f32_ty, "0.0"), (v4, "zeroinitializer"), (ptr, "null")];
    for (ty, expected) in cases {
        let c = module.const_null(ty);
        assert_eq!(crate::display::const_to_string(&module, c), expected);
    }

    let f = add_i32_function(&mut module, "is_set", 1);
    module.function_mut(f).params[0].name = Some("x".into());
    let zero = ValueRef::Const(module.const_null(i32_ty));
    let mut b = Builder::new(&mut module, f);
    let entry = b.create_block(None);
    b.switch_to_block(entry);
    let set = b.icmp(ICmpOp::Ne, ValueRef::Arg(0), zero, Some("set"));
    let one = ValueRef::Const(b.module().const_i32(1));
    let picked = b.select(set, one, zero, None);
    b.ret(Some(picked));
    let text = module.display_function(f).to_string();
    assert!(text.contains("%set = icmp ne i32 %x, 0"), "{text}");
}
