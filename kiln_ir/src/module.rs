//! Module-level IR container.
//!
//! `Module` is the top-level IR structure that owns the type table,
//! constants, globals, functions, metadata and the symbol table that keeps
//! global and function names unique.

use std::fmt;

use num_bigint::BigInt;
use rustc_hash::FxHashMap;

use crate::constant::{f64_to_half_bits, normalize_int, ConstKind, Constant};
use crate::function::Function;
use crate::global::{GlobalVar, Linkage};
use crate::instruction::CastOp;
use crate::layout::DataLayout;
use crate::metadata::{FlagBehavior, MdNode, MdOperand, ModuleFlag};
use crate::types::{FloatType, Type, TypeTable};
use crate::value::{ConstRef, FuncRef, GlobalRef, MdRef, TypeRef, ValueRef};

/// A named module-level entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Symbol {
    Global(GlobalRef),
    Func(FuncRef),
}

/// Symbol table mapping names to globals and functions.
#[derive(Debug, Clone, Default)]
pub struct SymbolTable {
    lookup: FxHashMap<String, Symbol>,
}

impl SymbolTable {
    /// Create an empty symbol table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Pick a free name based on `base`, appending `.N` when taken.
    /// Empty names stay empty (anonymous symbols are not tracked).
    pub fn unique_name(&self, base: &str) -> String {
        if base.is_empty() || !self.lookup.contains_key(base) {
            return base.to_string();
        }
        let mut n = 1u32;
        loop {
            let candidate = format!("{base}.{n}");
            if !self.lookup.contains_key(&candidate) {
                return candidate;
            }
            n += 1;
        }
    }

    /// Bind `name` to a symbol.
    pub fn insert(&mut self, name: &str, sym: Symbol) {
        if !name.is_empty() {
            self.lookup.insert(name.to_string(), sym);
        }
    }

    /// Resolve a name.
    pub fn get(&self, name: &str) -> Option<Symbol> {
        self.lookup.get(name).copied()
    }

    pub fn remove(&mut self, name: &str) {
        self.lookup.remove(name);
    }

    /// Number of bound symbols.
    pub fn len(&self) -> usize {
        self.lookup.len()
    }

    /// Whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.lookup.is_empty()
    }
}

/// Top-level IR container.
pub struct Module {
    pub name: String,
    pub triple: Option<String>,
    pub layout: DataLayout,
    pub types: TypeTable,
    pub symbols: SymbolTable,
    constants: Vec<Constant>,
    const_lookup: FxHashMap<Constant, ConstRef>,
    pub globals: Vec<GlobalVar>,
    pub functions: Vec<Function>,
    pub metadata: Vec<MdNode>,
    /// Named metadata in insertion order.
    pub named_metadata: Vec<(String, Vec<MdRef>)>,
    pub module_flags: Vec<ModuleFlag>,
}

impl Module {
    /// Create a new empty module.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            triple: None,
            layout: DataLayout::default(),
            types: TypeTable::new(),
            symbols: SymbolTable::new(),
            constants: Vec::new(),
            const_lookup: FxHashMap::default(),
            globals: Vec::new(),
            functions: Vec::new(),
            metadata: Vec::new(),
            named_metadata: Vec::new(),
            module_flags: Vec::new(),
        }
    }

    // -- Constants --

    fn intern_const(&mut self, ty: TypeRef, kind: ConstKind) -> ConstRef {
        let c = Constant { ty, kind };
        if let Some(&r) = self.const_lookup.get(&c) {
            return r;
        }
        let r = ConstRef(self.constants.len() as u32);
        self.constants.push(c.clone());
        self.const_lookup.insert(c, r);
        r
    }

    pub fn constant(&self, c: ConstRef) -> &Constant {
        &self.constants[c.0 as usize]
    }

    /// Integer constant of type `ty` (scalar `iN`).
    pub fn const_int(&mut self, ty: TypeRef, value: impl Into<BigInt>) -> ConstRef {
        let bits = self.types.int_width(ty).unwrap_or(64);
        let v = normalize_int(value.into(), bits);
        self.intern_const(ty, ConstKind::Int(v))
    }

    pub fn const_bool(&mut self, value: bool) -> ConstRef {
        let i1 = self.types.int(1);
        self.const_int(i1, u8::from(value))
    }

    pub fn const_i32(&mut self, value: i64) -> ConstRef {
        let i32_ty = self.types.int(32);
        self.const_int(i32_ty, value)
    }

    pub fn const_i64(&mut self, value: i64) -> ConstRef {
        let i64_ty = self.types.int(64);
        self.const_int(i64_ty, value)
    }

    /// Float constant from its raw bit pattern.
    pub fn const_float_bits(&mut self, ty: TypeRef, bits: u64) -> ConstRef {
        self.intern_const(ty, ConstKind::Float(bits))
    }

    pub fn const_float(&mut self, ty: TypeRef, value: f64) -> ConstRef {
        let bits = match self.types.float_type(ty) {
            Some(FloatType::F16) => u64::from(f64_to_half_bits(value)),
            Some(FloatType::F32) => u64::from((value as f32).to_bits()),
            _ => value.to_bits(),
        };
        self.const_float_bits(ty, bits)
    }

    pub fn const_null(&mut self, ty: TypeRef) -> ConstRef {
        self.intern_const(ty, ConstKind::Null)
    }

    pub fn const_undef(&mut self, ty: TypeRef) -> ConstRef {
        self.intern_const(ty, ConstKind::Undef)
    }

    pub fn const_aggregate(&mut self, ty: TypeRef, elems: Vec<ConstRef>) -> ConstRef {
        self.intern_const(ty, ConstKind::Aggregate(elems))
    }

    /// Vector constant with every lane equal to `elem`.
    pub fn const_splat(&mut self, vec_ty: TypeRef, elem: ConstRef) -> ConstRef {
        let len = self.types.vector_len(vec_ty).unwrap_or(1);
        self.const_aggregate(vec_ty, vec![elem; len as usize])
    }

    /// `[N x i8]` constant.
    pub fn const_bytes(&mut self, bytes: Vec<u8>) -> ConstRef {
        let i8_ty = self.types.int(8);
        let ty = self.types.array(i8_ty, bytes.len() as u64);
        self.intern_const(ty, ConstKind::Bytes(bytes))
    }

    pub fn const_global_addr(&mut self, g: GlobalRef) -> ConstRef {
        let ty = self.global(g).ptr_ty;
        self.intern_const(ty, ConstKind::GlobalAddr(g))
    }

    pub fn const_func_addr(&mut self, f: FuncRef) -> ConstRef {
        let ty = self.function(f).ptr_ty;
        self.intern_const(ty, ConstKind::FuncAddr(f))
    }

    /// Constant conversion. Identity casts fold away.
    pub fn const_cast(&mut self, op: CastOp, c: ConstRef, ty: TypeRef) -> ConstRef {
        if self.constant(c).ty == ty {
            return c;
        }
        self.intern_const(ty, ConstKind::Cast(op, c))
    }

    // -- Globals --

    /// Add a global variable; the name is made unique.
    pub fn add_global(
        &mut self,
        name: &str,
        value_ty: TypeRef,
        addr_space: u32,
        linkage: Linkage,
    ) -> GlobalRef {
        let name = self.symbols.unique_name(name);
        let ptr_ty = self.types.ptr(value_ty, addr_space);
        let r = GlobalRef(self.globals.len() as u32);
        self.symbols.insert(&name, Symbol::Global(r));
        self.globals.push(GlobalVar {
            name,
            value_ty,
            ptr_ty,
            addr_space,
            linkage,
            constant: false,
            initializer: None,
            align: None,
            unnamed_addr: false,
            debug: Vec::new(),
            erased: false,
        });
        r
    }

    pub fn global(&self, g: GlobalRef) -> &GlobalVar {
        &self.globals[g.0 as usize]
    }

    pub fn global_mut(&mut self, g: GlobalRef) -> &mut GlobalVar {
        &mut self.globals[g.0 as usize]
    }

    /// Remove a global from the module. Its slot stays reserved.
    pub fn erase_global(&mut self, g: GlobalRef) {
        let gv = &mut self.globals[g.0 as usize];
        gv.erased = true;
        let name = gv.name.clone();
        if self.symbols.get(&name) == Some(Symbol::Global(g)) {
            self.symbols.remove(&name);
        }
    }

    /// Live globals in creation order.
    pub fn live_globals(&self) -> impl Iterator<Item = (GlobalRef, &GlobalVar)> {
        self.globals
            .iter()
            .enumerate()
            .filter(|(_, g)| !g.erased)
            .map(|(i, g)| (GlobalRef(i as u32), g))
    }

    pub fn get_global(&self, name: &str) -> Option<GlobalRef> {
        match self.symbols.get(name)? {
            Symbol::Global(g) => Some(g),
            Symbol::Func(_) => None,
        }
    }

    // -- Functions --

    /// Add a function declaration of type `fn_ty`; the name is made unique.
    pub fn add_function(&mut self, name: &str, fn_ty: TypeRef) -> FuncRef {
        let name = self.symbols.unique_name(name);
        let ptr_ty = self.types.ptr(fn_ty, 0);
        let sig = self
            .types
            .signature(fn_ty)
            .map(|(ret, params, _)| (ret, params.to_vec()));
        let (ret, params) = match sig {
            Some(sig) => sig,
            None => (self.types.void(), Vec::new()),
        };
        let r = FuncRef(self.functions.len() as u32);
        self.symbols.insert(&name, Symbol::Func(r));
        self.functions
            .push(Function::new(name, fn_ty, ptr_ty, ret, params));
        r
    }

    pub fn function(&self, f: FuncRef) -> &Function {
        &self.functions[f.0 as usize]
    }

    pub fn function_mut(&mut self, f: FuncRef) -> &mut Function {
        &mut self.functions[f.0 as usize]
    }

    pub fn func_refs(&self) -> impl Iterator<Item = FuncRef> {
        (0..self.functions.len() as u32).map(FuncRef)
    }

    pub fn get_function(&self, name: &str) -> Option<FuncRef> {
        match self.symbols.get(name)? {
            Symbol::Func(f) => Some(f),
            Symbol::Global(_) => None,
        }
    }

    /// Change a function's signature in place, keeping its parameters' metadata.
    pub fn set_function_type(&mut self, f: FuncRef, fn_ty: TypeRef) {
        let ptr_ty = self.types.ptr(fn_ty, 0);
        let func = &mut self.functions[f.0 as usize];
        let ret = self
            .types
            .signature(fn_ty)
            .map_or(func.ret_ty, |(ret, _, _)| ret);
        func.ty = fn_ty;
        func.ptr_ty = ptr_ty;
        func.ret_ty = ret;
    }

    // -- Values --

    /// Type of a value as seen from inside function `func`.
    pub fn value_type(&self, func: FuncRef, v: ValueRef) -> TypeRef {
        match v {
            ValueRef::Inst(i) => self.function(func).inst(i).ty,
            ValueRef::Arg(n) => self.function(func).params[n as usize].ty,
            ValueRef::Const(c) => self.constant(c).ty,
            ValueRef::Global(g) => self.global(g).ptr_ty,
            ValueRef::Func(f) => self.function(f).ptr_ty,
        }
    }

    // -- Metadata --

    pub fn add_md(&mut self, node: MdNode) -> MdRef {
        let r = MdRef(self.metadata.len() as u32);
        self.metadata.push(node);
        r
    }

    pub fn md(&self, r: MdRef) -> &MdNode {
        &self.metadata[r.0 as usize]
    }

    pub fn md_mut(&mut self, r: MdRef) -> &mut MdNode {
        &mut self.metadata[r.0 as usize]
    }

    pub fn md_tuple(&mut self, ops: Vec<MdOperand>) -> MdRef {
        self.add_md(MdNode::Tuple(ops))
    }

    /// Tuple whose first operand is the node itself (loop identifiers).
    pub fn md_self_ref(&mut self, rest: Vec<MdOperand>) -> MdRef {
        let r = self.add_md(MdNode::Tuple(Vec::new()));
        let mut ops = Vec::with_capacity(rest.len() + 1);
        ops.push(MdOperand::Node(r));
        ops.extend(rest);
        self.metadata[r.0 as usize] = MdNode::Tuple(ops);
        r
    }

    /// Append `node` to named metadata `name`, creating it if needed.
    pub fn add_named_metadata(&mut self, name: &str, node: MdRef) {
        match self.named_metadata.iter_mut().find(|(n, _)| n == name) {
            Some((_, nodes)) => nodes.push(node),
            None => self.named_metadata.push((name.to_string(), vec![node])),
        }
    }

    pub fn named_metadata(&self, name: &str) -> &[MdRef] {
        self.named_metadata
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, nodes)| nodes.as_slice())
            .unwrap_or(&[])
    }

    pub fn add_module_flag(&mut self, behavior: FlagBehavior, key: &str, value: u32) {
        self.module_flags.push(ModuleFlag {
            behavior,
            key: key.to_string(),
            value,
        });
    }

    pub fn module_flag(&self, key: &str) -> Option<u32> {
        self.module_flags
            .iter()
            .find(|f| f.key == key)
            .map(|f| f.value)
    }

    /// Pointer to `pointee` in `addr_space`, shorthand over the type table.
    pub fn ptr_to(&mut self, pointee: TypeRef, addr_space: u32) -> TypeRef {
        self.types.ptr(pointee, addr_space)
    }

    /// Whether `ty` is the struct type named `name`.
    pub fn is_named_struct(&self, ty: TypeRef, name: &str) -> bool {
        matches!(self.types.get(ty), Type::Struct(s) if s.name.as_deref() == Some(name))
    }
}

impl fmt::Debug for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Module")
            .field("name", &self.name)
            .field("types", &format!("[{} types]", self.types.len()))
            .field("globals", &format!("[{} globals]", self.globals.len()))
            .field(
                "functions",
                &format!("[{} functions]", self.functions.len()),
            )
            .field("metadata", &format!("[{} nodes]", self.metadata.len()))
            .finish()
    }
}
