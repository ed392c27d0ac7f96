//! Debug records to debug metadata.
//!
//! Debug records form their own id space next to types and values. Every
//! record is translated at most once; composite types are registered before
//! their elements so recursive type graphs terminate. Any other re-entry of
//! a record whose translation is still in progress is a cycle in the scope
//! graph and aborts the translation.

use rustc_hash::{FxHashMap, FxHashSet};
use tracing::{debug, trace};

use kiln_ir::metadata::{CompositeTag, DiFlags, DiNode, DwarfEncoding, MdNode, QualifierTag};
use kiln_ir::module::Module;
use kiln_ir::value::{MdRef, ValueRef};
use kiln_spirv::debug::{args, flags, operation, CompositeKind, DebugOp, Encoding, TypeQualifier};
use kiln_spirv::{Entity, EntityStore, Id, Opcode, StorageClass};

use crate::error::{Result, TranslateError};
use crate::translator::Translator;
use crate::types::address_space;

/// DWARF operation codes for the expression operations.
const DW_OP_CONSTU: u64 = 0x10;
const DW_OP_DEREF: u64 = 0x06;
const DW_OP_MINUS: u64 = 0x1c;
const DW_OP_PLUS: u64 = 0x22;
const DW_OP_PLUS_UCONST: u64 = 0x23;
const DW_OP_SWAP: u64 = 0x16;
const DW_OP_XDEREF: u64 = 0x18;
const DW_OP_BIT_PIECE: u64 = 0x9d;
const DW_OP_STACK_VALUE: u64 = 0x9f;
const DW_OP_LLVM_FRAGMENT: u64 = 0x1000;

/// Caches of the debug-info translation.
#[derive(Debug, Default)]
pub(crate) struct DebugInfo {
    pub enabled: bool,
    /// `None` records a record that intentionally has no node.
    memo: FxHashMap<Id, Option<MdRef>>,
    in_progress: FxHashSet<Id>,
    files: FxHashMap<String, MdRef>,
    compile_unit: Option<MdRef>,
}

impl DebugInfo {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            ..Self::default()
        }
    }

    pub fn compile_unit(&self) -> Option<MdRef> {
        self.compile_unit
    }

    /// Translate the compile unit of `store`, if debug info is enabled.
    pub fn translate_compile_unit(&mut self, store: &EntityStore, module: &mut Module) -> Result<Option<MdRef>> {
        if !self.enabled {
            return Ok(None);
        }
        if self.compile_unit.is_some() {
            return Ok(self.compile_unit);
        }
        let Some(id) = store.compile_unit else {
            return Ok(None);
        };
        let e = store.get(id).ok_or(TranslateError::MissingEntity(id))?;
        let language = e.ext_arg_word(args::compile_unit::LANGUAGE).unwrap_or(0);
        let path = e
            .ext_arg_id(args::compile_unit::SOURCE)
            .and_then(|src| source_path(store, src))
            .unwrap_or_default();
        let file = self.file(module, &path);
        let cu = module.add_md(MdNode::Di(DiNode::CompileUnit {
            language,
            file,
            producer: "spirv".to_string(),
            optimized: false,
        }));
        module.add_named_metadata("llvm.dbg.cu", cu);
        self.compile_unit = Some(cu);
        self.memo.insert(id, Some(cu));
        debug!(file = %path, "translated debug compile unit");
        Ok(Some(cu))
    }

    /// File node for `path`, split into basename and directory.
    pub fn file(&mut self, module: &mut Module, path: &str) -> MdRef {
        if let Some(&f) = self.files.get(path) {
            return f;
        }
        let (filename, directory) = split_path(path);
        let f = module.add_md(MdNode::Di(DiNode::File { filename, directory }));
        self.files.insert(path.to_string(), f);
        f
    }
}

/// `("name", "dir")`; the directory is `.` when there is no separator.
pub(crate) fn split_path(path: &str) -> (String, String) {
    match path.rfind(['/', '\\']) {
        Some(pos) => (path[pos + 1..].to_string(), path[..pos].to_string()),
        None => (path.to_string(), ".".to_string()),
    }
}

/// File name behind a `DebugSource` record or an `OpString`.
fn source_path(store: &EntityStore, id: Id) -> Option<String> {
    if let Some(s) = store.string(id) {
        return Some(s.to_string());
    }
    let src = store.get(id)?;
    let file = src.ext_arg_id(args::source::FILE)?;
    store.string(file).map(str::to_string)
}

fn di_flags(word: u32) -> DiFlags {
    let mut out = match word & flags::ACCESS_MASK {
        flags::IS_PUBLIC => DiFlags::PUBLIC,
        flags::IS_PROTECTED => DiFlags::PROTECTED,
        flags::IS_PRIVATE => DiFlags::PRIVATE,
        _ => DiFlags::ZERO,
    };
    for (bit, flag) in [
        (flags::IS_FWD_DECL, DiFlags::FWD_DECL),
        (flags::IS_ARTIFICIAL, DiFlags::ARTIFICIAL),
        (flags::IS_EXPLICIT, DiFlags::EXPLICIT),
        (flags::IS_PROTOTYPED, DiFlags::PROTOTYPED),
        (flags::IS_OBJECT_POINTER, DiFlags::OBJECT_POINTER),
        (flags::IS_STATIC_MEMBER, DiFlags::STATIC_MEMBER),
        (flags::IS_LVALUE_REFERENCE, DiFlags::LVALUE_REFERENCE),
        (flags::IS_RVALUE_REFERENCE, DiFlags::RVALUE_REFERENCE),
    ] {
        if word & bit != 0 {
            out |= flag;
        }
    }
    out
}

fn dwarf_encoding(word: u32) -> DwarfEncoding {
    match Encoding::from_word(word) {
        Some(Encoding::Address) => DwarfEncoding::Address,
        Some(Encoding::Boolean) => DwarfEncoding::Boolean,
        Some(Encoding::Float) => DwarfEncoding::Float,
        Some(Encoding::Signed) => DwarfEncoding::Signed,
        Some(Encoding::SignedChar) => DwarfEncoding::SignedChar,
        Some(Encoding::Unsigned) => DwarfEncoding::Unsigned,
        Some(Encoding::UnsignedChar) => DwarfEncoding::UnsignedChar,
        Some(Encoding::Unspecified) | None => DwarfEncoding::Unspecified,
    }
}

fn dwarf_operation(op: u32) -> Option<u64> {
    Some(match op {
        operation::DEREF => DW_OP_DEREF,
        operation::PLUS => DW_OP_PLUS,
        operation::MINUS => DW_OP_MINUS,
        operation::PLUS_UCONST => DW_OP_PLUS_UCONST,
        operation::BIT_PIECE => DW_OP_BIT_PIECE,
        operation::SWAP => DW_OP_SWAP,
        operation::XDEREF => DW_OP_XDEREF,
        operation::STACK_VALUE => DW_OP_STACK_VALUE,
        operation::CONSTU => DW_OP_CONSTU,
        operation::FRAGMENT => DW_OP_LLVM_FRAGMENT,
        _ => return None,
    })
}

impl<'a> Translator<'a> {
    /// Attach `DebugFunction` records to the functions they describe.
    pub(crate) fn translate_subprograms(&mut self) -> Result<()> {
        if !self.debug.enabled {
            return Ok(());
        }
        let store = self.store;
        for &id in &store.debug_records {
            let e = self.entity(id)?;
            if e.ext_op().and_then(DebugOp::from_word) != Some(DebugOp::Function) {
                continue;
            }
            let Some(sp) = self.debug_node(id)? else {
                continue;
            };
            let target = e.ext_arg_id(args::function::FUNCTION);
            if let Some(&f) = target.and_then(|t| self.funcs.get(&t)) {
                self.module.function_mut(f).subprogram = Some(sp);
            }
        }
        Ok(())
    }

    /// Attach `DebugGlobalVariable` records to the translated globals.
    pub(crate) fn translate_debug_globals(&mut self) -> Result<()> {
        if !self.debug.enabled {
            return Ok(());
        }
        let store = self.store;
        for &id in &store.debug_globals {
            let Some(var) = self.debug_node(id)? else {
                continue;
            };
            let e = self.entity(id)?;
            let expr = self.module.add_md(MdNode::Di(DiNode::Expression(Vec::new())));
            let gve = self
                .module
                .add_md(MdNode::Di(DiNode::GlobalVariableExpression { var, expr }));
            let global = e
                .ext_arg_id(args::global_variable::VARIABLE)
                .and_then(|v| self.globals.get(&v))
                .and_then(|v| v.as_global());
            match global {
                Some(g) => self.module.global_mut(g).debug.push(gve),
                None => trace!(record = id.0, "debug global has no translated variable"),
            }
        }
        Ok(())
    }

    /// Debug location of an instruction from its line and scope.
    pub(crate) fn instruction_location(&mut self, e: &Entity) -> Result<Option<MdRef>> {
        if !self.debug.enabled {
            return Ok(None);
        }
        let (Some(line), Some(scope_id)) = (e.line, e.scope) else {
            return Ok(None);
        };
        let Some(scope) = self.debug_scope(scope_id)? else {
            return Ok(None);
        };
        let inlined_at = match self.entity(scope_id)?.ext_op().and_then(DebugOp::from_word) {
            Some(DebugOp::Scope) => match self.entity(scope_id)?.ext_arg_id(args::scope::INLINED_AT) {
                Some(iat) => self.debug_node(iat)?,
                None => None,
            },
            _ => None,
        };
        Ok(self.location(line.line, line.column, scope, inlined_at))
    }

    /// A location in a file scope is dropped.
    fn location(&mut self, line: u32, column: u32, scope: MdRef, inlined_at: Option<MdRef>) -> Option<MdRef> {
        if matches!(self.module.md(scope), MdNode::Di(DiNode::File { .. })) {
            return None;
        }
        Some(self.module.add_md(MdNode::Di(DiNode::Location {
            line,
            column,
            scope,
            inlined_at,
        })))
    }

    /// `DebugDeclare` and `DebugValue` inside a function body.
    pub(crate) fn translate_debug_ext_inst(&mut self, e: &'a Entity) -> Result<Option<ValueRef>> {
        if !self.debug.enabled {
            return Ok(None);
        }
        let (var_arg, value_arg, expr_arg) = match e.ext_op().and_then(DebugOp::from_word) {
            Some(DebugOp::Declare) => (
                args::declare::LOCAL_VAR,
                args::declare::VARIABLE,
                args::declare::EXPRESSION,
            ),
            Some(DebugOp::Value) => (args::value::LOCAL_VAR, args::value::VALUE, args::value::EXPRESSION),
            _ => return Ok(None),
        };
        if self.state(e.id)?.debug_loc.is_none() {
            return Ok(None);
        }
        let Some(target) = e.ext_arg_id(value_arg) else {
            return Ok(None);
        };
        let value = match self.state(e.id)?.values.get(&target) {
            Some(&v) if self.is_translated(target) => v,
            _ => match self.globals.get(&target) {
                Some(&v) => v,
                None => {
                    trace!(record = e.id.0, target = target.0, "debug record refers to an untranslated value");
                    return Ok(None);
                }
            },
        };
        let Some(variable) = self.arg_node(e, var_arg)? else {
            return Ok(None);
        };
        let expr = match self.arg_node(e, expr_arg)? {
            Some(expr) => expr,
            None => self.module.add_md(MdNode::Di(DiNode::Expression(Vec::new()))),
        };
        let mut b = self.builder(e.id)?;
        if e.ext_op() == Some(DebugOp::Declare.word()) {
            b.dbg_declare(value, variable, expr);
        } else {
            b.dbg_value(value, variable, expr);
        }
        Ok(None)
    }

    // -- Scopes --

    /// Scope node of a scope reference. `OpString` parents name files.
    fn debug_scope(&mut self, id: Id) -> Result<Option<MdRef>> {
        let store = self.store;
        if let Some(path) = store.string(id) {
            return Ok(Some(self.debug.file(&mut self.module, path)));
        }
        let e = self.entity(id)?;
        if e.ext_op().and_then(DebugOp::from_word) == Some(DebugOp::Scope) {
            return match e.ext_arg_id(args::scope::SCOPE) {
                Some(scope) => self.debug_scope(scope),
                None => Ok(None),
            };
        }
        self.debug_node(id)
    }

    fn is_file(&self, md: MdRef) -> bool {
        matches!(self.module.md(md), MdNode::Di(DiNode::File { .. }))
    }

    fn is_compile_unit(&self, md: MdRef) -> bool {
        matches!(self.module.md(md), MdNode::Di(DiNode::CompileUnit { .. }))
    }

    // -- Record translation --

    /// Memoized translation of one debug record.
    pub(crate) fn debug_node(&mut self, id: Id) -> Result<Option<MdRef>> {
        if let Some(&md) = self.debug.memo.get(&id) {
            return Ok(md);
        }
        let store = self.store;
        if store.opcode(id) == Some(Opcode::TypeVoid) {
            return Ok(None);
        }
        let e = self.entity(id)?;
        let Some(op) = e.ext_op().and_then(DebugOp::from_word) else {
            return Err(TranslateError::malformed(id, "expected a debug record"));
        };

        // Members of a composite are created together with the composite.
        if let Some(owner) = self.owning_composite(e, op) {
            self.debug_node(owner)?;
            if let Some(&md) = self.debug.memo.get(&id) {
                return Ok(md);
            }
        }

        if !self.debug.in_progress.insert(id) {
            return Err(TranslateError::DebugScopeCycle(id));
        }
        let result = self.translate_debug_record(e, op);
        self.debug.in_progress.remove(&id);
        let md = result?;
        self.debug.memo.insert(id, md);
        trace!(record = id.0, kind = op.name(), "translated debug record");
        Ok(md)
    }

    fn owning_composite(&self, e: &Entity, op: DebugOp) -> Option<Id> {
        let owner = match op {
            DebugOp::TypeMember => e.ext_arg_id(args::member::PARENT)?,
            DebugOp::FunctionDeclaration => e.ext_arg_id(args::function_decl::PARENT)?,
            DebugOp::TypeInheritance => e.ext_arg_id(args::inheritance::CHILD)?,
            _ => return None,
        };
        let record = self.store.get(owner)?;
        (record.ext_op() == Some(DebugOp::TypeComposite.word())).then_some(owner)
    }

    fn translate_debug_record(&mut self, e: &'a Entity, op: DebugOp) -> Result<Option<MdRef>> {
        let di = match op {
            DebugOp::InfoNone
            | DebugOp::NoScope
            | DebugOp::Operation
            | DebugOp::Declare
            | DebugOp::Value
            | DebugOp::MacroDef
            | DebugOp::MacroUndef
            | DebugOp::ImportedEntity => return Ok(None),
            DebugOp::CompilationUnit => {
                return self.debug.translate_compile_unit(self.store, &mut self.module);
            }
            DebugOp::Source => {
                let path = source_path(self.store, e.id).unwrap_or_default();
                return Ok(Some(self.debug.file(&mut self.module, &path)));
            }
            DebugOp::Scope => {
                return match e.ext_arg_id(args::scope::SCOPE) {
                    Some(scope) => self.debug_scope(scope),
                    None => Ok(None),
                };
            }
            DebugOp::TypeBasic => {
                use args::basic::*;
                DiNode::BasicType {
                    name: self.arg_string(e, NAME),
                    size_bits: self.arg_number(e, SIZE),
                    encoding: dwarf_encoding(e.ext_arg_word(ENCODING).unwrap_or(0)),
                }
            }
            DebugOp::TypePointer => {
                use args::pointer::*;
                let addr_space = e
                    .ext_arg_word(STORAGE_CLASS)
                    .and_then(StorageClass::from_word)
                    .map(address_space)
                    .filter(|&a| a != 0);
                DiNode::PointerType {
                    base: self.arg_node(e, BASE)?,
                    size_bits: self.pointer_bits(),
                    addr_space,
                }
            }
            DebugOp::TypeQualifier => {
                use args::qualifier::*;
                let tag = match e.ext_arg_word(QUALIFIER).and_then(TypeQualifier::from_word) {
                    Some(TypeQualifier::Const) => QualifierTag::Const,
                    Some(TypeQualifier::Volatile) => QualifierTag::Volatile,
                    Some(TypeQualifier::Restrict) => QualifierTag::Restrict,
                    Some(TypeQualifier::Atomic) => QualifierTag::Atomic,
                    None => return Err(TranslateError::malformed(e.id, "unknown type qualifier")),
                };
                DiNode::QualifiedType {
                    tag,
                    base: self.arg_node(e, BASE)?,
                }
            }
            DebugOp::TypeArray => {
                use args::array::*;
                let base = self.arg_node(e, BASE)?;
                let counts: Vec<i64> = (FIRST_COUNT..e.ext_args().len())
                    .map(|i| self.arg_number(e, i) as i64)
                    .collect();
                let total: u64 = counts.iter().map(|&c| c.max(0) as u64).product();
                DiNode::ArrayType {
                    size_bits: total * base.map_or(0, |b| self.di_size_bits(b)),
                    base,
                    counts,
                }
            }
            DebugOp::TypeVector => {
                let base = self.arg_node(e, 0)?;
                let count = self.arg_number(e, 1);
                DiNode::VectorType {
                    size_bits: count * base.map_or(0, |b| self.di_size_bits(b)),
                    base,
                    count,
                }
            }
            DebugOp::Typedef => {
                use args::typedef::*;
                DiNode::Typedef {
                    name: self.arg_string(e, NAME),
                    base: self.arg_node(e, BASE)?,
                    file: self.arg_file(e, SOURCE),
                    line: self.arg_number(e, LINE) as u32,
                    scope: self.arg_scope(e, PARENT)?,
                }
            }
            DebugOp::TypeFunction => {
                use args::function_type::*;
                let mut types = Vec::new();
                for i in RETURN..e.ext_args().len() {
                    types.push(self.arg_node(e, i)?);
                }
                if types.is_empty() {
                    types.push(None);
                }
                DiNode::SubroutineType {
                    types,
                    flags: di_flags(e.ext_arg_word(FLAGS).unwrap_or(0)),
                }
            }
            DebugOp::TypeEnum => {
                use args::enumeration::*;
                let mut elements = Vec::new();
                let mut i = FIRST_ENUMERATOR;
                while i + 1 < e.ext_args().len() {
                    let value = self.arg_number(e, i) as i64;
                    let name = self.arg_string(e, i + 1);
                    elements.push(self.module.add_md(MdNode::Di(DiNode::Enumerator { name, value })));
                    i += 2;
                }
                DiNode::EnumType {
                    name: self.arg_string(e, NAME),
                    base: self.arg_node(e, UNDERLYING)?,
                    file: self.arg_file(e, SOURCE),
                    line: self.arg_number(e, LINE) as u32,
                    scope: self.arg_scope(e, PARENT)?,
                    size_bits: self.arg_number(e, SIZE),
                    elements,
                    flags: di_flags(e.ext_arg_word(FLAGS).unwrap_or(0)),
                }
            }
            DebugOp::TypeComposite => return self.translate_composite_type(e).map(Some),
            DebugOp::TypeMember => {
                use args::member::*;
                let scope = match self.arg_scope(e, PARENT)? {
                    Some(scope) => Some(scope),
                    None => self.debug.compile_unit(),
                };
                DiNode::Member {
                    name: self.arg_string(e, NAME),
                    file: self.arg_file(e, SOURCE),
                    line: self.arg_number(e, LINE) as u32,
                    scope,
                    base: self.arg_node(e, TYPE)?,
                    size_bits: self.arg_number(e, SIZE),
                    offset_bits: self.arg_number(e, OFFSET),
                    flags: di_flags(e.ext_arg_word(FLAGS).unwrap_or(0)),
                }
            }
            DebugOp::TypeInheritance => {
                use args::inheritance::*;
                let access = e.ext_arg_word(FLAGS).unwrap_or(0) & flags::ACCESS_MASK;
                DiNode::Inheritance {
                    derived: self.arg_node(e, CHILD)?,
                    base: self.arg_node(e, PARENT)?,
                    offset_bits: self.arg_number(e, OFFSET),
                    flags: di_flags(access),
                }
            }
            DebugOp::TypePtrToMember => {
                use args::ptr_to_member::*;
                DiNode::PtrToMember {
                    pointee: self.arg_node(e, MEMBER_TYPE)?,
                    class: self.arg_node(e, PARENT)?,
                    size_bits: self.pointer_bits(),
                }
            }
            DebugOp::TypeTemplate => return self.translate_template(e),
            DebugOp::TypeTemplateParameter => {
                use args::template_param::*;
                let name = self.arg_string(e, NAME);
                let ty = self.arg_node(e, TYPE)?;
                let has_value = e
                    .ext_arg_id(VALUE)
                    .and_then(|v| self.store.get(v))
                    .is_some_and(|v| v.ext_op() != Some(DebugOp::InfoNone.word()));
                if has_value {
                    let value = self.arg_number(e, VALUE) as i64;
                    let value = Some(self.module.const_i64(value));
                    DiNode::TemplateValueParameter { name, ty, value }
                } else {
                    DiNode::TemplateTypeParameter { name, ty }
                }
            }
            DebugOp::TypeTemplateTemplateParameter => {
                use args::template_template_param::*;
                DiNode::TemplateTemplateParameter {
                    name: self.arg_string(e, NAME),
                    template: self.arg_string(e, TEMPLATE_NAME),
                }
            }
            DebugOp::TypeTemplateParameterPack => {
                use args::template_param_pack::*;
                let mut elements = Vec::new();
                for i in FIRST_PARAM..e.ext_args().len() {
                    elements.extend(self.arg_node(e, i)?);
                }
                DiNode::TemplateParameterPack {
                    name: self.arg_string(e, NAME),
                    elements,
                }
            }
            DebugOp::GlobalVariable => {
                use args::global_variable::*;
                let word = e.ext_arg_word(FLAGS).unwrap_or(0);
                let scope = match self.arg_scope(e, PARENT)? {
                    Some(scope) => Some(scope),
                    None => self.debug.compile_unit(),
                };
                let static_member = if e.ext_args().len() > STATIC_MEMBER {
                    self.arg_node(e, STATIC_MEMBER)?
                } else {
                    None
                };
                DiNode::GlobalVariable {
                    name: self.arg_string(e, NAME),
                    linkage_name: self.arg_string(e, LINKAGE_NAME),
                    scope,
                    file: self.arg_file(e, SOURCE),
                    line: self.arg_number(e, LINE) as u32,
                    ty: self.arg_node(e, TYPE)?,
                    local: word & flags::IS_LOCAL != 0,
                    definition: word & flags::IS_DEFINITION != 0,
                    static_member,
                }
            }
            DebugOp::FunctionDeclaration => {
                use args::function_decl::*;
                let word = e.ext_arg_word(FLAGS).unwrap_or(0);
                DiNode::Subprogram {
                    name: self.arg_string(e, NAME),
                    linkage_name: self.arg_string(e, LINKAGE_NAME),
                    scope: self.arg_scope(e, PARENT)?,
                    file: self.arg_file(e, SOURCE),
                    line: self.arg_number(e, LINE) as u32,
                    ty: self.arg_node(e, TYPE)?,
                    scope_line: 0,
                    flags: di_flags(word),
                    local: word & flags::IS_LOCAL != 0,
                    definition: false,
                    optimized: word & flags::IS_OPTIMIZED != 0,
                    unit: None,
                    declaration: None,
                    template_params: Vec::new(),
                }
            }
            DebugOp::Function => {
                use args::function::*;
                let word = e.ext_arg_word(FLAGS).unwrap_or(0);
                let definition = word & flags::IS_DEFINITION != 0;
                let declaration = if e.ext_args().len() > DECLARATION {
                    self.arg_node(e, DECLARATION)?
                } else {
                    None
                };
                DiNode::Subprogram {
                    name: self.arg_string(e, NAME),
                    linkage_name: self.arg_string(e, LINKAGE_NAME),
                    scope: self.arg_scope(e, PARENT)?,
                    file: self.arg_file(e, SOURCE),
                    line: self.arg_number(e, LINE) as u32,
                    ty: self.arg_node(e, TYPE)?,
                    scope_line: self.arg_number(e, SCOPE_LINE) as u32,
                    flags: di_flags(word),
                    local: word & flags::IS_LOCAL != 0,
                    definition,
                    optimized: word & flags::IS_OPTIMIZED != 0,
                    unit: if definition { self.debug.compile_unit() } else { None },
                    declaration,
                    template_params: Vec::new(),
                }
            }
            DebugOp::LexicalBlock => {
                use args::lexical_block::*;
                let Some(scope) = self.arg_scope(e, PARENT)? else {
                    return Ok(None);
                };
                if self.is_file(scope) {
                    return Ok(None);
                }
                let file = self.arg_file(e, SOURCE);
                let line = self.arg_number(e, LINE) as u32;
                let name = (e.ext_args().len() > NAME).then(|| self.arg_string(e, NAME));
                match name {
                    Some(name) => DiNode::Namespace {
                        scope: Some(scope),
                        name,
                        export_symbols: false,
                    },
                    None if self.is_compile_unit(scope) => DiNode::Namespace {
                        scope: Some(scope),
                        name: String::new(),
                        export_symbols: false,
                    },
                    None => DiNode::LexicalBlock {
                        scope: Some(scope),
                        file,
                        line,
                        column: self.arg_number(e, COLUMN) as u32,
                    },
                }
            }
            DebugOp::LexicalBlockDiscriminator => {
                use args::lexical_block_discriminator::*;
                DiNode::LexicalBlockFile {
                    scope: self.arg_scope(e, PARENT)?,
                    file: self.arg_file(e, SOURCE),
                    discriminator: self.arg_number(e, DISCRIMINATOR) as u32,
                }
            }
            DebugOp::InlinedAt => {
                use args::inlined_at::*;
                let line = self.arg_number(e, LINE) as u32;
                let Some(scope) = self.arg_scope(e, SCOPE)? else {
                    return Ok(None);
                };
                let parent = if e.ext_args().len() > INLINED {
                    self.arg_node(e, INLINED)?
                } else {
                    None
                };
                return Ok(self.location(line, 0, scope, parent));
            }
            DebugOp::LocalVariable => {
                use args::local_variable::*;
                let arg = if e.ext_args().len() > ARG_NUMBER {
                    self.arg_number(e, ARG_NUMBER) as u32
                } else {
                    0
                };
                DiNode::LocalVariable {
                    name: self.arg_string(e, NAME),
                    scope: self.arg_scope(e, PARENT)?,
                    file: self.arg_file(e, SOURCE),
                    line: self.arg_number(e, LINE) as u32,
                    ty: self.arg_node(e, TYPE)?,
                    arg,
                    flags: di_flags(e.ext_arg_word(FLAGS).unwrap_or(0)),
                }
            }
            DebugOp::InlinedVariable => return self.arg_node(e, 0),
            DebugOp::Expression => DiNode::Expression(self.expression_ops(e)?),
        };
        Ok(Some(self.module.add_md(MdNode::Di(di))))
    }

    /// The node is registered before its elements so members can refer
    /// back to it.
    fn translate_composite_type(&mut self, e: &'a Entity) -> Result<MdRef> {
        use args::composite::*;
        let tag = match e.ext_arg_word(TAG).and_then(CompositeKind::from_word) {
            Some(CompositeKind::Class) => CompositeTag::Class,
            Some(CompositeKind::Structure) => CompositeTag::Structure,
            Some(CompositeKind::Union) => CompositeTag::Union,
            None => return Err(TranslateError::malformed(e.id, "unknown composite tag")),
        };
        let word = e.ext_arg_word(FLAGS).unwrap_or(0);
        let mut di = DiFlags::ZERO;
        if word & flags::IS_FWD_DECL != 0 {
            di |= DiFlags::FWD_DECL;
        }
        let scope = match self.arg_scope(e, PARENT)? {
            Some(scope) => Some(scope),
            None => self.debug.compile_unit(),
        };
        let node = DiNode::CompositeType {
            tag,
            name: self.arg_string(e, NAME),
            file: self.arg_file(e, SOURCE),
            line: self.arg_number(e, LINE) as u32,
            scope,
            size_bits: self.arg_number(e, SIZE),
            flags: di,
            identifier: self.arg_string(e, LINKAGE_NAME),
            elements: Vec::new(),
        };
        let md = self.module.add_md(MdNode::Di(node));
        self.debug.memo.insert(e.id, Some(md));

        let mut members = Vec::new();
        for member in e.ext_args().iter().skip(FIRST_MEMBER).filter_map(|a| a.as_id()) {
            let kind = self.entity(member)?.ext_op().and_then(DebugOp::from_word);
            if matches!(
                kind,
                Some(DebugOp::TypeMember | DebugOp::TypeInheritance | DebugOp::FunctionDeclaration)
            ) {
                members.extend(self.debug_node(member)?);
            }
        }
        if let MdNode::Di(DiNode::CompositeType { elements, .. }) = self.module.md_mut(md) {
            *elements = members;
        }
        Ok(md)
    }

    /// Template parameters attach to a subprogram target; other targets are
    /// returned as is.
    fn translate_template(&mut self, e: &'a Entity) -> Result<Option<MdRef>> {
        use args::template::*;
        let Some(target) = self.arg_node(e, TARGET)? else {
            return Ok(None);
        };
        let mut params = Vec::new();
        for i in FIRST_PARAM..e.ext_args().len() {
            params.extend(self.arg_node(e, i)?);
        }
        if let MdNode::Di(DiNode::Subprogram { template_params, .. }) = self.module.md_mut(target) {
            *template_params = params;
        }
        Ok(Some(target))
    }

    fn expression_ops(&mut self, e: &Entity) -> Result<Vec<u64>> {
        let mut ops = Vec::new();
        for op_id in e.ext_args().iter().filter_map(|a| a.as_id()) {
            let op = self.entity(op_id)?;
            let code = op.ext_arg_word(0).unwrap_or(u32::MAX);
            let Some(dwarf) = dwarf_operation(code) else {
                return Err(TranslateError::malformed(op_id, format!("unknown debug operation {code}")));
            };
            ops.push(dwarf);
            ops.extend(op.ext_args().iter().skip(1).filter_map(|a| a.as_word()).map(u64::from));
        }
        Ok(ops)
    }

    // -- Argument accessors --

    fn arg_node(&mut self, e: &Entity, index: usize) -> Result<Option<MdRef>> {
        match e.ext_arg_id(index) {
            Some(id) => self.debug_node(id),
            None => Ok(None),
        }
    }

    fn arg_scope(&mut self, e: &Entity, index: usize) -> Result<Option<MdRef>> {
        match e.ext_arg_id(index) {
            Some(id) => self.debug_scope(id),
            None => Ok(None),
        }
    }

    fn arg_file(&mut self, e: &Entity, index: usize) -> Option<MdRef> {
        let path = source_path(self.store, e.ext_arg_id(index)?)?;
        Some(self.debug.file(&mut self.module, &path))
    }

    /// Name argument: an `OpString` id or an inline literal.
    fn arg_string(&self, e: &Entity, index: usize) -> String {
        let arg = e.ext_args().get(index);
        if let Some(s) = arg.and_then(|a| a.as_str()) {
            return s.to_string();
        }
        arg.and_then(|a| a.as_id())
            .and_then(|id| self.store.string(id))
            .unwrap_or_default()
            .to_string()
    }

    /// Numeric argument: an integer constant id or an inline literal.
    fn arg_number(&self, e: &Entity, index: usize) -> u64 {
        let Some(arg) = e.ext_args().get(index) else {
            return 0;
        };
        if let Some(c) = arg.as_id().and_then(|id| self.store.get(id)) {
            if c.opcode == Opcode::Constant {
                let words = c.words_from(0);
                let low = u64::from(words.first().copied().unwrap_or(0));
                let high = u64::from(words.get(1).copied().unwrap_or(0));
                return low | (high << 32);
            }
        }
        arg.as_word().map_or(0, u64::from)
    }

    fn pointer_bits(&self) -> u64 {
        u64::from(self.module.layout.pointer_size) * 8
    }

    fn di_size_bits(&self, md: MdRef) -> u64 {
        match self.module.md(md) {
            MdNode::Di(
                DiNode::BasicType { size_bits, .. }
                | DiNode::PointerType { size_bits, .. }
                | DiNode::ArrayType { size_bits, .. }
                | DiNode::VectorType { size_bits, .. }
                | DiNode::EnumType { size_bits, .. }
                | DiNode::CompositeType { size_bits, .. }
                | DiNode::PtrToMember { size_bits, .. },
            ) => *size_bits,
            MdNode::Di(DiNode::Typedef { base: Some(base), .. } | DiNode::QualifiedType { base: Some(base), .. }) => {
                self.di_size_bits(*base)
            }
            _ => 0,
        }
    }
}
