//! Translation context.
//!
//! A `Translator` owns every cache of one module translation: the type and
//! value maps, the function map, the debug-info memo and the state of the
//! function currently being translated. Passes are methods on the context,
//! split over the sibling modules by concern.

use rustc_hash::FxHashMap;
use tracing::{debug, info};

use kiln_ir::builder::Builder;
use kiln_ir::function::{CallConv, FnAttr, ParamAttr};
use kiln_ir::global::Linkage;
use kiln_ir::instruction::Origin;
use kiln_ir::layout::DataLayout;
use kiln_ir::metadata::FlagBehavior;
use kiln_ir::module::Module;
use kiln_ir::value::{BlockRef, FuncRef, GlobalRef, InstRef, MdRef, TypeRef, ValueRef};
use kiln_spirv::{
    function_control, AddressingModel, BuiltIn, Decoration, Entity, EntityStore, FuncParamAttr,
    FunctionDef, Id, LinkageType, Opcode,
};

use crate::alias::AliasMetadata;
use crate::config::TranslatorOptions;
use crate::debuginfo::DebugInfo;
use crate::diag::{Advisory, DiagnosticSink};
use crate::error::{Result, TranslateError};
use crate::features::CapabilityQuery;
use crate::module_md::ModuleMetadata;

/// Lifecycle of one function's translation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Phase {
    Declared,
    BlocksCreated,
    InstructionsTranslated,
    LoopMetadataFinalized,
    Done,
}

/// Stand-in for a value used before its defining instruction is translated.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Placeholder {
    pub global: GlobalRef,
    pub load: InstRef,
}

/// Loop control of an `OpLoopMerge`, materialized once all blocks exist.
#[derive(Debug, Clone)]
pub(crate) struct LoopHint {
    pub header: BlockRef,
    pub control: u32,
    pub params: Vec<u32>,
    pub merge: Id,
}

/// Scratch state of the function being translated.
pub(crate) struct FunctionState {
    pub id: Id,
    pub func: FuncRef,
    pub phase: Phase,
    pub values: FxHashMap<Id, ValueRef>,
    pub placeholders: FxHashMap<Id, Placeholder>,
    pub blocks: FxHashMap<Id, BlockRef>,
    /// Block instructions are appended to.
    pub block: Option<BlockRef>,
    /// Entity whose lowering is in progress.
    pub origin: Option<Id>,
    pub debug_loc: Option<MdRef>,
    /// `i1` value to its zero-extended `i8` form.
    pub promoted: FxHashMap<ValueRef, ValueRef>,
    pub loops: Vec<LoopHint>,
}

impl FunctionState {
    pub(crate) fn new(id: Id, func: FuncRef) -> Self {
        Self {
            id,
            func,
            phase: Phase::Declared,
            values: FxHashMap::default(),
            placeholders: FxHashMap::default(),
            blocks: FxHashMap::default(),
            block: None,
            origin: None,
            debug_loc: None,
            promoted: FxHashMap::default(),
            loops: Vec::new(),
        }
    }
}

/// Result of a successful translation.
#[derive(Debug)]
pub struct Translation {
    pub module: Module,
    pub metadata: ModuleMetadata,
}

pub struct Translator<'a> {
    pub(crate) store: &'a EntityStore,
    pub(crate) options: &'a TranslatorOptions,
    pub(crate) caps: &'a dyn CapabilityQuery,
    sink: &'a mut dyn DiagnosticSink,
    pub(crate) module: Module,
    pub(crate) md: ModuleMetadata,
    pub(crate) types: FxHashMap<Id, TypeRef>,
    /// Module-level values: constants, globals, functions.
    pub(crate) globals: FxHashMap<Id, ValueRef>,
    pub(crate) funcs: FxHashMap<Id, FuncRef>,
    pub(crate) debug: DebugInfo,
    pub(crate) alias: AliasMetadata,
    pub(crate) builtin_vars: Vec<(GlobalRef, BuiltIn)>,
    pub(crate) fs: Option<FunctionState>,
}

impl<'a> Translator<'a> {
    pub fn new(
        store: &'a EntityStore,
        options: &'a TranslatorOptions,
        caps: &'a dyn CapabilityQuery,
        sink: &'a mut dyn DiagnosticSink,
    ) -> Self {
        Self {
            store,
            options,
            caps,
            sink,
            module: Module::new(options.module_name.clone()),
            md: ModuleMetadata::default(),
            types: FxHashMap::default(),
            globals: FxHashMap::default(),
            funcs: FxHashMap::default(),
            debug: DebugInfo::new(store.has_debug_info()),
            alias: AliasMetadata::default(),
            builtin_vars: Vec::new(),
            fs: None,
        }
    }

    /// Translate the whole store.
    pub fn run(mut self) -> Result<Translation> {
        self.set_target();
        self.translate_compile_unit()?;

        let store = self.store;
        for def in &store.functions {
            self.declare_function(def)?;
        }
        self.translate_subprograms()?;
        for &var in &store.global_vars {
            self.translate_value_noop(var)?;
        }
        for def in &store.functions {
            if !def.is_declaration() {
                self.translate_function(def)?;
            }
        }
        self.finalize()?;

        if self.options.verify {
            let result = self.module.verify();
            if !result.is_ok() {
                return Err(TranslateError::Verification(result.to_string()));
            }
        }
        if let Some(path) = &self.options.dump_path {
            std::fs::write(path, self.module.to_string()).map_err(|source| TranslateError::Io {
                path: path.clone(),
                source,
            })?;
        }
        info!(
            module = %self.module.name,
            functions = self.module.functions.len(),
            globals = self.module.live_globals().count(),
            kernels = self.md.kernels().count(),
            "translated module"
        );
        Ok(Translation {
            module: self.module,
            metadata: self.md,
        })
    }

    fn set_target(&mut self) {
        match self.store.addressing_model {
            AddressingModel::Physical32 => {
                self.module.triple = Some("spir-unknown-unknown".to_string());
                self.module.layout = DataLayout::new(4);
            }
            AddressingModel::Physical64 => {
                self.module.triple = Some("spir64-unknown-unknown".to_string());
                self.module.layout = DataLayout::new(8);
            }
            AddressingModel::Logical => {}
        }
    }

    fn translate_compile_unit(&mut self) -> Result<()> {
        if self.debug.translate_compile_unit(self.store, &mut self.module)?.is_some() {
            self.module
                .add_module_flag(FlagBehavior::Warning, "Dwarf Version", 4);
            self.module
                .add_module_flag(FlagBehavior::Warning, "Debug Info Version", 3);
        }
        Ok(())
    }

    /// Module-level passes that need every function body.
    fn finalize(&mut self) -> Result<()> {
        debug!("finalizing module");
        self.emit_kernel_metadata()?;
        self.emit_fp_contract();
        self.emit_source_language();
        self.emit_extensions();
        self.lower_builtin_variables()?;
        self.legalize_abi()?;
        self.translate_debug_globals()
    }

    // -- Lookup helpers --

    pub(crate) fn entity(&self, id: Id) -> Result<&'a Entity> {
        let store: &'a EntityStore = self.store;
        store.get(id).ok_or(TranslateError::MissingEntity(id))
    }

    /// Operand `index` of `e` as an id, or a malformed-record error.
    pub(crate) fn operand_id(&self, e: &Entity, index: usize) -> Result<Id> {
        e.id_at(index)
            .ok_or_else(|| TranslateError::malformed(e.id, format!("missing id operand {index}")))
    }

    pub(crate) fn operand_word(&self, e: &Entity, index: usize) -> Result<u32> {
        e.word_at(index)
            .ok_or_else(|| TranslateError::malformed(e.id, format!("missing literal operand {index}")))
    }

    /// Result type id of `e`.
    pub(crate) fn result_type(&self, e: &Entity) -> Result<Id> {
        e.ty.ok_or_else(|| TranslateError::malformed(e.id, "missing result type"))
    }

    pub(crate) fn state(&self, id: Id) -> Result<&FunctionState> {
        self.fs.as_ref().ok_or(TranslateError::OutsideFunction(id))
    }

    pub(crate) fn state_mut(&mut self, id: Id) -> Result<&mut FunctionState> {
        self.fs.as_mut().ok_or(TranslateError::OutsideFunction(id))
    }

    pub(crate) fn block_ref(&self, label: Id) -> Result<BlockRef> {
        self.state(label)?
            .blocks
            .get(&label)
            .copied()
            .ok_or(TranslateError::MissingEntity(label))
    }

    pub(crate) fn func_ref(&self, id: Id) -> Result<FuncRef> {
        self.funcs
            .get(&id)
            .copied()
            .ok_or(TranslateError::MissingEntity(id))
    }

    /// Type of a translated value. Local values need a function in progress.
    pub(crate) fn type_of(&self, v: ValueRef) -> Result<TypeRef> {
        match (v, &self.fs) {
            (ValueRef::Inst(_) | ValueRef::Arg(_), Some(fs)) => Ok(self.module.value_type(fs.func, v)),
            (ValueRef::Inst(_) | ValueRef::Arg(_), None) => Err(TranslateError::OutsideFunction(Id(0))),
            (ValueRef::Const(c), _) => Ok(self.module.constant(c).ty),
            (ValueRef::Global(g), _) => Ok(self.module.global(g).ptr_ty),
            (ValueRef::Func(f), _) => Ok(self.module.function(f).ptr_ty),
        }
    }

    /// Builder positioned at the end of the current block, tagged with the
    /// entity being lowered and its debug location.
    pub(crate) fn builder(&mut self, id: Id) -> Result<Builder<'_>> {
        let fs = self.fs.as_ref().ok_or(TranslateError::OutsideFunction(id))?;
        let (func, block, origin, loc) = (fs.func, fs.block, fs.origin, fs.debug_loc);
        let block = block.ok_or(TranslateError::OutsideFunction(id))?;
        let mut b = Builder::new(&mut self.module, func);
        b.switch_to_block(block);
        b.set_origin(origin.map_or_else(Origin::synthetic, |o| Origin::from_source(o.0)));
        b.set_debug_loc(loc);
        Ok(b)
    }

    /// Report a non-fatal finding.
    pub(crate) fn advise(&mut self, entity: Option<Id>, message: impl Into<String>) {
        let message = message.into();
        tracing::warn!(entity = entity.map(|e| e.0), "{message}");
        self.sink.advise(Advisory {
            entity: entity.map(|e| e.0),
            message,
        });
    }

    // -- Functions --

    fn function_name(&self, id: Id) -> String {
        if let Some(ep) = self.store.entry_point(id) {
            return ep.name.clone();
        }
        if let Some(name) = self.linkage_name(id) {
            return name.to_string();
        }
        match self.store.name(id) {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => format!("func.{}", id.0),
        }
    }

    pub(crate) fn linkage_name(&self, id: Id) -> Option<&'a str> {
        let store: &'a EntityStore = self.store;
        store
            .decoration(id, Decoration::LinkageAttributes)?
            .args
            .first()?
            .as_str()
    }

    /// Linkage of a function or variable; `defined` is whether it has a
    /// body or initializer.
    pub(crate) fn linkage_of(&self, id: Id, defined: bool) -> Linkage {
        let kind = self
            .store
            .decoration(id, Decoration::LinkageAttributes)
            .and_then(|d| d.args.get(1))
            .and_then(|a| a.as_word())
            .and_then(LinkageType::from_word);
        match kind {
            None if defined => Linkage::Internal,
            None => Linkage::External,
            Some(LinkageType::Import) if defined => Linkage::AvailableExternally,
            Some(LinkageType::Import) => Linkage::External,
            Some(LinkageType::Export) => Linkage::External,
        }
    }

    pub(crate) fn declare_function(&mut self, def: &'a FunctionDef) -> Result<FuncRef> {
        if let Some(&f) = self.funcs.get(&def.id) {
            return Ok(f);
        }
        let e = self.entity(def.id)?;
        let control = e.word_at(0).unwrap_or(0);
        let fn_ty = self.translate_type(self.operand_id(e, 1)?)?;
        let arity = self.module.types.signature(fn_ty).map(|(_, p, _)| p.len());
        if arity != Some(def.params.len()) {
            return Err(TranslateError::malformed(
                def.id,
                "parameter count does not match the function type",
            ));
        }

        let name = self.function_name(def.id);
        let is_kernel = self.store.is_kernel(def.id);
        let linkage = if is_kernel {
            Linkage::External
        } else {
            self.linkage_of(def.id, !def.is_declaration())
        };
        let f = self.module.add_function(&name, fn_ty);
        let store = self.store;
        let func = self.module.function_mut(f);
        func.linkage = linkage;
        func.call_conv = if is_kernel {
            CallConv::SpirKernel
        } else {
            CallConv::SpirFunc
        };
        func.add_attr(FnAttr::NoUnwind);
        for (bit, attr) in [
            (function_control::INLINE, FnAttr::AlwaysInline),
            (function_control::DONT_INLINE, FnAttr::NoInline),
            (function_control::PURE, FnAttr::ReadOnly),
            (function_control::CONST, FnAttr::ReadNone),
        ] {
            if control & bit != 0 {
                func.add_attr(attr);
            }
        }
        if store.has_decoration(def.id, Decoration::ReferencedIndirectlyINTEL) {
            func.add_attr(FnAttr::ReferencedIndirectly);
        }
        for (param, &id) in func.params.iter_mut().zip(&def.params) {
            param.name = store.name(id).map(str::to_string);
            for word in store.decoration_words(id, Decoration::FuncParamAttr) {
                if let Some(attr) = FuncParamAttr::from_word(word).map(param_attr) {
                    if !param.attrs.contains(&attr) {
                        param.attrs.push(attr);
                    }
                }
            }
        }
        debug!(function = %name, kernel = is_kernel, "declared function");
        self.funcs.insert(def.id, f);
        self.globals.insert(def.id, ValueRef::Func(f));
        Ok(f)
    }

    fn translate_function(&mut self, def: &'a FunctionDef) -> Result<()> {
        let func = self.func_ref(def.id)?;
        let name = self.module.function(func).name.clone();
        debug!(function = %name, blocks = def.blocks.len(), "translating function body");

        let mut state = FunctionState::new(def.id, func);
        for (i, &param) in def.params.iter().enumerate() {
            state.values.insert(param, ValueRef::Arg(i as u32));
        }
        for block in &def.blocks {
            let label = self.store.name(block.label).map(str::to_string);
            let b = self.module.function_mut(func).add_block(label);
            state.blocks.insert(block.label, b);
        }
        state.phase = Phase::BlocksCreated;
        self.fs = Some(state);

        for block in &def.blocks {
            let b = self.block_ref(block.label)?;
            self.state_mut(def.id)?.block = Some(b);
            for &inst in &block.insts {
                if self.is_translated(inst) {
                    continue;
                }
                let e = self.entity(inst)?;
                self.translate_instruction(e)?;
            }
        }
        self.state_mut(def.id)?.phase = Phase::InstructionsTranslated;

        self.finalize_loop_metadata()?;
        self.state_mut(def.id)?.phase = Phase::LoopMetadataFinalized;

        let mut state = self.fs.take().ok_or(TranslateError::OutsideFunction(def.id))?;
        if let Some(&id) = state.placeholders.keys().min() {
            return Err(TranslateError::UnresolvedPlaceholder { id, function: name });
        }
        state.phase = Phase::Done;
        debug!(function = %name, phase = ?state.phase, "function translated");
        Ok(())
    }

    /// Whether `id` already has a real (non-placeholder) value in the
    /// current function.
    pub(crate) fn is_translated(&self, id: Id) -> bool {
        match &self.fs {
            Some(fs) => fs.values.contains_key(&id) && !fs.placeholders.contains_key(&id),
            None => false,
        }
    }

    /// Whether `id` names an instruction of a function body.
    pub(crate) fn is_instruction(&self, e: &Entity) -> bool {
        !matches!(
            e.opcode,
            Opcode::Variable | Opcode::Function | Opcode::FunctionParameter | Opcode::Label
        ) && !e.opcode.is_constant()
            && !e.opcode.is_type()
            && e.opcode != Opcode::Undef
    }
}

fn param_attr(attr: FuncParamAttr) -> ParamAttr {
    match attr {
        FuncParamAttr::Zext => ParamAttr::ZExt,
        FuncParamAttr::Sext => ParamAttr::SExt,
        FuncParamAttr::ByVal => ParamAttr::ByVal,
        FuncParamAttr::Sret => ParamAttr::StructRet,
        FuncParamAttr::NoAlias => ParamAttr::NoAlias,
        FuncParamAttr::NoCapture => ParamAttr::NoCapture,
        FuncParamAttr::NoWrite => ParamAttr::ReadOnly,
        FuncParamAttr::NoReadWrite => ParamAttr::ReadNone,
    }
}
