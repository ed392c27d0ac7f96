//! The entity store: every record of one module, indexed by id, plus the
//! module-level sections split out by the decoder.

use rustc_hash::FxHashMap;

use crate::entity::{Entity, Id, Operand};
use crate::enums::{
    AddressingModel, Capability, Decoration, ExecutionMode, ExecutionModel, ExtInstSet,
    SourceLanguage,
};
use crate::opcode::Opcode;

/// One `OpEntryPoint`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryPoint {
    pub model: ExecutionModel,
    pub func: Id,
    pub name: String,
    pub interface: Vec<Id>,
}

/// One decoration applied to an id. Arguments keep their literal layout,
/// e.g. `LinkageAttributes` carries the name string and the linkage type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecorationEntry {
    pub decoration: Decoration,
    pub args: Vec<Operand>,
}

impl DecorationEntry {
    /// First argument as a word.
    pub fn word(&self) -> Option<u32> {
        self.args.first()?.as_word()
    }
}

/// A basic block: its label and instruction ids in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockDef {
    pub label: Id,
    pub insts: Vec<Id>,
}

/// A function definition or declaration (no blocks).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionDef {
    /// The `OpFunction` record.
    pub id: Id,
    pub params: Vec<Id>,
    pub blocks: Vec<BlockDef>,
}

impl FunctionDef {
    pub fn is_declaration(&self) -> bool {
        self.blocks.is_empty()
    }
}

/// Immutable, id-addressed view of a parsed module.
#[derive(Debug, Clone)]
pub struct EntityStore {
    pub(crate) entities: FxHashMap<Id, Entity>,
    pub(crate) decorations: FxHashMap<Id, Vec<DecorationEntry>>,
    pub(crate) names: FxHashMap<Id, String>,
    /// One past the largest id in use.
    pub bound: u32,
    pub addressing_model: AddressingModel,
    pub memory_model: u32,
    pub source_language: SourceLanguage,
    pub source_version: u32,
    pub capabilities: Vec<Capability>,
    pub extensions: Vec<String>,
    pub ext_inst_imports: FxHashMap<Id, ExtInstSet>,
    pub entry_points: Vec<EntryPoint>,
    pub execution_modes: FxHashMap<Id, Vec<(ExecutionMode, Vec<u32>)>>,
    /// `OpString` records in module order.
    pub strings: Vec<Id>,
    /// Types and constants in module order.
    pub types_and_constants: Vec<Id>,
    /// Module-scope `OpVariable`s in order.
    pub global_vars: Vec<Id>,
    pub functions: Vec<FunctionDef>,
    /// The `DebugCompilationUnit` record, if any.
    pub compile_unit: Option<Id>,
    /// `DebugGlobalVariable` records in order.
    pub debug_globals: Vec<Id>,
    /// Every module-level debug record in order.
    pub debug_records: Vec<Id>,
}

impl Default for EntityStore {
    fn default() -> Self {
        Self {
            entities: FxHashMap::default(),
            decorations: FxHashMap::default(),
            names: FxHashMap::default(),
            bound: 1,
            addressing_model: AddressingModel::Physical64,
            memory_model: 2,
            source_language: SourceLanguage::Unknown,
            source_version: 0,
            capabilities: Vec::new(),
            extensions: Vec::new(),
            ext_inst_imports: FxHashMap::default(),
            entry_points: Vec::new(),
            execution_modes: FxHashMap::default(),
            strings: Vec::new(),
            types_and_constants: Vec::new(),
            global_vars: Vec::new(),
            functions: Vec::new(),
            compile_unit: None,
            debug_globals: Vec::new(),
            debug_records: Vec::new(),
        }
    }
}

impl EntityStore {
    pub fn get(&self, id: Id) -> Option<&Entity> {
        self.entities.get(&id)
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn opcode(&self, id: Id) -> Option<Opcode> {
        self.get(id).map(|e| e.opcode)
    }

    /// Name given by `OpName`.
    pub fn name(&self, id: Id) -> Option<&str> {
        self.names.get(&id).map(String::as_str)
    }

    /// Literal of an `OpString`.
    pub fn string(&self, id: Id) -> Option<&str> {
        let e = self.get(id)?;
        match e.opcode {
            Opcode::String => e.str_at(0),
            _ => None,
        }
    }

    /// First `OpString` whose literal starts with `prefix`.
    pub fn find_string(&self, prefix: &str) -> Option<&str> {
        self.strings
            .iter()
            .filter_map(|&id| self.string(id))
            .find(|s| s.starts_with(prefix))
    }

    // -- Decorations --

    pub fn decorations(&self, id: Id) -> &[DecorationEntry] {
        self.decorations.get(&id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn decoration(&self, id: Id, decoration: Decoration) -> Option<&DecorationEntry> {
        self.decorations(id)
            .iter()
            .find(|d| d.decoration == decoration)
    }

    pub fn has_decoration(&self, id: Id, decoration: Decoration) -> bool {
        self.decoration(id, decoration).is_some()
    }

    /// First word argument of a decoration.
    pub fn decoration_word(&self, id: Id, decoration: Decoration) -> Option<u32> {
        self.decoration(id, decoration)?.word()
    }

    /// First word argument of every occurrence of a decoration.
    pub fn decoration_words(&self, id: Id, decoration: Decoration) -> Vec<u32> {
        self.decorations(id)
            .iter()
            .filter(|d| d.decoration == decoration)
            .filter_map(DecorationEntry::word)
            .collect()
    }

    // -- Entry points and functions --

    pub fn entry_point(&self, func: Id) -> Option<&EntryPoint> {
        self.entry_points.iter().find(|ep| ep.func == func)
    }

    /// Whether `func` is a kernel entry point.
    pub fn is_kernel(&self, func: Id) -> bool {
        self.entry_point(func)
            .is_some_and(|ep| ep.model == ExecutionModel::Kernel)
    }

    pub fn execution_modes(&self, func: Id) -> &[(ExecutionMode, Vec<u32>)] {
        self.execution_modes
            .get(&func)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Parameters of an execution mode of `func`.
    pub fn execution_mode(&self, func: Id, mode: ExecutionMode) -> Option<&[u32]> {
        self.execution_modes(func)
            .iter()
            .find(|(m, _)| *m == mode)
            .map(|(_, params)| params.as_slice())
    }

    pub fn function(&self, id: Id) -> Option<&FunctionDef> {
        self.functions.iter().find(|f| f.id == id)
    }

    // -- Module info --

    /// Extended instruction set behind an `OpExtInstImport` id.
    pub fn ext_set(&self, import: Id) -> Option<ExtInstSet> {
        self.ext_inst_imports.get(&import).copied()
    }

    /// Extended instruction set of an `OpExtInst` record.
    pub fn ext_set_of(&self, entity: &Entity) -> Option<ExtInstSet> {
        self.ext_set(entity.ext_set()?)
    }

    pub fn has_capability(&self, cap: Capability) -> bool {
        self.capabilities.contains(&cap)
    }

    pub fn has_debug_info(&self) -> bool {
        self.compile_unit.is_some()
    }
}
