//! Incremental construction of an [`EntityStore`].
//!
//! Ids are handed out in creation order. Forward references go through
//! [`StoreBuilder::reserve_id`] followed by one of the `*_with_id` methods.
//! Non-aggregate types are deduplicated so asking twice for `int 32` gives
//! the same id.

use rustc_hash::FxHashMap;

use crate::debug::DebugOp;
use crate::entity::{Entity, Id, LineInfo, Operand};
use crate::enums::{
    AccessQualifier, AddressingModel, Capability, Decoration, ExecutionMode, ExecutionModel,
    ExtInstSet, ImageDescriptor, SourceLanguage, StorageClass,
};
use crate::opcode::Opcode;
use crate::store::{BlockDef, DecorationEntry, EntityStore, EntryPoint, FunctionDef};

pub struct StoreBuilder {
    store: EntityStore,
    next_id: u32,
    type_cache: FxHashMap<(Opcode, Vec<Operand>), Id>,
    current_fn: Option<FunctionDef>,
    line: Option<LineInfo>,
    scope: Option<Id>,
}

impl Default for StoreBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl StoreBuilder {
    /// Empty OpenCL C 2.0 module with 64-bit physical addressing.
    pub fn new() -> Self {
        let store = EntityStore {
            source_language: SourceLanguage::OpenClC,
            source_version: 200_000,
            ..EntityStore::default()
        };
        Self {
            store,
            next_id: 1,
            type_cache: FxHashMap::default(),
            current_fn: None,
            line: None,
            scope: None,
        }
    }

    /// Allocate an id without defining it.
    pub fn reserve_id(&mut self) -> Id {
        let id = Id(self.next_id);
        self.next_id += 1;
        id
    }

    /// Define a record under a reserved id.
    pub fn define(&mut self, id: Id, opcode: Opcode, ty: Option<Id>, operands: Vec<Operand>) -> Id {
        let mut entity = Entity::new(id, opcode, ty, operands);
        if self.current_fn.is_some() {
            entity.line = self.line;
            entity.scope = self.scope;
        }
        self.store.entities.insert(id, entity);
        id
    }

    fn module_record(&mut self, opcode: Opcode, ty: Option<Id>, operands: Vec<Operand>) -> Id {
        let id = self.reserve_id();
        self.define(id, opcode, ty, operands)
    }

    fn type_record(&mut self, opcode: Opcode, operands: Vec<Operand>) -> Id {
        let key = (opcode, operands);
        if let Some(&id) = self.type_cache.get(&key) {
            return id;
        }
        let id = self.module_record(opcode, None, key.1.clone());
        self.store.types_and_constants.push(id);
        self.type_cache.insert(key, id);
        id
    }

    fn constant_record(&mut self, opcode: Opcode, ty: Id, operands: Vec<Operand>) -> Id {
        let id = self.module_record(opcode, Some(ty), operands);
        self.store.types_and_constants.push(id);
        id
    }

    // -- Module sections --

    pub fn capability(&mut self, cap: Capability) -> &mut Self {
        if !self.store.capabilities.contains(&cap) {
            self.store.capabilities.push(cap);
        }
        self
    }

    pub fn extension(&mut self, name: &str) -> &mut Self {
        self.store.extensions.push(name.to_string());
        self
    }

    pub fn source(&mut self, language: SourceLanguage, version: u32) -> &mut Self {
        self.store.source_language = language;
        self.store.source_version = version;
        self
    }

    pub fn addressing_model(&mut self, model: AddressingModel) -> &mut Self {
        self.store.addressing_model = model;
        self
    }

    pub fn ext_inst_import(&mut self, set: ExtInstSet) -> Id {
        let id = self.module_record(Opcode::ExtInstImport, None, vec![set.name().into()]);
        self.store.ext_inst_imports.insert(id, set);
        id
    }

    pub fn entry_point(&mut self, model: ExecutionModel, func: Id, name: &str) -> &mut Self {
        self.store.entry_points.push(EntryPoint {
            model,
            func,
            name: name.to_string(),
            interface: Vec::new(),
        });
        self
    }

    pub fn execution_mode(&mut self, func: Id, mode: ExecutionMode, params: Vec<u32>) -> &mut Self {
        self.store
            .execution_modes
            .entry(func)
            .or_default()
            .push((mode, params));
        self
    }

    pub fn decorate(&mut self, id: Id, decoration: Decoration, args: Vec<Operand>) -> &mut Self {
        self.store
            .decorations
            .entry(id)
            .or_default()
            .push(DecorationEntry { decoration, args });
        self
    }

    pub fn name(&mut self, id: Id, name: &str) -> &mut Self {
        self.store.names.insert(id, name.to_string());
        self
    }

    pub fn string(&mut self, literal: &str) -> Id {
        let id = self.module_record(Opcode::String, None, vec![literal.into()]);
        self.store.strings.push(id);
        id
    }

    // -- Types --

    pub fn type_void(&mut self) -> Id {
        self.type_record(Opcode::TypeVoid, Vec::new())
    }

    pub fn type_bool(&mut self) -> Id {
        self.type_record(Opcode::TypeBool, Vec::new())
    }

    pub fn type_int(&mut self, width: u32) -> Id {
        self.type_record(Opcode::TypeInt, vec![width.into(), 0u32.into()])
    }

    pub fn type_float(&mut self, width: u32) -> Id {
        self.type_record(Opcode::TypeFloat, vec![width.into()])
    }

    pub fn type_vector(&mut self, elem: Id, count: u32) -> Id {
        self.type_record(Opcode::TypeVector, vec![elem.into(), count.into()])
    }

    /// Array whose length is an `i32` constant.
    pub fn type_array(&mut self, elem: Id, len: u32) -> Id {
        let i32_ty = self.type_int(32);
        let len = self.constant_u32(i32_ty, len);
        self.type_record(Opcode::TypeArray, vec![elem.into(), len.into()])
    }

    pub fn type_pointer(&mut self, storage: StorageClass, pointee: Id) -> Id {
        self.type_record(Opcode::TypePointer, vec![storage.word().into(), pointee.into()])
    }

    /// Pointer under a reserved id, for recursive types.
    pub fn type_pointer_with_id(&mut self, id: Id, storage: StorageClass, pointee: Id) -> Id {
        self.store.types_and_constants.push(id);
        self.define(
            id,
            Opcode::TypePointer,
            None,
            vec![storage.word().into(), pointee.into()],
        )
    }

    pub fn type_function(&mut self, ret: Id, params: &[Id]) -> Id {
        let mut operands = vec![Operand::Id(ret)];
        operands.extend(params.iter().map(|&p| Operand::Id(p)));
        self.type_record(Opcode::TypeFunction, operands)
    }

    /// Structs are nominal: every call makes a new type.
    pub fn type_struct(&mut self, members: &[Id]) -> Id {
        let id = self.reserve_id();
        self.type_struct_with_id(id, members)
    }

    pub fn type_struct_with_id(&mut self, id: Id, members: &[Id]) -> Id {
        self.store.types_and_constants.push(id);
        let operands = members.iter().map(|&m| Operand::Id(m)).collect();
        self.define(id, Opcode::TypeStruct, None, operands)
    }

    pub fn type_opaque(&mut self, name: &str) -> Id {
        let id = self.module_record(Opcode::TypeOpaque, None, vec![name.into()]);
        self.store.types_and_constants.push(id);
        id
    }

    pub fn type_image(&mut self, desc: ImageDescriptor, access: AccessQualifier) -> Id {
        let void = self.type_void();
        self.type_record(
            Opcode::TypeImage,
            vec![
                void.into(),
                desc.dim.word().into(),
                desc.depth.into(),
                u32::from(desc.arrayed).into(),
                u32::from(desc.multisampled).into(),
                desc.sampled.into(),
                desc.format.into(),
                access.word().into(),
            ],
        )
    }

    pub fn type_sampler(&mut self) -> Id {
        self.type_record(Opcode::TypeSampler, Vec::new())
    }

    pub fn type_sampled_image(&mut self, image: Id) -> Id {
        self.type_record(Opcode::TypeSampledImage, vec![image.into()])
    }

    pub fn type_pipe(&mut self, access: AccessQualifier) -> Id {
        self.type_record(Opcode::TypePipe, vec![access.word().into()])
    }

    pub fn type_pipe_storage(&mut self) -> Id {
        self.type_record(Opcode::TypePipeStorage, Vec::new())
    }

    pub fn type_event(&mut self) -> Id {
        self.type_record(Opcode::TypeEvent, Vec::new())
    }

    pub fn type_device_event(&mut self) -> Id {
        self.type_record(Opcode::TypeDeviceEvent, Vec::new())
    }

    pub fn type_reserve_id(&mut self) -> Id {
        self.type_record(Opcode::TypeReserveId, Vec::new())
    }

    pub fn type_queue(&mut self) -> Id {
        self.type_record(Opcode::TypeQueue, Vec::new())
    }

    pub fn type_named_barrier(&mut self) -> Id {
        self.type_record(Opcode::TypeNamedBarrier, Vec::new())
    }

    // -- Constants --

    pub fn constant_bool(&mut self, ty: Id, value: bool) -> Id {
        let opcode = if value {
            Opcode::ConstantTrue
        } else {
            Opcode::ConstantFalse
        };
        self.constant_record(opcode, ty, Vec::new())
    }

    /// Scalar constant from its literal words, low word first.
    pub fn constant(&mut self, ty: Id, words: &[u32]) -> Id {
        let operands = words.iter().map(|&w| Operand::Literal(w)).collect();
        self.constant_record(Opcode::Constant, ty, operands)
    }

    pub fn constant_u32(&mut self, ty: Id, value: u32) -> Id {
        self.constant(ty, &[value])
    }

    pub fn constant_u64(&mut self, ty: Id, value: u64) -> Id {
        self.constant(ty, &[value as u32, (value >> 32) as u32])
    }

    pub fn constant_f32(&mut self, ty: Id, value: f32) -> Id {
        self.constant(ty, &[value.to_bits()])
    }

    pub fn constant_null(&mut self, ty: Id) -> Id {
        self.constant_record(Opcode::ConstantNull, ty, Vec::new())
    }

    pub fn undef(&mut self, ty: Id) -> Id {
        self.constant_record(Opcode::Undef, ty, Vec::new())
    }

    pub fn constant_composite(&mut self, ty: Id, parts: &[Id]) -> Id {
        let operands = parts.iter().map(|&p| Operand::Id(p)).collect();
        self.constant_record(Opcode::ConstantComposite, ty, operands)
    }

    pub fn spec_constant(&mut self, ty: Id, words: &[u32]) -> Id {
        let operands = words.iter().map(|&w| Operand::Literal(w)).collect();
        self.constant_record(Opcode::SpecConstant, ty, operands)
    }

    pub fn spec_constant_bool(&mut self, ty: Id, value: bool) -> Id {
        let opcode = if value {
            Opcode::SpecConstantTrue
        } else {
            Opcode::SpecConstantFalse
        };
        self.constant_record(opcode, ty, Vec::new())
    }

    /// `OpSpecConstantOp` wrapping `op` over constant operands.
    pub fn spec_constant_op(&mut self, ty: Id, op: Opcode, operands: &[Operand]) -> Id {
        let mut all = vec![Operand::Literal(op.word())];
        all.extend(operands.iter().cloned());
        self.constant_record(Opcode::SpecConstantOp, ty, all)
    }

    pub fn constant_sampler(&mut self, ty: Id, addressing: u32, normalized: bool, filter: u32) -> Id {
        self.constant_record(
            Opcode::ConstantSampler,
            ty,
            vec![addressing.into(), u32::from(normalized).into(), filter.into()],
        )
    }

    pub fn constant_pipe_storage(&mut self, ty: Id, packet_size: u32, packet_align: u32, capacity: u32) -> Id {
        self.constant_record(
            Opcode::ConstantPipeStorage,
            ty,
            vec![packet_size.into(), packet_align.into(), capacity.into()],
        )
    }

    // -- Variables --

    /// Module-scope variable of pointer type `ptr_ty`.
    pub fn global_variable(&mut self, ptr_ty: Id, storage: StorageClass, init: Option<Id>) -> Id {
        let mut operands = vec![Operand::Literal(storage.word())];
        operands.extend(init.map(Operand::Id));
        let id = self.module_record(Opcode::Variable, Some(ptr_ty), operands);
        self.store.global_vars.push(id);
        id
    }

    // -- Extended instructions --

    /// Module-level extended instruction, e.g. a debug type record.
    pub fn ext_record(&mut self, set: Id, op: u32, args: Vec<Operand>) -> Id {
        let void = self.type_void();
        let mut operands = vec![Operand::Id(set), Operand::Literal(op)];
        operands.extend(args);
        let id = self.module_record(Opcode::ExtInst, Some(void), operands);
        if let Some(ExtInstSet::DebugInfo | ExtInstSet::OpenClDebugInfo100) = self.store.ext_set(set) {
            self.store.debug_records.push(id);
            match DebugOp::from_word(op) {
                Some(DebugOp::CompilationUnit) => self.store.compile_unit = Some(id),
                Some(DebugOp::GlobalVariable) => self.store.debug_globals.push(id),
                _ => {}
            }
        }
        id
    }

    /// Debug record of the given kind.
    pub fn debug_record(&mut self, set: Id, op: DebugOp, args: Vec<Operand>) -> Id {
        self.ext_record(set, op.word(), args)
    }

    // -- Functions --

    /// Open a function. `control` is the function-control mask.
    pub fn begin_function(&mut self, fn_ty: Id, control: u32) -> Id {
        let id = self.reserve_id();
        self.begin_function_with_id(id, fn_ty, control)
    }

    pub fn begin_function_with_id(&mut self, id: Id, fn_ty: Id, control: u32) -> Id {
        let ret = self
            .store
            .get(fn_ty)
            .and_then(|e| e.id_at(0))
            .unwrap_or(fn_ty);
        self.define(id, Opcode::Function, Some(ret), vec![control.into(), fn_ty.into()]);
        self.current_fn = Some(FunctionDef {
            id,
            params: Vec::new(),
            blocks: Vec::new(),
        });
        id
    }

    pub fn param(&mut self, ty: Id) -> Id {
        let id = self.reserve_id();
        self.define(id, Opcode::FunctionParameter, Some(ty), Vec::new());
        if let Some(f) = self.current_fn.as_mut() {
            f.params.push(id);
        }
        id
    }

    /// Start a new block with a fresh label.
    pub fn block(&mut self) -> Id {
        let id = self.reserve_id();
        self.block_with_id(id)
    }

    pub fn block_with_id(&mut self, label: Id) -> Id {
        self.define(label, Opcode::Label, None, Vec::new());
        if let Some(f) = self.current_fn.as_mut() {
            f.blocks.push(BlockDef {
                label,
                insts: Vec::new(),
            });
        }
        label
    }

    /// Append an instruction to the current block.
    pub fn inst(&mut self, opcode: Opcode, ty: Option<Id>, operands: Vec<Operand>) -> Id {
        let id = self.reserve_id();
        self.inst_with_id(id, opcode, ty, operands)
    }

    pub fn inst_with_id(&mut self, id: Id, opcode: Opcode, ty: Option<Id>, operands: Vec<Operand>) -> Id {
        self.define(id, opcode, ty, operands);
        if let Some(block) = self.current_fn.as_mut().and_then(|f| f.blocks.last_mut()) {
            block.insts.push(id);
        }
        id
    }

    /// Extended instruction inside the current block.
    pub fn ext_inst(&mut self, ty: Id, set: Id, op: u32, args: Vec<Operand>) -> Id {
        let mut operands = vec![Operand::Id(set), Operand::Literal(op)];
        operands.extend(args);
        self.inst(Opcode::ExtInst, Some(ty), operands)
    }

    /// Source position attached to following instructions.
    pub fn line(&mut self, file: Id, line: u32, column: u32) -> &mut Self {
        self.line = Some(LineInfo { file, line, column });
        self
    }

    pub fn no_line(&mut self) -> &mut Self {
        self.line = None;
        self
    }

    /// `DebugScope` record in effect for following instructions.
    pub fn debug_scope(&mut self, scope: Option<Id>) -> &mut Self {
        self.scope = scope;
        self
    }

    pub fn end_function(&mut self) {
        if let Some(f) = self.current_fn.take() {
            self.store.functions.push(f);
        }
        self.line = None;
        self.scope = None;
    }

    pub fn finish(mut self) -> EntityStore {
        self.end_function();
        self.store.bound = self.next_id;
        self.store
    }
}
