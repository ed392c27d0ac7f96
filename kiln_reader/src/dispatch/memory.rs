//! Loads, stores, copies and address computation.

use kiln_ir::constant::ConstKind;
use kiln_ir::instruction::{CastOp, MemFlags};
use kiln_ir::value::{ConstRef, TypeRef, ValueRef};
use kiln_spirv::{memory_access, Decoration, Entity, Id, Opcode};

use crate::error::{Result, TranslateError};
use crate::features::TargetFeature;
use crate::translator::Translator;
use crate::values::BoolMode;

impl<'a> Translator<'a> {
    pub(super) fn translate_memory(&mut self, e: &'a Entity) -> Result<Option<ValueRef>> {
        match e.opcode {
            Opcode::Load => {
                let ptr_id = self.operand_id(e, 0)?;
                let ty = self.translate_type(self.result_type(e)?)?;
                let ptr = self.value(ptr_id, BoolMode::Noop)?;
                let flags = self.mem_flags(e, ptr_id, 1);
                let v = self.builder(e.id)?.load(ty, ptr, flags, None);
                if let ValueRef::Inst(inst) = v {
                    self.attach_alias_metadata(e.id, inst)?;
                }
                Ok(Some(v))
            }
            Opcode::Store => {
                self.translate_store(e)?;
                Ok(None)
            }
            Opcode::CopyMemory => {
                let dst = self.value(self.operand_id(e, 0)?, BoolMode::Noop)?;
                let src = self.value(self.operand_id(e, 1)?, BoolMode::Noop)?;
                let pointee = self.pointee_of(e.id, dst)?;
                let size = self.alloc_size(pointee);
                let size = ValueRef::Const(self.module.const_i64(size as i64));
                let flags = self.mem_flags(e, self.operand_id(e, 0)?, 2);
                let inst = self
                    .builder(e.id)?
                    .memcpy(dst, src, size, flags.align, flags.volatile);
                self.attach_alias_metadata(e.id, inst)?;
                Ok(None)
            }
            Opcode::CopyMemorySized => {
                let dst = self.value(self.operand_id(e, 0)?, BoolMode::Noop)?;
                let src_id = self.operand_id(e, 1)?;
                let size = self.value(self.operand_id(e, 2)?, BoolMode::Noop)?;
                let flags = self.mem_flags(e, self.operand_id(e, 0)?, 3);
                let inst = if self.is_zero_source(src_id)
                    && self.caps.supports(TargetFeature::MemSetIntrinsic)
                {
                    let i8_ty = self.module.types.int(8);
                    let zero = ValueRef::Const(self.module.const_int(i8_ty, 0));
                    self.builder(e.id)?
                        .memset(dst, zero, size, flags.align, flags.volatile)
                } else {
                    let src = self.value(src_id, BoolMode::Noop)?;
                    self.builder(e.id)?
                        .memcpy(dst, src, size, flags.align, flags.volatile)
                };
                self.attach_alias_metadata(e.id, inst)?;
                Ok(None)
            }
            Opcode::AccessChain
            | Opcode::InBoundsAccessChain
            | Opcode::PtrAccessChain
            | Opcode::InBoundsPtrAccessChain => {
                let base = self.value(self.operand_id(e, 0)?, BoolMode::Noop)?;
                let mut indices = Vec::new();
                if matches!(e.opcode, Opcode::AccessChain | Opcode::InBoundsAccessChain) {
                    indices.push(ValueRef::Const(self.module.const_i32(0)));
                }
                for index in e.ids_from(1) {
                    indices.push(self.value(index, BoolMode::Noop)?);
                }
                let inbounds = matches!(
                    e.opcode,
                    Opcode::InBoundsAccessChain | Opcode::InBoundsPtrAccessChain
                );
                Ok(Some(self.builder(e.id)?.gep(base, indices, inbounds, None)))
            }
            Opcode::LifetimeStart | Opcode::LifetimeStop => {
                if !self.caps.supports(TargetFeature::LifetimeIntrinsics) {
                    return Ok(None);
                }
                let ptr = self.value(self.operand_id(e, 0)?, BoolMode::Noop)?;
                let size = match e.word_at(1).unwrap_or(0) {
                    0 => {
                        let pointee = self.pointee_of(e.id, ptr)?;
                        self.alloc_size(pointee)
                    }
                    n => u64::from(n),
                };
                let mut b = self.builder(e.id)?;
                if e.opcode == Opcode::LifetimeStart {
                    b.lifetime_start(size, ptr);
                } else {
                    b.lifetime_end(size, ptr);
                }
                Ok(None)
            }
            Opcode::SizeOf => {
                let ptr = self.value(self.operand_id(e, 0)?, BoolMode::Noop)?;
                let pointee = self.pointee_of(e.id, ptr)?;
                let size = self.alloc_size(pointee);
                let ty = self.translate_type(self.result_type(e)?)?;
                Ok(Some(ValueRef::Const(self.module.const_int(ty, size))))
            }
            Opcode::ArrayLength => Err(TranslateError::not_implemented("OpArrayLength")),
            Opcode::CreatePipeFromPipeStorage => {
                let storage = self.value(self.operand_id(e, 0)?, BoolMode::Noop)?;
                let ty = self.translate_type(self.result_type(e)?)?;
                Ok(Some(self.builder(e.id)?.cast(CastOp::Bitcast, storage, ty, None)))
            }
            other => Err(TranslateError::malformed(
                e.id,
                format!("{} is not a memory instruction", other.name()),
            )),
        }
    }

    fn translate_store(&mut self, e: &'a Entity) -> Result<()> {
        let ptr_id = self.operand_id(e, 0)?;
        let obj_id = self.operand_id(e, 1)?;
        let ptr = self.value(ptr_id, BoolMode::Noop)?;
        let flags = self.mem_flags(e, ptr_id, 2);
        let v = self.value(obj_id, BoolMode::Promote)?;

        let struct_constant = match v {
            ValueRef::Const(c) if self.store.opcode(obj_id) == Some(Opcode::ConstantComposite) => {
                let ty = self.module.constant(c).ty;
                self.module.types.is_struct(ty).then_some((c, ty))
            }
            _ => None,
        };
        let inst = match struct_constant {
            Some((c, ty)) => {
                let tmp = self
                    .builder(e.id)?
                    .entry_alloca(ty, None, Some("CS.tmpstore"));
                self.store_fields(e.id, tmp, c, &mut Vec::new())?;
                let size = self.alloc_size(ty);
                let size = ValueRef::Const(self.module.const_i64(size as i64));
                self.builder(e.id)?
                    .memcpy(ptr, tmp, size, flags.align, flags.volatile)
            }
            None => self.builder(e.id)?.store(v, ptr, flags),
        };
        self.attach_alias_metadata(e.id, inst)
    }

    /// Store every scalar leaf of a struct constant through an in-bounds GEP
    /// off `tmp`; `path` holds the field indices walked so far.
    fn store_fields(&mut self, id: Id, tmp: ValueRef, c: ConstRef, path: &mut Vec<u32>) -> Result<()> {
        let constant = self.module.constant(c).clone();
        match constant.kind {
            ConstKind::Aggregate(elems) if self.module.types.is_struct(constant.ty) => {
                for (i, elem) in elems.into_iter().enumerate() {
                    path.push(i as u32);
                    self.store_fields(id, tmp, elem, path)?;
                    path.pop();
                }
            }
            _ => {
                let mut indices = vec![ValueRef::Const(self.module.const_i32(0))];
                for &i in path.iter() {
                    indices.push(ValueRef::Const(self.module.const_i32(i64::from(i))));
                }
                let mut b = self.builder(id)?;
                let addr = b.gep(tmp, indices, true, None);
                b.store(ValueRef::Const(c), addr, MemFlags::default());
            }
        }
        Ok(())
    }

    /// Memory-access operand at `mask_index`, plus a `Volatile` decoration
    /// on the instruction or its pointer.
    fn mem_flags(&self, e: &Entity, ptr: Id, mask_index: usize) -> MemFlags {
        let mask = e.word_at(mask_index).unwrap_or(0);
        let align = if mask & memory_access::ALIGNED != 0 {
            e.word_at(mask_index + 1)
        } else {
            None
        };
        MemFlags {
            align,
            volatile: mask & memory_access::VOLATILE != 0
                || self.store.has_decoration(e.id, Decoration::Volatile)
                || self.store.has_decoration(ptr, Decoration::Volatile),
            nontemporal: mask & memory_access::NONTEMPORAL != 0,
        }
    }

    /// Whether `src` is a bitcast of a variable initialized with a null array.
    fn is_zero_source(&self, src: Id) -> bool {
        let Some(cast) = self.store.get(src) else {
            return false;
        };
        if cast.opcode != Opcode::Bitcast {
            return false;
        }
        let Some(var) = cast.id_at(0).and_then(|id| self.store.get(id)) else {
            return false;
        };
        if var.opcode != Opcode::Variable {
            return false;
        }
        let Some(init) = var.id_at(1).and_then(|id| self.store.get(id)) else {
            return false;
        };
        init.opcode == Opcode::ConstantNull
            && init
                .ty
                .and_then(|ty| self.store.opcode(ty))
                .is_some_and(|op| op == Opcode::TypeArray)
    }

    pub(crate) fn pointee_of(&self, id: Id, ptr: ValueRef) -> Result<TypeRef> {
        let ty = self.type_of(ptr)?;
        self.module
            .types
            .pointee(ty)
            .ok_or_else(|| TranslateError::malformed(id, "operand is not a pointer"))
    }

    pub(crate) fn alloc_size(&self, ty: TypeRef) -> u64 {
        self.module.layout.alloc_size(&self.module.types, ty)
    }
}
