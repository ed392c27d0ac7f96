//! Type translation.

use kiln_ir::types::FloatType;
use kiln_ir::value::TypeRef;
use kiln_spirv::{AccessQualifier, Dim, Entity, Id, ImageDescriptor, Opcode, StorageClass};

use crate::error::{Result, TranslateError};
use crate::translator::Translator;
use crate::values::BoolMode;

/// Address space of a storage class.
pub fn address_space(storage: StorageClass) -> u32 {
    match storage {
        StorageClass::Function | StorageClass::Private => 0,
        StorageClass::CrossWorkgroup => 1,
        StorageClass::UniformConstant => 2,
        StorageClass::Workgroup => 3,
        StorageClass::Generic => 4,
        StorageClass::Input => 6,
        StorageClass::Uniform | StorageClass::Output => 0,
    }
}

pub(crate) const NAMED_BARRIER: &str = "struct.__namedBarrier";

impl<'a> Translator<'a> {
    /// Target type of a source type id. Memoized; struct types are cached
    /// before their members are translated so recursive graphs terminate.
    pub(crate) fn translate_type(&mut self, id: Id) -> Result<TypeRef> {
        if let Some(&t) = self.types.get(&id) {
            return Ok(t);
        }
        let e = self.entity(id)?;
        let t = match e.opcode {
            Opcode::TypeVoid => self.module.types.void(),
            Opcode::TypeBool => self.module.types.int(8),
            Opcode::TypeInt => {
                let width = self.operand_word(e, 0)?;
                self.module.types.int(width)
            }
            Opcode::TypeFloat => {
                let ft = match self.operand_word(e, 0)? {
                    16 => FloatType::F16,
                    32 => FloatType::F32,
                    64 => FloatType::F64,
                    w => return Err(TranslateError::unsupported_type(id, format!("{w}-bit float"))),
                };
                self.module.types.float(ft)
            }
            Opcode::TypeVector => {
                let elem = self.translate_type(self.operand_id(e, 0)?)?;
                let len = self.operand_word(e, 1)?;
                self.module.types.vector(elem, len)
            }
            Opcode::TypeArray => {
                let elem = self.translate_type(self.operand_id(e, 0)?)?;
                let len = self.literal_constant(self.operand_id(e, 1)?)?;
                self.module.types.array(elem, len)
            }
            Opcode::TypePointer => {
                let storage = self.storage_class(e, 0)?;
                let pointee = self.translate_type(self.operand_id(e, 1)?)?;
                self.module.types.ptr(pointee, address_space(storage))
            }
            Opcode::TypeFunction => {
                let ret = self.translate_type(self.operand_id(e, 0)?)?;
                let mut params = Vec::new();
                for p in e.ids_from(1) {
                    params.push(self.translate_type(p)?);
                }
                self.module.types.function(ret, params, false)
            }
            Opcode::TypeStruct => return self.translate_struct(e),
            Opcode::TypeOpaque => {
                let name = e
                    .str_at(0)
                    .ok_or_else(|| TranslateError::malformed(id, "opaque type without a name"))?;
                self.module.types.named_struct(name)
            }
            Opcode::TypeImage => {
                let (desc, access) = self.image_descriptor(id)?;
                let name = format!("opencl.{}.{}", desc.ocl_type_name(), access.ocl_name());
                self.opaque_ptr(&name, 1)
            }
            Opcode::TypeSampler => self.module.types.int(64),
            Opcode::TypeSampledImage => {
                let types = &mut self.module.types;
                let i64_ty = types.int(64);
                types.vector(i64_ty, 3)
            }
            Opcode::TypePipeStorage => {
                let types = &mut self.module.types;
                let i8_ty = types.int(8);
                types.ptr(i8_ty, 1)
            }
            Opcode::TypeNamedBarrier => {
                let types = &mut self.module.types;
                let st = match types.struct_by_name(NAMED_BARRIER) {
                    Some(st) => st,
                    None => {
                        let i32_ty = types.int(32);
                        let st = types.create_struct(NAMED_BARRIER);
                        types.set_struct_body(st, vec![i32_ty; 3], false);
                        st
                    }
                };
                types.ptr(st, 3)
            }
            Opcode::TypeEvent => self.opaque_ptr("opencl.event_t", 0),
            Opcode::TypeDeviceEvent => self.opaque_ptr("opencl.clk_event_t", 0),
            Opcode::TypeReserveId => self.opaque_ptr("opencl.reserve_id_t", 0),
            Opcode::TypeQueue => self.opaque_ptr("opencl.queue_t", 0),
            Opcode::TypePipe => self.opaque_ptr("opencl.pipe_t", 1),
            other => return Err(TranslateError::unsupported_type(id, other.name())),
        };
        self.types.insert(id, t);
        Ok(t)
    }

    fn translate_struct(&mut self, e: &'a Entity) -> Result<TypeRef> {
        let name = match self.store.name(e.id) {
            Some(name) if !name.is_empty() => name,
            _ => "struct.anon",
        };
        let st = self.module.types.create_struct(name);
        self.types.insert(e.id, st);
        let mut fields = Vec::with_capacity(e.operands.len());
        for member in e.ids_from(0) {
            fields.push(self.translate_type(member)?);
        }
        self.module.types.set_struct_body(st, fields, false);
        Ok(st)
    }

    fn opaque_ptr(&mut self, name: &str, addr_space: u32) -> TypeRef {
        let st = self.module.types.named_struct(name);
        self.module.types.ptr(st, addr_space)
    }

    pub(crate) fn storage_class(&self, e: &Entity, index: usize) -> Result<StorageClass> {
        let word = self.operand_word(e, index)?;
        StorageClass::from_word(word)
            .ok_or_else(|| TranslateError::malformed(e.id, format!("unknown storage class {word}")))
    }

    /// Descriptor and access qualifier of an image type, looking through
    /// sampled-image types.
    pub(crate) fn image_descriptor(&self, type_id: Id) -> Result<(ImageDescriptor, AccessQualifier)> {
        let e = self.entity(type_id)?;
        let e = match e.opcode {
            Opcode::TypeSampledImage => self.entity(self.operand_id(e, 0)?)?,
            Opcode::TypeImage => e,
            _ => return Err(TranslateError::malformed(type_id, "not an image type")),
        };
        let word = |i: usize| self.operand_word(e, i);
        let dim = Dim::from_word(word(1)?)
            .ok_or_else(|| TranslateError::malformed(e.id, "unknown image dimension"))?;
        let desc = ImageDescriptor {
            dim,
            depth: word(2)?,
            arrayed: word(3)? != 0,
            multisampled: word(4)? != 0,
            sampled: word(5)?,
            format: word(6)?,
        };
        let access = e
            .word_at(7)
            .and_then(AccessQualifier::from_word)
            .unwrap_or(AccessQualifier::ReadOnly);
        Ok((desc, access))
    }

    /// Whether a source type is bool or a vector of bool.
    pub(crate) fn is_bool_type(&self, type_id: Id) -> bool {
        match self.store.get(type_id) {
            Some(e) if e.opcode == Opcode::TypeBool => true,
            Some(e) if e.opcode == Opcode::TypeVector => e
                .id_at(0)
                .and_then(|elem| self.store.opcode(elem))
                .is_some_and(|op| op == Opcode::TypeBool),
            _ => false,
        }
    }

    /// Whether the result type of `id` is bool or a vector of bool.
    pub(crate) fn has_bool_type(&self, id: Id) -> bool {
        self.store
            .get(id)
            .and_then(|e| e.ty)
            .is_some_and(|ty| self.is_bool_type(ty))
    }

    /// Value of an integer constant used as a literal (array lengths).
    pub(crate) fn literal_constant(&mut self, id: Id) -> Result<u64> {
        let v = self.translate_value(id, BoolMode::Noop, false)?;
        v.as_const()
            .and_then(|c| self.module.constant(c).as_u64(64))
            .ok_or_else(|| TranslateError::malformed(id, "expected an integer constant"))
    }
}
