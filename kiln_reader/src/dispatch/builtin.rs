//! Lowering of operations without a native IR form to builtin calls.

use kiln_ir::function::{CallConv, FnAttr};
use kiln_ir::global::Linkage;
use kiln_ir::instruction::CastOp;
use kiln_ir::value::{FuncRef, TypeRef, ValueRef};
use kiln_spirv::{ocl_std, Entity, ExtInstSet, Id, Opcode, Operand, RoundingMode};

use crate::error::{Result, TranslateError};
use crate::features::TargetFeature;
use crate::mangle::{mangle_builtin, mangle_ext_inst};
use crate::translator::Translator;
use crate::values::BoolMode;

/// Opaque struct behind the trailing argument of image builtins.
const IMAGE_DUMMY: &str = "struct.ImageDummy";

/// Packed image-type word passed to image builtins.
fn image_type_word(desc: &kiln_spirv::ImageDescriptor, access: kiln_spirv::AccessQualifier) -> u64 {
    (u64::from(desc.dim.word() & 7) << 59)
        | (u64::from(desc.depth & 1) << 58)
        | (u64::from(desc.arrayed) << 57)
        | (u64::from(desc.multisampled) << 56)
        | (u64::from(desc.sampled & 3) << 62)
        | (u64::from(access.word() & 3) << 54)
}

fn takes_image_type(op: Opcode) -> bool {
    matches!(
        op,
        Opcode::SampledImage
            | Opcode::ImageRead
            | Opcode::ImageWrite
            | Opcode::ImageQuerySize
            | Opcode::ImageQuerySizeLod
    )
}

fn takes_image_dummy(op: Opcode) -> bool {
    matches!(
        op,
        Opcode::ImageSampleExplicitLod
            | Opcode::ImageRead
            | Opcode::ImageWrite
            | Opcode::ImageQueryFormat
            | Opcode::ImageQueryOrder
            | Opcode::ImageQuerySizeLod
            | Opcode::ImageQuerySize
            | Opcode::ImageQueryLevels
            | Opcode::ImageQuerySamples
    )
}

/// Argument index of the coordinate that is widened to four lanes.
fn coordinate_index(op: Opcode) -> Option<usize> {
    match op {
        Opcode::ImageSampleExplicitLod => Some(1),
        Opcode::ImageRead | Opcode::ImageWrite => Some(2),
        _ => None,
    }
}

impl<'a> Translator<'a> {
    /// Call `__builtin_spirv_Op<name><suffix>_<types>` with the operands of `e`.
    pub(super) fn translate_builtin(&mut self, e: &'a Entity, suffix: &str) -> Result<Option<ValueRef>> {
        let ret_ty = self.builtin_return_type(e)?;
        let mut args = Vec::new();
        for operand in &e.operands {
            if let Some(v) = self.builtin_arg(e, operand)? {
                args.push(v);
            }
        }

        if takes_image_type(e.opcode) {
            let image = self.operand_id(e, 0)?;
            let image_ty = self.entity(image)?.ty.ok_or(TranslateError::MissingEntity(image))?;
            let (desc, access) = self.image_descriptor(image_ty)?;
            let i64_ty = self.module.types.int(64);
            let word = self.module.const_int(i64_ty, image_type_word(&desc, access));
            args.insert(1.min(args.len()), ValueRef::Const(word));
        }
        if let Some(index) = coordinate_index(e.opcode) {
            if let Some(coord) = args.get(index).copied() {
                args[index] = self.widen_coordinate(e.id, coord)?;
            }
        }
        if takes_image_dummy(e.opcode) {
            let dummy = self.module.types.named_struct(IMAGE_DUMMY);
            let ptr = self.module.types.ptr(dummy, 0);
            args.push(ValueRef::Const(self.module.const_null(ptr)));
        }

        let mut mangled = Vec::with_capacity(args.len() + 1);
        let ret_first = e.opcode.is_conversion() || (e.opcode.is_image() && e.opcode != Opcode::ImageWrite);
        if ret_first {
            mangled.push(ret_ty);
        }
        for &arg in &args {
            mangled.push(self.type_of(arg)?);
        }
        let name = mangle_builtin(e.opcode, suffix, &self.module.types, &mangled);
        self.call_builtin(e, &name, ret_ty, args)
    }

    /// Result type of a builtin; bool results use the `i1` form.
    fn builtin_return_type(&mut self, e: &'a Entity) -> Result<TypeRef> {
        match e.ty {
            Some(ty_id) => {
                let ty = self.translate_type(ty_id)?;
                if self.is_bool_type(ty_id) {
                    Ok(self.module.types.with_scalar_int(ty, 1))
                } else {
                    Ok(ty)
                }
            }
            None => Ok(self.module.types.void()),
        }
    }

    /// One builtin argument: bool operands narrowed, others promoted, image
    /// handles passed as `i64`, literals as `i32` constants.
    fn builtin_arg(&mut self, e: &'a Entity, operand: &Operand) -> Result<Option<ValueRef>> {
        match operand {
            Operand::Id(id) => {
                let mode = if self.has_bool_type(*id) {
                    BoolMode::Truncate
                } else {
                    BoolMode::Promote
                };
                let v = self.value(*id, mode)?;
                if self.is_image_value(*id) {
                    let i64_ty = self.module.types.int(64);
                    return Ok(Some(self.builder(e.id)?.cast(
                        CastOp::PtrToInt,
                        v,
                        i64_ty,
                        Some("ImageArgVal"),
                    )));
                }
                Ok(Some(v))
            }
            Operand::Literal(word) => Ok(Some(ValueRef::Const(self.module.const_i32(i64::from(*word))))),
            Operand::String(_) => Ok(None),
        }
    }

    fn is_image_value(&self, id: Id) -> bool {
        self.store
            .get(id)
            .and_then(|e| e.ty)
            .and_then(|ty| self.store.opcode(ty))
            .is_some_and(|op| op == Opcode::TypeImage)
    }

    /// Scalars go into lane 0 of an undef vector; shorter vectors are padded
    /// with lane 0.
    fn widen_coordinate(&mut self, id: Id, coord: ValueRef) -> Result<ValueRef> {
        let ty = self.type_of(coord)?;
        let scalar = self.module.types.scalar(ty);
        let wide = self.module.types.vector(scalar, 4);
        match self.module.types.vector_len(ty) {
            None => {
                let undef = ValueRef::Const(self.module.const_undef(wide));
                let zero = ValueRef::Const(self.module.const_i32(0));
                Ok(self.builder(id)?.insert_element(undef, coord, zero, None))
            }
            Some(len) if len < 4 => {
                let mask = (0..4).map(|i| Some(if i < len { i } else { 0 })).collect();
                Ok(self.builder(id)?.shuffle_vector(coord, coord, mask, None))
            }
            Some(_) => Ok(coord),
        }
    }

    /// Declare (or reuse) `name` with the argument types of `args` and call it.
    fn call_builtin(
        &mut self,
        e: &'a Entity,
        name: &str,
        ret_ty: TypeRef,
        args: Vec<ValueRef>,
    ) -> Result<Option<ValueRef>> {
        let mut params = Vec::with_capacity(args.len());
        for &arg in &args {
            params.push(self.type_of(arg)?);
        }
        let fn_ty = self.module.types.function(ret_ty, params, false);
        let callee = self.builtin_function(name, fn_ty, &[FnAttr::NoUnwind]);
        let v = self.builder(e.id)?.call(callee, args, None);
        Ok(e.ty.map(|_| v))
    }

    /// Declaration of builtin `name` with type `fn_ty`. A same-named
    /// function of another type gets a fresh declaration next to it.
    pub(crate) fn builtin_function(&mut self, name: &str, fn_ty: TypeRef, attrs: &[FnAttr]) -> FuncRef {
        let existing = self.module.func_refs().find(|&f| {
            let func = self.module.function(f);
            func.ty == fn_ty
                && (func.name == name
                    || func
                        .name
                        .strip_prefix(name)
                        .is_some_and(|rest| rest.starts_with('.')))
        });
        if let Some(f) = existing {
            return f;
        }
        let f = self.module.add_function(name, fn_ty);
        let func = self.module.function_mut(f);
        func.linkage = Linkage::External;
        func.call_conv = CallConv::SpirFunc;
        for &attr in attrs {
            func.add_attr(attr);
        }
        f
    }

    // -- Extended instructions --

    pub(super) fn translate_ext_inst(&mut self, e: &'a Entity) -> Result<Option<ValueRef>> {
        let set = self
            .store
            .ext_set_of(e)
            .ok_or_else(|| TranslateError::malformed(e.id, "unknown extended instruction set"))?;
        if set.is_debug() {
            return self.translate_debug_ext_inst(e);
        }
        debug_assert_eq!(set, ExtInstSet::OpenClStd);
        let op = e
            .ext_op()
            .ok_or_else(|| TranslateError::malformed(e.id, "missing extended instruction number"))?;
        let name = ocl_std::name(op)
            .ok_or_else(|| TranslateError::not_implemented(format!("OpenCL.std instruction {op}")))?;
        if op == ocl_std::PRINTF {
            return self.translate_printf(e).map(Some);
        }

        let mut operands: Vec<&Operand> = e.ext_args().iter().collect();
        let name = match name {
            "vloadn" | "vload_halfn" | "vloada_halfn" => {
                let width = match operands.pop().and_then(Operand::as_word) {
                    Some(w) => w,
                    None => return Err(TranslateError::malformed(e.id, format!("{name} without a width"))),
                };
                let stem = name.trim_end_matches('n');
                if width == 1 {
                    stem.to_string()
                } else {
                    format!("{stem}{width}")
                }
            }
            "vstoren" | "vstore_halfn" | "vstorea_halfn" | "vstore_half_r" | "vstore_halfn_r"
            | "vstorea_halfn_r" => self.vstore_name(e, name, &mut operands)?,
            _ => self.precision_fallback(e.id, name),
        };

        let ret_ty = self.builtin_return_type(e)?;
        let mut args = Vec::with_capacity(operands.len());
        for operand in operands {
            if let Some(v) = self.builtin_arg(e, operand)? {
                args.push(v);
            }
        }
        let mut tys = Vec::with_capacity(args.len());
        for &arg in &args {
            tys.push(self.type_of(arg)?);
        }
        let callee = mangle_ext_inst(&name, &self.module.types, &tys);
        self.call_builtin(e, &callee, ret_ty, args)
    }

    /// `vstore*n` takes the width of the data operand; `_r` variants take
    /// their rounding mode from the trailing literal.
    fn vstore_name(&mut self, e: &'a Entity, name: &str, operands: &mut Vec<&Operand>) -> Result<String> {
        let mut name = name.to_string();
        if let Some(stem) = name.strip_suffix("_r") {
            let mode = operands
                .pop()
                .and_then(Operand::as_word)
                .and_then(RoundingMode::from_word)
                .ok_or_else(|| TranslateError::malformed(e.id, format!("{name} without a rounding mode")))?;
            name = format!("{stem}{}", mode.suffix().to_ascii_lowercase());
        }
        if let Some(pos) = name.find("halfn").map(|p| p + 4).or_else(|| name.find("vstoren").map(|p| p + 6)) {
            let data = operands
                .first()
                .and_then(|op| op.as_id())
                .ok_or_else(|| TranslateError::malformed(e.id, "vstore without data"))?;
            let ty = self.translate_type(self.entity(data)?.ty.ok_or(TranslateError::MissingEntity(data))?)?;
            let width = self.module.types.vector_len(ty).unwrap_or(1);
            let width = if width == 1 { String::new() } else { width.to_string() };
            name.replace_range(pos..pos + 1, &width);
        }
        Ok(name)
    }

    /// `native_*` and `half_*` fall back to full precision when the target
    /// lacks the tier.
    fn precision_fallback(&mut self, id: Id, name: &'static str) -> String {
        let tiers = [
            ("native_", TargetFeature::NativeMath),
            ("half_", TargetFeature::HalfPrecisionMath),
        ];
        for (prefix, feature) in tiers {
            if let Some(full) = name.strip_prefix(prefix) {
                if !self.caps.supports(feature) {
                    self.advise(
                        Some(id),
                        format!("{name} is not supported by the target, using {full}"),
                    );
                    return full.to_string();
                }
            }
        }
        name.to_string()
    }

    /// `printf` keeps its C name and variadic signature.
    fn translate_printf(&mut self, e: &'a Entity) -> Result<ValueRef> {
        let mut args = Vec::new();
        for id in e.ext_args().iter().filter_map(Operand::as_id) {
            args.push(self.value(id, BoolMode::Promote)?);
        }
        let i8_ty = self.module.types.int(8);
        let i32_ty = self.module.types.int(32);
        let format = self.module.types.ptr(i8_ty, 2);
        let fn_ty = self.module.types.function(i32_ty, vec![format], true);
        let callee = self.builtin_function("printf", fn_ty, &[FnAttr::NoUnwind]);
        Ok(self.builder(e.id)?.call(callee, args, None))
    }
}
