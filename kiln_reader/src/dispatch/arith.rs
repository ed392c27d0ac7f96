//! Arithmetic, logic, comparisons, conversions and composite access.

use kiln_ir::instruction::{BinaryOp, CastOp, FCmpOp, ICmpOp, WrapFlags};
use kiln_ir::types::Type;
use kiln_ir::value::{ConstRef, TypeRef, ValueRef};
use kiln_spirv::{Decoration, Entity, Opcode, RoundingMode};

use crate::error::{Result, TranslateError};
use crate::translator::Translator;
use crate::values::BoolMode;

/// Binary operator of an opcode that maps one-to-one.
pub(crate) fn binary_op(op: Opcode) -> Option<BinaryOp> {
    Some(match op {
        Opcode::IAdd => BinaryOp::Add,
        Opcode::FAdd => BinaryOp::FAdd,
        Opcode::ISub => BinaryOp::Sub,
        Opcode::FSub => BinaryOp::FSub,
        Opcode::IMul => BinaryOp::Mul,
        Opcode::FMul => BinaryOp::FMul,
        Opcode::UDiv => BinaryOp::UDiv,
        Opcode::SDiv => BinaryOp::SDiv,
        Opcode::FDiv => BinaryOp::FDiv,
        Opcode::UMod => BinaryOp::URem,
        Opcode::SRem => BinaryOp::SRem,
        Opcode::FRem => BinaryOp::FRem,
        Opcode::ShiftLeftLogical => BinaryOp::Shl,
        Opcode::ShiftRightLogical => BinaryOp::LShr,
        Opcode::ShiftRightArithmetic => BinaryOp::AShr,
        Opcode::BitwiseOr | Opcode::LogicalOr => BinaryOp::Or,
        Opcode::BitwiseXor => BinaryOp::Xor,
        Opcode::BitwiseAnd | Opcode::LogicalAnd => BinaryOp::And,
        _ => return None,
    })
}

pub(crate) fn icmp_op(op: Opcode) -> Option<ICmpOp> {
    Some(match op {
        Opcode::IEqual | Opcode::LogicalEqual => ICmpOp::Eq,
        Opcode::INotEqual | Opcode::LogicalNotEqual => ICmpOp::Ne,
        Opcode::UGreaterThan => ICmpOp::Ugt,
        Opcode::SGreaterThan => ICmpOp::Sgt,
        Opcode::UGreaterThanEqual => ICmpOp::Uge,
        Opcode::SGreaterThanEqual => ICmpOp::Sge,
        Opcode::ULessThan => ICmpOp::Ult,
        Opcode::SLessThan => ICmpOp::Slt,
        Opcode::ULessThanEqual => ICmpOp::Ule,
        Opcode::SLessThanEqual => ICmpOp::Sle,
        _ => return None,
    })
}

pub(crate) fn fcmp_op(op: Opcode) -> Option<FCmpOp> {
    Some(match op {
        Opcode::FOrdEqual => FCmpOp::Oeq,
        Opcode::FUnordEqual => FCmpOp::Ueq,
        Opcode::FOrdNotEqual => FCmpOp::One,
        Opcode::FUnordNotEqual => FCmpOp::Une,
        Opcode::FOrdLessThan => FCmpOp::Olt,
        Opcode::FUnordLessThan => FCmpOp::Ult,
        Opcode::FOrdGreaterThan => FCmpOp::Ogt,
        Opcode::FUnordGreaterThan => FCmpOp::Ugt,
        Opcode::FOrdLessThanEqual => FCmpOp::Ole,
        Opcode::FUnordLessThanEqual => FCmpOp::Ule,
        Opcode::FOrdGreaterThanEqual => FCmpOp::Oge,
        Opcode::FUnordGreaterThanEqual => FCmpOp::Uge,
        _ => return None,
    })
}

impl<'a> Translator<'a> {
    /// Two operands of `e`, bools narrowed to `i1`.
    fn operands2(&mut self, e: &'a Entity) -> Result<(ValueRef, ValueRef)> {
        let lhs = self.value(self.operand_id(e, 0)?, BoolMode::Truncate)?;
        let rhs = self.value(self.operand_id(e, 1)?, BoolMode::Truncate)?;
        Ok((lhs, rhs))
    }

    pub(super) fn translate_binary(&mut self, e: &'a Entity) -> Result<ValueRef> {
        let op = binary_op(e.opcode)
            .ok_or_else(|| TranslateError::malformed(e.id, "not a binary operator"))?;
        let (lhs, mut rhs) = self.operands2(e)?;
        if matches!(op, BinaryOp::Shl | BinaryOp::LShr | BinaryOp::AShr) {
            rhs = self.fit_shift_amount(e, lhs, rhs)?;
        }
        let flags = WrapFlags {
            nsw: self.store.has_decoration(e.id, Decoration::NoSignedWrap),
            nuw: self.store.has_decoration(e.id, Decoration::NoUnsignedWrap),
        };
        Ok(self.builder(e.id)?.binary(op, lhs, rhs, flags, None))
    }

    /// Shift amounts may be narrower or wider than the shifted value.
    fn fit_shift_amount(&mut self, e: &'a Entity, lhs: ValueRef, rhs: ValueRef) -> Result<ValueRef> {
        let lhs_ty = self.type_of(lhs)?;
        let rhs_ty = self.type_of(rhs)?;
        let types = &self.module.types;
        let (lw, rw) = (
            types.int_width(types.scalar(lhs_ty)),
            types.int_width(types.scalar(rhs_ty)),
        );
        let op = match (lw, rw) {
            (Some(l), Some(r)) if r < l => CastOp::ZExt,
            (Some(l), Some(r)) if r > l => CastOp::Trunc,
            _ => return Ok(rhs),
        };
        Ok(self.builder(e.id)?.cast(op, rhs, lhs_ty, None))
    }

    pub(super) fn translate_compare(&mut self, e: &'a Entity) -> Result<ValueRef> {
        let (lhs, rhs) = self.operands2(e)?;
        let mut b = self.builder(e.id)?;
        if let Some(op) = icmp_op(e.opcode) {
            return Ok(b.icmp(op, lhs, rhs, None));
        }
        match fcmp_op(e.opcode) {
            Some(op) => Ok(b.fcmp(op, lhs, rhs, None)),
            None => Err(TranslateError::malformed(e.id, "not a comparison")),
        }
    }

    pub(super) fn translate_unary(&mut self, e: &'a Entity) -> Result<ValueRef> {
        match e.opcode {
            Opcode::SNegate => {
                let x = self.value(self.operand_id(e, 0)?, BoolMode::Noop)?;
                let ty = self.type_of(x)?;
                let zero = ValueRef::Const(self.module.const_null(ty));
                Ok(self
                    .builder(e.id)?
                    .binary(BinaryOp::Sub, zero, x, WrapFlags::NSW, None))
            }
            Opcode::FNegate => {
                let x = self.value(self.operand_id(e, 0)?, BoolMode::Noop)?;
                Ok(self.builder(e.id)?.fneg(x, None))
            }
            Opcode::Not | Opcode::LogicalNot => {
                let x = self.value(self.operand_id(e, 0)?, BoolMode::Truncate)?;
                let ty = self.type_of(x)?;
                let ones = ValueRef::Const(self.all_ones(ty));
                Ok(self
                    .builder(e.id)?
                    .binary(BinaryOp::Xor, x, ones, WrapFlags::NONE, None))
            }
            Opcode::Select => {
                let cond = self.value(self.operand_id(e, 0)?, BoolMode::Truncate)?;
                let on_true = self.value(self.operand_id(e, 1)?, BoolMode::Promote)?;
                let on_false = self.value(self.operand_id(e, 2)?, BoolMode::Promote)?;
                Ok(self.builder(e.id)?.select(cond, on_true, on_false, None))
            }
            Opcode::VectorTimesScalar => {
                let vector = self.value(self.operand_id(e, 0)?, BoolMode::Noop)?;
                let scalar = self.value(self.operand_id(e, 1)?, BoolMode::Noop)?;
                let splat = self.splat(e, vector, scalar)?;
                Ok(self
                    .builder(e.id)?
                    .binary(BinaryOp::FMul, vector, splat, WrapFlags::NONE, None))
            }
            other => Err(TranslateError::malformed(
                e.id,
                format!("{} is not a unary operation", other.name()),
            )),
        }
    }

    /// `scalar` broadcast to the shape of `like`.
    fn splat(&mut self, e: &'a Entity, like: ValueRef, scalar: ValueRef) -> Result<ValueRef> {
        let ty = self.type_of(like)?;
        let len = self
            .module
            .types
            .vector_len(ty)
            .ok_or_else(|| TranslateError::malformed(e.id, "operand is not a vector"))?;
        let undef = ValueRef::Const(self.module.const_undef(ty));
        let zero = ValueRef::Const(self.module.const_i32(0));
        let mut b = self.builder(e.id)?;
        let head = b.insert_element(undef, scalar, zero, None);
        Ok(b.shuffle_vector(head, undef, vec![Some(0); len as usize], None))
    }

    /// Integer constant with every bit set, splatted for vectors.
    fn all_ones(&mut self, ty: TypeRef) -> ConstRef {
        let scalar = self.module.types.scalar(ty);
        let ones = self.module.const_int(scalar, -1);
        if scalar == ty {
            ones
        } else {
            self.module.const_splat(ty, ones)
        }
    }

    /// `OpSMod` has the sign of the divisor; expand it over `srem`.
    pub(super) fn expand_smod(&mut self, e: &'a Entity) -> Result<ValueRef> {
        let (a, b) = self.operands2(e)?;
        let ty = self.type_of(a)?;
        let scalar = self.module.types.scalar(ty);
        let bits = self
            .module
            .types
            .int_width(scalar)
            .ok_or_else(|| TranslateError::malformed(e.id, "OpSMod on a non-integer"))?;
        let mut shift = self.module.const_int(scalar, bits - 1);
        if scalar != ty {
            shift = self.module.const_splat(ty, shift);
        }
        let shift = ValueRef::Const(shift);
        let zero = ValueRef::Const(self.module.const_null(ty));

        let mut bld = self.builder(e.id)?;
        let out = bld.binary(BinaryOp::SRem, a, b, WrapFlags::NONE, None);
        let sign_a = bld.binary(BinaryOp::AShr, a, shift, WrapFlags::NONE, None);
        let sign_b = bld.binary(BinaryOp::AShr, b, shift, WrapFlags::NONE, None);
        let signs_differ = bld.icmp(ICmpOp::Ne, sign_a, sign_b, None);
        let nonzero = bld.icmp(ICmpOp::Ne, out, zero, None);
        let fix = bld.and(signs_differ, nonzero);
        let adjusted = bld.add(out, b);
        Ok(bld.select(fix, adjusted, out, None))
    }

    // -- Conversions --

    pub(super) fn translate_conversion(&mut self, e: &'a Entity) -> Result<Option<ValueRef>> {
        let saturated = self.store.has_decoration(e.id, Decoration::SaturatedConversion);
        let rounding = self
            .store
            .decoration_word(e.id, Decoration::FPRoundingMode)
            .and_then(RoundingMode::from_word);
        let is_sat_op = matches!(e.opcode, Opcode::SatConvertSToU | Opcode::SatConvertUToS);
        if saturated || rounding.is_some() || is_sat_op || e.opcode == Opcode::QuantizeToF16 {
            let mut suffix = String::new();
            if saturated && !is_sat_op {
                suffix.push_str("_Sat");
            }
            if let Some(mode) = rounding {
                suffix.push_str(mode.suffix());
            }
            return self.translate_builtin(e, &suffix);
        }

        let src = self.value(self.operand_id(e, 0)?, BoolMode::Noop)?;
        let dst_ty = self.translate_type(self.result_type(e)?)?;
        let src_ty = self.type_of(src)?;
        let op = self.cast_op(e, src_ty, dst_ty)?;
        Ok(Some(self.builder(e.id)?.cast(op, src, dst_ty, None)))
    }

    fn cast_op(&self, e: &Entity, src_ty: TypeRef, dst_ty: TypeRef) -> Result<CastOp> {
        let types = &self.module.types;
        let src_bits = scalar_bits(types.get(types.scalar(src_ty)));
        let dst_bits = scalar_bits(types.get(types.scalar(dst_ty)));
        let resize = |widen: CastOp, narrow: CastOp| if dst_bits > src_bits { widen } else { narrow };
        Ok(match e.opcode {
            Opcode::SConvert => resize(CastOp::SExt, CastOp::Trunc),
            Opcode::UConvert => resize(CastOp::ZExt, CastOp::Trunc),
            Opcode::FConvert => resize(CastOp::FpExt, CastOp::FpTrunc),
            Opcode::ConvertFToU => CastOp::FpToUi,
            Opcode::ConvertFToS => CastOp::FpToSi,
            Opcode::ConvertSToF => CastOp::SiToFp,
            Opcode::ConvertUToF => CastOp::UiToFp,
            Opcode::ConvertPtrToU => CastOp::PtrToInt,
            Opcode::ConvertUToPtr => CastOp::IntToPtr,
            Opcode::PtrCastToGeneric | Opcode::GenericCastToPtr | Opcode::GenericCastToPtrExplicit => {
                CastOp::AddrSpaceCast
            }
            Opcode::Bitcast => match (types.addr_space(src_ty), types.addr_space(dst_ty)) {
                (Some(a), Some(b)) if a != b => CastOp::AddrSpaceCast,
                _ => CastOp::Bitcast,
            },
            other => {
                return Err(TranslateError::malformed(
                    e.id,
                    format!("{} is not a conversion", other.name()),
                ))
            }
        })
    }

    // -- Composites --

    pub(super) fn translate_composite(&mut self, e: &'a Entity) -> Result<ValueRef> {
        match e.opcode {
            Opcode::CompositeConstruct => self.construct_composite(e),
            Opcode::CompositeExtract => {
                let composite = self.value(self.operand_id(e, 0)?, BoolMode::Noop)?;
                let indices = e.words_from(1);
                self.extract_path(e, composite, &indices)
            }
            Opcode::CompositeInsert => {
                let object = self.value(self.operand_id(e, 0)?, BoolMode::Promote)?;
                let composite = self.value(self.operand_id(e, 1)?, BoolMode::Noop)?;
                let indices = e.words_from(2);
                self.insert_path(e, composite, object, &indices)
            }
            Opcode::VectorExtractDynamic => {
                let vector = self.value(self.operand_id(e, 0)?, BoolMode::Noop)?;
                let index = self.value(self.operand_id(e, 1)?, BoolMode::Noop)?;
                Ok(self.builder(e.id)?.extract_element(vector, index, None))
            }
            Opcode::VectorInsertDynamic => {
                let vector = self.value(self.operand_id(e, 0)?, BoolMode::Noop)?;
                let element = self.value(self.operand_id(e, 1)?, BoolMode::Promote)?;
                let index = self.value(self.operand_id(e, 2)?, BoolMode::Noop)?;
                Ok(self
                    .builder(e.id)?
                    .insert_element(vector, element, index, None))
            }
            Opcode::VectorShuffle => self.shuffle(e),
            Opcode::CopyObject => self.value(self.operand_id(e, 0)?, BoolMode::Noop),
            other => Err(TranslateError::malformed(
                e.id,
                format!("{} is not a composite operation", other.name()),
            )),
        }
    }

    /// Vectors are built lane by lane, flattening vector constituents;
    /// arrays and structs member by member.
    fn construct_composite(&mut self, e: &'a Entity) -> Result<ValueRef> {
        let ty = self.translate_type(self.result_type(e)?)?;
        let mut parts = Vec::new();
        for part in e.ids_from(0) {
            parts.push(self.value(part, BoolMode::Promote)?);
        }
        let mut acc = ValueRef::Const(self.module.const_undef(ty));
        if !self.module.types.is_vector(ty) {
            for (i, part) in parts.into_iter().enumerate() {
                acc = self
                    .builder(e.id)?
                    .insert_value(acc, part, vec![i as u32], None);
            }
            return Ok(acc);
        }
        let mut lane = 0i64;
        for part in parts {
            let part_ty = self.type_of(part)?;
            match self.module.types.vector_len(part_ty) {
                Some(len) => {
                    for j in 0..i64::from(len) {
                        let src = ValueRef::Const(self.module.const_i32(j));
                        let dst = ValueRef::Const(self.module.const_i32(lane));
                        let mut b = self.builder(e.id)?;
                        let elem = b.extract_element(part, src, None);
                        acc = b.insert_element(acc, elem, dst, None);
                        lane += 1;
                    }
                }
                None => {
                    let dst = ValueRef::Const(self.module.const_i32(lane));
                    acc = self.builder(e.id)?.insert_element(acc, part, dst, None);
                    lane += 1;
                }
            }
        }
        Ok(acc)
    }

    /// Leading indices that address struct/array members, and the trailing
    /// vector lane if the path ends inside a vector.
    fn split_path(&self, ty: TypeRef, indices: &[u32]) -> (usize, Option<u32>) {
        let types = &self.module.types;
        let mut cur = ty;
        for (n, &i) in indices.iter().enumerate() {
            if types.is_vector(cur) {
                return (n, Some(i));
            }
            cur = types.member(cur, u64::from(i)).unwrap_or(cur);
        }
        (indices.len(), None)
    }

    fn extract_path(&mut self, e: &'a Entity, composite: ValueRef, indices: &[u32]) -> Result<ValueRef> {
        let ty = self.type_of(composite)?;
        let (n, lane) = self.split_path(ty, indices);
        let lane = lane.map(|l| ValueRef::Const(self.module.const_i32(i64::from(l))));
        let mut b = self.builder(e.id)?;
        let mut v = composite;
        if n > 0 {
            v = b.extract_value(v, indices[..n].to_vec(), None);
        }
        if let Some(lane) = lane {
            v = b.extract_element(v, lane, None);
        }
        Ok(v)
    }

    fn insert_path(
        &mut self,
        e: &'a Entity,
        composite: ValueRef,
        object: ValueRef,
        indices: &[u32],
    ) -> Result<ValueRef> {
        let ty = self.type_of(composite)?;
        let (n, lane) = self.split_path(ty, indices);
        let lane = lane.map(|l| ValueRef::Const(self.module.const_i32(i64::from(l))));
        let prefix = indices[..n].to_vec();
        let mut b = self.builder(e.id)?;
        match (lane, n) {
            (None, _) => Ok(b.insert_value(composite, object, prefix, None)),
            (Some(lane), 0) => Ok(b.insert_element(composite, object, lane, None)),
            (Some(lane), _) => {
                let inner = b.extract_value(composite, prefix.clone(), None);
                let inner = b.insert_element(inner, object, lane, None);
                Ok(b.insert_value(composite, inner, prefix, None))
            }
        }
    }

    /// Operands of different widths are padded to the wider one first.
    fn shuffle(&mut self, e: &'a Entity) -> Result<ValueRef> {
        let mut v1 = self.value(self.operand_id(e, 0)?, BoolMode::Noop)?;
        let mut v2 = self.value(self.operand_id(e, 1)?, BoolMode::Noop)?;
        let not_vector = || TranslateError::malformed(e.id, "shuffle operand is not a vector");
        let len1 = self.module.types.vector_len(self.type_of(v1)?).ok_or_else(not_vector)?;
        let len2 = self.module.types.vector_len(self.type_of(v2)?).ok_or_else(not_vector)?;
        let width = len1.max(len2);
        let pad = |len: u32| -> Vec<Option<u32>> { (0..width).map(|i| (i < len).then_some(i)).collect() };
        {
            let mut b = self.builder(e.id)?;
            if len1 < width {
                v1 = b.shuffle_vector(v1, v1, pad(len1), None);
            }
            if len2 < width {
                v2 = b.shuffle_vector(v2, v2, pad(len2), None);
            }
        }
        let mask = e
            .words_from(2)
            .into_iter()
            .map(|lane| match lane {
                0xFFFF_FFFF => None,
                l if l < len1 => Some(l),
                l => Some(l - len1 + width),
            })
            .collect();
        Ok(self.builder(e.id)?.shuffle_vector(v1, v2, mask, None))
    }
}

fn scalar_bits(ty: &Type) -> u32 {
    match ty {
        Type::Int(bits) => *bits,
        Type::Float(ft) => ft.bits(),
        _ => 0,
    }
}
