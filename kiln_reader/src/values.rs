//! Value translation: constants, module variables, forward-reference
//! placeholders and the `i1`/`i8` bool conventions.
//!
//! Bools are stored as `i8` (the type translator maps the source bool type
//! there) but computed as `i1`. Every operand is fetched with a `BoolMode`
//! saying which of the two forms the consumer needs.

use num_bigint::{BigInt, BigUint};
use num_traits::ToPrimitive;
use tracing::trace;

use kiln_ir::builder::Builder;
use kiln_ir::constant::ConstKind;
use kiln_ir::global::Linkage;
use kiln_ir::instruction::{CastOp, MemFlags, Op, Origin};
use kiln_ir::types::FloatType;
use kiln_ir::types::Type;
use kiln_ir::value::{BlockRef, ConstRef, FuncRef, TypeRef, ValueRef};
use kiln_spirv::{BuiltIn, Decoration, Entity, Id, LinkageType, Opcode, StorageClass};

use crate::error::{Result, TranslateError};
use crate::translator::{Placeholder, Translator};
use crate::types::address_space;

/// What to do with a bool-typed operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoolMode {
    /// Widen `i1` to the `i8` storage form.
    Promote,
    /// Narrow a bool stored as `i8` back to `i1`.
    Truncate,
    Noop,
}

/// Bytes reserved in front of every pipe buffer for the runtime header.
pub const PIPE_HEADER_RESERVED_SPACE: u64 = 128;

impl<'a> Translator<'a> {
    /// Target value of `id`, translating it on first use.
    pub(crate) fn translate_value(
        &mut self,
        id: Id,
        mode: BoolMode,
        allow_placeholder: bool,
    ) -> Result<ValueRef> {
        let v = self.lookup_or_translate(id, allow_placeholder)?;
        match mode {
            BoolMode::Noop => Ok(v),
            BoolMode::Promote => self.promote_bool(v),
            BoolMode::Truncate if self.has_bool_type(id) => self.truncate_bool(v),
            BoolMode::Truncate => Ok(v),
        }
    }

    /// Operand value without placeholders.
    pub(crate) fn value(&mut self, id: Id, mode: BoolMode) -> Result<ValueRef> {
        self.translate_value(id, mode, false)
    }

    pub(crate) fn translate_value_noop(&mut self, id: Id) -> Result<ValueRef> {
        self.translate_value(id, BoolMode::Noop, false)
    }

    /// Constant operand, or a malformed-record error naming `user`.
    pub(crate) fn const_value(&mut self, user: Id, id: Id) -> Result<ConstRef> {
        self.translate_value_noop(id)?
            .as_const()
            .ok_or_else(|| TranslateError::malformed(user, format!("operand {id} is not a constant")))
    }

    fn lookup_or_translate(&mut self, id: Id, allow_placeholder: bool) -> Result<ValueRef> {
        if let Some(fs) = &self.fs {
            if let Some(&v) = fs.values.get(&id) {
                if allow_placeholder || !fs.placeholders.contains_key(&id) {
                    return Ok(v);
                }
            }
        }
        if let Some(&v) = self.globals.get(&id) {
            return Ok(v);
        }
        let e = self.entity(id)?;
        match e.opcode {
            op if op.is_constant() || op == Opcode::Undef => self.translate_constant(e),
            Opcode::Variable if self.is_stack_variable(e) && self.fs.is_some() => self
                .translate_instruction(e)?
                .ok_or_else(|| TranslateError::malformed(id, "variable without a value")),
            Opcode::Variable => self.translate_variable(e),
            Opcode::Function => {
                let store = self.store;
                let def = store.function(id).ok_or(TranslateError::MissingEntity(id))?;
                self.declare_function(def).map(ValueRef::Func)
            }
            Opcode::FunctionParameter | Opcode::Label => Err(TranslateError::malformed(
                id,
                "referenced outside its function",
            )),
            _ if self.fs.is_none() => Err(TranslateError::OutsideFunction(id)),
            _ if allow_placeholder => self.create_placeholder(e),
            _ => self
                .translate_instruction(e)?
                .ok_or_else(|| TranslateError::malformed(id, "instruction has no value")),
        }
    }

    /// Private global whose load stands in for `e` until it is translated.
    fn create_placeholder(&mut self, e: &'a Entity) -> Result<ValueRef> {
        let ty = self.translate_type(self.result_type(e)?)?;
        let name = match self.store.name(e.id) {
            Some(name) if !name.is_empty() => format!("placeholder.{name}"),
            _ => format!("placeholder.{}", e.id.0),
        };
        let global = self.module.add_global(&name, ty, 0, Linkage::Private);
        let mut b = self.builder(e.id)?;
        let load = b.push(
            Op::Load {
                ptr: ValueRef::Global(global),
                flags: MemFlags::default(),
            },
            ty,
            None,
        );
        let v = ValueRef::Inst(load);
        let fs = self.state_mut(e.id)?;
        fs.placeholders.insert(e.id, Placeholder { global, load });
        fs.values.insert(e.id, v);
        trace!(id = e.id.0, placeholder = %name, "created placeholder");
        Ok(v)
    }

    /// Record `v` as the value of `id`, resolving a pending placeholder.
    pub(crate) fn map_value(&mut self, id: Id, v: ValueRef) -> Result<ValueRef> {
        let fs = self.state_mut(id)?;
        let func = fs.func;
        if let Some(ph) = fs.placeholders.remove(&id) {
            let stand_in = self.module.global(ph.global).value_ty;
            let v = if self.module.types.int_width(self.module.types.scalar(stand_in)) == Some(8) {
                self.promote_bool(v)?
            } else {
                v
            };
            let f = self.module.function_mut(func);
            let uses = f.replace_all_uses(ValueRef::Inst(ph.load), v);
            f.erase_inst(ph.load);
            self.module.erase_global(ph.global);
            self.state_mut(id)?.values.insert(id, v);
            trace!(id = id.0, uses, "resolved placeholder");
            return Ok(v);
        }
        if fs.values.insert(id, v).is_some() {
            return Err(TranslateError::TranslatedTwice(id));
        }
        if let (ValueRef::Inst(inst), Some(name)) = (v, self.store.name(id)) {
            let inst = self.module.function_mut(func).inst_mut(inst);
            if inst.name.is_none() && !name.is_empty() {
                inst.name = Some(name.to_string());
            }
        }
        Ok(v)
    }

    // -- Bools --

    /// Zero-extend an `i1` (or vector of `i1`) value to `i8`. Other values
    /// pass through.
    pub(crate) fn promote_bool(&mut self, v: ValueRef) -> Result<ValueRef> {
        let ty = self.type_of(v)?;
        let types = &mut self.module.types;
        if types.int_width(types.scalar(ty)) != Some(1) {
            return Ok(v);
        }
        let wide = types.with_scalar_int(ty, 8);
        let (func, cached) = match &self.fs {
            Some(fs) => (Some(fs.func), fs.promoted.get(&v).copied()),
            None => (None, None),
        };
        if let Some(p) = cached {
            return Ok(p);
        }
        let func = match (v, func) {
            (ValueRef::Const(c), _) => return Ok(ValueRef::Const(self.promote_const(c, wide))),
            (ValueRef::Inst(_) | ValueRef::Arg(_), Some(func)) => func,
            _ => return Ok(v),
        };
        let f = self.module.function(func);
        let (block, index) = match v {
            ValueRef::Inst(i) => {
                let (block, pos) = f
                    .position(i)
                    .ok_or_else(|| TranslateError::malformed(Id(0), "promoting an erased instruction"))?;
                if matches!(f.inst(i).op, Op::Phi(_)) {
                    (block, f.first_non_phi(block))
                } else {
                    (block, pos + 1)
                }
            }
            _ => {
                let entry = f
                    .entry_block()
                    .ok_or_else(|| TranslateError::malformed(Id(0), "function without blocks"))?;
                (entry, f.entry_alloca_end())
            }
        };
        let origin = self.fs.as_ref().and_then(|fs| fs.origin);
        let mut b = self.builder_at(func, block, index);
        b.set_origin(origin.map_or_else(Origin::synthetic, |o| Origin::from_source(o.0)));
        let p = b.cast(CastOp::ZExt, v, wide, None);
        if let Some(fs) = self.fs.as_mut() {
            fs.promoted.insert(v, p);
        }
        Ok(p)
    }

    fn promote_const(&mut self, c: ConstRef, wide: TypeRef) -> ConstRef {
        let kind = self.module.constant(c).kind.clone();
        match kind {
            ConstKind::Int(n) => self.module.const_int(wide, n),
            ConstKind::Aggregate(elems) => {
                let elem_ty = self.module.types.scalar(wide);
                let elems = elems
                    .into_iter()
                    .map(|e| self.promote_const(e, elem_ty))
                    .collect();
                self.module.const_aggregate(wide, elems)
            }
            ConstKind::Undef => self.module.const_undef(wide),
            ConstKind::Null => self.module.const_null(wide),
            _ => self.module.const_cast(CastOp::ZExt, c, wide),
        }
    }

    /// Narrow an `i8` bool back to `i1`. Undoes `promote_bool` exactly.
    pub(crate) fn truncate_bool(&mut self, v: ValueRef) -> Result<ValueRef> {
        let ty = self.type_of(v)?;
        let types = &mut self.module.types;
        if types.int_width(types.scalar(ty)) != Some(8) {
            return Ok(v);
        }
        let narrow = types.with_scalar_int(ty, 1);
        match v {
            ValueRef::Const(c) => return Ok(ValueRef::Const(self.truncate_const(c, narrow))),
            ValueRef::Inst(i) => {
                if let Some(fs) = &self.fs {
                    if let Op::Cast(CastOp::ZExt, src) = self.module.function(fs.func).inst(i).op {
                        if self.type_of(src)? == narrow {
                            return Ok(src);
                        }
                    }
                }
            }
            _ => {}
        }
        let origin = self.state(Id(0))?.origin.unwrap_or(Id(0));
        let mut b = self.builder(origin)?;
        Ok(b.cast(CastOp::Trunc, v, narrow, None))
    }

    fn truncate_const(&mut self, c: ConstRef, narrow: TypeRef) -> ConstRef {
        let kind = self.module.constant(c).kind.clone();
        match kind {
            ConstKind::Int(n) => self.module.const_int(narrow, n),
            ConstKind::Aggregate(elems) => {
                let elem_ty = self.module.types.scalar(narrow);
                let elems = elems
                    .into_iter()
                    .map(|e| self.truncate_const(e, elem_ty))
                    .collect();
                self.module.const_aggregate(narrow, elems)
            }
            ConstKind::Undef => self.module.const_undef(narrow),
            ConstKind::Null => self.module.const_null(narrow),
            ConstKind::Cast(CastOp::ZExt, src) if self.module.constant(src).ty == narrow => src,
            _ => self.module.const_cast(CastOp::Trunc, c, narrow),
        }
    }

    /// Builder inserting at `index` of `block` in `func`.
    pub(crate) fn builder_at(&mut self, func: FuncRef, block: BlockRef, index: usize) -> Builder<'_> {
        let anchor = self.module.function(func).block(block).insts.get(index).copied();
        let loc = self.fs.as_ref().and_then(|fs| fs.debug_loc);
        let mut b = Builder::new(&mut self.module, func);
        match anchor {
            Some(inst) => b.position_before(inst),
            None => b.switch_to_block(block),
        }
        b.set_debug_loc(loc);
        b
    }

    // -- Constants --

    pub(crate) fn translate_constant(&mut self, e: &'a Entity) -> Result<ValueRef> {
        let ty_id = self.result_type(e)?;
        let c = match e.opcode {
            Opcode::ConstantTrue => self.module.const_bool(true),
            Opcode::ConstantFalse => self.module.const_bool(false),
            Opcode::SpecConstantTrue | Opcode::SpecConstantFalse => {
                let value = self
                    .spec_override(e.id)
                    .map_or(e.opcode == Opcode::SpecConstantTrue, |v| v != 0);
                self.module.const_bool(value)
            }
            Opcode::Constant => {
                if self.store.has_decoration(e.id, Decoration::SpecId) {
                    return Err(TranslateError::malformed(
                        e.id,
                        "only specialization constants can be specialized",
                    ));
                }
                let words = e.words_from(0);
                self.scalar_constant(e.id, ty_id, &words)?
            }
            Opcode::SpecConstant => {
                let words = match self.spec_override(e.id) {
                    Some(v) => vec![v as u32, (v >> 32) as u32],
                    None => e.words_from(0),
                };
                self.scalar_constant(e.id, ty_id, &words)?
            }
            Opcode::ConstantNull => {
                let ty = self.constant_type(ty_id)?;
                self.module.const_null(ty)
            }
            Opcode::Undef => {
                let ty = self.constant_type(ty_id)?;
                self.module.const_undef(ty)
            }
            Opcode::ConstantComposite | Opcode::SpecConstantComposite => {
                let ty = self.translate_type(ty_id)?;
                let mut parts = Vec::with_capacity(e.operands.len());
                for part in e.ids_from(0) {
                    let v = self.value(part, BoolMode::Promote)?;
                    parts.push(v.as_const().ok_or_else(|| {
                        TranslateError::malformed(e.id, "composite part is not a constant")
                    })?);
                }
                self.module.const_aggregate(ty, parts)
            }
            Opcode::ConstantSampler => {
                let addressing = self.operand_word(e, 0)?;
                let normalized = self.operand_word(e, 1)?;
                let filter = self.operand_word(e, 2)?;
                let ty = self.translate_type(ty_id)?;
                let value = (addressing << 1) | normalized | ((filter + 1) << 4);
                self.module.const_int(ty, value)
            }
            Opcode::ConstantPipeStorage => self.pipe_storage(e, ty_id)?,
            Opcode::SpecConstantOp => self.fold_spec_constant_op(e)?,
            other => {
                return Err(TranslateError::malformed(
                    e.id,
                    format!("{} is not a constant", other.name()),
                ))
            }
        };
        let v = ValueRef::Const(c);
        self.globals.insert(e.id, v);
        Ok(v)
    }

    fn spec_override(&self, id: Id) -> Option<u64> {
        let spec_id = self.store.decoration_word(id, Decoration::SpecId)?;
        self.options.spec_constant(spec_id)
    }

    /// Type a constant of source type `ty_id` is built in: the `i1` form for
    /// bools, the translated type otherwise.
    fn constant_type(&mut self, ty_id: Id) -> Result<TypeRef> {
        let ty = self.translate_type(ty_id)?;
        if self.is_bool_type(ty_id) {
            Ok(self.module.types.with_scalar_int(ty, 1))
        } else {
            Ok(ty)
        }
    }

    fn scalar_constant(&mut self, id: Id, ty_id: Id, words: &[u32]) -> Result<ConstRef> {
        let ty = self.constant_type(ty_id)?;
        if self.module.types.is_int(ty) {
            let value = BigInt::from(BigUint::new(words.to_vec()));
            return Ok(self.module.const_int(ty, value));
        }
        let lo = u64::from(words.first().copied().unwrap_or(0));
        let hi = u64::from(words.get(1).copied().unwrap_or(0));
        match self.module.types.float_type(ty) {
            Some(FloatType::F16) => Ok(self.module.const_float_bits(ty, lo & 0xFFFF)),
            Some(FloatType::F32) => Ok(self.module.const_float_bits(ty, lo)),
            Some(FloatType::F64) => Ok(self.module.const_float_bits(ty, lo | (hi << 32))),
            None => Err(TranslateError::malformed(id, "scalar constant of a non-scalar type")),
        }
    }

    /// Zero-filled pipe buffer whose first word holds `capacity + 1`.
    /// Only the header is materialized; the rest is a null array.
    fn pipe_storage(&mut self, e: &'a Entity, ty_id: Id) -> Result<ConstRef> {
        let packet_size = u64::from(self.operand_word(e, 0)?);
        let packet_align = self.operand_word(e, 1)?;
        let capacity = self.operand_word(e, 2)?;
        let slots = capacity
            .checked_add(1)
            .ok_or_else(|| TranslateError::malformed(e.id, "pipe capacity does not fit the header"))?;
        let total = packet_size
            .checked_mul(u64::from(slots))
            .and_then(|n| n.checked_add(PIPE_HEADER_RESERVED_SPACE))
            .ok_or_else(|| TranslateError::malformed(e.id, "pipe storage size overflows"))?;

        let i32_ty = self.module.types.int(32);
        let i8_ty = self.module.types.int(8);
        let tail_ty = self.module.types.array(i8_ty, total - 4);
        let buf_ty = self.module.types.literal_struct(vec![i32_ty, tail_ty], true);
        let header = self.module.const_int(i32_ty, slots);
        let tail = self.module.const_null(tail_ty);
        let init = self.module.const_aggregate(buf_ty, vec![header, tail]);
        let g = self.module.add_global("pipebuf", buf_ty, 1, Linkage::Internal);
        let gv = self.module.global_mut(g);
        gv.initializer = Some(init);
        gv.align = Some(packet_align.max(4));
        let addr = self.module.const_global_addr(g);
        let ty = self.translate_type(ty_id)?;
        Ok(self.module.const_cast(CastOp::Bitcast, addr, ty))
    }

    // -- Specialization constant operations --

    fn fold_spec_constant_op(&mut self, e: &'a Entity) -> Result<ConstRef> {
        let word = self.operand_word(e, 0)?;
        let op = Opcode::from_word(word)
            .ok_or_else(|| TranslateError::malformed(e.id, format!("unknown opcode {word}")))?;
        let ty_id = self.result_type(e)?;
        match op {
            Opcode::CompositeExtract => {
                let mut c = self.const_value(e.id, self.operand_id(e, 1)?)?;
                for index in e.words_from(2) {
                    c = self.const_member(e.id, c, index)?;
                }
                Ok(c)
            }
            Opcode::CompositeInsert => {
                let object = self.const_value(e.id, self.operand_id(e, 1)?)?;
                let composite = self.const_value(e.id, self.operand_id(e, 2)?)?;
                let indices = e.words_from(3);
                self.const_insert(e.id, composite, object, &indices)
            }
            Opcode::VectorShuffle => {
                let v1 = self.const_value(e.id, self.operand_id(e, 1)?)?;
                let v2 = self.const_value(e.id, self.operand_id(e, 2)?)?;
                let mut lanes = self.const_elements(e.id, v1)?;
                lanes.extend(self.const_elements(e.id, v2)?);
                let ty = self.translate_type(ty_id)?;
                let elem_ty = self.module.types.scalar(ty);
                let mut picked = Vec::new();
                for lane in e.words_from(3) {
                    picked.push(match lanes.get(lane as usize) {
                        Some(&c) => c,
                        None => self.module.const_undef(elem_ty),
                    });
                }
                Ok(self.module.const_aggregate(ty, picked))
            }
            Opcode::Select => {
                let cond = self.const_int_operand(e, 1)?.0;
                let pick = if cond == 0 { 3 } else { 2 };
                self.const_value(e.id, self.operand_id(e, pick)?)
            }
            Opcode::SConvert | Opcode::UConvert => {
                let (signed, unsigned) = self.const_int_operand(e, 1)?;
                let ty = self.translate_type(ty_id)?;
                let value = if op == Opcode::SConvert { signed } else { unsigned };
                Ok(self.module.const_int(ty, value))
            }
            _ => self.fold_integer_op(e, op, ty_id),
        }
    }

    /// Signed and zero-extended readings of an integer constant operand.
    fn const_int_operand(&mut self, e: &'a Entity, index: usize) -> Result<(i128, i128)> {
        let c = self.const_value(e.id, self.operand_id(e, index)?)?;
        let constant = self.module.constant(c);
        let bits = self.module.types.int_width(constant.ty).unwrap_or(64);
        let signed = constant.as_int().and_then(|v| v.to_i128());
        let unsigned = constant.as_u64(bits);
        match (signed, unsigned) {
            (Some(s), Some(u)) => Ok((s, i128::from(u))),
            _ => Err(TranslateError::not_implemented(format!(
                "specialization constant operation on non-integer operand {}",
                e.id
            ))),
        }
    }

    fn fold_integer_op(&mut self, e: &'a Entity, op: Opcode, ty_id: Id) -> Result<ConstRef> {
        let unary = matches!(op, Opcode::Not | Opcode::SNegate | Opcode::LogicalNot);
        let (a, au) = self.const_int_operand(e, 1)?;
        let (b, bu) = if unary { (0, 0) } else { self.const_int_operand(e, 2)? };
        let div_by_zero = || TranslateError::malformed(e.id, "division by zero in a specialization constant");
        let result: i128 = match op {
            Opcode::IAdd => a.wrapping_add(b),
            Opcode::ISub => a.wrapping_sub(b),
            Opcode::IMul => a.wrapping_mul(b),
            Opcode::UDiv => au.checked_div(bu).ok_or_else(div_by_zero)?,
            Opcode::SDiv => a.checked_div(b).ok_or_else(div_by_zero)?,
            Opcode::UMod => au.checked_rem(bu).ok_or_else(div_by_zero)?,
            Opcode::SRem => a.checked_rem(b).ok_or_else(div_by_zero)?,
            Opcode::SMod => {
                let r = a.checked_rem(b).ok_or_else(div_by_zero)?;
                if r != 0 && (r < 0) != (b < 0) {
                    r + b
                } else {
                    r
                }
            }
            Opcode::ShiftRightLogical => au.checked_shr(bu as u32).unwrap_or(0),
            Opcode::ShiftRightArithmetic => a.checked_shr(bu as u32).unwrap_or(if a < 0 { -1 } else { 0 }),
            Opcode::ShiftLeftLogical => a.checked_shl(bu as u32).unwrap_or(0),
            Opcode::BitwiseOr | Opcode::LogicalOr => a | b,
            Opcode::BitwiseXor => a ^ b,
            Opcode::BitwiseAnd | Opcode::LogicalAnd => a & b,
            Opcode::Not => !a,
            Opcode::SNegate => a.wrapping_neg(),
            Opcode::LogicalNot => i128::from(a == 0),
            Opcode::LogicalEqual | Opcode::IEqual => i128::from(au == bu),
            Opcode::LogicalNotEqual | Opcode::INotEqual => i128::from(au != bu),
            Opcode::UGreaterThan => i128::from(au > bu),
            Opcode::SGreaterThan => i128::from(a > b),
            Opcode::UGreaterThanEqual => i128::from(au >= bu),
            Opcode::SGreaterThanEqual => i128::from(a >= b),
            Opcode::ULessThan => i128::from(au < bu),
            Opcode::SLessThan => i128::from(a < b),
            Opcode::ULessThanEqual => i128::from(au <= bu),
            Opcode::SLessThanEqual => i128::from(a <= b),
            other => {
                return Err(TranslateError::not_implemented(format!(
                    "specialization constant operation {}",
                    other.name()
                )))
            }
        };
        if self.is_bool_type(ty_id) {
            return Ok(self.module.const_bool(result & 1 != 0));
        }
        let ty = self.translate_type(ty_id)?;
        Ok(self.module.const_int(ty, result))
    }

    /// Elements of a vector/array/struct constant, expanding null and undef.
    fn const_elements(&mut self, user: Id, c: ConstRef) -> Result<Vec<ConstRef>> {
        let constant = self.module.constant(c).clone();
        let count = match self.module.types.get(constant.ty) {
            Type::Vector { len, .. } => u64::from(*len),
            Type::Array { len, .. } => *len,
            Type::Struct(_) => self.module.types.struct_fields(constant.ty).len() as u64,
            _ => return Err(TranslateError::malformed(user, "not a composite constant")),
        };
        match constant.kind {
            ConstKind::Aggregate(elems) => Ok(elems),
            kind @ (ConstKind::Null | ConstKind::Undef) => {
                let null = kind == ConstKind::Null;
                let mut elems = Vec::with_capacity(count as usize);
                for i in 0..count {
                    let member = self
                        .module
                        .types
                        .member(constant.ty, i)
                        .ok_or_else(|| TranslateError::malformed(user, "bad composite member"))?;
                    elems.push(if null {
                        self.module.const_null(member)
                    } else {
                        self.module.const_undef(member)
                    });
                }
                Ok(elems)
            }
            _ => Err(TranslateError::not_implemented(format!(
                "specialization constant operation on {user}"
            ))),
        }
    }

    fn const_member(&mut self, user: Id, c: ConstRef, index: u32) -> Result<ConstRef> {
        self.const_elements(user, c)?
            .get(index as usize)
            .copied()
            .ok_or_else(|| TranslateError::malformed(user, format!("index {index} out of range")))
    }

    fn const_insert(&mut self, user: Id, composite: ConstRef, object: ConstRef, indices: &[u32]) -> Result<ConstRef> {
        let Some((&first, rest)) = indices.split_first() else {
            return Ok(object);
        };
        let ty = self.module.constant(composite).ty;
        let mut elems = self.const_elements(user, composite)?;
        let slot = elems
            .get(first as usize)
            .copied()
            .ok_or_else(|| TranslateError::malformed(user, format!("index {first} out of range")))?;
        elems[first as usize] = self.const_insert(user, slot, object, rest)?;
        Ok(self.module.const_aggregate(ty, elems))
    }

    // -- Variables --

    /// Whether a variable becomes a stack slot rather than a global.
    pub(crate) fn is_stack_variable(&self, e: &Entity) -> bool {
        e.word_at(0) == Some(StorageClass::Function.word()) && e.id_at(1).is_none()
    }

    /// Stack slot or global for an `OpVariable`.
    pub(crate) fn translate_variable(&mut self, e: &'a Entity) -> Result<ValueRef> {
        if let Some(&v) = self.globals.get(&e.id) {
            return Ok(v);
        }
        let ptr_ty = self.entity(self.result_type(e)?)?;
        let value_ty = self.translate_type(self.operand_id(ptr_ty, 1)?)?;
        let align = self.store.decoration_word(e.id, Decoration::Alignment);
        if self.is_stack_variable(e) && self.fs.is_some() {
            let mut b = self.builder(e.id)?;
            return Ok(b.entry_alloca(value_ty, align, None));
        }

        let storage = self.storage_class(e, 0)?;
        let init = e.id_at(1);
        let linkage = self.variable_linkage(e.id, init.is_some());
        let name = match (self.store.name(e.id), self.linkage_name(e.id)) {
            (Some(name), _) if !name.is_empty() => name.to_string(),
            (_, Some(name)) => name.to_string(),
            _ => "global".to_string(),
        };
        let g = self
            .module
            .add_global(&name, value_ty, address_space(storage), linkage);
        let v = ValueRef::Global(g);
        self.globals.insert(e.id, v);

        let initializer = match init {
            Some(init) => Some(self.value(init, BoolMode::Promote)?.as_const().ok_or_else(|| {
                TranslateError::malformed(e.id, "initializer is not a constant")
            })?),
            None if linkage == Linkage::Common => Some(self.module.const_null(value_ty)),
            None if storage == StorageClass::Workgroup => Some(self.module.const_undef(value_ty)),
            None => None,
        };
        let constant = self.store.has_decoration(e.id, Decoration::Constant);
        let i8_ty = self.module.types.int(8);
        let is_byte_array = matches!(
            self.module.types.get(value_ty),
            Type::Array { elem, .. } if *elem == i8_ty
        );
        let gv = self.module.global_mut(g);
        gv.initializer = initializer;
        gv.constant = constant;
        gv.align = align;
        gv.unnamed_addr = constant && is_byte_array;

        if let Some(word) = self.store.decoration_word(e.id, Decoration::BuiltIn) {
            let builtin = BuiltIn::from_word(word)
                .ok_or_else(|| TranslateError::not_implemented(format!("builtin variable {word}")))?;
            self.builtin_vars.push((g, builtin));
        }
        trace!(id = e.id.0, global = %name, ?linkage, "translated variable");
        Ok(v)
    }

    fn variable_linkage(&self, id: Id, initialized: bool) -> Linkage {
        let kind = self
            .store
            .decoration(id, Decoration::LinkageAttributes)
            .and_then(|d| d.args.get(1))
            .and_then(|a| a.as_word())
            .and_then(LinkageType::from_word);
        match kind {
            None => Linkage::Internal,
            Some(LinkageType::Import) if initialized => Linkage::AvailableExternally,
            Some(LinkageType::Import) => Linkage::External,
            Some(LinkageType::Export) if initialized => Linkage::External,
            Some(LinkageType::Export) => Linkage::Common,
        }
    }
}
