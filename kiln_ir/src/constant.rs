//! Module-level constants.
//!
//! Constants are hash-consed per (type, kind). Integer payloads are stored
//! normalized: `i1` as 0/1, wider integers as the signed value of their
//! low `N` bits, so equal bit patterns intern to the same constant.

use num_bigint::BigInt;
use num_traits::{One, ToPrimitive, Zero};

use crate::instruction::CastOp;
use crate::value::{ConstRef, FuncRef, GlobalRef, TypeRef};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ConstKind {
    Int(BigInt),
    /// IEEE bit pattern in the width of the constant's type.
    Float(u64),
    /// Null pointer or zero-initialized value of any type.
    Null,
    Undef,
    /// Elements of a vector, array or struct.
    Aggregate(Vec<ConstRef>),
    /// Raw `[N x i8]` payload.
    Bytes(Vec<u8>),
    GlobalAddr(GlobalRef),
    FuncAddr(FuncRef),
    /// Constant conversion expression.
    Cast(CastOp, ConstRef),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Constant {
    pub ty: TypeRef,
    pub kind: ConstKind,
}

impl Constant {
    pub fn as_int(&self) -> Option<&BigInt> {
        match &self.kind {
            ConstKind::Int(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        self.as_int().and_then(|v| v.to_i64())
    }

    /// Zero-extended value of an integer constant of width `bits`.
    pub fn as_u64(&self, bits: u32) -> Option<u64> {
        let v = self.as_int()?;
        let modulus = BigInt::one() << bits.min(64);
        let mut r = v % &modulus;
        if r < BigInt::zero() {
            r += modulus;
        }
        r.to_u64()
    }

    pub fn is_null(&self) -> bool {
        matches!(self.kind, ConstKind::Null)
    }
}

/// Wrap `value` into the normalized representation for an `bits`-wide integer.
pub fn normalize_int(value: BigInt, bits: u32) -> BigInt {
    if bits == 0 {
        return BigInt::zero();
    }
    let modulus = BigInt::one() << bits;
    let mut r = value % &modulus;
    if r < BigInt::zero() {
        r += &modulus;
    }
    if bits > 1 && r >= (BigInt::one() << (bits - 1)) {
        r -= modulus;
    }
    r
}

/// Convert a finite `f64` into IEEE half bits (round to nearest even).
pub fn f64_to_half_bits(value: f64) -> u16 {
    let bits = (value as f32).to_bits();
    let sign = ((bits >> 16) & 0x8000) as u16;
    let exp = ((bits >> 23) & 0xff) as i32;
    let mant = bits & 0x7f_ffff;
    if exp == 0xff {
        let nan = if mant != 0 { 0x200 } else { 0 };
        return sign | 0x7c00 | nan;
    }
    let e = exp - 127 + 15;
    if e >= 0x1f {
        return sign | 0x7c00;
    }
    if e <= 0 {
        if e < -10 {
            return sign;
        }
        let m = mant | 0x80_0000;
        let shift = (14 - e) as u32;
        let half = 1u32 << (shift - 1);
        let mut r = m >> shift;
        let rem = m & ((1 << shift) - 1);
        if rem > half || (rem == half && r & 1 == 1) {
            r += 1;
        }
        return sign | r as u16;
    }
    let mut r = ((e as u32) << 10) | (mant >> 13);
    let rem = mant & 0x1fff;
    if rem > 0x1000 || (rem == 0x1000 && r & 1 == 1) {
        r += 1;
    }
    sign | r as u16
}
