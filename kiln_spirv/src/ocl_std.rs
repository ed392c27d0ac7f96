//! OpenCL.std extended instruction names.

const MATH: [&str; 95] = [
    "acos", "acosh", "acospi", "asin", "asinh", "asinpi", "atan", "atan2", "atanh", "atanpi",
    "atan2pi", "cbrt", "ceil", "copysign", "cos", "cosh", "cospi", "erfc", "erf", "exp", "exp2",
    "exp10", "expm1", "fabs", "fdim", "floor", "fma", "fmax", "fmin", "fmod", "fract", "frexp",
    "hypot", "ilogb", "ldexp", "lgamma", "lgamma_r", "log", "log2", "log10", "log1p", "logb",
    "mad", "maxmag", "minmag", "modf", "nan", "nextafter", "pow", "pown", "powr", "remainder",
    "remquo", "rint", "rootn", "round", "rsqrt", "sin", "sincos", "sinh", "sinpi", "sqrt", "tan",
    "tanh", "tanpi", "tgamma", "trunc", "half_cos", "half_divide", "half_exp", "half_exp2",
    "half_exp10", "half_log", "half_log2", "half_log10", "half_powr", "half_recip", "half_rsqrt",
    "half_sin", "half_sqrt", "half_tan", "native_cos", "native_divide", "native_exp",
    "native_exp2", "native_exp10", "native_log", "native_log2", "native_log10", "native_powr",
    "native_recip", "native_rsqrt", "native_sin", "native_sqrt", "native_tan",
];

const COMMON: [&str; 16] = [
    "fclamp", "degrees", "fmax_common", "fmin_common", "mix", "radians", "step", "smoothstep",
    "sign", "cross", "distance", "length", "normalize", "fast_distance", "fast_length",
    "fast_normalize",
];
const COMMON_BASE: u32 = 95;

const INTEGER: [&str; 30] = [
    "s_abs", "s_abs_diff", "s_add_sat", "u_add_sat", "s_hadd", "u_hadd", "s_rhadd", "u_rhadd",
    "s_clamp", "u_clamp", "clz", "ctz", "s_mad_hi", "u_mad_sat", "s_mad_sat", "s_max", "u_max",
    "s_min", "u_min", "s_mul_hi", "rotate", "s_sub_sat", "u_sub_sat", "u_upsample", "s_upsample",
    "popcount", "s_mad24", "u_mad24", "s_mul24", "u_mul24",
];
const INTEGER_BASE: u32 = 141;

const MISC: [&str; 17] = [
    "vloadn", "vstoren", "vload_half", "vload_halfn", "vstore_half", "vstore_half_r",
    "vstore_halfn", "vstore_halfn_r", "vloada_halfn", "vstorea_halfn", "vstorea_halfn_r",
    "shuffle", "shuffle2", "printf", "prefetch", "bitselect", "select",
];
const MISC_BASE: u32 = 171;

const UNSIGNED: [&str; 4] = ["u_abs", "u_abs_diff", "u_mul_hi", "u_mad_hi"];
const UNSIGNED_BASE: u32 = 201;

pub const PRINTF: u32 = 184;

fn lookup(table: &'static [&'static str], base: u32, op: u32) -> Option<&'static str> {
    let index = op.checked_sub(base)?;
    table.get(index as usize).copied()
}

/// Name of an OpenCL.std instruction number.
pub fn name(op: u32) -> Option<&'static str> {
    lookup(&MATH, 0, op)
        .or_else(|| lookup(&COMMON, COMMON_BASE, op))
        .or_else(|| lookup(&INTEGER, INTEGER_BASE, op))
        .or_else(|| lookup(&MISC, MISC_BASE, op))
        .or_else(|| lookup(&UNSIGNED, UNSIGNED_BASE, op))
}

/// Instruction number of an OpenCL.std name.
pub fn op_of(name: &str) -> Option<u32> {
    let tables: [(&[&str], u32); 5] = [
        (&MATH, 0),
        (&COMMON, COMMON_BASE),
        (&INTEGER, INTEGER_BASE),
        (&MISC, MISC_BASE),
        (&UNSIGNED, UNSIGNED_BASE),
    ];
    tables.iter().find_map(|(table, base)| {
        table
            .iter()
            .position(|n| *n == name)
            .map(|i| base + i as u32)
    })
}
