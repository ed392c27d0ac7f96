//! Builtin name mangling.
//!
//! A builtin callee is named after the operation plus one code per
//! operand type, so overloads on different types get different symbols:
//! `__builtin_spirv_OpDot_v4f32_v4f32`.

use kiln_ir::types::{FloatType, Type, TypeTable};
use kiln_ir::value::TypeRef;
use kiln_spirv::Opcode;

pub const BUILTIN_PREFIX: &str = "__builtin_spirv_";
pub const EXT_INST_PREFIX: &str = "__builtin_spirv_OpenCL_";

/// Mangling code of one type.
pub fn type_code(types: &TypeTable, ty: TypeRef) -> String {
    match types.get(ty) {
        Type::Void => "void".to_string(),
        Type::Int(bits) => format!("i{bits}"),
        Type::Float(FloatType::F16) => "f16".to_string(),
        Type::Float(FloatType::F32) => "f32".to_string(),
        Type::Float(FloatType::F64) => "f64".to_string(),
        Type::Vector { elem, len } => format!("v{len}{}", type_code(types, *elem)),
        Type::Array { elem, len } => format!("a{len}{}", type_code(types, *elem)),
        Type::Ptr {
            pointee,
            addr_space,
        } => format!("p{addr_space}{}", type_code(types, *pointee)),
        Type::Struct(s) => match s.name.as_deref() {
            Some(name) => struct_code(name),
            None => {
                let fields = s.body.as_deref().unwrap_or(&[]);
                let mut code = format!("s{}", fields.len());
                for &f in fields {
                    code.push('_');
                    code.push_str(&type_code(types, f));
                }
                code.push_str("_e");
                code
            }
        },
        Type::Function { ret, params, .. } => {
            let mut code = format!("fn_{}", type_code(types, *ret));
            for &p in params {
                code.push('_');
                code.push_str(&type_code(types, p));
            }
            code
        }
    }
}

/// Named structs are length-prefixed so the code is self-delimiting:
/// `o<len><name>` for OpenCL object types, `S<len><name>` for `struct.`
/// types and `N<len><name>` for any other name.
fn struct_code(name: &str) -> String {
    let (tag, stripped) = if let Some(rest) = name.strip_prefix("opencl.") {
        ('o', rest)
    } else if let Some(rest) = name.strip_prefix("struct.") {
        ('S', rest)
    } else {
        ('N', name)
    };
    let escaped = escape_name(stripped);
    format!("{tag}{}{escaped}", escaped.len())
}

/// Keeps `[A-Za-z0-9_]` and writes any other character as `$<hex>$`.
fn escape_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for c in name.chars() {
        if c.is_ascii_alphanumeric() || c == '_' {
            out.push(c);
        } else {
            out.push_str(&format!("${:x}$", u32::from(c)));
        }
    }
    out
}

/// `base` followed by `_<code>` for every type.
pub fn mangle(base: &str, types: &TypeTable, tys: &[TypeRef]) -> String {
    let mut name = base.to_string();
    for &ty in tys {
        name.push('_');
        name.push_str(&type_code(types, ty));
    }
    name
}

/// Callee name of a lowered instruction, e.g. `__builtin_spirv_OpDot_v4f32_v4f32`.
/// `suffix` carries rounding and saturation tags of conversions.
pub fn mangle_builtin(op: Opcode, suffix: &str, types: &TypeTable, tys: &[TypeRef]) -> String {
    mangle(&format!("{BUILTIN_PREFIX}Op{}{suffix}", op.name()), types, tys)
}

/// Callee name of an OpenCL.std extended instruction.
pub fn mangle_ext_inst(name: &str, types: &TypeTable, tys: &[TypeRef]) -> String {
    mangle(&format!("{EXT_INST_PREFIX}{name}"), types, tys)
}

/// Callee name of a builtin variable accessor.
pub fn builtin_variable(name: &str) -> String {
    format!("{BUILTIN_PREFIX}BuiltIn{name}")
}
