//! Type system for kiln IR.
//!
//! Types:
//! - `void`, `iN`, `half` / `float` / `double`
//! - `T addrspace(N)*`: typed pointer with address space
//! - `<N x T>` vectors and `[N x T]` arrays
//! - structs: nominal (named, possibly opaque, possibly recursive) or literal
//! - function types
//!
//! Non-struct types and literal structs are hash-consed, so equal shapes
//! share one `TypeRef`. Named structs are nominal: each `create_struct`
//! yields a fresh type whose body may be set later, which is how recursive
//! type graphs are tied off.

use rustc_hash::FxHashMap;

use crate::value::TypeRef;

/// Floating point type variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FloatType {
    /// IEEE 754 half precision.
    F16,
    /// IEEE 754 single precision.
    F32,
    /// IEEE 754 double precision.
    F64,
}

impl FloatType {
    pub fn bits(self) -> u32 {
        match self {
            FloatType::F16 => 16,
            FloatType::F32 => 32,
            FloatType::F64 => 64,
        }
    }
}

/// Struct type body. `body == None` means opaque.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StructType {
    pub name: Option<String>,
    pub body: Option<Vec<TypeRef>>,
    pub packed: bool,
}

/// A type in the kiln IR.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Type {
    Void,
    /// Fixed-width integer.
    Int(u32),
    Float(FloatType),
    Ptr { pointee: TypeRef, addr_space: u32 },
    Vector { elem: TypeRef, len: u32 },
    Array { elem: TypeRef, len: u64 },
    Struct(StructType),
    Function {
        ret: TypeRef,
        params: Vec<TypeRef>,
        vararg: bool,
    },
}

/// Module-wide type arena.
#[derive(Debug, Clone, Default)]
pub struct TypeTable {
    types: Vec<Type>,
    interned: FxHashMap<Type, TypeRef>,
    structs_by_name: FxHashMap<String, TypeRef>,
}

impl TypeTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a type by reference.
    pub fn get(&self, r: TypeRef) -> &Type {
        &self.types[r.0 as usize]
    }

    /// Number of types in the arena.
    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Iterate all types in creation order.
    pub fn iter(&self) -> impl Iterator<Item = (TypeRef, &Type)> {
        self.types
            .iter()
            .enumerate()
            .map(|(i, t)| (TypeRef(i as u32), t))
    }

    fn push(&mut self, ty: Type) -> TypeRef {
        let r = TypeRef(self.types.len() as u32);
        self.types.push(ty);
        r
    }

    /// Intern a structural type. Named structs must go through `create_struct`.
    pub fn intern(&mut self, ty: Type) -> TypeRef {
        debug_assert!(!matches!(&ty, Type::Struct(s) if s.name.is_some()));
        if let Some(&r) = self.interned.get(&ty) {
            return r;
        }
        let r = self.push(ty.clone());
        self.interned.insert(ty, r);
        r
    }

    pub fn void(&mut self) -> TypeRef {
        self.intern(Type::Void)
    }

    pub fn int(&mut self, bits: u32) -> TypeRef {
        self.intern(Type::Int(bits))
    }

    pub fn float(&mut self, ft: FloatType) -> TypeRef {
        self.intern(Type::Float(ft))
    }

    pub fn ptr(&mut self, pointee: TypeRef, addr_space: u32) -> TypeRef {
        self.intern(Type::Ptr {
            pointee,
            addr_space,
        })
    }

    pub fn vector(&mut self, elem: TypeRef, len: u32) -> TypeRef {
        self.intern(Type::Vector { elem, len })
    }

    pub fn array(&mut self, elem: TypeRef, len: u64) -> TypeRef {
        self.intern(Type::Array { elem, len })
    }

    pub fn function(&mut self, ret: TypeRef, params: Vec<TypeRef>, vararg: bool) -> TypeRef {
        self.intern(Type::Function {
            ret,
            params,
            vararg,
        })
    }

    /// Anonymous literal struct `{ a, b, ... }`.
    pub fn literal_struct(&mut self, fields: Vec<TypeRef>, packed: bool) -> TypeRef {
        self.intern(Type::Struct(StructType {
            name: None,
            body: Some(fields),
            packed,
        }))
    }

    /// Create a fresh opaque named struct. A taken name gets a `.N` suffix.
    pub fn create_struct(&mut self, name: &str) -> TypeRef {
        let mut unique = name.to_string();
        let mut n = 0u32;
        while self.structs_by_name.contains_key(&unique) {
            n += 1;
            unique = format!("{name}.{n}");
        }
        let r = self.push(Type::Struct(StructType {
            name: Some(unique.clone()),
            body: None,
            packed: false,
        }));
        self.structs_by_name.insert(unique, r);
        r
    }

    /// Get the named struct `name`, creating it opaque if missing.
    pub fn named_struct(&mut self, name: &str) -> TypeRef {
        match self.structs_by_name.get(name) {
            Some(&r) => r,
            None => self.create_struct(name),
        }
    }

    /// Look up an existing named struct.
    pub fn struct_by_name(&self, name: &str) -> Option<TypeRef> {
        self.structs_by_name.get(name).copied()
    }

    /// Fill in the body of a named struct.
    pub fn set_struct_body(&mut self, r: TypeRef, fields: Vec<TypeRef>, packed: bool) {
        if let Type::Struct(s) = &mut self.types[r.0 as usize] {
            s.body = Some(fields);
            s.packed = packed;
        }
    }

    // -- Queries --

    pub fn is_void(&self, r: TypeRef) -> bool {
        matches!(self.get(r), Type::Void)
    }

    pub fn int_width(&self, r: TypeRef) -> Option<u32> {
        match self.get(r) {
            Type::Int(bits) => Some(*bits),
            _ => None,
        }
    }

    pub fn float_type(&self, r: TypeRef) -> Option<FloatType> {
        match self.get(r) {
            Type::Float(ft) => Some(*ft),
            _ => None,
        }
    }

    pub fn is_int(&self, r: TypeRef) -> bool {
        self.int_width(r).is_some()
    }

    pub fn is_float(&self, r: TypeRef) -> bool {
        self.float_type(r).is_some()
    }

    pub fn is_ptr(&self, r: TypeRef) -> bool {
        matches!(self.get(r), Type::Ptr { .. })
    }

    pub fn is_vector(&self, r: TypeRef) -> bool {
        matches!(self.get(r), Type::Vector { .. })
    }

    pub fn is_struct(&self, r: TypeRef) -> bool {
        matches!(self.get(r), Type::Struct(_))
    }

    /// Struct or array: values that the ABI passes through memory.
    pub fn is_aggregate(&self, r: TypeRef) -> bool {
        matches!(self.get(r), Type::Struct(_) | Type::Array { .. })
    }

    pub fn pointee(&self, r: TypeRef) -> Option<TypeRef> {
        match self.get(r) {
            Type::Ptr { pointee, .. } => Some(*pointee),
            _ => None,
        }
    }

    pub fn addr_space(&self, r: TypeRef) -> Option<u32> {
        match self.get(r) {
            Type::Ptr { addr_space, .. } => Some(*addr_space),
            _ => None,
        }
    }

    pub fn vector_len(&self, r: TypeRef) -> Option<u32> {
        match self.get(r) {
            Type::Vector { len, .. } => Some(*len),
            _ => None,
        }
    }

    /// Element type of a vector or array.
    pub fn elem(&self, r: TypeRef) -> Option<TypeRef> {
        match self.get(r) {
            Type::Vector { elem, .. } | Type::Array { elem, .. } => Some(*elem),
            _ => None,
        }
    }

    /// Element type for vectors, the type itself otherwise.
    pub fn scalar(&self, r: TypeRef) -> TypeRef {
        match self.get(r) {
            Type::Vector { elem, .. } => *elem,
            _ => r,
        }
    }

    pub fn struct_name(&self, r: TypeRef) -> Option<&str> {
        match self.get(r) {
            Type::Struct(s) => s.name.as_deref(),
            _ => None,
        }
    }

    /// Fields of a struct with a body; empty for opaque or non-struct types.
    pub fn struct_fields(&self, r: TypeRef) -> &[TypeRef] {
        match self.get(r) {
            Type::Struct(StructType {
                body: Some(fields), ..
            }) => fields,
            _ => &[],
        }
    }

    pub fn is_opaque_struct(&self, r: TypeRef) -> bool {
        matches!(self.get(r), Type::Struct(StructType { body: None, .. }))
    }

    /// Return and parameter types of a function type.
    pub fn signature(&self, r: TypeRef) -> Option<(TypeRef, &[TypeRef], bool)> {
        match self.get(r) {
            Type::Function {
                ret,
                params,
                vararg,
            } => Some((*ret, params, *vararg)),
            _ => None,
        }
    }

    /// Type of member `index` of an aggregate or vector.
    pub fn member(&self, r: TypeRef, index: u64) -> Option<TypeRef> {
        match self.get(r) {
            Type::Struct(_) => self.struct_fields(r).get(index as usize).copied(),
            Type::Array { elem, .. } | Type::Vector { elem, .. } => Some(*elem),
            _ => None,
        }
    }

    /// `iN`-typed scalar or vector with the same lane count as `like`.
    pub fn with_scalar_int(&mut self, like: TypeRef, bits: u32) -> TypeRef {
        let scalar = self.int(bits);
        match self.vector_len(like) {
            Some(len) => self.vector(scalar, len),
            None => scalar,
        }
    }
}
