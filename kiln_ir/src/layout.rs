//! Target data layout: sizes and alignments of IR types.

use crate::types::{StructType, Type, TypeTable};
use crate::value::TypeRef;

/// Pointer width and the derived size/alignment rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataLayout {
    /// Pointer size in bytes.
    pub pointer_size: u32,
}

impl Default for DataLayout {
    fn default() -> Self {
        Self { pointer_size: 8 }
    }
}

impl DataLayout {
    pub fn new(pointer_size: u32) -> Self {
        Self { pointer_size }
    }

    /// Store size in bytes, without tail padding.
    pub fn size_of(&self, types: &TypeTable, ty: TypeRef) -> u64 {
        match types.get(ty) {
            Type::Void | Type::Function { .. } => 0,
            Type::Int(bits) => u64::from(*bits).div_ceil(8),
            Type::Float(ft) => u64::from(ft.bits() / 8),
            Type::Ptr { .. } => u64::from(self.pointer_size),
            Type::Vector { elem, len } => {
                let elem_size = self.size_of(types, *elem);
                // Three-element vectors occupy four lanes.
                let lanes = if *len == 3 { 4 } else { u64::from(*len) };
                elem_size * lanes
            }
            Type::Array { elem, len } => self.alloc_size(types, *elem) * len,
            Type::Struct(s) => self.struct_layout(types, s).0,
        }
    }

    /// ABI alignment in bytes.
    pub fn align_of(&self, types: &TypeTable, ty: TypeRef) -> u64 {
        match types.get(ty) {
            Type::Void | Type::Function { .. } => 1,
            Type::Int(bits) => u64::from(*bits).div_ceil(8).next_power_of_two().min(8),
            Type::Float(ft) => u64::from(ft.bits() / 8),
            Type::Ptr { .. } => u64::from(self.pointer_size),
            Type::Vector { .. } => self.size_of(types, ty).next_power_of_two(),
            Type::Array { elem, .. } => self.align_of(types, *elem),
            Type::Struct(s) => self.struct_layout(types, s).1,
        }
    }

    /// Size rounded up to alignment: the stride between array elements.
    pub fn alloc_size(&self, types: &TypeTable, ty: TypeRef) -> u64 {
        let size = self.size_of(types, ty);
        let align = self.align_of(types, ty).max(1);
        size.div_ceil(align) * align
    }

    /// Byte offset of each field of a struct.
    pub fn field_offsets(&self, types: &TypeTable, ty: TypeRef) -> Vec<u64> {
        let Type::Struct(s) = types.get(ty) else {
            return Vec::new();
        };
        let mut offsets = Vec::new();
        let mut offset = 0u64;
        for &field in s.body.as_deref().unwrap_or(&[]) {
            if !s.packed {
                let align = self.align_of(types, field).max(1);
                offset = offset.div_ceil(align) * align;
            }
            offsets.push(offset);
            offset += self.alloc_size(types, field);
        }
        offsets
    }

    /// (size, align) of a struct with C layout.
    fn struct_layout(&self, types: &TypeTable, s: &StructType) -> (u64, u64) {
        let Some(fields) = s.body.as_deref() else {
            return (0, 1);
        };
        let mut offset = 0u64;
        let mut max_align = 1u64;
        for &field in fields {
            let align = if s.packed {
                1
            } else {
                self.align_of(types, field).max(1)
            };
            max_align = max_align.max(align);
            offset = offset.div_ceil(align) * align;
            offset += self.alloc_size(types, field);
        }
        (offset.div_ceil(max_align) * max_align, max_align)
    }
}
