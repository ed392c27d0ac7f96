//! Module-level global variables.

use crate::value::{ConstRef, MdRef, TypeRef};

/// Symbol linkage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Linkage {
    External,
    Internal,
    Private,
    AvailableExternally,
    Common,
}

/// A global variable. The global itself denotes its address (`ptr_ty`).
#[derive(Debug, Clone)]
pub struct GlobalVar {
    pub name: String,
    pub value_ty: TypeRef,
    pub ptr_ty: TypeRef,
    pub addr_space: u32,
    pub linkage: Linkage,
    pub constant: bool,
    pub initializer: Option<ConstRef>,
    pub align: Option<u32>,
    pub unnamed_addr: bool,
    /// Attached `!dbg` global variable expressions.
    pub debug: Vec<MdRef>,
    /// Erased globals keep their slot so references stay stable.
    pub erased: bool,
}
