//! kiln_ir: SSA intermediate representation produced by the kiln reader.

pub mod builder;
pub mod constant;
pub mod display;
pub mod function;
pub mod global;
pub mod instruction;
pub mod layout;
pub mod metadata;
pub mod module;
pub mod types;
pub mod value;
pub mod verifier;

#[cfg(test)]
mod tests;
