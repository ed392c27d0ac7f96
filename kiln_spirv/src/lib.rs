//! kiln_spirv: the parsed SPIR-V entity store consumed by the kiln reader.
//!
//! The binary decoder lives outside this crate; it fills an [`EntityStore`]
//! through [`StoreBuilder`]. Tests build stores the same way.

macro_rules! word_enum {
    ($(#[$doc:meta])* $name:ident { $($variant:ident = $word:literal,)* }) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub enum $name {
            $($variant,)*
        }

        impl $name {
            pub fn from_word(word: u32) -> Option<$name> {
                match word {
                    $($word => Some($name::$variant),)*
                    _ => None,
                }
            }

            pub fn word(self) -> u32 {
                match self {
                    $($name::$variant => $word,)*
                }
            }

            pub fn name(self) -> &'static str {
                match self {
                    $($name::$variant => stringify!($variant),)*
                }
            }
        }
    };
}

pub mod builder;
pub mod debug;
pub mod entity;
pub mod enums;
pub mod ocl_std;
pub mod opcode;
pub mod store;

pub use builder::StoreBuilder;
pub use entity::{Entity, Id, LineInfo, Operand};
pub use enums::*;
pub use opcode::Opcode;
pub use store::{BlockDef, DecorationEntry, EntityStore, EntryPoint, FunctionDef};

#[cfg(test)]
mod tests;
