//! Errors raised while translating a module.
//!
//! Every variant is fatal: translation stops at the first error and no
//! partial module is returned. Non-fatal findings go to the
//! [`DiagnosticSink`](crate::diag::DiagnosticSink) instead.

use std::path::PathBuf;

use kiln_spirv::Id;
use thiserror::Error;

pub type Result<T, E = TranslateError> = std::result::Result<T, E>;

#[derive(Error, Debug)]
pub enum TranslateError {
    /// An id is referenced but has no record in the store.
    #[error("entity {0} is missing from the store")]
    MissingEntity(Id),

    /// A record does not have the shape its opcode requires.
    #[error("malformed entity {id}: {what}")]
    Malformed { id: Id, what: String },

    #[error("unsupported type {id}: {what}")]
    UnsupportedType { id: Id, what: String },

    /// `map_value` was asked to bind an id that already has a real value.
    #[error("entity {0} translated twice")]
    TranslatedTwice(Id),

    /// A forward reference was never defined in its function.
    #[error("forward reference to {id} in @{function} was never resolved")]
    UnresolvedPlaceholder { id: Id, function: String },

    #[error("debug scope {0} is its own ancestor")]
    DebugScopeCycle(Id),

    /// An instruction needs a function body but none is being translated.
    #[error("entity {0} can only be translated inside a function")]
    OutsideFunction(Id),

    /// A construct the reader recognizes but does not lower.
    #[error("{what} not implemented")]
    NotImplemented { what: String },

    #[error("translated module failed verification:\n{0}")]
    Verification(String),

    #[error("invalid translator options: {0}")]
    Options(#[from] serde_json::Error),

    #[error("cannot access {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl TranslateError {
    pub fn malformed(id: Id, what: impl Into<String>) -> Self {
        TranslateError::Malformed {
            id,
            what: what.into(),
        }
    }

    pub fn unsupported_type(id: Id, what: impl Into<String>) -> Self {
        TranslateError::UnsupportedType {
            id,
            what: what.into(),
        }
    }

    pub fn not_implemented(what: impl Into<String>) -> Self {
        TranslateError::NotImplemented { what: what.into() }
    }
}
