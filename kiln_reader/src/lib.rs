//! kiln_reader: translates a SPIR-V entity store into kiln SSA IR.
//!
//! [`translate`] is the usual entry point. [`Translator`] is public for
//! callers that bring their own capability query or diagnostic sink.

mod abi;
mod alias;
mod builtin_vars;
pub mod config;
mod debuginfo;
pub mod diag;
mod dispatch;
pub mod error;
pub mod features;
mod kernel_md;
pub mod mangle;
pub mod module_md;
pub mod translator;
mod types;
mod values;

pub use config::{Capabilities, TranslatorOptions};
pub use diag::{Advisory, CollectingSink, DiagnosticSink, TracingSink};
pub use error::{Result, TranslateError};
pub use features::{CapabilityQuery, TargetFeature};
pub use module_md::{ArgInfo, FunctionMetadata, ModuleMetadata};
pub use translator::{Translation, Translator};

use kiln_spirv::EntityStore;

/// Translate `store` with the capabilities named in `options`. Advisories
/// are only logged.
pub fn translate(store: &EntityStore, options: &TranslatorOptions) -> Result<Translation> {
    let mut sink = TracingSink;
    translate_with(store, options, &options.capabilities, &mut sink)
}

/// Translate `store` against an explicit capability query, reporting
/// advisories to `sink`.
pub fn translate_with(
    store: &EntityStore,
    options: &TranslatorOptions,
    caps: &dyn CapabilityQuery,
    sink: &mut dyn DiagnosticSink,
) -> Result<Translation> {
    Translator::new(store, options, caps, sink).run()
}

#[cfg(test)]
mod tests;
