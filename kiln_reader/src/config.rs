//! Translator options.
//!
//! Options are plain serde structs so drivers can load them from JSON;
//! every field has a default, so `{}` is a valid configuration.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, TranslateError};
use crate::features::{CapabilityQuery, TargetFeature};

/// Feature switches of the compilation target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Capabilities {
    pub native_math: bool,
    pub half_precision_math: bool,
    pub lifetime_intrinsics: bool,
    pub memset_intrinsic: bool,
    pub signed_modulo_builtin: bool,
}

impl Default for Capabilities {
    fn default() -> Self {
        Self {
            native_math: true,
            half_precision_math: true,
            lifetime_intrinsics: true,
            memset_intrinsic: true,
            signed_modulo_builtin: false,
        }
    }
}

impl CapabilityQuery for Capabilities {
    fn supports(&self, feature: TargetFeature) -> bool {
        match feature {
            TargetFeature::NativeMath => self.native_math,
            TargetFeature::HalfPrecisionMath => self.half_precision_math,
            TargetFeature::LifetimeIntrinsics => self.lifetime_intrinsics,
            TargetFeature::MemSetIntrinsic => self.memset_intrinsic,
            TargetFeature::SignedModuloBuiltin => self.signed_modulo_builtin,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TranslatorOptions {
    /// Name of the produced module.
    pub module_name: String,
    /// Specialization constant overrides keyed by `SpecId`.
    pub spec_constants: BTreeMap<u32, u64>,
    pub capabilities: Capabilities,
    /// Run the IR verifier on the finished module.
    pub verify: bool,
    /// Write the textual module here after translation.
    pub dump_path: Option<PathBuf>,
}

impl Default for TranslatorOptions {
    fn default() -> Self {
        Self {
            module_name: "spirv".to_string(),
            spec_constants: BTreeMap::new(),
            capabilities: Capabilities::default(),
            verify: true,
            dump_path: None,
        }
    }
}

impl TranslatorOptions {
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| TranslateError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&text)
    }

    /// Override for the specialization constant with `spec_id`.
    pub fn spec_constant(&self, spec_id: u32) -> Option<u64> {
        self.spec_constants.get(&spec_id).copied()
    }
}
