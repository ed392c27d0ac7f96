//! Per-module metadata record handed to later compilation stages.
//!
//! The record mirrors what the kernel metadata nodes carry plus the bits
//! that have no IR form (annotations, initializer/finalizer flags,
//! sub-group counts, byte-offset limits).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Argument description used by `opencl.kernels` and by the runtime.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArgInfo {
    pub addr_space: u32,
    pub access_qual: String,
    pub type_name: String,
    pub type_qual: String,
    pub base_type: String,
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionMetadata {
    pub is_kernel: bool,
    /// `UserSemantic` strings on the function.
    pub annotations: Vec<String>,
    pub is_initializer: bool,
    pub is_finalizer: bool,
    /// `SubgroupsPerWorkgroup` execution mode.
    pub compiled_subgroups: Option<u32>,
    /// `MaxByteOffset` per argument, 0 where absent. Empty when no
    /// argument carries the decoration.
    pub max_byte_offsets: Vec<u32>,
    pub args: Vec<ArgInfo>,
    pub reqd_work_group_size: Option<[u32; 3]>,
    pub work_group_size_hint: Option<[u32; 3]>,
    pub vec_type_hint: Option<String>,
    pub required_sub_group_size: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleMetadata {
    /// Keyed by translated function name.
    pub functions: BTreeMap<String, FunctionMetadata>,
    pub spir_version: Option<(u32, u32)>,
    pub ocl_version: Option<(u32, u32)>,
    pub used_extensions: Vec<String>,
    pub used_optional_core_features: Vec<String>,
    pub fp_contract: bool,
}

impl ModuleMetadata {
    pub fn function(&self, name: &str) -> Option<&FunctionMetadata> {
        self.functions.get(name)
    }

    pub fn function_mut(&mut self, name: &str) -> &mut FunctionMetadata {
        self.functions.entry(name.to_string()).or_default()
    }

    pub fn kernels(&self) -> impl Iterator<Item = (&str, &FunctionMetadata)> {
        self.functions
            .iter()
            .filter(|(_, f)| f.is_kernel)
            .map(|(n, f)| (n.as_str(), f))
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
