//! Shim configuration — import namespace and the export names the runtime looks up.
//!
//! The CLI always runs with [`ShimConfig::default`]. Embedders can load
//! overrides from YAML; missing keys fall back to the defaults.

use serde::{Deserialize, Serialize};

pub const DEFAULT_NAMESPACE: &str = "env";
pub const DEFAULT_ENTRY: &str = "wasm_main";
pub const DEFAULT_MEMORY: &str = "memory";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShimConfig {
    /// Import module name the host calls are registered under.
    pub namespace: String,
    /// Exported zero-argument function invoked to start the guest.
    pub entry: String,
    /// Exported linear memory the host calls read and write.
    pub memory: String,
}

impl Default for ShimConfig {
    fn default() -> Self {
        Self {
            namespace: DEFAULT_NAMESPACE.into(),
            entry: DEFAULT_ENTRY.into(),
            memory: DEFAULT_MEMORY.into(),
        }
    }
}

impl ShimConfig {
    pub fn from_yaml(yaml: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(yaml)
    }
}
