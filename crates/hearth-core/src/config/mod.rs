//! Configuration plumbing shared by hearth binaries.
//!
//! Config values themselves live in the `hearth` crate; this module only knows
//! how to find YAML files, interpolate environment variables into them and
//! merge several files into one config.

mod component_key;
mod loader;
mod path;
mod vars;

pub use component_key::ComponentKey;
pub use loader::{Mergeable, load_from_paths};
pub use path::{ConfigPath, is_yaml_file};
pub use vars::{InterpolationResult, interpolate};

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Metrics configuration for the Prometheus endpoint served by `hearth serve`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MetricsConfig {
    /// Whether to install the Prometheus recorder (default: true).
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

fn default_true() -> bool {
    true
}

/// Soft-failure handling for one invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ErrorHandlingConfig {
    /// Maximum soft failures before the invocation fails (0 = unlimited, default: 0).
    #[serde(default)]
    pub max_failures: usize,
    /// Storage URL where rejected records are written as NDJSON.
    #[serde(default)]
    pub dlq_path: Option<String>,
    /// Storage options for the DLQ location (credentials, region, etc.)
    #[serde(default)]
    pub dlq_storage_options: HashMap<String, String>,
}
