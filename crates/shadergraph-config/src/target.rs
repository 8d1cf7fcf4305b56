//! Target declarations
//!
//! One `[[target]]` table of `shaders.toml` per shader library or binary.

use crate::{ConfigError, ConfigResult};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Kind of a declared target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetKindConfig {
    /// Exposes headers and intermediate artifacts to dependents
    #[default]
    Library,
    /// Links its whole transitive closure into one library file
    Binary,
}

/// A `[[target]]` entry
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct TargetConfig {
    /// Target label (`//package:name`)
    pub label: String,

    /// Target kind (default: library)
    #[serde(default)]
    pub kind: TargetKindConfig,

    /// Shader sources and private headers
    #[serde(default)]
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub srcs: Vec<PathBuf>,

    /// Public headers
    #[serde(default)]
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub hdrs: Vec<PathBuf>,

    /// Build dependencies (labels)
    #[serde(default)]
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub deps: Vec<String>,

    /// Extra compiler/linker flags, appended last
    #[serde(default)]
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub copts: Vec<String>,

    /// Prefix added to the virtual include path of every public header
    #[serde(default)]
    #[serde(skip_serializing_if = "String::is_empty")]
    pub include_prefix: String,

    /// Prefix stripped from the real path of every public header
    #[serde(default)]
    #[serde(skip_serializing_if = "String::is_empty")]
    pub strip_include_prefix: String,

    /// Declared output file, relative to the output root
    #[serde(skip_serializing_if = "Option::is_none")]
    pub out: Option<PathBuf>,

    /// Runtime data edges
    #[serde(default)]
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub data: Vec<String>,

    /// Implementation-only dependency edges
    #[serde(default)]
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub implementation_deps: Vec<String>,
}

impl TargetConfig {
    /// Validate a single target entry
    pub fn validate(&self) -> ConfigResult<()> {
        if self.label.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "target.label".to_string(),
                reason: "label cannot be empty".to_string(),
            });
        }

        if self.kind == TargetKindConfig::Binary && self.srcs.is_empty() && self.deps.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: format!("target '{}'", self.label),
                reason: "binary needs srcs or deps to link".to_string(),
            });
        }

        for dep in self.deps.iter().chain(&self.data).chain(&self.implementation_deps) {
            if dep.trim().is_empty() {
                return Err(ConfigError::InvalidValue {
                    field: format!("target '{}'", self.label),
                    reason: "dependency label cannot be empty".to_string(),
                });
            }
        }

        Ok(())
    }
}
