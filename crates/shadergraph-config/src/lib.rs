//! shadergraph configuration
//!
//! Provides the configuration surface of a shader library build:
//! - Target declarations (`srcs`, `hdrs`, `deps`, `copts`, include prefixes, `out`)
//! - Ambient build settings (build mode, platform, output root)
//! - Toolchain overrides
//!
//! # Configuration Hierarchy
//!
//! Configuration is loaded and merged in the following order (later overrides earlier):
//! 1. Built-in defaults
//! 2. Manifest (`shaders.toml`, found by walking up from the start directory)
//! 3. Environment variables (`SHADERGRAPH_*`)
//!
//! # Example
//!
//! ```no_run
//! use shadergraph_config::ConfigLoader;
//! use std::path::Path;
//!
//! let loader = ConfigLoader::new();
//! let config = loader.load_from_directory(Path::new(".")).unwrap();
//! println!("{} targets", config.manifest.targets.len());
//! ```

pub mod loader;
pub mod manifest;
pub mod target;

use std::path::PathBuf;
use thiserror::Error;

/// File name of the manifest looked up by [`ConfigLoader`]
pub const MANIFEST_FILE_NAME: &str = "shaders.toml";

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    NotFound(PathBuf),

    #[error("Failed to read configuration file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Invalid TOML syntax in {file}: {error}")]
    TomlParseError {
        file: PathBuf,
        error: toml::de::Error,
    },

    #[error("Invalid value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("Duplicate target label '{0}'")]
    DuplicateTarget(String),
}

/// Result type for configuration operations
pub type ConfigResult<T> = Result<T, ConfigError>;

// Re-export main types
pub use loader::{Config, ConfigLoader};
pub use manifest::{BuildMode, BuildSection, PlatformConfig, PlatformFamily, ShaderManifest, ToolchainConfig};
pub use target::{TargetConfig, TargetKindConfig};
