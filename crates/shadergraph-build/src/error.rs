//! Build graph error types
use std::path::PathBuf;
use thiserror::Error;

pub type BuildResult<T> = Result<T, BuildError>;

#[derive(Debug, Error)]
pub enum BuildError {
    #[error("Target '{target}': {attribute} must be a relative path, got '{prefix}'")]
    AbsolutePrefix {
        target: String,
        attribute: &'static str,
        prefix: String,
    },

    #[error("Target '{target}': include_prefix '{prefix}' must not contain uplevel references")]
    UplevelIncludePrefix { target: String, prefix: String },

    #[error("Target '{target}': header '{header}' is not under the strip prefix '{strip_prefix}'")]
    HeaderOutsidePrefix {
        target: String,
        header: PathBuf,
        strip_prefix: PathBuf,
    },

    #[error("Invalid label '{label}': {reason}")]
    InvalidLabel { label: String, reason: String },

    #[error("Circular dependency detected: {0}")]
    CircularDependency(String),

    #[error("Target not found: {target}")]
    TargetNotFound { target: String },

    #[error("Target '{target}' cannot depend on '{dependency}': {reason}")]
    InvalidDependency {
        target: String,
        dependency: String,
        reason: String,
    },

    #[error("Invalid target configuration: {0}")]
    InvalidTarget(String),

    #[error("Configuration error: {0}")]
    Config(#[from] shadergraph_config::ConfigError),

    #[error("I/O error at {path}: {error}")]
    IoError {
        path: PathBuf,
        error: std::io::Error,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl BuildError {
    /// Create an I/O error with path context
    pub fn io(path: impl Into<PathBuf>, error: std::io::Error) -> Self {
        Self::IoError {
            path: path.into(),
            error,
        }
    }

    /// Create a target not found error
    pub fn target_not_found(target: impl Into<String>) -> Self {
        Self::TargetNotFound {
            target: target.into(),
        }
    }

    /// Create an invalid label error
    pub fn invalid_label(label: impl Into<String>, reason: impl ToString) -> Self {
        Self::InvalidLabel {
            label: label.into(),
            reason: reason.to_string(),
        }
    }

    /// Whether this is one of the fatal header configuration errors
    pub fn is_header_configuration(&self) -> bool {
        matches!(
            self,
            Self::AbsolutePrefix { .. }
                | Self::UplevelIncludePrefix { .. }
                | Self::HeaderOutsidePrefix { .. }
        )
    }
}
