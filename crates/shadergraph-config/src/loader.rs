//! Configuration Loader
//!
//! Handles loading the manifest and applying environment overrides.

use crate::manifest::{BuildMode, ShaderManifest};
use crate::{ConfigResult, MANIFEST_FILE_NAME};
use std::env;
use std::path::{Path, PathBuf};

/// Configuration loader
///
/// Loads configuration from multiple sources and merges them with proper precedence:
/// 1. Manifest (`shaders.toml`) - lowest priority
/// 2. Environment variables (SHADERGRAPH_*) - overrides manifest
pub struct ConfigLoader {
    /// Manifest file name to look for
    file_name: String,
}

/// Merged configuration result
#[derive(Debug, Clone)]
pub struct Config {
    /// Parsed manifest with overrides applied
    pub manifest: ShaderManifest,

    /// Workspace root directory (where the manifest was found)
    pub workspace_root: Option<PathBuf>,
}

impl ConfigLoader {
    /// Create a new configuration loader
    pub fn new() -> Self {
        Self {
            file_name: MANIFEST_FILE_NAME.to_string(),
        }
    }

    /// Look for a differently named manifest
    pub fn with_file_name(mut self, file_name: impl Into<String>) -> Self {
        self.file_name = file_name.into();
        self
    }

    /// Load configuration starting from the given directory
    ///
    /// Walks up the directory tree to find the manifest. A directory tree
    /// without one yields an empty manifest and no workspace root.
    pub fn load_from_directory(&self, start_dir: &Path) -> ConfigResult<Config> {
        let (workspace_root, manifest) = self.find_manifest(start_dir)?;
        let manifest = self.apply_env_overrides(manifest)?;

        Ok(Config {
            manifest,
            workspace_root,
        })
    }

    /// Load configuration from a specific manifest file
    pub fn load_from_file(&self, manifest_path: &Path) -> ConfigResult<Config> {
        let manifest = ShaderManifest::load_from_file(manifest_path)?;
        let manifest = self.apply_env_overrides(manifest)?;

        Ok(Config {
            manifest,
            workspace_root: manifest_path.parent().map(|p| p.to_path_buf()),
        })
    }

    /// Find the manifest by walking up directory tree
    fn find_manifest(&self, start_dir: &Path) -> ConfigResult<(Option<PathBuf>, ShaderManifest)> {
        let mut current = start_dir.to_path_buf();

        loop {
            let manifest_path = current.join(&self.file_name);

            if manifest_path.exists() {
                let manifest = ShaderManifest::load_from_file(&manifest_path)?;
                return Ok((Some(current), manifest));
            }

            match current.parent() {
                Some(parent) => current = parent.to_path_buf(),
                None => return Ok((None, ShaderManifest::default())),
            }
        }
    }

    /// Apply environment variable overrides
    ///
    /// - `SHADERGRAPH_MODE=debug|release`
    /// - `SHADERGRAPH_OUTPUT_ROOT=<dir>`
    /// - `SHADERGRAPH_MIN_OS_VERSION=<version>`
    fn apply_env_overrides(&self, mut manifest: ShaderManifest) -> ConfigResult<ShaderManifest> {
        if let Ok(mode) = env::var("SHADERGRAPH_MODE") {
            manifest.build.mode = Some(BuildMode::parse(&mode)?);
        }

        if let Ok(root) = env::var("SHADERGRAPH_OUTPUT_ROOT") {
            manifest.build.output_root = Some(PathBuf::from(root));
        }

        if let Ok(version) = env::var("SHADERGRAPH_MIN_OS_VERSION") {
            manifest.build.platform.minimum_os_version = if version.is_empty() {
                None
            } else {
                Some(version)
            };
        }

        manifest.validate()?;
        Ok(manifest)
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl Config {
    /// Get the workspace root directory
    pub fn workspace_root(&self) -> Option<&Path> {
        self.workspace_root.as_deref()
    }

    /// Check if a manifest was found
    pub fn is_workspace(&self) -> bool {
        self.workspace_root.is_some()
    }

    /// Effective build mode
    pub fn mode(&self) -> BuildMode {
        self.manifest.mode()
    }
}
