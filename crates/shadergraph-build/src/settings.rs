//! Build settings
//!
//! Ambient configuration shared by every action of a build: build mode,
//! platform, output root and the toolchain's names and file extensions.

use serde::{Deserialize, Serialize};
use shadergraph_config::{BuildMode, PlatformConfig, PlatformFamily, ShaderManifest, ToolchainConfig};
use std::path::PathBuf;

/// Default root of generated files
pub const DEFAULT_OUTPUT_ROOT: &str = "bazel-out/bin";

/// Platform the shaders are compiled for
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Platform {
    /// OS family
    pub family: PlatformFamily,
    /// Minimum OS version, if any
    pub minimum_os_version: Option<String>,
}

impl Platform {
    /// Create a platform with a minimum OS version
    pub fn new(family: PlatformFamily, minimum_os_version: impl Into<String>) -> Self {
        Self {
            family,
            minimum_os_version: Some(minimum_os_version.into()),
        }
    }

    /// Minimum-OS flag, absent without a configured version
    pub fn version_flag(&self) -> Option<String> {
        let version = self.minimum_os_version.as_deref()?;
        let flag = match self.family {
            PlatformFamily::Mobile => "-mios-version-min",
            PlatformFamily::Desktop => "-mmacosx-version-min",
        };
        Some(format!("{}={}", flag, version))
    }
}

impl From<&PlatformConfig> for Platform {
    fn from(config: &PlatformConfig) -> Self {
        Self {
            family: config.family,
            minimum_os_version: config.minimum_os_version.clone(),
        }
    }
}

/// Tool names and file extensions of the shader toolchain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Toolchain {
    /// Executable every action runs
    pub driver: String,
    /// First argument of compile actions
    pub compiler: String,
    /// First argument of link actions
    pub linker: String,
    /// Extension of compilable sources
    pub source_extension: String,
    /// Extension of headers
    pub header_extension: String,
    /// Extension of intermediate artifacts
    pub intermediate_extension: String,
    /// Extension of linked libraries
    pub library_extension: String,
    /// Flags every action gets in debug mode
    pub debug_options: Vec<String>,
}

impl Default for Toolchain {
    fn default() -> Self {
        Self {
            driver: "xcrun".to_string(),
            compiler: "metal".to_string(),
            linker: "metallib".to_string(),
            source_extension: "metal".to_string(),
            header_extension: "h".to_string(),
            intermediate_extension: "air".to_string(),
            library_extension: "metallib".to_string(),
            debug_options: vec!["-frecord-sources".to_string(), "-gline-tables-only".to_string()],
        }
    }
}

impl Toolchain {
    /// Default toolchain with manifest overrides applied
    pub fn from_config(config: &ToolchainConfig) -> Self {
        let mut toolchain = Self::default();
        if let Some(driver) = &config.driver {
            toolchain.driver = driver.clone();
        }
        if let Some(compiler) = &config.compiler {
            toolchain.compiler = compiler.clone();
        }
        if let Some(linker) = &config.linker {
            toolchain.linker = linker.clone();
        }
        if let Some(extension) = &config.source_extension {
            toolchain.source_extension = extension.clone();
        }
        if let Some(extension) = &config.header_extension {
            toolchain.header_extension = extension.clone();
        }
        if let Some(extension) = &config.intermediate_extension {
            toolchain.intermediate_extension = extension.clone();
        }
        if let Some(extension) = &config.library_extension {
            toolchain.library_extension = extension.clone();
        }
        if let Some(flags) = &config.debug_flags {
            toolchain.debug_options = flags.clone();
        }
        toolchain
    }

    /// Flags emitted only in debug mode
    pub fn debug_flags(&self, mode: BuildMode) -> Vec<String> {
        if mode.is_debug() {
            self.debug_options.clone()
        } else {
            Vec::new()
        }
    }
}

/// Everything an action needs besides its target's own attributes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildSettings {
    /// Build mode
    pub mode: BuildMode,
    /// Platform selection
    pub platform: Platform,
    /// Root directory of generated files
    pub output_root: PathBuf,
    /// Toolchain names and extensions
    pub toolchain: Toolchain,
}

impl Default for BuildSettings {
    fn default() -> Self {
        Self {
            mode: BuildMode::default(),
            platform: Platform::default(),
            output_root: PathBuf::from(DEFAULT_OUTPUT_ROOT),
            toolchain: Toolchain::default(),
        }
    }
}

impl BuildSettings {
    /// Settings taken from a manifest
    pub fn from_manifest(manifest: &ShaderManifest) -> Self {
        Self {
            mode: manifest.mode(),
            platform: Platform::from(&manifest.build.platform),
            output_root: manifest
                .build
                .output_root
                .clone()
                .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_ROOT)),
            toolchain: Toolchain::from_config(&manifest.toolchain),
        }
    }

    /// Set the build mode
    pub fn with_mode(mut self, mode: BuildMode) -> Self {
        self.mode = mode;
        self
    }

    /// Set the platform
    pub fn with_platform(mut self, platform: Platform) -> Self {
        self.platform = platform;
        self
    }

    /// Set the output root
    pub fn with_output_root(mut self, output_root: impl Into<PathBuf>) -> Self {
        self.output_root = output_root.into();
        self
    }

    /// Debug flags for the configured mode
    pub fn debug_flags(&self) -> Vec<String> {
        self.toolchain.debug_flags(self.mode)
    }

    /// Platform flag for the configured platform
    pub fn platform_flag(&self) -> Option<String> {
        self.platform.version_flag()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(PlatformFamily::Mobile, "14.0", "-mios-version-min=14.0")]
    #[case(PlatformFamily::Desktop, "11.0", "-mmacosx-version-min=11.0")]
    fn test_version_flag(#[case] family: PlatformFamily, #[case] version: &str, #[case] expected: &str) {
        assert_eq!(Platform::new(family, version).version_flag().as_deref(), Some(expected));
    }

    #[test]
    fn test_no_version_no_flag() {
        let platform = Platform {
            family: PlatformFamily::Mobile,
            minimum_os_version: None,
        };
        assert_eq!(platform.version_flag(), None);
    }

    #[test]
    fn test_debug_flags_only_in_debug() {
        let toolchain = Toolchain::default();
        assert_eq!(
            toolchain.debug_flags(BuildMode::Debug),
            vec!["-frecord-sources", "-gline-tables-only"]
        );
        assert!(toolchain.debug_flags(BuildMode::Release).is_empty());
    }

    #[test]
    fn test_toolchain_overrides() {
        let toolchain = Toolchain::from_config(&ToolchainConfig {
            driver: Some("/opt/xcrun".to_string()),
            linker: Some("shaderlink".to_string()),
            library_extension: Some("lib".to_string()),
            debug_flags: Some(vec!["-g".to_string()]),
            ..ToolchainConfig::default()
        });
        assert_eq!(toolchain.driver, "/opt/xcrun");
        assert_eq!(toolchain.compiler, "metal");
        assert_eq!(toolchain.linker, "shaderlink");
        assert_eq!(toolchain.source_extension, "metal");
        assert_eq!(toolchain.library_extension, "lib");
        assert_eq!(toolchain.debug_flags(BuildMode::Debug), vec!["-g"]);
        assert!(toolchain.debug_flags(BuildMode::Release).is_empty());
    }

    #[test]
    fn test_settings_from_manifest() {
        let manifest: ShaderManifest = toml::from_str(
            r#"
[build]
mode = "debug"

[build.platform]
family = "mobile"
minimum_os_version = "15.0"
"#,
        )
        .unwrap();

        let settings = BuildSettings::from_manifest(&manifest);
        assert_eq!(settings.mode, BuildMode::Debug);
        assert_eq!(settings.output_root, PathBuf::from(DEFAULT_OUTPUT_ROOT));
        assert_eq!(settings.platform_flag().as_deref(), Some("-mios-version-min=15.0"));
        assert_eq!(settings.debug_flags().len(), 2);
    }
}
