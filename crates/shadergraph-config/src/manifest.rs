//! Shader Manifest (shaders.toml)
//!
//! Holds the ambient build settings, toolchain overrides and every declared target.

use crate::target::TargetConfig;
use crate::{ConfigError, ConfigResult};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Build mode selected for the whole graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildMode {
    /// Keep source records and line tables in every artifact
    Debug,
    /// No debug flags
    #[default]
    Release,
}

impl BuildMode {
    /// Parse a build mode from string
    pub fn parse(s: &str) -> ConfigResult<Self> {
        match s.to_lowercase().as_str() {
            "debug" | "dbg" => Ok(Self::Debug),
            "release" | "opt" => Ok(Self::Release),
            other => Err(ConfigError::InvalidValue {
                field: "build.mode".to_string(),
                reason: format!("unknown build mode '{}'", other),
            }),
        }
    }

    /// Get mode name
    pub fn name(&self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Release => "release",
        }
    }

    /// Whether debug flags are emitted
    pub fn is_debug(&self) -> bool {
        matches!(self, Self::Debug)
    }
}

impl std::fmt::Display for BuildMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Operating system family the shaders are built for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlatformFamily {
    Mobile,
    #[default]
    Desktop,
}

/// `[build.platform]` table
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct PlatformConfig {
    /// Target OS family
    #[serde(default)]
    pub family: PlatformFamily,

    /// Minimum OS version; no version flag is emitted without one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub minimum_os_version: Option<String>,
}

/// `[build]` table
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct BuildSection {
    /// Build mode (default: release)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<BuildMode>,

    /// Root of every generated file (default: "bazel-out/bin")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_root: Option<PathBuf>,

    /// Platform selection
    #[serde(default)]
    pub platform: PlatformConfig,
}

/// `[toolchain]` table
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct ToolchainConfig {
    /// Driver executable (default: "xcrun")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub driver: Option<String>,

    /// Compile tool name passed to the driver (default: "metal")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compiler: Option<String>,

    /// Link tool name passed to the driver (default: "metallib")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub linker: Option<String>,

    /// Extension of compilable sources (default: "metal")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_extension: Option<String>,

    /// Extension of headers (default: "h")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub header_extension: Option<String>,

    /// Extension of intermediate artifacts (default: "air")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub intermediate_extension: Option<String>,

    /// Extension of linked libraries (default: "metallib")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub library_extension: Option<String>,

    /// Flags added to every action in debug mode
    /// (default: ["-frecord-sources", "-gline-tables-only"])
    #[serde(skip_serializing_if = "Option::is_none")]
    pub debug_flags: Option<Vec<String>>,
}

impl ToolchainConfig {
    /// Validate the overrides
    pub fn validate(&self) -> ConfigResult<()> {
        let extensions = [
            ("toolchain.source_extension", &self.source_extension),
            ("toolchain.header_extension", &self.header_extension),
            ("toolchain.intermediate_extension", &self.intermediate_extension),
            ("toolchain.library_extension", &self.library_extension),
        ];
        for (field, extension) in extensions {
            if let Some(extension) = extension {
                if !is_valid_extension(extension) {
                    return Err(ConfigError::InvalidValue {
                        field: field.to_string(),
                        reason: format!("invalid file extension '{}'", extension),
                    });
                }
            }
        }

        if let (Some(source), Some(header)) = (&self.source_extension, &self.header_extension) {
            if source == header {
                return Err(ConfigError::InvalidValue {
                    field: "toolchain.header_extension".to_string(),
                    reason: "sources and headers need distinct extensions".to_string(),
                });
            }
        }

        Ok(())
    }
}

/// Parsed `shaders.toml`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct ShaderManifest {
    /// Ambient build settings
    #[serde(default)]
    pub build: BuildSection,

    /// Toolchain overrides
    #[serde(default)]
    pub toolchain: ToolchainConfig,

    /// Declared targets
    #[serde(default, rename = "target")]
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub targets: Vec<TargetConfig>,
}

impl ShaderManifest {
    /// Load manifest from a file
    pub fn load_from_file(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ConfigError::NotFound(path.to_path_buf())
            } else {
                ConfigError::IoError(e)
            }
        })?;

        let manifest: Self = toml::from_str(&content).map_err(|e| ConfigError::TomlParseError {
            file: path.to_path_buf(),
            error: e,
        })?;

        manifest.validate()?;
        Ok(manifest)
    }

    /// Validate the manifest
    pub fn validate(&self) -> ConfigResult<()> {
        if let Some(version) = &self.build.platform.minimum_os_version {
            if !is_valid_os_version(version) {
                return Err(ConfigError::InvalidValue {
                    field: "build.platform.minimum_os_version".to_string(),
                    reason: format!("invalid version '{}'", version),
                });
            }
        }

        self.toolchain.validate()?;

        let mut seen = HashSet::new();
        for target in &self.targets {
            target.validate()?;
            if !seen.insert(target.label.as_str()) {
                return Err(ConfigError::DuplicateTarget(target.label.clone()));
            }
        }

        Ok(())
    }

    /// Effective build mode
    pub fn mode(&self) -> BuildMode {
        self.build.mode.unwrap_or_default()
    }

    /// Find a target by label
    pub fn target(&self, label: &str) -> Option<&TargetConfig> {
        self.targets.iter().find(|t| t.label == label)
    }
}

/// Extensions are given without the dot: "metal", not ".metal"
fn is_valid_extension(extension: &str) -> bool {
    !extension.is_empty()
        && extension
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

/// OS versions are dotted digit groups: "14", "14.0", "10.15.4"
fn is_valid_os_version(version: &str) -> bool {
    let parts: Vec<&str> = version.split('.').collect();
    if parts.len() > 3 {
        return false;
    }

    parts
        .iter()
        .all(|part| !part.is_empty() && part.chars().all(|c| c.is_ascii_digit()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::target::TargetKindConfig;

    #[test]
    fn test_parse_empty_manifest() {
        let manifest: ShaderManifest = toml::from_str("").unwrap();
        assert_eq!(manifest.mode(), BuildMode::Release);
        assert!(manifest.targets.is_empty());
        assert!(manifest.validate().is_ok());
    }

    #[test]
    fn test_parse_manifest_with_targets() {
        let toml = r#"
[build]
mode = "debug"
output_root = "out"

[build.platform]
family = "mobile"
minimum_os_version = "14.0"

[toolchain]
driver = "/usr/bin/xcrun"

[[target]]
label = "//shaders:common"
srcs = ["shaders/common.metal"]

[[target]]
label = "//shaders:app"
kind = "binary"
deps = ["//shaders:common"]
"#;

        let manifest: ShaderManifest = toml::from_str(toml).unwrap();
        assert!(manifest.validate().is_ok());
        assert_eq!(manifest.mode(), BuildMode::Debug);
        assert_eq!(manifest.build.output_root, Some(PathBuf::from("out")));
        assert_eq!(manifest.build.platform.family, PlatformFamily::Mobile);
        assert_eq!(manifest.toolchain.driver.as_deref(), Some("/usr/bin/xcrun"));
        assert_eq!(manifest.targets.len(), 2);
        assert_eq!(
            manifest.target("//shaders:app").map(|t| t.kind),
            Some(TargetKindConfig::Binary)
        );
    }

    #[test]
    fn test_duplicate_label_rejected() {
        let toml = r#"
[[target]]
label = "//a:lib"

[[target]]
label = "//a:lib"
"#;
        let manifest: ShaderManifest = toml::from_str(toml).unwrap();
        assert!(matches!(
            manifest.validate(),
            Err(ConfigError::DuplicateTarget(label)) if label == "//a:lib"
        ));
    }

    #[test]
    fn test_toolchain_extension_overrides() {
        let toml = r#"
[toolchain]
source_extension = "msl"
intermediate_extension = "ir"
library_extension = "lib"
debug_flags = ["-g"]
"#;
        let manifest: ShaderManifest = toml::from_str(toml).unwrap();
        assert!(manifest.validate().is_ok());
        assert_eq!(manifest.toolchain.source_extension.as_deref(), Some("msl"));
        assert_eq!(manifest.toolchain.header_extension, None);
        assert_eq!(manifest.toolchain.debug_flags, Some(vec!["-g".to_string()]));
    }

    #[test]
    fn test_invalid_toolchain_extension_rejected() {
        let toml = r#"
[toolchain]
library_extension = ".metallib"
"#;
        let manifest: ShaderManifest = toml::from_str(toml).unwrap();
        assert!(matches!(
            manifest.validate(),
            Err(ConfigError::InvalidValue { field, .. }) if field == "toolchain.library_extension"
        ));
    }

    #[test]
    fn test_same_source_and_header_extension_rejected() {
        let toml = r#"
[toolchain]
source_extension = "h"
header_extension = "h"
"#;
        let manifest: ShaderManifest = toml::from_str(toml).unwrap();
        assert!(manifest.validate().is_err());
    }

    #[test]
    fn test_build_mode_parse() {
        assert_eq!(BuildMode::parse("debug").unwrap(), BuildMode::Debug);
        assert_eq!(BuildMode::parse("DBG").unwrap(), BuildMode::Debug);
        assert_eq!(BuildMode::parse("release").unwrap(), BuildMode::Release);
        assert_eq!(BuildMode::parse("opt").unwrap(), BuildMode::Release);
        assert!(BuildMode::parse("fastest").is_err());
    }

    #[test]
    fn test_os_version_validation() {
        assert!(is_valid_os_version("14"));
        assert!(is_valid_os_version("14.0"));
        assert!(is_valid_os_version("10.15.4"));
        assert!(!is_valid_os_version(""));
        assert!(!is_valid_os_version("14.x"));
        assert!(!is_valid_os_version("1.2.3.4"));
    }
}
