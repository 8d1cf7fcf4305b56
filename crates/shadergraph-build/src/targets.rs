//! Shader targets: labels, kinds and declared attributes
use crate::error::{BuildError, BuildResult};
use serde::{Deserialize, Serialize};
use shadergraph_config::{TargetConfig, TargetKindConfig};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Target identity written `//package/path:name`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Label {
    package: String,
    name: String,
}

impl Label {
    /// Parse a label; `//pkg` is shorthand for `//pkg:pkg`
    pub fn parse(text: &str) -> BuildResult<Self> {
        let rest = text
            .strip_prefix("//")
            .ok_or_else(|| BuildError::invalid_label(text, "labels start with '//'"))?;

        let (package, name) = match rest.split_once(':') {
            Some((package, name)) => (package, name),
            None => {
                let name = rest.rsplit('/').next().unwrap_or(rest);
                (rest, name)
            }
        };

        if name.is_empty() {
            return Err(BuildError::invalid_label(text, "target name is empty"));
        }
        if name.contains(':') || name.contains('/') {
            return Err(BuildError::invalid_label(text, "target name contains ':' or '/'"));
        }
        if package.starts_with('/') || package.ends_with('/') {
            return Err(BuildError::invalid_label(text, "package has a leading or trailing '/'"));
        }
        if package.split('/').any(|segment| segment == ".." || segment == ".") {
            return Err(BuildError::invalid_label(text, "package contains '.' or '..'"));
        }

        Ok(Self {
            package: package.to_string(),
            name: name.to_string(),
        })
    }

    /// Package path, the target's own directory (empty for the root package)
    pub fn package(&self) -> &str {
        &self.package
    }

    /// Target name within the package
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Package directory as a relative path
    pub fn package_path(&self) -> PathBuf {
        PathBuf::from(&self.package)
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "//{}:{}", self.package, self.name)
    }
}

impl FromStr for Label {
    type Err = BuildError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Label {
    type Error = BuildError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Label> for String {
    fn from(label: Label) -> Self {
        label.to_string()
    }
}

/// Kind of shader target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetKind {
    /// Compiles its sources and exposes headers and intermediate artifacts
    Library,
    /// Links the full transitive closure into one library file
    Binary,
}

impl TargetKind {
    /// Whether this kind always produces a link action
    pub fn always_links(&self) -> bool {
        matches!(self, Self::Binary)
    }
}

impl fmt::Display for TargetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Library => write!(f, "library"),
            Self::Binary => write!(f, "binary"),
        }
    }
}

impl From<TargetKindConfig> for TargetKind {
    fn from(kind: TargetKindConfig) -> Self {
        match kind {
            TargetKindConfig::Library => Self::Library,
            TargetKindConfig::Binary => Self::Binary,
        }
    }
}

/// Edge kinds a target declares
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeKind {
    /// Build dependencies; the only edges metadata flows along
    Deps,
    /// Runtime data
    Data,
    /// Implementation-only dependencies
    ImplementationDeps,
}

impl EdgeKind {
    /// Every edge kind
    pub fn all() -> [EdgeKind; 3] {
        [Self::Deps, Self::Data, Self::ImplementationDeps]
    }
}

/// A declared shader target
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShaderTarget {
    /// Target identity
    pub label: Label,
    /// Target kind
    pub kind: TargetKind,
    /// Shader sources and private headers (workspace-relative)
    pub srcs: Vec<PathBuf>,
    /// Public headers (workspace-relative)
    pub hdrs: Vec<PathBuf>,
    /// Build dependencies
    pub deps: Vec<Label>,
    /// Extra flags appended to every compile and link invocation
    pub copts: Vec<String>,
    /// Added in front of every virtual header path
    pub include_prefix: String,
    /// Removed from the front of every real header path
    pub strip_include_prefix: String,
    /// Declared output, relative to the output root
    pub out: Option<PathBuf>,
    /// Runtime data edges
    pub data: Vec<Label>,
    /// Implementation-only edges
    pub implementation_deps: Vec<Label>,
}

impl ShaderTarget {
    /// Create a new target
    pub fn new(label: Label, kind: TargetKind) -> Self {
        Self {
            label,
            kind,
            srcs: Vec::new(),
            hdrs: Vec::new(),
            deps: Vec::new(),
            copts: Vec::new(),
            include_prefix: String::new(),
            strip_include_prefix: String::new(),
            out: None,
            data: Vec::new(),
            implementation_deps: Vec::new(),
        }
    }

    /// Create a library target
    pub fn library(label: &str) -> BuildResult<Self> {
        Ok(Self::new(Label::parse(label)?, TargetKind::Library))
    }

    /// Create a binary target
    pub fn binary(label: &str) -> BuildResult<Self> {
        Ok(Self::new(Label::parse(label)?, TargetKind::Binary))
    }

    /// Set sources
    pub fn with_srcs<P: Into<PathBuf>>(mut self, srcs: impl IntoIterator<Item = P>) -> Self {
        self.srcs = srcs.into_iter().map(Into::into).collect();
        self
    }

    /// Set public headers
    pub fn with_hdrs<P: Into<PathBuf>>(mut self, hdrs: impl IntoIterator<Item = P>) -> Self {
        self.hdrs = hdrs.into_iter().map(Into::into).collect();
        self
    }

    /// Set build dependencies
    pub fn with_deps(mut self, deps: Vec<Label>) -> Self {
        self.deps = deps;
        self
    }

    /// Set extra flags
    pub fn with_copts<S: Into<String>>(mut self, copts: impl IntoIterator<Item = S>) -> Self {
        self.copts = copts.into_iter().map(Into::into).collect();
        self
    }

    /// Set include and strip prefixes
    pub fn with_include_prefixes(
        mut self,
        include_prefix: impl Into<String>,
        strip_include_prefix: impl Into<String>,
    ) -> Self {
        self.include_prefix = include_prefix.into();
        self.strip_include_prefix = strip_include_prefix.into();
        self
    }

    /// Set the declared output
    pub fn with_out(mut self, out: impl Into<PathBuf>) -> Self {
        self.out = Some(out.into());
        self
    }

    /// Set runtime data edges
    pub fn with_data(mut self, data: Vec<Label>) -> Self {
        self.data = data;
        self
    }

    /// Set implementation-only edges
    pub fn with_implementation_deps(mut self, deps: Vec<Label>) -> Self {
        self.implementation_deps = deps;
        self
    }

    /// Build a target from its manifest entry
    pub fn from_config(config: &TargetConfig) -> BuildResult<Self> {
        let parse_all = |labels: &[String]| -> BuildResult<Vec<Label>> {
            labels.iter().map(|l| Label::parse(l)).collect()
        };

        let target = Self {
            label: Label::parse(&config.label)?,
            kind: config.kind.into(),
            srcs: config.srcs.clone(),
            hdrs: config.hdrs.clone(),
            deps: parse_all(&config.deps)?,
            copts: config.copts.clone(),
            include_prefix: config.include_prefix.clone(),
            strip_include_prefix: config.strip_include_prefix.clone(),
            out: config.out.clone(),
            data: parse_all(&config.data)?,
            implementation_deps: parse_all(&config.implementation_deps)?,
        };
        target.validate()?;
        Ok(target)
    }

    /// Labels reached through one edge kind
    pub fn edges(&self, kind: EdgeKind) -> &[Label] {
        match kind {
            EdgeKind::Deps => &self.deps,
            EdgeKind::Data => &self.data,
            EdgeKind::ImplementationDeps => &self.implementation_deps,
        }
    }

    /// Whether this target produces a link action
    pub fn links(&self) -> bool {
        self.kind.always_links() || self.out.is_some()
    }

    /// Whether the target virtualizes its public headers
    pub fn virtualizes_headers(&self) -> bool {
        !self.include_prefix.is_empty() || !self.strip_include_prefix.is_empty()
    }

    /// Validate the target configuration
    pub fn validate(&self) -> BuildResult<()> {
        if self.deps.contains(&self.label) {
            return Err(BuildError::InvalidTarget(format!(
                "target '{}' depends on itself",
                self.label
            )));
        }

        if self.kind == TargetKind::Binary && self.srcs.is_empty() && self.deps.is_empty() {
            return Err(BuildError::InvalidTarget(format!(
                "{} target '{}' has nothing to link",
                self.kind, self.label
            )));
        }

        for path in self.srcs.iter().chain(&self.hdrs) {
            if path.is_absolute() {
                return Err(BuildError::InvalidTarget(format!(
                    "target '{}' lists absolute path '{}'",
                    self.label,
                    path.display()
                )));
            }
        }

        if let Some(out) = &self.out {
            if out.is_absolute() || out.as_os_str().is_empty() {
                return Err(BuildError::InvalidTarget(format!(
                    "target '{}' declares invalid output '{}'",
                    self.label,
                    out.display()
                )));
            }
        }

        Ok(())
    }
}

/// Whether `path` ends with the extension `ext`
pub fn has_extension(path: &Path, ext: &str) -> bool {
    path.extension().and_then(|e| e.to_str()) == Some(ext)
}
