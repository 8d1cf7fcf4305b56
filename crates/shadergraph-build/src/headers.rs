//! Header virtualization
//!
//! Shader `#include` resolution is relative to include directories, so a
//! target that strips or adds an include prefix exposes its public headers
//! through a per-target virtual directory of symlinks instead of their real
//! locations. A header `inc/foo/bar.h` of a root-package target with
//! `strip_include_prefix = "inc"` and `include_prefix = "pkg"` becomes
//! `<virtual root>/pkg/foo/bar.h`.

use crate::error::{BuildError, BuildResult};
use crate::targets::{Label, ShaderTarget};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, warn};

/// Directory under each package holding the virtual include trees
pub const VIRTUAL_INCLUDES_DIR: &str = "_virtual_includes";

/// One virtual header path bound to a real header file
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Indirection {
    /// Path seen by the compiler
    pub virtual_path: PathBuf,
    /// Real header file
    pub target: PathBuf,
}

impl Indirection {
    /// Create the symlink under `exec_root`
    ///
    /// Returns `false` when a link with the same target already exists. A
    /// link pointing elsewhere is replaced.
    pub fn materialize(&self, exec_root: &Path) -> BuildResult<bool> {
        let link = exec_root.join(&self.virtual_path);
        let target = self.link_target(exec_root)?;

        match fs::read_link(&link) {
            Ok(existing) if existing == target => return Ok(false),
            Ok(existing) => {
                warn!(
                    link = %link.display(),
                    stale = %existing.display(),
                    "replacing stale header link"
                );
                fs::remove_file(&link).map_err(|e| BuildError::io(&link, e))?;
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(_) => {
                // Something other than a symlink sits at the virtual path.
                fs::remove_file(&link).map_err(|e| BuildError::io(&link, e))?;
            }
        }

        if let Some(parent) = link.parent() {
            fs::create_dir_all(parent).map_err(|e| BuildError::io(parent, e))?;
        }

        match symlink_file(&target, &link) {
            Ok(()) => Ok(true),
            // Another worker created the same link first.
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                let existing = fs::read_link(&link).map_err(|e| BuildError::io(&link, e))?;
                if existing == target {
                    Ok(false)
                } else {
                    Err(BuildError::io(&link, e))
                }
            }
            Err(e) => Err(BuildError::io(&link, e)),
        }
    }

    /// Symlink contents pointing at the real header
    ///
    /// A relative symlink resolves against the link's own directory, so the
    /// target is expressed relative to the virtual path's parent. Links whose
    /// directory cannot be related to `exec_root` get an absolute target.
    pub fn link_target(&self, exec_root: &Path) -> BuildResult<PathBuf> {
        let dir = normalize(self.virtual_path.parent().unwrap_or(Path::new("")));
        let target = normalize(&self.target);

        if let Some(relative) = pathdiff::diff_paths(&target, &dir) {
            return Ok(relative);
        }

        let root = fs::canonicalize(exec_root).map_err(|e| BuildError::io(exec_root, e))?;
        Ok(root.join(target))
    }
}

#[cfg(unix)]
fn symlink_file(target: &Path, link: &Path) -> io::Result<()> {
    std::os::unix::fs::symlink(target, link)
}

#[cfg(windows)]
fn symlink_file(target: &Path, link: &Path) -> io::Result<()> {
    std::os::windows::fs::symlink_file(target, link)
}

/// Result of virtualizing a target's public headers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VirtualHeaders {
    /// Include directory dependents pass to the compiler
    pub root: PathBuf,
    /// Header paths as the compiler sees them
    pub headers: Vec<PathBuf>,
    /// Symlinks backing the virtual paths; empty for identity virtualization
    pub indirections: Vec<Indirection>,
}

impl VirtualHeaders {
    /// Whether headers are passed through unchanged
    pub fn is_identity(&self) -> bool {
        self.indirections.is_empty()
    }

    /// Real header files behind the virtual paths
    pub fn real_headers(&self) -> impl Iterator<Item = &PathBuf> {
        self.indirections.iter().map(|i| &i.target)
    }

    /// Create every symlink under `exec_root`, returning how many were written
    ///
    /// Calling this again with the same inputs writes nothing.
    pub fn materialize(&self, exec_root: &Path) -> BuildResult<usize> {
        let mut written = 0;
        for indirection in &self.indirections {
            if indirection.materialize(exec_root)? {
                written += 1;
            }
        }
        Ok(written)
    }
}

/// Directory of a package, `.` for the root package
pub fn package_dir(label: &Label) -> PathBuf {
    if label.package().is_empty() {
        PathBuf::from(".")
    } else {
        label.package_path()
    }
}

/// Per-target virtual include directory
pub fn virtual_dir_for(label: &Label, output_root: &Path) -> PathBuf {
    let mut dir = output_root.to_path_buf();
    if !label.package().is_empty() {
        dir.push(label.package());
    }
    dir.push(VIRTUAL_INCLUDES_DIR);
    dir.push(label.name());
    dir
}

/// Virtualize `headers` of `target` under its virtual include directory
///
/// With both prefixes empty this is the identity: the package directory is
/// the root, headers pass through and no indirections are recorded.
pub fn virtualize(
    target: &ShaderTarget,
    headers: &[PathBuf],
    include_prefix: &str,
    strip_prefix: &str,
    output_root: &Path,
) -> BuildResult<VirtualHeaders> {
    if include_prefix.is_empty() && strip_prefix.is_empty() {
        return Ok(VirtualHeaders {
            root: package_dir(&target.label),
            headers: headers.to_vec(),
            indirections: Vec::new(),
        });
    }

    check_relative(target, "include_prefix", include_prefix)?;
    check_relative(target, "strip_include_prefix", strip_prefix)?;
    if Path::new(include_prefix)
        .components()
        .any(|c| matches!(c, Component::ParentDir))
    {
        return Err(BuildError::UplevelIncludePrefix {
            target: target.label.to_string(),
            prefix: include_prefix.to_string(),
        });
    }

    let full_strip_prefix = normalize(&target.label.package_path().join(strip_prefix));
    let root = virtual_dir_for(&target.label, output_root);
    let include_prefix = normalize(Path::new(include_prefix));
    let prefixed_root = if include_prefix.as_os_str().is_empty() {
        root.clone()
    } else {
        root.join(include_prefix)
    };

    let mut virtual_headers = Vec::with_capacity(headers.len());
    let mut indirections = Vec::with_capacity(headers.len());

    for header in headers {
        let relative = normalize(header)
            .strip_prefix(&full_strip_prefix)
            .ok()
            .filter(|rest| !rest.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .ok_or_else(|| BuildError::HeaderOutsidePrefix {
                target: target.label.to_string(),
                header: header.clone(),
                strip_prefix: full_strip_prefix.clone(),
            })?;

        let virtual_path = prefixed_root.join(relative);
        debug!(
            label = %target.label,
            header = %header.display(),
            virtual_path = %virtual_path.display(),
            "virtualized header"
        );

        virtual_headers.push(virtual_path.clone());
        indirections.push(Indirection {
            virtual_path,
            target: header.clone(),
        });
    }

    Ok(VirtualHeaders {
        root,
        headers: virtual_headers,
        indirections,
    })
}

fn check_relative(target: &ShaderTarget, attribute: &'static str, prefix: &str) -> BuildResult<()> {
    if prefix.starts_with('/') || Path::new(prefix).is_absolute() {
        return Err(BuildError::AbsolutePrefix {
            target: target.label.to_string(),
            attribute,
            prefix: prefix.to_string(),
        });
    }
    Ok(())
}

/// Lexically resolve `.` and `..` components
///
/// `..` that would climb above the start of a relative path is kept.
pub fn normalize(path: &Path) -> PathBuf {
    let mut parts: Vec<Component> = Vec::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match parts.last() {
                Some(Component::Normal(_)) => {
                    parts.pop();
                }
                Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                _ => parts.push(component),
            },
            other => parts.push(other),
        }
    }
    parts.iter().collect()
}
