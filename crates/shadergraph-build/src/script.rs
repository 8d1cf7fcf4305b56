//! Shader debugging workspace script
//!
//! GPU debuggers look for shader sources under the paths the compiler saw.
//! The generated script recreates that layout inside the current directory
//! from a checkout given as its only argument: every shader source and every
//! `include` directory is linked to the same relative path, and each virtual
//! header is pointed at its real file in the checkout.

use crate::actions::Mnemonic;
use crate::builder::BuildPlan;
use crate::depset::DepSet;
use crate::error::{BuildError, BuildResult};
use crate::headers::Indirection;
use crate::settings::Toolchain;
use std::fs;
use std::path::Path;
use tracing::info;

/// Renderable debug script
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DebugScript {
    libraries: Vec<String>,
    indirections: Vec<Indirection>,
    source_extension: String,
}

impl DebugScript {
    /// Create a script for the given library labels and header links
    pub fn new(libraries: &DepSet<String>, indirections: impl IntoIterator<Item = Indirection>) -> Self {
        let mut libraries = libraries.flatten();
        libraries.sort();

        let mut indirections: Vec<Indirection> = indirections.into_iter().collect();
        indirections.sort_by(|a, b| a.virtual_path.cmp(&b.virtual_path));
        indirections.dedup();

        Self {
            libraries,
            indirections,
            source_extension: Toolchain::default().source_extension,
        }
    }

    /// Create a script covering every header link of a plan
    pub fn from_plan(libraries: &DepSet<String>, plan: &BuildPlan) -> Self {
        let indirections = plan
            .virtual_headers
            .values()
            .flat_map(|headers| headers.indirections.iter().cloned());
        Self::new(libraries, indirections)
            .with_source_extension(plan_source_extension(plan))
    }

    /// Set the extension of the shader sources to link
    pub fn with_source_extension(mut self, extension: impl Into<String>) -> Self {
        self.source_extension = extension.into();
        self
    }

    /// Library labels listed in the header, sorted
    pub fn libraries(&self) -> &[String] {
        &self.libraries
    }

    /// Render the script text
    pub fn render(&self) -> String {
        let mut out = String::new();

        out.push_str("#!/bin/sh\n");
        out.push_str("# Recreates the shader source layout for GPU debugging.\n");
        out.push_str("#\n");
        out.push_str("# Shader libraries:\n");
        if self.libraries.is_empty() {
            out.push_str("#   (none)\n");
        }
        for library in &self.libraries {
            out.push_str(&format!("#   {}\n", library));
        }
        out.push_str("#\n");
        out.push_str("# Usage: $0 [source-checkout]\n");
        out.push_str("set -eu\n\n");

        out.push_str("if [ \"$#\" -eq 0 ]; then\n");
        out.push_str("  exit 0\n");
        out.push_str("fi\n\n");

        out.push_str("if [ ! -d \"$1\" ]; then\n");
        out.push_str("  echo \"not a directory: $1\" >&2\n");
        out.push_str("  exit 1\n");
        out.push_str("fi\n");
        out.push_str("src_dir=$(cd \"$1\" && pwd)\n\n");

        out.push_str("link() {\n");
        out.push_str("  mkdir -p \"$(dirname \"$2\")\"\n");
        out.push_str("  ln -sfn \"$1\" \"$2\"\n");
        out.push_str("}\n\n");

        out.push_str(&format!(
            "(cd \"$src_dir\" && find . -type d -name include -prune -print -o -type f -name {} -print) |\n",
            shell_quote(&format!("*.{}", self.source_extension))
        ));
        out.push_str("while IFS= read -r path; do\n");
        out.push_str("  path=${path#./}\n");
        out.push_str("  link \"$src_dir/$path\" \"$path\"\n");
        out.push_str("done\n");

        if !self.indirections.is_empty() {
            out.push('\n');
        }
        for indirection in &self.indirections {
            out.push_str(&format!(
                "link \"$src_dir\"/{} {}\n",
                shell_quote(&indirection.target.to_string_lossy()),
                shell_quote(&indirection.virtual_path.to_string_lossy())
            ));
        }

        out
    }

    /// Write the script to `path` and make it executable
    pub fn write_to(&self, path: &Path) -> BuildResult<()> {
        fs::write(path, self.render()).map_err(|e| BuildError::io(path, e))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mut permissions = fs::metadata(path)
                .map_err(|e| BuildError::io(path, e))?
                .permissions();
            permissions.set_mode(0o755);
            fs::set_permissions(path, permissions).map_err(|e| BuildError::io(path, e))?;
        }

        info!(
            path = %path.display(),
            libraries = self.libraries.len(),
            headers = self.indirections.len(),
            "wrote debug script"
        );
        Ok(())
    }
}

fn plan_source_extension(plan: &BuildPlan) -> String {
    plan.actions
        .iter()
        .find(|a| a.mnemonic == Mnemonic::ShaderCompile)
        .and_then(|a| a.inputs.first())
        .and_then(|source| source.extension())
        .map(|ext| ext.to_string_lossy().into_owned())
        .unwrap_or_else(|| Toolchain::default().source_extension)
}

/// Quote a string for POSIX sh
fn shell_quote(text: &str) -> String {
    format!("'{}'", text.replace('\'', r"'\''"))
}
