//! Compile and link action construction
//!
//! Actions only describe a toolchain invocation: executable, ordered
//! arguments and the declared inputs and outputs the host engine needs to
//! schedule it. Nothing here runs a process.

use crate::depset::DepSet;
use crate::settings::BuildSettings;
use crate::targets::Label;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Category of an action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Mnemonic {
    /// One shader source to one intermediate artifact
    ShaderCompile,
    /// Intermediate artifacts to one library file
    ShaderLink,
}

impl fmt::Display for Mnemonic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ShaderCompile => write!(f, "ShaderCompile"),
            Self::ShaderLink => write!(f, "ShaderLink"),
        }
    }
}

/// An external process invocation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Action {
    /// Category label
    pub mnemonic: Mnemonic,
    /// Target the action belongs to
    pub owner: Label,
    /// Executable to run
    pub executable: String,
    /// Arguments, in order
    pub arguments: Vec<String>,
    /// Declared input files
    pub inputs: Vec<PathBuf>,
    /// Declared output files
    pub outputs: Vec<PathBuf>,
}

impl Action {
    /// Executable followed by its arguments
    pub fn command_line(&self) -> Vec<String> {
        std::iter::once(self.executable.clone())
            .chain(self.arguments.iter().cloned())
            .collect()
    }

    /// Human-readable progress message
    pub fn progress_message(&self) -> String {
        let verb = match self.mnemonic {
            Mnemonic::ShaderCompile => "Compiling",
            Mnemonic::ShaderLink => "Linking",
        };
        match self.outputs.first() {
            Some(output) => format!("{} {} ({})", verb, output.display(), self.owner),
            None => format!("{} {}", verb, self.owner),
        }
    }
}

/// Intermediate artifact produced for `source`
pub fn intermediate_path(source: &Path, settings: &BuildSettings) -> PathBuf {
    settings
        .output_root
        .join(source)
        .with_extension(&settings.toolchain.intermediate_extension)
}

/// Library file a linking target produces without a declared `out`
pub fn default_library_path(label: &Label, settings: &BuildSettings) -> PathBuf {
    settings.output_root.join(label.package()).join(format!(
        "{}.{}",
        label.name(),
        settings.toolchain.library_extension
    ))
}

/// Build the compile action for one shader source
///
/// Every header visible to the owning target is declared as an input; the
/// graph cannot tell which ones the source actually includes.
pub fn compile_unit(
    owner: &Label,
    source: &Path,
    headers: &[PathBuf],
    header_paths: &[PathBuf],
    settings: &BuildSettings,
    extra_flags: &[String],
) -> (Action, PathBuf) {
    let artifact = intermediate_path(source, settings);

    let mut arguments = vec![settings.toolchain.compiler.clone(), "-c".to_string()];
    arguments.extend(settings.platform_flag());
    arguments.extend(settings.debug_flags());
    arguments.push("-o".to_string());
    arguments.push(artifact.display().to_string());
    for path in header_paths {
        arguments.push("-I".to_string());
        arguments.push(path.display().to_string());
    }
    arguments.push(source.display().to_string());
    arguments.extend(extra_flags.iter().cloned());

    let mut inputs = Vec::with_capacity(headers.len() + 1);
    inputs.push(source.to_path_buf());
    inputs.extend(headers.iter().filter(|h| h.as_path() != source).cloned());

    debug!(
        label = %owner,
        source = %source.display(),
        inputs = inputs.len(),
        "built compile action"
    );

    let action = Action {
        mnemonic: Mnemonic::ShaderCompile,
        owner: owner.clone(),
        executable: settings.toolchain.driver.clone(),
        arguments,
        inputs,
        outputs: vec![artifact.clone()],
    };
    (action, artifact)
}

/// Build the link action over a transitive artifact set
///
/// `output` is the caller-declared library path; without one the file is
/// named after the owning target.
pub fn link_artifacts(
    owner: &Label,
    artifacts: &DepSet<PathBuf>,
    settings: &BuildSettings,
    extra_flags: &[String],
    output: Option<&Path>,
) -> Action {
    let output = output
        .map(Path::to_path_buf)
        .unwrap_or_else(|| default_library_path(owner, settings));
    let inputs = artifacts.flatten();

    let mut arguments = vec![settings.toolchain.linker.clone()];
    arguments.extend(settings.debug_flags());
    arguments.extend(settings.platform_flag());
    arguments.push("-o".to_string());
    arguments.push(output.display().to_string());
    arguments.extend(inputs.iter().map(|p| p.display().to_string()));
    arguments.extend(extra_flags.iter().cloned());

    debug!(
        label = %owner,
        output = %output.display(),
        artifacts = inputs.len(),
        "built link action"
    );

    Action {
        mnemonic: Mnemonic::ShaderLink,
        owner: owner.clone(),
        executable: settings.toolchain.driver.clone(),
        arguments,
        inputs,
        outputs: vec![output],
    }
}
