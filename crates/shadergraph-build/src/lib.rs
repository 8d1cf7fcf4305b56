//! Shader library build graph
//!
//! Turns declared shader targets into compile and link actions for a host
//! build engine:
//! - Structurally shared transitive sets ([`DepSet`])
//! - Header virtualization under per-target include directories
//! - Compile and link action construction
//! - Dependency-ordered planning with serializable build plans
//! - Library discovery across foreign node kinds, and a debug workspace script

pub mod actions;
pub mod build_order;
pub mod builder;
pub mod depset;
pub mod error;
pub mod headers;
pub mod script;
pub mod settings;
pub mod targets;
pub mod traversal;

// Re-export main types
pub use actions::{compile_unit, default_library_path, intermediate_path, link_artifacts, Action, Mnemonic};
pub use build_order::ShaderGraph;
pub use builder::{BuildPlan, BuildStats, Builder, Provided, ShaderInfo};
pub use depset::{DepSet, Order};
pub use error::{BuildError, BuildResult};
pub use headers::{virtual_dir_for, virtualize, Indirection, VirtualHeaders, VIRTUAL_INCLUDES_DIR};
pub use script::DebugScript;
pub use settings::{BuildSettings, Platform, Toolchain, DEFAULT_OUTPUT_ROOT};
pub use targets::{EdgeKind, Label, ShaderTarget, TargetKind};
pub use traversal::{DependencyEdges, ForeignTarget, LibraryCollector, TargetIndex};

// Re-export shadergraph-config types for convenience
pub use shadergraph_config::{BuildMode, PlatformFamily, ShaderManifest};
