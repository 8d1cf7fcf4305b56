//! Build planning
//!
//! The [`Builder`] walks the target graph in dependency order and turns each
//! target into compile and link actions. Every library exposes a
//! [`ShaderInfo`] whose sets share structure with its dependencies' sets, so
//! the work per target is proportional to its own attributes, not to the size
//! of its transitive closure.

use crate::actions::{compile_unit, link_artifacts, Action, Mnemonic};
use crate::build_order::ShaderGraph;
use crate::depset::{DepSet, Order};
use crate::error::{BuildError, BuildResult};
use crate::headers::{virtualize, VirtualHeaders};
use crate::settings::BuildSettings;
use crate::targets::{has_extension, Label, ShaderTarget, TargetKind};
use rayon::prelude::*;
use serde::Serialize;
use shadergraph_config::ShaderManifest;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Transitive metadata a library exposes to its dependents
#[derive(Debug, Clone, Default, Serialize)]
pub struct ShaderInfo {
    /// Public headers, virtual and real, of the target and its dependencies
    pub headers: DepSet<PathBuf>,
    /// Include directories, the target's own first
    pub header_paths: DepSet<PathBuf>,
    /// Intermediate artifacts of the target and its dependencies
    pub artifacts: DepSet<PathBuf>,
}

/// What a processed target exposes downstream
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Provided {
    /// Aggregated metadata of a library
    Info(ShaderInfo),
    /// Final library file of a binary
    Library(PathBuf),
}

impl Provided {
    /// Aggregated metadata, if the target exposes any
    pub fn info(&self) -> Option<&ShaderInfo> {
        match self {
            Self::Info(info) => Some(info),
            Self::Library(_) => None,
        }
    }
}

/// Build statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BuildStats {
    /// Number of targets processed
    pub targets: usize,
    /// Number of compile actions
    pub compile_actions: usize,
    /// Number of link actions
    pub link_actions: usize,
    /// Number of header symlinks
    pub indirections: usize,
}

/// Everything the host engine needs to run a build
#[derive(Debug, Clone, Serialize)]
pub struct BuildPlan {
    /// Actions in a valid execution order
    pub actions: Vec<Action>,
    /// Provider of each target
    pub providers: BTreeMap<Label, Provided>,
    /// Linked library of each linking target
    pub libraries: BTreeMap<Label, PathBuf>,
    /// Header virtualization of each target
    pub virtual_headers: BTreeMap<Label, VirtualHeaders>,
    /// Summary counts
    pub stats: BuildStats,
}

impl BuildPlan {
    /// Provider of a target
    pub fn provider(&self, label: &Label) -> Option<&Provided> {
        self.providers.get(label)
    }

    /// Actions owned by a target, in plan order
    pub fn actions_for<'a, 'l>(&'a self, label: &'l Label) -> impl Iterator<Item = &'a Action> + 'l
    where
        'a: 'l,
    {
        self.actions.iter().filter(move |a| &a.owner == label)
    }

    /// Link action of a target, if it links
    pub fn link_action(&self, label: &Label) -> Option<&Action> {
        self.actions
            .iter()
            .find(|a| &a.owner == label && a.mnemonic == Mnemonic::ShaderLink)
    }

    /// Serialize the plan as pretty-printed JSON
    pub fn to_json(&self) -> BuildResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Create every header symlink under `exec_root`
    ///
    /// Targets are materialized in parallel; each path is written at most
    /// once. Returns the number of links written.
    pub fn materialize(&self, exec_root: &Path) -> BuildResult<usize> {
        let written = self
            .virtual_headers
            .par_iter()
            .map(|(_, headers)| headers.materialize(exec_root))
            .collect::<BuildResult<Vec<usize>>>()?
            .into_iter()
            .sum();

        info!(
            exec_root = %exec_root.display(),
            written,
            "materialized header links"
        );
        Ok(written)
    }
}

/// Turns a target graph into a build plan
pub struct Builder {
    graph: ShaderGraph,
    settings: BuildSettings,
}

impl Builder {
    /// Create a builder
    pub fn new(graph: ShaderGraph, settings: BuildSettings) -> Self {
        Self { graph, settings }
    }

    /// Create a builder for every target and setting of a manifest
    pub fn from_manifest(manifest: &ShaderManifest) -> BuildResult<Self> {
        Ok(Self::new(
            ShaderGraph::from_manifest(manifest)?,
            BuildSettings::from_manifest(manifest),
        ))
    }

    /// Target graph
    pub fn graph(&self) -> &ShaderGraph {
        &self.graph
    }

    /// Build settings
    pub fn settings(&self) -> &BuildSettings {
        &self.settings
    }

    /// Plan the build
    ///
    /// The first invalid target aborts planning.
    pub fn plan(&self) -> BuildResult<BuildPlan> {
        let order = self.graph.build_order()?;

        let mut plan = BuildPlan {
            actions: Vec::new(),
            providers: BTreeMap::new(),
            libraries: BTreeMap::new(),
            virtual_headers: BTreeMap::new(),
            stats: BuildStats::default(),
        };

        for label in &order {
            let target = self
                .graph
                .get(label)
                .ok_or_else(|| BuildError::target_not_found(label.to_string()))?;
            self.process(target, &mut plan)?;
        }

        info!(
            mode = %self.settings.mode,
            targets = plan.stats.targets,
            compile_actions = plan.stats.compile_actions,
            link_actions = plan.stats.link_actions,
            indirections = plan.stats.indirections,
            "planned shader build"
        );

        Ok(plan)
    }

    fn process(&self, target: &ShaderTarget, plan: &mut BuildPlan) -> BuildResult<()> {
        let deps = self.dependency_infos(target, &plan.providers)?;

        let virtual_headers = virtualize(
            target,
            &target.hdrs,
            &target.include_prefix,
            &target.strip_include_prefix,
            &self.settings.output_root,
        )?;

        let own_headers: Vec<PathBuf> = virtual_headers
            .headers
            .iter()
            .chain(virtual_headers.real_headers())
            .cloned()
            .collect();
        let headers = DepSet::merge(own_headers, deps.iter().map(|d| d.headers.clone()));
        let header_paths = DepSet::merge_ordered(
            Order::Preorder,
            [virtual_headers.root.clone()],
            deps.iter().map(|d| d.header_paths.clone()),
        );

        let (private_headers, sources) = self.partition_sources(target)?;

        // Computed once and shared by every compile action of the target.
        let compile_headers =
            DepSet::merge(Vec::new(), [DepSet::leaf(private_headers), headers.clone()]).flatten();
        let include_dirs = header_paths.flatten();

        let mut own_artifacts = Vec::with_capacity(sources.len());
        for source in sources {
            let (action, artifact) = compile_unit(
                &target.label,
                source,
                &compile_headers,
                &include_dirs,
                &self.settings,
                &target.copts,
            );
            plan.actions.push(action);
            own_artifacts.push(artifact);
            plan.stats.compile_actions += 1;
        }

        let artifacts = DepSet::merge(own_artifacts, deps.iter().map(|d| d.artifacts.clone()));

        if target.links() {
            let declared = target.out.as_ref().map(|out| self.settings.output_root.join(out));
            let action = link_artifacts(
                &target.label,
                &artifacts,
                &self.settings,
                &target.copts,
                declared.as_deref(),
            );
            if let Some(library) = action.outputs.first() {
                plan.libraries.insert(target.label.clone(), library.clone());
            }
            plan.actions.push(action);
            plan.stats.link_actions += 1;
        }

        let provided = match target.kind {
            TargetKind::Binary => {
                let library = plan
                    .libraries
                    .get(&target.label)
                    .cloned()
                    .ok_or_else(|| {
                        BuildError::InvalidTarget(format!(
                            "binary target '{}' produced no library",
                            target.label
                        ))
                    })?;
                Provided::Library(library)
            }
            TargetKind::Library => Provided::Info(ShaderInfo {
                headers,
                header_paths,
                artifacts,
            }),
        };

        debug!(
            label = %target.label,
            kind = %target.kind,
            indirections = virtual_headers.indirections.len(),
            "processed target"
        );

        plan.stats.targets += 1;
        plan.stats.indirections += virtual_headers.indirections.len();
        plan.virtual_headers.insert(target.label.clone(), virtual_headers);
        plan.providers.insert(target.label.clone(), provided);
        Ok(())
    }

    /// Infos of a target's build dependencies, in declaration order
    fn dependency_infos(
        &self,
        target: &ShaderTarget,
        providers: &BTreeMap<Label, Provided>,
    ) -> BuildResult<Vec<ShaderInfo>> {
        target
            .deps
            .iter()
            .map(|dep| match providers.get(dep) {
                Some(Provided::Info(info)) => Ok(info.clone()),
                Some(Provided::Library(_)) => Err(BuildError::InvalidDependency {
                    target: target.label.to_string(),
                    dependency: dep.to_string(),
                    reason: "binary targets are terminal and cannot be depended on".to_string(),
                }),
                None => Err(BuildError::target_not_found(format!(
                    "{} (required by {})",
                    dep, target.label
                ))),
            })
            .collect()
    }

    /// Split `srcs` into private headers and compilable sources
    fn partition_sources<'t>(&self, target: &'t ShaderTarget) -> BuildResult<(Vec<PathBuf>, Vec<&'t Path>)> {
        let toolchain = &self.settings.toolchain;
        let mut private_headers = Vec::new();
        let mut sources = Vec::new();

        for src in &target.srcs {
            if has_extension(src, &toolchain.header_extension) {
                private_headers.push(src.clone());
            } else if has_extension(src, &toolchain.source_extension) {
                sources.push(src.as_path());
            } else {
                return Err(BuildError::InvalidTarget(format!(
                    "target '{}' lists '{}', expected .{} or .{} files",
                    target.label,
                    src.display(),
                    toolchain.source_extension,
                    toolchain.header_extension
                )));
            }
        }

        Ok((private_headers, sources))
    }
}
