//! Library discovery across arbitrary target kinds
//!
//! [`LibraryCollector`] walks declared edges only. It never looks at build
//! metadata or actions, so any node kind that can report its label, edges and
//! declared outputs can take part, including kinds this crate knows nothing
//! about such as application bundles or file groups.

use crate::build_order::ShaderGraph;
use crate::depset::DepSet;
use crate::error::{BuildError, BuildResult};
use crate::settings::Toolchain;
use crate::targets::{has_extension, EdgeKind, Label, ShaderTarget, TargetKind};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::PathBuf;
use tracing::trace;

/// Read-only view of a node for the library traversal
pub trait DependencyEdges {
    /// Node identity
    fn label(&self) -> &Label;

    /// Labels reached through one edge kind
    fn edges(&self, kind: EdgeKind) -> &[Label];

    /// Output files the node declares, relative to its package's output root
    fn declared_outputs(&self) -> Vec<PathBuf>;

    /// Whether the node produces a library file with the given extension
    fn produces_library(&self, extension: &str) -> bool {
        self.declared_outputs()
            .iter()
            .any(|output| has_extension(output, extension))
    }
}

impl DependencyEdges for ShaderTarget {
    fn label(&self) -> &Label {
        &self.label
    }

    fn edges(&self, kind: EdgeKind) -> &[Label] {
        ShaderTarget::edges(self, kind)
    }

    fn declared_outputs(&self) -> Vec<PathBuf> {
        self.out.iter().cloned().collect()
    }

    /// A binary always links, whatever its output is named.
    fn produces_library(&self, extension: &str) -> bool {
        self.kind == TargetKind::Binary
            || self
                .out
                .as_ref()
                .is_some_and(|out| has_extension(out, extension))
    }
}

/// A node of a kind the shader rules do not define
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignTarget {
    label: Label,
    edges: HashMap<EdgeKind, Vec<Label>>,
    outputs: Vec<PathBuf>,
}

impl ForeignTarget {
    /// Create a node with no edges or outputs
    pub fn new(label: Label) -> Self {
        Self {
            label,
            edges: HashMap::new(),
            outputs: Vec::new(),
        }
    }

    /// Set the labels of one edge kind
    pub fn with_edges(mut self, kind: EdgeKind, labels: Vec<Label>) -> Self {
        self.edges.insert(kind, labels);
        self
    }

    /// Set declared outputs
    pub fn with_outputs<P: Into<PathBuf>>(mut self, outputs: impl IntoIterator<Item = P>) -> Self {
        self.outputs = outputs.into_iter().map(Into::into).collect();
        self
    }
}

impl DependencyEdges for ForeignTarget {
    fn label(&self) -> &Label {
        &self.label
    }

    fn edges(&self, kind: EdgeKind) -> &[Label] {
        self.edges.get(&kind).map(Vec::as_slice).unwrap_or(&[])
    }

    fn declared_outputs(&self) -> Vec<PathBuf> {
        self.outputs.clone()
    }
}

/// Nodes of every kind, by label
#[derive(Default)]
pub struct TargetIndex<'a> {
    nodes: BTreeMap<Label, &'a dyn DependencyEdges>,
}

impl<'a> TargetIndex<'a> {
    /// Create an empty index
    pub fn new() -> Self {
        Self::default()
    }

    /// Index every target of a shader graph
    pub fn from_graph(graph: &'a ShaderGraph) -> Self {
        let mut index = Self::new();
        for target in graph.targets() {
            index.insert(target);
        }
        index
    }

    /// Add a node, replacing any node with the same label
    pub fn insert(&mut self, node: &'a dyn DependencyEdges) {
        self.nodes.insert(node.label().clone(), node);
    }

    /// Get a node by label
    pub fn get(&self, label: &Label) -> Option<&'a dyn DependencyEdges> {
        self.nodes.get(label).copied()
    }

    /// Number of indexed nodes
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the index is empty
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// Collects the labels of nodes that declare a library output
///
/// Each node is visited at most once per collector; later visits reuse the
/// memoized set.
pub struct LibraryCollector<'i, 'a> {
    index: &'i TargetIndex<'a>,
    edge_kinds: Vec<EdgeKind>,
    library_extension: String,
    results: HashMap<Label, DepSet<String>>,
}

impl<'i, 'a> LibraryCollector<'i, 'a> {
    /// Create a collector following every edge kind
    pub fn new(index: &'i TargetIndex<'a>) -> Self {
        Self {
            index,
            edge_kinds: EdgeKind::all().to_vec(),
            library_extension: Toolchain::default().library_extension,
            results: HashMap::new(),
        }
    }

    /// Create a collector looking for the toolchain's library extension
    pub fn for_toolchain(index: &'i TargetIndex<'a>, toolchain: &Toolchain) -> Self {
        Self::new(index).with_library_extension(toolchain.library_extension.clone())
    }

    /// Follow only the given edge kinds
    pub fn with_edge_kinds(mut self, kinds: impl IntoIterator<Item = EdgeKind>) -> Self {
        self.edge_kinds = kinds.into_iter().collect();
        self
    }

    /// Look for a different library extension
    pub fn with_library_extension(mut self, extension: impl Into<String>) -> Self {
        self.library_extension = extension.into();
        self
    }

    /// Number of nodes visited so far
    pub fn visited(&self) -> usize {
        self.results.len()
    }

    /// Labels of library-producing nodes reachable from `root`, itself included
    pub fn visit(&mut self, root: &Label) -> BuildResult<DepSet<String>> {
        if let Some(result) = self.results.get(root) {
            return Ok(result.clone());
        }

        // Iterative postorder so deep chains do not exhaust the stack.
        let mut stack: Vec<(Label, bool)> = vec![(root.clone(), false)];
        let mut path: Vec<Label> = Vec::new();
        let mut on_path: HashSet<Label> = HashSet::new();

        while let Some((label, expanded)) = stack.pop() {
            let node = self
                .index
                .get(&label)
                .ok_or_else(|| BuildError::target_not_found(label.to_string()))?;

            if expanded {
                let result = self.finish(node);
                path.pop();
                on_path.remove(&label);
                self.results.insert(label, result);
                continue;
            }

            if self.results.contains_key(&label) {
                continue;
            }
            if on_path.contains(&label) {
                let start = path.iter().position(|l| *l == label).unwrap_or(0);
                let mut cycle: Vec<String> = path[start..].iter().map(|l| l.to_string()).collect();
                cycle.push(label.to_string());
                return Err(BuildError::CircularDependency(cycle.join(" -> ")));
            }

            trace!(label = %label, "visiting node");
            path.push(label.clone());
            on_path.insert(label.clone());
            stack.push((label, true));

            let children = self.children(node);
            for child in children.into_iter().rev() {
                if !self.results.contains_key(&child) {
                    stack.push((child, false));
                }
            }
        }

        self.results
            .get(root)
            .cloned()
            .ok_or_else(|| BuildError::target_not_found(root.to_string()))
    }

    /// Union of [`visit`](Self::visit) over several roots
    pub fn collect(&mut self, roots: &[Label]) -> BuildResult<DepSet<String>> {
        let sets = roots
            .iter()
            .map(|root| self.visit(root))
            .collect::<BuildResult<Vec<_>>>()?;
        Ok(DepSet::merge(Vec::new(), sets))
    }

    fn children(&self, node: &dyn DependencyEdges) -> Vec<Label> {
        let mut seen = HashSet::new();
        self.edge_kinds
            .iter()
            .flat_map(|kind| node.edges(*kind).iter())
            .filter(|label| seen.insert(*label))
            .cloned()
            .collect()
    }

    fn finish(&self, node: &dyn DependencyEdges) -> DepSet<String> {
        let own = node
            .produces_library(&self.library_extension)
            .then(|| node.label().to_string());

        let children = self
            .children(node)
            .into_iter()
            .filter_map(|child| self.results.get(&child).cloned())
            .collect::<Vec<_>>();

        DepSet::merge(own, children)
    }
}
