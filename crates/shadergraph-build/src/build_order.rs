//! Target graph and processing order using topological sort
use crate::error::{BuildError, BuildResult};
use crate::targets::{Label, ShaderTarget, TargetKind};
use shadergraph_config::ShaderManifest;
use std::collections::{BTreeMap, BTreeSet, HashSet};

/// Declared shader targets keyed by label
#[derive(Debug, Clone, Default)]
pub struct ShaderGraph {
    targets: BTreeMap<Label, ShaderTarget>,
}

impl ShaderGraph {
    /// Create a new empty graph
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a graph from every target of a manifest
    pub fn from_manifest(manifest: &ShaderManifest) -> BuildResult<Self> {
        let mut graph = Self::new();
        for config in &manifest.targets {
            graph.add_target(ShaderTarget::from_config(config)?)?;
        }
        Ok(graph)
    }

    /// Add a target to the graph
    pub fn add_target(&mut self, target: ShaderTarget) -> BuildResult<()> {
        target.validate()?;
        if self.targets.contains_key(&target.label) {
            return Err(BuildError::InvalidTarget(format!(
                "target '{}' is declared twice",
                target.label
            )));
        }
        self.targets.insert(target.label.clone(), target);
        Ok(())
    }

    /// Get a target by label
    pub fn get(&self, label: &Label) -> Option<&ShaderTarget> {
        self.targets.get(label)
    }

    /// All targets in label order
    pub fn targets(&self) -> impl Iterator<Item = &ShaderTarget> {
        self.targets.values()
    }

    /// Get target count
    pub fn len(&self) -> usize {
        self.targets.len()
    }

    /// Check if graph is empty
    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    /// Validate build edges
    ///
    /// Every `deps` label must be declared, and no target may depend on a
    /// binary. `data` and `implementation_deps` may point outside the graph.
    pub fn validate(&self) -> BuildResult<()> {
        for (label, target) in &self.targets {
            for dep in &target.deps {
                let Some(dependency) = self.targets.get(dep) else {
                    return Err(BuildError::target_not_found(format!(
                        "{} (required by {})",
                        dep, label
                    )));
                };
                if dependency.kind == TargetKind::Binary {
                    return Err(BuildError::InvalidDependency {
                        target: label.to_string(),
                        dependency: dep.to_string(),
                        reason: "binary targets are terminal and cannot be depended on".to_string(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Compute the processing order using Kahn's algorithm
    ///
    /// Dependencies come before their dependents. Among targets that are ready
    /// at the same time the smallest label goes first, so the order is stable.
    pub fn build_order(&self) -> BuildResult<Vec<Label>> {
        self.validate()?;

        let mut in_degree: BTreeMap<&Label, usize> = BTreeMap::new();
        let mut dependents: BTreeMap<&Label, Vec<&Label>> = BTreeMap::new();
        for (label, target) in &self.targets {
            let unique: BTreeSet<&Label> = target.deps.iter().collect();
            in_degree.insert(label, unique.len());
            for dep in unique {
                dependents.entry(dep).or_default().push(label);
            }
        }

        let mut ready: BTreeSet<&Label> = in_degree
            .iter()
            .filter(|(_, degree)| **degree == 0)
            .map(|(label, _)| *label)
            .collect();
        let mut result = Vec::with_capacity(self.targets.len());

        while let Some(label) = ready.pop_first() {
            result.push(label.clone());
            for dependent in dependents.get(label).into_iter().flatten() {
                if let Some(degree) = in_degree.get_mut(dependent) {
                    *degree -= 1;
                    if *degree == 0 {
                        ready.insert(*dependent);
                    }
                }
            }
        }

        if result.len() != self.targets.len() {
            return Err(BuildError::CircularDependency(self.find_cycle()));
        }

        Ok(result)
    }

    /// Find a cycle in the graph (for error reporting)
    fn find_cycle(&self) -> String {
        let mut visited = HashSet::new();
        let mut rec_stack = HashSet::new();
        let mut path = Vec::new();

        for label in self.targets.keys() {
            if let Some(cycle) = self.dfs_find_cycle(label, &mut visited, &mut rec_stack, &mut path) {
                return cycle;
            }
        }

        "unknown cycle".to_string()
    }

    fn dfs_find_cycle<'a>(
        &'a self,
        label: &'a Label,
        visited: &mut HashSet<&'a Label>,
        rec_stack: &mut HashSet<&'a Label>,
        path: &mut Vec<&'a Label>,
    ) -> Option<String> {
        if rec_stack.contains(label) {
            let start = path.iter().position(|l| *l == label).unwrap_or(0);
            let mut cycle: Vec<String> = path[start..].iter().map(|l| l.to_string()).collect();
            cycle.push(label.to_string());
            return Some(cycle.join(" -> "));
        }

        if !visited.insert(label) {
            return None;
        }
        rec_stack.insert(label);
        path.push(label);

        if let Some(target) = self.targets.get(label) {
            for dep in &target.deps {
                if let Some(cycle) = self.dfs_find_cycle(dep, visited, rec_stack, path) {
                    return Some(cycle);
                }
            }
        }

        rec_stack.remove(label);
        path.pop();
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn label(s: &str) -> Label {
        Label::parse(s).unwrap()
    }

    fn lib(name: &str, deps: &[&str]) -> ShaderTarget {
        ShaderTarget::library(name)
            .unwrap()
            .with_deps(deps.iter().map(|d| label(d)).collect())
    }

    fn order(graph: &ShaderGraph) -> Vec<String> {
        graph
            .build_order()
            .unwrap()
            .into_iter()
            .map(|l| l.to_string())
            .collect()
    }

    #[test]
    fn test_empty_graph() {
        let graph = ShaderGraph::new();
        assert!(graph.is_empty());
        assert_eq!(graph.len(), 0);
        assert!(graph.build_order().unwrap().is_empty());
    }

    #[test]
    fn test_linear_dependency_chain() {
        let mut graph = ShaderGraph::new();
        graph.add_target(lib("//x:a", &["//x:b"])).unwrap();
        graph.add_target(lib("//x:b", &["//x:c"])).unwrap();
        graph.add_target(lib("//x:c", &[])).unwrap();

        assert_eq!(order(&graph), vec!["//x:c", "//x:b", "//x:a"]);
    }

    #[test]
    fn test_diamond_dependency() {
        let mut graph = ShaderGraph::new();
        graph.add_target(lib("//x:a", &["//x:b", "//x:c"])).unwrap();
        graph.add_target(lib("//x:b", &["//x:d"])).unwrap();
        graph.add_target(lib("//x:c", &["//x:d"])).unwrap();
        graph.add_target(lib("//x:d", &[])).unwrap();

        assert_eq!(order(&graph), vec!["//x:d", "//x:b", "//x:c", "//x:a"]);
    }

    #[test]
    fn test_duplicate_dependency_counted_once() {
        let mut graph = ShaderGraph::new();
        graph.add_target(lib("//x:a", &["//x:b", "//x:b"])).unwrap();
        graph.add_target(lib("//x:b", &[])).unwrap();

        assert_eq!(order(&graph), vec!["//x:b", "//x:a"]);
    }

    #[test]
    fn test_circular_dependency_detection() {
        let mut graph = ShaderGraph::new();
        graph.add_target(lib("//x:a", &["//x:b"])).unwrap();
        graph.add_target(lib("//x:b", &["//x:a"])).unwrap();

        match graph.build_order() {
            Err(BuildError::CircularDependency(cycle)) => {
                assert_eq!(cycle, "//x:a -> //x:b -> //x:a");
            }
            other => panic!("Expected CircularDependency error, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_dependency() {
        let mut graph = ShaderGraph::new();
        graph.add_target(lib("//x:a", &["//x:nonexistent"])).unwrap();

        match graph.validate() {
            Err(BuildError::TargetNotFound { target }) => {
                assert!(target.contains("//x:nonexistent"));
                assert!(target.contains("//x:a"));
            }
            other => panic!("Expected TargetNotFound error, got {:?}", other),
        }
    }

    #[test]
    fn test_depending_on_binary_rejected() {
        let mut graph = ShaderGraph::new();
        graph
            .add_target(ShaderTarget::binary("//x:app").unwrap().with_srcs(["x/app.metal"]))
            .unwrap();
        graph.add_target(lib("//x:a", &["//x:app"])).unwrap();

        assert!(matches!(
            graph.build_order(),
            Err(BuildError::InvalidDependency { .. })
        ));
    }

    #[test]
    fn test_non_build_edges_may_leave_graph() {
        let mut graph = ShaderGraph::new();
        graph
            .add_target(lib("//x:a", &[]).with_data(vec![label("//app:bundle")]))
            .unwrap();
        assert!(graph.validate().is_ok());
    }

    #[test]
    fn test_duplicate_target_rejected() {
        let mut graph = ShaderGraph::new();
        graph.add_target(lib("//x:a", &[])).unwrap();
        assert!(matches!(
            graph.add_target(lib("//x:a", &[])),
            Err(BuildError::InvalidTarget(_))
        ));
    }

    #[test]
    fn test_get_target() {
        let mut graph = ShaderGraph::new();
        graph.add_target(lib("//x:a", &[])).unwrap();

        assert_eq!(graph.get(&label("//x:a")).unwrap().label, label("//x:a"));
        assert!(graph.get(&label("//x:missing")).is_none());
    }
}
