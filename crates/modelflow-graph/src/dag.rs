//! Dependency graph (DAG) construction and traversal
//!
//! Builds forward and reverse dependency graphs for scheduling and selection.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};
use crate::manifest::Manifest;

/// Node identifier (unique_id from manifest)
pub type NodeId = String;

/// Dependency graph with forward and reverse edges
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    /// Forward edges: node -> list of nodes it depends on (parents)
    parents: HashMap<NodeId, Vec<NodeId>>,

    /// Reverse edges: node -> list of nodes that depend on it (children)
    children: HashMap<NodeId, Vec<NodeId>>,

    /// All nodes in the graph
    nodes: BTreeSet<NodeId>,
}

impl DependencyGraph {
    /// Build a dependency graph from a manifest
    pub fn from_manifest(manifest: &Manifest) -> Self {
        // Use parent_map from manifest if available
        if !manifest.parent_map.is_empty() {
            let mut graph = Self::default();
            for node_id in manifest.nodes.keys() {
                graph.add_node(node_id);
            }
            for (node_id, parent_ids) in &manifest.parent_map {
                graph.add_node(node_id);
                for parent_id in parent_ids {
                    graph.add_edge(parent_id, node_id);
                }
            }
            return graph;
        }

        // Build from depends_on if parent map is not available
        let edges = manifest.nodes.iter().flat_map(|(node_id, node)| {
            node.depends_on
                .nodes
                .iter()
                .map(move |dep| (dep.clone(), node_id.clone()))
        });

        let mut graph = Self::from_edges(edges);
        for node_id in manifest.nodes.keys() {
            graph.add_node(node_id);
        }
        graph
    }

    /// Build a graph from `(parent, child)` edges
    pub fn from_edges<I>(edges: I) -> Self
    where
        I: IntoIterator<Item = (NodeId, NodeId)>,
    {
        let mut graph = Self::default();
        for (parent, child) in edges {
            graph.add_edge(&parent, &child);
        }
        graph
    }

    /// Add an isolated node (no-op if present)
    pub fn add_node(&mut self, node_id: &str) {
        if !self.nodes.contains(node_id) {
            self.nodes.insert(node_id.to_string());
        }
    }

    /// Add an edge meaning `child` depends on `parent`
    pub fn add_edge(&mut self, parent: &str, child: &str) {
        self.add_node(parent);
        self.add_node(child);

        let parents = self.parents.entry(child.to_string()).or_default();
        if !parents.iter().any(|p| p == parent) {
            parents.push(parent.to_string());
            self.children
                .entry(parent.to_string())
                .or_default()
                .push(child.to_string());
        }
    }

    /// Get all nodes in the graph, sorted
    pub fn all_nodes(&self) -> Vec<&NodeId> {
        self.nodes.iter().collect()
    }

    pub fn contains(&self, node_id: &str) -> bool {
        self.nodes.contains(node_id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Get immediate parents (dependencies) of a node
    pub fn parents(&self, node_id: &str) -> Vec<&NodeId> {
        self.parents
            .get(node_id)
            .map(|deps| deps.iter().collect())
            .unwrap_or_default()
    }

    /// Get immediate children (dependents) of a node
    pub fn children(&self, node_id: &str) -> Vec<&NodeId> {
        self.children
            .get(node_id)
            .map(|deps| deps.iter().collect())
            .unwrap_or_default()
    }

    /// Get all downstream nodes (transitive closure of children)
    pub fn downstream(&self, node_id: &str) -> Vec<NodeId> {
        Self::walk(node_id, &self.children)
    }

    /// Get all upstream nodes (transitive closure of parents)
    pub fn upstream(&self, node_id: &str) -> Vec<NodeId> {
        Self::walk(node_id, &self.parents)
    }

    /// BFS over one edge direction, excluding the start node
    fn walk(node_id: &str, edges: &HashMap<NodeId, Vec<NodeId>>) -> Vec<NodeId> {
        let mut visited = HashSet::new();
        let mut queue = VecDeque::new();
        let mut result = Vec::new();

        if let Some(next) = edges.get(node_id) {
            queue.extend(next.iter().cloned());
        }

        while let Some(current) = queue.pop_front() {
            if current == node_id || !visited.insert(current.clone()) {
                continue;
            }
            result.push(current.clone());

            if let Some(next) = edges.get(&current) {
                for n in next {
                    if !visited.contains(n) {
                        queue.push_back(n.clone());
                    }
                }
            }
        }

        result
    }

    /// Check if there's a path from source to target
    pub fn has_path(&self, source: &str, target: &str) -> bool {
        self.downstream(source).iter().any(|n| n == target)
    }

    /// Get topological sort of all nodes
    ///
    /// Ties are broken lexically, so the order is stable across runs.
    /// Returns `None` when the graph has a cycle.
    pub fn topological_sort(&self) -> Option<Vec<NodeId>> {
        let mut in_degree: BTreeMap<&NodeId, usize> = self
            .nodes
            .iter()
            .map(|node| (node, self.parents.get(node).map_or(0, Vec::len)))
            .collect();

        // Find nodes with no dependencies
        let mut ready: BTreeSet<&NodeId> = in_degree
            .iter()
            .filter(|(_, &degree)| degree == 0)
            .map(|(node, _)| *node)
            .collect();

        let mut result = Vec::with_capacity(self.nodes.len());

        // Kahn's algorithm
        while let Some(node) = ready.pop_first() {
            result.push(node.clone());

            for child in self.children.get(node).into_iter().flatten() {
                if let Some(degree) = in_degree.get_mut(child) {
                    *degree -= 1;
                    if *degree == 0 {
                        ready.insert(child);
                    }
                }
            }
        }

        // Check if all nodes were visited (no cycles)
        if result.len() == self.nodes.len() {
            Some(result)
        } else {
            None
        }
    }

    /// Find one cycle, returned as the path `a -> b -> ... -> a`
    pub fn find_cycle(&self) -> Option<Vec<NodeId>> {
        #[derive(Clone, Copy, PartialEq)]
        enum Mark {
            Visiting,
            Done,
        }

        let mut marks: HashMap<&NodeId, Mark> = HashMap::new();

        for start in &self.nodes {
            if marks.contains_key(start) {
                continue;
            }

            // Iterative DFS: (node, index of next child to visit)
            let mut stack: Vec<(&NodeId, usize)> = vec![(start, 0)];
            marks.insert(start, Mark::Visiting);

            while let Some((node, index)) = stack.last_mut() {
                let node: &NodeId = *node;
                let children = self.children.get(node).map(Vec::as_slice).unwrap_or(&[]);

                if let Some(child) = children.get(*index) {
                    *index += 1;
                    match marks.get(child) {
                        Some(Mark::Visiting) => {
                            let from = stack.iter().position(|(n, _)| *n == child).unwrap_or(0);
                            let mut cycle: Vec<NodeId> =
                                stack[from..].iter().map(|(n, _)| (*n).clone()).collect();
                            cycle.push(child.clone());
                            return Some(cycle);
                        }
                        Some(Mark::Done) => {}
                        None => {
                            marks.insert(child, Mark::Visiting);
                            stack.push((child, 0));
                        }
                    }
                } else {
                    marks.insert(node, Mark::Done);
                    stack.pop();
                }
            }
        }

        None
    }
}
