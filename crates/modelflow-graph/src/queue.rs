//! Scheduling queue over a selected subgraph
//!
//! Each selected node gets a [`GraphNode`] whose in-degree counts its
//! nearest selected ancestors. Completing a node releases its children; failing or
//! skipping a node skips every selected descendant.

use modelflow_core::{GraphNode, GraphNodeError, NodeStatus};
use std::collections::{BTreeMap, BTreeSet, HashSet, VecDeque};

use crate::dag::{DependencyGraph, NodeId};

/// A node skipped because of an upstream node
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedNode {
    pub unique_id: NodeId,

    /// The failed or skipped node that caused the skip
    pub cause: NodeId,
}

/// What changed after a node finished
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueueUpdate {
    /// Nodes that just became ready
    pub ready: Vec<NodeId>,

    /// Nodes that were skipped as a consequence
    pub skipped: Vec<SkippedNode>,
}

/// Queue of schedulable nodes
#[derive(Debug, Clone)]
pub struct GraphQueue {
    nodes: BTreeMap<NodeId, GraphNode>,

    /// Edges between selected nodes, including those that pass through unselected ones
    children: BTreeMap<NodeId, BTreeSet<NodeId>>,

    ready: BTreeSet<NodeId>,
}

impl GraphQueue {
    /// Build a queue over `selected` nodes of `graph`
    ///
    /// A selected node waits on its nearest selected ancestors, so `a -> b -> c`
    /// with only `a` and `c` selected still runs `a` before `c`. Unknown ids in
    /// `selected` are ignored.
    pub fn new(graph: &DependencyGraph, selected: &BTreeSet<NodeId>) -> Self {
        let mut nodes = BTreeMap::new();
        let mut children: BTreeMap<NodeId, BTreeSet<NodeId>> = BTreeMap::new();
        let mut ready = BTreeSet::new();

        for node_id in selected.iter().filter(|id| graph.contains(id)) {
            let parents = nearest_selected_parents(graph, node_id, selected);
            for parent in &parents {
                children.entry(parent.clone()).or_default().insert(node_id.clone());
            }

            if parents.is_empty() {
                ready.insert(node_id.clone());
            }
            nodes.insert(node_id.clone(), GraphNode::new(node_id.clone(), parents.len()));
        }

        Self {
            nodes,
            children,
            ready,
        }
    }

    /// Take the next ready node and mark it running
    pub fn pop_ready(&mut self) -> Option<NodeId> {
        let node_id = self.ready.pop_first()?;
        let node = self.nodes.get_mut(&node_id)?;
        match node.mark_running(now()) {
            Ok(()) => Some(node_id),
            Err(err) => {
                tracing::warn!(node = %node_id, error = %err, "ready node could not start");
                None
            }
        }
    }

    /// Record the terminal status of a running node
    pub fn mark_done(&mut self, node_id: &str, status: NodeStatus) -> Result<QueueUpdate, QueueError> {
        let node = self
            .nodes
            .get_mut(node_id)
            .ok_or_else(|| QueueError::UnknownNode(node_id.to_string()))?;

        if node.status != NodeStatus::Running {
            return Err(QueueError::NotRunning(node_id.to_string()));
        }
        node.finish(status, now())?;

        let mut update = QueueUpdate::default();

        match status {
            NodeStatus::Success => {
                let children: Vec<NodeId> = self
                    .children
                    .get(node_id)
                    .map(|c| c.iter().cloned().collect())
                    .unwrap_or_default();
                for child_id in children {
                    let Some(child) = self.nodes.get_mut(&child_id) else {
                        continue;
                    };
                    if child.status.is_terminal() {
                        continue;
                    }
                    child.decrement_in_degree()?;
                    if child.is_ready() {
                        self.ready.insert(child_id.clone());
                        update.ready.push(child_id);
                    }
                }
            }
            _ => {
                update.skipped = self.skip_descendants(node_id)?;
            }
        }

        Ok(update)
    }

    fn skip_descendants(&mut self, node_id: &str) -> Result<Vec<SkippedNode>, QueueError> {
        let mut skipped = Vec::new();
        for descendant in self.descendants(node_id) {
            let Some(node) = self.nodes.get_mut(&descendant) else {
                continue;
            };
            if node.status != NodeStatus::Pending {
                continue;
            }
            node.finish(NodeStatus::Skipped, now())?;
            self.ready.remove(&descendant);
            skipped.push(SkippedNode {
                unique_id: descendant,
                cause: node_id.to_string(),
            });
        }
        Ok(skipped)
    }

    /// Selected nodes reachable from `node_id`, nearest first
    fn descendants(&self, node_id: &str) -> Vec<NodeId> {
        let mut seen = BTreeSet::new();
        let mut pending: VecDeque<&NodeId> = self.children.get(node_id).into_iter().flatten().collect();
        let mut result = Vec::new();

        while let Some(current) = pending.pop_front() {
            if !seen.insert(current) {
                continue;
            }
            result.push(current.clone());
            pending.extend(self.children.get(current).into_iter().flatten());
        }
        result
    }

    /// Skip every node that has not started yet
    pub fn skip_remaining(&mut self) -> Vec<NodeId> {
        let now = now();
        let mut skipped = Vec::new();
        for (node_id, node) in self.nodes.iter_mut() {
            if node.status == NodeStatus::Pending && node.finish(NodeStatus::Skipped, now).is_ok() {
                skipped.push(node_id.clone());
            }
        }
        self.ready.clear();
        skipped
    }

    pub fn has_ready(&self) -> bool {
        !self.ready.is_empty()
    }

    pub fn running(&self) -> usize {
        self.count(NodeStatus::Running)
    }

    /// Nodes not yet in a terminal state
    pub fn remaining(&self) -> usize {
        self.nodes.values().filter(|n| !n.status.is_terminal()).count()
    }

    pub fn is_finished(&self) -> bool {
        self.remaining() == 0
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, node_id: &str) -> Option<&GraphNode> {
        self.nodes.get(node_id)
    }

    fn count(&self, status: NodeStatus) -> usize {
        self.nodes.values().filter(|n| n.status == status).count()
    }
}

/// Closest selected ancestors of `node_id`, looking through unselected nodes
fn nearest_selected_parents(
    graph: &DependencyGraph,
    node_id: &str,
    selected: &BTreeSet<NodeId>,
) -> BTreeSet<NodeId> {
    let mut found = BTreeSet::new();
    let mut seen = HashSet::new();
    let mut pending: VecDeque<&NodeId> = graph.parents(node_id).into_iter().collect();

    while let Some(parent) = pending.pop_front() {
        if !seen.insert(parent) {
            continue;
        }
        if selected.contains(parent) {
            found.insert(parent.clone());
        } else {
            pending.extend(graph.parents(parent));
        }
    }
    found
}

fn now() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Queue errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QueueError {
    #[error("Node '{0}' is not part of this queue")]
    UnknownNode(String),

    #[error("Node '{0}' is not running")]
    NotRunning(String),

    #[error(transparent)]
    Node(#[from] GraphNodeError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    /// a -> b -> d, a -> c -> d, x isolated
    fn graph() -> DependencyGraph {
        let mut graph = DependencyGraph::from_edges(
            [("a", "b"), ("a", "c"), ("b", "d"), ("c", "d")]
                .iter()
                .map(|(p, c)| (p.to_string(), c.to_string())),
        );
        graph.add_node("x");
        graph
    }

    fn all(graph: &DependencyGraph) -> BTreeSet<NodeId> {
        graph.all_nodes().into_iter().cloned().collect()
    }

    #[test]
    fn initial_ready_set() {
        let graph = graph();
        let queue = GraphQueue::new(&graph, &all(&graph));
        assert_eq!(queue.len(), 5);
        assert_eq!(queue.node("d").unwrap().in_degree(), 2);
        assert!(queue.node("a").unwrap().is_ready());
        assert!(queue.node("x").unwrap().is_ready());
    }

    #[test]
    fn completes_in_dependency_order() {
        let graph = graph();
        let mut queue = GraphQueue::new(&graph, &all(&graph));

        assert_eq!(queue.pop_ready().as_deref(), Some("a"));
        assert_eq!(queue.pop_ready().as_deref(), Some("x"));
        assert_eq!(queue.pop_ready(), None);
        assert_eq!(queue.running(), 2);

        let update = queue.mark_done("a", NodeStatus::Success).unwrap();
        assert_eq!(update.ready, vec!["b".to_string(), "c".to_string()]);

        queue.mark_done("x", NodeStatus::Success).unwrap();
        assert_eq!(queue.pop_ready().as_deref(), Some("b"));
        let update = queue.mark_done("b", NodeStatus::Success).unwrap();
        assert!(update.ready.is_empty());
        assert_eq!(queue.node("d").unwrap().in_degree(), 1);

        assert_eq!(queue.pop_ready().as_deref(), Some("c"));
        let update = queue.mark_done("c", NodeStatus::Success).unwrap();
        assert_eq!(update.ready, vec!["d".to_string()]);

        assert_eq!(queue.pop_ready().as_deref(), Some("d"));
        queue.mark_done("d", NodeStatus::Success).unwrap();
        assert!(queue.is_finished());
    }

    #[test]
    fn failure_skips_descendants() {
        let graph = graph();
        let mut queue = GraphQueue::new(&graph, &all(&graph));

        queue.pop_ready();
        let update = queue.mark_done("a", NodeStatus::Error).unwrap();

        let mut skipped: Vec<&str> = update.skipped.iter().map(|s| s.unique_id.as_str()).collect();
        skipped.sort();
        assert_eq!(skipped, vec!["b", "c", "d"]);
        assert!(update.skipped.iter().all(|s| s.cause == "a"));
        assert_eq!(queue.node("d").unwrap().status, NodeStatus::Skipped);

        // The isolated node is unaffected
        assert_eq!(queue.pop_ready().as_deref(), Some("x"));
        queue.mark_done("x", NodeStatus::Success).unwrap();
        assert!(queue.is_finished());
    }

    #[test]
    fn in_degree_counts_selected_parents_only() {
        let graph = graph();
        let selected: BTreeSet<NodeId> = ["c", "d"].iter().map(|s| s.to_string()).collect();
        let mut queue = GraphQueue::new(&graph, &selected);

        assert_eq!(queue.len(), 2);
        assert_eq!(queue.node("d").unwrap().in_degree(), 1);
        assert_eq!(queue.pop_ready().as_deref(), Some("c"));
    }

    #[test]
    fn waits_on_selected_ancestors_through_unselected_nodes() {
        // a -> b -> c with b left out
        let graph = DependencyGraph::from_edges(
            [("a", "b"), ("b", "c")]
                .iter()
                .map(|(p, c)| (p.to_string(), c.to_string())),
        );
        let selected: BTreeSet<NodeId> = ["a", "c"].iter().map(|s| s.to_string()).collect();
        let mut queue = GraphQueue::new(&graph, &selected);

        assert_eq!(queue.node("c").unwrap().in_degree(), 1);
        assert_eq!(queue.pop_ready().as_deref(), Some("a"));
        assert_eq!(queue.pop_ready(), None);

        let update = queue.mark_done("a", NodeStatus::Success).unwrap();
        assert_eq!(update.ready, vec!["c".to_string()]);
    }

    #[test]
    fn failure_skips_selected_nodes_behind_unselected_ones() {
        let graph = DependencyGraph::from_edges(
            [("a", "b"), ("b", "c")]
                .iter()
                .map(|(p, c)| (p.to_string(), c.to_string())),
        );
        let selected: BTreeSet<NodeId> = ["a", "c"].iter().map(|s| s.to_string()).collect();
        let mut queue = GraphQueue::new(&graph, &selected);

        queue.pop_ready();
        let update = queue.mark_done("a", NodeStatus::Error).unwrap();

        assert_eq!(
            update.skipped,
            vec![SkippedNode {
                unique_id: "c".to_string(),
                cause: "a".to_string(),
            }]
        );
        assert!(queue.is_finished());
    }

    #[test]
    fn skip_remaining_stops_everything_pending() {
        let graph = graph();
        let mut queue = GraphQueue::new(&graph, &all(&graph));
        queue.pop_ready();

        let mut skipped = queue.skip_remaining();
        skipped.sort();
        assert_eq!(skipped, vec!["b", "c", "d", "x"]);
        assert!(!queue.has_ready());
        assert_eq!(queue.remaining(), 1);
    }

    #[test]
    fn finishing_a_node_twice_is_rejected() {
        let graph = graph();
        let mut queue = GraphQueue::new(&graph, &all(&graph));
        queue.pop_ready();
        queue.mark_done("a", NodeStatus::Success).unwrap();

        assert_eq!(
            queue.mark_done("a", NodeStatus::Success),
            Err(QueueError::NotRunning("a".to_string()))
        );
        assert_eq!(
            queue.mark_done("zzz", NodeStatus::Success),
            Err(QueueError::UnknownNode("zzz".to_string()))
        );
    }
}
