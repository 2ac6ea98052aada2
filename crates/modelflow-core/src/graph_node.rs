//! Schedulable graph nodes
//!
//! A `GraphNode` tracks how many of a model's dependencies are still
//! outstanding and where the model is in its execution lifecycle.

use serde::{Deserialize, Serialize};

/// Execution state of a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeStatus {
    /// Waiting for dependencies or a free worker
    Pending,

    /// Currently executing
    Running,

    /// Finished successfully
    Success,

    /// Finished with an error
    Error,

    /// Not executed because an upstream node failed or the run stopped early
    Skipped,
}

impl NodeStatus {
    /// Whether the node has reached a final state
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Success | Self::Error | Self::Skipped)
    }
}

impl std::fmt::Display for NodeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Running => write!(f, "running"),
            Self::Success => write!(f, "success"),
            Self::Error => write!(f, "error"),
            Self::Skipped => write!(f, "skipped"),
        }
    }
}

/// One schedulable unit in a dependency graph
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphNode {
    /// Unique node identifier
    pub name: String,

    /// Number of unresolved incoming dependency edges
    in_degree: usize,

    /// Execution state
    pub status: NodeStatus,

    /// Last state change (epoch milliseconds)
    pub update_date: i64,

    /// Execution start (epoch milliseconds, 0 until started)
    pub start_date: i64,
}

impl GraphNode {
    /// Create a pending node with the given number of unresolved dependencies
    pub fn new(name: impl Into<String>, in_degree: usize) -> Self {
        Self {
            name: name.into(),
            in_degree,
            status: NodeStatus::Pending,
            update_date: chrono::Utc::now().timestamp_millis(),
            start_date: 0,
        }
    }

    pub fn in_degree(&self) -> usize {
        self.in_degree
    }

    /// Resolve one incoming edge
    ///
    /// Returns the remaining in-degree. Fails instead of wrapping when every
    /// edge has already been resolved.
    pub fn decrement_in_degree(&mut self) -> Result<usize, GraphNodeError> {
        if self.in_degree == 0 {
            return Err(GraphNodeError::InDegreeUnderflow(self.name.clone()));
        }
        self.in_degree -= 1;
        self.update_date = chrono::Utc::now().timestamp_millis();
        Ok(self.in_degree)
    }

    /// A node is ready once every dependency is resolved and it has not started
    pub fn is_ready(&self) -> bool {
        self.in_degree == 0 && self.status == NodeStatus::Pending
    }

    /// Transition `Pending -> Running`
    pub fn mark_running(&mut self, now: i64) -> Result<(), GraphNodeError> {
        if !self.is_ready() {
            return Err(GraphNodeError::InvalidTransition {
                node: self.name.clone(),
                from: self.status,
                to: NodeStatus::Running,
            });
        }
        self.status = NodeStatus::Running;
        self.start_date = now;
        self.update_date = now;
        Ok(())
    }

    /// Move the node into a terminal state
    pub fn finish(&mut self, status: NodeStatus, now: i64) -> Result<(), GraphNodeError> {
        if !status.is_terminal() || self.status.is_terminal() {
            return Err(GraphNodeError::InvalidTransition {
                node: self.name.clone(),
                from: self.status,
                to: status,
            });
        }
        self.status = status;
        self.update_date = now;
        Ok(())
    }
}

/// Graph node bookkeeping errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GraphNodeError {
    #[error("In-degree of node '{0}' is already zero")]
    InDegreeUnderflow(String),

    #[error("Node '{node}' cannot move from {from} to {to}")]
    InvalidTransition {
        node: String,
        from: NodeStatus,
        to: NodeStatus,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_node_is_pending() {
        let node = GraphNode::new("model.shop.orders", 2);
        assert_eq!(node.status, NodeStatus::Pending);
        assert_eq!(node.in_degree(), 2);
        assert_eq!(node.start_date, 0);
        assert!(!node.is_ready());
    }

    #[test]
    fn in_degree_never_goes_negative() {
        let mut node = GraphNode::new("a", 1);
        assert_eq!(node.decrement_in_degree(), Ok(0));
        assert!(node.is_ready());

        let err = node.decrement_in_degree().unwrap_err();
        assert_eq!(err, GraphNodeError::InDegreeUnderflow("a".to_string()));
        assert_eq!(node.in_degree(), 0);
    }

    #[test]
    fn lifecycle_transitions() {
        let mut node = GraphNode::new("a", 0);
        node.mark_running(100).unwrap();
        assert_eq!(node.status, NodeStatus::Running);
        assert_eq!(node.start_date, 100);

        node.finish(NodeStatus::Success, 250).unwrap();
        assert_eq!(node.status, NodeStatus::Success);
        assert_eq!(node.update_date, 250);

        // Terminal nodes stay terminal
        assert!(node.finish(NodeStatus::Error, 300).is_err());
    }

    #[test]
    fn cannot_run_blocked_node() {
        let mut node = GraphNode::new("a", 1);
        assert!(node.mark_running(1).is_err());
    }

    #[test]
    fn pending_node_can_be_skipped() {
        let mut node = GraphNode::new("a", 3);
        node.finish(NodeStatus::Skipped, 5).unwrap();
        assert_eq!(node.status, NodeStatus::Skipped);
    }
}
