//! Execution results and the run_results artifact (stable v1)
//!
//! The artifact schema is STABLE and VERSIONED.
//! Breaking changes require a new version.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use crate::graph_node::NodeStatus;

/// Artifact schema version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactVersion {
    /// Major version (breaking changes)
    pub major: u32,

    /// Minor version (backward-compatible additions)
    pub minor: u32,
}

impl ArtifactVersion {
    /// Current run_results schema version
    pub const CURRENT: ArtifactVersion = ArtifactVersion { major: 1, minor: 0 };
}

impl std::fmt::Display for ArtifactVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// Arguments the run was invoked with
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunArgs {
    /// Invoking command (run, build, seed, ...)
    pub command: String,

    #[serde(default)]
    pub select: Vec<String>,

    #[serde(default)]
    pub exclude: Vec<String>,

    pub threads: usize,

    #[serde(default)]
    pub fail_fast: bool,

    /// Target name
    pub target: String,

    /// Notification recipients
    #[serde(default)]
    pub notify: Vec<String>,
}

/// Outcome of one node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeResult {
    pub unique_id: String,

    /// Terminal status (success, error or skipped)
    pub status: NodeStatus,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// Wall-clock execution time in seconds
    pub execution_time: f64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,

    /// Rendered relation name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relation: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub materialization: Option<String>,
}

impl NodeResult {
    /// Result for a node that never ran
    pub fn skipped(unique_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            unique_id: unique_id.into(),
            status: NodeStatus::Skipped,
            message: Some(message.into()),
            execution_time: 0.0,
            thread_id: None,
            started_at: None,
            completed_at: None,
            relation: None,
            materialization: None,
        }
    }
}

/// Counts per status
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub total: usize,
    pub success: usize,
    pub error: usize,
    pub skipped: usize,
}

/// Everything a finished run produced
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub results: Vec<NodeResult>,

    /// Total run time in seconds
    pub elapsed_time: f64,

    pub generated_at: DateTime<Utc>,

    pub args: RunArgs,
}

impl ExecutionResult {
    pub fn new(results: Vec<NodeResult>, elapsed_time: f64, args: RunArgs) -> Self {
        Self {
            results,
            elapsed_time,
            generated_at: Utc::now(),
            args,
        }
    }

    pub fn summary(&self) -> RunSummary {
        let mut summary = RunSummary {
            total: self.results.len(),
            ..RunSummary::default()
        };
        for result in &self.results {
            match result.status {
                NodeStatus::Success => summary.success += 1,
                NodeStatus::Error => summary.error += 1,
                NodeStatus::Skipped => summary.skipped += 1,
                NodeStatus::Pending | NodeStatus::Running => {}
            }
        }
        summary
    }

    /// A run succeeds when no node errored or was skipped
    pub fn success(&self) -> bool {
        self.results.iter().all(|r| r.status == NodeStatus::Success)
    }

    pub fn get(&self, unique_id: &str) -> Option<&NodeResult> {
        self.results.iter().find(|r| r.unique_id == unique_id)
    }
}

/// Artifact metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactMetadata {
    pub schema_version: ArtifactVersion,
    pub generated_at: DateTime<Utc>,
    pub invocation_id: String,
}

/// run_results.json
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunResultsArtifact {
    pub metadata: ArtifactMetadata,
    pub results: Vec<NodeResult>,
    pub elapsed_time: f64,
    pub args: RunArgs,
}

impl RunResultsArtifact {
    pub fn from_execution(execution: &ExecutionResult) -> Self {
        let seed = format!("{}:{}", execution.generated_at.to_rfc3339(), execution.args.command);
        let invocation_id = crate::hashing::hash_bytes(seed.as_bytes())[..32].to_string();

        Self {
            metadata: ArtifactMetadata {
                schema_version: ArtifactVersion::CURRENT,
                generated_at: execution.generated_at,
                invocation_id,
            },
            results: execution.results.clone(),
            elapsed_time: execution.elapsed_time,
            args: execution.args.clone(),
        }
    }

    /// Serialize to JSON string
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}
