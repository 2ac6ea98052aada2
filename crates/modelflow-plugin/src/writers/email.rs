//! Email notification writer
//!
//! Builds the notification a run would send and stores it as JSON. Delivery
//! is left to whatever picks the file up.

use chrono::{DateTime, Utc};
use modelflow_core::{ExecutionResult, NodeStatus, RunArgs, RunSummary};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::path::Path;

use super::{write_file, ResultWriter, WriteError};

/// A rendered run notification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmailArtifact {
    pub subject: String,
    pub recipients: Vec<String>,

    /// Plain-text body, one line per node
    pub body: String,

    pub summary: RunSummary,
    pub elapsed_time: f64,
    pub generated_at: DateTime<Utc>,
    pub args: RunArgs,
}

impl EmailArtifact {
    pub fn from_execution(result: &ExecutionResult) -> Self {
        let summary = result.summary();
        let outcome = if result.success() { "succeeded" } else { "failed" };
        let command = if result.args.command.is_empty() {
            "run"
        } else {
            result.args.command.as_str()
        };

        let subject = format!(
            "modelflow {} {}: {} ok, {} error, {} skipped",
            command, outcome, summary.success, summary.error, summary.skipped
        );

        let mut body = String::new();
        let _ = writeln!(body, "Finished {} of {} nodes in {:.2}s.", command, summary.total, result.elapsed_time);
        let _ = writeln!(body);
        for node in &result.results {
            let _ = write!(body, "{:<8} {}", status_label(node.status), node.unique_id);
            if let Some(message) = node.message.as_deref().filter(|m| !m.is_empty()) {
                let _ = write!(body, " - {}", message);
            }
            let _ = writeln!(body);
        }

        Self {
            subject,
            recipients: result.args.notify.clone(),
            body,
            summary,
            elapsed_time: result.elapsed_time,
            generated_at: result.generated_at,
            args: result.args.clone(),
        }
    }
}

fn status_label(status: NodeStatus) -> &'static str {
    match status {
        NodeStatus::Success => "OK",
        NodeStatus::Error => "ERROR",
        NodeStatus::Skipped => "SKIP",
        NodeStatus::Pending => "PENDING",
        NodeStatus::Running => "RUNNING",
    }
}

/// Writes an [`EmailArtifact`]
#[derive(Debug, Clone, Copy, Default)]
pub struct EmailResultWriter;

impl EmailResultWriter {
    pub const NAME: &'static str = "email";
}

impl ResultWriter for EmailResultWriter {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn write(&self, result: &ExecutionResult, path: &Path) -> Result<(), WriteError> {
        let artifact = EmailArtifact::from_execution(result);
        if artifact.recipients.is_empty() {
            tracing::warn!("email artifact has no recipients");
        }
        write_file(path, &serde_json::to_string_pretty(&artifact)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use modelflow_core::NodeResult;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn execution() -> ExecutionResult {
        ExecutionResult::new(
            vec![
                NodeResult {
                    status: NodeStatus::Error,
                    message: Some("materialization 'seed' is not supported by 'run'".to_string()),
                    ..NodeResult::skipped("model.shop.orders", "")
                },
                NodeResult::skipped("model.shop.revenue", "upstream model.shop.orders failed"),
            ],
            1.25,
            RunArgs {
                command: "run".to_string(),
                notify: vec!["data@example.com".to_string()],
                ..RunArgs::default()
            },
        )
    }

    #[test]
    fn artifact_summarizes_the_run() {
        let artifact = EmailArtifact::from_execution(&execution());

        assert_eq!(artifact.subject, "modelflow run failed: 0 ok, 1 error, 1 skipped");
        assert_eq!(artifact.recipients, vec!["data@example.com".to_string()]);
        assert!(artifact.body.contains("ERROR    model.shop.orders - materialization 'seed'"));
        assert!(artifact.body.contains("SKIP     model.shop.revenue"));
        assert_eq!(artifact.summary.total, 2);
    }

    #[test]
    fn writes_json_artifact() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("notify").join("email.json");

        let execution = execution();

        EmailResultWriter.write(&execution, &path).unwrap();

        let written: EmailArtifact = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written, EmailArtifact::from_execution(&execution));
    }
}
