//! Concurrent model runner
//!
//! Pulls ready nodes from a [`GraphQueue`] and executes at most `threads`
//! of them at once. A node that fails to compile, uses a materialization
//! the command cannot build, or fails to execute becomes an `Error` result
//! and its descendants are skipped. The run itself keeps going.

use chrono::Utc;
use modelflow_core::{ExecutionResult, NodeResult, NodeStatus, RunArgs};
use modelflow_graph::{DependencyGraph, GraphQueue, NodeId, QueueError};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinSet;

use crate::compile::{CompiledModel, CompiledProject};
use crate::executor::ModelExecutor;
use crate::materialization::Command;

/// Runner settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunnerConfig {
    pub command: Command,

    /// Maximum number of models executing at once
    pub threads: usize,

    /// Stop scheduling after the first error
    pub fail_fast: bool,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            command: Command::Run,
            threads: 1,
            fail_fast: false,
        }
    }
}

/// Errors that abort a whole run
#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error(transparent)]
    Queue(#[from] QueueError),

    #[error("Model task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    #[error(transparent)]
    Select(#[from] modelflow_graph::SelectError),

    #[error(transparent)]
    Command(#[from] crate::materialization::UnknownCommand),
}

enum Prepared {
    /// Finished without executing anything
    Done(NodeResult),
    Execute(CompiledModel),
}

/// Executes a selection of compiled models in dependency order
pub struct Runner {
    executor: Arc<dyn ModelExecutor>,
    config: RunnerConfig,
}

impl Runner {
    pub fn new(executor: Arc<dyn ModelExecutor>, config: RunnerConfig) -> Self {
        Self { executor, config }
    }

    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    /// Run `selected` nodes of `graph`
    pub async fn run(
        &self,
        graph: &DependencyGraph,
        compiled: &CompiledProject,
        selected: &BTreeSet<NodeId>,
        args: RunArgs,
    ) -> Result<ExecutionResult, RunError> {
        let started = Instant::now();
        let threads = self.config.threads.max(1);
        let mut queue = GraphQueue::new(graph, selected);
        let mut results = Vec::with_capacity(queue.len());
        let mut tasks: JoinSet<(usize, NodeResult)> = JoinSet::new();
        let mut free_threads: Vec<usize> = (1..=threads).rev().collect();
        let mut stopping = false;

        tracing::info!(
            command = %self.config.command,
            executor = self.executor.name(),
            nodes = queue.len(),
            threads,
            "starting run"
        );

        loop {
            while !stopping {
                let Some(thread) = free_threads.pop() else {
                    break;
                };
                let Some(node_id) = queue.pop_ready() else {
                    free_threads.push(thread);
                    break;
                };

                match self.prepare(&node_id, compiled) {
                    Prepared::Done(result) => {
                        free_threads.push(thread);
                        stopping |= self.finish(&mut queue, result, &mut results)?;
                    }
                    Prepared::Execute(model) => {
                        tracing::debug!(node = %node_id, thread, "executing");
                        let executor = Arc::clone(&self.executor);
                        tasks.spawn(async move { (thread, execute_model(executor, model, thread).await) });
                    }
                }
            }

            let Some(joined) = tasks.join_next().await else {
                break;
            };
            let (thread, result) = joined?;
            free_threads.push(thread);
            stopping |= self.finish(&mut queue, result, &mut results)?;
        }

        if !queue.is_finished() {
            let stranded = queue.skip_remaining();
            tracing::warn!(nodes = stranded.len(), "nodes never became ready");
            results.extend(
                stranded
                    .into_iter()
                    .map(|id| NodeResult::skipped(id, "Skipped: dependencies never completed")),
            );
        }

        let execution = ExecutionResult::new(results, started.elapsed().as_secs_f64(), args);
        let summary = execution.summary();
        tracing::info!(
            success = summary.success,
            error = summary.error,
            skipped = summary.skipped,
            elapsed = execution.elapsed_time,
            "run finished"
        );
        Ok(execution)
    }

    fn prepare(&self, node_id: &str, compiled: &CompiledProject) -> Prepared {
        let command = self.config.command;

        let model = match compiled.get(node_id) {
            Some(Ok(model)) => model,
            Some(Err(err)) => {
                return Prepared::Done(failed(node_id, format!("Compilation error: {}", err)));
            }
            None => return Prepared::Done(failed(node_id, "Model was not compiled".to_string())),
        };

        if !command.supports(&model.materialization) {
            let result = NodeResult {
                relation: Some(model.relation.clone()),
                materialization: Some(model.materialization.to_string()),
                ..failed(
                    node_id,
                    format!(
                        "Materialization '{}' is not supported by the '{}' command",
                        model.materialization, command
                    ),
                )
            };
            return Prepared::Done(result);
        }

        if !command.executes() || model.statement.is_none() {
            let now = Utc::now();
            let message = if command.executes() { "ephemeral" } else { "compiled" };
            return Prepared::Done(NodeResult {
                status: NodeStatus::Success,
                message: Some(message.to_string()),
                started_at: Some(now),
                completed_at: Some(now),
                relation: Some(model.relation.clone()),
                materialization: Some(model.materialization.to_string()),
                ..NodeResult::skipped(node_id, "")
            });
        }

        Prepared::Execute(model.clone())
    }

    /// Record a finished node; returns whether scheduling should stop
    fn finish(
        &self,
        queue: &mut GraphQueue,
        result: NodeResult,
        results: &mut Vec<NodeResult>,
    ) -> Result<bool, RunError> {
        let status = result.status;
        let update = queue.mark_done(&result.unique_id, status)?;

        match status {
            NodeStatus::Success => {
                tracing::info!(node = %result.unique_id, elapsed = result.execution_time, "node succeeded")
            }
            _ => tracing::warn!(
                node = %result.unique_id,
                message = result.message.as_deref().unwrap_or_default(),
                "node failed"
            ),
        }
        results.push(result);

        for skipped in update.skipped {
            tracing::debug!(node = %skipped.unique_id, cause = %skipped.cause, "skipping dependent");
            results.push(NodeResult::skipped(
                skipped.unique_id,
                format!("Skipped because upstream '{}' did not succeed", skipped.cause),
            ));
        }

        if status == NodeStatus::Error && self.config.fail_fast {
            let remaining = queue.skip_remaining();
            tracing::warn!(nodes = remaining.len(), "fail fast: skipping remaining nodes");
            results.extend(
                remaining
                    .into_iter()
                    .map(|id| NodeResult::skipped(id, "Skipped after an earlier failure (fail fast)")),
            );
            return Ok(true);
        }

        Ok(false)
    }
}

fn failed(node_id: &str, message: String) -> NodeResult {
    let now = Utc::now();
    NodeResult {
        status: NodeStatus::Error,
        message: Some(message),
        started_at: Some(now),
        completed_at: Some(now),
        ..NodeResult::skipped(node_id, "")
    }
}

async fn execute_model(executor: Arc<dyn ModelExecutor>, model: CompiledModel, thread: usize) -> NodeResult {
    let started_at = Utc::now();
    let timer = Instant::now();

    let (status, message) = match executor.execute(&model).await {
        Ok(message) => (NodeStatus::Success, message),
        Err(err) => (NodeStatus::Error, err.to_string()),
    };

    NodeResult {
        unique_id: model.unique_id,
        status,
        message: Some(message),
        execution_time: timer.elapsed().as_secs_f64(),
        thread_id: Some(format!("Thread-{}", thread)),
        started_at: Some(started_at),
        completed_at: Some(Utc::now()),
        relation: Some(model.relation),
        materialization: Some(model.materialization.to_string()),
    }
}
