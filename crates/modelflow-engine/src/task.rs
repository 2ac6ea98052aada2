//! One invocation of a command over a project

use modelflow_core::{ExecutionResult, RunArgs};
use modelflow_graph::{select_nodes, NodeId, Project};
use std::collections::BTreeSet;
use std::sync::Arc;

use crate::compile::{CompiledProject, Compiler};
use crate::executor::ModelExecutor;
use crate::materialization::Command;
use crate::runner::{RunError, Runner, RunnerConfig};

/// Select, compile and execute
pub struct RunTask<'a> {
    project: &'a Project,
    command: Command,
    args: RunArgs,
}

impl<'a> RunTask<'a> {
    /// `args.command` names the command; `args.threads == 0` uses the target's threads
    pub fn new(project: &'a Project, mut args: RunArgs) -> Result<Self, RunError> {
        let command: Command = args.command.parse()?;
        args.command = command.to_string();
        if args.threads == 0 {
            args.threads = project.config.target.threads;
        }
        if args.target.is_empty() {
            args.target = project.config.target.name.clone();
        }

        Ok(Self { project, command, args })
    }

    pub fn command(&self) -> Command {
        self.command
    }

    pub fn args(&self) -> &RunArgs {
        &self.args
    }

    /// Nodes chosen by `--select` / `--exclude`
    pub fn select(&self) -> Result<BTreeSet<NodeId>, RunError> {
        Ok(select_nodes(self.project, &self.args.select, &self.args.exclude)?)
    }

    pub fn compile(&self) -> CompiledProject {
        Compiler::new(self.project).compile_all()
    }

    /// Run the task with `executor`
    pub async fn execute(&self, executor: Arc<dyn ModelExecutor>) -> Result<ExecutionResult, RunError> {
        let selected = self.select()?;
        let compiled = self.compile();
        self.execute_compiled(executor, &compiled, &selected).await
    }

    /// Run the task over an already compiled project
    pub async fn execute_compiled(
        &self,
        executor: Arc<dyn ModelExecutor>,
        compiled: &CompiledProject,
        selected: &BTreeSet<NodeId>,
    ) -> Result<ExecutionResult, RunError> {
        let runner = Runner::new(
            executor,
            RunnerConfig {
                command: self.command,
                threads: self.args.threads,
                fail_fast: self.args.fail_fast,
            },
        );
        runner
            .run(&self.project.graph(), compiled, selected, self.args.clone())
            .await
    }
}
