//! modelflow engine
//!
//! This crate implements execution:
//! - Materializations and the commands that build them
//! - Compiling models in dependency order
//! - The executor seam and the concurrent runner
//! - Run tasks tying selection, compilation and execution together

pub mod compile;
pub mod executor;
pub mod materialization;
pub mod mock;
pub mod runner;
pub mod task;

pub use compile::{CompileError, CompiledModel, CompiledProject, Compiler};
pub use executor::{ExecuteError, FileExecutor, ModelExecutor};
pub use materialization::{Command, Materialization, UnknownCommand};
pub use mock::MockExecutor;
pub use runner::{RunError, Runner, RunnerConfig};
pub use task::RunTask;
