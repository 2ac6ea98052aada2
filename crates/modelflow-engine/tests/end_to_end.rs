//! End-to-end runs over projects on disk
//!
//! Each test writes a small project into a temp directory, loads it the way
//! the CLI does and executes it.

use modelflow_core::{Config, NodeStatus, RunArgs};
use modelflow_engine::{FileExecutor, MockExecutor, RunTask};
use modelflow_graph::Project;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn write_project(root: &Path, config: &str, models: &[(&str, &str)]) -> Project {
    std::fs::write(root.join("modelflow.toml"), config).unwrap();
    for (path, sql) in models {
        let path = root.join("models").join(path);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, sql).unwrap();
    }

    let config = Config::discover(root).unwrap();
    Project::load(config).unwrap()
}

fn args(command: &str) -> RunArgs {
    RunArgs {
        command: command.to_string(),
        ..RunArgs::default()
    }
}

// =============================================================================
// Materialization support
// =============================================================================

#[tokio::test]
async fn test_unsupported_materialization_fails_the_run() {
    let dir = TempDir::new().unwrap();
    let project = write_project(
        dir.path(),
        "name = \"shop\"\n",
        &[("countries.sql", "{{ config(materialized='seed') }}select 'NL' as code")],
    );

    let task = RunTask::new(&project, args("run")).unwrap();
    let result = task.execute(Arc::new(MockExecutor::new())).await.unwrap();

    assert!(!result.success());
    let node = result.get("model.shop.countries").unwrap();
    assert_eq!(node.status, NodeStatus::Error);
    assert_eq!(
        node.message.as_deref(),
        Some("Materialization 'seed' is not supported by the 'run' command")
    );
}

#[tokio::test]
async fn test_matching_command_builds_the_same_model() {
    let dir = TempDir::new().unwrap();
    let project = write_project(
        dir.path(),
        "name = \"shop\"\n",
        &[("countries.sql", "{{ config(materialized='seed') }}select 'NL' as code")],
    );

    for command in ["seed", "build"] {
        let task = RunTask::new(&project, args(command)).unwrap();
        let result = task.execute(Arc::new(MockExecutor::new())).await.unwrap();
        assert!(result.success(), "{} should build a seed", command);
    }
}

#[tokio::test]
async fn test_project_default_materialization_applies() {
    let dir = TempDir::new().unwrap();
    let project = write_project(
        dir.path(),
        "name = \"shop\"\n\n[models]\nmaterialized = \"test\"\n",
        &[("not_null_orders.sql", "select * from orders where id is null")],
    );

    let run = RunTask::new(&project, args("run")).unwrap();
    assert!(!run.execute(Arc::new(MockExecutor::new())).await.unwrap().success());

    let test = RunTask::new(&project, args("test")).unwrap();
    assert!(test.execute(Arc::new(MockExecutor::new())).await.unwrap().success());
}

// =============================================================================
// Full runs
// =============================================================================

#[tokio::test]
async fn test_file_executor_writes_statements() {
    let dir = TempDir::new().unwrap();
    let project = write_project(
        dir.path(),
        r#"
name = "shop"

[target]
schema = "analytics"
threads = 2

[vars]
min_amount = 10
"#,
        &[
            ("staging/stg_payments.sql", "{{ config(materialized='ephemeral') }}select * from {{ source('raw', 'payments') }}"),
            ("marts/revenue.sql", "{{ config(materialized='table') }}select sum(amount) from {{ ref('stg_payments') }} where amount > {{ var('min_amount') }}"),
        ],
    );

    let run_dir = project.config.target_dir().join("run");
    let task = RunTask::new(&project, args("run")).unwrap();
    let result = task.execute(Arc::new(FileExecutor::new(&run_dir))).await.unwrap();

    assert!(result.success());
    assert_eq!(result.results.len(), 2);
    assert_eq!(result.args.threads, 2);

    let statement = std::fs::read_to_string(run_dir.join("models/marts/revenue.sql")).unwrap();
    assert_eq!(
        statement,
        "create table \"analytics\".\"revenue\" as (\n\
         select sum(amount) from (\nselect * from \"raw\".\"payments\"\n) as stg_payments where amount > 10\n)"
    );
    assert!(!run_dir.join("models/staging/stg_payments.sql").exists());
}

#[tokio::test]
async fn test_selection_limits_the_run() {
    let dir = TempDir::new().unwrap();
    let project = write_project(
        dir.path(),
        "name = \"shop\"\n",
        &[
            ("a.sql", "select 1"),
            ("b.sql", "select * from {{ ref('a') }}"),
            ("c.sql", "select * from {{ ref('b') }}"),
        ],
    );

    let executor = MockExecutor::new();
    let task = RunTask::new(
        &project,
        RunArgs {
            select: vec!["b+".to_string()],
            ..args("run")
        },
    )
    .unwrap();
    let result = task.execute(Arc::new(executor.clone())).await.unwrap();

    assert!(result.success());
    assert_eq!(
        executor.executed().await,
        vec!["model.shop.b".to_string(), "model.shop.c".to_string()]
    );
}

#[tokio::test]
async fn test_render_error_fails_node_and_skips_dependents() {
    let dir = TempDir::new().unwrap();
    let project = write_project(
        dir.path(),
        "name = \"shop\"\n",
        &[
            ("a.sql", "select {{ var('undefined_var') }}"),
            ("b.sql", "select * from {{ ref('a') }}"),
            ("c.sql", "select 3"),
        ],
    );

    let task = RunTask::new(&project, args("run")).unwrap();
    let result = task.execute(Arc::new(MockExecutor::new())).await.unwrap();

    let summary = result.summary();
    assert_eq!((summary.success, summary.error, summary.skipped), (1, 1, 1));
    assert!(result
        .get("model.shop.a")
        .unwrap()
        .message
        .as_deref()
        .unwrap()
        .starts_with("Compilation error"));
}
