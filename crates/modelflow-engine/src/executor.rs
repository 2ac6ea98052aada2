//! Executor trait for running compiled models

use std::path::{Path, PathBuf};

use crate::compile::{write_sql, CompileError, CompiledModel};

/// Errors raised while executing a model
#[derive(Debug, thiserror::Error)]
pub enum ExecuteError {
    #[error("Execution failed: {0}")]
    Failed(String),

    #[error("Failed to write {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Trait for backends that execute a model's build statement
#[async_trait::async_trait]
pub trait ModelExecutor: Send + Sync {
    /// Executor name (e.g., "files", "mock")
    fn name(&self) -> &'static str;

    /// Execute the statement of a compiled model
    ///
    /// Returns a short status message. Ephemeral models are never passed in.
    async fn execute(&self, model: &CompiledModel) -> Result<String, ExecuteError>;
}

/// Writes each build statement to `<dir>/<model path>` instead of running it
#[derive(Debug, Clone)]
pub struct FileExecutor {
    dir: PathBuf,
}

impl FileExecutor {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

#[async_trait::async_trait]
impl ModelExecutor for FileExecutor {
    fn name(&self) -> &'static str {
        "files"
    }

    async fn execute(&self, model: &CompiledModel) -> Result<String, ExecuteError> {
        let Some(statement) = &model.statement else {
            return Ok("nothing to execute".to_string());
        };

        let path = self.dir.join(&model.path);
        write_sql(&path, statement).map_err(|err| match err {
            CompileError::Io { path, source } => ExecuteError::Io { path, source },
            other => ExecuteError::Failed(other.to_string()),
        })?;

        Ok(format!("{} {}", model.materialization, model.relation))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::materialization::Materialization;
    use tempfile::TempDir;

    #[tokio::test]
    async fn writes_statement_files() {
        let dir = TempDir::new().unwrap();
        let executor = FileExecutor::new(dir.path().join("run"));
        let model = CompiledModel {
            unique_id: "model.shop.orders".to_string(),
            name: "orders".to_string(),
            path: PathBuf::from("marts/orders.sql"),
            materialization: Materialization::View,
            relation: "orders".to_string(),
            compiled_sql: "select 1".to_string(),
            statement: Some("create view orders as (\nselect 1\n)".to_string()),
        };

        let message = executor.execute(&model).await.unwrap();

        assert_eq!(message, "view orders");
        let written = std::fs::read_to_string(dir.path().join("run/marts/orders.sql")).unwrap();
        assert!(written.starts_with("create view orders"));
    }
}
