//! Mock executor for testing
//!
//! Executes nothing. Records which models ran, how many ran at once, and
//! fails the models it was told to fail.
//!
//! ```rust,ignore
//! let executor = MockExecutor::new()
//!     .with_latency(20)
//!     .with_failure("model.shop.orders", "relation does not exist");
//! ```

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::compile::CompiledModel;
use crate::executor::{ExecuteError, ModelExecutor};

/// Mock model executor
#[derive(Debug, Clone, Default)]
pub struct MockExecutor {
    /// Failure messages by unique_id
    failures: Arc<HashMap<String, String>>,

    /// unique_ids in the order they started
    executed: Arc<RwLock<Vec<String>>>,

    running: Arc<AtomicUsize>,
    max_running: Arc<AtomicUsize>,

    /// Simulated execution time (milliseconds)
    latency_ms: u64,
}

impl MockExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail `unique_id` with `message`
    pub fn with_failure(mut self, unique_id: impl Into<String>, message: impl Into<String>) -> Self {
        Arc::make_mut(&mut self.failures).insert(unique_id.into(), message.into());
        self
    }

    pub fn with_latency(mut self, latency_ms: u64) -> Self {
        self.latency_ms = latency_ms;
        self
    }

    /// Models executed so far, in start order
    pub async fn executed(&self) -> Vec<String> {
        self.executed.read().await.clone()
    }

    /// Highest number of models that were executing at the same time
    pub fn max_concurrency(&self) -> usize {
        self.max_running.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl ModelExecutor for MockExecutor {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn execute(&self, model: &CompiledModel) -> Result<String, ExecuteError> {
        let running = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_running.fetch_max(running, Ordering::SeqCst);
        self.executed.write().await.push(model.unique_id.clone());

        if self.latency_ms > 0 {
            tokio::time::sleep(tokio::time::Duration::from_millis(self.latency_ms)).await;
        }

        let failure = self.failures.get(&model.unique_id).cloned();
        self.running.fetch_sub(1, Ordering::SeqCst);

        match failure {
            Some(message) => Err(ExecuteError::Failed(message)),
            None => Ok(format!("OK {}", model.relation)),
        }
    }
}
