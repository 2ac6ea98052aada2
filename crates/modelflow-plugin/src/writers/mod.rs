//! Result writers
//!
//! Plugins of the `result_writers` group persist an [`ExecutionResult`]
//! to a caller-supplied path.

mod email;
mod json;

pub use email::{EmailArtifact, EmailResultWriter};
pub use json::JsonResultWriter;

use modelflow_core::ExecutionResult;
use std::path::{Path, PathBuf};

use crate::registry::PluginGroup;

/// Persists the outcome of a run
pub trait ResultWriter: Send + Sync {
    /// Name the writer is registered under
    fn name(&self) -> &'static str;

    fn write(&self, result: &ExecutionResult, path: &Path) -> Result<(), WriteError>;
}

/// The `result_writers` plugin group
pub struct ResultWriters;

impl PluginGroup for ResultWriters {
    const GROUP: &'static str = "result_writers";
    type Plugin = dyn ResultWriter;
}

/// Errors while writing results
#[derive(Debug, thiserror::Error)]
pub enum WriteError {
    #[error("Failed to write {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize results: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Write `contents` to `path`, creating parent directories
pub(crate) fn write_file(path: &Path, contents: &str) -> Result<(), WriteError> {
    let io_error = |source| WriteError::Io {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(io_error)?;
    }
    std::fs::write(path, contents).map_err(io_error)?;

    tracing::info!(path = %path.display(), bytes = contents.len(), "wrote results");
    Ok(())
}
