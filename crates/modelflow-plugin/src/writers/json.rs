//! JSON run results writer
//!
//! Serializes an execution as the run results artifact.

use modelflow_core::{ExecutionResult, RunResultsArtifact};
use std::path::Path;

use super::{write_file, ResultWriter, WriteError};

/// Writes `run_results.json`
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonResultWriter;

impl JsonResultWriter {
    pub const NAME: &'static str = "default";
}

impl ResultWriter for JsonResultWriter {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn write(&self, result: &ExecutionResult, path: &Path) -> Result<(), WriteError> {
        let artifact = RunResultsArtifact::from_execution(result);
        write_file(path, &artifact.to_json()?)
    }
}
