//! modelflow core
//!
//! Domain types shared by every modelflow crate: schedulable graph nodes,
//! relation naming policies, semantic value objects, hashing, configuration
//! and execution results.

pub mod config;
pub mod graph_node;
pub mod hashing;
pub mod relation;
pub mod results;
pub mod semantic;

pub use config::{Config, ConfigError, ModelDefaults, RelationConfig, RunConfig, TargetConfig, CONFIG_FILE_NAME};
pub use graph_node::{GraphNode, GraphNodeError, NodeStatus};
pub use hashing::{hash_bytes, hash_string, Encoding, HashError};
pub use relation::{quote_identifier, Policy, Relation, RelationError, RelationPath, MAX_IDENTIFIER_LENGTH, QUOTE_CHARACTER};
pub use results::{ArtifactVersion, ExecutionResult, NodeResult, RunArgs, RunResultsArtifact, RunSummary};
pub use semantic::{DimensionConflict, DimensionInvariants, DimensionOccurrence, DimensionType, MetricReference};
