//! Project loading and DAG construction
//!
//! This crate handles:
//! - Discovering models and extracting ref()/source()/config() calls
//! - Building dependency graphs (DAG) and detecting cycles
//! - Writing and reading manifest.json
//! - Node selection and the scheduling queue

pub mod dag;
pub mod manifest;
pub mod project;
pub mod queue;
pub mod refs;
pub mod selector;

pub use dag::{DependencyGraph, NodeId};
pub use manifest::{DependsOn, Manifest, ManifestError, ManifestMetadata, ManifestNode, NodeConfig};
pub use project::{Model, Project, ProjectError};
pub use queue::{GraphQueue, QueueError, QueueUpdate, SkippedNode};
pub use refs::{CallExtractor, ExtractedCalls, ModelReference};
pub use selector::{select_nodes, SelectError, Selector};
