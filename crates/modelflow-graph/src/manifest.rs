//! manifest.json
//!
//! Snapshot of a loaded project: every node with its configuration, checksum
//! and dependencies, plus parent/child maps.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::project::{Model, Project};

/// Manifest schema version written by this crate
pub const MANIFEST_SCHEMA_VERSION: &str = "modelflow/manifest/v1";

/// manifest.json structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    /// Metadata about the manifest
    pub metadata: ManifestMetadata,

    /// Model nodes
    pub nodes: BTreeMap<String, ManifestNode>,

    /// Parent map (node -> list of parent nodes)
    #[serde(default)]
    pub parent_map: BTreeMap<String, Vec<String>>,

    /// Child map (node -> list of child nodes)
    #[serde(default)]
    pub child_map: BTreeMap<String, Vec<String>>,
}

impl Manifest {
    /// Snapshot a loaded project
    pub fn from_project(project: &Project) -> Self {
        let graph = project.graph();
        let mut nodes = BTreeMap::new();
        let mut parent_map = BTreeMap::new();
        let mut child_map = BTreeMap::new();

        for model in project.models() {
            let relation = project.relation_for(model);
            nodes.insert(model.unique_id.clone(), ManifestNode::from_model(model, relation.path));

            let mut children: Vec<String> =
                graph.children(&model.unique_id).into_iter().cloned().collect();
            children.sort();

            parent_map.insert(model.unique_id.clone(), model.depends_on.clone());
            child_map.insert(model.unique_id.clone(), children);
        }

        Self {
            metadata: ManifestMetadata {
                schema_version: MANIFEST_SCHEMA_VERSION.to_string(),
                generated_at: chrono::Utc::now().to_rfc3339(),
                project_name: project.config.name.clone(),
                target_name: project.config.target.name.clone(),
            },
            nodes,
            parent_map,
            child_map,
        }
    }

    /// Load manifest from file
    pub fn from_file(path: &Path) -> Result<Self, ManifestError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ManifestError::IoError(path.display().to_string(), e.to_string()))?;

        Self::from_json(&contents)
    }

    /// Parse manifest from JSON string
    pub fn from_json(json: &str) -> Result<Self, ManifestError> {
        serde_json::from_str(json)
            .map_err(|e| ManifestError::ParseError(e.to_string()))
    }

    /// Save to file, creating parent directories
    pub fn save_to_file(&self, path: &Path) -> Result<(), ManifestError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| ManifestError::IoError(parent.display().to_string(), e.to_string()))?;
        }

        let json = serde_json::to_string_pretty(self)
            .map_err(|e| ManifestError::ParseError(e.to_string()))?;

        std::fs::write(path, json)
            .map_err(|e| ManifestError::IoError(path.display().to_string(), e.to_string()))
    }

    /// Get all model nodes
    pub fn models(&self) -> impl Iterator<Item = &ManifestNode> {
        self.nodes.values().filter(|node| node.resource_type == "model")
    }

    /// Get a specific node by unique_id
    pub fn get_node(&self, unique_id: &str) -> Option<&ManifestNode> {
        self.nodes.get(unique_id)
    }
}

/// Manifest metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestMetadata {
    pub schema_version: String,
    pub generated_at: String,
    pub project_name: String,
    #[serde(default)]
    pub target_name: String,
}

/// A node in the manifest
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestNode {
    /// Unique identifier (e.g., "model.my_project.users")
    pub unique_id: String,

    /// Node name (e.g., "users")
    pub name: String,

    /// Resource type
    pub resource_type: String,

    /// Package name
    pub package_name: String,

    /// Path to the SQL file relative to the project root
    pub original_file_path: String,

    /// SHA-256 of the raw SQL
    pub checksum: String,

    /// Database name
    #[serde(default)]
    pub database: Option<String>,

    /// Schema name
    #[serde(default)]
    pub schema: Option<String>,

    /// Alias (output table name)
    #[serde(default)]
    pub alias: Option<String>,

    /// Node configuration
    #[serde(default)]
    pub config: NodeConfig,

    /// Dependencies
    #[serde(default)]
    pub depends_on: DependsOn,

    /// Source tables read by the node
    #[serde(default)]
    pub sources: Vec<[String; 2]>,
}

impl ManifestNode {
    fn from_model(model: &Model, path: modelflow_core::RelationPath) -> Self {
        Self {
            unique_id: model.unique_id.clone(),
            name: model.name.clone(),
            resource_type: "model".to_string(),
            package_name: model.package_name.clone(),
            original_file_path: model.path.display().to_string(),
            checksum: model.checksum.clone(),
            database: path.database,
            schema: path.schema,
            alias: path.identifier,
            config: NodeConfig {
                enabled: true,
                materialized: Some(model.materialized.clone()),
            },
            depends_on: DependsOn {
                nodes: model.depends_on.clone(),
            },
            sources: model
                .sources
                .iter()
                .map(|(source, table)| [source.clone(), table.clone()])
                .collect(),
        }
    }
}

/// Node configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Whether the node is enabled
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Materialization type
    #[serde(default)]
    pub materialized: Option<String>,
}

fn default_true() -> bool {
    true
}

/// Dependencies structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DependsOn {
    /// List of node unique_ids this node depends on
    #[serde(default)]
    pub nodes: Vec<String>,
}

/// Manifest errors
#[derive(Debug, thiserror::Error)]
pub enum ManifestError {
    #[error("Failed to access manifest file {0}: {1}")]
    IoError(String, String),

    #[error("Failed to parse manifest JSON: {0}")]
    ParseError(String),
}
