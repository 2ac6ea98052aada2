//! Project loading
//!
//! Discovers model SQL files, extracts their references and configuration,
//! and validates that the resulting dependency graph is acyclic.

use modelflow_core::{hash_string, Config, Encoding, HashError, Relation};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::dag::{DependencyGraph, NodeId};
use crate::refs::CallExtractor;

/// A model discovered on disk
#[derive(Debug, Clone, PartialEq)]
pub struct Model {
    /// Unique identifier ("model.<project>.<name>")
    pub unique_id: NodeId,

    /// Model name (file stem)
    pub name: String,

    /// Package the model belongs to
    pub package_name: String,

    /// Path relative to the project root
    pub path: PathBuf,

    /// SQL as written, including template calls
    pub raw_sql: String,

    /// SHA-256 of the raw SQL
    pub checksum: String,

    /// Materialization name (inline config or project default)
    pub materialized: String,

    /// Output table name override
    pub alias: Option<String>,

    /// Output schema override
    pub schema: Option<String>,

    /// unique_ids of referenced models
    pub depends_on: Vec<NodeId>,

    /// (source, table) pairs read by the model
    pub sources: Vec<(String, String)>,
}

/// A loaded project: configuration plus validated models
#[derive(Debug, Clone)]
pub struct Project {
    pub config: Config,
    models: BTreeMap<NodeId, Model>,
    names: HashMap<String, NodeId>,
}

impl Project {
    /// Load every model under the configured model paths
    pub fn load(config: Config) -> Result<Self, ProjectError> {
        let mut files = Vec::new();
        for model_path in &config.model_paths {
            let dir = config.project_root.join(model_path);
            if !dir.exists() {
                tracing::debug!(path = %dir.display(), "model path does not exist, skipping");
                continue;
            }
            files.extend(discover_sql_files(&dir));
        }
        files.sort();

        let mut sources = Vec::with_capacity(files.len());
        for file in files {
            let raw_sql = std::fs::read_to_string(&file)
                .map_err(|e| ProjectError::IoError(file.display().to_string(), e.to_string()))?;
            let relative = file
                .strip_prefix(&config.project_root)
                .unwrap_or(&file)
                .to_path_buf();
            sources.push((relative, raw_sql));
        }

        let project = Self::from_sources(config, sources)?;
        tracing::info!(models = project.models.len(), "loaded project");
        Ok(project)
    }

    /// Build a project from in-memory `(relative path, sql)` pairs
    pub fn from_sources<I>(config: Config, sources: I) -> Result<Self, ProjectError>
    where
        I: IntoIterator<Item = (PathBuf, String)>,
    {
        let mut names: HashMap<String, NodeId> = HashMap::new();
        let mut paths: HashMap<String, PathBuf> = HashMap::new();
        let mut pending = Vec::new();

        for (path, raw_sql) in sources {
            let name = path
                .file_stem()
                .and_then(|s| s.to_str())
                .ok_or_else(|| ProjectError::InvalidModelName(path.display().to_string()))?
                .to_string();

            if let Some(first) = paths.get(&name) {
                return Err(ProjectError::DuplicateModel {
                    name,
                    first: first.display().to_string(),
                    second: path.display().to_string(),
                });
            }

            let unique_id = format!("model.{}.{}", config.name, name);
            names.insert(name.clone(), unique_id.clone());
            paths.insert(name.clone(), path.clone());
            pending.push((unique_id, name, path, raw_sql));
        }

        let mut models = BTreeMap::new();
        for (unique_id, name, path, raw_sql) in pending {
            let calls = CallExtractor::extract(&raw_sql);

            let depends_on = calls
                .ref_names()
                .into_iter()
                .map(|reference| {
                    names.get(reference).cloned().ok_or_else(|| ProjectError::UnknownRef {
                        model: name.clone(),
                        reference: reference.to_string(),
                    })
                })
                .collect::<Result<Vec<_>, _>>()?;

            let checksum = hash_string(&raw_sql, Encoding::Utf8)?;
            let materialized = calls
                .config
                .get("materialized")
                .cloned()
                .unwrap_or_else(|| config.models.materialized.clone());

            let model = Model {
                unique_id: unique_id.clone(),
                name,
                package_name: config.name.clone(),
                path,
                checksum,
                materialized,
                alias: calls.config.get("alias").cloned(),
                schema: calls.config.get("schema").cloned(),
                depends_on,
                sources: calls.sources(),
                raw_sql,
            };
            models.insert(unique_id, model);
        }

        let project = Self { config, models, names };

        if let Some(cycle) = project.graph().find_cycle() {
            return Err(ProjectError::Cycle(cycle));
        }

        Ok(project)
    }

    pub fn models(&self) -> impl Iterator<Item = &Model> {
        self.models.values()
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    pub fn get(&self, unique_id: &str) -> Option<&Model> {
        self.models.get(unique_id)
    }

    /// Find a model by short name or unique_id
    pub fn find(&self, name_or_id: &str) -> Option<&Model> {
        self.models
            .get(name_or_id)
            .or_else(|| self.names.get(name_or_id).and_then(|id| self.models.get(id)))
    }

    /// Dependency graph over all models
    pub fn graph(&self) -> DependencyGraph {
        let mut graph = DependencyGraph::default();
        for model in self.models.values() {
            graph.add_node(&model.unique_id);
            for parent in &model.depends_on {
                graph.add_edge(parent, &model.unique_id);
            }
        }
        graph
    }

    /// Relation a model is built into, with the project's naming policies
    pub fn relation_for(&self, model: &Model) -> Relation {
        let target = &self.config.target;
        Relation::new(
            target.database.clone(),
            Some(model.schema.clone().unwrap_or_else(|| target.schema.clone())),
            model.alias.clone().unwrap_or_else(|| model.name.clone()),
        )
        .with_include_policy(self.config.relation.include_policy)
        .with_quote_policy(self.config.relation.quote_policy)
    }

    /// Relation of a source table
    pub fn source_relation(&self, source_name: &str, table_name: &str) -> Relation {
        Relation::new(
            self.config.target.database.clone(),
            Some(source_name.to_string()),
            table_name,
        )
        .with_include_policy(self.config.relation.include_policy)
        .with_quote_policy(self.config.relation.quote_policy)
    }
}

/// Discover all SQL model files under a directory
fn discover_sql_files(dir: &Path) -> Vec<PathBuf> {
    WalkDir::new(dir)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| entry.path().extension().is_some_and(|ext| ext == "sql"))
        .map(|entry| entry.path().to_path_buf())
        .collect()
}

/// Project loading errors
#[derive(Debug, thiserror::Error)]
pub enum ProjectError {
    #[error("Failed to read {0}: {1}")]
    IoError(String, String),

    #[error("Invalid model file name: {0}")]
    InvalidModelName(String),

    #[error("Model '{name}' is defined twice ({first} and {second})")]
    DuplicateModel {
        name: String,
        first: String,
        second: String,
    },

    #[error("Model '{model}' references unknown model '{reference}'")]
    UnknownRef { model: String, reference: String },

    #[error("Dependency cycle detected: {}", .0.join(" -> "))]
    Cycle(Vec<NodeId>),

    #[error(transparent)]
    Hash(#[from] HashError),
}
