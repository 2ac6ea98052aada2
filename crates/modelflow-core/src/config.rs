//! Configuration schema (modelflow.toml)

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use crate::relation::Policy;

/// Name of the project configuration file
pub const CONFIG_FILE_NAME: &str = "modelflow.toml";

/// Where models are built
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetConfig {
    /// Target name (dev, prod, ...)
    #[serde(default = "default_target_name")]
    pub name: String,

    /// Database models are built in
    #[serde(default)]
    pub database: Option<String>,

    /// Schema models are built in
    #[serde(default = "default_schema")]
    pub schema: String,

    /// Maximum number of models executing at once
    #[serde(default = "default_threads")]
    pub threads: usize,
}

fn default_target_name() -> String {
    "dev".to_string()
}

fn default_schema() -> String {
    "public".to_string()
}

fn default_threads() -> usize {
    4
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            name: default_target_name(),
            database: None,
            schema: default_schema(),
            threads: default_threads(),
        }
    }
}

/// Project-wide model defaults
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelDefaults {
    /// Materialization used when a model does not configure one
    #[serde(default = "default_materialized")]
    pub materialized: String,
}

fn default_materialized() -> String {
    "view".to_string()
}

impl Default for ModelDefaults {
    fn default() -> Self {
        Self {
            materialized: default_materialized(),
        }
    }
}

/// Include and quote policies applied when rendering relation names
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RelationConfig {
    #[serde(default)]
    pub include_policy: Policy,

    #[serde(default)]
    pub quote_policy: Policy,
}

/// Run behaviour
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    /// Stop scheduling new models after the first failure
    #[serde(default)]
    pub fail_fast: bool,

    /// Result writer plugin used at the end of a run
    #[serde(default = "default_result_writer")]
    pub result_writer: String,

    /// Recipients for notification-style writers
    #[serde(default)]
    pub notify: Vec<String>,
}

fn default_result_writer() -> String {
    "default".to_string()
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            fail_fast: false,
            result_writer: default_result_writer(),
            notify: Vec::new(),
        }
    }
}

/// Main configuration structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Project name, used in node unique ids
    #[serde(default = "default_project_name")]
    pub name: String,

    /// Directories (relative to the project root) searched for models
    #[serde(default = "default_model_paths")]
    pub model_paths: Vec<String>,

    /// Directory artifacts are written to
    #[serde(default = "default_target_path")]
    pub target_path: String,

    #[serde(default)]
    pub target: TargetConfig,

    #[serde(default)]
    pub models: ModelDefaults,

    #[serde(default)]
    pub relation: RelationConfig,

    #[serde(default)]
    pub run: RunConfig,

    /// Values exposed to templates through var()
    #[serde(default)]
    pub vars: BTreeMap<String, serde_json::Value>,

    /// Project root path (for resolving relative paths)
    #[serde(skip)]
    pub project_root: PathBuf,
}

fn default_project_name() -> String {
    "modelflow_project".to_string()
}

fn default_model_paths() -> Vec<String> {
    vec!["models".to_string()]
}

fn default_target_path() -> String {
    "target".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            name: default_project_name(),
            model_paths: default_model_paths(),
            target_path: default_target_path(),
            target: TargetConfig::default(),
            models: ModelDefaults::default(),
            relation: RelationConfig::default(),
            run: RunConfig::default(),
            vars: BTreeMap::new(),
            project_root: std::env::current_dir().unwrap_or_default(),
        }
    }
}

impl Config {
    /// Load config from TOML file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::IoError(e.to_string()))?;

        let mut config = Self::from_toml(&contents)?;

        // Set project root to parent of config file
        if let Some(parent) = path.parent() {
            config.project_root = parent.to_path_buf();
        }

        Ok(config)
    }

    /// Load `modelflow.toml` from a project directory, falling back to defaults
    pub fn discover(project_root: &Path) -> Result<Self, ConfigError> {
        let path = project_root.join(CONFIG_FILE_NAME);
        if path.exists() {
            Self::from_file(&path)
        } else {
            Ok(Self {
                project_root: project_root.to_path_buf(),
                ..Self::default()
            })
        }
    }

    /// Load config from TOML string
    pub fn from_toml(toml: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(toml)
            .map_err(|e| ConfigError::ParseError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Save config to TOML file
    pub fn save_to_file(&self, path: &Path) -> Result<(), ConfigError> {
        let toml = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::SerializeError(e.to_string()))?;

        std::fs::write(path, toml)
            .map_err(|e| ConfigError::IoError(e.to_string()))?;

        Ok(())
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.target.threads == 0 {
            return Err(ConfigError::Invalid("target.threads must be at least 1".to_string()));
        }
        if self.name.is_empty() {
            return Err(ConfigError::Invalid("name must not be empty".to_string()));
        }
        Ok(())
    }

    /// Absolute directory artifacts are written to
    pub fn target_dir(&self) -> PathBuf {
        self.project_root.join(&self.target_path)
    }
}

/// Config error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Serialize error: {0}")]
    SerializeError(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}
