//! Template context
//!
//! Values visible to a model template while it renders.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use minijinja::Value as MinijinjaValue;

/// Context for rendering one model
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RenderContext {
    /// Project variables read by var()
    pub vars: BTreeMap<String, serde_json::Value>,

    /// Target configuration
    pub target: TargetContext,

    /// Rendered relation of the model being rendered
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub this: Option<String>,

    /// Model name -> text substituted for ref()
    pub refs: BTreeMap<String, String>,

    /// "source.table" -> text substituted for source()
    pub sources: BTreeMap<String, String>,
}

/// Target context (where models are built)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetContext {
    pub name: String,
    pub schema: String,
    pub database: Option<String>,
    pub threads: usize,
}

impl RenderContext {
    pub fn new(target: TargetContext) -> Self {
        Self {
            target,
            ..Self::default()
        }
    }

    /// Add a project variable
    pub fn add_var(&mut self, key: impl Into<String>, value: serde_json::Value) -> &mut Self {
        self.vars.insert(key.into(), value);
        self
    }

    /// Register what ref('name') renders to
    pub fn add_ref(&mut self, model_name: impl Into<String>, rendered: impl Into<String>) -> &mut Self {
        self.refs.insert(model_name.into(), rendered.into());
        self
    }

    /// Register what source('source', 'table') renders to
    pub fn add_source(&mut self, source_name: &str, table_name: &str, rendered: impl Into<String>) -> &mut Self {
        self.sources.insert(source_key(source_name, table_name), rendered.into());
        self
    }

    /// Set the relation of the model being rendered
    pub fn with_this(mut self, this: impl Into<String>) -> Self {
        self.this = Some(this.into());
        self
    }

    /// Convert to MiniJinja value for rendering
    pub fn to_minijinja_value(&self) -> MinijinjaValue {
        MinijinjaValue::from_serialize(self)
    }
}

pub(crate) fn source_key(source_name: &str, table_name: &str) -> String {
    format!("{}.{}", source_name, table_name)
}

impl Default for TargetContext {
    fn default() -> Self {
        Self {
            name: "dev".to_string(),
            schema: "public".to_string(),
            database: None,
            threads: 1,
        }
    }
}

impl From<&modelflow_core::TargetConfig> for TargetContext {
    fn from(target: &modelflow_core::TargetConfig) -> Self {
        Self {
            name: target.name.clone(),
            schema: target.schema.clone(),
            database: target.database.clone(),
            threads: target.threads,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_target_config() {
        let config = modelflow_core::TargetConfig {
            database: Some("analytics".to_string()),
            ..Default::default()
        };
        let target = TargetContext::from(&config);
        assert_eq!(target.database.as_deref(), Some("analytics"));
        assert_eq!(target.threads, 4);
    }

    #[test]
    fn builder_methods() {
        let mut context = RenderContext::default();
        context
            .add_var("region", serde_json::json!("eu"))
            .add_ref("orders", "\"public\".\"orders\"")
            .add_source("raw", "users", "raw.users");

        assert_eq!(context.refs["orders"], "\"public\".\"orders\"");
        assert_eq!(context.sources["raw.users"], "raw.users");
        assert!(context.with_this("x").this.is_some());
    }
}
