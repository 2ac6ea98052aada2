//! Plugin registry
//!
//! Plugins are looked up by `(group, name)`. A group is a marker type
//! implementing [`PluginGroup`]; it fixes the group's name and the trait
//! object every plugin in it is produced as.

use std::any::Any;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, OnceLock};

use crate::writers::{EmailResultWriter, JsonResultWriter, ResultWriters};

/// Name resolved by [`PluginRegistry::get_default`]
pub const DEFAULT_PLUGIN: &str = "default";

/// A named category of plugins
pub trait PluginGroup: 'static {
    /// Group name, e.g. `result_writers`
    const GROUP: &'static str;

    /// What a plugin of this group is produced as
    type Plugin: ?Sized + 'static;
}

type Factory<P> = Arc<dyn Fn() -> Box<P> + Send + Sync>;

/// Registry of plugin factories keyed by `(group, name)`
#[derive(Default)]
pub struct PluginRegistry {
    factories: BTreeMap<(&'static str, String), Box<dyn Any + Send + Sync>>,
}

impl PluginRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding every plugin that ships with modelflow
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register::<ResultWriters, _>(JsonResultWriter::NAME, || Box::new(JsonResultWriter));
        registry.register::<ResultWriters, _>(EmailResultWriter::NAME, || Box::new(EmailResultWriter));
        registry
    }

    /// Register a factory under `name` in group `G`, replacing any previous one
    pub fn register<G, F>(&mut self, name: impl Into<String>, factory: F)
    where
        G: PluginGroup,
        F: Fn() -> Box<G::Plugin> + Send + Sync + 'static,
    {
        let name = name.into();
        let factory: Factory<G::Plugin> = Arc::new(factory);
        if self
            .factories
            .insert((G::GROUP, name.clone()), Box::new(factory))
            .is_some()
        {
            tracing::debug!(group = G::GROUP, name = %name, "replaced plugin registration");
        }
    }

    /// Instantiate the plugin registered as `name` in group `G`
    pub fn get_pluggable<G: PluginGroup>(&self, name: &str) -> Result<Box<G::Plugin>, PluginError> {
        let entry = self
            .factories
            .get(&(G::GROUP, name.to_string()))
            .ok_or_else(|| PluginError::NotFound {
                group: G::GROUP.to_string(),
                name: name.to_string(),
            })?;

        let factory = entry
            .downcast_ref::<Factory<G::Plugin>>()
            .ok_or_else(|| PluginError::TypeMismatch {
                group: G::GROUP.to_string(),
                name: name.to_string(),
            })?;

        Ok(factory())
    }

    /// Instantiate the plugin registered as `default` in group `G`
    pub fn get_default<G: PluginGroup>(&self) -> Result<Box<G::Plugin>, PluginError> {
        self.get_pluggable::<G>(DEFAULT_PLUGIN)
    }

    pub fn contains(&self, group: &str, name: &str) -> bool {
        self.factories
            .keys()
            .any(|(g, n)| *g == group && n == name)
    }

    /// Registered names in `group`, sorted
    pub fn names(&self, group: &str) -> Vec<String> {
        self.factories
            .keys()
            .filter(|(g, _)| *g == group)
            .map(|(_, n)| n.clone())
            .collect()
    }

    /// Every group with at least one registration
    pub fn groups(&self) -> BTreeSet<&'static str> {
        self.factories.keys().map(|(g, _)| *g).collect()
    }
}

impl std::fmt::Debug for PluginRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.factories.keys()).finish()
    }
}

/// Process-wide registry of the built-in plugins
pub fn builtin_registry() -> &'static PluginRegistry {
    static REGISTRY: OnceLock<PluginRegistry> = OnceLock::new();
    REGISTRY.get_or_init(PluginRegistry::with_builtins)
}

/// Plugin lookup errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PluginError {
    #[error("No plugin named '{name}' in group '{group}'")]
    NotFound { group: String, name: String },

    #[error("Plugin '{name}' in group '{group}' was registered with a different plugin type")]
    TypeMismatch { group: String, name: String },
}
