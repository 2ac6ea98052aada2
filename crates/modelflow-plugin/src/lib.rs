//! Plugin registry and built-in plugins
//!
//! Plugins are registered explicitly under a `(group, name)` key and
//! resolved by name at runtime.
//!
//! ## Example
//!
//! ```rust,ignore
//! use modelflow_plugin::{builtin_registry, ResultWriters};
//!
//! let writer = builtin_registry().get_pluggable::<ResultWriters>("email")?;
//! writer.write(&result, Path::new("target/email.json"))?;
//! ```

pub mod registry;
pub mod writers;

pub use registry::{builtin_registry, PluginError, PluginGroup, PluginRegistry, DEFAULT_PLUGIN};
pub use writers::{
    EmailArtifact, EmailResultWriter, JsonResultWriter, ResultWriter, ResultWriters, WriteError,
};
