//! Template rendering for model SQL
//!
//! This crate handles:
//! - Rendering model templates to plain SQL
//! - The ref(), source(), var() and config() template functions
//! - The per-model render context (this, target, vars, refs, sources)

pub mod context;
pub mod functions;
pub mod renderer;

pub use context::{RenderContext, TargetContext};
pub use functions::{config_function, ref_function, source_function, var_function};
pub use renderer::{ModelRenderer, RenderError, RenderedSql};
