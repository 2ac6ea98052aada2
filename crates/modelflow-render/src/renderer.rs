//! Model rendering
//!
//! Turns a model's templated SQL into plain SQL. Templates without any
//! template markers are passed through untouched.

use minijinja::{Environment, Error as JinjaError, ErrorKind};
use std::path::{Path, PathBuf};

use crate::context::RenderContext;

/// Result of rendering one model
#[derive(Debug, Clone)]
pub struct RenderedSql {
    /// SQL as written, with templates
    pub original_sql: String,

    /// SQL after rendering
    pub rendered_sql: String,

    pub file_path: Option<PathBuf>,

    /// Whether any template markers were found
    pub had_template: bool,
}

/// Error during rendering
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("Render error{}: {message}", location(.file_path, .line))]
    Template {
        message: String,
        file_path: Option<PathBuf>,
        line: Option<usize>,
    },

    #[error("Undefined{}: {message}", location(.file_path, .line))]
    Undefined {
        message: String,
        file_path: Option<PathBuf>,
        line: Option<usize>,
    },
}

fn location(file_path: &Option<PathBuf>, line: &Option<usize>) -> String {
    match (file_path, line) {
        (Some(path), Some(line)) => format!(" in {}:{}", path.display(), line),
        (Some(path), None) => format!(" in {}", path.display()),
        (None, Some(line)) => format!(" at line {}", line),
        (None, None) => String::new(),
    }
}

/// Template renderer for model SQL
pub struct ModelRenderer {
    env: Environment<'static>,
}

impl ModelRenderer {
    pub fn new() -> Self {
        let mut env = Environment::new();

        env.add_function("ref", crate::functions::ref_function);
        env.add_function("source", crate::functions::source_function);
        env.add_function("var", crate::functions::var_function);
        env.add_function("config", crate::functions::config_function);

        Self { env }
    }

    /// Check if SQL contains template markers
    pub fn has_template(sql: &str) -> bool {
        sql.contains("{{") || sql.contains("{%") || sql.contains("{#")
    }

    /// Render `sql` against `context`
    pub fn render(
        &self,
        sql: &str,
        context: &RenderContext,
        file_path: Option<&Path>,
    ) -> Result<RenderedSql, RenderError> {
        let had_template = Self::has_template(sql);

        if !had_template {
            return Ok(RenderedSql {
                original_sql: sql.to_string(),
                rendered_sql: sql.to_string(),
                file_path: file_path.map(Path::to_path_buf),
                had_template: false,
            });
        }

        let rendered = self
            .env
            .render_str(sql, context.to_minijinja_value())
            .map_err(|e| Self::convert_error(e, file_path))?;

        Ok(RenderedSql {
            original_sql: sql.to_string(),
            rendered_sql: rendered,
            file_path: file_path.map(Path::to_path_buf),
            had_template: true,
        })
    }

    fn convert_error(error: JinjaError, file_path: Option<&Path>) -> RenderError {
        let message = match error.detail() {
            Some(detail) => detail.to_string(),
            None => error.to_string(),
        };
        let file_path = file_path.map(Path::to_path_buf);
        let line = error.line();

        match error.kind() {
            ErrorKind::UndefinedError => RenderError::Undefined { message, file_path, line },
            _ => RenderError::Template { message, file_path, line },
        }
    }
}

impl Default for ModelRenderer {
    fn default() -> Self {
        Self::new()
    }
}
