//! Compilation
//!
//! Renders every model of a project in dependency order. Ephemeral models
//! are inlined into their dependents, so they must be rendered first.

use modelflow_core::RelationError;
use modelflow_graph::{Model, NodeId, Project};
use modelflow_render::{ModelRenderer, RenderContext, RenderError, TargetContext};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::materialization::Materialization;

/// A rendered model, ready to execute
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledModel {
    pub unique_id: NodeId,
    pub name: String,

    /// Model file path relative to the project root
    pub path: PathBuf,

    pub materialization: Materialization,

    /// Rendered relation the model builds
    pub relation: String,

    /// Rendered select
    pub compiled_sql: String,

    /// Statement that builds the relation; `None` for ephemeral models
    pub statement: Option<String>,
}

/// Why a model failed to compile
#[derive(Debug, thiserror::Error)]
pub enum CompileError {
    #[error(transparent)]
    Render(#[from] RenderError),

    #[error(transparent)]
    Relation(#[from] RelationError),

    #[error("Failed to write {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Every model of a project, compiled or failed
#[derive(Debug, Default)]
pub struct CompiledProject {
    models: BTreeMap<NodeId, Result<CompiledModel, CompileError>>,
}

impl CompiledProject {
    pub fn get(&self, unique_id: &str) -> Option<&Result<CompiledModel, CompileError>> {
        self.models.get(unique_id)
    }

    pub fn compiled(&self) -> impl Iterator<Item = &CompiledModel> {
        self.models.values().filter_map(|m| m.as_ref().ok())
    }

    pub fn errors(&self) -> impl Iterator<Item = (&NodeId, &CompileError)> {
        self.models
            .iter()
            .filter_map(|(id, m)| m.as_ref().err().map(|e| (id, e)))
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    /// Write each compiled select to `<dir>/<model path>`
    pub fn write_compiled(&self, dir: &Path) -> Result<usize, CompileError> {
        let mut written = 0;
        for model in self.compiled() {
            write_sql(&dir.join(&model.path), &model.compiled_sql)?;
            written += 1;
        }
        tracing::info!(dir = %dir.display(), models = written, "wrote compiled models");
        Ok(written)
    }
}

pub(crate) fn write_sql(path: &Path, sql: &str) -> Result<(), CompileError> {
    let io_error = |source| CompileError::Io {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(io_error)?;
    }
    std::fs::write(path, sql).map_err(io_error)
}

/// Renders the models of one project
pub struct Compiler<'a> {
    project: &'a Project,
    renderer: ModelRenderer,
}

impl<'a> Compiler<'a> {
    pub fn new(project: &'a Project) -> Self {
        Self {
            project,
            renderer: ModelRenderer::new(),
        }
    }

    /// Compile every model
    ///
    /// Failures are recorded per model; a model whose ephemeral parent
    /// failed fails with an undefined `ref()`.
    pub fn compile_all(&self) -> CompiledProject {
        let graph = self.project.graph();
        // Project loading rejects cycles, so a topological order always exists
        let order = graph
            .topological_sort()
            .unwrap_or_else(|| graph.all_nodes().into_iter().cloned().collect());

        let mut compiled = CompiledProject::default();
        for unique_id in order {
            let Some(model) = self.project.get(&unique_id) else {
                continue;
            };
            let result = self.compile_model(model, &compiled);
            if let Err(err) = &result {
                tracing::warn!(model = %unique_id, error = %err, "model failed to compile");
            }
            compiled.models.insert(unique_id, result);
        }

        tracing::debug!(
            models = compiled.len(),
            errors = compiled.errors().count(),
            "compiled project"
        );
        compiled
    }

    fn compile_model(&self, model: &Model, compiled: &CompiledProject) -> Result<CompiledModel, CompileError> {
        let config = &self.project.config;
        let relation = self.project.relation_for(model).render()?;

        let mut context = RenderContext::new(TargetContext::from(&config.target));
        for (key, value) in &config.vars {
            context.add_var(key.clone(), value.clone());
        }

        for parent_id in &model.depends_on {
            let Some(parent) = self.project.get(parent_id) else {
                continue;
            };
            match compiled.get(parent_id) {
                Some(Ok(parent)) if parent.materialization == Materialization::Ephemeral => {
                    context.add_ref(
                        parent.name.clone(),
                        format!("(\n{}\n) as {}", parent.compiled_sql.trim(), parent.name),
                    );
                }
                // Failed ephemeral parents stay undefined
                Some(Err(_)) if Materialization::from(parent.materialized.as_str()) == Materialization::Ephemeral => {}
                _ => {
                    context.add_ref(parent.name.clone(), self.project.relation_for(parent).render()?);
                }
            }
        }

        for (source_name, table_name) in &model.sources {
            let rendered = self.project.source_relation(source_name, table_name).render()?;
            context.add_source(source_name, table_name, rendered);
        }

        let context = context.with_this(relation.clone());
        let rendered = self.renderer.render(&model.raw_sql, &context, Some(&model.path))?;

        let materialization = Materialization::from(model.materialized.as_str());
        let statement = materialization.wrap_statement(&relation, &rendered.rendered_sql);

        Ok(CompiledModel {
            unique_id: model.unique_id.clone(),
            name: model.name.clone(),
            path: model.path.clone(),
            materialization,
            relation,
            compiled_sql: rendered.rendered_sql,
            statement,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use modelflow_core::Config;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn project(models: &[(&str, &str)]) -> Project {
        Project::from_sources(
            Config {
                name: "shop".to_string(),
                ..Config::default()
            },
            models
                .iter()
                .map(|(name, sql)| (PathBuf::from(format!("{}.sql", name)), sql.to_string())),
        )
        .unwrap()
    }

    #[test]
    fn renders_refs_and_sources_to_relations() {
        let project = project(&[
            ("stg_orders", "select * from {{ source('raw', 'orders') }}"),
            ("orders", "{{ config(materialized='table') }}select * from {{ ref('stg_orders') }}"),
        ]);
        let compiled = Compiler::new(&project).compile_all();

        let orders = compiled.get("model.shop.orders").unwrap().as_ref().unwrap();
        assert_eq!(orders.compiled_sql, "select * from \"public\".\"stg_orders\"");
        assert_eq!(orders.relation, "\"public\".\"orders\"");
        assert_eq!(orders.materialization, Materialization::Table);
        assert_eq!(
            orders.statement.as_deref(),
            Some("create table \"public\".\"orders\" as (\nselect * from \"public\".\"stg_orders\"\n)")
        );

        let staging = compiled.get("model.shop.stg_orders").unwrap().as_ref().unwrap();
        assert_eq!(staging.compiled_sql, "select * from \"raw\".\"orders\"");
        assert_eq!(staging.materialization, Materialization::View);
    }

    #[test]
    fn inlines_ephemeral_parents() {
        let project = project(&[
            ("base", "{{ config(materialized='ephemeral') }}select 1 as id"),
            ("final", "select id from {{ ref('base') }}"),
        ]);
        let compiled = Compiler::new(&project).compile_all();

        let base = compiled.get("model.shop.base").unwrap().as_ref().unwrap();
        assert_eq!(base.statement, None);

        let final_model = compiled.get("model.shop.final").unwrap().as_ref().unwrap();
        assert_eq!(final_model.compiled_sql, "select id from (\nselect 1 as id\n) as base");
    }

    #[test]
    fn render_failures_are_per_model() {
        let project = project(&[
            ("good", "select 1"),
            ("bad", "select {{ var('missing') }}"),
        ]);
        let compiled = Compiler::new(&project).compile_all();

        assert_eq!(compiled.compiled().count(), 1);
        let errors: Vec<&NodeId> = compiled.errors().map(|(id, _)| id).collect();
        assert_eq!(errors, vec!["model.shop.bad"]);
    }

    #[test]
    fn writes_compiled_files() {
        let dir = TempDir::new().unwrap();
        let project = project(&[("a", "select 1"), ("b", "select * from {{ ref('a') }}")]);

        let written = Compiler::new(&project)
            .compile_all()
            .write_compiled(&dir.path().join("compiled"))
            .unwrap();

        assert_eq!(written, 2);
        let b = std::fs::read_to_string(dir.path().join("compiled").join("b.sql")).unwrap();
        assert_eq!(b, "select * from \"public\".\"a\"");
    }
}
