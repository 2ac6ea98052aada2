//! Node selection
//!
//! Supported syntax, per selector string:
//! - `name` or a unique_id: that model
//! - `+name`: the model and everything upstream of it
//! - `name+`: the model and everything downstream of it
//! - `+name+`: both directions
//! - `*`: every model

use std::collections::BTreeSet;

use crate::dag::NodeId;
use crate::project::Project;

/// One parsed selector
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selector {
    pub name: String,
    pub upstream: bool,
    pub downstream: bool,
}

impl Selector {
    pub fn parse(raw: &str) -> Result<Self, SelectError> {
        let trimmed = raw.trim();
        let (upstream, rest) = match trimmed.strip_prefix('+') {
            Some(rest) => (true, rest),
            None => (false, trimmed),
        };
        let (downstream, name) = match rest.strip_suffix('+') {
            Some(name) => (true, name),
            None => (false, rest),
        };

        if name.is_empty() {
            return Err(SelectError::Empty(raw.to_string()));
        }

        Ok(Self {
            name: name.to_string(),
            upstream,
            downstream,
        })
    }

    /// Resolve against a project
    pub fn resolve(&self, project: &Project) -> Result<BTreeSet<NodeId>, SelectError> {
        if self.name == "*" {
            return Ok(project.models().map(|m| m.unique_id.clone()).collect());
        }

        let model = project
            .find(&self.name)
            .ok_or_else(|| SelectError::NoMatch(self.name.clone()))?;

        let graph = project.graph();
        let mut selected = BTreeSet::new();
        selected.insert(model.unique_id.clone());
        if self.upstream {
            selected.extend(graph.upstream(&model.unique_id));
        }
        if self.downstream {
            selected.extend(graph.downstream(&model.unique_id));
        }
        Ok(selected)
    }
}

/// Union of `select` minus union of `exclude`; an empty `select` means every model
pub fn select_nodes(
    project: &Project,
    select: &[String],
    exclude: &[String],
) -> Result<BTreeSet<NodeId>, SelectError> {
    let mut selected = BTreeSet::new();
    if select.is_empty() {
        selected.extend(project.models().map(|m| m.unique_id.clone()));
    } else {
        for raw in select {
            selected.extend(Selector::parse(raw)?.resolve(project)?);
        }
    }

    for raw in exclude {
        for node in Selector::parse(raw)?.resolve(project)? {
            selected.remove(&node);
        }
    }

    tracing::debug!(selected = selected.len(), "resolved selection");
    Ok(selected)
}

/// Selection errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SelectError {
    #[error("Empty selector: '{0}'")]
    Empty(String),

    #[error("No model matches selector '{0}'")]
    NoMatch(String),
}
