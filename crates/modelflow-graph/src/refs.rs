//! Static extraction of template calls from model SQL
//!
//! Handles `{{ ref('model') }}`, `{{ ref('package', 'model') }}`,
//! `{{ source('source', 'table') }}` and `{{ config(key='value') }}` without
//! rendering the template, so the dependency graph can be built first.

use regex::Regex;
use std::collections::BTreeMap;
use std::sync::OnceLock;

/// A reference from one model to another model or to a source table
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ModelReference {
    /// ref('model_name') or ref('package', 'model_name')
    Ref {
        package: Option<String>,
        model_name: String,
    },

    /// source('source_name', 'table_name')
    Source {
        source_name: String,
        table_name: String,
    },
}

/// Everything extracted from one SQL file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractedCalls {
    pub references: Vec<ModelReference>,

    /// Keyword arguments of every config() call, later calls win
    pub config: BTreeMap<String, String>,
}

impl ExtractedCalls {
    /// Names of referenced models, deduplicated, in first-seen order
    pub fn ref_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for reference in &self.references {
            if let ModelReference::Ref { model_name, .. } = reference {
                if !names.contains(&model_name.as_str()) {
                    names.push(model_name);
                }
            }
        }
        names
    }

    /// (source, table) pairs, deduplicated
    pub fn sources(&self) -> Vec<(String, String)> {
        let mut sources: Vec<(String, String)> = Vec::new();
        for reference in &self.references {
            if let ModelReference::Source { source_name, table_name } = reference {
                let pair = (source_name.clone(), table_name.clone());
                if !sources.contains(&pair) {
                    sources.push(pair);
                }
            }
        }
        sources
    }
}

/// Extracts template calls from SQL
pub struct CallExtractor;

impl CallExtractor {
    /// Extract all calls found in `{{ }}` blocks
    pub fn extract(sql: &str) -> ExtractedCalls {
        let mut calls = ExtractedCalls::default();

        // Find all {{ }} blocks
        let mut start = 0;
        while let Some(open) = sql[start..].find("{{") {
            let open_pos = start + open;
            let Some(close) = sql[open_pos..].find("}}") else {
                break;
            };
            let close_pos = open_pos + close;
            let content = sql[open_pos + 2..close_pos].trim();

            if let Some(reference) = Self::parse_ref(content) {
                calls.references.push(reference);
            } else if let Some(source) = Self::parse_source(content) {
                calls.references.push(source);
            } else if let Some(kwargs) = Self::parse_config(content) {
                calls.config.extend(kwargs);
            }

            start = close_pos + 2;
        }

        calls
    }

    /// Parse ref() function
    fn parse_ref(content: &str) -> Option<ModelReference> {
        let inner = content.strip_prefix("ref(")?.strip_suffix(')')?;
        let args = Self::split_args(inner)?;

        match args.as_slice() {
            [model] => Some(ModelReference::Ref {
                package: None,
                model_name: model.to_string(),
            }),
            [package, model] => Some(ModelReference::Ref {
                package: Some(package.to_string()),
                model_name: model.to_string(),
            }),
            _ => None,
        }
    }

    /// Parse source() function
    fn parse_source(content: &str) -> Option<ModelReference> {
        let inner = content.strip_prefix("source(")?.strip_suffix(')')?;
        let args = Self::split_args(inner)?;

        match args.as_slice() {
            [source, table] => Some(ModelReference::Source {
                source_name: source.to_string(),
                table_name: table.to_string(),
            }),
            _ => None,
        }
    }

    /// Parse config() keyword arguments with string values
    fn parse_config(content: &str) -> Option<BTreeMap<String, String>> {
        let inner = content.strip_prefix("config(")?.strip_suffix(')')?;

        static KWARG: OnceLock<Regex> = OnceLock::new();
        let kwarg = KWARG.get_or_init(|| {
            Regex::new(r#"(\w+)\s*=\s*(?:'([^']*)'|"([^"]*)")"#).expect("config kwarg pattern is valid")
        });

        let kwargs = kwarg
            .captures_iter(inner)
            .filter_map(|caps| {
                let key = caps.get(1)?.as_str().to_string();
                let value = caps.get(2).or_else(|| caps.get(3))?.as_str().to_string();
                Some((key, value))
            })
            .collect();

        Some(kwargs)
    }

    /// Split comma-separated string literal arguments
    fn split_args(inner: &str) -> Option<Vec<&str>> {
        inner
            .split(',')
            .map(|part| Self::extract_string_literal(part))
            .collect()
    }

    /// Extract string literal from quoted string
    ///
    /// Handles both single and double quotes.
    fn extract_string_literal(s: &str) -> Option<&str> {
        let trimmed = s.trim();

        if let Some(content) = trimmed.strip_prefix('\'').and_then(|s| s.strip_suffix('\'')) {
            return Some(content);
        }

        if let Some(content) = trimmed.strip_prefix('"').and_then(|s| s.strip_suffix('"')) {
            return Some(content);
        }

        None
    }
}
