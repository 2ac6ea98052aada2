//! Relation naming and identifier policies
//!
//! A relation is rendered as `database.schema.identifier`. The include policy
//! decides which segments appear, the quote policy decides which of them are
//! wrapped in the quote character.

use serde::{Deserialize, Serialize};

/// Longest identifier the target accepts
pub const MAX_IDENTIFIER_LENGTH: usize = 63;

/// Character used to quote identifier segments
pub const QUOTE_CHARACTER: char = '"';

/// Per-segment flags, used both as include policy and as quote policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Policy {
    #[serde(default = "default_true")]
    pub database: bool,

    #[serde(default = "default_true")]
    pub schema: bool,

    #[serde(default = "default_true")]
    pub identifier: bool,
}

fn default_true() -> bool {
    true
}

impl Policy {
    pub const fn new(database: bool, schema: bool, identifier: bool) -> Self {
        Self {
            database,
            schema,
            identifier,
        }
    }

    /// Every segment on
    pub const fn enabled() -> Self {
        Self::new(true, true, true)
    }

    /// Every segment off
    pub const fn disabled() -> Self {
        Self::new(false, false, false)
    }
}

impl Default for Policy {
    fn default() -> Self {
        Self::enabled()
    }
}

/// Database, schema and identifier of a relation
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RelationPath {
    pub database: Option<String>,
    pub schema: Option<String>,
    pub identifier: Option<String>,
}

/// A relation with the policies used to render it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relation {
    pub path: RelationPath,
    pub include_policy: Policy,
    pub quote_policy: Policy,
}

impl Relation {
    /// Create a relation with every segment included and quoted
    pub fn new(
        database: Option<String>,
        schema: Option<String>,
        identifier: impl Into<String>,
    ) -> Self {
        Self {
            path: RelationPath {
                database,
                schema,
                identifier: Some(identifier.into()),
            },
            include_policy: Policy::enabled(),
            quote_policy: Policy::enabled(),
        }
    }

    pub fn with_include_policy(mut self, policy: Policy) -> Self {
        self.include_policy = policy;
        self
    }

    pub fn with_quote_policy(mut self, policy: Policy) -> Self {
        self.quote_policy = policy;
        self
    }

    /// Render the qualified name
    ///
    /// Only included segments are checked against the length limit.
    pub fn render(&self) -> Result<String, RelationError> {
        let segments = [
            (&self.path.database, self.include_policy.database, self.quote_policy.database),
            (&self.path.schema, self.include_policy.schema, self.quote_policy.schema),
            (&self.path.identifier, self.include_policy.identifier, self.quote_policy.identifier),
        ];

        let mut parts = Vec::with_capacity(segments.len());
        for (value, include, quote) in segments {
            let Some(value) = value.as_ref().filter(|_| include) else {
                continue;
            };
            if value.chars().count() > MAX_IDENTIFIER_LENGTH {
                return Err(RelationError::IdentifierTooLong {
                    identifier: value.clone(),
                    max: MAX_IDENTIFIER_LENGTH,
                });
            }
            parts.push(if quote { quote_identifier(value) } else { value.clone() });
        }

        if parts.is_empty() {
            return Err(RelationError::Empty);
        }

        Ok(parts.join("."))
    }
}

/// Wrap a segment in quotes, doubling embedded quote characters
pub fn quote_identifier(value: &str) -> String {
    let escaped = value.replace(QUOTE_CHARACTER, &format!("{0}{0}", QUOTE_CHARACTER));
    format!("{0}{1}{0}", QUOTE_CHARACTER, escaped)
}

/// Relation rendering errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RelationError {
    #[error("Identifier '{identifier}' is longer than {max} characters")]
    IdentifierTooLong { identifier: String, max: usize },

    #[error("Relation has no segments to render")]
    Empty,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn orders() -> Relation {
        Relation::new(
            Some("analytics".to_string()),
            Some("public".to_string()),
            "orders",
        )
    }

    #[test]
    fn renders_fully_quoted_by_default() {
        assert_eq!(orders().render().unwrap(), r#""analytics"."public"."orders""#);
    }

    #[test]
    fn include_policy_drops_segments() {
        let relation = orders().with_include_policy(Policy::new(false, true, true));
        assert_eq!(relation.render().unwrap(), r#""public"."orders""#);
    }

    #[test]
    fn quote_policy_controls_quoting() {
        let relation = orders().with_quote_policy(Policy::new(false, false, true));
        assert_eq!(relation.render().unwrap(), r#"analytics.public."orders""#);
    }

    #[test]
    fn missing_segments_are_skipped() {
        let relation = Relation::new(None, Some("public".to_string()), "orders")
            .with_quote_policy(Policy::disabled());
        assert_eq!(relation.render().unwrap(), "public.orders");
    }

    #[test]
    fn embedded_quotes_are_doubled() {
        assert_eq!(quote_identifier(r#"we"ird"#), r#""we""ird""#);
    }

    #[test]
    fn identifier_length_limit() {
        let at_limit = "a".repeat(MAX_IDENTIFIER_LENGTH);
        assert!(Relation::new(None, None, at_limit).render().is_ok());

        let too_long = "a".repeat(MAX_IDENTIFIER_LENGTH + 1);
        assert!(matches!(
            Relation::new(None, None, too_long).render(),
            Err(RelationError::IdentifierTooLong { max: 63, .. })
        ));
    }

    #[test]
    fn excluded_identifier_is_not_length_checked() {
        let relation = Relation::new(None, Some("public".to_string()), "a".repeat(MAX_IDENTIFIER_LENGTH + 1))
            .with_include_policy(Policy::new(true, true, false));
        assert_eq!(relation.render().unwrap(), r#""public""#);
    }

    #[test]
    fn long_schema_is_rejected() {
        let schema = "s".repeat(MAX_IDENTIFIER_LENGTH + 1);
        let relation = Relation::new(Some("analytics".to_string()), Some(schema.clone()), "orders");
        assert_eq!(
            relation.render(),
            Err(RelationError::IdentifierTooLong {
                identifier: schema,
                max: MAX_IDENTIFIER_LENGTH,
            })
        );
    }

    #[test]
    fn long_database_is_rejected_only_when_included() {
        let database = "d".repeat(MAX_IDENTIFIER_LENGTH + 1);
        let relation = Relation::new(Some(database), Some("public".to_string()), "orders");
        assert!(relation.render().is_err());

        let relation = relation.with_include_policy(Policy::new(false, true, true));
        assert_eq!(relation.render().unwrap(), r#""public"."orders""#);
    }

    #[test]
    fn nothing_included_is_an_error() {
        let relation = orders().with_include_policy(Policy::disabled());
        assert_eq!(relation.render(), Err(RelationError::Empty));
    }
}
