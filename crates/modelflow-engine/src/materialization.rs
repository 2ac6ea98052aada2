//! Materializations and the commands that build them

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How a model is persisted
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum Materialization {
    Table,
    View,
    Incremental,
    /// Never built; inlined into dependents as a subquery
    Ephemeral,
    Seed,
    Snapshot,
    Test,
    Custom(String),
}

impl Materialization {
    pub fn as_str(&self) -> &str {
        match self {
            Materialization::Table => "table",
            Materialization::View => "view",
            Materialization::Incremental => "incremental",
            Materialization::Ephemeral => "ephemeral",
            Materialization::Seed => "seed",
            Materialization::Snapshot => "snapshot",
            Materialization::Test => "test",
            Materialization::Custom(name) => name,
        }
    }

    pub fn is_builtin(&self) -> bool {
        !matches!(self, Materialization::Custom(_))
    }

    /// Statement that builds `relation` from the model's compiled select
    ///
    /// Ephemeral models build nothing and return `None`.
    pub fn wrap_statement(&self, relation: &str, sql: &str) -> Option<String> {
        let sql = sql.trim().trim_end_matches(';').trim_end();
        match self {
            Materialization::Ephemeral => None,
            Materialization::Table | Materialization::Seed | Materialization::Snapshot => {
                Some(format!("create table {} as (\n{}\n)", relation, sql))
            }
            Materialization::View => Some(format!("create view {} as (\n{}\n)", relation, sql)),
            Materialization::Incremental => Some(format!("insert into {} (\n{}\n)", relation, sql)),
            Materialization::Test | Materialization::Custom(_) => Some(sql.to_string()),
        }
    }
}

impl From<&str> for Materialization {
    fn from(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "table" => Materialization::Table,
            "view" => Materialization::View,
            "incremental" => Materialization::Incremental,
            "ephemeral" => Materialization::Ephemeral,
            "seed" => Materialization::Seed,
            "snapshot" => Materialization::Snapshot,
            "test" => Materialization::Test,
            other => Materialization::Custom(other.to_string()),
        }
    }
}

impl From<String> for Materialization {
    fn from(value: String) -> Self {
        Materialization::from(value.as_str())
    }
}

impl From<Materialization> for String {
    fn from(value: Materialization) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for Materialization {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Invoking command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Command {
    Run,
    Build,
    Seed,
    Snapshot,
    Test,
    Compile,
}

impl Command {
    pub const ALL: [Command; 6] = [
        Command::Run,
        Command::Build,
        Command::Seed,
        Command::Snapshot,
        Command::Test,
        Command::Compile,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Command::Run => "run",
            Command::Build => "build",
            Command::Seed => "seed",
            Command::Snapshot => "snapshot",
            Command::Test => "test",
            Command::Compile => "compile",
        }
    }

    /// Whether this command can build a model with `materialization`
    pub fn supports(&self, materialization: &Materialization) -> bool {
        use Materialization as M;

        match self {
            Command::Compile => true,
            Command::Build => materialization.is_builtin(),
            Command::Run => matches!(materialization, M::Table | M::View | M::Incremental | M::Ephemeral),
            Command::Seed => matches!(materialization, M::Seed),
            Command::Snapshot => matches!(materialization, M::Snapshot),
            Command::Test => matches!(materialization, M::Test),
        }
    }

    /// Whether models are executed, not just compiled
    pub fn executes(&self) -> bool {
        !matches!(self, Command::Compile)
    }
}

impl FromStr for Command {
    type Err = UnknownCommand;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Command::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| UnknownCommand(s.to_string()))
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown command: '{0}'")]
pub struct UnknownCommand(pub String);

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn parses_materializations() {
        assert_eq!(Materialization::from("TABLE"), Materialization::Table);
        assert_eq!(Materialization::from(" view "), Materialization::View);
        assert_eq!(
            Materialization::from("materialized_view"),
            Materialization::Custom("materialized_view".to_string())
        );
        assert_eq!(Materialization::from("ephemeral").to_string(), "ephemeral");
    }

    #[test]
    fn support_matrix() {
        let all = [
            Materialization::Table,
            Materialization::View,
            Materialization::Incremental,
            Materialization::Ephemeral,
            Materialization::Seed,
            Materialization::Snapshot,
            Materialization::Test,
            Materialization::Custom("custom".to_string()),
        ];

        let supported = |command: Command| -> Vec<&str> {
            all.iter().filter(|m| command.supports(m)).map(|m| m.as_str()).collect()
        };

        assert_eq!(supported(Command::Run), vec!["table", "view", "incremental", "ephemeral"]);
        assert_eq!(supported(Command::Seed), vec!["seed"]);
        assert_eq!(supported(Command::Snapshot), vec!["snapshot"]);
        assert_eq!(supported(Command::Test), vec!["test"]);
        assert_eq!(supported(Command::Build).len(), 7);
        assert_eq!(supported(Command::Compile).len(), 8);
    }

    #[test]
    fn wraps_statements() {
        let sql = "select 1 as id;\n";
        assert_eq!(
            Materialization::Table.wrap_statement("\"public\".\"t\"", sql).unwrap(),
            "create table \"public\".\"t\" as (\nselect 1 as id\n)"
        );
        assert_eq!(
            Materialization::View.wrap_statement("v", sql).unwrap(),
            "create view v as (\nselect 1 as id\n)"
        );
        assert_eq!(
            Materialization::Incremental.wrap_statement("i", sql).unwrap(),
            "insert into i (\nselect 1 as id\n)"
        );
        assert_eq!(Materialization::Ephemeral.wrap_statement("e", sql), None);
    }

    #[test]
    fn parses_commands() {
        assert_eq!("build".parse::<Command>().unwrap(), Command::Build);
        assert_eq!("Seed".parse::<Command>().unwrap(), Command::Seed);
        assert_eq!("deploy".parse::<Command>(), Err(UnknownCommand("deploy".to_string())));
        assert!(!Command::Compile.executes());
    }
}
