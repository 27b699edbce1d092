use crate::error::Error;
use crate::splitter::split_statements;
use std::fmt;
use std::str::FromStr;

/// The SQL flavor a script set is written for.
///
/// The dialect decides the directory scripts are looked up in, how scripts are cut into
/// statements, and the SQL used for the version table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dialect {
    Sqlite,
    Postgres,
    Mysql,
    MariaDb,
}

/// Default name of the table holding the current schema version.
pub const DEFAULT_VERSION_TABLE_NAME: &str = "version";

impl Dialect {
    /// Name of the dialect, also the directory name used by [DirectoryRepository](crate::DirectoryRepository).
    pub fn name(&self) -> &'static str {
        match self {
            Dialect::Sqlite => "sqlite",
            Dialect::Postgres => "postgresql",
            Dialect::Mysql => "mysql",
            Dialect::MariaDb => "mariadb",
        }
    }

    /// Alternative names accepted when parsing.
    pub fn aliases(&self) -> &'static [&'static str] {
        match self {
            Dialect::Sqlite => &["sqlite3"],
            Dialect::Postgres => &["postgres", "pg"],
            Dialect::Mysql => &[],
            Dialect::MariaDb => &[],
        }
    }

    /// Split a script into statements the driver can execute one by one.
    ///
    /// PostgreSQL accepts multi-statement batches, so its scripts are passed through whole.
    pub fn split_statements(&self, script: &str) -> Vec<String> {
        match self {
            Dialect::Postgres => {
                if script.trim().is_empty() {
                    vec![]
                } else {
                    vec![script.to_string()]
                }
            }
            Dialect::Sqlite | Dialect::Mysql | Dialect::MariaDb => split_statements(script),
        }
    }

    pub fn create_version_table(&self, table: &str) -> String {
        match self {
            Dialect::Sqlite => format!("CREATE TABLE IF NOT EXISTS {table}(major INT, patch INT)"),
            Dialect::Postgres | Dialect::Mysql | Dialect::MariaDb => {
                format!("CREATE TABLE IF NOT EXISTS {table}(major INTEGER, patch INTEGER)")
            }
        }
    }

    /// Query returning a single row with a truthy value when the table bound to the first
    /// parameter exists.
    pub fn table_exists(&self) -> &'static str {
        match self {
            Dialect::Sqlite => {
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1"
            }
            Dialect::Postgres => "SELECT to_regclass($1) IS NOT NULL",
            Dialect::Mysql | Dialect::MariaDb => {
                "SELECT COUNT(*) FROM information_schema.tables \
                 WHERE table_schema = DATABASE() AND table_name = ?"
            }
        }
    }

    pub fn select_version(&self, table: &str) -> String {
        format!("SELECT major, patch FROM {table} LIMIT 1")
    }

    pub fn delete_version(&self, table: &str) -> String {
        format!("DELETE FROM {table}")
    }

    pub fn insert_version(&self, table: &str) -> String {
        match self {
            Dialect::Postgres => format!("INSERT INTO {table}(major, patch) VALUES ($1, $2)"),
            Dialect::Sqlite | Dialect::Mysql | Dialect::MariaDb => {
                format!("INSERT INTO {table}(major, patch) VALUES (?, ?)")
            }
        }
    }

    /// Whether the database groups tables into schemas that may need creating.
    pub fn has_schemas(&self) -> bool {
        matches!(self, Dialect::Postgres)
    }

    /// Query returning a single boolean telling whether the schema bound to the first
    /// parameter exists. `None` for dialects without schemas.
    pub fn schema_exists(&self) -> Option<&'static str> {
        match self {
            Dialect::Postgres => {
                Some("SELECT EXISTS (SELECT FROM information_schema.schemata WHERE schema_name = $1)")
            }
            _ => None,
        }
    }

    /// `None` for dialects without schemas.
    pub fn create_schema(&self, schema: &str) -> Option<String> {
        match self {
            Dialect::Postgres => Some(format!("CREATE SCHEMA IF NOT EXISTS {schema}")),
            _ => None,
        }
    }

    fn all() -> [Dialect; 4] {
        [
            Dialect::Sqlite,
            Dialect::Postgres,
            Dialect::Mysql,
            Dialect::MariaDb,
        ]
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Dialect {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Dialect::all()
            .into_iter()
            .find(|dialect| {
                dialect.name().eq_ignore_ascii_case(s)
                    || dialect.aliases().iter().any(|a| a.eq_ignore_ascii_case(s))
            })
            .ok_or_else(|| Error::UnknownDialect(s.to_string()))
    }
}
