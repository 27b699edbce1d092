//! Test harness for SQLite script sets.
//!
//! Runs a repository against an in-memory database so each version of a schema can be
//! checked, including data carried across patches and migrations.

use crate::core::UpdateReport;
use crate::dialect::DEFAULT_VERSION_TABLE_NAME;
use crate::error::Error;
use crate::script::ScriptRepository;
use crate::sqlite::SqliteUpdater;
use crate::version::SchemaVersion;
use rusqlite::{Connection, Row};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

/// A test harness holding a SQLite connection and the scripts to bring it up to date.
///
/// # Example
///
/// ```
/// use patchline::testing::sqlite::SqliteTestHarness;
/// use patchline::{EmbeddedRepository, Error, SchemaVersion};
///
/// # fn test() -> Result<(), Error> {
/// let repo = EmbeddedRepository::new()
///     .setup(1, "CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT);")
///     .patch(1, 1, "ALTER TABLE users ADD COLUMN email TEXT;");
///
/// let mut harness = SqliteTestHarness::new(repo)?;
///
/// harness.migrate_to(SchemaVersion::new(1, 0))?;
/// harness.execute("INSERT INTO users (id, name) VALUES (1, 'alice')")?;
///
/// harness.migrate_to(SchemaVersion::new(1, 1))?;
/// harness.assert_column_exists("users", "email")?;
///
/// let name: String = harness.query_one("SELECT name FROM users WHERE id = 1")?;
/// assert_eq!(name, "alice");
/// # Ok(())
/// # }
/// # test().unwrap();
/// ```
pub struct SqliteTestHarness {
    conn: Connection,
    repository: Arc<dyn ScriptRepository + Send + Sync>,
    version_table: String,
}

/// A captured database schema, for comparing the result of different upgrade paths.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaSnapshot {
    /// Table name to definition. The version table is left out.
    pub tables: BTreeMap<String, TableSchema>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableSchema {
    pub columns: Vec<ColumnInfo>,
    pub indexes: Vec<IndexInfo>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnInfo {
    pub name: String,
    pub type_name: String,
    pub not_null: bool,
    pub default_value: Option<String>,
    pub primary_key: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexInfo {
    pub name: String,
    pub unique: bool,
}

impl SqliteTestHarness {
    /// Create a harness over an in-memory database.
    ///
    /// Use the same repository as production so tests exercise the scripts that ship.
    pub fn new(repository: impl ScriptRepository + Send + Sync + 'static) -> Result<Self, Error> {
        Ok(Self::with_connection(
            Connection::open_in_memory()?,
            repository,
        ))
    }

    /// Create a harness over an existing connection, e.g. a file-based database.
    pub fn with_connection(
        conn: Connection,
        repository: impl ScriptRepository + Send + Sync + 'static,
    ) -> Self {
        Self {
            conn,
            repository: Arc::new(repository),
            version_table: DEFAULT_VERSION_TABLE_NAME.to_string(),
        }
    }

    /// Use a custom version table name, matching the production updater.
    pub fn with_version_table(mut self, name: impl Into<String>) -> Self {
        self.version_table = name.into();
        self
    }

    /// Update the database to `target`, setting it up first if it is empty.
    pub fn migrate_to(&mut self, target: impl Into<SchemaVersion>) -> Result<UpdateReport, Error> {
        self.updater(target.into()).run(&mut self.conn)
    }

    /// The recorded version, `None` before the first [migrate_to](Self::migrate_to).
    pub fn current_version(&mut self) -> Result<Option<SchemaVersion>, Error> {
        // any target works, only the version table is read
        self.updater(SchemaVersion::new(0, 0))
            .current_version(&mut self.conn)
    }

    /// Execute SQL, e.g. to insert test data between versions.
    pub fn execute(&mut self, sql: &str) -> Result<(), Error> {
        self.conn.execute_batch(sql)?;
        Ok(())
    }

    /// Query a single value.
    pub fn query_one<T>(&mut self, sql: &str) -> Result<T, Error>
    where
        T: rusqlite::types::FromSql,
    {
        Ok(self.conn.query_row(sql, [], |row| row.get(0))?)
    }

    /// Query all values of a single-column result.
    pub fn query_all<T>(&mut self, sql: &str) -> Result<Vec<T>, Error>
    where
        T: rusqlite::types::FromSql,
    {
        let mut stmt = self.conn.prepare(sql)?;
        let values = stmt
            .query_map([], |row| row.get(0))?
            .collect::<Result<Vec<T>, _>>()?;
        Ok(values)
    }

    /// Query with a custom row mapper.
    pub fn query_map<T, F>(&mut self, sql: &str, f: F) -> Result<Vec<T>, Error>
    where
        F: FnMut(&Row<'_>) -> rusqlite::Result<T>,
    {
        let mut stmt = self.conn.prepare(sql)?;
        let values = stmt.query_map([], f)?.collect::<Result<Vec<T>, _>>()?;
        Ok(values)
    }

    pub fn assert_table_exists(&mut self, table_name: &str) -> Result<(), Error> {
        if !self.object_exists("table", table_name)? {
            return Err(Error::Generic(format!(
                "Table '{}' does not exist",
                table_name
            )));
        }
        Ok(())
    }

    pub fn assert_table_not_exists(&mut self, table_name: &str) -> Result<(), Error> {
        if self.object_exists("table", table_name)? {
            return Err(Error::Generic(format!(
                "Table '{}' exists but should not",
                table_name
            )));
        }
        Ok(())
    }

    pub fn assert_column_exists(&mut self, table_name: &str, column_name: &str) -> Result<(), Error> {
        let columns = self.columns(table_name)?;
        if !columns.iter().any(|c| c.name == column_name) {
            return Err(Error::Generic(format!(
                "Column '{}' does not exist in table '{}'",
                column_name, table_name
            )));
        }
        Ok(())
    }

    pub fn assert_index_exists(&mut self, index_name: &str) -> Result<(), Error> {
        if !self.object_exists("index", index_name)? {
            return Err(Error::Generic(format!(
                "Index '{}' does not exist",
                index_name
            )));
        }
        Ok(())
    }

    /// Capture the current schema of all user tables.
    pub fn schema_snapshot(&mut self) -> Result<SchemaSnapshot, Error> {
        let table_names: Vec<String> = {
            let mut stmt = self.conn.prepare(
                "SELECT name FROM sqlite_master \
                 WHERE type = 'table' AND name NOT LIKE 'sqlite_%' AND name != ?1",
            )?;
            let names = stmt
                .query_map([&self.version_table], |row| row.get(0))?
                .collect::<Result<Vec<_>, _>>()?;
            names
        };

        let mut tables = BTreeMap::new();
        for table_name in table_names {
            let columns = self.columns(&table_name)?;
            let indexes = self.indexes(&table_name)?;
            tables.insert(table_name, TableSchema { columns, indexes });
        }
        Ok(SchemaSnapshot { tables })
    }

    /// Fail with a description of every difference between the current schema and `expected`.
    pub fn assert_schema_matches(&mut self, expected: &SchemaSnapshot) -> Result<(), Error> {
        let actual = self.schema_snapshot()?;
        if actual == *expected {
            return Ok(());
        }

        let mut differences = Vec::new();
        for name in expected.tables.keys() {
            if !actual.tables.contains_key(name) {
                differences.push(format!("  - Table '{}' is missing", name));
            }
        }
        for name in actual.tables.keys() {
            if !expected.tables.contains_key(name) {
                differences.push(format!("  - Unexpected table '{}' found", name));
            }
        }
        for (name, expected_table) in &expected.tables {
            let Some(actual_table) = actual.tables.get(name) else {
                continue;
            };
            if expected_table.columns != actual_table.columns {
                let expected_cols: Vec<_> = expected_table.columns.iter().map(|c| &c.name).collect();
                let actual_cols: Vec<_> = actual_table.columns.iter().map(|c| &c.name).collect();
                if expected_cols != actual_cols {
                    differences.push(format!(
                        "  - Table '{}' column mismatch:\n    Expected columns: {:?}\n    Actual columns:   {:?}",
                        name, expected_cols, actual_cols
                    ));
                } else {
                    for (expected_col, actual_col) in
                        expected_table.columns.iter().zip(&actual_table.columns)
                    {
                        if expected_col != actual_col {
                            differences.push(format!(
                                "  - Table '{}' column '{}' properties differ:\n    Expected: {:?}\n    Actual:   {:?}",
                                name, expected_col.name, expected_col, actual_col
                            ));
                        }
                    }
                }
            }
            if expected_table.indexes != actual_table.indexes {
                let expected_idxs: Vec<_> = expected_table.indexes.iter().map(|i| &i.name).collect();
                let actual_idxs: Vec<_> = actual_table.indexes.iter().map(|i| &i.name).collect();
                differences.push(format!(
                    "  - Table '{}' index mismatch:\n    Expected indexes: {:?}\n    Actual indexes:   {:?}",
                    name, expected_idxs, actual_idxs
                ));
            }
        }

        Err(Error::Generic(format!(
            "Schema mismatch detected:\n{}",
            differences.join("\n")
        )))
    }

    /// The underlying connection, for anything the helpers don't cover.
    pub fn connection(&mut self) -> &mut Connection {
        &mut self.conn
    }

    fn updater(&self, target: SchemaVersion) -> SqliteUpdater {
        SqliteUpdater::new(Arc::clone(&self.repository), target)
            .with_version_table(self.version_table.clone())
    }

    fn object_exists(&mut self, kind: &str, name: &str) -> Result<bool, Error> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = ?1 AND name = ?2",
            [kind, name],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    fn columns(&mut self, table_name: &str) -> Result<Vec<ColumnInfo>, Error> {
        let mut stmt = self
            .conn
            .prepare("SELECT name, type, \"notnull\", dflt_value, pk FROM pragma_table_info(?1)")?;
        let columns = stmt
            .query_map([table_name], |row| {
                Ok(ColumnInfo {
                    name: row.get(0)?,
                    type_name: row.get(1)?,
                    not_null: row.get::<_, i64>(2)? != 0,
                    default_value: row.get(3)?,
                    primary_key: row.get::<_, i64>(4)? != 0,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(columns)
    }

    fn indexes(&mut self, table_name: &str) -> Result<Vec<IndexInfo>, Error> {
        let mut stmt = self
            .conn
            .prepare("SELECT name, \"unique\" FROM pragma_index_list(?1) WHERE origin = 'c' ORDER BY name")?;
        let indexes = stmt
            .query_map([table_name], |row| {
                Ok(IndexInfo {
                    name: row.get(0)?,
                    unique: row.get::<_, i64>(1)? != 0,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(indexes)
    }
}
