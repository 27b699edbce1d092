//! SQLite backend.
//!
//! # Example
//!
//! ```
//! use patchline::sqlite::SqliteUpdater;
//! use patchline::{EmbeddedRepository, SchemaVersion};
//! use rusqlite::Connection;
//!
//! let repo = EmbeddedRepository::new()
//!     .setup(1, "CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT);")
//!     .patch(1, 1, "ALTER TABLE users ADD COLUMN email TEXT;");
//!
//! let updater = SqliteUpdater::new(repo, SchemaVersion::new(1, 1));
//!
//! let mut conn = Connection::open_in_memory().unwrap();
//! let report = updater.run(&mut conn).unwrap();
//! assert!(report.bootstrapped);
//! assert_eq!(report.version, SchemaVersion::new(1, 1));
//!
//! // running again is a no-op
//! assert!(updater.run(&mut conn).unwrap().is_noop());
//! ```
//!
//! # Hooks
//!
//! Hooks receive the step's transaction by reference. They can read and write through it,
//! and their work commits or rolls back together with the step's statements.
//!
//! ```
//! use patchline::sqlite::SqliteUpdater;
//! use patchline::{EmbeddedRepository, SchemaVersion};
//! use rusqlite::Connection;
//!
//! let repo = EmbeddedRepository::new()
//!     .setup(1, "CREATE TABLE prefs (name TEXT PRIMARY KEY, raw TEXT);")
//!     .patch(1, 1, "ALTER TABLE prefs ADD COLUMN theme TEXT;");
//!
//! let mut conn = Connection::open_in_memory().unwrap();
//! SqliteUpdater::new(repo.clone(), SchemaVersion::new(1, 0))
//!     .run(&mut conn)
//!     .unwrap();
//! conn.execute("INSERT INTO prefs (name, raw) VALUES ('alice', 'theme=dark')", [])
//!     .unwrap();
//!
//! // fill the new column from the old serialized format once the patch added it
//! SqliteUpdater::new(repo, SchemaVersion::new(1, 1))
//!     .post_update_hook((1, 1), |tx| {
//!         let rows = {
//!             let mut stmt = tx.prepare("SELECT name, raw FROM prefs")?;
//!             let rows = stmt
//!                 .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?
//!                 .collect::<Result<Vec<_>, _>>()?;
//!             rows
//!         };
//!         for (name, raw) in rows {
//!             let theme = raw.trim_start_matches("theme=");
//!             tx.execute("UPDATE prefs SET theme = ?1 WHERE name = ?2", [theme, name.as_str()])?;
//!         }
//!         Ok(())
//!     })
//!     .run(&mut conn)
//!     .unwrap();
//!
//! let theme: String = conn
//!     .query_row("SELECT theme FROM prefs WHERE name = 'alice'", [], |row| row.get(0))
//!     .unwrap();
//! assert_eq!(theme, "dark");
//! ```

use crate::core::{Backend, GenericUpdater, MigrationStep, StepTransaction, UpdateReport};
use crate::dialect::Dialect;
use crate::error::Error;
use crate::hooks::HookStage;
use crate::replacement::Replacement;
use crate::script::{DirectoryRepository, ScriptRepository};
use crate::version::SchemaVersion;
use rusqlite::{params, Connection, OptionalExtension, Transaction};
use std::path::Path;
use std::time::Duration;

/// Signature of SQLite pre and post update hooks.
pub type SqliteHook = dyn Fn(&Transaction<'_>) -> Result<(), Error> + Send + Sync;

/// Brings a SQLite database to a target [SchemaVersion] using scripts from a
/// [ScriptRepository].
#[derive(Debug)]
pub struct SqliteUpdater {
    updater: GenericUpdater<SqliteHook>,
    busy_timeout: Duration,
}

impl SqliteUpdater {
    pub fn new(
        repository: impl ScriptRepository + Send + Sync + 'static,
        target: SchemaVersion,
    ) -> Self {
        Self {
            updater: GenericUpdater::new(repository, target, Dialect::Sqlite),
            busy_timeout: Duration::from_secs(30),
        }
    }

    /// Create an updater for a script directory, targeting the version in its `version` file.
    pub fn from_directory(root: impl AsRef<Path>) -> Result<Self, Error> {
        let repository = DirectoryRepository::new(root.as_ref(), Dialect::Sqlite);
        let target = repository.target_version()?;
        Ok(Self::new(repository, target))
    }

    /// Set a custom name for the version table. Defaults to "version".
    pub fn with_version_table(mut self, name: impl Into<String>) -> Self {
        self.updater.version_table = name.into();
        self
    }

    /// Rewrite every statement with `replacement` before it is executed.
    /// Replacements apply in the order they are added.
    pub fn with_replacement(mut self, replacement: Replacement) -> Self {
        self.updater.replacements.push(replacement);
        self
    }

    pub fn with_replacements(mut self, replacements: impl IntoIterator<Item = Replacement>) -> Self {
        self.updater.replacements.extend(replacements);
        self
    }

    /// Set the busy timeout for SQLite database operations.
    /// This controls how long concurrent update attempts will wait for locks.
    /// Defaults to 30 seconds.
    pub fn with_busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = timeout;
        self
    }

    /// Run `hook` inside the transaction producing `version`, before its statements.
    pub fn pre_update_hook<F>(mut self, version: impl Into<SchemaVersion>, hook: F) -> Self
    where
        F: Fn(&Transaction<'_>) -> Result<(), Error> + Send + Sync + 'static,
    {
        self.updater
            .hooks
            .insert(HookStage::Pre, version.into(), Box::new(hook));
        self
    }

    /// Run `hook` inside the transaction producing `version`, after its statements.
    pub fn post_update_hook<F>(mut self, version: impl Into<SchemaVersion>, hook: F) -> Self
    where
        F: Fn(&Transaction<'_>) -> Result<(), Error> + Send + Sync + 'static,
    {
        self.updater
            .hooks
            .insert(HookStage::Post, version.into(), Box::new(hook));
        self
    }

    /// Set a callback to be invoked when a step starts.
    ///
    /// # Example
    /// ```
    /// use patchline::sqlite::SqliteUpdater;
    /// use patchline::{EmbeddedRepository, SchemaVersion};
    ///
    /// let updater = SqliteUpdater::new(EmbeddedRepository::new(), SchemaVersion::new(1, 0))
    ///     .on_step_start(|step| println!("Applying {}", step));
    /// ```
    pub fn on_step_start<F>(mut self, callback: F) -> Self
    where
        F: Fn(&MigrationStep) + Send + Sync + 'static,
    {
        self.updater.on_step_start = Some(Box::new(callback));
        self
    }

    /// Set a callback to be invoked when a step commits.
    /// The callback receives the step and how long it took.
    pub fn on_step_complete<F>(mut self, callback: F) -> Self
    where
        F: Fn(&MigrationStep, Duration) + Send + Sync + 'static,
    {
        self.updater.on_step_complete = Some(Box::new(callback));
        self
    }

    /// Set a callback to be invoked when a step fails and is rolled back.
    pub fn on_step_error<F>(mut self, callback: F) -> Self
    where
        F: Fn(&MigrationStep, &Error) + Send + Sync + 'static,
    {
        self.updater.on_step_error = Some(Box::new(callback));
        self
    }

    pub fn target(&self) -> SchemaVersion {
        self.updater.target
    }

    pub fn version_table(&self) -> &str {
        &self.updater.version_table
    }

    /// The recorded version, or `None` if the database was never set up.
    pub fn current_version(&self, conn: &mut Connection) -> Result<Option<SchemaVersion>, Error> {
        self.session(conn)?.stored_version()
    }

    /// The steps [run](Self::run) would apply. The database is not modified.
    pub fn preview(&self, conn: &mut Connection) -> Result<Vec<MigrationStep>, Error> {
        let mut session = self.session(conn)?;
        self.updater.preview(&mut session)
    }

    /// Bring the database to the target version.
    ///
    /// Each step commits on its own. If a step fails, the steps before it stay committed
    /// and the next run resumes from there.
    pub fn run(&self, conn: &mut Connection) -> Result<UpdateReport, Error> {
        let mut session = self.session(conn)?;
        self.updater.run(&mut session)
    }

    fn session<'a>(&'a self, conn: &'a mut Connection) -> Result<SqliteSession<'a>, Error> {
        // concurrent update attempts wait instead of failing immediately
        conn.busy_timeout(self.busy_timeout)?;
        Ok(SqliteSession {
            updater: &self.updater,
            conn,
        })
    }
}

struct SqliteSession<'a> {
    updater: &'a GenericUpdater<SqliteHook>,
    conn: &'a mut Connection,
}

impl Backend for SqliteSession<'_> {
    fn ensure_consistent(&mut self) -> Result<bool, Error> {
        let dialect = self.updater.dialect;
        let table = &self.updater.version_table;
        self.conn.execute(&dialect.create_version_table(table), [])?;

        #[cfg(feature = "tracing")]
        tracing::debug!(version_table = %table, "Ensured version table exists");

        Ok(self.stored_version()?.is_none())
    }

    fn stored_version(&mut self) -> Result<Option<SchemaVersion>, Error> {
        let dialect = self.updater.dialect;
        let table = &self.updater.version_table;

        let tables: i64 = self
            .conn
            .query_row(dialect.table_exists(), [table], |row| row.get(0))?;
        if tables == 0 {
            return Ok(None);
        }

        self.conn
            .query_row(&dialect.select_version(table), [], |row| {
                Ok(SchemaVersion::new(row.get(0)?, row.get(1)?))
            })
            .optional()
            .map_err(|e| Error::VersionUnreadable(e.to_string()))
    }

    fn apply_step(&mut self, step: &MigrationStep) -> Result<(), Error> {
        let tx = self.conn.transaction()?;
        self.updater.execute_step(
            &mut SqliteStep {
                tx: &tx,
                dialect: self.updater.dialect,
                version_table: &self.updater.version_table,
            },
            step,
        )?;
        tx.commit()?;
        Ok(())
    }
}

struct SqliteStep<'a, 'conn> {
    tx: &'a Transaction<'conn>,
    dialect: Dialect,
    version_table: &'a str,
}

impl StepTransaction for SqliteStep<'_, '_> {
    type Hook = SqliteHook;

    fn run_hook(&mut self, hook: &SqliteHook) -> Result<(), Error> {
        hook(self.tx)
    }

    fn execute(&mut self, statement: &str) -> Result<(), Error> {
        self.tx.execute_batch(statement)?;
        Ok(())
    }

    fn write_version(&mut self, version: SchemaVersion) -> Result<(), Error> {
        self.tx
            .execute(&self.dialect.delete_version(self.version_table), [])?;
        self.tx.execute(
            &self.dialect.insert_version(self.version_table),
            params![version.major, version.patch],
        )?;
        Ok(())
    }
}
