#![cfg_attr(docsrs, feature(doc_cfg))]
//! `patchline` keeps a database schema at the version an application expects, using plain
//! SQL scripts organized by major version line and patch level.
//!
//! Core concepts:
//! - A [SchemaVersion] is a `major.patch` pair. The database records its current version in
//!   a single-row version table.
//! - Each major line has a `setup.sql` creating it from scratch, numbered patch scripts
//!   advancing it one patch at a time, and optionally a `migration.sql` turning the end of
//!   the line into the start of the next one.
//! - An empty database is set up directly at the target major. An existing database is
//!   patched forward, crossing major lines through their migration scripts. See [plan].
//! - Every script runs in its own transaction together with the version change it causes,
//!   so a failure never leaves a half-applied step recorded as done.
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
//!     .patch(1, 1, "ALTER TABLE users ADD COLUMN email TEXT;")
//!     .migration(1, "ALTER TABLE users RENAME TO accounts;")
//!     .setup(2, "CREATE TABLE accounts (id INTEGER PRIMARY KEY, name TEXT, email TEXT);");
//!
//! // an older release of the application set the database up at 1.0
//! let mut conn = Connection::open_in_memory().unwrap();
//! SqliteUpdater::new(repo.clone(), SchemaVersion::new(1, 0))
//!     .run(&mut conn)
//!     .unwrap();
//!
//! // the current release expects 2.0
//! let report = SqliteUpdater::new(repo, SchemaVersion::new(2, 0))
//!     .run(&mut conn)
//!     .unwrap();
//! assert_eq!(report.previous_version, Some(SchemaVersion::new(1, 0)));
//! assert_eq!(
//!     report.steps_applied,
//!     vec![SchemaVersion::new(1, 1), SchemaVersion::new(2, 0)]
//! );
//! ```
//!
//! # Script layout
//!
//! [DirectoryRepository] reads scripts from `<root>/<dialect>/<major>/`, and the target
//! version from `<root>/version`. [EmbeddedRepository] holds scripts in memory, usually
//! compiled in with `include_str!`. Any other source can implement [ScriptRepository].
//!
//! # Features
//! - Pre and post update hooks per version, running inside the step's transaction.
//! - Regex [Replacement]s applied to every statement.
//! - `DELIMITER` aware statement [splitting](splitter).
//! - Preview of pending steps.
//! - Observability callbacks.
//! - Tracing integration = available with the `tracing` feature flag.
//! - Testing utilities - available with the `testing` feature flag.
//!
//! # Database support
//!
//! - [`SQLite`](sqlite) - available with the `sqlite` feature flag.
//! - [`MySQL and MariaDB`](mysql) - available with the `mysql` feature flag.
//! - [`PostgreSQL`](postgres) - available with the `postgres` feature flag.

mod core;
pub use core::{MigrationStep, UpdateReport};

mod dialect;
pub use dialect::{Dialect, DEFAULT_VERSION_TABLE_NAME};

mod error;
pub use error::Error;

mod hooks;
pub use hooks::{HookRegistry, HookStage};

mod plan;
pub use plan::plan;

mod replacement;
pub use replacement::Replacement;

mod script;
pub use script::{DirectoryRepository, EmbeddedRepository, ScriptKind, ScriptRepository};

pub mod splitter;

mod version;
pub use version::SchemaVersion;

#[cfg(feature = "sqlite")]
#[cfg_attr(docsrs, doc(cfg(feature = "sqlite")))]
pub mod sqlite;

#[cfg(feature = "mysql")]
#[cfg_attr(docsrs, doc(cfg(feature = "mysql")))]
pub mod mysql;

#[cfg(feature = "postgres")]
#[cfg_attr(docsrs, doc(cfg(feature = "postgres")))]
pub mod postgres;

#[cfg(feature = "testing")]
#[cfg_attr(docsrs, doc(cfg(feature = "testing")))]
pub mod testing;

#[cfg(all(test, feature = "mysql"))]
pub(crate) mod test_mysql;

#[cfg(all(test, feature = "postgres"))]
pub(crate) mod test_postgres;
