use crate::core::MigrationStep;
use crate::hooks::HookStage;
use crate::version::SchemaVersion;
use std::path::PathBuf;

/// Error type for the patchline crate.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[cfg(feature = "sqlite")]
    #[error("{0}")]
    Rusqlite(rusqlite::Error),
    #[cfg(feature = "mysql")]
    #[error("{0}")]
    Mysql(String),
    #[cfg(feature = "postgres")]
    #[error("{0}")]
    Postgres(#[from] postgres::Error),

    /// The recorded version is newer than the newest version the application knows.
    #[error("Database version is ahead. Newest known version is {target} but got {current}.")]
    VersionAhead {
        current: SchemaVersion,
        target: SchemaVersion,
    },
    #[error("No setup script found for major version {0}")]
    MissingSetupScript(u32),
    #[error("No patch script found for version {major}.{patch}")]
    MissingPatchScript { major: u32, patch: u32 },
    #[error("No migration script found for major version {0}")]
    MissingMigrateScript(u32),
    #[error("Could not retrieve database version: {0}")]
    VersionUnreadable(String),

    #[error("Failed to execute statement: {statement}")]
    StatementExecution {
        statement: String,
        #[source]
        source: Box<Error>,
    },
    #[error("Failed to change database version to {version}")]
    VersionPersistence {
        version: SchemaVersion,
        #[source]
        source: Box<Error>,
    },
    #[error("{stage} update hook for version {version} failed")]
    Hook {
        stage: HookStage,
        version: SchemaVersion,
        #[source]
        source: Box<Error>,
    },
    #[error("Database update failed while applying {step}")]
    MigrationFailed {
        step: MigrationStep,
        #[source]
        source: Box<Error>,
    },

    #[error("Failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid version '{0}'. Expected the format Major.Patch")]
    InvalidVersion(String),
    #[error("Invalid replacement pattern: {0}")]
    InvalidReplacement(#[from] regex::Error),
    #[error("Unknown database dialect '{0}'")]
    UnknownDialect(String),
    #[error("{0}")]
    Generic(String),
}

impl Error {
    /// The innermost error, following `StatementExecution`, `VersionPersistence`,
    /// `Hook` and `MigrationFailed` wrappers.
    pub fn root_cause(&self) -> &Error {
        match self {
            Error::StatementExecution { source, .. }
            | Error::VersionPersistence { source, .. }
            | Error::Hook { source, .. }
            | Error::MigrationFailed { source, .. } => source.root_cause(),
            other => other,
        }
    }
}

#[cfg(feature = "sqlite")]
impl From<rusqlite::Error> for Error {
    fn from(value: rusqlite::Error) -> Self {
        Self::Rusqlite(value)
    }
}

#[cfg(feature = "mysql")]
impl From<mysql::Error> for Error {
    fn from(value: mysql::Error) -> Self {
        Self::Mysql(value.to_string())
    }
}

impl From<String> for Error {
    fn from(value: String) -> Self {
        Self::Generic(value)
    }
}

impl From<&str> for Error {
    fn from(value: &str) -> Self {
        Self::Generic(value.to_string())
    }
}
