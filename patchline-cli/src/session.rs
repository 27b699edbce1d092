//! Connecting to the database named by the URL and pairing it with the matching updater.

use crate::cli::GlobalArgs;
use patchline::{Dialect, DirectoryRepository, MigrationStep, SchemaVersion, UpdateReport};
use std::error::Error;

#[cfg(not(any(feature = "sqlite", feature = "postgres", feature = "mysql")))]
compile_error!("enable at least one of the `sqlite`, `postgres` or `mysql` features");

/// Dialect implied by a connection URL.
///
/// Anything without a recognized scheme is taken to be a SQLite file path.
pub fn infer_dialect(url: &str) -> Dialect {
    let scheme = url.split_once("://").map(|(scheme, _)| scheme.to_ascii_lowercase());
    match scheme.as_deref() {
        Some("postgres" | "postgresql") => Dialect::Postgres,
        Some("mysql") => Dialect::Mysql,
        Some("mariadb") => Dialect::MariaDb,
        _ => Dialect::Sqlite,
    }
}

/// The dialect to use: explicit if given, otherwise inferred from the URL.
pub fn resolve_dialect(args: &GlobalArgs) -> Result<Dialect, Box<dyn Error>> {
    match (args.dialect, args.database_url.as_deref()) {
        (Some(dialect), _) => Ok(dialect),
        (None, Some(url)) => Ok(infer_dialect(url)),
        (None, None) => Err("cannot determine the dialect: pass --dialect or --database-url".into()),
    }
}

/// Filesystem path of a SQLite URL, accepting `sqlite://path`, `sqlite:path` and bare paths.
#[cfg_attr(not(feature = "sqlite"), allow(dead_code))]
pub fn sqlite_path(url: &str) -> &str {
    url.strip_prefix("sqlite://")
        .or_else(|| url.strip_prefix("sqlite:"))
        .unwrap_or(url)
}

/// The mysql driver only understands the `mysql://` scheme.
#[cfg_attr(not(feature = "mysql"), allow(dead_code))]
fn mysql_url(url: &str) -> String {
    match url.strip_prefix("mariadb://") {
        Some(rest) => format!("mysql://{rest}"),
        None => url.to_string(),
    }
}

/// A database connection together with the updater driving it.
pub enum Session {
    #[cfg(feature = "sqlite")]
    Sqlite {
        updater: patchline::sqlite::SqliteUpdater,
        conn: rusqlite::Connection,
    },
    #[cfg(feature = "postgres")]
    Postgres {
        updater: patchline::postgres::PostgresUpdater,
        client: postgres::Client,
    },
    #[cfg(feature = "mysql")]
    Mysql {
        updater: patchline::mysql::MysqlUpdater,
        conn: mysql::Conn,
    },
}

impl Session {
    pub fn open(args: &GlobalArgs) -> Result<Self, Box<dyn Error>> {
        let url = args
            .database_url
            .as_deref()
            .ok_or("no database URL: pass --database-url or set DATABASE_URL")?;
        let dialect = resolve_dialect(args)?;
        let repository = DirectoryRepository::new(&args.scripts, dialect);
        let target = match args.target {
            Some(target) => target,
            None => repository.target_version()?,
        };

        tracing::debug!(%dialect, %target, scripts = %args.scripts.display(), "Opening session");

        match dialect {
            #[cfg(feature = "sqlite")]
            Dialect::Sqlite => {
                let conn = rusqlite::Connection::open(sqlite_path(url))?;
                let updater = patchline::sqlite::SqliteUpdater::new(repository, target)
                    .with_version_table(&args.version_table);
                Ok(Session::Sqlite { updater, conn })
            }
            #[cfg(feature = "postgres")]
            Dialect::Postgres => {
                let client = postgres::Client::connect(url, postgres::NoTls)?;
                let updater = patchline::postgres::PostgresUpdater::new(repository, target)
                    .with_version_table(&args.version_table)
                    .with_schemas(&args.schemas);
                Ok(Session::Postgres { updater, client })
            }
            #[cfg(feature = "mysql")]
            Dialect::Mysql | Dialect::MariaDb => {
                let opts = mysql::Opts::from_url(&mysql_url(url))?;
                let conn = mysql::Conn::new(opts)?;
                let updater = patchline::mysql::MysqlUpdater::new(repository, target)
                    .with_dialect(dialect)?
                    .with_version_table(&args.version_table);
                Ok(Session::Mysql { updater, conn })
            }
            #[allow(unreachable_patterns)]
            other => Err(format!(
                "support for {other} is not compiled in; rebuild with the matching feature"
            )
            .into()),
        }
    }

    pub fn target(&self) -> SchemaVersion {
        match self {
            #[cfg(feature = "sqlite")]
            Session::Sqlite { updater, .. } => updater.target(),
            #[cfg(feature = "postgres")]
            Session::Postgres { updater, .. } => updater.target(),
            #[cfg(feature = "mysql")]
            Session::Mysql { updater, .. } => updater.target(),
        }
    }

    pub fn current_version(&mut self) -> Result<Option<SchemaVersion>, patchline::Error> {
        match self {
            #[cfg(feature = "sqlite")]
            Session::Sqlite { updater, conn } => updater.current_version(conn),
            #[cfg(feature = "postgres")]
            Session::Postgres { updater, client } => updater.current_version(client),
            #[cfg(feature = "mysql")]
            Session::Mysql { updater, conn } => updater.current_version(conn),
        }
    }

    pub fn preview(&mut self) -> Result<Vec<MigrationStep>, patchline::Error> {
        match self {
            #[cfg(feature = "sqlite")]
            Session::Sqlite { updater, conn } => updater.preview(conn),
            #[cfg(feature = "postgres")]
            Session::Postgres { updater, client } => updater.preview(client),
            #[cfg(feature = "mysql")]
            Session::Mysql { updater, conn } => updater.preview(conn),
        }
    }

    pub fn run(&mut self) -> Result<UpdateReport, patchline::Error> {
        match self {
            #[cfg(feature = "sqlite")]
            Session::Sqlite { updater, conn } => updater.run(conn),
            #[cfg(feature = "postgres")]
            Session::Postgres { updater, client } => updater.run(client),
            #[cfg(feature = "mysql")]
            Session::Mysql { updater, conn } => updater.run(conn),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::Cli;
    use clap::Parser;

    #[test]
    fn dialect_from_url_scheme() {
        assert_eq!(infer_dialect("postgres://u:p@localhost/app"), Dialect::Postgres);
        assert_eq!(infer_dialect("postgresql://localhost/app"), Dialect::Postgres);
        assert_eq!(infer_dialect("mysql://root@localhost/app"), Dialect::Mysql);
        assert_eq!(infer_dialect("MariaDB://root@localhost/app"), Dialect::MariaDb);
        assert_eq!(infer_dialect("sqlite://app.db"), Dialect::Sqlite);
        assert_eq!(infer_dialect("sqlite:app.db"), Dialect::Sqlite);
        assert_eq!(infer_dialect("/var/lib/app/app.db"), Dialect::Sqlite);
    }

    #[test]
    fn explicit_dialect_wins() {
        let cli = Cli::try_parse_from([
            "patchline",
            "status",
            "--database-url",
            "mysql://root@localhost/app",
            "--dialect",
            "mariadb",
        ])
        .unwrap();
        assert_eq!(resolve_dialect(&cli.global).unwrap(), Dialect::MariaDb);
    }

    #[test]
    fn dialect_required_without_url() {
        let mut cli = Cli::try_parse_from(["patchline", "list"]).unwrap();
        cli.global.database_url = None;
        assert!(resolve_dialect(&cli.global).is_err());
    }

    #[test]
    fn sqlite_paths() {
        assert_eq!(sqlite_path("sqlite://data/app.db"), "data/app.db");
        assert_eq!(sqlite_path("sqlite:app.db"), "app.db");
        assert_eq!(sqlite_path(":memory:"), ":memory:");
    }

    #[test]
    fn mariadb_url_rewritten_for_driver() {
        assert_eq!(mysql_url("mariadb://root@db/app"), "mysql://root@db/app");
        assert_eq!(mysql_url("mysql://root@db/app"), "mysql://root@db/app");
    }
}
