//! CLI argument definitions using clap derive API

use clap::{Args, Parser, Subcommand};
use patchline::{Dialect, SchemaVersion, DEFAULT_VERSION_TABLE_NAME};
use std::path::PathBuf;

/// Keep a database schema up to date from versioned SQL scripts
#[derive(Parser, Debug)]
#[command(name = "patchline")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Commands,
}

/// Arguments available to all commands
#[derive(Args, Debug, Clone)]
pub struct GlobalArgs {
    /// Database connection URL, e.g. postgres://user:pw@host/db, mysql://..., sqlite://app.db
    #[arg(long, global = true, env = "DATABASE_URL", hide_env_values = true)]
    pub database_url: Option<String>,

    /// Root directory of the scripts, containing one subdirectory per dialect
    #[arg(short, long, global = true, env = "PATCHLINE_SCRIPTS", default_value = "database")]
    pub scripts: PathBuf,

    /// SQL dialect of the scripts. Inferred from the database URL when omitted
    #[arg(short, long, global = true, value_parser = parse_dialect)]
    pub dialect: Option<Dialect>,

    /// Version to update to. Defaults to the contents of <scripts>/version
    #[arg(short, long, global = true, value_parser = parse_version)]
    pub target: Option<SchemaVersion>,

    /// Name of the table holding the current version
    #[arg(long, global = true, default_value = DEFAULT_VERSION_TABLE_NAME)]
    pub version_table: String,

    /// PostgreSQL schema to create if missing. May be repeated
    #[arg(long = "schema", global = true)]
    pub schemas: Vec<String>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Commands {
    /// Show the current and target version (requires database)
    Status,
    /// Apply pending scripts (requires database)
    Upgrade,
    /// List the scripts an upgrade would apply, without running them (requires database)
    Preview,
    /// List the scripts available for the dialect (no database required)
    List,
}

fn parse_dialect(value: &str) -> Result<Dialect, String> {
    value.parse().map_err(|e: patchline::Error| e.to_string())
}

fn parse_version(value: &str) -> Result<SchemaVersion, String> {
    value.parse().map_err(|e: patchline::Error| e.to_string())
}
