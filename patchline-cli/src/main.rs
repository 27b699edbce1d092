//! `patchline` command line runner.
//!
//! Applies a script directory to a database given by URL:
//!
//! ```text
//! DATABASE_URL=postgres://app@localhost/app patchline --scripts ./database upgrade
//! ```

mod cli;
mod commands;
mod session;

use clap::Parser;
use cli::{Cli, Commands};
use session::Session;
use tracing_subscriber::EnvFilter;

fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    // Parse args first so --help works without a database
    let cli = Cli::parse();
    init_tracing(cli.global.verbose);

    let mut out = std::io::stdout().lock();

    match cli.command {
        Commands::List => commands::list(&cli.global, &mut out),
        Commands::Status => commands::status(&mut Session::open(&cli.global)?, &mut out),
        Commands::Upgrade => commands::upgrade(&mut Session::open(&cli.global)?, &mut out),
        Commands::Preview => commands::preview(&mut Session::open(&cli.global)?, &mut out),
    }
}

/// Logs go to stderr so command output stays clean. `RUST_LOG` overrides the verbosity flag.
fn init_tracing(verbose: bool) {
    let default_filter = if verbose { "patchline=debug,info" } else { "warn,patchline=info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}
