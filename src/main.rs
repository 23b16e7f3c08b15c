//! soxframe CLI
//!
//! Command-line interface for the soxframe streaming frame reader.

use clap::Parser;
use env_logger::Env;
use log::debug;

use soxframe::cli::{commands, Cli, Commands};

fn main() {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(Env::default().default_filter_or(default_filter)).init();

    debug!("soxframe v{}", env!("CARGO_PKG_VERSION"));

    let result = match cli.command {
        Commands::Frames { path, stream, json } => commands::frames(&path, &stream, json),
        Commands::Info { path, json } => commands::info(&path, json),
        Commands::Check => commands::check(),
    };

    if let Err(e) = result {
        eprintln!("error [{}]: {}", e.error_code(), e);
        for suggestion in e.recovery_suggestions() {
            eprintln!("  - {}", suggestion);
        }
        std::process::exit(1);
    }
}
