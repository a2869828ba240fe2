// SPDX-FileCopyrightText: 2026 Strata Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Strata - chat backend over workspace model serving.
//!
//! Binary entry point: parses the CLI, loads configuration, and runs
//! the server.

use clap::{Parser, Subcommand};

mod serve;

/// Strata chat backend.
#[derive(Parser, Debug)]
#[command(name = "strata", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the Strata API server (the default).
    Serve,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match strata_config::load_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("strata: invalid configuration: {e}");
            std::process::exit(1);
        }
    };

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => {
            if let Err(e) = serve::run(config).await {
                eprintln!("strata: {e}");
                std::process::exit(1);
            }
        }
    }
}
