// SPDX-FileCopyrightText: 2026 PrepodavAI Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! PrepodavAI - credit-metered generation of teaching materials.
//!
//! This is the binary entry point: the API server, the worker process and
//! operator commands.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

mod admin;
mod serve;
mod status;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// PrepodavAI - credit-metered generation of teaching materials.
#[derive(Parser, Debug)]
#[command(name = "prepodavai", version, about, long_about = None)]
struct Cli {
    /// Read configuration from this file instead of the XDG hierarchy.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the API server (plus workers when `queue.embedded_workers`).
    Serve,
    /// Run a worker process only.
    Worker,
    /// Grant credits to a user.
    Grant {
        #[arg(long)]
        user: String,
        #[arg(long)]
        amount: i64,
        #[arg(long, default_value = "manual grant")]
        description: String,
    },
    /// Show a generation request.
    Status {
        request_id: String,
        /// Output JSON instead of text.
        #[arg(long)]
        json: bool,
    },
    /// Fail and refund stale pending requests once.
    Sweep,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let loaded = match &cli.config {
        Some(path) => prepodavai_config::load_and_validate_path(path),
        None => prepodavai_config::load_and_validate(),
    };
    let config = match loaded {
        Ok(config) => config,
        Err(errors) => {
            prepodavai_config::render_errors(&errors);
            std::process::exit(1);
        }
    };

    let result = match cli.command {
        Some(Commands::Serve) => serve::run_serve(config).await,
        Some(Commands::Worker) => serve::run_worker(config).await,
        Some(Commands::Grant {
            user,
            amount,
            description,
        }) => admin::run_grant(&config, &user, amount, &description).await,
        Some(Commands::Status { request_id, json }) => {
            status::run_status(&config, &request_id, json).await
        }
        Some(Commands::Sweep) => admin::run_sweep(&config).await,
        None => {
            println!("prepodavai: use --help for available commands");
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_parses_grant() {
        let cli = Cli::try_parse_from([
            "prepodavai",
            "grant",
            "--user",
            "u1",
            "--amount",
            "50",
        ])
        .unwrap();
        match cli.command {
            Some(Commands::Grant {
                user,
                amount,
                description,
            }) => {
                assert_eq!(user, "u1");
                assert_eq!(amount, 50);
                assert_eq!(description, "manual grant");
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn cli_parses_status_with_config() {
        let cli = Cli::try_parse_from([
            "prepodavai",
            "--config",
            "/tmp/p.toml",
            "status",
            "req-1",
            "--json",
        ])
        .unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/p.toml")));
        assert!(matches!(
            cli.command,
            Some(Commands::Status { json: true, .. })
        ));
    }

    #[test]
    fn binary_loads_config_defaults() {
        let config =
            prepodavai_config::load_and_validate_str("").expect("default config should be valid");
        assert_eq!(config.queue.max_attempts, 3);
    }
}
