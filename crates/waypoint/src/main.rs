// SPDX-FileCopyrightText: 2026 Waypoint Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Waypoint - travel-lifestyle recommendations.
//!
//! This is the binary entry point and composition root.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

mod commands;
mod services;
mod telemetry;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Waypoint - travel-lifestyle recommendations.
#[derive(Parser, Debug)]
#[command(name = "waypoint", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the HTTP server.
    Serve,
    /// Import the images listed in a JSON manifest.
    Ingest {
        /// Path to the manifest file.
        manifest: PathBuf,
    },
    /// Record a solved problem in the knowledge store.
    Remember {
        /// Problem and solution, as free text.
        text: String,
        /// Extra JSON metadata stored with the entry.
        #[arg(long)]
        metadata: Option<String>,
    },
    /// Search the knowledge store.
    Recall {
        query: String,
        /// Minimum similarity, 0 to 1.
        #[arg(long)]
        threshold: Option<f32>,
        /// Maximum number of entries.
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Write a design log if the event is a milestone.
    Milestone {
        summary: String,
        /// JSON snapshot recorded with the log.
        #[arg(long)]
        state: Option<String>,
    },
    /// Load and validate configuration, then check secrets.
    CheckConfig,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match waypoint_config::load_and_validate() {
        Ok(config) => config,
        Err(errors) => {
            waypoint_config::render_errors(&errors);
            std::process::exit(1);
        }
    };

    telemetry::init_tracing(&config.server.log_level);

    if let Commands::CheckConfig = cli.command {
        std::process::exit(commands::check_config(&config));
    }

    let secrets = match waypoint_config::require_secrets(&config) {
        Ok(secrets) => secrets,
        Err(errors) => {
            waypoint_config::render_errors(&errors);
            std::process::exit(1);
        }
    };

    let result = match cli.command {
        Commands::Serve => commands::serve(&config, &secrets).await,
        Commands::Ingest { manifest } => commands::ingest(&config, &secrets, &manifest).await,
        Commands::Remember { text, metadata } => {
            commands::remember(&config, &secrets, &text, metadata.as_deref()).await
        }
        Commands::Recall {
            query,
            threshold,
            limit,
        } => commands::recall(&config, &secrets, &query, threshold, limit).await,
        Commands::Milestone { summary, state } => {
            commands::milestone(&config, &secrets, &summary, state.as_deref()).await
        }
        Commands::CheckConfig => Ok(()),
    };

    if let Err(e) = result {
        tracing::error!(kind = %e.kind(), error = %e, "command failed");
        eprintln!("waypoint: {e}");
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[cfg(not(target_env = "msvc"))]
    fn jemalloc_is_active() {
        use tikv_jemalloc_ctl::{epoch, stats};
        epoch::advance().unwrap();
        let allocated = stats::allocated::read().unwrap();
        assert!(allocated > 0, "jemalloc should report non-zero allocation");
    }

    #[test]
    fn cli_parses_recall_flags() {
        let cli = Cli::try_parse_from([
            "waypoint",
            "recall",
            "emoji crash",
            "--threshold",
            "0.7",
            "--limit",
            "3",
        ])
        .unwrap();
        match cli.command {
            Commands::Recall {
                query,
                threshold,
                limit,
            } => {
                assert_eq!(query, "emoji crash");
                assert_eq!(threshold, Some(0.7));
                assert_eq!(limit, Some(3));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn cli_parses_subcommands() {
        assert!(matches!(
            Cli::try_parse_from(["waypoint", "serve"]).unwrap().command,
            Commands::Serve
        ));
        assert!(matches!(
            Cli::try_parse_from(["waypoint", "check-config"]).unwrap().command,
            Commands::CheckConfig
        ));
        match Cli::try_parse_from(["waypoint", "ingest", "media.json"]).unwrap().command {
            Commands::Ingest { manifest } => assert_eq!(manifest, PathBuf::from("media.json")),
            other => panic!("unexpected command {other:?}"),
        }
        assert!(Cli::try_parse_from(["waypoint"]).is_err());
        assert!(Cli::try_parse_from(["waypoint", "ingest"]).is_err());
    }

    #[test]
    fn binary_loads_config_defaults() {
        let config = waypoint_config::load_and_validate_str("").expect("default config should be valid");
        assert_eq!(config.server.rate_limit_per_minute, 10);
    }
}
