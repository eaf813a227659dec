// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! # Democrite CLI
//!
//! The `democrite` binary hosts the blackboard engine and the sequence
//! executor in-process.
//!
//! ## Commands
//!
//! - `democrite config show|validate|generate` - Configuration management
//! - `democrite board push|template` - Build a board from a YAML template and push records
//! - `democrite sequence run|validate|handlers` - Run YAML sequence definitions

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;

use democrite_cli::commands::{self, BoardCommand, ConfigCommand, SequenceCommand};

/// Democrite - blackboard coordination and sequence execution
#[derive(Parser)]
#[command(name = "democrite")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to configuration file (overrides discovery)
    #[arg(
        short,
        long,
        global = true,
        env = "DEMOCRITE_CONFIG_PATH",
        value_name = "FILE"
    )]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, env = "DEMOCRITE_LOG_LEVEL", default_value = "warn")]
    log_level: String,

    /// Log output format (text, json)
    #[arg(long, global = true, env = "DEMOCRITE_LOG_FORMAT", default_value = "text")]
    log_format: String,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Configuration management
    #[command(name = "config")]
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },

    /// Blackboard operations
    #[command(name = "board")]
    Board {
        #[command(subcommand)]
        command: BoardCommand,
    },

    /// Sequence operations
    #[command(name = "sequence")]
    Sequence {
        #[command(subcommand)]
        command: SequenceCommand,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(&cli.log_level, &cli.log_format)?;

    match cli.command {
        Some(Commands::Config { command }) => commands::config::handle_command(command, cli.config).await,
        Some(Commands::Board { command }) => commands::board::handle_command(command, cli.config).await,
        Some(Commands::Sequence { command }) => commands::sequence::handle_command(command, cli.config).await,
        None => {
            eprintln!("{}", "No command specified. Use --help for usage.".yellow());
            std::process::exit(1);
        }
    }
}

/// Initialize tracing subscriber for logging. `RUST_LOG` wins over `--log-level`.
fn init_logging(level: &str, format: &str) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(level))
        .context("Failed to create log filter")?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false);

    match format {
        "json" => builder.json().init(),
        _ => builder.compact().init(),
    }

    Ok(())
}
