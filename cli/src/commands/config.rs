// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Configuration management commands
//!
//! Commands: show, validate, generate

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;
use std::path::PathBuf;

use democrite_core::domain::config::DemocriteConfig;

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Show config file paths checked
        #[arg(long)]
        paths: bool,
    },

    /// Validate configuration file
    Validate {
        /// Path to config file (default: discover)
        #[arg(value_name = "FILE")]
        file: Option<PathBuf>,
    },

    /// Write the default configuration to a file
    Generate {
        /// Output path
        #[arg(short, long, default_value = "./democrite-config.yaml")]
        output: PathBuf,
    },
}

pub async fn handle_command(command: ConfigCommand, config_override: Option<PathBuf>) -> Result<()> {
    match command {
        ConfigCommand::Show { paths } => show(config_override, paths),
        ConfigCommand::Validate { file } => validate(file.or(config_override)),
        ConfigCommand::Generate { output } => generate(output),
    }
}

fn show(config_override: Option<PathBuf>, show_paths: bool) -> Result<()> {
    let config = DemocriteConfig::load_or_default(config_override.clone()).context("Failed to load configuration")?;

    if show_paths {
        println!("{}", "Configuration discovery paths:".bold());
        match &config_override {
            Some(path) => println!("  1. --config flag: {}", path.display()),
            None => println!("  1. --config flag: {}", "(not set)".dimmed()),
        }
        println!(
            "  2. DEMOCRITE_CONFIG_PATH: {}",
            std::env::var("DEMOCRITE_CONFIG_PATH")
                .unwrap_or_else(|_| "(not set)".to_string())
                .dimmed()
        );
        println!("  3. ./democrite-config.yaml");
        println!("  4. ~/.democrite/config.yaml");
        println!();
    }

    let spec = &config.spec;
    println!("{}", "Current configuration:".bold());
    println!();
    println!("{}", "Node:".bold());
    println!("  Name: {}", config.metadata.name);
    if let Some(version) = &config.metadata.version {
        println!("  Version: {}", version);
    }
    println!();

    println!("{}", "Storage:".bold());
    println!("  Backend: {:?}", spec.storage.backend);
    println!(
        "  Database URL: {}",
        if spec.storage.database_url.is_some() {
            "(set)".to_string()
        } else {
            "(none)".dimmed().to_string()
        }
    );
    println!();

    println!("{}", "Runtime:".bold());
    println!("  Event bus capacity: {}", spec.event_bus.capacity);
    println!("  Max command depth: {}", spec.runtime.max_command_depth);
    println!(
        "  Sequence state storage: {}",
        if spec.runtime.block_sequence_state_storage {
            "blocked"
        } else {
            "enabled"
        }
    );
    println!();

    let controller = &spec.blackboard.default_controller;
    println!("{}", "Blackboard defaults:".bold());
    println!(
        "  Limit resolution: {}",
        controller
            .limit_resolution_preference
            .map(|p| format!("{:?}", p))
            .unwrap_or_else(|| "reject".to_string())
    );
    println!(
        "  Remove resolution: {}",
        controller
            .remove_resolution_preference
            .map(|p| format!("{:?}", p))
            .unwrap_or_else(|| "remove".to_string())
    );

    Ok(())
}

fn validate(config_path: Option<PathBuf>) -> Result<()> {
    println!("Validating configuration...");

    let config = DemocriteConfig::load_or_default(config_path).context("Failed to load configuration")?;
    config.validate().context("Configuration validation failed")?;

    println!("{}", "✓ Configuration is valid".green());
    Ok(())
}

fn generate(output: PathBuf) -> Result<()> {
    DemocriteConfig::default()
        .to_yaml_file(&output)
        .with_context(|| format!("Failed to write config to {:?}", output))?;

    println!("{}", format!("✓ Configuration generated: {}", output.display()).green());
    Ok(())
}
