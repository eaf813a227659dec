// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Blackboard commands
//!
//! - `democrite board push` - Build a board from a template and push records to it
//! - `democrite board template <file>` - Validate a template and show its rules
//!
//! Records files are YAML (or JSON) lists:
//!
//! ```yaml
//! - logical_type: reading
//!   display_name: sensor-1
//!   data: 21.5
//! ```

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Subcommand;
use colored::Colorize;
use serde::Deserialize;
use serde_json::Value;
use std::path::{Path, PathBuf};
use uuid::Uuid;

use democrite_core::application::DemocriteNode;
use democrite_core::domain::blackboard::record::RecordCustomMetadata;
use democrite_core::domain::blackboard::{BlackboardLifeStatus, BlackboardTemplate, DataRecordContainer, RecordStatus};
use democrite_core::domain::config::DemocriteConfig;

use crate::handlers::builtin_handlers;

#[derive(Subcommand)]
pub enum BoardCommand {
    /// Push records to a board built from a template
    Push {
        /// Blackboard template YAML file
        #[arg(long, short = 't', value_name = "FILE")]
        template: PathBuf,

        /// Records YAML/JSON file
        #[arg(long, short = 'r', value_name = "FILE")]
        records: PathBuf,

        /// Board name
        #[arg(long, short = 'b', default_value = "default")]
        board: String,

        /// Seal the board after pushing
        #[arg(long)]
        seal: bool,

        /// Output format (table, json)
        #[arg(long, short = 'o', default_value = "table")]
        output: String,
    },

    /// Validate a blackboard template
    Template {
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },
}

/// One entry of a records file.
#[derive(Debug, Deserialize)]
pub struct RecordInput {
    pub logical_type: String,
    #[serde(default)]
    pub uid: Option<Uuid>,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub data: Option<Value>,
    #[serde(default)]
    pub status: Option<RecordStatus>,
    #[serde(default)]
    pub custom_metadata: Option<RecordCustomMetadata>,
}

impl RecordInput {
    pub fn into_record(self) -> DataRecordContainer {
        let uid = self.uid.unwrap_or_else(Uuid::new_v4);
        let display_name = self.display_name.unwrap_or_else(|| uid.to_string());
        let mut record = DataRecordContainer::new(self.logical_type, uid, display_name, self.data, Utc::now());
        if let Some(status) = self.status {
            record.status = status;
        }
        record.custom_metadata = self.custom_metadata;
        record
    }
}

pub fn load_records(path: &Path) -> Result<Vec<DataRecordContainer>> {
    let content = std::fs::read_to_string(path).with_context(|| format!("Failed to read records file {:?}", path))?;
    let inputs: Vec<RecordInput> =
        serde_yaml::from_str(&content).with_context(|| format!("Failed to parse records file {:?}", path))?;
    Ok(inputs.into_iter().map(RecordInput::into_record).collect())
}

pub async fn handle_command(command: BoardCommand, config_override: Option<PathBuf>) -> Result<()> {
    match command {
        BoardCommand::Push {
            template,
            records,
            board,
            seal,
            output,
        } => push(config_override, &template, &records, &board, seal, &output).await,
        BoardCommand::Template { file } => describe_template(&file),
    }
}

async fn push(
    config_override: Option<PathBuf>,
    template_path: &Path,
    records_path: &Path,
    board_name: &str,
    seal: bool,
    output: &str,
) -> Result<()> {
    let config = DemocriteConfig::load_or_default(config_override).context("Failed to load configuration")?;
    let template = BlackboardTemplate::from_yaml_file(template_path)
        .with_context(|| format!("Failed to load template {:?}", template_path))?;
    let template_name = template.unique_template_name.clone();
    let records = load_records(records_path)?;

    let node = DemocriteNode::start(&config, builtin_handlers()).await?;
    node.blackboards.register_template(template).await?;
    let board = node.blackboards.get_board(board_name, &template_name).await?;

    let mut rejected = 0usize;
    if board.life_status().await? == BlackboardLifeStatus::WaitingInitialization {
        board.initialize(records).await.context("Board initialization failed")?;
    } else {
        for record in records {
            let uid = record.uid;
            if let Err(e) = board.push(record).await {
                rejected += 1;
                eprintln!("{} {} - {}", "✗".red(), uid, e);
            }
        }
    }

    if seal {
        board.seal().await.context("Failed to seal board")?;
    }

    let metadata = board.get_all_metadata(None, None).await?;
    if output == "json" {
        println!("{}", serde_json::to_string_pretty(&metadata)?);
    } else {
        println!("{} {}", "Board:".bold(), board.id());
        println!("  Status: {}", board.life_status().await?);
        println!("  Records: {}", metadata.len());
        for entry in &metadata {
            println!(
                "    {} {} {} [{}]",
                entry.uid.to_string().dimmed(),
                entry.logical_type.cyan(),
                entry.display_name,
                entry.status
            );
        }
        if rejected > 0 {
            println!("  {}", format!("{} record(s) rejected", rejected).yellow());
        }
    }

    node.shutdown();
    Ok(())
}

fn describe_template(path: &Path) -> Result<()> {
    let template = BlackboardTemplate::from_yaml_file(path).with_context(|| format!("Failed to load template {:?}", path))?;
    template.validate().context("Template validation failed")?;

    println!("{} {}", "Template:".bold(), template.unique_template_name);
    println!("  UID: {}", template.uid);
    println!("  Initialization required: {}", template.configuration.initialization_required);
    for (pattern, rules) in template.rules_by_pattern() {
        let kinds: Vec<&str> = rules.iter().map(|r| r.kind_name()).collect();
        println!("  {} {}", pattern.cyan(), kinds.join(", "));
    }
    println!("{}", "✓ Template is valid".green());
    Ok(())
}
