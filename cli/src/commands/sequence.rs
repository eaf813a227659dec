// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Sequence commands
//!
//! - `democrite sequence run --definition <file>...` - Run a sequence to completion
//! - `democrite sequence validate <file>` - Parse and validate a definition
//! - `democrite sequence handlers` - List the built-in stage handlers
//!
//! Every `--definition` is registered so nested sequence calls can reach
//! each other; the first one (or `--sequence`) is executed.

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use tracing::warn;
use uuid::Uuid;

use democrite_core::application::{DemocriteNode, ExecutionOptions};
use democrite_core::domain::config::DemocriteConfig;
use democrite_core::domain::events::SequenceEvent;
use democrite_core::domain::sequence::{SequenceDefinition, StageKind};

use crate::handlers::builtin_handlers;

#[derive(Subcommand)]
pub enum SequenceCommand {
    /// Execute a sequence definition
    Run {
        /// Sequence definition YAML file (repeatable)
        #[arg(long = "definition", short = 'd', value_name = "FILE", required = true)]
        definitions: Vec<PathBuf>,

        /// Uid of the definition to run (default: the first file)
        #[arg(long, value_name = "UUID")]
        sequence: Option<Uuid>,

        /// Input (JSON string)
        #[arg(long, short = 'i', value_name = "JSON")]
        input: Option<String>,

        /// Resume or name the execution instance
        #[arg(long, value_name = "UUID")]
        instance: Option<Uuid>,

        /// Print stage events
        #[arg(long)]
        trace: bool,
    },

    /// Validate a sequence definition file
    Validate {
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },

    /// List built-in stage handlers
    Handlers,
}

pub async fn handle_command(command: SequenceCommand, config_override: Option<PathBuf>) -> Result<()> {
    match command {
        SequenceCommand::Run {
            definitions,
            sequence,
            input,
            instance,
            trace,
        } => run(config_override, &definitions, sequence, input.as_deref(), instance, trace).await,
        SequenceCommand::Validate { file } => validate(&file),
        SequenceCommand::Handlers => {
            for name in builtin_handlers().names() {
                println!("{}", name);
            }
            Ok(())
        }
    }
}

pub fn parse_input(input: Option<&str>) -> Result<Value> {
    match input {
        Some(raw) => serde_json::from_str(raw).context("Input must be valid JSON"),
        None => Ok(Value::Null),
    }
}

fn load_definition(path: &Path) -> Result<SequenceDefinition> {
    SequenceDefinition::from_yaml_file(path).with_context(|| format!("Failed to load sequence definition {:?}", path))
}

async fn run(
    config_override: Option<PathBuf>,
    definition_paths: &[PathBuf],
    sequence: Option<Uuid>,
    input: Option<&str>,
    instance: Option<Uuid>,
    trace: bool,
) -> Result<()> {
    let config = DemocriteConfig::load_or_default(config_override).context("Failed to load configuration")?;
    let input = parse_input(input)?;

    let node = DemocriteNode::start(&config, builtin_handlers()).await?;
    let mut registered = Vec::with_capacity(definition_paths.len());
    for path in definition_paths {
        registered.push(node.sequences.register_definition(load_definition(path)?).await?);
    }
    let sequence_id = sequence
        .or_else(|| registered.first().copied())
        .context("No sequence definition given")?;

    let instance_id = instance.unwrap_or_else(Uuid::new_v4);
    let mut events = node.event_bus.subscribe_sequence(instance_id);
    let options = ExecutionOptions {
        instance_id: Some(instance_id),
        ..Default::default()
    };

    let cancel = CancellationToken::new();
    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling sequence");
            interrupt.cancel();
        }
    });

    let outcome = node.sequences.execute(sequence_id, input, options, &cancel).await;

    if trace {
        while let Ok(event) = events.try_recv() {
            print_event(&event);
        }
    }
    node.shutdown();

    let result = outcome.with_context(|| format!("Sequence {} failed (instance {})", sequence_id, instance_id))?;
    println!("{}", serde_json::to_string_pretty(&result.output)?);
    Ok(())
}

fn print_event(event: &SequenceEvent) {
    match event {
        SequenceEvent::SequenceStarted { resumed, .. } => {
            eprintln!("{} {}", "▶".cyan(), if *resumed { "resumed" } else { "started" });
        }
        SequenceEvent::StageCompleted {
            stage_uid, stage_kind, ..
        } => {
            eprintln!("  {} {} {}", "✓".green(), stage_kind, stage_uid.to_string().dimmed());
        }
        SequenceEvent::SequenceCompleted { .. } => eprintln!("{} completed", "■".green()),
        SequenceEvent::SequenceFailed { result, .. } => eprintln!(
            "{} failed: {}",
            "■".red(),
            result.error_code.as_deref().unwrap_or("error")
        ),
    }
}

fn validate(path: &Path) -> Result<()> {
    let definition = load_definition(path)?;
    let handlers = builtin_handlers();

    println!("{} {}", "Sequence:".bold(), definition.display_name);
    println!("  UID: {}", definition.uid);
    for stage in &definition.stages {
        println!("  {} {} {}", stage.kind.kind_name().cyan(), stage.display_name, stage.uid.to_string().dimmed());
        if let StageKind::Call { handler } = &stage.kind {
            if handlers.get(handler).is_none() {
                println!("    {}", format!("handler '{}' is not built in", handler).yellow());
            }
        }
    }
    println!("{}", "✓ Sequence definition is valid".green());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const DEFINITION: &str = r#"
uid: 5f1c2d3e-4b5a-4c6d-8e7f-9a0b1c2d3e4f
display_name: totals
stages:
  - display_name: values
    kind: { type: select, pointer: /values }
  - display_name: sum
    kind: { type: call, handler: sum }
"#;

    #[test]
    fn test_parse_input() {
        assert_eq!(parse_input(None).unwrap(), Value::Null);
        assert_eq!(parse_input(Some(r#"{"a": 1}"#)).unwrap(), json!({"a": 1}));
        assert!(parse_input(Some("{not json")).is_err());
    }

    #[tokio::test]
    async fn test_run_definition_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("totals.yaml");
        let config = dir.path().join("config.yaml");
        std::fs::write(&path, DEFINITION).unwrap();
        DemocriteConfig::default().to_yaml_file(&config).unwrap();

        run(Some(config), &[path.clone()], None, Some(r#"{"values": [1, 2, 3]}"#), None, true)
            .await
            .unwrap();
        validate(&path).unwrap();
    }
}
