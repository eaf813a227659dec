// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Blackboard Template
//!
//! Immutable definition a board is built from: its logical-type rules,
//! default storage and controller preferences. A board keeps a snapshot of
//! the template it was bound to.

use serde::{Deserialize, Serialize};
use std::path::Path;
use uuid::Uuid;

use crate::domain::blackboard::rules::{LimitType, LogicalTypeRule, RemoveType, RuleError, StorageDefinition};

/// Board-level switches.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlackboardTemplateConfiguration {
    /// Board stays in `WaitingInitialization` until explicitly initialized
    #[serde(default)]
    pub initialization_required: bool,
}

/// Preferences of the default storage controller.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControllerOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit_resolution_preference: Option<LimitType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remove_resolution_preference: Option<RemoveType>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlackboardTemplate {
    pub uid: Uuid,
    pub unique_template_name: String,
    #[serde(default)]
    pub logical_types: Vec<LogicalTypeRule>,
    #[serde(default)]
    pub default_storage: StorageDefinition,
    #[serde(default)]
    pub configuration: BlackboardTemplateConfiguration,
    #[serde(default)]
    pub controllers: ControllerOptions,
}

impl BlackboardTemplate {
    pub fn new(unique_template_name: impl Into<String>, logical_types: Vec<LogicalTypeRule>) -> Result<Self, RuleError> {
        let template = Self {
            uid: Uuid::new_v4(),
            unique_template_name: unique_template_name.into(),
            logical_types,
            default_storage: StorageDefinition::default(),
            configuration: BlackboardTemplateConfiguration::default(),
            controllers: ControllerOptions::default(),
        };
        template.validate()?;
        Ok(template)
    }

    pub fn with_controllers(mut self, controllers: ControllerOptions) -> Self {
        self.controllers = controllers;
        self
    }

    pub fn with_configuration(mut self, configuration: BlackboardTemplateConfiguration) -> Self {
        self.configuration = configuration;
        self
    }

    pub fn with_default_storage(mut self, storage: StorageDefinition) -> Self {
        self.default_storage = storage;
        self
    }

    /// Every rule pattern (children included) must compile.
    pub fn validate(&self) -> Result<(), RuleError> {
        if self.unique_template_name.trim().is_empty() {
            return Err(RuleError::InvalidConfiguration(
                "template unique name cannot be empty".to_string(),
            ));
        }

        fn check(rules: &[LogicalTypeRule]) -> Result<(), RuleError> {
            for rule in rules {
                rule.compile_pattern()?;
                if let Some(hierarchy) = rule.hierarchy() {
                    check(&hierarchy.children)?;
                }
            }
            Ok(())
        }

        check(&self.logical_types)
    }

    /// Rules grouped by pattern, in first-declared order.
    pub fn rules_by_pattern(&self) -> Vec<(String, Vec<LogicalTypeRule>)> {
        let mut grouped: Vec<(String, Vec<LogicalTypeRule>)> = Vec::new();
        for rule in &self.logical_types {
            match grouped.iter_mut().find(|(pattern, _)| pattern == rule.pattern()) {
                Some((_, rules)) => rules.push(rule.clone()),
                None => grouped.push((rule.pattern().to_string(), vec![rule.clone()])),
            }
        }
        grouped
    }

    pub fn from_yaml_str(yaml: &str) -> anyhow::Result<Self> {
        let template: Self = serde_yaml::from_str(yaml)?;
        template.validate()?;
        Ok(template)
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&content)
    }
}
