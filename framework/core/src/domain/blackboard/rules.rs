// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Logical Type Rules
//!
//! Declarative constraints attached to a board template. Each rule targets the
//! records whose logical type matches its `pattern`.
//!
//! | Rule | Effect |
//! |------|--------|
//! | `MaxRecord` | caps the number of matching records |
//! | `Unique` | one record per logical type |
//! | `Regex` | string payloads must match |
//! | `TypeCheck` | payload kind must be assignable |
//! | `NumberRange` | numeric payloads within `[min, max)` |
//! | `Order` | precedence of the governing handler |
//! | `Storage` | repository the matching records live in |
//! | `RemainOnSealed` | matching active records survive sealing |
//!
//! `Regex`, `TypeCheck` and `NumberRange` are hierarchy rules: they carry child
//! rules plus a collection group and a validation mode used when siblings are
//! combined.

use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};

use crate::domain::blackboard::record::DataKind;

// ============================================================================
// Resolution Policies
// ============================================================================

/// How a storage controller should react to a limit violation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LimitType {
    Reject,
    ClearAll,
    KeepNewest,
    KeepNewestUpdated,
    KeepOldest,
    KeepOldestUpdated,
}

/// How evicted records leave the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemoveType {
    Remove,
    Decommission,
}

/// Logic used to combine sibling validators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ValidationMode {
    #[default]
    All,
    AtLeastOne,
    NoneOne,
}

// ============================================================================
// Value Objects
// ============================================================================

/// Repository assignment for a logical type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StorageDefinition {
    pub storage_key: String,
    #[serde(default = "default_configuration_name")]
    pub configuration_name: String,
}

fn default_configuration_name() -> String {
    "default".to_string()
}

impl StorageDefinition {
    pub fn new(storage_key: impl Into<String>, configuration_name: impl Into<String>) -> Self {
        Self {
            storage_key: storage_key.into(),
            configuration_name: configuration_name.into(),
        }
    }
}

impl Default for StorageDefinition {
    fn default() -> Self {
        Self::new("blackboard-records", default_configuration_name())
    }
}

/// Children and grouping information of a hierarchy rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct RuleHierarchy {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<LogicalTypeRule>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collection_group: Option<String>,
    #[serde(default)]
    pub validation_mode: ValidationMode,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct RegexRuleOptions {
    #[serde(default)]
    pub case_insensitive: bool,
    #[serde(default)]
    pub multi_line: bool,
}

// ============================================================================
// Rule Sum Type
// ============================================================================

/// A single declarative rule. Serialized with a `kind` tag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LogicalTypeRule {
    MaxRecord {
        pattern: String,
        #[serde(default)]
        include_decommissioned: bool,
        max_record: usize,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        limit_policy: Option<LimitType>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        remove_policy: Option<RemoveType>,
    },
    Unique {
        pattern: String,
        #[serde(default)]
        allow_replacement: bool,
    },
    Regex {
        pattern: String,
        match_regex: String,
        #[serde(default)]
        options: RegexRuleOptions,
        #[serde(default)]
        hierarchy: RuleHierarchy,
    },
    TypeCheck {
        pattern: String,
        filter_type: DataKind,
        #[serde(default)]
        hierarchy: RuleHierarchy,
    },
    NumberRange {
        pattern: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        min: Option<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max: Option<f64>,
        #[serde(default)]
        hierarchy: RuleHierarchy,
    },
    Order {
        pattern: String,
        order: i16,
    },
    Storage {
        pattern: String,
        storage: StorageDefinition,
    },
    RemainOnSealed {
        pattern: String,
    },
}

impl LogicalTypeRule {
    pub fn max_record(pattern: impl Into<String>, max_record: usize) -> Self {
        LogicalTypeRule::MaxRecord {
            pattern: pattern.into(),
            include_decommissioned: false,
            max_record,
            limit_policy: None,
            remove_policy: None,
        }
    }

    pub fn unique(pattern: impl Into<String>, allow_replacement: bool) -> Self {
        LogicalTypeRule::Unique {
            pattern: pattern.into(),
            allow_replacement,
        }
    }

    pub fn regex(pattern: impl Into<String>, match_regex: impl Into<String>) -> Self {
        LogicalTypeRule::Regex {
            pattern: pattern.into(),
            match_regex: match_regex.into(),
            options: RegexRuleOptions::default(),
            hierarchy: RuleHierarchy::default(),
        }
    }

    pub fn type_check(pattern: impl Into<String>, filter_type: DataKind) -> Self {
        LogicalTypeRule::TypeCheck {
            pattern: pattern.into(),
            filter_type,
            hierarchy: RuleHierarchy::default(),
        }
    }

    pub fn number_range(pattern: impl Into<String>, min: Option<f64>, max: Option<f64>) -> Self {
        LogicalTypeRule::NumberRange {
            pattern: pattern.into(),
            min,
            max,
            hierarchy: RuleHierarchy::default(),
        }
    }

    /// Attach children to a hierarchy rule. No-op for other kinds.
    pub fn with_children(mut self, children: Vec<LogicalTypeRule>) -> Self {
        if let Some(hierarchy) = self.hierarchy_mut() {
            hierarchy.children = children;
        }
        self
    }

    /// Set the sibling grouping of a hierarchy rule. No-op for other kinds.
    pub fn in_group(mut self, collection_group: Option<String>, mode: ValidationMode) -> Self {
        if let Some(hierarchy) = self.hierarchy_mut() {
            hierarchy.collection_group = collection_group;
            hierarchy.validation_mode = mode;
        }
        self
    }

    pub fn pattern(&self) -> &str {
        match self {
            LogicalTypeRule::MaxRecord { pattern, .. }
            | LogicalTypeRule::Unique { pattern, .. }
            | LogicalTypeRule::Regex { pattern, .. }
            | LogicalTypeRule::TypeCheck { pattern, .. }
            | LogicalTypeRule::NumberRange { pattern, .. }
            | LogicalTypeRule::Order { pattern, .. }
            | LogicalTypeRule::Storage { pattern, .. }
            | LogicalTypeRule::RemainOnSealed { pattern } => pattern,
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            LogicalTypeRule::MaxRecord { .. } => "max_record",
            LogicalTypeRule::Unique { .. } => "unique",
            LogicalTypeRule::Regex { .. } => "regex",
            LogicalTypeRule::TypeCheck { .. } => "type_check",
            LogicalTypeRule::NumberRange { .. } => "number_range",
            LogicalTypeRule::Order { .. } => "order",
            LogicalTypeRule::Storage { .. } => "storage",
            LogicalTypeRule::RemainOnSealed { .. } => "remain_on_sealed",
        }
    }

    pub fn hierarchy(&self) -> Option<&RuleHierarchy> {
        match self {
            LogicalTypeRule::Regex { hierarchy, .. }
            | LogicalTypeRule::TypeCheck { hierarchy, .. }
            | LogicalTypeRule::NumberRange { hierarchy, .. } => Some(hierarchy),
            _ => None,
        }
    }

    fn hierarchy_mut(&mut self) -> Option<&mut RuleHierarchy> {
        match self {
            LogicalTypeRule::Regex { hierarchy, .. }
            | LogicalTypeRule::TypeCheck { hierarchy, .. }
            | LogicalTypeRule::NumberRange { hierarchy, .. } => Some(hierarchy),
            _ => None,
        }
    }

    /// Rules that describe handler configuration rather than record validation.
    pub fn is_handler_setting(&self) -> bool {
        matches!(
            self,
            LogicalTypeRule::Order { .. } | LogicalTypeRule::Storage { .. } | LogicalTypeRule::RemainOnSealed { .. }
        )
    }

    /// Compile the logical-type pattern of this rule.
    pub fn compile_pattern(&self) -> Result<Regex, RuleError> {
        compile_pattern(self.pattern())
    }
}

/// Compile a logical-type pattern, mapping failures to `RuleError::InvalidPattern`.
pub fn compile_pattern(pattern: &str) -> Result<Regex, RuleError> {
    Regex::new(pattern).map_err(|e| RuleError::InvalidPattern {
        pattern: pattern.to_string(),
        reason: e.to_string(),
    })
}

pub(crate) fn compile_match_regex(match_regex: &str, options: RegexRuleOptions) -> Result<Regex, RuleError> {
    RegexBuilder::new(match_regex)
        .case_insensitive(options.case_insensitive)
        .multi_line(options.multi_line)
        .build()
        .map_err(|e| RuleError::InvalidPattern {
            pattern: match_regex.to_string(),
            reason: e.to_string(),
        })
}

/// Errors raised while turning rules into validators. Fatal at template bind time.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RuleError {
    #[error("Invalid pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("Rule kind '{0}' is not supported by the validator provider")]
    UnsupportedRule(String),

    #[error("Invalid rule configuration: {0}")]
    InvalidConfiguration(String),
}
