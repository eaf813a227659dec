// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Sequence Definitions
//!
//! A sequence is an ordered list of stages. Each stage transforms the output
//! of the previous one; a `Foreach` stage forks one inner thread per element
//! and runs a nested definition on each.
//!
//! # YAML Format
//!
//! ```yaml
//! uid: 5f1f6a3e-9c59-4d3f-8a53-4b5d1a4f3c10
//! display_name: enrich-orders
//! options:
//!   prevent_state_storage: false
//! stages:
//!   - display_name: pick items
//!     kind: { type: select, pointer: /items }
//!   - display_name: price each
//!     kind:
//!       type: foreach
//!       inner:
//!         uid: 0c9f7bb5-3c4e-4a33-bb39-9a4f2a4f8e01
//!         display_name: price
//!         stages:
//!           - display_name: call pricer
//!             kind: { type: call, handler: pricer }
//! ```
//!
//! Stage uids may be omitted; they are derived deterministically from the
//! definition uid and the stage position so a persisted cursor stays valid
//! across reloads.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use std::path::Path;
use uuid::Uuid;

use crate::domain::sequence::error::SequenceError;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequenceOptions {
    #[serde(default)]
    pub prevent_state_storage: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SequenceDefinition {
    pub uid: Uuid,
    pub display_name: String,
    #[serde(default)]
    pub stages: Vec<StageDefinition>,
    #[serde(default)]
    pub options: SequenceOptions,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageDefinition {
    #[serde(default = "Uuid::nil")]
    pub uid: Uuid,
    pub display_name: String,
    pub kind: StageKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StageKind {
    /// Invoke a registered stage handler
    Call { handler: String },
    /// Fork one inner thread per element of the (selected) input array
    Foreach {
        inner: Box<SequenceDefinition>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        member: Option<String>,
    },
    /// Keep array elements whose value at `pointer` equals `equals`
    Filter { pointer: String, equals: Value },
    /// Project the input through a JSON pointer
    Select { pointer: String },
    /// Store the input in the execution context and pass it through
    PushToContext { key: String },
    /// Run another stored definition to completion
    NestedSequenceCall { sequence_id: Uuid },
}

impl StageKind {
    pub fn kind_name(&self) -> &'static str {
        match self {
            StageKind::Call { .. } => "call",
            StageKind::Foreach { .. } => "foreach",
            StageKind::Filter { .. } => "filter",
            StageKind::Select { .. } => "select",
            StageKind::PushToContext { .. } => "push_to_context",
            StageKind::NestedSequenceCall { .. } => "nested_sequence_call",
        }
    }
}

impl StageDefinition {
    pub fn new(display_name: impl Into<String>, kind: StageKind) -> Self {
        Self {
            uid: Uuid::new_v4(),
            display_name: display_name.into(),
            kind,
        }
    }

    pub fn call(display_name: impl Into<String>, handler: impl Into<String>) -> Self {
        Self::new(display_name, StageKind::Call { handler: handler.into() })
    }

    pub fn foreach(display_name: impl Into<String>, inner: SequenceDefinition, member: Option<String>) -> Self {
        Self::new(
            display_name,
            StageKind::Foreach {
                inner: Box::new(inner),
                member,
            },
        )
    }

    pub fn select(display_name: impl Into<String>, pointer: impl Into<String>) -> Self {
        Self::new(display_name, StageKind::Select { pointer: pointer.into() })
    }

    pub fn filter(display_name: impl Into<String>, pointer: impl Into<String>, equals: Value) -> Self {
        Self::new(
            display_name,
            StageKind::Filter {
                pointer: pointer.into(),
                equals,
            },
        )
    }

    pub fn push_to_context(display_name: impl Into<String>, key: impl Into<String>) -> Self {
        Self::new(display_name, StageKind::PushToContext { key: key.into() })
    }

    pub fn nested(display_name: impl Into<String>, sequence_id: Uuid) -> Self {
        Self::new(display_name, StageKind::NestedSequenceCall { sequence_id })
    }
}

impl SequenceDefinition {
    pub fn new(display_name: impl Into<String>, stages: Vec<StageDefinition>) -> Self {
        Self {
            uid: Uuid::new_v4(),
            display_name: display_name.into(),
            stages,
            options: SequenceOptions::default(),
        }
    }

    pub fn with_options(mut self, options: SequenceOptions) -> Self {
        self.options = options;
        self
    }

    pub fn first_stage(&self) -> Option<&StageDefinition> {
        self.stages.first()
    }

    pub fn stage(&self, uid: Uuid) -> Option<&StageDefinition> {
        self.stages.iter().find(|s| s.uid == uid)
    }

    /// Stage following `uid`, `None` when `uid` is the last stage or unknown.
    pub fn next_stage_after(&self, uid: Uuid) -> Option<&StageDefinition> {
        let index = self.stages.iter().position(|s| s.uid == uid)?;
        self.stages.get(index + 1)
    }

    /// Give every stage without a uid a deterministic one, recursively.
    pub fn assign_stage_ids(&mut self) {
        let namespace = self.uid;
        for (index, stage) in self.stages.iter_mut().enumerate() {
            if stage.uid.is_nil() {
                let name = format!("{}:{}", index, stage.display_name);
                stage.uid = Uuid::new_v5(&namespace, name.as_bytes());
            }
            if let StageKind::Foreach { inner, .. } = &mut stage.kind {
                inner.assign_stage_ids();
            }
        }
    }

    /// Stage uids must be set and unique within one definition.
    pub fn validate(&self) -> Result<(), SequenceError> {
        let mut seen = HashSet::new();
        for stage in &self.stages {
            if stage.uid.is_nil() {
                return Err(SequenceError::InvalidDefinition(format!(
                    "stage '{}' of '{}' has no uid",
                    stage.display_name, self.display_name
                )));
            }
            if !seen.insert(stage.uid) {
                return Err(SequenceError::InvalidDefinition(format!(
                    "duplicate stage uid {} in '{}'",
                    stage.uid, self.display_name
                )));
            }
            if let StageKind::Foreach { inner, .. } = &stage.kind {
                inner.validate()?;
            }
        }
        Ok(())
    }

    pub fn from_yaml_str(yaml: &str) -> anyhow::Result<Self> {
        let mut definition: Self = serde_yaml::from_str(yaml)?;
        definition.assign_stage_ids();
        definition.validate()?;
        Ok(definition)
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const YAML: &str = r#"
uid: 5f1f6a3e-9c59-4d3f-8a53-4b5d1a4f3c10
display_name: enrich-orders
stages:
  - display_name: pick items
    kind: { type: select, pointer: /items }
  - display_name: price each
    kind:
      type: foreach
      inner:
        uid: 0c9f7bb5-3c4e-4a33-bb39-9a4f2a4f8e01
        display_name: price
        stages:
          - display_name: call pricer
            kind: { type: call, handler: pricer }
"#;

    #[test]
    fn test_yaml_stage_ids_are_deterministic() {
        let first = SequenceDefinition::from_yaml_str(YAML).unwrap();
        let second = SequenceDefinition::from_yaml_str(YAML).unwrap();

        assert_eq!(first, second);
        assert!(first.stages.iter().all(|s| !s.uid.is_nil()));
        match &first.stages[1].kind {
            StageKind::Foreach { inner, member } => {
                assert!(member.is_none());
                assert!(!inner.stages[0].uid.is_nil());
            }
            other => panic!("unexpected stage {:?}", other),
        }
    }

    #[test]
    fn test_next_stage_navigation() {
        let definition = SequenceDefinition::new(
            "s",
            vec![StageDefinition::select("a", "/a"), StageDefinition::select("b", "/b")],
        );
        let first = definition.first_stage().unwrap().uid;
        let second = definition.next_stage_after(first).unwrap().uid;

        assert_eq!(definition.stage(second).unwrap().display_name, "b");
        assert!(definition.next_stage_after(second).is_none());
        assert!(definition.next_stage_after(Uuid::new_v4()).is_none());
    }

    #[test]
    fn test_duplicate_stage_ids_rejected() {
        let stage = StageDefinition::select("a", "/a");
        let definition = SequenceDefinition::new("s", vec![stage.clone(), stage]);
        assert!(matches!(definition.validate(), Err(SequenceError::InvalidDefinition(_))));
    }
}
