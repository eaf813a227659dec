// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Sequence Executor State
//!
//! Root of one sequence execution: the flow identity, the main thread tree,
//! and the context data stages can push to. Persisted after every step so an
//! execution can resume by instance id after a restart.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::domain::sequence::definition::SequenceDefinition;
use crate::domain::sequence::thread_state::{SequenceExecutorThreadState, SequenceExecutorThreadStateSurrogate};

/// Per-execution overrides.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequenceExecutorStateCustomization {
    #[serde(default)]
    pub prevent_state_storage: bool,
}

#[derive(Debug, Clone)]
pub struct SequenceExecutorState {
    sequence_definition_id: Uuid,
    display_name: String,
    flow_uid: Uuid,
    instance_id: Uuid,
    main_thread: SequenceExecutorThreadState,
    start_at: DateTime<Utc>,
    customization: SequenceExecutorStateCustomization,
    context_data: BTreeMap<String, Value>,
}

impl SequenceExecutorState {
    pub fn new(
        definition: &SequenceDefinition,
        flow_uid: Uuid,
        instance_id: Uuid,
        input: Value,
        start_at: DateTime<Utc>,
        customization: SequenceExecutorStateCustomization,
    ) -> Self {
        Self {
            sequence_definition_id: definition.uid,
            display_name: definition.display_name.clone(),
            flow_uid,
            instance_id,
            main_thread: SequenceExecutorThreadState::new(flow_uid, definition.uid, None, input),
            start_at,
            customization,
            context_data: BTreeMap::new(),
        }
    }

    /// Position the main thread on the first stage of `definition`.
    pub fn initialize(&mut self, definition: &SequenceDefinition) {
        self.main_thread = SequenceExecutorThreadState::new(
            self.flow_uid,
            definition.uid,
            definition.first_stage().map(|s| s.uid),
            self.main_thread.thread_input().clone(),
        );
        self.context_data.clear();
    }

    pub fn sequence_definition_id(&self) -> Uuid {
        self.sequence_definition_id
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn flow_uid(&self) -> Uuid {
        self.flow_uid
    }

    pub fn instance_id(&self) -> Uuid {
        self.instance_id
    }

    pub fn start_at(&self) -> DateTime<Utc> {
        self.start_at
    }

    pub fn customization(&self) -> &SequenceExecutorStateCustomization {
        &self.customization
    }

    pub fn main_thread(&self) -> &SequenceExecutorThreadState {
        &self.main_thread
    }

    pub fn main_thread_mut(&mut self) -> &mut SequenceExecutorThreadState {
        &mut self.main_thread
    }

    pub fn context_data(&self) -> &BTreeMap<String, Value> {
        &self.context_data
    }

    /// Split borrow used by the executor while stepping.
    pub fn parts_mut(&mut self) -> (&mut SequenceExecutorThreadState, &mut BTreeMap<String, Value>) {
        (&mut self.main_thread, &mut self.context_data)
    }

    pub fn to_surrogate(&self) -> SequenceExecutorStateSurrogate {
        SequenceExecutorStateSurrogate {
            sequence_definition_id: self.sequence_definition_id,
            display_name: self.display_name.clone(),
            flow_uid: self.flow_uid,
            instance_id: self.instance_id,
            main_thread: self.main_thread.to_surrogate(),
            start_at: self.start_at,
            customization: self.customization.clone(),
            context_data: self.context_data.clone(),
        }
    }

    pub fn from_surrogate(surrogate: SequenceExecutorStateSurrogate) -> Self {
        Self {
            sequence_definition_id: surrogate.sequence_definition_id,
            display_name: surrogate.display_name,
            flow_uid: surrogate.flow_uid,
            instance_id: surrogate.instance_id,
            main_thread: SequenceExecutorThreadState::from_surrogate(surrogate.main_thread),
            start_at: surrogate.start_at,
            customization: surrogate.customization,
            context_data: surrogate.context_data,
        }
    }
}

impl PartialEq for SequenceExecutorState {
    fn eq(&self, other: &Self) -> bool {
        self.sequence_definition_id == other.sequence_definition_id
            && self.instance_id == other.instance_id
            && self.flow_uid == other.flow_uid
            && self.main_thread == other.main_thread
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SequenceExecutorStateSurrogate {
    pub sequence_definition_id: Uuid,
    #[serde(default)]
    pub display_name: String,
    pub flow_uid: Uuid,
    pub instance_id: Uuid,
    pub main_thread: SequenceExecutorThreadStateSurrogate,
    pub start_at: DateTime<Utc>,
    #[serde(default)]
    pub customization: SequenceExecutorStateCustomization,
    #[serde(default)]
    pub context_data: BTreeMap<String, Value>,
}

/// Outcome of a finished execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub output: Value,
    pub flow_uid: Uuid,
    pub succeeded: bool,
    pub cancelled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ExecutionResult {
    pub fn success(flow_uid: Uuid, output: Value) -> Self {
        Self {
            output,
            flow_uid,
            succeeded: true,
            cancelled: false,
            error_code: None,
            message: None,
        }
    }

    pub fn failure(flow_uid: Uuid, error_code: impl Into<String>, message: impl Into<String>) -> Self {
        let error_code = error_code.into();
        Self {
            output: Value::Null,
            flow_uid,
            succeeded: false,
            cancelled: error_code == "cancelled",
            error_code: Some(error_code),
            message: Some(message.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::sequence::definition::StageDefinition;
    use serde_json::json;

    #[test]
    fn test_initialize_positions_cursor_on_first_stage() {
        let definition = SequenceDefinition::new(
            "s",
            vec![StageDefinition::select("a", "/a"), StageDefinition::select("b", "/b")],
        );
        let mut state = SequenceExecutorState::new(
            &definition,
            Uuid::new_v4(),
            Uuid::new_v4(),
            json!({"a": 1}),
            Utc::now(),
            SequenceExecutorStateCustomization::default(),
        );
        assert!(state.main_thread().cursor().is_none());

        state.initialize(&definition);
        assert_eq!(state.main_thread().cursor(), Some(definition.stages[0].uid));
        assert_eq!(state.main_thread().thread_input(), &json!({"a": 1}));
        assert!(!state.main_thread().is_started());
    }

    #[test]
    fn test_surrogate_round_trip_through_json() {
        let definition = SequenceDefinition::new("s", vec![StageDefinition::push_to_context("p", "k")]);
        let mut state = SequenceExecutorState::new(
            &definition,
            Uuid::new_v4(),
            Uuid::new_v4(),
            json!([1, 2]),
            Utc::now(),
            SequenceExecutorStateCustomization {
                prevent_state_storage: true,
            },
        );
        state.initialize(&definition);
        state.parts_mut().1.insert("k".to_string(), json!("v"));

        let json = serde_json::to_string(&state.to_surrogate()).unwrap();
        let restored = SequenceExecutorState::from_surrogate(serde_json::from_str(&json).unwrap());

        assert_eq!(restored, state);
        assert!(restored.customization().prevent_state_storage);
        assert_eq!(restored.context_data().get("k"), Some(&json!("v")));
    }

    #[test]
    fn test_failure_result_flags_cancellation() {
        let result = ExecutionResult::failure(Uuid::new_v4(), "cancelled", "stopped");
        assert!(result.cancelled);
        assert!(!result.succeeded);
    }
}
