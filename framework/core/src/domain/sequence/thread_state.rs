// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Sequence Executor Thread State
//!
//! One execution branch through a sequence definition. Threads form a tree:
//! a stage that forks parallel work stores the child threads in
//! `inner_threads` until they all converge.
//!
//! ```text
//! NotStarted ──update──▶ Running ──set_job_is_done──▶ Done
//!                           │
//!                           └──────set_error────────▶ Errored
//! ```
//!
//! Not internally synchronized: the executor owning the root state is the
//! only writer.

use serde::{Deserialize, Serialize};
use std::hash::{Hash, Hasher};
use serde_json::Value;
use uuid::Uuid;

/// Persisted description of a thread failure.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ThreadException {
    pub error_code: String,
    pub message: String,
}

#[derive(Debug, Clone)]
pub struct SequenceExecutorThreadState {
    flow_uid: Uuid,
    sequence_definition_id: Uuid,
    current_stage_exec_id: Option<Uuid>,
    parent_stage_exec_id: Option<Uuid>,
    cursor: Option<Uuid>,
    thread_input: Value,
    output: Value,
    inner_threads: Vec<SequenceExecutorThreadState>,
    exception: Option<ThreadException>,
    error_message: Option<String>,
    started: bool,
    done: bool,
    running: bool,
}

impl SequenceExecutorThreadState {
    /// A thread positioned on `cursor` (the first stage), not started yet.
    /// Without a first stage the thread is already finished and its output
    /// is its input.
    pub fn new(flow_uid: Uuid, sequence_definition_id: Uuid, cursor: Option<Uuid>, thread_input: Value) -> Self {
        let output = if cursor.is_none() { thread_input.clone() } else { Value::Null };
        Self {
            flow_uid,
            sequence_definition_id,
            current_stage_exec_id: None,
            parent_stage_exec_id: None,
            cursor,
            thread_input,
            output,
            inner_threads: Vec::new(),
            exception: None,
            error_message: None,
            started: false,
            done: false,
            running: false,
        }
    }

    pub fn flow_uid(&self) -> Uuid {
        self.flow_uid
    }

    pub fn sequence_definition_id(&self) -> Uuid {
        self.sequence_definition_id
    }

    pub fn current_stage_exec_id(&self) -> Option<Uuid> {
        self.current_stage_exec_id
    }

    pub fn parent_stage_exec_id(&self) -> Option<Uuid> {
        self.parent_stage_exec_id
    }

    pub fn cursor(&self) -> Option<Uuid> {
        self.cursor
    }

    pub fn thread_input(&self) -> &Value {
        &self.thread_input
    }

    pub fn output(&self) -> &Value {
        &self.output
    }

    pub fn inner_threads(&self) -> &[SequenceExecutorThreadState] {
        &self.inner_threads
    }

    pub fn inner_threads_mut(&mut self) -> &mut [SequenceExecutorThreadState] {
        &mut self.inner_threads
    }

    pub fn exception(&self) -> Option<&ThreadException> {
        self.exception.as_ref()
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Explicit terminal flag, without looking at inner threads.
    pub fn is_done(&self) -> bool {
        self.done
    }

    pub fn is_errored(&self) -> bool {
        self.exception.is_some() || self.error_message.is_some()
    }

    /// Finished once explicitly done, or once it stopped (no cursor or an
    /// exception) and every inner thread finished too.
    pub fn job_done(&self) -> bool {
        self.done
            || ((self.exception.is_some() || self.cursor.is_none())
                && self.inner_threads.iter().all(SequenceExecutorThreadState::job_done))
    }

    /// Advance one step. When the stage execution id changes, the previous
    /// one becomes the parent. Inner threads are replaced.
    pub fn update(
        &mut self,
        cursor: Option<Uuid>,
        next_stage_exec_id: Uuid,
        output: Option<Value>,
        inner_threads: Vec<SequenceExecutorThreadState>,
    ) {
        if self.current_stage_exec_id != Some(next_stage_exec_id) {
            self.parent_stage_exec_id = self.current_stage_exec_id;
            self.current_stage_exec_id = Some(next_stage_exec_id);
        }

        self.cursor = cursor;
        self.output = output.unwrap_or(Value::Null);
        self.inner_threads = inner_threads;
        self.started = true;
        self.running = true;
    }

    /// Drop converged inner threads after their post-process ran.
    pub fn clear_inner_threads(&mut self) -> Vec<SequenceExecutorThreadState> {
        std::mem::take(&mut self.inner_threads)
    }

    pub fn set_job_is_done(&mut self, output: Option<Value>) {
        self.cursor = None;
        self.output = output.unwrap_or(Value::Null);
        self.running = false;
        self.done = true;
    }

    /// Terminal failure. Setting an error twice is a caller bug.
    pub fn set_error(&mut self, error_message: Option<String>, exception: Option<ThreadException>) {
        debug_assert!(
            !self.is_errored(),
            "thread of flow {} already failed",
            self.flow_uid
        );

        self.error_message = error_message;
        self.exception = exception;
        self.running = false;
        self.done = true;
    }

    pub fn to_surrogate(&self) -> SequenceExecutorThreadStateSurrogate {
        SequenceExecutorThreadStateSurrogate {
            flow_uid: self.flow_uid,
            sequence_definition_id: self.sequence_definition_id,
            current_stage_exec_id: self.current_stage_exec_id,
            parent_stage_exec_id: self.parent_stage_exec_id,
            cursor: self.cursor,
            thread_input: self.thread_input.clone(),
            output: self.output.clone(),
            inner_threads: self.inner_threads.iter().map(Self::to_surrogate).collect(),
            exception: self.exception.clone(),
            error_message: self.error_message.clone(),
            started: self.started,
            done: self.done,
            running: self.running,
        }
    }

    pub fn from_surrogate(surrogate: SequenceExecutorThreadStateSurrogate) -> Self {
        Self {
            flow_uid: surrogate.flow_uid,
            sequence_definition_id: surrogate.sequence_definition_id,
            current_stage_exec_id: surrogate.current_stage_exec_id,
            parent_stage_exec_id: surrogate.parent_stage_exec_id,
            cursor: surrogate.cursor,
            thread_input: surrogate.thread_input,
            output: surrogate.output,
            inner_threads: surrogate.inner_threads.into_iter().map(Self::from_surrogate).collect(),
            exception: surrogate.exception,
            error_message: surrogate.error_message,
            started: surrogate.started,
            done: surrogate.done,
            running: surrogate.running,
        }
    }
}

/// Checkpoint equality: flow identity, position, payloads, failure and the
/// inner thread tree. Execution ids and progress flags are not compared.
impl PartialEq for SequenceExecutorThreadState {
    fn eq(&self, other: &Self) -> bool {
        self.flow_uid == other.flow_uid
            && self.sequence_definition_id == other.sequence_definition_id
            && self.cursor == other.cursor
            && self.error_message == other.error_message
            && self.exception == other.exception
            && self.output == other.output
            && self.thread_input == other.thread_input
            && self.inner_threads == other.inner_threads
    }
}

// Consistent with `eq`. JSON payloads are left out of the hash.
impl Hash for SequenceExecutorThreadState {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.flow_uid.hash(state);
        self.sequence_definition_id.hash(state);
        self.cursor.hash(state);
        self.error_message.hash(state);
        self.exception.hash(state);
        self.inner_threads.hash(state);
    }
}

/// Durable form of a thread, mirroring every field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SequenceExecutorThreadStateSurrogate {
    pub flow_uid: Uuid,
    pub sequence_definition_id: Uuid,
    #[serde(default)]
    pub current_stage_exec_id: Option<Uuid>,
    #[serde(default)]
    pub parent_stage_exec_id: Option<Uuid>,
    #[serde(default)]
    pub cursor: Option<Uuid>,
    #[serde(default)]
    pub thread_input: Value,
    #[serde(default)]
    pub output: Value,
    #[serde(default)]
    pub inner_threads: Vec<SequenceExecutorThreadStateSurrogate>,
    #[serde(default)]
    pub exception: Option<ThreadException>,
    #[serde(default)]
    pub error_message: Option<String>,
    #[serde(default)]
    pub started: bool,
    #[serde(default)]
    pub done: bool,
    #[serde(default)]
    pub running: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    fn thread(cursor: Option<Uuid>) -> SequenceExecutorThreadState {
        SequenceExecutorThreadState::new(Uuid::new_v4(), Uuid::new_v4(), cursor, Value::Null)
    }

    #[test]
    fn test_job_done_waits_for_inner_threads() {
        let mut first = thread(Some(Uuid::new_v4()));
        first.set_job_is_done(Some(json!(1)));
        let second = thread(Some(Uuid::new_v4()));

        let mut root = thread(None);
        root.inner_threads = vec![first, second];
        assert!(!root.job_done());

        root.inner_threads[1].set_job_is_done(None);
        assert!(root.job_done());
    }

    #[test]
    fn test_update_tracks_parent_stage() {
        let stage = Uuid::new_v4();
        let mut state = thread(Some(stage));
        assert!(!state.is_started());

        let first_exec = Uuid::new_v4();
        state.update(Some(stage), first_exec, None, Vec::new());
        assert!(state.is_started());
        assert!(state.is_running());
        assert_eq!(state.output(), &Value::Null);
        assert_eq!(state.parent_stage_exec_id(), None);

        // Same execution id keeps the lineage.
        state.update(Some(stage), first_exec, Some(json!("x")), Vec::new());
        assert_eq!(state.parent_stage_exec_id(), None);

        let second_exec = Uuid::new_v4();
        state.update(Some(Uuid::new_v4()), second_exec, None, Vec::new());
        assert_eq!(state.current_stage_exec_id(), Some(second_exec));
        assert_eq!(state.parent_stage_exec_id(), Some(first_exec));
    }

    #[test]
    fn test_set_job_is_done_clears_cursor() {
        let mut state = thread(Some(Uuid::new_v4()));
        state.set_job_is_done(Some(json!({"total": 3})));

        assert!(state.cursor().is_none());
        assert!(state.job_done());
        assert!(!state.is_running());
        assert_eq!(state.output(), &json!({"total": 3}));
    }

    #[test]
    fn test_error_terminates_thread() {
        let mut state = thread(Some(Uuid::new_v4()));
        state.set_error(
            Some("boom".to_string()),
            Some(ThreadException {
                error_code: "stage_failed".into(),
                message: "boom".into(),
            }),
        );

        assert!(state.is_errored());
        assert!(state.job_done());
        assert!(state.cursor().is_some());
    }

    #[test]
    #[should_panic]
    #[cfg(debug_assertions)]
    fn test_double_error_is_a_caller_bug() {
        let mut state = thread(Some(Uuid::new_v4()));
        state.set_error(Some("first".to_string()), None);
        state.set_error(Some("second".to_string()), None);
    }

    #[test]
    fn test_equality_ignores_execution_ids() {
        let stage = Uuid::new_v4();
        let mut a = thread(Some(stage));
        let mut b = a.clone();
        a.update(Some(stage), Uuid::new_v4(), Some(json!(1)), Vec::new());
        b.update(Some(stage), Uuid::new_v4(), Some(json!(1)), Vec::new());
        assert_eq!(a, b);

        b.update(Some(stage), Uuid::new_v4(), Some(json!(2)), Vec::new());
        assert_ne!(a, b);
    }

    #[test]
    fn test_equal_trees_hash_alike() {
        use std::collections::hash_map::RandomState;
        use std::hash::BuildHasher;

        let hasher = RandomState::new();
        let stage = Uuid::new_v4();
        let mut a = thread(Some(stage));
        let inner = thread(None);
        let mut b = a.clone();
        a.update(Some(stage), Uuid::new_v4(), None, vec![inner.clone()]);
        b.update(Some(stage), Uuid::new_v4(), None, vec![inner]);

        assert_eq!(a, b);
        assert_eq!(hasher.hash_one(&a), hasher.hash_one(&b));

        a.inner_threads_mut()[0].set_error(Some("failed".to_string()), None);
        assert_ne!(hasher.hash_one(&a), hasher.hash_one(&b));
    }

    fn arb_tree() -> impl Strategy<Value = SequenceExecutorThreadState> {
        let leaf = (any::<bool>(), any::<bool>(), any::<bool>()).prop_map(|(has_cursor, done, errored)| {
            let mut state = thread(if has_cursor { Some(Uuid::new_v4()) } else { None });
            if errored {
                state.set_error(Some("failed".to_string()), None);
            } else if done {
                state.set_job_is_done(None);
            }
            state
        });

        leaf.prop_recursive(3, 16, 4, |inner| {
            (proptest::collection::vec(inner, 0..4), any::<bool>()).prop_map(|(children, has_cursor)| {
                let mut state = thread(if has_cursor { Some(Uuid::new_v4()) } else { None });
                state.inner_threads = children;
                state
            })
        })
    }

    proptest! {
        #[test]
        fn test_surrogate_preserves_tree(tree in arb_tree()) {
            let restored = SequenceExecutorThreadState::from_surrogate(tree.to_surrogate());
            prop_assert_eq!(restored.job_done(), tree.job_done());
            prop_assert_eq!(restored, tree);
        }
    }
}
