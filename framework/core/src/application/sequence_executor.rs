// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Sequence Executor Service - Application Layer
//!
//! Drives a [`SequenceExecutorState`] one step at a time until its main
//! thread is done, checkpointing the state after every step so an execution
//! interrupted by a crash resumes from its last stage.
//!
//! ## Step
//!
//! 1. Unfinished inner threads (forked by a `foreach` stage) are stepped
//!    first, in element order. The parent yields until they all finished.
//! 2. Once they all finished, the `foreach` outputs are aggregated and the
//!    inner threads are cleared.
//! 3. Otherwise the next stage is picked: the cursor of a thread that has not
//!    started, else the stage after the current one. Without a next stage the
//!    thread completes with the previous output.
//! 4. The stage runs with a fresh execution id. Failures are recorded on the
//!    thread, never propagated as errors of the step.
//!
//! # Architecture
//!
//! - **Layer:** Application Layer
//! - **Collaborators:** `SequenceDefinitionRepository`, `SequenceStateRepository`,
//!   [`StageHandlerRegistry`], `EventBus`, `Clock`

use async_trait::async_trait;
use futures::future::{BoxFuture, FutureExt};
use metrics::counter;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::domain::clock::Clock;
use crate::domain::events::SequenceEvent;
use crate::domain::repository::{SequenceDefinitionRepository, SequenceStateRepository};
use crate::domain::sequence::definition::{SequenceDefinition, StageDefinition, StageKind};
use crate::domain::sequence::error::SequenceError;
use crate::domain::sequence::executor_state::{
    ExecutionResult, SequenceExecutorState, SequenceExecutorStateCustomization,
};
use crate::domain::sequence::thread_state::SequenceExecutorThreadState;
use crate::infrastructure::event_bus::EventBus;

/// Deepest chain of nested sequence calls.
const MAX_NESTED_DEPTH: usize = 32;

/// What a stage handler sees of the running execution.
#[derive(Debug, Clone)]
pub struct StageContext {
    pub flow_uid: Uuid,
    pub instance_id: Uuid,
    pub stage_uid: Uuid,
    pub context_data: BTreeMap<String, Value>,
}

/// Unit of work invoked by `call` stages.
#[async_trait]
pub trait StageHandler: Send + Sync {
    async fn handle(&self, input: Value, context: &StageContext) -> Result<Value, SequenceError>;
}

#[async_trait]
impl<F> StageHandler for F
where
    F: Fn(Value) -> Result<Value, SequenceError> + Send + Sync,
{
    async fn handle(&self, input: Value, _context: &StageContext) -> Result<Value, SequenceError> {
        (self)(input)
    }
}

/// Stage handlers by name.
#[derive(Default, Clone)]
pub struct StageHandlerRegistry {
    handlers: HashMap<String, Arc<dyn StageHandler>>,
}

impl StageHandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: impl Into<String>, handler: Arc<dyn StageHandler>) -> &mut Self {
        self.handlers.insert(name.into(), handler);
        self
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn StageHandler>> {
        self.handlers.get(name).cloned()
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl std::fmt::Debug for StageHandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StageHandlerRegistry").field("handlers", &self.names()).finish()
    }
}

#[derive(Debug, Clone, Default)]
pub struct ExecutionOptions {
    /// Resume this instance when a checkpoint exists, otherwise start it.
    pub instance_id: Option<Uuid>,
    pub flow_uid: Option<Uuid>,
    pub customization: SequenceExecutorStateCustomization,
}

/// Identity of the execution a step belongs to.
struct StepScope<'a> {
    flow_uid: Uuid,
    instance_id: Uuid,
    nested_depth: usize,
    cancel: &'a CancellationToken,
}

pub struct SequenceExecutorService {
    definitions: Arc<dyn SequenceDefinitionRepository>,
    states: Arc<dyn SequenceStateRepository>,
    handlers: Arc<StageHandlerRegistry>,
    event_bus: EventBus,
    clock: Arc<dyn Clock>,
    block_state_storage: bool,
}

impl SequenceExecutorService {
    pub fn new(
        definitions: Arc<dyn SequenceDefinitionRepository>,
        states: Arc<dyn SequenceStateRepository>,
        handlers: Arc<StageHandlerRegistry>,
        event_bus: EventBus,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            definitions,
            states,
            handlers,
            event_bus,
            clock,
            block_state_storage: false,
        }
    }

    /// Disable checkpoints for every execution of this service.
    pub fn with_state_storage_blocked(mut self, blocked: bool) -> Self {
        self.block_state_storage = blocked;
        self
    }

    /// Give missing stage uids a deterministic value, validate and store `definition`.
    pub async fn register_definition(&self, mut definition: SequenceDefinition) -> Result<Uuid, SequenceError> {
        definition.assign_stage_ids();
        definition.validate()?;
        info!(
            sequence_id = %definition.uid,
            name = %definition.display_name,
            stages = definition.stages.len(),
            "Registering sequence definition"
        );
        self.definitions.save(&definition).await?;
        Ok(definition.uid)
    }

    pub async fn list_definitions(&self) -> Result<Vec<SequenceDefinition>, SequenceError> {
        Ok(self.definitions.list_all().await?)
    }

    /// Run sequence `sequence_id` to completion.
    ///
    /// When `options.instance_id` names a checkpointed execution, it resumes
    /// from that checkpoint instead of starting over.
    pub async fn execute(
        &self,
        sequence_id: Uuid,
        input: Value,
        options: ExecutionOptions,
        cancel: &CancellationToken,
    ) -> Result<ExecutionResult, SequenceError> {
        let definition = self
            .definitions
            .find_by_id(sequence_id)
            .await?
            .ok_or(SequenceError::DefinitionNotFound(sequence_id))?;
        definition.validate()?;

        let instance_id = options.instance_id.unwrap_or_else(Uuid::new_v4);
        let (mut state, resumed) = match self.states.find_by_instance(instance_id).await? {
            Some(surrogate) => {
                if surrogate.sequence_definition_id != definition.uid {
                    return Err(SequenceError::InvalidDefinition(format!(
                        "instance {} belongs to sequence {}",
                        instance_id, surrogate.sequence_definition_id
                    )));
                }
                (SequenceExecutorState::from_surrogate(surrogate), true)
            }
            None => {
                let mut state = SequenceExecutorState::new(
                    &definition,
                    options.flow_uid.unwrap_or_else(Uuid::new_v4),
                    instance_id,
                    input,
                    self.clock.utc_now(),
                    options.customization,
                );
                state.initialize(&definition);
                (state, false)
            }
        };

        let storage_enabled = !(self.block_state_storage
            || definition.options.prevent_state_storage
            || state.customization().prevent_state_storage);

        info!(
            flow_uid = %state.flow_uid(),
            instance_id = %instance_id,
            sequence_id = %definition.uid,
            resumed,
            "Sequence execution started"
        );
        self.event_bus.publish_sequence_event(SequenceEvent::SequenceStarted {
            flow_uid: state.flow_uid(),
            instance_id,
            sequence_definition_id: definition.uid,
            resumed,
            started_at: self.clock.utc_now(),
        });

        let scope = StepScope {
            flow_uid: state.flow_uid(),
            instance_id,
            nested_depth: 0,
            cancel,
        };

        let mut last_saved: Option<SequenceExecutorState> = resumed.then(|| state.clone());
        if !resumed {
            self.checkpoint(&state, &mut last_saved, storage_enabled).await?;
        }

        while !state.main_thread().job_done() {
            if cancel.is_cancelled() {
                let cancelled = SequenceError::Cancelled;
                state
                    .main_thread_mut()
                    .set_error(Some(cancelled.to_string()), Some(cancelled.to_exception()));
                self.checkpoint(&state, &mut last_saved, storage_enabled).await?;
                break;
            }

            let (thread, context_data) = state.parts_mut();
            self.step(&definition, thread, context_data, &scope).await;
            self.checkpoint(&state, &mut last_saved, storage_enabled).await?;
        }

        self.finish(&state)
    }

    fn finish(&self, state: &SequenceExecutorState) -> Result<ExecutionResult, SequenceError> {
        let thread = state.main_thread();
        let instance_id = state.instance_id();

        if thread.is_errored() {
            let error = SequenceError::from_failure(thread.exception(), thread.error_message());
            let result = ExecutionResult::failure(state.flow_uid(), error.error_code(), error.to_string());
            if result.cancelled {
                warn!(flow_uid = %state.flow_uid(), instance_id = %instance_id, "Sequence execution cancelled");
            } else {
                error!(flow_uid = %state.flow_uid(), instance_id = %instance_id, error = %error, "Sequence execution failed");
            }
            counter!("democrite_sequence_failures_total").increment(1);
            self.event_bus.publish_sequence_event(SequenceEvent::SequenceFailed {
                instance_id,
                result,
                failed_at: self.clock.utc_now(),
            });
            return Err(error);
        }

        let result = ExecutionResult::success(state.flow_uid(), thread.output().clone());
        info!(flow_uid = %state.flow_uid(), instance_id = %instance_id, "Sequence execution completed");
        self.event_bus.publish_sequence_event(SequenceEvent::SequenceCompleted {
            instance_id,
            result: result.clone(),
            completed_at: self.clock.utc_now(),
        });
        Ok(result)
    }

    /// Persist `state` unless storage is disabled or nothing changed since the last save.
    async fn checkpoint(
        &self,
        state: &SequenceExecutorState,
        last_saved: &mut Option<SequenceExecutorState>,
        enabled: bool,
    ) -> Result<(), SequenceError> {
        if !enabled {
            return Ok(());
        }
        if last_saved
            .as_ref()
            .is_some_and(|saved| saved == state && saved.context_data() == state.context_data())
        {
            return Ok(());
        }

        self.states.save(&state.to_surrogate()).await.map_err(|e| {
            error!(instance_id = %state.instance_id(), error = %e, "Failed to persist sequence state");
            SequenceError::from(e)
        })?;
        *last_saved = Some(state.clone());
        Ok(())
    }

    /// Advance `thread` by one step of `definition`.
    fn step<'a>(
        &'a self,
        definition: &'a SequenceDefinition,
        thread: &'a mut SequenceExecutorThreadState,
        context_data: &'a mut BTreeMap<String, Value>,
        scope: &'a StepScope<'a>,
    ) -> BoxFuture<'a, ()> {
        async move {
            if thread.job_done() {
                return;
            }

            if !thread.inner_threads().is_empty() {
                if let Err(e) = self.step_inner_threads(definition, thread, context_data, scope).await {
                    Self::fail(thread, scope, &e);
                }
                return;
            }

            // A cursor missing from the definition fails the thread, started or not.
            if let Some(cursor) = thread.cursor() {
                if definition.stage(cursor).is_none() {
                    Self::fail(thread, scope, &SequenceError::StageNotFound(cursor));
                    return;
                }
            }

            let next = match thread.cursor() {
                Some(cursor) if thread.is_started() => definition.next_stage_after(cursor),
                Some(cursor) => definition.stage(cursor),
                None => None,
            };

            let input = if thread.is_started() {
                thread.output().clone()
            } else {
                thread.thread_input().clone()
            };

            let Some(stage) = next else {
                debug!(flow_uid = %scope.flow_uid, definition = %definition.uid, "Thread reached end of sequence");
                thread.set_job_is_done(Some(input));
                return;
            };

            let exec_id = Uuid::new_v4();
            debug!(
                flow_uid = %scope.flow_uid,
                stage_id = %stage.uid,
                stage = %stage.display_name,
                kind = stage.kind.kind_name(),
                "Executing stage"
            );
            counter!("democrite_sequence_stages_total", "kind" => stage.kind.kind_name()).increment(1);

            match self.run_stage(stage, input, context_data, scope).await {
                Ok(StageOutcome::Output(output)) => {
                    thread.update(Some(stage.uid), exec_id, Some(output), Vec::new());
                    self.stage_completed(stage, scope);
                }
                Ok(StageOutcome::Fork(elements)) => {
                    let StageKind::Foreach { inner, .. } = &stage.kind else {
                        Self::fail(thread, scope, &SequenceError::NestedThread("fork outside foreach".to_string()));
                        return;
                    };
                    let first = inner.first_stage().map(|s| s.uid);
                    let inner_threads = elements
                        .into_iter()
                        .map(|element| SequenceExecutorThreadState::new(scope.flow_uid, inner.uid, first, element))
                        .collect();
                    thread.update(Some(stage.uid), exec_id, None, inner_threads);
                }
                Err(e) => {
                    thread.update(Some(stage.uid), exec_id, None, Vec::new());
                    Self::fail(thread, scope, &e);
                }
            }
        }
        .boxed()
    }

    async fn step_inner_threads(
        &self,
        definition: &SequenceDefinition,
        thread: &mut SequenceExecutorThreadState,
        context_data: &mut BTreeMap<String, Value>,
        scope: &StepScope<'_>,
    ) -> Result<(), SequenceError> {
        let cursor = thread
            .cursor()
            .ok_or_else(|| SequenceError::NestedThread("inner threads without a current stage".to_string()))?;
        let stage = definition.stage(cursor).ok_or(SequenceError::StageNotFound(cursor))?;
        let StageKind::Foreach { inner, .. } = &stage.kind else {
            return Err(SequenceError::NestedThread(format!(
                "stage '{}' does not fork inner threads",
                stage.display_name
            )));
        };

        if thread.inner_threads().iter().any(|t| !t.job_done()) {
            for inner_thread in thread.inner_threads_mut().iter_mut().filter(|t| !t.job_done()) {
                self.step(inner, inner_thread, &mut *context_data, scope).await;
            }
            return Ok(());
        }

        // Every inner thread finished: aggregate in element order.
        let exec_id = thread.current_stage_exec_id().unwrap_or_else(Uuid::new_v4);
        let finished = thread.clear_inner_threads();
        let failures: Vec<String> = finished
            .iter()
            .filter(|t| t.is_errored())
            .map(|t| {
                t.exception()
                    .map(|e| e.message.clone())
                    .or_else(|| t.error_message().map(str::to_string))
                    .unwrap_or_default()
            })
            .collect();

        if failures.len() == finished.len() {
            return Err(SequenceError::StageFailed {
                stage: stage.display_name.clone(),
                message: failures.join("; "),
            });
        }

        let outputs: Vec<Value> = finished
            .into_iter()
            .filter(|t| !t.is_errored())
            .map(|t| t.output().clone())
            .filter(|output| !output.is_null())
            .collect();
        thread.update(Some(stage.uid), exec_id, Some(Value::Array(outputs)), Vec::new());
        self.stage_completed(stage, scope);
        Ok(())
    }

    async fn run_stage(
        &self,
        stage: &StageDefinition,
        input: Value,
        context_data: &mut BTreeMap<String, Value>,
        scope: &StepScope<'_>,
    ) -> Result<StageOutcome, SequenceError> {
        match &stage.kind {
            StageKind::Call { handler } => {
                let handler = self
                    .handlers
                    .get(handler)
                    .ok_or_else(|| SequenceError::HandlerNotFound(handler.clone()))?;
                let context = StageContext {
                    flow_uid: scope.flow_uid,
                    instance_id: scope.instance_id,
                    stage_uid: stage.uid,
                    context_data: context_data.clone(),
                };
                Ok(StageOutcome::Output(handler.handle(input, &context).await?))
            }
            StageKind::Foreach { member, .. } => {
                let selected = match member {
                    Some(pointer) => input.pointer(pointer).cloned().unwrap_or(Value::Null),
                    None => input,
                };
                match selected {
                    // Nothing to fork: the aggregate is empty right away.
                    Value::Array(elements) if elements.is_empty() => Ok(StageOutcome::Output(Value::Array(elements))),
                    Value::Array(elements) => Ok(StageOutcome::Fork(elements)),
                    _ => Err(SequenceError::ForeachInputNotArray(stage.display_name.clone())),
                }
            }
            StageKind::Filter { pointer, equals } => {
                let Value::Array(elements) = input else {
                    return Err(SequenceError::InvalidStageInput {
                        stage: stage.display_name.clone(),
                        reason: "filter requires an array input".to_string(),
                    });
                };
                let kept = elements
                    .into_iter()
                    .filter(|element| element.pointer(pointer) == Some(equals))
                    .collect();
                Ok(StageOutcome::Output(Value::Array(kept)))
            }
            StageKind::Select { pointer } => input
                .pointer(pointer)
                .cloned()
                .map(StageOutcome::Output)
                .ok_or_else(|| SequenceError::InvalidStageInput {
                    stage: stage.display_name.clone(),
                    reason: format!("pointer '{}' does not resolve", pointer),
                }),
            StageKind::PushToContext { key } => {
                context_data.insert(key.clone(), input.clone());
                Ok(StageOutcome::Output(input))
            }
            StageKind::NestedSequenceCall { sequence_id } => {
                self.run_nested(*sequence_id, input, scope).await.map(StageOutcome::Output)
            }
        }
    }

    /// Run another definition in memory as a child execution.
    fn run_nested<'a>(
        &'a self,
        sequence_id: Uuid,
        input: Value,
        scope: &'a StepScope<'a>,
    ) -> BoxFuture<'a, Result<Value, SequenceError>> {
        async move {
            if scope.nested_depth >= MAX_NESTED_DEPTH {
                return Err(SequenceError::NestedThread(format!(
                    "nested sequence calls exceeded depth {}",
                    MAX_NESTED_DEPTH
                )));
            }

            let definition = self
                .definitions
                .find_by_id(sequence_id)
                .await?
                .ok_or(SequenceError::DefinitionNotFound(sequence_id))?;
            definition.validate()?;

            let mut state = SequenceExecutorState::new(
                &definition,
                scope.flow_uid,
                Uuid::new_v4(),
                input,
                self.clock.utc_now(),
                SequenceExecutorStateCustomization {
                    prevent_state_storage: true,
                },
            );
            state.initialize(&definition);

            let child_scope = StepScope {
                flow_uid: scope.flow_uid,
                instance_id: state.instance_id(),
                nested_depth: scope.nested_depth + 1,
                cancel: scope.cancel,
            };
            debug!(flow_uid = %scope.flow_uid, sequence_id = %sequence_id, depth = child_scope.nested_depth, "Running nested sequence");

            while !state.main_thread().job_done() {
                if scope.cancel.is_cancelled() {
                    return Err(SequenceError::Cancelled);
                }
                let (thread, context_data) = state.parts_mut();
                self.step(&definition, thread, context_data, &child_scope).await;
            }

            let thread = state.main_thread();
            if thread.is_errored() {
                return Err(SequenceError::from_failure(thread.exception(), thread.error_message()));
            }
            Ok(thread.output().clone())
        }
        .boxed()
    }

    fn stage_completed(&self, stage: &StageDefinition, scope: &StepScope<'_>) {
        self.event_bus.publish_sequence_event(SequenceEvent::StageCompleted {
            flow_uid: scope.flow_uid,
            instance_id: scope.instance_id,
            stage_uid: stage.uid,
            stage_kind: stage.kind.kind_name().to_string(),
            completed_at: self.clock.utc_now(),
        });
    }

    fn fail(thread: &mut SequenceExecutorThreadState, scope: &StepScope<'_>, error: &SequenceError) {
        error!(
            flow_uid = %scope.flow_uid,
            instance_id = %scope.instance_id,
            stage_id = ?thread.cursor(),
            error = %error,
            "Stage failed"
        );
        thread.set_error(Some(error.to_string()), Some(error.to_exception()));
    }
}

enum StageOutcome {
    Output(Value),
    /// Elements to process in one inner thread each.
    Fork(Vec<Value>),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::clock::SystemClock;
    use crate::domain::sequence::definition::SequenceOptions;
    use crate::infrastructure::repositories::{InMemorySequenceDefinitionRepository, InMemorySequenceStateRepository};
    use serde_json::json;

    fn double(input: Value) -> Result<Value, SequenceError> {
        let n = input
            .as_i64()
            .ok_or_else(|| SequenceError::Handler(format!("not a number: {}", input)))?;
        Ok(json!(n * 2))
    }

    fn service() -> (SequenceExecutorService, Arc<InMemorySequenceStateRepository>) {
        let mut handlers = StageHandlerRegistry::new();
        handlers.register("double", Arc::new(double));
        handlers.register("fail", Arc::new(|_: Value| -> Result<Value, SequenceError> {
            Err(SequenceError::Handler("boom".to_string()))
        }));
        let states = Arc::new(InMemorySequenceStateRepository::new());
        let service = SequenceExecutorService::new(
            Arc::new(InMemorySequenceDefinitionRepository::new()),
            states.clone(),
            Arc::new(handlers),
            EventBus::new(64),
            Arc::new(SystemClock),
        );
        (service, states)
    }

    #[tokio::test]
    async fn test_call_stages_chain_outputs() {
        let (service, _) = service();
        let id = service
            .register_definition(SequenceDefinition::new(
                "double twice",
                vec![StageDefinition::call("a", "double"), StageDefinition::call("b", "double")],
            ))
            .await
            .unwrap();

        let result = service
            .execute(id, json!(3), ExecutionOptions::default(), &CancellationToken::new())
            .await
            .unwrap();
        assert!(result.succeeded);
        assert_eq!(result.output, json!(12));
    }

    #[tokio::test]
    async fn test_empty_sequence_returns_input() {
        let (service, _) = service();
        let id = service
            .register_definition(SequenceDefinition::new("empty", vec![]))
            .await
            .unwrap();
        let result = service
            .execute(id, json!({"a": 1}), ExecutionOptions::default(), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(result.output, json!({"a": 1}));
    }

    #[tokio::test]
    async fn test_foreach_aggregates_in_order() {
        let (service, _) = service();
        let inner = SequenceDefinition::new("inner", vec![StageDefinition::call("double", "double")]);
        let id = service
            .register_definition(SequenceDefinition::new(
                "fan out",
                vec![StageDefinition::foreach("each", inner, Some("/items".to_string()))],
            ))
            .await
            .unwrap();

        let result = service
            .execute(id, json!({"items": [1, 2, 3]}), ExecutionOptions::default(), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(result.output, json!([2, 4, 6]));
    }

    #[tokio::test]
    async fn test_foreach_skips_failed_elements() {
        let (service, _) = service();
        let inner = SequenceDefinition::new("inner", vec![StageDefinition::call("double", "double")]);
        let id = service
            .register_definition(SequenceDefinition::new(
                "fan out",
                vec![StageDefinition::foreach("each", inner, None)],
            ))
            .await
            .unwrap();

        let result = service
            .execute(id, json!([1, "x", 3]), ExecutionOptions::default(), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(result.output, json!([2, 6]));
    }

    #[tokio::test]
    async fn test_foreach_all_failed_fails_stage() {
        let (service, _) = service();
        let inner = SequenceDefinition::new("inner", vec![StageDefinition::call("fail", "fail")]);
        let id = service
            .register_definition(SequenceDefinition::new("fan out", vec![StageDefinition::foreach("each", inner, None)]))
            .await
            .unwrap();

        let err = service
            .execute(id, json!([1, 2]), ExecutionOptions::default(), &CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), "stage_failed");
    }

    #[tokio::test]
    async fn test_foreach_requires_array() {
        let (service, _) = service();
        let inner = SequenceDefinition::new("inner", vec![]);
        let id = service
            .register_definition(SequenceDefinition::new("fan out", vec![StageDefinition::foreach("each", inner, None)]))
            .await
            .unwrap();

        let err = service
            .execute(id, json!(5), ExecutionOptions::default(), &CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), "foreach_input_not_array");
    }

    #[tokio::test]
    async fn test_filter_select_and_context() {
        let (service, _) = service();
        let id = service
            .register_definition(SequenceDefinition::new(
                "pipeline",
                vec![
                    StageDefinition::push_to_context("keep", "original"),
                    StageDefinition::filter("active only", "/active", json!(true)),
                    StageDefinition::select("first", "/0/name"),
                ],
            ))
            .await
            .unwrap();

        let input = json!([
            {"name": "a", "active": false},
            {"name": "b", "active": true},
        ]);
        let result = service
            .execute(id, input, ExecutionOptions::default(), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(result.output, json!("b"));
    }

    #[tokio::test]
    async fn test_nested_sequence_call() {
        let (service, _) = service();
        let child = service
            .register_definition(SequenceDefinition::new("child", vec![StageDefinition::call("d", "double")]))
            .await
            .unwrap();
        let parent = service
            .register_definition(SequenceDefinition::new(
                "parent",
                vec![StageDefinition::nested("child", child), StageDefinition::call("d", "double")],
            ))
            .await
            .unwrap();

        let result = service
            .execute(parent, json!(5), ExecutionOptions::default(), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(result.output, json!(20));
    }

    #[tokio::test]
    async fn test_missing_handler_fails_execution() {
        let (service, states) = service();
        let id = service
            .register_definition(SequenceDefinition::new("bad", vec![StageDefinition::call("x", "missing")]))
            .await
            .unwrap();
        let instance_id = Uuid::new_v4();

        let err = service
            .execute(
                id,
                json!(1),
                ExecutionOptions {
                    instance_id: Some(instance_id),
                    ..Default::default()
                },
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), "handler_not_found");

        let saved = states.find_by_instance(instance_id).await.unwrap().unwrap();
        assert!(saved.main_thread.exception.is_some());
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let (service, states) = service();
        let id = service
            .register_definition(SequenceDefinition::new("one", vec![StageDefinition::call("d", "double")]))
            .await
            .unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let instance_id = Uuid::new_v4();

        let err = service
            .execute(
                id,
                json!(1),
                ExecutionOptions {
                    instance_id: Some(instance_id),
                    ..Default::default()
                },
                &cancel,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, SequenceError::Cancelled));

        let saved = states.find_by_instance(instance_id).await.unwrap().unwrap();
        assert_eq!(saved.main_thread.exception.unwrap().error_code, "cancelled");
    }

    #[tokio::test]
    async fn test_prevent_state_storage() {
        let (service, states) = service();
        let id = service
            .register_definition(
                SequenceDefinition::new("ephemeral", vec![StageDefinition::call("d", "double")]).with_options(
                    SequenceOptions {
                        prevent_state_storage: true,
                    },
                ),
            )
            .await
            .unwrap();

        service
            .execute(id, json!(1), ExecutionOptions::default(), &CancellationToken::new())
            .await
            .unwrap();
        assert!(states.is_empty());
    }
}
