// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use async_trait::async_trait;
use democrite_core::application::{ExecutionOptions, SequenceExecutorService, StageContext, StageHandler, StageHandlerRegistry};
use democrite_core::domain::clock::SystemClock;
use democrite_core::domain::events::SequenceEvent;
use democrite_core::domain::repository::{SequenceDefinitionRepository, SequenceStateRepository};
use democrite_core::domain::sequence::{
    SequenceDefinition, SequenceError, SequenceExecutorState, SequenceExecutorStateCustomization, StageDefinition,
};
use democrite_core::infrastructure::event_bus::EventBus;
use democrite_core::infrastructure::repositories::{InMemorySequenceDefinitionRepository, InMemorySequenceStateRepository};
use chrono::Utc;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Adds one and counts invocations.
struct Increment {
    calls: AtomicUsize,
}

#[async_trait]
impl StageHandler for Increment {
    async fn handle(&self, input: Value, _context: &StageContext) -> Result<Value, SequenceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let n = input.as_i64().ok_or_else(|| SequenceError::Handler("expected an integer".to_string()))?;
        Ok(json!(n + 1))
    }
}

/// Reads a value pushed to the execution context.
struct ReadContext;

#[async_trait]
impl StageHandler for ReadContext {
    async fn handle(&self, _input: Value, context: &StageContext) -> Result<Value, SequenceError> {
        Ok(context.context_data.get("origin").cloned().unwrap_or(Value::Null))
    }
}

/// Cancels the execution while running.
struct CancelOnCall(CancellationToken);

#[async_trait]
impl StageHandler for CancelOnCall {
    async fn handle(&self, input: Value, _context: &StageContext) -> Result<Value, SequenceError> {
        self.0.cancel();
        Ok(input)
    }
}

struct Harness {
    service: SequenceExecutorService,
    definitions: Arc<InMemorySequenceDefinitionRepository>,
    states: Arc<InMemorySequenceStateRepository>,
    increment: Arc<Increment>,
    bus: EventBus,
    cancel: CancellationToken,
}

fn harness() -> Harness {
    let increment = Arc::new(Increment {
        calls: AtomicUsize::new(0),
    });
    let cancel = CancellationToken::new();
    let mut handlers = StageHandlerRegistry::new();
    handlers
        .register("increment", increment.clone())
        .register("read_context", Arc::new(ReadContext))
        .register("cancel", Arc::new(CancelOnCall(cancel.clone())));

    let definitions = Arc::new(InMemorySequenceDefinitionRepository::new());
    let states = Arc::new(InMemorySequenceStateRepository::new());
    let bus = EventBus::new(128);
    let service = SequenceExecutorService::new(
        definitions.clone(),
        states.clone(),
        Arc::new(handlers),
        bus.clone(),
        Arc::new(SystemClock),
    );

    Harness {
        service,
        definitions,
        states,
        increment,
        bus,
        cancel,
    }
}

fn with_instance(instance_id: Uuid) -> ExecutionOptions {
    ExecutionOptions {
        instance_id: Some(instance_id),
        ..Default::default()
    }
}

#[tokio::test]
async fn test_resume_from_checkpoint_skips_completed_stages() {
    let h = harness();
    let definition = SequenceDefinition::new(
        "three increments",
        vec![
            StageDefinition::call("one", "increment"),
            StageDefinition::call("two", "increment"),
            StageDefinition::call("three", "increment"),
        ],
    );
    h.definitions.save(&definition).await.unwrap();

    // Checkpoint as left by a crash right after stage one produced 11.
    let instance_id = Uuid::new_v4();
    let mut state = SequenceExecutorState::new(
        &definition,
        Uuid::new_v4(),
        instance_id,
        json!(10),
        Utc::now(),
        SequenceExecutorStateCustomization::default(),
    );
    state.initialize(&definition);
    state
        .main_thread_mut()
        .update(Some(definition.stages[0].uid), Uuid::new_v4(), Some(json!(11)), Vec::new());
    h.states.save(&state.to_surrogate()).await.unwrap();

    let result = h
        .service
        .execute(definition.uid, json!(10), with_instance(instance_id), &h.cancel)
        .await
        .unwrap();

    assert_eq!(result.output, json!(13));
    assert_eq!(h.increment.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_resume_with_cursor_outside_definition_fails() {
    let h = harness();
    let definition = SequenceDefinition::new(
        "two increments",
        vec![
            StageDefinition::call("one", "increment"),
            StageDefinition::call("two", "increment"),
        ],
    );
    h.definitions.save(&definition).await.unwrap();

    // Started on a stage the current definition no longer has.
    let instance_id = Uuid::new_v4();
    let mut state = SequenceExecutorState::new(
        &definition,
        Uuid::new_v4(),
        instance_id,
        json!(10),
        Utc::now(),
        SequenceExecutorStateCustomization::default(),
    );
    state.initialize(&definition);
    state
        .main_thread_mut()
        .update(Some(Uuid::new_v4()), Uuid::new_v4(), Some(json!(11)), Vec::new());
    h.states.save(&state.to_surrogate()).await.unwrap();

    let err = h
        .service
        .execute(definition.uid, json!(10), with_instance(instance_id), &h.cancel)
        .await
        .unwrap_err();

    assert_eq!(err.error_code(), "stage_not_found");
    assert_eq!(h.increment.calls.load(Ordering::SeqCst), 0);

    let saved = h.states.find_by_instance(instance_id).await.unwrap().unwrap();
    assert_eq!(saved.main_thread.exception.unwrap().error_code, "stage_not_found");
}

#[tokio::test]
async fn test_completed_instance_is_not_rerun() {
    let h = harness();
    let id = h
        .service
        .register_definition(SequenceDefinition::new("once", vec![StageDefinition::call("one", "increment")]))
        .await
        .unwrap();
    let instance_id = Uuid::new_v4();

    let first = h.service.execute(id, json!(1), with_instance(instance_id), &h.cancel).await.unwrap();
    let second = h.service.execute(id, json!(1), with_instance(instance_id), &h.cancel).await.unwrap();

    assert_eq!(first.output, second.output);
    assert_eq!(h.increment.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_lifecycle_events_are_published() {
    let h = harness();
    let id = h
        .service
        .register_definition(SequenceDefinition::new(
            "two stages",
            vec![StageDefinition::call("one", "increment"), StageDefinition::call("two", "increment")],
        ))
        .await
        .unwrap();
    let instance_id = Uuid::new_v4();
    let mut events = h.bus.subscribe_sequence(instance_id);

    h.service.execute(id, json!(0), with_instance(instance_id), &h.cancel).await.unwrap();

    let mut kinds = Vec::new();
    for _ in 0..4 {
        let event = timeout(Duration::from_secs(1), events.recv()).await.unwrap().unwrap();
        kinds.push(match event {
            SequenceEvent::SequenceStarted { resumed, .. } => {
                assert!(!resumed);
                "started"
            }
            SequenceEvent::StageCompleted { .. } => "stage",
            SequenceEvent::SequenceCompleted { result, .. } => {
                assert_eq!(result.output, json!(2));
                "completed"
            }
            SequenceEvent::SequenceFailed { .. } => "failed",
        });
    }
    assert_eq!(kinds, vec!["started", "stage", "stage", "completed"]);
}

#[tokio::test]
async fn test_context_data_visible_to_later_stages() {
    let h = harness();
    let id = h
        .service
        .register_definition(SequenceDefinition::new(
            "context",
            vec![
                StageDefinition::select("origin", "/origin"),
                StageDefinition::push_to_context("remember", "origin"),
                StageDefinition::select("reset", "/missing-is-error"),
            ],
        ))
        .await
        .unwrap();

    let err = h
        .service
        .execute(id, json!({"origin": "paris"}), ExecutionOptions::default(), &h.cancel)
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), "invalid_stage_input");

    let id = h
        .service
        .register_definition(SequenceDefinition::new(
            "context",
            vec![
                StageDefinition::select("origin", "/origin"),
                StageDefinition::push_to_context("remember", "origin"),
                StageDefinition::call("read", "read_context"),
            ],
        ))
        .await
        .unwrap();
    let result = h
        .service
        .execute(id, json!({"origin": "paris"}), ExecutionOptions::default(), &h.cancel)
        .await
        .unwrap();
    assert_eq!(result.output, json!("paris"));
}

#[tokio::test]
async fn test_cancellation_between_stages() {
    let h = harness();
    let id = h
        .service
        .register_definition(SequenceDefinition::new(
            "interrupted",
            vec![StageDefinition::call("stop", "cancel"), StageDefinition::call("never", "increment")],
        ))
        .await
        .unwrap();
    let instance_id = Uuid::new_v4();

    let err = h
        .service
        .execute(id, json!(1), with_instance(instance_id), &h.cancel)
        .await
        .unwrap_err();

    assert!(matches!(err, SequenceError::Cancelled));
    assert_eq!(h.increment.calls.load(Ordering::SeqCst), 0);
    let saved = h.states.find_by_instance(instance_id).await.unwrap().unwrap();
    assert_eq!(saved.main_thread.exception.map(|e| e.error_code), Some("cancelled".to_string()));
}

#[tokio::test]
async fn test_yaml_definition_with_foreach() {
    let h = harness();
    let yaml = r#"
uid: 9b2f3c55-0a1e-4f77-8d1c-2f4e5a6b7c80
display_name: bump all
stages:
  - display_name: each
    kind:
      type: foreach
      member: /values
      inner:
        uid: 1c3e5a7b-9d2f-4b6a-8c0e-1f3a5b7d9e20
        display_name: bump
        stages:
          - display_name: increment
            kind: { type: call, handler: increment }
"#;
    let id = h
        .service
        .register_definition(SequenceDefinition::from_yaml_str(yaml).unwrap())
        .await
        .unwrap();

    let result = h
        .service
        .execute(id, json!({"values": [1, 2, 3]}), ExecutionOptions::default(), &h.cancel)
        .await
        .unwrap();
    assert_eq!(result.output, json!([2, 3, 4]));
    assert_eq!(h.increment.calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_unknown_definition() {
    let h = harness();
    let missing = Uuid::new_v4();
    let err = h
        .service
        .execute(missing, json!(null), ExecutionOptions::default(), &h.cancel)
        .await
        .unwrap_err();
    assert!(matches!(err, SequenceError::DefinitionNotFound(id) if id == missing));
}
