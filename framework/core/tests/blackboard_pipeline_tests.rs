// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use democrite_core::application::{DemocriteNode, StageHandlerRegistry};
use democrite_core::domain::blackboard::events::{BlackboardEvent, StorageAction};
use democrite_core::domain::blackboard::record::{DataRecordContainer, RecordStatus};
use democrite_core::domain::blackboard::state::BlackboardLifeStatus;
use democrite_core::domain::blackboard::template::BlackboardTemplate;
use democrite_core::domain::blackboard::{BlackboardError, ProcessingIssue};
use democrite_core::domain::clock::{Clock, ManualClock};
use democrite_core::domain::config::DemocriteConfig;
use chrono::{Duration as ChronoDuration, TimeZone, Utc};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use uuid::Uuid;

const SENSOR_TEMPLATE: &str = r#"
uid: 2d7c3c1e-5a0b-4f55-9f0e-6c6b9f1c2a10
unique_template_name: sensors
controllers:
  limit_resolution_preference: keep_newest
logical_types:
  - kind: max_record
    pattern: "^reading$"
    max_record: 3
  - kind: number_range
    pattern: "^reading$"
    min: -40.0
    max: 60.0
  - kind: unique
    pattern: "^calibration$"
    allow_replacement: true
  - kind: remain_on_sealed
    pattern: "^calibration$"
"#;

async fn node(clock: Arc<ManualClock>) -> DemocriteNode {
    let node = DemocriteNode::start_with_clock(&DemocriteConfig::default(), StageHandlerRegistry::new(), clock)
        .await
        .expect("node starts");
    node.blackboards
        .register_template(BlackboardTemplate::from_yaml_str(SENSOR_TEMPLATE).expect("template parses"))
        .await
        .expect("template registered");
    node
}

fn clock() -> Arc<ManualClock> {
    Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2026, 3, 1, 8, 0, 0).unwrap()))
}

fn reading(clock: &ManualClock, value: f64) -> DataRecordContainer {
    let now = clock.advance(ChronoDuration::seconds(10));
    DataRecordContainer::new("reading", Uuid::new_v4(), format!("reading {}", value), Some(json!(value)), now)
}

#[tokio::test]
async fn test_readings_are_capped_keeping_newest() {
    let clock = clock();
    let node = node(clock.clone()).await;
    let board = node.blackboards.get_board("greenhouse", "sensors").await.unwrap();

    let mut pushed = Vec::new();
    for value in [18.0, 19.5, 21.0, 22.5, 23.0] {
        let record = reading(&clock, value);
        pushed.push(record.uid);
        board.push(record).await.unwrap();
    }

    let remaining: Vec<Uuid> = board
        .get_all_metadata(Some("^reading$"), None)
        .await
        .unwrap()
        .into_iter()
        .map(|m| m.uid)
        .collect();
    assert_eq!(remaining, pushed[2..].to_vec());
}

#[tokio::test]
async fn test_out_of_range_reading_rejected_with_issue() {
    let clock = clock();
    let node = node(clock.clone()).await;
    let board = node.blackboards.get_board("greenhouse", "sensors").await.unwrap();

    let err = board.push(reading(&clock, 60.0)).await.unwrap_err();
    match err {
        BlackboardError::PushValidation(ProcessingIssue::NumberRange { value, .. }) => assert_eq!(value, 60.0),
        other => panic!("unexpected error: {other}"),
    }
    board.push(reading(&clock, 59.9)).await.unwrap();
}

#[tokio::test]
async fn test_events_flush_in_command_order() {
    let clock = clock();
    let node = node(clock.clone()).await;
    let board = node.blackboards.get_board("greenhouse", "sensors").await.unwrap();
    let mut events = node.event_bus.subscribe_board(board.id().uid);

    let first = DataRecordContainer::new("calibration", Uuid::new_v4(), "cal v1", Some(json!({"offset": 0.1})), clock.utc_now());
    board.push(first.clone()).await.unwrap();
    clock.advance(ChronoDuration::seconds(5));
    let second = DataRecordContainer::new("calibration", Uuid::new_v4(), "cal v2", Some(json!({"offset": 0.2})), clock.utc_now());
    board.push(second.clone()).await.unwrap();

    let mut received = Vec::new();
    for _ in 0..3 {
        let event = timeout(Duration::from_secs(1), events.recv()).await.unwrap().unwrap();
        if let BlackboardEvent::Storage { action, record, .. } = event {
            received.push((action, record.uid));
        }
    }

    assert_eq!(
        received,
        vec![
            (StorageAction::Add, first.uid),
            (StorageAction::Remove, first.uid),
            (StorageAction::Add, second.uid),
        ]
    );
}

#[tokio::test]
async fn test_seal_keeps_only_retained_records() {
    let clock = clock();
    let node = node(clock.clone()).await;
    let board = node.blackboards.get_board("greenhouse", "sensors").await.unwrap();

    let calibration = DataRecordContainer::new("calibration", Uuid::new_v4(), "cal", Some(json!({})), clock.utc_now());
    board.push(calibration.clone()).await.unwrap();
    board.push(reading(&clock, 20.0)).await.unwrap();
    board.push(reading(&clock, 21.0)).await.unwrap();

    board.seal().await.unwrap();

    let remaining = board.get_all_metadata(None, None).await.unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].uid, calibration.uid);
    assert_eq!(board.life_status().await.unwrap(), BlackboardLifeStatus::Sealed);
    assert!(matches!(board.push(reading(&clock, 22.0)).await, Err(BlackboardError::Sealed(_))));
}

#[tokio::test]
async fn test_status_and_metadata_changes() {
    let clock = clock();
    let node = node(clock.clone()).await;
    let board = node.blackboards.get_board("greenhouse", "sensors").await.unwrap();

    let record = reading(&clock, 20.0);
    board.push(record.clone()).await.unwrap();

    clock.advance(ChronoDuration::seconds(30));
    board.change_status(record.uid, RecordStatus::Sealed).await.unwrap();
    board
        .change_metadata(record.uid, Some([("source".to_string(), "sensor-7".to_string())].into()))
        .await
        .unwrap();

    let metadata = board.get_all_metadata(None, Some(RecordStatus::Sealed)).await.unwrap();
    assert_eq!(metadata.len(), 1);
    assert_eq!(metadata[0].creation_time_utc, record.creation_time_utc);
    assert_eq!(metadata[0].last_update_time_utc, clock.utc_now());
    assert_eq!(
        metadata[0].custom_metadata.as_ref().and_then(|m| m.get("source")).map(String::as_str),
        Some("sensor-7")
    );

    assert!(matches!(
        board.remove(Uuid::new_v4()).await,
        Err(BlackboardError::RecordNotFound(_))
    ));
}

#[tokio::test]
async fn test_same_board_name_across_templates_are_distinct() {
    let clock = clock();
    let node = node(clock.clone()).await;
    node.blackboards
        .register_template(BlackboardTemplate::new("inventory", vec![]).unwrap())
        .await
        .unwrap();

    let sensors = node.blackboards.get_board("shared", "sensors").await.unwrap();
    let inventory = node.blackboards.get_board("shared", "inventory").await.unwrap();
    assert_ne!(sensors.id().uid, inventory.id().uid);
    assert_eq!(node.blackboards.registered_boards().await.len(), 2);
}
