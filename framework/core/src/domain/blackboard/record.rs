// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Blackboard Records
//!
//! Value objects describing what lives on a board: the record container that
//! callers push (metadata + JSON payload) and the immutable metadata entry the
//! registry keeps for it.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Bounded Context:** Blackboard
//! - **Purpose:** Record identity, status and audit fields

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use uuid::Uuid;

/// Free-form key/value metadata attached to a record.
pub type RecordCustomMetadata = BTreeMap<String, String>;

// ============================================================================
// Enumerations
// ============================================================================

/// Lifecycle status of a single record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordStatus {
    /// Reserved slot without data yet
    Preparation,
    Active,
    Sealed,
    Decommissioned,
}

impl std::fmt::Display for RecordStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecordStatus::Preparation => write!(f, "preparation"),
            RecordStatus::Active => write!(f, "active"),
            RecordStatus::Sealed => write!(f, "sealed"),
            RecordStatus::Decommissioned => write!(f, "decommissioned"),
        }
    }
}

/// Whether a container carries its payload or only metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RecordContainerType {
    #[default]
    Direct,
    MetaData,
}

/// Shape of a record payload, derived from its JSON value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataKind {
    String,
    Integer,
    Float,
    /// Any numeric value (integer or float)
    Number,
    Boolean,
    Array,
    Object,
    /// Accepts every payload
    Any,
}

impl DataKind {
    /// Kind of a concrete JSON value. `Null` has no kind.
    pub fn of(value: &Value) -> Option<DataKind> {
        match value {
            Value::Null => None,
            Value::Bool(_) => Some(DataKind::Boolean),
            Value::Number(n) if n.is_f64() => Some(DataKind::Float),
            Value::Number(_) => Some(DataKind::Integer),
            Value::String(_) => Some(DataKind::String),
            Value::Array(_) => Some(DataKind::Array),
            Value::Object(_) => Some(DataKind::Object),
        }
    }

    /// Returns true when a payload of kind `other` can be stored where `self` is expected.
    pub fn is_assignable_from(&self, other: DataKind) -> bool {
        match (self, other) {
            (DataKind::Any, _) => true,
            (DataKind::Number, DataKind::Integer | DataKind::Float | DataKind::Number) => true,
            (DataKind::Float, DataKind::Integer) => true,
            (expected, actual) => *expected == actual,
        }
    }
}

impl std::fmt::Display for DataKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            DataKind::String => "string",
            DataKind::Integer => "integer",
            DataKind::Float => "float",
            DataKind::Number => "number",
            DataKind::Boolean => "boolean",
            DataKind::Array => "array",
            DataKind::Object => "object",
            DataKind::Any => "any",
        };
        write!(f, "{}", name)
    }
}

// ============================================================================
// Value Objects: Record Metadata
// ============================================================================

/// Registry entry for one record.
///
/// Never mutated in place: every registry verb builds a replacement value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordMetadata {
    pub uid: Uuid,
    pub logical_type: String,
    pub display_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contains_type: Option<DataKind>,
    pub record_container_type: RecordContainerType,
    pub status: RecordStatus,
    pub creation_time_utc: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub creator_identity: Option<String>,
    pub last_update_time_utc: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_updater_identity: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_metadata: Option<RecordCustomMetadata>,
}

impl RecordMetadata {
    pub(crate) fn with_status(&self, status: RecordStatus, now: DateTime<Utc>) -> Self {
        Self {
            status,
            last_update_time_utc: now,
            ..self.clone()
        }
    }

    pub(crate) fn with_custom_metadata(&self, metadata: Option<RecordCustomMetadata>, now: DateTime<Utc>) -> Self {
        Self {
            custom_metadata: metadata,
            last_update_time_utc: now,
            ..self.clone()
        }
    }
}

// ============================================================================
// Value Objects: Data Record Container
// ============================================================================

/// A record as pushed to (or read from) a board.
///
/// A container without `data` is a slot: it reserves a uid and a logical type
/// and carries no payload type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataRecordContainer {
    pub logical_type: String,
    pub uid: Uuid,
    pub display_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    pub status: RecordStatus,
    #[serde(default)]
    pub record_container_type: RecordContainerType,
    pub creation_time_utc: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creator_identity: Option<String>,
    pub last_update_time_utc: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updater_identity: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_metadata: Option<RecordCustomMetadata>,
}

impl DataRecordContainer {
    /// Create an active record stamped at `now`.
    pub fn new(
        logical_type: impl Into<String>,
        uid: Uuid,
        display_name: impl Into<String>,
        data: Option<Value>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            logical_type: logical_type.into(),
            uid,
            display_name: display_name.into(),
            data,
            status: RecordStatus::Active,
            record_container_type: RecordContainerType::Direct,
            creation_time_utc: now,
            creator_identity: None,
            last_update_time_utc: now,
            last_updater_identity: None,
            custom_metadata: None,
        }
    }

    /// Create an empty slot in `Preparation` status.
    pub fn slot(logical_type: impl Into<String>, uid: Uuid, display_name: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            status: RecordStatus::Preparation,
            ..Self::new(logical_type, uid, display_name, None, now)
        }
    }

    pub fn with_status(mut self, status: RecordStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_creator(mut self, identity: impl Into<String>) -> Self {
        let identity = identity.into();
        self.last_updater_identity = Some(identity.clone());
        self.creator_identity = Some(identity);
        self
    }

    pub fn with_custom_metadata(mut self, metadata: RecordCustomMetadata) -> Self {
        self.custom_metadata = Some(metadata);
        self
    }

    /// Payload kind, `None` for slots and `null` payloads.
    pub fn data_kind(&self) -> Option<DataKind> {
        self.data.as_ref().and_then(DataKind::of)
    }

    /// Copy with a new status and update time.
    pub fn with_new_status(&self, status: RecordStatus, now: DateTime<Utc>) -> Self {
        Self {
            status,
            last_update_time_utc: now,
            ..self.clone()
        }
    }

    /// Metadata view of this container, as stored by the registry for a new uid.
    pub fn to_metadata(&self) -> RecordMetadata {
        RecordMetadata {
            uid: self.uid,
            logical_type: self.logical_type.clone(),
            display_name: self.display_name.clone(),
            contains_type: self.data_kind(),
            record_container_type: self.record_container_type,
            status: self.status,
            creation_time_utc: self.creation_time_utc,
            creator_identity: self.creator_identity.clone(),
            last_update_time_utc: self.last_update_time_utc,
            last_updater_identity: self.last_updater_identity.clone(),
            custom_metadata: self.custom_metadata.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_data_kind_of_json_values() {
        assert_eq!(DataKind::of(&json!("a")), Some(DataKind::String));
        assert_eq!(DataKind::of(&json!(3)), Some(DataKind::Integer));
        assert_eq!(DataKind::of(&json!(3.5)), Some(DataKind::Float));
        assert_eq!(DataKind::of(&json!(true)), Some(DataKind::Boolean));
        assert_eq!(DataKind::of(&json!([1])), Some(DataKind::Array));
        assert_eq!(DataKind::of(&json!({"a": 1})), Some(DataKind::Object));
        assert_eq!(DataKind::of(&Value::Null), None);
    }

    #[test]
    fn test_data_kind_assignability() {
        assert!(DataKind::Number.is_assignable_from(DataKind::Integer));
        assert!(DataKind::Number.is_assignable_from(DataKind::Float));
        assert!(DataKind::Float.is_assignable_from(DataKind::Integer));
        assert!(!DataKind::Integer.is_assignable_from(DataKind::Float));
        assert!(DataKind::Any.is_assignable_from(DataKind::Object));
        assert!(!DataKind::String.is_assignable_from(DataKind::Boolean));
    }

    #[test]
    fn test_slot_has_no_data_kind() {
        let slot = DataRecordContainer::slot("order", Uuid::new_v4(), "pending", Utc::now());
        assert_eq!(slot.status, RecordStatus::Preparation);
        assert!(slot.data_kind().is_none());
        assert!(slot.to_metadata().contains_type.is_none());
    }
}
