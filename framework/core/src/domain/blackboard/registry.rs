// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Blackboard Record Registry
//!
//! The authoritative ledger of which records exist on one board and in which
//! state. The raw index is only exposed read-only; the four verbs below are
//! the only way to change it, and each one replaces the stored metadata value
//! instead of editing it.
//!
//! Not internally synchronized: the owning board actor serializes access.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

use crate::domain::blackboard::record::{DataRecordContainer, RecordCustomMetadata, RecordMetadata, RecordStatus};
use crate::domain::clock::Clock;

/// Read-only view handed to validators.
pub type RecordIndex = HashMap<Uuid, RecordMetadata>;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BlackboardRecordRegistry {
    records: RecordIndex,
}

impl BlackboardRecordRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_metadata(entries: impl IntoIterator<Item = RecordMetadata>) -> Self {
        Self {
            records: entries.into_iter().map(|m| (m.uid, m)).collect(),
        }
    }

    pub fn records(&self) -> &RecordIndex {
        &self.records
    }

    pub fn get(&self, uid: &Uuid) -> Option<&RecordMetadata> {
        self.records.get(uid)
    }

    pub fn contains(&self, uid: &Uuid) -> bool {
        self.records.contains_key(uid)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Insert or replace the metadata of `record`.
    ///
    /// On replacement the original creation time and creator are kept. The
    /// update time is always taken from `clock`.
    pub fn push(&mut self, record: &DataRecordContainer, clock: &dyn Clock) -> RecordMetadata {
        let existing = self.records.get(&record.uid);

        let entry = RecordMetadata {
            creation_time_utc: existing.map_or(record.creation_time_utc, |e| e.creation_time_utc),
            creator_identity: match existing {
                Some(e) => e.creator_identity.clone(),
                None => record.creator_identity.clone(),
            },
            last_update_time_utc: clock.utc_now(),
            ..record.to_metadata()
        };

        self.records.insert(record.uid, entry.clone());
        entry
    }

    /// Remove and return the entry. No tombstone is kept.
    pub fn pop(&mut self, uid: &Uuid) -> Option<RecordMetadata> {
        self.records.remove(uid)
    }

    pub fn change_status(&mut self, uid: &Uuid, status: RecordStatus, clock: &dyn Clock) -> Option<RecordMetadata> {
        let entry = self.records.get_mut(uid)?;
        *entry = entry.with_status(status, clock.utc_now());
        Some(entry.clone())
    }

    pub fn change_metadata(
        &mut self,
        uid: &Uuid,
        metadata: Option<RecordCustomMetadata>,
        clock: &dyn Clock,
    ) -> Option<RecordMetadata> {
        let entry = self.records.get_mut(uid)?;
        *entry = entry.with_custom_metadata(metadata, clock.utc_now());
        Some(entry.clone())
    }

    pub fn to_surrogate(&self) -> RecordRegistrySurrogate {
        let mut record_metadatas: Vec<RecordMetadata> = self.records.values().cloned().collect();
        record_metadatas.sort_by_key(|m| (m.creation_time_utc, m.uid));
        RecordRegistrySurrogate { record_metadatas }
    }

    pub fn from_surrogate(surrogate: RecordRegistrySurrogate) -> Self {
        Self::from_metadata(surrogate.record_metadatas)
    }
}

/// Durable form of the registry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordRegistrySurrogate {
    #[serde(default)]
    pub record_metadatas: Vec<RecordMetadata>,
}
