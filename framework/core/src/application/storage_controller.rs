// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Storage Controller - Application Layer
//!
//! Resolves validation issues raised while pushing a record by turning them
//! into follow-up board commands. The default controller only resolves
//! `MaxRecord` issues:
//!
//! | Mode | Kept records |
//! |------|--------------|
//! | `Reject` | none, the push fails |
//! | `ClearAll` | the new record only |
//! | `KeepNewest` / `KeepOldest` | by creation time |
//! | `KeepNewestUpdated` / `KeepOldestUpdated` | by last update time |
//!
//! A conflicting slot (`Preparation` record of the same logical type) is
//! filled by the new record instead of evicting anything.
//!
//! # Architecture
//!
//! - **Layer:** Application Layer
//! - **Called by:** the board actor, inside the push flow

use tracing::{debug, warn};
use uuid::Uuid;

use crate::domain::blackboard::commands::BlackboardCommand;
use crate::domain::blackboard::issues::ProcessingIssue;
use crate::domain::blackboard::record::{DataRecordContainer, RecordMetadata, RecordStatus};
use crate::domain::blackboard::rules::{LimitType, RemoveType};
use crate::domain::blackboard::template::ControllerOptions;

/// Turns an issue into replacement commands, or `None` when it cannot be resolved.
pub trait BlackboardStorageController: Send + Sync {
    fn resolve(&self, issue: &ProcessingIssue, board_options: &ControllerOptions) -> Option<Vec<BlackboardCommand>>;
}

#[derive(Debug, Clone, Default)]
pub struct DefaultStorageController {
    defaults: ControllerOptions,
}

/// A record competing for a slot under a limit.
struct Candidate {
    uid: Uuid,
    creation: chrono::DateTime<chrono::Utc>,
    update: chrono::DateTime<chrono::Utc>,
    is_new: bool,
}

impl DefaultStorageController {
    /// `defaults` apply when neither the issue nor the board states a preference.
    pub fn new(defaults: ControllerOptions) -> Self {
        Self { defaults }
    }

    fn limit_mode(&self, preference: Option<LimitType>, board: &ControllerOptions) -> LimitType {
        preference
            .or(board.limit_resolution_preference)
            .or(self.defaults.limit_resolution_preference)
            .unwrap_or(LimitType::Reject)
    }

    fn remove_mode(&self, preference: Option<RemoveType>, board: &ControllerOptions) -> RemoveType {
        preference
            .or(board.remove_resolution_preference)
            .or(self.defaults.remove_resolution_preference)
            .unwrap_or(RemoveType::Remove)
    }

    fn fill_slot(slot: &RecordMetadata, new_record: &DataRecordContainer) -> BlackboardCommand {
        let record = DataRecordContainer {
            uid: slot.uid,
            creation_time_utc: slot.creation_time_utc,
            creator_identity: slot.creator_identity.clone(),
            custom_metadata: new_record
                .custom_metadata
                .clone()
                .or_else(|| slot.custom_metadata.clone()),
            ..new_record.clone()
        };
        BlackboardCommand::add_or_replace(record)
    }

    /// Uids to evict so that at most `max_record_allow` candidates remain.
    fn evicted(mode: LimitType, max_record_allow: usize, mut candidates: Vec<Candidate>) -> Vec<Candidate> {
        let newest_first = |a: &chrono::DateTime<chrono::Utc>, b: &chrono::DateTime<chrono::Utc>, a_new: bool, b_new: bool| {
            // The new record wins ties for "newest".
            b.cmp(a).then_with(|| b_new.cmp(&a_new))
        };
        let oldest_first = |a: &chrono::DateTime<chrono::Utc>, b: &chrono::DateTime<chrono::Utc>, a_new: bool, b_new: bool| {
            a.cmp(b).then_with(|| a_new.cmp(&b_new))
        };

        match mode {
            LimitType::Reject => return Vec::new(),
            LimitType::ClearAll => {
                candidates.retain(|c| !c.is_new);
                return candidates;
            }
            LimitType::KeepNewest => {
                candidates.sort_by(|a, b| newest_first(&a.creation, &b.creation, a.is_new, b.is_new))
            }
            LimitType::KeepNewestUpdated => {
                candidates.sort_by(|a, b| newest_first(&a.update, &b.update, a.is_new, b.is_new))
            }
            LimitType::KeepOldest => {
                candidates.sort_by(|a, b| oldest_first(&a.creation, &b.creation, a.is_new, b.is_new))
            }
            LimitType::KeepOldestUpdated => {
                candidates.sort_by(|a, b| oldest_first(&a.update, &b.update, a.is_new, b.is_new))
            }
        }

        candidates.into_iter().skip(max_record_allow).collect()
    }
}

impl BlackboardStorageController for DefaultStorageController {
    fn resolve(&self, issue: &ProcessingIssue, board_options: &ControllerOptions) -> Option<Vec<BlackboardCommand>> {
        let ProcessingIssue::MaxRecord {
            max_record_allow,
            conflict_records,
            new_record,
            preference_resolution,
            preference_remove_resolution,
            counts_decommissioned,
        } = issue
        else {
            debug!(issue = issue.kind_name(), "No resolution for issue kind");
            return None;
        };

        let mode = self.limit_mode(*preference_resolution, board_options);
        if mode == LimitType::Reject {
            return None;
        }

        if let Some(slot) = conflict_records
            .iter()
            .find(|r| r.status == RecordStatus::Preparation && r.logical_type == new_record.logical_type)
        {
            debug!(slot_uid = %slot.uid, record_uid = %new_record.uid, "Filling prepared slot");
            return Some(vec![Self::fill_slot(slot, new_record)]);
        }

        let mut candidates: Vec<Candidate> = conflict_records
            .iter()
            .map(|r| Candidate {
                uid: r.uid,
                creation: r.creation_time_utc,
                update: r.last_update_time_utc,
                is_new: false,
            })
            .collect();
        candidates.push(Candidate {
            uid: new_record.uid,
            creation: new_record.creation_time_utc,
            update: new_record.last_update_time_utc,
            is_new: true,
        });

        let evicted = Self::evicted(mode, *max_record_allow, candidates);
        let new_record_evicted = evicted.iter().any(|c| c.is_new);
        let mut remove_mode = self.remove_mode(*preference_remove_resolution, board_options);
        if *counts_decommissioned && remove_mode == RemoveType::Decommission {
            // Decommissioned records still hold their place under this limit.
            debug!(record_uid = %new_record.uid, "Limit counts decommissioned records, removing instead");
            remove_mode = RemoveType::Remove;
        }

        let mut commands: Vec<BlackboardCommand> = if new_record_evicted {
            Vec::new()
        } else {
            evicted
                .iter()
                .map(|c| match remove_mode {
                    RemoveType::Remove => BlackboardCommand::RemoveRecord { uid: c.uid },
                    RemoveType::Decommission => BlackboardCommand::DecommissionRecord { uid: c.uid },
                })
                .collect()
        };

        if !new_record_evicted {
            commands.push(BlackboardCommand::add_or_replace(new_record.clone()));
        }

        if commands.is_empty() {
            warn!(record_uid = %new_record.uid, ?mode, "Limit resolution keeps existing records, rejecting");
            return Some(vec![BlackboardCommand::Reject { issue: issue.clone() }]);
        }

        Some(commands)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::clock::{Clock, ManualClock};
    use chrono::Duration;
    use serde_json::json;

    fn existing(clock: &ManualClock, logical_type: &str) -> RecordMetadata {
        let record = DataRecordContainer::new(logical_type, Uuid::new_v4(), "old", Some(json!(1)), clock.utc_now());
        clock.advance(Duration::seconds(1));
        record.to_metadata()
    }

    fn limit_issue(max: usize, conflicts: Vec<RecordMetadata>, new_record: DataRecordContainer) -> ProcessingIssue {
        ProcessingIssue::MaxRecord {
            max_record_allow: max,
            conflict_records: conflicts,
            new_record,
            preference_resolution: None,
            preference_remove_resolution: None,
            counts_decommissioned: false,
        }
    }

    fn board(limit: LimitType) -> ControllerOptions {
        ControllerOptions {
            limit_resolution_preference: Some(limit),
            remove_resolution_preference: None,
        }
    }

    #[test]
    fn test_reject_without_any_preference() {
        let clock = ManualClock::default();
        let conflict = existing(&clock, "t");
        let new_record = DataRecordContainer::new("t", Uuid::new_v4(), "new", None, clock.utc_now());
        let issue = limit_issue(1, vec![conflict], new_record);

        assert!(DefaultStorageController::default()
            .resolve(&issue, &ControllerOptions::default())
            .is_none());
    }

    #[test]
    fn test_keep_newest_evicts_oldest_then_adds() {
        let clock = ManualClock::default();
        let oldest = existing(&clock, "t");
        let newer = existing(&clock, "t");
        let new_record = DataRecordContainer::new("t", Uuid::new_v4(), "new", None, clock.utc_now());
        let issue = limit_issue(2, vec![newer, oldest.clone()], new_record.clone());

        let commands = DefaultStorageController::default()
            .resolve(&issue, &board(LimitType::KeepNewest))
            .unwrap();
        assert_eq!(commands.len(), 2);
        assert!(matches!(commands[0], BlackboardCommand::RemoveRecord { uid } if uid == oldest.uid));
        assert!(matches!(&commands[1], BlackboardCommand::AddRecord { record, .. } if record.uid == new_record.uid));
    }

    #[test]
    fn test_keep_oldest_rejects_new_record() {
        let clock = ManualClock::default();
        let conflict = existing(&clock, "t");
        let new_record = DataRecordContainer::new("t", Uuid::new_v4(), "new", None, clock.utc_now());
        let issue = limit_issue(1, vec![conflict], new_record);

        let commands = DefaultStorageController::default()
            .resolve(&issue, &board(LimitType::KeepOldest))
            .unwrap();
        assert!(matches!(commands.as_slice(), [BlackboardCommand::Reject { .. }]));
    }

    #[test]
    fn test_issue_preference_overrides_board_and_decommission_mode() {
        let clock = ManualClock::default();
        let conflict = existing(&clock, "t");
        let new_record = DataRecordContainer::new("t", Uuid::new_v4(), "new", None, clock.utc_now());
        let issue = ProcessingIssue::MaxRecord {
            max_record_allow: 1,
            conflict_records: vec![conflict.clone()],
            new_record,
            preference_resolution: Some(LimitType::KeepNewest),
            preference_remove_resolution: Some(RemoveType::Decommission),
            counts_decommissioned: false,
        };

        let commands = DefaultStorageController::default()
            .resolve(&issue, &board(LimitType::Reject))
            .unwrap();
        assert!(matches!(commands[0], BlackboardCommand::DecommissionRecord { uid } if uid == conflict.uid));
    }

    #[test]
    fn test_decommission_becomes_remove_when_limit_counts_decommissioned() {
        let clock = ManualClock::default();
        let conflict = existing(&clock, "t");
        let new_record = DataRecordContainer::new("t", Uuid::new_v4(), "new", None, clock.utc_now());
        let issue = ProcessingIssue::MaxRecord {
            max_record_allow: 1,
            conflict_records: vec![conflict.clone()],
            new_record: new_record.clone(),
            preference_resolution: Some(LimitType::KeepNewest),
            preference_remove_resolution: Some(RemoveType::Decommission),
            counts_decommissioned: true,
        };

        let commands = DefaultStorageController::default()
            .resolve(&issue, &ControllerOptions::default())
            .unwrap();
        assert_eq!(commands.len(), 2);
        assert!(matches!(commands[0], BlackboardCommand::RemoveRecord { uid } if uid == conflict.uid));
        assert!(matches!(
            &commands[1],
            BlackboardCommand::AddRecord { record, .. } if record.uid == new_record.uid
        ));
    }

    #[test]
    fn test_clear_all_removes_every_conflict() {
        let clock = ManualClock::default();
        let conflicts = vec![existing(&clock, "t"), existing(&clock, "t"), existing(&clock, "t")];
        let new_record = DataRecordContainer::new("t", Uuid::new_v4(), "new", None, clock.utc_now());
        let issue = limit_issue(3, conflicts, new_record);

        let commands = DefaultStorageController::new(board(LimitType::ClearAll))
            .resolve(&issue, &ControllerOptions::default())
            .unwrap();
        let removed = commands
            .iter()
            .filter(|c| matches!(c, BlackboardCommand::RemoveRecord { .. }))
            .count();
        assert_eq!(removed, 3);
        assert!(matches!(commands.last(), Some(BlackboardCommand::AddRecord { .. })));
    }

    #[test]
    fn test_prepared_slot_is_filled_in_place() {
        let clock = ManualClock::default();
        let slot = DataRecordContainer::slot("t", Uuid::new_v4(), "slot", clock.utc_now()).to_metadata();
        clock.advance(Duration::seconds(5));
        let new_record = DataRecordContainer::new("t", Uuid::new_v4(), "value", Some(json!(7)), clock.utc_now());
        let issue = limit_issue(1, vec![slot.clone()], new_record);

        let commands = DefaultStorageController::default()
            .resolve(&issue, &board(LimitType::KeepNewest))
            .unwrap();
        match commands.as_slice() {
            [BlackboardCommand::AddRecord { record, .. }] => {
                assert_eq!(record.uid, slot.uid);
                assert_eq!(record.creation_time_utc, slot.creation_time_utc);
                assert_eq!(record.data, Some(json!(7)));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_other_issues_are_not_resolved() {
        let clock = ManualClock::default();
        let issue = ProcessingIssue::Unique {
            new_record: DataRecordContainer::new("t", Uuid::new_v4(), "new", None, clock.utc_now()),
        };
        assert!(DefaultStorageController::default()
            .resolve(&issue, &board(LimitType::KeepNewest))
            .is_none());
    }
}
