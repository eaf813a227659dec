// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Board identity and the top-level board registry.
//!
//! A board is identified by `(board_name, template_key)`. The registry hands
//! out one [`BlackboardId`] per pair and never a duplicate.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BlackboardId {
    pub uid: Uuid,
    pub board_name: String,
    pub template_key: String,
}

impl std::fmt::Display for BlackboardId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{} ({})", self.template_key, self.board_name, self.uid)
    }
}

type BoardKey = (String, String);

/// Registry of every known board, indexed by uid and by (name, template key).
#[derive(Debug, Clone, Default)]
pub struct BlackboardRegistryState {
    by_uid: HashMap<Uuid, BlackboardId>,
    by_key: HashMap<BoardKey, Uuid>,
}

impl BlackboardRegistryState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the id registered for the pair, or register a new one.
    ///
    /// The returned flag is `true` when a new id was created.
    pub fn create_new_blackboard_id(&mut self, board_name: &str, template_key: &str) -> (BlackboardId, bool) {
        self.create_with(board_name, template_key, Uuid::new_v4)
    }

    fn create_with(
        &mut self,
        board_name: &str,
        template_key: &str,
        mut next_uid: impl FnMut() -> Uuid,
    ) -> (BlackboardId, bool) {
        if let Some(existing) = self.try_get_by_name(board_name, template_key) {
            return (existing.clone(), false);
        }

        let mut uid = next_uid();
        while self.by_uid.contains_key(&uid) {
            uid = next_uid();
        }

        let id = BlackboardId {
            uid,
            board_name: board_name.to_string(),
            template_key: template_key.to_string(),
        };
        self.insert(id.clone());
        (id, true)
    }

    fn insert(&mut self, id: BlackboardId) {
        self.by_key
            .insert((id.board_name.clone(), id.template_key.clone()), id.uid);
        self.by_uid.insert(id.uid, id);
    }

    pub fn try_get(&self, uid: &Uuid) -> Option<&BlackboardId> {
        self.by_uid.get(uid)
    }

    pub fn try_get_by_name(&self, board_name: &str, template_key: &str) -> Option<&BlackboardId> {
        self.by_key
            .get(&(board_name.to_string(), template_key.to_string()))
            .and_then(|uid| self.by_uid.get(uid))
    }

    pub fn unregister(&mut self, uid: &Uuid) -> Option<BlackboardId> {
        let id = self.by_uid.remove(uid)?;
        self.by_key.remove(&(id.board_name.clone(), id.template_key.clone()));
        Some(id)
    }

    pub fn len(&self) -> usize {
        self.by_uid.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_uid.is_empty()
    }

    pub fn to_surrogate(&self) -> BlackboardRegistrySurrogate {
        let mut boards: Vec<BlackboardId> = self.by_uid.values().cloned().collect();
        boards.sort_by(|a, b| {
            (a.template_key.as_str(), a.board_name.as_str()).cmp(&(b.template_key.as_str(), b.board_name.as_str()))
        });
        BlackboardRegistrySurrogate { boards }
    }

    pub fn from_surrogate(surrogate: BlackboardRegistrySurrogate) -> Self {
        let mut state = Self::default();
        for id in surrogate.boards {
            state.insert(id);
        }
        state
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BlackboardRegistrySurrogate {
    #[serde(default)]
    pub boards: Vec<BlackboardId>,
}
