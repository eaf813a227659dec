// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Blackboard Grain State
//!
//! Aggregate root of one board: identity, template snapshot, record registry,
//! pending deferred queries, signal subscriptions and life status.
//!
//! # Architecture
//!
//! - **Layer:** Domain
//! - **Owner:** the board actor (`application::blackboard_service`), the only writer
//! - **Persistence:** [`BlackboardGrainStateSurrogate`] through `BlackboardStateRepository`

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

use crate::domain::blackboard::board::BlackboardId;
use crate::domain::blackboard::query::{BlackboardDeferredQueryState, SignalSubscription};
use crate::domain::blackboard::registry::{BlackboardRecordRegistry, RecordRegistrySurrogate};
use crate::domain::blackboard::template::BlackboardTemplate;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlackboardLifeStatus {
    #[default]
    None,
    WaitingInitialization,
    Running,
    Sealed,
}

impl std::fmt::Display for BlackboardLifeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            BlackboardLifeStatus::None => "none",
            BlackboardLifeStatus::WaitingInitialization => "waiting_initialization",
            BlackboardLifeStatus::Running => "running",
            BlackboardLifeStatus::Sealed => "sealed",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BlackboardGrainState {
    template: Option<BlackboardTemplate>,
    blackboard_id: Option<BlackboardId>,
    name: String,
    registry: BlackboardRecordRegistry,
    queries: HashMap<Uuid, BlackboardDeferredQueryState>,
    subscriptions: Vec<SignalSubscription>,
    life_status: BlackboardLifeStatus,
}

impl BlackboardGrainState {
    pub fn new() -> Self {
        Self::default()
    }

    /// A board is built once a template has been bound.
    pub fn is_built(&self) -> bool {
        self.template.is_some()
    }

    /// Bind `template` and `id`. Calling it again replaces the snapshot and
    /// keeps records, queries and life status.
    pub fn build_using_template(&mut self, template: BlackboardTemplate, id: BlackboardId) {
        if self.life_status == BlackboardLifeStatus::None {
            self.life_status = if template.configuration.initialization_required {
                BlackboardLifeStatus::WaitingInitialization
            } else {
                BlackboardLifeStatus::Running
            };
        }

        self.name = id.board_name.clone();
        self.blackboard_id = Some(id);
        self.template = Some(template);
    }

    pub fn template(&self) -> Option<&BlackboardTemplate> {
        self.template.as_ref()
    }

    pub fn blackboard_id(&self) -> Option<&BlackboardId> {
        self.blackboard_id.as_ref()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn registry(&self) -> &BlackboardRecordRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut BlackboardRecordRegistry {
        &mut self.registry
    }

    pub fn life_status(&self) -> BlackboardLifeStatus {
        self.life_status
    }

    pub fn set_life_status(&mut self, status: BlackboardLifeStatus) {
        self.life_status = status;
    }

    // ------------------------------------------------------------------
    // Deferred queries
    // ------------------------------------------------------------------

    /// Returns `true` only when the query is new or its value changed.
    pub fn add_or_update_query(&mut self, query: BlackboardDeferredQueryState) -> bool {
        match self.queries.get(&query.uid) {
            Some(existing) if *existing == query => false,
            _ => {
                self.queries.insert(query.uid, query);
                true
            }
        }
    }

    pub fn remove_query(&mut self, uid: &Uuid) -> Option<BlackboardDeferredQueryState> {
        self.queries.remove(uid)
    }

    /// Remove `query` only if the stored value is identical.
    pub fn remove_query_value(&mut self, query: &BlackboardDeferredQueryState) -> bool {
        if self.queries.get(&query.uid) == Some(query) {
            self.queries.remove(&query.uid);
            return true;
        }
        false
    }

    /// Snapshot of pending queries, oldest first.
    pub fn get_queries(&self) -> Vec<BlackboardDeferredQueryState> {
        let mut queries: Vec<_> = self.queries.values().cloned().collect();
        queries.sort_by_key(|q| (q.created_at, q.uid));
        queries
    }

    // ------------------------------------------------------------------
    // Signal subscriptions
    // ------------------------------------------------------------------

    /// Returns `false` when the signal is already subscribed from the same side.
    pub fn add_subscription(&mut self, subscription: SignalSubscription) -> bool {
        if self
            .subscriptions
            .iter()
            .any(|s| s.signal_id == subscription.signal_id && s.from_door == subscription.from_door)
        {
            return false;
        }
        self.subscriptions.push(subscription);
        true
    }

    pub fn get_subscription(&self, signal_id: &Uuid) -> Option<&SignalSubscription> {
        self.subscriptions.iter().find(|s| s.signal_id == *signal_id)
    }

    pub fn remove_subscription(&mut self, subscription_id: &Uuid) -> Option<SignalSubscription> {
        let index = self
            .subscriptions
            .iter()
            .position(|s| s.subscription_id == *subscription_id)?;
        Some(self.subscriptions.remove(index))
    }

    pub fn subscriptions(&self) -> &[SignalSubscription] {
        &self.subscriptions
    }

    /// Detach every subscription, returning them.
    pub fn clear_subscriptions(&mut self) -> Vec<SignalSubscription> {
        std::mem::take(&mut self.subscriptions)
    }

    // ------------------------------------------------------------------
    // Surrogate
    // ------------------------------------------------------------------

    pub fn to_surrogate(&self) -> BlackboardGrainStateSurrogate {
        BlackboardGrainStateSurrogate {
            template: self.template.clone(),
            blackboard_id: self.blackboard_id.clone(),
            name: self.name.clone(),
            registry: self.registry.to_surrogate(),
            queries: self.get_queries(),
            subscriptions: self.subscriptions.clone(),
            life_status: self.life_status,
        }
    }

    pub fn from_surrogate(surrogate: BlackboardGrainStateSurrogate) -> Self {
        Self {
            template: surrogate.template,
            blackboard_id: surrogate.blackboard_id,
            name: surrogate.name,
            registry: BlackboardRecordRegistry::from_surrogate(surrogate.registry),
            queries: surrogate.queries.into_iter().map(|q| (q.uid, q)).collect(),
            subscriptions: surrogate.subscriptions,
            life_status: surrogate.life_status,
        }
    }
}

/// Durable form of [`BlackboardGrainState`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BlackboardGrainStateSurrogate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template: Option<BlackboardTemplate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blackboard_id: Option<BlackboardId>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub registry: RecordRegistrySurrogate,
    #[serde(default)]
    pub queries: Vec<BlackboardDeferredQueryState>,
    #[serde(default)]
    pub subscriptions: Vec<SignalSubscription>,
    #[serde(default)]
    pub life_status: BlackboardLifeStatus,
}

impl BlackboardGrainStateSurrogate {
    pub fn board_uid(&self) -> Option<Uuid> {
        self.blackboard_id.as_ref().map(|id| id.uid)
    }
}
