// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Event Bus - Pub/Sub for Domain Events
//!
//! In-memory event streaming over a tokio broadcast channel. Board actors
//! flush their command events here; the sequence executor publishes its
//! lifecycle events. Events are not persisted.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::domain::blackboard::events::BlackboardEvent;
use crate::domain::events::SequenceEvent;

/// Unified domain event type for the event bus
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DomainEvent {
    Blackboard(BlackboardEvent),
    Sequence(SequenceEvent),
}

/// Event bus for publishing and subscribing to domain events
#[derive(Clone)]
pub struct EventBus {
    sender: Arc<broadcast::Sender<DomainEvent>>,
}

impl EventBus {
    /// Capacity is the number of events buffered before slow receivers lag.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            sender: Arc::new(sender),
        }
    }

    pub fn with_default_capacity() -> Self {
        Self::new(1000)
    }

    pub fn publish_blackboard_event(&self, event: BlackboardEvent) {
        self.publish(DomainEvent::Blackboard(event));
    }

    pub fn publish_sequence_event(&self, event: SequenceEvent) {
        self.publish(DomainEvent::Sequence(event));
    }

    fn publish(&self, event: DomainEvent) {
        debug!("Publishing event: {:?}", event);

        // send() only fails when nobody is listening
        let receiver_count = self.sender.send(event).unwrap_or(0);
        if receiver_count == 0 {
            debug!("No subscribers listening to event");
        }
    }

    /// Subscribe to all domain events
    pub fn subscribe(&self) -> EventReceiver {
        EventReceiver {
            receiver: self.sender.subscribe(),
        }
    }

    /// Subscribe to the events of one board
    pub fn subscribe_board(&self, board_uid: Uuid) -> BoardEventReceiver {
        BoardEventReceiver {
            receiver: self.sender.subscribe(),
            board_uid,
        }
    }

    /// Subscribe to the events of one sequence execution
    pub fn subscribe_sequence(&self, instance_id: Uuid) -> SequenceEventReceiver {
        SequenceEventReceiver {
            receiver: self.sender.subscribe(),
            instance_id,
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::with_default_capacity()
    }
}

fn map_recv_error(e: broadcast::error::RecvError) -> EventBusError {
    match e {
        broadcast::error::RecvError::Closed => EventBusError::Closed,
        broadcast::error::RecvError::Lagged(n) => {
            warn!("Event receiver lagged by {} events", n);
            EventBusError::Lagged(n)
        }
    }
}

fn map_try_recv_error(e: broadcast::error::TryRecvError) -> EventBusError {
    match e {
        broadcast::error::TryRecvError::Empty => EventBusError::Empty,
        broadcast::error::TryRecvError::Closed => EventBusError::Closed,
        broadcast::error::TryRecvError::Lagged(n) => {
            warn!("Event receiver lagged by {} events", n);
            EventBusError::Lagged(n)
        }
    }
}

/// Receiver for all domain events
pub struct EventReceiver {
    receiver: broadcast::Receiver<DomainEvent>,
}

impl EventReceiver {
    pub async fn recv(&mut self) -> Result<DomainEvent, EventBusError> {
        self.receiver.recv().await.map_err(map_recv_error)
    }

    pub fn try_recv(&mut self) -> Result<DomainEvent, EventBusError> {
        self.receiver.try_recv().map_err(map_try_recv_error)
    }
}

/// Receiver filtered on one board
pub struct BoardEventReceiver {
    receiver: broadcast::Receiver<DomainEvent>,
    board_uid: Uuid,
}

impl BoardEventReceiver {
    pub async fn recv(&mut self) -> Result<BlackboardEvent, EventBusError> {
        loop {
            let event = self.receiver.recv().await.map_err(map_recv_error)?;
            if let DomainEvent::Blackboard(event) = event {
                if event.board_uid() == self.board_uid {
                    return Ok(event);
                }
            }
        }
    }

    /// Next buffered event of this board, skipping events of other boards.
    pub fn try_recv(&mut self) -> Result<BlackboardEvent, EventBusError> {
        loop {
            let event = self.receiver.try_recv().map_err(map_try_recv_error)?;
            if let DomainEvent::Blackboard(event) = event {
                if event.board_uid() == self.board_uid {
                    return Ok(event);
                }
            }
        }
    }
}

/// Receiver filtered on one sequence execution
pub struct SequenceEventReceiver {
    receiver: broadcast::Receiver<DomainEvent>,
    instance_id: Uuid,
}

impl SequenceEventReceiver {
    pub async fn recv(&mut self) -> Result<SequenceEvent, EventBusError> {
        loop {
            let event = self.receiver.recv().await.map_err(map_recv_error)?;
            if let DomainEvent::Sequence(event) = event {
                if event.instance_id() == self.instance_id {
                    return Ok(event);
                }
            }
        }
    }

    pub fn try_recv(&mut self) -> Result<SequenceEvent, EventBusError> {
        loop {
            let event = self.receiver.try_recv().map_err(map_try_recv_error)?;
            if let DomainEvent::Sequence(event) = event {
                if event.instance_id() == self.instance_id {
                    return Ok(event);
                }
            }
        }
    }
}

/// Errors that can occur when receiving events
#[derive(Debug, thiserror::Error)]
pub enum EventBusError {
    #[error("Event bus is closed")]
    Closed,

    #[error("No events available")]
    Empty,

    #[error("Receiver lagged by {0} events (events were dropped)")]
    Lagged(u64),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::blackboard::state::BlackboardLifeStatus;
    use chrono::Utc;

    fn life_event(board_uid: Uuid) -> BlackboardEvent {
        BlackboardEvent::LifeStatusChanged {
            board_uid,
            status: BlackboardLifeStatus::Running,
            at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_event_bus_publish_subscribe() {
        let event_bus = EventBus::new(10);
        let mut receiver = event_bus.subscribe();
        let board = Uuid::new_v4();

        event_bus.publish_blackboard_event(life_event(board));

        match receiver.recv().await.unwrap() {
            DomainEvent::Blackboard(event) => assert_eq!(event.board_uid(), board),
            other => panic!("Wrong event type received: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_board_event_filtering() {
        let event_bus = EventBus::new(10);
        let board = Uuid::new_v4();
        let mut receiver = event_bus.subscribe_board(board);

        event_bus.publish_blackboard_event(life_event(Uuid::new_v4()));
        event_bus.publish_blackboard_event(life_event(board));

        let received = receiver.recv().await.unwrap();
        assert_eq!(received.board_uid(), board);
    }

    #[tokio::test]
    async fn test_try_recv_empty() {
        let event_bus = EventBus::new(4);
        let mut receiver = event_bus.subscribe();
        assert_eq!(event_bus.subscriber_count(), 1);
        assert!(matches!(receiver.try_recv(), Err(EventBusError::Empty)));
    }
}
