// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Event Bus Implementation - Pub/Sub for Judgement Events
//
// Provides in-memory event streaming using tokio broadcast channels.
// Publishing is synchronous and never blocks a judgement; events are lost on
// restart.

use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::domain::{JudgementEvent, JudgementEventPublisher};

/// Event bus for publishing and subscribing to judgement events
#[derive(Clone)]
pub struct EventBus {
    sender: Arc<broadcast::Sender<JudgementEvent>>,
}

impl EventBus {
    /// Create a new event bus with specified channel capacity
    /// Capacity determines how many events can be buffered before dropping old ones
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender: Arc::new(sender),
        }
    }

    /// Create event bus with default capacity (1000)
    pub fn with_default_capacity() -> Self {
        Self::new(1000)
    }

    /// Subscribe to all judgement events
    pub fn subscribe(&self) -> EventReceiver {
        EventReceiver {
            receiver: self.sender.subscribe(),
            link_id: None,
        }
    }

    /// Subscribe to events emitted by a single link
    pub fn subscribe_link(&self, link_id: impl Into<String>) -> EventReceiver {
        EventReceiver {
            receiver: self.sender.subscribe(),
            link_id: Some(link_id.into()),
        }
    }

    /// Get the number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl JudgementEventPublisher for EventBus {
    fn publish(&self, event: JudgementEvent) {
        debug!(event_type = event.event_type(), link_id = event.link_id(), "Publishing event");

        // send() only fails when nobody is subscribed
        if self.sender.send(event).is_err() {
            debug!("No subscribers listening to event");
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::with_default_capacity()
    }
}

/// Receiver for judgement events, optionally filtered to one link
pub struct EventReceiver {
    receiver: broadcast::Receiver<JudgementEvent>,
    link_id: Option<String>,
}

impl EventReceiver {
    fn matches(&self, event: &JudgementEvent) -> bool {
        self.link_id
            .as_deref()
            .map_or(true, |id| event.link_id() == id)
    }

    /// Receive the next matching event (waits until one is available)
    pub async fn recv(&mut self) -> Result<JudgementEvent, EventBusError> {
        loop {
            let event = self.receiver.recv().await.map_err(|e| match e {
                broadcast::error::RecvError::Closed => EventBusError::Closed,
                broadcast::error::RecvError::Lagged(n) => {
                    warn!("Event receiver lagged by {} events", n);
                    EventBusError::Lagged(n)
                }
            })?;
            if self.matches(&event) {
                return Ok(event);
            }
        }
    }

    /// Try to receive a matching event without blocking
    pub fn try_recv(&mut self) -> Result<JudgementEvent, EventBusError> {
        loop {
            let event = self.receiver.try_recv().map_err(|e| match e {
                broadcast::error::TryRecvError::Empty => EventBusError::Empty,
                broadcast::error::TryRecvError::Closed => EventBusError::Closed,
                broadcast::error::TryRecvError::Lagged(n) => {
                    warn!("Event receiver lagged by {} events", n);
                    EventBusError::Lagged(n)
                }
            })?;
            if self.matches(&event) {
                return Ok(event);
            }
        }
    }

    /// Drain every matching event currently buffered. Lag is skipped over,
    /// so the events still held after an overflow are returned.
    pub fn drain(&mut self) -> Vec<JudgementEvent> {
        let mut events = Vec::new();
        loop {
            match self.try_recv() {
                Ok(event) => events.push(event),
                Err(EventBusError::Lagged(_)) => continue,
                Err(EventBusError::Empty) | Err(EventBusError::Closed) => break,
            }
        }
        events
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
