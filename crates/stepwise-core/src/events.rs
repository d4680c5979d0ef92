// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Event Bus (§4.2): a bounded FIFO of typed events with single-consumer
//! streaming, used to drive the external SSE front-end (out of scope here —
//! we expose the stream, not the HTTP framing).

use std::collections::VecDeque;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use uuid::Uuid;

pub const DEFAULT_CAPACITY: usize = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    PlanGeneration,
    ToolInput,
    ToolOutput,
    PlanChange,
    ExecutionStep,
    ToolError,
    FinalSolution,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: EventType,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub data: Value,
    #[serde(default)]
    pub metadata: Value,
}

impl Event {
    pub fn new(event_type: EventType, data: Value) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            event_type,
            timestamp: Utc::now(),
            data,
            metadata: Value::Object(Default::default()),
        }
    }
}

/// Bounded FIFO of [`Event`]s. `publish` never blocks: when full, the oldest
/// event is dropped and a warning is logged (§4.2 overflow policy).
/// `subscribe` hands back a channel the caller reads from independently of
/// the internal buffer — it is the mechanism the SSE streamer actually
/// drains from; the buffer itself backs `drain_one` for pull-based readers.
pub struct EventBus {
    capacity: usize,
    queue: Mutex<VecDeque<Event>>,
    subscriber: Mutex<Option<UnboundedSender<Event>>>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            queue: Mutex::new(VecDeque::new()),
            subscriber: Mutex::new(None),
        }
    }

    pub fn publish(&self, event: Event) {
        if let Some(tx) = self.subscriber.lock().expect("event bus poisoned").as_ref() {
            let _ = tx.send(event.clone());
        }
        let mut queue = self.queue.lock().expect("event bus poisoned");
        if queue.len() >= self.capacity {
            tracing::warn!("event bus full (capacity {}), dropping oldest event", self.capacity);
            queue.pop_front();
        }
        queue.push_back(event);
    }

    /// Non-blocking pop of the oldest buffered event.
    pub fn drain_one(&self) -> Option<Event> {
        self.queue.lock().expect("event bus poisoned").pop_front()
    }

    /// Register (replacing any prior) single reader and return its receiver.
    pub fn subscribe(&self) -> UnboundedReceiver<Event> {
        let (tx, rx) = mpsc::unbounded_channel();
        *self.subscriber.lock().expect("event bus poisoned") = Some(tx);
        rx
    }

    pub fn len(&self) -> usize {
        self.queue.lock().expect("event bus poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
