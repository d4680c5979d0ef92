// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Short-term and (optionally) long-term memory (§4.3).
//!
//! Short-term memory is a fixed-capacity ring buffer of [`Message`]s and
//! [`ExecutionRecord`]s, always present. Long-term durable storage is an
//! external collaborator: the core only depends on the [`LongTermStore`]
//! trait, not on any particular file format or database.

use std::collections::VecDeque;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Who produced a [`Message`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sender {
    User,
    Agent,
    System,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub sender: Sender,
    pub content: String,
    #[serde(default)]
    pub metadata: Value,
}

impl Message {
    pub fn new(sender: Sender, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            sender,
            content: content.into(),
            metadata: Value::Object(Default::default()),
        }
    }
}

/// Execution status of an [`ExecutionRecord`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Started,
    Completed,
    Failed,
}

/// One step's worth of bookkeeping, recorded by the Planning Engine as it
/// executes a plan. Distinct from [`crate::plan::PlanStep`]: a PlanStep is
/// live, mutable state owned by the engine for one message; an
/// ExecutionRecord is the durable trace of it left behind in Memory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionRecord {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub action: String,
    pub status: ExecutionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default)]
    pub metadata: Value,
}

impl ExecutionRecord {
    pub fn new(action: impl Into<String>, status: ExecutionStatus) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            action: action.into(),
            status,
            result: None,
            metadata: Value::Object(Default::default()),
        }
    }
}

/// Either kind of entry Memory can hold, for uniform search/eviction.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MemoryEntry {
    Message(Message),
    Execution(ExecutionRecord),
}

impl MemoryEntry {
    pub fn id(&self) -> &str {
        match self {
            Self::Message(m) => &m.id,
            Self::Execution(e) => &e.id,
        }
    }

    fn contains(&self, query: &str) -> bool {
        let query = query.to_lowercase();
        match self {
            Self::Message(m) => m.content.to_lowercase().contains(&query),
            Self::Execution(e) => e.action.to_lowercase().contains(&query),
        }
    }

    fn as_text_line(&self) -> String {
        match self {
            Self::Message(m) => format!("{:?}: {}", m.sender, m.content),
            Self::Execution(e) => format!("[{:?}] {}", e.status, e.action),
        }
    }
}

/// External collaborator contract for persistent long-term memory.
///
/// The core treats durability as out of scope: it only needs somewhere to
/// hand off entries that should survive past the ring buffer's eviction.
pub trait LongTermStore: Send + Sync {
    fn persist(&self, entry: &MemoryEntry) -> anyhow::Result<()>;
}

/// Short-term ring buffer (default capacity 10) plus an optional long-term
/// store. Single-writer (guarded by a mutex), multi-reader (readers get a
/// snapshot via `Vec::clone`).
pub struct Memory {
    capacity: usize,
    entries: Mutex<VecDeque<MemoryEntry>>,
    long_term: Option<Box<dyn LongTermStore>>,
}

impl Memory {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: Mutex::new(VecDeque::new()),
            long_term: None,
        }
    }

    pub fn with_long_term(capacity: usize, store: Box<dyn LongTermStore>) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: Mutex::new(VecDeque::new()),
            long_term: Some(store),
        }
    }

    fn push(&self, entry: MemoryEntry) {
        if let Some(store) = &self.long_term {
            let _ = store.persist(&entry);
        }
        let mut entries = self.entries.lock().expect("memory mutex poisoned");
        if entries.len() >= self.capacity {
            entries.pop_front();
        }
        entries.push_back(entry);
    }

    pub fn add_message(&self, message: Message) {
        self.push(MemoryEntry::Message(message));
    }

    pub fn add_execution(&self, record: ExecutionRecord) {
        self.push(MemoryEntry::Execution(record));
    }

    /// Snapshot of every Message currently held, in insertion order.
    pub fn messages(&self) -> Vec<Message> {
        self.entries
            .lock()
            .expect("memory mutex poisoned")
            .iter()
            .filter_map(|e| match e {
                MemoryEntry::Message(m) => Some(m.clone()),
                MemoryEntry::Execution(_) => None,
            })
            .collect()
    }

    /// Conversation history, either as a list of messages or flattened text.
    pub fn get_conversation_history(&self, as_text: bool) -> ConversationHistory {
        let messages = self.messages();
        if as_text {
            let text = messages
                .iter()
                .map(|m| format!("{:?}: {}", m.sender, m.content))
                .collect::<Vec<_>>()
                .join("\n");
            ConversationHistory::Text(text)
        } else {
            ConversationHistory::List(messages)
        }
    }

    /// Substring search over content/action text, newest-last.
    pub fn search(&self, query: &str) -> Vec<MemoryEntry> {
        self.entries
            .lock()
            .expect("memory mutex poisoned")
            .iter()
            .filter(|e| e.contains(query))
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().expect("memory mutex poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

pub enum ConversationHistory {
    Text(String),
    List(Vec<Message>),
}

impl ConversationHistory {
    pub fn into_text(self) -> String {
        match self {
            Self::Text(t) => t,
            Self::List(messages) => messages
                .into_iter()
                .map(|m| format!("{:?}: {}", m.sender, m.content))
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
