// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The result of executing a tool.
///
/// `success == false` iff `error` carries a non-empty message; `data` is only
/// meaningful when `success` is `true`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ToolResult {
    pub fn ok(data: impl Into<Value>) -> Self {
        Self {
            success: true,
            data: Some(data.into()),
            error: None,
        }
    }

    pub fn ok_empty() -> Self {
        Self {
            success: true,
            data: None,
            error: None,
        }
    }

    pub fn err(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }

    /// Boolean coercion equals `success`, matching the source contract.
    pub fn is_ok(&self) -> bool {
        self.success
    }
}

/// A recovery handler a tool registers for a class of errors it knows how
/// to remedy. `pattern` is matched as a plain substring of the failing
/// tool's error text (see [`crate::registry::ToolRegistry::find_recovery`]).
pub struct ErrorHandler {
    /// Substring pattern matched against a failed step's error text.
    pub pattern: &'static str,
    /// Human-readable description surfaced on the synthesized recovery step.
    pub description: String,
    /// Name of the tool the recovery step should invoke.
    pub tool_name: String,
    /// Builds the recovery step's `tool_args` from the error text and the
    /// dictionary form of the step that failed.
    pub arg_generator: Box<dyn Fn(&str, &Value) -> HashMap<String, Value> + Send + Sync>,
}

/// A single registered capability with a declared parameter schema.
///
/// Tools are a closed set enumerated and registered at startup — no runtime
/// class discovery. Implementations only need to describe their schema and
/// perform the actual side effect; registration, eventing and recovery
/// dispatch live in [`crate::registry::ToolRegistry`].
#[async_trait]
pub trait Tool: Send + Sync {
    /// Unique name. The registry rejects ambiguity by simply overwriting a
    /// prior registration under the same name (§ registry invariant).
    fn name(&self) -> &str;
    fn description(&self) -> &str;

    /// `{parameters: map, returns: map, example?}` — exposed to the LM
    /// Orchestrator's tool catalog formatting.
    fn schema(&self) -> Value;

    /// Perform the side effect. Errors are reported through `ToolResult`,
    /// never through a panic or a propagated exception.
    async fn execute(&self, args: &HashMap<String, Value>) -> ToolResult;

    /// Patterns this tool can recover from when registered as an auxiliary
    /// handler for some *other* tool's failures. Most tools expose none.
    fn error_handlers(&self) -> Vec<ErrorHandler> {
        Vec::new()
    }

    /// Invoked immediately before `execute`. Default is a no-op.
    async fn pre_execute(&self, _args: &HashMap<String, Value>) {}
    /// Invoked immediately after `execute`, given the result. Default is a no-op.
    async fn post_execute(&self, _result: &ToolResult) {}
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
