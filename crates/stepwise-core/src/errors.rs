// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Error kinds for the core. Tool failures themselves travel as
//! [`stepwise_tools::ToolResult`], not as this enum — `ToolError` below is
//! only the shape used when a tool failure must be reported as a hard error
//! (e.g. recovery exhausted).

use thiserror::Error;

/// Fatal at startup: missing credentials, unsupported provider.
#[derive(Debug, Error)]
#[error("configuration error: {0}")]
pub struct ConfigError(pub String);

/// Any failure inside an LM completion call. Retriable by the caller;
/// surfaces as a fallback plan (planning) or an apologetic response
/// (response generation).
#[derive(Debug, Error, Clone)]
#[error("language model error: {0}")]
pub struct LMError(pub String);

impl From<anyhow::Error> for LMError {
    fn from(e: anyhow::Error) -> Self {
        Self(e.to_string())
    }
}

/// A tool returned `success=false`.
#[derive(Debug, Error, Clone)]
#[error("tool error: {message}")]
pub struct ToolError {
    pub message: String,
    pub data: Option<serde_json::Value>,
}

/// Malformed LM JSON; treated like [`LMError`] with a standardized fallback.
#[derive(Debug, Error, Clone)]
#[error("failed to parse model response: {0}")]
pub struct ParseError(pub String);

/// A recovery handler ran and its retry still failed. The step stays FAILED.
#[derive(Debug, Error, Clone)]
#[error("recovery exhausted for step {step_id}: {message}")]
pub struct RecoveryExhausted {
    pub step_id: String,
    pub message: String,
}

/// Internal marker for a step skipped by duplicate detection (§4.7 step 2).
/// Never surfaced to a caller; steps skipped this way are marked `completed`.
#[derive(Debug, Error, Clone)]
#[error("duplicate of a previously executed step")]
pub struct DuplicateStep;
