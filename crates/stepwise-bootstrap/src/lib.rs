// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Bootstrap / dependency injection (§4.9): the one place allowed to
//! construct an [`stepwise_core::Agent`] and its collaborators from scratch.
//!
//! Everything downstream (the CLI, tests) takes an already-built `Agent`
//! rather than assembling a `ModelProvider`, `ToolRegistry`, `EventBus`,
//! `Memory`, or `LmOrchestrator` itself.

mod agent;
mod long_term_store;

pub use agent::build_agent;
pub use long_term_store::JsonFileLongTermStore;
