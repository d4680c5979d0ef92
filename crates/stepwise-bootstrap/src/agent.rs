// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! [`build_agent`] — the assembler described in §4.9: turns one loaded
//! [`Config`] into a fully wired [`Agent`]. This is the only place allowed
//! to construct a `ModelProvider`, `ToolRegistry`, `EventBus`, `Memory`, or
//! `LmOrchestrator` from scratch.

use std::sync::Arc;

use stepwise_config::Config;
use stepwise_core::{Agent, EventBus, LmOrchestrator, Memory};
use stepwise_tools::{AdderTool, CodeRunnerTool, EchoTool, PackageInstallerTool, ReaderTool, ToolRegistry};

use crate::long_term_store::JsonFileLongTermStore;

/// Register the demonstration tools (§4.4) into a fresh registry.
fn build_tool_registry() -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(AdderTool);
    registry.register(ReaderTool);
    registry.register(EchoTool);
    registry.register(CodeRunnerTool);
    registry.register(PackageInstallerTool);
    registry
}

/// `Config -> ModelProvider + ToolRegistry + EventBus + Memory + LmOrchestrator -> Agent` (§4.9).
///
/// Fails fast on anything that would make the Agent unusable: an unknown
/// provider string, a missing Azure resource, or any other configuration
/// error surfaces here, before an `Agent` exists (§7).
pub fn build_agent(config: &Config) -> anyhow::Result<Agent> {
    let provider = stepwise_model::from_config(&config.model)?;
    let tools = Arc::new(build_tool_registry());
    let events = Arc::new(EventBus::new(config.agent.event_bus_capacity));
    let orchestrator = Arc::new(LmOrchestrator::new(provider));

    let memory = if config.agent.long_term_memory_enabled {
        let blob_root = config.agent.blob_storage_path.as_deref().unwrap_or("./");
        let path = std::path::Path::new(blob_root).join("long_term_memory.json");
        let store = JsonFileLongTermStore::new(path);
        Memory::with_long_term(config.agent.short_term_memory_capacity, Box::new(store))
    } else {
        Memory::new(config.agent.short_term_memory_capacity)
    };

    Ok(Agent::new(memory, tools, events, orchestrator, config.agent.planning_enabled))
}
