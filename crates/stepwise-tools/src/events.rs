// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use serde_json::Value;

use crate::tool::ToolResult;

/// Raised by [`crate::registry::ToolRegistry::execute`] immediately before and
/// after a tool runs. The Agent Facade translates these into `TOOL_INPUT` /
/// `TOOL_OUTPUT` records on the Event Bus; the tools crate has no dependency
/// on the event-bus type itself, only on this small enum.
#[derive(Debug, Clone)]
pub enum ToolEvent {
    Input { tool_name: String, args: Value },
    Output { tool_name: String, result: ToolResult },
}
