// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::tool::{Tool, ToolResult};

/// Always returns the fixed string `"hello"`. Used together with [`crate::builtin::echo::EchoTool`]
/// to exercise placeholder chaining (`{step_1_result}`).
pub struct ReaderTool;

#[async_trait]
impl Tool for ReaderTool {
    fn name(&self) -> &str {
        "reader"
    }

    fn description(&self) -> &str {
        "Reads a fixed piece of content and returns it."
    }

    fn schema(&self) -> Value {
        json!({ "parameters": {}, "returns": {"type": "string"} })
    }

    async fn execute(&self, _args: &HashMap<String, Value>) -> ToolResult {
        ToolResult::ok(json!("hello"))
    }
}
