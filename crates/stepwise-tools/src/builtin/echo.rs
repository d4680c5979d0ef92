// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::tool::{Tool, ToolResult};

/// Returns its `text` argument unchanged.
pub struct EchoTool;

#[async_trait]
impl Tool for EchoTool {
    fn name(&self) -> &str {
        "echo"
    }

    fn description(&self) -> &str {
        "Returns the given text unchanged."
    }

    fn schema(&self) -> Value {
        json!({
            "parameters": {"text": {"type": "string", "required": true}},
            "returns": {"type": "string"}
        })
    }

    async fn execute(&self, args: &HashMap<String, Value>) -> ToolResult {
        match args.get("text") {
            Some(v) => ToolResult::ok(v.clone()),
            None => ToolResult::err("missing 'text'"),
        }
    }
}
