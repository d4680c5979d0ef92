// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::tool::{Tool, ToolResult};

/// Adds two integers. Exists to exercise the single-tool-call path end to end.
pub struct AdderTool;

#[async_trait]
impl Tool for AdderTool {
    fn name(&self) -> &str {
        "adder"
    }

    fn description(&self) -> &str {
        "Adds two integers and returns the sum."
    }

    fn schema(&self) -> Value {
        json!({
            "parameters": {
                "a": {"type": "integer", "required": true},
                "b": {"type": "integer", "required": true}
            },
            "returns": {"type": "integer"},
            "example": {"a": 2, "b": 3}
        })
    }

    async fn execute(&self, args: &HashMap<String, Value>) -> ToolResult {
        let a = match args.get("a").and_then(|v| v.as_i64()) {
            Some(v) => v,
            None => return ToolResult::err("missing or non-integer 'a'"),
        };
        let b = match args.get("b").and_then(|v| v.as_i64()) {
            Some(v) => v,
            None => return ToolResult::err("missing or non-integer 'b'"),
        };
        ToolResult::ok(json!(a + b))
    }
}
