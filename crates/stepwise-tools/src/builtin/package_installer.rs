// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::tool::{ErrorHandler, Tool, ToolResult};

/// Installs packages named in its `packages` argument.
///
/// Registers a recovery handler for `"No module named"` errors, extracting
/// the quoted module name out of a `ModuleNotFoundError`-shaped message so
/// [`crate::registry::ToolRegistry::find_recovery`] can synthesize a
/// `package_installer` step ahead of retrying a failed `code_runner` step.
pub struct PackageInstallerTool;

#[async_trait]
impl Tool for PackageInstallerTool {
    fn name(&self) -> &str {
        "package_installer"
    }

    fn description(&self) -> &str {
        "Installs the given packages."
    }

    fn schema(&self) -> Value {
        json!({
            "parameters": {"packages": {"type": "array", "items": {"type": "string"}, "required": true}},
            "returns": {"type": "null"}
        })
    }

    async fn execute(&self, args: &HashMap<String, Value>) -> ToolResult {
        match args.get("packages").and_then(|v| v.as_array()) {
            Some(_) => ToolResult::ok_empty(),
            None => ToolResult::err("missing 'packages'"),
        }
    }

    fn error_handlers(&self) -> Vec<ErrorHandler> {
        vec![ErrorHandler {
            pattern: "No module named",
            description: "Install the missing Python module".into(),
            tool_name: "package_installer".into(),
            arg_generator: Box::new(|error_text, _failed_step| {
                let module = error_text
                    .split('\'')
                    .nth(1)
                    .unwrap_or("unknown")
                    .to_string();
                let mut args = HashMap::new();
                args.insert("packages".into(), json!([module]));
                args
            }),
        }]
    }
}
