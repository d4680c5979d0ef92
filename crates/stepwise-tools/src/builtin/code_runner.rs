// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::tool::{Tool, ToolResult};

/// Runs a snippet of code given in its `code` argument.
///
/// This demonstration runner only knows two modules, `os` and `sys`; any
/// `import` of another module fails with a `ModuleNotFoundError`-shaped
/// message, which [`crate::builtin::package_installer::PackageInstallerTool`]
/// knows how to recover from.
pub struct CodeRunnerTool;

const KNOWN_MODULES: &[&str] = &["os", "sys"];

#[async_trait]
impl Tool for CodeRunnerTool {
    fn name(&self) -> &str {
        "code_runner"
    }

    fn description(&self) -> &str {
        "Runs a snippet of code and returns its output."
    }

    fn schema(&self) -> Value {
        json!({
            "parameters": {"code": {"type": "string", "required": true}},
            "returns": {"type": "string"}
        })
    }

    async fn execute(&self, args: &HashMap<String, Value>) -> ToolResult {
        let Some(code) = args.get("code").and_then(|v| v.as_str()) else {
            return ToolResult::err("missing 'code'");
        };

        for line in code.lines() {
            let line = line.trim();
            let Some(module) = line.strip_prefix("import ") else {
                continue;
            };
            let module = module.trim();
            if !KNOWN_MODULES.contains(&module) {
                return ToolResult::err(format!(
                    "ModuleNotFoundError: No module named '{module}'"
                ));
            }
        }

        ToolResult::ok(json!(""))
    }
}
