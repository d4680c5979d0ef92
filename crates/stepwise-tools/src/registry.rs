// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::mpsc::UnboundedSender;

use crate::events::ToolEvent;
use crate::tool::{ErrorHandler, Tool, ToolResult};

/// A tool's schema as exposed to the LM Orchestrator's tool catalog.
#[derive(Debug, Clone)]
pub struct ToolSchema {
    pub name: String,
    pub description: String,
    pub schema: Value,
}

/// A synthesized auxiliary step produced by [`ToolRegistry::find_recovery`].
#[derive(Debug, Clone)]
pub struct RecoveryStep {
    pub description: String,
    pub tool_name: String,
    pub tool_args: HashMap<String, Value>,
}

/// Central registry holding all available tools plus the error-recovery
/// patterns they declare.
///
/// Registration happens once at startup; reads are lock-free afterward
/// (§5 "Tool Registry is append-mostly").
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
    /// Ordered list of (pattern, owning tool name) so `find_recovery` can
    /// report the first substring match in registration order.
    handler_patterns: Vec<(&'static str, String)>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
            handler_patterns: Vec::new(),
        }
    }

    /// Store `tool` under its name, replacing any prior registration
    /// (invariant: names are unique, last registration wins). If the tool
    /// declares error handlers, their patterns are indexed for recovery.
    pub fn register(&mut self, tool: impl Tool + 'static) {
        let name = tool.name().to_string();
        self.handler_patterns.retain(|(_, owner)| owner != &name);
        let arc: Arc<dyn Tool> = Arc::new(tool);
        for handler in arc.error_handlers() {
            self.handler_patterns.push((handler.pattern, name.clone()));
        }
        self.tools.insert(name, arc);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    pub fn all(&self) -> Vec<Arc<dyn Tool>> {
        self.tools.values().cloned().collect()
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tools.keys().cloned().collect();
        names.sort();
        names
    }

    /// Schemas for every registered tool, sorted by name for deterministic
    /// prompt formatting.
    pub fn schemas(&self) -> Vec<ToolSchema> {
        let mut schemas: Vec<ToolSchema> = self
            .tools
            .values()
            .map(|t| ToolSchema {
                name: t.name().to_string(),
                description: t.description().to_string(),
                schema: t.schema(),
            })
            .collect();
        schemas.sort_by(|a, b| a.name.cmp(&b.name));
        schemas
    }

    /// Invoke `name` with `args`, publishing `TOOL_INPUT` / `TOOL_OUTPUT`
    /// events on `events` (when given) before and after execution, and
    /// running the tool's pre/post hooks around the call.
    pub async fn execute(
        &self,
        name: &str,
        args: &HashMap<String, Value>,
        events: Option<&UnboundedSender<ToolEvent>>,
    ) -> ToolResult {
        let Some(tool) = self.tools.get(name) else {
            return ToolResult::err(format!("unknown tool: {name}"));
        };

        if let Some(tx) = events {
            let _ = tx.send(ToolEvent::Input {
                tool_name: name.to_string(),
                args: serde_json::to_value(args).unwrap_or(Value::Null),
            });
        }

        tool.pre_execute(args).await;
        let result = tool.execute(args).await;
        tool.post_execute(&result).await;

        if let Some(tx) = events {
            let _ = tx.send(ToolEvent::Output {
                tool_name: name.to_string(),
                result: result.clone(),
            });
        }

        result
    }

    /// Find the first registered pattern contained as a substring of
    /// `error_text`, and build the recovery step it describes.
    ///
    /// `failed_step` is the dictionary form of the step that failed, passed
    /// through to the handler's `arg_generator` unchanged.
    pub fn find_recovery(&self, error_text: &str, failed_step: &Value) -> Option<RecoveryStep> {
        for (pattern, owner) in &self.handler_patterns {
            if error_text.contains(pattern) {
                let tool = self.tools.get(owner)?;
                let handler = tool
                    .error_handlers()
                    .into_iter()
                    .find(|h| &h.pattern == pattern)?;
                return Some(RecoveryStep {
                    description: handler.description.clone(),
                    tool_name: handler.tool_name.clone(),
                    tool_args: (handler.arg_generator)(error_text, failed_step),
                });
            }
        }
        None
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use serde_json::json;

    use super::*;

    struct EchoTool {
        name: &'static str,
    }

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &str {
            self.name
        }
        fn description(&self) -> &str {
            "echoes its input"
        }
        fn schema(&self) -> Value {
            json!({ "parameters": {"text": {"type": "string"}} })
        }
        async fn execute(&self, args: &HashMap<String, Value>) -> ToolResult {
            ToolResult::ok(json!(args.get("text").cloned().unwrap_or(Value::Null)))
        }
    }

    struct FailingTool;

    #[async_trait]
    impl Tool for FailingTool {
        fn name(&self) -> &str {
            "code_runner"
        }
        fn description(&self) -> &str {
            "runs code"
        }
        fn schema(&self) -> Value {
            json!({ "parameters": {"code": {"type": "string"}} })
        }
        async fn execute(&self, _args: &HashMap<String, Value>) -> ToolResult {
            ToolResult::err("ModuleNotFoundError: No module named 'foo'")
        }
    }

    struct PackageInstallerTool;

    #[async_trait]
    impl Tool for PackageInstallerTool {
        fn name(&self) -> &str {
            "package_installer"
        }
        fn description(&self) -> &str {
            "installs packages"
        }
        fn schema(&self) -> Value {
            json!({ "parameters": {"packages": {"type": "array"}} })
        }
        async fn execute(&self, _args: &HashMap<String, Value>) -> ToolResult {
            ToolResult::ok_empty()
        }
        fn error_handlers(&self) -> Vec<ErrorHandler> {
            vec![ErrorHandler {
                pattern: "No module named",
                description: "Install missing Python module".into(),
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

    #[test]
    fn register_and_get() {
        let mut reg = ToolRegistry::new();
        reg.register(EchoTool { name: "echo" });
        assert!(reg.get("echo").is_some());
    }

    #[test]
    fn get_unknown_returns_none() {
        let reg = ToolRegistry::new();
        assert!(reg.get("nope").is_none());
    }

    #[test]
    fn names_returns_all_registered_sorted() {
        let mut reg = ToolRegistry::new();
        reg.register(EchoTool { name: "b" });
        reg.register(EchoTool { name: "a" });
        assert_eq!(reg.names(), vec!["a", "b"]);
    }

    #[test]
    fn registering_same_name_twice_overwrites() {
        let mut reg = ToolRegistry::new();
        reg.register(EchoTool { name: "t" });
        reg.register(EchoTool { name: "t" });
        assert_eq!(reg.names().len(), 1);
    }

    #[tokio::test]
    async fn execute_known_tool_succeeds() {
        let mut reg = ToolRegistry::new();
        reg.register(EchoTool { name: "echo" });
        let mut args = HashMap::new();
        args.insert("text".into(), json!("hi"));
        let result = reg.execute("echo", &args, None).await;
        assert!(result.success);
        assert_eq!(result.data, Some(json!("hi")));
    }

    #[tokio::test]
    async fn execute_unknown_tool_returns_error() {
        let reg = ToolRegistry::new();
        let result = reg.execute("missing", &HashMap::new(), None).await;
        assert!(!result.success);
        assert!(result.error.unwrap().contains("unknown tool"));
    }

    #[tokio::test]
    async fn execute_publishes_input_and_output_events() {
        let mut reg = ToolRegistry::new();
        reg.register(EchoTool { name: "echo" });
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        reg.execute("echo", &HashMap::new(), Some(&tx)).await;
        drop(tx);
        let mut events = Vec::new();
        while let Some(ev) = rx.recv().await {
            events.push(ev);
        }
        assert_eq!(events.len(), 2);
        assert!(matches!(events[0], ToolEvent::Input { .. }));
        assert!(matches!(events[1], ToolEvent::Output { .. }));
    }

    #[test]
    fn find_recovery_matches_substring_pattern() {
        let mut reg = ToolRegistry::new();
        reg.register(FailingTool);
        reg.register(PackageInstallerTool);
        let recovery = reg
            .find_recovery(
                "ModuleNotFoundError: No module named 'foo'",
                &json!({"tool_name": "code_runner"}),
            )
            .expect("recovery step expected");
        assert_eq!(recovery.tool_name, "package_installer");
        assert_eq!(
            recovery.tool_args.get("packages"),
            Some(&json!(["foo"]))
        );
    }

    #[test]
    fn find_recovery_returns_none_without_match() {
        let mut reg = ToolRegistry::new();
        reg.register(PackageInstallerTool);
        assert!(reg
            .find_recovery("totally unrelated error", &json!({}))
            .is_none());
    }
}
