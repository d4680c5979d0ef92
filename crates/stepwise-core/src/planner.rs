// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Planning Engine (§4.7): owns the execution loop — select the next
//! executable step, detect duplicates, resolve `{step_N_result}`
//! placeholders, dispatch to the Tool Registry or the LM, record the result,
//! re-plan, and (when the re-plan returns a new structure) reconstruct the
//! plan in place.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use regex::Regex;
use serde_json::{json, Map, Value};
use stepwise_tools::{ToolRegistry, ToolResult};
use tracing::warn;

use crate::events::{Event, EventBus, EventType};
use crate::orchestrator::{is_generation_step, LmOrchestrator, PlanningContext};
use crate::plan::{Plan, PlanStatus, PlanStep, StepStatus};

/// Default per-tool execution deadline (§5: "default 30 s for tools").
pub const DEFAULT_TOOL_TIMEOUT: Duration = Duration::from_secs(30);

/// Invoked after each executed step for progress reporting; does not affect
/// control flow (§4.7's optional `step_callback` on `execute_plan`).
pub type StepCallback<'a> = dyn Fn(&PlanStep) + Send + Sync + 'a;

/// Owns one execution pass over a [`Plan`]. Transient per-message state
/// (the executed-steps list) lives here rather than on `Plan` itself, per
/// §3's ownership note: plans are owned by the engine for the duration of
/// one inbound message and discarded afterward.
pub struct PlanningEngine {
    tools: Arc<ToolRegistry>,
    orchestrator: Arc<LmOrchestrator>,
    events: Arc<EventBus>,
    tool_timeout: Duration,
    executed_steps: Vec<Value>,
}

impl PlanningEngine {
    pub fn new(tools: Arc<ToolRegistry>, orchestrator: Arc<LmOrchestrator>, events: Arc<EventBus>) -> Self {
        Self {
            tools,
            orchestrator,
            events,
            tool_timeout: DEFAULT_TOOL_TIMEOUT,
            executed_steps: Vec::new(),
        }
    }

    pub fn with_tool_timeout(mut self, timeout: Duration) -> Self {
        self.tool_timeout = timeout;
        self
    }

    /// Clears the executed-steps list, as required before reusing an engine
    /// instance for a new inbound message.
    pub fn reset(&mut self) {
        self.executed_steps.clear();
    }

    /// `create_plan(goal, context) -> Plan`. Publishes `PLAN_GENERATION`.
    pub async fn create_plan(&self, goal: &str, context: &PlanningContext) -> Plan {
        let plan = self.orchestrator.generate_plan(goal, context).await;
        self.events.publish(Event::new(EventType::PlanGeneration, plan.to_dict()));
        plan
    }

    /// Runs the §4.7 loop until no executable step remains. Returns `false`
    /// when a step ends in `failed` — mirroring "on any uncaught exception
    /// inside step execution... the outer loop returns false".
    pub async fn execute_plan(
        &mut self,
        plan: &mut Plan,
        goal: &str,
        context: &mut PlanningContext,
        step_callback: Option<&StepCallback<'_>>,
    ) -> bool {
        loop {
            match self.execute_next_step(plan, goal, context).await {
                Some(step) => {
                    if let Some(cb) = step_callback {
                        cb(&step);
                    }
                    if step.status == StepStatus::Failed {
                        return false;
                    }
                }
                None => {
                    plan.update_status();
                    return plan.status != PlanStatus::Failed;
                }
            }
        }
    }

    /// One iteration of the §4.7 loop: select → duplicate-check → resolve →
    /// execute → record → re-plan → reconstruct → update status. Returns
    /// `None` once no step is executable.
    pub async fn execute_next_step(&mut self, plan: &mut Plan, goal: &str, context: &mut PlanningContext) -> Option<PlanStep> {
        let mut step = plan.get_next_executable_step()?.clone();

        // 2. Duplicate detection.
        if self.is_duplicate(&step) {
            step.status = StepStatus::Completed;
            step.result = Some(json!("Step skipped to avoid duplication of previous step"));
            self.write_back(plan, step.clone());
            return Some(step);
        }

        // 3. Placeholder resolution.
        step.tool_args = self.resolve_placeholders(&step.tool_args);
        step.status = StepStatus::InProgress;
        self.write_back(plan, step.clone());

        // 4. Execute.
        self.execute_step_body(&mut step, goal, context).await;

        // 5. Record.
        self.executed_steps.push(step.to_dict());
        self.write_back(plan, step.clone());

        if step.status == StepStatus::Failed {
            return Some(step);
        }

        // 6-7. Re-plan and (if needed) reconstruct.
        self.replan_and_reconstruct(plan, goal, &step, context).await;
        plan.update_status();

        Some(step)
    }

    fn write_back(&self, plan: &mut Plan, step: PlanStep) {
        if let Some(slot) = plan.step_mut(&step.id) {
            *slot = step;
        }
        plan.update_status();
    }

    /// §4.7 step 2: case-insensitive description equality plus exact
    /// `tool_name` equality against every already-executed step. (The
    /// source's 80%-word-overlap fuzzy variant is not adopted — §9.)
    fn is_duplicate(&self, step: &PlanStep) -> bool {
        self.executed_steps.iter().any(|executed| {
            let desc_matches = executed
                .get("description")
                .and_then(|v| v.as_str())
                .map(|d| d.eq_ignore_ascii_case(&step.description))
                .unwrap_or(false);
            let tool_matches = executed.get("tool_name").and_then(|v| v.as_str()) == step.tool_name.as_deref();
            desc_matches && tool_matches
        })
    }

    // ─── Placeholder resolution (§4.7 step 3, §9 "recursive walk") ──────────

    fn resolve_placeholders(&self, args: &HashMap<String, Value>) -> HashMap<String, Value> {
        args.iter().map(|(k, v)| (k.clone(), self.resolve_value(v))).collect()
    }

    fn resolve_value(&self, value: &Value) -> Value {
        match value {
            Value::String(s) => self.resolve_string(s),
            Value::Array(items) => Value::Array(items.iter().map(|v| self.resolve_value(v)).collect()),
            Value::Object(map) => Value::Object(map.iter().map(|(k, v)| (k.clone(), self.resolve_value(v))).collect()),
            other => other.clone(),
        }
    }

    fn resolve_string(&self, s: &str) -> Value {
        let re = Regex::new(r"\{step_(\d+)_result\}").expect("valid regex");

        if let Some(full) = re.find(s) {
            if full.start() == 0 && full.end() == s.len() {
                let n: usize = re.captures(s).and_then(|c| c[1].parse().ok()).unwrap_or(0);
                return match self.step_result(n) {
                    Some(v) => v,
                    None => {
                        warn!("placeholder step_{n}_result is out of range; leaving literal");
                        Value::String(s.to_string())
                    }
                };
            }
        }

        let replaced = re.replace_all(s, |caps: &regex::Captures| {
            let n: usize = caps[1].parse().unwrap_or(0);
            match self.step_result(n) {
                Some(Value::String(raw)) => raw,
                Some(other) => other.to_string(),
                None => {
                    warn!("placeholder step_{n}_result is out of range; leaving literal");
                    caps[0].to_string()
                }
            }
        });
        Value::String(replaced.into_owned())
    }

    /// 1-based lookup into the already-executed-steps list.
    fn step_result(&self, n: usize) -> Option<Value> {
        if n == 0 {
            return None;
        }
        self.executed_steps.get(n - 1).and_then(|v| v.get("result").cloned())
    }

    // ─── Execution (§4.7 step 4) ─────────────────────────────────────────────

    async fn execute_step_body(&self, step: &mut PlanStep, goal: &str, context: &PlanningContext) {
        let Some(tool_name) = step.tool_name.clone() else {
            if is_generation_step(&step.description) {
                self.run_generation_step(step, goal, context).await;
            } else {
                step.mark_completed(json!("Step completed successfully"));
            }
            return;
        };

        let result = self.run_tool(&tool_name, &step.tool_args).await;
        if result.success {
            step.mark_completed(result.data.unwrap_or(Value::Null));
            return;
        }

        self.events.publish(Event::new(
            EventType::ToolError,
            json!({ "tool_name": tool_name, "error": result.error }),
        ));
        let error_text = result.error.clone().unwrap_or_default();

        // Recovery handler path (§4.4, §4.7 step 4, §7 policy).
        if let Some(recovery) = self.tools.find_recovery(&error_text, &step.to_dict()) {
            let recovery_result = self.run_tool(&recovery.tool_name, &recovery.tool_args).await;
            if recovery_result.success {
                let retry = self.run_tool(&tool_name, &step.tool_args).await;
                match retry.data_or_error() {
                    Ok(data) => step.mark_completed(data),
                    Err(msg) => step.mark_failed(msg),
                }
                return;
            }
        }

        // Code-fix path: only when no recovery handler matched and the
        // step's arguments carry a string field named `code`.
        if let Some(Value::String(code)) = step.tool_args.get("code").cloned() {
            if let Ok(fixed) = self.orchestrator.fix_code(&code, &error_text).await {
                step.tool_args.insert("code".into(), Value::String(fixed));
                let retry = self.run_tool(&tool_name, &step.tool_args).await;
                match retry.data_or_error() {
                    Ok(data) => step.mark_completed(data),
                    Err(msg) => step.mark_failed(msg),
                }
                return;
            }
        }

        step.mark_failed(error_text);
    }

    async fn run_generation_step(&self, step: &mut PlanStep, goal: &str, context: &PlanningContext) {
        let system = "You are an assistant completing one step of a larger plan.";
        let user = self.generation_prompt(goal, &step.description, context);
        match self.orchestrator.chat_completion(system, &user).await {
            Ok(text) => step.mark_completed(Value::String(text)),
            Err(err) => step.mark_failed(err.to_string()),
        }
    }

    fn generation_prompt(&self, goal: &str, description: &str, context: &PlanningContext) -> String {
        let summary = self
            .executed_steps
            .iter()
            .map(|s| {
                let desc = s.get("description").and_then(|v| v.as_str()).unwrap_or("");
                let result = s.get("result").map(|r| truncate(&r.to_string(), 200)).unwrap_or_default();
                let error = s.get("error").and_then(|v| v.as_str()).unwrap_or("");
                format!("- {desc} (result: {result}, error: {error})")
            })
            .collect::<Vec<_>>()
            .join("\n");

        format!(
            "Goal: {goal}\n\nCurrent step: {description}\n\nPrior steps:\n{summary}\n\n\
             Conversation history:\n{}\n\nProduce the content for this step.",
            context.conversation_history
        )
    }

    /// Publishes `TOOL_INPUT`/`TOOL_OUTPUT` around a single dispatch and
    /// applies the §5 per-tool deadline.
    async fn run_tool(&self, tool_name: &str, args: &HashMap<String, Value>) -> ToolResult {
        self.events.publish(Event::new(
            EventType::ToolInput,
            json!({ "tool_name": tool_name, "args": args }),
        ));

        let result = match tokio::time::timeout(self.tool_timeout, self.tools.execute(tool_name, args, None)).await {
            Ok(result) => result,
            Err(_) => ToolResult::err(format!("tool '{tool_name}' timed out after {:?}", self.tool_timeout)),
        };

        self.events.publish(Event::new(
            EventType::ToolOutput,
            json!({ "tool_name": tool_name, "result": &result }),
        ));
        result
    }

    // ─── Re-plan and reconstruction (§4.7 steps 6-7) ─────────────────────────

    async fn replan_and_reconstruct(&mut self, plan: &mut Plan, goal: &str, last_step: &PlanStep, context: &PlanningContext) {
        let last_result = last_step.result.clone().unwrap_or(Value::Null);
        let outcome = self
            .orchestrator
            .reevaluate_plan(goal, plan, &self.executed_steps, &last_result, context)
            .await;

        if !outcome.plan_needs_adjustment {
            return;
        }

        self.events.publish(Event::new(
            EventType::PlanChange,
            json!({ "reasoning": outcome.reasoning }),
        ));

        // id -> PlanStep index of currently completed steps, so their
        // captured results survive reconstruction (§8 invariant).
        let completed_index: HashMap<String, PlanStep> = plan
            .steps
            .iter()
            .filter(|s| s.status == StepStatus::Completed)
            .map(|s| (s.id.clone(), s.clone()))
            .collect();

        // `outcome.updated_steps` already went through the orchestrator's
        // normalizing parser (id generation, task/description and
        // parameters|arguments/tool_args aliasing, status defaulting to
        // pending) — see `orchestrator::steps_from_value`.
        let new_steps: Vec<PlanStep> = outcome
            .updated_steps
            .into_iter()
            .map(|returned| match completed_index.get(&returned.id) {
                Some(existing) if returned.status != StepStatus::Pending => existing.clone(),
                _ => returned,
            })
            .collect();

        plan.steps = new_steps;

        let mut metadata = if plan.metadata.is_object() {
            plan.metadata.clone()
        } else {
            Value::Object(Map::new())
        };
        if let Value::Object(map) = &mut metadata {
            map.insert("reasoning".to_string(), Value::String(outcome.reasoning));
        }
        plan.metadata = metadata;
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.len() <= max {
        s.to_string()
    } else {
        format!("{}...", &s[..max])
    }
}

/// Small extension so the retry/recovery arms above can turn a `ToolResult`
/// into a `Result` without repeating the success/data/error dance.
trait ToolResultExt {
    fn data_or_error(self) -> Result<Value, String>;
}

impl ToolResultExt for ToolResult {
    fn data_or_error(self) -> Result<Value, String> {
        if self.success {
            Ok(self.data.unwrap_or(Value::Null))
        } else {
            Err(self.error.unwrap_or_else(|| "tool failed".to_string()))
        }
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
