// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! LM Orchestrator (§4.5): prompt assembly for plan / re-plan / response
//! calls, a provider-agnostic chat-completion contract over
//! [`stepwise_model::ModelProvider`], and tolerant JSON parsing with
//! key-aliasing.

use chrono::Local;
use futures::StreamExt;
use regex::Regex;
use serde_json::{json, Map, Value};
use stepwise_model::{CompletionRequest, Message as ModelMessage, ModelProvider, ResponseEvent};
use stepwise_tools::ToolSchema;

use crate::errors::LMError;
use crate::plan::{Plan, PlanStep, StepStatus};

/// Context the Agent Facade hands the orchestrator for plan / re-plan calls
/// (§4.8's `planning context`).
#[derive(Debug, Clone)]
pub struct PlanningContext {
    pub conversation_history: String,
    pub available_tools: Vec<ToolSchema>,
    pub config: Value,
    pub current_date: String,
}

impl PlanningContext {
    pub fn new(conversation_history: String, available_tools: Vec<ToolSchema>) -> Self {
        Self {
            conversation_history,
            available_tools,
            config: Value::Object(Map::new()),
            current_date: Local::now().format("%B %-d, %Y").to_string(),
        }
    }
}

/// Outcome of a re-plan call (§4.5 "Re-plan response").
pub struct ReplanOutcome {
    pub plan_needs_adjustment: bool,
    pub updated_steps: Vec<PlanStep>,
    pub reasoning: String,
}

pub struct LmOrchestrator {
    provider: Box<dyn ModelProvider>,
}

impl LmOrchestrator {
    pub fn new(provider: Box<dyn ModelProvider>) -> Self {
        Self { provider }
    }

    pub fn model_name(&self) -> &str {
        self.provider.model_name()
    }

    /// Best-effort token count; matches the ≈4-chars-per-token heuristic used
    /// elsewhere in the stack (see `stepwise_model::Message::approx_tokens`).
    pub fn estimate_tokens(&self, text: &str) -> usize {
        (text.len() / 4).max(1)
    }

    /// §4.1's `chat_completion`: send `system` + `user` and collect the
    /// streamed text deltas into the final response text. The provider's
    /// streaming/tool-call surface is collapsed here — the core only ever
    /// asks for plain text completions.
    pub(crate) async fn chat_completion(&self, system: &str, user: &str) -> Result<String, LMError> {
        let request = CompletionRequest {
            messages: vec![ModelMessage::system(system), ModelMessage::user(user)],
            tools: vec![],
            stream: false,
            system_dynamic_suffix: None,
        };

        let mut stream = self
            .provider
            .complete(request)
            .await
            .map_err(LMError::from)?;

        let mut text = String::new();
        while let Some(event) = stream.next().await {
            match event.map_err(LMError::from)? {
                ResponseEvent::TextDelta(delta) => text.push_str(&delta),
                ResponseEvent::Done => break,
                _ => {}
            }
        }
        Ok(text)
    }

    /// `generate_plan(goal, context) -> Plan`. On parse or LM failure,
    /// returns a single-step fallback plan describing the failure (§4.5,
    /// §7).
    pub async fn generate_plan(&self, goal: &str, context: &PlanningContext) -> Plan {
        let system = plan_system_prompt(&context.current_date);
        let user = plan_user_prompt(goal, context);

        match self.chat_completion(&system, &user).await {
            Ok(text) => match parse_plan_response(&text) {
                Ok((steps, reasoning)) => {
                    let mut plan = Plan::new(goal, steps);
                    plan.metadata = json!({ "reasoning": reasoning });
                    plan
                }
                Err(err) => fallback_plan(goal, &format!("failed to parse plan: {err}")),
            },
            Err(err) => fallback_plan(goal, &format!("failed to create plan: {err}")),
        }
    }

    /// Re-plan after a successful step (§4.7 step 6). On any failure the
    /// previous plan is returned unchanged.
    pub async fn reevaluate_plan(
        &self,
        goal: &str,
        plan: &Plan,
        executed_steps: &[Value],
        last_result: &Value,
        context: &PlanningContext,
    ) -> ReplanOutcome {
        let system = plan_system_prompt(&context.current_date);
        let user = replan_user_prompt(goal, plan, executed_steps, last_result, context);

        let unchanged = || ReplanOutcome {
            plan_needs_adjustment: false,
            updated_steps: plan.steps.clone(),
            reasoning: plan
                .metadata
                .get("reasoning")
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string(),
        };

        let Ok(text) = self.chat_completion(&system, &user).await else {
            return unchanged();
        };

        match parse_replan_response(&text) {
            Ok(outcome) => outcome,
            Err(_) => unchanged(),
        }
    }

    /// Success-path final response (§4.8). `plan` is elided from the prompt
    /// when it is the default single-step "analyze and respond" plan.
    pub async fn generate_response(&self, goal: &str, plan: &Plan, context: &PlanningContext) -> String {
        let system = response_system_prompt(&context.current_date);
        let user = success_response_prompt(goal, plan, context);
        self.chat_completion(&system, &user)
            .await
            .unwrap_or_else(|err| format!("I completed the task but had trouble composing a response: {err}"))
    }

    /// Failure-path final response (§4.8, §7). Always user-visible.
    pub async fn generate_failure_response(&self, goal: &str, failed_step: &PlanStep, context: &PlanningContext) -> String {
        let system = response_system_prompt(&context.current_date);
        let user = failure_response_prompt(goal, failed_step, context);
        self.chat_completion(&system, &user)
            .await
            .unwrap_or_else(|_| {
                format!(
                    "I wasn't able to complete this: {}",
                    failed_step.error.as_deref().unwrap_or("an unknown error occurred")
                )
            })
    }

    /// Asks the LM to fix a failing code snippet (§4.7 step 4's
    /// code-fix retry path), returning the corrected code with any
    /// surrounding prose/fences stripped.
    pub async fn fix_code(&self, code: &str, error: &str) -> Result<String, LMError> {
        let system = "You fix broken code. Respond with only the corrected code.";
        let user = format!(
            "This code failed with the following error:\n\n{error}\n\nFix this code:\n\n```\n{code}\n```"
        );
        let text = self.chat_completion(system, &user).await?;
        Ok(extract_code_block(&text).unwrap_or(text))
    }
}

// ─── Prompt templates ─────────────────────────────────────────────────────────

fn tool_catalog(tools: &[ToolSchema]) -> String {
    if tools.is_empty() {
        return "(no tools registered)".to_string();
    }
    tools
        .iter()
        .map(|t| format!("- {} ({}): schema={}", t.name, t.description, t.schema))
        .collect::<Vec<_>>()
        .join("\n")
}

const PLACEHOLDER_INSTRUCTION: &str =
    "When a step needs the output of prior step N, use the literal token `{step_N_result}`.";

fn plan_system_prompt(current_date: &str) -> String {
    format!(
        "You are a planning assistant. Today's date is {current_date}. \
         Decompose the user's goal into an ordered list of steps. \
         Use exact parameter names from the tool schemas provided. \
         {PLACEHOLDER_INSTRUCTION} \
         Respond with JSON only: {{\"plan\": [...], \"reasoning\": \"...\"}}."
    )
}

fn plan_user_prompt(goal: &str, context: &PlanningContext) -> String {
    format!(
        "Goal: {goal}\n\nAvailable tools:\n{}\n\nConversation history:\n{}",
        tool_catalog(&context.available_tools),
        context.conversation_history,
    )
}

fn replan_user_prompt(goal: &str, plan: &Plan, executed_steps: &[Value], last_result: &Value, context: &PlanningContext) -> String {
    format!(
        "Goal: {goal}\n\nCurrent plan:\n{}\n\nExecuted steps:\n{}\n\nLast result:\n{last_result}\n\n\
         Available tools:\n{}\n\nConversation history:\n{}\n\n\
         Re-evaluate whether the remaining plan still makes sense. \
         Respond with JSON: {{\"plan_needs_adjustment\": bool, \"updated_plan\": [...], \"reasoning\": \"...\"}}.",
        plan.to_dict(),
        Value::Array(executed_steps.to_vec()),
        tool_catalog(&context.available_tools),
        context.conversation_history,
    )
}

fn response_system_prompt(current_date: &str) -> String {
    format!("You are a helpful assistant. Today's date is {current_date}.")
}

fn success_response_prompt(goal: &str, plan: &Plan, context: &PlanningContext) -> String {
    let is_default_plan = plan.steps.len() == 1
        && plan.steps[0].tool_name.is_none()
        && plan.steps[0].description == "Analyze the request and respond to the user";

    if is_default_plan {
        format!("Goal: {goal}\n\nConversation history:\n{}\n\nRespond directly to the goal.", context.conversation_history)
    } else {
        format!(
            "Goal: {goal}\n\nThe following plan was executed successfully:\n{}\n\n\
             Conversation history:\n{}\n\nCompose the final answer for the user.",
            plan.to_dict(),
            context.conversation_history,
        )
    }
}

fn failure_response_prompt(goal: &str, failed_step: &PlanStep, context: &PlanningContext) -> String {
    format!(
        "Goal: {goal}\n\nStep \"{}\" failed with error: {}\n\nConversation history:\n{}\n\n\
         Explain to the user, in plain language, that this could not be completed and why.",
        failed_step.description,
        failed_step.error.as_deref().unwrap_or("unknown error"),
        context.conversation_history,
    )
}

fn fallback_plan(goal: &str, reason: &str) -> Plan {
    let step = PlanStep::new(format!("Unable to create a plan: {reason}"));
    let mut plan = Plan::new(goal, vec![step]);
    plan.metadata = json!({ "reasoning": reason });
    plan
}

// ─── Tolerant JSON parsing (§4.5 "Return parsing", §9) ────────────────────────

/// Unwraps a ```-fenced block if present, otherwise returns the text as-is.
fn unfence(text: &str) -> &str {
    let re = Regex::new(r"(?s)```(?:json)?\s*(.*?)\s*```").expect("valid regex");
    match re.captures(text) {
        Some(caps) => caps.get(1).map(|m| m.as_str()).unwrap_or(text),
        None => text,
    }
}

fn extract_code_block(text: &str) -> Option<String> {
    let re = Regex::new(r"(?s)```(?:\w+)?\s*(.*?)\s*```").expect("valid regex");
    re.captures(text).and_then(|c| c.get(1)).map(|m| m.as_str().to_string())
}

/// Normalizes one step object's alternate key spellings (`task`→`description`,
/// `parameters`/`arguments`→`tool_args`) before handing it to
/// [`PlanStep::from_dict`].
fn normalize_step_keys(mut obj: Map<String, Value>) -> Map<String, Value> {
    if !obj.contains_key("description") {
        if let Some(task) = obj.remove("task") {
            obj.insert("description".into(), task);
        }
    }
    if !obj.contains_key("tool_args") {
        if let Some(params) = obj.remove("parameters").or_else(|| obj.remove("arguments")) {
            obj.insert("tool_args".into(), params);
        }
    }
    obj
}

fn steps_from_value(value: &Value) -> Vec<PlanStep> {
    value
        .as_array()
        .map(|arr| {
            arr.iter()
                .filter_map(|v| v.as_object().cloned())
                .map(|obj| PlanStep::from_dict(normalize_step_keys(obj)))
                .collect()
        })
        .unwrap_or_default()
}

/// Accepts `{plan: [...]}`, `{steps: [...]}` (aliased), or a root list
/// (wrapped with default reasoning) — see §4.5.
pub fn parse_plan_response(text: &str) -> Result<(Vec<PlanStep>, String), String> {
    let unfenced = unfence(text.trim());
    let value: Value = serde_json::from_str(unfenced).map_err(|e| e.to_string())?;

    match value {
        Value::Array(_) => Ok((steps_from_value(&value), String::new())),
        Value::Object(ref obj) => {
            let steps_value = obj
                .get("plan")
                .or_else(|| obj.get("steps"))
                .cloned()
                .ok_or_else(|| "no 'plan' or 'steps' key".to_string())?;
            let reasoning = obj
                .get("reasoning")
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string();
            Ok((steps_from_value(&steps_value), reasoning))
        }
        other => Err(format!("unexpected plan JSON shape: {other}")),
    }
}

fn parse_replan_response(text: &str) -> Result<ReplanOutcome, String> {
    let unfenced = unfence(text.trim());
    let value: Value = serde_json::from_str(unfenced).map_err(|e| e.to_string())?;

    match value {
        Value::Array(_) => Ok(ReplanOutcome {
            plan_needs_adjustment: true,
            updated_steps: steps_from_value(&value),
            reasoning: String::new(),
        }),
        Value::Object(obj) => {
            let plan_needs_adjustment = obj
                .get("plan_needs_adjustment")
                .and_then(|v| v.as_bool())
                .unwrap_or(true);
            let steps_value = obj
                .get("updated_plan")
                .or_else(|| obj.get("plan"))
                .or_else(|| obj.get("steps"))
                .cloned()
                .ok_or_else(|| "no plan found in re-plan response".to_string())?;
            let reasoning = obj
                .get("reasoning")
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string();
            Ok(ReplanOutcome {
                plan_needs_adjustment,
                updated_steps: steps_from_value(&steps_value),
                reasoning,
            })
        }
        other => Err(format!("unexpected re-plan JSON shape: {other}")),
    }
}

/// Verb-set used to classify a tool-less step as a "generation step"
/// (§4.7 step 4). Slightly larger than the upstream verb-set (adds
/// `synthesize`, `summarize`).
pub const GENERATION_VERBS: &[&str] = &[
    "generate", "create", "tell", "write", "compose", "explain", "answer", "provide",
    "describe", "synthesize", "summarize",
];

pub fn is_generation_step(description: &str) -> bool {
    let lower = description.to_lowercase();
    GENERATION_VERBS.iter().any(|verb| lower.contains(verb))
}

/// Phrases indicating a "deliberate no-tools" plan (§4.8, only the
/// phrase-match heuristic is adopted per §9).
pub const NO_TOOLS_PHRASES: &[&str] = &[
    "no tools needed", "no tool required", "language generation", "can be accomplished directly",
    "without using tools", "language task", "creative", "explanation", "general knowledge",
    "straightforward", "counting", "analysis", "directly",
];

pub fn is_deliberate_no_tools_plan(reasoning: &str) -> bool {
    let lower = reasoning.to_lowercase();
    NO_TOOLS_PHRASES.iter().any(|phrase| lower.contains(phrase))
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
