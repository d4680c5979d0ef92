// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Agent Facade (§4.8): binds one [`Memory`], one [`stepwise_tools::ToolRegistry`],
//! one [`EventBus`], one [`LmOrchestrator`], and one [`PlanningEngine`], and
//! maps an inbound message to a final response string.

use std::sync::Arc;

use chrono::Local;
use serde_json::json;
use stepwise_tools::ToolRegistry;

use crate::events::{Event, EventBus, EventType};
use crate::memory::{Memory, Message, Sender};
use crate::orchestrator::{is_deliberate_no_tools_plan, LmOrchestrator, PlanningContext};
use crate::plan::{Plan, StepStatus};
use crate::planner::PlanningEngine;

/// One turn of externally-supplied conversation history (§6: "Optional
/// `history` is a list of `{sender, content}`").
#[derive(Debug, Clone)]
pub struct HistoryTurn {
    pub sender: Sender,
    pub content: String,
}

/// Result of [`Agent::can_accomplish`].
#[derive(Debug, Clone, serde::Serialize)]
pub struct CanAccomplish {
    pub can_accomplish: bool,
    pub reason: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub missing_tools: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plan: Option<serde_json::Value>,
}

/// Binds all core subsystems and exposes the single inbound operation the
/// rest of the system calls (§4.8, §6).
pub struct Agent {
    memory: Memory,
    tools: Arc<ToolRegistry>,
    events: Arc<EventBus>,
    orchestrator: Arc<LmOrchestrator>,
    planning_enabled: bool,
}

impl Agent {
    pub fn new(
        memory: Memory,
        tools: Arc<ToolRegistry>,
        events: Arc<EventBus>,
        orchestrator: Arc<LmOrchestrator>,
        planning_enabled: bool,
    ) -> Self {
        Self {
            memory,
            tools,
            events,
            orchestrator,
            planning_enabled,
        }
    }

    pub fn events(&self) -> Arc<EventBus> {
        self.events.clone()
    }

    pub fn memory(&self) -> &Memory {
        &self.memory
    }

    /// `process_message(message, sender, history?) -> text` (§4.8).
    pub async fn process_message(
        &self,
        content: &str,
        sender: Sender,
        history: Option<Vec<HistoryTurn>>,
    ) -> String {
        let current_date = Local::now().format("%B %-d, %Y").to_string();

        let mut inbound = Message::new(sender, content);
        if inbound.metadata.get("current_date").is_none() {
            inbound.metadata = json!({ "current_date": current_date });
        }
        self.memory.add_message(inbound);

        let conversation_history = match history {
            Some(turns) => turns
                .iter()
                .map(|t| format!("{:?}: {}", t.sender, t.content))
                .collect::<Vec<_>>()
                .join("\n"),
            None => self.memory.get_conversation_history(true).into_text(),
        };

        let mut context = PlanningContext::new(conversation_history, self.tools.schemas());
        context.current_date = current_date;

        let response = if self.planning_enabled {
            let mut engine = PlanningEngine::new(self.tools.clone(), self.orchestrator.clone(), self.events.clone());
            let mut plan = engine.create_plan(content, &context).await;
            let ok = engine.execute_plan(&mut plan, content, &mut context, None).await;
            if ok {
                self.success_response(content, &plan, &context).await
            } else {
                self.failure_response(content, &plan, &context).await
            }
        } else {
            let plan = Plan::new(content, vec![]);
            self.orchestrator.generate_response(content, &plan, &context).await
        };

        self.events.publish(Event::new(EventType::FinalSolution, json!({ "text": response })));
        self.memory.add_message(Message::new(Sender::Agent, response.clone()));
        response
    }

    /// Success response policy (§4.8): a plan with tool steps, or a
    /// deliberate no-tool plan (detected via the reasoning phrase set),
    /// gets an LM-composed answer with the plan available in the prompt.
    /// Anything else (a tool-less plan that was not flagged as deliberate)
    /// gets a generic success message.
    async fn success_response(&self, goal: &str, plan: &Plan, context: &PlanningContext) -> String {
        let has_tool_steps = plan.steps.iter().any(|s| s.tool_name.is_some());
        let reasoning = plan.metadata.get("reasoning").and_then(|v| v.as_str()).unwrap_or("");
        if has_tool_steps || is_deliberate_no_tools_plan(reasoning) {
            self.orchestrator.generate_response(goal, plan, context).await
        } else {
            "Task completed successfully.".to_string()
        }
    }

    /// Failure response policy (§4.8, §7): explain the first FAILED step.
    /// Recovery attempted inside the engine (§4.7 step 4) is invisible here —
    /// only a step that is still FAILED after recovery reaches this path.
    async fn failure_response(&self, goal: &str, plan: &Plan, context: &PlanningContext) -> String {
        match plan.steps.iter().find(|s| s.status == StepStatus::Failed) {
            Some(failed) => self.orchestrator.generate_failure_response(goal, failed, context).await,
            None => "I wasn't able to complete this task.".to_string(),
        }
    }

    /// `can_accomplish(task) -> {can_accomplish, reason, missing_tools?, plan?}` (§4.8).
    pub async fn can_accomplish(&self, task: &str) -> CanAccomplish {
        let context = PlanningContext::new(self.memory.get_conversation_history(true).into_text(), self.tools.schemas());
        let plan = self.orchestrator.generate_plan(task, &context).await;

        let mut missing: Vec<String> = Vec::new();
        for step in &plan.steps {
            if let Some(name) = &step.tool_name {
                if self.tools.get(name).is_none() && !missing.contains(name) {
                    missing.push(name.clone());
                }
            }
        }

        let (can_accomplish, reason) = if missing.is_empty() {
            (true, "All required tools are registered.".to_string())
        } else {
            (false, format!("Missing tool(s): {}", missing.join(", ")))
        };

        CanAccomplish {
            can_accomplish,
            reason,
            missing_tools: if missing.is_empty() { None } else { Some(missing) },
            plan: Some(plan.to_dict()),
        }
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
