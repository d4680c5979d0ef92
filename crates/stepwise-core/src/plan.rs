// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Plan model (§3, §4.6): the Plan/PlanStep entities, their status state
//! machine, and dependency-aware next-step selection.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
    /// Never produced by live logic (§9 Open Questions): the source's
    /// blocked-step branch is commented out upstream, so this variant exists
    /// for wire-format completeness only.
    Blocked,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanStep {
    pub id: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,
    #[serde(default)]
    pub tool_args: HashMap<String, Value>,
    #[serde(default)]
    pub depends_on: Vec<String>,
    pub status: StepStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default)]
    pub metadata: Value,
}

impl PlanStep {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            description: description.into(),
            tool_name: None,
            tool_args: HashMap::new(),
            depends_on: Vec::new(),
            status: StepStatus::Pending,
            result: None,
            error: None,
            metadata: Value::Object(Default::default()),
        }
    }

    pub fn with_tool(mut self, tool_name: impl Into<String>, tool_args: HashMap<String, Value>) -> Self {
        self.tool_name = Some(tool_name.into());
        self.tool_args = tool_args;
        self
    }

    pub fn mark_completed(&mut self, result: Value) {
        self.status = StepStatus::Completed;
        self.result = Some(result);
        self.error = None;
    }

    pub fn mark_failed(&mut self, error: impl Into<String>) {
        self.status = StepStatus::Failed;
        self.error = Some(error.into());
    }

    /// Builds a step from a normalized dictionary as produced by the LM
    /// Orchestrator's tolerant parser (§4.5). `id` is generated if absent;
    /// `description` defaults to a standard placeholder; an unrecognized
    /// `status` falls back to `pending` rather than erroring.
    pub fn from_dict(mut obj: serde_json::Map<String, Value>) -> Self {
        let id = obj
            .remove("id")
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        let description = obj
            .remove("description")
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap_or_else(|| "No description provided".to_string());

        let tool_name = obj.remove("tool_name").and_then(|v| match v {
            Value::String(s) if !s.is_empty() && s != "null" && s != "None" => Some(s),
            _ => None,
        });

        let tool_args: HashMap<String, Value> = obj
            .remove("tool_args")
            .and_then(|v| v.as_object().cloned())
            .map(|m| m.into_iter().collect())
            .unwrap_or_default();

        let depends_on = obj
            .remove("depends_on")
            .and_then(|v| v.as_array().cloned())
            .map(|a| a.into_iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
            .unwrap_or_default();

        let status = obj
            .remove("status")
            .and_then(|v| v.as_str().map(str::to_string))
            .and_then(|s| serde_json::from_value(Value::String(s)).ok())
            .unwrap_or(StepStatus::Pending);

        let result = obj.remove("result");
        let error = obj.remove("error").and_then(|v| v.as_str().map(str::to_string));
        let metadata = obj.remove("metadata").unwrap_or(Value::Object(Default::default()));

        Self {
            id,
            description,
            tool_name,
            tool_args,
            depends_on,
            status,
            result,
            error,
            metadata,
        }
    }

    pub fn to_dict(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Plan {
    pub id: String,
    pub goal: String,
    pub steps: Vec<PlanStep>,
    pub status: PlanStatus,
    #[serde(default)]
    pub metadata: Value,
}

impl Plan {
    /// Constructs a plan, inserting a fallback "analyze and respond" step if
    /// `steps` is empty (§3 invariant: a Plan always has at least one step).
    pub fn new(goal: impl Into<String>, mut steps: Vec<PlanStep>) -> Self {
        if steps.is_empty() {
            steps.push(PlanStep::new("Analyze the request and respond to the user"));
        }
        let mut plan = Self {
            id: Uuid::new_v4().to_string(),
            goal: goal.into(),
            steps,
            status: PlanStatus::Pending,
            metadata: Value::Object(Default::default()),
        };
        plan.update_status();
        plan
    }

    /// Recomputes `status` per the §4.6 fold table. First matching condition
    /// wins; the empty-plan case folds to `Pending` (unreachable once
    /// `Plan::new`'s fallback-step invariant holds, kept for robustness
    /// against direct mutation of `steps`).
    pub fn update_status(&mut self) {
        self.status = fold_statuses(self.steps.iter().map(|s| s.status));
    }

    /// First step in insertion order whose status is `Pending` and whose
    /// every dependency has status `Completed`.
    pub fn get_next_executable_step(&self) -> Option<&PlanStep> {
        self.steps.iter().find(|step| {
            step.status == StepStatus::Pending
                && step.depends_on.iter().all(|dep_id| {
                    self.steps
                        .iter()
                        .any(|s| &s.id == dep_id && s.status == StepStatus::Completed)
                })
        })
    }

    pub fn get_next_executable_step_mut(&mut self) -> Option<&mut PlanStep> {
        let completed: std::collections::HashSet<String> = self
            .steps
            .iter()
            .filter(|s| s.status == StepStatus::Completed)
            .map(|s| s.id.clone())
            .collect();
        self.steps.iter_mut().find(|step| {
            step.status == StepStatus::Pending
                && step.depends_on.iter().all(|dep_id| completed.contains(dep_id))
        })
    }

    pub fn step_mut(&mut self, id: &str) -> Option<&mut PlanStep> {
        self.steps.iter_mut().find(|s| s.id == id)
    }

    pub fn to_dict(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// The §4.6 status fold, extracted so both `Plan::update_status` and tests
/// can exercise it directly against a bare list of step statuses.
pub fn fold_statuses(statuses: impl IntoIterator<Item = StepStatus>) -> PlanStatus {
    let statuses: Vec<StepStatus> = statuses.into_iter().collect();
    if statuses.is_empty() {
        return PlanStatus::Pending;
    }
    if statuses.iter().any(|s| *s == StepStatus::Failed) {
        return PlanStatus::Failed;
    }
    if statuses.iter().all(|s| *s == StepStatus::Completed) {
        return PlanStatus::Completed;
    }
    if statuses.iter().any(|s| *s == StepStatus::InProgress) {
        return PlanStatus::InProgress;
    }
    if statuses.iter().any(|s| *s == StepStatus::Pending) {
        return PlanStatus::Pending;
    }
    PlanStatus::InProgress
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
