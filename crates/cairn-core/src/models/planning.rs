//! Goals, plans, steps and the planning stack.

use std::str::FromStr;

use jiff::Timestamp;
use serde::{Deserialize, Serialize};

use super::{GoalStatus, StepStatus};
use crate::error::{CairnError, Result};

/// A unit of intent, usually tied to an issue.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Goal {
    pub id: u64,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issue_number: Option<u64>,
    pub status: GoalStatus,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// The plan attached to a goal.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Plan {
    pub id: u64,
    pub goal_id: u64,
    pub title: String,
    /// Steps in insertion order
    pub steps: Vec<PlanStep>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// A single step of a plan.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlanStep {
    pub id: u64,
    pub plan_id: u64,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Execution wave; lower waves run first
    pub wave: u32,
    /// Ids of steps that must be completed before this one
    #[serde(default)]
    pub depends_on: Vec<u64>,
    pub status: StepStatus,
    pub order: u32,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// What a planning stack entry refers to.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StackItemKind {
    Goal,
    Plan,
    Step,
}

impl StackItemKind {
    /// Convert to database string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            StackItemKind::Goal => "goal",
            StackItemKind::Plan => "plan",
            StackItemKind::Step => "step",
        }
    }
}

impl FromStr for StackItemKind {
    type Err = CairnError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "goal" => Ok(StackItemKind::Goal),
            "plan" => Ok(StackItemKind::Plan),
            "step" => Ok(StackItemKind::Step),
            _ => Err(CairnError::invalid_enum(
                "stack item",
                s,
                &["goal", "plan", "step"],
            )),
        }
    }
}

/// One entry of the planning stack, resolved to its title.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StackItem {
    pub position: u64,
    pub kind: StackItemKind,
    pub item_id: u64,
    pub title: String,
    pub pushed_at: Timestamp,
}

/// Snapshot of the planning stack. Items are ordered bottom to top.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct StackPeek {
    pub depth: usize,
    pub items: Vec<StackItem>,
    pub top_item: Option<StackItem>,
}

/// Completion breakdown of a plan and the steps that can be picked up next.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PlanProgress {
    pub plan_id: u64,
    pub total: usize,
    pub completed: usize,
    pub in_progress: usize,
    pub todo: usize,
    pub blocked: usize,
    /// Integer percentage of completed steps, 0 for an empty plan
    pub percentage: u8,
    pub next_steps: Vec<PlanStep>,
}

impl PlanProgress {
    /// Partition `plan`'s steps by status and pick the next actionable ones.
    ///
    /// A step is eligible when it is todo or in progress and every dependency
    /// inside the plan is completed. Of the eligible steps, only those in the
    /// lowest wave are returned. Dependencies on steps outside the plan are
    /// ignored.
    pub fn compute(plan: &Plan) -> Self {
        let total = plan.steps.len();
        let count = |status: StepStatus| plan.steps.iter().filter(|s| s.status == status).count();
        let completed = count(StepStatus::Completed);

        let dependency_met = |id: &u64| match plan.steps.iter().find(|s| s.id == *id) {
            Some(dep) => dep.status == StepStatus::Completed,
            None => {
                log::warn!(
                    "Plan {} step dependency {id} is not part of the plan; ignoring it",
                    plan.id
                );
                true
            }
        };

        let eligible: Vec<&PlanStep> = plan
            .steps
            .iter()
            .filter(|step| step.status.is_actionable())
            .filter(|step| step.depends_on.iter().all(dependency_met))
            .collect();

        let next_steps = match eligible.iter().map(|step| step.wave).min() {
            Some(wave) => eligible
                .into_iter()
                .filter(|step| step.wave == wave)
                .cloned()
                .collect(),
            None => Vec::new(),
        };

        let percentage = if total == 0 {
            0
        } else {
            (completed * 100 / total) as u8
        };

        Self {
            plan_id: plan.id,
            total,
            completed,
            in_progress: count(StepStatus::InProgress),
            todo: count(StepStatus::Todo),
            blocked: count(StepStatus::Blocked),
            percentage,
            next_steps,
        }
    }
}
