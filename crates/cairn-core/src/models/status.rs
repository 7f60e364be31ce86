//! Closed enumerations for workflows, actions, goals and plan steps.
//!
//! Every enum parses from its lowercase storage form and rejects anything
//! else with [`CairnError::InvalidEnum`].

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CairnError;

/// Lifecycle stage of a workflow.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum WorkflowPhase {
    #[default]
    Research,
    Implement,
    Review,
    Finalize,
    Planning,
    Execute,
    Merge,
    Cleanup,
}

impl WorkflowPhase {
    /// All phases in declaration order. The first one is the default.
    pub const ALL: [WorkflowPhase; 8] = [
        WorkflowPhase::Research,
        WorkflowPhase::Implement,
        WorkflowPhase::Review,
        WorkflowPhase::Finalize,
        WorkflowPhase::Planning,
        WorkflowPhase::Execute,
        WorkflowPhase::Merge,
        WorkflowPhase::Cleanup,
    ];

    /// Convert to database string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkflowPhase::Research => "research",
            WorkflowPhase::Implement => "implement",
            WorkflowPhase::Review => "review",
            WorkflowPhase::Finalize => "finalize",
            WorkflowPhase::Planning => "planning",
            WorkflowPhase::Execute => "execute",
            WorkflowPhase::Merge => "merge",
            WorkflowPhase::Cleanup => "cleanup",
        }
    }

    fn allowed() -> Vec<&'static str> {
        Self::ALL.iter().map(WorkflowPhase::as_str).collect()
    }
}

impl FromStr for WorkflowPhase {
    type Err = CairnError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        Self::ALL
            .into_iter()
            .find(|phase| phase.as_str() == wanted)
            .ok_or_else(|| CairnError::invalid_enum("phase", s, &Self::allowed()))
    }
}

/// Execution status of a workflow.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum WorkflowStatus {
    #[default]
    Running,
    Paused,
    Completed,
    Failed,
}

impl WorkflowStatus {
    pub const ALL: [WorkflowStatus; 4] = [
        WorkflowStatus::Running,
        WorkflowStatus::Paused,
        WorkflowStatus::Completed,
        WorkflowStatus::Failed,
    ];

    /// Convert to database string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkflowStatus::Running => "running",
            WorkflowStatus::Paused => "paused",
            WorkflowStatus::Completed => "completed",
            WorkflowStatus::Failed => "failed",
        }
    }
}

impl FromStr for WorkflowStatus {
    type Err = CairnError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "running" => Ok(WorkflowStatus::Running),
            "paused" => Ok(WorkflowStatus::Paused),
            "completed" => Ok(WorkflowStatus::Completed),
            "failed" => Ok(WorkflowStatus::Failed),
            _ => Err(CairnError::invalid_enum(
                "status",
                s,
                &["running", "paused", "completed", "failed"],
            )),
        }
    }
}

/// Outcome recorded on a workflow action.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ActionResult {
    #[default]
    Success,
    Failed,
    Pending,
}

impl ActionResult {
    /// Convert to database string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionResult::Success => "success",
            ActionResult::Failed => "failed",
            ActionResult::Pending => "pending",
        }
    }
}

impl FromStr for ActionResult {
    type Err = CairnError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "success" => Ok(ActionResult::Success),
            "failed" => Ok(ActionResult::Failed),
            "pending" => Ok(ActionResult::Pending),
            _ => Err(CairnError::invalid_enum(
                "result",
                s,
                &["success", "failed", "pending"],
            )),
        }
    }
}

/// Status of a goal on the planning stack.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum GoalStatus {
    #[default]
    Active,
    Paused,
    Completed,
    Abandoned,
}

impl GoalStatus {
    /// Convert to database string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            GoalStatus::Active => "active",
            GoalStatus::Paused => "paused",
            GoalStatus::Completed => "completed",
            GoalStatus::Abandoned => "abandoned",
        }
    }
}

impl FromStr for GoalStatus {
    type Err = CairnError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "active" => Ok(GoalStatus::Active),
            "paused" => Ok(GoalStatus::Paused),
            "completed" => Ok(GoalStatus::Completed),
            "abandoned" => Ok(GoalStatus::Abandoned),
            _ => Err(CairnError::invalid_enum(
                "goal status",
                s,
                &["active", "paused", "completed", "abandoned"],
            )),
        }
    }
}

/// Status of a single plan step.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    /// Step is pending
    #[default]
    Todo,

    /// Step is being worked on
    InProgress,

    /// Step has been completed
    Completed,

    /// Step cannot proceed until something outside the plan changes
    Blocked,
}

impl StepStatus {
    /// Convert to database string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            StepStatus::Todo => "todo",
            StepStatus::InProgress => "in_progress",
            StepStatus::Completed => "completed",
            StepStatus::Blocked => "blocked",
        }
    }

    /// Whether a step in this status can be picked up next.
    pub fn is_actionable(&self) -> bool {
        matches!(self, StepStatus::Todo | StepStatus::InProgress)
    }

    /// Get status with consistent icon formatting for display.
    ///
    /// ```rust
    /// use cairn_core::models::StepStatus;
    ///
    /// assert_eq!(StepStatus::Completed.with_icon(), "✓ Completed");
    /// assert_eq!(StepStatus::Todo.with_icon(), "○ Todo");
    /// ```
    pub fn with_icon(&self) -> &'static str {
        match self {
            StepStatus::Completed => "✓ Completed",
            StepStatus::InProgress => "➤ In Progress",
            StepStatus::Todo => "○ Todo",
            StepStatus::Blocked => "✗ Blocked",
        }
    }
}

impl FromStr for StepStatus {
    type Err = CairnError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "todo" => Ok(StepStatus::Todo),
            "inprogress" | "in_progress" | "in-progress" => Ok(StepStatus::InProgress),
            "completed" | "done" => Ok(StepStatus::Completed),
            "blocked" => Ok(StepStatus::Blocked),
            _ => Err(CairnError::invalid_enum(
                "step status",
                s,
                &["todo", "in_progress", "completed", "blocked"],
            )),
        }
    }
}
