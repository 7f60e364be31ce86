//! Workflow checkpoint records.

use jiff::Timestamp;
use serde::{Deserialize, Serialize};

use super::{ActionResult, WorkflowPhase, WorkflowStatus};

/// One tracked attempt at an issue, with its current phase and status.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Workflow {
    /// Unique identifier for the workflow
    pub id: u64,

    /// Issue the workflow is working on
    pub issue_number: u64,

    /// Branch the work happens on
    pub branch: String,

    /// Worktree directory, when the workflow runs in a separate worktree
    #[serde(skip_serializing_if = "Option::is_none")]
    pub worktree: Option<String>,

    /// Current lifecycle phase
    pub phase: WorkflowPhase,

    /// Current execution status
    pub status: WorkflowStatus,

    /// Number of times the workflow was retried
    pub retry_count: u32,

    /// Timestamp when the workflow was created (UTC)
    pub created_at: Timestamp,

    /// Timestamp when the workflow was last modified (UTC)
    pub updated_at: Timestamp,
}

/// Immutable audit entry appended to a workflow.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Action {
    pub id: u64,
    pub workflow_id: u64,
    /// Free-form action name, e.g. `tests:run`
    pub action: String,
    pub result: ActionResult,
    /// Arbitrary JSON object attached by the caller
    #[serde(default)]
    pub metadata: serde_json::Value,
    pub created_at: Timestamp,
}

/// Immutable record of a commit made by a workflow.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Commit {
    pub id: u64,
    pub workflow_id: u64,
    pub sha: String,
    pub message: String,
    pub created_at: Timestamp,
}

/// The persisted, resumable state of a workflow.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Checkpoint {
    pub workflow: Workflow,
    /// Actions in insertion order
    pub actions: Vec<Action>,
    /// Commits in insertion order
    pub commits: Vec<Commit>,
}

impl Checkpoint {
    /// The most recent commit, which is the rollback target for the workflow.
    pub fn last_commit(&self) -> Option<&Commit> {
        self.commits.last()
    }
}
