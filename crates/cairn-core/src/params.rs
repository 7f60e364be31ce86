//! Parameter structures for cairn operations
//!
//! These structures carry operation inputs between the CLI and the
//! [`crate::Store`] facade without any framework-specific derives. The CLI
//! defines its own clap argument structs and converts them with `From`:
//!
//! ```ignore
//! #[derive(Args)]
//! pub struct CreateWorkflowArgs {
//!     pub issue: u64,
//!     pub branch: String,
//! }
//!
//! impl From<CreateWorkflowArgs> for CreateWorkflow {
//!     fn from(args: CreateWorkflowArgs) -> Self {
//!         CreateWorkflow { issue_number: args.issue, branch: args.branch, worktree: None }
//!     }
//! }
//! ```

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::models::{ActionResult, CodeEntityKind, StepStatus, WorkflowPhase, WorkflowStatus};

/// Default number of days after which finished workflows are cleaned up.
pub const DEFAULT_CLEANUP_DAYS: u32 = 30;

/// Default traversal depth for blast radius and caller queries.
pub const DEFAULT_TRAVERSAL_DEPTH: u32 = 5;

/// Default cap on rows returned by graph and knowledge queries.
pub const DEFAULT_QUERY_LIMIT: usize = 20;

/// Parameters for operations that only need an ID.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Id {
    pub id: u64,
}

/// Parameters for creating a workflow.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateWorkflow {
    pub issue_number: u64,
    pub branch: String,
    pub worktree: Option<String>,
}

/// Parameters for moving a workflow to another phase.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetPhase {
    pub id: u64,
    pub phase: WorkflowPhase,
}

/// Parameters for changing a workflow's status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetStatus {
    pub id: u64,
    pub status: WorkflowStatus,
}

/// Parameters for appending an action to a workflow.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LogAction {
    pub workflow_id: u64,
    pub action: String,
    pub result: ActionResult,
    #[serde(default)]
    pub metadata: serde_json::Value,
}

/// Parameters for recording a commit on a workflow.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LogCommit {
    pub workflow_id: u64,
    pub sha: String,
    pub message: String,
}

/// Parameters for removing stale workflows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CleanupWorkflows {
    pub older_than_days: u32,
    pub include_failed: bool,
}

impl Default for CleanupWorkflows {
    fn default() -> Self {
        Self {
            older_than_days: DEFAULT_CLEANUP_DAYS,
            include_failed: false,
        }
    }
}

/// A learning to store in the knowledge graph.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewLearning {
    pub content: String,
    #[serde(default)]
    pub code_area: Option<String>,
    #[serde(default)]
    pub file_path: Option<String>,
    #[serde(default)]
    pub line_number: Option<u32>,
    #[serde(default)]
    pub issue_number: Option<u64>,
    #[serde(default)]
    pub metadata: serde_json::Value,
}

/// A pattern to store, with the learnings it led to.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPattern {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub code_area: String,
    #[serde(default)]
    pub learning_ids: Vec<String>,
}

/// A mistake to store, optionally linked to the learning that fixed it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewMistake {
    pub description: String,
    #[serde(default)]
    pub file_path: Option<String>,
    #[serde(default)]
    pub line_number: Option<u32>,
    #[serde(default)]
    pub issue_number: Option<u64>,
    #[serde(default)]
    pub learning_id: Option<String>,
}

/// Parameters for marking one learning as replaced by another.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Supersede {
    pub old_id: String,
    pub new_id: String,
}

/// Parameters for a semantic similarity search.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchSimilar {
    pub text: String,
    pub limit: usize,
    /// Minimum cosine similarity for a result to be returned
    pub threshold: f32,
}

/// Parameters for parsing a single package without storing it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParsePackage {
    pub path: PathBuf,
    pub name: String,
    /// Only parse these files (relative to the package root)
    pub files: Option<Vec<String>>,
}

/// Parameters for an entity search.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FindEntities {
    pub pattern: String,
    pub kind: Option<CodeEntityKind>,
    pub limit: usize,
}

/// Parameters for reverse traversals (blast radius, transitive callers).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Traversal {
    /// Entity id, entity name, or file path
    pub target: String,
    pub max_depth: u32,
    pub limit: usize,
}

impl Traversal {
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            max_depth: DEFAULT_TRAVERSAL_DEPTH,
            limit: DEFAULT_QUERY_LIMIT * 5,
        }
    }
}

/// Parameters for pushing a goal onto the planning stack.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PushGoal {
    pub title: String,
    pub description: Option<String>,
    pub issue_number: Option<u64>,
}

/// A step to add to a plan.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewStep {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default = "default_wave")]
    pub wave: u32,
    #[serde(default)]
    pub depends_on: Vec<u64>,
}

fn default_wave() -> u32 {
    1
}

impl NewStep {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: None,
            wave: default_wave(),
            depends_on: Vec::new(),
        }
    }
}

/// Parameters for attaching a plan to a goal.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PushPlan {
    /// Target goal; the nearest goal on the stack when absent
    pub goal_id: Option<u64>,
    pub title: String,
    pub steps: Vec<NewStep>,
}

/// Parameters for appending a step and focusing it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PushStep {
    /// Target plan; the nearest plan reachable from the stack when absent
    pub plan_id: Option<u64>,
    pub step: NewStep,
}

/// Parameters for popping the planning stack.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PopItem {
    /// Mark a popped goal abandoned instead of completed
    pub abandon: bool,
}

/// Parameters for changing a plan step's status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetStepStatus {
    pub step_id: u64,
    pub status: StepStatus,
}
