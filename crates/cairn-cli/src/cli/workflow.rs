//! `cairn workflow` commands.

use anyhow::{anyhow, Context, Result};
use cairn_core::{
    display::{CreateResult, OperationStatus, UpdateResult, Workflows},
    params::{CleanupWorkflows, CreateWorkflow, Id, LogAction, LogCommit, SetPhase, SetStatus},
    CairnError,
};
use clap::{Args, Subcommand};

use super::Cli;

/// Start a workflow for an issue
#[derive(Args)]
pub struct CreateWorkflowArgs {
    /// Issue number the workflow works on
    pub issue: u64,
    /// Branch the work happens on
    pub branch: String,
    /// Worktree path, if the work happens in a separate worktree
    #[arg(short, long)]
    pub worktree: Option<String>,
}

impl From<CreateWorkflowArgs> for CreateWorkflow {
    fn from(val: CreateWorkflowArgs) -> Self {
        CreateWorkflow {
            issue_number: val.issue,
            branch: val.branch,
            worktree: val.worktree,
        }
    }
}

/// Show the most recent workflow for an issue
#[derive(Args)]
pub struct FindWorkflowArgs {
    /// Issue number to look up
    pub issue: u64,
}

/// Show a workflow with its actions and commits
#[derive(Args)]
pub struct GetWorkflowArgs {
    /// ID of the workflow
    pub id: u64,
    /// Print the checkpoint as JSON
    #[arg(long)]
    pub json: bool,
}

/// Move a workflow to another phase
#[derive(Args)]
pub struct SetPhaseArgs {
    /// ID of the workflow
    pub id: u64,
    /// research, implement, review, finalize, planning, execute, merge or cleanup
    pub phase: String,
}

impl TryFrom<SetPhaseArgs> for SetPhase {
    type Error = CairnError;

    fn try_from(val: SetPhaseArgs) -> Result<Self, Self::Error> {
        Ok(SetPhase {
            id: val.id,
            phase: val.phase.parse()?,
        })
    }
}

/// Change a workflow's status
#[derive(Args)]
pub struct SetStatusArgs {
    /// ID of the workflow
    pub id: u64,
    /// running, paused, completed or failed
    pub status: String,
}

impl TryFrom<SetStatusArgs> for SetStatus {
    type Error = CairnError;

    fn try_from(val: SetStatusArgs) -> Result<Self, Self::Error> {
        Ok(SetStatus {
            id: val.id,
            status: val.status.parse()?,
        })
    }
}

/// Append an action to a workflow's log
#[derive(Args)]
pub struct LogActionArgs {
    /// ID of the workflow
    pub id: u64,
    /// What was done
    pub action: String,
    /// success, failed or pending
    #[arg(short, long, default_value = "success")]
    pub result: String,
    /// Extra details as a JSON object
    #[arg(short, long)]
    pub metadata: Option<String>,
}

impl TryFrom<LogActionArgs> for LogAction {
    type Error = CairnError;

    fn try_from(val: LogActionArgs) -> Result<Self, Self::Error> {
        let metadata = match val.metadata.as_deref() {
            Some(raw) => serde_json::from_str(raw)?,
            None => serde_json::Value::Object(Default::default()),
        };
        Ok(LogAction {
            workflow_id: val.id,
            action: val.action,
            result: val.result.parse()?,
            metadata,
        })
    }
}

/// Record a commit made during a workflow
#[derive(Args)]
pub struct LogCommitArgs {
    /// ID of the workflow
    pub id: u64,
    /// Commit sha
    pub sha: String,
    /// Commit message
    pub message: String,
}

impl From<LogCommitArgs> for LogCommit {
    fn from(val: LogCommitArgs) -> Self {
        LogCommit {
            workflow_id: val.id,
            sha: val.sha,
            message: val.message,
        }
    }
}

/// Remove stale finished workflows
#[derive(Args)]
pub struct CleanupArgs {
    /// Remove workflows not updated for this many days
    #[arg(long, default_value_t = cairn_core::params::DEFAULT_CLEANUP_DAYS)]
    pub days: u32,
    /// Also remove failed workflows
    #[arg(long)]
    pub include_failed: bool,
}

impl From<CleanupArgs> for CleanupWorkflows {
    fn from(val: CleanupArgs) -> Self {
        CleanupWorkflows {
            older_than_days: val.days,
            include_failed: val.include_failed,
        }
    }
}

/// A command that only needs a workflow ID
#[derive(Args)]
pub struct WorkflowIdArgs {
    /// ID of the workflow
    pub id: u64,
}

impl From<WorkflowIdArgs> for Id {
    fn from(val: WorkflowIdArgs) -> Self {
        Id { id: val.id }
    }
}

#[derive(Subcommand)]
pub enum WorkflowCommands {
    /// Start a workflow for an issue
    #[command(alias = "c")]
    Create(CreateWorkflowArgs),
    /// Show the most recent workflow for an issue
    #[command(alias = "f")]
    Find(FindWorkflowArgs),
    /// Show a workflow with its actions and commits
    #[command(alias = "s")]
    Get(GetWorkflowArgs),
    /// Move a workflow to another phase
    SetPhase(SetPhaseArgs),
    /// Change a workflow's status
    SetStatus(SetStatusArgs),
    /// Count another attempt at the current phase
    Retry(WorkflowIdArgs),
    /// Append an action to a workflow's log
    LogAction(LogActionArgs),
    /// Record a commit made during a workflow
    LogCommit(LogCommitArgs),
    /// List workflows that have not completed
    #[command(aliases = ["l", "ls"])]
    ListActive,
    /// Remove stale finished workflows
    Cleanup(CleanupArgs),
    /// Delete a workflow permanently
    #[command(aliases = ["d", "rm"])]
    Delete(WorkflowIdArgs),
}

impl Cli {
    pub async fn handle_workflow_command(&self, command: WorkflowCommands) -> Result<()> {
        match command {
            WorkflowCommands::Create(args) => {
                let workflow = self
                    .store
                    .create_workflow(&args.into())
                    .await
                    .context("Failed to create workflow")?;
                self.render(CreateResult::new(workflow))
            }
            WorkflowCommands::Find(args) => {
                let workflow = self
                    .store
                    .find_workflow_by_issue(args.issue)
                    .await?
                    .ok_or_else(|| anyhow!("No workflow found for issue #{}", args.issue))?;
                self.render(workflow)
            }
            WorkflowCommands::Get(args) => {
                let checkpoint = self
                    .store
                    .load_checkpoint(&Id { id: args.id })
                    .await?
                    .ok_or(CairnError::WorkflowNotFound { id: args.id })?;
                if args.json {
                    self.print_json(&checkpoint)
                } else {
                    self.render(checkpoint)
                }
            }
            WorkflowCommands::SetPhase(args) => {
                let params = SetPhase::try_from(args)?;
                let workflow = self.store.set_phase(&params).await?;
                self.render(UpdateResult::new(
                    workflow,
                    format!("phase set to {}", params.phase),
                ))
            }
            WorkflowCommands::SetStatus(args) => {
                let params = SetStatus::try_from(args)?;
                let workflow = self.store.set_status(&params).await?;
                self.render(UpdateResult::new(
                    workflow,
                    format!("status set to {}", params.status),
                ))
            }
            WorkflowCommands::Retry(args) => {
                let workflow = self.store.increment_retry(&args.into()).await?;
                let change = format!("retry count is now {}", workflow.retry_count);
                self.render(UpdateResult::new(workflow, change))
            }
            WorkflowCommands::LogAction(args) => {
                let action = self.store.append_action(&LogAction::try_from(args)?).await?;
                self.render(action)
            }
            WorkflowCommands::LogCommit(args) => {
                let commit = self.store.append_commit(&args.into()).await?;
                self.render(commit)
            }
            WorkflowCommands::ListActive => {
                let workflows = self.store.list_active_workflows().await?;
                self.render(Workflows(workflows))
            }
            WorkflowCommands::Cleanup(args) => {
                let removed = self.store.cleanup_workflows(&args.into()).await?;
                self.render(OperationStatus::success(format!(
                    "Removed {removed} workflow(s)"
                )))
            }
            WorkflowCommands::Delete(args) => {
                let id = args.id;
                self.store.delete_workflow(&args.into()).await?;
                self.render(OperationStatus::success(format!("Deleted workflow {id}")))
            }
        }
    }
}
