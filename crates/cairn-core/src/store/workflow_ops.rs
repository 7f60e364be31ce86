//! Workflow checkpoint operations for the Store.

use super::Store;
use crate::{
    error::Result,
    models::{Action, Checkpoint, Commit, Workflow},
    params::{CleanupWorkflows, CreateWorkflow, Id, LogAction, LogCommit, SetPhase, SetStatus},
};

impl Store {
    /// Starts a workflow for an issue in the first phase, status `running`.
    pub async fn create_workflow(&self, params: &CreateWorkflow) -> Result<Workflow> {
        let CreateWorkflow {
            issue_number,
            branch,
            worktree,
        } = params.clone();

        self.with_database(move |db| db.create_workflow(issue_number, &branch, worktree.as_deref()))
            .await
    }

    /// Retrieves a workflow without its actions and commits.
    pub async fn get_workflow(&self, params: &Id) -> Result<Option<Workflow>> {
        let id = params.id;
        self.with_database(move |db| db.get_workflow(id)).await
    }

    /// Loads a workflow with its actions and commits in insertion order.
    pub async fn load_checkpoint(&self, params: &Id) -> Result<Option<Checkpoint>> {
        let id = params.id;
        self.with_database(move |db| db.load_checkpoint(id)).await
    }

    pub async fn set_phase(&self, params: &SetPhase) -> Result<Workflow> {
        let SetPhase { id, phase } = params.clone();
        self.with_database(move |db| db.set_phase(id, phase)).await
    }

    pub async fn set_status(&self, params: &SetStatus) -> Result<Workflow> {
        let SetStatus { id, status } = params.clone();
        self.with_database(move |db| db.set_status(id, status)).await
    }

    pub async fn increment_retry(&self, params: &Id) -> Result<Workflow> {
        let id = params.id;
        self.with_database(move |db| db.increment_retry(id)).await
    }

    /// Appends an action, failing if the workflow does not exist.
    pub async fn append_action(&self, params: &LogAction) -> Result<Action> {
        let LogAction {
            workflow_id,
            action,
            result,
            metadata,
        } = params.clone();

        self.with_database(move |db| db.log_action(workflow_id, &action, result, &metadata))
            .await
    }

    /// Records an action without failing the caller. Errors are logged and
    /// reported as `None`.
    pub async fn log_action(&self, params: &LogAction) -> Option<Action> {
        match self.append_action(params).await {
            Ok(action) => Some(action),
            Err(e) => {
                log::warn!(
                    "Failed to log action '{}' for workflow {}: {e}",
                    params.action,
                    params.workflow_id
                );
                None
            }
        }
    }

    /// Records a commit, failing if the workflow does not exist.
    pub async fn append_commit(&self, params: &LogCommit) -> Result<Commit> {
        let LogCommit {
            workflow_id,
            sha,
            message,
        } = params.clone();

        self.with_database(move |db| db.log_commit(workflow_id, &sha, &message))
            .await
    }

    /// Records a commit without failing the caller. Errors are logged and
    /// reported as `None`.
    pub async fn log_commit(&self, params: &LogCommit) -> Option<Commit> {
        match self.append_commit(params).await {
            Ok(commit) => Some(commit),
            Err(e) => {
                log::warn!(
                    "Failed to log commit {} for workflow {}: {e}",
                    params.sha,
                    params.workflow_id
                );
                None
            }
        }
    }

    /// The most recently updated workflow for an issue.
    pub async fn find_workflow_by_issue(&self, issue_number: u64) -> Result<Option<Workflow>> {
        self.with_database(move |db| db.find_workflow_by_issue(issue_number))
            .await
    }

    /// Every workflow that has not completed.
    pub async fn list_active_workflows(&self) -> Result<Vec<Workflow>> {
        self.with_database(|db| db.list_active_workflows()).await
    }

    /// Permanently deletes a workflow with its actions and commits.
    pub async fn delete_workflow(&self, params: &Id) -> Result<()> {
        let id = params.id;
        self.with_database(move |db| db.delete_workflow(id)).await
    }

    /// Removes finished workflows not updated within the cutoff. Returns the
    /// number removed.
    pub async fn cleanup_workflows(&self, params: &CleanupWorkflows) -> Result<usize> {
        let CleanupWorkflows {
            older_than_days,
            include_failed,
        } = params.clone();

        self.with_database(move |db| db.cleanup_workflows(older_than_days, include_failed))
            .await
    }
}
