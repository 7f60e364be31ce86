//! Workflow checkpoint CRUD operations and queries.

use rusqlite::{params, OptionalExtension};

use super::utils::{enum_at, id_at, json_at, micros_to_timestamp, now_micros, timestamp_at};
use crate::{
    error::{CairnError, DatabaseResultExt, Result},
    models::{
        Action, ActionResult, Checkpoint, Commit, Workflow, WorkflowPhase, WorkflowStatus,
    },
};

const INSERT_WORKFLOW_SQL: &str = "INSERT INTO workflows (issue_number, branch, worktree, phase, status, retry_count, created_at, updated_at) VALUES (?1, ?2, ?3, ?4, ?5, 0, ?6, ?6)";
const WORKFLOW_COLUMNS: &str =
    "id, issue_number, branch, worktree, phase, status, retry_count, created_at, updated_at";
const CHECK_WORKFLOW_EXISTS_SQL: &str = "SELECT EXISTS(SELECT 1 FROM workflows WHERE id = ?1)";
const UPDATE_PHASE_SQL: &str = "UPDATE workflows SET phase = ?1, updated_at = ?2 WHERE id = ?3";
const UPDATE_STATUS_SQL: &str = "UPDATE workflows SET status = ?1, updated_at = ?2 WHERE id = ?3";
const INCREMENT_RETRY_SQL: &str =
    "UPDATE workflows SET retry_count = retry_count + 1, updated_at = ?1 WHERE id = ?2";
const INSERT_ACTION_SQL: &str = "INSERT INTO workflow_actions (workflow_id, action, result, metadata, created_at) VALUES (?1, ?2, ?3, ?4, ?5)";
const SELECT_ACTIONS_SQL: &str = "SELECT id, workflow_id, action, result, metadata, created_at FROM workflow_actions WHERE workflow_id = ?1 ORDER BY id";
const INSERT_COMMIT_SQL: &str = "INSERT INTO workflow_commits (workflow_id, sha, message, created_at) VALUES (?1, ?2, ?3, ?4)";
const SELECT_COMMITS_SQL: &str = "SELECT id, workflow_id, sha, message, created_at FROM workflow_commits WHERE workflow_id = ?1 ORDER BY id";
const DELETE_WORKFLOW_SQL: &str = "DELETE FROM workflows WHERE id = ?1";
const CLEANUP_WORKFLOWS_SQL: &str = "DELETE FROM workflows WHERE updated_at < ?1 AND (status IN ('completed', 'paused') OR (?2 AND status = 'failed'))";

const MICROS_PER_DAY: i64 = 86_400_000_000;

impl super::Database {
    fn build_workflow_from_row(row: &rusqlite::Row) -> rusqlite::Result<Workflow> {
        Ok(Workflow {
            id: id_at(row, 0)?,
            issue_number: id_at(row, 1)?,
            branch: row.get(2)?,
            worktree: row.get(3)?,
            phase: enum_at(row, 4)?,
            status: enum_at(row, 5)?,
            retry_count: row.get::<_, i64>(6)? as u32,
            created_at: timestamp_at(row, 7)?,
            updated_at: timestamp_at(row, 8)?,
        })
    }

    fn build_action_from_row(row: &rusqlite::Row) -> rusqlite::Result<Action> {
        Ok(Action {
            id: id_at(row, 0)?,
            workflow_id: id_at(row, 1)?,
            action: row.get(2)?,
            result: enum_at(row, 3)?,
            metadata: json_at(row, 4)?,
            created_at: timestamp_at(row, 5)?,
        })
    }

    fn build_commit_from_row(row: &rusqlite::Row) -> rusqlite::Result<Commit> {
        Ok(Commit {
            id: id_at(row, 0)?,
            workflow_id: id_at(row, 1)?,
            sha: row.get(2)?,
            message: row.get(3)?,
            created_at: timestamp_at(row, 4)?,
        })
    }

    /// Creates a workflow in the first phase with status `running`.
    pub fn create_workflow(
        &mut self,
        issue_number: u64,
        branch: &str,
        worktree: Option<&str>,
    ) -> Result<Workflow> {
        if branch.trim().is_empty() {
            return Err(CairnError::invalid_input("branch").with_reason("Branch cannot be empty"));
        }

        let now = now_micros();
        let phase = WorkflowPhase::default();
        let status = WorkflowStatus::default();

        self.connection
            .execute(
                INSERT_WORKFLOW_SQL,
                params![
                    issue_number as i64,
                    branch,
                    worktree,
                    phase.as_str(),
                    status.as_str(),
                    now
                ],
            )
            .db_context("Failed to insert workflow")?;

        let id = self.connection.last_insert_rowid() as u64;
        let timestamp = micros_to_timestamp(now);

        Ok(Workflow {
            id,
            issue_number,
            branch: branch.to_string(),
            worktree: worktree.map(String::from),
            phase,
            status,
            retry_count: 0,
            created_at: timestamp,
            updated_at: timestamp,
        })
    }

    /// Retrieves a workflow by its ID.
    pub fn get_workflow(&self, id: u64) -> Result<Option<Workflow>> {
        let sql = format!("SELECT {WORKFLOW_COLUMNS} FROM workflows WHERE id = ?1");
        self.connection
            .query_row(&sql, params![id as i64], Self::build_workflow_from_row)
            .optional()
            .db_context("Failed to query workflow")
    }

    /// Moves a workflow to another phase. Phases are not ordered; any legal
    /// phase may follow any other.
    pub fn set_phase(&mut self, id: u64, phase: WorkflowPhase) -> Result<Workflow> {
        self.update_workflow(id, UPDATE_PHASE_SQL, phase.as_str())
    }

    /// Changes a workflow's execution status.
    pub fn set_status(&mut self, id: u64, status: WorkflowStatus) -> Result<Workflow> {
        self.update_workflow(id, UPDATE_STATUS_SQL, status.as_str())
    }

    fn update_workflow(&mut self, id: u64, sql: &str, value: &str) -> Result<Workflow> {
        let changed = self
            .connection
            .execute(sql, params![value, now_micros(), id as i64])
            .db_context("Failed to update workflow")?;
        if changed == 0 {
            return Err(CairnError::WorkflowNotFound { id });
        }
        self.get_workflow(id)?
            .ok_or(CairnError::WorkflowNotFound { id })
    }

    /// Increments the retry counter of a workflow.
    pub fn increment_retry(&mut self, id: u64) -> Result<Workflow> {
        let changed = self
            .connection
            .execute(INCREMENT_RETRY_SQL, params![now_micros(), id as i64])
            .db_context("Failed to increment retry count")?;
        if changed == 0 {
            return Err(CairnError::WorkflowNotFound { id });
        }
        self.get_workflow(id)?
            .ok_or(CairnError::WorkflowNotFound { id })
    }

    fn ensure_workflow_exists(&self, id: u64) -> Result<()> {
        let exists: bool = self
            .connection
            .query_row(CHECK_WORKFLOW_EXISTS_SQL, params![id as i64], |row| row.get(0))
            .db_context("Failed to check workflow existence")?;
        if exists {
            Ok(())
        } else {
            Err(CairnError::WorkflowNotFound { id })
        }
    }

    /// Appends an action to a workflow's audit log.
    pub fn log_action(
        &mut self,
        workflow_id: u64,
        action: &str,
        result: ActionResult,
        metadata: &serde_json::Value,
    ) -> Result<Action> {
        if action.trim().is_empty() {
            return Err(CairnError::invalid_input("action").with_reason("Action cannot be empty"));
        }
        self.ensure_workflow_exists(workflow_id)?;

        let metadata = if metadata.is_null() {
            serde_json::json!({})
        } else {
            metadata.clone()
        };
        let now = now_micros();

        self.connection
            .execute(
                INSERT_ACTION_SQL,
                params![
                    workflow_id as i64,
                    action,
                    result.as_str(),
                    serde_json::to_string(&metadata)?,
                    now
                ],
            )
            .db_context("Failed to insert workflow action")?;

        Ok(Action {
            id: self.connection.last_insert_rowid() as u64,
            workflow_id,
            action: action.to_string(),
            result,
            metadata,
            created_at: micros_to_timestamp(now),
        })
    }

    /// Records a commit made by a workflow. The same sha may be recorded more
    /// than once.
    pub fn log_commit(&mut self, workflow_id: u64, sha: &str, message: &str) -> Result<Commit> {
        if sha.trim().is_empty() {
            return Err(CairnError::invalid_input("sha").with_reason("Commit sha cannot be empty"));
        }
        self.ensure_workflow_exists(workflow_id)?;

        let now = now_micros();
        self.connection
            .execute(
                INSERT_COMMIT_SQL,
                params![workflow_id as i64, sha, message, now],
            )
            .db_context("Failed to insert workflow commit")?;

        Ok(Commit {
            id: self.connection.last_insert_rowid() as u64,
            workflow_id,
            sha: sha.to_string(),
            message: message.to_string(),
            created_at: micros_to_timestamp(now),
        })
    }

    /// Loads a workflow together with its actions and commits.
    pub fn load_checkpoint(&mut self, id: u64) -> Result<Option<Checkpoint>> {
        // One read transaction so the three reads see the same snapshot.
        let tx = self
            .connection
            .transaction()
            .db_context("Failed to begin transaction")?;

        let sql = format!("SELECT {WORKFLOW_COLUMNS} FROM workflows WHERE id = ?1");
        let Some(workflow) = tx
            .query_row(&sql, params![id as i64], Self::build_workflow_from_row)
            .optional()
            .db_context("Failed to query workflow")?
        else {
            return Ok(None);
        };

        let actions = {
            let mut stmt = tx
                .prepare(SELECT_ACTIONS_SQL)
                .db_context("Failed to prepare query")?;
            let rows = stmt
                .query_map(params![id as i64], Self::build_action_from_row)
                .db_context("Failed to query workflow actions")?;
            rows.collect::<std::result::Result<Vec<_>, _>>()
                .db_context("Failed to fetch workflow actions")?
        };

        let commits = {
            let mut stmt = tx
                .prepare(SELECT_COMMITS_SQL)
                .db_context("Failed to prepare query")?;
            let rows = stmt
                .query_map(params![id as i64], Self::build_commit_from_row)
                .db_context("Failed to query workflow commits")?;
            rows.collect::<std::result::Result<Vec<_>, _>>()
                .db_context("Failed to fetch workflow commits")?
        };

        tx.commit().db_context("Failed to commit transaction")?;

        Ok(Some(Checkpoint {
            workflow,
            actions,
            commits,
        }))
    }

    /// Returns the most recently updated workflow for an issue.
    pub fn find_workflow_by_issue(&self, issue_number: u64) -> Result<Option<Workflow>> {
        let sql = format!(
            "SELECT {WORKFLOW_COLUMNS} FROM workflows WHERE issue_number = ?1 ORDER BY updated_at DESC, id DESC LIMIT 1"
        );
        self.connection
            .query_row(&sql, params![issue_number as i64], Self::build_workflow_from_row)
            .optional()
            .db_context("Failed to query workflow by issue")
    }

    /// Lists every workflow that has not completed, most recently updated first.
    pub fn list_active_workflows(&self) -> Result<Vec<Workflow>> {
        let sql = format!(
            "SELECT {WORKFLOW_COLUMNS} FROM workflows WHERE status != 'completed' ORDER BY updated_at DESC, id DESC"
        );
        let mut stmt = self
            .connection
            .prepare(&sql)
            .db_context("Failed to prepare query")?;
        let workflows = stmt
            .query_map([], Self::build_workflow_from_row)
            .db_context("Failed to query active workflows")?
            .collect::<std::result::Result<Vec<_>, _>>()
            .db_context("Failed to fetch active workflows")?;
        Ok(workflows)
    }

    /// Deletes a workflow with its actions and commits.
    pub fn delete_workflow(&mut self, id: u64) -> Result<()> {
        let deleted = self
            .connection
            .execute(DELETE_WORKFLOW_SQL, params![id as i64])
            .db_context("Failed to delete workflow")?;
        if deleted == 0 {
            return Err(CairnError::WorkflowNotFound { id });
        }
        Ok(())
    }

    /// Removes completed and paused workflows not updated for `older_than_days`
    /// days, and failed ones too when `include_failed` is set. Running
    /// workflows are never removed. Returns the number of workflows deleted.
    pub fn cleanup_workflows(
        &mut self,
        older_than_days: u32,
        include_failed: bool,
    ) -> Result<usize> {
        let cutoff = now_micros() - i64::from(older_than_days) * MICROS_PER_DAY;
        let tx = self
            .connection
            .transaction()
            .db_context("Failed to begin transaction")?;
        let deleted = tx
            .execute(CLEANUP_WORKFLOWS_SQL, params![cutoff, include_failed])
            .db_context("Failed to clean up workflows")?;
        tx.commit().db_context("Failed to commit transaction")?;

        if deleted > 0 {
            log::info!("Removed {deleted} stale workflow(s)");
        }
        Ok(deleted)
    }
}
