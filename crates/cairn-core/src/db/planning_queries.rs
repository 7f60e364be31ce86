//! Planning stack persistence: goals, plans, steps and the stack itself.

use rusqlite::{params, Connection, OptionalExtension};

use super::utils::{enum_at, id_at, json_at, micros_to_timestamp, now_micros, timestamp_at};
use crate::{
    error::{CairnError, DatabaseResultExt, Result},
    models::{Goal, GoalStatus, Plan, PlanStep, StackItem, StackItemKind, StackPeek, StepStatus},
    params::NewStep,
};

const GOAL_COLUMNS: &str = "id, title, description, issue_number, status, created_at, updated_at";
const STEP_COLUMNS: &str = "id, plan_id, title, description, wave, depends_on, status, step_order, created_at, updated_at";
const PAUSE_ACTIVE_GOALS_SQL: &str =
    "UPDATE goals SET status = 'paused', updated_at = ?1 WHERE status = 'active'";
const INSERT_GOAL_SQL: &str = "INSERT INTO goals (title, description, issue_number, status, created_at, updated_at) VALUES (?1, ?2, ?3, 'active', ?4, ?4)";
const UPDATE_GOAL_STATUS_SQL: &str = "UPDATE goals SET status = ?1, updated_at = ?2 WHERE id = ?3";
const INSERT_PLAN_SQL: &str =
    "INSERT INTO goal_plans (goal_id, title, created_at, updated_at) VALUES (?1, ?2, ?3, ?3)";
const SELECT_PLAN_SQL: &str =
    "SELECT id, goal_id, title, created_at, updated_at FROM goal_plans WHERE id = ?1";
const SELECT_PLAN_ID_FOR_GOAL_SQL: &str = "SELECT id FROM goal_plans WHERE goal_id = ?1";
const SELECT_GOAL_ID_FOR_PLAN_SQL: &str = "SELECT goal_id FROM goal_plans WHERE id = ?1";
const SELECT_PLAN_ID_FOR_STEP_SQL: &str = "SELECT plan_id FROM plan_steps WHERE id = ?1";
const NEXT_STEP_ORDER_SQL: &str =
    "SELECT COALESCE(MAX(step_order), 0) + 1 FROM plan_steps WHERE plan_id = ?1";
const INSERT_STEP_SQL: &str = "INSERT INTO plan_steps (plan_id, title, description, wave, depends_on, status, step_order, created_at, updated_at) VALUES (?1, ?2, ?3, ?4, ?5, 'todo', ?6, ?7, ?7)";
const UPDATE_STEP_STATUS_SQL: &str =
    "UPDATE plan_steps SET status = ?1, updated_at = ?2 WHERE id = ?3";
const TOUCH_PLAN_SQL: &str = "UPDATE goal_plans SET updated_at = ?1 WHERE id = ?2";
const PUSH_ITEM_SQL: &str =
    "INSERT INTO planning_stack (item_type, item_id, pushed_at) VALUES (?1, ?2, ?3)";
const DELETE_ITEM_SQL: &str = "DELETE FROM planning_stack WHERE position = ?1";
const SELECT_STACK_SQL: &str = "SELECT s.position, s.item_type, s.item_id, s.pushed_at, COALESCE(g.title, p.title, st.title, '') \
     FROM planning_stack s \
     LEFT JOIN goals g ON s.item_type = 'goal' AND g.id = s.item_id \
     LEFT JOIN goal_plans p ON s.item_type = 'plan' AND p.id = s.item_id \
     LEFT JOIN plan_steps st ON s.item_type = 'step' AND st.id = s.item_id \
     ORDER BY s.position";

impl super::Database {
    fn build_goal_from_row(row: &rusqlite::Row) -> rusqlite::Result<Goal> {
        Ok(Goal {
            id: id_at(row, 0)?,
            title: row.get(1)?,
            description: row.get(2)?,
            issue_number: row.get::<_, Option<i64>>(3)?.map(|n| n as u64),
            status: enum_at(row, 4)?,
            created_at: timestamp_at(row, 5)?,
            updated_at: timestamp_at(row, 6)?,
        })
    }

    fn build_plan_step_from_row(row: &rusqlite::Row) -> rusqlite::Result<PlanStep> {
        Ok(PlanStep {
            id: id_at(row, 0)?,
            plan_id: id_at(row, 1)?,
            title: row.get(2)?,
            description: row.get(3)?,
            wave: row.get::<_, i64>(4)? as u32,
            depends_on: json_at(row, 5)?,
            status: enum_at(row, 6)?,
            order: row.get::<_, i64>(7)? as u32,
            created_at: timestamp_at(row, 8)?,
            updated_at: timestamp_at(row, 9)?,
        })
    }

    /// Pushes a new active goal, pausing whichever goal was active.
    pub fn push_goal(
        &mut self,
        title: &str,
        description: Option<&str>,
        issue_number: Option<u64>,
    ) -> Result<Goal> {
        let title = title.trim();
        if title.is_empty() {
            return Err(
                CairnError::invalid_input("title").with_reason("Goal title cannot be empty")
            );
        }

        let tx = self
            .connection
            .transaction()
            .db_context("Failed to begin transaction")?;
        let now = now_micros();

        tx.execute(PAUSE_ACTIVE_GOALS_SQL, params![now])
            .db_context("Failed to pause active goal")?;
        tx.execute(
            INSERT_GOAL_SQL,
            params![title, description, issue_number.map(|n| n as i64), now],
        )
        .db_context("Failed to insert goal")?;
        let id = tx.last_insert_rowid() as u64;
        push_item(&tx, StackItemKind::Goal, id, now)?;

        tx.commit().db_context("Failed to commit transaction")?;

        Ok(Goal {
            id,
            title: title.to_string(),
            description: description.map(String::from),
            issue_number,
            status: GoalStatus::Active,
            created_at: micros_to_timestamp(now),
            updated_at: micros_to_timestamp(now),
        })
    }

    /// Attaches a plan to a goal (the nearest goal on the stack when `goal_id`
    /// is `None`) and pushes it. A goal has at most one plan.
    pub fn push_plan(
        &mut self,
        goal_id: Option<u64>,
        title: &str,
        steps: &[NewStep],
    ) -> Result<Plan> {
        let title = title.trim();
        if title.is_empty() {
            return Err(
                CairnError::invalid_input("title").with_reason("Plan title cannot be empty")
            );
        }

        let tx = self
            .connection
            .transaction()
            .db_context("Failed to begin transaction")?;

        let goal_id = match goal_id {
            Some(id) => {
                if goal_exists(&tx, id)? {
                    id
                } else {
                    return Err(CairnError::GoalNotFound { id });
                }
            }
            None => nearest_goal_id(&tx)?
                .ok_or_else(|| CairnError::validation("No goal on the planning stack"))?,
        };

        let existing: Option<i64> = tx
            .query_row(SELECT_PLAN_ID_FOR_GOAL_SQL, params![goal_id as i64], |row| row.get(0))
            .optional()
            .db_context("Failed to query goal plan")?;
        if let Some(existing) = existing {
            return Err(CairnError::validation(format!(
                "Goal {goal_id} already has plan {existing}"
            )));
        }

        let now = now_micros();
        tx.execute(INSERT_PLAN_SQL, params![goal_id as i64, title, now])
            .db_context("Failed to insert plan")?;
        let plan_id = tx.last_insert_rowid() as u64;

        for step in steps {
            insert_step(&tx, plan_id, step)?;
        }
        push_item(&tx, StackItemKind::Plan, plan_id, now)?;

        tx.commit().db_context("Failed to commit transaction")?;

        self.get_plan(plan_id)?
            .ok_or(CairnError::PlanNotFound { id: plan_id })
    }

    /// Appends a step to a plan (the nearest plan reachable from the stack
    /// when `plan_id` is `None`) and pushes it as the current focus.
    pub fn push_step(&mut self, plan_id: Option<u64>, step: &NewStep) -> Result<PlanStep> {
        let tx = self
            .connection
            .transaction()
            .db_context("Failed to begin transaction")?;

        let plan_id = match plan_id {
            Some(id) => {
                let goal: Option<i64> = tx
                    .query_row(SELECT_GOAL_ID_FOR_PLAN_SQL, params![id as i64], |row| row.get(0))
                    .optional()
                    .db_context("Failed to query plan")?;
                if goal.is_none() {
                    return Err(CairnError::PlanNotFound { id });
                }
                id
            }
            None => nearest_plan_id(&tx)?
                .ok_or_else(|| CairnError::validation("No plan on the planning stack"))?,
        };

        let step_id = insert_step(&tx, plan_id, step)?;
        push_item(&tx, StackItemKind::Step, step_id, now_micros())?;

        tx.commit().db_context("Failed to commit transaction")?;

        self.get_plan_step(step_id)?
            .ok_or(CairnError::StepNotFound { id: step_id })
    }

    /// Removes the top stack item. Popping a goal completes it (or abandons
    /// it) and re-activates the nearest goal left on the stack.
    pub fn pop_stack(&mut self, abandon: bool) -> Result<Option<StackItem>> {
        let tx = self
            .connection
            .transaction()
            .db_context("Failed to begin transaction")?;

        let mut items = stack_items(&tx)?;
        let Some(top) = items.pop() else {
            return Ok(None);
        };

        tx.execute(DELETE_ITEM_SQL, params![top.position as i64])
            .db_context("Failed to pop planning stack")?;

        if top.kind == StackItemKind::Goal {
            let now = now_micros();
            let status = if abandon {
                GoalStatus::Abandoned
            } else {
                GoalStatus::Completed
            };
            tx.execute(
                UPDATE_GOAL_STATUS_SQL,
                params![status.as_str(), now, top.item_id as i64],
            )
            .db_context("Failed to update goal status")?;

            if let Some(goal_id) = nearest_goal_id(&tx)? {
                tx.execute(
                    UPDATE_GOAL_STATUS_SQL,
                    params![GoalStatus::Active.as_str(), now, goal_id as i64],
                )
                .db_context("Failed to re-activate goal")?;
            }
        }

        tx.commit().db_context("Failed to commit transaction")?;
        Ok(Some(top))
    }

    /// Snapshot of the stack, bottom to top.
    pub fn peek_stack(&self) -> Result<StackPeek> {
        let items = stack_items(&self.connection)?;
        Ok(StackPeek {
            depth: items.len(),
            top_item: items.last().cloned(),
            items,
        })
    }

    /// Retrieves a goal by its ID.
    pub fn get_goal(&self, id: u64) -> Result<Option<Goal>> {
        let sql = format!("SELECT {GOAL_COLUMNS} FROM goals WHERE id = ?1");
        self.connection
            .query_row(&sql, params![id as i64], Self::build_goal_from_row)
            .optional()
            .db_context("Failed to query goal")
    }

    /// Retrieves a plan with its steps.
    pub fn get_plan(&self, id: u64) -> Result<Option<Plan>> {
        let plan = self
            .connection
            .query_row(SELECT_PLAN_SQL, params![id as i64], |row| {
                Ok(Plan {
                    id: id_at(row, 0)?,
                    goal_id: id_at(row, 1)?,
                    title: row.get(2)?,
                    steps: Vec::new(),
                    created_at: timestamp_at(row, 3)?,
                    updated_at: timestamp_at(row, 4)?,
                })
            })
            .optional()
            .db_context("Failed to query plan")?;

        match plan {
            Some(mut plan) => {
                plan.steps = self.plan_steps(plan.id)?;
                Ok(Some(plan))
            }
            None => Ok(None),
        }
    }

    /// The plan attached to a goal, if any.
    pub fn plan_for_goal(&self, goal_id: u64) -> Result<Option<Plan>> {
        let plan_id: Option<i64> = self
            .connection
            .query_row(SELECT_PLAN_ID_FOR_GOAL_SQL, params![goal_id as i64], |row| row.get(0))
            .optional()
            .db_context("Failed to query goal plan")?;
        match plan_id {
            Some(id) => self.get_plan(id as u64),
            None => Ok(None),
        }
    }

    /// The goal nearest the top of the stack.
    pub fn focused_goal(&self) -> Result<Option<Goal>> {
        match nearest_goal_id(&self.connection)? {
            Some(id) => self.get_goal(id),
            None => Ok(None),
        }
    }

    /// The plan nearest the top of the stack: a plan item, the plan of a step
    /// item, or the plan of a goal item.
    pub fn focused_plan(&self) -> Result<Option<Plan>> {
        match nearest_plan_id(&self.connection)? {
            Some(id) => self.get_plan(id),
            None => Ok(None),
        }
    }

    /// The plan a stack item belongs to: the plan itself, a step's plan, or
    /// a goal's plan.
    pub fn plan_for_stack_item(&self, item: &StackItem) -> Result<Option<Plan>> {
        let plan_id = match item.kind {
            StackItemKind::Plan => Some(item.item_id),
            StackItemKind::Step => {
                lookup_id(&self.connection, SELECT_PLAN_ID_FOR_STEP_SQL, item.item_id)?
            }
            StackItemKind::Goal => {
                lookup_id(&self.connection, SELECT_PLAN_ID_FOR_GOAL_SQL, item.item_id)?
            }
        };
        match plan_id {
            Some(id) => self.get_plan(id),
            None => Ok(None),
        }
    }

    /// Retrieves a single plan step.
    pub fn get_plan_step(&self, id: u64) -> Result<Option<PlanStep>> {
        let sql = format!("SELECT {STEP_COLUMNS} FROM plan_steps WHERE id = ?1");
        self.connection
            .query_row(&sql, params![id as i64], Self::build_plan_step_from_row)
            .optional()
            .db_context("Failed to query plan step")
    }

    fn plan_steps(&self, plan_id: u64) -> Result<Vec<PlanStep>> {
        let sql = format!(
            "SELECT {STEP_COLUMNS} FROM plan_steps WHERE plan_id = ?1 ORDER BY step_order, id"
        );
        let mut stmt = self
            .connection
            .prepare(&sql)
            .db_context("Failed to prepare query")?;
        let steps = stmt
            .query_map(params![plan_id as i64], Self::build_plan_step_from_row)
            .db_context("Failed to query plan steps")?
            .collect::<std::result::Result<Vec<_>, _>>()
            .db_context("Failed to fetch plan steps")?;
        Ok(steps)
    }

    /// Changes the status of a plan step.
    pub fn set_step_status(&mut self, step_id: u64, status: StepStatus) -> Result<PlanStep> {
        let tx = self
            .connection
            .transaction()
            .db_context("Failed to begin transaction")?;
        let now = now_micros();

        let changed = tx
            .execute(
                UPDATE_STEP_STATUS_SQL,
                params![status.as_str(), now, step_id as i64],
            )
            .db_context("Failed to update step status")?;
        if changed == 0 {
            return Err(CairnError::StepNotFound { id: step_id });
        }
        tx.execute(
            "UPDATE goal_plans SET updated_at = ?1 WHERE id = (SELECT plan_id FROM plan_steps WHERE id = ?2)",
            params![now, step_id as i64],
        )
        .db_context("Failed to update plan timestamp")?;

        tx.commit().db_context("Failed to commit transaction")?;

        self.get_plan_step(step_id)?
            .ok_or(CairnError::StepNotFound { id: step_id })
    }
}

fn push_item(conn: &Connection, kind: StackItemKind, item_id: u64, now: i64) -> Result<()> {
    conn.execute(PUSH_ITEM_SQL, params![kind.as_str(), item_id as i64, now])
        .db_context("Failed to push planning stack item")?;
    Ok(())
}

fn insert_step(conn: &Connection, plan_id: u64, step: &NewStep) -> Result<u64> {
    let title = step.title.trim();
    if title.is_empty() {
        return Err(CairnError::invalid_input("title").with_reason("Step title cannot be empty"));
    }

    let order: i64 = conn
        .query_row(NEXT_STEP_ORDER_SQL, params![plan_id as i64], |row| row.get(0))
        .db_context("Failed to compute step order")?;
    let now = now_micros();
    conn.execute(
        INSERT_STEP_SQL,
        params![
            plan_id as i64,
            title,
            step.description.as_deref(),
            i64::from(step.wave),
            serde_json::to_string(&step.depends_on)?,
            order,
            now
        ],
    )
    .db_context("Failed to insert plan step")?;
    let id = conn.last_insert_rowid() as u64;

    conn.execute(TOUCH_PLAN_SQL, params![now, plan_id as i64])
        .db_context("Failed to update plan timestamp")?;
    Ok(id)
}

fn stack_items(conn: &Connection) -> Result<Vec<StackItem>> {
    let mut stmt = conn
        .prepare(SELECT_STACK_SQL)
        .db_context("Failed to prepare query")?;
    let items = stmt
        .query_map([], |row| {
            Ok(StackItem {
                position: id_at(row, 0)?,
                kind: enum_at(row, 1)?,
                item_id: id_at(row, 2)?,
                pushed_at: timestamp_at(row, 3)?,
                title: row.get(4)?,
            })
        })
        .db_context("Failed to query planning stack")?
        .collect::<std::result::Result<Vec<_>, _>>()
        .db_context("Failed to fetch planning stack")?;
    Ok(items)
}

fn goal_exists(conn: &Connection, id: u64) -> Result<bool> {
    conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM goals WHERE id = ?1)",
        params![id as i64],
        |row| row.get(0),
    )
    .db_context("Failed to check goal existence")
}

fn lookup_id(conn: &Connection, sql: &str, id: u64) -> Result<Option<u64>> {
    conn.query_row(sql, params![id as i64], |row| id_at(row, 0))
        .optional()
        .db_context("Failed to resolve planning stack item")
}

/// Walks the stack from the top and returns the first goal it reaches.
fn nearest_goal_id(conn: &Connection) -> Result<Option<u64>> {
    for item in stack_items(conn)?.iter().rev() {
        let goal = match item.kind {
            StackItemKind::Goal => Some(item.item_id),
            StackItemKind::Plan => lookup_id(conn, SELECT_GOAL_ID_FOR_PLAN_SQL, item.item_id)?,
            StackItemKind::Step => {
                match lookup_id(conn, SELECT_PLAN_ID_FOR_STEP_SQL, item.item_id)? {
                    Some(plan_id) => lookup_id(conn, SELECT_GOAL_ID_FOR_PLAN_SQL, plan_id)?,
                    None => None,
                }
            }
        };
        if goal.is_some() {
            return Ok(goal);
        }
    }
    Ok(None)
}

/// Walks the stack from the top and returns the first plan it reaches.
fn nearest_plan_id(conn: &Connection) -> Result<Option<u64>> {
    for item in stack_items(conn)?.iter().rev() {
        let plan = match item.kind {
            StackItemKind::Plan => Some(item.item_id),
            StackItemKind::Step => lookup_id(conn, SELECT_PLAN_ID_FOR_STEP_SQL, item.item_id)?,
            StackItemKind::Goal => lookup_id(conn, SELECT_PLAN_ID_FOR_GOAL_SQL, item.item_id)?,
        };
        if plan.is_some() {
            return Ok(plan);
        }
    }
    Ok(None)
}
