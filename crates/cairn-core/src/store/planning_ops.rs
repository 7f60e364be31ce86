//! Planning stack operations for the Store.

use super::Store;
use crate::{
    error::Result,
    models::{Goal, Plan, PlanProgress, PlanStep, StackItem, StackPeek},
    params::{PopItem, PushGoal, PushPlan, PushStep, SetStepStatus},
};

impl Store {
    /// Pushes a goal and makes it the active one.
    pub async fn push_goal(&self, params: &PushGoal) -> Result<Goal> {
        let PushGoal {
            title,
            description,
            issue_number,
        } = params.clone();
        self.with_database(move |db| db.push_goal(&title, description.as_deref(), issue_number))
            .await
    }

    /// Attaches a plan to a goal and pushes it onto the stack.
    pub async fn push_plan(&self, params: &PushPlan) -> Result<Plan> {
        let PushPlan {
            goal_id,
            title,
            steps,
        } = params.clone();
        self.with_database(move |db| db.push_plan(goal_id, &title, &steps))
            .await
    }

    /// Appends a step to a plan and focuses it.
    pub async fn push_step(&self, params: &PushStep) -> Result<PlanStep> {
        let PushStep { plan_id, step } = params.clone();
        self.with_database(move |db| db.push_step(plan_id, &step))
            .await
    }

    /// Removes the top of the stack, returning it.
    pub async fn pop_stack(&self, params: &PopItem) -> Result<Option<StackItem>> {
        let abandon = params.abandon;
        self.with_database(move |db| db.pop_stack(abandon)).await
    }

    pub async fn peek_stack(&self) -> Result<StackPeek> {
        self.with_database(|db| db.peek_stack()).await
    }

    pub async fn get_goal(&self, id: u64) -> Result<Option<Goal>> {
        self.with_database(move |db| db.get_goal(id)).await
    }

    pub async fn get_plan(&self, id: u64) -> Result<Option<Plan>> {
        self.with_database(move |db| db.get_plan(id)).await
    }

    /// The plan nearest the top of the stack.
    pub async fn focused_plan(&self) -> Result<Option<Plan>> {
        self.with_database(|db| db.focused_plan()).await
    }

    /// The goal nearest the top of the stack.
    pub async fn focused_goal(&self) -> Result<Option<Goal>> {
        self.with_database(|db| db.focused_goal()).await
    }

    /// The plan a stack item belongs to.
    pub async fn plan_for_stack_item(&self, item: &StackItem) -> Result<Option<Plan>> {
        let item = item.clone();
        self.with_database(move |db| db.plan_for_stack_item(&item))
            .await
    }

    /// Progress of the given plan, or of the focused plan when `plan_id` is
    /// `None`.
    pub async fn plan_progress(
        &self,
        plan_id: Option<u64>,
    ) -> Result<Option<(Plan, PlanProgress)>> {
        let plan = match plan_id {
            Some(id) => self.get_plan(id).await?,
            None => self.focused_plan().await?,
        };
        Ok(plan.map(|plan| {
            let progress = PlanProgress::compute(&plan);
            (plan, progress)
        }))
    }

    pub async fn set_step_status(&self, params: &SetStepStatus) -> Result<PlanStep> {
        let SetStepStatus { step_id, status } = params.clone();
        self.with_database(move |db| db.set_step_status(step_id, status))
            .await
    }
}
