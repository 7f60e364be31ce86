//! `cairn plan` commands.

use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use cairn_core::{
    display::{CreateResult, OperationStatus, UpdateResult},
    params::{NewStep, PopItem, PushGoal, PushPlan, PushStep, SetStepStatus},
    CairnError,
};
use clap::{Args, Subcommand};

use super::{knowledge::read_input, Cli};

/// Push a goal and make it the active one
#[derive(Args)]
pub struct PushGoalArgs {
    /// Title of the goal
    pub title: String,
    /// What the goal is about
    #[arg(short, long)]
    pub description: Option<String>,
    /// Issue the goal tracks
    #[arg(short, long)]
    pub issue: Option<u64>,
}

impl From<PushGoalArgs> for PushGoal {
    fn from(val: PushGoalArgs) -> Self {
        PushGoal {
            title: val.title,
            description: val.description,
            issue_number: val.issue,
        }
    }
}

/// Attach a plan to a goal
#[derive(Args)]
pub struct PushPlanArgs {
    /// Title of the plan
    pub title: String,
    /// Goal to attach to. Defaults to the goal nearest the top of the stack
    #[arg(short, long)]
    pub goal: Option<u64>,
    /// Step titles, all in wave 1 (repeatable)
    #[arg(short, long = "step")]
    pub steps: Vec<String>,
    /// Read steps from a JSON array of `{title, description?, wave?, dependsOn?}`
    /// (`-` for stdin)
    #[arg(long, conflicts_with = "steps")]
    pub steps_json: Option<PathBuf>,
}

impl TryFrom<PushPlanArgs> for PushPlan {
    type Error = anyhow::Error;

    fn try_from(val: PushPlanArgs) -> Result<Self> {
        let steps = match &val.steps_json {
            Some(path) => serde_json::from_str(&read_input(path)?)
                .with_context(|| format!("Invalid steps JSON in {}", path.display()))?,
            None => val.steps.into_iter().map(NewStep::new).collect(),
        };
        Ok(PushPlan {
            goal_id: val.goal,
            title: val.title,
            steps,
        })
    }
}

/// Append a step to a plan and focus it
#[derive(Args)]
pub struct PushStepArgs {
    /// Title of the step
    pub title: String,
    /// Plan to append to. Defaults to the plan nearest the top of the stack
    #[arg(short, long)]
    pub plan: Option<u64>,
    /// What needs to be done
    #[arg(short, long)]
    pub description: Option<String>,
    /// Wave the step belongs to
    #[arg(short, long, default_value_t = 1)]
    pub wave: u32,
    /// IDs of steps that must complete first, comma-separated
    #[arg(long, value_delimiter = ',')]
    pub depends_on: Vec<u64>,
}

impl From<PushStepArgs> for PushStep {
    fn from(val: PushStepArgs) -> Self {
        PushStep {
            plan_id: val.plan,
            step: NewStep {
                title: val.title,
                description: val.description,
                wave: val.wave,
                depends_on: val.depends_on,
            },
        }
    }
}

/// Remove the top of the stack
#[derive(Args)]
pub struct PopArgs {
    /// Mark a popped goal abandoned instead of completed
    #[arg(long)]
    pub abandon: bool,
}

impl From<PopArgs> for PopItem {
    fn from(val: PopArgs) -> Self {
        PopItem {
            abandon: val.abandon,
        }
    }
}

/// Show a plan's progress and next steps
#[derive(Args)]
pub struct ProgressArgs {
    /// Plan to report on. Defaults to the plan nearest the top of the stack
    pub plan: Option<u64>,
}

/// Change a step's status
#[derive(Args)]
pub struct SetStepStatusArgs {
    /// ID of the step
    pub id: u64,
    /// todo, in_progress, completed or blocked
    pub status: String,
}

impl TryFrom<SetStepStatusArgs> for SetStepStatus {
    type Error = CairnError;

    fn try_from(val: SetStepStatusArgs) -> Result<Self, Self::Error> {
        Ok(SetStepStatus {
            step_id: val.id,
            status: val.status.parse()?,
        })
    }
}

#[derive(Subcommand)]
pub enum PlanCommands {
    /// Push a goal and make it the active one
    PushGoal(PushGoalArgs),
    /// Attach a plan to a goal
    PushPlan(PushPlanArgs),
    /// Append a step to a plan and focus it
    PushStep(PushStepArgs),
    /// Remove the top of the stack
    Pop(PopArgs),
    /// Show the stack, top first
    Peek,
    /// Show a plan's progress and next steps
    Progress(ProgressArgs),
    /// Change a step's status
    SetStepStatus(SetStepStatusArgs),
}

impl Cli {
    pub async fn handle_plan_command(&self, command: PlanCommands) -> Result<()> {
        match command {
            PlanCommands::PushGoal(args) => {
                let goal = self.store.push_goal(&args.into()).await?;
                self.render(CreateResult::new(goal))
            }
            PlanCommands::PushPlan(args) => {
                let plan = self.store.push_plan(&PushPlan::try_from(args)?).await?;
                self.render(CreateResult::new(plan))
            }
            PlanCommands::PushStep(args) => {
                let step = self.store.push_step(&args.into()).await?;
                self.render(CreateResult::new(step))
            }
            PlanCommands::Pop(args) => match self.store.pop_stack(&args.into()).await? {
                Some(item) => self.render(OperationStatus::success(format!(
                    "Popped {} {}: {}",
                    item.kind, item.item_id, item.title
                ))),
                None => self.render(OperationStatus::success("Planning stack is already empty")),
            },
            PlanCommands::Peek => {
                let peek = self.store.peek_stack().await?;
                self.render(peek)
            }
            PlanCommands::Progress(args) => {
                let (plan, progress) = self
                    .store
                    .plan_progress(args.plan)
                    .await?
                    .ok_or_else(|| match args.plan {
                        Some(id) => anyhow!(CairnError::PlanNotFound { id }),
                        None => anyhow!("No plan on the planning stack"),
                    })?;
                self.render(format!("# Plan {}. {}\n\n{progress}", plan.id, plan.title))
            }
            PlanCommands::SetStepStatus(args) => {
                let params = SetStepStatus::try_from(args)?;
                let step = self.store.set_step_status(&params).await?;
                self.render(UpdateResult::new(
                    step,
                    format!("status set to {}", params.status),
                ))
            }
        }
    }
}
