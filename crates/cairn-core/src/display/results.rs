//! Result wrapper types for displaying operation outcomes.

use std::fmt;

use crate::models::{Goal, KnowledgeEntity, Plan, PlanStep, Workflow};

/// A freshly created record with a one-line confirmation above it.
pub struct CreateResult<T> {
    pub resource: T,
}

impl<T> CreateResult<T> {
    pub fn new(resource: T) -> Self {
        Self { resource }
    }
}

/// A record after a status or phase change.
pub struct UpdateResult<T> {
    pub resource: T,
    pub change: String,
}

impl<T> UpdateResult<T> {
    pub fn new(resource: T, change: impl Into<String>) -> Self {
        Self {
            resource,
            change: change.into(),
        }
    }
}

/// Noun and id used in confirmation lines.
pub trait Identified {
    const NOUN: &'static str;

    fn display_id(&self) -> String;
}

impl Identified for Workflow {
    const NOUN: &'static str = "workflow";

    fn display_id(&self) -> String {
        self.id.to_string()
    }
}

impl Identified for Goal {
    const NOUN: &'static str = "goal";

    fn display_id(&self) -> String {
        self.id.to_string()
    }
}

impl Identified for Plan {
    const NOUN: &'static str = "plan";

    fn display_id(&self) -> String {
        self.id.to_string()
    }
}

impl Identified for PlanStep {
    const NOUN: &'static str = "step";

    fn display_id(&self) -> String {
        self.id.to_string()
    }
}

impl Identified for KnowledgeEntity {
    const NOUN: &'static str = "entity";

    fn display_id(&self) -> String {
        self.id.clone()
    }
}

impl<T: Identified + fmt::Display> fmt::Display for CreateResult<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Created {} with ID: {}", T::NOUN, self.resource.display_id())?;
        writeln!(f)?;
        write!(f, "{}", self.resource)
    }
}

impl<T: Identified + fmt::Display> fmt::Display for UpdateResult<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Updated {} {}: {}",
            T::NOUN,
            self.resource.display_id(),
            self.change
        )?;
        writeln!(f)?;
        write!(f, "{}", self.resource)
    }
}
