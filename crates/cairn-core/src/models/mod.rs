//! Data models for workflows, the knowledge graph, the code graph and the
//! planning stack.
//!
//! Display implementations for these models live in
//! [`crate::display::models`] so that data structures and presentation stay
//! separate. All models derive `Serialize`/`Deserialize` so the CLI can emit
//! them as JSON.
//!
//! # Examples
//!
//! ```rust
//! use cairn_core::models::{RelationshipType, EntityKind};
//!
//! assert!(RelationshipType::About.allows(EntityKind::Learning, EntityKind::CodeArea));
//! assert!(!RelationshipType::About.allows(EntityKind::Pattern, EntityKind::CodeArea));
//! ```

pub mod code_graph;
pub mod knowledge;
pub mod planning;
pub mod status;
pub mod workflow;

#[cfg(test)]
mod tests;

pub use code_graph::{
    CodeEntity, CodeEntityKind, CodeRelationKind, CodeRelationship, Dependent, FileMeta,
    IndexReport, PackageInfo, PackageSummary, ParseResult, ParseStats, ParsedRelationship,
    RelationTarget, EXTERNAL_PREFIX,
};
pub use knowledge::{
    EntityKind, KnowledgeEntity, KnowledgeFilter, Relationship, RelationshipType, ScoredLearning,
};
pub use planning::{Goal, Plan, PlanProgress, PlanStep, StackItem, StackItemKind, StackPeek};
pub use status::{ActionResult, GoalStatus, StepStatus, WorkflowPhase, WorkflowStatus};
pub use workflow::{Action, Checkpoint, Commit, Workflow};
