//! Core library for cairn, a persistent memory service for coding agents.
//!
//! The crate keeps four kinds of state in one SQLite database:
//!
//! - **Workflows**: issue-driven work items with phases, an action log and
//!   commits, resumable from a checkpoint
//! - **Knowledge graph**: learnings, patterns and mistakes linked by typed
//!   relationships, with optional semantic search
//! - **Code graph**: entities and relationships parsed from TypeScript and
//!   JavaScript packages, re-indexed incrementally
//! - **Planning stack**: goals, plans and steps with wave-ordered progress
//!
//! All access goes through the [`Store`] facade, which runs each operation
//! on a blocking thread with its own connection. Output formatting lives in
//! [`display`], and [`session`] builds the context block printed when an
//! agent session starts.
//!
//! # Quick Start
//!
//! ```rust
//! use cairn_core::{params::CreateWorkflow, StoreBuilder};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = StoreBuilder::new()
//!     .with_database_path(Some("memory.db"))
//!     .build()
//!     .await?;
//!
//! let workflow = store
//!     .create_workflow(&CreateWorkflow {
//!         issue_number: 42,
//!         branch: "feat/42-session-context".to_string(),
//!         worktree: None,
//!     })
//!     .await?;
//! println!("{workflow}");
//! # Ok(())
//! # }
//! ```

pub mod code_graph;
pub mod db;
pub mod deadline;
pub mod display;
pub mod error;
pub mod models;
pub mod params;
pub mod semantic;
pub mod session;
pub mod store;

// Re-export commonly used types
pub use db::Database;
pub use deadline::Deadline;
pub use display::{CreateResult, LocalDateTime, OperationStatus, UpdateResult};
pub use error::{CairnError, Result};
pub use models::{
    ActionResult, Checkpoint, CodeEntity, CodeEntityKind, EntityKind, GoalStatus, KnowledgeEntity,
    Plan, PlanProgress, StepStatus, Workflow, WorkflowPhase, WorkflowStatus,
};
pub use semantic::{Embedder, EmbedderProvider, HashingEmbedder, SemanticIndex};
pub use session::{build_session_context, SessionContextOptions, SessionTracker};
pub use store::{Store, StoreBuilder};
