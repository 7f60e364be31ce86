//! Markdown formatting for models and command results.
//!
//! Domain models implement [`std::fmt::Display`] in [`models`]; the wrappers
//! here add collection handling and confirmation lines. The CLI renders the
//! resulting markdown with its terminal renderer.
//!
//! - [`collections`]: newtype wrappers over result lists
//! - [`results`]: create and update confirmations
//! - [`status`]: one-line success/failure messages
//! - [`datetime`]: local time formatting
//!
//! ```rust
//! use cairn_core::display::OperationStatus;
//!
//! let status = OperationStatus::success("Removed 2 workflow(s)");
//! assert_eq!(status.to_string(), "Success: Removed 2 workflow(s)\n");
//! ```

pub mod collections;
pub mod datetime;
pub mod models;
pub mod results;
pub mod status;

pub use collections::{
    CodeEntities, Dependents, GraphSummary, Learnings, Relationships, ScoredLearnings, Workflows,
};
pub use datetime::LocalDateTime;
pub use results::{CreateResult, UpdateResult};
pub use status::OperationStatus;
