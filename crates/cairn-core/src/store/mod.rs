//! Async facade over the database.
//!
//! [`Store`] is the entry point used by the CLI and the session context
//! builder. Every operation opens its own connection on tokio's blocking
//! pool, so callers never hold a connection across an `.await`.
//!
//! Operations are grouped by subsystem:
//!
//! - [`workflow_ops`]: checkpoint records, actions and commits
//! - [`knowledge_ops`]: learnings, patterns, mistakes and semantic search
//! - [`graph_ops`]: code graph indexing and queries
//! - [`planning_ops`]: the goal/plan/step stack

use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use tokio::task;

use crate::{
    db::Database,
    error::{CairnError, Result},
    semantic::SemanticIndex,
};

pub mod builder;
pub mod graph_ops;
pub mod knowledge_ops;
pub mod planning_ops;
pub mod workflow_ops;

#[cfg(test)]
mod tests;

pub use builder::StoreBuilder;

/// Handle to a project's memory database.
pub struct Store {
    pub(crate) db_path: PathBuf,
    pub(crate) root: PathBuf,
    pub(crate) semantic: Arc<SemanticIndex>,
}

impl Store {
    pub(crate) fn new(db_path: PathBuf, root: PathBuf, semantic: SemanticIndex) -> Self {
        Self {
            db_path,
            root,
            semantic: Arc::new(semantic),
        }
    }

    /// Path of the database file.
    pub fn database_path(&self) -> &Path {
        &self.db_path
    }

    /// Project root scanned by the code graph indexer.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Runs `op` against a fresh connection on the blocking pool.
    pub(crate) async fn with_database<T, F>(&self, op: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Database) -> Result<T> + Send + 'static,
    {
        let db_path = self.db_path.clone();

        task::spawn_blocking(move || {
            let mut db = Database::new(&db_path)?;
            op(&mut db)
        })
        .await
        .map_err(CairnError::join_error)?
    }
}
