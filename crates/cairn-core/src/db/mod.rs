//! Database operations and SQLite management.
//!
//! One [`Database`] wraps one connection to the shared memory file. Query
//! methods are split by subsystem across the `*_queries` modules, each adding
//! an `impl Database` block. Every multi-row mutation runs in a single
//! transaction so partial writes are never observable.

use std::{path::Path, time::Duration};

use rusqlite::Connection;

use crate::error::{DatabaseResultExt, Result};

pub mod embedding_queries;
pub mod graph_queries;
pub mod knowledge_queries;
pub mod migrations;
pub mod planning_queries;
pub mod utils;
pub mod workflow_queries;

/// How long a writer waits for another connection's lock before failing.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Database connection and operations handler.
pub struct Database {
    connection: Connection,
}

impl Database {
    /// Creates a new database connection and initializes the schema.
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let connection = Connection::open(path).db_context("Failed to open database connection")?;
        connection
            .busy_timeout(BUSY_TIMEOUT)
            .db_context("Failed to set busy timeout")?;

        let db = Self { connection };
        db.initialize_schema()?;
        Ok(db)
    }
}
