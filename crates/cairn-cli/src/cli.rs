//! Command handlers and their clap argument structs.
//!
//! Argument structs stay in the CLI crate and convert into the core
//! parameter types with `From`/`TryFrom`, so `cairn-core` carries no clap
//! derives:
//!
//! ```text
//! User Input → CLI Args (clap) → Core Params → Store
//! ```
//!
//! Each submodule owns one command group and adds its `handle_*` method to
//! [`Cli`]. Handlers render markdown through the [`TerminalRenderer`] and
//! return `Err` for anything that should exit non-zero.

use std::fmt::Display;

use anyhow::Result;
use cairn_core::{SessionTracker, Store};
use log::warn;

use crate::renderer::TerminalRenderer;

mod graph;
mod knowledge;
mod plan;
mod session;
mod workflow;

pub use graph::GraphCommands;
pub use knowledge::KnowledgeCommands;
pub use plan::PlanCommands;
pub use session::{SessionCheckArgs, SessionEndArgs, SessionStartArgs};
pub use workflow::WorkflowCommands;

/// Runs one command against the store.
pub struct Cli {
    store: Store,
    renderer: TerminalRenderer,
    tracker: SessionTracker,
}

impl Cli {
    pub fn new(store: Store, renderer: TerminalRenderer, tracker: SessionTracker) -> Self {
        Self {
            store,
            renderer,
            tracker,
        }
    }

    fn render(&self, output: impl Display) -> Result<()> {
        self.renderer.render(&output.to_string())
    }

    fn print_json<T: serde::Serialize>(&self, value: &T) -> Result<()> {
        println!("{}", serde_json::to_string_pretty(value)?);
        Ok(())
    }

    /// Session bookkeeping never fails a command.
    fn record_graph_query(&self, query: &str) {
        if let Err(e) = self.tracker.record_graph_query(query) {
            warn!("Failed to record graph query: {e}");
        }
    }

    fn record_docs_search(&self, query: &str) {
        if let Err(e) = self.tracker.record_docs_search(query) {
            warn!("Failed to record docs search: {e}");
        }
    }
}
