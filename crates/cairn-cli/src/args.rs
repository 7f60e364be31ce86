use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

use crate::cli::{
    GraphCommands, KnowledgeCommands, PlanCommands, SessionCheckArgs, SessionEndArgs,
    SessionStartArgs, WorkflowCommands,
};

/// Durable memory for coding-agent workflows
///
/// Cairn keeps workflow checkpoints, a knowledge graph of learnings, a code
/// graph of the project's TypeScript/JavaScript packages and a planning stack
/// in one SQLite database under the project root. Agent hooks call
/// `session-start` to print a context block and `session-end` to store what
/// the session learned.
#[derive(Parser)]
#[command(version, about, name = "cairn")]
pub struct Args {
    /// Path to the SQLite database file. Defaults to
    /// <root>/.cairn/memory.db
    #[arg(long, global = true)]
    pub database_file: Option<PathBuf>,

    /// Project root scanned by the code graph. Defaults to the current
    /// directory
    #[arg(long, global = true)]
    pub root: Option<PathBuf>,

    /// Disable colored output and use plain text
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Embedding backend for semantic search over learnings
    #[arg(long, global = true, value_enum, default_value_t = EmbedderArg::None)]
    pub embedder: EmbedderArg,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
///
/// - `workflow`: checkpoint records for issue-driven work
/// - `graph`: code graph indexing and queries
/// - `knowledge`: learnings, patterns and mistakes
/// - `plan`: the goal/plan/step stack
/// - `session-start`, `session-end`, `session-check`: agent session hooks
#[derive(Subcommand)]
pub enum Commands {
    /// Manage workflow checkpoints
    #[command(alias = "w")]
    Workflow {
        #[command(subcommand)]
        command: WorkflowCommands,
    },
    /// Index and query the code graph
    #[command(alias = "g")]
    Graph {
        #[command(subcommand)]
        command: GraphCommands,
    },
    /// Store and query learnings
    #[command(alias = "k")]
    Knowledge {
        #[command(subcommand)]
        command: KnowledgeCommands,
    },
    /// Manage the planning stack
    #[command(alias = "p")]
    Plan {
        #[command(subcommand)]
        command: PlanCommands,
    },
    /// Print the session context block
    SessionStart(SessionStartArgs),
    /// Store learnings from a finished session and clear its state
    SessionEnd(SessionEndArgs),
    /// Exit successfully if the session may run a broad search
    SessionCheck(SessionCheckArgs),
}

/// Embedding backend selection.
#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum EmbedderArg {
    /// No semantic search; learnings are found by keyword queries only
    None,
    /// Local feature-hashing embedder
    Hashing,
}
