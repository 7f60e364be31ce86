//! Cairn CLI Application
//!
//! Command-line interface for the cairn agent memory store.

mod args;
mod cli;
mod renderer;

use std::sync::Arc;

use anyhow::{Context, Result};
use args::{Args, Commands, EmbedderArg};
use cairn_core::{Embedder, EmbedderProvider, HashingEmbedder, SessionTracker, StoreBuilder};
use clap::Parser;
use cli::Cli;
use log::info;
use renderer::TerminalRenderer;
use Commands::*;

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let Args {
        database_file,
        root,
        no_color,
        embedder,
        command,
    } = Args::parse();

    let store = StoreBuilder::new()
        .with_database_path(database_file)
        .with_root(root)
        .with_embedder_provider(embedder_provider(embedder))
        .build()
        .await
        .context("Failed to open memory database")?;

    let tracker = SessionTracker::from_env().context("Failed to locate session state")?;
    let renderer = TerminalRenderer::new(!no_color);

    info!("Cairn started with database {}", store.database_path().display());

    let cli = Cli::new(store, renderer, tracker);
    match command {
        Workflow { command } => cli.handle_workflow_command(command).await,
        Graph { command } => cli.handle_graph_command(command).await,
        Knowledge { command } => cli.handle_knowledge_command(command).await,
        Plan { command } => cli.handle_plan_command(command).await,
        SessionStart(args) => cli.session_start(args).await,
        SessionEnd(args) => cli.session_end(args).await,
        SessionCheck(args) => cli.session_check(&args),
    }
}

fn embedder_provider(choice: EmbedderArg) -> Option<EmbedderProvider> {
    match choice {
        EmbedderArg::None => None,
        EmbedderArg::Hashing => Some(Arc::new(|| {
            Ok(Arc::new(HashingEmbedder::default()) as Arc<dyn Embedder>)
        })),
    }
}
