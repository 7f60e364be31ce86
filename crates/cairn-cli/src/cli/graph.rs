//! `cairn graph` commands.

use std::path::PathBuf;

use anyhow::{Context, Result};
use cairn_core::{
    code_graph::IndexOptions,
    display::{CodeEntities, Dependents, GraphSummary},
    params::{FindEntities, ParsePackage, Traversal, DEFAULT_QUERY_LIMIT, DEFAULT_TRAVERSAL_DEPTH},
    CodeEntityKind, Deadline,
};
use clap::{Args, Subcommand};

use super::Cli;

/// Index the project, or parse a single package without storing it
#[derive(Args)]
pub struct ParseArgs {
    /// Package directory to parse. Without it every package under the
    /// project root is re-indexed
    pub path: Option<PathBuf>,
    /// Package name used in entity ids. Defaults to the directory name
    #[arg(short, long)]
    pub name: Option<String>,
    /// Only parse these files (relative to the package root), comma-separated
    #[arg(short, long, value_delimiter = ',')]
    pub files: Option<Vec<String>>,
    /// Drop the stored graph and re-index everything
    #[arg(long, conflicts_with = "path")]
    pub full: bool,
    /// Print entities, relationships and stats as JSON
    #[arg(long)]
    pub json: bool,
}

impl ParseArgs {
    fn package_params(
        path: PathBuf,
        name: Option<String>,
        files: Option<Vec<String>>,
    ) -> ParsePackage {
        let name = name.unwrap_or_else(|| {
            path.file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "package".to_string())
        });
        ParsePackage { path, name, files }
    }
}

/// Find entities by name
#[derive(Args)]
pub struct FindArgs {
    /// Substring of the entity name
    pub pattern: String,
    /// Only return entities of this kind (function, class, type, interface,
    /// variable, file)
    #[arg(short, long)]
    pub kind: Option<String>,
    /// Maximum number of results
    #[arg(short, long, default_value_t = DEFAULT_QUERY_LIMIT)]
    pub limit: usize,
}

impl TryFrom<FindArgs> for FindEntities {
    type Error = cairn_core::CairnError;

    fn try_from(val: FindArgs) -> Result<Self, Self::Error> {
        Ok(FindEntities {
            pattern: val.pattern,
            kind: val
                .kind
                .as_deref()
                .map(str::parse::<CodeEntityKind>)
                .transpose()?,
            limit: val.limit,
        })
    }
}

/// Reverse traversal from an entity or file
#[derive(Args)]
pub struct TraversalArgs {
    /// Entity id, entity name or file path
    pub target: String,
    /// Maximum traversal depth
    #[arg(short, long, default_value_t = DEFAULT_TRAVERSAL_DEPTH)]
    pub depth: u32,
    /// Maximum number of results
    #[arg(short, long, default_value_t = DEFAULT_QUERY_LIMIT * 5)]
    pub limit: usize,
}

impl From<TraversalArgs> for Traversal {
    fn from(val: TraversalArgs) -> Self {
        Traversal {
            target: val.target,
            max_depth: val.depth,
            limit: val.limit,
        }
    }
}

/// A command that takes a symbol name
#[derive(Args)]
pub struct NameArgs {
    /// Function or method name
    pub name: String,
}

/// A command that takes a file
#[derive(Args)]
pub struct FileArgs {
    /// File path, relative to its package or prefixed with `<package>:`
    pub file: String,
}

#[derive(Subcommand)]
pub enum GraphCommands {
    /// Index the project, or parse a single package without storing it
    Parse(ParseArgs),
    /// Entities that call a function or method
    WhatCalls(NameArgs),
    /// Files that import a file
    WhatDependsOn(FileArgs),
    /// Everything transitively affected by changing an entity or file
    BlastRadius(TraversalArgs),
    /// Find entities by name
    #[command(alias = "f")]
    Find(FindArgs),
    /// Entities a file exports
    Exports(FileArgs),
    /// Transitive callers of a function or method
    Callers(TraversalArgs),
    /// Per-package file, entity and relationship counts
    #[command(alias = "s")]
    Summary,
}

impl Cli {
    pub async fn handle_graph_command(&self, command: GraphCommands) -> Result<()> {
        match command {
            GraphCommands::Parse(args) => self.parse(args).await,
            GraphCommands::WhatCalls(args) => {
                self.record_graph_query(&format!("what-calls {}", args.name));
                let entities = self.store.what_calls(&args.name).await?;
                self.render(CodeEntities(entities))
            }
            GraphCommands::WhatDependsOn(args) => {
                self.record_graph_query(&format!("what-depends-on {}", args.file));
                let entities = self.store.what_depends_on(&args.file).await?;
                self.render(CodeEntities(entities))
            }
            GraphCommands::BlastRadius(args) => {
                self.record_graph_query(&format!("blast-radius {}", args.target));
                let dependents = self
                    .store
                    .blast_radius(&args.into(), Deadline::none())
                    .await?;
                self.render(Dependents(dependents))
            }
            GraphCommands::Find(args) => {
                self.record_graph_query(&format!("find {}", args.pattern));
                let entities = self.store.find_entities(&FindEntities::try_from(args)?).await?;
                self.render(CodeEntities(entities))
            }
            GraphCommands::Exports(args) => {
                self.record_graph_query(&format!("exports {}", args.file));
                let entities = self.store.exports(&args.file).await?;
                self.render(CodeEntities(entities))
            }
            GraphCommands::Callers(args) => {
                self.record_graph_query(&format!("callers {}", args.target));
                let dependents = self.store.callers(&args.into(), Deadline::none()).await?;
                self.render(Dependents(dependents))
            }
            GraphCommands::Summary => {
                self.record_graph_query("summary");
                let summary = self.store.graph_summary().await?;
                self.render(GraphSummary(summary))
            }
        }
    }

    async fn parse(&self, args: ParseArgs) -> Result<()> {
        let ParseArgs {
            path,
            name,
            files,
            full,
            json,
        } = args;

        match path {
            Some(path) => {
                let params = ParseArgs::package_params(path, name, files);
                let result = self
                    .store
                    .parse_package(&params)
                    .await
                    .with_context(|| format!("Failed to parse {}", params.path.display()))?;
                if json {
                    self.print_json(&result)
                } else {
                    self.render(result.stats.unwrap_or_default())
                }
            }
            None => {
                let run = self
                    .store
                    .index_project(
                        IndexOptions {
                            full,
                            collect: json,
                        },
                        Deadline::none(),
                    )
                    .await
                    .context("Failed to index project")?;
                match run.parsed {
                    Some(parsed) if json => self.print_json(&parsed),
                    _ => self.render(run.report),
                }
            }
        }
    }
}
