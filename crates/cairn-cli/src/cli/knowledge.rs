//! `cairn knowledge` commands.

use std::{
    fs,
    io::Read,
    path::{Path, PathBuf},
};

use anyhow::{bail, Context, Result};
use cairn_core::{
    display::{Learnings, Relationships, ScoredLearnings},
    models::KnowledgeFilter,
    params::{NewLearning, NewMistake, NewPattern, SearchSimilar, Supersede, DEFAULT_QUERY_LIMIT},
    session::extract_keywords,
    CairnError,
};
use clap::{Args, Subcommand};
use log::info;

use super::Cli;

/// Minimum similarity for `query --text` results.
const SIMILARITY_THRESHOLD: f32 = 0.25;

/// Store one learning, or a JSON array of learnings
#[derive(Args)]
pub struct StoreArgs {
    /// The learning itself
    #[arg(required_unless_present = "from_json")]
    pub content: Option<String>,
    /// Code area the learning is about
    #[arg(short, long)]
    pub area: Option<String>,
    /// File the learning refers to
    #[arg(short, long)]
    pub file: Option<String>,
    /// Line in the file
    #[arg(short, long, requires = "file")]
    pub line: Option<u32>,
    /// Issue the learning came from
    #[arg(short, long)]
    pub issue: Option<u64>,
    /// Read learnings from a JSON file (`-` for stdin) instead
    #[arg(long, conflicts_with = "content")]
    pub from_json: Option<PathBuf>,
}

impl StoreArgs {
    fn into_learnings(self) -> Result<Vec<NewLearning>> {
        if let Some(path) = &self.from_json {
            let raw = read_input(path)?;
            return serde_json::from_str(&raw)
                .with_context(|| format!("Invalid learnings JSON in {}", path.display()));
        }
        Ok(vec![NewLearning {
            content: self.content.unwrap_or_default(),
            code_area: self.area,
            file_path: self.file,
            line_number: self.line,
            issue_number: self.issue,
            metadata: serde_json::Value::Object(Default::default()),
        }])
    }
}

/// Query learnings by issue, file, code area and keywords
#[derive(Args)]
pub struct QueryArgs {
    /// Free text; searched semantically when an embedder is configured,
    /// otherwise split into keywords
    #[arg(short, long)]
    pub text: Option<String>,
    /// Code area
    #[arg(short, long)]
    pub area: Option<String>,
    /// File path
    #[arg(short, long)]
    pub file: Option<String>,
    /// Issue number
    #[arg(short, long)]
    pub issue: Option<u64>,
    /// Keywords, comma-separated
    #[arg(short, long, value_delimiter = ',')]
    pub keywords: Vec<String>,
    /// Maximum number of results
    #[arg(short, long, default_value_t = DEFAULT_QUERY_LIMIT)]
    pub limit: usize,
}

impl From<&QueryArgs> for KnowledgeFilter {
    fn from(val: &QueryArgs) -> Self {
        let mut keywords = val.keywords.clone();
        if let Some(text) = &val.text {
            keywords.extend(extract_keywords(text, usize::MAX));
        }
        KnowledgeFilter {
            code_area: val.area.clone(),
            file_path: val.file.clone(),
            issue_number: val.issue,
            keywords,
        }
    }
}

/// Store a reusable pattern
#[derive(Args)]
pub struct PatternArgs {
    /// Pattern name
    pub name: String,
    /// Code area the pattern applies to
    #[arg(short, long)]
    pub area: String,
    /// What the pattern is
    #[arg(short, long)]
    pub description: Option<String>,
    /// IDs of learnings that led to the pattern, comma-separated
    #[arg(long, value_delimiter = ',')]
    pub learnings: Vec<String>,
}

impl From<PatternArgs> for NewPattern {
    fn from(val: PatternArgs) -> Self {
        NewPattern {
            name: val.name,
            description: val.description,
            code_area: val.area,
            learning_ids: val.learnings,
        }
    }
}

/// Record a mistake and, optionally, the learning that fixed it
#[derive(Args)]
pub struct MistakeArgs {
    /// What went wrong
    pub description: String,
    /// File where it happened
    #[arg(short, long)]
    pub file: Option<String>,
    /// Line in the file
    #[arg(short, long, requires = "file")]
    pub line: Option<u32>,
    /// Issue it happened on
    #[arg(short, long)]
    pub issue: Option<u64>,
    /// ID of the learning that resolved it
    #[arg(long)]
    pub learning: Option<String>,
}

impl From<MistakeArgs> for NewMistake {
    fn from(val: MistakeArgs) -> Self {
        NewMistake {
            description: val.description,
            file_path: val.file,
            line_number: val.line,
            issue_number: val.issue,
            learning_id: val.learning,
        }
    }
}

/// Mark a learning as replaced by a newer one
#[derive(Args)]
pub struct SupersedeArgs {
    /// ID of the outdated learning
    pub old_id: String,
    /// ID of the learning replacing it
    pub new_id: String,
}

impl From<SupersedeArgs> for Supersede {
    fn from(val: SupersedeArgs) -> Self {
        Supersede {
            old_id: val.old_id,
            new_id: val.new_id,
        }
    }
}

/// Show an entity and its relationships
#[derive(Args)]
pub struct ShowEntityArgs {
    /// Entity ID, e.g. `learning:1a2b3c4d5e6f`
    pub id: String,
}

#[derive(Subcommand)]
pub enum KnowledgeCommands {
    /// Store one learning, or a JSON array of learnings
    #[command(alias = "s")]
    Store(StoreArgs),
    /// Query learnings
    #[command(alias = "q")]
    Query(QueryArgs),
    /// Store a reusable pattern
    Pattern(PatternArgs),
    /// Record a mistake
    Mistake(MistakeArgs),
    /// Mark a learning as replaced by a newer one
    Supersede(SupersedeArgs),
    /// Show an entity and its relationships
    Show(ShowEntityArgs),
}

impl Cli {
    pub async fn handle_knowledge_command(&self, command: KnowledgeCommands) -> Result<()> {
        match command {
            KnowledgeCommands::Store(args) => {
                let learnings = args.into_learnings()?;
                let stored = self
                    .store
                    .store_learnings(&learnings)
                    .await
                    .context("Failed to store learnings")?;
                self.render(Learnings(stored))
            }
            KnowledgeCommands::Query(args) => self.query(args).await,
            KnowledgeCommands::Pattern(args) => {
                let pattern = self.store.store_pattern(&args.into()).await?;
                self.render(pattern)
            }
            KnowledgeCommands::Mistake(args) => {
                let mistake = self.store.store_mistake(&args.into()).await?;
                self.render(mistake)
            }
            KnowledgeCommands::Supersede(args) => {
                let relationship = self.store.supersede_learning(&args.into()).await?;
                self.render(relationship)
            }
            KnowledgeCommands::Show(args) => {
                let entity = self
                    .store
                    .get_entity(&args.id)
                    .await?
                    .ok_or_else(|| CairnError::EntityNotFound {
                        id: args.id.clone(),
                    })?;
                let relationships = self.store.relationships_of(&args.id).await?;
                self.render(format!("{entity}\n{}", Relationships(relationships)))
            }
        }
    }

    async fn query(&self, args: QueryArgs) -> Result<()> {
        let filter = KnowledgeFilter::from(&args);
        if filter.is_empty() && args.text.is_none() {
            bail!("Provide at least one of --text, --area, --file, --issue or --keywords");
        }
        let description = args
            .text
            .clone()
            .unwrap_or_else(|| filter.keywords.join(" "));
        self.record_docs_search(&description);

        if let Some(text) = &args.text {
            let search = SearchSimilar {
                text: text.clone(),
                limit: args.limit,
                threshold: SIMILARITY_THRESHOLD,
            };
            match self.store.search_similar(&search).await {
                Ok(scored) if !scored.is_empty() => return self.render(ScoredLearnings(scored)),
                Ok(_) => info!("No similar learnings; falling back to keyword query"),
                Err(CairnError::EmbedderUnavailable { reason }) => {
                    info!("Semantic search unavailable ({reason}); using keyword query");
                }
                Err(e) => return Err(e.into()),
            }
        }

        let learnings = self.store.query_learnings(&filter, args.limit).await?;
        self.render(Learnings(learnings))
    }
}

/// Reads a file, or stdin for `-`.
pub(super) fn read_input(path: &Path) -> Result<String> {
    if path.as_os_str() == "-" {
        let mut raw = String::new();
        std::io::stdin()
            .read_to_string(&mut raw)
            .context("Failed to read stdin")?;
        Ok(raw)
    } else {
        fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
    }
}
