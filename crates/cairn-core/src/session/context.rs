//! Session context assembly.
//!
//! Three sections (planning, code graph, learnings) are built one after the
//! other, each raced against its own timer. A section that fails or runs out
//! of time is dropped from the output and flagged in [`SectionFailures`];
//! nothing here returns an error.

use std::{fmt::Write as _, future::Future, time::Duration};

use serde::{Deserialize, Serialize};

use super::keywords::{extract_keywords, issue_number_from_branch, DEFAULT_MAX_KEYWORDS};
use crate::{
    code_graph::IndexOptions,
    deadline::Deadline,
    error::{CairnError, Result},
    models::{
        CodeEntity, CodeEntityKind, KnowledgeEntity, KnowledgeFilter, PlanProgress, ScoredLearning,
        StackItemKind,
    },
    params::{FindEntities, SearchSimilar},
    store::Store,
};

pub const CONTEXT_START: &str = "=== CAIRN SESSION CONTEXT ===";
pub const CONTEXT_END: &str = "=== END CAIRN SESSION CONTEXT ===";

/// Entities listed per keyword search in the graph section.
const ENTITIES_PER_KEYWORD: usize = 5;

/// Keyword searches issued by the graph section.
const GRAPH_KEYWORD_SEARCHES: usize = 2;

/// Inputs and budgets for [`build_session_context`].
#[derive(Debug, Clone)]
pub struct SessionContextOptions {
    pub issue_number: Option<u64>,
    pub issue_title: Option<String>,
    /// Current VCS branch, used for keywords when the stack is empty
    pub branch: Option<String>,
    /// Budget for each of the three sections
    pub section_timeout: Duration,
    /// Budget for computing plan progress inside the planning section
    pub progress_timeout: Duration,
    pub max_keywords: usize,
    pub max_learnings: usize,
    pub similarity_threshold: f32,
}

impl Default for SessionContextOptions {
    fn default() -> Self {
        Self {
            issue_number: None,
            issue_title: None,
            branch: None,
            section_timeout: Duration::from_secs(5),
            progress_timeout: Duration::from_secs(1),
            max_keywords: DEFAULT_MAX_KEYWORDS,
            max_learnings: 5,
            similarity_threshold: 0.25,
        }
    }
}

/// Which sections failed or timed out.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SectionFailures {
    pub planning: bool,
    pub graph: bool,
    pub learnings: bool,
}

impl SectionFailures {
    pub fn any(&self) -> bool {
        self.planning || self.graph || self.learnings
    }
}

/// The assembled context block and per-section failure flags.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionContext {
    /// Delimited text block, or empty when no section produced content
    pub text: String,
    pub failed: SectionFailures,
    /// Keywords the graph and learnings sections searched for
    pub keywords: Vec<String>,
}

struct PlanningOutcome {
    text: Option<String>,
    keywords: Vec<String>,
    issue_number: Option<u64>,
}

/// Builds the session context block. Never fails; see the module docs.
pub async fn build_session_context(
    store: &Store,
    options: &SessionContextOptions,
) -> SessionContext {
    let mut failed = SectionFailures::default();
    let mut sections = Vec::new();

    let branch_issue = options.branch.as_deref().and_then(issue_number_from_branch);
    let fallback_keywords = || {
        let source = options
            .issue_title
            .as_deref()
            .or(options.branch.as_deref())
            .unwrap_or_default();
        extract_keywords(source, options.max_keywords)
    };

    let planning = race(
        "Planning section",
        options.section_timeout,
        planning_section(store, options),
    )
    .await;
    let (keywords, issue_number) = match planning {
        Ok(outcome) => {
            if let Some(text) = outcome.text {
                sections.push(text);
            }
            (outcome.keywords, outcome.issue_number.or(branch_issue))
        }
        Err(e) => {
            log::warn!("{e}");
            failed.planning = true;
            (fallback_keywords(), options.issue_number.or(branch_issue))
        }
    };
    log::debug!("Session keywords: {keywords:?}, issue: {issue_number:?}");

    let graph = race(
        "Graph section",
        options.section_timeout,
        graph_section(store, &keywords, Deadline::after(options.section_timeout)),
    )
    .await;
    match graph {
        Ok(Some(text)) => sections.push(text),
        Ok(None) => {}
        Err(e) => {
            log::warn!("{e}");
            failed.graph = true;
        }
    }

    let learnings = race(
        "Learnings section",
        options.section_timeout,
        learnings_section(store, &keywords, issue_number, options),
    )
    .await;
    match learnings {
        Ok(Some(text)) => sections.push(text),
        Ok(None) => {}
        Err(e) => {
            log::warn!("{e}");
            failed.learnings = true;
        }
    }

    SessionContext {
        text: assemble(&sections),
        failed,
        keywords,
    }
}

/// Wraps the non-empty `sections` in the context delimiters.
pub fn assemble(sections: &[String]) -> String {
    if sections.is_empty() {
        return String::new();
    }
    let mut out = String::new();
    out.push_str(CONTEXT_START);
    out.push('\n');
    out.push_str(&sections.join("\n\n"));
    out.push('\n');
    out.push_str(CONTEXT_END);
    out.push('\n');
    out
}

async fn race<T>(
    operation: &str,
    budget: Duration,
    work: impl Future<Output = Result<T>>,
) -> Result<T> {
    match tokio::time::timeout(budget, work).await {
        Ok(result) => result,
        Err(_) => Err(CairnError::Timeout {
            operation: operation.to_string(),
            elapsed_ms: budget.as_millis() as u64,
        }),
    }
}

async fn planning_section(
    store: &Store,
    options: &SessionContextOptions,
) -> Result<PlanningOutcome> {
    let peek = store.peek_stack().await?;
    let goal = store.focused_goal().await?;
    let issue_number = options
        .issue_number
        .or_else(|| goal.as_ref().and_then(|g| g.issue_number));

    let mut text = String::from("## Planning\n");
    let mut has_content = false;

    if let Some(issue) = issue_number {
        let line = match options.issue_title.as_deref() {
            Some(title) => format!("Issue #{issue}: {title}"),
            None => format!("Issue #{issue}"),
        };
        writeln!(text, "{line}").ok();
        has_content = true;
    }

    let Some(top) = peek.top_item else {
        let source = options
            .issue_title
            .as_deref()
            .or(options.branch.as_deref())
            .unwrap_or_default();
        return Ok(PlanningOutcome {
            text: has_content.then(|| text.trim_end().to_string()),
            keywords: extract_keywords(source, options.max_keywords),
            issue_number,
        });
    };

    writeln!(
        text,
        "Focus: {} #{} \"{}\" (stack depth {})",
        top.kind.as_str(),
        top.item_id,
        top.title,
        peek.depth
    )
    .ok();
    if top.kind != StackItemKind::Goal {
        if let Some(goal) = &goal {
            writeln!(text, "Goal: #{} \"{}\"", goal.id, goal.title).ok();
        }
    }

    let progress = tokio::time::timeout(options.progress_timeout, async {
        store
            .plan_for_stack_item(&top)
            .await
            .map(|plan| plan.map(|plan| (PlanProgress::compute(&plan), plan)))
    })
    .await;

    match progress {
        Ok(Ok(Some((progress, plan)))) => {
            writeln!(
                text,
                "Plan #{} \"{}\": {}% ({}/{} steps completed, {} blocked)",
                plan.id,
                plan.title,
                progress.percentage,
                progress.completed,
                progress.total,
                progress.blocked
            )
            .ok();
            let next = match progress.next_steps.first() {
                Some(step) => {
                    format!("Next step: #{} {} (wave {})", step.id, step.title, step.wave)
                }
                None if progress.total > 0 && progress.completed == progress.total => {
                    "All steps completed".to_string()
                }
                None => "No actionable steps".to_string(),
            };
            writeln!(text, "{next}").ok();
        }
        Ok(Ok(None)) => {}
        Ok(Err(e)) => log::warn!("Plan progress unavailable: {e}"),
        Err(_) => log::warn!(
            "Plan progress timed out after {}ms",
            options.progress_timeout.as_millis()
        ),
    }

    Ok(PlanningOutcome {
        text: Some(text.trim_end().to_string()),
        keywords: extract_keywords(&top.title, options.max_keywords),
        issue_number,
    })
}

async fn graph_section(
    store: &Store,
    keywords: &[String],
    deadline: Deadline,
) -> Result<Option<String>> {
    let run = store.index_project(IndexOptions::default(), deadline).await?;
    let summary = store.graph_summary().await?;
    if summary.is_empty() {
        return Ok(None);
    }

    let entities: u32 = summary.iter().map(|s| s.entities).sum();
    let mut text = String::from("## Code graph\n");
    writeln!(
        text,
        "{} package(s), {} entities ({} changed, {} deleted file(s) re-indexed)",
        summary.len(),
        entities,
        run.report.changed_files,
        run.report.deleted_files
    )
    .ok();
    if !run.report.skipped_packages.is_empty() {
        writeln!(
            text,
            "Not re-indexed in time: {}",
            run.report.skipped_packages.join(", ")
        )
        .ok();
    }

    let mut first_hit: Option<CodeEntity> = None;
    for keyword in keywords.iter().take(GRAPH_KEYWORD_SEARCHES) {
        deadline.check("Graph section")?;
        let found = store
            .find_entities(&FindEntities {
                pattern: keyword.clone(),
                kind: None,
                limit: ENTITIES_PER_KEYWORD,
            })
            .await?;
        let found: Vec<CodeEntity> = found
            .into_iter()
            .filter(|e| e.kind != CodeEntityKind::File)
            .collect();
        if found.is_empty() {
            continue;
        }
        writeln!(text, "Matches for \"{keyword}\":").ok();
        for entity in &found {
            writeln!(text, "- {}", entity_line(entity)).ok();
        }
        if first_hit.is_none() {
            first_hit = found.into_iter().next();
        }
    }

    if let Some(hit) = first_hit {
        deadline.check("Graph section")?;
        let callers = store.what_calls(hit.short_name()).await?;
        if !callers.is_empty() {
            writeln!(text, "Callers of {}:", hit.short_name()).ok();
            for caller in callers.iter().take(ENTITIES_PER_KEYWORD) {
                writeln!(text, "- {}", entity_line(caller)).ok();
            }
        }
    }

    Ok(Some(text.trim_end().to_string()))
}

async fn learnings_section(
    store: &Store,
    keywords: &[String],
    issue_number: Option<u64>,
    options: &SessionContextOptions,
) -> Result<Option<String>> {
    let limit = options.max_learnings;

    if !keywords.is_empty() {
        let similar = store
            .search_similar(&SearchSimilar {
                text: keywords.join(" "),
                limit,
                threshold: options.similarity_threshold,
            })
            .await;
        match similar {
            Ok(found) if !found.is_empty() => return Ok(Some(render_scored(&found))),
            Ok(_) => log::debug!("Semantic search found nothing; falling back to keywords"),
            Err(CairnError::EmbedderUnavailable { reason }) => {
                log::debug!("Semantic search unavailable ({reason}); falling back")
            }
            Err(e) => log::warn!("Semantic search failed: {e}"),
        }
    }

    if let Some(issue) = issue_number {
        let by_issue = store
            .query_learnings(
                &KnowledgeFilter {
                    issue_number: Some(issue),
                    ..Default::default()
                },
                limit,
            )
            .await?;
        if !by_issue.is_empty() {
            return Ok(Some(render_learnings(&by_issue)));
        }
    }

    if !keywords.is_empty() {
        let by_keyword = store
            .query_learnings(
                &KnowledgeFilter {
                    keywords: keywords.to_vec(),
                    ..Default::default()
                },
                limit,
            )
            .await?;
        if !by_keyword.is_empty() {
            return Ok(Some(render_learnings(&by_keyword)));
        }
    }

    Ok(None)
}

fn entity_line(entity: &CodeEntity) -> String {
    format!(
        "{} {} ({}:{}:{})",
        entity.kind.as_str(),
        entity.name,
        entity.package,
        entity.file_path,
        entity.line_number
    )
}

fn learning_line(learning: &KnowledgeEntity) -> String {
    let body = learning.content.as_deref().unwrap_or(&learning.name);
    match &learning.code_area {
        Some(area) => format!("[{area}] {body}"),
        None => body.to_string(),
    }
}

fn render_scored(found: &[ScoredLearning]) -> String {
    let mut text = String::from("## Learnings\n");
    for scored in found {
        writeln!(
            text,
            "- {} (similarity {:.2})",
            learning_line(&scored.learning),
            scored.score
        )
        .ok();
    }
    text.trim_end().to_string()
}

fn render_learnings(found: &[KnowledgeEntity]) -> String {
    let mut text = String::from("## Learnings\n");
    for learning in found {
        writeln!(text, "- {}", learning_line(learning)).ok();
    }
    text.trim_end().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assemble_empty_is_empty_string() {
        assert_eq!(assemble(&[]), "");
    }

    #[test]
    fn test_assemble_separates_sections() {
        let text = assemble(&["## A\none".to_string(), "## B\ntwo".to_string()]);
        assert_eq!(
            text,
            "=== CAIRN SESSION CONTEXT ===\n## A\none\n\n## B\ntwo\n=== END CAIRN SESSION CONTEXT ===\n"
        );
    }

    #[tokio::test]
    async fn test_race_reports_timeout() {
        let result: Result<()> = race("Slow section", Duration::from_millis(10), async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        })
        .await;
        assert!(matches!(result, Err(CairnError::Timeout { .. })));
    }
}
