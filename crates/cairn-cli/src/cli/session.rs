//! Session hook commands: `session-start`, `session-end`, `session-check`.

use std::{
    path::{Path, PathBuf},
    process::Command,
    time::Duration,
};

use anyhow::{bail, Context, Result};
use cairn_core::{
    display::OperationStatus,
    params::{LogAction, NewLearning},
    session::{CONTEXT_END, CONTEXT_START},
    ActionResult, SessionContextOptions,
};
use clap::Args;
use log::{debug, info, warn};

use super::{knowledge::read_input, Cli};

/// Print the session context block
#[derive(Args)]
pub struct SessionStartArgs {
    /// Issue the session works on. Defaults to the active goal's issue, then
    /// the first number in the branch name
    #[arg(short, long)]
    pub issue: Option<u64>,
    /// Issue title, used for keywords when the planning stack is empty
    #[arg(long)]
    pub issue_title: Option<String>,
    /// Branch name. Defaults to the project's current git branch
    #[arg(short, long)]
    pub branch: Option<String>,
    /// Time budget for each section, in milliseconds
    #[arg(long, default_value_t = 5000)]
    pub section_timeout_ms: u64,
    /// Print the context and per-section failures as JSON
    #[arg(long)]
    pub json: bool,
}

/// Store learnings from a finished session and clear its state
#[derive(Args)]
pub struct SessionEndArgs {
    /// JSON array of learnings (`-` for stdin). A session context block in
    /// the input is ignored
    #[arg(short, long)]
    pub learnings: Option<PathBuf>,
    /// Issue to attach to learnings that name none
    #[arg(short, long)]
    pub issue: Option<u64>,
}

/// Exit successfully if the session may run a broad search
#[derive(Args)]
pub struct SessionCheckArgs {
    /// The search about to run, for the log
    #[arg(short, long)]
    pub query: Option<String>,
}

impl Cli {
    pub async fn session_start(&self, args: SessionStartArgs) -> Result<()> {
        if let Err(e) = self.tracker.init() {
            warn!("Failed to initialize session state: {e}");
        }

        let branch = args
            .branch
            .or_else(|| current_branch(self.store.root()));
        let options = SessionContextOptions {
            issue_number: args.issue,
            issue_title: args.issue_title,
            branch,
            section_timeout: Duration::from_millis(args.section_timeout_ms),
            ..Default::default()
        };

        let context = cairn_core::build_session_context(&self.store, &options).await;
        if context.failed.any() {
            info!("Session context sections failed: {:?}", context.failed);
        }

        if args.json {
            return self.print_json(&context);
        }
        if !context.text.is_empty() {
            print!("{}", context.text);
        }
        Ok(())
    }

    pub async fn session_end(&self, args: SessionEndArgs) -> Result<()> {
        let mut learnings = match &args.learnings {
            Some(path) => parse_learnings(&read_input(path)?)
                .with_context(|| format!("Invalid learnings JSON in {}", path.display()))?,
            None => Vec::new(),
        };
        if let Some(issue) = args.issue {
            for learning in learnings.iter_mut().filter(|l| l.issue_number.is_none()) {
                learning.issue_number = Some(issue);
            }
        }

        let stored = if learnings.is_empty() {
            0
        } else {
            self.store
                .store_learnings(&learnings)
                .await
                .context("Failed to store session learnings")?
                .len()
        };

        if let Some(issue) = args.issue {
            self.log_session_end(issue, stored).await;
        }

        if let Err(e) = self.tracker.clear() {
            warn!("Failed to clear session state: {e}");
        }
        self.render(OperationStatus::success(format!(
            "Session ended; stored {stored} learning(s)"
        )))
    }

    pub fn session_check(&self, args: &SessionCheckArgs) -> Result<()> {
        let query = args.query.as_deref().unwrap_or("<unspecified>");
        if self.tracker.broad_search_allowed() {
            debug!("Broad search allowed: {query}");
            return Ok(());
        }
        bail!(
            "Broad search blocked for this session. Query the code graph (`cairn graph find`) \
             or the knowledge base (`cairn knowledge query`) first"
        )
    }

    /// Audit entry on the issue's workflow; failures only log.
    async fn log_session_end(&self, issue: u64, stored: usize) {
        let workflow = match self.store.find_workflow_by_issue(issue).await {
            Ok(Some(workflow)) => workflow,
            Ok(None) => return,
            Err(e) => {
                warn!("Failed to look up workflow for issue #{issue}: {e}");
                return;
            }
        };
        self.store
            .log_action(&LogAction {
                workflow_id: workflow.id,
                action: "session-end".to_string(),
                result: ActionResult::Success,
                metadata: serde_json::json!({ "learnings": stored }),
            })
            .await;
    }
}

/// Parses a JSON array of learnings, skipping any session context block
/// echoed back into the input.
fn parse_learnings(input: &str) -> Result<Vec<NewLearning>> {
    let json = strip_context_block(input);
    if json.trim().is_empty() {
        return Ok(Vec::new());
    }
    Ok(serde_json::from_str(&json)?)
}

fn strip_context_block(input: &str) -> String {
    let mut inside = false;
    let mut kept = Vec::new();
    for line in input.lines() {
        match line.trim() {
            CONTEXT_START => inside = true,
            CONTEXT_END => inside = false,
            _ if !inside => kept.push(line),
            _ => {}
        }
    }
    kept.join("\n")
}

/// Current git branch of `root`, or `None` outside a repository or on a
/// detached HEAD.
fn current_branch(root: &Path) -> Option<String> {
    let output = Command::new("git")
        .args(["rev-parse", "--abbrev-ref", "HEAD"])
        .current_dir(root)
        .output()
        .ok()?;
    if !output.status.success() {
        debug!("git rev-parse failed in {}", root.display());
        return None;
    }
    let branch = String::from_utf8_lossy(&output.stdout).trim().to_string();
    (!branch.is_empty() && branch != "HEAD").then_some(branch)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_context_block() {
        let input = format!("{CONTEXT_START}\n## Planning\n{CONTEXT_END}\n[]\n");
        assert_eq!(strip_context_block(&input).trim(), "[]");
    }

    #[test]
    fn test_parse_learnings() {
        let learnings =
            parse_learnings(r#"[{"content": "Use WAL", "codeArea": "db", "issueNumber": 3}]"#)
                .unwrap();
        assert_eq!(learnings.len(), 1);
        assert_eq!(learnings[0].code_area.as_deref(), Some("db"));
        assert_eq!(learnings[0].issue_number, Some(3));

        assert!(parse_learnings("  \n").unwrap().is_empty());
    }
}
