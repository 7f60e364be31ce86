//! Display implementations for domain models.
//!
//! Output is markdown: a heading per record, a metadata list, then nested
//! sections. Enumerations print their stored string form.

use std::fmt;

use super::datetime::LocalDateTime;
use crate::models::{
    Action, ActionResult, Checkpoint, CodeEntity, CodeEntityKind, CodeRelationKind, Commit,
    Dependent, EntityKind, Goal, GoalStatus, IndexReport, KnowledgeEntity, PackageSummary,
    ParseStats, Plan, PlanProgress, PlanStep, Relationship, RelationshipType, ScoredLearning,
    StackItem, StackItemKind, StackPeek, StepStatus, Workflow, WorkflowPhase, WorkflowStatus,
};

macro_rules! display_as_str {
    ($($ty:ty),* $(,)?) => {
        $(
            impl fmt::Display for $ty {
                fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    f.write_str(self.as_str())
                }
            }
        )*
    };
}

display_as_str!(
    WorkflowPhase,
    WorkflowStatus,
    ActionResult,
    GoalStatus,
    StepStatus,
    EntityKind,
    RelationshipType,
    CodeEntityKind,
    CodeRelationKind,
    StackItemKind,
);

impl fmt::Display for Workflow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "# Workflow {} (issue #{})", self.id, self.issue_number)?;
        writeln!(f)?;
        writeln!(f, "- Branch: {}", self.branch)?;
        if let Some(worktree) = &self.worktree {
            writeln!(f, "- Worktree: {worktree}")?;
        }
        writeln!(f, "- Phase: {}", self.phase)?;
        writeln!(f, "- Status: {}", self.status)?;
        if self.retry_count > 0 {
            writeln!(f, "- Retries: {}", self.retry_count)?;
        }
        writeln!(f, "- Created: {}", LocalDateTime(&self.created_at))?;
        writeln!(f, "- Updated: {}", LocalDateTime(&self.updated_at))
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "- {} **{}** ({})",
            LocalDateTime(&self.created_at),
            self.action,
            self.result
        )?;
        match &self.metadata {
            serde_json::Value::Object(map) if map.is_empty() => {}
            serde_json::Value::Null => {}
            metadata => write!(f, " `{metadata}`")?,
        }
        writeln!(f)
    }
}

impl fmt::Display for Commit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let short = self.sha.get(..7).unwrap_or(&self.sha);
        writeln!(f, "- `{short}` {}", self.message)
    }
}

impl fmt::Display for Checkpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.workflow)?;

        writeln!(f, "\n## Actions")?;
        writeln!(f)?;
        if self.actions.is_empty() {
            writeln!(f, "No actions recorded.")?;
        }
        for action in &self.actions {
            write!(f, "{action}")?;
        }

        writeln!(f, "\n## Commits")?;
        writeln!(f)?;
        if self.commits.is_empty() {
            writeln!(f, "No commits recorded.")?;
        }
        for commit in &self.commits {
            write!(f, "{commit}")?;
        }
        Ok(())
    }
}

impl fmt::Display for KnowledgeEntity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "## {} `{}`", self.kind, self.id)?;
        writeln!(f)?;
        if let Some(content) = &self.content {
            writeln!(f, "{content}")?;
            writeln!(f)?;
        } else {
            writeln!(f, "- Name: {}", self.name)?;
        }
        if let Some(area) = &self.code_area {
            writeln!(f, "- Code area: {area}")?;
        }
        match (&self.file_path, self.line_number) {
            (Some(path), Some(line)) => writeln!(f, "- File: {path}:{line}")?,
            (Some(path), None) => writeln!(f, "- File: {path}")?,
            _ => {}
        }
        if let Some(issue) = self.issue_number {
            writeln!(f, "- Issue: #{issue}")?;
        }
        writeln!(f, "- Updated: {}", LocalDateTime(&self.updated_at))
    }
}

impl fmt::Display for Relationship {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "- `{}` -[{}]-> `{}`", self.from_id, self.rel_type, self.to_id)
    }
}

impl fmt::Display for ScoredLearning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Similarity: {:.2}", self.score)?;
        write!(f, "{}", self.learning)
    }
}

impl fmt::Display for CodeEntity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let exported = if self.exported { " (exported)" } else { "" };
        writeln!(
            f,
            "- {} **{}**{exported} `{}:{}:{}`",
            self.kind, self.name, self.package, self.file_path, self.line_number
        )
    }
}

impl fmt::Display for Dependent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", "  ".repeat(self.depth.saturating_sub(1) as usize), self.entity)
    }
}

impl fmt::Display for PackageSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "| {} | {} | {} | {} |",
            self.package, self.files, self.entities, self.relationships
        )
    }
}

impl fmt::Display for IndexReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "# Code graph index")?;
        writeln!(f)?;
        writeln!(f, "- Packages: {}", self.packages)?;
        writeln!(f, "- Changed files: {}", self.changed_files)?;
        writeln!(f, "- Deleted files: {}", self.deleted_files)?;
        writeln!(f, "- Unchanged files: {}", self.unchanged_files)?;
        writeln!(f, "- Entities written: {}", self.entities_written)?;
        writeln!(f, "- Relationships written: {}", self.relationships_written)?;
        if !self.skipped_packages.is_empty() {
            writeln!(f, "- Skipped (deadline): {}", self.skipped_packages.join(", "))?;
        }
        if !self.errors.is_empty() {
            writeln!(f, "\n## Errors")?;
            writeln!(f)?;
            for error in &self.errors {
                writeln!(f, "- {error}")?;
            }
        }
        Ok(())
    }
}

impl fmt::Display for ParseStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "# Parse results")?;
        writeln!(f)?;
        writeln!(f, "- Files parsed: {}", self.files_parsed)?;
        writeln!(f, "- Entities: {}", self.entities)?;
        writeln!(f, "- Relationships: {}", self.relationships)?;
        if !self.errors.is_empty() {
            writeln!(f, "\n## Errors")?;
            writeln!(f)?;
            for error in &self.errors {
                writeln!(f, "- {error}")?;
            }
        }
        Ok(())
    }
}

impl fmt::Display for Goal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "# Goal {}. {}", self.id, self.title)?;
        writeln!(f)?;
        writeln!(f, "- Status: {}", self.status)?;
        if let Some(issue) = self.issue_number {
            writeln!(f, "- Issue: #{issue}")?;
        }
        writeln!(f, "- Created: {}", LocalDateTime(&self.created_at))?;
        if let Some(description) = &self.description {
            writeln!(f)?;
            writeln!(f, "{description}")?;
        }
        Ok(())
    }
}

impl fmt::Display for PlanStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "### {}. {} ({}, wave {})",
            self.id,
            self.title,
            self.status.with_icon(),
            self.wave
        )?;
        if !self.depends_on.is_empty() {
            let deps: Vec<String> = self.depends_on.iter().map(|id| id.to_string()).collect();
            writeln!(f)?;
            writeln!(f, "Depends on: {}", deps.join(", "))?;
        }
        if let Some(description) = &self.description {
            writeln!(f)?;
            writeln!(f, "{description}")?;
        }
        writeln!(f)
    }
}

impl fmt::Display for Plan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "# Plan {}. {}", self.id, self.title)?;
        writeln!(f)?;
        writeln!(f, "- Goal: {}", self.goal_id)?;
        writeln!(f, "- Updated: {}", LocalDateTime(&self.updated_at))?;

        if self.steps.is_empty() {
            writeln!(f, "\nNo steps in this plan.")
        } else {
            writeln!(f, "\n## Steps")?;
            writeln!(f)?;
            for step in &self.steps {
                write!(f, "{step}")?;
            }
            Ok(())
        }
    }
}

impl fmt::Display for PlanProgress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "## Progress: {}%", self.percentage)?;
        writeln!(f)?;
        writeln!(
            f,
            "- {} of {} completed, {} in progress, {} todo, {} blocked",
            self.completed, self.total, self.in_progress, self.todo, self.blocked
        )?;
        if self.next_steps.is_empty() {
            return writeln!(f, "- Next: nothing actionable");
        }
        writeln!(f, "\n## Next steps")?;
        writeln!(f)?;
        for step in &self.next_steps {
            writeln!(f, "- {}. {} (wave {})", step.id, step.title, step.wave)?;
        }
        Ok(())
    }
}

impl fmt::Display for StackItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "- [{}] {} {}: {}", self.position, self.kind, self.item_id, self.title)
    }
}

impl fmt::Display for StackPeek {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.items.is_empty() {
            return writeln!(f, "Planning stack is empty.");
        }
        writeln!(f, "# Planning stack (depth {})", self.depth)?;
        writeln!(f)?;
        // Top first.
        for item in self.items.iter().rev() {
            write!(f, "{item}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use jiff::Timestamp;

    use super::*;

    fn step(id: u64, status: StepStatus, depends_on: Vec<u64>) -> PlanStep {
        PlanStep {
            id,
            plan_id: 1,
            title: format!("Step {id}"),
            description: None,
            wave: 1,
            depends_on,
            status,
            order: id as u32,
            created_at: Timestamp::UNIX_EPOCH,
            updated_at: Timestamp::UNIX_EPOCH,
        }
    }

    #[test]
    fn test_enums_display_stored_form() {
        assert_eq!(WorkflowPhase::Implement.to_string(), "implement");
        assert_eq!(StepStatus::InProgress.to_string(), "in_progress");
        assert_eq!(RelationshipType::InFile.to_string(), "IN_FILE");
        assert_eq!(CodeRelationKind::Calls.to_string(), "calls");
    }

    #[test]
    fn test_plan_step_lists_dependencies() {
        let rendered = step(3, StepStatus::Todo, vec![1, 2]).to_string();
        assert!(rendered.starts_with("### 3. Step 3 (○ Todo, wave 1)"));
        assert!(rendered.contains("Depends on: 1, 2"));
    }

    #[test]
    fn test_commit_shows_short_sha() {
        let commit = Commit {
            id: 1,
            workflow_id: 1,
            sha: "abc1234def".to_string(),
            message: "msg".to_string(),
            created_at: Timestamp::UNIX_EPOCH,
        };
        assert_eq!(commit.to_string(), "- `abc1234` msg\n");
    }

    #[test]
    fn test_empty_stack() {
        assert_eq!(StackPeek::default().to_string(), "Planning stack is empty.\n");
    }
}
