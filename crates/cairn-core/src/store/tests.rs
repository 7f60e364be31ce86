//! Tests for the store facade.

use std::{fs, sync::Arc, time::Duration};

use tempfile::TempDir;

use super::*;
use crate::{
    code_graph::IndexOptions,
    deadline::Deadline,
    models::{
        ActionResult, EntityKind, KnowledgeFilter, StackItemKind, StepStatus, WorkflowPhase,
        WorkflowStatus,
    },
    params::{
        CreateWorkflow, FindEntities, Id, LogAction, LogCommit, NewLearning, NewStep, PopItem,
        PushGoal, PushPlan, PushStep, SearchSimilar, SetPhase, SetStepStatus, Supersede,
        Traversal,
    },
    semantic::{EmbedderProvider, HashingEmbedder},
    session::{build_session_context, SessionContextOptions},
};

/// Helper function to create a test store rooted in a temp directory
async fn create_test_store() -> (TempDir, Store) {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let store = StoreBuilder::new()
        .with_root(Some(temp_dir.path()))
        .build()
        .await
        .expect("Failed to create store");
    (temp_dir, store)
}

async fn create_semantic_store() -> (TempDir, Store) {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let provider: EmbedderProvider = Arc::new(|| Ok(Arc::new(HashingEmbedder::default()) as _));
    let store = StoreBuilder::new()
        .with_root(Some(temp_dir.path()))
        .with_embedder_provider(Some(provider))
        .build()
        .await
        .expect("Failed to create store");
    (temp_dir, store)
}

fn learning(content: &str) -> NewLearning {
    NewLearning {
        content: content.to_string(),
        ..Default::default()
    }
}

#[tokio::test]
async fn test_default_database_location() {
    let (temp_dir, store) = create_test_store().await;
    assert!(store.database_path().starts_with(temp_dir.path()));
    assert!(store.database_path().ends_with(".cairn/memory.db"));
    assert!(store.database_path().exists());
}

#[tokio::test]
async fn test_workflow_checkpoint_round_trip() {
    let (_temp_dir, store) = create_test_store().await;

    let workflow = store
        .create_workflow(&CreateWorkflow {
            issue_number: 42,
            branch: "feat/42-store".to_string(),
            worktree: None,
        })
        .await
        .expect("Failed to create workflow");
    assert_eq!(workflow.phase, WorkflowPhase::Research);
    assert_eq!(workflow.status, WorkflowStatus::Running);

    store
        .set_phase(&SetPhase {
            id: workflow.id,
            phase: WorkflowPhase::Implement,
        })
        .await
        .expect("Failed to set phase");

    for action in ["read issue", "write code"] {
        store
            .append_action(&LogAction {
                workflow_id: workflow.id,
                action: action.to_string(),
                result: ActionResult::Success,
                metadata: serde_json::json!({}),
            })
            .await
            .expect("Failed to log action");
    }
    store
        .append_commit(&LogCommit {
            workflow_id: workflow.id,
            sha: "abc1234".to_string(),
            message: "Add store".to_string(),
        })
        .await
        .expect("Failed to log commit");

    let checkpoint = store
        .load_checkpoint(&Id { id: workflow.id })
        .await
        .expect("Failed to load checkpoint")
        .expect("Checkpoint should exist");
    assert_eq!(checkpoint.workflow.phase, WorkflowPhase::Implement);
    let actions: Vec<&str> = checkpoint.actions.iter().map(|a| a.action.as_str()).collect();
    assert_eq!(actions, vec!["read issue", "write code"]);
    assert_eq!(checkpoint.commits.len(), 1);

    let found = store
        .find_workflow_by_issue(42)
        .await
        .expect("Failed to find workflow")
        .expect("Workflow should exist");
    assert_eq!(found.id, workflow.id);
}

#[tokio::test]
async fn test_best_effort_logging_swallows_missing_workflow() {
    let (_temp_dir, store) = create_test_store().await;

    let logged = store
        .log_action(&LogAction {
            workflow_id: 999,
            action: "orphan".to_string(),
            ..Default::default()
        })
        .await;
    assert!(logged.is_none());

    let err = store
        .append_commit(&LogCommit {
            workflow_id: 999,
            sha: "abc".to_string(),
            message: "msg".to_string(),
        })
        .await
        .expect_err("Strict append should fail");
    assert!(matches!(err, CairnError::WorkflowNotFound { id: 999 }));
}

#[tokio::test]
async fn test_delete_missing_workflow() {
    let (_temp_dir, store) = create_test_store().await;
    let err = store.delete_workflow(&Id { id: 7 }).await.unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_planning_stack_flow() {
    let (_temp_dir, store) = create_test_store().await;

    let goal = store
        .push_goal(&PushGoal {
            title: "Ship session context".to_string(),
            description: None,
            issue_number: Some(12),
        })
        .await
        .expect("Failed to push goal");

    let plan = store
        .push_plan(&PushPlan {
            goal_id: None,
            title: "Context plan".to_string(),
            steps: vec![
                NewStep::new("Keywords"),
                NewStep {
                    wave: 2,
                    ..NewStep::new("Sections")
                },
            ],
        })
        .await
        .expect("Failed to push plan");
    assert_eq!(plan.goal_id, goal.id);
    assert_eq!(plan.steps.len(), 2);

    let (_, progress) = store
        .plan_progress(None)
        .await
        .expect("Failed to get progress")
        .expect("Focused plan should exist");
    assert_eq!(progress.total, 2);
    assert_eq!(progress.next_steps.len(), 1);
    assert_eq!(progress.next_steps[0].title, "Keywords");

    store
        .set_step_status(&SetStepStatus {
            step_id: plan.steps[0].id,
            status: StepStatus::Completed,
        })
        .await
        .expect("Failed to complete step");

    let (_, progress) = store.plan_progress(Some(plan.id)).await.unwrap().unwrap();
    assert_eq!(progress.percentage, 50);
    assert_eq!(progress.next_steps[0].title, "Sections");

    let step = store
        .push_step(&PushStep {
            plan_id: None,
            step: NewStep::new("Docs"),
        })
        .await
        .expect("Failed to push step");
    assert_eq!(step.plan_id, plan.id);

    let peek = store.peek_stack().await.expect("Failed to peek");
    assert_eq!(peek.depth, 3);
    let top = peek.top_item.expect("Stack should have a top");
    assert_eq!(top.kind, StackItemKind::Step);
    let owning = store.plan_for_stack_item(&top).await.unwrap().unwrap();
    assert_eq!(owning.id, plan.id);

    let popped = store
        .pop_stack(&PopItem::default())
        .await
        .expect("Failed to pop")
        .expect("Stack should not be empty");
    assert_eq!(popped.item_id, step.id);
}

#[tokio::test]
async fn test_push_plan_without_goal_fails() {
    let (_temp_dir, store) = create_test_store().await;
    let err = store
        .push_plan(&PushPlan {
            goal_id: None,
            title: "Orphan".to_string(),
            steps: vec![],
        })
        .await
        .unwrap_err();
    assert!(matches!(err, CairnError::Validation { .. }));
}

#[tokio::test]
async fn test_learnings_query_and_supersede() {
    let (_temp_dir, store) = create_test_store().await;

    let stored = store
        .store_learnings(&[
            NewLearning {
                code_area: Some("parser".to_string()),
                ..learning("Tree-sitter nodes borrow the source text")
            },
            NewLearning {
                issue_number: Some(5),
                ..learning("Retry the index when the database is locked")
            },
        ])
        .await
        .expect("Failed to store learnings");
    assert_eq!(stored.len(), 2);
    assert!(stored.iter().all(|l| l.kind == EntityKind::Learning));

    let relationships = store.relationships_of(&stored[0].id).await.unwrap();
    assert_eq!(relationships.len(), 1);

    let filter = KnowledgeFilter {
        code_area: Some("Parser".to_string()),
        issue_number: Some(5),
        ..Default::default()
    };
    let results = store.query_learnings(&filter, 10).await.unwrap();
    let ids: Vec<&str> = results.iter().map(|l| l.id.as_str()).collect();
    // The issue match is more specific than the code area match.
    assert_eq!(ids, vec![stored[1].id.as_str(), stored[0].id.as_str()]);

    let replacement = store
        .store_learnings(&[NewLearning {
            code_area: Some("parser".to_string()),
            ..learning("Tree-sitter nodes borrow the tree and the source text")
        }])
        .await
        .unwrap();
    store
        .supersede_learning(&Supersede {
            old_id: stored[0].id.clone(),
            new_id: replacement[0].id.clone(),
        })
        .await
        .expect("Failed to supersede");

    let area_only = KnowledgeFilter {
        code_area: Some("parser".to_string()),
        ..Default::default()
    };
    let results = store.query_learnings(&area_only, 10).await.unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].id, replacement[0].id);
}

#[tokio::test]
async fn test_search_similar_requires_embedder() {
    let (_temp_dir, store) = create_test_store().await;
    let err = store
        .search_similar(&SearchSimilar {
            text: "database locked".to_string(),
            limit: 5,
            threshold: 0.1,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, CairnError::EmbedderUnavailable { .. }));
}

#[tokio::test]
async fn test_search_similar_ranks_shared_vocabulary() {
    let (_temp_dir, store) = create_semantic_store().await;
    store
        .store_learnings(&[
            learning("Retry the index when the database is locked"),
            learning("Buttons use the primary color token"),
        ])
        .await
        .unwrap();

    let results = store
        .search_similar(&SearchSimilar {
            text: "database is locked during index".to_string(),
            limit: 5,
            threshold: 0.2,
        })
        .await
        .expect("Search should succeed");
    assert!(!results.is_empty());
    assert_eq!(
        results[0].learning.content.as_deref(),
        Some("Retry the index when the database is locked")
    );
}

#[tokio::test]
async fn test_index_project_and_query_calls() {
    let (temp_dir, store) = create_test_store().await;
    let package = temp_dir.path().join("app");
    fs::create_dir_all(package.join("src")).unwrap();
    fs::write(package.join("package.json"), r#"{"name": "app"}"#).unwrap();
    fs::write(
        package.join("src/main.ts"),
        "export function foo() {\n  return bar();\n}\n\nfunction bar() {\n  return 1;\n}\n",
    )
    .unwrap();

    let run = store
        .index_project(IndexOptions::default(), Deadline::after(Duration::from_secs(30)))
        .await
        .expect("Failed to index");
    assert_eq!(run.report.packages, 1);
    assert_eq!(run.report.changed_files, 1);

    let callers = store.what_calls("bar").await.unwrap();
    let names: Vec<&str> = callers.iter().map(|e| e.name.as_str()).collect();
    assert_eq!(names, vec!["foo"]);

    let found = store
        .find_entities(&FindEntities {
            pattern: "fo".to_string(),
            kind: None,
            limit: 10,
        })
        .await
        .unwrap();
    assert_eq!(found[0].name, "foo");

    let radius = store
        .blast_radius(&Traversal::new("bar"), Deadline::none())
        .await
        .unwrap();
    assert!(radius.iter().any(|d| d.entity.name == "foo" && d.depth == 1));

    // Second run sees nothing new.
    let run = store
        .index_project(IndexOptions::default(), Deadline::none())
        .await
        .unwrap();
    assert_eq!(run.report.changed_files, 0);
    assert_eq!(run.report.unchanged_files, 1);
}

#[tokio::test]
async fn test_index_project_with_expired_deadline_skips_packages() {
    let (temp_dir, store) = create_test_store().await;
    let package = temp_dir.path().join("lib");
    fs::create_dir_all(&package).unwrap();
    fs::write(package.join("package.json"), r#"{"name": "lib"}"#).unwrap();
    fs::write(package.join("index.ts"), "export const a = 1;\n").unwrap();

    let run = store
        .index_project(IndexOptions::default(), Deadline::after(Duration::ZERO))
        .await
        .expect("An expired deadline is not an error");
    assert_eq!(run.report.packages, 0);
    assert_eq!(run.report.skipped_packages, vec!["lib"]);
    assert!(store.graph_summary().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_session_context_for_empty_project() {
    let (_temp_dir, store) = create_test_store().await;
    let options = SessionContextOptions {
        section_timeout: Duration::from_secs(2),
        ..Default::default()
    };

    let started = std::time::Instant::now();
    let context = build_session_context(&store, &options).await;
    assert!(started.elapsed() < options.section_timeout * 3 + Duration::from_secs(1));
    assert_eq!(context.text, "");
    assert!(!context.failed.any());
}

#[tokio::test]
async fn test_session_context_lists_focus_and_issue_learnings() {
    let (_temp_dir, store) = create_test_store().await;
    store
        .push_goal(&PushGoal {
            title: "Speed up parser cache".to_string(),
            description: None,
            issue_number: Some(31),
        })
        .await
        .unwrap();
    store
        .store_learnings(&[NewLearning {
            issue_number: Some(31),
            ..learning("Cache parsers per dialect")
        }])
        .await
        .unwrap();

    let context = build_session_context(&store, &SessionContextOptions::default()).await;
    assert!(context.text.starts_with("=== CAIRN SESSION CONTEXT ==="));
    assert!(context.text.contains("Issue #31"));
    assert!(context.text.contains("Speed up parser cache"));
    assert!(context.text.contains("- Cache parsers per dialect"));
    assert!(context.keywords.iter().any(|k| k == "parser"));
}

#[tokio::test]
async fn test_failed_graph_section_keeps_other_sections() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    // The project root is missing, so package discovery errors out.
    let store = StoreBuilder::new()
        .with_root(Some(temp_dir.path().join("missing")))
        .with_database_path(Some(temp_dir.path().join("memory.db")))
        .build()
        .await
        .expect("Failed to create store");
    store
        .push_goal(&PushGoal {
            title: "Harden parser cache".to_string(),
            description: None,
            issue_number: Some(12),
        })
        .await
        .unwrap();
    store
        .store_learnings(&[NewLearning {
            issue_number: Some(12),
            ..learning("Evict parsers on dialect change")
        }])
        .await
        .unwrap();

    let options = SessionContextOptions {
        section_timeout: Duration::from_secs(2),
        ..Default::default()
    };
    let started = std::time::Instant::now();
    let context = build_session_context(&store, &options).await;
    assert!(started.elapsed() < options.section_timeout * 3 + Duration::from_secs(1));

    assert!(context.failed.graph);
    assert!(!context.failed.planning);
    assert!(!context.failed.learnings);
    assert!(context.text.contains("## Planning"));
    assert!(context.text.contains("Harden parser cache"));
    assert!(context.text.contains("## Learnings"));
    assert!(context.text.contains("- Evict parsers on dialect change"));
    assert!(!context.text.contains("## Code graph"));
    assert!(context.text.ends_with("=== END CAIRN SESSION CONTEXT ===\n"));
}
