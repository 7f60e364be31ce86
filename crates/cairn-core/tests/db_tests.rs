mod common;

use cairn_core::{
    models::{
        ActionResult, EntityKind, GoalStatus, KnowledgeFilter, RelationshipType, StackItemKind,
        WorkflowPhase, WorkflowStatus,
    },
    params::{NewLearning, NewMistake, NewPattern, NewStep},
    CairnError,
};
use common::create_test_db;

fn learning(content: &str) -> NewLearning {
    NewLearning {
        content: content.to_string(),
        ..Default::default()
    }
}

#[test]
fn test_database_initialization() {
    let (temp_file, _db) = create_test_db();
    assert!(temp_file.path().exists());
}

#[test]
fn test_reopening_keeps_data() {
    let (temp_file, mut db) = create_test_db();
    let workflow = db
        .create_workflow(3, "fix/3-reopen", None)
        .expect("Failed to create workflow");
    drop(db);

    let db = cairn_core::Database::new(temp_file.path()).expect("Failed to reopen database");
    let reopened = db
        .get_workflow(workflow.id)
        .expect("Failed to get workflow")
        .expect("Workflow should survive reopening");
    assert_eq!(reopened.branch, "fix/3-reopen");
}

#[test]
fn test_create_workflow_rejects_empty_branch() {
    let (_temp_file, mut db) = create_test_db();
    let err = db.create_workflow(1, "  ", None).unwrap_err();
    assert!(matches!(err, CairnError::InvalidInput { .. }));
}

#[test]
fn test_workflow_status_and_retry() {
    let (_temp_file, mut db) = create_test_db();
    let workflow = db
        .create_workflow(10, "feat/10", Some("/tmp/wt-10"))
        .expect("Failed to create workflow");
    assert_eq!(workflow.retry_count, 0);
    assert_eq!(workflow.worktree.as_deref(), Some("/tmp/wt-10"));

    let workflow = db.increment_retry(workflow.id).unwrap();
    let workflow = db.increment_retry(workflow.id).unwrap();
    assert_eq!(workflow.retry_count, 2);

    let workflow = db.set_phase(workflow.id, WorkflowPhase::Review).unwrap();
    assert_eq!(workflow.phase, WorkflowPhase::Review);
    // Phases are not ordered.
    let workflow = db.set_phase(workflow.id, WorkflowPhase::Research).unwrap();
    assert_eq!(workflow.phase, WorkflowPhase::Research);

    let workflow = db.set_status(workflow.id, WorkflowStatus::Failed).unwrap();
    assert_eq!(workflow.status, WorkflowStatus::Failed);

    assert!(matches!(
        db.set_status(999, WorkflowStatus::Paused),
        Err(CairnError::WorkflowNotFound { id: 999 })
    ));
}

#[test]
fn test_actions_keep_insertion_order() {
    let (_temp_file, mut db) = create_test_db();
    let workflow = db.create_workflow(4, "feat/4", None).unwrap();

    db.log_action(
        workflow.id,
        "run tests",
        ActionResult::Failed,
        &serde_json::json!({"failed": 3}),
    )
    .unwrap();
    db.log_action(workflow.id, "fix tests", ActionResult::Success, &serde_json::Value::Null)
        .unwrap();
    db.log_commit(workflow.id, "deadbeef", "Fix tests").unwrap();
    db.log_commit(workflow.id, "deadbeef", "Fix tests again").unwrap();

    let checkpoint = db.load_checkpoint(workflow.id).unwrap().unwrap();
    assert_eq!(checkpoint.actions.len(), 2);
    assert_eq!(checkpoint.actions[0].action, "run tests");
    assert_eq!(checkpoint.actions[0].result, ActionResult::Failed);
    assert_eq!(checkpoint.actions[0].metadata["failed"], 3);
    assert_eq!(checkpoint.actions[1].metadata, serde_json::json!({}));
    assert_eq!(checkpoint.commits.len(), 2);

    assert!(db.load_checkpoint(12345).unwrap().is_none());
}

#[test]
fn test_find_by_issue_returns_most_recent() {
    let (_temp_file, mut db) = create_test_db();
    let first = db.create_workflow(8, "feat/8-a", None).unwrap();
    let second = db.create_workflow(8, "feat/8-b", None).unwrap();
    db.create_workflow(9, "feat/9", None).unwrap();

    let found = db.find_workflow_by_issue(8).unwrap().unwrap();
    assert_eq!(found.id, second.id);

    db.set_phase(first.id, WorkflowPhase::Merge).unwrap();
    let found = db.find_workflow_by_issue(8).unwrap().unwrap();
    assert_eq!(found.id, first.id);

    assert!(db.find_workflow_by_issue(404).unwrap().is_none());
}

#[test]
fn test_list_active_excludes_completed() {
    let (_temp_file, mut db) = create_test_db();
    let done = db.create_workflow(1, "feat/1", None).unwrap();
    let paused = db.create_workflow(2, "feat/2", None).unwrap();
    db.create_workflow(3, "feat/3", None).unwrap();

    db.set_status(done.id, WorkflowStatus::Completed).unwrap();
    db.set_status(paused.id, WorkflowStatus::Paused).unwrap();

    let active = db.list_active_workflows().unwrap();
    let issues: Vec<u64> = active.iter().map(|w| w.issue_number).collect();
    assert_eq!(active.len(), 2);
    assert!(!issues.contains(&1));
}

#[test]
fn test_cleanup_never_removes_running_workflows() {
    let (_temp_file, mut db) = create_test_db();
    let running = db.create_workflow(1, "feat/1", None).unwrap();
    let completed = db.create_workflow(2, "feat/2", None).unwrap();
    let failed = db.create_workflow(3, "feat/3", None).unwrap();
    db.log_action(completed.id, "merge", ActionResult::Success, &serde_json::json!({}))
        .unwrap();

    db.set_status(completed.id, WorkflowStatus::Completed).unwrap();
    db.set_status(failed.id, WorkflowStatus::Failed).unwrap();

    // Nothing is a week old yet.
    assert_eq!(db.cleanup_workflows(7, true).unwrap(), 0);

    assert_eq!(db.cleanup_workflows(0, false).unwrap(), 1);
    assert!(db.get_workflow(completed.id).unwrap().is_none());
    assert!(db.load_checkpoint(completed.id).unwrap().is_none());
    assert!(db.get_workflow(failed.id).unwrap().is_some());

    assert_eq!(db.cleanup_workflows(0, true).unwrap(), 1);
    assert!(db.get_workflow(failed.id).unwrap().is_none());
    assert!(db.get_workflow(running.id).unwrap().is_some());
}

#[test]
fn test_store_learnings_links_area_and_file() {
    let (_temp_file, mut db) = create_test_db();
    let stored = db
        .store_learnings(&[NewLearning {
            code_area: Some("Indexer".to_string()),
            file_path: Some("src/indexer.rs".to_string()),
            line_number: Some(40),
            ..learning("Skip files whose hash did not change")
        }])
        .expect("Failed to store learning");
    let stored = &stored[0];
    assert_eq!(stored.kind, EntityKind::Learning);
    assert_eq!(stored.line_number, Some(40));

    let relationships = db.relationships_of(&stored.id).unwrap();
    let targets: Vec<&str> = relationships.iter().map(|r| r.to_id.as_str()).collect();
    assert_eq!(relationships.len(), 2);
    assert!(targets.contains(&"area:indexer"));
    assert!(targets.contains(&"file:src/indexer.rs"));
    assert_eq!(db.count_entities(EntityKind::CodeArea).unwrap(), 1);

    // The same content stores the same learning.
    let again = db
        .store_learnings(&[learning("Skip files whose hash did not change")])
        .unwrap();
    assert_eq!(again[0].id, stored.id);
    assert_eq!(db.count_entities(EntityKind::Learning).unwrap(), 1);
}

#[test]
fn test_learning_with_area_creates_one_about_edge() {
    let (_temp_file, mut db) = create_test_db();
    let note = NewLearning {
        code_area: Some("API".to_string()),
        ..learning("X")
    };
    let stored = db.store_learnings(&[note.clone()]).unwrap();
    // Storing the same learning again must not duplicate the edge.
    db.store_learnings(&[note]).unwrap();

    assert_eq!(db.count_entities(EntityKind::Learning).unwrap(), 1);
    assert_eq!(db.count_entities(EntityKind::CodeArea).unwrap(), 1);
    let area = db.get_entity("area:api").unwrap().expect("Code area node");
    assert_eq!(area.name, "API");

    let relationships = db.relationships_of(&stored[0].id).unwrap();
    assert_eq!(relationships.len(), 1);
    assert_eq!(relationships[0].rel_type, RelationshipType::About);
    assert_eq!(relationships[0].to_id, "area:api");
}

#[test]
fn test_store_learnings_rejects_empty_content_atomically() {
    let (_temp_file, mut db) = create_test_db();
    let err = db
        .store_learnings(&[learning("A valid learning"), learning("   ")])
        .unwrap_err();
    assert!(matches!(err, CairnError::InvalidInput { .. }));
    assert_eq!(db.count_entities(EntityKind::Learning).unwrap(), 0);
}

#[test]
fn test_pattern_with_unknown_learning_is_rolled_back() {
    let (_temp_file, mut db) = create_test_db();
    let err = db
        .store_pattern(&NewPattern {
            name: "Retry on lock".to_string(),
            description: None,
            code_area: "database".to_string(),
            learning_ids: vec!["learning:missing".to_string()],
        })
        .unwrap_err();
    assert!(matches!(err, CairnError::EntityNotFound { .. }));
    assert_eq!(db.count_entities(EntityKind::Pattern).unwrap(), 0);
}

#[test]
fn test_pattern_and_mistake_edges() {
    let (_temp_file, mut db) = create_test_db();
    let fix = db
        .store_learnings(&[learning("Open the database with a busy timeout")])
        .unwrap()
        .remove(0);

    let pattern = db
        .store_pattern(&NewPattern {
            name: "Retry on lock".to_string(),
            description: Some("Wait for the writer instead of failing".to_string()),
            code_area: "database".to_string(),
            learning_ids: vec![fix.id.clone()],
        })
        .unwrap();
    assert_eq!(pattern.kind, EntityKind::Pattern);
    assert_eq!(pattern.id, "pattern:retry-on-lock");

    let mistake = db
        .store_mistake(&NewMistake {
            description: "Opened two writers without a timeout".to_string(),
            file_path: Some("src/db/mod.rs".to_string()),
            learning_id: Some(fix.id.clone()),
            ..Default::default()
        })
        .unwrap();
    assert_eq!(mistake.kind, EntityKind::Mistake);

    let edges = db.relationships_of(&mistake.id).unwrap();
    assert_eq!(edges.len(), 2);
}

#[test]
fn test_supersede_validates_endpoint_kinds() {
    let (_temp_file, mut db) = create_test_db();
    let old = db.store_learnings(&[learning("Old advice")]).unwrap().remove(0);
    let pattern = db
        .store_pattern(&NewPattern {
            name: "Some pattern".to_string(),
            code_area: "ui".to_string(),
            ..Default::default()
        })
        .unwrap();

    let err = db.supersede_learning(&old.id, &pattern.id).unwrap_err();
    assert!(matches!(err, CairnError::InvalidRelationship { .. }));

    let err = db.supersede_learning(&old.id, &old.id).unwrap_err();
    assert!(matches!(err, CairnError::Validation { .. }));

    let err = db.supersede_learning(&old.id, "learning:nope").unwrap_err();
    assert!(err.is_not_found());
}

#[test]
fn test_query_learnings_by_keyword() {
    let (_temp_file, mut db) = create_test_db();
    db.store_learnings(&[
        learning("Tree-sitter queries need the language grammar"),
        learning("Use jiff for timestamps"),
    ])
    .unwrap();

    let filter = KnowledgeFilter {
        keywords: vec!["grammar".to_string()],
        ..Default::default()
    };
    let results = db.query_learnings(&filter, 10).unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(
        results[0].content.as_deref(),
        Some("Tree-sitter queries need the language grammar")
    );

    let nothing = KnowledgeFilter {
        code_area: Some("unknown-area".to_string()),
        ..Default::default()
    };
    assert!(db.query_learnings(&nothing, 10).unwrap().is_empty());
}

#[test]
fn test_goal_stack_reactivates_previous_goal() {
    let (_temp_file, mut db) = create_test_db();
    let outer = db.push_goal("Outer", None, Some(1)).unwrap();
    let inner = db.push_goal("Inner", Some("Detour"), None).unwrap();

    let outer_now = db.get_goal(outer.id).unwrap().unwrap();
    assert_eq!(outer_now.status, GoalStatus::Paused);
    assert_eq!(db.focused_goal().unwrap().unwrap().id, inner.id);

    let popped = db.pop_stack(false).unwrap().unwrap();
    assert_eq!(popped.kind, StackItemKind::Goal);
    assert_eq!(popped.item_id, inner.id);
    assert_eq!(
        db.get_goal(inner.id).unwrap().unwrap().status,
        GoalStatus::Completed
    );
    assert_eq!(
        db.get_goal(outer.id).unwrap().unwrap().status,
        GoalStatus::Active
    );

    let popped = db.pop_stack(true).unwrap().unwrap();
    assert_eq!(popped.item_id, outer.id);
    assert_eq!(
        db.get_goal(outer.id).unwrap().unwrap().status,
        GoalStatus::Abandoned
    );

    assert!(db.pop_stack(false).unwrap().is_none());
    assert_eq!(db.peek_stack().unwrap().depth, 0);
}

#[test]
fn test_plan_steps_and_status() {
    let (_temp_file, mut db) = create_test_db();
    let goal = db.push_goal("Index faster", None, None).unwrap();
    let plan = db
        .push_plan(
            Some(goal.id),
            "Incremental indexing",
            &[NewStep::new("Hash files"), NewStep::new("Skip unchanged")],
        )
        .unwrap();
    assert_eq!(plan.goal_id, goal.id);
    assert_eq!(db.plan_for_goal(goal.id).unwrap().unwrap().id, plan.id);

    // A goal has at most one plan.
    assert!(db.push_plan(Some(goal.id), "Second plan", &[]).is_err());

    let step = db
        .set_step_status(plan.steps[1].id, cairn_core::StepStatus::InProgress)
        .unwrap();
    assert_eq!(step.status, cairn_core::StepStatus::InProgress);

    assert!(matches!(
        db.set_step_status(9999, cairn_core::StepStatus::Completed),
        Err(CairnError::StepNotFound { id: 9999 })
    ));

    let reloaded = db.get_plan(plan.id).unwrap().unwrap();
    let titles: Vec<&str> = reloaded.steps.iter().map(|s| s.title.as_str()).collect();
    assert_eq!(titles, vec!["Hash files", "Skip unchanged"]);
}
