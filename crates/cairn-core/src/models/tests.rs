#[cfg(test)]
mod model_tests {
    use jiff::Timestamp;

    use crate::{
        error::CairnError,
        models::{
            CodeEntity, CodeEntityKind, EntityKind, Plan, PlanProgress, PlanStep,
            RelationshipType, StepStatus, WorkflowPhase, WorkflowStatus,
        },
    };

    fn ts() -> Timestamp {
        Timestamp::from_second(1640995200).unwrap() // 2022-01-01 00:00:00 UTC
    }

    fn step(id: u64, wave: u32, depends_on: Vec<u64>, status: StepStatus) -> PlanStep {
        PlanStep {
            id,
            plan_id: 1,
            title: format!("Step {id}"),
            description: None,
            wave,
            depends_on,
            status,
            order: id as u32,
            created_at: ts(),
            updated_at: ts(),
        }
    }

    fn plan(steps: Vec<PlanStep>) -> Plan {
        Plan {
            id: 1,
            goal_id: 1,
            title: "Plan".to_string(),
            steps,
            created_at: ts(),
            updated_at: ts(),
        }
    }

    #[test]
    fn test_phase_parsing() {
        assert_eq!("implement".parse::<WorkflowPhase>().unwrap(), WorkflowPhase::Implement);
        assert_eq!(" Review ".parse::<WorkflowPhase>().unwrap(), WorkflowPhase::Review);
        assert_eq!(WorkflowPhase::default(), WorkflowPhase::Research);

        let err = "deploy".parse::<WorkflowPhase>().unwrap_err();
        assert!(matches!(err, CairnError::InvalidEnum { .. }));
        assert!(err.to_string().contains("research"));
    }

    #[test]
    fn test_status_parsing() {
        assert_eq!("failed".parse::<WorkflowStatus>().unwrap(), WorkflowStatus::Failed);
        assert!("done".parse::<WorkflowStatus>().is_err());

        assert_eq!("in_progress".parse::<StepStatus>().unwrap(), StepStatus::InProgress);
        assert_eq!("done".parse::<StepStatus>().unwrap(), StepStatus::Completed);
        assert_eq!(StepStatus::InProgress.as_str(), "in_progress");
    }

    #[test]
    fn test_relationship_allowed_pairs() {
        use EntityKind::*;

        assert!(RelationshipType::About.allows(Learning, CodeArea));
        assert!(RelationshipType::InFile.allows(Learning, File));
        assert!(RelationshipType::InFile.allows(Mistake, File));
        assert!(RelationshipType::LedTo.allows(Pattern, Learning));
        assert!(RelationshipType::LedTo.allows(Mistake, Learning));
        assert!(RelationshipType::AppliesTo.allows(Pattern, CodeArea));
        assert!(RelationshipType::Supersedes.allows(Learning, Learning));

        assert!(!RelationshipType::About.allows(CodeArea, Learning));
        assert!(!RelationshipType::InFile.allows(Pattern, File));
        assert!(!RelationshipType::LedTo.allows(Learning, Learning));

        let err = RelationshipType::AppliesTo.check(Learning, CodeArea).unwrap_err();
        assert!(matches!(err, CairnError::InvalidRelationship { .. }));
    }

    #[test]
    fn test_knowledge_ids_are_deterministic() {
        let a = EntityKind::Learning.id_for("Use the retry helper");
        let b = EntityKind::Learning.id_for("Use the retry helper");
        let c = EntityKind::Learning.id_for("Something else");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), "learning:".len() + 16);

        assert_eq!(EntityKind::CodeArea.id_for(" Api "), "area:api");
        assert_eq!(EntityKind::File.id_for("src/app.ts"), "file:src/app.ts");
        assert_eq!(EntityKind::Pattern.id_for("--Guard clauses!"), "pattern:guard-clauses");
    }

    #[test]
    fn test_code_entity_ids() {
        let entity =
            CodeEntity::new("web", "src/store.ts", "Store.open", CodeEntityKind::Function, 12);
        assert_eq!(entity.id, "web:src/store.ts#function:Store.open");
        assert_eq!(entity.short_name(), "open");
        assert_eq!(
            CodeEntity::file_id("web", "src/store.ts"),
            "web:src/store.ts#file:src/store.ts"
        );
    }

    #[test]
    fn test_progress_waits_for_dependencies_across_waves() {
        let plan = plan(vec![
            step(1, 1, vec![], StepStatus::Completed),
            step(2, 1, vec![], StepStatus::Completed),
            step(3, 1, vec![], StepStatus::Todo),
            step(4, 2, vec![3], StepStatus::Todo),
        ]);

        let progress = PlanProgress::compute(&plan);
        assert_eq!(progress.total, 4);
        assert_eq!(progress.completed, 2);
        assert_eq!(progress.todo, 2);
        assert_eq!(progress.percentage, 50);
        let next: Vec<u64> = progress.next_steps.iter().map(|s| s.id).collect();
        assert_eq!(next, vec![3]);
    }

    #[test]
    fn test_progress_picks_lowest_eligible_wave() {
        // Step 1 is blocked, so wave 1 has nothing eligible.
        let plan = plan(vec![
            step(1, 1, vec![], StepStatus::Blocked),
            step(2, 2, vec![], StepStatus::InProgress),
            step(3, 2, vec![], StepStatus::Todo),
            step(4, 3, vec![], StepStatus::Todo),
        ]);

        let progress = PlanProgress::compute(&plan);
        let next: Vec<u64> = progress.next_steps.iter().map(|s| s.id).collect();
        assert_eq!(next, vec![2, 3]);
        assert_eq!(progress.blocked, 1);
        assert_eq!(progress.percentage, 0);
    }

    #[test]
    fn test_progress_ignores_foreign_dependencies() {
        let plan = plan(vec![step(1, 1, vec![999], StepStatus::Todo)]);
        let progress = PlanProgress::compute(&plan);
        assert_eq!(progress.next_steps.len(), 1);
    }

    #[test]
    fn test_progress_empty_plan() {
        let progress = PlanProgress::compute(&plan(vec![]));
        assert_eq!(progress.total, 0);
        assert_eq!(progress.percentage, 0);
        assert!(progress.next_steps.is_empty());
    }
}
