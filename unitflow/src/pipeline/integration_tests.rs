//! End-to-end tests for the staged pipeline.

#[cfg(test)]
mod tests {
    use crate::catalog::MockUnitCatalog;
    use crate::core::{Phase, PipelineState, UnitId, UnitStatus};
    use crate::errors::{CatalogError, UnitErrorKind};
    use crate::events::PipelineEvent;
    use crate::pipeline::{
        PipelineConfig, RestartOnEarlyInitFailure, SharedPipeline, StagedPipeline,
    };
    use crate::testing::{
        assert_plan, assert_runs_before, assert_unit_completed, assert_unit_failed,
        run_until_settled, FailingUnit, PipelineFixture, RecordingUnit, SteppedUnit,
    };
    use crate::units::{PhaseDeclaration, UnitDescriptor};
    use parking_lot::Mutex;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;
    use std::time::Duration;

    fn recording(fx: &PipelineFixture, id: &str, phases: &[Phase]) {
        fx.catalog
            .insert(Arc::new(RecordingUnit::in_phases(id, phases, Arc::clone(&fx.log))));
    }

    fn declared(fx: &PipelineFixture, id: &str, phase: Phase, declaration: PhaseDeclaration) {
        fx.catalog.insert(Arc::new(RecordingUnit::new(
            UnitDescriptor::new(id).with_phase(phase, declaration),
            Arc::clone(&fx.log),
        )));
    }

    fn ids(names: &[&str]) -> Vec<UnitId> {
        names.iter().map(|n| UnitId::new(*n)).collect()
    }

    #[test]
    fn test_failing_unit_does_not_block_the_phase() {
        let fx = PipelineFixture::new();
        recording(&fx, "u1", &[Phase::Init]);
        fx.catalog.insert(Arc::new(FailingUnit::raising(
            UnitDescriptor::new("u2").with_phase(Phase::Init, PhaseDeclaration::immediate()),
            "texture atlas missing",
        )));
        recording(&fx, "u3", &[Phase::Init]);

        let mut pipeline = fx.pipeline();
        let status = run_until_settled(&mut pipeline, 10);

        assert!(status.is_done);
        assert_eq!(fx.log.for_phase(Phase::Init), ids(&["u1", "u3"]));
        assert_unit_completed(&pipeline, Phase::Init, "u1");
        assert_unit_failed(&pipeline, Phase::Init, "u2");
        assert_unit_completed(&pipeline, Phase::Init, "u3");

        let failures = pipeline.failures();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].unit, UnitId::new("u2"));
        assert_eq!(failures[0].phase, Phase::Init);
        assert_eq!(failures[0].kind, UnitErrorKind::Raised);
        assert!(failures[0].detail.contains("texture atlas missing"));
        assert_eq!(fx.sink.events_of_type("unit.failed").len(), 1);
    }

    #[test]
    fn test_panicking_unit_is_isolated() {
        let fx = PipelineFixture::new().with_unit(FailingUnit::panicking(
            UnitDescriptor::new("crashy").with_phase(Phase::ContentA, PhaseDeclaration::immediate()),
            "index out of range",
        ));
        recording(&fx, "steady", &[Phase::ContentA]);

        let mut pipeline = fx.pipeline();
        assert!(run_until_settled(&mut pipeline, 10).is_done);

        assert_unit_failed(&pipeline, Phase::ContentA, "crashy");
        assert_unit_completed(&pipeline, Phase::ContentA, "steady");
        let record = &pipeline.failures()[0];
        assert_eq!(record.kind, UnitErrorKind::Panicked);
        assert_eq!(record.detail, "index out of range");
    }

    #[test]
    fn test_tick_budget_bounds_steps_per_tick() {
        let fx = PipelineFixture::new();
        let slow = Arc::new(
            SteppedUnit::new("slow", Phase::Init, 10, Arc::clone(&fx.log))
                .with_step_cost(Arc::clone(&fx.clock), Duration::from_millis(5)),
        );
        fx.catalog.insert(slow.clone());

        let mut pipeline = fx.pipeline();
        let budget = Duration::from_millis(15);

        let status = pipeline.tick(budget);
        assert_eq!(status.phase, Some(Phase::Init));
        assert_eq!(slow.steps_taken(), 3);
        assert!((status.phase_progress - 0.3).abs() < 1e-6);

        pipeline.tick(budget);
        assert_eq!(slow.steps_taken(), 6);
        assert_eq!(slow.begins(), 1);

        while !pipeline.tick(budget).is_done {}
        assert_eq!(slow.steps_taken(), 10);
        assert_eq!(slow.begins(), 1);
        assert_unit_completed(&pipeline, Phase::Init, "slow");
    }

    #[test]
    fn test_catalog_change_mid_phase_restarts_from_discovery() {
        let fx = PipelineFixture::new();
        recording(&fx, "gone", &[Phase::Init, Phase::LateInit]);
        let slow = Arc::new(
            SteppedUnit::new("slow", Phase::Init, 5, Arc::clone(&fx.log))
                .with_step_cost(Arc::clone(&fx.clock), Duration::from_millis(5)),
        );
        fx.catalog.insert(slow.clone());

        let mut pipeline = fx.pipeline();
        let budget = Duration::from_millis(5);
        let first = pipeline.tick(budget);
        assert_eq!(first.state, PipelineState::Init);
        assert_eq!(fx.log.count("gone", Phase::Init), 1);
        assert_eq!(slow.steps_taken(), 1);
        let first_pass = first.pass_id.unwrap();

        assert!(fx.catalog.remove(&UnitId::new("gone")));
        let second = pipeline.tick(budget);

        assert_eq!(second.state, PipelineState::Init);
        assert_ne!(second.pass_id, Some(first_pass));
        assert_plan(&pipeline, Phase::Init, &["slow"]);
        assert_eq!(slow.begins(), 2);

        let restarted: Vec<_> = fx.sink.events_of_type("pipeline.restarted");
        assert_eq!(restarted.len(), 1);
        match &restarted[0] {
            PipelineEvent::Restarted { previous_pass, .. } => assert_eq!(*previous_pass, first_pass),
            other => panic!("unexpected event {other:?}"),
        }
        assert_eq!(fx.sink.events_of_type("pipeline.pass_started").len(), 2);

        assert!(run_until_settled(&mut pipeline, 20).is_done);
        assert_eq!(fx.log.count("gone", Phase::LateInit), 0);
        assert_eq!(fx.log.count("slow", Phase::Init), 1);
    }

    #[test]
    fn test_catalog_change_after_done_starts_a_new_pass() {
        let fx = PipelineFixture::new();
        recording(&fx, "base", &[Phase::Init]);
        let mut pipeline = fx.pipeline();
        let done = run_until_settled(&mut pipeline, 10);

        recording(&fx, "addon", &[Phase::Init]);
        let again = run_until_settled(&mut pipeline, 10);

        assert!(again.is_done);
        assert_ne!(again.pass_id, done.pass_id);
        assert_plan(&pipeline, Phase::Init, &["addon", "base"]);
        assert_eq!(fx.log.count("base", Phase::Init), 2);
    }

    #[test]
    fn test_catalog_changes_ignored_when_restarts_disabled() {
        let fx = PipelineFixture::new();
        recording(&fx, "base", &[Phase::Init]);
        let mut pipeline =
            fx.pipeline_with(PipelineConfig::default().with_restart_on_catalog_change(false));
        let done = run_until_settled(&mut pipeline, 10);

        recording(&fx, "addon", &[Phase::Init]);
        let after = pipeline.tick(Duration::from_secs(1));

        assert_eq!(after.pass_id, done.pass_id);
        assert_eq!(fx.log.count("addon", Phase::Init), 0);
    }

    #[test]
    fn test_cycle_makes_phase_unschedulable_and_pipeline_advances() {
        let fx = PipelineFixture::new();
        declared(&fx, "x", Phase::ContentB, PhaseDeclaration::immediate().before("y"));
        declared(&fx, "y", Phase::ContentB, PhaseDeclaration::immediate().before("x"));
        recording(&fx, "bystander", &[Phase::ContentB]);
        recording(&fx, "late", &[Phase::LateInit]);

        let mut pipeline = fx.pipeline();
        assert!(run_until_settled(&mut pipeline, 10).is_done);

        assert!(pipeline.has_cycle(Phase::ContentB));
        assert!(!pipeline.has_cycle(Phase::ContentA));
        let cycle = pipeline.cycle(Phase::ContentB).unwrap();
        assert!(cycle.iter().any(|n| n == "x"));
        assert!(cycle.iter().any(|n| n == "y"));
        assert_eq!(pipeline.plan(Phase::ContentB), None);

        assert!(fx.log.for_phase(Phase::ContentB).is_empty());
        assert_unit_completed(&pipeline, Phase::LateInit, "late");
        assert_eq!(pipeline.reporter().phase_failures().len(), 1);
        assert_eq!(fx.sink.events_of_type("phase.unschedulable").len(), 1);
    }

    #[test]
    fn test_priority_and_constraints_shape_the_plan() {
        let fx = PipelineFixture::new();
        declared(&fx, "A", Phase::Init, PhaseDeclaration::immediate().with_priority(10).before("B"));
        declared(&fx, "B", Phase::Init, PhaseDeclaration::immediate().with_priority(10));
        declared(&fx, "C", Phase::Init, PhaseDeclaration::immediate().with_priority(5));

        let mut pipeline = fx.pipeline();
        run_until_settled(&mut pipeline, 10);

        assert_plan(&pipeline, Phase::Init, &["C", "A", "B"]);
        assert_eq!(fx.log.for_phase(Phase::Init), ids(&["C", "A", "B"]));
    }

    #[test]
    fn test_plans_are_deterministic_across_insertion_orders() {
        let build = |names: &[&str]| {
            let fx = PipelineFixture::new();
            for name in names {
                let declaration = match *name {
                    "skins" => PhaseDeclaration::immediate().after("core"),
                    "corp" => PhaseDeclaration::immediate().with_priority(-1),
                    _ => PhaseDeclaration::immediate(),
                };
                declared(&fx, name, Phase::ContentA, declaration);
            }
            let mut pipeline = fx.pipeline();
            run_until_settled(&mut pipeline, 10);
            let order = pipeline.plan(Phase::ContentA).map(<[UnitId]>::to_vec);
            let digest = fx.sink.events().into_iter().find_map(|e| match e {
                PipelineEvent::PhaseStarted { phase: Phase::ContentA, digest, .. } => Some(digest),
                _ => None,
            });
            (order, digest)
        };

        let forward = build(&["core", "corp", "skins", "blocks"]);
        let backward = build(&["blocks", "skins", "corp", "core"]);

        assert_eq!(forward, backward);
        let order = forward.0.unwrap();
        assert_eq!(order[0], UnitId::new("corp"));
        assert_runs_before(&order, "core", "skins");
    }

    #[test]
    fn test_restart_policy_can_abort_after_early_init() {
        let fx = PipelineFixture::new().with_unit(FailingUnit::raising(
            UnitDescriptor::new("bootstrap").with_phase(Phase::EarlyInit, PhaseDeclaration::immediate()),
            "config written, restart needed",
        ));
        recording(&fx, "main", &[Phase::Init]);

        let mut pipeline = fx.pipeline().with_restart_policy(RestartOnEarlyInitFailure);
        let status = run_until_settled(&mut pipeline, 10);

        assert!(status.is_aborted);
        assert!(pipeline.abort_reason().unwrap().contains("bootstrap"));
        assert_eq!(fx.log.count("main", Phase::Init), 0);
        assert_eq!(fx.sink.events_of_type("pipeline.aborted").len(), 1);

        let later = pipeline.tick(Duration::from_secs(1));
        assert_eq!(later.state, PipelineState::Aborted);
    }

    #[test]
    fn test_default_policy_continues_past_early_init_failures() {
        let fx = PipelineFixture::new().with_unit(FailingUnit::raising(
            UnitDescriptor::new("bootstrap").with_phase(Phase::EarlyInit, PhaseDeclaration::immediate()),
            "optional step failed",
        ));
        recording(&fx, "main", &[Phase::Init]);

        let mut pipeline = fx.pipeline();
        assert!(run_until_settled(&mut pipeline, 10).is_done);
        assert_eq!(fx.log.count("main", Phase::Init), 1);
    }

    #[test]
    fn test_catalog_error_aborts() {
        let mut catalog = MockUnitCatalog::new();
        catalog.expect_revision().returning(|| 1);
        catalog
            .expect_current_units()
            .returning(|| Err(CatalogError::new("package index unreadable")));

        let mut pipeline = StagedPipeline::new(Arc::new(catalog), PipelineConfig::default());
        let status = pipeline.tick(Duration::from_secs(1));

        assert!(status.is_aborted);
        assert!(pipeline.abort_reason().unwrap().contains("package index unreadable"));
        assert_eq!(status.pass_id, None);
    }

    #[test]
    fn test_failure_callbacks_see_every_unit_failure() {
        let fx = PipelineFixture::new()
            .with_unit(FailingUnit::raising(
                UnitDescriptor::new("a").with_phase(Phase::Init, PhaseDeclaration::immediate()),
                "first",
            ))
            .with_unit(FailingUnit::raising(
                UnitDescriptor::new("b").with_phase(Phase::LateInit, PhaseDeclaration::immediate()),
                "second",
            ));

        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut pipeline = fx.pipeline();
        let sink = Arc::clone(&seen);
        pipeline.on_unit_failure(move |record| {
            sink.lock().push((record.unit.to_string(), record.phase));
        });
        run_until_settled(&mut pipeline, 10);

        assert_eq!(
            *seen.lock(),
            vec![("a".to_string(), Phase::Init), ("b".to_string(), Phase::LateInit)]
        );
        match fx.sink.events_of_type("pipeline.completed").first() {
            Some(PipelineEvent::Completed { failures, .. }) => assert_eq!(*failures, 2),
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn test_events_follow_the_load_sequence() {
        let fx = PipelineFixture::new();
        recording(&fx, "only", &[Phase::ContentC]);
        let mut pipeline = fx.pipeline();
        run_until_settled(&mut pipeline, 10);

        let started: Vec<Phase> = fx
            .sink
            .events_of_type("phase.started")
            .into_iter()
            .filter_map(|e| match e {
                PipelineEvent::PhaseStarted { phase, .. } => Some(phase),
                _ => None,
            })
            .collect();
        assert_eq!(started, Phase::LOAD_SEQUENCE.to_vec());

        let events = fx.sink.events();
        assert_eq!(events.first().map(PipelineEvent::event_type), Some("pipeline.pass_started"));
        assert_eq!(events.last().map(PipelineEvent::event_type), Some("pipeline.completed"));
        assert_eq!(fx.sink.events_of_type("unit.completed").len(), 1);
    }

    #[test]
    fn test_recurring_phases_reuse_their_plan() {
        let fx = PipelineFixture::new();
        recording(&fx, "a", &[Phase::Update]);
        declared(&fx, "b", Phase::Update, PhaseDeclaration::immediate().before("a"));
        fx.catalog.insert(Arc::new(FailingUnit::raising(
            UnitDescriptor::new("physics").with_phase(Phase::FixedUpdate, PhaseDeclaration::immediate()),
            "solver diverged",
        )));

        let mut pipeline = fx.pipeline();
        run_until_settled(&mut pipeline, 10);

        pipeline.run_recurring(Phase::Update).unwrap();
        let report = pipeline.run_recurring(Phase::Update).unwrap();
        assert_eq!(report.completed().len(), 2);
        assert_eq!(fx.log.for_phase(Phase::Update), ids(&["b", "a", "b", "a"]));

        let fixed = pipeline.run_recurring(Phase::FixedUpdate).unwrap();
        assert_eq!(fixed.status(&UnitId::new("physics")), Some(UnitStatus::Failed));
        assert!(pipeline.reporter().has_failed(&UnitId::new("physics"), Phase::FixedUpdate));
    }

    #[test]
    fn test_recurring_body_exceeding_step_limit_fails() {
        let fx = PipelineFixture::new();
        fx.catalog.insert(Arc::new(SteppedUnit::new(
            "sim",
            Phase::Update,
            5,
            Arc::clone(&fx.log),
        )));
        let mut pipeline =
            fx.pipeline_with(PipelineConfig::default().with_recurring_step_limit(3));
        run_until_settled(&mut pipeline, 10);

        let report = pipeline.run_recurring(Phase::Update).unwrap();
        assert_eq!(report.failed(), vec![&UnitId::new("sim")]);
        assert!(pipeline.failures()[0].detail.contains("3 steps"));
    }

    #[tokio::test]
    async fn test_drive_completes_a_stepped_load() {
        let fx = PipelineFixture::new();
        fx.catalog.insert(Arc::new(SteppedUnit::new(
            "assets",
            Phase::ContentA,
            4,
            Arc::clone(&fx.log),
        )));
        recording(&fx, "late", &[Phase::LateInit]);

        let shared = SharedPipeline::new(fx.pipeline_with(
            PipelineConfig::default().with_tick_budget_ms(0),
        ));
        let status = shared.drive(Duration::from_millis(1)).await;

        assert!(status.is_done);
        assert_eq!(status.overall_progress, 1.0);
        assert_eq!(fx.log.count("assets", Phase::ContentA), 1);
        assert_eq!(fx.log.count("late", Phase::LateInit), 1);
    }
}
