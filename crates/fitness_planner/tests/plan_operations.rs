use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use fitness_planner::generator::WeeklyPlanGenerator;
use fitness_planner::store::MemoryStore;
use fitness_planner::templates::{BuiltinTemplates, INDY_HALF_EVENT_ID, TRIATHLON_EVENT_ID};
use fitness_planner::{
    FitnessEvent, FitnessManager, FixedClock, ManagerConfig, Outcome, PlanGenerator, PlannerError,
    SkipReason, TemplateProvider, TrainingWeek, WeekId, WeekRef, WorkoutId,
};
use serde_json::{Map, Value, json};

const TODAY_MILLIS: i64 = 1_767_571_200_000;

fn obj(v: Value) -> Map<String, Value> {
    v.as_object().cloned().unwrap_or_default()
}

fn manager_with(store: Arc<MemoryStore>, config: ManagerConfig) -> FitnessManager {
    FitnessManager::new(
        config,
        store,
        Arc::new(WeeklyPlanGenerator),
        Arc::new(BuiltinTemplates::builtin()),
    )
    .with_clock(Arc::new(FixedClock::at_date("2026-01-05").unwrap()))
}

fn manager() -> (FitnessManager, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    (manager_with(store.clone(), ManagerConfig::default()), store)
}

fn race(id: &str, date: &str) -> FitnessEvent {
    FitnessEvent {
        id: id.into(),
        name: "Spring 10K".into(),
        emoji: String::new(),
        kind: "run".into(),
        date: date.into(),
        location: String::new(),
        training_weeks: 4,
        participants: vec![],
        url: String::new(),
        description: String::new(),
        color: String::new(),
    }
}

#[tokio::test]
async fn first_workout_starts_collection_on_template_week() {
    let (m, store) = manager();
    let outcome = m
        .add_workout(
            TRIATHLON_EVENT_ID,
            &WeekRef::parse("week-1").unwrap(),
            "swim",
            obj(json!({"distance": 1000})),
        )
        .await
        .unwrap();

    assert_eq!(
        outcome,
        Outcome::Added {
            matched: 1,
            workout_id: WorkoutId::Int(TODAY_MILLIS)
        }
    );
    let plan = m.plan(TRIATHLON_EVENT_ID).await.unwrap();
    assert_eq!(plan.len(), 16);
    let swims = plan[0].workouts("swim").unwrap();
    assert_eq!(swims.len(), 1);
    assert_eq!(swims[0].id, WorkoutId::Int(TODAY_MILLIS));
    assert_eq!(swims[0].attributes["distance"], json!(1000));
    assert_eq!(plan[0].fields["phase"], json!("base"));
    assert!(plan[0].fields["targets"]["swim"].is_object());
    assert!(plan[1].fields.get("swim").is_none());

    let saves = store.saves().await;
    assert_eq!(saves.len(), 1);
    assert_eq!(saves[0].events, None);
    assert_eq!(saves[0].plans[TRIATHLON_EVENT_ID][0], plan[0]);
}

#[tokio::test]
async fn legacy_week_takes_supplied_id() {
    let (m, _) = manager();
    let legacy = TrainingWeek {
        id: None,
        week_number: Some(3),
        fields: obj(json!({"phase": "base", "notes": "old"})),
    };
    let renamed = TrainingWeek::new("legacy-3", 3);
    m.set_plan("club-10k", vec![TrainingWeek::new("week-1", 1), legacy, renamed])
        .await
        .unwrap();

    let outcome = m
        .update_training_week("club-10k", &WeekRef::number(3), obj(json!({"notes": "hills"})))
        .await
        .unwrap();
    assert_eq!(outcome, Outcome::Applied { matched: 2 });

    let plan = m.plan("club-10k").await.unwrap();
    assert_eq!(plan[0].id, Some("week-1".into()));
    for week in &plan[1..] {
        assert_eq!(week.id, Some("week-3".into()));
        assert_eq!(week.fields["notes"], json!("hills"));
    }
    assert_eq!(plan[1].fields["phase"], json!("base"));
}

#[tokio::test]
async fn week_number_is_read_from_any_week_marker() {
    for raw in ["week-03", "x-week-3", "week-3b"] {
        let (m, _) = manager();
        let legacy = TrainingWeek {
            id: Some("legacy".into()),
            week_number: Some(3),
            fields: Map::new(),
        };
        m.set_plan("club-10k", vec![TrainingWeek::new("week-1", 1), legacy])
            .await
            .unwrap();
        let outcome = m
            .update_training_week(
                "club-10k",
                &WeekRef::parse(raw).unwrap(),
                obj(json!({"notes": "x"})),
            )
            .await
            .unwrap();
        assert_eq!(outcome, Outcome::Applied { matched: 1 }, "{raw}");

        let plan = m.plan("club-10k").await.unwrap();
        assert_eq!(plan[1].id, Some(raw.into()));
        assert_eq!(plan[1].fields["notes"], json!("x"));
        assert!(plan[0].fields.get("notes").is_none());
    }
}

#[tokio::test]
async fn ids_without_week_number_match_exactly() {
    let (m, _) = manager();
    let numeric = TrainingWeek {
        id: Some(WeekId::Int(7)),
        week_number: None,
        fields: Map::new(),
    };
    m.set_plan("club-10k", vec![TrainingWeek::new("taper", 1), numeric])
        .await
        .unwrap();
    let outcome = m
        .update_training_week("club-10k", &WeekRef::parse("7").unwrap(), obj(json!({"notes": "x"})))
        .await
        .unwrap();
    assert_eq!(outcome, Outcome::Applied { matched: 0 });

    let outcome = m
        .update_training_week("club-10k", &WeekRef::parse("taper").unwrap(), obj(json!({"notes": "y"})))
        .await
        .unwrap();
    assert_eq!(outcome, Outcome::Applied { matched: 1 });
    let plan = m.plan("club-10k").await.unwrap();
    assert_eq!(plan[1].id, Some(WeekId::Int(7)));
    assert_eq!(plan[0].fields["notes"], json!("y"));
}

#[tokio::test]
async fn legacy_workouts_without_ids_are_carried_along() {
    let (m, store) = manager();
    let week = TrainingWeek::new("week-1", 1)
        .with_field("run", json!([{"distance": 5}, {"id": true, "distance": 6}]));
    m.set_plan("club-10k", vec![week]).await.unwrap();
    let w1 = WeekRef::number(1);

    let added = m
        .add_workout("club-10k", &w1, "run", obj(json!({"distance": 8})))
        .await
        .unwrap();
    let Outcome::Added { workout_id, .. } = added else {
        panic!("expected added, got {added:?}");
    };
    let outcome = m
        .update_workout("club-10k", &w1, "run", &workout_id, obj(json!({"completed": true})))
        .await
        .unwrap();
    assert_eq!(outcome, Outcome::Applied { matched: 1 });

    let runs = m.plan("club-10k").await.unwrap()[0].fields["run"].clone();
    assert_eq!(
        runs,
        json!([
            {"distance": 5},
            {"id": true, "distance": 6},
            {"id": TODAY_MILLIS, "distance": 8, "completed": true}
        ])
    );

    m.delete_workout("club-10k", &w1, "run", &workout_id)
        .await
        .unwrap();
    let runs = m.plan("club-10k").await.unwrap()[0].fields["run"].clone();
    assert_eq!(runs, json!([{"distance": 5}, {"id": true, "distance": 6}]));
    assert_eq!(store.save_count().await, 4);
}

#[tokio::test]
async fn update_workout_leaves_missing_collection_absent() {
    let (m, _) = manager();
    let outcome = m
        .update_workout(
            TRIATHLON_EVENT_ID,
            &WeekRef::number(2),
            "swim",
            &WorkoutId::Int(1),
            obj(json!({"completed": true})),
        )
        .await
        .unwrap();
    assert_eq!(outcome, Outcome::Applied { matched: 1 });
    let plan = m.plan(TRIATHLON_EVENT_ID).await.unwrap();
    assert!(plan[1].fields.get("swim").is_none());
    assert_eq!(plan[1].id, Some("week-2".into()));
}

#[tokio::test]
async fn add_then_delete_restores_collection() {
    let (m, store) = manager();
    let week = WeekRef::number(2);
    let before = m
        .add_workout(INDY_HALF_EVENT_ID, &week, "run", obj(json!({"type": "fartlek"})))
        .await
        .unwrap();
    let Outcome::Added { workout_id, .. } = before else {
        panic!("expected added, got {before:?}");
    };
    let after_add = m.plan(INDY_HALF_EVENT_ID).await.unwrap()[1]
        .workouts("run")
        .unwrap();
    assert_eq!(after_add.len(), 4);

    let outcome = m
        .delete_workout(INDY_HALF_EVENT_ID, &week, "run", &workout_id)
        .await
        .unwrap();
    assert_eq!(outcome, Outcome::Applied { matched: 1 });

    let runs = m.plan(INDY_HALF_EVENT_ID).await.unwrap()[1]
        .workouts("run")
        .unwrap();
    let template_runs = BuiltinTemplates::builtin()
        .template(INDY_HALF_EVENT_ID)
        .unwrap()[1]
        .workouts("run")
        .unwrap();
    assert_eq!(runs, template_runs);
    assert_eq!(store.save_count().await, 2);
}

#[tokio::test]
async fn add_workout_creates_missing_collection() {
    let (m, _) = manager();
    m.add_workout(TRIATHLON_EVENT_ID, &WeekRef::number(4), "yoga", Map::new())
        .await
        .unwrap();
    let plan = m.plan(TRIATHLON_EVENT_ID).await.unwrap();
    assert_eq!(plan[3].workouts("yoga").unwrap().len(), 1);
    assert!(plan[2].fields.get("yoga").is_none());
}

#[tokio::test]
async fn workout_ids_increase_under_a_frozen_clock() {
    let (m, _) = manager();
    let mut ids = Vec::new();
    for _ in 0..3 {
        let outcome = m
            .add_workout(TRIATHLON_EVENT_ID, &WeekRef::number(1), "bike", Map::new())
            .await
            .unwrap();
        if let Outcome::Added { workout_id, .. } = outcome {
            ids.push(workout_id);
        }
    }
    assert_eq!(
        ids,
        vec![
            WorkoutId::Int(TODAY_MILLIS),
            WorkoutId::Int(TODAY_MILLIS + 1),
            WorkoutId::Int(TODAY_MILLIS + 2)
        ]
    );
}

#[tokio::test]
async fn null_updates_are_ignored() {
    let (m, store) = manager();
    let week = WeekRef::number(1);
    m.update_training_week(
        TRIATHLON_EVENT_ID,
        &week,
        obj(json!({"notes": null, "focus": "open water"})),
    )
    .await
    .unwrap();
    let plan = m.plan(TRIATHLON_EVENT_ID).await.unwrap();
    assert_eq!(plan[0].fields["notes"], json!(""));
    assert_eq!(plan[0].fields["focus"], json!("open water"));

    let run_id = WorkoutId::Str("w1-run-1".into());
    m.update_workout(
        INDY_HALF_EVENT_ID,
        &week,
        "run",
        &run_id,
        obj(json!({"completed": true, "distance": null})),
    )
    .await
    .unwrap();
    let run = m.plan(INDY_HALF_EVENT_ID).await.unwrap()[0]
        .workouts("run")
        .unwrap()
        .into_iter()
        .find(|w| w.id == run_id)
        .unwrap();
    assert_eq!(run.attributes["completed"], json!(true));
    assert_eq!(run.attributes["distance"], json!(3.5));

    for save in store.saves().await {
        let text = serde_json::to_string(&save.plans).unwrap();
        assert!(!text.contains("null"));
    }
}

#[tokio::test]
async fn update_workout_matches_only_the_given_id() {
    let (m, _) = manager();
    let outcome = m
        .update_workout(
            INDY_HALF_EVENT_ID,
            &WeekRef::number(1),
            "run",
            &WorkoutId::Str("w1-run-2".into()),
            obj(json!({"completed": true})),
        )
        .await
        .unwrap();
    assert_eq!(outcome, Outcome::Applied { matched: 1 });
    let runs = m.plan(INDY_HALF_EVENT_ID).await.unwrap()[0]
        .workouts("run")
        .unwrap();
    assert_eq!(runs[0].attributes["completed"], json!(false));
    assert_eq!(runs[1].attributes["completed"], json!(true));
    assert_eq!(runs[2].attributes["completed"], json!(false));
}

#[tokio::test]
async fn template_is_never_aliased() {
    let templates = Arc::new(BuiltinTemplates::builtin());
    let store = Arc::new(MemoryStore::new());
    let m = FitnessManager::new(
        ManagerConfig::default(),
        store,
        Arc::new(WeeklyPlanGenerator),
        templates.clone(),
    );
    m.update_training_week(
        INDY_HALF_EVENT_ID,
        &WeekRef::number(1),
        obj(json!({"notes": "changed"})),
    )
    .await
    .unwrap();
    let outcome = m
        .delete_workout(
            INDY_HALF_EVENT_ID,
            &WeekRef::number(1),
            "run",
            &WorkoutId::Str("w1-run-1".into()),
        )
        .await
        .unwrap();
    assert_eq!(outcome, Outcome::Applied { matched: 1 });
    assert_eq!(
        m.plan(INDY_HALF_EVENT_ID).await.unwrap()[0]
            .workouts("run")
            .unwrap()
            .len(),
        2
    );

    let pristine = templates.template(INDY_HALF_EVENT_ID).unwrap();
    assert_eq!(pristine[0].fields["notes"], json!(""));
    assert_eq!(pristine[0].workouts("run").unwrap().len(), 3);
    let plan = m.plan(INDY_HALF_EVENT_ID).await.unwrap();
    assert_eq!(plan[1..], pristine[1..]);
}

#[tokio::test]
async fn generator_builds_plan_for_events_without_template() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counted = calls.clone();
    let generator = move |today: &str, event_date: &str, event_id: &str| {
        counted.fetch_add(1, Ordering::SeqCst);
        WeeklyPlanGenerator.generate(today, event_date, event_id)
    };
    let m = FitnessManager::new(
        ManagerConfig::default(),
        Arc::new(MemoryStore::new()),
        Arc::new(generator),
        Arc::new(BuiltinTemplates::builtin()),
    )
    .with_clock(Arc::new(FixedClock::at_date("2026-01-05").unwrap()));

    m.add_event(race("spring-10k", "2026-02-02")).await.unwrap();
    let outcome = m
        .update_training_week("spring-10k", &WeekRef::number(2), obj(json!({"focus": "hills"})))
        .await
        .unwrap();
    assert_eq!(outcome, Outcome::Applied { matched: 1 });

    let plan = m.plan("spring-10k").await.unwrap();
    assert_eq!(plan.len(), 4);
    assert_eq!(plan[0].fields["startDate"], json!("2026-01-05"));
    assert_eq!(plan[1].fields["focus"], json!("hills"));

    m.add_workout("spring-10k", &WeekRef::number(1), "run", Map::new())
        .await
        .unwrap();
    m.update_training_week(TRIATHLON_EVENT_ID, &WeekRef::number(1), Map::new())
        .await
        .unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn generator_errors_leave_state_untouched() {
    let failing = |_: &str, _: &str, _: &str| -> Result<Vec<TrainingWeek>, PlannerError> {
        Err(PlannerError::Generator("offline".into()))
    };
    let store = Arc::new(MemoryStore::new());
    let m = FitnessManager::new(
        ManagerConfig {
            default_events: vec![race("spring-10k", "2026-02-02")],
        },
        store.clone(),
        Arc::new(failing),
        Arc::new(BuiltinTemplates::empty()),
    );
    let err = m
        .update_training_week("spring-10k", &WeekRef::number(1), Map::new())
        .await
        .unwrap_err();
    assert!(matches!(err, PlannerError::Generator(_)));
    assert!(m.plan("spring-10k").await.is_none());
    assert_eq!(store.save_count().await, 0);
}

#[tokio::test]
async fn skipped_operations_do_not_save() {
    let store = Arc::new(MemoryStore::new());
    let m = manager_with(
        store.clone(),
        ManagerConfig {
            default_events: vec![race("spring-10k", "2026-02-02")],
        },
    );
    let week = WeekRef::number(1);
    let id = WorkoutId::Int(1);

    let cases = vec![
        (
            m.update_training_week("", &week, Map::new()).await.unwrap(),
            SkipReason::MissingId,
        ),
        (
            m.update_training_week("nope", &week, Map::new()).await.unwrap(),
            SkipReason::UnknownEvent,
        ),
        (
            m.add_workout("nope", &week, "run", Map::new()).await.unwrap(),
            SkipReason::UnknownEvent,
        ),
        (
            m.update_workout("spring-10k", &week, "run", &id, Map::new())
                .await
                .unwrap(),
            SkipReason::NoPlan,
        ),
        (
            m.delete_workout(TRIATHLON_EVENT_ID, &week, "swim", &id)
                .await
                .unwrap(),
            SkipReason::NoPlan,
        ),
        (
            m.set_plan("", Vec::new()).await.unwrap(),
            SkipReason::MissingId,
        ),
    ];
    for (outcome, reason) in cases {
        assert_eq!(outcome, Outcome::Skipped { reason });
    }
    assert_eq!(store.save_count().await, 0);
    assert!(m.snapshot().await.plans.is_empty());
}

#[tokio::test]
async fn update_workout_initializes_template_plan() {
    let (m, store) = manager();
    let outcome = m
        .update_workout(
            INDY_HALF_EVENT_ID,
            &WeekRef::number(5),
            "strength",
            &WorkoutId::Str("w5-strength-1".into()),
            obj(json!({"duration": 45})),
        )
        .await
        .unwrap();
    assert_eq!(outcome, Outcome::Applied { matched: 1 });
    let plan = m.plan(INDY_HALF_EVENT_ID).await.unwrap();
    assert_eq!(plan.len(), 12);
    assert_eq!(plan[4].workouts("strength").unwrap()[0].attributes["duration"], json!(45));
    assert_eq!(store.save_count().await, 1);
}
