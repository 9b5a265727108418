//! The fitness state manager.
//!
//! Holds the events collection and the plan map as `Arc` snapshots. Every
//! mutation computes new collections under the write lock, swaps them in,
//! releases the lock and only then hands the new snapshot to the
//! [`Persister`]. A failed save is reported to the caller; the in-memory
//! state keeps the new value.

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

use chrono::NaiveDate;
use schemars::JsonSchema;
use serde::Serialize;
use serde_json::{Map, Value};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::clock::{Clock, SystemClock};
use crate::observability::{Health, record_outcome, record_save_failure};
use crate::overview::EventOverview;
use crate::utils::normalize_event_date;
use crate::{
    FitnessEvent, Persister, PlanGenerator, PlanMap, PlannerError, TemplateProvider,
    TrainingWeek, ViewMode, WeekId, WeekRef, Workout, WorkoutId,
};

/// Construction-time settings for a [`FitnessManager`].
#[derive(Clone, Debug, PartialEq)]
pub struct ManagerConfig {
    /// Events a fresh planner starts with.
    pub default_events: Vec<FitnessEvent>,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            default_events: vec![FitnessEvent::default_triathlon()],
        }
    }
}

impl ManagerConfig {
    /// Read seed events from a JSON array file.
    pub async fn from_seed_file(path: &Path) -> Result<Self, PlannerError> {
        let bytes = tokio::fs::read(path).await?;
        let default_events: Vec<FitnessEvent> = serde_json::from_slice(&bytes)?;
        Ok(Self { default_events })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// Event id or week id was empty.
    MissingId,
    /// No event with that id and no template to fall back on.
    UnknownEvent,
    /// The operation needs an existing plan and there is none.
    NoPlan,
}

/// What an operation did.
///
/// `Skipped` means nothing changed and nothing was persisted. `matched`
/// counts the events or weeks an applied operation touched; zero is a valid
/// answer.
#[derive(Clone, Debug, PartialEq, Serialize, JsonSchema)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    Applied { matched: usize },
    Added { matched: usize, workout_id: WorkoutId },
    Skipped { reason: SkipReason },
}

impl Outcome {
    pub fn label(&self) -> &'static str {
        match self {
            Outcome::Applied { .. } => "applied",
            Outcome::Added { .. } => "added",
            Outcome::Skipped { .. } => "skipped",
        }
    }

    pub fn matched(&self) -> usize {
        match self {
            Outcome::Applied { matched } | Outcome::Added { matched, .. } => *matched,
            Outcome::Skipped { .. } => 0,
        }
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, Outcome::Skipped { .. })
    }
}

impl From<SkipReason> for Outcome {
    fn from(reason: SkipReason) -> Self {
        Outcome::Skipped { reason }
    }
}

/// A consistent view of events and plans at one point in time.
#[derive(Clone, Debug, Default)]
pub struct FitnessSnapshot {
    pub events: Arc<Vec<FitnessEvent>>,
    pub plans: Arc<PlanMap>,
}

#[derive(Debug)]
struct State {
    events: Arc<Vec<FitnessEvent>>,
    plans: Arc<PlanMap>,
    selected: Option<FitnessEvent>,
    view_mode: ViewMode,
}

/// Hands out strictly increasing, timestamp-derived workout ids.
#[derive(Debug, Default)]
struct WorkoutIdGenerator {
    last: AtomicI64,
}

impl WorkoutIdGenerator {
    fn next(&self, now_millis: i64) -> i64 {
        let mut prev = self.last.load(Ordering::SeqCst);
        loop {
            let candidate = now_millis.max(prev + 1);
            match self
                .last
                .compare_exchange(prev, candidate, Ordering::SeqCst, Ordering::SeqCst)
            {
                Ok(_) => return candidate,
                Err(actual) => prev = actual,
            }
        }
    }
}

/// How far an operation may go to get a plan that does not exist yet.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum PlanInit {
    /// Template first, then the generator.
    TemplateOrGenerate,
    TemplateOnly,
    ExistingOnly,
}

enum PlanSource {
    Ready(Vec<TrainingWeek>),
    Skip(SkipReason),
}

enum Edited {
    Done { plans: Arc<PlanMap>, matched: usize },
    Skipped(SkipReason),
}

/// Drop `null` values: they stand for "absent" and must never reach the store.
pub fn strip_absent(updates: Map<String, Value>) -> Map<String, Value> {
    updates.into_iter().filter(|(_, v)| !v.is_null()).collect()
}

pub struct FitnessManager {
    state: RwLock<State>,
    persister: Arc<dyn Persister>,
    generator: Arc<dyn PlanGenerator>,
    templates: Arc<dyn TemplateProvider>,
    clock: Arc<dyn Clock>,
    workout_ids: WorkoutIdGenerator,
}

impl FitnessManager {
    pub fn new(
        config: ManagerConfig,
        persister: Arc<dyn Persister>,
        generator: Arc<dyn PlanGenerator>,
        templates: Arc<dyn TemplateProvider>,
    ) -> Self {
        Self {
            state: RwLock::new(State {
                events: Arc::new(config.default_events),
                plans: Arc::new(PlanMap::new()),
                selected: None,
                view_mode: ViewMode::default(),
            }),
            persister,
            generator,
            templates,
            clock: Arc::new(SystemClock),
            workout_ids: WorkoutIdGenerator::default(),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Replace in-memory state with the persisted document, if there is one.
    /// Events are kept as seeded when the document has none.
    pub async fn restore(&self) -> Result<bool, PlannerError> {
        let Some(doc) = self.persister.load().await? else {
            info!("no stored document, keeping seed state");
            return Ok(false);
        };
        let mut state = self.state.write().await;
        if let Some(events) = doc.events {
            state.events = Arc::new(events);
        }
        state.plans = Arc::new(doc.plans);
        info!(
            events = state.events.len(),
            plans = state.plans.len(),
            "restored stored document"
        );
        Ok(true)
    }

    // === Reads ===

    pub async fn snapshot(&self) -> FitnessSnapshot {
        let state = self.state.read().await;
        FitnessSnapshot {
            events: state.events.clone(),
            plans: state.plans.clone(),
        }
    }

    pub async fn events(&self) -> Arc<Vec<FitnessEvent>> {
        self.state.read().await.events.clone()
    }

    pub async fn event(&self, event_id: &str) -> Option<FitnessEvent> {
        let state = self.state.read().await;
        state.events.iter().find(|e| e.id == event_id).cloned()
    }

    pub async fn plan(&self, event_id: &str) -> Option<Vec<TrainingWeek>> {
        self.state.read().await.plans.get(event_id).cloned()
    }

    pub async fn selected_event(&self) -> Option<FitnessEvent> {
        self.state.read().await.selected.clone()
    }

    pub async fn view_mode(&self) -> ViewMode {
        self.state.read().await.view_mode
    }

    /// One summary per event, in event order.
    pub async fn overview(&self) -> Vec<EventOverview> {
        let today = self.clock.today();
        let state = self.state.read().await;
        state
            .events
            .iter()
            .map(|e| EventOverview::build(e, state.plans.get(&e.id).map(Vec::as_slice), today))
            .collect()
    }

    pub fn today(&self) -> NaiveDate {
        self.clock.today()
    }

    pub fn now_millis(&self) -> i64 {
        self.clock.now_millis()
    }

    pub async fn health(&self) -> Health {
        let state = self.state.read().await;
        Health::readiness(state.events.len(), state.plans.len())
    }

    // === Selection and view ===

    /// Select an event by id, or clear the selection with `None`. Not persisted.
    pub async fn select_event(&self, event_id: Option<&str>) -> Outcome {
        let mut state = self.state.write().await;
        let outcome = match event_id {
            None => {
                state.selected = None;
                Outcome::Applied { matched: 0 }
            }
            Some(id) => match state.events.iter().find(|e| e.id == id).cloned() {
                Some(event) => {
                    state.selected = Some(event);
                    Outcome::Applied { matched: 1 }
                }
                None => SkipReason::UnknownEvent.into(),
            },
        };
        record_outcome("select_event", &outcome);
        outcome
    }

    pub async fn set_view_mode(&self, mode: ViewMode) {
        self.state.write().await.view_mode = mode;
    }

    // === Events ===

    /// Append a new event. The date is normalized to `YYYY-MM-DD`.
    pub async fn add_event(&self, mut event: FitnessEvent) -> Result<Outcome, PlannerError> {
        if event.id.is_empty() {
            return Ok(self.skip("add_event", "", SkipReason::MissingId));
        }
        event.date = normalize_event_date(&event.date)
            .ok_or_else(|| PlannerError::InvalidDate(event.date.clone()))?;

        let (events, plans) = {
            let mut state = self.state.write().await;
            if state.events.iter().any(|e| e.id == event.id) {
                return Err(PlannerError::DuplicateEvent(event.id));
            }
            let mut events = state.events.as_ref().clone();
            events.push(event.clone());
            state.events = Arc::new(events);
            (state.events.clone(), state.plans.clone())
        };
        debug!(event_id = %event.id, "add_event");
        self.persist("add_event", Some(events), plans, Outcome::Applied { matched: 1 })
            .await
    }

    /// Replace the event with the same id. Persists even when nothing matched.
    pub async fn update_event(&self, updated: FitnessEvent) -> Result<Outcome, PlannerError> {
        let (events, plans, matched) = {
            let mut state = self.state.write().await;
            let mut matched = 0;
            let events: Vec<FitnessEvent> = state
                .events
                .iter()
                .map(|e| {
                    if e.id == updated.id {
                        matched += 1;
                        updated.clone()
                    } else {
                        e.clone()
                    }
                })
                .collect();
            state.events = Arc::new(events);
            if state.selected.as_ref().is_some_and(|s| s.id == updated.id) {
                state.selected = Some(updated.clone());
            }
            (state.events.clone(), state.plans.clone(), matched)
        };
        debug!(event_id = %updated.id, matched, "update_event");
        self.persist("update_event", Some(events), plans, Outcome::Applied { matched })
            .await
    }

    /// Remove an event together with its plan. Persists even when nothing matched.
    pub async fn delete_event(&self, event_id: &str) -> Result<Outcome, PlannerError> {
        let (events, plans, matched) = {
            let mut state = self.state.write().await;
            let before = state.events.len();
            let events: Vec<FitnessEvent> = state
                .events
                .iter()
                .filter(|e| e.id != event_id)
                .cloned()
                .collect();
            let matched = before - events.len();
            state.events = Arc::new(events);
            if state.plans.contains_key(event_id) {
                let mut plans = state.plans.as_ref().clone();
                plans.remove(event_id);
                state.plans = Arc::new(plans);
            }
            if state.selected.as_ref().is_some_and(|s| s.id == event_id) {
                state.selected = None;
            }
            (state.events.clone(), state.plans.clone(), matched)
        };
        debug!(event_id, matched, "delete_event");
        self.persist("delete_event", Some(events), plans, Outcome::Applied { matched })
            .await
    }

    // === Training plans ===

    /// Replace a whole plan.
    pub async fn set_plan(
        &self,
        event_id: &str,
        weeks: Vec<TrainingWeek>,
    ) -> Result<Outcome, PlannerError> {
        if event_id.is_empty() {
            return Ok(self.skip("set_plan", event_id, SkipReason::MissingId));
        }
        let matched = weeks.len();
        let plans = {
            let mut state = self.state.write().await;
            let mut plans = state.plans.as_ref().clone();
            plans.insert(event_id.to_string(), weeks);
            state.plans = Arc::new(plans);
            state.plans.clone()
        };
        self.persist("set_plan", None, plans, Outcome::Applied { matched })
            .await
    }

    /// Merge `updates` onto every week matching `week`.
    ///
    /// Creates the plan on first use from a template, or from the generator
    /// when the event exists but has no template.
    pub async fn update_training_week(
        &self,
        event_id: &str,
        week: &WeekRef,
        updates: Map<String, Value>,
    ) -> Result<Outcome, PlannerError> {
        const OP: &str = "update_training_week";
        let updates = strip_absent(updates);
        let edited = self
            .edit_weeks(event_id, week, PlanInit::TemplateOrGenerate, |w| {
                w.merged(&updates)
            })
            .await?;
        match edited {
            Edited::Skipped(reason) => Ok(self.skip(OP, event_id, reason)),
            Edited::Done { plans, matched } => {
                debug!(event_id, %week, matched, "update_training_week");
                self.persist(OP, None, plans, Outcome::Applied { matched })
                    .await
            }
        }
    }

    /// Merge `updates` onto one workout in every week matching `week`.
    ///
    /// Only template plans are created on demand; other events need an
    /// existing plan.
    pub async fn update_workout(
        &self,
        event_id: &str,
        week: &WeekRef,
        workout_type: &str,
        workout_id: &WorkoutId,
        updates: Map<String, Value>,
    ) -> Result<Outcome, PlannerError> {
        const OP: &str = "update_workout";
        let updates = strip_absent(updates);
        let edited = self
            .edit_weeks(event_id, week, PlanInit::TemplateOnly, |w| {
                let mut next = w.clone();
                let Some(mut entries) = w.entries(workout_type)? else {
                    return Ok(next);
                };
                for entry in &mut entries {
                    if !workout_id.matches_value(entry.get("id")) {
                        continue;
                    }
                    if let Value::Object(fields) = entry {
                        fields.extend(updates.iter().map(|(k, v)| (k.clone(), v.clone())));
                    }
                }
                next.set_entries(workout_type, entries);
                Ok(next)
            })
            .await?;
        match edited {
            Edited::Skipped(reason) => Ok(self.skip(OP, event_id, reason)),
            Edited::Done { plans, matched } => {
                debug!(event_id, %week, workout_type, %workout_id, matched, "update_workout");
                self.persist(OP, None, plans, Outcome::Applied { matched })
                    .await
            }
        }
    }

    /// Append a workout built from `workout_data` with a fresh id to every
    /// week matching `week`, creating the collection if needed.
    pub async fn add_workout(
        &self,
        event_id: &str,
        week: &WeekRef,
        workout_type: &str,
        workout_data: Map<String, Value>,
    ) -> Result<Outcome, PlannerError> {
        const OP: &str = "add_workout";
        let workout_id = WorkoutId::Int(self.workout_ids.next(self.clock.now_millis()));
        let workout = serde_json::to_value(Workout::from_data(workout_id.clone(), &workout_data))?;
        let edited = self
            .edit_weeks(event_id, week, PlanInit::TemplateOrGenerate, |w| {
                let mut entries = w.entries(workout_type)?.unwrap_or_default();
                entries.push(workout.clone());
                let mut next = w.clone();
                next.set_entries(workout_type, entries);
                Ok(next)
            })
            .await?;
        match edited {
            Edited::Skipped(reason) => Ok(self.skip(OP, event_id, reason)),
            Edited::Done { plans, matched } => {
                debug!(event_id, %week, workout_type, %workout_id, matched, "add_workout");
                self.persist(OP, None, plans, Outcome::Added { matched, workout_id })
                    .await
            }
        }
    }

    /// Remove a workout from every week matching `week`. Needs an existing plan.
    pub async fn delete_workout(
        &self,
        event_id: &str,
        week: &WeekRef,
        workout_type: &str,
        workout_id: &WorkoutId,
    ) -> Result<Outcome, PlannerError> {
        const OP: &str = "delete_workout";
        let edited = self
            .edit_weeks(event_id, week, PlanInit::ExistingOnly, |w| {
                let mut entries = w.entries(workout_type)?.unwrap_or_default();
                entries.retain(|x| !workout_id.matches_value(x.get("id")));
                let mut next = w.clone();
                next.set_entries(workout_type, entries);
                Ok(next)
            })
            .await?;
        match edited {
            Edited::Skipped(reason) => Ok(self.skip(OP, event_id, reason)),
            Edited::Done { plans, matched } => {
                debug!(event_id, %week, workout_type, %workout_id, matched, "delete_workout");
                self.persist(OP, None, plans, Outcome::Applied { matched })
                    .await
            }
        }
    }

    // === Internals ===

    fn resolve_plan(
        &self,
        state: &State,
        event_id: &str,
        init: PlanInit,
    ) -> Result<PlanSource, PlannerError> {
        if let Some(weeks) = state.plans.get(event_id) {
            return Ok(PlanSource::Ready(weeks.clone()));
        }
        if init == PlanInit::ExistingOnly {
            return Ok(PlanSource::Skip(SkipReason::NoPlan));
        }
        if let Some(weeks) = self.templates.template(event_id) {
            debug!(event_id, weeks = weeks.len(), "plan initialized from template");
            return Ok(PlanSource::Ready(weeks));
        }
        if init == PlanInit::TemplateOnly {
            return Ok(PlanSource::Skip(SkipReason::NoPlan));
        }
        let Some(event) = state.events.iter().find(|e| e.id == event_id) else {
            return Ok(PlanSource::Skip(SkipReason::UnknownEvent));
        };
        let today = self.clock.today().format("%Y-%m-%d").to_string();
        let weeks = self.generator.generate(&today, &event.date, event_id)?;
        debug!(event_id, weeks = weeks.len(), "plan initialized from generator");
        Ok(PlanSource::Ready(weeks))
    }

    /// Run `edit` over every week matching `week` in the event's plan, force
    /// the supplied week id onto matches and install the new plan map.
    async fn edit_weeks<F>(
        &self,
        event_id: &str,
        week: &WeekRef,
        init: PlanInit,
        mut edit: F,
    ) -> Result<Edited, PlannerError>
    where
        F: FnMut(&TrainingWeek) -> Result<TrainingWeek, PlannerError>,
    {
        if event_id.is_empty() {
            return Ok(Edited::Skipped(SkipReason::MissingId));
        }
        let mut state = self.state.write().await;
        let weeks = match self.resolve_plan(&state, event_id, init)? {
            PlanSource::Ready(weeks) => weeks,
            PlanSource::Skip(reason) => return Ok(Edited::Skipped(reason)),
        };

        let week_id = WeekId::from(week.id());
        let mut matched = 0;
        let weeks = weeks
            .into_iter()
            .map(|w| {
                if !week.matches(&w) {
                    return Ok(w);
                }
                matched += 1;
                let mut next = edit(&w)?;
                next.id = Some(week_id.clone());
                Ok(next)
            })
            .collect::<Result<Vec<_>, PlannerError>>()?;

        let mut plans = state.plans.as_ref().clone();
        plans.insert(event_id.to_string(), weeks);
        state.plans = Arc::new(plans);
        Ok(Edited::Done {
            plans: state.plans.clone(),
            matched,
        })
    }

    fn skip(&self, operation: &'static str, event_id: &str, reason: SkipReason) -> Outcome {
        warn!(operation, event_id, ?reason, "operation skipped");
        let outcome = Outcome::from(reason);
        record_outcome(operation, &outcome);
        outcome
    }

    async fn persist(
        &self,
        operation: &'static str,
        events: Option<Arc<Vec<FitnessEvent>>>,
        plans: Arc<PlanMap>,
        outcome: Outcome,
    ) -> Result<Outcome, PlannerError> {
        let events = events.as_deref().map(Vec::as_slice);
        if let Err(e) = self.persister.save(events, &plans).await {
            warn!(operation, error = %e, "save failed");
            record_save_failure(operation);
            return Err(e);
        }
        record_outcome(operation, &outcome);
        Ok(outcome)
    }
}
