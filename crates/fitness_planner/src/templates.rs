//! Pre-built plans for events that ship with the planner.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::{Map, Value, json};

use crate::generator::{focus_for, phase_for};
use crate::{PlannerError, TemplateProvider, TrainingWeek};

pub const TRIATHLON_EVENT_ID: &str = "triathlon-2026";
pub const INDY_HALF_EVENT_ID: &str = "indy-half-2026";

const TRIATHLON_WEEKS: u32 = 16;
const HALF_MARATHON_WEEKS: u32 = 12;

/// Immutable template plans keyed by event id. Every lookup hands out a
/// fresh copy.
#[derive(Clone, Debug, Default)]
pub struct BuiltinTemplates {
    plans: HashMap<String, Arc<Vec<TrainingWeek>>>,
}

impl BuiltinTemplates {
    pub fn empty() -> Self {
        Self::default()
    }

    /// The triathlon and half-marathon plans.
    pub fn builtin() -> Self {
        Self::empty()
            .with_template(TRIATHLON_EVENT_ID, triathlon_plan())
            .with_template(INDY_HALF_EVENT_ID, half_marathon_plan())
    }

    pub fn with_template(mut self, event_id: impl Into<String>, weeks: Vec<TrainingWeek>) -> Self {
        self.plans.insert(event_id.into(), Arc::new(weeks));
        self
    }

    /// Add templates from a JSON object mapping event id to an array of weeks.
    pub fn extend_from_json(mut self, value: Value) -> Result<Self, PlannerError> {
        let parsed: HashMap<String, Vec<TrainingWeek>> = serde_json::from_value(value)?;
        for (id, weeks) in parsed {
            self.plans.insert(id, Arc::new(weeks));
        }
        Ok(self)
    }

    pub fn event_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.plans.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }
}

impl TemplateProvider for BuiltinTemplates {
    fn template(&self, event_id: &str) -> Option<Vec<TrainingWeek>> {
        self.plans.get(event_id).map(|weeks| weeks.as_ref().clone())
    }
}

/// Linear ramp from 60% to full volume, dropping back for taper weeks.
fn volume_factor(n: u32, total: u32) -> f64 {
    if phase_for(n, total) == "taper" {
        return 0.6;
    }
    let span = f64::from(total.saturating_sub(2).max(1));
    (0.6 + 0.4 * f64::from(n - 1) / span).min(1.0)
}

fn round_to(value: f64, step: f64) -> f64 {
    (value / step).round() * step
}

fn session(week: u32, kind: &str, idx: usize, attrs: Value) -> Value {
    let mut entry = match attrs {
        Value::Object(map) => map,
        _ => Map::new(),
    };
    entry.insert("id".to_string(), json!(format!("w{week}-{kind}-{idx}")));
    entry.insert("completed".to_string(), Value::Bool(false));
    Value::Object(entry)
}

fn template_week(n: u32, total: u32, collections: Vec<(&str, Vec<Value>)>) -> TrainingWeek {
    let phase = phase_for(n, total);
    let mut week = TrainingWeek::new(format!("week-{n}"), n)
        .with_field("phase", json!(phase))
        .with_field("focus", json!(focus_for(phase)))
        .with_field("notes", json!(""));
    for (kind, entries) in collections {
        week.set_entries(kind, entries);
    }
    week
}

/// Weekly discipline targets only; sessions are logged by the athlete.
fn triathlon_plan() -> Vec<TrainingWeek> {
    (1..=TRIATHLON_WEEKS)
        .map(|n| {
            let f = volume_factor(n, TRIATHLON_WEEKS);
            template_week(n, TRIATHLON_WEEKS, Vec::new()).with_field(
                "targets",
                json!({
                    "swim": {"sessions": 2, "distance": round_to(3900.0 * f, 100.0)},
                    "bike": {"sessions": 2, "duration": round_to(240.0 * f, 5.0)},
                    "run": {"sessions": 2, "distance": round_to(26.0 * f, 0.5)},
                }),
            )
        })
        .collect()
}

fn half_marathon_plan() -> Vec<TrainingWeek> {
    (1..=HALF_MARATHON_WEEKS)
        .map(|n| {
            let f = volume_factor(n, HALF_MARATHON_WEEKS);
            let run = vec![
                session(n, "run", 1, json!({"day": "Tue", "type": "easy", "distance": round_to(6.0 * f, 0.5)})),
                session(n, "run", 2, json!({"day": "Thu", "type": "tempo", "distance": round_to(8.0 * f, 0.5)})),
                session(n, "run", 3, json!({"day": "Sat", "type": "long run", "distance": round_to(19.0 * f, 0.5)})),
            ];
            let strength = vec![session(n, "strength", 1, json!({"day": "Mon", "type": "core and hips", "duration": 30}))];
            template_week(n, HALF_MARATHON_WEEKS, vec![("run", run), ("strength", strength)])
        })
        .collect()
}
