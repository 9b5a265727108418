//! Event and training-plan state for the fitness planner.
//!
//! The [`FitnessManager`] owns the events collection and the per-event plans
//! and hands persistence, plan generation and templates off to the
//! collaborator traits defined here.

use std::collections::BTreeMap;
use std::fmt;

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

pub mod build_info;
pub mod clock;
pub mod config;
pub mod generator;
pub mod manager;
pub mod observability;
pub mod overview;
pub mod retry;
pub mod store;
pub mod templates;
pub mod utils;
pub mod week_ref;

pub use clock::{Clock, FixedClock, SystemClock};
pub use manager::{FitnessManager, FitnessSnapshot, ManagerConfig, Outcome, SkipReason};
pub use week_ref::WeekRef;

#[derive(Debug, Error)]
pub enum PlannerError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("configuration error: {0}")]
    Config(String),
    #[error("invalid date: {0}")]
    InvalidDate(String),
    #[error("event already exists: {0}")]
    DuplicateEvent(String),
    #[error("plan generation failed: {0}")]
    Generator(String),
    #[error("persistence failed: {0}")]
    Persist(String),
    #[error("malformed plan: {0}")]
    MalformedPlan(String),
}

impl PlannerError {
    /// Whether retrying the same call may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, PlannerError::Io(_) | PlannerError::Persist(_))
    }
}

/// Plans keyed by event id.
pub type PlanMap = BTreeMap<String, Vec<TrainingWeek>>;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct FitnessEvent {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub emoji: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    /// Target date, `YYYY-MM-DD`.
    pub date: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub training_weeks: u32,
    #[serde(default)]
    pub participants: Vec<String>,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub color: String,
}

impl FitnessEvent {
    /// The event every fresh planner starts with.
    pub fn default_triathlon() -> Self {
        Self {
            id: "triathlon-2026".into(),
            name: "Triathlon 2026".into(),
            emoji: "🏊".into(),
            kind: "triathlon".into(),
            date: "2026-06-15".into(),
            location: "Greensboro, NC".into(),
            training_weeks: 16,
            participants: vec!["Mike".into(), "Adam".into()],
            url: "https://www.ironman.com".into(),
            description: "Full Ironman triathlon".into(),
            color: "#3b82f6".into(),
        }
    }
}

/// One week of a training plan.
///
/// Only `id` and `weekNumber` are typed. Workout collections (`swim`, `bike`,
/// `run`, ...) and any other week attributes stay in `fields` as raw JSON, so
/// weeks written by older plans, numeric ids included, survive a load/save
/// cycle untouched.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct TrainingWeek {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<WeekId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub week_number: Option<u32>,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl TrainingWeek {
    pub fn new(id: impl Into<WeekId>, week_number: u32) -> Self {
        Self {
            id: Some(id.into()),
            week_number: Some(week_number),
            fields: Map::new(),
        }
    }

    pub fn with_field(mut self, key: impl Into<String>, value: Value) -> Self {
        self.fields.insert(key.into(), value);
        self
    }

    /// Raw entries of one workout collection, `None` when the week has no
    /// such collection (missing or `null`). Entries are not interpreted, so a
    /// legacy workout without an id is carried along as is.
    pub fn entries(&self, kind: &str) -> Result<Option<Vec<Value>>, PlannerError> {
        match self.fields.get(kind) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Array(items)) => Ok(Some(items.clone())),
            Some(other) => Err(PlannerError::MalformedPlan(format!(
                "collection {kind} is not an array: {other}"
            ))),
        }
    }

    pub fn set_entries(&mut self, kind: &str, entries: Vec<Value>) {
        self.fields.insert(kind.to_string(), Value::Array(entries));
    }

    /// Typed view of one collection. Missing or `null` reads as empty; every
    /// entry must carry an integer or string id.
    pub fn workouts(&self, kind: &str) -> Result<Vec<Workout>, PlannerError> {
        let entries = self.entries(kind)?.unwrap_or_default();
        Ok(serde_json::from_value(Value::Array(entries))?)
    }


    /// Shallow merge of `updates` over this week, later keys winning.
    pub fn merged(&self, updates: &Map<String, Value>) -> Result<TrainingWeek, PlannerError> {
        let mut obj = match serde_json::to_value(self)? {
            Value::Object(obj) => obj,
            _ => Map::new(),
        };
        for (k, v) in updates {
            obj.insert(k.clone(), v.clone());
        }
        Ok(serde_json::from_value(Value::Object(obj))?)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct Workout {
    pub id: WorkoutId,
    #[serde(flatten)]
    pub attributes: Map<String, Value>,
}

impl Workout {
    /// Build a workout from caller data. Any `id` in `data` is ignored.
    pub fn from_data(id: WorkoutId, data: &Map<String, Value>) -> Self {
        let attributes = data
            .iter()
            .filter(|(k, v)| k.as_str() != "id" && !v.is_null())
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        Self { id, attributes }
    }
}

/// Identifier of a week or workout as stored: an integer or a string.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, Hash, JsonSchema)]
#[serde(untagged)]
pub enum RecordId {
    Int(i64),
    Str(String),
}

/// Generated workout ids are integers, template ids may be strings.
pub type WorkoutId = RecordId;
pub type WeekId = RecordId;

impl RecordId {
    /// Read an id from untyped input such as a URL segment: all-digit input is
    /// an integer id, anything else a string id.
    pub fn parse(raw: &str) -> Self {
        match raw.parse::<i64>() {
            Ok(n) if !raw.starts_with('+') => WorkoutId::Int(n),
            _ => WorkoutId::Str(raw.to_string()),
        }
    }

    /// Strict comparison against a raw `id` value: numbers only equal
    /// integer ids, strings only equal string ids.
    pub fn matches_value(&self, value: Option<&Value>) -> bool {
        match (self, value) {
            (RecordId::Int(n), Some(Value::Number(v))) => {
                v.as_i64() == Some(*n) || v.as_f64() == Some(*n as f64)
            }
            (RecordId::Str(s), Some(Value::String(v))) => s == v,
            _ => false,
        }
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkoutId::Int(n) => write!(f, "{n}"),
            WorkoutId::Str(s) => f.write_str(s),
        }
    }
}

impl From<i64> for RecordId {
    fn from(v: i64) -> Self {
        RecordId::Int(v)
    }
}

impl From<&str> for RecordId {
    fn from(v: &str) -> Self {
        RecordId::Str(v.to_string())
    }
}

impl From<String> for RecordId {
    fn from(v: String) -> Self {
        RecordId::Str(v)
    }
}

#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum ViewMode {
    #[default]
    Events,
    Training,
    Stats,
}

/// The persisted shape: what a [`Persister`] writes and reads back.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct StoredDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub events: Option<Vec<FitnessEvent>>,
    #[serde(default)]
    pub plans: PlanMap,
}

#[async_trait]
pub trait Persister: Send + Sync + 'static {
    /// Store a full snapshot. `events: None` means events are unchanged and
    /// whatever was stored before must be kept.
    async fn save(
        &self,
        events: Option<&[FitnessEvent]>,
        plans: &PlanMap,
    ) -> Result<(), PlannerError>;

    async fn load(&self) -> Result<Option<StoredDocument>, PlannerError>;
}

/// Produces the initial plan for an event that has no template.
pub trait PlanGenerator: Send + Sync + 'static {
    fn generate(
        &self,
        today: &str,
        event_date: &str,
        event_id: &str,
    ) -> Result<Vec<TrainingWeek>, PlannerError>;
}

impl<F> PlanGenerator for F
where
    F: Fn(&str, &str, &str) -> Result<Vec<TrainingWeek>, PlannerError> + Send + Sync + 'static,
{
    fn generate(
        &self,
        today: &str,
        event_date: &str,
        event_id: &str,
    ) -> Result<Vec<TrainingWeek>, PlannerError> {
        self(today, event_date, event_id)
    }
}

pub trait TemplateProvider: Send + Sync + 'static {
    /// An owned copy of the template plan for `event_id`, if there is one.
    /// Callers are free to mutate the result.
    fn template(&self, event_id: &str) -> Option<Vec<TrainingWeek>>;
}
