//! Read-only summaries of events and their plans.

use chrono::NaiveDate;
use schemars::JsonSchema;
use serde::Serialize;
use serde_json::Value;

use crate::utils::{days_until, format_countdown, is_date_in_range, safe_file_name};
use crate::{FitnessEvent, TrainingWeek};

#[derive(Clone, Debug, Serialize, PartialEq, JsonSchema)]
pub struct EventOverview {
    pub id: String,
    pub name: String,
    pub date: String,
    /// `None` when the event date does not parse.
    pub days_until: Option<i64>,
    pub countdown: String,
    pub plan_weeks: usize,
    /// Week number whose `startDate..=endDate` contains today.
    pub current_week: Option<u32>,
    pub workouts: usize,
    pub completed: usize,
}

impl EventOverview {
    pub fn build(event: &FitnessEvent, plan: Option<&[TrainingWeek]>, today: NaiveDate) -> Self {
        let days = days_until(&event.date, today);
        let weeks = plan.unwrap_or_default();
        let (workouts, completed) = weeks.iter().map(workout_counts).fold(
            (0, 0),
            |(total, done), (t, d)| (total + t, done + d),
        );
        Self {
            id: event.id.clone(),
            name: event.name.clone(),
            date: event.date.clone(),
            days_until: days,
            countdown: days.map(format_countdown).unwrap_or_default(),
            plan_weeks: weeks.len(),
            current_week: weeks
                .iter()
                .find(|w| week_contains(w, today))
                .and_then(|w| w.week_number),
            workouts,
            completed,
        }
    }
}

fn week_contains(week: &TrainingWeek, day: NaiveDate) -> bool {
    match (
        week.fields.get("startDate").and_then(Value::as_str),
        week.fields.get("endDate").and_then(Value::as_str),
    ) {
        (Some(start), Some(end)) => is_date_in_range(day, start, end),
        _ => false,
    }
}

/// (total, completed) over every workout collection in the week.
fn workout_counts(week: &TrainingWeek) -> (usize, usize) {
    week.fields
        .values()
        .filter_map(Value::as_array)
        .flatten()
        .filter(|w| w.is_object())
        .fold((0, 0), |(total, done), w| {
            let finished = w.get("completed").and_then(Value::as_bool) == Some(true);
            (total + 1, done + usize::from(finished))
        })
}

/// Download name for an exported plan, e.g. `1718000000000_Triathlon_2026-plan.json`.
pub fn export_file_name(event: &FitnessEvent, timestamp_millis: i64) -> String {
    safe_file_name(&format!("{}-plan.json", event.name), timestamp_millis)
}
