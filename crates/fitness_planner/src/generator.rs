//! Default plan generation for events without a template.

use chrono::Duration;
use serde_json::json;

use crate::utils::parse_local_date;
use crate::{PlanGenerator, PlannerError, TrainingWeek};

pub const MAX_PLAN_WEEKS: u32 = 52;

/// Training phase of week `n` (1-based) in a plan of `total` weeks.
pub fn phase_for(n: u32, total: u32) -> &'static str {
    let remaining = total.saturating_sub(n);
    if remaining == 0 || (total >= 8 && remaining == 1) {
        "taper"
    } else if total >= 6 && remaining <= 3 {
        "peak"
    } else if n <= total * 2 / 5 {
        "base"
    } else {
        "build"
    }
}

pub(crate) fn focus_for(phase: &str) -> &'static str {
    match phase {
        "base" => "aerobic base",
        "build" => "volume and tempo",
        "peak" => "race-specific intensity",
        _ => "rest and sharpen",
    }
}

/// Splits the days between today and the event into consecutive weeks.
///
/// Weeks start on `today` and are numbered from 1; an event in the past or
/// today still gets a single week.
#[derive(Clone, Copy, Debug, Default)]
pub struct WeeklyPlanGenerator;

impl WeeklyPlanGenerator {
    pub fn week_count(days: i64) -> u32 {
        let weeks = (days.max(0) + 6) / 7;
        (weeks as u32).clamp(1, MAX_PLAN_WEEKS)
    }
}

impl PlanGenerator for WeeklyPlanGenerator {
    fn generate(
        &self,
        today: &str,
        event_date: &str,
        event_id: &str,
    ) -> Result<Vec<TrainingWeek>, PlannerError> {
        let start =
            parse_local_date(today).ok_or_else(|| PlannerError::InvalidDate(today.to_string()))?;
        let target = parse_local_date(event_date)
            .ok_or_else(|| PlannerError::InvalidDate(event_date.to_string()))?;
        let total = Self::week_count((target - start).num_days());
        tracing::debug!(event_id, total, "generating plan");

        Ok((1..=total)
            .map(|n| {
                let week_start = start + Duration::days(7 * i64::from(n - 1));
                let week_end = week_start + Duration::days(6);
                let phase = phase_for(n, total);
                TrainingWeek::new(format!("week-{n}"), n)
                    .with_field("startDate", json!(week_start.format("%Y-%m-%d").to_string()))
                    .with_field("endDate", json!(week_end.format("%Y-%m-%d").to_string()))
                    .with_field("phase", json!(phase))
                    .with_field("focus", json!(focus_for(phase)))
                    .with_field("notes", json!(""))
            })
            .collect())
    }
}
