use serde::Serialize;

use crate::Outcome;

pub const OPERATIONS_TOTAL: &str = "fitness_planner_operations_total";
pub const SAVE_FAILURES_TOTAL: &str = "fitness_planner_save_failures_total";

#[derive(Clone, Debug, Serialize)]
pub struct Health {
    pub ready: bool,
    pub events: usize,
    pub plans: usize,
}

impl Health {
    pub fn readiness(events: usize, plans: usize) -> Self {
        Self {
            ready: true,
            events,
            plans,
        }
    }
}

pub(crate) fn record_outcome(operation: &'static str, outcome: &Outcome) {
    metrics::counter!(
        OPERATIONS_TOTAL,
        "operation" => operation,
        "outcome" => outcome.label()
    )
    .increment(1);
}

pub(crate) fn record_save_failure(operation: &'static str) {
    metrics::counter!(SAVE_FAILURES_TOTAL, "operation" => operation).increment(1);
}
