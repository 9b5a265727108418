use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::Serialize;

const DEV_HASH: &str = "dev";

/// Where this binary came from: short git hash and build time.
#[derive(Clone, Debug, Serialize, PartialEq, JsonSchema)]
pub struct BuildInfo {
    pub hash: String,
    #[schemars(with = "Option<String>")]
    pub built_at: Option<DateTime<Utc>>,
}

impl BuildInfo {
    pub fn current() -> Self {
        Self::from_parts(
            option_env!("FITNESS_PLANNER_BUILD_HASH"),
            option_env!("FITNESS_PLANNER_BUILD_TIME"),
        )
    }

    /// `hash` falls back to `dev`; `built_at` is Unix seconds.
    pub fn from_parts(hash: Option<&str>, built_at: Option<&str>) -> Self {
        let hash = hash
            .map(str::trim)
            .filter(|h| !h.is_empty())
            .unwrap_or(DEV_HASH)
            .to_string();
        let built_at = built_at
            .and_then(|s| s.trim().parse::<i64>().ok())
            .filter(|secs| *secs > 0)
            .and_then(|secs| DateTime::from_timestamp(secs, 0));
        Self { hash, built_at }
    }

    /// `abc1234 · Jun 15, 2026, 3:04 PM`, or just the hash without a build time.
    pub fn display(&self) -> String {
        match self.built_at {
            Some(t) => format!("{} · {}", self.hash, t.format("%b %-d, %Y, %-I:%M %p")),
            None => self.hash.clone(),
        }
    }
}
