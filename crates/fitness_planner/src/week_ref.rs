//! Addressing a week inside a plan.
//!
//! Older plans only carried `weekNumber`; newer ones carry an explicit `id`
//! such as `week-<N>`. A week id that mentions `week-` followed by a number
//! also matches weeks by that `weekNumber`, and every matched week is
//! rewritten to the supplied id on first touch.

use std::fmt;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::{TrainingWeek, WeekId};

const WEEK_MARKER: &str = "week-";

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "by", rename_all = "snake_case")]
pub enum WeekRef {
    /// Match by exact week id only.
    Id { id: String },
    /// Match by exact week id, or by `weekNumber`.
    Numbered { id: String, number: u32 },
}

/// Number after the first `week-` in `raw`: optional leading whitespace and
/// `+`, then the leading digits. Zero and digit-less suffixes yield `None`.
fn week_number_in(raw: &str) -> Option<u32> {
    let (_, rest) = raw.split_once(WEEK_MARKER)?;
    let rest = rest.trim_start();
    let rest = rest.strip_prefix('+').unwrap_or(rest);
    let digits = rest.bytes().take_while(u8::is_ascii_digit).count();
    rest[..digits].parse::<u32>().ok().filter(|n| *n > 0)
}

impl WeekRef {
    /// Resolve a raw week id. Empty input yields `None`.
    pub fn parse(raw: &str) -> Option<Self> {
        if raw.is_empty() {
            return None;
        }
        let id = raw.to_string();
        Some(match week_number_in(raw) {
            Some(number) => WeekRef::Numbered { id, number },
            None => WeekRef::Id { id },
        })
    }

    /// The conventional `week-<n>` reference.
    pub fn number(n: u32) -> Self {
        WeekRef::Numbered {
            id: format!("{WEEK_MARKER}{n}"),
            number: n,
        }
    }

    /// The id as supplied; written onto every week this reference matches.
    pub fn id(&self) -> &str {
        match self {
            WeekRef::Id { id } | WeekRef::Numbered { id, .. } => id,
        }
    }

    pub fn week_number(&self) -> Option<u32> {
        match self {
            WeekRef::Id { .. } => None,
            WeekRef::Numbered { number, .. } => Some(*number),
        }
    }

    pub fn matches(&self, week: &TrainingWeek) -> bool {
        let by_id = matches!(&week.id, Some(WeekId::Str(s)) if s == self.id());
        by_id || (self.week_number().is_some() && week.week_number == self.week_number())
    }
}

impl fmt::Display for WeekRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl From<u32> for WeekRef {
    fn from(n: u32) -> Self {
        WeekRef::number(n)
    }
}
