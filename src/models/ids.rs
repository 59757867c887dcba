//! Deterministic war identifiers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Maximum length of a sheet name in the workbook.
pub const SHEET_NAME_MAX_LEN: usize = 31;

/// A stable identifier for one war, used as the record set (sheet) name.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WarId(String);

impl WarId {
    /// Build a WarId from a raw timestamp string.
    ///
    /// Colons and periods become hyphens and the result is cut to
    /// [`SHEET_NAME_MAX_LEN`] characters. Wars sharing a 31 character prefix
    /// collide; the limit is kept for workbook compatibility.
    pub fn from_timestamp(raw: &str) -> Self {
        let cleaned: String = raw
            .chars()
            .map(|c| if c == ':' || c == '.' { '-' } else { c })
            .take(SHEET_NAME_MAX_LEN)
            .collect();
        Self(cleaned)
    }

    /// Derive the identifier from a war's timestamps.
    ///
    /// Preparation start wins, then end time, then the supplied clock.
    pub fn derive(
        preparation_start: Option<&str>,
        end_time: Option<&str>,
        now: DateTime<Utc>,
    ) -> Self {
        let non_empty = |s: &&str| !s.trim().is_empty();
        match preparation_start.filter(non_empty).or(end_time.filter(non_empty)) {
            Some(raw) => Self::from_timestamp(raw),
            None => Self::from_timestamp(&now.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WarId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for WarId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "WarId({})", self.0)
    }
}

impl From<&str> for WarId {
    fn from(s: &str) -> Self {
        Self::from_timestamp(s)
    }
}

impl From<String> for WarId {
    fn from(s: String) -> Self {
        Self::from_timestamp(&s)
    }
}
