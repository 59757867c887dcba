//! Leaderboard models.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Per-player leaderboard row.
///
/// Field names match the columns the leaderboard website reads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    #[serde(rename = "Player Name")]
    pub player_name: String,

    #[serde(rename = "Player Tag")]
    pub player_tag: String,

    /// Formatted percentage, e.g. "66.7%"
    #[serde(rename = "3 Star Rate")]
    pub three_star_rate: String,

    #[serde(rename = "Avg Stars Per Attack")]
    pub avg_stars_per_attack: f64,

    #[serde(rename = "Total Wars")]
    pub total_wars: u32,

    #[serde(rename = "Total Stars")]
    pub total_stars: u32,

    #[serde(rename = "Missed Hits")]
    pub missed_hits: u32,
}

/// Trailing time window for a leaderboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LeaderboardWindow {
    AllTime,
    Days(u32),
}

impl LeaderboardWindow {
    /// Filename suffix: `_all`, `_7d`, ...
    pub fn suffix(&self) -> String {
        match self {
            LeaderboardWindow::AllTime => "_all".to_string(),
            LeaderboardWindow::Days(days) => format!("_{}d", days),
        }
    }

    /// Earliest war end time included, relative to `now`.
    pub fn cutoff(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            LeaderboardWindow::AllTime => None,
            LeaderboardWindow::Days(days) => Some(now - Duration::days(i64::from(*days))),
        }
    }
}

impl fmt::Display for LeaderboardWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LeaderboardWindow::AllTime => write!(f, "All Time"),
            LeaderboardWindow::Days(days) => write!(f, "Last {} Days", days),
        }
    }
}

/// Exported leaderboard file contents.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeaderboardDocument {
    pub last_updated: DateTime<Utc>,
    pub players: Vec<LeaderboardEntry>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_window_suffix() {
        assert_eq!(LeaderboardWindow::AllTime.suffix(), "_all");
        assert_eq!(LeaderboardWindow::Days(7).suffix(), "_7d");
        assert_eq!(LeaderboardWindow::Days(90).suffix(), "_90d");
    }

    #[test]
    fn test_window_cutoff() {
        let now = Utc.with_ymd_and_hms(2024, 3, 31, 12, 0, 0).unwrap();
        assert_eq!(LeaderboardWindow::AllTime.cutoff(now), None);
        assert_eq!(
            LeaderboardWindow::Days(30).cutoff(now),
            Some(Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap())
        );
    }

    #[test]
    fn test_entry_serializes_website_columns() {
        let entry = LeaderboardEntry {
            player_name: "Alice".to_string(),
            player_tag: "#A".to_string(),
            three_star_rate: "50.0%".to_string(),
            avg_stars_per_attack: 2.5,
            total_wars: 3,
            total_stars: 10,
            missed_hits: 1,
        };

        let value = serde_json::to_value(&entry).unwrap();
        assert_eq!(value["Player Name"], "Alice");
        assert_eq!(value["3 Star Rate"], "50.0%");
        assert_eq!(value["Avg Stars Per Attack"], 2.5);
        assert_eq!(value["Missed Hits"], 1);
    }
}
