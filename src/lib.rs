//! # War Tracker
//!
//! Clan-war attack tracker: fetches the current war, keeps one record set per
//! war in a local workbook, and publishes leaderboards and war summaries.
//!
//! ## Architecture
//!
//! - **models**: Core data structures (war snapshots, attack records, views)
//! - **fetch**: Clan-war API client
//! - **normalize**: Snapshot to attack-record flattening
//! - **storage**: Workbook of JSONL sheets, record store and lock
//! - **calculate**: Roster, missed-hits and leaderboard computation
//! - **publish**: Leaderboard export and webhook notifications
//! - **pipeline**: One end-to-end run
//! - **config**: Configuration loading and validation

pub mod calculate;
pub mod config;
pub mod fetch;
pub mod models;
pub mod normalize;
pub mod pipeline;
pub mod publish;
pub mod storage;

pub use models::*;

/// Parse a leaderboard window (e.g., "7d", "30", "all").
pub fn parse_window(s: &str) -> Option<LeaderboardWindow> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }

    if s.eq_ignore_ascii_case("all") {
        return Some(LeaderboardWindow::AllTime);
    }

    // Bare numbers are days
    let num_str = s.strip_suffix('d').unwrap_or(s);
    let days: u32 = num_str.parse().ok()?;
    if days == 0 {
        return None;
    }
    Some(LeaderboardWindow::Days(days))
}
