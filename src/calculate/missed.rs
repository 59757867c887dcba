//! Missed-hits view.

use std::cmp::Ordering;

use crate::models::{parse_war_time, AttackRecord, MissedHitEntry, WarId};

/// Collect missed attacks from completed wars, newest war first, then by
/// player name.
pub fn build_missed_hits(wars: &[(WarId, Vec<AttackRecord>)]) -> Vec<MissedHitEntry> {
    let mut missed: Vec<MissedHitEntry> = wars
        .iter()
        .filter(|(_, records)| records.first().is_some_and(|r| r.war_complete))
        .flat_map(|(_, records)| records.iter())
        .filter(|r| r.is_missed)
        .map(MissedHitEntry::from)
        .collect();

    missed.sort_by(|a, b| {
        compare_end_time(&b.war_end_time, &a.war_end_time)
            .then_with(|| a.player_name.cmp(&b.player_name))
    });
    missed
}

/// Chronological order; unparseable end times sort before any real time.
fn compare_end_time(a: &str, b: &str) -> Ordering {
    (parse_war_time(a), a).cmp(&(parse_war_time(b), b))
}
