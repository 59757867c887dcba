//! Player leaderboard over completed wars.
//!
//! Only qualifying attacks (a real attack that is neither missed nor marked
//! as a loot hit) feed star totals and rates. Participation and missed hits
//! look at every row of the filtered wars.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use super::{calculate_average_stars, calculate_three_star_rate, format_rate, round_to};
use crate::models::{AttackRecord, LeaderboardEntry, LeaderboardWindow, WarId};

/// Inputs that shape a leaderboard.
#[derive(Debug, Clone, Copy)]
pub struct LeaderboardOptions {
    pub window: LeaderboardWindow,

    /// Missed hits charged for a war in which a member never attacked
    pub expected_attacks_per_war: u32,
}

impl Default for LeaderboardOptions {
    fn default() -> Self {
        Self {
            window: LeaderboardWindow::AllTime,
            expected_attacks_per_war: 2,
        }
    }
}

#[derive(Default)]
struct PlayerTally<'a> {
    wars: BTreeSet<&'a WarId>,
    idle_wars: BTreeSet<&'a WarId>,
    missed_by_war: BTreeMap<&'a WarId, u32>,
    stars: u32,
    three_stars: u32,
    attacks: u32,
}

impl PlayerTally<'_> {
    fn missed_hits(&self, expected_attacks: u32) -> u32 {
        self.wars
            .iter()
            .map(|war| {
                if self.idle_wars.contains(war) {
                    expected_attacks
                } else {
                    self.missed_by_war.get(war).copied().unwrap_or(0)
                }
            })
            .sum()
    }
}

/// Rank players across the completed wars inside the window.
///
/// Returns an empty list when no completed war matches.
pub fn build_leaderboard(
    wars: &[(WarId, Vec<AttackRecord>)],
    options: &LeaderboardOptions,
    now: DateTime<Utc>,
) -> Vec<LeaderboardEntry> {
    let cutoff = options.window.cutoff(now);
    let mut tallies: BTreeMap<(&str, &str), PlayerTally> = BTreeMap::new();

    for (war_id, records) in wars {
        if !records.first().is_some_and(|r| r.war_complete) {
            continue;
        }

        for record in in_window(war_id, records, cutoff) {
            let tally = tallies
                .entry((record.player_name.as_str(), record.player_tag.as_str()))
                .or_default();

            tally.wars.insert(war_id);
            if record.is_sentinel() {
                tally.idle_wars.insert(war_id);
            } else if record.is_missed {
                *tally.missed_by_war.entry(war_id).or_default() += 1;
            }

            if record.is_qualifying() {
                tally.stars += u32::from(record.stars);
                tally.attacks += 1;
                if record.is_triple {
                    tally.three_stars += 1;
                }
            }
        }
    }

    if tallies.is_empty() {
        debug!("No completed war data for {}", options.window);
        return Vec::new();
    }

    let mut ranked: Vec<(f64, LeaderboardEntry)> = tallies
        .into_iter()
        .map(|((name, tag), tally)| {
            let rate = calculate_three_star_rate(tally.three_stars, tally.attacks);
            let entry = LeaderboardEntry {
                player_name: name.to_string(),
                player_tag: tag.to_string(),
                three_star_rate: format_rate(rate),
                avg_stars_per_attack: calculate_average_stars(tally.stars, tally.attacks),
                total_wars: tally.wars.len() as u32,
                total_stars: tally.stars,
                missed_hits: tally.missed_hits(options.expected_attacks_per_war),
            };
            (round_to(rate, 1), entry)
        })
        .collect();

    // Rate as displayed, then fewer misses, then more wars
    ranked.sort_by(|(rate_a, a), (rate_b, b)| {
        rate_b
            .total_cmp(rate_a)
            .then_with(|| a.missed_hits.cmp(&b.missed_hits))
            .then_with(|| b.total_wars.cmp(&a.total_wars))
    });

    ranked.into_iter().map(|(_, entry)| entry).collect()
}

/// Rows of one war whose end time falls inside the window.
fn in_window<'a>(
    war_id: &WarId,
    records: &'a [AttackRecord],
    cutoff: Option<DateTime<Utc>>,
) -> impl Iterator<Item = &'a AttackRecord> + 'a {
    let unparseable = cutoff.is_some()
        && records.iter().any(|r| r.end_time_utc().is_none());
    if unparseable {
        warn!("War {} has rows without a usable end time; excluded from windowed boards", war_id);
    }

    records.iter().filter(move |r| match cutoff {
        None => true,
        Some(cutoff) => r.end_time_utc().is_some_and(|end| end >= cutoff),
    })
}
