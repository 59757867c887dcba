//! Player roster view.

use std::collections::{BTreeSet, HashMap};

use crate::config::ParticipationCounting;
use crate::models::{AttackRecord, RosterEntry, WarId};

/// Build the roster from every stored war record set.
///
/// Names follow the last sighting and town hall is the highest ever seen.
/// `total_wars` is the number of war record sets in the workbook, empty or
/// unreadable ones included, so it may exceed `wars.len()`. Sorted by name.
pub fn build_roster(
    wars: &[(WarId, Vec<AttackRecord>)],
    total_wars: usize,
    counting: ParticipationCounting,
) -> Vec<RosterEntry> {
    let mut players: HashMap<&str, RosterEntry> = HashMap::new();
    let mut attacked_in: HashMap<&str, BTreeSet<&WarId>> = HashMap::new();

    for (war_id, records) in wars {
        for record in records {
            let entry = players
                .entry(record.player_tag.as_str())
                .or_insert_with(|| RosterEntry {
                    player_tag: record.player_tag.clone(),
                    player_name: record.player_name.clone(),
                    town_hall: record.town_hall,
                    total_wars: 0,
                    wars_participated: 0,
                });

            entry.player_name = record.player_name.clone();
            entry.town_hall = entry.town_hall.max(record.town_hall);

            if record.is_sentinel() {
                continue;
            }
            match counting {
                ParticipationCounting::PerAttack => entry.wars_participated += 1,
                ParticipationCounting::PerWar => {
                    if attacked_in
                        .entry(record.player_tag.as_str())
                        .or_default()
                        .insert(war_id)
                    {
                        entry.wars_participated += 1;
                    }
                }
            }
        }
    }

    let total_wars = total_wars as u32;
    let mut roster: Vec<RosterEntry> = players
        .into_values()
        .map(|mut entry| {
            entry.total_wars = total_wars;
            entry
        })
        .collect();
    roster.sort_by(|a, b| {
        a.player_name
            .cmp(&b.player_name)
            .then_with(|| a.player_tag.cmp(&b.player_tag))
    });
    roster
}
