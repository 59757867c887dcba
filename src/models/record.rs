//! Per-attack war records and the loot-hit overlay.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use super::WarId;

/// Attack number used for the single row of a member who never attacked.
pub const SENTINEL_ATTACK: u32 = 0;

/// Placeholder stored when the API omits the war end time.
pub const UNKNOWN_END_TIME: &str = "N/A";

/// One attack by one player in one war, or a sentinel row for a member
/// without attacks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttackRecord {
    pub war_id: WarId,

    /// Raw state string as reported by the API
    pub war_state: String,

    /// Same value on every row of a war
    pub war_complete: bool,

    pub war_end_time: String,
    pub team_size: u32,
    pub player_name: String,
    pub player_tag: String,
    pub town_hall: u32,
    pub map_position: u32,

    /// 1-based within the player's attacks, 0 for the sentinel row
    pub attack_number: u32,

    pub stars: u8,
    pub destruction: f64,
    pub is_triple: bool,
    pub is_missed: bool,

    /// Curated by hand; never derived from the API
    #[serde(default)]
    pub is_loot_hit: bool,
}

impl AttackRecord {
    pub fn is_sentinel(&self) -> bool {
        self.attack_number == SENTINEL_ATTACK
    }

    /// Attacks that count towards star totals and rates.
    pub fn is_qualifying(&self) -> bool {
        !self.is_sentinel() && !self.is_loot_hit && !self.is_missed
    }

    /// War end time in UTC, if it parses.
    pub fn end_time_utc(&self) -> Option<DateTime<Utc>> {
        parse_war_time(&self.war_end_time)
    }
}

/// Parse an API timestamp.
///
/// Accepts the compact form (`20240101T000000.000Z`) and RFC 3339.
pub fn parse_war_time(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(naive) = NaiveDateTime::parse_from_str(raw, "%Y%m%dT%H%M%S%.fZ") {
        return Some(naive.and_utc());
    }
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Loot-hit markings for one war: player tag to attack numbers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LootAnnotations(BTreeMap<String, BTreeSet<u32>>);

impl LootAnnotations {
    pub fn new() -> Self {
        Self::default()
    }

    /// Collect the markings carried by stored records.
    pub fn from_records(records: &[AttackRecord]) -> Self {
        let mut annotations = Self::new();
        for record in records.iter().filter(|r| r.is_loot_hit && !r.is_sentinel()) {
            annotations.mark(&record.player_tag, record.attack_number);
        }
        annotations
    }

    pub fn mark(&mut self, player_tag: &str, attack_number: u32) {
        self.0
            .entry(player_tag.to_string())
            .or_default()
            .insert(attack_number);
    }

    pub fn contains(&self, player_tag: &str, attack_number: u32) -> bool {
        self.0
            .get(player_tag)
            .is_some_and(|attacks| attacks.contains(&attack_number))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Total number of marked attacks.
    pub fn len(&self) -> usize {
        self.0.values().map(BTreeSet::len).sum()
    }
}
