//! Derived workbook views rebuilt on every run.

use serde::{Deserialize, Serialize};

use super::{AttackRecord, WarId};

/// One player in the roster sheet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RosterEntry {
    pub player_tag: String,

    /// Name as last seen
    pub player_name: String,

    /// Highest town hall level ever seen
    pub town_hall: u32,

    /// Number of war sheets in the workbook
    pub total_wars: u32,

    pub wars_participated: u32,
}

/// One missed attack from a completed war.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MissedHitEntry {
    pub war_id: WarId,
    pub war_end_time: String,
    pub player_name: String,
    pub player_tag: String,
    pub town_hall: u32,
    pub attack_number: u32,
    pub stars: u8,
    pub destruction: f64,
}

impl From<&AttackRecord> for MissedHitEntry {
    fn from(record: &AttackRecord) -> Self {
        Self {
            war_id: record.war_id.clone(),
            war_end_time: record.war_end_time.clone(),
            player_name: record.player_name.clone(),
            player_tag: record.player_tag.clone(),
            town_hall: record.town_hall,
            attack_number: record.attack_number,
            stars: record.stars,
            destruction: record.destruction,
        }
    }
}
