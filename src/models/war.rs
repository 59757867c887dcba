//! Raw war snapshot as returned by the clan-war API.
//!
//! Every field is optional on the wire; defaulting happens in
//! [`crate::normalize`], not here.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::WarId;

/// League name the API reports for regular (non-CWL) wars.
pub const UNRANKED_LEAGUE: &str = "Unranked";

/// War lifecycle state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WarState {
    NotInWar,
    Preparation,
    InWar,
    Ended,
    Unknown(String),
}

impl WarState {
    /// Parse the API's state string. `ended` is accepted as an alias of `warEnded`.
    pub fn from_api(raw: &str) -> Self {
        match raw {
            "notInWar" => WarState::NotInWar,
            "preparation" => WarState::Preparation,
            "inWar" => WarState::InWar,
            "warEnded" | "ended" => WarState::Ended,
            other => WarState::Unknown(other.to_string()),
        }
    }

    pub fn is_ended(&self) -> bool {
        matches!(self, WarState::Ended)
    }
}

impl fmt::Display for WarState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WarState::NotInWar => write!(f, "notInWar"),
            WarState::Preparation => write!(f, "preparation"),
            WarState::InWar => write!(f, "inWar"),
            WarState::Ended => write!(f, "warEnded"),
            WarState::Unknown(s) => write!(f, "{}", s),
        }
    }
}

/// Current war document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WarSnapshot {
    pub state: Option<String>,
    pub team_size: Option<u32>,
    pub preparation_start_time: Option<String>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub war_league: Option<WarLeague>,
    #[serde(default)]
    pub clan: WarClan,
    #[serde(default)]
    pub opponent: WarClan,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WarLeague {
    pub name: Option<String>,
}

/// One side of the war.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WarClan {
    pub tag: Option<String>,
    pub name: Option<String>,
    pub stars: Option<u32>,
    pub destruction_percentage: Option<f64>,
    #[serde(default)]
    pub members: Vec<WarMember>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WarMember {
    pub tag: Option<String>,
    pub name: Option<String>,
    pub townhall_level: Option<u32>,
    pub map_position: Option<u32>,
    #[serde(default)]
    pub attacks: Vec<WarAttack>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WarAttack {
    pub attacker_tag: Option<String>,
    pub defender_tag: Option<String>,
    pub stars: Option<u8>,
    pub destruction_percentage: Option<f64>,
    pub order: Option<u32>,
}

impl WarSnapshot {
    /// Parsed war state; a missing state is treated as not in war.
    pub fn state(&self) -> WarState {
        WarState::from_api(self.state.as_deref().unwrap_or("notInWar"))
    }

    /// League (CWL) wars report a league name other than "Unranked".
    pub fn is_league_war(&self) -> bool {
        self.war_league
            .as_ref()
            .and_then(|league| league.name.as_deref())
            .is_some_and(|name| name != UNRANKED_LEAGUE)
    }

    pub fn war_id(&self, now: DateTime<Utc>) -> WarId {
        WarId::derive(
            self.preparation_start_time.as_deref(),
            self.end_time.as_deref(),
            now,
        )
    }

    pub fn clan_name(&self) -> &str {
        self.clan.name.as_deref().unwrap_or("Unknown")
    }

    pub fn opponent_name(&self) -> &str {
        self.opponent.name.as_deref().unwrap_or("Unknown")
    }
}
