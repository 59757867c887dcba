//! War snapshot normalization.
//!
//! Flattens a snapshot into one [`AttackRecord`] per attack plus one sentinel
//! row per member without attacks. All defaults for missing API fields are
//! applied here.

use chrono::{DateTime, Utc};

use crate::models::{
    AttackRecord, LootAnnotations, WarAttack, WarId, WarMember, WarSnapshot, SENTINEL_ATTACK,
    UNKNOWN_END_TIME,
};

/// A normalized war, ready for the store.
#[derive(Debug, Clone)]
pub struct NormalizedWar {
    pub war_id: WarId,
    pub is_ended: bool,
    pub records: Vec<AttackRecord>,
}

/// Fields shared by every row of one war.
struct WarContext<'a> {
    war_id: &'a WarId,
    state: String,
    complete: bool,
    end_time: String,
    team_size: u32,
}

/// Normalize a snapshot, reapplying existing loot-hit markings.
pub fn normalize_war(
    war: &WarSnapshot,
    annotations: &LootAnnotations,
    now: DateTime<Utc>,
) -> NormalizedWar {
    let war_id = war.war_id(now);
    let is_ended = war.state().is_ended();

    let ctx = WarContext {
        war_id: &war_id,
        state: war.state.clone().unwrap_or_else(|| "unknown".to_string()),
        complete: is_ended,
        end_time: war
            .end_time
            .clone()
            .filter(|t| !t.trim().is_empty())
            .unwrap_or_else(|| UNKNOWN_END_TIME.to_string()),
        team_size: war.team_size.unwrap_or(0),
    };

    let mut records = Vec::new();
    for member in &war.clan.members {
        if member.attacks.is_empty() {
            records.push(sentinel_record(&ctx, member));
            continue;
        }

        for (idx, attack) in member.attacks.iter().enumerate() {
            let attack_number = idx as u32 + 1;
            let tag = member.tag.as_deref().unwrap_or_default();
            let is_loot_hit = annotations.contains(tag, attack_number);
            records.push(attack_record(&ctx, member, attack, attack_number, is_loot_hit));
        }
    }

    NormalizedWar {
        war_id,
        is_ended,
        records,
    }
}

/// A zero-star, zero-destruction attack counts as missed.
pub fn is_missed(stars: u8, destruction: f64) -> bool {
    stars == 0 && destruction == 0.0
}

pub fn is_triple(stars: u8) -> bool {
    stars == 3
}

fn base_record(ctx: &WarContext<'_>, member: &WarMember) -> AttackRecord {
    AttackRecord {
        war_id: ctx.war_id.clone(),
        war_state: ctx.state.clone(),
        war_complete: ctx.complete,
        war_end_time: ctx.end_time.clone(),
        team_size: ctx.team_size,
        player_name: member.name.clone().unwrap_or_default(),
        player_tag: member.tag.clone().unwrap_or_default(),
        town_hall: member.townhall_level.unwrap_or(0),
        map_position: member.map_position.unwrap_or(0),
        attack_number: SENTINEL_ATTACK,
        stars: 0,
        destruction: 0.0,
        is_triple: false,
        is_missed: true,
        is_loot_hit: false,
    }
}

fn sentinel_record(ctx: &WarContext<'_>, member: &WarMember) -> AttackRecord {
    base_record(ctx, member)
}

fn attack_record(
    ctx: &WarContext<'_>,
    member: &WarMember,
    attack: &WarAttack,
    attack_number: u32,
    is_loot_hit: bool,
) -> AttackRecord {
    let stars = attack.stars.unwrap_or(0).min(3);
    let destruction = attack.destruction_percentage.unwrap_or(0.0).clamp(0.0, 100.0);

    AttackRecord {
        attack_number,
        stars,
        destruction,
        is_triple: is_triple(stars),
        is_missed: is_missed(stars, destruction),
        is_loot_hit,
        ..base_record(ctx, member)
    }
}
