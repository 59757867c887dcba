//! Webhook war summaries.
//!
//! Posts an embed-style message (Discord webhook format) when a war ends.

use std::cmp::Ordering;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Serialize;
use tracing::{debug, info};

use super::PublishError;
use crate::config::NotifyConfig;
use crate::models::{AttackRecord, WarSnapshot};

/// How many attacks are listed under top performers.
const TOP_PERFORMERS: usize = 3;

/// Result of a war from the clan's side, by stars.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarOutcome {
    Victory,
    Defeat,
    Tie,
}

impl WarOutcome {
    pub fn from_stars(clan: u32, opponent: u32) -> Self {
        match clan.cmp(&opponent) {
            Ordering::Greater => WarOutcome::Victory,
            Ordering::Less => WarOutcome::Defeat,
            Ordering::Equal => WarOutcome::Tie,
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            WarOutcome::Victory => "🏆 VICTORY!",
            WarOutcome::Defeat => "💔 DEFEAT",
            WarOutcome::Tie => "🤝 TIE",
        }
    }

    pub fn color(&self) -> u32 {
        match self {
            WarOutcome::Victory => 0x10b981,
            WarOutcome::Defeat => 0xef4444,
            WarOutcome::Tie => 0xf59e0b,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct WebhookPayload {
    pub embeds: Vec<Embed>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Embed {
    pub title: String,
    pub description: String,
    pub color: u32,
    pub fields: Vec<EmbedField>,
    pub timestamp: DateTime<Utc>,
    pub footer: EmbedFooter,
}

#[derive(Debug, Clone, Serialize)]
pub struct EmbedField {
    pub name: String,
    pub value: String,
    pub inline: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct EmbedFooter {
    pub text: String,
}

fn field(name: &str, value: String) -> EmbedField {
    EmbedField {
        name: name.to_string(),
        value,
        inline: false,
    }
}

/// Compose the end-of-war summary.
pub fn build_war_report(
    war: &WarSnapshot,
    records: &[AttackRecord],
    footer: &str,
    now: DateTime<Utc>,
) -> WebhookPayload {
    let clan_stars = war.clan.stars.unwrap_or(0);
    let opponent_stars = war.opponent.stars.unwrap_or(0);
    let outcome = WarOutcome::from_stars(clan_stars, opponent_stars);

    let score = format!(
        "**{}** ⭐ ({:.1}%) - {} ⭐ ({:.1}%)",
        clan_stars,
        war.clan.destruction_percentage.unwrap_or(0.0),
        opponent_stars,
        war.opponent.destruction_percentage.unwrap_or(0.0),
    );

    let mut attacks: Vec<&AttackRecord> = records.iter().filter(|r| !r.is_sentinel()).collect();
    attacks.sort_by(|a, b| b.stars.cmp(&a.stars));
    let top: Vec<String> = attacks
        .iter()
        .take(TOP_PERFORMERS)
        .map(|r| {
            format!(
                "⭐ **{}**: {}⭐ ({:.1}%)",
                r.player_name, r.stars, r.destruction
            )
        })
        .collect();
    let top_performers = if top.is_empty() {
        "No data".to_string()
    } else {
        top.join("\n")
    };

    let missed = attacks.iter().filter(|r| r.is_missed).count();
    let missed_text = if missed > 0 {
        format!("{} attack(s) missed", missed)
    } else {
        "✅ No missed attacks!".to_string()
    };

    WebhookPayload {
        embeds: vec![Embed {
            title: outcome.title().to_string(),
            description: format!("**{}** vs **{}**", war.clan_name(), war.opponent_name()),
            color: outcome.color(),
            fields: vec![
                field("📊 Final Score", score),
                field("🌟 Top Performers", top_performers),
                field("❌ Missed Attacks", missed_text),
            ],
            timestamp: now,
            footer: EmbedFooter {
                text: footer.to_string(),
            },
        }],
    }
}

/// Receiver of end-of-war summaries.
#[async_trait]
pub trait WarNotifier: Send + Sync {
    /// Report a finished war. `now` stamps the summary.
    async fn notify_war_ended(
        &self,
        war: &WarSnapshot,
        records: &[AttackRecord],
        now: DateTime<Utc>,
    ) -> Result<(), PublishError>;
}

/// Webhook notification client.
#[derive(Clone)]
pub struct WebhookNotifier {
    client: Client,
    webhook_url: String,
    footer: String,
}

impl WebhookNotifier {
    /// Build from config; `None` when no webhook URL is configured.
    pub fn from_config(config: &NotifyConfig) -> Result<Option<Self>, PublishError> {
        let Some(url) = config.webhook_url.as_deref().filter(|u| !u.trim().is_empty()) else {
            debug!("No webhook configured, war reports disabled");
            return Ok(None);
        };

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;

        info!("Webhook war reports enabled");
        Ok(Some(Self {
            client,
            webhook_url: url.to_string(),
            footer: config.footer.clone(),
        }))
    }

    /// Post a payload to the webhook.
    pub async fn send(&self, payload: &WebhookPayload) -> Result<(), PublishError> {
        let resp = self
            .client
            .post(&self.webhook_url)
            .json(payload)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(PublishError::WebhookStatus {
                status: status.as_u16(),
                body,
            });
        }

        debug!("Webhook notification sent");
        Ok(())
    }
}

#[async_trait]
impl WarNotifier for WebhookNotifier {
    async fn notify_war_ended(
        &self,
        war: &WarSnapshot,
        records: &[AttackRecord],
        now: DateTime<Utc>,
    ) -> Result<(), PublishError> {
        let payload = build_war_report(war, records, &self.footer, now);
        self.send(&payload).await?;
        info!("Sent war report to webhook");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::fixtures::record;
    use crate::models::WarClan;

    fn war(clan_stars: u32, opponent_stars: u32) -> WarSnapshot {
        WarSnapshot {
            state: Some("warEnded".to_string()),
            clan: WarClan {
                name: Some("Turtles".to_string()),
                stars: Some(clan_stars),
                destruction_percentage: Some(88.4),
                ..Default::default()
            },
            opponent: WarClan {
                name: Some("Hares".to_string()),
                stars: Some(opponent_stars),
                destruction_percentage: Some(70.0),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[test]
    fn test_outcome_from_stars() {
        assert_eq!(WarOutcome::from_stars(30, 20), WarOutcome::Victory);
        assert_eq!(WarOutcome::from_stars(20, 30), WarOutcome::Defeat);
        assert_eq!(WarOutcome::from_stars(25, 25), WarOutcome::Tie);
        assert_eq!(WarOutcome::Victory.color(), 0x10b981);
    }

    #[test]
    fn test_report_contents() {
        let records = vec![
            record("w1", "Alice", "#A", 1, 2, 85.0),
            record("w1", "Bob", "#B", 1, 3, 100.0),
            record("w1", "Cara", "#C", 1, 3, 100.0),
            record("w1", "Dan", "#D", 1, 0, 0.0),
            record("w1", "Eve", "#E", 0, 0, 0.0),
        ];
        let now = Utc::now();

        let payload = build_war_report(&war(30, 20), &records, "Tracker", now);
        let embed = &payload.embeds[0];

        assert_eq!(embed.title, "🏆 VICTORY!");
        assert_eq!(embed.description, "**Turtles** vs **Hares**");
        assert_eq!(embed.fields[0].value, "**30** ⭐ (88.4%) - 20 ⭐ (70.0%)");
        assert_eq!(
            embed.fields[1].value,
            "⭐ **Bob**: 3⭐ (100.0%)\n⭐ **Cara**: 3⭐ (100.0%)\n⭐ **Alice**: 2⭐ (85.0%)"
        );
        assert_eq!(embed.fields[2].value, "1 attack(s) missed");
        assert_eq!(embed.footer.text, "Tracker");
    }

    #[test]
    fn test_report_without_attacks() {
        let records = vec![record("w1", "Eve", "#E", 0, 0, 0.0)];

        let payload = build_war_report(&war(0, 0), &records, "Tracker", Utc::now());
        let embed = &payload.embeds[0];

        assert_eq!(embed.title, "🤝 TIE");
        assert_eq!(embed.fields[1].value, "No data");
        assert_eq!(embed.fields[2].value, "✅ No missed attacks!");
    }

    #[test]
    fn test_payload_serialization() {
        let payload = build_war_report(&war(10, 20), &[], "Tracker", Utc::now());
        let value = serde_json::to_value(&payload).unwrap();

        assert_eq!(value["embeds"][0]["color"], 0xef4444);
        assert_eq!(value["embeds"][0]["fields"][0]["inline"], false);
        assert_eq!(value["embeds"][0]["footer"]["text"], "Tracker");
    }

    #[test]
    fn test_notifier_disabled_without_url() {
        let config = NotifyConfig::default();
        assert!(WebhookNotifier::from_config(&config).unwrap().is_none());

        let blank = NotifyConfig {
            webhook_url: Some("  ".to_string()),
            ..NotifyConfig::default()
        };
        assert!(WebhookNotifier::from_config(&blank).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_unreachable_webhook_is_an_error() {
        let config = NotifyConfig {
            // Nothing listens on the discard port
            webhook_url: Some("http://127.0.0.1:9/hook".to_string()),
            timeout_seconds: 2,
            ..NotifyConfig::default()
        };
        let notifier = WebhookNotifier::from_config(&config).unwrap().unwrap();

        let result = notifier
            .notify_war_ended(&war(1, 0), &[], Utc::now())
            .await;

        assert!(matches!(result, Err(PublishError::Http(_))));
    }
}
