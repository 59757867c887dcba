//! Report publishing.
//!
//! - Leaderboard JSON files for the website
//! - War summary posted to a webhook when a war ends
//!
//! Publishing never affects the workbook; callers log failures and carry on.

pub mod export;
pub mod notify;

use thiserror::Error;

pub use export::LeaderboardExporter;
pub use notify::{build_war_report, WarNotifier, WarOutcome, WebhookNotifier, WebhookPayload};

/// Errors that can occur while publishing.
#[derive(Debug, Error)]
pub enum PublishError {
    #[error("Export failed: {0}")]
    Export(#[from] crate::storage::StorageError),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Webhook returned HTTP {status}: {body}")]
    WebhookStatus { status: u16, body: String },
}
