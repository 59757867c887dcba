//! Clan-war API client.
//!
//! Fetches the clan's current war and classifies it for the pipeline.
//! Transport failures surface as [`FetchError`]; the orchestrator treats them
//! as "no data this cycle".

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};
use reqwest::Client;
use thiserror::Error;
use tracing::{debug, info};
use url::Url;

use crate::config::ApiConfig;
use crate::models::{WarSnapshot, WarState};

/// Errors that can occur during fetching.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Rate limited, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("HTTP {status}: {message}")]
    HttpStatus { status: u16, message: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// What the pipeline should do with a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarClassification {
    NotInWar,
    /// Clan war league; never stored
    LeagueWar,
    InProgress,
    Ended,
}

/// Classify a snapshot. Order matters: not-in-war, then league, then state.
pub fn classify(war: &WarSnapshot) -> WarClassification {
    let state = war.state();
    if state == WarState::NotInWar {
        WarClassification::NotInWar
    } else if war.is_league_war() {
        WarClassification::LeagueWar
    } else if state.is_ended() {
        WarClassification::Ended
    } else {
        WarClassification::InProgress
    }
}

/// Ensure a clan tag starts with '#'.
pub fn format_tag(tag: &str) -> String {
    let tag = tag.trim();
    if tag.starts_with('#') {
        tag.to_string()
    } else {
        format!("#{}", tag)
    }
}

/// Source of current-war snapshots.
#[async_trait]
pub trait WarSource: Send + Sync {
    async fn current_war(&self) -> Result<WarSnapshot, FetchError>;
}

/// HTTP client for the clan-war API.
pub struct WarClient {
    client: Client,
    endpoint: Url,
    token: String,
}

impl WarClient {
    /// Create a client for the configured clan.
    pub fn new(config: &ApiConfig) -> Result<Self, FetchError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .user_agent(concat!("war-tracker/", env!("CARGO_PKG_VERSION")))
            .default_headers(headers)
            .build()?;

        let endpoint = current_war_url(&config.base_url, &config.clan_tag)?;
        debug!("Current war endpoint: {}", endpoint);

        Ok(Self {
            client,
            endpoint,
            token: config.token.clone(),
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

#[async_trait]
impl WarSource for WarClient {
    async fn current_war(&self) -> Result<WarSnapshot, FetchError> {
        info!("Fetching current war");

        let response = self
            .client
            .get(self.endpoint.clone())
            .bearer_auth(&self.token)
            .send()
            .await?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse().ok())
                .unwrap_or(60);

            return Err(FetchError::RateLimited {
                retry_after_secs: retry_after,
            });
        }

        if !status.is_success() {
            return Err(FetchError::HttpStatus {
                status: status.as_u16(),
                message: status.canonical_reason().unwrap_or("Unknown").to_string(),
            });
        }

        let body = response.bytes().await?;
        let war: WarSnapshot = serde_json::from_slice(&body)?;
        debug!("Fetched war in state {}", war.state());
        Ok(war)
    }
}

/// `{base}/clans/{tag}/currentwar`, with the tag percent-encoded.
pub fn current_war_url(base_url: &str, clan_tag: &str) -> Result<Url, FetchError> {
    let mut url =
        Url::parse(base_url).map_err(|e| FetchError::InvalidUrl(format!("{}: {}", base_url, e)))?;

    url.path_segments_mut()
        .map_err(|_| FetchError::InvalidUrl(base_url.to_string()))?
        .pop_if_empty()
        .push("clans")
        .push(&format_tag(clan_tag))
        .push("currentwar");

    Ok(url)
}
