//! Leaderboard JSON export.

use std::io::Write;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use tracing::info;

use super::PublishError;
use crate::config::LeaderboardConfig;
use crate::models::{LeaderboardDocument, LeaderboardEntry, LeaderboardWindow};
use crate::storage::jsonl::write_atomic;

/// Writes one JSON document per leaderboard window.
#[derive(Debug, Clone)]
pub struct LeaderboardExporter {
    output_dir: PathBuf,
    file_stem: String,
}

impl LeaderboardExporter {
    pub fn new(output_dir: PathBuf, file_stem: impl Into<String>) -> Self {
        Self {
            output_dir,
            file_stem: file_stem.into(),
        }
    }

    pub fn from_config(config: &LeaderboardConfig) -> Self {
        Self::new(config.output_dir.clone(), config.file_stem.clone())
    }

    /// e.g. `leaderboard_30d.json`
    pub fn path_for(&self, window: LeaderboardWindow) -> PathBuf {
        self.output_dir
            .join(format!("{}{}.json", self.file_stem, window.suffix()))
    }

    /// Write a leaderboard. Empty boards are not written.
    pub fn export(
        &self,
        window: LeaderboardWindow,
        players: &[LeaderboardEntry],
        generated_at: DateTime<Utc>,
    ) -> Result<Option<PathBuf>, PublishError> {
        if players.is_empty() {
            info!("{}: no completed war data, nothing exported", window);
            return Ok(None);
        }

        let document = LeaderboardDocument {
            last_updated: generated_at,
            players: players.to_vec(),
        };
        let json = serde_json::to_string_pretty(&document)?;

        let path = self.path_for(window);
        write_atomic(&path, |writer| {
            writer.write_all(json.as_bytes())?;
            writeln!(writer)?;
            Ok(())
        })?;

        info!("Saved {} leaderboard to {:?}", window, path);
        Ok(Some(path))
    }
}
