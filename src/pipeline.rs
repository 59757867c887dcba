//! Run orchestrator.
//!
//! One run, strictly in order:
//! 1. Fetch and classify the current war
//! 2. Under the workbook lock: skip completed wars, otherwise normalize with
//!    the stored loot markings, upsert, and rebuild the derived views
//! 3. Post a war summary if the war just ended
//! 4. Regenerate and export every leaderboard window

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{error, info, warn};

use crate::calculate::{build_leaderboard, build_missed_hits, build_roster, LeaderboardOptions};
use crate::config::AppConfig;
use crate::fetch::{classify, WarClassification, WarSource};
use crate::models::{LeaderboardWindow, LootAnnotations, WarId, WarSnapshot};
use crate::normalize::{normalize_war, NormalizedWar};
use crate::publish::{LeaderboardExporter, WarNotifier};
use crate::storage::{StorageConfig, StorageError, StoreLock, WarRecordStore};

/// Errors that end a run.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

/// What happened to the fetched war.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WarUpdate {
    /// Fetch failed; stored data is used as-is
    FetchFailed(String),
    NotInWar,
    LeagueWarSkipped,
    /// Stored copy is complete and was left untouched
    AlreadyComplete(WarId),
    Saved { war_id: WarId, ended: bool },
}

/// Summary of one run.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub update: WarUpdate,
    pub notification_sent: bool,
    /// Windows whose leaderboard was exported
    pub boards_written: Vec<LeaderboardWindow>,
}

/// Everything a run needs, built from [`AppConfig`].
pub struct Orchestrator {
    config: AppConfig,
    source: Arc<dyn WarSource>,
    store: WarRecordStore,
    storage: StorageConfig,
    exporter: LeaderboardExporter,
    notifier: Option<Arc<dyn WarNotifier>>,
}

impl Orchestrator {
    pub fn new(
        config: AppConfig,
        source: Arc<dyn WarSource>,
        notifier: Option<Arc<dyn WarNotifier>>,
    ) -> Self {
        let storage = StorageConfig::new(config.data_dir.clone());
        Self {
            store: WarRecordStore::open(&storage),
            exporter: LeaderboardExporter::from_config(&config.leaderboard),
            storage,
            config,
            source,
            notifier,
        }
    }

    pub fn store(&self) -> &WarRecordStore {
        &self.store
    }

    /// Leaderboard windows in export order, all-time first.
    pub fn windows(&self) -> Vec<LeaderboardWindow> {
        std::iter::once(LeaderboardWindow::AllTime)
            .chain(
                self.config
                    .leaderboard
                    .windows
                    .iter()
                    .map(|&days| LeaderboardWindow::Days(days)),
            )
            .collect()
    }

    /// Execute one full run.
    pub async fn run_once(&self, now: DateTime<Utc>) -> Result<RunReport, RunError> {
        let (update, saved) = match self.source.current_war().await {
            Ok(war) => self.update_war(&war, now)?,
            Err(e) => {
                error!("Failed to fetch current war: {}", e);
                (WarUpdate::FetchFailed(e.to_string()), None)
            }
        };

        let mut notification_sent = false;
        if let (Some((war, normalized)), Some(notifier)) = (&saved, &self.notifier) {
            if normalized.is_ended {
                match notifier.notify_war_ended(war, &normalized.records, now).await {
                    Ok(()) => notification_sent = true,
                    Err(e) => error!("Failed to send war report: {}", e),
                }
            }
        }

        let boards_written = self.publish_leaderboards(now);

        Ok(RunReport {
            update,
            notification_sent,
            boards_written,
        })
    }

    /// Classify and store a fetched war. Returns the normalized war when it
    /// was written.
    fn update_war(
        &self,
        war: &WarSnapshot,
        now: DateTime<Utc>,
    ) -> Result<(WarUpdate, Option<(WarSnapshot, NormalizedWar)>), RunError> {
        info!("War state: {}", war.state());

        match classify(war) {
            WarClassification::NotInWar => {
                info!("Clan is not currently in war");
                return Ok((WarUpdate::NotInWar, None));
            }
            WarClassification::LeagueWar => {
                info!("League war, skipping (league wars are not tracked)");
                return Ok((WarUpdate::LeagueWarSkipped, None));
            }
            WarClassification::InProgress | WarClassification::Ended => {}
        }

        let war_id = war.war_id(now);
        info!("War ID: {}", war_id);

        let _lock = StoreLock::acquire(
            &self.storage.lock_path(),
            Duration::from_secs(self.config.lock_stale_seconds),
        )?;

        let presence = self.store.exists(&war_id)?;
        if presence.complete {
            info!("War {} is already complete, skipping update", war_id);
            return Ok((WarUpdate::AlreadyComplete(war_id), None));
        }

        let annotations = if self.config.preserve_loot_markings {
            self.store.loot_annotations(&war_id)?
        } else {
            LootAnnotations::new()
        };
        if !annotations.is_empty() {
            info!("Reapplying {} loot hit marking(s)", annotations.len());
        }

        let normalized = normalize_war(war, &annotations, now);
        if normalized.is_ended {
            info!("War has ended, saving complete war data");
        } else {
            info!("War in progress, saving current state");
        }

        self.store.upsert(&normalized.war_id, &normalized.records)?;
        self.rebuild_views()?;

        let update = WarUpdate::Saved {
            war_id: normalized.war_id.clone(),
            ended: normalized.is_ended,
        };
        Ok((update, Some((war.clone(), normalized))))
    }

    /// Rebuild the roster and missed-hits sheets from every stored war.
    pub fn rebuild_views(&self) -> Result<(), StorageError> {
        let wars = self.store.scan_wars()?;
        let total_wars = self.store.war_ids()?.len();

        let roster = build_roster(&wars, total_wars, self.config.leaderboard.participation);
        self.store.write_roster(&roster)?;
        info!("Updated roster with {} players", roster.len());

        let missed = build_missed_hits(&wars);
        self.store.write_missed_hits(&missed)?;
        info!("Updated missed hits with {} missed attacks", missed.len());

        Ok(())
    }

    /// Compute and export every window. Failures are logged per window.
    pub fn publish_leaderboards(&self, now: DateTime<Utc>) -> Vec<LeaderboardWindow> {
        let wars = match self.store.scan_complete_wars() {
            Ok(wars) => wars,
            Err(e) => {
                error!("Failed to read workbook for leaderboards: {}", e);
                return Vec::new();
            }
        };

        let mut written = Vec::new();
        for window in self.windows() {
            let options = LeaderboardOptions {
                window,
                expected_attacks_per_war: self.config.leaderboard.expected_attacks_per_war,
            };
            let board = build_leaderboard(&wars, &options, now);

            match self.exporter.export(window, &board, now) {
                Ok(Some(_)) => written.push(window),
                Ok(None) => {}
                Err(e) => warn!("Failed to export {} leaderboard: {}", window, e),
            }
        }
        written
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::FetchError;
    use crate::models::{AttackRecord, WarAttack, WarClan, WarLeague, WarMember};
    use crate::publish::PublishError;
    use async_trait::async_trait;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;
    use std::sync::Mutex;
    use tempfile::TempDir;

    const PREP: &str = "2024-01-01T00:00:00.000Z";

    /// Serves queued snapshots, then transport errors.
    struct ScriptedSource {
        wars: Mutex<Vec<Result<WarSnapshot, String>>>,
    }

    impl ScriptedSource {
        fn new(wars: Vec<Result<WarSnapshot, String>>) -> Arc<Self> {
            let mut wars = wars;
            wars.reverse();
            Arc::new(Self {
                wars: Mutex::new(wars),
            })
        }
    }

    #[async_trait]
    impl WarSource for ScriptedSource {
        async fn current_war(&self) -> Result<WarSnapshot, FetchError> {
            let next = self
                .wars
                .lock()
                .unwrap()
                .pop()
                .unwrap_or_else(|| Err("no more snapshots".to_string()));
            next.map_err(|message| FetchError::HttpStatus {
                status: 503,
                message,
            })
        }
    }

    /// Records every summary it is asked to send; optionally fails each one.
    #[derive(Default)]
    struct RecordingNotifier {
        fail: bool,
        sent: Mutex<Vec<(Option<String>, usize, DateTime<Utc>)>>,
    }

    impl RecordingNotifier {
        fn failing() -> Arc<Self> {
            Arc::new(Self {
                fail: true,
                ..Default::default()
            })
        }

        fn sent(&self) -> Vec<(Option<String>, usize, DateTime<Utc>)> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl WarNotifier for RecordingNotifier {
        async fn notify_war_ended(
            &self,
            war: &WarSnapshot,
            records: &[AttackRecord],
            now: DateTime<Utc>,
        ) -> Result<(), PublishError> {
            self.sent
                .lock()
                .unwrap()
                .push((war.state.clone(), records.len(), now));
            if self.fail {
                return Err(PublishError::WebhookStatus {
                    status: 500,
                    body: "boom".to_string(),
                });
            }
            Ok(())
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 3, 0, 0, 0).unwrap()
    }

    fn attack(stars: u8, destruction: f64) -> WarAttack {
        WarAttack {
            stars: Some(stars),
            destruction_percentage: Some(destruction),
            ..Default::default()
        }
    }

    fn member(tag: &str, name: &str, attacks: Vec<WarAttack>) -> WarMember {
        WarMember {
            tag: Some(tag.to_string()),
            name: Some(name.to_string()),
            townhall_level: Some(15),
            map_position: Some(1),
            attacks,
        }
    }

    fn snapshot(state: &str, members: Vec<WarMember>) -> WarSnapshot {
        WarSnapshot {
            state: Some(state.to_string()),
            team_size: Some(5),
            preparation_start_time: Some(PREP.to_string()),
            end_time: Some("20240102T000000.000Z".to_string()),
            clan: WarClan {
                name: Some("Turtles".to_string()),
                stars: Some(5),
                members,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    fn test_config(temp_dir: &TempDir) -> AppConfig {
        let mut config = AppConfig {
            data_dir: temp_dir.path().join("data"),
            ..AppConfig::default()
        };
        config.leaderboard.output_dir = temp_dir.path().join("site");
        config
    }

    fn orchestrator(temp_dir: &TempDir, wars: Vec<Result<WarSnapshot, String>>) -> Orchestrator {
        Orchestrator::new(test_config(temp_dir), ScriptedSource::new(wars), None)
    }

    #[tokio::test]
    async fn test_in_progress_war_saved() {
        let temp_dir = TempDir::new().unwrap();
        let war = snapshot(
            "inWar",
            vec![member("#P", "Player", vec![attack(3, 100.0), attack(0, 0.0)])],
        );
        let orch = orchestrator(&temp_dir, vec![Ok(war)]);

        let report = orch.run_once(now()).await.unwrap();

        let war_id = WarId::from(PREP);
        assert_eq!(
            report.update,
            WarUpdate::Saved {
                war_id: war_id.clone(),
                ended: false
            }
        );
        assert_eq!(orch.store().read_war(&war_id).unwrap().len(), 2);
        assert_eq!(orch.store().read_roster().unwrap().len(), 1);
        // Incomplete wars never reach the missed-hits view or leaderboards
        assert!(orch.store().read_missed_hits().unwrap().is_empty());
        assert!(report.boards_written.is_empty());
        assert!(!report.notification_sent);
    }

    #[tokio::test]
    async fn test_loot_marking_survives_refetch() {
        let temp_dir = TempDir::new().unwrap();
        let war = snapshot(
            "inWar",
            vec![member("#P", "Player", vec![attack(3, 100.0), attack(1, 40.0)])],
        );
        let orch = orchestrator(&temp_dir, vec![Ok(war.clone()), Ok(war)]);
        let war_id = WarId::from(PREP);

        orch.run_once(now()).await.unwrap();
        assert!(orch.store().set_loot_hit(&war_id, "#P", 2, true).unwrap());
        let before = orch.store().read_war(&war_id).unwrap();

        orch.run_once(now()).await.unwrap();
        let after = orch.store().read_war(&war_id).unwrap();

        assert_eq!(before, after);
        assert!(after[1].is_loot_hit);
        assert!(!after[0].is_loot_hit);
    }

    #[tokio::test]
    async fn test_loot_marking_dropped_when_preservation_disabled() {
        let temp_dir = TempDir::new().unwrap();
        let war = snapshot("inWar", vec![member("#P", "Player", vec![attack(3, 100.0)])]);
        let mut config = test_config(&temp_dir);
        config.preserve_loot_markings = false;
        let orch = Orchestrator::new(
            config,
            ScriptedSource::new(vec![Ok(war.clone()), Ok(war)]),
            None,
        );
        let war_id = WarId::from(PREP);

        orch.run_once(now()).await.unwrap();
        orch.store().set_loot_hit(&war_id, "#P", 1, true).unwrap();
        orch.run_once(now()).await.unwrap();

        assert!(!orch.store().read_war(&war_id).unwrap()[0].is_loot_hit);
    }

    #[tokio::test]
    async fn test_completed_war_never_overwritten() {
        let temp_dir = TempDir::new().unwrap();
        let ended = snapshot("warEnded", vec![member("#P", "Player", vec![attack(3, 100.0)])]);
        let mut changed = ended.clone();
        changed.clan.members[0].attacks[0] = attack(1, 20.0);
        let orch = orchestrator(&temp_dir, vec![Ok(ended), Ok(changed)]);
        let war_id = WarId::from(PREP);

        let first = orch.run_once(now()).await.unwrap();
        assert_eq!(
            first.update,
            WarUpdate::Saved {
                war_id: war_id.clone(),
                ended: true
            }
        );
        let stored = orch.store().read_war(&war_id).unwrap();

        let second = orch.run_once(now()).await.unwrap();
        assert_eq!(second.update, WarUpdate::AlreadyComplete(war_id.clone()));
        assert_eq!(orch.store().read_war(&war_id).unwrap(), stored);
    }

    #[tokio::test]
    async fn test_ended_war_feeds_leaderboards() {
        let temp_dir = TempDir::new().unwrap();
        let ended = snapshot(
            "warEnded",
            vec![
                member("#P", "Player", vec![attack(3, 100.0), attack(0, 0.0)]),
                member("#I", "Idle", vec![]),
            ],
        );
        let orch = orchestrator(&temp_dir, vec![Ok(ended)]);

        let report = orch.run_once(now()).await.unwrap();

        assert_eq!(
            report.boards_written,
            vec![
                LeaderboardWindow::AllTime,
                LeaderboardWindow::Days(7),
                LeaderboardWindow::Days(30),
                LeaderboardWindow::Days(90),
            ]
        );
        let path = temp_dir.path().join("site").join("leaderboard_all.json");
        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap();
        let players = value["players"].as_array().unwrap();
        assert_eq!(players[0]["Player Tag"], "#P");
        assert_eq!(players[0]["Missed Hits"], 1);
        assert_eq!(players[1]["Player Tag"], "#I");
        assert_eq!(players[1]["Missed Hits"], 2);

        let missed = orch.store().read_missed_hits().unwrap();
        assert_eq!(missed.len(), 2);
    }

    #[tokio::test]
    async fn test_league_war_not_stored() {
        let temp_dir = TempDir::new().unwrap();
        let mut war = snapshot("inWar", vec![member("#P", "Player", vec![attack(3, 100.0)])]);
        war.war_league = Some(WarLeague {
            name: Some("Crystal League I".to_string()),
        });
        let orch = orchestrator(&temp_dir, vec![Ok(war)]);

        let report = orch.run_once(now()).await.unwrap();

        assert_eq!(report.update, WarUpdate::LeagueWarSkipped);
        assert!(orch.store().war_ids().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_not_in_war() {
        let temp_dir = TempDir::new().unwrap();
        let orch = orchestrator(&temp_dir, vec![Ok(snapshot("notInWar", vec![]))]);

        let report = orch.run_once(now()).await.unwrap();
        assert_eq!(report.update, WarUpdate::NotInWar);
    }

    #[tokio::test]
    async fn test_fetch_failure_still_publishes_stored_data() {
        let temp_dir = TempDir::new().unwrap();
        let ended = snapshot("warEnded", vec![member("#P", "Player", vec![attack(3, 100.0)])]);
        let orch = orchestrator(
            &temp_dir,
            vec![Ok(ended), Err("service unavailable".to_string())],
        );

        orch.run_once(now()).await.unwrap();
        std::fs::remove_dir_all(temp_dir.path().join("site")).unwrap();

        let report = orch.run_once(now()).await.unwrap();

        assert!(matches!(report.update, WarUpdate::FetchFailed(_)));
        assert!(report.boards_written.contains(&LeaderboardWindow::AllTime));
    }

    #[tokio::test]
    async fn test_locked_workbook_ends_run() {
        let temp_dir = TempDir::new().unwrap();
        let war = snapshot("inWar", vec![member("#P", "Player", vec![attack(3, 100.0)])]);
        let orch = orchestrator(&temp_dir, vec![Ok(war)]);

        let storage = StorageConfig::new(temp_dir.path().join("data"));
        let _held = StoreLock::acquire(&storage.lock_path(), Duration::from_secs(600)).unwrap();

        let result = orch.run_once(now()).await;

        assert!(matches!(
            result,
            Err(RunError::Storage(StorageError::Locked(_)))
        ));
        assert!(orch.store().war_ids().unwrap().is_empty());
    }

    #[test]
    fn test_windows_all_time_first() {
        let temp_dir = TempDir::new().unwrap();
        let orch = orchestrator(&temp_dir, vec![]);

        assert_eq!(orch.windows()[0], LeaderboardWindow::AllTime);
        assert_eq!(orch.windows().len(), 4);
    }

    fn notifying_orchestrator(
        temp_dir: &TempDir,
        wars: Vec<Result<WarSnapshot, String>>,
        notifier: Arc<RecordingNotifier>,
    ) -> Orchestrator {
        Orchestrator::new(
            test_config(temp_dir),
            ScriptedSource::new(wars),
            Some(notifier as Arc<dyn WarNotifier>),
        )
    }

    #[tokio::test]
    async fn test_war_end_reported_once() {
        let temp_dir = TempDir::new().unwrap();
        let ended = snapshot(
            "warEnded",
            vec![member("#P", "Player", vec![attack(3, 100.0), attack(2, 80.0)])],
        );
        let notifier = Arc::new(RecordingNotifier::default());
        let orch = notifying_orchestrator(
            &temp_dir,
            vec![Ok(ended.clone()), Ok(ended)],
            notifier.clone(),
        );

        let first = orch.run_once(now()).await.unwrap();
        let second = orch.run_once(now()).await.unwrap();

        assert!(first.notification_sent);
        assert!(!second.notification_sent);
        assert!(matches!(second.update, WarUpdate::AlreadyComplete(_)));
        assert_eq!(
            notifier.sent(),
            vec![(Some("warEnded".to_string()), 2, now())]
        );
    }

    #[tokio::test]
    async fn test_in_progress_war_not_reported() {
        let temp_dir = TempDir::new().unwrap();
        let live = snapshot("inWar", vec![member("#P", "Player", vec![attack(3, 100.0)])]);
        let notifier = Arc::new(RecordingNotifier::default());
        let orch = notifying_orchestrator(&temp_dir, vec![Ok(live)], notifier.clone());

        let report = orch.run_once(now()).await.unwrap();

        assert!(!report.notification_sent);
        assert!(notifier.sent().is_empty());
    }

    #[tokio::test]
    async fn test_report_failure_does_not_fail_run() {
        let temp_dir = TempDir::new().unwrap();
        let ended = snapshot("warEnded", vec![member("#P", "Player", vec![attack(3, 100.0)])]);
        let notifier = RecordingNotifier::failing();
        let orch = notifying_orchestrator(&temp_dir, vec![Ok(ended)], notifier.clone());

        let report = orch.run_once(now()).await.unwrap();

        assert_eq!(notifier.sent().len(), 1);
        assert!(!report.notification_sent);
        assert_eq!(
            report.update,
            WarUpdate::Saved {
                war_id: WarId::from(PREP),
                ended: true
            }
        );
        assert!(report.boards_written.contains(&LeaderboardWindow::AllTime));
    }

    #[tokio::test]
    async fn test_roster_counts_empty_war_sets() {
        let temp_dir = TempDir::new().unwrap();
        let live = snapshot("inWar", vec![member("#P", "Player", vec![attack(3, 100.0)])]);
        let orch = orchestrator(&temp_dir, vec![Ok(live)]);
        orch.store().upsert(&WarId::from("empty-war"), &[]).unwrap();

        orch.run_once(now()).await.unwrap();

        let roster = orch.store().read_roster().unwrap();
        assert_eq!(roster.len(), 1);
        assert_eq!(roster[0].total_wars, 2);
    }
}
