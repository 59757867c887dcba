use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use war_tracker::calculate::{build_leaderboard, LeaderboardOptions};
use war_tracker::config::AppConfig;
use war_tracker::fetch::WarClient;
use war_tracker::parse_window;
use war_tracker::pipeline::{Orchestrator, WarUpdate};
use war_tracker::publish::{LeaderboardExporter, WarNotifier, WebhookNotifier};
use war_tracker::storage::{StorageConfig, StoreLock, WarRecordStore};
use war_tracker::WarId;

#[derive(Parser)]
#[command(name = "war-tracker")]
#[command(about = "Clan war attack tracker and leaderboard publisher")]
#[command(version)]
struct Cli {
    /// Path to configuration file
    #[arg(long, default_value = "./config.toml")]
    config: String,

    /// Data directory path (overrides the config file)
    #[arg(long)]
    data_dir: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,

    /// Output logs as JSON
    #[arg(long)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch the current war, update the workbook and publish leaderboards
    Run,

    /// Print a leaderboard from stored wars
    Leaderboard {
        /// Window: "all", or days such as "7d" or "30"
        #[arg(long, default_value = "all")]
        window: String,

        /// Also write the JSON file for this window
        #[arg(long)]
        export: bool,
    },

    /// Print the roster view
    Roster,

    /// Print the missed-hits view
    MissedHits {
        /// Max rows to print
        #[arg(long, default_value = "50")]
        limit: usize,
    },

    /// Mark (or clear) an attack as a loot hit
    MarkLoot {
        /// War ID (sheet name)
        #[arg(long)]
        war: String,

        /// Player tag, e.g. "#ABC123"
        #[arg(long)]
        tag: String,

        /// Attack number (1-based)
        #[arg(long)]
        attack: u32,

        /// Clear the marking instead of setting it
        #[arg(long)]
        clear: bool,
    },

    /// List stored wars
    Sheets,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = AppConfig::load(&PathBuf::from(&cli.config))
        .with_context(|| format!("Failed to load config from {}", cli.config))?;
    if let Some(data_dir) = &cli.data_dir {
        config.data_dir = PathBuf::from(data_dir);
    }
    let log_level = cli.log_level.clone().unwrap_or_else(|| config.log_level.clone());

    // Initialize tracing
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log_level));

    if cli.json_logs {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    tracing::info!("Starting war-tracker v{}", env!("CARGO_PKG_VERSION"));

    let storage = StorageConfig::new(config.data_dir.clone());

    match cli.command {
        Commands::Run => {
            config.validate_for_fetch()?;

            let client = WarClient::new(&config.api).context("Failed to create API client")?;
            let notifier = WebhookNotifier::from_config(&config.notify)
                .context("Failed to create webhook notifier")?
                .map(|n| Arc::new(n) as Arc<dyn WarNotifier>);
            let orchestrator = Orchestrator::new(config, Arc::new(client), notifier);

            let report = orchestrator.run_once(Utc::now()).await?;

            println!("\n=== Run Results ===");
            match &report.update {
                WarUpdate::FetchFailed(e) => println!("War:           fetch failed ({})", e),
                WarUpdate::NotInWar => println!("War:           not in war"),
                WarUpdate::LeagueWarSkipped => println!("War:           league war, skipped"),
                WarUpdate::AlreadyComplete(id) => println!("War:           {} (already complete)", id),
                WarUpdate::Saved { war_id, ended } => println!(
                    "War:           {} ({})",
                    war_id,
                    if *ended { "ended" } else { "in progress" }
                ),
            }
            println!(
                "Notification:  {}",
                if report.notification_sent { "sent" } else { "not sent" }
            );
            println!("Leaderboards:  {}", report.boards_written.len());
        }

        Commands::Leaderboard { window, export } => {
            let Some(window) = parse_window(&window) else {
                bail!("Invalid window '{}' (use \"all\", \"7d\", \"30\", ...)", window);
            };

            let store = WarRecordStore::open(&storage);
            let wars = store.scan_complete_wars()?;
            let now = Utc::now();
            let options = LeaderboardOptions {
                window,
                expected_attacks_per_war: config.leaderboard.expected_attacks_per_war,
            };
            let board = build_leaderboard(&wars, &options, now);

            println!("\n=== Leaderboard: {} ===", window);
            if board.is_empty() {
                println!("No completed wars in this window.");
            } else {
                println!(
                    "{:<4} {:<20} {:<12} {:>7} {:>6} {:>5} {:>6} {:>6}",
                    "#", "Player", "Tag", "3*", "Avg", "Wars", "Stars", "Missed"
                );
                for (rank, entry) in board.iter().enumerate() {
                    println!(
                        "{:<4} {:<20} {:<12} {:>7} {:>6.2} {:>5} {:>6} {:>6}",
                        rank + 1,
                        entry.player_name,
                        entry.player_tag,
                        entry.three_star_rate,
                        entry.avg_stars_per_attack,
                        entry.total_wars,
                        entry.total_stars,
                        entry.missed_hits,
                    );
                }
            }

            if export {
                let exporter = LeaderboardExporter::from_config(&config.leaderboard);
                match exporter.export(window, &board, now)? {
                    Some(path) => println!("\nWrote {}", path.display()),
                    None => println!("\nNothing to export."),
                }
            }
        }

        Commands::Roster => {
            let store = WarRecordStore::open(&storage);
            let roster = store.read_roster()?;

            println!("\n=== Roster ({} players) ===", roster.len());
            for entry in &roster {
                println!(
                    "{:<20} {:<12} TH{:<3} {:>3}/{:<3} wars",
                    entry.player_name,
                    entry.player_tag,
                    entry.town_hall,
                    entry.wars_participated,
                    entry.total_wars,
                );
            }
        }

        Commands::MissedHits { limit } => {
            let store = WarRecordStore::open(&storage);
            let missed = store.read_missed_hits()?;

            println!("\n=== Missed Hits ({} total) ===", missed.len());
            for entry in missed.iter().take(limit) {
                let attack = if entry.attack_number == 0 {
                    "no attack".to_string()
                } else {
                    format!("attack {}", entry.attack_number)
                };
                println!(
                    "{:<24} {:<20} {:<12} {}",
                    entry.war_id, entry.player_name, entry.player_tag, attack
                );
            }
            if missed.len() > limit {
                println!("... and {} more", missed.len() - limit);
            }
        }

        Commands::MarkLoot {
            war,
            tag,
            attack,
            clear,
        } => {
            let _lock = StoreLock::acquire(
                &storage.lock_path(),
                std::time::Duration::from_secs(config.lock_stale_seconds),
            )?;
            let store = WarRecordStore::open(&storage);
            let war_id = WarId::from(war.as_str());

            if store.set_loot_hit(&war_id, &tag, attack, !clear)? {
                println!(
                    "{} {} attack {} in war {}",
                    if clear { "Cleared loot hit on" } else { "Marked loot hit on" },
                    tag,
                    attack,
                    war_id
                );
            } else {
                bail!("No attack {} for {} in war {}", attack, tag, war_id);
            }
        }

        Commands::Sheets => {
            let store = WarRecordStore::open(&storage);
            let war_ids = store.war_ids()?;

            println!("\n=== Stored Wars ({}) ===", war_ids.len());
            for war_id in &war_ids {
                let records = store.read_war(war_id).unwrap_or_default();
                let complete = records.first().is_some_and(|r| r.war_complete);
                println!(
                    "{:<32} {:>4} rows  {}",
                    war_id,
                    records.len(),
                    if complete { "complete" } else { "in progress" }
                );
            }
        }
    }

    Ok(())
}
