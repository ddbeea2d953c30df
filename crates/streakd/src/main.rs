//! streakd - command-line front end for the streak engine
//!
//! Wires together:
//! - Configuration loading
//! - The SQLite activity log and the streak stores
//! - The streak service behind its async handle

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use streak_config::{load_config_or_default, StreakPolicy};
use streak_core::{CoreEvent, StreakHandle, StreakService};
use streak_store::{JsonHistoryFile, SqliteActivityLog, SqliteStore};
use streak_util::{default_config_path, format_duration, DayCutoff, LogicalDay, StreakError};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

/// streakd - daily activity streaks with freeze tokens
#[derive(Parser, Debug)]
#[command(name = "streakd")]
#[command(about = "Track a daily activity streak with freeze tokens", long_about = None)]
struct Args {
    /// Configuration file path (default: ~/.config/streak/config.toml)
    #[arg(short, long, default_value_os_t = default_config_path())]
    config: PathBuf,

    /// Data directory override (or set STREAK_DATA_DIR env var)
    #[arg(short, long, env = "STREAK_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Activity log database override
    #[arg(long)]
    activity_db: Option<PathBuf>,

    /// Log level
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Print machine-readable JSON where supported
    #[arg(long)]
    json: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show the current streak (default)
    Status,

    /// Import active days from the activity log
    Import {
        /// Re-scan the whole log instead of the days since the latest known one
        #[arg(long)]
        full: bool,
    },

    /// Re-derive the streak and freeze ledger from the active-day history
    Recalculate,

    /// Append an activity entry and check whether today was just completed
    Log {
        /// Time spent, in minutes
        #[arg(short, long)]
        minutes: f64,

        /// Category the entry is grouped under in day details
        #[arg(long, default_value = "default")]
        category: String,
    },

    /// Check whether today was just completed, without logging anything
    Record,

    /// Show entry counts and time spent for one day
    Day {
        /// Day as YYYY-MM-DD
        day: LogicalDay,
    },

    /// Grant freeze tokens dated today (bounded by the cap)
    Grant {
        #[arg(default_value_t = 1)]
        count: usize,
    },

    /// Cover an inactive day with a freeze token
    Consume {
        /// Day as YYYY-MM-DD
        day: LogicalDay,
    },

    /// Set the activity log's day cutoff (HH:MM or HH:MM:SS)
    Cutoff { cutoff: String },
}

/// Opened stores and the service handle
struct App {
    policy: StreakPolicy,
    activity_log: Arc<SqliteActivityLog>,
    handle: StreakHandle,
    json: bool,
}

impl App {
    fn open(args: &Args) -> Result<Self> {
        let mut policy = load_config_or_default(&args.config)
            .with_context(|| format!("Failed to load config from {:?}", args.config))?;

        if let Some(data_dir) = &args.data_dir {
            policy.service.relocate(data_dir.clone());
        }
        if let Some(activity_db) = &args.activity_db {
            policy.service.activity_db = activity_db.clone();
        }

        std::fs::create_dir_all(&policy.service.data_dir).with_context(|| {
            format!(
                "Failed to create data directory {:?}",
                policy.service.data_dir
            )
        })?;

        info!(
            config_path = %args.config.display(),
            data_dir = %policy.service.data_dir.display(),
            "Configuration loaded"
        );

        let activity_log = Arc::new(
            SqliteActivityLog::open(&policy.service.activity_db, policy.rules.default_cutoff)
                .with_context(|| {
                    format!("Failed to open activity log {:?}", policy.service.activity_db)
                })?,
        );

        let state_db = policy.service.state_db_path();
        let state_store = Arc::new(
            SqliteStore::open(&state_db)
                .with_context(|| format!("Failed to open state database {:?}", state_db))?,
        );
        let history_store = Arc::new(JsonHistoryFile::new(policy.service.history_path()));

        debug!(
            activity_db = %policy.service.activity_db.display(),
            state_db = %state_db.display(),
            "Stores opened"
        );

        let service = StreakService::open(
            policy.rules.clone(),
            activity_log.clone(),
            history_store,
            state_store,
        );

        Ok(Self {
            policy,
            activity_log,
            handle: StreakHandle::new(service),
            json: args.json,
        })
    }

    async fn run(self, command: Command) -> Result<()> {
        match command {
            Command::Status => self.status().await,
            Command::Import { full } => self.import(full).await,
            Command::Recalculate => self.recalculate().await,
            Command::Log { minutes, category } => self.log(minutes, &category).await,
            Command::Record => self.record().await,
            Command::Day { day } => self.day(day).await,
            Command::Grant { count } => self.grant(count).await,
            Command::Consume { day } => self.consume(day).await,
            Command::Cutoff { cutoff } => self.set_cutoff(&cutoff),
        }
    }

    async fn status(&self) -> Result<()> {
        let now = streak_util::now();
        let mut service = self.handle.service().lock().await;
        let state = service.snapshot();

        if self.json {
            println!("{}", serde_json::to_string_pretty(&state)?);
            return Ok(());
        }

        println!("Today:               {}", service.today(&now));
        println!("Active today:        {}", service.has_activity_today(&now));
        println!("Current streak:      {} days", state.current_streak_length);
        match state.last_active_day {
            Some(day) => println!("Last active day:     {}", day),
            None => println!("Last active day:     -"),
        }
        println!(
            "Freezes available:   {} of {}",
            state.earned_freeze_dates.len(),
            self.policy.rules.max_freezes
        );
        println!(
            "Next freeze in:      {} days",
            self.policy
                .rules
                .days_per_freeze
                .saturating_sub(state.days_since_last_freeze)
        );
        if !state.consumed_freeze_dates.is_empty() {
            let days: Vec<String> = state
                .consumed_freeze_dates
                .iter()
                .map(ToString::to_string)
                .collect();
            println!("Frozen days:         {}", days.join(", "));
        }
        Ok(())
    }

    async fn import(&self, full: bool) -> Result<()> {
        let imported = if full {
            self.handle.service().lock().await.import_full()?
        } else {
            self.handle.import().await?
        };
        println!("Imported {} new active days", imported);
        Ok(())
    }

    async fn recalculate(&self) -> Result<()> {
        let mut events = self.handle.subscribe();
        let printer = tokio::spawn(async move {
            while let Ok(event) = events.recv().await {
                match event {
                    CoreEvent::HistoryImported { imported, total_days } => {
                        info!(imported, total_days, "History imported");
                    }
                    CoreEvent::RecalculationProgress {
                        days_done,
                        days_total,
                        ..
                    } => {
                        debug!(days_done, days_total, "Recalculating");
                    }
                    CoreEvent::RecalculationFinished { .. }
                    | CoreEvent::RecalculationCancelled { .. }
                    | CoreEvent::RecalculationFailed { .. } => break,
                    _ => {}
                }
            }
        });

        let task = self.handle.recalculate();
        let cancel = self.handle.clone();
        let result = tokio::select! {
            result = task.wait() => result,
            _ = tokio::signal::ctrl_c() => {
                warn!("Interrupted, cancelling recalculation");
                cancel.cancel_recalculation();
                Err(StreakError::Cancelled)
            }
        };
        let _ = printer.await;

        match result {
            Ok(state) => {
                println!(
                    "Streak: {} days, freezes available: {}, last active: {}",
                    state.current_streak_length,
                    state.earned_freeze_dates.len(),
                    state
                        .last_active_day
                        .map(|d| d.to_string())
                        .unwrap_or_else(|| "-".into())
                );
                Ok(())
            }
            Err(StreakError::Cancelled) => {
                println!("Recalculation cancelled; previous streak kept");
                Ok(())
            }
            Err(e) => Err(e).context("Recalculation failed"),
        }
    }

    async fn log(&self, minutes: f64, category: &str) -> Result<()> {
        if !minutes.is_finite() || minutes < 0.0 {
            anyhow::bail!("Minutes must be a non-negative number, got {}", minutes);
        }
        let now = streak_util::now();
        let duration = Duration::from_millis((minutes * 60_000.0).round() as u64);

        let id = self
            .activity_log
            .append(now, duration, category)
            .context("Failed to append activity")?;
        println!("Logged {} of {} (entry {})", format_duration(duration), category, id);

        self.report_completion(now).await
    }

    async fn record(&self) -> Result<()> {
        self.report_completion(streak_util::now()).await
    }

    async fn report_completion(&self, now: chrono::DateTime<chrono::Local>) -> Result<()> {
        let completion = self.handle.record_and_check(now).await?;
        if self.json {
            println!("{}", serde_json::to_string(&completion)?);
            return Ok(());
        }
        if let Some(day) = completion.day {
            println!(
                "Day completed: {} ({} -> {} active days)",
                day, completion.before, completion.after
            );
        } else {
            debug!("No new day completed");
        }
        Ok(())
    }

    async fn day(&self, day: LogicalDay) -> Result<()> {
        let service = self.handle.service().lock().await;
        let details = service.get_review_details_for_day(day);
        let active = service.get_active_days().contains(&day);

        if self.json {
            let value: Vec<serde_json::Value> = details
                .iter()
                .map(|c| {
                    serde_json::json!({
                        "category": c.category,
                        "count": c.count,
                        "time_spent_ms": c.total_duration.as_millis() as u64,
                    })
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&value)?);
            return Ok(());
        }

        let total: u64 = details.iter().map(|c| c.count).sum();
        println!("{}: {} entries{}", day, total, if active { " (active)" } else { "" });
        for stats in &details {
            println!(
                "  {:<24} {:>5}  {}",
                stats.category,
                stats.count,
                format_duration(stats.total_duration)
            );
        }
        Ok(())
    }

    async fn grant(&self, count: usize) -> Result<()> {
        let granted = self.handle.grant_freezes(count, streak_util::now()).await?;
        let available = self
            .handle
            .service()
            .lock()
            .await
            .get_streak_freezes_available();
        println!("Granted {} freezes ({} available)", granted, available);
        Ok(())
    }

    async fn consume(&self, day: LogicalDay) -> Result<()> {
        if self.handle.consume_freeze(day).await? {
            println!("{} covered by a freeze", day);
        } else {
            println!("No freeze available to cover {}", day);
        }
        Ok(())
    }

    fn set_cutoff(&self, cutoff: &str) -> Result<()> {
        let cutoff = DayCutoff::parse(cutoff).map_err(anyhow::Error::msg)?;
        self.activity_log
            .set_day_cutoff(cutoff)
            .context("Failed to store day cutoff")?;
        println!("Day cutoff set to {}", cutoff);
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    info!(version = env!("CARGO_PKG_VERSION"), "streakd starting");
    if streak_util::is_mock_time_active() {
        warn!("Mock time is active");
    }

    let app = App::open(&args)?;
    app.run(args.command.unwrap_or(Command::Status)).await
}
