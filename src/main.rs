use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::Context;
use chrono::{DateTime, NaiveDate, Utc};
use clap::{Parser, Subcommand};
use sqlx::SqlitePool;
use tracing_subscriber::EnvFilter;

mod cache;
mod client;
mod config;
mod db;
mod error;
mod grades;
mod groups;
mod models;
mod overview;
mod reconcile;
mod report;
mod scroll;
mod semester;
mod service;
mod session;

use cache::ScheduleCache;
use client::ApiClient;
use config::{Config, ConfigArgs};
use models::{Credentials, ScheduleResponse, UserInfo};
use scroll::{Pager, ScrollSync};
use service::ScheduleService;

#[derive(Parser)]
#[command(name = "student-id")]
#[command(about = "Schedule, grades and profile from the university information system", long_about = None)]
struct Cli {
    #[command(flatten)]
    config: ConfigArgs,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the local store
    InitDb,
    /// Sign in with university credentials
    Login {
        #[arg(long)]
        username: String,
        #[arg(long, env = "STUDENT_ID_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Forget the saved session
    Logout,
    /// Show the current week of the schedule
    Schedule {
        /// Group to show instead of the signed-in student's
        #[arg(long)]
        group: Option<String>,
        #[arg(long, default_value_t = config::MAX_CONTENT_WIDTH)]
        viewport_width: f64,
        /// Select this day (YYYY-MM-DD) instead of the computed one
        #[arg(long)]
        day: Option<NaiveDate>,
        /// Day pager scroll offsets to replay, in order
        #[arg(long, allow_hyphen_values = true)]
        scroll_x: Vec<f64>,
        /// Week strip scroll offsets to replay after the day pager ones
        #[arg(long, allow_hyphen_values = true)]
        week_x: Vec<f64>,
        /// Reload this many extra times
        #[arg(long, default_value_t = 0)]
        follow: u32,
        #[arg(long, default_value_t = 5)]
        interval_secs: u64,
    },
    /// Lessons for today, tomorrow and the day after, plus upcoming exams
    Today {
        #[arg(long)]
        group: Option<String>,
    },
    /// Grades per semester
    Marks {
        #[arg(long)]
        semester: Option<i32>,
    },
    /// Search the list of study groups
    Groups {
        #[arg(long, default_value = "")]
        search: String,
    },
    /// Load a schedule payload saved from the API into the cache
    Import {
        #[arg(long)]
        json: PathBuf,
    },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Advances an overridden clock with wall time so `--follow` still ages the cache.
fn clock(config: &Config, started: Instant) -> DateTime<Utc> {
    match config.now_override {
        Some(base) => {
            let elapsed = chrono::Duration::from_std(started.elapsed())
                .unwrap_or_else(|_| chrono::Duration::zero());
            base + elapsed
        }
        None => Utc::now(),
    }
}

async fn signed_in_user(
    pool: &SqlitePool,
    client: &ApiClient,
    config: &Config,
) -> anyhow::Result<UserInfo> {
    config.require_oauth_url()?;
    let token = session::access_token(pool, client, config.now().timestamp_millis()).await?;
    session::current_user(client, &token).await
}

async fn resolve_group(
    pool: &SqlitePool,
    client: &ApiClient,
    config: &Config,
    group: Option<String>,
) -> anyhow::Result<String> {
    if let Some(group) = group {
        return Ok(group);
    }
    let user = signed_in_user(pool, client, config).await?;
    if user.group_name.is_empty() {
        anyhow::bail!("the signed-in account has no study group, pass --group");
    }
    Ok(user.group_name)
}

/// Group to show plus the name to greet. With an explicit group the session
/// is only consulted for the greeting and may be absent.
async fn resolve_viewer(
    pool: &SqlitePool,
    client: &ApiClient,
    config: &Config,
    group: Option<String>,
) -> anyhow::Result<(String, String)> {
    let Some(group) = group else {
        let user = signed_in_user(pool, client, config).await?;
        if user.group_name.is_empty() {
            anyhow::bail!("the signed-in account has no study group, pass --group");
        }
        return Ok((user.group_name, user.first_name));
    };

    if config.oauth_url.is_empty() {
        return Ok((group, String::new()));
    }
    let first_name = match signed_in_user(pool, client, config).await {
        Ok(user) => user.first_name,
        Err(e) => {
            tracing::debug!("greeting without a name: {e:#}");
            String::new()
        }
    };
    Ok((group, first_name))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let config = Config::from_args(&cli.config)?;

    let pool = db::connect(&config.database_url).await?;
    db::init_db(&pool)
        .await
        .context("failed to prepare the local store")?;

    let cache = ScheduleCache::new(pool.clone(), config.cache_ttl, config.request_limit);
    let client = ApiClient::new(&config)?;

    match cli.command {
        Commands::InitDb => {
            println!("Local store ready.");
        }
        Commands::Login { username, password } => {
            config.require_oauth_url()?;
            let tokens = client
                .login(&Credentials { username, password })
                .await
                .context("sign-in failed")?;
            session::save_tokens(&pool, tokens, config.now().timestamp_millis()).await?;
            println!("Signed in.");
        }
        Commands::Logout => {
            if session::clear(&pool).await? {
                println!("Signed out.");
            } else {
                println!("No saved session.");
            }
        }
        Commands::Schedule {
            group,
            viewport_width,
            day,
            scroll_x,
            week_x,
            follow,
            interval_secs,
        } => {
            let group = resolve_group(&pool, &client, &config, group).await?;
            config.require_api_url()?;
            let service = ScheduleService::new(&client, &cache);
            let metrics = config.page.with_viewport(viewport_width);
            let started = Instant::now();
            let mut pending = Vec::new();
            let mut sync: Option<ScrollSync> = None;

            for round in 0..=follow {
                if round > 0 {
                    tokio::time::sleep(Duration::from_secs(interval_secs)).await;
                }
                let now = clock(&config, started);
                let loaded = service.load(&group, now.timestamp_millis()).await;
                tracing::debug!(
                    origin = ?loaded.origin,
                    days = loaded.days.len(),
                    eviction = ?loaded.eviction,
                    "schedule loaded"
                );
                pending.extend(loaded.eviction_task);

                let reconciled =
                    reconcile::reconcile(loaded.days, now.with_timezone(&config.utc_offset));
                let mut commands: Vec<(Pager, f64)> = Vec::new();
                let sync = match sync.take() {
                    Some(mut previous) => {
                        previous.reset(&reconciled, &mut commands);
                        sync.insert(previous)
                    }
                    None => {
                        let fresh = ScrollSync::new(&reconciled, metrics);
                        fresh.align(&mut commands);
                        sync.insert(fresh)
                    }
                };
                if let Some(day) = day {
                    if !sync.select_day(day, &mut commands) {
                        tracing::debug!(%day, "requested day not in schedule or already selected");
                    }
                }
                for offset_x in scroll_x.iter() {
                    sync.on_day_scroll(*offset_x, &mut commands);
                }
                for offset_x in week_x.iter() {
                    sync.on_week_scroll(*offset_x, &mut commands);
                }

                print!(
                    "{}",
                    report::build_schedule_report(&group, &reconciled, sync.selection())
                );
                for (pager, offset_x) in commands.iter() {
                    tracing::debug!(?pager, offset_x, "scroll pager");
                }
                print!("{}", report::build_pager_report(&commands));
            }

            if !pending.is_empty() {
                tracing::debug!(
                    pending = pending.len(),
                    "exiting with cache evictions still scheduled"
                );
            }
        }
        Commands::Today { group } => {
            config.require_api_url()?;
            let (group, first_name) = resolve_viewer(&pool, &client, &config, group).await?;

            let now = config.local_now();
            let loaded = ScheduleService::new(&client, &cache)
                .load(&group, now.timestamp_millis())
                .await;
            let overview = overview::build_overview(&loaded.days, now);
            print!("{}", report::build_overview_report(&first_name, &overview));
        }
        Commands::Marks { semester } => {
            config.require_api_url()?;
            let token =
                session::access_token(&pool, &client, config.now().timestamp_millis()).await?;
            let marks = client
                .marks(&token)
                .await
                .context("failed to fetch grades")?;
            let stats = grades::grade_stats(&marks);
            let semester = semester
                .or_else(|| grades::semesters(&marks).first().copied())
                .unwrap_or(1);
            print!("{}", report::build_marks_report(&marks, &stats, semester));
        }
        Commands::Groups { search } => {
            config.require_api_url()?;
            let departments = client
                .groups()
                .await
                .context("failed to fetch the group list")?;
            let filtered = groups::filter_groups(&departments, &search);
            print!("{}", report::build_groups_report(&filtered));
        }
        Commands::Import { json } => {
            let raw = std::fs::read_to_string(&json)
                .with_context(|| format!("failed to read {}", json.display()))?;
            let payload: ScheduleResponse = serde_json::from_str(&raw)
                .with_context(|| format!("{} is not a schedule payload", json.display()))?;
            let days = payload.into_days();
            cache.write(&days, config.now().timestamp_millis()).await;
            println!("Cached {} days from {}.", days.len(), json.display());
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn explicit_group_skips_session_without_oauth() {
        let pool = db::memory_pool().await;
        let mut config = Config::for_tests();
        config.oauth_url = String::new();
        let client = ApiClient::new(&config).unwrap();

        let viewer = resolve_viewer(&pool, &client, &config, Some("ЦИС-26".to_string()))
            .await
            .unwrap();
        assert_eq!(viewer, ("ЦИС-26".to_string(), String::new()));
    }

    #[tokio::test]
    async fn explicit_group_tolerates_missing_session() {
        let pool = db::memory_pool().await;
        let config = Config::for_tests();
        let client = ApiClient::new(&config).unwrap();

        let viewer = resolve_viewer(&pool, &client, &config, Some("ЦИС-26".to_string()))
            .await
            .unwrap();
        assert_eq!(viewer.0, "ЦИС-26");
        assert!(viewer.1.is_empty());
    }

    #[tokio::test]
    async fn implicit_group_needs_a_session() {
        let pool = db::memory_pool().await;
        let config = Config::for_tests();
        let client = ApiClient::new(&config).unwrap();

        assert!(resolve_viewer(&pool, &client, &config, None).await.is_err());
        assert!(resolve_group(&pool, &client, &config, None).await.is_err());
        assert_eq!(
            resolve_group(&pool, &client, &config, Some("ЦИС-16".to_string()))
                .await
                .unwrap(),
            "ЦИС-16"
        );
    }
}
