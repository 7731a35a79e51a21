use std::time::Duration;

use anyhow::Context;
use chrono::{DateTime, FixedOffset, Utc};
use clap::Args;

use crate::scroll::PageMetrics;

pub const DEFAULT_CACHE_TTL_MS: u64 = 20_000;
pub const DEFAULT_REQUEST_LIMIT: u32 = 4;
pub const DEFAULT_UTC_OFFSET_HOURS: i32 = 3;
pub const MAX_CONTENT_WIDTH: f64 = 735.0;
pub const PAGER_MARGIN: f64 = 16.0;

#[derive(Debug, Clone, Args)]
pub struct ConfigArgs {
    /// Local store location
    #[arg(
        long,
        env = "STUDENT_ID_DB",
        default_value = "sqlite://student-id.db",
        global = true
    )]
    pub database_url: String,
    #[arg(long, env = "OAUTH_URL", default_value = "", global = true)]
    pub oauth_url: String,
    #[arg(long, env = "API_URL", default_value = "", global = true)]
    pub api_url: String,
    #[arg(long, env = "OAUTH_CLIENT_ID", default_value = "", global = true)]
    pub client_id: String,
    #[arg(long, env = "OAUTH_SCOPE", default_value = "", global = true)]
    pub scope: String,
    /// How long a fetched schedule stays fresh, in milliseconds
    #[arg(long, default_value_t = DEFAULT_CACHE_TTL_MS, global = true)]
    pub cache_ttl_ms: u64,
    /// Fetches per TTL window before the cache is force-expired
    #[arg(long, default_value_t = DEFAULT_REQUEST_LIMIT, global = true)]
    pub request_limit: u32,
    /// Offset of the university's timezone, used to decide "today"
    #[arg(long, default_value_t = DEFAULT_UTC_OFFSET_HOURS, allow_hyphen_values = true, global = true)]
    pub utc_offset_hours: i32,
    /// Pretend the current time is this RFC 3339 timestamp
    #[arg(long, global = true)]
    pub now: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub oauth_url: String,
    pub api_url: String,
    pub client_id: String,
    pub scope: String,
    pub cache_ttl: Duration,
    pub request_limit: u32,
    pub utc_offset: FixedOffset,
    pub page: PageMetrics,
    pub now_override: Option<DateTime<Utc>>,
}

impl Config {
    pub fn from_args(args: &ConfigArgs) -> anyhow::Result<Self> {
        let utc_offset = FixedOffset::east_opt(args.utc_offset_hours * 3600)
            .with_context(|| format!("utc offset {}h out of range", args.utc_offset_hours))?;

        let now_override = args
            .now
            .as_deref()
            .map(|raw| {
                DateTime::parse_from_rfc3339(raw)
                    .map(|value| value.with_timezone(&Utc))
                    .with_context(|| format!("--now {raw:?} is not an RFC 3339 timestamp"))
            })
            .transpose()?;

        Ok(Self {
            database_url: args.database_url.clone(),
            oauth_url: args.oauth_url.trim_end_matches('/').to_string(),
            api_url: args.api_url.trim_end_matches('/').to_string(),
            client_id: args.client_id.clone(),
            scope: args.scope.clone(),
            cache_ttl: Duration::from_millis(args.cache_ttl_ms),
            request_limit: args.request_limit,
            utc_offset,
            page: PageMetrics::new(MAX_CONTENT_WIDTH, MAX_CONTENT_WIDTH, PAGER_MARGIN),
            now_override,
        })
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.now_override.unwrap_or_else(Utc::now)
    }

    /// Current time in the university's timezone.
    pub fn local_now(&self) -> DateTime<FixedOffset> {
        self.now().with_timezone(&self.utc_offset)
    }

    pub fn require_oauth_url(&self) -> anyhow::Result<&str> {
        if self.oauth_url.is_empty() {
            anyhow::bail!("OAUTH_URL must be set to the university OAuth server");
        }
        Ok(&self.oauth_url)
    }

    pub fn require_api_url(&self) -> anyhow::Result<&str> {
        if self.api_url.is_empty() {
            anyhow::bail!("API_URL must be set to the university API");
        }
        Ok(&self.api_url)
    }
}

#[cfg(test)]
impl Config {
    pub fn for_tests() -> Self {
        let args = ConfigArgs {
            database_url: "sqlite::memory:".to_string(),
            oauth_url: "http://oauth.test".to_string(),
            api_url: "http://api.test".to_string(),
            client_id: "client".to_string(),
            scope: "general".to_string(),
            cache_ttl_ms: DEFAULT_CACHE_TTL_MS,
            request_limit: DEFAULT_REQUEST_LIMIT,
            utc_offset_hours: DEFAULT_UTC_OFFSET_HOURS,
            now: None,
        };
        Self::from_args(&args).unwrap()
    }
}
