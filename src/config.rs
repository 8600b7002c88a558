//! Application configuration module
//!
//! Centralized, environment-aware configuration. Every option of the
//! pipeline and API is an explicit field here; optional source keys that
//! are absent disable the corresponding source rather than failing.

use std::time::Duration;
use thiserror::Error;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required configuration: {0}")]
    MissingRequired(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Application environment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

impl Environment {
    pub fn from_env() -> Self {
        match std::env::var("ENVIRONMENT")
            .unwrap_or_default()
            .to_lowercase()
            .as_str()
        {
            "production" | "prod" => Self::Production,
            "staging" | "stage" => Self::Staging,
            _ => Self::Development,
        }
    }

    pub fn is_development(&self) -> bool {
        matches!(self, Self::Development)
    }
}

/// Complete application configuration
#[derive(Clone)]
pub struct AppConfig {
    pub environment: Environment,
    pub server: ServerConfig,
    pub database: DatabaseSettings,
    pub scheduler: SchedulerConfig,
    pub sources: SourceKeys,
    /// CORS origins; empty means same-origin only.
    pub allowed_origins: Vec<String>,
    /// Absolute HTTPS base for links in the RSS feed.
    pub public_base_url: String,
}

impl AppConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let environment = Environment::from_env();

        Ok(Self {
            environment,
            server: ServerConfig::from_env(),
            database: DatabaseSettings::from_env(environment)?,
            scheduler: SchedulerConfig::from_env()?,
            sources: SourceKeys::from_env(),
            allowed_origins: std::env::var("ALLOWED_ORIGINS")
                .unwrap_or_default()
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            public_base_url: std::env::var("PUBLIC_BASE_URL")
                .unwrap_or_else(|_| "https://news.example.org".to_string())
                .trim_end_matches('/')
                .to_string(),
        })
    }
}

/// Server configuration
#[derive(Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Client-facing request deadline; exceeded requests return 504.
    pub request_timeout: Duration,
}

impl ServerConfig {
    pub fn from_env() -> Self {
        Self {
            host: std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: std::env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(3000),
            request_timeout: Duration::from_secs(
                std::env::var("REQUEST_TIMEOUT_SECS")
                    .ok()
                    .and_then(|t| t.parse().ok())
                    .unwrap_or(15),
            ),
        }
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Database settings
#[derive(Clone)]
pub struct DatabaseSettings {
    pub url: String,
    pub max_connections: u32,
}

impl DatabaseSettings {
    pub fn from_env(env: Environment) -> Result<Self, ConfigError> {
        let url = match std::env::var("DATABASE_URL") {
            Ok(url) => url,
            Err(_) if env.is_development() => "sqlite://news.db?mode=rwc".to_string(),
            Err(_) => return Err(ConfigError::MissingRequired("DATABASE_URL".to_string())),
        };

        Ok(Self {
            url,
            max_connections: std::env::var("DB_MAX_CONNECTIONS")
                .ok()
                .and_then(|c| c.parse().ok())
                .unwrap_or(10),
        })
    }
}

/// Pipeline scheduler configuration: per-tier cadences and work caps.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Master switch (`ENABLE_SCHEDULER`), default off.
    pub enabled: bool,
    pub tier1_interval_peak: Duration,
    pub tier1_interval_offpeak: Duration,
    pub tier2_interval_peak: Duration,
    pub tier2_interval_offpeak: Duration,
    pub tier3_interval: Duration,
    pub tier4_interval: Duration,
    /// Rolling window the analysis tiers operate over.
    pub analysis_window_hours: i64,
    pub article_retention_days: i64,
    /// Events receiving full excerpt extraction per Tier-3 run.
    pub max_excerpts_per_run: usize,
    /// Events re-evaluated per Tier-3 run.
    pub max_reanalyzed_per_run: usize,
    pub fact_check_batch_size: usize,
    pub max_fact_check_workers: usize,
    /// Parallel fetch workers in Tier 2.
    pub fetch_workers: usize,
    /// Per-source fetch timeout.
    pub fetch_timeout: Duration,
}

impl SchedulerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            enabled: std::env::var("ENABLE_SCHEDULER")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(false),
            tier1_interval_peak: minutes_env("TIER1_INTERVAL_PEAK", 10)?,
            tier1_interval_offpeak: minutes_env("TIER1_INTERVAL_OFFPEAK", 20)?,
            tier2_interval_peak: minutes_env("TIER2_INTERVAL_PEAK", 15)?,
            tier2_interval_offpeak: minutes_env("TIER2_INTERVAL_OFFPEAK", 30)?,
            tier3_interval: minutes_env("TIER3_INTERVAL", 60)?,
            tier4_interval: minutes_env("TIER4_INTERVAL", 240)?,
            analysis_window_hours: int_env("ANALYSIS_WINDOW_HOURS", 72)?,
            article_retention_days: int_env("ARTICLE_RETENTION_DAYS", 30)?,
            max_excerpts_per_run: int_env("MAX_EXCERPTS_PER_RUN", 8)? as usize,
            max_reanalyzed_per_run: int_env("MAX_REANALYZED_PER_RUN", 25)? as usize,
            fact_check_batch_size: int_env("FACT_CHECK_BATCH_SIZE", 30)? as usize,
            max_fact_check_workers: int_env("MAX_FACT_CHECK_WORKERS", 2)? as usize,
            fetch_workers: int_env("FETCH_WORKERS", 6)? as usize,
            fetch_timeout: Duration::from_secs(int_env("FETCH_TIMEOUT_SECS", 30)? as u64),
        })
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            tier1_interval_peak: Duration::from_secs(10 * 60),
            tier1_interval_offpeak: Duration::from_secs(20 * 60),
            tier2_interval_peak: Duration::from_secs(15 * 60),
            tier2_interval_offpeak: Duration::from_secs(30 * 60),
            tier3_interval: Duration::from_secs(60 * 60),
            tier4_interval: Duration::from_secs(240 * 60),
            analysis_window_hours: 72,
            article_retention_days: 30,
            max_excerpts_per_run: 8,
            max_reanalyzed_per_run: 25,
            fact_check_batch_size: 30,
            max_fact_check_workers: 2,
            fetch_workers: 6,
            fetch_timeout: Duration::from_secs(30),
        }
    }
}

/// API keys for optional sources. A missing key disables that source.
#[derive(Debug, Clone, Default)]
pub struct SourceKeys {
    pub newsapi_key: Option<String>,
    pub mediastack_key: Option<String>,
    pub openai_api_key: Option<String>,
    pub nasa_firms_map_key: Option<String>,
}

impl SourceKeys {
    pub fn from_env() -> Self {
        Self {
            newsapi_key: non_empty_env("NEWSAPI_KEY"),
            mediastack_key: non_empty_env("MEDIASTACK_KEY"),
            openai_api_key: non_empty_env("OPENAI_API_KEY"),
            nasa_firms_map_key: non_empty_env("NASA_FIRMS_MAP_KEY"),
        }
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn int_env(key: &str, default: i64) -> Result<i64, ConfigError> {
    match std::env::var(key) {
        Ok(raw) => raw.parse().map_err(|_| ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("expected an integer, got '{raw}'"),
        }),
        Err(_) => Ok(default),
    }
}

fn minutes_env(key: &str, default_minutes: i64) -> Result<Duration, ConfigError> {
    let minutes = int_env(key, default_minutes)?;
    if minutes <= 0 {
        return Err(ConfigError::InvalidValue {
            key: key.to_string(),
            message: "interval must be positive".to_string(),
        });
    }
    Ok(Duration::from_secs(minutes as u64 * 60))
}
