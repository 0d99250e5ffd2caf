use std::path::PathBuf;
use std::time::Duration;

use crate::error::AppError;
use crate::rate_limit::RateLimiterConfig;

/// Application configuration loaded explicitly from environment variables.
///
/// Everything is optional: without `REDIS_URL` the limiter state is in-memory only,
/// without `GEMINI_API_KEY` (read separately by the Gemini client config) the engine
/// runs the local pipeline only, and without the path overrides the bundled policy
/// set and prompt template are used.
#[derive(Debug, Clone)]
pub struct Config {
    /// Redis connection URL (e.g. "redis://127.0.0.1:6379"). `None` disables persistence.
    pub redis_url: Option<String>,
    /// Path to a policy JSON file. `None` loads the bundled set.
    pub policies_path: Option<PathBuf>,
    /// Path to a prompt template file. `None` loads the bundled template.
    pub prompt_template_path: Option<PathBuf>,
    pub rate_limit: RateLimiterConfig,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Optional:
    /// - `REDIS_URL`: Redis connection string (omit to disable persistence)
    /// - `POLICIES_PATH`: path to a policy JSON file (must exist when set)
    /// - `PROMPT_TEMPLATE_PATH`: path to a prompt template (must exist when set)
    /// - `RATE_LIMIT_WINDOW_MS`: gap between accepted requests (default 5000)
    /// - `RATE_LIMIT_DAILY`: accepted requests per day (default 50)
    /// - `RATE_LIMIT_BYPASS`: "1"/"true" disables rate limiting (development only)
    pub fn from_env() -> Result<Self, AppError> {
        let redis_url = std::env::var("REDIS_URL").ok();

        let policies_path = optional_path("POLICIES_PATH")?;
        let prompt_template_path = optional_path("PROMPT_TEMPLATE_PATH")?;

        let mut rate_limit = RateLimiterConfig::default();
        if let Some(window_ms) = parse_env::<u64>("RATE_LIMIT_WINDOW_MS")? {
            rate_limit.short_term_window = Duration::from_millis(window_ms);
        }
        if let Some(daily) = parse_env::<u32>("RATE_LIMIT_DAILY")? {
            rate_limit.daily_limit = daily;
        }
        rate_limit.bypass = matches!(
            std::env::var("RATE_LIMIT_BYPASS").ok().as_deref(),
            Some("1") | Some("true")
        );

        Ok(Self {
            redis_url,
            policies_path,
            prompt_template_path,
            rate_limit,
        })
    }
}

fn optional_path(var: &str) -> Result<Option<PathBuf>, AppError> {
    let Ok(value) = std::env::var(var) else {
        return Ok(None);
    };
    let path = PathBuf::from(&value);
    if !path.exists() {
        return Err(AppError::Config(format!("{var} does not exist: {value}")));
    }
    Ok(Some(path))
}

fn parse_env<T: std::str::FromStr>(var: &str) -> Result<Option<T>, AppError> {
    match std::env::var(var) {
        Ok(value) => value
            .parse::<T>()
            .map(Some)
            .map_err(|_| AppError::Config(format!("{var} is not a valid value: {value}"))),
        Err(_) => Ok(None),
    }
}
