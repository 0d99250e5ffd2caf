/// Per-user rate limiting for the remote answer path.
///
/// Two gates: a short-term window between accepted requests (default 5 s) and a
/// daily quota (default 50) that resets when the wall-clock date rolls over. State
/// is held in memory behind an async mutex and persisted to Redis as one
/// JSON-serialized map under a namespaced key, so quotas survive restarts. An
/// hourly sweep drops users idle for more than a day.
///
/// Every decision takes an explicit `now` so tests drive the clock; production
/// wrappers pass `Local::now()`.
use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Local, NaiveDate, TimeZone};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{info, warn};

use ministry_common::redis::RedisCache;

const STATE_KEY: &str = "ministry:v1:rate_limits";
const IDLE_EXPIRY: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Debug, Clone)]
pub struct RateLimiterConfig {
    /// Minimum gap between accepted requests from one user.
    pub short_term_window: Duration,
    /// Accepted requests allowed per calendar day.
    pub daily_limit: u32,
    /// Development bypass: allow everything, record nothing. Must be set
    /// explicitly at construction.
    pub bypass: bool,
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        Self {
            short_term_window: Duration::from_millis(5_000),
            daily_limit: 50,
            bypass: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct UserLimitState {
    last_query_ms: i64,
    daily_count: u32,
    window_date: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RateDecision {
    Allowed,
    Throttled { wait: Duration },
    DailyExhausted { reset_at: DateTime<Local> },
}

#[derive(Debug, Clone)]
pub struct RateLimitStatus {
    pub limited: bool,
    pub daily_used: u32,
    pub daily_limit: u32,
    pub wait: Duration,
}

pub struct RateLimiter {
    config: RateLimiterConfig,
    redis: RedisCache,
    state: Mutex<HashMap<String, UserLimitState>>,
}

impl RateLimiter {
    pub fn new(config: RateLimiterConfig, redis: RedisCache) -> Self {
        if config.bypass {
            info!("rate limiter bypass enabled, limits disabled");
        }
        Self {
            config,
            redis,
            state: Mutex::new(HashMap::new()),
        }
    }

    pub fn daily_limit(&self) -> u32 {
        self.config.daily_limit
    }

    /// Load persisted state from Redis. Degrades to an empty map when Redis is
    /// unavailable or the stored value is unreadable.
    pub async fn hydrate(&self) {
        let Some(raw) = self.redis.get(STATE_KEY).await else {
            return;
        };
        match serde_json::from_str::<HashMap<String, UserLimitState>>(&raw) {
            Ok(loaded) => {
                let users = loaded.len();
                *self.state.lock().await = loaded;
                info!(users, "rate limit state hydrated");
            }
            Err(e) => warn!(error = %e, "discarding unreadable rate limit state"),
        }
    }

    pub async fn check(&self, user_id: &str) -> RateDecision {
        self.check_at(user_id, Local::now()).await
    }

    /// Decide whether a request from `user_id` may proceed at `now`.
    pub async fn check_at(&self, user_id: &str, now: DateTime<Local>) -> RateDecision {
        if self.config.bypass {
            return RateDecision::Allowed;
        }

        let today = now.date_naive();
        let mut state = self.state.lock().await;
        let entry = state
            .entry(user_id.to_string())
            .or_insert_with(|| UserLimitState {
                last_query_ms: 0,
                daily_count: 0,
                window_date: today,
            });

        if entry.window_date < today {
            entry.daily_count = 0;
            entry.window_date = today;
        }

        if entry.daily_count >= self.config.daily_limit {
            return RateDecision::DailyExhausted {
                reset_at: next_midnight(now),
            };
        }

        let elapsed_ms = now.timestamp_millis().saturating_sub(entry.last_query_ms);
        let window_ms = self.config.short_term_window.as_millis() as i64;
        if entry.last_query_ms > 0 && elapsed_ms < window_ms {
            return RateDecision::Throttled {
                wait: Duration::from_millis((window_ms - elapsed_ms) as u64),
            };
        }

        RateDecision::Allowed
    }

    pub async fn record_success(&self, user_id: &str) {
        self.record_success_at(user_id, Local::now()).await;
    }

    /// Record an accepted request and persist the updated map.
    pub async fn record_success_at(&self, user_id: &str, now: DateTime<Local>) {
        if self.config.bypass {
            return;
        }

        let snapshot = {
            let mut state = self.state.lock().await;
            let entry = state
                .entry(user_id.to_string())
                .or_insert_with(|| UserLimitState {
                    last_query_ms: 0,
                    daily_count: 0,
                    window_date: now.date_naive(),
                });
            entry.last_query_ms = now.timestamp_millis();
            entry.daily_count += 1;
            state.clone()
        };
        self.persist(&snapshot).await;
    }

    pub async fn status(&self, user_id: &str) -> RateLimitStatus {
        self.status_at(user_id, Local::now()).await
    }

    pub async fn status_at(&self, user_id: &str, now: DateTime<Local>) -> RateLimitStatus {
        let daily_limit = self.config.daily_limit;
        if self.config.bypass {
            return RateLimitStatus {
                limited: false,
                daily_used: 0,
                daily_limit,
                wait: Duration::ZERO,
            };
        }

        let state = self.state.lock().await;
        let Some(entry) = state.get(user_id) else {
            return RateLimitStatus {
                limited: false,
                daily_used: 0,
                daily_limit,
                wait: Duration::ZERO,
            };
        };

        let daily_used = if entry.window_date < now.date_naive() {
            0
        } else {
            entry.daily_count
        };
        let elapsed_ms = now.timestamp_millis().saturating_sub(entry.last_query_ms);
        let window_ms = self.config.short_term_window.as_millis() as i64;
        let wait_ms = if entry.last_query_ms > 0 && elapsed_ms < window_ms {
            (window_ms - elapsed_ms) as u64
        } else {
            0
        };

        RateLimitStatus {
            limited: wait_ms > 0 || daily_used >= daily_limit,
            daily_used,
            daily_limit,
            wait: Duration::from_millis(wait_ms),
        }
    }

    pub async fn sweep(&self) {
        self.sweep_at(Local::now()).await;
    }

    /// Drop users whose last accepted request is older than 24 h, then persist
    /// the pruned map.
    pub async fn sweep_at(&self, now: DateTime<Local>) {
        let cutoff_ms = now.timestamp_millis() - IDLE_EXPIRY.as_millis() as i64;
        let snapshot = {
            let mut state = self.state.lock().await;
            let before = state.len();
            state.retain(|_, entry| entry.last_query_ms >= cutoff_ms);
            let removed = before - state.len();
            if removed > 0 {
                info!(removed, remaining = state.len(), "rate limit sweep pruned idle users");
            }
            state.clone()
        };
        self.persist(&snapshot).await;
    }

    async fn persist(&self, snapshot: &HashMap<String, UserLimitState>) {
        match serde_json::to_string(snapshot) {
            Ok(json) => {
                self.redis.set(STATE_KEY, &json).await;
            }
            Err(e) => warn!(error = %e, "failed to serialize rate limit state"),
        }
    }
}

/// Start of the next calendar day in local time. Falls back to now + 24 h around
/// DST transitions where local midnight is ambiguous or skipped.
fn next_midnight(now: DateTime<Local>) -> DateTime<Local> {
    now.date_naive()
        .succ_opt()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .and_then(|ndt| Local.from_local_datetime(&ndt).earliest())
        .unwrap_or_else(|| now + chrono::Duration::hours(24))
}
