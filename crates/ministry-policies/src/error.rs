#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("query must not be empty")]
    EmptyPrompt,

    #[error("rate limit exceeded: try again in ~{wait_ms}ms")]
    Throttled { wait_ms: u64 },

    #[error("daily query limit of {limit} reached, resets at {reset_at}")]
    DailyExhausted { limit: u32, reset_at: String },

    #[error("config error: {0}")]
    Config(String),

    #[error("policy data error: {0}")]
    PolicyData(String),

    #[error("policy not found: {0}")]
    NotFound(String),
}
