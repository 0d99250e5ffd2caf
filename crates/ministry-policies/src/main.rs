mod config;
mod embedding;
mod engine;
mod error;
mod lexical;
mod model;
mod prompt;
mod rate_limit;
mod remote;
mod resolve;
mod server;
mod store;
mod synthesize;

use std::sync::Arc;
use std::time::Duration;

use rmcp::{ServiceExt, transport::stdio};
use tracing::info;
use tracing_subscriber::EnvFilter;

use ministry_common::gemini::{GeminiClient, GeminiClientConfig};
use ministry_common::redis::RedisCache;

use config::Config;
use engine::AnswerEngine;
use prompt::PromptBuilder;
use rate_limit::RateLimiter;
use remote::RemoteAnswerAdapter;
use server::PolicyAssistantServer;
use store::PolicyStore;
use synthesize::{AnswerSynthesizer, ClockFraming};

const SWEEP_INTERVAL: Duration = Duration::from_secs(60 * 60);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing to stderr (stdout is reserved for MCP JSON-RPC)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    info!("starting ministry-policies MCP server");

    // 1. Load config from environment
    let config = Config::from_env()?;
    info!(
        redis = config.redis_url.is_some(),
        bundled_policies = config.policies_path.is_none(),
        rate_limit_bypass = config.rate_limit.bypass,
        "configuration loaded"
    );

    // 2. Connect to Redis (optional — graceful degradation if unavailable)
    let redis = RedisCache::new(config.redis_url.as_deref());
    if redis.is_available().await {
        info!("redis connected");
    } else {
        info!("redis unavailable, rate limit state will not persist");
    }

    // 3. Load the policy store before anything that searches it
    let store = Arc::new(PolicyStore::load(config.policies_path.as_deref())?);

    // 4. Remote answer path is enabled only when an API key is configured
    let remote = match GeminiClientConfig::from_env() {
        Some(gemini_config) => {
            info!(
                model = %gemini_config.model,
                timeout_ms = gemini_config.default_timeout.as_millis(),
                max_retries = gemini_config.max_retries,
                "remote answer path enabled"
            );
            let client = GeminiClient::new(gemini_config)?;
            let prompt = PromptBuilder::load(config.prompt_template_path.as_deref())?;
            Some(RemoteAnswerAdapter::new(client, prompt))
        }
        None => {
            info!("GEMINI_API_KEY not set, running local answer pipeline only");
            None
        }
    };

    // 5. Rate limiter with persisted state
    let limiter = Arc::new(RateLimiter::new(config.rate_limit.clone(), redis));
    limiter.hydrate().await;

    // 6. Hourly sweep of idle per-user rate limit state
    let sweep_limiter = Arc::clone(&limiter);
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(SWEEP_INTERVAL);
        interval.tick().await;
        loop {
            interval.tick().await;
            sweep_limiter.sweep().await;
        }
    });

    // 7. Build the engine and serve on stdio
    let engine = Arc::new(AnswerEngine::new(
        store,
        AnswerSynthesizer::new(Box::new(ClockFraming)),
        remote,
        limiter,
    ));
    let server = PolicyAssistantServer::new(engine);

    info!("MCP server ready, serving on stdio");
    let service = server.serve(stdio()).await.inspect_err(|e| {
        tracing::error!(error = %e, "MCP server error");
    })?;

    service.waiting().await?;
    info!("MCP server shut down");
    Ok(())
}
