#![allow(clippy::print_stdout)]

use std::sync::Arc;

use serde_json::json;
use shared_breaker::{
    Breaker, BreakerConfig, BreakerResponse, OutboundRequest, RedisStateStore, SqliteStateStore,
    StateStore,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "shared_breaker=info,breaker_probe=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let target_url = std::env::args()
        .nth(1)
        .or_else(|| std::env::var("BREAKER_TARGET_URL").ok())
        .ok_or("usage: breaker-probe <url> (or set BREAKER_TARGET_URL)")?;
    let name = std::env::var("BREAKER_NAME").unwrap_or_else(|_| "breaker-probe".to_string());

    let store: Arc<dyn StateStore> = match std::env::var("REDIS_URL") {
        Ok(redis_url) => Arc::new(RedisStateStore::connect(&redis_url).await?),
        Err(_) => {
            let database_url = std::env::var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite:breaker.db".to_string());
            Arc::new(SqliteStateStore::connect(&database_url).await?)
        }
    };

    let config = BreakerConfig::from_env();
    tracing::info!(
        breaker = %name,
        max_failures = config.max_failures,
        open_wait_ms = config.open_to_half_open_wait.as_millis() as u64,
        attempts = config.retry_intervals.len(),
        "Configuration loaded"
    );

    let breaker = Breaker::new(config, name, store).await?;
    breaker.set_fallback(|request| {
        BreakerResponse::fallback(
            200,
            json!({
                "message": "dependency unavailable, served by fallback",
                "url": request.url,
            }),
        )
    });

    let response = breaker.execute(OutboundRequest::get(target_url)).await;
    tracing::info!(
        breaker = %breaker.name(),
        state = %breaker.state().await,
        "Request finished"
    );

    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}
