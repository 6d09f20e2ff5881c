use anyhow::{Context, Result};
use odds_value::config::Config;
use odds_value::web::{router, AppState};
use odds_value::{CacheStore, OddsApiClient, OddsService, RefreshScheduler};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env()?;

    let store = CacheStore::open(&config.database_path)
        .with_context(|| format!("Failed to open cache at {}", config.database_path.display()))?;

    let client = OddsApiClient::new(config.odds_api_key.clone())
        .with_base_url(config.odds_api_base_url.clone())
        .with_regions(config.regions.clone())
        .with_markets(config.markets.clone())
        .with_timeout(config.http_timeout)
        .context("Failed to build HTTP client")?;
    let source = Arc::new(client);

    let service = OddsService::new(store.clone(), source.clone(), config.cache_duration);
    let scheduler = RefreshScheduler::new(store, source, config.active_sports.clone(), config.tiers)
        .with_retention(config.retention);

    let app = router(AppState {
        service,
        scheduler: Arc::new(scheduler),
    });

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind_addr))?;

    info!(
        addr = %config.bind_addr,
        sports = ?config.active_sports,
        "Starting web server"
    );

    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}
