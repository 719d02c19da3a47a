//! Circulation sweeper
//!
//! Loads a store snapshot, cancels expired requests on a fixed interval and
//! writes the snapshot back on shutdown.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use chrono::Utc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ils_circulation::{
    config::AppConfig,
    repository::{MemoryRepository, MemorySnapshot, Repository},
    services::{calendar::ScheduleCalendar, notifications::LoggingSink, Services},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    let config = AppConfig::load().context("Failed to load configuration")?;

    // Initialize tracing
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("ils_circulation={}", config.logging.level).into());

    let registry = tracing_subscriber::registry().with(filter);
    if config.logging.format == "json" {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }

    tracing::info!("Starting circulation sweeper v{}", env!("CARGO_PKG_VERSION"));

    let snapshot = MemorySnapshot::load(&config.store.snapshot_path)
        .with_context(|| format!("Failed to load {}", config.store.snapshot_path))?;
    tracing::info!(
        "Loaded {} item(s) and {} loan(s) from {}",
        snapshot.items.len(),
        snapshot.loans.len(),
        config.store.snapshot_path
    );

    let calendar = Arc::new(ScheduleCalendar::new(snapshot.schedules.clone()));
    let memory = Arc::new(MemoryRepository::from_snapshot(snapshot));
    let services = Services::new(
        Repository::in_memory(memory.clone()),
        calendar,
        Arc::new(LoggingSink),
        &config.circulation,
    );

    let mut ticker =
        tokio::time::interval(Duration::from_secs(config.circulation.sweep_interval_secs));
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                match services.circulation.cancel_expired_request_task(Utc::now()).await {
                    Ok(0) => {}
                    Ok(count) => tracing::info!("Cancelled {} expired request(s)", count),
                    Err(e) => tracing::error!("Expired request sweep failed: {}", e),
                }
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Shutting down");
                break;
            }
        }
    }

    memory
        .snapshot()
        .await
        .save(&config.store.snapshot_path)
        .with_context(|| format!("Failed to save {}", config.store.snapshot_path))?;
    tracing::info!("Snapshot written to {}", config.store.snapshot_path);

    Ok(())
}
