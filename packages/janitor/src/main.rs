mod config;
mod retention;
mod sweep;

use std::sync::Arc;

use anyhow::Context;
use common::storage::FilesystemContentStore;
use depot::PackageService;
use depot::database::init_db;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_target(false)
        .init();

    let config = config::AppConfig::load().context("Failed to load config")?;

    let db = init_db(&config.database)
        .await
        .context("Failed to connect to database")?;
    info!("Database connected");

    let content = FilesystemContentStore::from_config(&config.storage)
        .await
        .context("Failed to open content store")?;
    info!(path = %config.storage.path.display(), "Content store ready");

    let service = PackageService::new(db, Arc::new(content), config.limits);
    sweep::run_janitor(service, config.janitor).await;

    Ok(())
}
