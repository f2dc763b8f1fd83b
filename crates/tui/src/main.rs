mod app;
mod prompt;

use anyhow::{Context, Result};
use std::{
    fs::{self, OpenOptions},
    sync::Mutex,
};

use subway_core::{
    config::{self, AppConfig},
    LineService, StationService,
};
use tracing::info;
use tracing_subscriber::{prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    init_logging()?;

    let config_path = config::ensure_default_config()?;
    let config = AppConfig::load()?;
    info!(config = %config_path.display(), store = ?config.store, "Starting subway");

    let store = config.open_store()?;
    let lines = LineService::new(store.clone(), config.service_config());
    let stations = StationService::new(store);

    let mut app = app::SubwayApp::new(lines, stations);
    app.run().await
}

fn init_logging() -> Result<()> {
    let log_dir = std::env::current_dir()?.join("logs");
    fs::create_dir_all(&log_dir)?;
    let log_path = log_dir.join("subway.log");
    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .with_context(|| format!("failed to open {}", log_path.display()))?;

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    // Stdout belongs to the terminal UI, so everything goes to the file.
    let file_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_ansi(false)
        .compact()
        .with_writer(Mutex::new(log_file));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .init();

    Ok(())
}
