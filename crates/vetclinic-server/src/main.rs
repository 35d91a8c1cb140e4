//! vetclinic server binary.
//!
//! Reads `config.toml` (or the path given with `--config`), opens the SQLite
//! store, starts the realtime hub and the reminder task, and serves the API.

mod settings;

use std::{path::PathBuf, sync::Arc, time::Duration};

use anyhow::Context as _;
use chrono::Utc;
use clap::Parser;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;
use vetclinic_api::{AppState, Hub};
use vetclinic_core::reminder::{ReminderPolicy, run_sweep};
use vetclinic_store_sqlite::SqliteStore;

use crate::settings::ServerConfig;

#[derive(Parser)]
#[command(author, version, about = "Vet clinic scheduling and messaging server")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();
  let cfg = ServerConfig::load(&cli.config)?;

  let store_path = cfg.store_path();
  let store = Arc::new(
    SqliteStore::open(&store_path)
      .await
      .with_context(|| format!("failed to open store at {store_path:?}"))?,
  );

  let hub = Hub::spawn();
  tokio::spawn(reminder_loop(
    Arc::clone(&store),
    hub.clone(),
    cfg.reminders()?,
    cfg.reminder_interval(),
  ));

  let state = AppState::new(store, cfg.scheduler()?, hub);
  let app = vetclinic_api::router(state).layer(TraceLayer::new_for_http());
  let address = format!("{}:{}", cfg.host, cfg.port);

  tracing::info!("Listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app).await.context("server error")?;

  Ok(())
}

/// Run the reminder sweep every `period`, starting immediately.
async fn reminder_loop(
  store: Arc<SqliteStore>,
  hub: Hub,
  policy: ReminderPolicy,
  period: Duration,
) {
  let mut ticker = tokio::time::interval(period);
  ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
  loop {
    ticker.tick().await;
    match run_sweep(&*store, &hub, &policy, Utc::now()).await {
      Ok(0) => {}
      Ok(sent) => tracing::info!(sent, "reminders sent"),
      Err(e) => tracing::error!(error = %e, "reminder sweep failed"),
    }
  }
}
