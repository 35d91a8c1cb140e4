//! Server configuration, deserialised from `config.toml` and `VETCLINIC_*`
//! environment variables.

use std::{
  path::{Path, PathBuf},
  time::Duration,
};

use anyhow::Context as _;
use chrono::TimeDelta;
use chrono_tz::Tz;
use serde::Deserialize;
use vetclinic_core::{
  appointment::ConflictWindow, reminder::ReminderPolicy, scheduler::SchedulerConfig,
};

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
  pub host:                    String,
  pub port:                    u16,
  pub store_path:              PathBuf,
  /// IANA zone name.
  pub timezone:                String,
  pub creation_window_minutes: i64,
  pub update_window_minutes:   i64,
  pub reminder_interval_secs:  u64,
  pub reminder_lead_hours:     i64,
}

impl Default for ServerConfig {
  fn default() -> Self {
    Self {
      host:                    "127.0.0.1".to_string(),
      port:                    3000,
      store_path:              PathBuf::from("vetclinic.sqlite3"),
      timezone:                "Africa/Tunis".to_string(),
      creation_window_minutes: 29,
      update_window_minutes:   20,
      reminder_interval_secs:  3600,
      reminder_lead_hours:     24,
    }
  }
}

impl ServerConfig {
  /// Load from an optional TOML file overlaid by the environment.
  pub fn load(path: &Path) -> anyhow::Result<Self> {
    config::Config::builder()
      .add_source(config::File::from(path).required(false))
      .add_source(config::Environment::with_prefix("VETCLINIC"))
      .build()
      .context("failed to read config file")?
      .try_deserialize()
      .context("failed to deserialise ServerConfig")
  }

  pub fn zone(&self) -> anyhow::Result<Tz> {
    self
      .timezone
      .parse::<Tz>()
      .map_err(|e| anyhow::anyhow!("invalid timezone {:?}: {e}", self.timezone))
  }

  pub fn scheduler(&self) -> anyhow::Result<SchedulerConfig> {
    Ok(SchedulerConfig {
      zone:            self.zone()?,
      creation_window: ConflictWindow::creation(self.creation_window_minutes),
      update_window:   ConflictWindow::update(self.update_window_minutes),
    })
  }

  pub fn reminders(&self) -> anyhow::Result<ReminderPolicy> {
    Ok(ReminderPolicy {
      lead: TimeDelta::hours(self.reminder_lead_hours),
      zone: self.zone()?,
      ..ReminderPolicy::default()
    })
  }

  pub fn reminder_interval(&self) -> Duration {
    Duration::from_secs(self.reminder_interval_secs.max(1))
  }

  /// `store_path` with a leading `~` expanded to the home directory.
  pub fn store_path(&self) -> PathBuf { expand_tilde(&self.store_path) }
}

fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}
