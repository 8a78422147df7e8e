//! Configuration loading and parsing

use anyhow::{bail, Context, Result};
use photon_monitor::{DecoderConfig, MonitorOptions, PinMap};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main application configuration (loaded from photon.toml)
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default)]
    pub monitor: MonitorSection,
    #[serde(default)]
    pub pins: PinMap,
    #[serde(default)]
    pub decoder: DecoderConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MonitorSection {
    /// JSON-lines file the readings are appended to
    #[serde(default = "default_storage")]
    pub storage: PathBuf,
    /// Sampling period in seconds
    #[serde(default = "default_period")]
    pub period_secs: u64,
    /// How long to wait for the Photon board at startup, in seconds
    #[serde(default = "default_startup_timeout")]
    pub startup_timeout_secs: u64,
}

fn default_storage() -> PathBuf {
    PathBuf::from("measurements.jsonl")
}

fn default_period() -> u64 {
    120
}

fn default_startup_timeout() -> u64 {
    300
}

impl Default for MonitorSection {
    fn default() -> Self {
        Self {
            storage: default_storage(),
            period_secs: default_period(),
            startup_timeout_secs: default_startup_timeout(),
        }
    }
}

impl AppConfig {
    /// Replace file settings with the ones given on the command line
    pub fn with_overrides(
        mut self,
        storage: Option<PathBuf>,
        period_secs: Option<u64>,
        startup_timeout_secs: Option<u64>,
    ) -> Self {
        if let Some(storage) = storage {
            self.monitor.storage = storage;
        }
        if let Some(period) = period_secs {
            self.monitor.period_secs = period;
        }
        if let Some(timeout) = startup_timeout_secs {
            self.monitor.startup_timeout_secs = timeout;
        }
        self
    }

    pub fn period(&self) -> Duration {
        Duration::from_secs(self.monitor.period_secs)
    }

    pub fn monitor_options(&self) -> MonitorOptions {
        MonitorOptions::new()
            .with_startup_timeout(Duration::from_secs(self.monitor.startup_timeout_secs))
            .with_decoder(self.decoder.clone())
    }

    /// Reject settings the monitor cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.monitor.period_secs == 0 {
            bail!("monitor.period_secs must be at least 1");
        }
        if self.decoder.poll_interval_ms == 0 {
            bail!("decoder.poll_interval_ms must be at least 1");
        }
        if let Some(line) = self.pins.duplicate_line() {
            bail!("GPIO{} is assigned to more than one pin role", line);
        }
        Ok(())
    }
}

/// Load configuration from a TOML file
pub fn load_config(path: &Path) -> Result<AppConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let config: AppConfig = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {:?}", path))?;

    Ok(config)
}
