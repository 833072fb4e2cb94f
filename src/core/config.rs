//! Configuration management

use crate::core::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub sampling: SamplingConfig,
    #[serde(default)]
    pub pricing: PricingConfig,
    #[serde(default)]
    pub history: HistoryConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            sampling: SamplingConfig::default(),
            pricing: PricingConfig::default(),
            history: HistoryConfig::default(),
        }
    }
}

impl Config {
    /// Get the configuration file path
    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| Error::Config("Could not determine config directory".to_string()))?;

        let app_config_dir = config_dir.join("wattmon");

        if !app_config_dir.exists() {
            fs::create_dir_all(&app_config_dir)?;
        }

        Ok(app_config_dir.join("config.toml"))
    }

    /// Load configuration from disk, creating the file with defaults on first run
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;

        if !path.exists() {
            let config = Self::default();
            config.save()?;
            return Ok(config);
        }

        let content = fs::read_to_string(&path)?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("Failed to parse config: {}", e)))?;

        Ok(config)
    }

    /// Save configuration to disk
    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;
        let content = toml::to_string_pretty(self)
            .map_err(|e| Error::Serialization(e.to_string()))?;
        fs::write(path, content)?;
        Ok(())
    }
}

/// Sampling loop settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SamplingConfig {
    /// Sampling interval in seconds
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    /// How long to wait for the telemetry source before skipping a tick
    #[serde(default = "default_telemetry_timeout_secs")]
    pub telemetry_timeout_secs: u64,
    /// Elapsed interval assumed for the very first history append,
    /// which has no predecessor tick
    #[serde(default = "default_interval_secs")]
    pub first_tick_elapsed_secs: u64,
}

fn default_interval_secs() -> u64 { 5 }
fn default_telemetry_timeout_secs() -> u64 { 2 }

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            telemetry_timeout_secs: default_telemetry_timeout_secs(),
            first_tick_elapsed_secs: default_interval_secs(),
        }
    }
}

/// Electricity pricing settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PricingConfig {
    /// Flat rate per kWh
    #[serde(default = "default_rate")]
    pub rate_per_kwh: f64,
    /// Currency symbol for display
    #[serde(default = "default_currency_symbol")]
    pub currency_symbol: String,
}

fn default_rate() -> f64 { 0.15 }
fn default_currency_symbol() -> String { "$".to_string() }

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            rate_per_kwh: default_rate(),
            currency_symbol: default_currency_symbol(),
        }
    }
}

/// History store settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryConfig {
    /// Days of per-tick records to keep before pruning
    #[serde(default = "default_retention_days")]
    pub retention_days: u32,
}

fn default_retention_days() -> u32 { 90 }

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            retention_days: default_retention_days(),
        }
    }
}
