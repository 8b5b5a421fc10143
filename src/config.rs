//! Harvester configuration
//!
//! Loaded from YAML. Every section is optional; a missing file means the
//! built-in defaults, which reproduce the standard three-chemical batch.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use browser_session::ChromiumConfig;
use ecotox_query::{BatchInput, EndpointMatch, QueryTimeouts};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::fs;
use tracing::{info, warn};

/// Directory under the platform config dir holding `config.yaml`
pub const CONFIG_DIR_NAME: &str = "ecotox-harvester";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid duration for timeouts.{field}: '{value}'")]
    InvalidDuration { field: &'static str, value: String },

    #[error("Config file not found: {0}")]
    NotFound(PathBuf),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HarvestConfig {
    pub browser: ChromiumConfig,
    pub timeouts: TimeoutSettings,
    pub matching: MatchingSettings,
    pub output: OutputSettings,
    pub batch: BatchInput,
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            browser: ChromiumConfig::default(),
            timeouts: TimeoutSettings::default(),
            matching: MatchingSettings::default(),
            output: OutputSettings::default(),
            batch: default_batch(),
        }
    }
}

/// Wait bounds and settle delays as humantime strings ("10s", "500ms")
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutSettings {
    pub wait: String,
    pub input_settle: String,
    pub panel_animation: String,
    pub refresh_delay: String,
}

impl Default for TimeoutSettings {
    fn default() -> Self {
        Self {
            wait: "10s".to_string(),
            input_settle: "1s".to_string(),
            panel_animation: "1s".to_string(),
            refresh_delay: "1s".to_string(),
        }
    }
}

impl TimeoutSettings {
    pub fn to_query_timeouts(&self) -> Result<QueryTimeouts, ConfigError> {
        Ok(QueryTimeouts {
            wait: parse_duration("wait", &self.wait)?,
            input_settle: parse_duration("input_settle", &self.input_settle)?,
            panel_animation: parse_duration("panel_animation", &self.panel_animation)?,
            refresh_delay: parse_duration("refresh_delay", &self.refresh_delay)?,
        })
    }
}

fn parse_duration(field: &'static str, raw: &str) -> Result<Duration, ConfigError> {
    humantime::parse_duration(raw.trim()).map_err(|_| ConfigError::InvalidDuration {
        field,
        value: raw.to_string(),
    })
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchingSettings {
    pub endpoint_match: EndpointMatch,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputSettings {
    /// One line per query with the accepted values
    pub detail_log: PathBuf,

    /// Summaries only, one row per species
    pub result_matrix: PathBuf,
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            detail_log: PathBuf::from("log_file.txt"),
            result_matrix: PathBuf::from("result_file.txt"),
        }
    }
}

/// DDT, hexachlorobenzene, and heptachlor against bluegill (LC50, 4 days) and toad (LC50, 1 day)
pub fn default_batch() -> BatchInput {
    BatchInput {
        chemicals: vec![
            "DDT".to_string(),
            "hexachlorobenzene".to_string(),
            "heptachlor".to_string(),
        ],
        species: vec!["Lepomis".to_string(), "Bufo".to_string()],
        endpoints: vec!["LC50".to_string(), "LC50".to_string()],
        durations: vec![4, 1],
    }
}

pub struct LoadedConfig {
    pub config: HarvestConfig,
    pub path: PathBuf,
}

/// `<config_dir>/ecotox-harvester/config.yaml`
pub fn default_config_path() -> Result<PathBuf> {
    let mut path = dirs::config_dir().context("Failed to get config directory")?;
    path.push(CONFIG_DIR_NAME);
    path.push("config.yaml");
    Ok(path)
}

/// Load the explicit path (which must exist) or the default location (which may not)
pub async fn load_config(config_path: Option<&PathBuf>) -> Result<LoadedConfig> {
    let (path, explicit) = match config_path {
        Some(path) => (path.clone(), true),
        None => (default_config_path()?, false),
    };

    if !path.exists() {
        if explicit {
            return Err(ConfigError::NotFound(path).into());
        }
        warn!("Config file not found, using defaults: {}", path.display());
        return Ok(LoadedConfig {
            config: HarvestConfig::default(),
            path,
        });
    }

    let config = read_config_file(&path).await?;
    info!("Loaded configuration from: {}", path.display());
    Ok(LoadedConfig { config, path })
}

async fn read_config_file(path: &Path) -> Result<HarvestConfig> {
    let content = fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read config file {}", path.display()))?;
    parse_config(&content)
}

pub fn parse_config(content: &str) -> Result<HarvestConfig> {
    if content.trim().is_empty() {
        return Ok(HarvestConfig::default());
    }
    serde_yaml::from_str(content).context("Failed to parse config file")
}
