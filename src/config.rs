//! Configuration management for navisafe.
//!
//! Loads settings from a TOML file or uses defaults. Every field is optional.

use h3o::Resolution;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::error::{NaviError, Result};
use crate::scoring::{DetectionConfig, RankingConfig};

/// Environment variable naming the config file
pub const CONFIG_ENV: &str = "NAVISAFE_CONFIG";

/// Config file picked up from the working directory when present
pub const DEFAULT_CONFIG_PATH: &str = "navisafe.toml";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub detection: DetectionConfig,
    #[serde(default)]
    pub ranking: RankingConfig,
    #[serde(default)]
    pub geocoder: GeocoderConfig,
    #[serde(default)]
    pub routing: RoutingConfig,
    #[serde(default)]
    pub briefing: BriefingConfig,
    #[serde(default)]
    pub store: StoreConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { bind: default_bind() }
    }
}

fn default_bind() -> String {
    "0.0.0.0:3000".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeocoderConfig {
    #[serde(default = "default_geocoder_url")]
    pub base_url: String,

    /// Nominatim's usage policy requires an identifying User-Agent
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,
}

impl Default for GeocoderConfig {
    fn default() -> Self {
        Self {
            base_url: default_geocoder_url(),
            user_agent: default_user_agent(),
            timeout_secs: default_timeout(),
            cache_capacity: default_cache_capacity(),
        }
    }
}

fn default_geocoder_url() -> String {
    "https://nominatim.openstreetmap.org".to_string()
}

fn default_user_agent() -> String {
    format!("navisafe/{}", env!("CARGO_PKG_VERSION"))
}

fn default_cache_capacity() -> usize {
    1024
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingConfig {
    #[serde(default = "default_routing_url")]
    pub base_url: String,

    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            base_url: default_routing_url(),
            timeout_secs: default_timeout(),
        }
    }
}

fn default_routing_url() -> String {
    "https://router.project-osrm.org".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BriefingConfig {
    #[serde(default = "default_briefing_url")]
    pub base_url: String,

    #[serde(default = "default_model")]
    pub model: String,

    /// Without a key every briefing uses the fallback template
    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

impl Default for BriefingConfig {
    fn default() -> Self {
        Self {
            base_url: default_briefing_url(),
            model: default_model(),
            api_key: None,
            timeout_secs: default_timeout(),
        }
    }
}

fn default_briefing_url() -> String {
    "https://generativelanguage.googleapis.com".to_string()
}

fn default_model() -> String {
    "gemini-1.5-flash".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// JSON file holding reported black spots; `None` keeps them in memory only
    #[serde(default = "default_store_path")]
    pub path: Option<PathBuf>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_store_path(),
        }
    }
}

fn default_store_path() -> Option<PathBuf> {
    Some(PathBuf::from("data/blackspots.json"))
}

fn default_timeout() -> u64 {
    10
}

impl Config {
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject numbers that would silently turn detection or ranking off.
    pub fn validate(&self) -> Result<()> {
        let detection = &self.detection;
        if !detection.threshold_m.is_finite() || detection.threshold_m < 0.0 {
            return Err(NaviError::InvalidInput(format!(
                "detection.threshold_m must be a non-negative number, got {}",
                detection.threshold_m
            )));
        }
        if let Some(spacing) = detection.densify_spacing_m {
            if !spacing.is_finite() || spacing < 0.0 {
                return Err(NaviError::InvalidInput(format!(
                    "detection.densify_spacing_m must be a non-negative number, got {}",
                    spacing
                )));
            }
        }
        if Resolution::try_from(detection.heat_resolution).is_err() {
            return Err(NaviError::InvalidInput(format!(
                "detection.heat_resolution must be between 0 and 15, got {}",
                detection.heat_resolution
            )));
        }
        if !self.ranking.risk_penalty_s.is_finite() || self.ranking.risk_penalty_s < 0.0 {
            return Err(NaviError::InvalidInput(format!(
                "ranking.risk_penalty_s must be a non-negative number, got {}",
                self.ranking.risk_penalty_s
            )));
        }
        Ok(())
    }

    /// Explicit path, else `NAVISAFE_CONFIG`, else `navisafe.toml` if present,
    /// else defaults. Environment overrides are applied last.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let resolved = path
            .map(Path::to_path_buf)
            .or_else(|| std::env::var_os(CONFIG_ENV).map(PathBuf::from))
            .or_else(|| {
                let default = PathBuf::from(DEFAULT_CONFIG_PATH);
                default.exists().then_some(default)
            });

        let mut config = match resolved {
            Some(path) => {
                info!("Loading config from {}", path.display());
                Self::from_toml_str(&fs::read_to_string(&path)?)?
            }
            None => {
                info!("No config file found, using defaults");
                Self::default()
            }
        };

        config.apply_env_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(key) = lookup("GEMINI_API_KEY").filter(|k| !k.trim().is_empty()) {
            self.briefing.api_key = Some(key);
        }
        if let Some(bind) = lookup("NAVISAFE_BIND").filter(|b| !b.trim().is_empty()) {
            self.server.bind = bind;
        }
    }
}
