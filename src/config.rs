/// Service configuration loader - parses floodrisk.toml
///
/// Separates provider endpoints, timeouts, refresh cadences, the estimator
/// baseline and the zone list from code, so they can be tuned without
/// recompiling the service. Every section has a default; a missing file
/// means the built-in configuration.
///
/// Secrets (provider API keys, `DATABASE_URL`) never live in the file. A
/// source names the environment variable holding its key, and `.env` is
/// loaded through `dotenv`.

use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::model::FloodError;
use crate::zones::{default_zones, ZoneConfig};

/// Configuration file looked up in the working directory.
pub const DEFAULT_CONFIG_PATH: &str = "floodrisk.toml";

// ---------------------------------------------------------------------------
// Sections
// ---------------------------------------------------------------------------

/// Root configuration structure for TOML parsing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub region: RegionConfig,
    pub sources: SourcesConfig,
    pub schedule: ScheduleConfig,
    pub estimator: EstimatorConfig,
    pub forecast: ForecastConfig,
    pub cache: CacheConfig,
    pub zones: Vec<ZoneConfig>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            region: RegionConfig::default(),
            sources: SourcesConfig::default(),
            schedule: ScheduleConfig::default(),
            estimator: EstimatorConfig::default(),
            forecast: ForecastConfig::default(),
            cache: CacheConfig::default(),
            zones: default_zones(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RegionConfig {
    /// Zone the daemon publishes when none is given on the command line.
    pub default_zone: String,
}

impl Default for RegionConfig {
    fn default() -> Self {
        Self {
            default_zone: "jalukbari".to_string(),
        }
    }
}

/// One external provider endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Tag attached to data from this provider and used in log lines.
    pub name: String,
    pub base_url: String,
    pub timeout_secs: u64,
    /// Environment variable holding the API key, for providers that need one.
    #[serde(default)]
    pub api_key_env: Option<String>,
    /// Key given directly; takes precedence over `api_key_env`.
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,
}

impl SourceConfig {
    pub fn new(name: &str, base_url: &str, timeout_secs: u64) -> Self {
        Self {
            name: name.to_string(),
            base_url: base_url.to_string(),
            timeout_secs,
            api_key_env: None,
            api_key: None,
        }
    }

    /// Same source with a fixed API key.
    pub fn with_api_key(mut self, key: &str) -> Self {
        self.api_key = Some(key.to_string());
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// The configured key, else the one in `api_key_env`. Empty values
    /// count as unset.
    pub fn api_key(&self) -> Option<String> {
        let configured = self.api_key.clone().filter(|k| !k.trim().is_empty());
        configured.or_else(|| {
            let var = self.api_key_env.as_deref()?;
            env::var(var).ok().filter(|k| !k.trim().is_empty())
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourcesConfig {
    /// Primary provider for current conditions and the forecast.
    pub open_meteo: SourceConfig,
    /// Secondary current-conditions provider, tried when the primary fails
    /// and an API key is available.
    pub openweather: Option<SourceConfig>,
    /// Official warnings feed (RSS/CAP XML).
    pub warnings: SourceConfig,
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            open_meteo: SourceConfig::new("open-meteo", "https://api.open-meteo.com/v1/forecast", 8),
            openweather: Some(SourceConfig {
                api_key_env: Some("OPENWEATHER_API_KEY".to_string()),
                ..SourceConfig::new(
                    "openweather",
                    "https://api.openweathermap.org/data/2.5/weather",
                    8,
                )
            }),
            warnings: SourceConfig::new(
                "sachet-cap",
                "https://sachet.ndma.gov.in/cap_public_website/rss/rss_india.xml",
                10,
            ),
        }
    }
}

/// Refresh cadences.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    /// Delay between start and the first aggregation.
    pub startup_delay_ms: u64,
    pub full_refresh_minutes: u64,
    pub warnings_refresh_minutes: u64,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            startup_delay_ms: 1_500,
            full_refresh_minutes: 15,
            warnings_refresh_minutes: 30,
        }
    }
}

impl ScheduleConfig {
    pub fn startup_delay(&self) -> Duration {
        Duration::from_millis(self.startup_delay_ms)
    }

    pub fn full_refresh_interval(&self) -> Duration {
        Duration::from_secs(self.full_refresh_minutes * 60)
    }

    pub fn warnings_refresh_interval(&self) -> Duration {
        Duration::from_secs(self.warnings_refresh_minutes * 60)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EstimatorConfig {
    /// Fraction of the danger level assumed as the current level when no
    /// gauge reading is available. Stands in for live telemetry.
    pub baseline_ratio: f64,
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        Self { baseline_ratio: 0.6 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ForecastConfig {
    /// Number of forecast slices kept.
    pub horizon: usize,
    /// Seed for the fallback forecast generator. `None` seeds from entropy.
    pub fallback_seed: Option<u64>,
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            horizon: 6,
            fallback_seed: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheBackend {
    File,
    Postgres,
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub backend: CacheBackend,
    /// Directory for the file backend.
    pub directory: PathBuf,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            backend: CacheBackend::File,
            directory: PathBuf::from(".floodrisk-cache"),
        }
    }
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

impl ServiceConfig {
    /// Checks the invariants the rest of the service relies on.
    pub fn validate(&self) -> Result<(), FloodError> {
        let ratio = self.estimator.baseline_ratio;
        if !(ratio > 0.0 && ratio <= 1.0) {
            return Err(FloodError::Config(format!(
                "estimator.baseline_ratio must be in (0, 1], got {}",
                ratio
            )));
        }
        if self.forecast.horizon == 0 {
            return Err(FloodError::Config("forecast.horizon must be at least 1".to_string()));
        }
        if self.schedule.full_refresh_minutes == 0 || self.schedule.warnings_refresh_minutes == 0 {
            return Err(FloodError::Config("refresh cadences must be positive".to_string()));
        }

        let mut sources = vec![&self.sources.open_meteo, &self.sources.warnings];
        sources.extend(self.sources.openweather.as_ref());
        for source in sources {
            if source.timeout_secs == 0 {
                return Err(FloodError::Config(format!(
                    "source '{}' needs a positive timeout",
                    source.name
                )));
            }
        }

        if self.zones.is_empty() {
            return Err(FloodError::Config("at least one zone must be configured".to_string()));
        }
        let mut seen = std::collections::HashSet::new();
        for zone in &self.zones {
            if !seen.insert(zone.id.to_ascii_lowercase()) {
                return Err(FloodError::Config(format!("duplicate zone id '{}'", zone.id)));
            }
        }
        Ok(())
    }
}

/// Parses and validates configuration from a TOML string.
pub fn parse_config(contents: &str) -> Result<ServiceConfig, FloodError> {
    let config: ServiceConfig =
        toml::from_str(contents).map_err(|e| FloodError::Config(e.to_string()))?;
    config.validate()?;
    Ok(config)
}

/// Loads configuration from a TOML file.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<ServiceConfig, FloodError> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)
        .map_err(|e| FloodError::Config(format!("failed to read {}: {}", path.display(), e)))?;
    parse_config(&contents)
}

/// Loads `floodrisk.toml` from the working directory, or the built-in
/// defaults if the file does not exist. Also loads `.env`.
pub fn load_config_default() -> Result<ServiceConfig, FloodError> {
    dotenv::dotenv().ok();
    if Path::new(DEFAULT_CONFIG_PATH).exists() {
        load_config(DEFAULT_CONFIG_PATH)
    } else {
        let config = ServiceConfig::default();
        config.validate()?;
        Ok(config)
    }
}
