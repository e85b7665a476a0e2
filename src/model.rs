/// Core data types for the flood risk service.
///
/// This module defines the shared domain model imported by all other modules:
/// normalized weather, forecasts, warnings, water level estimates, zone
/// risks, the unified aggregation result and the persisted cache entry.
/// It contains no I/O; the only logic is small helpers on the types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

// ---------------------------------------------------------------------------
// Source tags
// ---------------------------------------------------------------------------

/// Source tag carried by every value produced by a fallback generator.
pub const SOURCE_FALLBACK: &str = "fallback";

/// Source tag for the synthesized state published before any data exists.
pub const SOURCE_DEFAULT: &str = "default";

// ---------------------------------------------------------------------------
// Geography
// ---------------------------------------------------------------------------

/// WGS84 coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }

    /// Plain-text form handed to collaborators, e.g. `"26.1445N, 91.7362E"`.
    pub fn to_text(&self) -> String {
        let ns = if self.latitude >= 0.0 { 'N' } else { 'S' };
        let ew = if self.longitude >= 0.0 { 'E' } else { 'W' };
        format!(
            "{:.4}{}, {:.4}{}",
            self.latitude.abs(),
            ns,
            self.longitude.abs(),
            ew
        )
    }
}

/// English text with its Assamese counterpart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalizedText {
    pub en: String,
    #[serde(rename = "as")]
    pub assamese: String,
}

impl LocalizedText {
    pub fn new(en: impl Into<String>, assamese: impl Into<String>) -> Self {
        Self {
            en: en.into(),
            assamese: assamese.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Weather
// ---------------------------------------------------------------------------

/// Provider-agnostic weather condition code.
///
/// Every provider adapter maps its own code space onto this one through a
/// total lookup table; anything unrecognized becomes `Cloudy`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeatherCondition {
    Clear,
    PartlyCloudy,
    Cloudy,
    Fog,
    Drizzle,
    Rain,
    HeavyRain,
    Thunderstorm,
    Snow,
}

impl WeatherCondition {
    /// Condition implied by a rain rate alone, used where a provider gives
    /// precipitation but no condition code.
    pub fn from_rain_intensity(mm_per_hour: f64) -> Self {
        if mm_per_hour >= 7.5 {
            WeatherCondition::HeavyRain
        } else if mm_per_hour >= 1.0 {
            WeatherCondition::Rain
        } else if mm_per_hour > 0.0 {
            WeatherCondition::Drizzle
        } else {
            WeatherCondition::PartlyCloudy
        }
    }
}

/// Current conditions at a point, normalized from any provider.
///
/// All numeric fields are always defined; adapters resolve missing values
/// to documented defaults before building a snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherSnapshot {
    pub temperature_c: f64,
    pub feels_like_c: f64,
    pub humidity_pct: f64,
    pub wind_speed_kmh: f64,
    pub wind_direction_deg: f64,
    pub pressure_hpa: f64,
    pub visibility_km: f64,
    pub condition: WeatherCondition,
    /// Current rain rate in mm/h.
    pub rain_intensity_mm: f64,
    pub cloud_cover_pct: f64,
    pub uv_index: f64,
    pub timestamp: DateTime<Utc>,
    pub source: String,
}

/// One future time slice of a forecast.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastEntry {
    pub time: DateTime<Utc>,
    pub temperature_c: f64,
    /// Probability of precipitation, 0–100.
    pub rain_probability_pct: f64,
    /// Expected precipitation in mm for the slice.
    pub rain_intensity_mm: f64,
    pub condition: WeatherCondition,
}

// ---------------------------------------------------------------------------
// Warnings
// ---------------------------------------------------------------------------

/// Severity tier of an official weather warning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningSeverity {
    Low,
    Medium,
    High,
}

/// An official weather warning for a district.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Warning {
    pub district: String,
    pub description: String,
    /// `None` means the warning is already in effect.
    pub onset: Option<DateTime<Utc>>,
    /// `None` means the warning stays in effect until withdrawn.
    pub expiry: Option<DateTime<Utc>>,
    pub severity: WarningSeverity,
    pub category: String,
    pub source: String,
}

impl Warning {
    /// True if `now` falls inside the warning's validity window.
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        let started = self.onset.map_or(true, |onset| onset <= now);
        let not_expired = self.expiry.map_or(true, |expiry| now <= expiry);
        started && not_expired
    }
}

// ---------------------------------------------------------------------------
// Risk tiers
// ---------------------------------------------------------------------------

/// Water level status relative to a station's danger level, ascending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WaterStatus {
    Normal,
    Alert,
    Warning,
    Danger,
}

/// Weather and combined risk tier, ascending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

/// Direction the estimated river level is heading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trend {
    Rising,
    Stable,
}

// ---------------------------------------------------------------------------
// Water level and zone risk
// ---------------------------------------------------------------------------

/// Estimated river level at the station governing a zone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaterLevelEstimate {
    pub station_id: String,
    pub station_name: LocalizedText,
    pub estimated_level_m: f64,
    pub danger_level_m: f64,
    pub historical_max_m: f64,
    pub status: WaterStatus,
    pub trend: Trend,
    pub rainfall_24h_mm: f64,
    pub estimated_rise_m: f64,
    pub time_to_peak_hours: u32,
    pub last_updated: DateTime<Utc>,
    /// False only when the level started from a directly observed reading.
    pub is_estimated: bool,
    pub provenance: String,
}

/// Combined flood risk for one zone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZoneRisk {
    pub zone_id: String,
    pub district: String,
    pub water_level: WaterLevelEstimate,
    pub weather_risk: RiskLevel,
    pub overall_risk: RiskLevel,
    pub recommended_action: LocalizedText,
}

/// Merged output of one aggregation call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnifiedWeatherResult {
    pub current: WeatherSnapshot,
    pub forecast: Vec<ForecastEntry>,
    pub warnings: Vec<Warning>,
    pub zone_id: String,
    pub risk_level: RiskLevel,
    pub updated_at: DateTime<Utc>,
    /// Set when the current conditions came from the fallback generator.
    #[serde(default)]
    pub is_fallback: bool,
}

/// Last-known-good state for one zone, persisted across restarts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub zone_id: String,
    pub weather: UnifiedWeatherResult,
    pub water_level: WaterLevelEstimate,
    pub zone_risks: Vec<ZoneRisk>,
    pub captured_at: DateTime<Utc>,
}

impl CacheEntry {
    /// Storage key, namespaced by zone.
    pub fn key_for(zone_id: &str) -> String {
        format!("floodrisk:zone:{}", zone_id)
    }
}

/// Plain-data location context handed to the citizen-report and alert
/// broadcast backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationContext {
    pub zone_id: String,
    pub zone_name: String,
    pub district: String,
    pub coordinates: String,
    pub overall_risk: RiskLevel,
    pub water_status: WaterStatus,
    pub recommended_action: LocalizedText,
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors raised anywhere in the fetch → adapt → estimate → classify chain.
///
/// Provider failures (`Transport`, `Timeout`, `HttpStatus`, `Format`) are
/// absorbed by the aggregator and never reach a consumer directly.
#[derive(Debug, Error)]
pub enum FloodError {
    /// Network unreachable, connection reset, body read failure.
    #[error("{provider}: transport error: {message}")]
    Transport { provider: String, message: String },

    /// The bounded wait for a provider was exceeded.
    #[error("{provider}: no response within {timeout:?}")]
    Timeout { provider: String, timeout: Duration },

    /// Non-2xx HTTP response.
    #[error("{provider}: HTTP {status}")]
    HttpStatus { provider: String, status: u16 },

    /// Payload shape unexpected: wrong content type, malformed JSON/XML,
    /// missing required field.
    #[error("format error: {0}")]
    Format(String),

    /// Invalid numeric input to a classifier.
    #[error("classification error: {0}")]
    Classification(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("cache error: {0}")]
    Cache(String),

    #[error("database error: {0}")]
    Database(String),
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
