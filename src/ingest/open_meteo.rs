/// Open-Meteo forecast API client.
///
/// Primary provider for both current conditions and the hourly forecast.
/// Requests use `timeformat=unixtime` so every timestamp arrives as epoch
/// seconds, and `timezone=GMT` so the hourly grid is aligned to UTC.
///
/// API documentation: https://open-meteo.com/en/docs
///
/// Open-Meteo reports the WMO weather interpretation code (WW) rather than
/// a condition string; `condition_from_wmo` maps every code, including
/// ones the service has never seen, onto a `WeatherCondition`.

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::config::SourceConfig;
use crate::ingest::{build_url, defaults, PayloadFormat, RawPayload, SourceClient};
use crate::model::{Coordinates, FloodError, ForecastEntry, WeatherCondition, WeatherSnapshot};

const CURRENT_FIELDS: &str = "temperature_2m,apparent_temperature,relative_humidity_2m,\
wind_speed_10m,wind_direction_10m,surface_pressure,visibility,weather_code,precipitation,\
rain,cloud_cover,uv_index";

const HOURLY_FIELDS: &str = "temperature_2m,precipitation_probability,precipitation,weather_code";

// ============================================================================
// Response structures
// ============================================================================

#[derive(Debug, Deserialize)]
struct CurrentResponse {
    current: Option<CurrentBlock>,
}

#[derive(Debug, Deserialize)]
struct CurrentBlock {
    time: Option<i64>,
    temperature_2m: Option<f64>,
    apparent_temperature: Option<f64>,
    relative_humidity_2m: Option<f64>,
    wind_speed_10m: Option<f64>,
    wind_direction_10m: Option<f64>,
    surface_pressure: Option<f64>,
    /// Metres.
    visibility: Option<f64>,
    weather_code: Option<i64>,
    precipitation: Option<f64>,
    rain: Option<f64>,
    cloud_cover: Option<f64>,
    uv_index: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct ForecastResponse {
    hourly: Option<HourlyBlock>,
}

#[derive(Debug, Deserialize)]
struct HourlyBlock {
    time: Vec<i64>,
    #[serde(default)]
    temperature_2m: Vec<Option<f64>>,
    #[serde(default)]
    precipitation_probability: Vec<Option<f64>>,
    #[serde(default)]
    precipitation: Vec<Option<f64>>,
    #[serde(default)]
    weather_code: Vec<Option<i64>>,
}

// ============================================================================
// URL construction
// ============================================================================

fn location_params(location: Coordinates) -> Vec<(&'static str, String)> {
    vec![
        ("latitude", format!("{:.4}", location.latitude)),
        ("longitude", format!("{:.4}", location.longitude)),
        ("timezone", "GMT".to_string()),
        ("timeformat", "unixtime".to_string()),
    ]
}

pub fn build_current_url(source: &SourceConfig, location: Coordinates) -> String {
    let mut params = location_params(location);
    params.push(("current", CURRENT_FIELDS.to_string()));
    build_url(&source.base_url, &params)
}

pub fn build_forecast_url(source: &SourceConfig, location: Coordinates, horizon: usize) -> String {
    let mut params = location_params(location);
    params.push(("hourly", HOURLY_FIELDS.to_string()));
    params.push(("forecast_hours", horizon.to_string()));
    build_url(&source.base_url, &params)
}

// ============================================================================
// Normalization
// ============================================================================

/// Maps a WMO weather interpretation code. Unknown codes read as `Cloudy`.
pub fn condition_from_wmo(code: i64) -> WeatherCondition {
    match code {
        0 => WeatherCondition::Clear,
        1 | 2 => WeatherCondition::PartlyCloudy,
        3 => WeatherCondition::Cloudy,
        45 | 48 => WeatherCondition::Fog,
        51 | 53 | 55 | 56 | 57 => WeatherCondition::Drizzle,
        61 | 63 | 66 | 67 | 80 | 81 => WeatherCondition::Rain,
        65 | 82 => WeatherCondition::HeavyRain,
        71 | 73 | 75 | 77 | 85 | 86 => WeatherCondition::Snow,
        95 | 96 | 99 => WeatherCondition::Thunderstorm,
        _ => WeatherCondition::Cloudy,
    }
}

fn timestamp(epoch_secs: Option<i64>) -> DateTime<Utc> {
    epoch_secs
        .and_then(|secs| DateTime::from_timestamp(secs, 0))
        .unwrap_or_else(Utc::now)
}

/// Normalizes a current-conditions payload.
pub fn parse_current(payload: &RawPayload) -> Result<WeatherSnapshot, FloodError> {
    let response: CurrentResponse = serde_json::from_str(&payload.body)
        .map_err(|e| FloodError::Format(format!("{}: {}", payload.provider, e)))?;
    let current = response.current.ok_or_else(|| {
        FloodError::Format(format!("{}: response has no 'current' block", payload.provider))
    })?;

    let temperature_c = current.temperature_2m.unwrap_or(defaults::TEMPERATURE_C);
    let rain_intensity_mm = current
        .precipitation
        .or(current.rain)
        .unwrap_or(defaults::RAIN_MM)
        .max(0.0);
    let condition = match current.weather_code {
        Some(code) => condition_from_wmo(code),
        None => WeatherCondition::from_rain_intensity(rain_intensity_mm),
    };

    Ok(WeatherSnapshot {
        temperature_c,
        feels_like_c: current.apparent_temperature.unwrap_or(temperature_c),
        humidity_pct: current.relative_humidity_2m.unwrap_or(defaults::HUMIDITY_PCT),
        wind_speed_kmh: current.wind_speed_10m.unwrap_or(defaults::WIND_SPEED_KMH),
        wind_direction_deg: current.wind_direction_10m.unwrap_or(defaults::WIND_DIRECTION_DEG),
        pressure_hpa: current.surface_pressure.unwrap_or(defaults::PRESSURE_HPA),
        visibility_km: current
            .visibility
            .map(|m| m / 1000.0)
            .unwrap_or(defaults::VISIBILITY_KM),
        condition,
        rain_intensity_mm,
        cloud_cover_pct: current.cloud_cover.unwrap_or(defaults::CLOUD_COVER_PCT),
        uv_index: current.uv_index.unwrap_or(defaults::UV_INDEX),
        timestamp: timestamp(current.time),
        source: payload.provider.clone(),
    })
}

/// Normalizes an hourly payload into at most `horizon` entries.
///
/// Per-slice gaps take defaults; a payload with no slices at all is a
/// `Format` error.
pub fn parse_forecast(payload: &RawPayload, horizon: usize) -> Result<Vec<ForecastEntry>, FloodError> {
    let response: ForecastResponse = serde_json::from_str(&payload.body)
        .map_err(|e| FloodError::Format(format!("{}: {}", payload.provider, e)))?;
    let hourly = response.hourly.ok_or_else(|| {
        FloodError::Format(format!("{}: response has no 'hourly' block", payload.provider))
    })?;
    if hourly.time.is_empty() {
        return Err(FloodError::Format(format!(
            "{}: hourly block has no time slices",
            payload.provider
        )));
    }

    let at = |series: &Vec<Option<f64>>, i: usize| series.get(i).copied().flatten();

    let entries = hourly
        .time
        .iter()
        .take(horizon)
        .enumerate()
        .filter_map(|(i, &secs)| {
            let time = DateTime::from_timestamp(secs, 0)?;
            let rain_intensity_mm = at(&hourly.precipitation, i)
                .unwrap_or(defaults::RAIN_MM)
                .max(0.0);
            let condition = match hourly.weather_code.get(i).copied().flatten() {
                Some(code) => condition_from_wmo(code),
                None => WeatherCondition::from_rain_intensity(rain_intensity_mm),
            };
            Some(ForecastEntry {
                time,
                temperature_c: at(&hourly.temperature_2m, i).unwrap_or(defaults::TEMPERATURE_C),
                rain_probability_pct: at(&hourly.precipitation_probability, i)
                    .unwrap_or(defaults::RAIN_PROBABILITY_PCT)
                    .clamp(0.0, 100.0),
                rain_intensity_mm,
                condition,
            })
        })
        .collect();

    Ok(entries)
}

// ============================================================================
// Fetching
// ============================================================================

pub fn fetch_current(
    client: &SourceClient,
    source: &SourceConfig,
    location: Coordinates,
) -> Result<WeatherSnapshot, FloodError> {
    let url = build_current_url(source, location);
    let payload = client.fetch(source, &url, PayloadFormat::Json)?;
    parse_current(&payload)
}

pub fn fetch_forecast(
    client: &SourceClient,
    source: &SourceConfig,
    location: Coordinates,
    horizon: usize,
) -> Result<Vec<ForecastEntry>, FloodError> {
    let url = build_forecast_url(source, location, horizon);
    let payload = client.fetch(source, &url, PayloadFormat::Json)?;
    parse_forecast(&payload, horizon)
}

// ============================================================================
// Tests
// ============================================================================
