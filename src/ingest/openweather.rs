/// OpenWeatherMap current weather client.
///
/// Secondary source for current conditions, used only when Open-Meteo
/// fails and an API key is configured. Requests use `units=metric`, so
/// temperatures arrive in °C and wind speed in m/s.
///
/// API documentation: https://openweathermap.org/current

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::config::SourceConfig;
use crate::ingest::{build_url, defaults, PayloadFormat, RawPayload, SourceClient};
use crate::model::{Coordinates, FloodError, WeatherCondition, WeatherSnapshot};

// ============================================================================
// Response structures
// ============================================================================

#[derive(Debug, Deserialize)]
struct OwmResponse {
    #[serde(default)]
    weather: Vec<OwmCondition>,
    main: Option<OwmMain>,
    /// Metres.
    visibility: Option<f64>,
    wind: Option<OwmWind>,
    clouds: Option<OwmClouds>,
    rain: Option<OwmRain>,
    dt: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct OwmCondition {
    id: i64,
}

#[derive(Debug, Deserialize)]
struct OwmMain {
    temp: Option<f64>,
    feels_like: Option<f64>,
    humidity: Option<f64>,
    pressure: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct OwmWind {
    /// m/s under metric units.
    speed: Option<f64>,
    deg: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct OwmClouds {
    all: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct OwmRain {
    #[serde(rename = "1h")]
    one_hour: Option<f64>,
}

// ============================================================================
// Normalization
// ============================================================================

/// Maps an OpenWeatherMap condition id. Unknown ids read as `Cloudy`.
pub fn condition_from_owm(id: i64) -> WeatherCondition {
    match id {
        200..=232 => WeatherCondition::Thunderstorm,
        300..=321 => WeatherCondition::Drizzle,
        502..=504 | 522 | 531 => WeatherCondition::HeavyRain,
        500..=531 => WeatherCondition::Rain,
        600..=622 => WeatherCondition::Snow,
        701..=762 => WeatherCondition::Fog,
        800 => WeatherCondition::Clear,
        801 | 802 => WeatherCondition::PartlyCloudy,
        _ => WeatherCondition::Cloudy,
    }
}

pub fn build_current_url(source: &SourceConfig, location: Coordinates, api_key: &str) -> String {
    build_url(
        &source.base_url,
        &[
            ("lat", format!("{:.4}", location.latitude)),
            ("lon", format!("{:.4}", location.longitude)),
            ("units", "metric".to_string()),
            ("appid", api_key.to_string()),
        ],
    )
}

pub fn parse_current(payload: &RawPayload) -> Result<WeatherSnapshot, FloodError> {
    let response: OwmResponse = serde_json::from_str(&payload.body)
        .map_err(|e| FloodError::Format(format!("{}: {}", payload.provider, e)))?;
    let main = response.main.ok_or_else(|| {
        FloodError::Format(format!("{}: response has no 'main' block", payload.provider))
    })?;

    let temperature_c = main.temp.unwrap_or(defaults::TEMPERATURE_C);
    let rain_intensity_mm = response
        .rain
        .and_then(|r| r.one_hour)
        .unwrap_or(defaults::RAIN_MM)
        .max(0.0);
    let condition = match response.weather.first() {
        Some(c) => condition_from_owm(c.id),
        None => WeatherCondition::from_rain_intensity(rain_intensity_mm),
    };
    let (wind_speed_kmh, wind_direction_deg) = match response.wind {
        Some(w) => (
            w.speed.map(|ms| ms * 3.6).unwrap_or(defaults::WIND_SPEED_KMH),
            w.deg.unwrap_or(defaults::WIND_DIRECTION_DEG),
        ),
        None => (defaults::WIND_SPEED_KMH, defaults::WIND_DIRECTION_DEG),
    };

    Ok(WeatherSnapshot {
        temperature_c,
        feels_like_c: main.feels_like.unwrap_or(temperature_c),
        humidity_pct: main.humidity.unwrap_or(defaults::HUMIDITY_PCT),
        wind_speed_kmh,
        wind_direction_deg,
        pressure_hpa: main.pressure.unwrap_or(defaults::PRESSURE_HPA),
        visibility_km: response
            .visibility
            .map(|m| m / 1000.0)
            .unwrap_or(defaults::VISIBILITY_KM),
        condition,
        rain_intensity_mm,
        cloud_cover_pct: response
            .clouds
            .and_then(|c| c.all)
            .unwrap_or(defaults::CLOUD_COVER_PCT),
        // Not part of the current weather endpoint.
        uv_index: defaults::UV_INDEX,
        timestamp: response
            .dt
            .and_then(|secs| DateTime::from_timestamp(secs, 0))
            .unwrap_or_else(Utc::now),
        source: payload.provider.clone(),
    })
}

/// Fetches current conditions. Fails with `Config` when no key is set.
pub fn fetch_current(
    client: &SourceClient,
    source: &SourceConfig,
    location: Coordinates,
) -> Result<WeatherSnapshot, FloodError> {
    let api_key = source.api_key().ok_or_else(|| {
        FloodError::Config(format!("{}: no API key configured", source.name))
    })?;
    let url = build_current_url(source, location, &api_key);
    let payload = client.fetch(source, &url, PayloadFormat::Json)?;
    parse_current(&payload)
}

// ============================================================================
// Tests
// ============================================================================
