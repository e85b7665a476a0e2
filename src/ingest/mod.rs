/// Data ingestion from external weather and warning providers.
///
/// `SourceClient` performs exactly one bounded HTTP GET per call and hands
/// back the raw body. Each provider module then owns two things: building
/// its request URL and normalizing its payload into the internal types.
/// All defaulting of missing provider fields happens in those normalizers,
/// using the constants in `defaults`.
///
/// Submodules:
/// - `open_meteo`  — current conditions + hourly forecast (JSON, WMO codes)
/// - `openweather` — secondary current conditions (JSON, OWM condition ids)
/// - `warnings`    — official warnings feed (RSS with CAP fields, XML)
/// - `fixtures` (test only) — representative provider payloads

pub mod open_meteo;
pub mod openweather;
pub mod warnings;

#[cfg(test)]
pub(crate) mod fixtures;

use reqwest::blocking::Client;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use std::time::Duration;
use tracing::debug;

use crate::config::SourceConfig;
use crate::model::FloodError;

/// Values used when a provider omits a field. Applied only inside the
/// provider normalizers.
pub mod defaults {
    pub const TEMPERATURE_C: f64 = 25.0;
    pub const HUMIDITY_PCT: f64 = 70.0;
    pub const WIND_SPEED_KMH: f64 = 0.0;
    pub const WIND_DIRECTION_DEG: f64 = 0.0;
    pub const PRESSURE_HPA: f64 = 1013.0;
    pub const VISIBILITY_KM: f64 = 10.0;
    pub const RAIN_MM: f64 = 0.0;
    pub const CLOUD_COVER_PCT: f64 = 0.0;
    pub const UV_INDEX: f64 = 0.0;
    pub const RAIN_PROBABILITY_PCT: f64 = 0.0;
}

// ---------------------------------------------------------------------------
// Payloads
// ---------------------------------------------------------------------------

/// Body format a provider is expected to answer with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadFormat {
    Json,
    Xml,
}

impl PayloadFormat {
    fn accept_header(self) -> &'static str {
        match self {
            PayloadFormat::Json => "application/json",
            PayloadFormat::Xml => "application/rss+xml, application/xml, text/xml",
        }
    }

    /// True if a `Content-Type` header value is acceptable for this format.
    pub fn matches_content_type(self, content_type: &str) -> bool {
        let ct = content_type.to_ascii_lowercase();
        match self {
            PayloadFormat::Json => ct.contains("json"),
            PayloadFormat::Xml => ct.contains("xml") || ct.contains("rss"),
        }
    }
}

/// Provider-native response body.
#[derive(Debug, Clone)]
pub struct RawPayload {
    pub provider: String,
    pub format: PayloadFormat,
    pub body: String,
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// Builds `base?k=v&k=v` with encoded values.
pub fn build_url(base: &str, params: &[(&str, String)]) -> String {
    if params.is_empty() {
        return base.to_string();
    }
    let query: Vec<String> = params
        .iter()
        .map(|(k, v)| format!("{}={}", k, urlencoding::encode(v)))
        .collect();
    let separator = if base.contains('?') { '&' } else { '?' };
    format!("{}{}{}", base, separator, query.join("&"))
}

/// Performs one bounded request to one provider.
///
/// The timeout comes from the source's configuration and applies to this
/// call alone. There are no internal retries; the caller decides what to
/// do on failure.
#[derive(Debug, Clone)]
pub struct SourceClient {
    http: Client,
}

impl SourceClient {
    pub fn new() -> Result<Self, FloodError> {
        let http = Client::builder()
            .user_agent(concat!("floodrisk_service/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| FloodError::Config(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self { http })
    }

    /// GETs `url` and returns the body.
    ///
    /// # Errors
    /// - `Timeout`: the source's timeout elapsed before the body arrived.
    /// - `Transport`: connection or body read failure.
    /// - `HttpStatus`: any non-2xx status.
    /// - `Format`: the response declared a content type that does not
    ///   match `format`.
    pub fn fetch(
        &self,
        source: &SourceConfig,
        url: &str,
        format: PayloadFormat,
    ) -> Result<RawPayload, FloodError> {
        let timeout = source.timeout();
        debug!(provider = %source.name, timeout_secs = source.timeout_secs, "fetching");

        let response = self
            .http
            .get(url)
            .header(ACCEPT, format.accept_header())
            .timeout(timeout)
            .send()
            .map_err(|e| request_error(&source.name, timeout, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FloodError::HttpStatus {
                provider: source.name.clone(),
                status: status.as_u16(),
            });
        }

        if let Some(content_type) = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
        {
            if !format.matches_content_type(content_type) {
                return Err(FloodError::Format(format!(
                    "{}: unexpected content type '{}'",
                    source.name, content_type
                )));
            }
        }

        let body = response
            .text()
            .map_err(|e| request_error(&source.name, timeout, e))?;

        Ok(RawPayload {
            provider: source.name.clone(),
            format,
            body,
        })
    }
}

fn request_error(provider: &str, timeout: Duration, e: reqwest::Error) -> FloodError {
    if e.is_timeout() {
        FloodError::Timeout {
            provider: provider.to_string(),
            timeout,
        }
    } else {
        FloodError::Transport {
            provider: provider.to_string(),
            message: e.to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
