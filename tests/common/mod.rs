//! Shared helpers for the integration tests: a local stand-in for the
//! weather and warnings providers, plus config pointing at it.
//!
//! `ingest::fixtures` has a similar mock server for unit tests, but it is
//! `#[cfg(test)]` and so not compiled into the library these tests link
//! against. This one adds what the integration tests need on top: a
//! provider that can be switched off mid-test and request counters.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

use floodrisk_service::config::{ServiceConfig, SourceConfig};
use tiny_http::{Header, Response, Server};

/// Nothing listens on the discard port.
pub const UNREACHABLE: &str = "http://127.0.0.1:9";

/// Heavy rain under a low: 12 mm/h, 92 % humidity, 995 hPa.
pub const CURRENT_STORM: &str = r#"{
  "current": {
    "time": 1720000800,
    "temperature_2m": 26.5,
    "relative_humidity_2m": 92,
    "surface_pressure": 995.0,
    "weather_code": 65,
    "precipitation": 12.0
  }
}"#;

pub const CURRENT_DRY: &str = r#"{
  "current": {
    "time": 1720000800,
    "temperature_2m": 31.0,
    "relative_humidity_2m": 60,
    "surface_pressure": 1010.0,
    "weather_code": 1,
    "precipitation": 0.0
  }
}"#;

pub const FORECAST: &str = r#"{
  "hourly": {
    "time": [1720000800, 1720004400, 1720008000, 1720011600, 1720015200, 1720018800, 1720022400],
    "temperature_2m": [26.5, 26.1, 25.8, 25.6, 25.5, 25.4, 25.2],
    "precipitation_probability": [95, 90, 80, 70, 50, 40, 30],
    "precipitation": [12.0, 9.5, 6.0, 3.1, 1.0, 0.2, 0.0],
    "weather_code": [65, 65, 63, 61, 80, 3, 3]
  }
}"#;

/// One open-ended red warning for Kamrup Metropolitan.
pub const WARNINGS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0">
  <channel>
    <title>public alerts</title>
    <item>
      <title>Red alert: extremely heavy rainfall</title>
      <description>Extremely heavy rainfall likely over Kamrup Metropolitan.</description>
      <pubDate>Wed, 03 Jul 2024 06:00:00 GMT</pubDate>
      <severity>Severe</severity>
      <area>Kamrup Metropolitan</area>
    </item>
  </channel>
</rss>"#;

pub struct Reply {
    pub status: u16,
    pub content_type: &'static str,
    pub body: String,
}

impl Reply {
    pub fn json(status: u16, body: &str) -> Self {
        Self { status, content_type: "application/json", body: body.to_string() }
    }

    pub fn xml(body: &str) -> Self {
        Self { status: 200, content_type: "application/rss+xml", body: body.to_string() }
    }
}

/// Serves `handler` on an ephemeral local port; returns the base URL.
pub fn spawn_provider<F>(handler: F) -> String
where
    F: Fn(&str) -> Reply + Send + Sync + 'static,
{
    let server = Server::http("127.0.0.1:0").expect("bind provider");
    let addr = server.server_addr().to_ip().expect("provider has an IP address");
    let handler = Arc::new(handler);

    thread::spawn(move || {
        for request in server.incoming_requests() {
            let handler = Arc::clone(&handler);
            thread::spawn(move || {
                let reply = handler(request.url());
                let header = Header::from_bytes(&b"Content-Type"[..], reply.content_type.as_bytes())
                    .expect("valid header");
                let response = Response::from_string(reply.body)
                    .with_status_code(reply.status)
                    .with_header(header);
                let _ = request.respond(response);
            });
        }
    });

    format!("http://{}", addr)
}

/// Routes warnings, forecast and current requests the way the live
/// providers are split.
pub fn route(url: &str, current: &str) -> Reply {
    if url.starts_with("/rss") {
        Reply::xml(WARNINGS)
    } else if url.contains("hourly=") {
        Reply::json(200, FORECAST)
    } else {
        Reply::json(200, current)
    }
}

/// A provider that can be switched off mid-test and counts requests.
pub struct Switchable {
    pub base: String,
    pub up: Arc<AtomicBool>,
    pub hits: Arc<AtomicUsize>,
}

impl Switchable {
    pub fn start(current: &'static str) -> Self {
        let up = Arc::new(AtomicBool::new(true));
        let hits = Arc::new(AtomicUsize::new(0));
        let (up_flag, counter) = (Arc::clone(&up), Arc::clone(&hits));
        let base = spawn_provider(move |url| {
            counter.fetch_add(1, Ordering::SeqCst);
            if up_flag.load(Ordering::SeqCst) {
                route(url, current)
            } else {
                Reply::json(503, r#"{"error":"maintenance"}"#)
            }
        });
        Self { base, up, hits }
    }

    pub fn set_up(&self, up: bool) {
        self.up.store(up, Ordering::SeqCst);
    }

    pub fn warnings_url(&self) -> String {
        format!("{}/rss.xml", self.base)
    }
}

/// Default config with every provider pointed at `weather_base` and
/// `warnings_url`, no secondary provider and a fixed fallback seed.
pub fn config_for(weather_base: &str, warnings_url: &str) -> ServiceConfig {
    let mut config = ServiceConfig::default();
    config.sources.open_meteo = SourceConfig::new("open-meteo", weather_base, 3);
    config.sources.openweather = None;
    config.sources.warnings = SourceConfig::new("sachet-cap", warnings_url, 3);
    config.forecast.fallback_seed = Some(42);
    config
}
