/// Test fixtures: representative provider payloads and a local mock
/// provider.
///
/// The payloads are trimmed to the fields the normalizers read, in the
/// shapes the live providers return:
///
///   Open-Meteo (timeformat=unixtime):
///     current.{time, temperature_2m, apparent_temperature, weather_code, ...}
///     hourly.{time[], temperature_2m[], precipitation_probability[], ...}
///
///   OpenWeatherMap current weather (units=metric):
///     weather[0].id, main.{temp, feels_like, humidity, pressure},
///     wind.{speed (m/s), deg}, clouds.all, rain.1h, visibility (m), dt
///
///   Warnings feed: RSS 2.0 with per-item CAP fields
///     channel.item[].{title, description, pubDate, severity, area,
///     effective, expires}
///
/// Timestamps are around 2024-07-03T10:00:00Z (unix 1720000800).

use std::sync::Arc;
use std::thread;

use tiny_http::{Header, Response, Server};

pub(crate) const FIXTURE_EPOCH: i64 = 1_720_000_800;

/// Moderate rain over Guwahati. 4.2 mm/h, WMO code 63.
pub(crate) fn fixture_open_meteo_current_json() -> &'static str {
    r#"{
      "latitude": 26.125,
      "longitude": 91.75,
      "timezone": "GMT",
      "current_units": { "time": "unixtime", "temperature_2m": "°C", "visibility": "m" },
      "current": {
        "time": 1720000800,
        "interval": 900,
        "temperature_2m": 29.4,
        "apparent_temperature": 35.1,
        "relative_humidity_2m": 88,
        "wind_speed_10m": 11.2,
        "wind_direction_10m": 200,
        "surface_pressure": 1002.6,
        "visibility": 8000,
        "weather_code": 63,
        "precipitation": 4.2,
        "rain": 4.2,
        "cloud_cover": 92,
        "uv_index": 2.5
      }
    }"#
}

/// Only temperature and time present; everything else must default.
pub(crate) fn fixture_open_meteo_sparse_current_json() -> &'static str {
    r#"{
      "latitude": 26.125,
      "longitude": 91.75,
      "current": { "time": 1720000800, "temperature_2m": 27.0 }
    }"#
}

/// Eight hourly slices. Slice 2 has nulls; slice 3 carries an unknown
/// WMO code (42).
pub(crate) fn fixture_open_meteo_forecast_json() -> &'static str {
    r#"{
      "latitude": 26.125,
      "longitude": 91.75,
      "hourly": {
        "time": [1720000800, 1720004400, 1720008000, 1720011600, 1720015200, 1720018800, 1720022400, 1720026000],
        "temperature_2m": [29.4, 29.0, null, 28.1, 27.6, 27.2, 26.9, 26.5],
        "precipitation_probability": [90, 85, null, 60, 40, 35, 20, 10],
        "precipitation": [4.2, 8.1, null, 0.6, 0.0, 0.0, 0.0, 0.0],
        "weather_code": [63, 65, null, 42, 3, 2, 1, 0]
      }
    }"#
}

/// Heavy thunderstorm reported by OpenWeatherMap (id 202).
pub(crate) fn fixture_openweather_current_json() -> &'static str {
    r#"{
      "coord": { "lon": 91.7362, "lat": 26.1445 },
      "weather": [{ "id": 202, "main": "Thunderstorm", "description": "thunderstorm with heavy rain", "icon": "11d" }],
      "main": { "temp": 27.8, "feels_like": 31.9, "temp_min": 27.0, "temp_max": 28.5, "pressure": 1000, "humidity": 94 },
      "visibility": 4000,
      "wind": { "speed": 5.0, "deg": 180 },
      "clouds": { "all": 100 },
      "rain": { "1h": 12.5 },
      "dt": 1720000800,
      "name": "Guwahati"
    }"#
}

/// Three items: a red-coded district warning with CAP fields, an
/// expired item for the same district, and an item for another state.
pub(crate) fn fixture_warnings_rss() -> &'static str {
    r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0">
  <channel>
    <title>SACHET public alerts</title>
    <link>https://sachet.ndma.gov.in</link>
    <description>Common Alerting Protocol alerts</description>
    <item>
      <title>Red alert: extremely heavy rainfall</title>
      <description>Extremely heavy rainfall very likely at isolated places over Kamrup Metropolitan and Kamrup.</description>
      <category>Met</category>
      <author>IMD Guwahati</author>
      <pubDate>Wed, 03 Jul 2024 06:00:00 GMT</pubDate>
      <severity>Severe</severity>
      <area>Kamrup Metropolitan, Kamrup</area>
      <effective>2024-07-03T06:00:00+00:00</effective>
      <expires>2024-07-04T06:00:00+00:00</expires>
    </item>
    <item>
      <title>Yellow alert: thunderstorm with lightning</title>
      <description>Thunderstorm with lightning likely over Kamrup Metropolitan.</description>
      <category>Met</category>
      <pubDate>Mon, 01 Jul 2024 06:00:00 GMT</pubDate>
      <area>Kamrup Metropolitan</area>
      <effective>2024-07-01T06:00:00+00:00</effective>
      <expires>2024-07-01T18:00:00+00:00</expires>
    </item>
    <item>
      <title>Orange alert: heavy rainfall</title>
      <description>Heavy rainfall likely over Kozhikode.</description>
      <category>Met</category>
      <pubDate>Wed, 03 Jul 2024 05:00:00 GMT</pubDate>
      <area>Kozhikode</area>
    </item>
  </channel>
</rss>"#
}

pub(crate) fn fixture_empty_warnings_rss() -> &'static str {
    r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0"><channel><title>SACHET public alerts</title></channel></rss>"#
}

// ---------------------------------------------------------------------------
// Mock provider
// ---------------------------------------------------------------------------

pub(crate) struct MockResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: String,
}

impl MockResponse {
    pub fn new(status: u16, content_type: &str, body: &str) -> Self {
        Self {
            status,
            content_type: Some(content_type.to_string()),
            body: body.to_string(),
        }
    }

    pub fn json(status: u16, body: &str) -> Self {
        Self::new(status, "application/json", body)
    }

    pub fn xml(body: &str) -> Self {
        Self::new(200, "application/rss+xml", body)
    }
}

/// Starts a provider on an ephemeral port and returns its base URL. The
/// handler receives the request path with query string. Each request is
/// answered on its own thread, so a slow response does not hold up others.
pub(crate) fn spawn_mock_server<F>(handler: F) -> String
where
    F: Fn(&str) -> MockResponse + Send + Sync + 'static,
{
    let server = Server::http("127.0.0.1:0").expect("bind mock server");
    let addr = server
        .server_addr()
        .to_ip()
        .expect("mock server has an IP address");
    let handler = Arc::new(handler);

    thread::spawn(move || {
        for request in server.incoming_requests() {
            let handler = Arc::clone(&handler);
            thread::spawn(move || {
                let mock = handler(request.url());
                let mut response =
                    Response::from_string(mock.body).with_status_code(mock.status);
                if let Some(ct) = mock.content_type {
                    let header = Header::from_bytes(&b"Content-Type"[..], ct.as_bytes())
                        .expect("valid header");
                    response = response.with_header(header);
                }
                let _ = request.respond(response);
            });
        }
    });

    format!("http://{}", addr)
}
