/// HTTP endpoint for the published zone state
///
/// Thin JSON view over a running `RefreshScheduler` for dashboards and the
/// citizen-report backend. Routing is a pure function of method, path and
/// scheduler state, so it is testable without a socket.
///
/// Endpoints:
/// - GET  /health                 - Service health check
/// - GET  /zone                   - Full published state
/// - GET  /zone/risks             - Risk for every configured zone
/// - GET  /zone/{id}/context      - Location context for one zone
/// - POST /refresh                - Request a manual refresh
/// - POST /connectivity/offline   - Report loss of connectivity
/// - POST /connectivity/online    - Report restored connectivity

use serde_json::{json, Value};
use tiny_http::{Header, Method, Response, StatusCode};
use tracing::warn;

use crate::scheduler::SchedulerHandle;
use crate::zones::{find_zone, location_context, ZoneConfig};

const ENDPOINTS: [&str; 7] = [
    "GET /health",
    "GET /zone",
    "GET /zone/risks",
    "GET /zone/{id}/context",
    "POST /refresh",
    "POST /connectivity/offline",
    "POST /connectivity/online",
];

/// What the endpoint serves from.
#[derive(Clone)]
pub struct EndpointContext {
    pub scheduler: SchedulerHandle,
    pub zones: Vec<ZoneConfig>,
}

// ---------------------------------------------------------------------------
// Routing
// ---------------------------------------------------------------------------

fn to_json<T: serde::Serialize>(value: &T) -> (u16, Value) {
    match serde_json::to_value(value) {
        Ok(v) => (200, v),
        Err(e) => (500, json!({ "error": format!("serialization failed: {}", e) })),
    }
}

fn not_found() -> (u16, Value) {
    (
        404,
        json!({
            "error": "Not found",
            "available_endpoints": ENDPOINTS,
        }),
    )
}

fn accepted(status: &str) -> (u16, Value) {
    (202, json!({ "status": status }))
}

fn handle_health(ctx: &EndpointContext) -> (u16, Value) {
    let state = ctx.scheduler.snapshot();
    (
        200,
        json!({
            "status": "ok",
            "service": "floodrisk_service",
            "version": env!("CARGO_PKG_VERSION"),
            "zone": state.zone_id,
            "phase": state.phase.label(),
            "scheduler_running": ctx.scheduler.is_running(),
        }),
    )
}

fn handle_context(ctx: &EndpointContext, zone_id: &str) -> (u16, Value) {
    let Some(zone) = find_zone(&ctx.zones, zone_id) else {
        return (404, json!({ "error": "Unknown zone", "zone_id": zone_id }));
    };
    let state = ctx.scheduler.snapshot();
    match state.zone_risks.iter().find(|r| r.zone_id == zone.id) {
        Some(risk) => to_json(&location_context(zone, risk)),
        None => (
            503,
            json!({ "error": "No risk assessment available yet", "zone_id": zone.id }),
        ),
    }
}

/// Maps a request to a status code and JSON body.
pub fn route(method: &Method, url: &str, ctx: &EndpointContext) -> (u16, Value) {
    let path = url.split('?').next().unwrap_or("").trim_end_matches('/');
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

    match (method, segments.as_slice()) {
        (Method::Get, ["health"]) => handle_health(ctx),
        (Method::Get, ["zone"]) => to_json(&ctx.scheduler.snapshot()),
        (Method::Get, ["zone", "risks"]) => to_json(&ctx.scheduler.snapshot().zone_risks),
        (Method::Get, ["zone", id, "context"]) => handle_context(ctx, id),
        (Method::Post, ["refresh"]) => {
            ctx.scheduler.refresh();
            accepted("refresh requested")
        }
        (Method::Post, ["connectivity", "offline"]) => {
            ctx.scheduler.set_online(false);
            accepted("offline")
        }
        (Method::Post, ["connectivity", "online"]) => {
            ctx.scheduler.set_online(true);
            accepted("online")
        }
        _ => not_found(),
    }
}

// ---------------------------------------------------------------------------
// HTTP Server
// ---------------------------------------------------------------------------

/// Serves `ctx` on `0.0.0.0:port` until the process exits.
pub fn start_endpoint_server(port: u16, ctx: EndpointContext) -> Result<(), String> {
    let server = tiny_http::Server::http(format!("0.0.0.0:{}", port))
        .map_err(|e| format!("Failed to start HTTP server: {}", e))?;

    println!("📡 HTTP endpoint listening on http://0.0.0.0:{}", port);
    for endpoint in ENDPOINTS {
        println!("   {}", endpoint);
    }
    println!();

    for request in server.incoming_requests() {
        let (status, body) = route(request.method(), request.url(), &ctx);
        if let Err(e) = request.respond(create_response(status, &body)) {
            warn!(error = %e, "failed to send response");
        }
    }

    Ok(())
}

/// Create HTTP response with JSON body
fn create_response(status_code: u16, json: &Value) -> Response<std::io::Cursor<Vec<u8>>> {
    let body = serde_json::to_string_pretty(json).unwrap_or_else(|_| "{}".to_string());
    let mut response =
        Response::from_data(body.into_bytes()).with_status_code(StatusCode::from(status_code));
    if let Ok(header) = Header::from_bytes(&b"Content-Type"[..], &b"application/json"[..]) {
        response = response.with_header(header);
    }
    response
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregator::Aggregator;
    use crate::cache::tests::sample_entry;
    use crate::cache::{CacheStore, MemoryCacheStore};
    use crate::config::{ServiceConfig, SourceConfig};
    use crate::scheduler::{RefreshScheduler, Timers};
    use crate::zones::default_zones;
    use std::sync::Arc;
    use std::time::Duration;

    fn scheduler(store: MemoryCacheStore) -> RefreshScheduler {
        let mut config = ServiceConfig::default();
        config.sources.open_meteo = SourceConfig::new("open-meteo", "http://127.0.0.1:9", 1);
        config.sources.openweather = None;
        config.sources.warnings = SourceConfig::new("sachet-cap", "http://127.0.0.1:9", 1);
        let never = Duration::from_secs(3600);
        RefreshScheduler::start_with_timers(
            Timers {
                startup_delay: never,
                full_refresh: never,
                warnings_refresh: never,
            },
            "jalukbari",
            Arc::new(Aggregator::new(&config).unwrap()),
            Box::new(store),
        )
    }

    fn context(scheduler: &RefreshScheduler) -> EndpointContext {
        EndpointContext {
            scheduler: scheduler.handle(),
            zones: default_zones(),
        }
    }

    #[test]
    fn test_health() {
        let s = scheduler(MemoryCacheStore::new());
        let (status, body) = route(&Method::Get, "/health", &context(&s));
        assert_eq!(status, 200);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["phase"], "cold");
        assert_eq!(body["scheduler_running"], true);
    }

    #[test]
    fn test_zone_state_serializes_phase_and_flags() {
        let s = scheduler(MemoryCacheStore::new());
        let (status, body) = route(&Method::Get, "/zone?verbose=1", &context(&s));
        assert_eq!(status, 200);
        assert_eq!(body["zone_id"], "jalukbari");
        assert_eq!(body["phase"], "cold");
        assert_eq!(body["offline"], false);
        assert!(body["weather"]["current"].is_object());
    }

    #[test]
    fn test_cold_start_serves_default_risks() {
        let s = scheduler(MemoryCacheStore::new());
        let (status, body) = route(&Method::Get, "/zone/jalukbari/context", &context(&s));
        assert_eq!(status, 200);
        assert_eq!(body["overall_risk"], "low");
        assert_eq!(body["water_status"], "normal");

        let (status, body) = route(&Method::Get, "/zone/risks", &context(&s));
        assert_eq!(status, 200);
        assert_eq!(body.as_array().map(|a| a.len()), Some(13));

        let (status, body) = route(&Method::Get, "/zone/atlantis/context", &context(&s));
        assert_eq!(status, 404);
        assert_eq!(body["zone_id"], "atlantis");
    }

    #[test]
    fn test_context_from_cached_risks() {
        let mut store = MemoryCacheStore::new();
        let mut entry = sample_entry("jalukbari");
        let agg = Aggregator::new(&ServiceConfig::default()).unwrap();
        entry.zone_risks = agg.calculate_zone_risks(&entry.weather).unwrap();
        store.save(&entry).unwrap();

        let s = scheduler(store);
        let (status, body) = route(&Method::Get, "/zone/pandu/context", &context(&s));
        assert_eq!(status, 200);
        assert_eq!(body["zone_name"], "Pandu");
        assert_eq!(body["district"], "Kamrup Metropolitan");
        assert_eq!(body["overall_risk"], "low");

        let (status, body) = route(&Method::Get, "/zone/risks", &context(&s));
        assert_eq!(status, 200);
        assert_eq!(body.as_array().map(|a| a.len()), Some(13));
    }

    #[test]
    fn test_connectivity_routes_reach_the_scheduler() {
        let s = scheduler(MemoryCacheStore::new());
        let ctx = context(&s);
        let rx = s.subscribe();
        let (status, _) = route(&Method::Post, "/connectivity/offline", &ctx);
        assert_eq!(status, 202);

        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        loop {
            let state = rx
                .recv_timeout(deadline.saturating_duration_since(std::time::Instant::now()))
                .expect("offline state published");
            if state.offline {
                break;
            }
        }
    }

    #[test]
    fn test_unknown_route_lists_endpoints() {
        let s = scheduler(MemoryCacheStore::new());
        let (status, body) = route(&Method::Get, "/site/05568500", &context(&s));
        assert_eq!(status, 404);
        assert_eq!(body["available_endpoints"].as_array().map(|a| a.len()), Some(7));

        let (status, _) = route(&Method::Get, "/refresh", &context(&s));
        assert_eq!(status, 404, "refresh is POST only");
    }
}
