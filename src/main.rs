//! Flood Risk Service - Main Daemon
//!
//! Keeps one zone's flood risk picture current:
//! 1. Restores the last-known-good state from the cache
//! 2. Refreshes weather, warnings and water levels on a schedule
//! 3. Optionally serves the published state over HTTP
//!
//! Usage:
//!   cargo run --release                                # Default zone, no HTTP endpoint
//!   cargo run --release -- --zone pandu --endpoint 8080
//!   cargo run --release -- --config /etc/floodrisk.toml
//!
//! Environment:
//!   RUST_LOG            - log filter (default floodrisk_service=info)
//!   OPENWEATHER_API_KEY - enables the secondary weather provider
//!   DATABASE_URL        - required when cache.backend = "postgres"

use std::env;
use std::process;
use std::sync::Arc;
use std::thread;

use tracing::info;
use tracing_subscriber::EnvFilter;

use floodrisk_service::aggregator::Aggregator;
use floodrisk_service::cache::open_cache_store;
use floodrisk_service::config::{load_config, load_config_default, ServiceConfig};
use floodrisk_service::endpoint::{self, EndpointContext};
use floodrisk_service::model::FloodError;
use floodrisk_service::scheduler::RefreshScheduler;

struct Args {
    zone: Option<String>,
    endpoint_port: Option<u16>,
    config_path: Option<String>,
}

fn usage(program: &str) -> String {
    format!(
        "Usage: {} [--zone ZONE_ID] [--endpoint PORT] [--config PATH]",
        program
    )
}

fn parse_args(args: &[String]) -> Result<Args, String> {
    let program = args.first().map(String::as_str).unwrap_or("floodrisk_service");
    let mut parsed = Args {
        zone: None,
        endpoint_port: None,
        config_path: None,
    };

    let mut i = 1;
    while i < args.len() {
        let value = args.get(i + 1);
        match (args[i].as_str(), value) {
            ("--zone", Some(v)) => parsed.zone = Some(v.clone()),
            ("--config", Some(v)) => parsed.config_path = Some(v.clone()),
            ("--endpoint", Some(v)) => {
                let port = v
                    .parse()
                    .map_err(|_| format!("--endpoint expects a port number, got '{}'", v))?;
                parsed.endpoint_port = Some(port);
            }
            ("--zone" | "--config" | "--endpoint", None) => {
                return Err(format!("{} requires a value\n{}", args[i], usage(program)));
            }
            (other, _) => {
                return Err(format!("Unknown argument: {}\n{}", other, usage(program)));
            }
        }
        i += 2;
    }
    Ok(parsed)
}

fn load(args: &Args) -> Result<ServiceConfig, FloodError> {
    match &args.config_path {
        Some(path) => {
            dotenv::dotenv().ok();
            load_config(path)
        }
        None => load_config_default(),
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("floodrisk_service=info")),
        )
        .init();

    println!("🌊 Flood Risk Service");
    println!("=====================\n");

    let raw: Vec<String> = env::args().collect();
    let args = match parse_args(&raw) {
        Ok(args) => args,
        Err(e) => {
            eprintln!("{}", e);
            process::exit(1);
        }
    };

    let config = match load(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("\n❌ Configuration error: {}\n", e);
            process::exit(1);
        }
    };
    let zone_id = args
        .zone
        .clone()
        .unwrap_or_else(|| config.region.default_zone.clone());

    let cache = match open_cache_store(&config.cache) {
        Ok(cache) => cache,
        Err(e) => {
            eprintln!("\n❌ Cache unavailable: {}\n", e);
            process::exit(1);
        }
    };
    let aggregator = match Aggregator::new(&config) {
        Ok(aggregator) => Arc::new(aggregator),
        Err(e) => {
            eprintln!("\n❌ Failed to build HTTP client: {}\n", e);
            process::exit(1);
        }
    };

    println!("📍 Zone: {}", zone_id);
    println!("💾 Cache: {}", cache.name());
    println!(
        "⏱  Refresh: every {} min (warnings every {} min)\n",
        config.schedule.full_refresh_minutes, config.schedule.warnings_refresh_minutes
    );

    let scheduler = RefreshScheduler::start(&config, &zone_id, aggregator, cache);
    info!(zone = %zone_id, phase = scheduler.snapshot().phase.label(), "scheduler started");

    match args.endpoint_port {
        Some(port) => {
            let ctx = EndpointContext {
                scheduler: scheduler.handle(),
                zones: config.zones.clone(),
            };
            if let Err(e) = endpoint::start_endpoint_server(port, ctx) {
                eprintln!("\n❌ {}\n", e);
                process::exit(1);
            }
        }
        None => loop {
            thread::park();
        },
    }
}
