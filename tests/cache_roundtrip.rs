/// Integration tests for the last-known-good cache as the daemon uses it:
/// backends built from `[cache]` config, entries produced from a real
/// aggregation, and recovery from an unreadable cache file.
///
/// The PostgreSQL backend is exercised by the ignored test in
/// `cache::postgres` (needs DATABASE_URL).
///
/// Run with: cargo test --test cache_roundtrip

mod common;

use std::fs;
use std::time::Duration;
use std::sync::Arc;

use chrono::Utc;
use common::*;
use floodrisk_service::aggregator::Aggregator;
use floodrisk_service::cache::{open_cache_store, FileCacheStore};
use floodrisk_service::config::{parse_config, CacheBackend, CacheConfig};
use floodrisk_service::model::{CacheEntry, SOURCE_DEFAULT};
use floodrisk_service::scheduler::{ConnectionPhase, RefreshScheduler, Timers};

fn live_entry(zone_id: &str) -> CacheEntry {
    let base = spawn_provider(|url| route(url, CURRENT_STORM));
    let aggregator = Aggregator::new(&config_for(&base, &format!("{}/rss.xml", base))).unwrap();
    let weather = aggregator.aggregate(zone_id);
    assert!(!weather.is_fallback);
    CacheEntry {
        zone_id: zone_id.to_string(),
        water_level: aggregator.estimate_water_level(&weather),
        zone_risks: aggregator.calculate_zone_risks(&weather).unwrap(),
        weather,
        captured_at: Utc::now(),
    }
}

#[test]
fn test_file_backend_from_config() {
    let dir = tempfile::tempdir().unwrap();
    let config = parse_config(&format!(
        "[cache]\nbackend = \"file\"\ndirectory = \"{}\"\n",
        dir.path().display()
    ))
    .unwrap();
    assert_eq!(config.cache.backend, CacheBackend::File);

    let entry = live_entry("bharalumukh");
    let mut writer = open_cache_store(&config.cache).unwrap();
    assert_eq!(writer.name(), "file");
    writer.save(&entry).unwrap();

    let mut reader = open_cache_store(&config.cache).unwrap();
    assert_eq!(reader.load("bharalumukh").unwrap(), Some(entry));
    assert_eq!(reader.load("zoo-road").unwrap(), None);
}

#[test]
fn test_memory_backend_is_process_local() {
    let config = CacheConfig {
        backend: CacheBackend::Memory,
        ..CacheConfig::default()
    };
    let mut first = open_cache_store(&config).unwrap();
    first.save(&live_entry("uzan-bazar")).unwrap();

    let mut second = open_cache_store(&config).unwrap();
    assert_eq!(second.name(), "memory");
    assert_eq!(second.load("uzan-bazar").unwrap(), None);
}

#[test]
fn test_corrupt_cache_starts_cold() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileCacheStore::new(dir.path());
    fs::write(store.path_for("jalukbari"), "{\"zone_id\": \"jalukbari\"").unwrap();

    let never = Duration::from_secs(3600);
    let aggregator = Arc::new(Aggregator::new(&config_for(UNREACHABLE, UNREACHABLE)).unwrap());
    let scheduler = RefreshScheduler::start_with_timers(
        Timers {
            startup_delay: never,
            full_refresh: never,
            warnings_refresh: never,
        },
        "jalukbari",
        aggregator,
        Box::new(store),
    );
    let state = scheduler.snapshot();
    assert_eq!(state.phase, ConnectionPhase::Cold);
    assert_eq!(state.weather.current.source, SOURCE_DEFAULT);
    assert!(state.last_updated.is_none());
}
