//! floodrisk_service: flood risk engine for Guwahati and the Kamrup basin.
//!
//! # Module structure
//!
//! ```text
//! floodrisk_service
//! ├── model       — shared data types (WeatherSnapshot, ZoneRisk, CacheEntry, FloodError, …)
//! ├── config      — service configuration loader (floodrisk.toml)
//! ├── stations    — CWC gauge registry with danger and historical maximum levels
//! ├── zones       — monitored localities and their governing stations
//! ├── ingest
//! │   ├── open_meteo  — primary current conditions + hourly forecast
//! │   ├── openweather — secondary current conditions
//! │   ├── warnings    — official warnings feed (RSS/CAP)
//! │   └── fixtures (test only) — representative provider payloads
//! ├── aggregator  — per-zone fan-out over the providers with fallback
//! │   └── fallback — synthetic snapshot and forecast
//! ├── alert
//! │   └── thresholds — water status tiers, weather and combined risk
//! ├── analysis
//! │   └── water_level — rainfall to river level estimation
//! ├── cache       — last-known-good state (file, postgres, memory)
//! ├── db          — PostgreSQL connection + schema check for the cache
//! ├── scheduler   — refresh timers, connectivity phases, published state
//! └── endpoint    — JSON HTTP view over the published state
//! ```

pub mod aggregator;
pub mod alert;
pub mod analysis;
pub mod cache;
pub mod config;
pub mod db;
pub mod endpoint;
pub mod ingest;
pub mod model;
pub mod scheduler;
pub mod stations;
pub mod zones;
