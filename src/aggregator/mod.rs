/// Unified weather aggregation.
///
/// `Aggregator::aggregate` runs three independent pipelines for a zone and
/// merges them into one `UnifiedWeatherResult`:
///
/// ```text
///   current   Open-Meteo ──fail──> OpenWeatherMap (key set) ──fail──> fallback snapshot
///   forecast  Open-Meteo ──fail──> seeded fallback series
///   warnings  warnings feed ──fail──> empty list
/// ```
///
/// The pipelines run on scoped threads and are joined before merging. Each
/// one is bounded by its own source timeout, and a failure or panic in one
/// only swaps that pipeline's output for its fallback. `aggregate` itself
/// cannot fail.
///
/// Zone risks are derived from a unified result with
/// `calculate_zone_risks`, using the current rain rate × 24 as the 24-hour
/// rainfall proxy for every configured zone.

pub mod fallback;

use chrono::Utc;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::sync::Mutex;
use std::thread::{self, ScopedJoinHandle};
use tracing::{debug, warn};

use crate::alert::thresholds::{classify_estimate, combined_risk, recommended_action, weather_risk};
use crate::analysis::water_level::WaterLevelEstimator;
use crate::config::{ServiceConfig, SourcesConfig};
use crate::ingest::{open_meteo, openweather, warnings, SourceClient};
use crate::model::{
    Coordinates, FloodError, ForecastEntry, RiskLevel, UnifiedWeatherResult, Warning,
    WaterLevelEstimate, WeatherSnapshot, ZoneRisk,
};
use crate::stations;
use crate::zones::{find_zone, ZoneConfig};

pub struct Aggregator {
    client: SourceClient,
    sources: SourcesConfig,
    zones: Vec<ZoneConfig>,
    estimator: WaterLevelEstimator,
    horizon: usize,
    rng: Mutex<ChaCha8Rng>,
}

impl Aggregator {
    pub fn new(config: &ServiceConfig) -> Result<Self, FloodError> {
        let rng = match config.forecast.fallback_seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        };
        Ok(Self {
            client: SourceClient::new()?,
            sources: config.sources.clone(),
            zones: config.zones.clone(),
            estimator: WaterLevelEstimator::from_config(&config.estimator),
            horizon: config.forecast.horizon,
            rng: Mutex::new(rng),
        })
    }

    pub fn zones(&self) -> &[ZoneConfig] {
        &self.zones
    }

    pub fn estimator(&self) -> &WaterLevelEstimator {
        &self.estimator
    }

    /// Configured zone, or one placed at the default station when the id
    /// is not configured.
    pub fn resolve_zone(&self, zone_id: &str) -> ZoneConfig {
        match find_zone(&self.zones, zone_id) {
            Some(zone) => zone.clone(),
            None => {
                let station = stations::governing_station(zone_id);
                ZoneConfig::new(
                    zone_id,
                    zone_id,
                    station.district,
                    station.location.latitude,
                    station.location.longitude,
                )
            }
        }
    }

    // ------------------------------------------------------------------
    // Aggregation
    // ------------------------------------------------------------------

    /// Fetches, merges and scores weather for one zone. Never fails.
    pub fn aggregate(&self, zone_id: &str) -> UnifiedWeatherResult {
        let zone = self.resolve_zone(zone_id);
        let location = zone.coordinates();
        debug!(zone = %zone.id, "aggregating");

        let ((current, is_fallback), forecast, warnings) = thread::scope(|s| {
            let current = s.spawn(|| self.current_pipeline(location));
            let forecast = s.spawn(|| self.forecast_pipeline(location));
            let warnings = s.spawn(|| self.warnings_pipeline(&zone.district));
            (
                join_pipeline(current, "current", || {
                    (fallback::fallback_snapshot(Utc::now()), true)
                }),
                join_pipeline(forecast, "forecast", || self.fallback_forecast()),
                join_pipeline(warnings, "warnings", Vec::new),
            )
        });

        let now = Utc::now();
        let risk_level = weather_risk(&current, &warnings, now).unwrap_or_else(|e| {
            warn!(zone = %zone.id, error = %e, "weather risk unavailable; reporting low");
            RiskLevel::Low
        });

        UnifiedWeatherResult {
            current,
            forecast,
            warnings,
            zone_id: zone.id,
            risk_level,
            updated_at: now,
            is_fallback,
        }
    }

    fn current_pipeline(&self, location: Coordinates) -> (WeatherSnapshot, bool) {
        let primary = &self.sources.open_meteo;
        match open_meteo::fetch_current(&self.client, primary, location) {
            Ok(snapshot) => return (snapshot, false),
            Err(e) => warn!(provider = %primary.name, error = %e, "current conditions failed"),
        }

        if let Some(secondary) = self.sources.openweather.as_ref() {
            if secondary.api_key().is_some() {
                match openweather::fetch_current(&self.client, secondary, location) {
                    Ok(snapshot) => return (snapshot, false),
                    Err(e) => {
                        warn!(provider = %secondary.name, error = %e, "current conditions failed")
                    }
                }
            }
        }

        warn!("using fallback current conditions");
        (fallback::fallback_snapshot(Utc::now()), true)
    }

    fn forecast_pipeline(&self, location: Coordinates) -> Vec<ForecastEntry> {
        let source = &self.sources.open_meteo;
        match open_meteo::fetch_forecast(&self.client, source, location, self.horizon) {
            Ok(entries) => entries,
            Err(e) => {
                warn!(provider = %source.name, error = %e, "forecast failed; using fallback series");
                self.fallback_forecast()
            }
        }
    }

    fn warnings_pipeline(&self, district: &str) -> Vec<Warning> {
        let source = &self.sources.warnings;
        warnings::fetch_warnings(&self.client, source, district).unwrap_or_else(|e| {
            warn!(provider = %source.name, error = %e, "warnings unavailable; assuming none");
            Vec::new()
        })
    }

    fn fallback_forecast(&self) -> Vec<ForecastEntry> {
        let mut rng = self.rng.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        fallback::fallback_forecast(&mut *rng, Utc::now(), self.horizon)
    }

    /// Re-fetches warnings only and substitutes them into `previous`,
    /// recomputing the weather risk tier. Fails if the feed fails, so the
    /// caller can keep its previous warnings.
    pub fn refresh_warnings(
        &self,
        previous: &UnifiedWeatherResult,
    ) -> Result<UnifiedWeatherResult, FloodError> {
        let warnings = self.fetch_zone_warnings(&previous.zone_id)?;
        Self::with_warnings(previous, warnings)
    }

    /// Warnings feed items for the zone's district, without fallback.
    pub fn fetch_zone_warnings(&self, zone_id: &str) -> Result<Vec<Warning>, FloodError> {
        let zone = self.resolve_zone(zone_id);
        warnings::fetch_warnings(&self.client, &self.sources.warnings, &zone.district)
    }

    /// `previous` with its warnings replaced and the weather risk tier
    /// recomputed. Everything else, `updated_at` included, is kept.
    pub fn with_warnings(
        previous: &UnifiedWeatherResult,
        warnings: Vec<Warning>,
    ) -> Result<UnifiedWeatherResult, FloodError> {
        let risk_level = weather_risk(&previous.current, &warnings, Utc::now())?;
        Ok(UnifiedWeatherResult {
            warnings,
            risk_level,
            ..previous.clone()
        })
    }

    // ------------------------------------------------------------------
    // Zone risk
    // ------------------------------------------------------------------

    /// 24-hour rainfall proxy used for level estimation.
    pub fn rainfall_24h(unified: &UnifiedWeatherResult) -> f64 {
        unified.current.rain_intensity_mm * 24.0
    }

    /// Water level estimate for the result's own zone.
    pub fn estimate_water_level(&self, unified: &UnifiedWeatherResult) -> WaterLevelEstimate {
        self.estimator
            .estimate(&unified.zone_id, Self::rainfall_24h(unified), None)
    }

    /// Risk for every configured zone, in configuration order.
    pub fn calculate_zone_risks(
        &self,
        unified: &UnifiedWeatherResult,
    ) -> Result<Vec<ZoneRisk>, FloodError> {
        let now = Utc::now();
        let weather = weather_risk(&unified.current, &unified.warnings, now)?;
        let rainfall = Self::rainfall_24h(unified);

        self.zones
            .iter()
            .map(|zone| {
                let estimate = self.estimator.estimate_at(&zone.id, rainfall, None, now);
                let status = classify_estimate(&estimate)?;
                let overall = combined_risk(status, weather);
                Ok(ZoneRisk {
                    zone_id: zone.id.clone(),
                    district: zone.district.clone(),
                    water_level: estimate,
                    weather_risk: weather,
                    overall_risk: overall,
                    recommended_action: recommended_action(overall),
                })
            })
            .collect()
    }
}

fn join_pipeline<T>(
    handle: ScopedJoinHandle<'_, T>,
    name: &str,
    fallback: impl FnOnce() -> T,
) -> T {
    handle.join().unwrap_or_else(|_| {
        warn!(pipeline = name, "pipeline panicked; using fallback");
        fallback()
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
