/// Rainfall-to-water-level estimation.
///
/// No live gauge feed is available for the stations in the registry, so the
/// current river level is estimated from 24-hour rainfall:
///
/// 1. Classify rainfall into one of four ordered bands.
/// 2. Look up the band's (rise, time-to-peak) pair in `RAINFALL_CORRELATION`.
/// 3. Add the rise to a starting level: the observed level when one is
///    supplied, otherwise `baseline_ratio` × the station danger level.
///
/// The baseline is a configured stand-in for missing telemetry, not a
/// measurement, and every estimate built on it says so in its provenance.

use chrono::{DateTime, Utc};

use crate::alert::thresholds::status_for_ratio;
use crate::config::EstimatorConfig;
use crate::model::{Trend, WaterLevelEstimate};
use crate::stations::{self, Station};

// ---------------------------------------------------------------------------
// Correlation table
// ---------------------------------------------------------------------------

/// 24-hour rainfall band, in ascending order of intensity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum RainfallBand {
    /// < 10 mm
    Light,
    /// 10 – < 30 mm
    Moderate,
    /// 30 – < 70 mm
    Heavy,
    /// ≥ 70 mm
    VeryHeavy,
}

/// River response expected for a rainfall band.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BandResponse {
    pub rise_m: f64,
    pub time_to_peak_hours: u32,
}

/// Static rainfall → level-rise correlation, ordered by band.
pub const RAINFALL_CORRELATION: [(RainfallBand, BandResponse); 4] = [
    (RainfallBand::Light, BandResponse { rise_m: 0.1, time_to_peak_hours: 24 }),
    (RainfallBand::Moderate, BandResponse { rise_m: 0.3, time_to_peak_hours: 18 }),
    (RainfallBand::Heavy, BandResponse { rise_m: 0.8, time_to_peak_hours: 12 }),
    (RainfallBand::VeryHeavy, BandResponse { rise_m: 1.5, time_to_peak_hours: 6 }),
];

impl RainfallBand {
    /// Band for a 24-hour rainfall total in mm. Lower bounds are inclusive.
    pub fn classify(rainfall_24h_mm: f64) -> Self {
        if rainfall_24h_mm >= 70.0 {
            RainfallBand::VeryHeavy
        } else if rainfall_24h_mm >= 30.0 {
            RainfallBand::Heavy
        } else if rainfall_24h_mm >= 10.0 {
            RainfallBand::Moderate
        } else {
            RainfallBand::Light
        }
    }

    pub fn response(self) -> BandResponse {
        RAINFALL_CORRELATION[self as usize].1
    }

    pub fn label(self) -> &'static str {
        match self {
            RainfallBand::Light => "light",
            RainfallBand::Moderate => "moderate",
            RainfallBand::Heavy => "heavy",
            RainfallBand::VeryHeavy => "very heavy",
        }
    }
}

// ---------------------------------------------------------------------------
// Estimator
// ---------------------------------------------------------------------------

/// Rounds to centimetre precision.
fn round_cm(level_m: f64) -> f64 {
    (level_m * 100.0).round() / 100.0
}

/// Estimates river levels for zones from rainfall.
#[derive(Debug, Clone, Copy)]
pub struct WaterLevelEstimator {
    baseline_ratio: f64,
}

impl Default for WaterLevelEstimator {
    fn default() -> Self {
        Self::from_config(&EstimatorConfig::default())
    }
}

impl WaterLevelEstimator {
    /// `baseline_ratio` is validated by `ServiceConfig::validate`.
    pub fn new(baseline_ratio: f64) -> Self {
        Self { baseline_ratio }
    }

    pub fn from_config(config: &EstimatorConfig) -> Self {
        Self::new(config.baseline_ratio)
    }

    pub fn baseline_ratio(&self) -> f64 {
        self.baseline_ratio
    }

    /// Level assumed for a station when no reading is available.
    pub fn baseline_level(&self, station: &Station) -> f64 {
        station.danger_level_m * self.baseline_ratio
    }

    /// Estimates the level at the station governing `zone_id`.
    ///
    /// Never fails: unknown zones use the default station, negative or
    /// non-finite rainfall counts as none, and a non-finite observed level
    /// is ignored.
    pub fn estimate(
        &self,
        zone_id: &str,
        rainfall_24h_mm: f64,
        known_current_level_m: Option<f64>,
    ) -> WaterLevelEstimate {
        self.estimate_at(zone_id, rainfall_24h_mm, known_current_level_m, Utc::now())
    }

    /// `estimate` with an explicit timestamp.
    pub fn estimate_at(
        &self,
        zone_id: &str,
        rainfall_24h_mm: f64,
        known_current_level_m: Option<f64>,
        now: DateTime<Utc>,
    ) -> WaterLevelEstimate {
        let station = stations::governing_station(zone_id);
        self.estimate_for_station(station, rainfall_24h_mm, known_current_level_m, now)
    }

    pub fn estimate_for_station(
        &self,
        station: &Station,
        rainfall_24h_mm: f64,
        known_current_level_m: Option<f64>,
        now: DateTime<Utc>,
    ) -> WaterLevelEstimate {
        let rainfall = if rainfall_24h_mm.is_finite() && rainfall_24h_mm > 0.0 {
            rainfall_24h_mm
        } else {
            0.0
        };
        let band = RainfallBand::classify(rainfall);
        let response = band.response();
        let observed = known_current_level_m.filter(|level| level.is_finite());

        let (start_level, provenance) = match observed {
            Some(level) => (
                level,
                format!(
                    "Observed level {:.2} m plus {} rainfall rise (+{:.2} m)",
                    level,
                    band.label(),
                    response.rise_m
                ),
            ),
            None => (
                self.baseline_level(station),
                format!(
                    "Estimated from {:.1} mm/24h rainfall ({} band, +{:.2} m) on a baseline of {:.0}% of danger level; no live gauge telemetry",
                    rainfall,
                    band.label(),
                    response.rise_m,
                    self.baseline_ratio * 100.0
                ),
            ),
        };

        let estimated_level_m = round_cm(start_level + response.rise_m);
        let status = status_for_ratio(estimated_level_m / station.danger_level_m);
        let trend = if band == RainfallBand::Light {
            Trend::Stable
        } else {
            Trend::Rising
        };

        WaterLevelEstimate {
            station_id: station.id.to_string(),
            station_name: station.localized_name(),
            estimated_level_m,
            danger_level_m: station.danger_level_m,
            historical_max_m: station.historical_max_m,
            status,
            trend,
            rainfall_24h_mm: rainfall,
            estimated_rise_m: response.rise_m,
            time_to_peak_hours: response.time_to_peak_hours,
            last_updated: now,
            is_estimated: observed.is_none(),
            provenance,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
