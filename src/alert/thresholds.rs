/// Water level and weather risk classification.
///
/// Three independent pure functions:
/// - `classify_water_level` — estimated level against the station danger
///   level, as a ratio. Tier boundaries are inclusive at the lower edge.
/// - `weather_risk` — additive score over rain intensity, humidity with low
///   pressure, and active official warnings.
/// - `combined_risk` — either signal alone can escalate the zone.
///
/// None of them keep state, so classifying the same input twice always
/// gives the same tier.

use chrono::{DateTime, Utc};

use crate::model::{
    FloodError, LocalizedText, RiskLevel, WaterLevelEstimate, WaterStatus, Warning,
    WarningSeverity, WeatherSnapshot,
};

// ---------------------------------------------------------------------------
// Water level status
// ---------------------------------------------------------------------------

/// Lower bound (inclusive) of the `alert` tier, as level / danger level.
pub const ALERT_RATIO: f64 = 0.70;
/// Lower bound (inclusive) of the `warning` tier.
pub const WARNING_RATIO: f64 = 0.85;
/// Lower bound (inclusive) of the `danger` tier.
pub const DANGER_RATIO: f64 = 1.00;

/// Maps a finite level / danger ratio to its tier.
pub fn status_for_ratio(ratio: f64) -> WaterStatus {
    if ratio >= DANGER_RATIO {
        WaterStatus::Danger
    } else if ratio >= WARNING_RATIO {
        WaterStatus::Warning
    } else if ratio >= ALERT_RATIO {
        WaterStatus::Alert
    } else {
        WaterStatus::Normal
    }
}

/// Classifies a water level against a danger level.
///
/// # Errors
/// `FloodError::Classification` if either value is not finite or the
/// danger level is not positive.
pub fn classify_water_level(level_m: f64, danger_level_m: f64) -> Result<WaterStatus, FloodError> {
    if !level_m.is_finite() {
        return Err(FloodError::Classification(format!(
            "water level must be finite, got {}",
            level_m
        )));
    }
    if !danger_level_m.is_finite() || danger_level_m <= 0.0 {
        return Err(FloodError::Classification(format!(
            "danger level must be positive, got {}",
            danger_level_m
        )));
    }
    Ok(status_for_ratio(level_m / danger_level_m))
}

/// Re-derives the status tier of an estimate from its levels.
pub fn classify_estimate(estimate: &WaterLevelEstimate) -> Result<WaterStatus, FloodError> {
    classify_water_level(estimate.estimated_level_m, estimate.danger_level_m)
}

// ---------------------------------------------------------------------------
// Weather risk
// ---------------------------------------------------------------------------

/// Score at or above which weather risk is `high`.
pub const HIGH_WEATHER_SCORE: u32 = 6;
/// Score at or above which weather risk is `medium`.
pub const MEDIUM_WEATHER_SCORE: u32 = 3;

fn require_finite(name: &str, value: f64) -> Result<f64, FloodError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(FloodError::Classification(format!("{} must be finite, got {}", name, value)))
    }
}

/// Additive weather score for the current conditions and the warnings
/// active at `now`.
pub fn weather_score(
    snapshot: &WeatherSnapshot,
    warnings: &[Warning],
    now: DateTime<Utc>,
) -> Result<u32, FloodError> {
    let rain = require_finite("rain intensity", snapshot.rain_intensity_mm)?;
    let humidity = require_finite("humidity", snapshot.humidity_pct)?;
    let pressure = require_finite("pressure", snapshot.pressure_hpa)?;

    let mut score = if rain > 10.0 {
        3
    } else if rain > 5.0 {
        2
    } else if rain > 0.0 {
        1
    } else {
        0
    };

    // Saturated air under a low.
    if humidity > 85.0 && pressure < 1000.0 {
        score += 2;
    }

    for warning in warnings.iter().filter(|w| w.is_active(now)) {
        score += match warning.severity {
            WarningSeverity::High => 3,
            WarningSeverity::Medium => 1,
            WarningSeverity::Low => 0,
        };
    }

    Ok(score)
}

/// Weather risk tier for the current conditions and active warnings.
pub fn weather_risk(
    snapshot: &WeatherSnapshot,
    warnings: &[Warning],
    now: DateTime<Utc>,
) -> Result<RiskLevel, FloodError> {
    let score = weather_score(snapshot, warnings, now)?;
    Ok(if score >= HIGH_WEATHER_SCORE {
        RiskLevel::High
    } else if score >= MEDIUM_WEATHER_SCORE {
        RiskLevel::Medium
    } else {
        RiskLevel::Low
    })
}

// ---------------------------------------------------------------------------
// Combined zone risk
// ---------------------------------------------------------------------------

/// Combines water status and weather risk. Either signal alone can force
/// escalation; neither dominates.
pub fn combined_risk(status: WaterStatus, weather: RiskLevel) -> RiskLevel {
    if status == WaterStatus::Danger || weather == RiskLevel::High {
        RiskLevel::High
    } else if matches!(status, WaterStatus::Warning | WaterStatus::Alert)
        || weather == RiskLevel::Medium
    {
        RiskLevel::Medium
    } else {
        RiskLevel::Low
    }
}

/// Recommended action shown to residents for an overall risk tier.
pub fn recommended_action(overall: RiskLevel) -> LocalizedText {
    match overall {
        RiskLevel::High => LocalizedText::new(
            "High flood risk. Move valuables and documents to higher ground and be ready to evacuate.",
            "বানপানীৰ উচ্চ আশংকা। মূল্যৱান সামগ্ৰী আৰু নথি-পত্ৰ ওখ ঠাইলৈ নিয়ক আৰু স্থানান্তৰৰ বাবে সাজু থাকক।",
        ),
        RiskLevel::Medium => LocalizedText::new(
            "Moderate flood risk. Keep an emergency kit ready and follow official updates.",
            "বানপানীৰ মধ্যম আশংকা। জৰুৰীকালীন সামগ্ৰী সাজু ৰাখক আৰু চৰকাৰী বাতৰি অনুসৰণ কৰক।",
        ),
        RiskLevel::Low => LocalizedText::new(
            "Low flood risk. No action needed; stay informed.",
            "বানপানীৰ আশংকা কম। কোনো ব্যৱস্থাৰ প্ৰয়োজন নাই; খবৰ লৈ থাকক।",
        ),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::WeatherCondition;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 7, 3, 9, 0, 0).unwrap()
    }

    fn snapshot(rain: f64, humidity: f64, pressure: f64) -> WeatherSnapshot {
        WeatherSnapshot {
            temperature_c: 29.0,
            feels_like_c: 33.0,
            humidity_pct: humidity,
            wind_speed_kmh: 10.0,
            wind_direction_deg: 200.0,
            pressure_hpa: pressure,
            visibility_km: 8.0,
            condition: WeatherCondition::Rain,
            rain_intensity_mm: rain,
            cloud_cover_pct: 90.0,
            uv_index: 2.0,
            timestamp: now(),
            source: "test".to_string(),
        }
    }

    fn warning(severity: WarningSeverity) -> Warning {
        Warning {
            district: "Kamrup Metropolitan".to_string(),
            description: "Heavy to very heavy rainfall".to_string(),
            onset: None,
            expiry: None,
            severity,
            category: "Met".to_string(),
            source: "test".to_string(),
        }
    }

    // --- Water level status ---------------------------------------------

    #[test]
    fn test_tier_boundaries_are_inclusive_at_lower_edge() {
        assert_eq!(status_for_ratio(0.6999), WaterStatus::Normal);
        assert_eq!(status_for_ratio(0.70), WaterStatus::Alert);
        assert_eq!(status_for_ratio(0.8499), WaterStatus::Alert);
        assert_eq!(status_for_ratio(0.85), WaterStatus::Warning);
        assert_eq!(status_for_ratio(0.9999), WaterStatus::Warning);
        assert_eq!(status_for_ratio(1.00), WaterStatus::Danger);
        assert_eq!(status_for_ratio(1.4), WaterStatus::Danger);
    }

    #[test]
    fn test_classify_exact_boundary_levels() {
        assert_eq!(classify_water_level(70.0, 100.0).unwrap(), WaterStatus::Alert);
        assert_eq!(classify_water_level(85.0, 100.0).unwrap(), WaterStatus::Warning);
        assert_eq!(classify_water_level(100.0, 100.0).unwrap(), WaterStatus::Danger);
        assert_eq!(classify_water_level(49.68, 49.68).unwrap(), WaterStatus::Danger);
    }

    #[test]
    fn test_observed_48_3_at_guwahati_is_warning() {
        // 48.3 / 49.68 ≈ 0.972
        assert_eq!(classify_water_level(48.3, 49.68).unwrap(), WaterStatus::Warning);
    }

    #[test]
    fn test_classify_rejects_invalid_input() {
        assert!(matches!(
            classify_water_level(f64::NAN, 49.68),
            Err(FloodError::Classification(_))
        ));
        assert!(matches!(
            classify_water_level(30.0, 0.0),
            Err(FloodError::Classification(_))
        ));
        assert!(matches!(
            classify_water_level(30.0, -1.0),
            Err(FloodError::Classification(_))
        ));
        assert!(classify_water_level(f64::INFINITY, 49.68).is_err());
    }

    #[test]
    fn test_classification_is_idempotent() {
        for level in [10.0, 34.8, 42.3, 48.3, 49.68, 55.0] {
            let first = classify_water_level(level, 49.68).unwrap();
            let second = classify_water_level(level, 49.68).unwrap();
            assert_eq!(first, second);
        }
    }

    // --- Weather risk -----------------------------------------------------

    #[test]
    fn test_rain_intensity_scores() {
        assert_eq!(weather_score(&snapshot(0.0, 60.0, 1010.0), &[], now()).unwrap(), 0);
        assert_eq!(weather_score(&snapshot(0.2, 60.0, 1010.0), &[], now()).unwrap(), 1);
        assert_eq!(weather_score(&snapshot(5.0, 60.0, 1010.0), &[], now()).unwrap(), 1);
        assert_eq!(weather_score(&snapshot(5.1, 60.0, 1010.0), &[], now()).unwrap(), 2);
        assert_eq!(weather_score(&snapshot(10.0, 60.0, 1010.0), &[], now()).unwrap(), 2);
        assert_eq!(weather_score(&snapshot(10.5, 60.0, 1010.0), &[], now()).unwrap(), 3);
    }

    #[test]
    fn test_humid_low_pressure_adds_two() {
        assert_eq!(weather_score(&snapshot(0.0, 90.0, 995.0), &[], now()).unwrap(), 2);
        // Both conditions are required.
        assert_eq!(weather_score(&snapshot(0.0, 90.0, 1005.0), &[], now()).unwrap(), 0);
        assert_eq!(weather_score(&snapshot(0.0, 85.0, 995.0), &[], now()).unwrap(), 0);
    }

    #[test]
    fn test_three_warnings_and_heavy_rain_is_high() {
        let warnings = vec![
            warning(WarningSeverity::High),
            warning(WarningSeverity::High),
            warning(WarningSeverity::Medium),
        ];
        let snap = snapshot(12.0, 70.0, 1008.0);
        assert_eq!(weather_score(&snap, &warnings, now()).unwrap(), 10);
        assert_eq!(weather_risk(&snap, &warnings, now()).unwrap(), RiskLevel::High);
    }

    #[test]
    fn test_expired_warnings_are_ignored() {
        let mut expired = warning(WarningSeverity::High);
        expired.expiry = Some(now() - chrono::Duration::hours(1));
        let mut upcoming = warning(WarningSeverity::High);
        upcoming.onset = Some(now() + chrono::Duration::hours(6));

        let snap = snapshot(0.0, 60.0, 1010.0);
        assert_eq!(weather_score(&snap, &[expired, upcoming], now()).unwrap(), 0);
    }

    #[test]
    fn test_weather_risk_tier_thresholds() {
        let calm = snapshot(0.0, 60.0, 1010.0);
        assert_eq!(weather_risk(&calm, &[], now()).unwrap(), RiskLevel::Low);

        let showers = snapshot(11.0, 60.0, 1010.0);
        assert_eq!(weather_risk(&showers, &[], now()).unwrap(), RiskLevel::Medium);

        let storm = snapshot(11.0, 92.0, 990.0);
        assert_eq!(weather_risk(&storm, &[warning(WarningSeverity::Medium)], now()).unwrap(), RiskLevel::High);
    }

    #[test]
    fn test_weather_risk_rejects_nan() {
        let snap = snapshot(f64::NAN, 60.0, 1010.0);
        assert!(matches!(weather_risk(&snap, &[], now()), Err(FloodError::Classification(_))));
    }

    // --- Combined ----------------------------------------------------------

    #[test]
    fn test_combined_risk_escalates_on_either_signal() {
        assert_eq!(combined_risk(WaterStatus::Danger, RiskLevel::Low), RiskLevel::High);
        assert_eq!(combined_risk(WaterStatus::Normal, RiskLevel::High), RiskLevel::High);
        assert_eq!(combined_risk(WaterStatus::Alert, RiskLevel::Low), RiskLevel::Medium);
        assert_eq!(combined_risk(WaterStatus::Warning, RiskLevel::Low), RiskLevel::Medium);
        assert_eq!(combined_risk(WaterStatus::Normal, RiskLevel::Medium), RiskLevel::Medium);
        assert_eq!(combined_risk(WaterStatus::Normal, RiskLevel::Low), RiskLevel::Low);
        assert_eq!(combined_risk(WaterStatus::Warning, RiskLevel::High), RiskLevel::High);
    }

    #[test]
    fn test_recommended_action_is_bilingual() {
        for level in [RiskLevel::Low, RiskLevel::Medium, RiskLevel::High] {
            let action = recommended_action(level);
            assert!(!action.en.is_empty());
            assert!(!action.assamese.is_empty());
        }
        assert!(recommended_action(RiskLevel::High).en.contains("evacuate"));
    }
}
