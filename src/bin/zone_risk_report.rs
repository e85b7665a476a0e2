//! Zone Risk Report
//!
//! Prints the water level estimate and per-zone flood risk table.
//!
//! With `--rainfall` the estimate is computed offline from the given
//! 24-hour rainfall; otherwise the providers are queried once for the
//! zone and the live result is scored.
//!
//! Usage:
//!   cargo run --bin zone_risk_report -- --zone pandu
//!   cargo run --bin zone_risk_report -- --zone rangia --rainfall 85 --level 50.2
//!
//! Environment:
//!   RUST_LOG            - log filter (default floodrisk_service=warn)
//!   OPENWEATHER_API_KEY - enables the secondary weather provider

use std::env;
use std::process;

use tracing_subscriber::EnvFilter;

use floodrisk_service::aggregator::Aggregator;
use floodrisk_service::alert::thresholds;
use floodrisk_service::config::load_config_default;
use floodrisk_service::model::{WaterLevelEstimate, ZoneRisk};

fn print_estimate(estimate: &WaterLevelEstimate) {
    println!("💧 {} ({})", estimate.station_name.en, estimate.station_id);
    println!("─────────────────────────────────────────");
    println!("   Level:        {:.2} m (danger {:.2} m, record {:.2} m)",
        estimate.estimated_level_m, estimate.danger_level_m, estimate.historical_max_m);
    println!("   Status:       {:?}", estimate.status);
    println!("   Trend:        {:?} (+{:.2} m, peak in {} h)",
        estimate.trend, estimate.estimated_rise_m, estimate.time_to_peak_hours);
    println!("   Provenance:   {}", estimate.provenance);
    println!();
}

fn print_risks(risks: &[ZoneRisk]) {
    println!("🗺  Zone risks");
    println!("─────────────────────────────────────────");
    println!("   {:<14} {:<22} {:>8} {:>8} {:>8}", "zone", "district", "water", "weather", "overall");
    for risk in risks {
        println!(
            "   {:<14} {:<22} {:>8} {:>8} {:>8}",
            risk.zone_id,
            risk.district,
            format!("{:?}", risk.water_level.status),
            format!("{:?}", risk.weather_risk),
            format!("{:?}", risk.overall_risk),
        );
    }
    println!();
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("floodrisk_service=warn")),
        )
        .init();

    println!("🌊 Zone Flood Risk Report");
    println!("=========================\n");

    let args: Vec<String> = env::args().collect();
    let mut zone: Option<String> = None;
    let mut rainfall: Option<f64> = None;
    let mut level: Option<f64> = None;

    let mut i = 1;
    while i < args.len() {
        let Some(value) = args.get(i + 1) else {
            eprintln!("{} requires a value", args[i]);
            process::exit(1);
        };
        match args[i].as_str() {
            "--zone" => zone = Some(value.clone()),
            "--rainfall" => rainfall = Some(value.parse()?),
            "--level" => level = Some(value.parse()?),
            other => {
                eprintln!("Unknown argument: {}", other);
                eprintln!("Usage: zone_risk_report [--zone ZONE_ID] [--rainfall MM] [--level M]");
                process::exit(1);
            }
        }
        i += 2;
    }

    let config = load_config_default()?;
    let zone_id = zone.unwrap_or_else(|| config.region.default_zone.clone());
    let aggregator = Aggregator::new(&config)?;

    if let Some(rainfall_mm) = rainfall {
        println!("📍 {} with {:.1} mm over 24 h (offline estimate)\n", zone_id, rainfall_mm);
        let estimate = aggregator.estimator().estimate(&zone_id, rainfall_mm, level);
        print_estimate(&estimate);
        let status = thresholds::classify_estimate(&estimate)?;
        println!("   Water status: {:?}", status);
        return Ok(());
    }

    println!("📍 {} (live providers)\n", zone_id);
    let unified = aggregator.aggregate(&zone_id);
    if unified.is_fallback {
        println!("⚠️  All providers unavailable; showing synthetic fallback data\n");
    }
    println!(
        "🌦  {:?}, {:.1} °C, {:.1} mm/h rain, {} active warning(s), weather risk {:?}\n",
        unified.current.condition,
        unified.current.temperature_c,
        unified.current.rain_intensity_mm,
        unified.warnings.iter().filter(|w| w.is_active(unified.updated_at)).count(),
        unified.risk_level,
    );

    print_estimate(&aggregator.estimate_water_level(&unified));
    print_risks(&aggregator.calculate_zone_risks(&unified)?);
    Ok(())
}
