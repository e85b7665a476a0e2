/// Hydrological analysis for the flood risk service.
///
/// Submodules:
/// - `water_level` — estimates river level at a zone's governing station
///   from 24-hour rainfall via a static correlation table.
///
/// Future additions: upstream station correlation once live gauge
/// telemetry is available.

pub mod water_level;
