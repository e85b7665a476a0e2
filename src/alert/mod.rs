/// Risk classification for the flood risk service.
///
/// Submodules:
/// - `thresholds` — water level status tiers, weather risk scoring and the
///   combined per-zone risk.

pub mod thresholds;
