/// Zone definitions for flood risk reporting.
///
/// A zone is a small geographic area (a locality or ward) that is mapped to
/// exactly one governing gauge station via `stations::governing_station`.
/// The zone list is loaded from the `[[zones]]` tables of `floodrisk.toml`;
/// `default_zones` is the built-in list used when the file has none.

use serde::{Deserialize, Serialize};

use crate::model::{Coordinates, LocationContext, ZoneRisk};
use crate::stations;

// ============================================================================
// Zone configuration
// ============================================================================

/// Single zone as configured.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZoneConfig {
    pub id: String,
    pub name: String,
    pub district: String,
    pub latitude: f64,
    pub longitude: f64,
}

impl ZoneConfig {
    pub fn new(id: &str, name: &str, district: &str, latitude: f64, longitude: f64) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            district: district.to_string(),
            latitude,
            longitude,
        }
    }

    pub fn coordinates(&self) -> Coordinates {
        Coordinates::new(self.latitude, self.longitude)
    }

    /// Id of the station governing this zone.
    pub fn station_id(&self) -> &'static str {
        stations::governing_station(&self.id).id
    }
}

/// Built-in zone list: Guwahati riverside and Bharalu catchment localities,
/// plus the Puthimari and Kulsi catchments west of the city.
pub fn default_zones() -> Vec<ZoneConfig> {
    const METRO: &str = "Kamrup Metropolitan";
    const KAMRUP: &str = "Kamrup";
    vec![
        ZoneConfig::new("jalukbari", "Jalukbari", METRO, 26.1530, 91.6650),
        ZoneConfig::new("maligaon", "Maligaon", METRO, 26.1580, 91.6930),
        ZoneConfig::new("pandu", "Pandu", METRO, 26.1680, 91.6780),
        ZoneConfig::new("bharalumukh", "Bharalumukh", METRO, 26.1800, 91.7300),
        ZoneConfig::new("fancy-bazar", "Fancy Bazar", METRO, 26.1850, 91.7400),
        ZoneConfig::new("uzan-bazar", "Uzan Bazar", METRO, 26.1900, 91.7560),
        ZoneConfig::new("anil-nagar", "Anil Nagar", METRO, 26.1600, 91.7700),
        ZoneConfig::new("nabin-nagar", "Nabin Nagar", METRO, 26.1560, 91.7740),
        ZoneConfig::new("zoo-road", "Zoo Road", METRO, 26.1700, 91.7800),
        ZoneConfig::new("rangia", "Rangia", KAMRUP, 26.4490, 91.6160),
        ZoneConfig::new("kamalpur", "Kamalpur", KAMRUP, 26.3870, 91.5500),
        ZoneConfig::new("kukurmara", "Kukurmara", KAMRUP, 26.0600, 91.4450),
        ZoneConfig::new("chaygaon", "Chaygaon", KAMRUP, 26.0450, 91.3750),
    ]
}

// ============================================================================
// Lookup helpers
// ============================================================================

/// Get a zone by id (case-insensitive).
pub fn find_zone<'a>(zones: &'a [ZoneConfig], zone_id: &str) -> Option<&'a ZoneConfig> {
    zones.iter().find(|z| z.id.eq_ignore_ascii_case(zone_id))
}

/// Builds the plain-data context handed to the report/broadcast backend.
pub fn location_context(zone: &ZoneConfig, risk: &ZoneRisk) -> LocationContext {
    LocationContext {
        zone_id: zone.id.clone(),
        zone_name: zone.name.clone(),
        district: zone.district.clone(),
        coordinates: zone.coordinates().to_text(),
        overall_risk: risk.overall_risk,
        water_status: risk.water_level.status,
        recommended_action: risk.recommended_action.clone(),
    }
}

// ============================================================================
// Tests
// ============================================================================
