/// River gauge station registry for the Guwahati flood risk service.
///
/// Defines the canonical list of gauge stations whose danger levels govern
/// the risk of each zone. This is the single source of truth for station
/// ids, danger levels and the zone → station mapping; all other modules
/// should reference stations from here rather than hardcoding levels.
///
/// Danger and historical flood levels are Central Water Commission figures
/// (metres above mean sea level).

use crate::model::{Coordinates, LocalizedText};

// ---------------------------------------------------------------------------
// Station metadata
// ---------------------------------------------------------------------------

/// Station used for any zone that no registry entry claims.
pub const DEFAULT_STATION_ID: &str = "CWC-GHY";

/// Metadata for a single river gauge station.
#[derive(Debug)]
pub struct Station {
    /// Registry identifier.
    pub id: &'static str,
    /// Official station name.
    pub name: &'static str,
    /// Station name in Assamese.
    pub name_local: &'static str,
    /// Administrative district the station sits in.
    pub district: &'static str,
    /// Level above which the station is in flood condition. Always > 0.
    pub danger_level_m: f64,
    /// Highest flood level on record.
    pub historical_max_m: f64,
    pub location: Coordinates,
    /// Zones whose flood risk this station governs.
    pub zones: &'static [&'static str],
}

impl Station {
    pub fn localized_name(&self) -> LocalizedText {
        LocalizedText::new(self.name, self.name_local)
    }

    pub fn governs(&self, zone_id: &str) -> bool {
        self.zones.iter().any(|z| z.eq_ignore_ascii_case(zone_id))
    }
}

/// All stations used for zone risk, default station first.
pub static STATION_REGISTRY: &[Station] = &[
    Station {
        id: "CWC-GHY",
        name: "Brahmaputra at Guwahati (D.C. Court)",
        name_local: "ব্ৰহ্মপুত্ৰ, গুৱাহাটী (ডি.চি. কোৰ্ট)",
        district: "Kamrup Metropolitan",
        danger_level_m: 49.68,
        historical_max_m: 51.46,
        location: Coordinates::new(26.1878, 91.7455),
        zones: &[
            "jalukbari",
            "maligaon",
            "pandu",
            "bharalumukh",
            "fancy-bazar",
            "uzan-bazar",
            "anil-nagar",
            "nabin-nagar",
            "zoo-road",
        ],
    },
    Station {
        id: "CWC-PTM",
        name: "Puthimari at N.H. Road Crossing",
        name_local: "পুথিমাৰী, ৰাষ্ট্ৰীয় ঘাইপথ দলং",
        district: "Kamrup",
        danger_level_m: 51.75,
        historical_max_m: 53.82,
        location: Coordinates::new(26.3640, 91.5670),
        zones: &["rangia", "kamalpur"],
    },
    Station {
        id: "CWC-KLS",
        name: "Kulsi at Kukurmara",
        name_local: "কুলসী, কুকুৰমাৰা",
        district: "Kamrup",
        danger_level_m: 51.10,
        historical_max_m: 52.25,
        location: Coordinates::new(26.0560, 91.4380),
        zones: &["kukurmara", "chaygaon"],
    },
];

/// Looks up a station by id. Returns `None` if not found.
pub fn find_station(id: &str) -> Option<&'static Station> {
    STATION_REGISTRY.iter().find(|s| s.id == id)
}

/// The station used when no registry entry claims a zone.
pub fn default_station() -> &'static Station {
    &STATION_REGISTRY[0]
}

/// First station in `stations` that governs `zone_id`, if any.
pub fn find_governing_station<'a>(stations: &'a [Station], zone_id: &str) -> Option<&'a Station> {
    stations.iter().find(|s| s.governs(zone_id))
}

/// Station governing `zone_id`; unknown zones silently get the default
/// station.
pub fn governing_station(zone_id: &str) -> &'static Station {
    find_governing_station(STATION_REGISTRY, zone_id).unwrap_or_else(default_station)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
