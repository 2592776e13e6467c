//! Static reference tables: commune coordinates and geographic zones.

use crate::util::canonical_commune;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Island centre, used for communes missing from the coordinate table.
pub const DEFAULT_CENTROID: (f64, f64) = (-21.1151, 55.5364);

static COMMUNE_COORDINATES: Lazy<HashMap<&'static str, (f64, f64)>> = Lazy::new(|| {
    HashMap::from([
        ("LES AVIRONS", (-21.2409, 55.3389)),
        ("BRAS-PANON", (-21.0016, 55.6773)),
        ("ENTRE-DEUX", (-21.2469, 55.4742)),
        ("L'ÉTANG-SALÉ", (-21.2771, 55.3852)),
        ("PETITE-ILE", (-21.3533, 55.5662)),
        ("LA PLAINE-DES-PALMISTES", (-21.1339, 55.6367)),
        ("LE PORT", (-20.9393, 55.2871)),
        ("LA POSSESSION", (-20.9284, 55.3341)),
        ("SAINT-ANDRÉ", (-20.9633, 55.6503)),
        ("SAINT-BENOÎT", (-21.0372, 55.7153)),
        ("SAINT-DENIS", (-20.8789, 55.4481)),
        ("SAINT-JOSEPH", (-21.3778, 55.6192)),
        ("SAINT-LEU", (-21.1706, 55.2881)),
        ("SAINT-LOUIS", (-21.2861, 55.4114)),
        ("SAINT-PAUL", (-21.0097, 55.2694)),
        ("SAINT-PIERRE", (-21.3419, 55.4778)),
        ("SAINT-PHILIPPE", (-21.3594, 55.7675)),
        ("SAINTE-MARIE", (-20.8978, 55.5492)),
        ("SAINTE-ROSE", (-21.1297, 55.7953)),
        ("SAINTE-SUZANNE", (-20.9069, 55.6089)),
        ("SALAZIE", (-21.0275, 55.5386)),
        ("LE TAMPON", (-21.2781, 55.5183)),
        ("LES TROIS-BASSINS", (-21.1011, 55.2858)),
        ("CILAOS", (-21.1342, 55.4722)),
    ])
});

/// Latitude/longitude of a commune, falling back to [`DEFAULT_CENTROID`].
pub fn coordinates(commune: &str) -> (f64, f64) {
    COMMUNE_COORDINATES
        .get(canonical_commune(commune).as_str())
        .copied()
        .unwrap_or(DEFAULT_CENTROID)
}

/// Whether the commune has its own entry in the coordinate table.
pub fn has_coordinates(commune: &str) -> bool {
    COMMUNE_COORDINATES.contains_key(canonical_commune(commune).as_str())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Zone {
    pub name: String,
    pub communes: Vec<String>,
}

/// Ordered zone -> communes table.
///
/// Commune names are canonicalized on construction. A commune listed under
/// several zones belongs to the first one only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<Zone>", into = "Vec<Zone>")]
pub struct ZoneTable {
    zones: Vec<Zone>,
    index: HashMap<String, usize>,
}

impl ZoneTable {
    pub fn new(zones: Vec<Zone>) -> Self {
        let mut index = HashMap::new();
        let zones: Vec<Zone> = zones
            .into_iter()
            .enumerate()
            .map(|(pos, zone)| {
                let communes: Vec<String> =
                    zone.communes.iter().map(|c| canonical_commune(c)).collect();
                for commune in &communes {
                    if let Some(first) = index.get(commune) {
                        log::warn!(
                            "Commune {commune} listed in zone {} and zone #{first}; keeping the first",
                            zone.name
                        );
                    } else {
                        index.insert(commune.clone(), pos);
                    }
                }
                Zone {
                    name: zone.name,
                    communes,
                }
            })
            .collect();
        Self { zones, index }
    }

    /// Zones of La Réunion: north, east, south, west and the inland cirques.
    pub fn reunion() -> Self {
        let zone = |name: &str, communes: &[&str]| Zone {
            name: name.to_string(),
            communes: communes.iter().map(ToString::to_string).collect(),
        };
        Self::new(vec![
            zone("Nord", &["SAINT-DENIS", "SAINTE-MARIE", "SAINTE-SUZANNE"]),
            zone(
                "Est",
                &[
                    "SAINT-ANDRÉ",
                    "SAINT-BENOÎT",
                    "BRAS-PANON",
                    "SAINTE-ROSE",
                    "LA PLAINE-DES-PALMISTES",
                ],
            ),
            zone(
                "Sud",
                &[
                    "SAINT-PIERRE",
                    "SAINT-LOUIS",
                    "SAINT-JOSEPH",
                    "LE TAMPON",
                    "PETITE-ILE",
                    "L'ÉTANG-SALÉ",
                    "LES AVIRONS",
                    "SAINT-PHILIPPE",
                    "ENTRE-DEUX",
                ],
            ),
            zone(
                "Ouest",
                &[
                    "SAINT-PAUL",
                    "LE PORT",
                    "LA POSSESSION",
                    "SAINT-LEU",
                    "LES TROIS-BASSINS",
                ],
            ),
            zone("Cirques", &["CILAOS", "SALAZIE"]),
        ])
    }

    pub fn zones(&self) -> &[Zone] {
        &self.zones
    }

    pub fn zone_of(&self, commune: &str) -> Option<&str> {
        self.index
            .get(&canonical_commune(commune))
            .map(|&pos| self.zones[pos].name.as_str())
    }

    /// Declaration position of a zone, used to order zone-level output.
    pub fn position(&self, zone: &str) -> Option<usize> {
        self.zones.iter().position(|z| z.name == zone)
    }
}

impl Default for ZoneTable {
    fn default() -> Self {
        Self::reunion()
    }
}

impl From<Vec<Zone>> for ZoneTable {
    fn from(zones: Vec<Zone>) -> Self {
        Self::new(zones)
    }
}

impl From<ZoneTable> for Vec<Zone> {
    fn from(table: ZoneTable) -> Self {
        table.zones
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_commune_coordinates() {
        let (lat, lon) = coordinates("Saint-Denis");
        assert!((lat - -20.8789).abs() < f64::EPSILON);
        assert!((lon - 55.4481).abs() < f64::EPSILON);
        assert!(has_coordinates(" saint-andré "));
    }

    #[test]
    fn unknown_commune_falls_back_to_centroid() {
        assert_eq!(coordinates("ATLANTIS"), DEFAULT_CENTROID);
        assert!(!has_coordinates("ATLANTIS"));
    }

    #[test]
    fn reunion_zones_cover_every_commune_once() {
        let table = ZoneTable::reunion();
        let total: usize = table.zones().iter().map(|z| z.communes.len()).sum();
        assert_eq!(total, 24);
        assert_eq!(table.zone_of("Le Tampon"), Some("Sud"));
        assert_eq!(table.zone_of("Cilaos"), Some("Cirques"));
        assert_eq!(table.position("Ouest"), Some(3));
    }

    #[test]
    fn overlapping_commune_keeps_first_zone() {
        let table = ZoneTable::new(vec![
            Zone {
                name: "A".to_string(),
                communes: vec!["X".to_string()],
            },
            Zone {
                name: "B".to_string(),
                communes: vec!["x".to_string(), "Y".to_string()],
            },
        ]);
        assert_eq!(table.zone_of("X"), Some("A"));
        assert_eq!(table.zone_of("y"), Some("B"));
    }
}
