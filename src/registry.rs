//! The static source registry.
//!
//! Maps (layer, state, vintage) to a canonical download URL, an expected
//! authoritative record count, a GEOID format descriptor, an authority
//! level, and an update trigger. The registry is immutable at startup;
//! adding sources is an offline change followed by a fresh process.

use std::collections::BTreeMap;

use crate::types::{
    AuthorityLevel, BoundarySource, GeoidFormat, Layer, SourceId, UpdateTrigger,
};

/// 2020-cycle congressional district counts per state FIPS, including the
/// DC and Puerto Rico delegate seats.
const CD_APPORTIONMENT: [(&str, u32); 52] = [
    ("01", 7),  // Alabama
    ("02", 1),  // Alaska
    ("04", 9),  // Arizona
    ("05", 4),  // Arkansas
    ("06", 52), // California
    ("08", 8),  // Colorado
    ("09", 5),  // Connecticut
    ("10", 1),  // Delaware
    ("11", 1),  // District of Columbia (delegate)
    ("12", 28), // Florida
    ("13", 14), // Georgia
    ("15", 2),  // Hawaii
    ("16", 2),  // Idaho
    ("17", 17), // Illinois
    ("18", 9),  // Indiana
    ("19", 4),  // Iowa
    ("20", 4),  // Kansas
    ("21", 6),  // Kentucky
    ("22", 6),  // Louisiana
    ("23", 2),  // Maine
    ("24", 8),  // Maryland
    ("25", 9),  // Massachusetts
    ("26", 13), // Michigan
    ("27", 8),  // Minnesota
    ("28", 4),  // Mississippi
    ("29", 8),  // Missouri
    ("30", 2),  // Montana
    ("31", 3),  // Nebraska
    ("32", 4),  // Nevada
    ("33", 2),  // New Hampshire
    ("34", 12), // New Jersey
    ("35", 3),  // New Mexico
    ("36", 26), // New York
    ("37", 14), // North Carolina
    ("38", 1),  // North Dakota
    ("39", 15), // Ohio
    ("40", 5),  // Oklahoma
    ("41", 6),  // Oregon
    ("42", 17), // Pennsylvania
    ("44", 2),  // Rhode Island
    ("45", 7),  // South Carolina
    ("46", 1),  // South Dakota
    ("47", 9),  // Tennessee
    ("48", 38), // Texas
    ("49", 4),  // Utah
    ("50", 1),  // Vermont
    ("51", 11), // Virginia
    ("53", 10), // Washington
    ("54", 2),  // West Virginia
    ("55", 8),  // Wisconsin
    ("56", 1),  // Wyoming
    ("72", 1),  // Puerto Rico (resident commissioner)
];

/// County-equivalent counts for states where the registry carries an
/// authoritative table. Other states leave expected_count unset.
const COUNTY_COUNTS: [(&str, u32); 8] = [
    ("09", 8),   // Connecticut (legacy counties)
    ("10", 3),   // Delaware
    ("15", 5),   // Hawaii
    ("32", 17),  // Nevada
    ("48", 254), // Texas
    ("55", 72),  // Wisconsin
    ("56", 23),  // Wyoming
    ("72", 78),  // Puerto Rico municipios
];

/// Immutable registry of upstream boundary sources.
#[derive(Debug, Clone)]
pub struct SourceRegistry {
    cd_counts: BTreeMap<&'static str, u32>,
    county_counts: BTreeMap<&'static str, u32>,
}

impl SourceRegistry {
    /// Build the registry from the embedded tables.
    pub fn new() -> Self {
        Self {
            cd_counts: CD_APPORTIONMENT.into_iter().collect(),
            county_counts: COUNTY_COUNTS.into_iter().collect(),
        }
    }

    /// All state FIPS codes with registered congressional sources, sorted.
    pub fn state_fips_codes(&self) -> Vec<&'static str> {
        self.cd_counts.keys().copied().collect()
    }

    /// Whether a state FIPS code is registered.
    pub fn knows_state(&self, state_fips: &str) -> bool {
        self.cd_counts.contains_key(state_fips)
    }

    /// Expected record count for (layer, state, vintage), when authoritative.
    pub fn expected_count(&self, layer: Layer, state_fips: &str, _vintage: u16) -> Option<u32> {
        match layer {
            Layer::CongressionalDistrict => self.cd_counts.get(state_fips).copied(),
            Layer::County => self.county_counts.get(state_fips).copied(),
            _ => None,
        }
    }

    /// GEOID format descriptor for a layer.
    pub fn geoid_format(&self, layer: Layer) -> GeoidFormat {
        match layer {
            Layer::CongressionalDistrict => GeoidFormat {
                pattern: r"^\d{2}(\d{2}|AL)$".to_string(),
                width: Some(4),
                state_prefixed: true,
            },
            Layer::StateSenate | Layer::StateHouse => GeoidFormat {
                pattern: r"^\d{2}\w{3,4}$".to_string(),
                width: None,
                state_prefixed: true,
            },
            Layer::County => GeoidFormat {
                pattern: r"^\d{5}$".to_string(),
                width: Some(5),
                state_prefixed: true,
            },
            Layer::Place
            | Layer::UnifiedSchoolDistrict
            | Layer::ElementarySchoolDistrict
            | Layer::SecondarySchoolDistrict => GeoidFormat {
                pattern: r"^\d{2}\d{5}$".to_string(),
                width: Some(7),
                state_prefixed: true,
            },
            Layer::VotingDistrict => GeoidFormat {
                pattern: r"^\d{5}\w{1,6}$".to_string(),
                width: None,
                state_prefixed: true,
            },
        }
    }

    /// Canonical TIGER/Line download URL for a source.
    pub fn url_for(&self, layer: Layer, state_fips: &str, vintage: u16) -> String {
        let dir = match layer {
            Layer::CongressionalDistrict => "CD",
            Layer::StateSenate => "SLDU",
            Layer::StateHouse => "SLDL",
            Layer::County => "COUNTY",
            Layer::Place => "PLACE",
            Layer::UnifiedSchoolDistrict => "UNSD",
            Layer::ElementarySchoolDistrict => "ELSD",
            Layer::SecondarySchoolDistrict => "SCSD",
            Layer::VotingDistrict => "VTD",
        };
        // County files are national; the rest are per-state.
        match layer {
            Layer::County => format!(
                "https://www2.census.gov/geo/tiger/TIGER{vintage}/{dir}/tl_{vintage}_us_county.zip"
            ),
            _ => format!(
                "https://www2.census.gov/geo/tiger/TIGER{vintage}/{dir}/tl_{vintage}_{state_fips}_{}.zip",
                dir.to_lowercase()
            ),
        }
    }

    /// Update trigger policy for a layer.
    pub fn trigger_for(&self, layer: Layer) -> UpdateTrigger {
        match layer {
            // TIGER annual releases land in September.
            Layer::County | Layer::Place => UpdateTrigger::Annual { month: 9 },
            Layer::UnifiedSchoolDistrict
            | Layer::ElementarySchoolDistrict
            | Layer::SecondarySchoolDistrict => UpdateTrigger::Annual { month: 9 },
            Layer::CongressionalDistrict => UpdateTrigger::Redistricting {
                legislative_grace: false,
            },
            Layer::StateSenate | Layer::StateHouse => UpdateTrigger::Redistricting {
                legislative_grace: true,
            },
            Layer::VotingDistrict => UpdateTrigger::Forced,
        }
    }

    /// Materialize the full source descriptor for (layer, state, vintage).
    ///
    /// Returns None for states the registry does not know.
    pub fn source(&self, layer: Layer, state_fips: &str, vintage: u16) -> Option<BoundarySource> {
        if !self.knows_state(state_fips) {
            return None;
        }
        Some(BoundarySource {
            layer,
            state_fips: state_fips.to_string(),
            vintage,
            url: self.url_for(layer, state_fips, vintage),
            expected_count: self.expected_count(layer, state_fips, vintage),
            geoid_format: self.geoid_format(layer),
            authority: AuthorityLevel::Federal,
            trigger: self.trigger_for(layer),
        })
    }

    /// Every source for the given layers across all registered states.
    pub fn sources_for_layers(&self, layers: &[Layer], vintage: u16) -> Vec<BoundarySource> {
        let mut out = Vec::new();
        for state in self.state_fips_codes() {
            for layer in layers {
                if let Some(src) = self.source(*layer, state, vintage) {
                    out.push(src);
                }
            }
        }
        out
    }

    /// Look up a source by its stable id.
    pub fn by_id(&self, id: &SourceId) -> Option<BoundarySource> {
        let mut parts = id.as_str().splitn(3, ':');
        let layer = Layer::from_code(parts.next()?)?;
        let state = parts.next()?;
        let year: u16 = parts.next()?.parse().ok()?;
        self.source(layer, state, year)
    }
}

impl Default for SourceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apportionment_sums_to_house_size() {
        let registry = SourceRegistry::new();
        let voting: u32 = CD_APPORTIONMENT
            .iter()
            .filter(|(fips, _)| *fips != "11" && *fips != "72")
            .map(|(_, n)| n)
            .sum();
        assert_eq!(voting, 435);
        assert_eq!(
            registry.expected_count(Layer::CongressionalDistrict, "56", 2024),
            Some(1)
        );
        assert_eq!(
            registry.expected_count(Layer::CongressionalDistrict, "55", 2024),
            Some(8)
        );
    }

    #[test]
    fn test_territory_counts() {
        let registry = SourceRegistry::new();
        assert_eq!(
            registry.expected_count(Layer::CongressionalDistrict, "72", 2024),
            Some(1)
        );
        assert_eq!(registry.expected_count(Layer::County, "72", 2024), Some(78));
    }

    #[test]
    fn test_unknown_layer_count_is_none() {
        let registry = SourceRegistry::new();
        assert_eq!(registry.expected_count(Layer::Place, "55", 2024), None);
    }

    #[test]
    fn test_url_shapes() {
        let registry = SourceRegistry::new();
        assert_eq!(
            registry.url_for(Layer::CongressionalDistrict, "56", 2024),
            "https://www2.census.gov/geo/tiger/TIGER2024/CD/tl_2024_56_cd.zip"
        );
        assert!(registry
            .url_for(Layer::County, "56", 2024)
            .ends_with("tl_2024_us_county.zip"));
    }

    #[test]
    fn test_source_by_id_roundtrip() {
        let registry = SourceRegistry::new();
        let src = registry
            .source(Layer::CongressionalDistrict, "56", 2024)
            .unwrap();
        let back = registry.by_id(&src.id()).unwrap();
        assert_eq!(src, back);
    }

    #[test]
    fn test_unknown_state_yields_none() {
        let registry = SourceRegistry::new();
        assert!(registry.source(Layer::CongressionalDistrict, "99", 2024).is_none());
    }
}
