//! Boundary layer taxonomy.
//!
//! A layer is a class of boundary (congressional district, county, school
//! district, ...). Layers are a closed set: the registry, the validators,
//! and the snapshot layer counts all key off this enum.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A class of civic boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Layer {
    /// US congressional district.
    CongressionalDistrict,
    /// State legislative district, upper chamber.
    StateSenate,
    /// State legislative district, lower chamber.
    StateHouse,
    /// County or county-equivalent (parish, borough, municipio).
    County,
    /// Incorporated place or census-designated place.
    Place,
    /// Unified school district.
    UnifiedSchoolDistrict,
    /// Elementary school district.
    ElementarySchoolDistrict,
    /// Secondary school district.
    SecondarySchoolDistrict,
    /// Voting district (precinct-level, used only for cross-checks).
    VotingDistrict,
}

impl Layer {
    /// All layers, in canonical order.
    pub const ALL: [Layer; 9] = [
        Layer::CongressionalDistrict,
        Layer::StateSenate,
        Layer::StateHouse,
        Layer::County,
        Layer::Place,
        Layer::UnifiedSchoolDistrict,
        Layer::ElementarySchoolDistrict,
        Layer::SecondarySchoolDistrict,
        Layer::VotingDistrict,
    ];

    /// Short wire code used in source ids and URLs.
    pub fn code(&self) -> &'static str {
        match self {
            Self::CongressionalDistrict => "cd",
            Self::StateSenate => "sldu",
            Self::StateHouse => "sldl",
            Self::County => "county",
            Self::Place => "place",
            Self::UnifiedSchoolDistrict => "unsd",
            Self::ElementarySchoolDistrict => "elsd",
            Self::SecondarySchoolDistrict => "scsd",
            Self::VotingDistrict => "vtd",
        }
    }

    /// Parse a layer from its wire code.
    pub fn from_code(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "cd" => Some(Self::CongressionalDistrict),
            "sldu" => Some(Self::StateSenate),
            "sldl" => Some(Self::StateHouse),
            "county" => Some(Self::County),
            "place" => Some(Self::Place),
            "unsd" => Some(Self::UnifiedSchoolDistrict),
            "elsd" => Some(Self::ElementarySchoolDistrict),
            "scsd" => Some(Self::SecondarySchoolDistrict),
            "vtd" => Some(Self::VotingDistrict),
            _ => None,
        }
    }

    /// Key used for this layer in snapshot `layer_counts`.
    pub fn count_key(&self) -> &'static str {
        match self {
            Self::CongressionalDistrict => "congressional_district",
            Self::StateSenate => "state_senate",
            Self::StateHouse => "state_house",
            Self::County => "county",
            Self::Place => "place",
            Self::UnifiedSchoolDistrict => "unified_school_district",
            Self::ElementarySchoolDistrict => "elementary_school_district",
            Self::SecondarySchoolDistrict => "secondary_school_district",
            Self::VotingDistrict => "voting_district",
        }
    }

    /// The boundary level this layer maps to in canonical records.
    pub fn level(&self) -> BoundaryLevel {
        match self {
            Self::CongressionalDistrict | Self::StateSenate | Self::StateHouse => {
                BoundaryLevel::District
            }
            Self::County => BoundaryLevel::County,
            Self::Place => BoundaryLevel::City,
            Self::UnifiedSchoolDistrict
            | Self::ElementarySchoolDistrict
            | Self::SecondarySchoolDistrict => BoundaryLevel::SchoolDistrict,
            Self::VotingDistrict => BoundaryLevel::Precinct,
        }
    }

    /// Legislative layers tolerate a ±1 expected-count diff across
    /// redistricting vintage boundaries.
    pub fn is_legislative(&self) -> bool {
        matches!(
            self,
            Self::CongressionalDistrict | Self::StateSenate | Self::StateHouse
        )
    }

    /// School-district layers participate in the multi-system overlap rules.
    pub fn is_school(&self) -> bool {
        matches!(
            self,
            Self::UnifiedSchoolDistrict
                | Self::ElementarySchoolDistrict
                | Self::SecondarySchoolDistrict
        )
    }
}

impl fmt::Display for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Level of a canonical boundary record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoundaryLevel {
    /// Legislative district (federal or state).
    District,
    /// County or county-equivalent.
    County,
    /// Incorporated place.
    City,
    /// School district (any system).
    SchoolDistrict,
    /// Voting precinct.
    Precinct,
}

impl fmt::Display for BoundaryLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::District => write!(f, "district"),
            Self::County => write!(f, "county"),
            Self::City => write!(f, "city"),
            Self::SchoolDistrict => write!(f, "school_district"),
            Self::Precinct => write!(f, "precinct"),
        }
    }
}

/// Rank of the authority a source derives from.
///
/// Ordered so that a higher rank wins when two sources disagree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthorityLevel {
    /// Municipal government publication.
    Municipal,
    /// County government publication.
    County,
    /// State primary source (secretary of state, GIS office).
    State,
    /// Federal source (Census TIGER/Line).
    Federal,
}

/// Legal standing of a boundary at retrieval time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LegalStatus {
    /// In force for the vintage year.
    Enacted,
    /// Adopted but not yet effective.
    Pending,
    /// Under active litigation.
    Litigation,
}

impl Default for LegalStatus {
    fn default() -> Self {
        Self::Enacted
    }
}

/// When a source becomes eligible for a scheduled change check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum UpdateTrigger {
    /// Eligible when the current UTC month equals `month` (1-12).
    Annual {
        /// Release month, 1-based.
        month: u32,
    },
    /// Eligible in any year ending in 1 or 2 (census aftermath).
    Redistricting {
        /// Extends eligibility for legislative boundaries that lag the cycle.
        legislative_grace: bool,
    },
    /// Eligible only on a forced full pass.
    Forced,
}

impl UpdateTrigger {
    /// Whether a source with this trigger is due at the given UTC date.
    ///
    /// `forced` is true when the caller is running a forced full pass, which
    /// makes every trigger eligible.
    pub fn is_due(&self, year: i32, month: u32, forced: bool) -> bool {
        if forced {
            return true;
        }
        match self {
            Self::Annual { month: m } => month == *m,
            Self::Redistricting { legislative_grace } => {
                let tail = year.rem_euclid(10);
                tail == 1 || tail == 2 || (*legislative_grace && tail == 3)
            }
            Self::Forced => false,
        }
    }
}
