//! Organizational seat specs and the buckets they map to.
//!
//! A seat spec names a cell, a designation and a level. Each level carries
//! exactly the geo reference that level needs, which is why [`GeoScope`] is a
//! tagged union rather than a bag of optional fields. The flat wire shape
//! ([`SeatSpecRequest`]) is validated into that union once, at the edge;
//! everything downstream can rely on the required reference being present.

use crate::error::{Result, SeatError};
use crate::types::{CellId, CountryId, DesignationId, DistrictId, MandalId, StateId};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Organizational level of a seat
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrgLevel {
    /// Country-wide
    National,
    /// Group of states
    Zone,
    /// Single state
    State,
    /// Single district
    District,
    /// Single mandal
    Mandal,
}

impl OrgLevel {
    /// Storage and wire name
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::National => "NATIONAL",
            Self::Zone => "ZONE",
            Self::State => "STATE",
            Self::District => "DISTRICT",
            Self::Mandal => "MANDAL",
        }
    }

    /// Parses the storage name.
    ///
    /// # Errors
    ///
    /// Returns [`SeatError::Validation`] for unknown levels.
    pub fn parse(raw: &str) -> Result<Self> {
        match raw {
            "NATIONAL" => Ok(Self::National),
            "ZONE" => Ok(Self::Zone),
            "STATE" => Ok(Self::State),
            "DISTRICT" => Ok(Self::District),
            "MANDAL" => Ok(Self::Mandal),
            other => Err(SeatError::Validation(format!("unknown level '{other}'"))),
        }
    }
}

impl fmt::Display for OrgLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Geographic scope of a seat, one variant per level
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "level", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GeoScope {
    /// National seat
    National {
        /// Informational only; not part of the bucket
        country: Option<CountryId>,
    },
    /// Zone seat
    Zone {
        /// Zone code
        zone: String,
        /// Informational only; not part of the bucket
        country: Option<CountryId>,
    },
    /// State seat
    State {
        /// State reference
        state: StateId,
    },
    /// District seat
    District {
        /// District reference
        district: DistrictId,
    },
    /// Mandal seat
    Mandal {
        /// Mandal reference
        mandal: MandalId,
    },
}

impl GeoScope {
    /// Level this scope belongs to
    #[must_use]
    pub const fn level(&self) -> OrgLevel {
        match self {
            Self::National { .. } => OrgLevel::National,
            Self::Zone { .. } => OrgLevel::Zone,
            Self::State { .. } => OrgLevel::State,
            Self::District { .. } => OrgLevel::District,
            Self::Mandal { .. } => OrgLevel::Mandal,
        }
    }

    /// Geo component of the bucket key. Empty for national seats.
    #[must_use]
    pub fn geo_key(&self) -> String {
        match self {
            Self::National { .. } => String::new(),
            Self::Zone { zone, .. } => zone.clone(),
            Self::State { state } => state.to_string(),
            Self::District { district } => district.to_string(),
            Self::Mandal { mandal } => mandal.to_string(),
        }
    }

    /// Zone code, if any
    #[must_use]
    pub fn zone(&self) -> Option<&str> {
        match self {
            Self::Zone { zone, .. } => Some(zone),
            _ => None,
        }
    }

    /// Country, if any
    #[must_use]
    pub const fn country(&self) -> Option<CountryId> {
        match self {
            Self::National { country } | Self::Zone { country, .. } => *country,
            _ => None,
        }
    }

    /// State reference, if this is a state seat
    #[must_use]
    pub const fn state(&self) -> Option<StateId> {
        match self {
            Self::State { state } => Some(*state),
            _ => None,
        }
    }

    /// District reference, if this is a district seat
    #[must_use]
    pub const fn district(&self) -> Option<DistrictId> {
        match self {
            Self::District { district } => Some(*district),
            _ => None,
        }
    }

    /// Mandal reference, if this is a mandal seat
    #[must_use]
    pub const fn mandal(&self) -> Option<MandalId> {
        match self {
            Self::Mandal { mandal } => Some(*mandal),
            _ => None,
        }
    }
}

/// Validated organizational seat spec
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SeatSpec {
    /// Owning cell
    pub cell: CellId,
    /// Designation within the cell
    pub designation: DesignationId,
    /// Level and geo reference
    pub scope: GeoScope,
}

impl SeatSpec {
    /// Level of the seat
    #[must_use]
    pub const fn level(&self) -> OrgLevel {
        self.scope.level()
    }

    /// Aggregate bucket: all designations in the same cell, level and geo
    #[must_use]
    pub fn level_bucket(&self) -> LevelBucket {
        LevelBucket {
            cell: self.cell,
            level: self.level(),
            geo_key: self.scope.geo_key(),
        }
    }

    /// Designation bucket inside the aggregate bucket
    #[must_use]
    pub fn seat_bucket(&self) -> SeatBucket {
        SeatBucket {
            level: self.level_bucket(),
            designation: self.designation,
        }
    }
}

/// Flat spec as received from clients or read back from storage
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeatSpecRequest {
    /// Cell reference
    pub cell_ref: Option<CellId>,
    /// Designation reference
    pub designation_ref: Option<DesignationId>,
    /// Organizational level
    pub level: Option<OrgLevel>,
    /// Zone code, required for ZONE
    pub zone: Option<String>,
    /// Country, optional for NATIONAL and ZONE
    pub country_ref: Option<CountryId>,
    /// Required for STATE
    pub state_ref: Option<StateId>,
    /// Required for DISTRICT
    pub district_ref: Option<DistrictId>,
    /// Required for MANDAL
    pub mandal_ref: Option<MandalId>,
}

impl SeatSpecRequest {
    /// Validates into a [`SeatSpec`].
    ///
    /// Geo fields the level does not use are dropped.
    ///
    /// # Errors
    ///
    /// - [`SeatError::Validation`] when cell, designation or level is absent
    /// - [`SeatError::MissingLocation`] when the level's geo reference is absent
    pub fn into_spec(self) -> Result<SeatSpec> {
        let cell = self
            .cell_ref
            .ok_or_else(|| SeatError::Validation("cellRef is required".to_string()))?;
        let designation = self
            .designation_ref
            .ok_or_else(|| SeatError::Validation("designationRef is required".to_string()))?;
        let level = self
            .level
            .ok_or_else(|| SeatError::Validation("level is required".to_string()))?;

        let missing = |required| SeatError::MissingLocation { level, required };
        let scope = match level {
            OrgLevel::National => GeoScope::National {
                country: self.country_ref,
            },
            OrgLevel::Zone => {
                let zone = self
                    .zone
                    .map(|z| z.trim().to_string())
                    .filter(|z| !z.is_empty())
                    .ok_or_else(|| missing("zone"))?;
                GeoScope::Zone {
                    zone,
                    country: self.country_ref,
                }
            }
            OrgLevel::State => GeoScope::State {
                state: self.state_ref.ok_or_else(|| missing("stateRef"))?,
            },
            OrgLevel::District => GeoScope::District {
                district: self.district_ref.ok_or_else(|| missing("districtRef"))?,
            },
            OrgLevel::Mandal => GeoScope::Mandal {
                mandal: self.mandal_ref.ok_or_else(|| missing("mandalRef"))?,
            },
        };

        Ok(SeatSpec {
            cell,
            designation,
            scope,
        })
    }
}

impl From<&SeatSpec> for SeatSpecRequest {
    fn from(spec: &SeatSpec) -> Self {
        Self {
            cell_ref: Some(spec.cell),
            designation_ref: Some(spec.designation),
            level: Some(spec.level()),
            zone: spec.scope.zone().map(str::to_string),
            country_ref: spec.scope.country(),
            state_ref: spec.scope.state(),
            district_ref: spec.scope.district(),
            mandal_ref: spec.scope.mandal(),
        }
    }
}

/// Cell + level + geo bucket shared by all designations
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LevelBucket {
    /// Owning cell
    pub cell: CellId,
    /// Level
    pub level: OrgLevel,
    /// See [`GeoScope::geo_key`]
    pub geo_key: String,
}

impl LevelBucket {
    /// Key used to serialize reservations into this bucket
    #[must_use]
    pub fn lock_key(&self) -> String {
        format!("seat-bucket:{}:{}:{}", self.cell, self.level, self.geo_key)
    }
}

/// Designation bucket; the unit designation capacity applies to
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SeatBucket {
    /// Enclosing aggregate bucket
    pub level: LevelBucket,
    /// Designation
    pub designation: DesignationId,
}
