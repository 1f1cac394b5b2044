//! Reference data the engine reads but never writes: cells, designations,
//! capacity caps and the location hierarchy.

use crate::error::{Result, SeatError};
use crate::spec::{GeoScope, LevelBucket, SeatSpec};
use crate::store::SeatTransaction;
use crate::types::{CellId, DesignationId, DistrictId, MandalId, Money, StateId};
use serde::{Deserialize, Serialize};

/// Organizational cell
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cell {
    /// Identifier
    pub id: CellId,
    /// Display name
    pub name: String,
}

/// Role within a cell
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Designation {
    /// Identifier
    pub id: DesignationId,
    /// Owning cell
    pub cell: CellId,
    /// Display name
    pub name: String,
    /// Seats per bucket
    pub capacity: u32,
    /// Base fee when no override applies
    pub fee: Money,
    /// Days an activated seat stays valid
    pub validity_days: u32,
}

/// Optional cap across all designations of a level bucket
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregateCapacity {
    /// Bucket the cap applies to
    pub bucket: LevelBucket,
    /// Maximum live seats across designations
    pub capacity: u32,
}

/// State in the location hierarchy
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct State {
    /// Identifier
    pub id: StateId,
    /// Display name
    pub name: String,
}

/// District, child of a state
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct District {
    /// Identifier
    pub id: DistrictId,
    /// Parent state
    pub state: StateId,
    /// Display name
    pub name: String,
}

/// Mandal, child of a district
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mandal {
    /// Identifier
    pub id: MandalId,
    /// Parent district
    pub district: DistrictId,
    /// Display name
    pub name: String,
}

/// Location chain of a seat spec, most specific first
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LocationChain {
    /// Mandal, for mandal seats
    pub mandal: Option<MandalId>,
    /// District, direct or via the mandal
    pub district: Option<DistrictId>,
    /// State, direct or via the district
    pub state: Option<StateId>,
}

/// Loads the cell and designation of a spec.
///
/// # Errors
///
/// [`SeatError::NotFound`] if either is unknown or the designation belongs to
/// another cell.
pub async fn load_designation<T: SeatTransaction>(tx: &mut T, spec: &SeatSpec) -> Result<Designation> {
    if tx.load_cell(spec.cell).await?.is_none() {
        return Err(SeatError::not_found("Cell", spec.cell));
    }
    let designation = tx
        .load_designation(spec.designation)
        .await?
        .ok_or_else(|| SeatError::not_found("Designation", spec.designation))?;
    if designation.cell != spec.cell {
        return Err(SeatError::not_found("Designation", spec.designation));
    }
    Ok(designation)
}

/// Walks mandal → district → state for the spec's geo reference.
///
/// National and zone seats have an empty chain.
///
/// # Errors
///
/// [`SeatError::NotFound`] for any unknown reference on the way up.
pub async fn resolve_locations<T: SeatTransaction>(tx: &mut T, scope: &GeoScope) -> Result<LocationChain> {
    let mut chain = LocationChain::default();

    match scope {
        GeoScope::National { .. } | GeoScope::Zone { .. } => return Ok(chain),
        GeoScope::Mandal { mandal } => {
            let row = tx
                .load_mandal(*mandal)
                .await?
                .ok_or_else(|| SeatError::not_found("Mandal", mandal))?;
            chain.mandal = Some(row.id);
            chain.district = Some(row.district);
        }
        GeoScope::District { district } => chain.district = Some(*district),
        GeoScope::State { state } => chain.state = Some(*state),
    }

    if let Some(district) = chain.district {
        let row = tx
            .load_district(district)
            .await?
            .ok_or_else(|| SeatError::not_found("District", district))?;
        chain.state = Some(row.state);
    }

    if let Some(state) = chain.state {
        if tx.load_state(state).await?.is_none() {
            return Err(SeatError::not_found("State", state));
        }
    }

    Ok(chain)
}
