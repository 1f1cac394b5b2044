//! Capacity resolver.

use crate::catalog;
use crate::error::Result;
use crate::spec::SeatSpec;
use crate::store::SeatTransaction;
use crate::types::Money;
use serde::{Deserialize, Serialize};

/// Capacity, usage and headroom of one bucket
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketUsage {
    /// Configured capacity
    pub capacity: u32,
    /// Live seats
    pub used: u32,
    /// `capacity - used`, never negative
    pub remaining: u32,
}

impl BucketUsage {
    /// Usage for `used` live seats out of `capacity`.
    #[must_use]
    pub const fn new(capacity: u32, used: u32) -> Self {
        Self {
            capacity,
            used,
            remaining: capacity.saturating_sub(used),
        }
    }

    /// Returns `true` if no seat is left.
    #[must_use]
    pub const fn is_full(&self) -> bool {
        self.remaining == 0
    }
}

/// Why a reservation was rejected
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RejectionReason {
    /// Designation bucket is full
    NoSeatsDesignation,
    /// Aggregate level bucket is full
    NoSeatsLevelAggregate,
}

impl RejectionReason {
    /// Wire name
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NoSeatsDesignation => "NO_SEATS_DESIGNATION",
            Self::NoSeatsLevelAggregate => "NO_SEATS_LEVEL_AGGREGATE",
        }
    }
}

impl From<RejectionReason> for crate::SeatError {
    fn from(reason: RejectionReason) -> Self {
        match reason {
            RejectionReason::NoSeatsDesignation => Self::NoSeatsDesignation,
            RejectionReason::NoSeatsLevelAggregate => Self::NoSeatsLevelAggregate,
        }
    }
}

/// Capacity of a seat spec
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CapacityReport {
    /// Designation bucket
    #[serde(flatten)]
    pub designation: BucketUsage,
    /// Designation base fee
    pub fee: Money,
    /// Validity of an activated seat
    pub validity_days: u32,
    /// Aggregate bucket, if a cap is configured
    pub aggregate: Option<BucketUsage>,
}

impl CapacityReport {
    /// First cap that blocks a new seat, designation before aggregate.
    #[must_use]
    pub const fn rejection(&self) -> Option<RejectionReason> {
        if self.designation.is_full() {
            return Some(RejectionReason::NoSeatsDesignation);
        }
        match self.aggregate {
            Some(aggregate) if aggregate.is_full() => Some(RejectionReason::NoSeatsLevelAggregate),
            _ => None,
        }
    }
}

/// Computes the capacity report for `spec`.
///
/// Read-only. Counts are only authoritative for a reservation when the
/// caller holds the bucket lock.
///
/// # Errors
///
/// [`crate::SeatError::NotFound`] for an unknown cell or designation.
pub async fn resolve<T: SeatTransaction>(tx: &mut T, spec: &SeatSpec) -> Result<CapacityReport> {
    let designation = catalog::load_designation(tx, spec).await?;
    let used = tx.count_live_seats(&spec.seat_bucket()).await?;

    let level_bucket = spec.level_bucket();
    let aggregate = match tx.load_aggregate_capacity(&level_bucket).await? {
        Some(cap) => {
            let used = tx.count_live_seats_in_level(&level_bucket).await?;
            Some(BucketUsage::new(cap.capacity, used))
        }
        None => None,
    };

    let report = CapacityReport {
        designation: BucketUsage::new(designation.capacity, used),
        fee: designation.fee,
        validity_days: designation.validity_days,
        aggregate,
    };
    tracing::debug!(
        bucket = %level_bucket.lock_key(),
        designation = %spec.designation,
        used = report.designation.used,
        capacity = report.designation.capacity,
        "Capacity resolved"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(capacity: u32, used: u32, aggregate: Option<(u32, u32)>) -> CapacityReport {
        CapacityReport {
            designation: BucketUsage::new(capacity, used),
            fee: Money::ZERO,
            validity_days: 365,
            aggregate: aggregate.map(|(c, u)| BucketUsage::new(c, u)),
        }
    }

    #[test]
    fn test_designation_checked_first() {
        assert_eq!(
            report(1, 1, Some((1, 1))).rejection(),
            Some(RejectionReason::NoSeatsDesignation)
        );
    }

    #[test]
    fn test_aggregate_blocks_when_designation_has_room() {
        assert_eq!(
            report(5, 1, Some((3, 3))).rejection(),
            Some(RejectionReason::NoSeatsLevelAggregate)
        );
        assert_eq!(report(5, 1, None).rejection(), None);
    }

    #[test]
    fn test_overfull_bucket_reports_zero_remaining() {
        let usage = BucketUsage::new(2, 3);
        assert_eq!(usage.remaining, 0);
        assert!(usage.is_full());
    }
}
