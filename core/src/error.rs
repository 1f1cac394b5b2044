//! Error taxonomy for seat allocation and payment-gated registration.

use crate::spec::OrgLevel;
use thiserror::Error;

/// Result type alias for engine operations.
pub type Result<T> = std::result::Result<T, SeatError>;

/// Every failure the engine can surface.
///
/// Variants are grouped the same way callers have to route them: validation
/// and not-found failures are returned synchronously and never retried,
/// capacity conflicts are deterministic for the same seat spec, integrity
/// failures leave all state untouched, and `RefundRequired` is the single
/// case where money has moved but no seat exists.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SeatError {
    // ═══════════════════════════════════════════════════════════
    // Validation
    // ═══════════════════════════════════════════════════════════

    /// The geo reference required by the organizational level is absent.
    #[error("Missing location: level {level} requires {required}")]
    MissingLocation {
        /// Level of the seat spec
        level: OrgLevel,
        /// Name of the missing field
        required: &'static str,
    },

    /// No fee purpose was supplied.
    #[error("Missing purpose")]
    MissingPurpose,

    /// Input failed validation.
    #[error("Validation failed: {0}")]
    Validation(String),

    // ═══════════════════════════════════════════════════════════
    // Lookup
    // ═══════════════════════════════════════════════════════════

    /// A referenced record does not exist.
    #[error("{resource} with id {id} not found")]
    NotFound {
        /// Kind of record
        resource: &'static str,
        /// Identifier that failed to resolve
        id: String,
    },

    // ═══════════════════════════════════════════════════════════
    // Capacity
    // ═══════════════════════════════════════════════════════════

    /// Designation capacity for the bucket is exhausted.
    #[error("No seats left for this designation")]
    NoSeatsDesignation,

    /// Aggregate capacity across the cell and level is exhausted.
    #[error("No seats left at this level")]
    NoSeatsLevelAggregate,

    /// Bucket sold out between quote and order creation.
    #[error("Seat sold out")]
    SoldOut,

    // ═══════════════════════════════════════════════════════════
    // Payment integrity
    // ═══════════════════════════════════════════════════════════

    /// Provider signature did not verify.
    #[error("Invalid payment signature")]
    InvalidSignature,

    /// Provider signature is required but was not supplied.
    #[error("Missing payment gateway signature")]
    MissingPgSignature,

    /// Payment succeeded but the seat could not be allocated.
    #[error("Seat sold out after payment for order {intent_id}; contact support for refund")]
    RefundRequired {
        /// Payment intent awaiting refund
        intent_id: String,
    },

    // ═══════════════════════════════════════════════════════════
    // State
    // ═══════════════════════════════════════════════════════════

    /// Write would violate a uniqueness rule.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// A state machine rejected the transition.
    #[error("Invalid transition from {from} to {to}")]
    InvalidTransition {
        /// Current state
        from: String,
        /// Requested state
        to: String,
    },

    // ═══════════════════════════════════════════════════════════
    // System
    // ═══════════════════════════════════════════════════════════

    /// Storage operation failed.
    #[error("Storage error: {0}")]
    Storage(String),

    /// Payment provider call failed.
    #[error("Payment provider error: {0}")]
    Provider(String),
}

impl SeatError {
    /// Shorthand for [`SeatError::NotFound`].
    pub fn not_found(resource: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            resource,
            id: id.to_string(),
        }
    }

    /// Shorthand for [`SeatError::InvalidTransition`].
    pub fn invalid_transition(from: impl ToString, to: impl ToString) -> Self {
        Self::InvalidTransition {
            from: from.to_string(),
            to: to.to_string(),
        }
    }

    /// Stable machine-readable code for API responses.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::MissingLocation { .. } => "MISSING_LOCATION",
            Self::MissingPurpose => "MISSING_PURPOSE",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::NotFound { .. } => "NOT_FOUND",
            Self::NoSeatsDesignation => "NO_SEATS_DESIGNATION",
            Self::NoSeatsLevelAggregate => "NO_SEATS_LEVEL_AGGREGATE",
            Self::SoldOut => "SOLD_OUT",
            Self::InvalidSignature => "INVALID_SIGNATURE",
            Self::MissingPgSignature => "MISSING_PG_SIGNATURE",
            Self::RefundRequired { .. } => "REFUND_REQUIRED",
            Self::Conflict(_) => "CONFLICT",
            Self::InvalidTransition { .. } => "INVALID_TRANSITION",
            Self::Storage(_) => "STORAGE_ERROR",
            Self::Provider(_) => "PROVIDER_ERROR",
        }
    }

    /// Returns `true` if the caller sent something unusable.
    ///
    /// # Examples
    ///
    /// ```
    /// # use seat_engine_core::SeatError;
    /// assert!(SeatError::MissingPurpose.is_user_error());
    /// assert!(!SeatError::Storage("down".into()).is_user_error());
    /// ```
    #[must_use]
    pub const fn is_user_error(&self) -> bool {
        matches!(
            self,
            Self::MissingLocation { .. }
                | Self::MissingPurpose
                | Self::Validation(_)
                | Self::NotFound { .. }
                | Self::InvalidSignature
                | Self::MissingPgSignature
        )
    }

    /// Returns `true` for capacity conflicts.
    ///
    /// Retrying these with the same seat spec fails again.
    #[must_use]
    pub const fn is_capacity_conflict(&self) -> bool {
        matches!(
            self,
            Self::NoSeatsDesignation | Self::NoSeatsLevelAggregate | Self::SoldOut
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_are_stable() {
        assert_eq!(
            SeatError::MissingLocation {
                level: OrgLevel::State,
                required: "stateRef"
            }
            .code(),
            "MISSING_LOCATION"
        );
        assert_eq!(SeatError::NoSeatsDesignation.code(), "NO_SEATS_DESIGNATION");
        assert_eq!(
            SeatError::RefundRequired {
                intent_id: "x".into()
            }
            .code(),
            "REFUND_REQUIRED"
        );
    }

    #[test]
    fn test_refund_required_is_not_a_capacity_conflict() {
        let err = SeatError::RefundRequired {
            intent_id: "abc".into(),
        };
        assert!(!err.is_capacity_conflict());
        assert!(!err.is_user_error());
        assert!(SeatError::NoSeatsLevelAggregate.is_capacity_conflict());
    }

    #[test]
    fn test_not_found_display() {
        let err = SeatError::not_found("Designation", "123");
        assert_eq!(err.to_string(), "Designation with id 123 not found");
    }
}
