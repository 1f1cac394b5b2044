//! Injected collaborators: time, identity and profile lookups.

use crate::error::Result;
use crate::types::{ContactNumber, UserId};
use chrono::{DateTime, Utc};
use std::future::Future;

/// Clock trait for getting current time.
///
/// Abstracted so tests can pin time when checking discount windows and
/// seat expiry.
pub trait Clock: Send + Sync {
    /// Get the current time
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock implementation
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Identity store owned by the wider backend.
///
/// Finalization resolves the contact to an identity before it opens the
/// seat transaction, so implementations must be idempotent per contact.
pub trait IdentityStore: Send + Sync {
    /// Returns the identity for `contact`, creating it if absent.
    ///
    /// # Errors
    ///
    /// Returns [`crate::SeatError::Storage`] if the store is unreachable.
    fn find_or_create_by_contact(
        &self,
        contact: &ContactNumber,
    ) -> impl Future<Output = Result<UserId>> + Send;
}

/// Profile store owned by the wider backend.
pub trait ProfileStore: Send + Sync {
    /// Returns `true` if the user has uploaded a photo.
    ///
    /// # Errors
    ///
    /// Returns [`crate::SeatError::Storage`] if the store is unreachable.
    fn has_photo(&self, user: UserId) -> impl Future<Output = Result<bool>> + Send;
}
