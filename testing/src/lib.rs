//! # Seat Engine Testing
//!
//! Test doubles and fixtures for the seat engine.
//!
//! This crate provides:
//! - [`InMemorySeatStore`]: a store whose transactions are serialized by one
//!   async mutex, so every transaction is trivially serializable, with
//!   one-shot [`StoreFault`] injection
//! - [`MockPaymentProvider`]: signs and verifies with fixed test secrets
//! - In-memory identity and profile stores
//! - [`FixedClock`]: deterministic, manually advanced time
//! - [`Harness`]: a fully wired engine with a seeded location hierarchy
//!
//! ## Example
//!
//! ```ignore
//! use seat_engine_testing::Harness;
//!
//! #[tokio::test]
//! async fn test_reserve() {
//!     let harness = Harness::new().await;
//!     let designation = harness.designation(1, 50_000).await;
//!     let outcome = harness
//!         .engine
//!         .reserve_seat(None, harness.national(&designation), None)
//!         .await
//!         .unwrap();
//!     assert!(outcome.seat_id().is_some());
//! }
//! ```

pub mod directory;
pub mod fixtures;
pub mod memory;
pub mod provider;

pub use directory::{InMemoryIdentityStore, InMemoryProfileStore};
pub use fixtures::{Harness, TestEngine, contact};
pub use memory::{InMemorySeatStore, StoreFault};
pub use mocks::{FixedClock, test_clock};
pub use provider::MockPaymentProvider;

/// Mock implementations of environment traits
pub mod mocks {
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use seat_engine_core::environment::Clock;
    use std::sync::atomic::{AtomicI64, Ordering};

    /// Manually advanced clock for deterministic tests
    ///
    /// # Example
    ///
    /// ```
    /// use seat_engine_testing::mocks::FixedClock;
    /// use seat_engine_core::environment::Clock;
    /// use chrono::{Duration, Utc};
    ///
    /// let start = Utc::now();
    /// let clock = FixedClock::new(start);
    /// clock.advance(Duration::days(1));
    /// assert!(clock.now() > start);
    /// ```
    #[derive(Debug)]
    pub struct FixedClock {
        millis: AtomicI64,
    }

    impl FixedClock {
        /// Create a clock frozen at `time`
        #[must_use]
        pub fn new(time: DateTime<Utc>) -> Self {
            Self {
                millis: AtomicI64::new(time.timestamp_millis()),
            }
        }

        /// Move the clock forward
        pub fn advance(&self, by: Duration) {
            self.millis.fetch_add(by.num_milliseconds(), Ordering::SeqCst);
        }

        /// Jump to `time`
        pub fn set(&self, time: DateTime<Utc>) {
            self.millis.store(time.timestamp_millis(), Ordering::SeqCst);
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            DateTime::from_timestamp_millis(self.millis.load(Ordering::SeqCst)).unwrap_or_default()
        }
    }

    /// Clock fixed at 2025-01-01 00:00:00 UTC
    #[must_use]
    pub fn test_clock() -> FixedClock {
        FixedClock::new(
            Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0)
                .single()
                .unwrap_or_default(),
        )
    }
}

/// Install a test subscriber once; honours `RUST_LOG`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()),
        )
        .with_test_writer()
        .try_init();
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::Duration;
    use seat_engine_core::environment::Clock;

    #[test]
    fn test_fixed_clock_is_stable() {
        let clock = test_clock();
        assert_eq!(clock.now(), clock.now());
    }

    #[test]
    fn test_fixed_clock_advances() {
        let clock = test_clock();
        let start = clock.now();
        clock.advance(Duration::hours(2));
        assert_eq!(clock.now() - start, Duration::hours(2));
    }
}
