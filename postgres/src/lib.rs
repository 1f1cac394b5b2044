//! `PostgreSQL` store for the seat engine.
//!
//! Implements [`SeatStore`] and the identity/profile collaborators on top of
//! sqlx. Capacity checks are serialized per level bucket with transaction
//! scoped advisory locks:
//!
//! - `lock_bucket` and `lock_contact` call `pg_advisory_xact_lock` on a
//!   64-bit hash of the bucket or contact key, released at commit/rollback
//! - `load_*_for_update` use `SELECT ... FOR UPDATE`
//! - a partial unique index on live seat sequences and one on held
//!   discounts per contact back the application checks
//!
//! # Example
//!
//! ```no_run
//! use seat_engine_postgres::PgSeatStore;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = PgSeatStore::connect("postgres://localhost/seats").await?;
//! store.migrate().await?;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod directory;
mod rows;
mod transaction;

pub use directory::{PgIdentityStore, PgProfileStore};
pub use transaction::PgTransaction;

use seat_engine_core::store::SeatStore;
use seat_engine_core::{Result, SeatError};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use std::time::Duration;

/// `PostgreSQL` seat store
#[derive(Clone, Debug)]
pub struct PgSeatStore {
    pool: PgPool,
}

/// Pool sizing for [`PgSeatStore::connect_with`]
#[derive(Clone, Copy, Debug)]
pub struct PoolOptions {
    /// Maximum connections
    pub max_connections: u32,
    /// Minimum idle connections
    pub min_connections: u32,
    /// Timeout for acquiring a connection
    pub acquire_timeout: Duration,
}

impl Default for PoolOptions {
    fn default() -> Self {
        Self {
            max_connections: 10,
            min_connections: 1,
            acquire_timeout: Duration::from_secs(5),
        }
    }
}

impl PgSeatStore {
    /// Wraps an existing pool.
    #[must_use]
    pub const fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connects with default pool options.
    ///
    /// # Errors
    ///
    /// [`SeatError::Storage`] if the database is unreachable.
    pub async fn connect(database_url: &str) -> Result<Self> {
        Self::connect_with(database_url, PoolOptions::default()).await
    }

    /// Connects with explicit pool options.
    ///
    /// # Errors
    ///
    /// [`SeatError::Storage`] if the database is unreachable.
    pub async fn connect_with(database_url: &str, options: PoolOptions) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(options.max_connections)
            .min_connections(options.min_connections)
            .acquire_timeout(options.acquire_timeout)
            .connect(database_url)
            .await
            .map_err(|e| SeatError::Storage(format!("Failed to connect: {e}")))?;
        tracing::debug!(
            max_connections = options.max_connections,
            min_connections = options.min_connections,
            "Connection pool ready"
        );
        Ok(Self { pool })
    }

    /// Runs the embedded migrations.
    ///
    /// # Errors
    ///
    /// [`SeatError::Storage`] if a migration fails.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| SeatError::Storage(format!("Migration failed: {e}")))?;
        tracing::info!("Database migrations applied");
        Ok(())
    }

    /// Round-trips a trivial query, for readiness checks.
    ///
    /// # Errors
    ///
    /// [`SeatError::Storage`] if the database does not answer.
    pub async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| SeatError::Storage(format!("Ping failed: {e}")))?;
        Ok(())
    }

    /// Underlying pool
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }
}

impl SeatStore for PgSeatStore {
    type Tx = PgTransaction;

    async fn begin(&self) -> Result<PgTransaction> {
        let tx = self
            .pool
            .begin()
            .await
            .map_err(|e| SeatError::Storage(format!("Failed to begin transaction: {e}")))?;
        Ok(PgTransaction::new(tx))
    }
}
