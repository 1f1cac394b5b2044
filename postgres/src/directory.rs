//! Identity and profile lookups against the shared `users` and `profiles` tables.

use seat_engine_core::environment::{IdentityStore, ProfileStore};
use seat_engine_core::types::{ContactNumber, UserId};
use seat_engine_core::{Result, SeatError};
use sqlx::PgPool;
use uuid::Uuid;

/// [`IdentityStore`] over the `users` table
#[derive(Clone, Debug)]
pub struct PgIdentityStore {
    pool: PgPool,
}

impl PgIdentityStore {
    /// Creates a store on `pool`.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl IdentityStore for PgIdentityStore {
    async fn find_or_create_by_contact(&self, contact: &ContactNumber) -> Result<UserId> {
        // The no-op update makes RETURNING yield the existing row on conflict
        let id: Uuid = sqlx::query_scalar(
            r"
            INSERT INTO users (id, contact)
            VALUES ($1, $2)
            ON CONFLICT (contact) DO UPDATE SET contact = EXCLUDED.contact
            RETURNING id
            ",
        )
        .bind(Uuid::new_v4())
        .bind(contact.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| SeatError::Storage(format!("Failed to resolve identity: {e}")))?;
        Ok(UserId::from_uuid(id))
    }
}

/// [`ProfileStore`] over the `profiles` table
#[derive(Clone, Debug)]
pub struct PgProfileStore {
    pool: PgPool,
}

impl PgProfileStore {
    /// Creates a store on `pool`.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl ProfileStore for PgProfileStore {
    async fn has_photo(&self, user: UserId) -> Result<bool> {
        let photo: Option<Option<String>> = sqlx::query_scalar("SELECT photo_url FROM profiles WHERE user_id = $1")
            .bind(user.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| SeatError::Storage(format!("Failed to load profile: {e}")))?;
        Ok(photo.flatten().is_some_and(|url| !url.trim().is_empty()))
    }
}
