//! In-memory identity and profile stores.

use seat_engine_core::Result;
use seat_engine_core::environment::{IdentityStore, ProfileStore};
use seat_engine_core::types::{ContactNumber, UserId};
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Identity store keyed by contact
#[derive(Debug, Default)]
pub struct InMemoryIdentityStore {
    users: Mutex<HashMap<ContactNumber, UserId>>,
    calls: AtomicUsize,
}

impl InMemoryIdentityStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Identity for `contact`, if one was created.
    #[must_use]
    pub fn user_for(&self, contact: &ContactNumber) -> Option<UserId> {
        self.users.lock().ok().and_then(|u| u.get(contact).copied())
    }

    /// Number of identities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.users.lock().map(|u| u.len()).unwrap_or_default()
    }

    /// `true` if no identity exists.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of `find_or_create_by_contact` calls.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl IdentityStore for InMemoryIdentityStore {
    async fn find_or_create_by_contact(&self, contact: &ContactNumber) -> Result<UserId> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut users = self
            .users
            .lock()
            .map_err(|_| seat_engine_core::SeatError::Storage("identity store poisoned".to_string()))?;
        Ok(*users.entry(contact.clone()).or_default())
    }
}

/// Profile store tracking which users have a photo
#[derive(Debug, Default)]
pub struct InMemoryProfileStore {
    photos: Mutex<HashSet<UserId>>,
}

impl InMemoryProfileStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records that `user` has (or no longer has) a photo.
    pub fn set_photo(&self, user: UserId, present: bool) {
        if let Ok(mut photos) = self.photos.lock() {
            if present {
                photos.insert(user);
            } else {
                photos.remove(&user);
            }
        }
    }
}

impl ProfileStore for InMemoryProfileStore {
    async fn has_photo(&self, user: UserId) -> Result<bool> {
        Ok(self.photos.lock().map(|p| p.contains(&user)).unwrap_or_default())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_find_or_create_is_idempotent() {
        let store = InMemoryIdentityStore::new();
        let contact = ContactNumber::parse("+91 98765 43210").unwrap();
        let first = store.find_or_create_by_contact(&contact).await.unwrap();
        let second = store.find_or_create_by_contact(&contact).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(store.len(), 1);
        assert_eq!(store.calls(), 2);
    }

    #[tokio::test]
    async fn test_photo_toggle() {
        let store = InMemoryProfileStore::new();
        let user = UserId::new();
        assert!(!store.has_photo(user).await.unwrap());
        store.set_photo(user, true);
        assert!(store.has_photo(user).await.unwrap());
    }
}
