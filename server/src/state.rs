//! Application state for the HTTP server.

use seat_engine_core::RegistrationEngine;
use seat_engine_core::environment::{IdentityStore, ProfileStore};
use seat_engine_core::provider::PaymentProvider;
use seat_engine_core::store::SeatStore;
use seat_engine_postgres::{PgIdentityStore, PgProfileStore, PgSeatStore};
use std::future::Future;
use std::sync::Arc;

use crate::provider::HttpPaymentProvider;

/// Collaborators the server is wired with.
///
/// Production uses [`PgBackend`]; tests plug in the in-memory doubles.
pub trait Backend: Send + Sync + 'static {
    /// Seat store
    type Store: SeatStore + 'static;
    /// Payment provider
    type Provider: PaymentProvider + 'static;
    /// Identity store
    type Identities: IdentityStore + 'static;
    /// Profile store
    type Profiles: ProfileStore + 'static;

    /// Readiness check against the store.
    fn ping(store: &Self::Store) -> impl Future<Output = bool> + Send;
}

/// `PostgreSQL` plus HTTP provider
#[derive(Debug)]
pub struct PgBackend;

impl Backend for PgBackend {
    type Store = PgSeatStore;
    type Provider = HttpPaymentProvider;
    type Identities = PgIdentityStore;
    type Profiles = PgProfileStore;

    async fn ping(store: &PgSeatStore) -> bool {
        store.ping().await.is_ok()
    }
}

/// Engine type for a backend
pub type Engine<B> = RegistrationEngine<
    <B as Backend>::Store,
    <B as Backend>::Provider,
    <B as Backend>::Identities,
    <B as Backend>::Profiles,
>;

/// Application state shared across all HTTP handlers.
///
/// Cloned per request; everything inside is behind an `Arc`.
pub struct AppState<B: Backend> {
    /// Registration engine
    pub engine: Arc<Engine<B>>,
    /// Store, for readiness checks
    pub store: Arc<B::Store>,
    /// Header carrying the webhook signature
    pub webhook_signature_header: Arc<str>,
}

impl<B: Backend> AppState<B> {
    /// Create a new application state.
    #[must_use]
    pub fn new(engine: Arc<Engine<B>>, store: Arc<B::Store>, webhook_signature_header: &str) -> Self {
        Self {
            engine,
            store,
            webhook_signature_header: Arc::from(webhook_signature_header.to_ascii_lowercase()),
        }
    }
}

impl<B: Backend> Clone for AppState<B> {
    fn clone(&self) -> Self {
        Self {
            engine: Arc::clone(&self.engine),
            store: Arc::clone(&self.store),
            webhook_signature_header: Arc::clone(&self.webhook_signature_header),
        }
    }
}
