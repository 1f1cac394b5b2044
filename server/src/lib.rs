//! HTTP surface for the seat allocation and registration engine.
//!
//! Exposes capacity queries, quotes, reservations, the payment intent flow
//! and the provider webhook over axum, wired to the `PostgreSQL` store and an
//! HTTP payment provider.

pub mod api;
pub mod config;
pub mod error;
pub mod health;
pub mod metrics;
pub mod provider;
pub mod routes;
pub mod state;

pub use config::Config;
pub use error::AppError;
pub use routes::build_router;
pub use state::{AppState, Backend, PgBackend};

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Install the global tracing subscriber.
///
/// `RUST_LOG` overrides the default filter. `log_format = "json"` emits one
/// JSON object per line.
pub fn init_tracing(log_format: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,seat_engine=debug,sqlx=warn,tower_http=debug"));
    let registry = tracing_subscriber::registry().with(filter);
    if log_format.eq_ignore_ascii_case("json") {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}
