//! # Seat Engine Core
//!
//! Seat allocation and payment-gated registration.
//!
//! The engine decides, under concurrent access, whether a person may occupy
//! an organizational seat (a designation within a cell, at a geographic
//! level), what fee applies, and keeps that decision consistent with an
//! external, asynchronous payment provider.
//!
//! ## Data Flow
//!
//! ```text
//! quote ─► create intent (PENDING) ─► provider checkout
//!                                        │
//!                  client confirm ◄──────┴──────► webhook
//!                          │                         │
//!                          └──────► finalize ◄───────┘
//!                                     │
//!                     capacity re-check + reservation
//!                                     │
//!                     intent SUCCESS linked to ACTIVE seat
//!                     (or REFUND_REQUIRED when sold out)
//! ```
//!
//! ## Guarantees
//!
//! - Seats are never oversold: capacity checks and inserts in a bucket are
//!   serialized by [`SeatTransaction::lock_bucket`].
//! - A successful payment allocates exactly one seat, whichever of confirm
//!   and webhook arrives first.
//! - Webhook deliveries are deduplicated by payload fingerprint.
//! - Fees resolve deterministically: team → mandal → district → state →
//!   global → designation.
//!
//! Storage, the payment provider, identities and profiles are injected
//! through the traits in [`store`], [`provider`] and [`environment`].

pub mod capacity;
pub mod catalog;
pub mod discount;
pub mod engine;
pub mod environment;
pub mod error;
pub mod fee;
pub mod finalizer;
pub mod intent;
pub mod lifecycle;
pub mod pricing;
pub mod provider;
pub mod reservation;
pub mod seat;
pub mod settings;
pub mod spec;
pub mod store;
pub mod types;
pub mod webhook;

pub use engine::RegistrationEngine;
pub use error::{Result, SeatError};
pub use store::{SeatStore, SeatTransaction};
