//! HTTP handlers, one module per resource.
//!
//! Request bodies use camelCase field names. Seat specs are flattened into
//! the body as `cellRef`, `designationRef`, `level`, `zone`, `stateRef`,
//! `districtRef` and `mandalRef`.

pub mod availability;
pub mod discounts;
pub mod fees;
pub mod intents;
pub mod quotes;
pub mod reservations;
pub mod seats;
pub mod webhook;
