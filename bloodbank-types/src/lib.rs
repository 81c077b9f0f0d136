//! Blood Bank domain vocabulary
//!
//! Shared, I/O-free types for the blood bank service.
//!
//! # Invariants
//!
//! - Exactly eight canonical blood types: A+, A-, B+, B-, AB+, AB-, O+, O-
//! - A unit expires a fixed 42 days after its donation was drawn
//! - Status only ever leaves `available`; `used` and `expired` are terminal

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    rust_2018_idioms,
    missing_debug_implementations,
    clippy::all
)]

pub mod error;
pub mod totals;
pub mod types;

// Re-exports
pub use error::{ParseError, Result};
pub use totals::InventoryTotals;
pub use types::{expiry_for, BloodType, Role, UnitStatus, Urgency, SHELF_LIFE_DAYS};
