//! Common types and utilities for the profile backend
//!
//! This library contains the shared error type, the profile domain model and
//! the database helpers used by both the profile service and the API gateway.

pub mod error;
pub mod model;
pub mod db;

/// Re-export important types
pub use error::{Error, Result, ErrorExt};
pub use model::profile::{BalanceUpdate, CurrencyField, CurrencyOperation, Profile, Projection, UpdateOutcome};

// Re-export utoipa for use in model ToSchema derives
#[cfg(feature = "utoipa")]
pub use utoipa;
