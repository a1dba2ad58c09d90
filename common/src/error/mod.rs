//! Error types for the profile backend
//!
//! This module provides the error type shared by the store, the balance
//! service and the HTTP layer. Each variant corresponds to one outcome the
//! HTTP layer renders differently.

use std::fmt::Display;
use thiserror::Error;

/// Profile backend error type
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed or out-of-range input, detected before any storage access
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// No profile document exists for the account
    #[error("Profile not found: {0}")]
    ProfileNotFound(String),

    /// The store matched the document but did not apply the requested change
    #[error("Mutation failed: {0}")]
    MutationFailed(String),

    /// The mutation would leave a currency balance below zero
    #[error("Insufficient balance: {0}")]
    InsufficientBalance(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(String),

    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Database migration error
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Whether the error was caused by the caller rather than the backend
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Error::ValidationError(_)
                | Error::ProfileNotFound(_)
                | Error::MutationFailed(_)
                | Error::InsufficientBalance(_)
        )
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Extension trait to add context to error results
pub trait ErrorExt<T> {
    /// Add context information to an error
    fn with_context<C, F>(self, context_fn: F) -> Result<T>
    where
        F: FnOnce() -> C,
        C: Display;
}

impl<T> ErrorExt<T> for Result<T> {
    fn with_context<C, F>(self, context_fn: F) -> Result<T>
    where
        F: FnOnce() -> C,
        C: Display,
    {
        self.map_err(|e| {
            let context = context_fn().to_string();
            match e {
                Error::ValidationError(msg) => Error::ValidationError(format!("{}: {}", context, msg)),
                Error::ProfileNotFound(msg) => Error::ProfileNotFound(format!("{}: {}", context, msg)),
                Error::MutationFailed(msg) => Error::MutationFailed(format!("{}: {}", context, msg)),
                Error::InsufficientBalance(msg) => Error::InsufficientBalance(format!("{}: {}", context, msg)),
                Error::ConfigurationError(msg) => Error::ConfigurationError(format!("{}: {}", context, msg)),
                Error::Internal(msg) => Error::Internal(format!("{}: {}", context, msg)),
                Error::Database(e) => Error::Database(e),
                Error::Migration(e) => Error::Migration(e),
                Error::Serialization(e) => Error::Serialization(e),
            }
        })
    }
}
