//! Profile service for reading and mutating player currency balances

pub mod service;
pub mod repository;
pub mod config;

pub use service::{BalanceChange, BalanceService, LegacyAdjustment};
pub use repository::{InMemoryProfileStore, PostgresProfileStore, ProfileStore};
pub use config::{ProfileServiceConfig, StoreKind};
