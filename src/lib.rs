// This is a metapackage for cross-crate tests
// Re-export crates as modules

pub use api_gateway;
pub use common;
pub use profile_service;
