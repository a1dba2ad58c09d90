//! API handlers
//!
//! Each handler follows the same pattern:
//! - Extract state and parameters using Axum extractors
//! - Parse the optional JSON body
//! - Call the balance service
//! - Map the result to the response shape of its route family

pub mod health;
pub mod profile;
pub mod response;
