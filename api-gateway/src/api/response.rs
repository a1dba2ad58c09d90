//! Response bodies of the profile API
//!
//! Field names are camelCase to match what game clients and launchers
//! already parse.

use common::model::profile::UpdateOutcome;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Successful purchased-currency adjustment
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MtxResponse {
    /// Always "ok"
    pub status: String,
    /// Human-readable summary
    pub message: String,
    /// Amount from the request (target for `set`)
    pub new_amount: i64,
    /// Raw store outcome
    pub result: UpdateOutcome,
}

impl MtxResponse {
    /// Build the success body for an applied amount
    pub fn updated(new_amount: i64, result: UpdateOutcome) -> Self {
        Self {
            status: "ok".to_string(),
            message: "Amount of currency successfully updated".to_string(),
            new_amount,
            result,
        }
    }
}

/// Vbucks awarded for kills or a win
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AwardResponse {
    /// Always true
    pub success: bool,
    /// Amount added to the balance
    pub vbucks_awarded: i64,
}

/// Current vbucks balance
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BalanceResponse {
    /// Always true
    pub success: bool,
    /// Balance
    pub vbucks: i64,
}

/// Vbucks balance adjusted by a signed delta
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateVbucksResponse {
    /// Always true
    pub success: bool,
    /// Delta applied to the balance
    pub vbucks_updated: i64,
}

/// Liveness of one dependency
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct DependencyHealth {
    /// "up" or "down"
    pub status: String,
    /// Probe latency
    pub latency_ms: u64,
}

/// Health check report
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    /// "healthy" or "degraded"
    pub status: String,
    /// Crate version
    pub version: String,
    /// RFC 3339 timestamp of the probe
    pub timestamp: String,
    /// Seconds since the server started
    pub uptime_seconds: u64,
    /// Profile store probe
    pub profile_store: DependencyHealth,
}
