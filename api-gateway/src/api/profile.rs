//! Profile API handlers
//!
//! Handles endpoints related to profiles and their currencies:
//! - Read a profile document (API key required)
//! - Set/add/remove purchased currency (API key required)
//! - Award vbucks for kills and wins
//! - Read and adjust the vbucks balance
//!
//! Request bodies are optional on the game-client routes, so handlers take
//! the raw bytes and treat an empty body as an empty object.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Path, State},
    Json,
};
use common::model::profile::Profile;
use profile_service::service::parse_amount;
use serde::{de::DeserializeOwned, Deserialize};
use serde_json::Value;
use utoipa::ToSchema;

use crate::api::response::{AwardResponse, BalanceResponse, MtxResponse, UpdateVbucksResponse};
use crate::error::{ApiError, V1Error};
use crate::AppState;

fn optional_body<T: DeserializeOwned + Default>(body: &Bytes) -> Result<T, serde_json::Error> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body)
}

fn optional_integer(field: &str, raw: Option<Value>) -> Result<Option<i64>, V1Error> {
    match raw {
        None | Some(Value::Null) => Ok(None),
        Some(raw) => parse_amount(&raw)
            .map(Some)
            .map_err(|_| V1Error::BadRequest(format!("{} must be an integer", field))),
    }
}

/// Get a profile document
#[utoipa::path(
    get,
    path = "/api/profile/accountId/{account_id}",
    params(
        ("account_id" = String, Path, description = "Account ID")
    ),
    responses(
        (status = 200, description = "Profile retrieved successfully", body = Profile),
        (status = 401, description = "Missing or invalid API key", body = crate::error::ErrorResponse),
        (status = 404, description = "Profile not found", body = crate::error::ErrorResponse),
        (status = 500, description = "Internal server error", body = crate::error::ErrorResponse)
    ),
    security(("api_key" = [])),
    tag = "profile"
)]
pub async fn get_profile(
    State(state): State<Arc<AppState>>,
    Path(account_id): Path<String>,
) -> Result<Json<Profile>, ApiError> {
    let profile = state.balance_service.get_profile(&account_id).await
        .map_err(ApiError::read)?;

    Ok(Json(profile))
}

/// Purchased-currency adjustment request
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct MtxRequest {
    /// One of "set", "add", "remove"
    #[serde(default)]
    pub operation: Option<String>,
    /// Integer amount, as a number or a numeric string
    #[serde(default)]
    #[schema(value_type = Option<i64>)]
    pub amount: Option<Value>,
}

/// Set, add to or remove from the purchased-currency quantity
#[utoipa::path(
    post,
    path = "/api/profile/mtx/{account_id}",
    params(
        ("account_id" = String, Path, description = "Account ID")
    ),
    request_body = MtxRequest,
    responses(
        (status = 200, description = "Currency updated", body = MtxResponse),
        (status = 400, description = "Invalid amount or operation, unknown profile, or update rejected", body = crate::error::ErrorResponse),
        (status = 401, description = "Missing or invalid API key", body = crate::error::ErrorResponse),
        (status = 500, description = "Internal server error", body = crate::error::ErrorResponse)
    ),
    security(("api_key" = [])),
    tag = "profile"
)]
pub async fn adjust_mtx(
    State(state): State<Arc<AppState>>,
    Path(account_id): Path<String>,
    body: Bytes,
) -> Result<Json<MtxResponse>, ApiError> {
    let request: MtxRequest = optional_body(&body)
        .map_err(|e| ApiError::BadRequest(format!("Malformed JSON body: {}", e)))?;

    let operation = request.operation.unwrap_or_default();
    let amount = request.amount.unwrap_or(Value::Null);

    let adjustment = state.balance_service
        .adjust_legacy_currency(&account_id, &operation, &amount)
        .await
        .map_err(ApiError::write)?;

    Ok(Json(MtxResponse::updated(adjustment.amount, adjustment.outcome)))
}

/// Kill award request
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct AwardKillsRequest {
    /// Number of eliminations, 0 when absent
    #[serde(default)]
    #[schema(value_type = Option<i64>)]
    pub kills: Option<Value>,
}

/// Award vbucks for eliminations
#[utoipa::path(
    post,
    path = "/api/v1/profile/{account_id}/awardVbucksForKills",
    params(
        ("account_id" = String, Path, description = "Account ID")
    ),
    request_body = AwardKillsRequest,
    responses(
        (status = 200, description = "Vbucks awarded", body = AwardResponse),
        (status = 400, description = "Balance not updated", body = crate::error::FailureResponse),
        (status = 500, description = "Internal server error", body = crate::error::FailureResponse)
    ),
    tag = "vbucks"
)]
pub async fn award_vbucks_for_kills(
    State(state): State<Arc<AppState>>,
    Path(account_id): Path<String>,
    body: Bytes,
) -> Result<Json<AwardResponse>, V1Error> {
    let request: AwardKillsRequest = optional_body(&body)
        .map_err(|e| V1Error::BadRequest(format!("Malformed JSON body: {}", e)))?;
    let kills = optional_integer("kills", request.kills)?;

    let change = state.balance_service.award_for_kills(&account_id, kills).await
        .map_err(V1Error::write)?;

    Ok(Json(AwardResponse {
        success: true,
        vbucks_awarded: change.delta,
    }))
}

/// Award vbucks for a match win
#[utoipa::path(
    post,
    path = "/api/v1/profile/{account_id}/awardVbucksForWin",
    params(
        ("account_id" = String, Path, description = "Account ID")
    ),
    responses(
        (status = 200, description = "Vbucks awarded", body = AwardResponse),
        (status = 400, description = "Balance not updated", body = crate::error::FailureResponse),
        (status = 500, description = "Internal server error", body = crate::error::FailureResponse)
    ),
    tag = "vbucks"
)]
pub async fn award_vbucks_for_win(
    State(state): State<Arc<AppState>>,
    Path(account_id): Path<String>,
) -> Result<Json<AwardResponse>, V1Error> {
    let change = state.balance_service.award_for_win(&account_id).await
        .map_err(V1Error::write)?;

    Ok(Json(AwardResponse {
        success: true,
        vbucks_awarded: change.delta,
    }))
}

/// Get the vbucks balance
#[utoipa::path(
    get,
    path = "/api/v1/profile/{account_id}/vbucks",
    params(
        ("account_id" = String, Path, description = "Account ID")
    ),
    responses(
        (status = 200, description = "Current balance", body = BalanceResponse),
        (status = 404, description = "Profile not found", body = crate::error::FailureResponse),
        (status = 500, description = "Internal server error", body = crate::error::FailureResponse)
    ),
    tag = "vbucks"
)]
pub async fn get_vbucks(
    State(state): State<Arc<AppState>>,
    Path(account_id): Path<String>,
) -> Result<Json<BalanceResponse>, V1Error> {
    let vbucks = state.balance_service.get_balance(&account_id).await
        .map_err(V1Error::read)?;

    Ok(Json(BalanceResponse {
        success: true,
        vbucks,
    }))
}

/// Vbucks adjustment request
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct UpdateVbucksRequest {
    /// Signed delta, 0 when absent
    #[serde(default)]
    #[schema(value_type = Option<i64>)]
    pub vbucks: Option<Value>,
}

/// Add a signed delta to the vbucks balance
#[utoipa::path(
    post,
    path = "/api/v1/profile/{account_id}/updateVbucks",
    params(
        ("account_id" = String, Path, description = "Account ID")
    ),
    request_body = UpdateVbucksRequest,
    responses(
        (status = 200, description = "Balance updated", body = UpdateVbucksResponse),
        (status = 400, description = "Balance not updated", body = crate::error::FailureResponse),
        (status = 500, description = "Internal server error", body = crate::error::FailureResponse)
    ),
    tag = "vbucks"
)]
pub async fn update_vbucks(
    State(state): State<Arc<AppState>>,
    Path(account_id): Path<String>,
    body: Bytes,
) -> Result<Json<UpdateVbucksResponse>, V1Error> {
    let request: UpdateVbucksRequest = optional_body(&body)
        .map_err(|e| V1Error::BadRequest(format!("Malformed JSON body: {}", e)))?;
    let delta = optional_integer("vbucks", request.vbucks)?;

    let change = state.balance_service.update_balance(&account_id, delta).await
        .map_err(V1Error::write)?;

    Ok(Json(UpdateVbucksResponse {
        success: true,
        vbucks_updated: change.delta,
    }))
}
