//! HTTP surface of the profile backend
//!
//! Two route families share one [`AppState`]:
//! - `/api/profile/*`: operator routes, gated by the `x-api-key` header
//! - `/api/v1/profile/*`: game-client routes for vbucks rewards

pub mod api;
pub mod auth;
pub mod config;
pub mod error;

use std::sync::Arc;
use std::time::Instant;

use axum::{
    middleware,
    routing::{get, post},
    Json, Router,
};
use profile_service::BalanceService;
use tower_http::cors::{Any, CorsLayer};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer};
use tracing::Level;
use utoipa::openapi::security::{ApiKey, ApiKeyValue, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::api::health::health_check;
use crate::api::profile::{
    adjust_mtx, award_vbucks_for_kills, award_vbucks_for_win, get_profile, get_vbucks, update_vbucks,
};
use crate::auth::{require_api_key, API_KEY_HEADER};

/// App state shared across handlers
pub struct AppState {
    /// Balance service
    pub balance_service: Arc<BalanceService>,
    /// Key expected on the operator routes
    pub api_key: Option<String>,
    /// Server start time
    pub started_at: Instant,
}

impl AppState {
    pub fn new(balance_service: Arc<BalanceService>, api_key: Option<String>) -> Self {
        Self {
            balance_service,
            api_key,
            started_at: Instant::now(),
        }
    }
}

/// API documentation
#[derive(OpenApi)]
#[openapi(
    paths(
        // Operator routes
        api::profile::get_profile,
        api::profile::adjust_mtx,
        // Game-client routes
        api::profile::award_vbucks_for_kills,
        api::profile::award_vbucks_for_win,
        api::profile::get_vbucks,
        api::profile::update_vbucks,
        // Health
        api::health::health_check,
    ),
    components(
        schemas(
            common::model::profile::Profile,
            common::model::profile::UpdateOutcome,
            common::model::profile::CurrencyOperation,

            api::profile::MtxRequest,
            api::profile::AwardKillsRequest,
            api::profile::UpdateVbucksRequest,

            api::response::MtxResponse,
            api::response::AwardResponse,
            api::response::BalanceResponse,
            api::response::UpdateVbucksResponse,
            api::response::HealthResponse,
            api::response::DependencyHealth,

            error::ErrorResponse,
            error::ErrorInfo,
            error::FailureResponse
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "profile", description = "Profile and purchased-currency endpoints"),
        (name = "vbucks", description = "Vbucks reward and balance endpoints"),
        (name = "health", description = "Service health")
    ),
    info(
        title = "Profile Backend API",
        version = "1.0.0",
        description = "API for reading player profiles and adjusting their currency balances"
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "api_key",
            SecurityScheme::ApiKey(ApiKey::Header(ApiKeyValue::new(API_KEY_HEADER))),
        );
    }
}

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

/// Build the application router
pub fn app(state: Arc<AppState>, log_level: Level) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let operator_routes = Router::new()
        .route("/accountId/:account_id", get(get_profile))
        .route("/mtx/:account_id", post(adjust_mtx))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_api_key));

    let client_routes = Router::new()
        .route("/profile/:account_id/awardVbucksForKills", post(award_vbucks_for_kills))
        .route("/profile/:account_id/awardVbucksForWin", post(award_vbucks_for_win))
        .route("/profile/:account_id/vbucks", get(get_vbucks))
        .route("/profile/:account_id/updateVbucks", post(update_vbucks));

    Router::new()
        .nest("/api/profile", operator_routes)
        .nest("/api/v1", client_routes)
        .route("/health", get(health_check))
        .route("/api-docs/openapi.json", get(openapi_json))
        .layer(cors)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(log_level))
                .on_request(DefaultOnRequest::new().level(log_level))
                .on_response(DefaultOnResponse::new().level(log_level)),
        )
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .with_state(state)
}
