//! JSON API for the conversational profile editor.
//!
//! Endpoints (all bearer-authenticated):
//! - `POST /v1/chat`           — run one conversational turn for the caller
//! - `GET  /v1/profile`        — fetch the caller's profile (empty until first write)
//! - `POST /v1/profile/reset`  — replace the caller's profile with a fresh record

use std::sync::Arc;

use axum::extract::State;
use axum::http::{header, HeaderValue, Method, StatusCode};
use axum::middleware;
use axum::routing::{get, post};
use axum::{Extension, Json, Router};
use serde::{Deserialize, Serialize};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::{info, warn};
use uuid::Uuid;

use tailor_agent::AgentRuntime;
use tailor_core::domain::profile::{Profile, UserId};
use tailor_core::errors::{ApplicationError, InterfaceError};
use tailor_db::repositories::ProfileRepository;

use crate::auth::{self, AuthVerifier};

#[derive(Clone)]
pub struct ApiState {
    pub runtime: Arc<AgentRuntime>,
    pub store: Arc<dyn ProfileRepository>,
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub reply: String,
}

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub error: String,
    pub correlation_id: String,
}

pub fn router(state: ApiState, verifier: AuthVerifier) -> Router {
    Router::new()
        .route("/v1/chat", post(chat_turn))
        .route("/v1/profile", get(fetch_profile))
        .route("/v1/profile/reset", post(reset_profile))
        .layer(middleware::from_fn_with_state(verifier, auth::require_user))
        .with_state(state)
}

pub fn cors_layer(origins: &[String]) -> CorsLayer {
    let allowed: Vec<HeaderValue> =
        origins.iter().filter_map(|origin| origin.parse().ok()).collect();
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed))
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
}

async fn chat_turn(
    State(state): State<ApiState>,
    Extension(user): Extension<UserId>,
    Json(body): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, (StatusCode, Json<ApiError>)> {
    let correlation_id = Uuid::new_v4().to_string();

    match state.runtime.process_turn(&user, &body.message).await {
        Ok(reply) => {
            info!(
                event_name = "api.chat.completed",
                correlation_id = %correlation_id,
                user_id = %user,
                "chat turn completed"
            );
            Ok(Json(ChatResponse { reply }))
        }
        Err(error) => Err(error_response(ApplicationError::from(error), correlation_id)),
    }
}

async fn fetch_profile(
    State(state): State<ApiState>,
    Extension(user): Extension<UserId>,
) -> Result<Json<Profile>, (StatusCode, Json<ApiError>)> {
    let correlation_id = Uuid::new_v4().to_string();

    match state.store.find_by_id(&user).await {
        Ok(profile) => Ok(Json(profile.unwrap_or_else(|| Profile::empty(user)))),
        Err(error) => {
            Err(error_response(ApplicationError::Store(error.to_string()), correlation_id))
        }
    }
}

async fn reset_profile(
    State(state): State<ApiState>,
    Extension(user): Extension<UserId>,
) -> Result<Json<Profile>, (StatusCode, Json<ApiError>)> {
    let correlation_id = Uuid::new_v4().to_string();

    let fresh = Profile::empty(user.clone());
    match state.store.save(fresh.clone()).await {
        Ok(()) => {
            info!(
                event_name = "api.profile.reset",
                correlation_id = %correlation_id,
                user_id = %user,
                "profile reset to an empty record"
            );
            Ok(Json(fresh))
        }
        Err(error) => {
            Err(error_response(ApplicationError::Store(error.to_string()), correlation_id))
        }
    }
}

/// Logs the internal diagnostic and serializes only the safe message.
fn error_response(
    error: ApplicationError,
    correlation_id: String,
) -> (StatusCode, Json<ApiError>) {
    let interface = error.into_interface(correlation_id);
    warn!(
        event_name = "api.request.failed",
        correlation_id = %interface.correlation_id(),
        diagnostic = %interface.diagnostic(),
        "request failed"
    );

    let status = match &interface {
        InterfaceError::BadRequest { .. } => StatusCode::BAD_REQUEST,
        InterfaceError::ServiceUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
        InterfaceError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    };
    let body = ApiError {
        error: interface.user_message().to_string(),
        correlation_id: interface.correlation_id().to_string(),
    };
    (status, Json(body))
}
