//! Account link management endpoints.
//!
//! Listing and unlinking for the authenticated user's own links. Credentials
//! are never exposed here.

use crate::identity::resolve_local_user;
use crate::links::{AccountLink, AccountLinkStore};
use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{delete, get},
    Router,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Error response
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

/// Application error types for link endpoints
enum AppError {
    Unauthorized(String),
    NotFound(String),
    ServerError(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::ServerError(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        let body = Json(ErrorResponse {
            error: error_message,
        });

        (status, body).into_response()
    }
}

/// Shared application state for the link API
#[derive(Clone)]
pub struct LinksAppState {
    pub links: Arc<AccountLinkStore>,
    pub auth_enabled: bool,
}

/// Link listing response
#[derive(Serialize)]
struct LinkListResponse {
    links: Vec<AccountLink>,
}

/// Create the link management API router
pub fn create_links_router(state: LinksAppState) -> Router {
    Router::new()
        .route("/api/links", get(list_links))
        .route("/api/links/:remote_profile_id", delete(unlink))
        .with_state(Arc::new(state))
}

/// GET /api/links
///
/// Lists the authenticated user's account links.
async fn list_links(
    State(state): State<Arc<LinksAppState>>,
    headers: HeaderMap,
) -> Result<Json<LinkListResponse>, AppError> {
    let user = resolve_local_user(&headers, state.auth_enabled)
        .map_err(|e| AppError::Unauthorized(format!("Invalid token: {}", e)))?;

    let links = state.links.list_by_user(user.as_str()).map_err(|e| {
        error!(%user, error = %e, "Failed to list account links");
        AppError::ServerError("Failed to list account links".to_string())
    })?;

    Ok(Json(LinkListResponse { links }))
}

/// DELETE /api/links/:remote_profile_id
///
/// Removes one of the authenticated user's links. 404 when the profile is
/// not linked to this user.
async fn unlink(
    State(state): State<Arc<LinksAppState>>,
    Path(remote_profile_id): Path<String>,
    headers: HeaderMap,
) -> Result<StatusCode, AppError> {
    let user = resolve_local_user(&headers, state.auth_enabled)
        .map_err(|e| AppError::Unauthorized(format!("Invalid token: {}", e)))?;

    let removed = state
        .links
        .unlink(user.as_str(), &remote_profile_id)
        .map_err(|e| {
            error!(%user, remote_profile_id = %remote_profile_id, error = %e, "Failed to unlink");
            AppError::ServerError("Failed to remove account link".to_string())
        })?;

    if !removed {
        warn!(%user, remote_profile_id = %remote_profile_id, "Unlink for unknown link");
        return Err(AppError::NotFound(format!(
            "No link for profile '{}'",
            remote_profile_id
        )));
    }

    info!(%user, remote_profile_id = %remote_profile_id, "Account unlinked");
    Ok(StatusCode::NO_CONTENT)
}
