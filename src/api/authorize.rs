//! Authorization handshake endpoints.
//!
//! The flow:
//! 1. GET /authorize/start → 302 to the provider's authorization page
//! 2. User authorizes (or declines) on the provider's site
//! 3. Provider redirects to GET /authorize/callback?sid=...
//! 4. Handshake completes; user is redirected to the result page with a
//!    `link_status` query parameter
//!
//! Provider error detail is logged here and never echoed to the end user.

use crate::authorize::{AuthorizationCoordinator, AuthorizationError, LinkOutcome};
use crate::identity::resolve_local_user;
use axum::{
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json, Redirect, Response},
    routing::get,
    Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Error response
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

/// Application error types for handshake endpoints
enum AppError {
    BadRequest(String),
    Unauthorized(String),
    BadGateway(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
            AppError::BadGateway(msg) => (StatusCode::BAD_GATEWAY, msg),
        };

        let body = Json(ErrorResponse {
            error: error_message,
        });

        (status, body).into_response()
    }
}

/// Shared application state for the handshake API
#[derive(Clone)]
pub struct AuthorizeAppState {
    pub coordinator: Arc<AuthorizationCoordinator>,
    pub auth_enabled: bool,
    /// Path the user lands on after the handshake, with a `link_status`
    /// query parameter appended
    pub result_path: String,
}

/// Provider callback query parameters
#[derive(Deserialize)]
pub struct CallbackQuery {
    /// Session handle embedded in the callback URL at start
    sid: Option<String>,
    oauth_token: Option<String>,
    oauth_verifier: Option<String>,
    /// Set by the provider when the user declined
    denied: Option<String>,
}

/// Create the handshake API router
pub fn create_authorize_router(state: AuthorizeAppState) -> Router {
    Router::new()
        .route("/authorize/start", get(authorize_start))
        .route("/authorize/callback", get(authorize_callback))
        .with_state(Arc::new(state))
}

/// GET /authorize/start
///
/// Starts the handshake for the authenticated user and redirects to the
/// provider's authorization page.
async fn authorize_start(
    State(state): State<Arc<AuthorizeAppState>>,
    headers: HeaderMap,
) -> Result<Redirect, AppError> {
    let user = resolve_local_user(&headers, state.auth_enabled)
        .map_err(|e| AppError::Unauthorized(format!("Invalid token: {}", e)))?;

    debug!(%user, "Authorization start requested");

    let begin = state.coordinator.begin_authorization(&user).await.map_err(|e| {
        error!(%user, error = %e, "Failed to start authorization");
        AppError::BadGateway("Could not authenticate with the provider".to_string())
    })?;

    Ok(Redirect::temporary(&begin.redirect_url))
}

/// GET /authorize/callback
///
/// Provider callback. Completes the handshake and redirects to the result
/// page with `link_status` set to `linked`, `already_linked`, `denied`, or
/// `error`. Failures never surface provider detail.
async fn authorize_callback(
    State(state): State<Arc<AuthorizeAppState>>,
    Query(callback): Query<CallbackQuery>,
) -> Result<Redirect, AppError> {
    let sid = callback
        .sid
        .ok_or_else(|| AppError::BadRequest("Missing 'sid' parameter".to_string()))?;

    debug!(sid = %sid, "Authorization callback received");

    let outcome = state
        .coordinator
        .complete_authorization(
            &sid,
            callback.oauth_token.as_deref(),
            callback.oauth_verifier.as_deref(),
            callback.denied.is_some(),
        )
        .await;

    let status = match outcome {
        Ok(LinkOutcome::Linked {
            ref remote_profile_id,
            ..
        }) => {
            info!(remote_profile_id = %remote_profile_id, "Callback completed, account linked");
            "linked"
        }
        Ok(LinkOutcome::AlreadyLinked {
            ref remote_profile_id,
        }) => {
            warn!(remote_profile_id = %remote_profile_id, "Callback for already-linked account");
            "already_linked"
        }
        Ok(LinkOutcome::Denied) => {
            info!("Callback reports user declined");
            "denied"
        }
        Err(AuthorizationError::StateMissing) => {
            warn!(sid = %sid, "Callback without pending authorization state");
            "error"
        }
        Err(e) => {
            error!(sid = %sid, error = %e, "Callback failed");
            "error"
        }
    };

    Ok(Redirect::temporary(&format!(
        "{}?link_status={}",
        state.result_path, status
    )))
}
