//! OAuth 1.0a handshake orchestration.
//!
//! Drives the three-step dance against the provider:
//! 1. `begin_authorization` obtains a temporary request token, stores it as
//!    pending state under a fresh session handle, and returns the provider
//!    authorization URL to redirect the user to.
//! 2. The user authorizes (or declines) on the provider's page; the provider
//!    redirects back to the callback URL carrying the handle.
//! 3. `complete_authorization` consumes the pending state, exchanges the
//!    verifier for a long-lived access token, fetches the remote profile,
//!    and records the account link (or detects an existing one).
//!
//! Per handshake attempt:
//! `Start -> TokenRequested -> AwaitingCallback -> {Denied | Exchanged -> {Linked | AlreadyLinked} | Failed}`.
//! The only suspension point is the external redirect; it is bounded by the
//! pending store's expiry, not by this component.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::identity::LocalUserId;
use crate::links::{AccessCredential, AccountLinkStore, LinkResult};
use crate::provider::OAuth1Provider;
use crate::session::PendingStore;

/// Result of starting a handshake.
#[derive(Clone, Debug)]
pub struct BeginAuthorization {
    /// Session handle the callback must present
    pub handle: String,
    /// Provider authorization URL to redirect the user to
    pub redirect_url: String,
}

/// Terminal outcome of a completed handshake.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LinkOutcome {
    /// A new link was recorded for this remote profile
    Linked {
        remote_profile_id: String,
        remote_display_name: String,
    },
    /// The remote profile was already linked; nothing was written
    AlreadyLinked { remote_profile_id: String },
    /// The resource owner declined on the provider's page
    Denied,
}

/// Handshake failures.
///
/// Provider detail is carried for logging; callers must surface only a
/// generic message to the end user.
#[derive(Debug)]
pub enum AuthorizationError {
    /// The provider rejected or failed the request-token step
    StartFailed(String),
    /// No pending state for this callback (expired, replayed, or forged)
    StateMissing,
    /// The verifier exchange or profile fetch failed
    ExchangeFailed(String),
    /// The link could not be persisted
    Storage(String),
}

impl std::fmt::Display for AuthorizationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthorizationError::StartFailed(detail) => {
                write!(f, "Could not start authorization: {}", detail)
            }
            AuthorizationError::StateMissing => {
                write!(f, "No pending authorization for this callback")
            }
            AuthorizationError::ExchangeFailed(detail) => {
                write!(f, "Token exchange failed: {}", detail)
            }
            AuthorizationError::Storage(detail) => {
                write!(f, "Failed to persist account link: {}", detail)
            }
        }
    }
}

impl std::error::Error for AuthorizationError {}

/// Orchestrates the handshake and adapts its outcome into a link-or-reject
/// decision.
///
/// All collaborators are injected; the coordinator holds no ambient state
/// beyond them and is fully testable with a scripted provider.
pub struct AuthorizationCoordinator {
    provider: Arc<dyn OAuth1Provider>,
    pending: PendingStore,
    links: Arc<AccountLinkStore>,
    callback_base_url: String,
}

impl AuthorizationCoordinator {
    pub fn new(
        provider: Arc<dyn OAuth1Provider>,
        pending: PendingStore,
        links: Arc<AccountLinkStore>,
        callback_base_url: String,
    ) -> Self {
        Self {
            provider,
            pending,
            links,
            callback_base_url,
        }
    }

    /// Start a handshake for a local user.
    ///
    /// Obtains a request token with a callback URL carrying a fresh session
    /// handle, stores the token pair as pending state under that handle, and
    /// returns the provider authorization URL.
    pub async fn begin_authorization(
        &self,
        user: &LocalUserId,
    ) -> Result<BeginAuthorization, AuthorizationError> {
        let handle = self.pending.new_handle();
        let callback_url = format!(
            "{}/authorize/callback?sid={}",
            self.callback_base_url, handle
        );

        debug!(%user, "Requesting temporary token from provider");

        let request_token = self
            .provider
            .request_token(&callback_url)
            .await
            .map_err(|e| AuthorizationError::StartFailed(e.to_string()))?;

        // OAuth 1.0a requires oauth_callback_confirmed=true; a token the
        // provider may never redirect for is useless.
        if !request_token.callback_confirmed {
            warn!(%user, "Provider did not confirm the callback URL");
            return Err(AuthorizationError::StartFailed(
                "Provider did not confirm the callback URL".to_string(),
            ));
        }

        self.pending.insert(
            &handle,
            &request_token.token,
            &request_token.secret,
            user,
        );

        let redirect_url = self.provider.authorize_url(&request_token.token);

        info!(%user, "Handshake started, redirecting to provider");

        Ok(BeginAuthorization {
            handle,
            redirect_url,
        })
    }

    /// Complete a handshake from the provider's callback.
    ///
    /// The pending state for `handle` is discarded on every terminal
    /// outcome; a handle is never usable twice.
    ///
    /// # Arguments
    /// * `handle` - Session handle from the callback URL
    /// * `returned_token` - `oauth_token` echoed by the provider, if present
    /// * `verifier` - One-time consent code, absent when the user declined
    /// * `denied` - Whether the user declined on the provider's page
    pub async fn complete_authorization(
        &self,
        handle: &str,
        returned_token: Option<&str>,
        verifier: Option<&str>,
        denied: bool,
    ) -> Result<LinkOutcome, AuthorizationError> {
        // A decline is authoritative: discard state, never contact the
        // provider, no session proof required.
        if denied {
            self.pending.discard(handle);
            info!("User declined authorization at the provider");
            return Ok(LinkOutcome::Denied);
        }

        let pending = self
            .pending
            .consume(handle)
            .ok_or(AuthorizationError::StateMissing)?;

        // The provider must echo the token this session requested.
        if let Some(token) = returned_token {
            if token != pending.request_token {
                warn!("Callback token does not match the pending request token");
                return Err(AuthorizationError::StateMissing);
            }
        }

        // A callback that neither declines nor carries a verifier is forged
        // or truncated; the pending state is already gone, by design.
        let verifier = verifier.ok_or(AuthorizationError::StateMissing)?;

        let access = self
            .provider
            .exchange_token(&pending.request_token, &pending.request_token_secret, verifier)
            .await
            .map_err(|e| AuthorizationError::ExchangeFailed(e.to_string()))?;

        let profile = self
            .provider
            .fetch_profile(&access)
            .await
            .map_err(|e| AuthorizationError::ExchangeFailed(e.to_string()))?;

        let credential = AccessCredential {
            access_token: access.token,
            access_token_secret: access.secret,
        };

        let result = self
            .links
            .create_link(
                pending.local_user_id.as_str(),
                &profile.id,
                &profile.display_name,
                profile.email.as_deref(),
                &credential,
            )
            .map_err(|e| AuthorizationError::Storage(e.to_string()))?;

        match result {
            LinkResult::Created => {
                info!(
                    user = %pending.local_user_id,
                    remote_profile_id = %profile.id,
                    "Account linked"
                );
                Ok(LinkOutcome::Linked {
                    remote_profile_id: profile.id,
                    remote_display_name: profile.display_name,
                })
            }
            LinkResult::AlreadyLinked => {
                warn!(
                    user = %pending.local_user_id,
                    remote_profile_id = %profile.id,
                    "Remote profile already linked"
                );
                Ok(LinkOutcome::AlreadyLinked {
                    remote_profile_id: profile.id,
                })
            }
        }
    }
}
