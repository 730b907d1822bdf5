//! OAuth 1.0a provider client.
//!
//! The handshake coordinator talks to the provider only through the
//! [`OAuth1Provider`] trait; [`TwitterProvider`] is the production
//! implementation. Tests substitute a scripted implementation so the full
//! flow runs without a network.

mod sign;
mod twitter;

pub use twitter::TwitterProvider;

use anyhow::Result;
use async_trait::async_trait;

/// Temporary credential pair from the first handshake step.
///
/// Valid only until consumed by the access-token exchange or until the
/// pending session expires.
#[derive(Clone, Debug)]
pub struct RequestToken {
    pub token: String,
    pub secret: String,
    /// Whether the provider confirmed the callback URL
    pub callback_confirmed: bool,
}

/// Long-lived credential pair authorizing API calls on the user's behalf.
#[derive(Clone, Debug)]
pub struct AccessToken {
    pub token: String,
    pub secret: String,
}

/// Remote profile of the authorizing account.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RemoteProfile {
    /// Provider-assigned stable identifier
    pub id: String,
    /// Human-readable label (mutable on the provider's side)
    pub display_name: String,
    /// Only present when the provider is configured to share it
    pub email: Option<String>,
}

/// Client for a three-legged OAuth 1.0a provider.
///
/// Implementations are stateless with respect to the handshake: all
/// handshake state lives in the pending-session store.
#[async_trait]
pub trait OAuth1Provider: Send + Sync {
    /// Step 1: obtain a temporary request token.
    ///
    /// `callback_url` must be absolute and registered with the provider.
    async fn request_token(&self, callback_url: &str) -> Result<RequestToken>;

    /// Step 2: the URL the resource owner is sent to for authorization.
    fn authorize_url(&self, request_token: &str) -> String;

    /// Step 3: exchange the request token and verifier for an access token.
    async fn exchange_token(
        &self,
        request_token: &str,
        request_token_secret: &str,
        verifier: &str,
    ) -> Result<AccessToken>;

    /// Fetch the profile of the account the access token belongs to.
    async fn fetch_profile(&self, access: &AccessToken) -> Result<RemoteProfile>;
}
