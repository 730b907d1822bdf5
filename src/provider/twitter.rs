//! Twitter implementation of the OAuth 1.0a provider client.

use std::collections::{BTreeMap, HashMap};

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use serde::Deserialize;

use super::sign::{authorization_header, SigningKey};
use super::{AccessToken, OAuth1Provider, RemoteProfile, RequestToken};
use crate::config::ProviderConfig;

/// Twitter OAuth 1.0a client.
///
/// Endpoint URLs come from configuration so tests and self-hosted mock
/// providers can point elsewhere; consumer credentials come from the
/// environment at construction time.
pub struct TwitterProvider {
    consumer_key: String,
    consumer_secret: String,
    endpoints: ProviderConfig,
    http: reqwest::Client,
}

impl TwitterProvider {
    pub fn new(consumer_key: String, consumer_secret: String, endpoints: ProviderConfig) -> Self {
        Self {
            consumer_key,
            consumer_secret,
            endpoints,
            http: reqwest::Client::new(),
        }
    }

    fn signing_key<'a>(&'a self, token: Option<&'a str>, token_secret: Option<&'a str>) -> SigningKey<'a> {
        SigningKey {
            consumer_key: &self.consumer_key,
            consumer_secret: &self.consumer_secret,
            token,
            token_secret,
        }
    }
}

/// Profile shape returned by account/verify_credentials
#[derive(Deserialize)]
struct VerifyCredentialsResponse {
    id_str: String,
    screen_name: String,
    #[serde(default)]
    email: Option<String>,
}

#[async_trait]
impl OAuth1Provider for TwitterProvider {
    async fn request_token(&self, callback_url: &str) -> Result<RequestToken> {
        let mut params = BTreeMap::new();
        params.insert("oauth_callback".to_string(), callback_url.to_string());

        let header = authorization_header(
            &self.signing_key(None, None),
            "POST",
            &self.endpoints.request_token_url,
            &params,
        )?;

        tracing::debug!(url = %self.endpoints.request_token_url, "Requesting temporary token");

        let response = self
            .http
            .post(&self.endpoints.request_token_url)
            .header("Authorization", header)
            .form(&[("oauth_callback", callback_url)])
            .send()
            .await
            .context("Failed to send request token request")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_else(|_| "Unknown error".to_string());
            return Err(anyhow!("Request token failed with status {}: {}", status, body));
        }

        let body = response.text().await.context("Failed to read request token response")?;
        parse_request_token(&body)
    }

    fn authorize_url(&self, request_token: &str) -> String {
        format!(
            "{}?oauth_token={}",
            self.endpoints.authorize_url,
            urlencoding::encode(request_token)
        )
    }

    async fn exchange_token(
        &self,
        request_token: &str,
        request_token_secret: &str,
        verifier: &str,
    ) -> Result<AccessToken> {
        let mut params = BTreeMap::new();
        params.insert("oauth_verifier".to_string(), verifier.to_string());

        let header = authorization_header(
            &self.signing_key(Some(request_token), Some(request_token_secret)),
            "POST",
            &self.endpoints.access_token_url,
            &params,
        )?;

        tracing::debug!(url = %self.endpoints.access_token_url, "Exchanging verifier for access token");

        let response = self
            .http
            .post(&self.endpoints.access_token_url)
            .header("Authorization", header)
            .form(&[("oauth_verifier", verifier)])
            .send()
            .await
            .context("Failed to send access token request")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_else(|_| "Unknown error".to_string());
            return Err(anyhow!("Access token exchange failed with status {}: {}", status, body));
        }

        let body = response.text().await.context("Failed to read access token response")?;
        parse_access_token(&body)
    }

    async fn fetch_profile(&self, access: &AccessToken) -> Result<RemoteProfile> {
        let mut params = BTreeMap::new();
        params.insert("include_email".to_string(), "true".to_string());

        let header = authorization_header(
            &self.signing_key(Some(&access.token), Some(&access.secret)),
            "GET",
            &self.endpoints.verify_credentials_url,
            &params,
        )?;

        let url = format!("{}?include_email=true", self.endpoints.verify_credentials_url);

        let response = self
            .http
            .get(&url)
            .header("Authorization", header)
            .send()
            .await
            .context("Failed to send profile request")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_else(|_| "Unknown error".to_string());
            return Err(anyhow!("Profile fetch failed with status {}: {}", status, body));
        }

        let profile: VerifyCredentialsResponse = response
            .json()
            .await
            .context("Failed to parse profile response")?;

        Ok(RemoteProfile {
            id: profile.id_str,
            display_name: profile.screen_name,
            email: profile.email,
        })
    }
}

/// Parse the urlencoded request-token response body
fn parse_request_token(body: &str) -> Result<RequestToken> {
    let params: HashMap<String, String> =
        serde_urlencoded::from_str(body).context("Malformed request token response")?;

    let token = params
        .get("oauth_token")
        .ok_or_else(|| anyhow!("Request token response missing oauth_token"))?
        .clone();
    let secret = params
        .get("oauth_token_secret")
        .ok_or_else(|| anyhow!("Request token response missing oauth_token_secret"))?
        .clone();
    let callback_confirmed = params
        .get("oauth_callback_confirmed")
        .map(|v| v == "true")
        .unwrap_or(false);

    Ok(RequestToken {
        token,
        secret,
        callback_confirmed,
    })
}

/// Parse the urlencoded access-token response body
fn parse_access_token(body: &str) -> Result<AccessToken> {
    let params: HashMap<String, String> =
        serde_urlencoded::from_str(body).context("Malformed access token response")?;

    let token = params
        .get("oauth_token")
        .ok_or_else(|| anyhow!("Access token response missing oauth_token"))?
        .clone();
    let secret = params
        .get("oauth_token_secret")
        .ok_or_else(|| anyhow!("Access token response missing oauth_token_secret"))?
        .clone();

    Ok(AccessToken { token, secret })
}
