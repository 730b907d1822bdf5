//! OAuth 1.0a request signing (RFC 5849, HMAC-SHA1).
//!
//! Builds the `Authorization: OAuth ...` header for provider calls. The
//! signature base string covers the HTTP method, the base endpoint URL and
//! every request parameter; the signing key joins the consumer secret with
//! the token secret of whichever token the call is made under.

use std::collections::BTreeMap;
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{anyhow, Result};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use hmac::{Hmac, Mac};
use sha1::Sha1;

/// Key material for signing a request.
#[derive(Clone, Copy, Debug)]
pub struct SigningKey<'a> {
    pub consumer_key: &'a str,
    pub consumer_secret: &'a str,
    /// Token to sign under (absent for the request-token step)
    pub token: Option<&'a str>,
    pub token_secret: Option<&'a str>,
}

/// Build a complete OAuth Authorization header for a request.
///
/// `request_params` are the non-oauth parameters of the request (query or
/// form body); they participate in the signature but not in the header.
/// `endpoint_url` must be the base URL without a query string.
pub fn authorization_header(
    key: &SigningKey<'_>,
    method: &str,
    endpoint_url: &str,
    request_params: &BTreeMap<String, String>,
) -> Result<String> {
    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| anyhow!("System clock before Unix epoch: {}", e))?
        .as_secs()
        .to_string();

    authorization_header_at(key, method, endpoint_url, request_params, &timestamp, &nonce())
}

/// Header construction with caller-supplied timestamp and nonce.
pub fn authorization_header_at(
    key: &SigningKey<'_>,
    method: &str,
    endpoint_url: &str,
    request_params: &BTreeMap<String, String>,
    timestamp: &str,
    nonce: &str,
) -> Result<String> {
    let mut oauth_params: BTreeMap<String, String> = BTreeMap::new();
    oauth_params.insert("oauth_consumer_key".to_string(), key.consumer_key.to_string());
    oauth_params.insert("oauth_nonce".to_string(), nonce.to_string());
    oauth_params.insert("oauth_signature_method".to_string(), "HMAC-SHA1".to_string());
    oauth_params.insert("oauth_timestamp".to_string(), timestamp.to_string());
    oauth_params.insert("oauth_version".to_string(), "1.0".to_string());
    if let Some(token) = key.token {
        oauth_params.insert("oauth_token".to_string(), token.to_string());
    }

    // All parameters participate in the signature
    let mut signed_params = oauth_params.clone();
    for (k, v) in request_params {
        signed_params.insert(k.clone(), v.clone());
    }

    let base = signature_base(method, endpoint_url, &signed_params);
    let signature = sign(&base, key.consumer_secret, key.token_secret.unwrap_or(""))?;

    oauth_params.insert("oauth_signature".to_string(), signature);

    // Header carries only the oauth_* parameters
    let header_parts: Vec<String> = oauth_params
        .iter()
        .map(|(k, v)| format!("{}=\"{}\"", percent_encode(k), percent_encode(v)))
        .collect();

    Ok(format!("OAuth {}", header_parts.join(", ")))
}

/// Build the signature base string: METHOD & encoded-url & encoded-params.
fn signature_base(method: &str, endpoint_url: &str, params: &BTreeMap<String, String>) -> String {
    // BTreeMap iteration gives the lexicographic parameter order RFC 5849
    // requires.
    let param_string: String = params
        .iter()
        .map(|(k, v)| format!("{}={}", percent_encode(k), percent_encode(v)))
        .collect::<Vec<_>>()
        .join("&");

    format!(
        "{}&{}&{}",
        method.to_uppercase(),
        percent_encode(endpoint_url),
        percent_encode(&param_string)
    )
}

/// HMAC-SHA1 over the base string, base64-encoded.
fn sign(base: &str, consumer_secret: &str, token_secret: &str) -> Result<String> {
    let signing_key = format!(
        "{}&{}",
        percent_encode(consumer_secret),
        percent_encode(token_secret)
    );

    let mut mac = Hmac::<Sha1>::new_from_slice(signing_key.as_bytes())
        .map_err(|e| anyhow!("Failed to initialize HMAC: {}", e))?;
    mac.update(base.as_bytes());

    Ok(BASE64.encode(mac.finalize().into_bytes()))
}

/// Random nonce for a single request.
fn nonce() -> String {
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;

    let bytes: [u8; 24] = rand::random();
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Percent-encode per RFC 3986 (unreserved characters pass through).
fn percent_encode(value: &str) -> String {
    let mut encoded = String::with_capacity(value.len());
    for byte in value.bytes() {
        if byte.is_ascii_alphanumeric() || matches!(byte, b'-' | b'.' | b'_' | b'~') {
            encoded.push(byte as char);
        } else {
            encoded.push_str(&format!("%{byte:02X}"));
        }
    }
    encoded
}
