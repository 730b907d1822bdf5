//! Local user identity resolution.
//!
//! The service trusts an upstream identity provider: the bearer token carried
//! in the Authorization header *is* the local user id. When authentication is
//! disabled (development mode) every request resolves to a fixed default user.

use axum::http::HeaderMap;

/// Identifier of a local user account.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LocalUserId(String);

impl LocalUserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for LocalUserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Resolve the local user for a request.
///
/// With `auth_enabled` the Authorization header must carry "Bearer <token>";
/// the token is taken as the local user id. With auth disabled the fixed
/// "default" user is returned regardless of headers.
pub fn resolve_local_user(headers: &HeaderMap, auth_enabled: bool) -> Result<LocalUserId, IdentityError> {
    if !auth_enabled {
        return Ok(LocalUserId::new("default"));
    }

    let header_value = headers
        .get("authorization")
        .ok_or(IdentityError::Missing)?
        .to_str()
        .map_err(|_| IdentityError::InvalidFormat)?;

    let parts: Vec<&str> = header_value.splitn(2, ' ').collect();
    if parts.len() != 2 || !parts[0].eq_ignore_ascii_case("bearer") {
        return Err(IdentityError::InvalidFormat);
    }

    let token = parts[1].trim();
    if token.is_empty() {
        return Err(IdentityError::Empty);
    }

    Ok(LocalUserId::new(token))
}

/// Identity resolution errors
#[derive(Debug, PartialEq, Clone)]
pub enum IdentityError {
    /// Authorization header not present
    Missing,
    /// Invalid format (not "Bearer <token>")
    InvalidFormat,
    /// Token is empty string
    Empty,
}

impl std::fmt::Display for IdentityError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IdentityError::Missing => write!(f, "Authorization token not provided"),
            IdentityError::InvalidFormat => write!(f, "Invalid authorization token format"),
            IdentityError::Empty => write!(f, "Authorization token is empty"),
        }
    }
}

impl std::error::Error for IdentityError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_bearer_token() {
        let mut headers = HeaderMap::new();
        headers.insert("authorization", "Bearer user-42".parse().unwrap());

        let user = resolve_local_user(&headers, true).unwrap();
        assert_eq!(user.as_str(), "user-42");
    }

    #[test]
    fn case_insensitive_scheme() {
        let mut headers = HeaderMap::new();
        headers.insert("authorization", "bearer user-42".parse().unwrap());

        assert!(resolve_local_user(&headers, true).is_ok());
    }

    #[test]
    fn trims_surrounding_whitespace() {
        let mut headers = HeaderMap::new();
        headers.insert("authorization", "Bearer   user-42  ".parse().unwrap());

        let user = resolve_local_user(&headers, true).unwrap();
        assert_eq!(user.as_str(), "user-42");
    }

    #[test]
    fn missing_header() {
        let headers = HeaderMap::new();
        let result = resolve_local_user(&headers, true);
        assert_eq!(result, Err(IdentityError::Missing));
    }

    #[test]
    fn missing_bearer_prefix() {
        let mut headers = HeaderMap::new();
        headers.insert("authorization", "user-42".parse().unwrap());

        let result = resolve_local_user(&headers, true);
        assert_eq!(result, Err(IdentityError::InvalidFormat));
    }

    #[test]
    fn empty_token() {
        let mut headers = HeaderMap::new();
        headers.insert("authorization", "Bearer   ".parse().unwrap());

        let result = resolve_local_user(&headers, true);
        assert_eq!(result, Err(IdentityError::Empty));
    }

    #[test]
    fn auth_disabled_uses_default_user() {
        let headers = HeaderMap::new();
        let user = resolve_local_user(&headers, false).unwrap();
        assert_eq!(user.as_str(), "default");
    }
}
