use serde::Deserialize;

/// Complete service configuration.
///
/// Secrets (consumer key/secret, encryption key) are deliberately absent:
/// they are read from environment variables at startup, never from the file.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub provider: ProviderConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Address to bind the HTTP listener to
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
    /// Absolute base URL registered with the provider, used to build the
    /// callback URL (e.g. "https://links.example.com")
    #[serde(default = "default_callback_base_url")]
    pub callback_base_url: String,
    /// Path the user is redirected to after the handshake finishes
    #[serde(default = "default_result_path")]
    pub result_path: String,
    /// Whether bearer-token authentication is required
    #[serde(default = "default_auth_enabled")]
    pub auth_enabled: bool,
}

fn default_bind_addr() -> String {
    "127.0.0.1:8080".to_string()
}

fn default_callback_base_url() -> String {
    "http://127.0.0.1:8080".to_string()
}

fn default_result_path() -> String {
    "/account".to_string()
}

fn default_auth_enabled() -> bool {
    true
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            callback_base_url: default_callback_base_url(),
            result_path: default_result_path(),
            auth_enabled: default_auth_enabled(),
        }
    }
}

/// OAuth 1.0a provider endpoints
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderConfig {
    #[serde(default = "default_request_token_url")]
    pub request_token_url: String,
    #[serde(default = "default_authorize_url")]
    pub authorize_url: String,
    #[serde(default = "default_access_token_url")]
    pub access_token_url: String,
    #[serde(default = "default_verify_credentials_url")]
    pub verify_credentials_url: String,
}

fn default_request_token_url() -> String {
    "https://api.twitter.com/oauth/request_token".to_string()
}

fn default_authorize_url() -> String {
    "https://api.twitter.com/oauth/authorize".to_string()
}

fn default_access_token_url() -> String {
    "https://api.twitter.com/oauth/access_token".to_string()
}

fn default_verify_credentials_url() -> String {
    "https://api.twitter.com/1.1/account/verify_credentials.json".to_string()
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            request_token_url: default_request_token_url(),
            authorize_url: default_authorize_url(),
            access_token_url: default_access_token_url(),
            verify_credentials_url: default_verify_credentials_url(),
        }
    }
}

/// Pending-handshake session configuration
#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    /// How long a pending handshake remains valid (seconds)
    #[serde(default = "default_expiry_seconds")]
    pub expiry_seconds: i64,
    /// How often expired pending handshakes are swept (seconds)
    #[serde(default = "default_cleanup_interval_seconds")]
    pub cleanup_interval_seconds: u64,
}

fn default_expiry_seconds() -> i64 {
    600
}

fn default_cleanup_interval_seconds() -> u64 {
    60
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            expiry_seconds: default_expiry_seconds(),
            cleanup_interval_seconds: default_cleanup_interval_seconds(),
        }
    }
}

/// Link storage configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Path to the SQLite database file
    #[serde(default = "default_db_path")]
    pub db_path: String,
}

fn default_db_path() -> String {
    "social_link.db".to_string()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
        }
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            provider: ProviderConfig::default(),
            session: SessionConfig::default(),
            storage: StorageConfig::default(),
        }
    }
}

/// Load configuration from TOML file
pub fn load_config(path: &str) -> Result<ServiceConfig, Box<dyn std::error::Error>> {
    let contents = std::fs::read_to_string(path)?;
    let config: ServiceConfig = toml::from_str(&contents)?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ServiceConfig::default();
        assert_eq!(config.server.bind_addr, "127.0.0.1:8080");
        assert_eq!(config.server.result_path, "/account");
        assert!(config.server.auth_enabled);
        assert_eq!(config.session.expiry_seconds, 600);
        assert_eq!(config.storage.db_path, "social_link.db");
        assert!(config
            .provider
            .request_token_url
            .ends_with("oauth/request_token"));
    }

    #[test]
    fn test_config_deserialization() {
        let toml = r#"
            [server]
            bind_addr = "0.0.0.0:9000"
            callback_base_url = "https://links.example.com"
            result_path = "/profile"
            auth_enabled = false

            [provider]
            request_token_url = "https://provider.test/oauth/request_token"
            authorize_url = "https://provider.test/oauth/authorize"
            access_token_url = "https://provider.test/oauth/access_token"
            verify_credentials_url = "https://provider.test/1.1/verify.json"

            [session]
            expiry_seconds = 300
            cleanup_interval_seconds = 30

            [storage]
            db_path = "/var/lib/social-link/links.db"
        "#;

        let config: ServiceConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.server.bind_addr, "0.0.0.0:9000");
        assert_eq!(config.server.callback_base_url, "https://links.example.com");
        assert!(!config.server.auth_enabled);
        assert_eq!(
            config.provider.authorize_url,
            "https://provider.test/oauth/authorize"
        );
        assert_eq!(config.session.expiry_seconds, 300);
        assert_eq!(config.storage.db_path, "/var/lib/social-link/links.db");
    }

    #[test]
    fn test_partial_config() {
        // Missing sections use defaults
        let toml = r#"
            [session]
            expiry_seconds = 120
        "#;

        let config: ServiceConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.session.expiry_seconds, 120);
        assert_eq!(config.session.cleanup_interval_seconds, 60); // Default
        assert_eq!(config.server.bind_addr, "127.0.0.1:8080"); // Default
    }
}
