// Configuration (TOML file + env secrets)
pub mod config;

// Local user identity resolution
pub mod identity;

// Pending-handshake session state
pub mod session;

// OAuth 1.0a provider client
pub mod provider;

// Handshake orchestration
pub mod authorize;

// Account link persistence
pub mod links;

// HTTP API
pub mod api;
