//! Pending-handshake session state.
//!
//! The OAuth 1.0a handshake spans two inbound requests separated by an
//! external redirect. The request token obtained at the start must be held
//! somewhere the callback can find it, bound to the user who started the
//! handshake, and must never survive past a single use.

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

use crate::identity::LocalUserId;

/// State held between the start of a handshake and its callback.
///
/// Created when the provider issues a request token; consumed exactly once by
/// the callback (or swept when it expires).
#[derive(Clone, Debug)]
pub struct PendingAuthorization {
    pub request_token: String,
    pub request_token_secret: String,
    pub local_user_id: LocalUserId,
    pub created_at: DateTime<Utc>,
}

/// Store of pending handshakes, keyed by session handle.
///
/// The handle is generated here, travels to the provider inside the callback
/// URL, and comes back as a query parameter. Entries are single-use and
/// expire after the configured lifetime.
#[derive(Clone)]
pub struct PendingStore {
    entries: Arc<Mutex<HashMap<String, PendingAuthorization>>>,
    expiry_duration: Duration,
}

impl PendingStore {
    /// Create a new store.
    ///
    /// # Arguments
    /// * `expiry_seconds` - How long pending handshakes remain valid
    pub fn new(expiry_seconds: i64) -> Self {
        Self {
            entries: Arc::new(Mutex::new(HashMap::new())),
            expiry_duration: Duration::seconds(expiry_seconds),
        }
    }

    /// Allocate a fresh session handle (UUID v4).
    ///
    /// The handle is allocated before the provider call so it can be embedded
    /// in the callback URL; `insert` binds the pending state to it afterwards.
    pub fn new_handle(&self) -> String {
        Uuid::new_v4().to_string()
    }

    /// Store pending state under a handle.
    pub fn insert(&self, handle: &str, request_token: &str, request_token_secret: &str, user: &LocalUserId) {
        let entry = PendingAuthorization {
            request_token: request_token.to_string(),
            request_token_secret: request_token_secret.to_string(),
            local_user_id: user.clone(),
            created_at: Utc::now(),
        };

        let mut entries = self.entries.lock().unwrap();
        entries.insert(handle.to_string(), entry);
    }

    /// Retrieve and remove the pending state for a handle.
    ///
    /// Returns None for unknown, already-consumed, or expired handles. The
    /// entry is removed unconditionally (single-use).
    pub fn consume(&self, handle: &str) -> Option<PendingAuthorization> {
        let mut entries = self.entries.lock().unwrap();

        let entry = entries.remove(handle)?;

        let now = Utc::now();
        if now - entry.created_at > self.expiry_duration {
            return None;
        }

        Some(entry)
    }

    /// Remove the pending state for a handle without returning it.
    ///
    /// Used when the resource owner declines on the provider's page: the
    /// outcome does not depend on the stored state, but the state must still
    /// be discarded.
    pub fn discard(&self, handle: &str) {
        self.entries.lock().unwrap().remove(handle);
    }

    /// Sweep expired entries (called periodically).
    pub fn cleanup_expired(&self) {
        let mut entries = self.entries.lock().unwrap();
        let now = Utc::now();

        entries.retain(|_, entry| now - entry.created_at <= self.expiry_duration);
    }

    /// Count of pending handshakes (for monitoring).
    pub fn count(&self) -> usize {
        self.entries.lock().unwrap().len()
    }
}

/// Background task to periodically sweep expired pending handshakes
pub async fn run_pending_cleanup(store: PendingStore, interval_seconds: u64) {
    let mut interval = tokio::time::interval(tokio::time::Duration::from_secs(interval_seconds));

    loop {
        interval.tick().await;
        store.cleanup_expired();
        tracing::debug!("Pending handshake sweep complete, {} entries remaining", store.count());
    }
}
