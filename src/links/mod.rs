//! Account link persistence.
//!
//! An [`AccountLink`] joins a local user to a verified remote profile and
//! carries the long-lived access credential obtained for it. Links are
//! created at most once per remote profile; the store enforces that
//! atomically (see [`store::AccountLinkStore::create_link`]).
//!
//! Token values are encrypted at rest with AES-256-GCM, one nonce per value.

use chrono::{DateTime, Utc};
use serde::Serialize;

mod encryption;
mod store;

pub use store::AccountLinkStore;

/// Long-lived provider credential for a linked account.
///
/// Never exposed through the HTTP API; held only for making provider calls
/// on the user's behalf.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AccessCredential {
    pub access_token: String,
    pub access_token_secret: String,
}

/// A persisted link between a local user and a remote profile.
///
/// The credential is stored alongside but retrieved separately, so listings
/// never touch decryption.
#[derive(Clone, Debug, Serialize)]
pub struct AccountLink {
    pub id: i64,
    pub local_user_id: String,
    pub remote_profile_id: String,
    pub remote_display_name: String,
    pub remote_email: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Outcome of a link creation attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LinkResult {
    /// A new link row was written
    Created,
    /// The remote profile is already linked; nothing was written
    AlreadyLinked,
}
