//! SQLite-backed account link store.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::Mutex;

use super::{encryption, AccessCredential, AccountLink, LinkResult};

/// Account link storage backed by SQLite.
///
/// # Schema
/// ```sql
/// CREATE TABLE account_links (
///     id INTEGER PRIMARY KEY,
///     local_user_id TEXT NOT NULL,
///     remote_profile_id TEXT NOT NULL UNIQUE,
///     remote_display_name TEXT NOT NULL,
///     remote_email TEXT,
///     access_token TEXT NOT NULL,              -- Encrypted
///     access_token_nonce TEXT NOT NULL,
///     access_token_secret TEXT NOT NULL,       -- Encrypted
///     access_token_secret_nonce TEXT NOT NULL,
///     created_at TEXT NOT NULL                 -- ISO 8601 timestamp
/// );
/// ```
///
/// The UNIQUE constraint on `remote_profile_id` is what makes duplicate-link
/// prevention atomic: `create_link` is a single conditional insert, never a
/// read followed by a write.
///
/// # Thread Safety
/// - Connection is wrapped in Mutex for safe concurrent access
/// - SQLite itself is thread-safe with serialized mode
pub struct AccountLinkStore {
    conn: Mutex<Connection>,
    encryption_key: Vec<u8>,
}

impl AccountLinkStore {
    /// Creates or opens a link store.
    ///
    /// # Arguments
    /// * `db_path` - Path to SQLite database file (`:memory:` for tests)
    /// * `encryption_key` - Base64-encoded 32-byte master key
    pub fn new<P: AsRef<Path>>(db_path: P, encryption_key: &str) -> Result<Self> {
        let key_bytes = encryption::decode_key(encryption_key).context("Invalid encryption key")?;

        let conn = Connection::open(db_path).context("Failed to open database")?;

        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS account_links (
                id INTEGER PRIMARY KEY,
                local_user_id TEXT NOT NULL,
                remote_profile_id TEXT NOT NULL UNIQUE,
                remote_display_name TEXT NOT NULL,
                remote_email TEXT,
                access_token TEXT NOT NULL,
                access_token_nonce TEXT NOT NULL,
                access_token_secret TEXT NOT NULL,
                access_token_secret_nonce TEXT NOT NULL,
                created_at TEXT NOT NULL
            )
            "#,
            [],
        )
        .context("Failed to create account_links table")?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_links_local_user ON account_links(local_user_id)",
            [],
        )
        .context("Failed to create index")?;

        Ok(Self {
            conn: Mutex::new(conn),
            encryption_key: key_bytes,
        })
    }

    /// Records a link for a remote profile unless one already exists.
    ///
    /// The insert is conditional on the `remote_profile_id` unique
    /// constraint: on conflict nothing is written and `AlreadyLinked` is
    /// returned. An existing link's credential is never overwritten here.
    pub fn create_link(
        &self,
        local_user_id: &str,
        remote_profile_id: &str,
        remote_display_name: &str,
        remote_email: Option<&str>,
        credential: &AccessCredential,
    ) -> Result<LinkResult> {
        let sealed_token = encryption::seal(&credential.access_token, &self.encryption_key)
            .context("Failed to encrypt access token")?;
        let sealed_secret = encryption::seal(&credential.access_token_secret, &self.encryption_key)
            .context("Failed to encrypt access token secret")?;

        let now = Utc::now().to_rfc3339();

        let changed = self
            .conn
            .lock()
            .unwrap()
            .execute(
                r#"
                INSERT INTO account_links (
                    local_user_id, remote_profile_id, remote_display_name, remote_email,
                    access_token, access_token_nonce,
                    access_token_secret, access_token_secret_nonce,
                    created_at
                )
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                ON CONFLICT(remote_profile_id) DO NOTHING
                "#,
                params![
                    local_user_id,
                    remote_profile_id,
                    remote_display_name,
                    remote_email,
                    sealed_token.ciphertext,
                    sealed_token.nonce,
                    sealed_secret.ciphertext,
                    sealed_secret.nonce,
                    now,
                ],
            )
            .context("Failed to insert account link")?;

        if changed == 0 {
            Ok(LinkResult::AlreadyLinked)
        } else {
            Ok(LinkResult::Created)
        }
    }

    /// Whether a remote profile is already linked. Pure lookup, no side
    /// effect; `create_link` does not rely on it.
    pub fn exists(&self, remote_profile_id: &str) -> Result<bool> {
        let conn = self.conn.lock().unwrap();
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM account_links WHERE remote_profile_id = ?1",
                params![remote_profile_id],
                |row| row.get(0),
            )
            .context("Failed to query link existence")?;

        Ok(count > 0)
    }

    /// Retrieves the link row for a remote profile.
    pub fn get(&self, remote_profile_id: &str) -> Result<Option<AccountLink>> {
        let conn = self.conn.lock().unwrap();
        let link = conn
            .query_row(
                r#"
                SELECT id, local_user_id, remote_profile_id, remote_display_name,
                       remote_email, created_at
                FROM account_links
                WHERE remote_profile_id = ?1
                "#,
                params![remote_profile_id],
                row_to_link,
            )
            .optional()
            .context("Failed to query account link")?;

        match link {
            Some(raw) => Ok(Some(raw.into_link()?)),
            None => Ok(None),
        }
    }

    /// Retrieves and decrypts the credential for a linked remote profile.
    pub fn get_credential(&self, remote_profile_id: &str) -> Result<Option<AccessCredential>> {
        let conn = self.conn.lock().unwrap();
        let row: Option<(String, String, String, String)> = conn
            .query_row(
                r#"
                SELECT access_token, access_token_nonce,
                       access_token_secret, access_token_secret_nonce
                FROM account_links
                WHERE remote_profile_id = ?1
                "#,
                params![remote_profile_id],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
            )
            .optional()
            .context("Failed to query credential")?;

        let Some((token_ct, token_nonce, secret_ct, secret_nonce)) = row else {
            return Ok(None);
        };

        let access_token = encryption::open(
            &encryption::Sealed {
                ciphertext: token_ct,
                nonce: token_nonce,
            },
            &self.encryption_key,
        )
        .context("Failed to decrypt access token")?;

        let access_token_secret = encryption::open(
            &encryption::Sealed {
                ciphertext: secret_ct,
                nonce: secret_nonce,
            },
            &self.encryption_key,
        )
        .context("Failed to decrypt access token secret")?;

        Ok(Some(AccessCredential {
            access_token,
            access_token_secret,
        }))
    }

    /// Lists all links owned by a local user.
    pub fn list_by_user(&self, local_user_id: &str) -> Result<Vec<AccountLink>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn
            .prepare(
                r#"
                SELECT id, local_user_id, remote_profile_id, remote_display_name,
                       remote_email, created_at
                FROM account_links
                WHERE local_user_id = ?1
                ORDER BY created_at
                "#,
            )
            .context("Failed to prepare query")?;

        let rows = stmt
            .query_map(params![local_user_id], row_to_link)
            .context("Failed to execute query")?
            .collect::<Result<Vec<RawLink>, _>>()
            .context("Failed to read results")?;

        rows.into_iter().map(|raw| raw.into_link()).collect()
    }

    /// Removes a link owned by a local user.
    ///
    /// Scoped to the owner so one user cannot unlink another's account.
    ///
    /// # Returns
    /// * `Ok(true)` - Link deleted
    /// * `Ok(false)` - No such link for this user
    pub fn unlink(&self, local_user_id: &str, remote_profile_id: &str) -> Result<bool> {
        let rows_affected = self
            .conn
            .lock()
            .unwrap()
            .execute(
                "DELETE FROM account_links WHERE local_user_id = ?1 AND remote_profile_id = ?2",
                params![local_user_id, remote_profile_id],
            )
            .context("Failed to delete account link")?;

        Ok(rows_affected > 0)
    }

    /// Total number of links (for monitoring and tests).
    pub fn count(&self) -> Result<i64> {
        let conn = self.conn.lock().unwrap();
        conn.query_row("SELECT COUNT(*) FROM account_links", [], |row| row.get(0))
            .context("Failed to count account links")
    }
}

/// Link row before timestamp parsing
struct RawLink {
    id: i64,
    local_user_id: String,
    remote_profile_id: String,
    remote_display_name: String,
    remote_email: Option<String>,
    created_at: String,
}

impl RawLink {
    fn into_link(self) -> Result<AccountLink> {
        let created_at = DateTime::parse_from_rfc3339(&self.created_at)
            .map(|dt| dt.with_timezone(&Utc))
            .context("Failed to parse created_at timestamp")?;

        Ok(AccountLink {
            id: self.id,
            local_user_id: self.local_user_id,
            remote_profile_id: self.remote_profile_id,
            remote_display_name: self.remote_display_name,
            remote_email: self.remote_email,
            created_at,
        })
    }
}

fn row_to_link(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawLink> {
    Ok(RawLink {
        id: row.get(0)?,
        local_user_id: row.get(1)?,
        remote_profile_id: row.get(2)?,
        remote_display_name: row.get(3)?,
        remote_email: row.get(4)?,
        created_at: row.get(5)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
    use std::sync::Arc;

    fn create_test_store() -> AccountLinkStore {
        let key = BASE64.encode([0u8; 32]);
        AccountLinkStore::new(":memory:", &key).expect("Failed to create test store")
    }

    fn credential() -> AccessCredential {
        AccessCredential {
            access_token: "AT1".to_string(),
            access_token_secret: "AS1".to_string(),
        }
    }

    #[test]
    fn test_create_and_get() {
        let store = create_test_store();

        let result = store
            .create_link("user1", "42", "ada", Some("ada@example.com"), &credential())
            .unwrap();
        assert_eq!(result, LinkResult::Created);

        let link = store.get("42").unwrap().expect("link not found");
        assert_eq!(link.local_user_id, "user1");
        assert_eq!(link.remote_profile_id, "42");
        assert_eq!(link.remote_display_name, "ada");
        assert_eq!(link.remote_email, Some("ada@example.com".to_string()));
    }

    #[test]
    fn test_duplicate_create_is_already_linked() {
        let store = create_test_store();

        assert_eq!(
            store
                .create_link("user1", "42", "ada", None, &credential())
                .unwrap(),
            LinkResult::Created
        );
        assert_eq!(
            store
                .create_link("user2", "42", "ada-again", None, &credential())
                .unwrap(),
            LinkResult::AlreadyLinked
        );

        // Original row untouched
        let link = store.get("42").unwrap().unwrap();
        assert_eq!(link.local_user_id, "user1");
        assert_eq!(link.remote_display_name, "ada");
        assert_eq!(store.count().unwrap(), 1);
    }

    #[test]
    fn test_duplicate_does_not_overwrite_credential() {
        let store = create_test_store();

        store
            .create_link("user1", "42", "ada", None, &credential())
            .unwrap();

        let other = AccessCredential {
            access_token: "AT2".to_string(),
            access_token_secret: "AS2".to_string(),
        };
        store.create_link("user2", "42", "ada", None, &other).unwrap();

        let stored = store.get_credential("42").unwrap().unwrap();
        assert_eq!(stored, credential());
    }

    #[test]
    fn test_concurrent_create_single_winner() {
        let store = Arc::new(create_test_store());

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    store
                        .create_link(&format!("user{}", i), "42", "ada", None, &credential())
                        .unwrap()
                })
            })
            .collect();

        let results: Vec<LinkResult> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        let created = results
            .iter()
            .filter(|r| **r == LinkResult::Created)
            .count();
        assert_eq!(created, 1);
        assert_eq!(results.len() - created, 7);
        assert_eq!(store.count().unwrap(), 1);
    }

    #[test]
    fn test_exists() {
        let store = create_test_store();

        assert!(!store.exists("42").unwrap());
        store
            .create_link("user1", "42", "ada", None, &credential())
            .unwrap();
        assert!(store.exists("42").unwrap());
    }

    #[test]
    fn test_credential_roundtrip_through_encryption() {
        let store = create_test_store();

        store
            .create_link("user1", "42", "ada", None, &credential())
            .unwrap();

        let stored = store.get_credential("42").unwrap().unwrap();
        assert_eq!(stored.access_token, "AT1");
        assert_eq!(stored.access_token_secret, "AS1");

        assert!(store.get_credential("no-such-profile").unwrap().is_none());
    }

    #[test]
    fn test_list_by_user() {
        let store = create_test_store();

        store
            .create_link("user1", "42", "ada", None, &credential())
            .unwrap();
        store
            .create_link("user1", "43", "grace", None, &credential())
            .unwrap();
        store
            .create_link("user2", "44", "alan", None, &credential())
            .unwrap();

        let links = store.list_by_user("user1").unwrap();
        assert_eq!(links.len(), 2);
        let ids: Vec<&str> = links.iter().map(|l| l.remote_profile_id.as_str()).collect();
        assert!(ids.contains(&"42"));
        assert!(ids.contains(&"43"));

        assert_eq!(store.list_by_user("user3").unwrap().len(), 0);
    }

    #[test]
    fn test_unlink_scoped_to_owner() {
        let store = create_test_store();

        store
            .create_link("user1", "42", "ada", None, &credential())
            .unwrap();

        // Wrong owner cannot remove the link
        assert!(!store.unlink("user2", "42").unwrap());
        assert!(store.exists("42").unwrap());

        assert!(store.unlink("user1", "42").unwrap());
        assert!(!store.exists("42").unwrap());

        // Removing again reports nothing deleted
        assert!(!store.unlink("user1", "42").unwrap());
    }

    #[test]
    fn test_relink_after_unlink() {
        let store = create_test_store();

        store
            .create_link("user1", "42", "ada", None, &credential())
            .unwrap();
        store.unlink("user1", "42").unwrap();

        let result = store
            .create_link("user1", "42", "ada", None, &credential())
            .unwrap();
        assert_eq!(result, LinkResult::Created);
    }

    #[test]
    fn test_links_persist_across_reopen() {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let db_path = dir.path().join("links.db");
        let key = BASE64.encode([0u8; 32]);

        {
            let store = AccountLinkStore::new(&db_path, &key).unwrap();
            store
                .create_link("user1", "42", "ada", None, &credential())
                .unwrap();
        }

        // A fresh store over the same file sees the link and can decrypt
        // the credential with the same master key
        let store = AccountLinkStore::new(&db_path, &key).unwrap();
        assert!(store.exists("42").unwrap());
        assert_eq!(
            store
                .create_link("user2", "42", "ada", None, &credential())
                .unwrap(),
            LinkResult::AlreadyLinked
        );
        assert_eq!(store.get_credential("42").unwrap().unwrap(), credential());
    }

    #[test]
    fn test_invalid_encryption_key() {
        assert!(AccountLinkStore::new(":memory:", "short").is_err());
        assert!(AccountLinkStore::new(":memory:", "not-valid-base64!@#$").is_err());
    }
}
