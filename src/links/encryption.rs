//! AES-256-GCM sealing of stored access credentials.
//!
//! Every token value is sealed separately with a fresh nonce. The master key
//! comes from an environment variable and is held in memory only.

use aes_gcm::{
    aead::{Aead, AeadCore, KeyInit, OsRng},
    Aes256Gcm, Nonce,
};
use anyhow::{anyhow, Context, Result};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};

/// Master key size in bytes (256 bits)
const KEY_SIZE: usize = 32;

/// GCM nonce size in bytes (96 bits)
const NONCE_SIZE: usize = 12;

/// A sealed value as stored at rest: ciphertext plus the nonce it was sealed
/// with, both base64-encoded.
#[derive(Clone, Debug)]
pub struct Sealed {
    pub ciphertext: String,
    pub nonce: String,
}

/// Decode and validate the base64 master key.
pub fn decode_key(key_base64: &str) -> Result<Vec<u8>> {
    let key_bytes = BASE64
        .decode(key_base64)
        .context("Failed to decode base64 encryption key")?;

    if key_bytes.len() != KEY_SIZE {
        return Err(anyhow!(
            "Encryption key must be {} bytes (256 bits), got {} bytes",
            KEY_SIZE,
            key_bytes.len()
        ));
    }

    Ok(key_bytes)
}

/// Seal a plaintext token under the master key with a random nonce.
pub fn seal(plaintext: &str, key: &[u8]) -> Result<Sealed> {
    if key.len() != KEY_SIZE {
        return Err(anyhow!("Encryption key must be {} bytes", KEY_SIZE));
    }

    let cipher = Aes256Gcm::new_from_slice(key)
        .map_err(|e| anyhow!("Failed to create cipher: {}", e))?;

    // Nonce reuse under the same key breaks GCM; always generate fresh
    let nonce_bytes = Aes256Gcm::generate_nonce(&mut OsRng);

    let ciphertext_bytes = cipher
        .encrypt(&nonce_bytes, plaintext.as_bytes())
        .map_err(|e| anyhow!("Encryption failed: {}", e))?;

    Ok(Sealed {
        ciphertext: BASE64.encode(&ciphertext_bytes),
        nonce: BASE64.encode(nonce_bytes),
    })
}

/// Open a sealed token. Fails on a wrong key, wrong nonce, or tampering.
pub fn open(sealed: &Sealed, key: &[u8]) -> Result<String> {
    if key.len() != KEY_SIZE {
        return Err(anyhow!("Encryption key must be {} bytes", KEY_SIZE));
    }

    let ciphertext_bytes = BASE64
        .decode(&sealed.ciphertext)
        .context("Failed to decode ciphertext")?;
    let nonce_bytes = BASE64.decode(&sealed.nonce).context("Failed to decode nonce")?;

    if nonce_bytes.len() != NONCE_SIZE {
        return Err(anyhow!(
            "Invalid nonce size: expected {}, got {}",
            NONCE_SIZE,
            nonce_bytes.len()
        ));
    }

    let cipher = Aes256Gcm::new_from_slice(key)
        .map_err(|e| anyhow!("Failed to create cipher: {}", e))?;

    let plaintext_bytes = cipher
        .decrypt(Nonce::from_slice(&nonce_bytes), ciphertext_bytes.as_ref())
        .map_err(|e| anyhow!("Decryption failed (wrong key or corrupted data): {}", e))?;

    String::from_utf8(plaintext_bytes).context("Decrypted data is not valid UTF-8")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_decoding() {
        let valid_key = BASE64.encode([0u8; 32]);
        assert!(decode_key(&valid_key).is_ok());

        let short_key = BASE64.encode([0u8; 16]);
        assert!(decode_key(&short_key).is_err());

        assert!(decode_key("not-valid-base64!@#$").is_err());
    }

    #[test]
    fn test_seal_open_roundtrip() {
        let key = [7u8; 32];
        let plaintext = "access-token-12345";

        let sealed = seal(plaintext, &key).unwrap();
        assert_ne!(sealed.ciphertext, plaintext);

        let opened = open(&sealed, &key).unwrap();
        assert_eq!(opened, plaintext);
    }

    #[test]
    fn test_fresh_nonce_per_seal() {
        let key = [7u8; 32];

        let a = seal("same-value", &key).unwrap();
        let b = seal("same-value", &key).unwrap();

        assert_ne!(a.nonce, b.nonce);
        assert_ne!(a.ciphertext, b.ciphertext);
    }

    #[test]
    fn test_wrong_key_fails() {
        let sealed = seal("secret", &[0u8; 32]).unwrap();
        assert!(open(&sealed, &[1u8; 32]).is_err());
    }

    #[test]
    fn test_tampered_ciphertext_fails() {
        let key = [0u8; 32];
        let mut sealed = seal("secret", &key).unwrap();
        sealed.ciphertext.push('X');

        assert!(open(&sealed, &key).is_err());
    }
}
