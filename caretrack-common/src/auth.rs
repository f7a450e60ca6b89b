//! Bearer-token signing/verification and password hashing
//!
//! # Architecture
//!
//! - Access tokens are `{hex(email)}.{expiry_ms}.{signature}` where the
//!   signature is SHA-256 over `email | expiry_ms | secret`, rendered as
//!   64 hex characters. Verification checks the signature first, then the
//!   expiry, and yields only the claimed identity (email).
//! - Password digests are `{salt_hex}${hash_hex}` with a random 16-byte
//!   salt and SHA-256 over `salt || password`.
//!
//! # Pure Functions
//!
//! This module contains ONLY pure functions. No HTTP framework
//! dependencies (Axum, etc.) - those live in the service crate.

use rand::RngCore;
use sha2::{Digest, Sha256};

/// Token or password verification error
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialError {
    /// Token is structurally malformed
    Malformed,
    /// Token signature does not match
    BadSignature,
    /// Token expiry is in the past
    Expired,
    /// Stored password digest is structurally malformed
    BadDigest,
}

impl std::fmt::Display for CredentialError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CredentialError::Malformed => write!(f, "Malformed token"),
            CredentialError::BadSignature => write!(f, "Invalid token signature"),
            CredentialError::Expired => write!(f, "Token expired"),
            CredentialError::BadDigest => write!(f, "Malformed password digest"),
        }
    }
}

impl std::error::Error for CredentialError {}

fn hex_encode(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        out.push_str(&format!("{:02x}", b));
    }
    out
}

fn hex_decode(s: &str) -> Option<Vec<u8>> {
    if s.len() % 2 != 0 {
        return None;
    }
    (0..s.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&s[i..i + 2], 16).ok())
        .collect()
}

fn token_signature(email: &str, expires_at_ms: i64, secret: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(email.as_bytes());
    hasher.update(b"|");
    hasher.update(expires_at_ms.to_string().as_bytes());
    hasher.update(b"|");
    hasher.update(secret.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Issue a signed access token for the given identity
///
/// `expires_at_ms` is Unix epoch milliseconds; the caller decides the TTL.
pub fn issue_token(email: &str, expires_at_ms: i64, secret: &str) -> String {
    format!(
        "{}.{}.{}",
        hex_encode(email.as_bytes()),
        expires_at_ms,
        token_signature(email, expires_at_ms, secret)
    )
}

/// Verify a token's signature and expiry, returning the claimed identity
///
/// `now_ms` is injected so verification stays a pure function.
pub fn verify_token(token: &str, secret: &str, now_ms: i64) -> Result<String, CredentialError> {
    let mut parts = token.split('.');
    let (email_hex, expiry, signature) = match (parts.next(), parts.next(), parts.next(), parts.next()) {
        (Some(e), Some(x), Some(s), None) => (e, x, s),
        _ => return Err(CredentialError::Malformed),
    };

    let email_bytes = hex_decode(email_hex).ok_or(CredentialError::Malformed)?;
    let email = String::from_utf8(email_bytes).map_err(|_| CredentialError::Malformed)?;
    let expires_at_ms: i64 = expiry.parse().map_err(|_| CredentialError::Malformed)?;

    // Signature before expiry, so a forged token never learns which check failed
    if token_signature(&email, expires_at_ms, secret) != signature {
        return Err(CredentialError::BadSignature);
    }

    if now_ms >= expires_at_ms {
        return Err(CredentialError::Expired);
    }

    Ok(email)
}

/// Hash a plaintext password with a fresh random salt
pub fn hash_password(plaintext: &str) -> String {
    let mut salt = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut salt);

    let mut hasher = Sha256::new();
    hasher.update(salt);
    hasher.update(plaintext.as_bytes());
    format!("{}${:x}", hex_encode(&salt), hasher.finalize())
}

/// Verify a plaintext password against a stored digest
pub fn verify_password(plaintext: &str, digest: &str) -> Result<bool, CredentialError> {
    let (salt_hex, hash_hex) = digest.split_once('$').ok_or(CredentialError::BadDigest)?;
    let salt = hex_decode(salt_hex).ok_or(CredentialError::BadDigest)?;

    let mut hasher = Sha256::new();
    hasher.update(&salt);
    hasher.update(plaintext.as_bytes());
    Ok(format!("{:x}", hasher.finalize()) == hash_hex)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test-secret";

    #[test]
    fn test_token_round_trip() {
        let token = issue_token("admin@clinic.example", 2_000_000_000_000, SECRET);
        let email = verify_token(&token, SECRET, 1_000_000_000_000).unwrap();
        assert_eq!(email, "admin@clinic.example");
    }

    #[test]
    fn test_expired_token_rejected() {
        let token = issue_token("admin@clinic.example", 1_000, SECRET);
        assert_eq!(
            verify_token(&token, SECRET, 2_000),
            Err(CredentialError::Expired)
        );
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let token = issue_token("admin@clinic.example", 2_000_000_000_000, SECRET);
        assert_eq!(
            verify_token(&token, "other-secret", 0),
            Err(CredentialError::BadSignature)
        );
    }

    #[test]
    fn test_tampered_identity_rejected() {
        let token = issue_token("user@clinic.example", 2_000_000_000_000, SECRET);
        let parts: Vec<&str> = token.split('.').collect();
        // Flip one nibble of the hex-encoded email
        let mut email_hex: Vec<char> = parts[0].chars().collect();
        email_hex[0] = if email_hex[0] == '0' { '1' } else { '0' };
        let forged: String = email_hex.into_iter().collect();
        let forged_token = format!("{}.{}.{}", forged, parts[1], parts[2]);
        assert!(verify_token(&forged_token, SECRET, 0).is_err());
    }

    #[test]
    fn test_malformed_token_rejected() {
        assert_eq!(
            verify_token("not-a-token", SECRET, 0),
            Err(CredentialError::Malformed)
        );
        assert_eq!(
            verify_token("zz.123.abc", SECRET, 0),
            Err(CredentialError::Malformed)
        );
    }

    #[test]
    fn test_password_round_trip() {
        let digest = hash_password("hunter2");
        assert!(verify_password("hunter2", &digest).unwrap());
        assert!(!verify_password("hunter3", &digest).unwrap());
    }

    #[test]
    fn test_password_salts_differ() {
        let a = hash_password("hunter2");
        let b = hash_password("hunter2");
        assert_ne!(a, b);
    }
}
