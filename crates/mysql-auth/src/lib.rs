//! # mysql-auth
//!
//! Password scramble functions for the MySQL authentication plugins this
//! driver supports:
//!
//! - `mysql_native_password` (SHA-1 based, the pre-8.0 default):
//!   `SHA1(password) XOR SHA1(salt + SHA1(SHA1(password)))`
//! - `caching_sha2_password` (SHA-256 based, the MySQL 8.0+ default):
//!   `XOR(SHA256(password), SHA256(SHA256(SHA256(password)) + salt))`
//!
//! An empty password always produces an empty response. Full
//! authentication for `caching_sha2_password` (RSA key exchange or TLS)
//! is not implemented; only the fast path backed by the server's
//! credential cache is supported.

#![warn(missing_docs)]

use sha1::Sha1;
use sha2::{Digest, Sha256};

/// Well-known authentication plugin names.
pub mod plugins {
    /// SHA-1 based authentication (pre-8.0 default).
    pub const MYSQL_NATIVE_PASSWORD: &str = "mysql_native_password";
    /// SHA-256 based authentication (MySQL 8.0+ default).
    pub const CACHING_SHA2_PASSWORD: &str = "caching_sha2_password";
}

/// Status bytes for the `caching_sha2_password` exchange.
///
/// The server answers the handshake response with a two-byte packet
/// `0x01 <status>` before the real OK/ERR arrives.
pub mod caching_sha2 {
    /// The two-byte sequence opens with this tag.
    pub const STATUS_TAG: u8 = 0x01;
    /// Credentials matched the server's in-memory cache.
    pub const FAST_AUTH_SUCCESS: u8 = 0x03;
    /// The server demands full authentication (RSA or TLS channel).
    pub const PERFORM_FULL_AUTH: u8 = 0x04;
}

/// Compute the `mysql_native_password` scramble.
///
/// Returns 20 bytes, or an empty vector for an empty password.
#[must_use]
pub fn native_password_scramble(password: &str, salt: &[u8]) -> Vec<u8> {
    if password.is_empty() {
        return Vec::new();
    }

    // The scramble uses the first 20 salt bytes; servers may append NUL.
    let salt = if salt.len() > 20 { &salt[..20] } else { salt };

    let stage1: [u8; 20] = Sha1::digest(password.as_bytes()).into();
    let stage2: [u8; 20] = Sha1::digest(stage1).into();

    let mut hasher = Sha1::new();
    hasher.update(salt);
    hasher.update(stage2);
    let stage3: [u8; 20] = hasher.finalize().into();

    stage1
        .iter()
        .zip(stage3.iter())
        .map(|(a, b)| a ^ b)
        .collect()
}

/// Compute the `caching_sha2_password` fast-auth scramble.
///
/// Returns 32 bytes, or an empty vector for an empty password.
#[must_use]
pub fn caching_sha2_scramble(password: &str, salt: &[u8]) -> Vec<u8> {
    if password.is_empty() {
        return Vec::new();
    }

    let salt = if salt.len() > 20 { &salt[..20] } else { salt };

    let hash1: [u8; 32] = Sha256::digest(password.as_bytes()).into();
    let hash2: [u8; 32] = Sha256::digest(hash1).into();

    let mut hasher = Sha256::new();
    hasher.update(hash2);
    hasher.update(salt);
    let hash3: [u8; 32] = hasher.finalize().into();

    hash1.iter().zip(hash3.iter()).map(|(a, b)| a ^ b).collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const SALT: [u8; 20] = [
        0x3D, 0x4C, 0x5E, 0x2F, 0x1A, 0x0B, 0x7C, 0x8D, 0x9E, 0xAF, 0x10, 0x21, 0x32, 0x43, 0x54,
        0x65, 0x76, 0x87, 0x98, 0xA9,
    ];

    #[test]
    fn test_native_empty_password() {
        assert!(native_password_scramble("", &SALT).is_empty());
    }

    #[test]
    fn test_native_scramble_length_and_determinism() {
        let a = native_password_scramble("secret", &SALT);
        let b = native_password_scramble("secret", &SALT);
        assert_eq!(a.len(), 20);
        assert_eq!(a, b);

        let other = native_password_scramble("other", &SALT);
        assert_ne!(a, other);
    }

    #[test]
    fn test_native_scramble_reversible() {
        // XOR-ing the response with SHA1(salt + SHA1(SHA1(pw))) must give
        // back SHA1(pw); this pins the operand order of the scramble.
        use sha1::{Digest, Sha1};
        let response = native_password_scramble("secret", &SALT);

        let stage1: [u8; 20] = Sha1::digest(b"secret").into();
        let stage2: [u8; 20] = Sha1::digest(stage1).into();
        let mut hasher = Sha1::new();
        hasher.update(SALT);
        hasher.update(stage2);
        let mask: [u8; 20] = hasher.finalize().into();

        let recovered: Vec<u8> = response
            .iter()
            .zip(mask.iter())
            .map(|(a, b)| a ^ b)
            .collect();
        assert_eq!(recovered, stage1);
    }

    #[test]
    fn test_caching_sha2_empty_password() {
        assert!(caching_sha2_scramble("", &SALT).is_empty());
    }

    #[test]
    fn test_caching_sha2_scramble_length() {
        let scramble = caching_sha2_scramble("secret", &SALT);
        assert_eq!(scramble.len(), 32);
        assert_eq!(scramble, caching_sha2_scramble("secret", &SALT));
    }

    #[test]
    fn test_salt_longer_than_20_is_truncated() {
        let mut long_salt = SALT.to_vec();
        long_salt.push(0); // trailing NUL some servers append
        assert_eq!(
            native_password_scramble("secret", &long_salt),
            native_password_scramble("secret", &SALT)
        );
        assert_eq!(
            caching_sha2_scramble("secret", &long_salt),
            caching_sha2_scramble("secret", &SALT)
        );
    }
}
