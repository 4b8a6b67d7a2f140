//! Salted password hashing.
//!
//! Stored form is `salt$digest` where digest = SHA-256(salt || password),
//! hex encoded. The scheme is deliberately thin; swap in a KDF behind the
//! same two functions if stronger hardening is required.

use super::sha256_hex;

/// Hash a plaintext password with a fresh random salt.
pub fn hash_password(password: &str) -> String {
    let salt = uuid::Uuid::new_v4().simple().to_string();
    let digest = sha256_hex(format!("{}{}", salt, password).as_bytes());
    format!("{}${}", salt, digest)
}

/// Verify a plaintext password against a stored `salt$digest` value.
pub fn verify_password(password: &str, stored: &str) -> bool {
    let Some((salt, digest)) = stored.split_once('$') else {
        return false;
    };
    sha256_hex(format!("{}{}", salt, password).as_bytes()) == digest
}
