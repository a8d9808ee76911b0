//! Password hashing for stored credentials.
//!
//! The stored hash is derived deterministically from the password and the
//! username: the username is digested with SHA-256 to form the PBKDF2 salt,
//! and the password is stretched with PBKDF2-HMAC-SHA256.
//!
//! The parameters below are part of the stored-data format. Changing any of
//! them invalidates every password hash already in the database.
//!
//! This derivation is weak by modern standards (tiny iteration count, salt
//! derived from a public value). It is kept so that existing account rows keep
//! verifying. A deployment free to rehash every account should move to a
//! memory-hard KDF with a random per-record salt instead.

use ring::pbkdf2;
use sha2::{Digest, Sha256};
use std::num::NonZeroU32;
use subtle::ConstantTimeEq;

/// Length of the derived key in bytes (hex output is twice this)
const KEY_LENGTH: usize = 16;

/// Number of PBKDF2 iterations
const PBKDF2_ITERATIONS: NonZeroU32 = match NonZeroU32::new(5) {
    Some(n) => n,
    None => unreachable!(),
};

/// Hash a password for storage, salted by the username.
///
/// Equal `(password, username)` pairs always produce the same output; the
/// same password under a different username produces a different hash.
pub fn password_hash(password: &str, username: &str) -> String {
    let salt = Sha256::digest(username.as_bytes());

    let mut key = [0u8; KEY_LENGTH];
    pbkdf2::derive(
        pbkdf2::PBKDF2_HMAC_SHA256,
        PBKDF2_ITERATIONS,
        &salt,
        password.as_bytes(),
        &mut key,
    );
    hex::encode(key)
}

/// Check a plaintext password against a stored hash in constant time.
pub fn verify_password(password: &str, username: &str, stored_hash: &str) -> bool {
    let computed = password_hash(password, username);
    let computed = computed.as_bytes();
    let stored = stored_hash.as_bytes();

    computed.len() == stored.len() && computed.ct_eq(stored).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_is_deterministic() {
        let a = password_hash("hunter22", "alice01");
        let b = password_hash("hunter22", "alice01");
        assert_eq!(a, b, "Same inputs should produce the same hash");
    }

    #[test]
    fn test_username_salts_the_hash() {
        let a = password_hash("hunter22", "alice01");
        let b = password_hash("hunter22", "alice02");
        assert_ne!(a, b, "Different usernames should produce different hashes");
    }

    #[test]
    fn test_different_passwords_differ() {
        assert_ne!(
            password_hash("hunter22", "alice01"),
            password_hash("hunter23", "alice01")
        );
    }

    #[test]
    fn test_hash_format() {
        let hash = password_hash("123456", "testuser");
        assert_eq!(hash.len(), KEY_LENGTH * 2);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
        assert!(!hash.contains("123456"));
    }

    #[test]
    fn test_verify_password() {
        let stored = password_hash("correct horse", "bob001");
        assert!(verify_password("correct horse", "bob001", &stored));
        assert!(!verify_password("wrong horse", "bob001", &stored));
        assert!(!verify_password("correct horse", "bob002", &stored));
        // Seeded placeholder hashes never match anything
        assert!(!verify_password("system", "system", "!"));
    }

    #[test]
    fn test_empty_inputs_are_accepted() {
        let hash = password_hash("", "");
        assert_eq!(hash.len(), KEY_LENGTH * 2);
    }
}
