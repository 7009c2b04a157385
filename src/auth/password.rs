//! Password credentials and single-use tokens.
//!
//! Salting and digesting is an explicit factory call rather than a hidden
//! side effect of assigning a password field: account handlers invoke
//! [`hash_password`] and store both parts themselves.

use chrono::{Duration, SecondsFormat, Utc};
use sha2::{Digest, Sha512};
use uuid::Uuid;

/// A freshly salted password digest, ready to persist.
#[derive(Debug, Clone)]
pub struct PasswordDigest {
    pub salt: String,
    pub digest: String,
}

pub fn hash_password(password: &str) -> PasswordDigest {
    let salt = Uuid::new_v4().simple().to_string();
    let digest = digest_with_salt(password, &salt);
    PasswordDigest { salt, digest }
}

pub fn verify_password(password: &str, salt: &str, expected_digest: &str) -> bool {
    if expected_digest.is_empty() {
        return false;
    }
    digest_with_salt(password, salt) == expected_digest
}

fn digest_with_salt(password: &str, salt: &str) -> String {
    let mut hasher = Sha512::new();
    hasher.update(salt.as_bytes());
    hasher.update(password.as_bytes());
    hasher
        .finalize()
        .iter()
        .map(|byte| format!("{:02x}", byte))
        .collect()
}

/// Opaque random token for password-reset and magic-link emails.
pub fn single_use_token() -> String {
    format!(
        "{}{}",
        Uuid::new_v4().simple(),
        Uuid::new_v4().simple()
    )
}

/// Expiry timestamp for single-use tokens, one hour out, in the same
/// RFC 3339 shape records use so the store can compare it.
pub fn one_hour_expiry() -> String {
    (Utc::now() + Duration::hours(1)).to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_then_verify() {
        let credentials = hash_password("hunter2");
        assert!(verify_password("hunter2", &credentials.salt, &credentials.digest));
        assert!(!verify_password("hunter3", &credentials.salt, &credentials.digest));
    }

    #[test]
    fn same_password_different_salts() {
        let a = hash_password("hunter2");
        let b = hash_password("hunter2");
        assert_ne!(a.salt, b.salt);
        assert_ne!(a.digest, b.digest);
    }

    #[test]
    fn empty_stored_digest_never_verifies() {
        assert!(!verify_password("", "salt", ""));
    }

    #[test]
    fn single_use_tokens_are_unique() {
        let token = single_use_token();
        assert_eq!(token.len(), 64);
        assert_ne!(token, single_use_token());
    }
}
