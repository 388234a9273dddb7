use argon2::password_hash::{rand_core::OsRng, SaltString};
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};

use crate::error::{IdentityError, Result};

/// Hash a password with Argon2id and a random salt
///
/// # Errors
///
/// Returns [`IdentityError::HashingError`] if hashing fails.
pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|_| IdentityError::HashingError)
}

/// Verify a password against a stored PHC string
///
/// # Errors
///
/// Returns [`IdentityError::InvalidCredentials`] on mismatch and
/// [`IdentityError::HashingError`] if the stored hash is unreadable.
pub fn verify_password(password: &str, hash: &str) -> Result<()> {
    let parsed_hash = PasswordHash::new(hash).map_err(|_| IdentityError::HashingError)?;
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .map_err(|_| IdentityError::InvalidCredentials)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_and_verify() {
        let hash = hash_password("correct horse").unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(verify_password("correct horse", &hash).is_ok());
        assert!(matches!(
            verify_password("battery staple", &hash),
            Err(IdentityError::InvalidCredentials)
        ));
    }

    #[test]
    fn test_garbage_hash_is_hashing_error() {
        assert!(matches!(
            verify_password("x", "not-a-phc-string"),
            Err(IdentityError::HashingError)
        ));
    }
}
