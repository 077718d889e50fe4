//! Authentication service.
//!
//! Password registration/login and the single-use password-reset flow.
//! OAuth sign-in is handled by an external provider and never touches
//! these paths; users it creates have no password hash and cannot use
//! password login or reset.

mod error;

pub use error::AuthError;

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use chrono::{Duration, Utc};
use rand::Rng;
use sqlx::PgPool;

use bruma_core::Email;

use crate::db::RepositoryError;
use crate::db::password_resets::PasswordResetRepository;
use crate::db::users::UserRepository;
use crate::models::user::User;

/// Minimum password length.
const MIN_PASSWORD_LENGTH: usize = 8;

/// Reset tokens expire this long after creation.
const RESET_TOKEN_TTL_MINUTES: i64 = 15;

/// Bytes of entropy in a reset token (hex-encoded to twice this length).
const RESET_TOKEN_BYTES: usize = 32;

/// Authentication service.
pub struct AuthService<'a> {
    users: UserRepository<'a>,
    resets: PasswordResetRepository<'a>,
}

impl<'a> AuthService<'a> {
    /// Create a new authentication service.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self {
            users: UserRepository::new(pool),
            resets: PasswordResetRepository::new(pool),
        }
    }

    // =========================================================================
    // Password Authentication
    // =========================================================================

    /// Register a new user with email and password.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidEmail` if the email format is invalid.
    /// Returns `AuthError::WeakPassword` if the password doesn't meet requirements.
    /// Returns `AuthError::UserAlreadyExists` if the email is already registered.
    pub async fn register(
        &self,
        email: &str,
        name: Option<&str>,
        password: &str,
    ) -> Result<User, AuthError> {
        let email = Email::parse(email)?;
        validate_password(password)?;
        let password_hash = hash_password(password)?;

        let user = self
            .users
            .create_with_password(&email, name, &password_hash)
            .await
            .map_err(|e| match e {
                RepositoryError::Conflict(_) => AuthError::UserAlreadyExists,
                other => AuthError::Repository(other),
            })?;

        Ok(user)
    }

    /// Login with email and password.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidCredentials` if the email/password is wrong.
    pub async fn login(&self, email: &str, password: &str) -> Result<User, AuthError> {
        let email = Email::parse(email)?;

        let (user, password_hash) = self
            .users
            .get_password_hash(&email)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        verify_password(password, &password_hash)?;

        Ok(user)
    }

    // =========================================================================
    // Password Reset
    // =========================================================================

    /// Create a reset token for the given email, if it belongs to a
    /// credentials user.
    ///
    /// Returns `None` (not an error) when the email is unknown or belongs
    /// to an OAuth-only account - callers answer with the same generic
    /// message either way so the endpoint cannot be used to enumerate
    /// accounts.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Repository` if a database operation fails.
    pub async fn request_password_reset(
        &self,
        email: &str,
    ) -> Result<Option<String>, AuthError> {
        let email = Email::parse(email)?;

        // Only credentials users can reset a password.
        if self.users.get_password_hash(&email).await?.is_none() {
            return Ok(None);
        }

        let token = generate_reset_token();
        let expires_at = Utc::now() + Duration::minutes(RESET_TOKEN_TTL_MINUTES);

        self.resets.create(&email, &token, expires_at).await?;

        Ok(Some(token))
    }

    /// Check that a reset token exists, is unused, and is unexpired.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidToken` in every failure case; which
    /// check failed is not distinguishable from the outside.
    pub async fn validate_reset_token(&self, token: &str) -> Result<(), AuthError> {
        let record = self
            .resets
            .get_by_token(token)
            .await?
            .ok_or(AuthError::InvalidToken)?;

        if !record.is_valid(Utc::now()) {
            return Err(AuthError::InvalidToken);
        }

        Ok(())
    }

    /// Consume a reset token and set the new password.
    ///
    /// The credential update and the token's `used` flag commit in a
    /// single transaction; there is no state where one applied without
    /// the other.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidToken` for unknown/used/expired tokens
    /// and `AuthError::WeakPassword` for a too-short password.
    pub async fn reset_password(&self, token: &str, password: &str) -> Result<(), AuthError> {
        validate_password(password)?;

        let record = self
            .resets
            .get_by_token(token)
            .await?
            .ok_or(AuthError::InvalidToken)?;

        if !record.is_valid(Utc::now()) {
            return Err(AuthError::InvalidToken);
        }

        let password_hash = hash_password(password)?;

        self.resets
            .consume(&record, &password_hash)
            .await
            .map_err(|e| match e {
                // Lost a race with a concurrent consumption of the same token.
                RepositoryError::Conflict(_) => AuthError::InvalidToken,
                other => AuthError::Repository(other),
            })?;

        Ok(())
    }
}

// =============================================================================
// Helpers
// =============================================================================

/// Validate password strength requirements.
fn validate_password(password: &str) -> Result<(), AuthError> {
    if password.len() < MIN_PASSWORD_LENGTH {
        return Err(AuthError::WeakPassword(format!(
            "password must be at least {MIN_PASSWORD_LENGTH} characters"
        )));
    }
    Ok(())
}

/// Hash a password with Argon2id and a fresh salt.
///
/// Public so the CLI's admin seeding can produce compatible hashes.
///
/// # Errors
///
/// Returns `AuthError::Hash` if hashing fails.
pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AuthError::Hash(e.to_string()))
}

/// Verify a password against a stored hash.
fn verify_password(password: &str, hash: &str) -> Result<(), AuthError> {
    let parsed = PasswordHash::new(hash).map_err(|_| AuthError::InvalidCredentials)?;
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .map_err(|_| AuthError::InvalidCredentials)
}

/// Generate an opaque reset token with 256 bits of entropy, hex-encoded.
fn generate_reset_token() -> String {
    let mut bytes = [0u8; RESET_TOKEN_BYTES];
    rand::rng().fill(bytes.as_mut_slice());
    hex::encode(bytes)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_password_minimum_length() {
        assert!(validate_password("short").is_err());
        assert!(validate_password("1234567").is_err());
        assert!(validate_password("12345678").is_ok());
    }

    #[test]
    fn test_hash_and_verify_roundtrip() {
        let hash = hash_password("correct horse battery").unwrap();
        assert!(verify_password("correct horse battery", &hash).is_ok());
    }

    #[test]
    fn test_wrong_password_rejected() {
        let hash = hash_password("correct horse battery").unwrap();
        assert!(matches!(
            verify_password("incorrect horse", &hash),
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[test]
    fn test_garbage_hash_rejected() {
        assert!(matches!(
            verify_password("anything", "not-a-phc-string"),
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[test]
    fn test_reset_token_shape() {
        let token = generate_reset_token();
        assert_eq!(token.len(), RESET_TOKEN_BYTES * 2);
        assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_reset_tokens_are_unique() {
        let a = generate_reset_token();
        let b = generate_reset_token();
        assert_ne!(a, b);
    }
}
