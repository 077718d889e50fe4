//! Authentication error types.

use bruma_core::EmailError;

use crate::db::RepositoryError;

/// Errors from authentication and password-reset operations.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// The email format is invalid.
    #[error("invalid email: {0}")]
    InvalidEmail(#[from] EmailError),

    /// The password doesn't meet requirements.
    #[error("{0}")]
    WeakPassword(String),

    /// An account with this email already exists.
    #[error("user already exists")]
    UserAlreadyExists,

    /// Wrong email or password.
    #[error("invalid credentials")]
    InvalidCredentials,

    /// The reset token is unknown, already used, or expired.
    ///
    /// Deliberately one variant: the distinction must not leak to clients.
    #[error("invalid or expired token")]
    InvalidToken,

    /// Password hashing failed.
    #[error("password hashing error: {0}")]
    Hash(String),

    /// Database operation failed.
    #[error("repository error: {0}")]
    Repository(#[from] RepositoryError),
}
