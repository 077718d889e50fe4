//! Password reset token repository.
//!
//! A token is single-use: validity requires `used == false` and
//! `now < expires_at`, checked together. Consumption (password change +
//! marking the token used) happens inside one transaction so no partial
//! state can survive a failure.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use bruma_core::{Email, ResetTokenId};

use super::RepositoryError;

/// A stored password reset token.
#[derive(Debug, Clone)]
pub struct PasswordResetToken {
    pub id: ResetTokenId,
    pub email: Email,
    /// Opaque token value handed to the user (64 hex chars).
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub used: bool,
}

impl PasswordResetToken {
    /// Whether this token may still be consumed at `now`.
    #[must_use]
    pub fn is_valid(&self, now: DateTime<Utc>) -> bool {
        !self.used && now < self.expires_at
    }
}

/// Internal row type for reset token queries.
#[derive(Debug, sqlx::FromRow)]
struct ResetTokenRow {
    id: i32,
    email: String,
    token: String,
    expires_at: DateTime<Utc>,
    used: bool,
}

impl TryFrom<ResetTokenRow> for PasswordResetToken {
    type Error = RepositoryError;

    fn try_from(row: ResetTokenRow) -> Result<Self, Self::Error> {
        let email = Email::parse(&row.email).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid email in database: {e}"))
        })?;

        Ok(Self {
            id: ResetTokenId::new(row.id),
            email,
            token: row.token,
            expires_at: row.expires_at,
            used: row.used,
        })
    }
}

/// Repository for password reset token operations.
pub struct PasswordResetRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> PasswordResetRepository<'a> {
    /// Create a new password reset repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Store a freshly generated token.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn create(
        &self,
        email: &Email,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<PasswordResetToken, RepositoryError> {
        let row = sqlx::query_as::<_, ResetTokenRow>(
            "INSERT INTO password_reset_tokens (email, token, expires_at) \
             VALUES ($1, $2, $3) \
             RETURNING id, email, token, expires_at, used",
        )
        .bind(email.as_str())
        .bind(token)
        .bind(expires_at)
        .fetch_one(self.pool)
        .await?;

        PasswordResetToken::try_from(row)
    }

    /// Look up a token by its opaque value.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_token(
        &self,
        token: &str,
    ) -> Result<Option<PasswordResetToken>, RepositoryError> {
        let row = sqlx::query_as::<_, ResetTokenRow>(
            "SELECT id, email, token, expires_at, used \
             FROM password_reset_tokens WHERE token = $1",
        )
        .bind(token)
        .fetch_optional(self.pool)
        .await?;

        row.map(PasswordResetToken::try_from).transpose()
    }

    /// Consume a token: set the user's new password hash and mark the token
    /// used, atomically.
    ///
    /// Both writes commit together or not at all. The token update is
    /// guarded by `used = FALSE` so a concurrent consumption of the same
    /// token loses the race instead of silently double-applying.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the user row is gone, and
    /// `RepositoryError::Conflict` if the token was consumed concurrently.
    pub async fn consume(
        &self,
        token: &PasswordResetToken,
        new_password_hash: &str,
    ) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let user_result = sqlx::query(
            "UPDATE users SET password_hash = $1, updated_at = NOW() WHERE email = $2",
        )
        .bind(new_password_hash)
        .bind(token.email.as_str())
        .execute(&mut *tx)
        .await?;

        if user_result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        let token_result = sqlx::query(
            "UPDATE password_reset_tokens SET used = TRUE WHERE id = $1 AND used = FALSE",
        )
        .bind(token.id.as_i32())
        .execute(&mut *tx)
        .await?;

        if token_result.rows_affected() == 0 {
            return Err(RepositoryError::Conflict(
                "token already consumed".to_owned(),
            ));
        }

        tx.commit().await?;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Duration;

    use super::*;

    fn token(used: bool, expires_in: Duration) -> PasswordResetToken {
        PasswordResetToken {
            id: ResetTokenId::new(1),
            email: Email::parse("user@example.com").unwrap(),
            token: "a".repeat(64),
            expires_at: Utc::now() + expires_in,
            used,
        }
    }

    #[test]
    fn test_valid_when_unused_and_fresh() {
        assert!(token(false, Duration::minutes(15)).is_valid(Utc::now()));
    }

    #[test]
    fn test_invalid_when_used() {
        assert!(!token(true, Duration::minutes(15)).is_valid(Utc::now()));
    }

    #[test]
    fn test_invalid_when_expired() {
        assert!(!token(false, Duration::minutes(-1)).is_valid(Utc::now()));
    }

    #[test]
    fn test_invalid_at_exact_expiry() {
        let t = token(false, Duration::zero());
        assert!(!t.is_valid(t.expires_at));
    }
}
