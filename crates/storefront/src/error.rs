//! Unified error handling with Sentry integration.
//!
//! Provides a unified `AppError` type that captures errors to Sentry before
//! responding to the client. All route handlers should return `Result<T, AppError>`.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use crate::db::RepositoryError;
use crate::services::auth::AuthError;
use crate::services::checkout::CheckoutError;
use crate::services::payments::{PaymentsError, SignatureError};

/// Application-level error type for the storefront.
#[derive(Debug, Error)]
pub enum AppError {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] RepositoryError),

    /// Checkout operation failed.
    #[error("Checkout error: {0}")]
    Checkout(#[from] CheckoutError),

    /// Payment processor operation failed.
    #[error("Payments error: {0}")]
    Payments(#[from] PaymentsError),

    /// Authentication operation failed.
    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// User is not authenticated.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Whether this error is the server's fault and belongs in Sentry.
    fn is_server_error(&self) -> bool {
        match self {
            Self::Internal(_) => true,
            Self::Database(err) => !matches!(err, RepositoryError::NotFound),
            Self::Checkout(err) => matches!(
                err,
                CheckoutError::Payments(_)
                    | CheckoutError::Repository(_)
                    | CheckoutError::OrderNumberExhausted
            ),
            Self::Payments(err) => matches!(
                err,
                PaymentsError::Http(_) | PaymentsError::Api { .. }
            ),
            Self::Auth(err) => matches!(
                err,
                AuthError::Hash(_) | AuthError::Repository(_)
            ),
            _ => false,
        }
    }

    fn status_code(&self) -> StatusCode {
        match self {
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Database(err) => match err {
                RepositoryError::NotFound => StatusCode::NOT_FOUND,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Checkout(err) => match err {
                CheckoutError::EmptyCart
                | CheckoutError::InvalidLine(_)
                | CheckoutError::InvalidEmail(_)
                | CheckoutError::InvalidAmount(_) => StatusCode::BAD_REQUEST,
                CheckoutError::Payments(_) => StatusCode::BAD_GATEWAY,
                CheckoutError::Repository(_) | CheckoutError::OrderNumberExhausted => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
            Self::Payments(err) => match err {
                // Missing or unparseable signature material is the
                // caller's problem; a non-matching or stale signature is
                // an authentication failure.
                PaymentsError::Signature(
                    SignatureError::Malformed
                    | SignatureError::MissingTimestamp
                    | SignatureError::MissingSignature,
                )
                | PaymentsError::InvalidPayload(_) => StatusCode::BAD_REQUEST,
                PaymentsError::Signature(
                    SignatureError::NoMatch | SignatureError::StaleTimestamp,
                ) => StatusCode::UNAUTHORIZED,
                PaymentsError::Http(_) | PaymentsError::Api { .. } => StatusCode::BAD_GATEWAY,
            },
            Self::Auth(err) => match err {
                AuthError::InvalidCredentials => StatusCode::UNAUTHORIZED,
                AuthError::UserAlreadyExists => StatusCode::CONFLICT,
                AuthError::WeakPassword(_)
                | AuthError::InvalidEmail(_)
                | AuthError::InvalidToken => StatusCode::BAD_REQUEST,
                AuthError::Hash(_) | AuthError::Repository(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }

    /// The message sent to the client. Never exposes internal detail.
    fn client_message(&self) -> String {
        match self {
            Self::Database(RepositoryError::NotFound) | Self::NotFound(_) => {
                "Recurso no encontrado".to_string()
            }
            Self::Database(_) | Self::Internal(_) => "Error interno del servidor".to_string(),
            Self::Checkout(err) => match err {
                CheckoutError::EmptyCart => "Carrito vacío".to_string(),
                CheckoutError::InvalidLine(msg) => msg.clone(),
                CheckoutError::InvalidEmail(_) => "Email inválido".to_string(),
                CheckoutError::InvalidAmount(_) => "Importe inválido".to_string(),
                _ => "Error al crear sesión de pago".to_string(),
            },
            Self::Payments(err) => match err {
                PaymentsError::Signature(_) => "Invalid signature".to_string(),
                PaymentsError::InvalidPayload(_) => "Invalid payload".to_string(),
                _ => "Webhook handler failed".to_string(),
            },
            Self::Auth(err) => match err {
                AuthError::InvalidCredentials => "Credenciales inválidas".to_string(),
                AuthError::UserAlreadyExists => {
                    "Ya existe una cuenta con este email".to_string()
                }
                AuthError::WeakPassword(msg) => msg.clone(),
                AuthError::InvalidEmail(_) => "Email inválido".to_string(),
                AuthError::InvalidToken => "Token inválido o expirado".to_string(),
                _ => "Error de autenticación".to_string(),
            },
            Self::Unauthorized(_) => "No autorizado".to_string(),
            Self::BadRequest(msg) => msg.clone(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Capture server errors to Sentry
        if self.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        }

        let status = self.status_code();
        let body = Json(json!({ "error": self.client_message() }));

        (status, body).into_response()
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    fn get_status(err: AppError) -> StatusCode {
        err.into_response().status()
    }

    #[test]
    fn test_app_error_display() {
        let err = AppError::NotFound("order-123".to_string());
        assert_eq!(err.to_string(), "Not found: order-123");

        let err = AppError::BadRequest("invalid input".to_string());
        assert_eq!(err.to_string(), "Bad request: invalid input");
    }

    #[test]
    fn test_basic_status_codes() {
        assert_eq!(
            get_status(AppError::NotFound("test".to_string())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            get_status(AppError::Unauthorized("test".to_string())),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            get_status(AppError::BadRequest("test".to_string())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            get_status(AppError::Internal("test".to_string())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_validation_errors_are_client_errors() {
        assert_eq!(
            get_status(AppError::Checkout(CheckoutError::EmptyCart)),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            get_status(AppError::Checkout(CheckoutError::InvalidLine(
                "quantity must be positive".to_string()
            ))),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn test_signature_failures_reject_before_processing() {
        assert_eq!(
            get_status(AppError::Payments(PaymentsError::Signature(
                SignatureError::Malformed
            ))),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            get_status(AppError::Payments(PaymentsError::Signature(
                SignatureError::NoMatch
            ))),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            get_status(AppError::Payments(PaymentsError::Signature(
                SignatureError::StaleTimestamp
            ))),
            StatusCode::UNAUTHORIZED
        );
    }

    #[test]
    fn test_reconciliation_gap_is_server_error() {
        assert_eq!(
            get_status(AppError::Database(RepositoryError::NotFound)),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            get_status(AppError::Internal("no order for session".to_string())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_token_errors_share_one_message() {
        // Unknown, used, and expired tokens must be indistinguishable.
        let err = AppError::Auth(AuthError::InvalidToken);
        assert_eq!(err.client_message(), "Token inválido o expirado");
        assert_eq!(get_status(err), StatusCode::BAD_REQUEST);
    }
}
