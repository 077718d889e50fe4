//! Authentication route handlers.
//!
//! JSON endpoints for registration, login/logout, and the password reset
//! flow. The forgot-password endpoint always answers with the same
//! message so it cannot be used to probe which emails have accounts.

use axum::{Json, extract::{Query, State}};
use serde::Deserialize;
use serde_json::{Value, json};
use tower_sessions::Session;
use tracing::instrument;

use crate::error::{AppError, Result};
use crate::middleware::auth::{clear_current_user, set_current_user};
use crate::models::CurrentUser;
use crate::services::auth::AuthService;
use crate::state::AppState;

/// The one message the forgot-password endpoint ever returns.
const RESET_REQUESTED_MESSAGE: &str =
    "Si el email existe, recibirás un enlace para restablecer tu contraseña";

// =============================================================================
// Request Types
// =============================================================================

/// Registration request body.
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub name: Option<String>,
    pub password: String,
}

/// Login request body.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Forgot-password request body.
#[derive(Debug, Deserialize)]
pub struct ForgotPasswordRequest {
    pub email: String,
}

/// Reset token validation query.
#[derive(Debug, Deserialize)]
pub struct ValidateTokenQuery {
    pub token: String,
}

/// Password reset request body.
#[derive(Debug, Deserialize)]
pub struct ResetPasswordRequest {
    pub token: String,
    pub password: String,
}

// =============================================================================
// Handlers
// =============================================================================

/// Register a new account and log it in.
#[instrument(skip(state, session, request))]
pub async fn register(
    State(state): State<AppState>,
    session: Session,
    Json(request): Json<RegisterRequest>,
) -> Result<Json<CurrentUser>> {
    let service = AuthService::new(state.pool());
    let user = service
        .register(&request.email, request.name.as_deref(), &request.password)
        .await?;

    let current = CurrentUser::from(&user);
    set_current_user(&session, &current)
        .await
        .map_err(|e| AppError::Internal(format!("failed to persist session: {e}")))?;

    Ok(Json(current))
}

/// Login with email and password.
#[instrument(skip(state, session, request))]
pub async fn login(
    State(state): State<AppState>,
    session: Session,
    Json(request): Json<LoginRequest>,
) -> Result<Json<CurrentUser>> {
    let service = AuthService::new(state.pool());
    let user = service.login(&request.email, &request.password).await?;

    let current = CurrentUser::from(&user);
    set_current_user(&session, &current)
        .await
        .map_err(|e| AppError::Internal(format!("failed to persist session: {e}")))?;

    Ok(Json(current))
}

/// Logout: clear the session.
#[instrument(skip(session))]
pub async fn logout(session: Session) -> Result<Json<Value>> {
    clear_current_user(&session)
        .await
        .map_err(|e| AppError::Internal(format!("failed to clear session: {e}")))?;

    Ok(Json(json!({ "ok": true })))
}

/// Request a password reset token.
///
/// The response is identical whether or not the email has an account;
/// the reset URL is logged (email delivery is handled out-of-band).
#[instrument(skip(state, request))]
pub async fn forgot_password(
    State(state): State<AppState>,
    Json(request): Json<ForgotPasswordRequest>,
) -> Result<Json<Value>> {
    let service = AuthService::new(state.pool());

    match service.request_password_reset(&request.email).await {
        Ok(Some(token)) => {
            let reset_url = format!(
                "{}/auth/reset-password/{token}",
                state.config().base_url
            );
            tracing::debug!(email = %request.email, reset_url, "password reset token issued");
        }
        Ok(None) => {
            tracing::debug!(email = %request.email, "reset requested for unknown or OAuth account");
        }
        // A malformed email cannot have an account; same generic answer.
        Err(crate::services::auth::AuthError::InvalidEmail(_)) => {}
        Err(other) => return Err(other.into()),
    }

    Ok(Json(json!({ "message": RESET_REQUESTED_MESSAGE })))
}

/// Check whether a reset token is still usable.
#[instrument(skip(state, query))]
pub async fn validate_reset_token(
    State(state): State<AppState>,
    Query(query): Query<ValidateTokenQuery>,
) -> Result<Json<Value>> {
    let service = AuthService::new(state.pool());
    service.validate_reset_token(&query.token).await?;

    Ok(Json(json!({ "valid": true })))
}

/// Consume a reset token and set the new password.
#[instrument(skip(state, request))]
pub async fn reset_password(
    State(state): State<AppState>,
    Json(request): Json<ResetPasswordRequest>,
) -> Result<Json<Value>> {
    let service = AuthService::new(state.pool());
    service
        .reset_password(&request.token, &request.password)
        .await?;

    Ok(Json(json!({ "message": "Contraseña actualizada exitosamente" })))
}
