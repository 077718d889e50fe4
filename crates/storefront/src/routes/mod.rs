//! HTTP route handlers for the storefront API.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                      - Liveness check
//! GET  /health/ready                - Readiness check (DB ping)
//!
//! # Checkout & Orders
//! POST /api/checkout                - Create order + hosted payment session
//! GET  /api/orders                  - Current user's orders (requires auth)
//!
//! # Webhooks
//! POST /api/webhooks/stripe         - Signed payment processor callbacks
//!
//! # Auth
//! POST /api/auth/register           - Register with email + password
//! POST /api/auth/login              - Login, stores user in session
//! POST /api/auth/logout             - Clear session
//! POST /api/auth/forgot-password    - Request a reset token (non-enumerating)
//! GET  /api/auth/reset-password     - Validate a reset token
//! POST /api/auth/reset-password     - Consume token, change password
//!
//! # Admin (requires ADMIN role)
//! GET   /api/admin/orders           - Filtered order listing
//! GET   /api/admin/orders/{id}      - Order detail
//! PATCH /api/admin/orders/{id}      - Unconditional status update
//! GET   /api/admin/stats            - Dashboard aggregates
//! ```

pub mod admin;
pub mod auth;
pub mod checkout;
pub mod orders;
pub mod webhooks;

use axum::{
    Router,
    routing::{get, post},
};

use crate::state::AppState;

/// Create the auth routes router.
pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/logout", post(auth::logout))
        .route("/forgot-password", post(auth::forgot_password))
        .route(
            "/reset-password",
            get(auth::validate_reset_token).post(auth::reset_password),
        )
}

/// Create all routes for the storefront.
pub fn routes() -> Router<AppState> {
    Router::new()
        // Checkout
        .route("/api/checkout", post(checkout::create))
        // Customer orders
        .route("/api/orders", get(orders::list_mine))
        // Payment processor webhooks
        .route("/api/webhooks/stripe", post(webhooks::stripe))
        // Auth routes
        .nest("/api/auth", auth_routes())
        // Admin routes
        .nest("/api/admin", admin::routes())
}
