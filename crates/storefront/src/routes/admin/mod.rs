//! Admin route handlers.
//!
//! Every handler takes the `RequireAdmin` extractor; anonymous callers
//! get 401 and authenticated non-admins 403, in both cases before any
//! work happens.

pub mod orders;
pub mod stats;

use axum::{
    Router,
    routing::get,
};

use crate::state::AppState;

/// Create the admin routes router.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/orders", get(orders::list))
        .route(
            "/orders/{id}",
            get(orders::detail).patch(orders::update_status),
        )
        .route("/stats", get(stats::stats))
}
