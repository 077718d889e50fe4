//! Admin dashboard statistics.

use axum::{Json, extract::State};
use tracing::instrument;

use crate::db::orders::{OrderRepository, OrderStats};
use crate::error::Result;
use crate::middleware::RequireAdmin;
use crate::state::AppState;

/// Aggregate revenue and order counts for the dashboard.
///
/// Revenue counts only PAID orders; counts cover every order regardless
/// of payment state.
#[instrument(skip(state, _admin))]
pub async fn stats(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
) -> Result<Json<OrderStats>> {
    let stats = OrderRepository::new(state.pool()).stats().await?;
    Ok(Json(stats))
}
