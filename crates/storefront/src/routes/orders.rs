//! Customer order routes.

use axum::{Json, extract::State};
use tracing::instrument;

use crate::db::orders::OrderRepository;
use crate::error::Result;
use crate::middleware::RequireUser;
use crate::models::order::Order;
use crate::state::AppState;

/// List the calling user's orders, newest first, with line items.
#[instrument(skip(state, user))]
pub async fn list_mine(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
) -> Result<Json<Vec<Order>>> {
    let orders = OrderRepository::new(state.pool())
        .list_for_user(user.id)
        .await?;

    Ok(Json(orders))
}
