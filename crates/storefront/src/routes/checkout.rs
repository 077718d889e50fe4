//! Checkout route handler.

use axum::{Json, extract::State};
use serde::Deserialize;
use tracing::instrument;

use crate::error::Result;
use crate::middleware::auth::OptionalUser;
use crate::services::checkout::{CartLine, CheckoutOutcome, CheckoutService, CustomerInfo};
use crate::state::AppState;

/// Checkout request body.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutRequest {
    pub items: Vec<CartLine>,
    pub customer_info: CustomerInfo,
}

/// Initiate a checkout: validates the cart, opens a hosted payment
/// session, and persists the pending order.
///
/// The buyer does not need to be logged in; when they are, the order is
/// attached to their account.
#[instrument(skip(state, request))]
pub async fn create(
    State(state): State<AppState>,
    OptionalUser(user): OptionalUser,
    Json(request): Json<CheckoutRequest>,
) -> Result<Json<CheckoutOutcome>> {
    let service = CheckoutService::new(state.pool(), state.payments(), state.config());

    let outcome = service
        .create_checkout(
            &request.items,
            &request.customer_info,
            user.map(|u| u.id),
        )
        .await?;

    Ok(Json(outcome))
}
