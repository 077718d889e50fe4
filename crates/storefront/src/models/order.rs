//! Order domain types.
//!
//! An [`Order`] is the durable record of a purchase: customer contact,
//! shipping address, totals, fulfillment status, and the payment-session
//! reference used for webhook reconciliation. Its [`OrderItem`]s are
//! denormalized snapshots of the catalog at purchase time, never live
//! references.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use bruma_core::{Email, OrderId, OrderItemId, OrderStatus, PaymentStatus, UserId};

/// A customer shipping address, stored as JSON on the order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShippingAddress {
    pub street: String,
    pub city: String,
    pub state: String,
    pub postal_code: String,
}

/// A purchase record (domain type).
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    /// Unique order ID.
    pub id: OrderId,
    /// Human-readable external reference (e.g. `BR-12345678-K3ZQ`).
    pub order_number: String,
    /// Owning user, when the buyer was logged in at checkout.
    pub user_id: Option<UserId>,
    /// Buyer contact email.
    pub customer_email: Email,
    /// Buyer display name, if provided.
    pub customer_name: Option<String>,
    /// Where to ship.
    pub shipping_address: ShippingAddress,
    /// Sum of `price * quantity` over all items.
    pub subtotal: Decimal,
    /// Flat shipping fee charged on this order.
    pub shipping: Decimal,
    /// `subtotal + shipping`, fixed at creation time.
    pub total: Decimal,
    /// Fulfillment status.
    pub status: OrderStatus,
    /// Payment status as last reported by the processor.
    pub payment_status: PaymentStatus,
    /// Payment-session reference for webhook reconciliation.
    pub stripe_session_id: Option<String>,
    /// When the order was created.
    pub created_at: DateTime<Utc>,
    /// Line items, created atomically with the order.
    pub items: Vec<OrderItem>,
}

/// One product-variant-and-quantity entry within an order.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    pub id: OrderItemId,
    /// Catalog variant reference (opaque; the catalog is external).
    pub variant_id: String,
    pub product_name: String,
    pub variant_name: String,
    /// Unit price at purchase time.
    pub price: Decimal,
    pub quantity: i32,
}

/// Data needed to persist a new order.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub order_number: String,
    pub user_id: Option<UserId>,
    pub customer_email: Email,
    pub customer_name: Option<String>,
    pub shipping_address: ShippingAddress,
    pub subtotal: Decimal,
    pub shipping: Decimal,
    pub total: Decimal,
    pub stripe_session_id: String,
    pub items: Vec<NewOrderItem>,
}

/// Data needed to persist a new order line item.
#[derive(Debug, Clone)]
pub struct NewOrderItem {
    pub variant_id: String,
    pub product_name: String,
    pub variant_name: String,
    pub price: Decimal,
    pub quantity: i32,
}
