//! Checkout service.
//!
//! Converts a cart snapshot into a pending order and a hosted payment
//! session. The external session is created first and the order persisted
//! second: a failed processor call therefore leaves no local state, while
//! a failed local write leaves an orphaned session that the webhook
//! handler will later surface as a reconciliation gap.

use rand::Rng;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use bruma_core::{Email, EmailError, MoneyError, UserId, to_minor_units};

use crate::config::StorefrontConfig;
use crate::db::RepositoryError;
use crate::db::orders::OrderRepository;
use crate::models::order::{NewOrder, NewOrderItem, ShippingAddress};
use crate::services::payments::{
    CheckoutSessionRequest, PaymentsClient, PaymentsError, SessionLineItem,
};

/// Order number prefix for this store.
const ORDER_NUMBER_PREFIX: &str = "BR-";

/// Characters used for the random order-number suffix.
const ORDER_SUFFIX_CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Length of the random order-number suffix.
const ORDER_SUFFIX_LEN: usize = 4;

/// How many times to retry on an order-number collision. The DB unique
/// constraint is the arbiter; the suffix space makes more than one retry
/// essentially unreachable at this store's volume.
const MAX_ORDER_NUMBER_ATTEMPTS: u32 = 3;

/// Display name of the shipping line item on the hosted payment page.
const SHIPPING_ITEM_NAME: &str = "Envío estándar";
const SHIPPING_ITEM_DESCRIPTION: &str = "Entrega en 3-7 días hábiles";

/// One cart line as submitted by the storefront UI.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLine {
    pub variant_id: String,
    pub product_name: String,
    pub variant_name: String,
    /// Unit price in pesos.
    pub price: Decimal,
    pub quantity: i32,
}

/// Customer contact and shipping details for a checkout.
#[derive(Debug, Clone, Deserialize)]
pub struct CustomerInfo {
    pub email: String,
    pub name: Option<String>,
    pub address: ShippingAddress,
}

/// The result of a successful checkout initiation.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutOutcome {
    /// Hosted payment page to redirect the customer to.
    pub redirect_url: String,
    /// Human-readable order reference.
    pub order_number: String,
    /// Payment-session reference.
    pub session_id: String,
}

/// Errors from checkout initiation.
#[derive(Debug, thiserror::Error)]
pub enum CheckoutError {
    /// The cart has no lines.
    #[error("cart is empty")]
    EmptyCart,

    /// A line has a non-positive price or quantity.
    #[error("invalid cart line: {0}")]
    InvalidLine(String),

    /// The customer email failed validation.
    #[error("invalid email: {0}")]
    InvalidEmail(#[from] EmailError),

    /// A line amount could not be expressed in minor units.
    #[error("invalid amount: {0}")]
    InvalidAmount(#[from] MoneyError),

    /// The payment processor rejected or failed the session request.
    #[error("payment session creation failed: {0}")]
    Payments(#[from] PaymentsError),

    /// The order could not be persisted.
    #[error("order persistence failed: {0}")]
    Repository(#[from] RepositoryError),

    /// Could not find a free order number within the retry budget.
    #[error("order number collision persisted across retries")]
    OrderNumberExhausted,
}

/// Checkout orchestration.
pub struct CheckoutService<'a> {
    orders: OrderRepository<'a>,
    payments: &'a PaymentsClient,
    config: &'a StorefrontConfig,
}

impl<'a> CheckoutService<'a> {
    /// Create a new checkout service.
    #[must_use]
    pub const fn new(
        pool: &'a sqlx::PgPool,
        payments: &'a PaymentsClient,
        config: &'a StorefrontConfig,
    ) -> Self {
        Self {
            orders: OrderRepository::new(pool),
            payments,
            config,
        }
    }

    /// Initiate a checkout: validate, price, open a payment session, and
    /// persist the pending order.
    ///
    /// # Errors
    ///
    /// Validation errors (`EmptyCart`, `InvalidLine`, `InvalidEmail`) are
    /// returned before any side effect. `Payments` errors leave no local
    /// state. `Repository` errors after a successful session mean an
    /// orphaned external session, which is logged here.
    pub async fn create_checkout(
        &self,
        lines: &[CartLine],
        customer: &CustomerInfo,
        user_id: Option<UserId>,
    ) -> Result<CheckoutOutcome, CheckoutError> {
        validate_lines(lines)?;
        let email = Email::parse(&customer.email)?;

        let subtotal = compute_subtotal(lines);
        let shipping = self.config.checkout.shipping_fee;
        let total = subtotal + shipping;

        for attempt in 0..MAX_ORDER_NUMBER_ATTEMPTS {
            let order_number = generate_order_number();
            if attempt > 0 {
                tracing::warn!(order_number, attempt, "retrying after order number collision");
            }

            let session_request = build_session_request(
                lines,
                customer,
                &order_number,
                subtotal,
                shipping,
                total,
                &self.config.base_url,
                &self.config.checkout.currency,
            )?;

            let session = self.payments.create_checkout_session(&session_request).await?;

            let new_order = NewOrder {
                order_number: order_number.clone(),
                user_id,
                customer_email: email.clone(),
                customer_name: customer.name.clone(),
                shipping_address: customer.address.clone(),
                subtotal,
                shipping,
                total,
                stripe_session_id: session.id.clone(),
                items: lines
                    .iter()
                    .map(|line| NewOrderItem {
                        variant_id: line.variant_id.clone(),
                        product_name: line.product_name.clone(),
                        variant_name: line.variant_name.clone(),
                        price: line.price,
                        quantity: line.quantity,
                    })
                    .collect(),
            };

            match self.orders.create_with_items(&new_order).await {
                Ok(order) => {
                    tracing::info!(
                        order_number = %order.order_number,
                        session_id = %session.id,
                        total = %order.total,
                        "checkout session created"
                    );
                    return Ok(CheckoutOutcome {
                        redirect_url: session.url,
                        order_number,
                        session_id: session.id,
                    });
                }
                Err(RepositoryError::Conflict(_)) => {
                    // The session created for the colliding number is now
                    // orphaned; the webhook handler will log it as a
                    // reconciliation gap if it ever fires.
                    tracing::warn!(
                        order_number,
                        session_id = %session.id,
                        "order number collision; session orphaned"
                    );
                }
                Err(other) => {
                    tracing::error!(
                        order_number,
                        session_id = %session.id,
                        error = %other,
                        "order persistence failed after session creation"
                    );
                    return Err(other.into());
                }
            }
        }

        Err(CheckoutError::OrderNumberExhausted)
    }
}

// =============================================================================
// Pure helpers
// =============================================================================

/// Reject empty carts and non-positive prices or quantities.
fn validate_lines(lines: &[CartLine]) -> Result<(), CheckoutError> {
    if lines.is_empty() {
        return Err(CheckoutError::EmptyCart);
    }

    for line in lines {
        if line.quantity <= 0 {
            return Err(CheckoutError::InvalidLine(format!(
                "quantity must be positive for {}",
                line.product_name
            )));
        }
        if line.price <= Decimal::ZERO {
            return Err(CheckoutError::InvalidLine(format!(
                "price must be positive for {}",
                line.product_name
            )));
        }
    }

    Ok(())
}

/// Sum of `price * quantity` over all lines, exact in Decimal.
fn compute_subtotal(lines: &[CartLine]) -> Decimal {
    lines
        .iter()
        .map(|line| line.price * Decimal::from(line.quantity))
        .sum()
}

/// Generate a fresh order number: prefix + truncated unix-millis + random
/// suffix from a CSPRNG.
fn generate_order_number() -> String {
    let millis = chrono::Utc::now().timestamp_millis();
    let mut rng = rand::rng();
    let suffix: String = (0..ORDER_SUFFIX_LEN)
        .filter_map(|_| {
            let idx = rng.random_range(0..ORDER_SUFFIX_CHARSET.len());
            ORDER_SUFFIX_CHARSET.get(idx).map(|&b| char::from(b))
        })
        .collect();

    format_order_number(millis, &suffix)
}

/// Compose an order number from its parts (separated out for tests).
fn format_order_number(millis: i64, suffix: &str) -> String {
    let digits = format!("{millis:08}");
    let tail_start = digits.len().saturating_sub(8);
    let tail = digits.get(tail_start..).unwrap_or(&digits);
    format!("{ORDER_NUMBER_PREFIX}{tail}-{suffix}")
}

/// Build the payment-session request for a priced cart.
#[allow(clippy::too_many_arguments)]
fn build_session_request(
    lines: &[CartLine],
    customer: &CustomerInfo,
    order_number: &str,
    subtotal: Decimal,
    shipping: Decimal,
    total: Decimal,
    base_url: &str,
    currency: &str,
) -> Result<CheckoutSessionRequest, CheckoutError> {
    let mut line_items = Vec::with_capacity(lines.len() + 1);
    for line in lines {
        line_items.push(SessionLineItem {
            name: line.product_name.clone(),
            description: line.variant_name.clone(),
            unit_amount: to_minor_units(line.price)?,
            quantity: i64::from(line.quantity),
        });
    }
    line_items.push(SessionLineItem {
        name: SHIPPING_ITEM_NAME.to_owned(),
        description: SHIPPING_ITEM_DESCRIPTION.to_owned(),
        unit_amount: to_minor_units(shipping)?,
        quantity: 1,
    });

    // Enough context to reconstruct the order if the local write is lost.
    let metadata = vec![
        ("order_number".to_owned(), order_number.to_owned()),
        (
            "customer_name".to_owned(),
            customer.name.clone().unwrap_or_default(),
        ),
        ("customer_email".to_owned(), customer.email.clone()),
        (
            "shipping_address".to_owned(),
            serde_json::to_string(&customer.address).unwrap_or_default(),
        ),
        (
            "items_data".to_owned(),
            serde_json::to_string(lines).unwrap_or_default(),
        ),
        ("subtotal".to_owned(), subtotal.to_string()),
        ("shipping".to_owned(), shipping.to_string()),
        ("total".to_owned(), total.to_string()),
    ];

    Ok(CheckoutSessionRequest {
        currency: currency.to_owned(),
        line_items,
        success_url: format!("{base_url}/checkout/success?order={order_number}"),
        cancel_url: format!("{base_url}/checkout?cancelled=true"),
        customer_email: customer.email.clone(),
        metadata,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn line(price: &str, quantity: i32) -> CartLine {
        CartLine {
            variant_id: "var_1".to_owned(),
            product_name: "Bruma Nocturna".to_owned(),
            variant_name: "100ml".to_owned(),
            price: price.parse().unwrap(),
            quantity,
        }
    }

    fn customer() -> CustomerInfo {
        CustomerInfo {
            email: "buyer@example.com".to_owned(),
            name: Some("Ana Torres".to_owned()),
            address: ShippingAddress {
                street: "Av. Reforma 100".to_owned(),
                city: "CDMX".to_owned(),
                state: "CDMX".to_owned(),
                postal_code: "06600".to_owned(),
            },
        }
    }

    #[test]
    fn test_empty_cart_rejected() {
        assert!(matches!(
            validate_lines(&[]),
            Err(CheckoutError::EmptyCart)
        ));
    }

    #[test]
    fn test_non_positive_lines_rejected() {
        assert!(matches!(
            validate_lines(&[line("100", 0)]),
            Err(CheckoutError::InvalidLine(_))
        ));
        assert!(matches!(
            validate_lines(&[line("0", 1)]),
            Err(CheckoutError::InvalidLine(_))
        ));
        assert!(matches!(
            validate_lines(&[line("-5", 1)]),
            Err(CheckoutError::InvalidLine(_))
        ));
    }

    #[test]
    fn test_subtotal_is_exact_sum() {
        let lines = [line("100", 2), line("50", 1)];
        assert_eq!(compute_subtotal(&lines), Decimal::from(250));
    }

    #[test]
    fn test_totals_scenario() {
        // Two lines {100 x 2} and {50 x 1} with flat shipping 99.
        let lines = [line("100", 2), line("50", 1)];
        let subtotal = compute_subtotal(&lines);
        let shipping = Decimal::from(99);

        assert_eq!(subtotal, Decimal::from(250));
        assert_eq!(subtotal + shipping, Decimal::from(349));
    }

    #[test]
    fn test_subtotal_keeps_centavo_precision() {
        let lines = [line("19.99", 3)];
        assert_eq!(compute_subtotal(&lines), "59.97".parse().unwrap());
    }

    #[test]
    fn test_order_number_shape() {
        let number = format_order_number(1_700_000_123_456, "K3ZQ");
        assert_eq!(number, "BR-00123456-K3ZQ");
    }

    #[test]
    fn test_order_number_short_millis_padded() {
        let number = format_order_number(42, "AAAA");
        assert_eq!(number, "BR-00000042-AAAA");
    }

    #[test]
    fn test_generated_order_numbers_well_formed() {
        for _ in 0..100 {
            let number = generate_order_number();
            let parts: Vec<&str> = number.splitn(3, '-').collect();
            assert_eq!(parts.len(), 3);
            assert_eq!(parts.first().copied(), Some("BR"));
            assert_eq!(parts.get(1).map(|p| p.len()), Some(8));
            assert_eq!(parts.get(2).map(|p| p.len()), Some(ORDER_SUFFIX_LEN));
            assert!(
                number
                    .chars()
                    .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '-')
            );
        }
    }

    #[test]
    fn test_session_request_has_shipping_line() {
        let lines = [line("100", 2), line("50", 1)];
        let request = build_session_request(
            &lines,
            &customer(),
            "BR-00000001-AAAA",
            Decimal::from(250),
            Decimal::from(99),
            Decimal::from(349),
            "https://bruma.mx",
            "mxn",
        )
        .unwrap();

        assert_eq!(request.line_items.len(), 3);
        let shipping = request.line_items.last().unwrap();
        assert_eq!(shipping.name, SHIPPING_ITEM_NAME);
        assert_eq!(shipping.unit_amount, 9900);
        assert_eq!(shipping.quantity, 1);
    }

    #[test]
    fn test_session_request_amounts_in_centavos() {
        let lines = [line("19.99", 3)];
        let request = build_session_request(
            &lines,
            &customer(),
            "BR-00000001-AAAA",
            "59.97".parse().unwrap(),
            Decimal::from(99),
            "158.97".parse().unwrap(),
            "https://bruma.mx",
            "mxn",
        )
        .unwrap();

        let first = request.line_items.first().unwrap();
        assert_eq!(first.unit_amount, 1999);
        assert_eq!(first.quantity, 3);
    }

    #[test]
    fn test_session_request_redirects_reference_order() {
        let request = build_session_request(
            &[line("100", 1)],
            &customer(),
            "BR-00000001-AAAA",
            Decimal::from(100),
            Decimal::from(99),
            Decimal::from(199),
            "https://bruma.mx",
            "mxn",
        )
        .unwrap();

        assert_eq!(
            request.success_url,
            "https://bruma.mx/checkout/success?order=BR-00000001-AAAA"
        );
        assert_eq!(request.cancel_url, "https://bruma.mx/checkout?cancelled=true");
    }

    #[test]
    fn test_session_request_metadata_reconstructs_order() {
        let lines = [line("100", 2)];
        let request = build_session_request(
            &lines,
            &customer(),
            "BR-00000001-AAAA",
            Decimal::from(200),
            Decimal::from(99),
            Decimal::from(299),
            "https://bruma.mx",
            "mxn",
        )
        .unwrap();

        let meta: std::collections::HashMap<_, _> = request
            .metadata
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();

        assert_eq!(meta.get("order_number").copied(), Some("BR-00000001-AAAA"));
        assert_eq!(meta.get("total").copied(), Some("299"));

        let items: Vec<CartLine> =
            serde_json::from_str(meta.get("items_data").unwrap()).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items.first().unwrap().quantity, 2);
    }
}
