//! Payment processor client (Stripe).
//!
//! Two concerns live here: creating hosted Checkout Sessions at checkout
//! time, and verifying + interpreting the signed webhook events the
//! processor sends back. Only the session id and redirect URL of the
//! processor's response are interesting to us; everything else stays on
//! their side.

pub mod webhook;

pub use webhook::{PaymentEvent, SignatureError, WebhookEvent};

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use crate::config::StripeConfig;

/// Errors from the payment processor integration.
#[derive(Debug, thiserror::Error)]
pub enum PaymentsError {
    /// Transport-level failure talking to the processor.
    #[error("payment API request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The processor rejected the request.
    #[error("payment API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// Webhook signature did not verify.
    #[error("webhook signature error: {0}")]
    Signature(#[from] SignatureError),

    /// Webhook payload was not valid JSON of the expected shape.
    #[error("invalid webhook payload: {0}")]
    InvalidPayload(#[from] serde_json::Error),
}

/// A line item for a hosted checkout session, in minor currency units.
#[derive(Debug, Clone)]
pub struct SessionLineItem {
    pub name: String,
    pub description: String,
    /// Unit amount in centavos.
    pub unit_amount: i64,
    pub quantity: i64,
}

/// Request to create a hosted checkout session.
#[derive(Debug, Clone)]
pub struct CheckoutSessionRequest {
    /// ISO 4217 currency code for every line item.
    pub currency: String,
    pub line_items: Vec<SessionLineItem>,
    pub success_url: String,
    pub cancel_url: String,
    pub customer_email: String,
    /// Metadata bundle sufficient to reconstruct the order if the local
    /// write is lost (order number, customer identity, serialized cart).
    pub metadata: Vec<(String, String)>,
}

/// A created checkout session.
#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutSession {
    /// Opaque session reference, stored on the order for reconciliation.
    pub id: String,
    /// Hosted payment page the customer is redirected to.
    pub url: String,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: Option<ApiErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: Option<String>,
}

/// Client for the Stripe REST API.
pub struct PaymentsClient {
    http: reqwest::Client,
    api_base: String,
    secret_key: SecretString,
    webhook_secret: SecretString,
}

impl PaymentsClient {
    /// Create a new payments client from configuration.
    #[must_use]
    pub fn new(config: &StripeConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_base: config.api_base.clone(),
            secret_key: config.secret_key.clone(),
            webhook_secret: config.webhook_secret.clone(),
        }
    }

    /// Create a hosted checkout session.
    ///
    /// # Errors
    ///
    /// Returns `PaymentsError::Http` on transport failure and
    /// `PaymentsError::Api` when the processor rejects the request. No
    /// retry is attempted; a failed call fails the checkout.
    pub async fn create_checkout_session(
        &self,
        request: &CheckoutSessionRequest,
    ) -> Result<CheckoutSession, PaymentsError> {
        let params = build_session_form(request);

        let response = self
            .http
            .post(format!("{}/v1/checkout/sessions", self.api_base))
            .bearer_auth(self.secret_key.expose_secret())
            .form(&params)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .json::<ApiErrorBody>()
                .await
                .ok()
                .and_then(|body| body.error)
                .and_then(|detail| detail.message)
                .unwrap_or_else(|| "unknown error".to_owned());

            return Err(PaymentsError::Api {
                status: status.as_u16(),
                message,
            });
        }

        Ok(response.json::<CheckoutSession>().await?)
    }

    /// Verify a webhook's signature header and parse its payload.
    ///
    /// Verification happens strictly before the payload is interpreted;
    /// a bad signature never yields an event.
    ///
    /// # Errors
    ///
    /// Returns `PaymentsError::Signature` on a missing, malformed, stale,
    /// or non-matching signature, and `PaymentsError::InvalidPayload` if
    /// the verified body is not a webhook event.
    pub fn verify_webhook(
        &self,
        payload: &[u8],
        signature_header: &str,
    ) -> Result<WebhookEvent, PaymentsError> {
        webhook::verify_signature(
            payload,
            signature_header,
            self.webhook_secret.expose_secret(),
            chrono::Utc::now().timestamp(),
        )?;

        Ok(serde_json::from_slice(payload)?)
    }
}

/// Build the form-encoded parameter list for a checkout session.
///
/// Stripe's form encoding uses bracketed indices for nested fields
/// (`line_items[0][price_data][currency]=mxn`).
fn build_session_form(request: &CheckoutSessionRequest) -> Vec<(String, String)> {
    let mut params = vec![
        ("mode".to_owned(), "payment".to_owned()),
        (
            "payment_method_types[0]".to_owned(),
            "card".to_owned(),
        ),
        ("success_url".to_owned(), request.success_url.clone()),
        ("cancel_url".to_owned(), request.cancel_url.clone()),
        (
            "customer_email".to_owned(),
            request.customer_email.clone(),
        ),
    ];

    for (i, item) in request.line_items.iter().enumerate() {
        params.push((
            format!("line_items[{i}][price_data][currency]"),
            request.currency.clone(),
        ));
        params.push((
            format!("line_items[{i}][price_data][product_data][name]"),
            item.name.clone(),
        ));
        params.push((
            format!("line_items[{i}][price_data][product_data][description]"),
            item.description.clone(),
        ));
        params.push((
            format!("line_items[{i}][price_data][unit_amount]"),
            item.unit_amount.to_string(),
        ));
        params.push((format!("line_items[{i}][quantity]"), item.quantity.to_string()));
    }

    for (key, value) in &request.metadata {
        params.push((format!("metadata[{key}]"), value.clone()));
    }

    params
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn sample_request() -> CheckoutSessionRequest {
        CheckoutSessionRequest {
            currency: "mxn".to_owned(),
            line_items: vec![
                SessionLineItem {
                    name: "Bruma Nocturna".to_owned(),
                    description: "100ml".to_owned(),
                    unit_amount: 10000,
                    quantity: 2,
                },
                SessionLineItem {
                    name: "Envío estándar".to_owned(),
                    description: "Entrega en 3-7 días hábiles".to_owned(),
                    unit_amount: 9900,
                    quantity: 1,
                },
            ],
            success_url: "https://bruma.mx/checkout/success?order=BR-1".to_owned(),
            cancel_url: "https://bruma.mx/checkout?cancelled=true".to_owned(),
            customer_email: "buyer@example.com".to_owned(),
            metadata: vec![("order_number".to_owned(), "BR-1".to_owned())],
        }
    }

    fn lookup<'a>(params: &'a [(String, String)], key: &str) -> Option<&'a str> {
        params
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    #[test]
    fn test_form_has_session_basics() {
        let params = build_session_form(&sample_request());

        assert_eq!(lookup(&params, "mode"), Some("payment"));
        assert_eq!(lookup(&params, "payment_method_types[0]"), Some("card"));
        assert_eq!(
            lookup(&params, "customer_email"),
            Some("buyer@example.com")
        );
        assert_eq!(
            lookup(&params, "success_url"),
            Some("https://bruma.mx/checkout/success?order=BR-1")
        );
    }

    #[test]
    fn test_form_indexes_line_items() {
        let params = build_session_form(&sample_request());

        assert_eq!(
            lookup(&params, "line_items[0][price_data][product_data][name]"),
            Some("Bruma Nocturna")
        );
        assert_eq!(
            lookup(&params, "line_items[0][price_data][unit_amount]"),
            Some("10000")
        );
        assert_eq!(lookup(&params, "line_items[0][quantity]"), Some("2"));
        assert_eq!(
            lookup(&params, "line_items[1][price_data][product_data][name]"),
            Some("Envío estándar")
        );
        assert_eq!(
            lookup(&params, "line_items[1][price_data][unit_amount]"),
            Some("9900")
        );
    }

    #[test]
    fn test_form_carries_metadata() {
        let params = build_session_form(&sample_request());
        assert_eq!(lookup(&params, "metadata[order_number]"), Some("BR-1"));
    }
}
