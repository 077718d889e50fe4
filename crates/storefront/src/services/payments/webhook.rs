//! Webhook signature verification and event interpretation.
//!
//! The processor signs each delivery with an HMAC-SHA256 over
//! `"{timestamp}.{raw body}"` and sends it as `t=<ts>,v1=<hex>` in the
//! signature header. Verification must succeed before the payload is
//! parsed or any state is touched. Timestamps older than the tolerance
//! window are rejected to stop replays of captured deliveries.

use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Maximum accepted age of a webhook delivery, in seconds.
pub const SIGNATURE_TOLERANCE_SECS: i64 = 300;

/// Signature verification failures.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SignatureError {
    /// The signature header is missing or has no recognizable fields.
    #[error("malformed signature header")]
    Malformed,
    /// The header has no `t=` timestamp field.
    #[error("signature header missing timestamp")]
    MissingTimestamp,
    /// The header has no `v1=` signature field.
    #[error("signature header missing signature")]
    MissingSignature,
    /// The timestamp is outside the tolerance window.
    #[error("signature timestamp outside tolerance window")]
    StaleTimestamp,
    /// No candidate signature matched the payload.
    #[error("signature does not match payload")]
    NoMatch,
}

/// Verify a `t=<ts>,v1=<hex>` signature header against the raw payload.
///
/// Accepts the delivery if any `v1` candidate matches (the processor sends
/// several during secret rotation). Comparison is constant-time via the
/// HMAC verify primitive.
///
/// # Errors
///
/// Returns a [`SignatureError`] describing the first check that failed;
/// none of the variants reveal to the caller's client which one it was.
pub fn verify_signature(
    payload: &[u8],
    signature_header: &str,
    secret: &str,
    now_unix: i64,
) -> Result<(), SignatureError> {
    let mut timestamp: Option<i64> = None;
    let mut candidates: Vec<&str> = Vec::new();

    for part in signature_header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", value)) => {
                timestamp = value.parse().ok();
            }
            Some(("v1", value)) => candidates.push(value),
            _ => {}
        }
    }

    if timestamp.is_none() && candidates.is_empty() {
        return Err(SignatureError::Malformed);
    }
    let timestamp = timestamp.ok_or(SignatureError::MissingTimestamp)?;
    if candidates.is_empty() {
        return Err(SignatureError::MissingSignature);
    }

    if (now_unix - timestamp).abs() > SIGNATURE_TOLERANCE_SECS {
        return Err(SignatureError::StaleTimestamp);
    }

    for candidate in candidates {
        let Ok(expected) = hex::decode(candidate) else {
            continue;
        };

        let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
            .map_err(|_| SignatureError::NoMatch)?;
        mac.update(timestamp.to_string().as_bytes());
        mac.update(b".");
        mac.update(payload);

        if mac.verify_slice(&expected).is_ok() {
            return Ok(());
        }
    }

    Err(SignatureError::NoMatch)
}

// =============================================================================
// Event Types
// =============================================================================

/// A raw webhook event envelope.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEvent {
    /// Event type string, e.g. `checkout.session.completed`.
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: WebhookEventData,
}

/// The `data` field of a webhook event.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEventData {
    pub object: SessionObject,
}

/// The checkout-session object embedded in an event.
#[derive(Debug, Clone, Deserialize)]
pub struct SessionObject {
    /// The session reference stored on the order at checkout.
    pub id: String,
}

/// The handler-facing interpretation of a webhook event.
///
/// Re-delivery is safe: interpreting the same event twice yields the same
/// variant, and the state it maps to is absorbing for repeated
/// application. No ordering is assumed between `SessionCompleted` and
/// `SessionExpired` for one session; the last event processed wins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentEvent {
    /// The customer paid; the order becomes PROCESANDO / PAID.
    SessionCompleted { session_id: String },
    /// The session lapsed unpaid; the order becomes CANCELADO / FAILED.
    SessionExpired { session_id: String },
    /// An event type this service does not act on; acknowledged as a no-op.
    Ignored { event_type: String },
}

impl From<&WebhookEvent> for PaymentEvent {
    fn from(event: &WebhookEvent) -> Self {
        match event.event_type.as_str() {
            "checkout.session.completed" => Self::SessionCompleted {
                session_id: event.data.object.id.clone(),
            },
            "checkout.session.expired" => Self::SessionExpired {
                session_id: event.data.object.id.clone(),
            },
            other => Self::Ignored {
                event_type: other.to_owned(),
            },
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const SECRET: &str = "whsec_test123secret456";

    fn sign(payload: &[u8], secret: &str, timestamp: i64) -> String {
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(format!("{timestamp}.").as_bytes());
        mac.update(payload);
        hex::encode(mac.finalize().into_bytes())
    }

    fn header(payload: &[u8], secret: &str, timestamp: i64) -> String {
        format!("t={timestamp},v1={}", sign(payload, secret, timestamp))
    }

    #[test]
    fn test_valid_signature_accepted() {
        let payload = br#"{"type":"checkout.session.completed"}"#;
        let now = 1_700_000_000;

        let result = verify_signature(payload, &header(payload, SECRET, now), SECRET, now);
        assert_eq!(result, Ok(()));
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let payload = br#"{"type":"checkout.session.completed"}"#;
        let now = 1_700_000_000;

        let result = verify_signature(payload, &header(payload, "wrong_secret", now), SECRET, now);
        assert_eq!(result, Err(SignatureError::NoMatch));
    }

    #[test]
    fn test_modified_payload_rejected() {
        let payload = br#"{"type":"checkout.session.completed"}"#;
        let tampered = br#"{"type":"checkout.session.completed","amount":0}"#;
        let now = 1_700_000_000;

        let result = verify_signature(tampered, &header(payload, SECRET, now), SECRET, now);
        assert_eq!(result, Err(SignatureError::NoMatch));
    }

    #[test]
    fn test_stale_timestamp_rejected() {
        let payload = br#"{"type":"checkout.session.completed"}"#;
        let now = 1_700_000_000;
        let old = now - SIGNATURE_TOLERANCE_SECS - 1;

        let result = verify_signature(payload, &header(payload, SECRET, old), SECRET, now);
        assert_eq!(result, Err(SignatureError::StaleTimestamp));
    }

    #[test]
    fn test_timestamp_at_tolerance_boundary_accepted() {
        let payload = br#"{}"#;
        let now = 1_700_000_000;
        let edge = now - SIGNATURE_TOLERANCE_SECS;

        let result = verify_signature(payload, &header(payload, SECRET, edge), SECRET, now);
        assert_eq!(result, Ok(()));
    }

    #[test]
    fn test_missing_timestamp() {
        let result = verify_signature(b"{}", "v1=deadbeef", SECRET, 0);
        assert_eq!(result, Err(SignatureError::MissingTimestamp));
    }

    #[test]
    fn test_missing_signature() {
        let result = verify_signature(b"{}", "t=1700000000", SECRET, 1_700_000_000);
        assert_eq!(result, Err(SignatureError::MissingSignature));
    }

    #[test]
    fn test_garbage_header() {
        let result = verify_signature(b"{}", "garbage", SECRET, 0);
        assert_eq!(result, Err(SignatureError::Malformed));
    }

    #[test]
    fn test_empty_header() {
        let result = verify_signature(b"{}", "", SECRET, 0);
        assert_eq!(result, Err(SignatureError::Malformed));
    }

    #[test]
    fn test_rotation_second_candidate_accepted() {
        let payload = br#"{}"#;
        let now = 1_700_000_000;
        let good = sign(payload, SECRET, now);
        let stale_secret = sign(payload, "old_secret", now);
        let header = format!("t={now},v1={stale_secret},v1={good}");

        assert_eq!(verify_signature(payload, &header, SECRET, now), Ok(()));
    }

    #[test]
    fn test_completed_event_interpretation() {
        let event: WebhookEvent = serde_json::from_str(
            r#"{"type":"checkout.session.completed","data":{"object":{"id":"cs_test_123"}}}"#,
        )
        .unwrap();

        assert_eq!(
            PaymentEvent::from(&event),
            PaymentEvent::SessionCompleted {
                session_id: "cs_test_123".to_owned()
            }
        );
    }

    #[test]
    fn test_expired_event_interpretation() {
        let event: WebhookEvent = serde_json::from_str(
            r#"{"type":"checkout.session.expired","data":{"object":{"id":"cs_test_456"}}}"#,
        )
        .unwrap();

        assert_eq!(
            PaymentEvent::from(&event),
            PaymentEvent::SessionExpired {
                session_id: "cs_test_456".to_owned()
            }
        );
    }

    #[test]
    fn test_unhandled_event_is_ignored() {
        let event: WebhookEvent = serde_json::from_str(
            r#"{"type":"payment_intent.succeeded","data":{"object":{"id":"pi_1"}}}"#,
        )
        .unwrap();

        assert_eq!(
            PaymentEvent::from(&event),
            PaymentEvent::Ignored {
                event_type: "payment_intent.succeeded".to_owned()
            }
        );
    }

    #[test]
    fn test_interpretation_is_idempotent() {
        // Interpreting the same delivery twice maps to the same transition.
        let event: WebhookEvent = serde_json::from_str(
            r#"{"type":"checkout.session.completed","data":{"object":{"id":"cs_dup"}}}"#,
        )
        .unwrap();

        assert_eq!(PaymentEvent::from(&event), PaymentEvent::from(&event));
    }
}
