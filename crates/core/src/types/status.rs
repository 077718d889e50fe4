//! Status enums for orders, payments, and user roles.
//!
//! Stored as their SCREAMING_SNAKE_CASE wire form in both JSON and the
//! database (TEXT columns); repositories parse them back via [`FromStr`].
//!
//! [`FromStr`]: std::str::FromStr

use serde::{Deserialize, Serialize};

/// Order fulfillment status.
///
/// Four values, no transition graph: an operator may move an order from any
/// status to any other, including backward (e.g. ENTREGADO back to
/// PROCESANDO for a re-delivery). That flexibility is intentional.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    /// Payment pending or order being prepared.
    #[default]
    Procesando,
    /// Handed to the carrier.
    Enviado,
    /// Delivered to the customer.
    Entregado,
    /// Cancelled (manually or by payment-session expiry).
    Cancelado,
}

impl OrderStatus {
    /// All valid statuses, in lifecycle order.
    pub const ALL: [Self; 4] = [
        Self::Procesando,
        Self::Enviado,
        Self::Entregado,
        Self::Cancelado,
    ];

    /// The canonical wire form (e.g. `"PROCESANDO"`).
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Procesando => "PROCESANDO",
            Self::Enviado => "ENVIADO",
            Self::Entregado => "ENTREGADO",
            Self::Cancelado => "CANCELADO",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PROCESANDO" => Ok(Self::Procesando),
            "ENVIADO" => Ok(Self::Enviado),
            "ENTREGADO" => Ok(Self::Entregado),
            "CANCELADO" => Ok(Self::Cancelado),
            _ => Err(format!("invalid order status: {s}")),
        }
    }
}

/// Payment status as reported by the payment processor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    /// Checkout session created, payment not yet confirmed.
    #[default]
    Pending,
    /// Payment confirmed by the processor.
    Paid,
    /// Payment session expired or failed.
    Failed,
}

impl PaymentStatus {
    /// The canonical wire form (e.g. `"PAID"`).
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Paid => "PAID",
            Self::Failed => "FAILED",
        }
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for PaymentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(Self::Pending),
            "PAID" => Ok(Self::Paid),
            "FAILED" => Ok(Self::Failed),
            _ => Err(format!("invalid payment status: {s}")),
        }
    }
}

/// User role with different permission levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UserRole {
    /// Regular shopper.
    #[default]
    Customer,
    /// Full access to order management.
    Admin,
}

impl UserRole {
    /// The canonical wire form (e.g. `"ADMIN"`).
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Customer => "CUSTOMER",
            Self::Admin => "ADMIN",
        }
    }
}

impl std::fmt::Display for UserRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for UserRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CUSTOMER" => Ok(Self::Customer),
            "ADMIN" => Ok(Self::Admin),
            _ => Err(format!("invalid user role: {s}")),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_order_status_accepts_exactly_four_values() {
        for status in OrderStatus::ALL {
            assert_eq!(status.as_str().parse::<OrderStatus>().unwrap(), status);
        }
        assert!("ENVIADA".parse::<OrderStatus>().is_err());
        assert!("procesando".parse::<OrderStatus>().is_err());
        assert!("".parse::<OrderStatus>().is_err());
    }

    #[test]
    fn test_order_status_serde_screaming() {
        let json = serde_json::to_string(&OrderStatus::Enviado).unwrap();
        assert_eq!(json, "\"ENVIADO\"");

        let parsed: OrderStatus = serde_json::from_str("\"CANCELADO\"").unwrap();
        assert_eq!(parsed, OrderStatus::Cancelado);
    }

    #[test]
    fn test_payment_status_roundtrip() {
        for status in [
            PaymentStatus::Pending,
            PaymentStatus::Paid,
            PaymentStatus::Failed,
        ] {
            assert_eq!(status.as_str().parse::<PaymentStatus>().unwrap(), status);
        }
        assert!("REFUNDED".parse::<PaymentStatus>().is_err());
    }

    #[test]
    fn test_user_role_roundtrip() {
        assert_eq!("ADMIN".parse::<UserRole>().unwrap(), UserRole::Admin);
        assert_eq!("CUSTOMER".parse::<UserRole>().unwrap(), UserRole::Customer);
        assert!("SUPERADMIN".parse::<UserRole>().is_err());
    }

    #[test]
    fn test_defaults_match_creation_state() {
        assert_eq!(OrderStatus::default(), OrderStatus::Procesando);
        assert_eq!(PaymentStatus::default(), PaymentStatus::Pending);
    }
}
