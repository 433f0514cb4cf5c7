use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

/// External payment gateways a charge can be routed through.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    sqlx::Type,
    AsRefStr,
    Display,
    EnumString,
)]
#[sqlx(type_name = "payment_gateway", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum Gateway {
    Tap,
    Tabby,
    Tamara,
}

impl Gateway {
    pub const ALL: [Gateway; 3] = [Gateway::Tap, Gateway::Tabby, Gateway::Tamara];

    pub fn as_str(&self) -> &'static str {
        match self {
            Gateway::Tap => "tap",
            Gateway::Tabby => "tabby",
            Gateway::Tamara => "tamara",
        }
    }

    /// BNPL gateways cannot charge a stored card token, which rules them
    /// out for recurring subscription billing.
    pub fn supports_token_charges(&self) -> bool {
        matches!(self, Gateway::Tap)
    }
}

/// Whether an adapter talks to the real gateway or settles locally.
/// A gateway with no configured credentials runs in mock mode and
/// synthesizes an immediate confirmation through the same claim path a
/// real webhook would take.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMode {
    Live,
    Mock,
}

impl PaymentMode {
    pub fn is_mock(&self) -> bool {
        matches!(self, PaymentMode::Mock)
    }
}

/// Outcome reported by a gateway notification, after the adapter has
/// mapped the gateway-specific payload into the uniform shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationOutcome {
    Success,
    Failure,
}
