use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};
use uuid::Uuid;

use crate::domain::entities::gateway::Gateway;
use crate::domain::entities::payment_intent::Actor;

/// Pickup window before a pending order is swept to `Ignored`.
pub const ORDER_EXPIRY_MINUTES: i64 = 5;

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
#[sqlx(type_name = "order_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum OrderStatus {
    Pending,
    Confirmed,
    Completed,
    Cancelled,
    /// Pending order that outlived its pickup window.
    Ignored,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Confirmed => "confirmed",
            OrderStatus::Completed => "completed",
            OrderStatus::Cancelled => "cancelled",
            OrderStatus::Ignored => "ignored",
        }
    }

    /// Statuses a provider may move a pending order into.
    pub fn is_provider_settable(&self) -> bool {
        matches!(
            self,
            OrderStatus::Confirmed | OrderStatus::Completed | OrderStatus::Cancelled
        )
    }
}

/// Line item snapshotted at purchase time. Later product edits do not
/// change what was sold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderItem {
    pub product_id: Uuid,
    pub name: String,
    pub image_url: String,
    pub price_cents: i64,
    pub quantity: i32,
}

impl OrderItem {
    pub fn line_total_cents(&self) -> i64 {
        self.price_cents * self.quantity as i64
    }
}

/// Payment linkage. `payment_intent_id` is unique across orders — a
/// second order can never be created from the same intent.
#[derive(Debug, Clone, Serialize)]
pub struct PaymentLink {
    pub gateway: Gateway,
    pub payment_intent_id: Uuid,
    pub paid_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Order {
    pub id: Uuid,
    pub actor: Actor,
    pub provider_id: Uuid,
    pub items: Vec<OrderItem>,
    pub total_cents: i64,
    pub payment: PaymentLink,
    pub status: OrderStatus,
    pub cancel_reason: Option<String>,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl Order {
    pub fn default_expiry(created_at: DateTime<Utc>) -> DateTime<Utc> {
        created_at + Duration::minutes(ORDER_EXPIRY_MINUTES)
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.status == OrderStatus::Pending && self.expires_at < now
    }
}
