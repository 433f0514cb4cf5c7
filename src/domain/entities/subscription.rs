use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};
use uuid::Uuid;

use crate::domain::entities::gateway::Gateway;

/// Recurring-charge agreement state.
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
#[sqlx(type_name = "subscription_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum SubscriptionStatus {
    Active,
    /// Dunning exhausted; no further auto-billing until reactivated.
    PastDue,
    Canceled,
}

impl SubscriptionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionStatus::Active => "active",
            SubscriptionStatus::PastDue => "past_due",
            SubscriptionStatus::Canceled => "canceled",
        }
    }

    pub fn is_billable(&self) -> bool {
        matches!(self, SubscriptionStatus::Active)
    }
}

/// A deferred plan change queued on the subscription. Downgrades are
/// recorded here and applied only inside the cycle-advance transition,
/// never mid-cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingPlanChange {
    pub plan_id: Uuid,
    pub amount_cents: i64,
}

impl PendingPlanChange {
    /// Reassemble from the two nullable storage columns.
    pub fn from_columns(plan_id: Option<Uuid>, amount_cents: Option<i64>) -> Option<Self> {
        match (plan_id, amount_cents) {
            (Some(plan_id), Some(amount_cents)) => Some(Self {
                plan_id,
                amount_cents,
            }),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Subscription {
    pub id: Uuid,
    pub user_id: Uuid,
    pub plan_id: Uuid,
    pub gateway: Gateway,
    pub amount_cents: i64,
    pub currency: String,
    /// Stored card token; subscriptions are card-only. Never rendered in
    /// API responses.
    #[serde(skip_serializing)]
    pub card_token: String,
    pub card_last4: Option<String>,
    /// Monotonic billing cycle counter, starts at 1.
    pub current_cycle: i32,
    pub next_billing_at: DateTime<Utc>,
    pub retry_count: i32,
    pub pending_change: Option<PendingPlanChange>,
    pub status: SubscriptionStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Subscription {
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.status.is_billable() && self.next_billing_at <= now
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "invoice_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum InvoiceStatus {
    Paid,
    Failed,
}

/// One record per billing cycle attempt. Unique on
/// (subscription_id, billing_cycle) — the idempotency guard that prevents
/// double-charging a cycle.
#[derive(Debug, Clone, Serialize)]
pub struct SubscriptionInvoice {
    pub id: Uuid,
    pub subscription_id: Uuid,
    pub payment_intent_id: Uuid,
    pub billing_cycle: i32,
    pub amount_cents: i64,
    pub status: InvoiceStatus,
    pub billed_at: DateTime<Utc>,
}
