use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};
use uuid::Uuid;

use crate::domain::entities::gateway::Gateway;
use crate::domain::entities::subscription::PendingPlanChange;

pub const DEFAULT_CURRENCY: &str = "SAR";

/// Lifecycle of a payment intent. `Pending` is the only non-terminal
/// state; once an intent is `Paid`, `Failed` or `Cancelled` it never
/// transitions again. The pending→paid move happens at most once, through
/// a single conditional update (see `PaymentIntentRepo::claim_paid`).
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
#[sqlx(type_name = "intent_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
#[derive(Default)]
pub enum IntentStatus {
    #[default]
    Pending,
    Paid,
    Failed,
    Cancelled,
}

impl IntentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            IntentStatus::Pending => "pending",
            IntentStatus::Paid => "paid",
            IntentStatus::Failed => "failed",
            IntentStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, IntentStatus::Pending)
    }

    pub fn is_paid(&self) -> bool {
        matches!(self, IntentStatus::Paid)
    }
}

/// What the money is for. Chooses the fulfillment side effect the
/// finalizer produces once the intent is claimed.
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
#[sqlx(type_name = "intent_kind", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum IntentKind {
    /// Cart checkout or voucher purchase at a provider.
    ProviderPurchase,
    /// Membership plan purchase or renewal.
    MembershipPurchase,
    /// Recurring charge driven by the billing scheduler.
    SubscriptionCharge,
    /// Immediate prorated charge for a plan upgrade.
    UpgradeProration,
}

/// The paying party: a registered customer or a guest session.
/// Exactly one of the two, enforced at intent creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Actor {
    User(Uuid),
    Session(String),
}

impl Actor {
    /// Reassemble from the two nullable storage columns. `None` when both
    /// or neither are set.
    pub fn from_columns(user_id: Option<Uuid>, session_id: Option<String>) -> Option<Actor> {
        match (user_id, session_id) {
            (Some(user), None) => Some(Actor::User(user)),
            (None, Some(session)) => Some(Actor::Session(session)),
            _ => None,
        }
    }

    pub fn user_id(&self) -> Option<Uuid> {
        match self {
            Actor::User(id) => Some(*id),
            Actor::Session(_) => None,
        }
    }

    pub fn session_id(&self) -> Option<&str> {
        match self {
            Actor::User(_) => None,
            Actor::Session(id) => Some(id),
        }
    }
}

/// Embedded voucher data, present only on voucher purchases. Snapshotted
/// at intent creation so fulfillment does not depend on the provider
/// record staying unchanged while the charge is in flight.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoucherPayload {
    pub face_value_cents: i64,
    pub discount_percent: i32,
    pub provider_name: String,
    pub logo_url: String,
}

/// One unit of money movement. Created pending by the purchase-initiation
/// flow, then owned by the finalizer until terminal.
#[derive(Debug, Clone, Serialize)]
pub struct PaymentIntent {
    pub id: Uuid,
    pub actor: Actor,
    pub provider_id: Option<Uuid>,
    pub kind: IntentKind,
    pub gateway: Gateway,
    pub amount_cents: i64,
    pub currency: String,
    /// Gateway-assigned charge/order id; null until the charge is created.
    pub external_reference: Option<String>,
    pub voucher_payload: Option<VoucherPayload>,
    pub membership_payment_id: Option<Uuid>,
    pub subscription_id: Option<Uuid>,
    /// Target plan for an `UpgradeProration` intent, applied when the
    /// intent settles.
    pub upgrade_to: Option<PendingPlanChange>,
    pub is_mock: bool,
    pub status: IntentStatus,
    pub paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
