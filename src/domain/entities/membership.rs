use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};
use uuid::Uuid;

use crate::domain::entities::gateway::Gateway;

/// Billing cadence of a membership purchase.
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
#[sqlx(type_name = "membership_cycle", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum MembershipCycle {
    Monthly,
    Yearly,
}

impl MembershipCycle {
    /// Day-length of the cycle, stored on the payment record so a later
    /// plan edit cannot change what was sold.
    pub fn days(&self) -> i64 {
        match self {
            MembershipCycle::Monthly => 30,
            MembershipCycle::Yearly => 365,
        }
    }
}

/// A purchasable membership plan. Serves both direct membership
/// purchases and subscription plan changes.
#[derive(Debug, Clone, Serialize)]
pub struct MembershipPlan {
    pub id: Uuid,
    pub name: String,
    pub image_url: String,
    pub monthly_price_cents: i64,
    pub yearly_price_cents: i64,
    pub is_active: bool,
}

impl MembershipPlan {
    pub fn price_for(&self, cycle: MembershipCycle) -> i64 {
        match cycle {
            MembershipCycle::Monthly => self.monthly_price_cents,
            MembershipCycle::Yearly => self.yearly_price_cents,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "membership_payment_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum MembershipPaymentStatus {
    Pending,
    Paid,
    Failed,
}

/// Billing record for one membership purchase/renewal cycle. Created by
/// the purchase-initiation flow, marked paid by the finalizer.
#[derive(Debug, Clone, Serialize)]
pub struct MembershipPayment {
    pub id: Uuid,
    pub user_id: Uuid,
    pub plan_id: Uuid,
    pub gateway: Gateway,
    pub amount_cents: i64,
    pub cycle: MembershipCycle,
    pub cycle_days: i64,
    pub status: MembershipPaymentStatus,
    pub paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Current membership state for a user. At most one row per user;
/// extension always operates on `end_date` and never creates overlapping
/// periods.
#[derive(Debug, Clone, Serialize)]
pub struct UserMembership {
    pub id: Uuid,
    pub user_id: Uuid,
    pub plan_id: Uuid,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserMembership {
    pub fn is_currently_valid(&self, now: DateTime<Utc>) -> bool {
        self.is_active && self.start_date <= now && now <= self.end_date
    }
}
