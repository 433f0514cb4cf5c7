use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};
use uuid::Uuid;

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
#[sqlx(type_name = "voucher_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum VoucherStatus {
    Unused,
    Redeemed,
    Expired,
}

impl VoucherStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            VoucherStatus::Unused => "unused",
            VoucherStatus::Redeemed => "redeemed",
            VoucherStatus::Expired => "expired",
        }
    }
}

/// A redeemable value certificate owned by a customer. Carries at most
/// one live one-time redemption code; re-issuing overwrites the previous
/// code.
#[derive(Debug, Clone, Serialize)]
pub struct Voucher {
    pub id: Uuid,
    pub provider_id: Uuid,
    pub owner_user_id: Uuid,
    pub name: String,
    /// Denormalized for rendering without a provider lookup.
    pub provider_name: String,
    pub logo_url: String,
    pub currency: String,
    pub face_value_cents: i64,
    pub price_cents: i64,
    pub status: VoucherStatus,
    pub valid_until: Option<DateTime<Utc>>,
    pub code: Option<String>,
    pub code_issued_at: Option<DateTime<Utc>>,
    pub code_expires_at: Option<DateTime<Utc>>,
    pub redeemed_at: Option<DateTime<Utc>>,
    pub purchased_at: DateTime<Utc>,
}

impl Voucher {
    /// Percentage saved relative to face value.
    pub fn discount_percent(&self) -> i32 {
        if self.face_value_cents <= 0 || self.price_cents <= 0 {
            return 0;
        }
        let saved = (self.face_value_cents - self.price_cents) as f64;
        ((saved / self.face_value_cents as f64) * 100.0).round() as i32
    }

    pub fn has_live_code(&self, now: DateTime<Utc>) -> bool {
        self.code.is_some() && self.code_expires_at.is_some_and(|at| at > now)
    }
}
