use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    app_error::{AppError, AppResult},
    domain::entities::voucher::{Voucher, VoucherStatus},
};

/// Validity window of a one-time redemption code. Two minutes is long
/// enough for an in-person scan and short enough that a screenshotted
/// code is worthless.
pub const QR_CODE_TTL_SECS: i64 = 120;

// ============================================================================
// Repository Trait
// ============================================================================

#[derive(Debug, Clone)]
pub struct NewOwnedVoucher {
    pub provider_id: Uuid,
    pub owner_user_id: Uuid,
    pub name: String,
    pub provider_name: String,
    pub logo_url: String,
    pub currency: String,
    pub face_value_cents: i64,
    pub price_cents: i64,
    pub valid_until: Option<DateTime<Utc>>,
}

#[async_trait]
pub trait VoucherRepo: Send + Sync {
    async fn create_owned(&self, input: &NewOwnedVoucher) -> AppResult<Voucher>;
    async fn get(&self, id: Uuid) -> AppResult<Option<Voucher>>;
    async fn find_by_code(&self, code: &str) -> AppResult<Option<Voucher>>;
    /// Overwrite the voucher's one-time code. At most one live code per
    /// voucher.
    async fn set_code(
        &self,
        id: Uuid,
        code: &str,
        issued_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> AppResult<()>;
    /// THE redemption primitive: a single conditional update
    /// (`WHERE code = $1 AND status = 'unused' AND code_expires_at > now`)
    /// returning the redeemed voucher, or `None` when no row matched.
    async fn redeem_code(&self, code: &str, now: DateTime<Utc>) -> AppResult<Option<Voucher>>;
    async fn list_by_owner(&self, owner_user_id: Uuid) -> AppResult<Vec<Voucher>>;
}

// ============================================================================
// Use Cases
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssuedCode {
    pub code: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct VoucherQrUseCases {
    vouchers: Arc<dyn VoucherRepo>,
}

impl VoucherQrUseCases {
    pub fn new(vouchers: Arc<dyn VoucherRepo>) -> Self {
        Self { vouchers }
    }

    pub async fn vouchers_for_owner(&self, owner_user_id: Uuid) -> AppResult<Vec<Voucher>> {
        self.vouchers.list_by_owner(owner_user_id).await
    }

    /// Issue a short-lived redemption code. Allowed only while the
    /// voucher is unused and inside its validity window; re-issuing
    /// replaces any prior unconsumed code.
    pub async fn issue_code(&self, voucher_id: Uuid, now: DateTime<Utc>) -> AppResult<IssuedCode> {
        let voucher = self
            .vouchers
            .get(voucher_id)
            .await?
            .ok_or(AppError::NotFound)?;

        match voucher.status {
            VoucherStatus::Unused => {}
            VoucherStatus::Redeemed => return Err(AppError::AlreadyRedeemed),
            VoucherStatus::Expired => {
                return Err(AppError::Conflict("voucher expired".into()));
            }
        }
        if let Some(valid_until) = voucher.valid_until {
            if now > valid_until {
                return Err(AppError::Conflict("voucher expired".into()));
            }
        }

        let code = generate_code();
        let expires_at = now + Duration::seconds(QR_CODE_TTL_SECS);
        self.vouchers
            .set_code(voucher.id, &code, now, expires_at)
            .await?;

        tracing::info!(voucher_id = %voucher.id, expires_at = %expires_at, "Redemption code issued");
        Ok(IssuedCode { code, expires_at })
    }

    /// Redeem a scanned code. The atomic conditional update is what keeps
    /// two near-simultaneous scans from both succeeding; on a miss, a
    /// follow-up read distinguishes the three failure causes.
    pub async fn redeem(&self, code: &str, now: DateTime<Utc>) -> AppResult<Voucher> {
        let code = code.trim().to_uppercase();
        if code.is_empty() {
            return Err(AppError::Validation("missing code".into()));
        }

        if let Some(voucher) = self.vouchers.redeem_code(&code, now).await? {
            tracing::info!(voucher_id = %voucher.id, "Voucher redeemed");
            return Ok(voucher);
        }

        match self.vouchers.find_by_code(&code).await? {
            None => Err(AppError::NotFound),
            Some(voucher) if voucher.status == VoucherStatus::Redeemed => {
                Err(AppError::AlreadyRedeemed)
            }
            Some(voucher) if voucher.code_expires_at.is_some_and(|at| at <= now) => {
                Err(AppError::CodeExpired)
            }
            Some(_) => Err(AppError::Conflict("code cannot be redeemed".into())),
        }
    }
}

/// 8 uppercase hex characters, same shape the scanning apps already
/// render.
fn generate_code() -> String {
    let mut bytes = [0u8; 4];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes).to_uppercase()
}
