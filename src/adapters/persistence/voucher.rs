use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::Row;
use uuid::Uuid;

use crate::{
    adapters::persistence::PostgresPersistence,
    app_error::{AppError, AppResult},
    application::use_cases::voucher_qr::{NewOwnedVoucher, VoucherRepo},
    domain::entities::voucher::Voucher,
};

const SELECT_COLS: &str = r#"
    id, provider_id, owner_user_id, name, provider_name, logo_url, currency,
    face_value_cents, price_cents, status, valid_until,
    code, code_issued_at, code_expires_at, redeemed_at, purchased_at
"#;

fn row_to_voucher(row: &sqlx::postgres::PgRow) -> Voucher {
    Voucher {
        id: row.get("id"),
        provider_id: row.get("provider_id"),
        owner_user_id: row.get("owner_user_id"),
        name: row.get("name"),
        provider_name: row.get("provider_name"),
        logo_url: row.get("logo_url"),
        currency: row.get("currency"),
        face_value_cents: row.get("face_value_cents"),
        price_cents: row.get("price_cents"),
        status: row.get("status"),
        valid_until: row.get("valid_until"),
        code: row.get("code"),
        code_issued_at: row.get("code_issued_at"),
        code_expires_at: row.get("code_expires_at"),
        redeemed_at: row.get("redeemed_at"),
        purchased_at: row.get("purchased_at"),
    }
}

#[async_trait]
impl VoucherRepo for PostgresPersistence {
    async fn create_owned(&self, input: &NewOwnedVoucher) -> AppResult<Voucher> {
        let id = Uuid::new_v4();
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO vouchers
                (id, provider_id, owner_user_id, name, provider_name, logo_url, currency,
                 face_value_cents, price_cents, status, valid_until, purchased_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, 'unused', $10, CURRENT_TIMESTAMP)
            RETURNING {}
            "#,
            SELECT_COLS
        ))
        .bind(id)
        .bind(input.provider_id)
        .bind(input.owner_user_id)
        .bind(&input.name)
        .bind(&input.provider_name)
        .bind(&input.logo_url)
        .bind(&input.currency)
        .bind(input.face_value_cents)
        .bind(input.price_cents)
        .bind(input.valid_until)
        .fetch_one(self.pool())
        .await
        .map_err(AppError::from)?;
        Ok(row_to_voucher(&row))
    }

    async fn get(&self, id: Uuid) -> AppResult<Option<Voucher>> {
        let row = sqlx::query(&format!("SELECT {} FROM vouchers WHERE id = $1", SELECT_COLS))
            .bind(id)
            .fetch_optional(self.pool())
            .await
            .map_err(AppError::from)?;
        Ok(row.as_ref().map(row_to_voucher))
    }

    async fn find_by_code(&self, code: &str) -> AppResult<Option<Voucher>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM vouchers WHERE code = $1",
            SELECT_COLS
        ))
        .bind(code)
        .fetch_optional(self.pool())
        .await
        .map_err(AppError::from)?;
        Ok(row.as_ref().map(row_to_voucher))
    }

    async fn set_code(
        &self,
        id: Uuid,
        code: &str,
        issued_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> AppResult<()> {
        sqlx::query(
            r#"
            UPDATE vouchers
            SET code = $2, code_issued_at = $3, code_expires_at = $4
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(code)
        .bind(issued_at)
        .bind(expires_at)
        .execute(self.pool())
        .await
        .map_err(AppError::from)?;
        Ok(())
    }

    // One conditional update; two near-simultaneous scans of the same
    // code can never both match the unused row.
    async fn redeem_code(&self, code: &str, now: DateTime<Utc>) -> AppResult<Option<Voucher>> {
        let row = sqlx::query(&format!(
            r#"
            UPDATE vouchers
            SET status = 'redeemed', redeemed_at = $2
            WHERE code = $1 AND status = 'unused' AND code_expires_at > $2
            RETURNING {}
            "#,
            SELECT_COLS
        ))
        .bind(code)
        .bind(now)
        .fetch_optional(self.pool())
        .await
        .map_err(AppError::from)?;
        Ok(row.as_ref().map(row_to_voucher))
    }

    async fn list_by_owner(&self, owner_user_id: Uuid) -> AppResult<Vec<Voucher>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM vouchers WHERE owner_user_id = $1 ORDER BY purchased_at DESC",
            SELECT_COLS
        ))
        .bind(owner_user_id)
        .fetch_all(self.pool())
        .await
        .map_err(AppError::from)?;
        Ok(rows.iter().map(row_to_voucher).collect())
    }
}
