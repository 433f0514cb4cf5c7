use async_trait::async_trait;
use sqlx::Row;
use uuid::Uuid;

use crate::{
    adapters::persistence::PostgresPersistence,
    app_error::{AppError, AppResult},
    application::use_cases::{payment_intent::ProviderRepo, wallet::WalletRepo},
    domain::entities::provider::ProviderProfile,
};

#[async_trait]
impl ProviderRepo for PostgresPersistence {
    async fn get(&self, id: Uuid) -> AppResult<Option<ProviderProfile>> {
        let row = sqlx::query(
            r#"
            SELECT id, name, logo_url, voucher_discount_percent, is_active
            FROM providers WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(self.pool())
        .await
        .map_err(AppError::from)?;
        Ok(row.map(|row| ProviderProfile {
            id: row.get("id"),
            name: row.get("name"),
            logo_url: row.get("logo_url"),
            voucher_discount_percent: row.get("voucher_discount_percent"),
            is_active: row.get("is_active"),
        }))
    }
}

#[async_trait]
impl WalletRepo for PostgresPersistence {
    async fn balance(&self, user_id: Uuid) -> AppResult<Option<i64>> {
        let balance: Option<i64> =
            sqlx::query_scalar("SELECT wallet_balance_cents FROM customers WHERE id = $1")
                .bind(user_id)
                .fetch_optional(self.pool())
                .await
                .map_err(AppError::from)?;
        Ok(balance)
    }

    // Single-statement conditional debit; the WHERE clause is the whole
    // overdraw protection, no read-modify-write involved.
    async fn debit(&self, user_id: Uuid, amount_cents: i64) -> AppResult<Option<i64>> {
        let balance: Option<i64> = sqlx::query_scalar(
            r#"
            UPDATE customers
            SET wallet_balance_cents = wallet_balance_cents - $2
            WHERE id = $1 AND wallet_balance_cents >= $2
            RETURNING wallet_balance_cents
            "#,
        )
        .bind(user_id)
        .bind(amount_cents)
        .fetch_optional(self.pool())
        .await
        .map_err(AppError::from)?;
        Ok(balance)
    }

    async fn credit(&self, user_id: Uuid, amount_cents: i64) -> AppResult<Option<i64>> {
        let balance: Option<i64> = sqlx::query_scalar(
            r#"
            UPDATE customers
            SET wallet_balance_cents = wallet_balance_cents + $2
            WHERE id = $1
            RETURNING wallet_balance_cents
            "#,
        )
        .bind(user_id)
        .bind(amount_cents)
        .fetch_optional(self.pool())
        .await
        .map_err(AppError::from)?;
        Ok(balance)
    }
}
