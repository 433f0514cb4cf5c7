use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::Row;
use uuid::Uuid;

use crate::{
    adapters::persistence::PostgresPersistence,
    app_error::{AppError, AppResult},
    application::use_cases::billing::{
        CycleAdvance, NewSubscription, NewSubscriptionInvoice, SubscriptionInvoiceRepo,
        SubscriptionRepo,
    },
    domain::entities::subscription::{
        PendingPlanChange, Subscription, SubscriptionInvoice, SubscriptionStatus,
    },
};

const SELECT_COLS: &str = r#"
    id, user_id, plan_id, gateway, amount_cents, currency, card_token, card_last4,
    current_cycle, next_billing_at, retry_count, pending_plan_id, pending_amount_cents,
    status, created_at, updated_at
"#;

fn row_to_subscription(row: &sqlx::postgres::PgRow) -> Subscription {
    Subscription {
        id: row.get("id"),
        user_id: row.get("user_id"),
        plan_id: row.get("plan_id"),
        gateway: row.get("gateway"),
        amount_cents: row.get("amount_cents"),
        currency: row.get("currency"),
        card_token: row.get("card_token"),
        card_last4: row.get("card_last4"),
        current_cycle: row.get("current_cycle"),
        next_billing_at: row.get("next_billing_at"),
        retry_count: row.get("retry_count"),
        pending_change: PendingPlanChange::from_columns(
            row.get("pending_plan_id"),
            row.get("pending_amount_cents"),
        ),
        status: row.get("status"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

const INVOICE_COLS: &str = r#"
    id, subscription_id, payment_intent_id, billing_cycle, amount_cents, status, billed_at
"#;

fn row_to_invoice(row: &sqlx::postgres::PgRow) -> SubscriptionInvoice {
    SubscriptionInvoice {
        id: row.get("id"),
        subscription_id: row.get("subscription_id"),
        payment_intent_id: row.get("payment_intent_id"),
        billing_cycle: row.get("billing_cycle"),
        amount_cents: row.get("amount_cents"),
        status: row.get("status"),
        billed_at: row.get("billed_at"),
    }
}

#[async_trait]
impl SubscriptionRepo for PostgresPersistence {
    async fn create(&self, input: &NewSubscription) -> AppResult<Subscription> {
        let id = Uuid::new_v4();
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO subscriptions
                (id, user_id, plan_id, gateway, amount_cents, currency, card_token, card_last4,
                 current_cycle, next_billing_at, retry_count, status)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, 1, $9, 0, 'active')
            RETURNING {}
            "#,
            SELECT_COLS
        ))
        .bind(id)
        .bind(input.user_id)
        .bind(input.plan_id)
        .bind(input.gateway)
        .bind(input.amount_cents)
        .bind(&input.currency)
        .bind(&input.card_token)
        .bind(&input.card_last4)
        .bind(input.next_billing_at)
        .fetch_one(self.pool())
        .await
        .map_err(AppError::from)?;
        Ok(row_to_subscription(&row))
    }

    async fn get(&self, id: Uuid) -> AppResult<Option<Subscription>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM subscriptions WHERE id = $1",
            SELECT_COLS
        ))
        .bind(id)
        .fetch_optional(self.pool())
        .await
        .map_err(AppError::from)?;
        Ok(row.as_ref().map(row_to_subscription))
    }

    async fn get_active_by_user(&self, user_id: Uuid) -> AppResult<Option<Subscription>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM subscriptions WHERE user_id = $1 AND status = 'active'",
            SELECT_COLS
        ))
        .bind(user_id)
        .fetch_optional(self.pool())
        .await
        .map_err(AppError::from)?;
        Ok(row.as_ref().map(row_to_subscription))
    }

    async fn list_due(&self, now: DateTime<Utc>, limit: i64) -> AppResult<Vec<Subscription>> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {} FROM subscriptions
            WHERE status = 'active' AND next_billing_at <= $1
            ORDER BY next_billing_at ASC
            LIMIT $2
            "#,
            SELECT_COLS
        ))
        .bind(now)
        .bind(limit)
        .fetch_all(self.pool())
        .await
        .map_err(AppError::from)?;
        Ok(rows.iter().map(row_to_subscription).collect())
    }

    async fn advance_cycle(&self, id: Uuid, update: &CycleAdvance) -> AppResult<()> {
        sqlx::query(
            r#"
            UPDATE subscriptions SET
                current_cycle = $2,
                next_billing_at = $3,
                plan_id = $4,
                amount_cents = $5,
                retry_count = 0,
                pending_plan_id = CASE WHEN $6 THEN NULL ELSE pending_plan_id END,
                pending_amount_cents = CASE WHEN $6 THEN NULL ELSE pending_amount_cents END,
                updated_at = CURRENT_TIMESTAMP
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(update.current_cycle)
        .bind(update.next_billing_at)
        .bind(update.plan_id)
        .bind(update.amount_cents)
        .bind(update.clear_pending)
        .execute(self.pool())
        .await
        .map_err(AppError::from)?;
        Ok(())
    }

    async fn record_failure(
        &self,
        id: Uuid,
        retry_count: i32,
        status: SubscriptionStatus,
    ) -> AppResult<()> {
        sqlx::query(
            r#"
            UPDATE subscriptions
            SET retry_count = $2, status = $3, updated_at = CURRENT_TIMESTAMP
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(retry_count)
        .bind(status)
        .execute(self.pool())
        .await
        .map_err(AppError::from)?;
        Ok(())
    }

    async fn set_pending_change(&self, id: Uuid, change: &PendingPlanChange) -> AppResult<()> {
        sqlx::query(
            r#"
            UPDATE subscriptions
            SET pending_plan_id = $2, pending_amount_cents = $3, updated_at = CURRENT_TIMESTAMP
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(change.plan_id)
        .bind(change.amount_cents)
        .execute(self.pool())
        .await
        .map_err(AppError::from)?;
        Ok(())
    }

    async fn apply_plan_now(&self, id: Uuid, plan_id: Uuid, amount_cents: i64) -> AppResult<()> {
        sqlx::query(
            r#"
            UPDATE subscriptions
            SET plan_id = $2, amount_cents = $3,
                pending_plan_id = NULL, pending_amount_cents = NULL,
                updated_at = CURRENT_TIMESTAMP
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(plan_id)
        .bind(amount_cents)
        .execute(self.pool())
        .await
        .map_err(AppError::from)?;
        Ok(())
    }

    async fn cancel(&self, id: Uuid) -> AppResult<()> {
        sqlx::query(
            r#"
            UPDATE subscriptions
            SET status = 'canceled', updated_at = CURRENT_TIMESTAMP
            WHERE id = $1
            "#,
        )
        .bind(id)
        .execute(self.pool())
        .await
        .map_err(AppError::from)?;
        Ok(())
    }
}

#[async_trait]
impl SubscriptionInvoiceRepo for PostgresPersistence {
    async fn exists_for_cycle(
        &self,
        subscription_id: Uuid,
        billing_cycle: i32,
    ) -> AppResult<bool> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM subscription_invoices WHERE subscription_id = $1 AND billing_cycle = $2",
        )
        .bind(subscription_id)
        .bind(billing_cycle)
        .fetch_one(self.pool())
        .await
        .map_err(AppError::from)?;
        Ok(count > 0)
    }

    // The unique (subscription_id, billing_cycle) index is the guard; a
    // conflicting insert simply reports that the cycle was already
    // processed.
    async fn try_create(&self, input: &NewSubscriptionInvoice) -> AppResult<bool> {
        let id = Uuid::new_v4();
        let result = sqlx::query(
            r#"
            INSERT INTO subscription_invoices
                (id, subscription_id, payment_intent_id, billing_cycle, amount_cents, status, billed_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (subscription_id, billing_cycle) DO NOTHING
            "#,
        )
        .bind(id)
        .bind(input.subscription_id)
        .bind(input.payment_intent_id)
        .bind(input.billing_cycle)
        .bind(input.amount_cents)
        .bind(input.status)
        .bind(input.billed_at)
        .execute(self.pool())
        .await
        .map_err(AppError::from)?;
        Ok(result.rows_affected() == 1)
    }

    async fn list_by_subscription(
        &self,
        subscription_id: Uuid,
    ) -> AppResult<Vec<SubscriptionInvoice>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM subscription_invoices WHERE subscription_id = $1 ORDER BY billing_cycle ASC",
            INVOICE_COLS
        ))
        .bind(subscription_id)
        .fetch_all(self.pool())
        .await
        .map_err(AppError::from)?;
        Ok(rows.iter().map(row_to_invoice).collect())
    }
}
