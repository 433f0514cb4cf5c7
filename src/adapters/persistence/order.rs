use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::Row;
use uuid::Uuid;

use crate::{
    adapters::persistence::{parse_json_column, PostgresPersistence},
    app_error::{AppError, AppResult},
    application::use_cases::orders::{NewOrder, OrderRepo},
    domain::entities::{
        order::{Order, OrderItem, OrderStatus, PaymentLink},
        payment_intent::Actor,
    },
};

const SELECT_COLS: &str = r#"
    id, user_id, session_id, provider_id, items, total_cents,
    payment_gateway, payment_intent_id, payment_paid_at,
    status, cancel_reason, expires_at, created_at
"#;

fn row_to_order(row: &sqlx::postgres::PgRow) -> AppResult<Order> {
    let id: Uuid = row.get("id");
    let actor = Actor::from_columns(row.get("user_id"), row.get("session_id"))
        .ok_or_else(|| AppError::Database(format!("order {} has inconsistent actor columns", id)))?;
    let items: Vec<OrderItem> = parse_json_column(
        &row.get::<serde_json::Value, _>("items"),
        "items",
        "order",
        &id.to_string(),
    );

    Ok(Order {
        id,
        actor,
        provider_id: row.get("provider_id"),
        items,
        total_cents: row.get("total_cents"),
        payment: PaymentLink {
            gateway: row.get("payment_gateway"),
            payment_intent_id: row.get("payment_intent_id"),
            paid_at: row.get("payment_paid_at"),
        },
        status: row.get("status"),
        cancel_reason: row.get("cancel_reason"),
        expires_at: row.get("expires_at"),
        created_at: row.get("created_at"),
    })
}

#[async_trait]
impl OrderRepo for PostgresPersistence {
    async fn create(&self, input: &NewOrder) -> AppResult<Order> {
        let id = Uuid::new_v4();
        let items = serde_json::to_value(&input.items)
            .map_err(|e| AppError::Internal(format!("order items serialization: {}", e)))?;

        // ON CONFLICT on the unique payment-intent linkage: a replayed
        // create returns the already-existing order instead of a second
        // fulfillment.
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO orders
                (id, user_id, session_id, provider_id, items, total_cents,
                 payment_gateway, payment_intent_id, payment_paid_at, status, expires_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, 'pending',
                    CURRENT_TIMESTAMP + make_interval(mins => $10))
            ON CONFLICT (payment_intent_id) DO NOTHING
            RETURNING {}
            "#,
            SELECT_COLS
        ))
        .bind(id)
        .bind(input.actor.user_id())
        .bind(input.actor.session_id())
        .bind(input.provider_id)
        .bind(items)
        .bind(input.total_cents)
        .bind(input.payment.gateway)
        .bind(input.payment.payment_intent_id)
        .bind(input.payment.paid_at)
        .bind(crate::domain::entities::order::ORDER_EXPIRY_MINUTES as i32)
        .fetch_optional(self.pool())
        .await
        .map_err(AppError::from)?;

        match row {
            Some(row) => row_to_order(&row),
            None => self
                .get_by_payment_intent(input.payment.payment_intent_id)
                .await?
                .ok_or_else(|| {
                    AppError::Database("order insert conflicted but no existing row found".into())
                }),
        }
    }

    async fn get(&self, id: Uuid) -> AppResult<Option<Order>> {
        let row = sqlx::query(&format!("SELECT {} FROM orders WHERE id = $1", SELECT_COLS))
            .bind(id)
            .fetch_optional(self.pool())
            .await
            .map_err(AppError::from)?;
        row.as_ref().map(row_to_order).transpose()
    }

    async fn get_by_payment_intent(&self, intent_id: Uuid) -> AppResult<Option<Order>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM orders WHERE payment_intent_id = $1",
            SELECT_COLS
        ))
        .bind(intent_id)
        .fetch_optional(self.pool())
        .await
        .map_err(AppError::from)?;
        row.as_ref().map(row_to_order).transpose()
    }

    async fn list_by_provider(&self, provider_id: Uuid) -> AppResult<Vec<Order>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM orders WHERE provider_id = $1 ORDER BY created_at DESC",
            SELECT_COLS
        ))
        .bind(provider_id)
        .fetch_all(self.pool())
        .await
        .map_err(AppError::from)?;
        rows.iter().map(row_to_order).collect()
    }

    async fn sweep_expired(&self, provider_id: Uuid, now: DateTime<Utc>) -> AppResult<u64> {
        let result = sqlx::query(
            r#"
            UPDATE orders
            SET status = 'ignored'
            WHERE provider_id = $1 AND status = 'pending' AND expires_at < $2
            "#,
        )
        .bind(provider_id)
        .bind(now)
        .execute(self.pool())
        .await
        .map_err(AppError::from)?;
        Ok(result.rows_affected())
    }

    async fn update_status(
        &self,
        id: Uuid,
        status: OrderStatus,
        cancel_reason: Option<&str>,
    ) -> AppResult<Option<Order>> {
        let row = sqlx::query(&format!(
            r#"
            UPDATE orders
            SET status = $2, cancel_reason = COALESCE($3, cancel_reason)
            WHERE id = $1 AND status = 'pending'
            RETURNING {}
            "#,
            SELECT_COLS
        ))
        .bind(id)
        .bind(status)
        .bind(cancel_reason)
        .fetch_optional(self.pool())
        .await
        .map_err(AppError::from)?;
        row.as_ref().map(row_to_order).transpose()
    }
}
