use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::Row;
use uuid::Uuid;

use crate::{
    adapters::persistence::{parse_json_opt, PostgresPersistence},
    app_error::{AppError, AppResult},
    application::use_cases::payment_intent::{NewPaymentIntent, PaymentIntentRepo},
    domain::entities::{
        gateway::Gateway,
        payment_intent::{Actor, PaymentIntent},
        subscription::PendingPlanChange,
    },
};

const SELECT_COLS: &str = r#"
    id, user_id, session_id, provider_id, kind, gateway, amount_cents, currency,
    external_reference, voucher_payload, membership_payment_id, subscription_id,
    upgrade_plan_id, upgrade_amount_cents, is_mock, status, paid_at,
    created_at, updated_at
"#;

fn row_to_intent(row: &sqlx::postgres::PgRow) -> AppResult<PaymentIntent> {
    let id: Uuid = row.get("id");
    let actor = Actor::from_columns(row.get("user_id"), row.get("session_id")).ok_or_else(|| {
        AppError::Database(format!("payment intent {} has inconsistent actor columns", id))
    })?;
    let voucher_payload = row
        .get::<Option<serde_json::Value>, _>("voucher_payload")
        .and_then(|json| parse_json_opt(&json, "voucher_payload", "payment_intent", &id.to_string()));

    Ok(PaymentIntent {
        id,
        actor,
        provider_id: row.get("provider_id"),
        kind: row.get("kind"),
        gateway: row.get("gateway"),
        amount_cents: row.get("amount_cents"),
        currency: row.get("currency"),
        external_reference: row.get("external_reference"),
        voucher_payload,
        membership_payment_id: row.get("membership_payment_id"),
        subscription_id: row.get("subscription_id"),
        upgrade_to: PendingPlanChange::from_columns(
            row.get("upgrade_plan_id"),
            row.get("upgrade_amount_cents"),
        ),
        is_mock: row.get("is_mock"),
        status: row.get("status"),
        paid_at: row.get::<Option<DateTime<Utc>>, _>("paid_at"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

#[async_trait]
impl PaymentIntentRepo for PostgresPersistence {
    async fn create(&self, input: &NewPaymentIntent) -> AppResult<PaymentIntent> {
        let id = Uuid::new_v4();
        let voucher_payload = input
            .voucher_payload
            .as_ref()
            .map(serde_json::to_value)
            .transpose()
            .map_err(|e| AppError::Internal(format!("voucher payload serialization: {}", e)))?;

        let row = sqlx::query(&format!(
            r#"
            INSERT INTO payment_intents
                (id, user_id, session_id, provider_id, kind, gateway, amount_cents, currency,
                 voucher_payload, membership_payment_id, subscription_id,
                 upgrade_plan_id, upgrade_amount_cents, is_mock, status)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, 'pending')
            RETURNING {}
            "#,
            SELECT_COLS
        ))
        .bind(id)
        .bind(input.actor.user_id())
        .bind(input.actor.session_id())
        .bind(input.provider_id)
        .bind(input.kind)
        .bind(input.gateway)
        .bind(input.amount_cents)
        .bind(&input.currency)
        .bind(voucher_payload)
        .bind(input.membership_payment_id)
        .bind(input.subscription_id)
        .bind(input.upgrade_to.map(|change| change.plan_id))
        .bind(input.upgrade_to.map(|change| change.amount_cents))
        .bind(input.is_mock)
        .fetch_one(self.pool())
        .await
        .map_err(AppError::from)?;
        row_to_intent(&row)
    }

    async fn get(&self, id: Uuid) -> AppResult<Option<PaymentIntent>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM payment_intents WHERE id = $1",
            SELECT_COLS
        ))
        .bind(id)
        .fetch_optional(self.pool())
        .await
        .map_err(AppError::from)?;
        row.as_ref().map(row_to_intent).transpose()
    }

    async fn find_by_external_reference(
        &self,
        gateway: Gateway,
        external_reference: &str,
    ) -> AppResult<Option<PaymentIntent>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM payment_intents WHERE gateway = $1 AND external_reference = $2",
            SELECT_COLS
        ))
        .bind(gateway)
        .bind(external_reference)
        .fetch_optional(self.pool())
        .await
        .map_err(AppError::from)?;
        row.as_ref().map(row_to_intent).transpose()
    }

    async fn set_external_reference(&self, id: Uuid, external_reference: &str) -> AppResult<()> {
        sqlx::query(
            r#"
            UPDATE payment_intents
            SET external_reference = $2, updated_at = CURRENT_TIMESTAMP
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(external_reference)
        .execute(self.pool())
        .await
        .map_err(AppError::from)?;
        Ok(())
    }

    // The single conditional update that makes fulfillment exactly-once:
    // only the caller whose UPDATE matched the pending row gets the
    // intent back.
    async fn claim_paid(&self, id: Uuid) -> AppResult<Option<PaymentIntent>> {
        let row = sqlx::query(&format!(
            r#"
            UPDATE payment_intents
            SET status = 'paid', paid_at = CURRENT_TIMESTAMP, updated_at = CURRENT_TIMESTAMP
            WHERE id = $1 AND status = 'pending'
            RETURNING {}
            "#,
            SELECT_COLS
        ))
        .bind(id)
        .fetch_optional(self.pool())
        .await
        .map_err(AppError::from)?;
        row.as_ref().map(row_to_intent).transpose()
    }

    async fn mark_failed(&self, id: Uuid) -> AppResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE payment_intents
            SET status = 'failed', updated_at = CURRENT_TIMESTAMP
            WHERE id = $1 AND status = 'pending'
            "#,
        )
        .bind(id)
        .execute(self.pool())
        .await
        .map_err(AppError::from)?;
        Ok(result.rows_affected() == 1)
    }

    async fn mark_cancelled(&self, id: Uuid) -> AppResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE payment_intents
            SET status = 'cancelled', updated_at = CURRENT_TIMESTAMP
            WHERE id = $1 AND status = 'pending'
            "#,
        )
        .bind(id)
        .execute(self.pool())
        .await
        .map_err(AppError::from)?;
        Ok(result.rows_affected() == 1)
    }
}
