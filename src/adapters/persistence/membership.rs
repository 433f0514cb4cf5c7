use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::Row;
use uuid::Uuid;

use crate::{
    adapters::persistence::PostgresPersistence,
    app_error::AppError,
    app_error::AppResult,
    application::use_cases::membership::{
        MembershipPaymentRepo, MembershipPlanRepo, NewMembershipPayment, UserMembershipRepo,
    },
    domain::entities::membership::{MembershipPayment, MembershipPlan, UserMembership},
};

const PAYMENT_COLS: &str = r#"
    id, user_id, plan_id, gateway, amount_cents, cycle, cycle_days, status, paid_at, created_at
"#;

fn row_to_payment(row: &sqlx::postgres::PgRow) -> MembershipPayment {
    MembershipPayment {
        id: row.get("id"),
        user_id: row.get("user_id"),
        plan_id: row.get("plan_id"),
        gateway: row.get("gateway"),
        amount_cents: row.get("amount_cents"),
        cycle: row.get("cycle"),
        cycle_days: row.get("cycle_days"),
        status: row.get("status"),
        paid_at: row.get("paid_at"),
        created_at: row.get("created_at"),
    }
}

const MEMBERSHIP_COLS: &str = r#"
    id, user_id, plan_id, start_date, end_date, is_active, created_at, updated_at
"#;

fn row_to_membership(row: &sqlx::postgres::PgRow) -> UserMembership {
    UserMembership {
        id: row.get("id"),
        user_id: row.get("user_id"),
        plan_id: row.get("plan_id"),
        start_date: row.get("start_date"),
        end_date: row.get("end_date"),
        is_active: row.get("is_active"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

#[async_trait]
impl MembershipPlanRepo for PostgresPersistence {
    async fn get(&self, id: Uuid) -> AppResult<Option<MembershipPlan>> {
        let row = sqlx::query(
            r#"
            SELECT id, name, image_url, monthly_price_cents, yearly_price_cents, is_active
            FROM membership_plans WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(self.pool())
        .await
        .map_err(AppError::from)?;
        Ok(row.map(|row| MembershipPlan {
            id: row.get("id"),
            name: row.get("name"),
            image_url: row.get("image_url"),
            monthly_price_cents: row.get("monthly_price_cents"),
            yearly_price_cents: row.get("yearly_price_cents"),
            is_active: row.get("is_active"),
        }))
    }
}

#[async_trait]
impl MembershipPaymentRepo for PostgresPersistence {
    async fn create(&self, input: &NewMembershipPayment) -> AppResult<MembershipPayment> {
        let id = Uuid::new_v4();
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO membership_payments
                (id, user_id, plan_id, gateway, amount_cents, cycle, cycle_days, status)
            VALUES ($1, $2, $3, $4, $5, $6, $7, 'pending')
            RETURNING {}
            "#,
            PAYMENT_COLS
        ))
        .bind(id)
        .bind(input.user_id)
        .bind(input.plan_id)
        .bind(input.gateway)
        .bind(input.amount_cents)
        .bind(input.cycle)
        .bind(input.cycle_days)
        .fetch_one(self.pool())
        .await
        .map_err(AppError::from)?;
        Ok(row_to_payment(&row))
    }

    async fn get(&self, id: Uuid) -> AppResult<Option<MembershipPayment>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM membership_payments WHERE id = $1",
            PAYMENT_COLS
        ))
        .bind(id)
        .fetch_optional(self.pool())
        .await
        .map_err(AppError::from)?;
        Ok(row.as_ref().map(row_to_payment))
    }

    async fn mark_paid(&self, id: Uuid, paid_at: DateTime<Utc>) -> AppResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE membership_payments
            SET status = 'paid', paid_at = $2
            WHERE id = $1 AND status = 'pending'
            "#,
        )
        .bind(id)
        .bind(paid_at)
        .execute(self.pool())
        .await
        .map_err(AppError::from)?;
        Ok(result.rows_affected() == 1)
    }
}

#[async_trait]
impl UserMembershipRepo for PostgresPersistence {
    async fn get_by_user(&self, user_id: Uuid) -> AppResult<Option<UserMembership>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM user_memberships WHERE user_id = $1",
            MEMBERSHIP_COLS
        ))
        .bind(user_id)
        .fetch_optional(self.pool())
        .await
        .map_err(AppError::from)?;
        Ok(row.as_ref().map(row_to_membership))
    }

    async fn create(
        &self,
        user_id: Uuid,
        plan_id: Uuid,
        start_date: DateTime<Utc>,
        end_date: DateTime<Utc>,
    ) -> AppResult<UserMembership> {
        let id = Uuid::new_v4();
        // Upsert on user_id keeps the one-membership-per-user invariant
        // even if two first purchases settle concurrently.
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO user_memberships (id, user_id, plan_id, start_date, end_date, is_active)
            VALUES ($1, $2, $3, $4, $5, true)
            ON CONFLICT (user_id) DO UPDATE SET
                plan_id = EXCLUDED.plan_id,
                start_date = EXCLUDED.start_date,
                end_date = EXCLUDED.end_date,
                is_active = true,
                updated_at = CURRENT_TIMESTAMP
            RETURNING {}
            "#,
            MEMBERSHIP_COLS
        ))
        .bind(id)
        .bind(user_id)
        .bind(plan_id)
        .bind(start_date)
        .bind(end_date)
        .fetch_one(self.pool())
        .await
        .map_err(AppError::from)?;
        Ok(row_to_membership(&row))
    }

    async fn set_period(
        &self,
        id: Uuid,
        plan_id: Uuid,
        start_date: DateTime<Utc>,
        end_date: DateTime<Utc>,
    ) -> AppResult<()> {
        sqlx::query(
            r#"
            UPDATE user_memberships
            SET plan_id = $2, start_date = $3, end_date = $4, is_active = true,
                updated_at = CURRENT_TIMESTAMP
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(plan_id)
        .bind(start_date)
        .bind(end_date)
        .execute(self.pool())
        .await
        .map_err(AppError::from)?;
        Ok(())
    }
}
