use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    app_error::AppResult,
    domain::entities::{
        gateway::Gateway,
        membership::{MembershipCycle, MembershipPayment, MembershipPlan, UserMembership},
    },
};

// ============================================================================
// Repository Traits
// ============================================================================

#[async_trait]
pub trait MembershipPlanRepo: Send + Sync {
    async fn get(&self, id: Uuid) -> AppResult<Option<MembershipPlan>>;
}

#[derive(Debug, Clone)]
pub struct NewMembershipPayment {
    pub user_id: Uuid,
    pub plan_id: Uuid,
    pub gateway: Gateway,
    pub amount_cents: i64,
    pub cycle: MembershipCycle,
    pub cycle_days: i64,
}

#[async_trait]
pub trait MembershipPaymentRepo: Send + Sync {
    async fn create(&self, input: &NewMembershipPayment) -> AppResult<MembershipPayment>;
    async fn get(&self, id: Uuid) -> AppResult<Option<MembershipPayment>>;
    /// Conditional pending→paid update; `false` when the record was
    /// already paid or failed.
    async fn mark_paid(&self, id: Uuid, paid_at: DateTime<Utc>) -> AppResult<bool>;
}

#[async_trait]
pub trait UserMembershipRepo: Send + Sync {
    async fn get_by_user(&self, user_id: Uuid) -> AppResult<Option<UserMembership>>;
    async fn create(
        &self,
        user_id: Uuid,
        plan_id: Uuid,
        start_date: DateTime<Utc>,
        end_date: DateTime<Utc>,
    ) -> AppResult<UserMembership>;
    /// Rewrite the membership period (and possibly plan) in place. Keeps
    /// the one-row-per-user invariant; periods never overlap.
    async fn set_period(
        &self,
        id: Uuid,
        plan_id: Uuid,
        start_date: DateTime<Utc>,
        end_date: DateTime<Utc>,
    ) -> AppResult<()>;
}

// ============================================================================
// Use Cases
// ============================================================================

#[derive(Clone)]
pub struct MembershipUseCases {
    payments: Arc<dyn MembershipPaymentRepo>,
    memberships: Arc<dyn UserMembershipRepo>,
}

impl MembershipUseCases {
    pub fn new(
        payments: Arc<dyn MembershipPaymentRepo>,
        memberships: Arc<dyn UserMembershipRepo>,
    ) -> Self {
        Self {
            payments,
            memberships,
        }
    }

    pub async fn membership_for_user(&self, user_id: Uuid) -> AppResult<Option<UserMembership>> {
        self.memberships.get_by_user(user_id).await
    }

    /// Finalize a settled membership purchase. Marks the payment paid
    /// (no-op if a previous delivery already did) and computes the new
    /// membership bounds:
    /// - no existing membership: start now, end now + cycle days
    /// - renewing the same plan: extend from the existing end date
    /// - different plan: restart at now; no credit for unused time on the
    ///   old plan
    pub async fn apply_paid_payment(&self, membership_payment_id: Uuid) -> AppResult<()> {
        let now = Utc::now();

        let Some(payment) = self.payments.get(membership_payment_id).await? else {
            tracing::warn!(
                membership_payment_id = %membership_payment_id,
                "Paid intent references a missing membership payment"
            );
            return Ok(());
        };

        if !self.payments.mark_paid(payment.id, now).await? {
            tracing::debug!(
                membership_payment_id = %payment.id,
                "Membership payment already finalized, skipping"
            );
            return Ok(());
        }

        let cycle = Duration::days(payment.cycle_days);

        match self.memberships.get_by_user(payment.user_id).await? {
            None => {
                self.memberships
                    .create(payment.user_id, payment.plan_id, now, now + cycle)
                    .await?;
                tracing::info!(
                    user_id = %payment.user_id,
                    plan_id = %payment.plan_id,
                    "Membership started"
                );
            }
            Some(existing) if existing.plan_id == payment.plan_id => {
                let new_end = existing.end_date + cycle;
                self.memberships
                    .set_period(existing.id, existing.plan_id, existing.start_date, new_end)
                    .await?;
                tracing::info!(
                    user_id = %payment.user_id,
                    plan_id = %payment.plan_id,
                    end_date = %new_end,
                    "Membership renewed"
                );
            }
            Some(existing) => {
                self.memberships
                    .set_period(existing.id, payment.plan_id, now, now + cycle)
                    .await?;
                tracing::info!(
                    user_id = %payment.user_id,
                    from_plan = %existing.plan_id,
                    to_plan = %payment.plan_id,
                    "Membership migrated"
                );
            }
        }

        Ok(())
    }
}
