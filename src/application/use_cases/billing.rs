use async_trait::async_trait;
use chrono::{DateTime, Datelike, NaiveDate, TimeZone, Utc};
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    app_error::{AppError, AppResult},
    application::use_cases::{
        finalizer::Finalizer,
        gateway_factory::GatewayFactory,
        membership::MembershipPlanRepo,
        payment_intent::{NewPaymentIntent, PaymentIntentRepo},
    },
    domain::entities::{
        gateway::Gateway,
        payment_intent::{Actor, IntentKind, DEFAULT_CURRENCY},
        subscription::{
            InvoiceStatus, PendingPlanChange, Subscription, SubscriptionInvoice,
            SubscriptionStatus,
        },
    },
};

/// Subscriptions picked up per scheduler sweep.
const BILLING_BATCH: i64 = 100;

// ============================================================================
// Date & Proration Arithmetic
// ============================================================================

/// Advance one calendar month, clamping the day-of-month when the target
/// month is shorter (Jan 31 → Feb 28/29, never Mar 3).
pub fn add_one_month_clamped(at: DateTime<Utc>) -> DateTime<Utc> {
    shift_months(at, 1)
}

/// Inverse of [`add_one_month_clamped`], used to recover the start of the
/// current billing window from `next_billing_at`.
pub fn subtract_one_month_clamped(at: DateTime<Utc>) -> DateTime<Utc> {
    shift_months(at, -1)
}

fn shift_months(at: DateTime<Utc>, delta: i32) -> DateTime<Utc> {
    let date = at.date_naive();
    let month0 = date.year() * 12 + date.month0() as i32 + delta;
    let year = month0.div_euclid(12);
    let month = month0.rem_euclid(12) as u32 + 1;
    let day = date.day().min(last_day_of_month(year, month));
    let shifted = NaiveDate::from_ymd_opt(year, month, day)
        .expect("clamped day is always valid")
        .and_time(at.time());
    Utc.from_utc_datetime(&shifted)
}

fn last_day_of_month(year: i32, month: u32) -> u32 {
    let (next_year, next_month) = if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    };
    NaiveDate::from_ymd_opt(next_year, next_month, 1)
        .expect("first of month is always valid")
        .pred_opt()
        .expect("first of month has a predecessor")
        .day()
}

/// Amount due for an upgrade mid-cycle: the new plan price minus the
/// unused value of the current plan, floored at zero. Past the end of the
/// window the full new price is due.
pub fn prorate_upgrade(
    current_amount_cents: i64,
    new_amount_cents: i64,
    billing_start: DateTime<Utc>,
    billing_end: DateTime<Utc>,
    now: DateTime<Utc>,
) -> i64 {
    let total_ms = (billing_end - billing_start).num_milliseconds();
    let remaining_ms = (billing_end - now).num_milliseconds();
    if remaining_ms <= 0 || total_ms <= 0 {
        return new_amount_cents;
    }
    let remaining_ratio = remaining_ms as f64 / total_ms as f64;
    let unused_value = current_amount_cents as f64 * remaining_ratio;
    (new_amount_cents as f64 - unused_value).max(0.0).round() as i64
}

// ============================================================================
// Repository Traits
// ============================================================================

#[derive(Debug, Clone)]
pub struct NewSubscription {
    pub user_id: Uuid,
    pub plan_id: Uuid,
    pub gateway: Gateway,
    pub amount_cents: i64,
    pub currency: String,
    pub card_token: String,
    pub card_last4: Option<String>,
    pub next_billing_at: DateTime<Utc>,
}

/// State written by a successful cycle advance. `retry_count` resets to
/// zero implicitly.
#[derive(Debug, Clone)]
pub struct CycleAdvance {
    pub current_cycle: i32,
    pub next_billing_at: DateTime<Utc>,
    pub plan_id: Uuid,
    pub amount_cents: i64,
    pub clear_pending: bool,
}

#[async_trait]
pub trait SubscriptionRepo: Send + Sync {
    async fn create(&self, input: &NewSubscription) -> AppResult<Subscription>;
    async fn get(&self, id: Uuid) -> AppResult<Option<Subscription>>;
    async fn get_active_by_user(&self, user_id: Uuid) -> AppResult<Option<Subscription>>;
    async fn list_due(&self, now: DateTime<Utc>, limit: i64) -> AppResult<Vec<Subscription>>;
    async fn advance_cycle(&self, id: Uuid, update: &CycleAdvance) -> AppResult<()>;
    async fn record_failure(
        &self,
        id: Uuid,
        retry_count: i32,
        status: SubscriptionStatus,
    ) -> AppResult<()>;
    async fn set_pending_change(&self, id: Uuid, change: &PendingPlanChange) -> AppResult<()>;
    /// Immediate plan swap (upgrade settlement); also clears any queued
    /// pending change, which the upgrade supersedes.
    async fn apply_plan_now(&self, id: Uuid, plan_id: Uuid, amount_cents: i64) -> AppResult<()>;
    async fn cancel(&self, id: Uuid) -> AppResult<()>;
}

#[derive(Debug, Clone)]
pub struct NewSubscriptionInvoice {
    pub subscription_id: Uuid,
    pub payment_intent_id: Uuid,
    pub billing_cycle: i32,
    pub amount_cents: i64,
    pub status: InvoiceStatus,
    pub billed_at: DateTime<Utc>,
}

#[async_trait]
pub trait SubscriptionInvoiceRepo: Send + Sync {
    async fn exists_for_cycle(&self, subscription_id: Uuid, billing_cycle: i32)
    -> AppResult<bool>;
    /// Insert guarded by the unique (subscription_id, billing_cycle) key;
    /// `false` when another run already recorded this cycle.
    async fn try_create(&self, input: &NewSubscriptionInvoice) -> AppResult<bool>;
    async fn list_by_subscription(
        &self,
        subscription_id: Uuid,
    ) -> AppResult<Vec<SubscriptionInvoice>>;
}

// ============================================================================
// Use Cases
// ============================================================================

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PlanChangeOutcome {
    /// Prorated amount charged immediately through a fresh intent.
    Upgrade {
        payment_intent_id: Uuid,
        amount_due_cents: i64,
        external_reference: Option<String>,
    },
    /// Queued on the subscription; applied at the next cycle boundary.
    Downgrade { effective_at: DateTime<Utc> },
}

#[derive(Clone)]
pub struct BillingUseCases {
    subs: Arc<dyn SubscriptionRepo>,
    invoices: Arc<dyn SubscriptionInvoiceRepo>,
    intents: Arc<dyn PaymentIntentRepo>,
    plans: Arc<dyn MembershipPlanRepo>,
    gateways: Arc<GatewayFactory>,
    finalizer: Arc<Finalizer>,
    retry_limit: i32,
}

impl BillingUseCases {
    pub fn new(
        subs: Arc<dyn SubscriptionRepo>,
        invoices: Arc<dyn SubscriptionInvoiceRepo>,
        intents: Arc<dyn PaymentIntentRepo>,
        plans: Arc<dyn MembershipPlanRepo>,
        gateways: Arc<GatewayFactory>,
        finalizer: Arc<Finalizer>,
        retry_limit: i32,
    ) -> Self {
        Self {
            subs,
            invoices,
            intents,
            plans,
            gateways,
            finalizer,
            retry_limit,
        }
    }

    /// Start a recurring subscription and bill its first cycle right
    /// away through the same path the scheduler uses.
    pub async fn create_subscription(
        &self,
        user_id: Uuid,
        plan_id: Uuid,
        gateway: Gateway,
        card_token: String,
        card_last4: Option<String>,
    ) -> AppResult<Subscription> {
        if card_token.trim().is_empty() {
            return Err(AppError::Validation("card token required".into()));
        }
        if !gateway.supports_token_charges() && !self.gateways.is_mock(gateway) {
            return Err(AppError::Validation(format!(
                "{} does not support recurring charges",
                gateway
            )));
        }
        if self.subs.get_active_by_user(user_id).await?.is_some() {
            return Err(AppError::Conflict("subscription already active".into()));
        }

        let plan = self.plans.get(plan_id).await?.ok_or(AppError::NotFound)?;
        if !plan.is_active {
            return Err(AppError::Validation("plan is not active".into()));
        }

        let now = Utc::now();
        let subscription = self
            .subs
            .create(&NewSubscription {
                user_id,
                plan_id: plan.id,
                gateway,
                amount_cents: plan.monthly_price_cents,
                currency: DEFAULT_CURRENCY.into(),
                card_token,
                card_last4,
                next_billing_at: now,
            })
            .await?;

        self.bill_subscription(&subscription, now).await?;

        self.subs
            .get(subscription.id)
            .await?
            .ok_or(AppError::NotFound)
    }

    /// One scheduler sweep: bill every active subscription that is due.
    /// Per-subscription failures are logged and do not stop the sweep.
    pub async fn run_due_cycles(&self, now: DateTime<Utc>) -> AppResult<u64> {
        let due = self.subs.list_due(now, BILLING_BATCH).await?;
        let mut processed = 0u64;
        for subscription in due {
            match self.bill_subscription(&subscription, now).await {
                Ok(true) => processed += 1,
                Ok(false) => {}
                Err(error) => {
                    tracing::error!(
                        subscription_id = %subscription.id,
                        error = %error,
                        "Billing cycle failed"
                    );
                }
            }
        }
        Ok(processed)
    }

    /// Bill one cycle of one subscription. Returns `false` when the cycle
    /// was already processed (invoice uniqueness), which makes overlapping
    /// scheduler runs safe without any lock.
    pub async fn bill_subscription(
        &self,
        subscription: &Subscription,
        now: DateTime<Utc>,
    ) -> AppResult<bool> {
        if self
            .invoices
            .exists_for_cycle(subscription.id, subscription.current_cycle)
            .await?
        {
            tracing::debug!(
                subscription_id = %subscription.id,
                billing_cycle = subscription.current_cycle,
                "Cycle already invoiced, skipping"
            );
            return Ok(false);
        }

        let adapter = self.gateways.get(subscription.gateway)?;
        let intent = self
            .intents
            .create(&NewPaymentIntent {
                actor: Actor::User(subscription.user_id),
                provider_id: None,
                kind: IntentKind::SubscriptionCharge,
                gateway: subscription.gateway,
                amount_cents: subscription.amount_cents,
                currency: subscription.currency.clone(),
                voucher_payload: None,
                membership_payment_id: None,
                subscription_id: Some(subscription.id),
                upgrade_to: None,
                is_mock: adapter.mode().is_mock(),
            })
            .await?;

        match adapter
            .charge_token(
                &subscription.card_token,
                subscription.amount_cents,
                &subscription.currency,
            )
            .await
        {
            Ok(charge) if charge.approved => {
                self.intents
                    .set_external_reference(intent.id, &charge.external_reference)
                    .await?;
                if let Some(claimed) = self.intents.claim_paid(intent.id).await? {
                    self.finalizer.fulfill(&claimed).await?;
                }
                Ok(true)
            }
            Ok(charge) => {
                // Declined: the cycle is consumed by a failed invoice and
                // dunning advances.
                self.intents
                    .set_external_reference(intent.id, &charge.external_reference)
                    .await?;
                self.intents.mark_failed(intent.id).await?;
                self.invoices
                    .try_create(&NewSubscriptionInvoice {
                        subscription_id: subscription.id,
                        payment_intent_id: intent.id,
                        billing_cycle: subscription.current_cycle,
                        amount_cents: subscription.amount_cents,
                        status: InvoiceStatus::Failed,
                        billed_at: now,
                    })
                    .await?;
                self.record_billing_failure(subscription, charge.decline_reason.as_deref())
                    .await?;
                Ok(true)
            }
            Err(error) => {
                // Transport failure: nothing confirmed either way. Leave
                // the cycle uninvoiced so the next sweep retries it.
                self.intents.mark_failed(intent.id).await?;
                self.record_billing_failure(subscription, None).await?;
                tracing::warn!(
                    subscription_id = %subscription.id,
                    error = %error,
                    "Token charge errored, cycle left retriable"
                );
                Ok(true)
            }
        }
    }

    async fn record_billing_failure(
        &self,
        subscription: &Subscription,
        decline_reason: Option<&str>,
    ) -> AppResult<()> {
        let retry_count = subscription.retry_count + 1;
        let status = if retry_count >= self.retry_limit {
            SubscriptionStatus::PastDue
        } else {
            subscription.status
        };
        self.subs
            .record_failure(subscription.id, retry_count, status)
            .await?;
        tracing::info!(
            subscription_id = %subscription.id,
            retry_count,
            status = %status,
            decline_reason = decline_reason.unwrap_or("n/a"),
            "Recurring charge failed"
        );
        Ok(())
    }

    /// User-requested plan change. Upgrades charge the prorated
    /// difference immediately; downgrades are deferred to the next cycle
    /// boundary and change nothing now.
    pub async fn request_plan_change(
        &self,
        user_id: Uuid,
        new_plan_id: Uuid,
    ) -> AppResult<PlanChangeOutcome> {
        let subscription = self
            .subs
            .get_active_by_user(user_id)
            .await?
            .ok_or(AppError::NotFound)?;
        let plan = self
            .plans
            .get(new_plan_id)
            .await?
            .ok_or(AppError::NotFound)?;
        if !plan.is_active {
            return Err(AppError::Validation("plan is not active".into()));
        }
        if plan.id == subscription.plan_id && subscription.pending_change.is_none() {
            return Err(AppError::Conflict("already on this plan".into()));
        }

        let new_amount = plan.monthly_price_cents;
        let now = Utc::now();

        if new_amount > subscription.amount_cents {
            let billing_end = subscription.next_billing_at;
            let billing_start = subtract_one_month_clamped(billing_end);
            let amount_due = prorate_upgrade(
                subscription.amount_cents,
                new_amount,
                billing_start,
                billing_end,
                now,
            );

            let adapter = self.gateways.get(subscription.gateway)?;
            let intent = self
                .intents
                .create(&NewPaymentIntent {
                    actor: Actor::User(user_id),
                    provider_id: None,
                    kind: IntentKind::UpgradeProration,
                    gateway: subscription.gateway,
                    amount_cents: amount_due,
                    currency: subscription.currency.clone(),
                    voucher_payload: None,
                    membership_payment_id: None,
                    subscription_id: Some(subscription.id),
                    upgrade_to: Some(PendingPlanChange {
                        plan_id: plan.id,
                        amount_cents: new_amount,
                    }),
                    is_mock: adapter.mode().is_mock(),
                })
                .await?;

            let receipt = adapter
                .create_charge(&crate::application::ports::payment_gateway::ChargeRequest {
                    intent_id: intent.id,
                    amount_cents: amount_due,
                    currency: subscription.currency.clone(),
                    description: format!("plan upgrade to {}", plan.name),
                })
                .await?;
            self.intents
                .set_external_reference(intent.id, &receipt.external_reference)
                .await?;

            if matches!(
                receipt.settled,
                Some(crate::domain::entities::gateway::NotificationOutcome::Success)
            ) {
                if let Some(claimed) = self.intents.claim_paid(intent.id).await? {
                    self.finalizer.fulfill(&claimed).await?;
                }
            }

            tracing::info!(
                subscription_id = %subscription.id,
                new_plan_id = %plan.id,
                amount_due_cents = amount_due,
                "Upgrade proration charged"
            );
            Ok(PlanChangeOutcome::Upgrade {
                payment_intent_id: intent.id,
                amount_due_cents: amount_due,
                external_reference: Some(receipt.external_reference),
            })
        } else {
            self.subs
                .set_pending_change(
                    subscription.id,
                    &PendingPlanChange {
                        plan_id: plan.id,
                        amount_cents: new_amount,
                    },
                )
                .await?;
            tracing::info!(
                subscription_id = %subscription.id,
                new_plan_id = %plan.id,
                effective_at = %subscription.next_billing_at,
                "Downgrade queued for next cycle"
            );
            Ok(PlanChangeOutcome::Downgrade {
                effective_at: subscription.next_billing_at,
            })
        }
    }

    pub async fn subscription_for_user(&self, user_id: Uuid) -> AppResult<Option<Subscription>> {
        self.subs.get_active_by_user(user_id).await
    }

    pub async fn invoices_for(&self, subscription_id: Uuid) -> AppResult<Vec<SubscriptionInvoice>> {
        self.invoices.list_by_subscription(subscription_id).await
    }

    pub async fn cancel_subscription(&self, user_id: Uuid) -> AppResult<()> {
        let subscription = self
            .subs
            .get_active_by_user(user_id)
            .await?
            .ok_or(AppError::NotFound)?;
        self.subs.cancel(subscription.id).await?;
        tracing::info!(subscription_id = %subscription.id, "Subscription canceled");
        Ok(())
    }
}
