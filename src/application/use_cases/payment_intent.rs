use async_trait::async_trait;
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    app_error::{AppError, AppResult},
    application::ports::payment_gateway::{ChargeRequest, GatewayNotification},
    application::use_cases::{
        finalizer::Finalizer,
        gateway_factory::GatewayFactory,
        membership::{MembershipPaymentRepo, MembershipPlanRepo, NewMembershipPayment},
        orders::CartRepo,
    },
    domain::entities::{
        gateway::{Gateway, NotificationOutcome},
        membership::MembershipCycle,
        payment_intent::{Actor, IntentKind, IntentStatus, PaymentIntent, VoucherPayload,
            DEFAULT_CURRENCY},
        provider::ProviderProfile,
        subscription::PendingPlanChange,
    },
};

// ============================================================================
// Repository Traits
// ============================================================================

#[derive(Debug, Clone)]
pub struct NewPaymentIntent {
    pub actor: Actor,
    pub provider_id: Option<Uuid>,
    pub kind: IntentKind,
    pub gateway: Gateway,
    pub amount_cents: i64,
    pub currency: String,
    pub voucher_payload: Option<VoucherPayload>,
    pub membership_payment_id: Option<Uuid>,
    pub subscription_id: Option<Uuid>,
    pub upgrade_to: Option<PendingPlanChange>,
    pub is_mock: bool,
}

#[async_trait]
pub trait PaymentIntentRepo: Send + Sync {
    async fn create(&self, input: &NewPaymentIntent) -> AppResult<PaymentIntent>;
    async fn get(&self, id: Uuid) -> AppResult<Option<PaymentIntent>>;
    async fn find_by_external_reference(
        &self,
        gateway: Gateway,
        external_reference: &str,
    ) -> AppResult<Option<PaymentIntent>>;
    async fn set_external_reference(&self, id: Uuid, external_reference: &str) -> AppResult<()>;

    /// THE idempotency primitive of the whole subsystem: one conditional
    /// update, `SET status = 'paid', paid_at = now() WHERE id = $1 AND
    /// status = 'pending'`. Returns the claimed intent iff this caller
    /// won the race; losers get `None` and must produce no side effects.
    async fn claim_paid(&self, id: Uuid) -> AppResult<Option<PaymentIntent>>;

    /// Conditional pending→failed; `false` when the intent was already
    /// terminal.
    async fn mark_failed(&self, id: Uuid) -> AppResult<bool>;

    /// Conditional pending→cancelled for explicit voids.
    async fn mark_cancelled(&self, id: Uuid) -> AppResult<bool>;
}

#[async_trait]
pub trait ProviderRepo: Send + Sync {
    async fn get(&self, id: Uuid) -> AppResult<Option<ProviderProfile>>;
}

// ============================================================================
// Use Cases
// ============================================================================

#[derive(Clone)]
pub struct PaymentIntentUseCases {
    intents: Arc<dyn PaymentIntentRepo>,
    carts: Arc<dyn CartRepo>,
    providers: Arc<dyn ProviderRepo>,
    plans: Arc<dyn MembershipPlanRepo>,
    membership_payments: Arc<dyn MembershipPaymentRepo>,
    gateways: Arc<GatewayFactory>,
    finalizer: Arc<Finalizer>,
}

impl PaymentIntentUseCases {
    pub fn new(
        intents: Arc<dyn PaymentIntentRepo>,
        carts: Arc<dyn CartRepo>,
        providers: Arc<dyn ProviderRepo>,
        plans: Arc<dyn MembershipPlanRepo>,
        membership_payments: Arc<dyn MembershipPaymentRepo>,
        gateways: Arc<GatewayFactory>,
        finalizer: Arc<Finalizer>,
    ) -> Self {
        Self {
            intents,
            carts,
            providers,
            plans,
            membership_payments,
            gateways,
            finalizer,
        }
    }

    /// Checkout the actor's cart: the intent amount is the cart total at
    /// creation time; the order itself is only produced by the finalizer
    /// once the charge settles.
    pub async fn create_cart_intent(
        &self,
        actor: Actor,
        gateway: Gateway,
    ) -> AppResult<PaymentIntent> {
        let cart = self
            .carts
            .get_for_actor(&actor)
            .await?
            .filter(|cart| !cart.is_empty())
            .ok_or_else(|| AppError::Validation("cart is empty".into()))?;

        let intent = self
            .intents
            .create(&NewPaymentIntent {
                actor,
                provider_id: cart.provider_id(),
                kind: IntentKind::ProviderPurchase,
                gateway,
                amount_cents: cart.total_cents(),
                currency: DEFAULT_CURRENCY.into(),
                voucher_payload: None,
                membership_payment_id: None,
                subscription_id: None,
                upgrade_to: None,
                is_mock: self.gateways.is_mock(gateway),
            })
            .await?;

        self.initiate(intent.id).await
    }

    /// Buy a voucher at a provider. The provider snapshot travels inside
    /// the intent so fulfillment is independent of later provider edits.
    pub async fn create_voucher_intent(
        &self,
        user_id: Uuid,
        provider_id: Uuid,
        face_value_cents: i64,
        gateway: Gateway,
    ) -> AppResult<PaymentIntent> {
        if face_value_cents <= 0 {
            return Err(AppError::Validation("face value must be positive".into()));
        }

        let provider = self
            .providers
            .get(provider_id)
            .await?
            .ok_or(AppError::NotFound)?;
        let discount_percent = provider
            .voucher_discount_percent
            .filter(|_| provider.sells_vouchers())
            .ok_or_else(|| {
                AppError::Validation("provider does not sell vouchers".into())
            })?;

        let price_cents = face_value_cents - face_value_cents * discount_percent as i64 / 100;

        let intent = self
            .intents
            .create(&NewPaymentIntent {
                actor: Actor::User(user_id),
                provider_id: Some(provider.id),
                kind: IntentKind::ProviderPurchase,
                gateway,
                amount_cents: price_cents,
                currency: DEFAULT_CURRENCY.into(),
                voucher_payload: Some(VoucherPayload {
                    face_value_cents,
                    discount_percent,
                    provider_name: provider.name.clone(),
                    logo_url: provider.logo_url.clone(),
                }),
                membership_payment_id: None,
                subscription_id: None,
                upgrade_to: None,
                is_mock: self.gateways.is_mock(gateway),
            })
            .await?;

        self.initiate(intent.id).await
    }

    /// Buy or renew a membership. Creates the pending MembershipPayment
    /// record first, then the intent that links to it; only the finalizer
    /// ever marks the payment paid.
    pub async fn create_membership_intent(
        &self,
        user_id: Uuid,
        plan_id: Uuid,
        cycle: MembershipCycle,
        gateway: Gateway,
    ) -> AppResult<PaymentIntent> {
        let plan = self.plans.get(plan_id).await?.ok_or(AppError::NotFound)?;
        if !plan.is_active {
            return Err(AppError::Validation("plan is not active".into()));
        }

        let amount_cents = plan.price_for(cycle);
        let payment = self
            .membership_payments
            .create(&NewMembershipPayment {
                user_id,
                plan_id: plan.id,
                gateway,
                amount_cents,
                cycle,
                cycle_days: cycle.days(),
            })
            .await?;

        let intent = self
            .intents
            .create(&NewPaymentIntent {
                actor: Actor::User(user_id),
                provider_id: None,
                kind: IntentKind::MembershipPurchase,
                gateway,
                amount_cents,
                currency: DEFAULT_CURRENCY.into(),
                voucher_payload: None,
                membership_payment_id: Some(payment.id),
                subscription_id: None,
                upgrade_to: None,
                is_mock: self.gateways.is_mock(gateway),
            })
            .await?;

        self.initiate(intent.id).await
    }

    /// Open the gateway charge for a pending intent. Idempotent: an
    /// intent that already has an external reference (or is already
    /// terminal) is returned as-is instead of being charged again.
    pub async fn initiate(&self, intent_id: Uuid) -> AppResult<PaymentIntent> {
        let intent = self
            .intents
            .get(intent_id)
            .await?
            .ok_or(AppError::NotFound)?;

        if intent.status.is_terminal() || intent.external_reference.is_some() {
            return Ok(intent);
        }

        let adapter = self.gateways.get(intent.gateway)?;
        let receipt = adapter
            .create_charge(&ChargeRequest {
                intent_id: intent.id,
                amount_cents: intent.amount_cents,
                currency: intent.currency.clone(),
                description: format!("{} {}", intent.kind, intent.id),
            })
            .await?;

        self.intents
            .set_external_reference(intent.id, &receipt.external_reference)
            .await?;

        // Mock mode settles inline, through the exact same claim path a
        // real webhook would take.
        match receipt.settled {
            Some(NotificationOutcome::Success) => {
                self.settle(intent.id).await?;
            }
            Some(NotificationOutcome::Failure) => {
                self.intents.mark_failed(intent.id).await?;
            }
            None => {}
        }

        self.intents
            .get(intent.id)
            .await?
            .ok_or(AppError::NotFound)
    }

    /// Status poll for a client waiting on an async gateway flow.
    pub async fn poll(&self, intent_id: Uuid) -> AppResult<PaymentIntent> {
        self.intents
            .get(intent_id)
            .await?
            .ok_or(AppError::NotFound)
    }

    /// Explicit void of a still-pending intent.
    pub async fn cancel(&self, intent_id: Uuid) -> AppResult<()> {
        let intent = self
            .intents
            .get(intent_id)
            .await?
            .ok_or(AppError::NotFound)?;
        if !self.intents.mark_cancelled(intent.id).await? {
            return Err(AppError::Conflict(format!(
                "intent already {}",
                intent.status
            )));
        }
        Ok(())
    }

    /// Webhook entry point: verify, map to the uniform notification
    /// shape, then race on the claim. The HTTP layer always acks the
    /// gateway regardless of what this returns.
    pub async fn handle_notification(
        &self,
        gateway: Gateway,
        raw_body: &[u8],
        signature: Option<&str>,
    ) -> AppResult<()> {
        let adapter = self.gateways.get(gateway)?;
        adapter.verify_signature(raw_body, signature)?;

        let payload: serde_json::Value = serde_json::from_slice(raw_body)
            .map_err(|e| AppError::Validation(format!("invalid webhook payload: {}", e)))?;
        let Some(notification) = adapter.parse_notification(&payload)? else {
            tracing::debug!(gateway = %gateway, "Non-decisive gateway event, ignoring");
            return Ok(());
        };

        self.apply_notification(gateway, &notification).await
    }

    /// Apply an already-parsed notification. Unknown references and
    /// replays for terminal intents are acked silently — gateways retry
    /// aggressively and out of order.
    pub async fn apply_notification(
        &self,
        gateway: Gateway,
        notification: &GatewayNotification,
    ) -> AppResult<()> {
        let Some(intent) = self
            .intents
            .find_by_external_reference(gateway, &notification.external_reference)
            .await?
        else {
            tracing::debug!(
                gateway = %gateway,
                external_reference = %notification.external_reference,
                "Notification for unknown reference, ignoring"
            );
            return Ok(());
        };

        if intent.status.is_terminal() {
            tracing::debug!(
                intent_id = %intent.id,
                status = %intent.status,
                idempotency_key = %notification.idempotency_key,
                "Replay for terminal intent, ignoring"
            );
            return Ok(());
        }

        match notification.outcome {
            NotificationOutcome::Failure => {
                self.intents.mark_failed(intent.id).await?;
                tracing::info!(intent_id = %intent.id, "Intent failed by gateway notification");
                Ok(())
            }
            NotificationOutcome::Success => self.settle(intent.id).await,
        }
    }

    /// Claim-and-finalize. Every settlement path — webhook, poll-driven
    /// confirmation, scheduler, mock mode — funnels through here; the
    /// conditional claim guarantees at most one caller reaches the
    /// finalizer.
    pub async fn settle(&self, intent_id: Uuid) -> AppResult<()> {
        let Some(claimed) = self.intents.claim_paid(intent_id).await? else {
            tracing::debug!(intent_id = %intent_id, "Lost the claim race, no side effects");
            return Ok(());
        };

        tracing::info!(
            intent_id = %claimed.id,
            kind = %claimed.kind,
            amount_cents = claimed.amount_cents,
            "Intent claimed as paid"
        );

        if let Err(error) = self.finalizer.fulfill(&claimed).await {
            // The intent stays paid; the gateway must still be acked. The
            // error is surfaced to non-webhook callers.
            tracing::error!(
                intent_id = %claimed.id,
                error = %error,
                "Fulfillment failed after claim"
            );
            return Err(error);
        }
        Ok(())
    }

    /// Whether the configured adapter for this gateway settles inline.
    pub fn is_mock(&self, gateway: Gateway) -> bool {
        self.gateways.is_mock(gateway)
    }
}
