use chrono::Utc;
use std::sync::Arc;

use crate::{
    app_error::AppResult,
    application::use_cases::{
        billing::{add_one_month_clamped, CycleAdvance, NewSubscriptionInvoice,
            SubscriptionInvoiceRepo, SubscriptionRepo},
        gateway_factory::GatewayFactory,
        membership::MembershipUseCases,
        orders::{CartRepo, NewOrder, OrderRepo},
        voucher_qr::{NewOwnedVoucher, VoucherRepo},
    },
    domain::entities::{
        order::{OrderItem, PaymentLink},
        payment_intent::{IntentKind, PaymentIntent},
        subscription::InvoiceStatus,
    },
};

/// The idempotent dispatcher: given a PaymentIntent the caller has just
/// atomically claimed as paid, performs exactly the correct fulfillment
/// side effect for its kind. The finalizer never retries; redelivery is
/// the webhook/scheduler's concern and every entry point races on the
/// same claim before reaching here.
#[derive(Clone)]
pub struct Finalizer {
    carts: Arc<dyn CartRepo>,
    orders: Arc<dyn OrderRepo>,
    vouchers: Arc<dyn VoucherRepo>,
    membership: Arc<MembershipUseCases>,
    subs: Arc<dyn SubscriptionRepo>,
    invoices: Arc<dyn SubscriptionInvoiceRepo>,
    gateways: Arc<GatewayFactory>,
}

impl Finalizer {
    pub fn new(
        carts: Arc<dyn CartRepo>,
        orders: Arc<dyn OrderRepo>,
        vouchers: Arc<dyn VoucherRepo>,
        membership: Arc<MembershipUseCases>,
        subs: Arc<dyn SubscriptionRepo>,
        invoices: Arc<dyn SubscriptionInvoiceRepo>,
        gateways: Arc<GatewayFactory>,
    ) -> Self {
        Self {
            carts,
            orders,
            vouchers,
            membership,
            subs,
            invoices,
            gateways,
        }
    }

    pub async fn fulfill(&self, intent: &PaymentIntent) -> AppResult<()> {
        match intent.kind {
            IntentKind::MembershipPurchase => self.fulfill_membership(intent).await,
            IntentKind::ProviderPurchase if intent.voucher_payload.is_some() => {
                self.fulfill_voucher(intent).await
            }
            IntentKind::ProviderPurchase => self.fulfill_cart(intent).await,
            IntentKind::SubscriptionCharge => self.fulfill_subscription_charge(intent).await,
            IntentKind::UpgradeProration => self.fulfill_upgrade(intent).await,
        }
    }

    async fn fulfill_membership(&self, intent: &PaymentIntent) -> AppResult<()> {
        let Some(membership_payment_id) = intent.membership_payment_id else {
            tracing::warn!(
                intent_id = %intent.id,
                "Membership intent without a payment link, nothing to fulfill"
            );
            return Ok(());
        };
        self.membership
            .apply_paid_payment(membership_payment_id)
            .await
    }

    async fn fulfill_voucher(&self, intent: &PaymentIntent) -> AppResult<()> {
        let Some(payload) = intent.voucher_payload.as_ref() else {
            tracing::warn!(intent_id = %intent.id, "Voucher intent without a payload");
            return Ok(());
        };
        let Some(owner_user_id) = intent.actor.user_id() else {
            tracing::warn!(
                intent_id = %intent.id,
                "Voucher purchase by a guest session, nothing to fulfill"
            );
            return Ok(());
        };
        let Some(provider_id) = intent.provider_id else {
            tracing::warn!(intent_id = %intent.id, "Voucher intent without a provider");
            return Ok(());
        };

        let face_major = payload.face_value_cents / 100;
        let voucher = self
            .vouchers
            .create_owned(&NewOwnedVoucher {
                provider_id,
                owner_user_id,
                name: format!(
                    "{} {}{} voucher",
                    payload.provider_name, intent.currency, face_major
                ),
                provider_name: payload.provider_name.clone(),
                logo_url: payload.logo_url.clone(),
                currency: intent.currency.clone(),
                face_value_cents: payload.face_value_cents,
                price_cents: intent.amount_cents,
                valid_until: None,
            })
            .await?;

        tracing::info!(
            intent_id = %intent.id,
            voucher_id = %voucher.id,
            owner_user_id = %owner_user_id,
            "Voucher issued"
        );
        Ok(())
    }

    async fn fulfill_cart(&self, intent: &PaymentIntent) -> AppResult<()> {
        let cart = self.carts.get_for_actor(&intent.actor).await?;
        let items: Vec<OrderItem> = cart
            .map(|cart| {
                cart.items
                    .iter()
                    .map(|item| OrderItem {
                        product_id: item.product_id,
                        name: item.name.clone(),
                        image_url: item.image_url.clone(),
                        price_cents: item.price_cents,
                        quantity: item.quantity,
                    })
                    .collect()
            })
            .unwrap_or_default();

        if items.is_empty() {
            // The cart mutated between charge creation and confirmation;
            // the money is captured but there is nothing to fulfill.
            // Policy: refund and create no order.
            self.refund_empty_cart(intent).await;
            return Ok(());
        }

        let provider_id = match intent.provider_id {
            Some(id) => id,
            None => {
                tracing::warn!(intent_id = %intent.id, "Cart intent without a provider");
                return Ok(());
            }
        };

        let order = self
            .orders
            .create(&NewOrder {
                actor: intent.actor.clone(),
                provider_id,
                items,
                total_cents: intent.amount_cents,
                payment: PaymentLink {
                    gateway: intent.gateway,
                    payment_intent_id: intent.id,
                    paid_at: intent.paid_at.unwrap_or_else(Utc::now),
                },
            })
            .await?;
        self.carts.clear_for_actor(&intent.actor).await?;

        tracing::info!(
            intent_id = %intent.id,
            order_id = %order.id,
            total_cents = order.total_cents,
            "Order created from cart"
        );
        Ok(())
    }

    async fn refund_empty_cart(&self, intent: &PaymentIntent) {
        tracing::warn!(
            intent_id = %intent.id,
            amount_cents = intent.amount_cents,
            "Cart empty at finalization, refunding captured amount"
        );
        let Some(external_reference) = intent.external_reference.as_deref() else {
            tracing::error!(
                intent_id = %intent.id,
                "Paid intent has no external reference, cannot refund"
            );
            return;
        };
        match self.gateways.get(intent.gateway) {
            Ok(adapter) => {
                if let Err(error) = adapter.refund(external_reference, intent.amount_cents).await {
                    tracing::error!(
                        intent_id = %intent.id,
                        error = %error,
                        "Refund for empty-cart intent failed, leaving for manual review"
                    );
                }
            }
            Err(error) => {
                tracing::error!(intent_id = %intent.id, error = %error, "No adapter for refund");
            }
        }
    }

    /// Record the paid invoice and advance the billing cycle. The unique
    /// (subscription_id, billing_cycle) key makes this safe against both
    /// webhook replays and overlapping scheduler runs.
    async fn fulfill_subscription_charge(&self, intent: &PaymentIntent) -> AppResult<()> {
        let Some(subscription_id) = intent.subscription_id else {
            tracing::warn!(intent_id = %intent.id, "Subscription charge without a link");
            return Ok(());
        };
        let Some(subscription) = self.subs.get(subscription_id).await? else {
            tracing::warn!(
                intent_id = %intent.id,
                subscription_id = %subscription_id,
                "Paid charge references a missing subscription"
            );
            return Ok(());
        };

        let created = self
            .invoices
            .try_create(&NewSubscriptionInvoice {
                subscription_id: subscription.id,
                payment_intent_id: intent.id,
                billing_cycle: subscription.current_cycle,
                amount_cents: intent.amount_cents,
                status: InvoiceStatus::Paid,
                billed_at: intent.paid_at.unwrap_or_else(Utc::now),
            })
            .await?;
        if !created {
            tracing::debug!(
                subscription_id = %subscription.id,
                billing_cycle = subscription.current_cycle,
                "Cycle already invoiced, not advancing twice"
            );
            return Ok(());
        }

        // A queued downgrade takes effect here, at the cycle boundary.
        let (plan_id, amount_cents, clear_pending) = match subscription.pending_change {
            Some(change) => (change.plan_id, change.amount_cents, true),
            None => (subscription.plan_id, subscription.amount_cents, false),
        };

        self.subs
            .advance_cycle(
                subscription.id,
                &CycleAdvance {
                    current_cycle: subscription.current_cycle + 1,
                    next_billing_at: add_one_month_clamped(subscription.next_billing_at),
                    plan_id,
                    amount_cents,
                    clear_pending,
                },
            )
            .await?;

        tracing::info!(
            subscription_id = %subscription.id,
            billing_cycle = subscription.current_cycle,
            downgrade_applied = clear_pending,
            "Billing cycle advanced"
        );
        Ok(())
    }

    /// Apply the upgrade the proration intent paid for.
    async fn fulfill_upgrade(&self, intent: &PaymentIntent) -> AppResult<()> {
        let (Some(subscription_id), Some(change)) = (intent.subscription_id, intent.upgrade_to)
        else {
            tracing::warn!(intent_id = %intent.id, "Upgrade intent without a target plan");
            return Ok(());
        };
        self.subs
            .apply_plan_now(subscription_id, change.plan_id, change.amount_cents)
            .await?;
        tracing::info!(
            subscription_id = %subscription_id,
            plan_id = %change.plan_id,
            "Upgrade applied"
        );
        Ok(())
    }
}
