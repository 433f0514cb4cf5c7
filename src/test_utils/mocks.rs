//! In-memory mock implementations of the repository traits. The mutable
//! maps sit behind a Mutex, so the conditional-update primitives
//! (`claim_paid`, `redeem_code`, `debit`, `try_create`) are atomic here
//! exactly as they are in Postgres — which is what makes the concurrency
//! properties testable without a database.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Mutex;
use uuid::Uuid;

use crate::{
    app_error::{AppError, AppResult},
    application::use_cases::{
        billing::{CycleAdvance, NewSubscription, NewSubscriptionInvoice,
            SubscriptionInvoiceRepo, SubscriptionRepo},
        membership::{MembershipPaymentRepo, MembershipPlanRepo, NewMembershipPayment,
            UserMembershipRepo},
        orders::{CartRepo, NewOrder, OrderRepo},
        payment_intent::{NewPaymentIntent, PaymentIntentRepo, ProviderRepo},
        voucher_qr::{NewOwnedVoucher, VoucherRepo},
        wallet::WalletRepo,
    },
    domain::entities::{
        cart::Cart,
        gateway::Gateway,
        membership::{MembershipPayment, MembershipPaymentStatus, MembershipPlan, UserMembership},
        order::{Order, OrderStatus},
        payment_intent::{Actor, IntentStatus, PaymentIntent},
        provider::ProviderProfile,
        subscription::{PendingPlanChange, Subscription, SubscriptionInvoice, SubscriptionStatus},
        voucher::{Voucher, VoucherStatus},
    },
};

fn actor_key(actor: &Actor) -> String {
    match actor {
        Actor::User(id) => format!("user:{}", id),
        Actor::Session(id) => format!("session:{}", id),
    }
}

// ============================================================================
// InMemoryPaymentIntentRepo
// ============================================================================

#[derive(Default)]
pub struct InMemoryPaymentIntentRepo {
    pub intents: Mutex<HashMap<Uuid, PaymentIntent>>,
}

impl InMemoryPaymentIntentRepo {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PaymentIntentRepo for InMemoryPaymentIntentRepo {
    async fn create(&self, input: &NewPaymentIntent) -> AppResult<PaymentIntent> {
        let now = Utc::now();
        let intent = PaymentIntent {
            id: Uuid::new_v4(),
            actor: input.actor.clone(),
            provider_id: input.provider_id,
            kind: input.kind,
            gateway: input.gateway,
            amount_cents: input.amount_cents,
            currency: input.currency.clone(),
            external_reference: None,
            voucher_payload: input.voucher_payload.clone(),
            membership_payment_id: input.membership_payment_id,
            subscription_id: input.subscription_id,
            upgrade_to: input.upgrade_to,
            is_mock: input.is_mock,
            status: IntentStatus::Pending,
            paid_at: None,
            created_at: now,
            updated_at: now,
        };
        self.intents
            .lock()
            .unwrap()
            .insert(intent.id, intent.clone());
        Ok(intent)
    }

    async fn get(&self, id: Uuid) -> AppResult<Option<PaymentIntent>> {
        Ok(self.intents.lock().unwrap().get(&id).cloned())
    }

    async fn find_by_external_reference(
        &self,
        gateway: Gateway,
        external_reference: &str,
    ) -> AppResult<Option<PaymentIntent>> {
        Ok(self
            .intents
            .lock()
            .unwrap()
            .values()
            .find(|intent| {
                intent.gateway == gateway
                    && intent.external_reference.as_deref() == Some(external_reference)
            })
            .cloned())
    }

    async fn set_external_reference(&self, id: Uuid, external_reference: &str) -> AppResult<()> {
        let mut intents = self.intents.lock().unwrap();
        let intent = intents.get_mut(&id).ok_or(AppError::NotFound)?;
        intent.external_reference = Some(external_reference.to_string());
        intent.updated_at = Utc::now();
        Ok(())
    }

    async fn claim_paid(&self, id: Uuid) -> AppResult<Option<PaymentIntent>> {
        let mut intents = self.intents.lock().unwrap();
        match intents.get_mut(&id) {
            Some(intent) if intent.status == IntentStatus::Pending => {
                intent.status = IntentStatus::Paid;
                intent.paid_at = Some(Utc::now());
                intent.updated_at = Utc::now();
                Ok(Some(intent.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn mark_failed(&self, id: Uuid) -> AppResult<bool> {
        let mut intents = self.intents.lock().unwrap();
        match intents.get_mut(&id) {
            Some(intent) if intent.status == IntentStatus::Pending => {
                intent.status = IntentStatus::Failed;
                intent.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn mark_cancelled(&self, id: Uuid) -> AppResult<bool> {
        let mut intents = self.intents.lock().unwrap();
        match intents.get_mut(&id) {
            Some(intent) if intent.status == IntentStatus::Pending => {
                intent.status = IntentStatus::Cancelled;
                intent.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

// ============================================================================
// InMemoryCartRepo
// ============================================================================

#[derive(Default)]
pub struct InMemoryCartRepo {
    pub carts: Mutex<HashMap<String, Cart>>,
}

impl InMemoryCartRepo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, cart: Cart) {
        self.carts
            .lock()
            .unwrap()
            .insert(actor_key(&cart.actor), cart);
    }
}

#[async_trait]
impl CartRepo for InMemoryCartRepo {
    async fn get_for_actor(&self, actor: &Actor) -> AppResult<Option<Cart>> {
        Ok(self.carts.lock().unwrap().get(&actor_key(actor)).cloned())
    }

    async fn clear_for_actor(&self, actor: &Actor) -> AppResult<()> {
        if let Some(cart) = self.carts.lock().unwrap().get_mut(&actor_key(actor)) {
            cart.items.clear();
        }
        Ok(())
    }
}

// ============================================================================
// InMemoryOrderRepo
// ============================================================================

#[derive(Default)]
pub struct InMemoryOrderRepo {
    pub orders: Mutex<HashMap<Uuid, Order>>,
}

impl InMemoryOrderRepo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, order: Order) {
        self.orders.lock().unwrap().insert(order.id, order);
    }

    pub fn all(&self) -> Vec<Order> {
        self.orders.lock().unwrap().values().cloned().collect()
    }
}

#[async_trait]
impl OrderRepo for InMemoryOrderRepo {
    async fn create(&self, input: &NewOrder) -> AppResult<Order> {
        let mut orders = self.orders.lock().unwrap();
        // Unique payment-intent linkage, like the ON CONFLICT path.
        if let Some(existing) = orders
            .values()
            .find(|order| order.payment.payment_intent_id == input.payment.payment_intent_id)
        {
            return Ok(existing.clone());
        }

        let now = Utc::now();
        let order = Order {
            id: Uuid::new_v4(),
            actor: input.actor.clone(),
            provider_id: input.provider_id,
            items: input.items.clone(),
            total_cents: input.total_cents,
            payment: input.payment.clone(),
            status: OrderStatus::Pending,
            cancel_reason: None,
            expires_at: Order::default_expiry(now),
            created_at: now,
        };
        orders.insert(order.id, order.clone());
        Ok(order)
    }

    async fn get(&self, id: Uuid) -> AppResult<Option<Order>> {
        Ok(self.orders.lock().unwrap().get(&id).cloned())
    }

    async fn get_by_payment_intent(&self, intent_id: Uuid) -> AppResult<Option<Order>> {
        Ok(self
            .orders
            .lock()
            .unwrap()
            .values()
            .find(|order| order.payment.payment_intent_id == intent_id)
            .cloned())
    }

    async fn list_by_provider(&self, provider_id: Uuid) -> AppResult<Vec<Order>> {
        let mut result: Vec<Order> = self
            .orders
            .lock()
            .unwrap()
            .values()
            .filter(|order| order.provider_id == provider_id)
            .cloned()
            .collect();
        result.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(result)
    }

    async fn sweep_expired(&self, provider_id: Uuid, now: DateTime<Utc>) -> AppResult<u64> {
        let mut swept = 0;
        for order in self.orders.lock().unwrap().values_mut() {
            if order.provider_id == provider_id
                && order.status == OrderStatus::Pending
                && order.expires_at < now
            {
                order.status = OrderStatus::Ignored;
                swept += 1;
            }
        }
        Ok(swept)
    }

    async fn update_status(
        &self,
        id: Uuid,
        status: OrderStatus,
        cancel_reason: Option<&str>,
    ) -> AppResult<Option<Order>> {
        let mut orders = self.orders.lock().unwrap();
        match orders.get_mut(&id) {
            Some(order) if order.status == OrderStatus::Pending => {
                order.status = status;
                if let Some(reason) = cancel_reason {
                    order.cancel_reason = Some(reason.to_string());
                }
                Ok(Some(order.clone()))
            }
            _ => Ok(None),
        }
    }
}

// ============================================================================
// InMemoryVoucherRepo
// ============================================================================

#[derive(Default)]
pub struct InMemoryVoucherRepo {
    pub vouchers: Mutex<HashMap<Uuid, Voucher>>,
}

impl InMemoryVoucherRepo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, voucher: Voucher) {
        self.vouchers.lock().unwrap().insert(voucher.id, voucher);
    }
}

#[async_trait]
impl VoucherRepo for InMemoryVoucherRepo {
    async fn create_owned(&self, input: &NewOwnedVoucher) -> AppResult<Voucher> {
        let voucher = Voucher {
            id: Uuid::new_v4(),
            provider_id: input.provider_id,
            owner_user_id: input.owner_user_id,
            name: input.name.clone(),
            provider_name: input.provider_name.clone(),
            logo_url: input.logo_url.clone(),
            currency: input.currency.clone(),
            face_value_cents: input.face_value_cents,
            price_cents: input.price_cents,
            status: VoucherStatus::Unused,
            valid_until: input.valid_until,
            code: None,
            code_issued_at: None,
            code_expires_at: None,
            redeemed_at: None,
            purchased_at: Utc::now(),
        };
        self.vouchers
            .lock()
            .unwrap()
            .insert(voucher.id, voucher.clone());
        Ok(voucher)
    }

    async fn get(&self, id: Uuid) -> AppResult<Option<Voucher>> {
        Ok(self.vouchers.lock().unwrap().get(&id).cloned())
    }

    async fn find_by_code(&self, code: &str) -> AppResult<Option<Voucher>> {
        Ok(self
            .vouchers
            .lock()
            .unwrap()
            .values()
            .find(|voucher| voucher.code.as_deref() == Some(code))
            .cloned())
    }

    async fn set_code(
        &self,
        id: Uuid,
        code: &str,
        issued_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> AppResult<()> {
        let mut vouchers = self.vouchers.lock().unwrap();
        let voucher = vouchers.get_mut(&id).ok_or(AppError::NotFound)?;
        voucher.code = Some(code.to_string());
        voucher.code_issued_at = Some(issued_at);
        voucher.code_expires_at = Some(expires_at);
        Ok(())
    }

    async fn redeem_code(&self, code: &str, now: DateTime<Utc>) -> AppResult<Option<Voucher>> {
        let mut vouchers = self.vouchers.lock().unwrap();
        let matched = vouchers.values_mut().find(|voucher| {
            voucher.code.as_deref() == Some(code)
                && voucher.status == VoucherStatus::Unused
                && voucher.code_expires_at.is_some_and(|at| at > now)
        });
        match matched {
            Some(voucher) => {
                voucher.status = VoucherStatus::Redeemed;
                voucher.redeemed_at = Some(now);
                Ok(Some(voucher.clone()))
            }
            None => Ok(None),
        }
    }

    async fn list_by_owner(&self, owner_user_id: Uuid) -> AppResult<Vec<Voucher>> {
        Ok(self
            .vouchers
            .lock()
            .unwrap()
            .values()
            .filter(|voucher| voucher.owner_user_id == owner_user_id)
            .cloned()
            .collect())
    }
}

// ============================================================================
// InMemoryProviderRepo / InMemoryMembershipPlanRepo
// ============================================================================

#[derive(Default)]
pub struct InMemoryProviderRepo {
    pub providers: Mutex<HashMap<Uuid, ProviderProfile>>,
}

impl InMemoryProviderRepo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, provider: ProviderProfile) {
        self.providers
            .lock()
            .unwrap()
            .insert(provider.id, provider);
    }
}

#[async_trait]
impl ProviderRepo for InMemoryProviderRepo {
    async fn get(&self, id: Uuid) -> AppResult<Option<ProviderProfile>> {
        Ok(self.providers.lock().unwrap().get(&id).cloned())
    }
}

#[derive(Default)]
pub struct InMemoryMembershipPlanRepo {
    pub plans: Mutex<HashMap<Uuid, MembershipPlan>>,
}

impl InMemoryMembershipPlanRepo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, plan: MembershipPlan) {
        self.plans.lock().unwrap().insert(plan.id, plan);
    }
}

#[async_trait]
impl MembershipPlanRepo for InMemoryMembershipPlanRepo {
    async fn get(&self, id: Uuid) -> AppResult<Option<MembershipPlan>> {
        Ok(self.plans.lock().unwrap().get(&id).cloned())
    }
}

// ============================================================================
// InMemoryMembershipPaymentRepo / InMemoryUserMembershipRepo
// ============================================================================

#[derive(Default)]
pub struct InMemoryMembershipPaymentRepo {
    pub payments: Mutex<HashMap<Uuid, MembershipPayment>>,
}

impl InMemoryMembershipPaymentRepo {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MembershipPaymentRepo for InMemoryMembershipPaymentRepo {
    async fn create(&self, input: &NewMembershipPayment) -> AppResult<MembershipPayment> {
        let payment = MembershipPayment {
            id: Uuid::new_v4(),
            user_id: input.user_id,
            plan_id: input.plan_id,
            gateway: input.gateway,
            amount_cents: input.amount_cents,
            cycle: input.cycle,
            cycle_days: input.cycle_days,
            status: MembershipPaymentStatus::Pending,
            paid_at: None,
            created_at: Utc::now(),
        };
        self.payments
            .lock()
            .unwrap()
            .insert(payment.id, payment.clone());
        Ok(payment)
    }

    async fn get(&self, id: Uuid) -> AppResult<Option<MembershipPayment>> {
        Ok(self.payments.lock().unwrap().get(&id).cloned())
    }

    async fn mark_paid(&self, id: Uuid, paid_at: DateTime<Utc>) -> AppResult<bool> {
        let mut payments = self.payments.lock().unwrap();
        match payments.get_mut(&id) {
            Some(payment) if payment.status == MembershipPaymentStatus::Pending => {
                payment.status = MembershipPaymentStatus::Paid;
                payment.paid_at = Some(paid_at);
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

#[derive(Default)]
pub struct InMemoryUserMembershipRepo {
    pub memberships: Mutex<HashMap<Uuid, UserMembership>>,
}

impl InMemoryUserMembershipRepo {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserMembershipRepo for InMemoryUserMembershipRepo {
    async fn get_by_user(&self, user_id: Uuid) -> AppResult<Option<UserMembership>> {
        Ok(self
            .memberships
            .lock()
            .unwrap()
            .values()
            .find(|membership| membership.user_id == user_id)
            .cloned())
    }

    async fn create(
        &self,
        user_id: Uuid,
        plan_id: Uuid,
        start_date: DateTime<Utc>,
        end_date: DateTime<Utc>,
    ) -> AppResult<UserMembership> {
        let mut memberships = self.memberships.lock().unwrap();
        // Upsert on user_id, like the unique-key path in Postgres.
        if let Some(existing) = memberships
            .values_mut()
            .find(|membership| membership.user_id == user_id)
        {
            existing.plan_id = plan_id;
            existing.start_date = start_date;
            existing.end_date = end_date;
            existing.is_active = true;
            existing.updated_at = Utc::now();
            return Ok(existing.clone());
        }
        let now = Utc::now();
        let membership = UserMembership {
            id: Uuid::new_v4(),
            user_id,
            plan_id,
            start_date,
            end_date,
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        memberships.insert(membership.id, membership.clone());
        Ok(membership)
    }

    async fn set_period(
        &self,
        id: Uuid,
        plan_id: Uuid,
        start_date: DateTime<Utc>,
        end_date: DateTime<Utc>,
    ) -> AppResult<()> {
        let mut memberships = self.memberships.lock().unwrap();
        let membership = memberships.get_mut(&id).ok_or(AppError::NotFound)?;
        membership.plan_id = plan_id;
        membership.start_date = start_date;
        membership.end_date = end_date;
        membership.is_active = true;
        membership.updated_at = Utc::now();
        Ok(())
    }
}

// ============================================================================
// InMemorySubscriptionRepo / InMemorySubscriptionInvoiceRepo
// ============================================================================

#[derive(Default)]
pub struct InMemorySubscriptionRepo {
    pub subscriptions: Mutex<HashMap<Uuid, Subscription>>,
}

impl InMemorySubscriptionRepo {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reposition the billing clock, for driving a subscription due.
    pub fn set_next_billing_at(&self, id: Uuid, at: DateTime<Utc>) {
        if let Some(subscription) = self.subscriptions.lock().unwrap().get_mut(&id) {
            subscription.next_billing_at = at;
        }
    }
}

#[async_trait]
impl SubscriptionRepo for InMemorySubscriptionRepo {
    async fn create(&self, input: &NewSubscription) -> AppResult<Subscription> {
        let now = Utc::now();
        let subscription = Subscription {
            id: Uuid::new_v4(),
            user_id: input.user_id,
            plan_id: input.plan_id,
            gateway: input.gateway,
            amount_cents: input.amount_cents,
            currency: input.currency.clone(),
            card_token: input.card_token.clone(),
            card_last4: input.card_last4.clone(),
            current_cycle: 1,
            next_billing_at: input.next_billing_at,
            retry_count: 0,
            pending_change: None,
            status: SubscriptionStatus::Active,
            created_at: now,
            updated_at: now,
        };
        self.subscriptions
            .lock()
            .unwrap()
            .insert(subscription.id, subscription.clone());
        Ok(subscription)
    }

    async fn get(&self, id: Uuid) -> AppResult<Option<Subscription>> {
        Ok(self.subscriptions.lock().unwrap().get(&id).cloned())
    }

    async fn get_active_by_user(&self, user_id: Uuid) -> AppResult<Option<Subscription>> {
        Ok(self
            .subscriptions
            .lock()
            .unwrap()
            .values()
            .find(|subscription| {
                subscription.user_id == user_id
                    && subscription.status == SubscriptionStatus::Active
            })
            .cloned())
    }

    async fn list_due(&self, now: DateTime<Utc>, limit: i64) -> AppResult<Vec<Subscription>> {
        let mut due: Vec<Subscription> = self
            .subscriptions
            .lock()
            .unwrap()
            .values()
            .filter(|subscription| subscription.is_due(now))
            .cloned()
            .collect();
        due.sort_by_key(|subscription| subscription.next_billing_at);
        due.truncate(limit as usize);
        Ok(due)
    }

    async fn advance_cycle(&self, id: Uuid, update: &CycleAdvance) -> AppResult<()> {
        let mut subscriptions = self.subscriptions.lock().unwrap();
        let subscription = subscriptions.get_mut(&id).ok_or(AppError::NotFound)?;
        subscription.current_cycle = update.current_cycle;
        subscription.next_billing_at = update.next_billing_at;
        subscription.plan_id = update.plan_id;
        subscription.amount_cents = update.amount_cents;
        subscription.retry_count = 0;
        if update.clear_pending {
            subscription.pending_change = None;
        }
        subscription.updated_at = Utc::now();
        Ok(())
    }

    async fn record_failure(
        &self,
        id: Uuid,
        retry_count: i32,
        status: SubscriptionStatus,
    ) -> AppResult<()> {
        let mut subscriptions = self.subscriptions.lock().unwrap();
        let subscription = subscriptions.get_mut(&id).ok_or(AppError::NotFound)?;
        subscription.retry_count = retry_count;
        subscription.status = status;
        subscription.updated_at = Utc::now();
        Ok(())
    }

    async fn set_pending_change(&self, id: Uuid, change: &PendingPlanChange) -> AppResult<()> {
        let mut subscriptions = self.subscriptions.lock().unwrap();
        let subscription = subscriptions.get_mut(&id).ok_or(AppError::NotFound)?;
        subscription.pending_change = Some(*change);
        subscription.updated_at = Utc::now();
        Ok(())
    }

    async fn apply_plan_now(&self, id: Uuid, plan_id: Uuid, amount_cents: i64) -> AppResult<()> {
        let mut subscriptions = self.subscriptions.lock().unwrap();
        let subscription = subscriptions.get_mut(&id).ok_or(AppError::NotFound)?;
        subscription.plan_id = plan_id;
        subscription.amount_cents = amount_cents;
        subscription.pending_change = None;
        subscription.updated_at = Utc::now();
        Ok(())
    }

    async fn cancel(&self, id: Uuid) -> AppResult<()> {
        let mut subscriptions = self.subscriptions.lock().unwrap();
        let subscription = subscriptions.get_mut(&id).ok_or(AppError::NotFound)?;
        subscription.status = SubscriptionStatus::Canceled;
        subscription.updated_at = Utc::now();
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemorySubscriptionInvoiceRepo {
    pub invoices: Mutex<Vec<SubscriptionInvoice>>,
}

impl InMemorySubscriptionInvoiceRepo {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SubscriptionInvoiceRepo for InMemorySubscriptionInvoiceRepo {
    async fn exists_for_cycle(
        &self,
        subscription_id: Uuid,
        billing_cycle: i32,
    ) -> AppResult<bool> {
        Ok(self.invoices.lock().unwrap().iter().any(|invoice| {
            invoice.subscription_id == subscription_id && invoice.billing_cycle == billing_cycle
        }))
    }

    async fn try_create(&self, input: &NewSubscriptionInvoice) -> AppResult<bool> {
        let mut invoices = self.invoices.lock().unwrap();
        // Unique (subscription_id, billing_cycle), like the DB index.
        if invoices.iter().any(|invoice| {
            invoice.subscription_id == input.subscription_id
                && invoice.billing_cycle == input.billing_cycle
        }) {
            return Ok(false);
        }
        invoices.push(SubscriptionInvoice {
            id: Uuid::new_v4(),
            subscription_id: input.subscription_id,
            payment_intent_id: input.payment_intent_id,
            billing_cycle: input.billing_cycle,
            amount_cents: input.amount_cents,
            status: input.status,
            billed_at: input.billed_at,
        });
        Ok(true)
    }

    async fn list_by_subscription(
        &self,
        subscription_id: Uuid,
    ) -> AppResult<Vec<SubscriptionInvoice>> {
        let mut result: Vec<SubscriptionInvoice> = self
            .invoices
            .lock()
            .unwrap()
            .iter()
            .filter(|invoice| invoice.subscription_id == subscription_id)
            .cloned()
            .collect();
        result.sort_by_key(|invoice| invoice.billing_cycle);
        Ok(result)
    }
}

// ============================================================================
// InMemoryWalletRepo
// ============================================================================

#[derive(Default)]
pub struct InMemoryWalletRepo {
    pub balances: Mutex<HashMap<Uuid, i64>>,
}

impl InMemoryWalletRepo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_balance(&self, user_id: Uuid, balance_cents: i64) {
        self.balances.lock().unwrap().insert(user_id, balance_cents);
    }
}

#[async_trait]
impl WalletRepo for InMemoryWalletRepo {
    async fn balance(&self, user_id: Uuid) -> AppResult<Option<i64>> {
        Ok(self.balances.lock().unwrap().get(&user_id).copied())
    }

    async fn debit(&self, user_id: Uuid, amount_cents: i64) -> AppResult<Option<i64>> {
        let mut balances = self.balances.lock().unwrap();
        match balances.get_mut(&user_id) {
            Some(balance) if *balance >= amount_cents => {
                *balance -= amount_cents;
                Ok(Some(*balance))
            }
            _ => Ok(None),
        }
    }

    async fn credit(&self, user_id: Uuid, amount_cents: i64) -> AppResult<Option<i64>> {
        let mut balances = self.balances.lock().unwrap();
        match balances.get_mut(&user_id) {
            Some(balance) => {
                *balance += amount_cents;
                Ok(Some(*balance))
            }
            None => Ok(None),
        }
    }
}
