//! Fully-wired test harness: every repo in memory, every gateway a mock,
//! the same use-case graph `infra::setup` builds for production.

use std::collections::HashMap;
use std::sync::Arc;

use axum::http::HeaderValue;
use uuid::Uuid;

use crate::{
    adapters::http::app_state::AppState,
    application::ports::payment_gateway::PaymentGatewayPort,
    application::use_cases::{
        billing::BillingUseCases,
        finalizer::Finalizer,
        gateway_factory::GatewayFactory,
        membership::MembershipUseCases,
        orders::OrderUseCases,
        payment_intent::PaymentIntentUseCases,
        voucher_qr::VoucherQrUseCases,
        wallet::WalletUseCases,
    },
    domain::entities::{
        cart::Cart,
        gateway::Gateway,
        membership::MembershipPlan,
        order::Order,
        payment_intent::Actor,
        provider::ProviderProfile,
        voucher::Voucher,
    },
    infra::{config::AppConfig, gateways::mock::MockGateway},
    test_utils::{factories, mocks::*},
};

pub const TEST_RETRY_LIMIT: i32 = 3;

pub struct TestHarness {
    pub intents: Arc<InMemoryPaymentIntentRepo>,
    pub carts: Arc<InMemoryCartRepo>,
    pub order_repo: Arc<InMemoryOrderRepo>,
    pub voucher_repo: Arc<InMemoryVoucherRepo>,
    pub provider_repo: Arc<InMemoryProviderRepo>,
    pub plan_repo: Arc<InMemoryMembershipPlanRepo>,
    pub membership_payment_repo: Arc<InMemoryMembershipPaymentRepo>,
    pub user_membership_repo: Arc<InMemoryUserMembershipRepo>,
    pub subscription_repo: Arc<InMemorySubscriptionRepo>,
    pub invoice_repo: Arc<InMemorySubscriptionInvoiceRepo>,
    pub wallet_repo: Arc<InMemoryWalletRepo>,
    pub mock_gateways: HashMap<Gateway, Arc<MockGateway>>,
    pub gateways: Arc<GatewayFactory>,
    pub payments: Arc<PaymentIntentUseCases>,
    pub billing: Arc<BillingUseCases>,
    pub membership: Arc<MembershipUseCases>,
    pub vouchers: Arc<VoucherQrUseCases>,
    pub orders: Arc<OrderUseCases>,
    pub wallet: Arc<WalletUseCases>,
}

fn test_config() -> AppConfig {
    AppConfig {
        bind_addr: "127.0.0.1:0".parse().unwrap(),
        database_url: "postgres://unused-in-tests".into(),
        cors_origin: HeaderValue::from_static("http://localhost:3000"),
        currency: "SAR".into(),
        tap_secret_key: None,
        tap_webhook_key: None,
        tabby_secret_key: None,
        tamara_api_token: None,
        subscription_retry_attempts: TEST_RETRY_LIMIT,
        billing_poll_interval_secs: 3600,
    }
}

impl TestHarness {
    /// All gateways settle inline (mock mode as production sees it).
    pub fn new() -> Self {
        Self::build(false)
    }

    /// All gateways leave charges pending, mimicking live gateways whose
    /// confirmation arrives later by webhook.
    pub fn live() -> Self {
        Self::build(true)
    }

    fn build(deferred: bool) -> Self {
        let intents = Arc::new(InMemoryPaymentIntentRepo::new());
        let carts = Arc::new(InMemoryCartRepo::new());
        let order_repo = Arc::new(InMemoryOrderRepo::new());
        let voucher_repo = Arc::new(InMemoryVoucherRepo::new());
        let provider_repo = Arc::new(InMemoryProviderRepo::new());
        let plan_repo = Arc::new(InMemoryMembershipPlanRepo::new());
        let membership_payment_repo = Arc::new(InMemoryMembershipPaymentRepo::new());
        let user_membership_repo = Arc::new(InMemoryUserMembershipRepo::new());
        let subscription_repo = Arc::new(InMemorySubscriptionRepo::new());
        let invoice_repo = Arc::new(InMemorySubscriptionInvoiceRepo::new());
        let wallet_repo = Arc::new(InMemoryWalletRepo::new());

        let mut mock_gateways = HashMap::new();
        let mut adapters: Vec<Arc<dyn PaymentGatewayPort>> = Vec::new();
        for gateway in Gateway::ALL {
            let mock = Arc::new(if deferred {
                MockGateway::deferred(gateway)
            } else {
                MockGateway::new(gateway)
            });
            mock_gateways.insert(gateway, mock.clone());
            adapters.push(mock);
        }
        let gateways = Arc::new(GatewayFactory::new(adapters));

        let membership = Arc::new(MembershipUseCases::new(
            membership_payment_repo.clone(),
            user_membership_repo.clone(),
        ));

        let finalizer = Arc::new(Finalizer::new(
            carts.clone(),
            order_repo.clone(),
            voucher_repo.clone(),
            membership.clone(),
            subscription_repo.clone(),
            invoice_repo.clone(),
            gateways.clone(),
        ));

        let payments = Arc::new(PaymentIntentUseCases::new(
            intents.clone(),
            carts.clone(),
            provider_repo.clone(),
            plan_repo.clone(),
            membership_payment_repo.clone(),
            gateways.clone(),
            finalizer.clone(),
        ));

        let billing = Arc::new(BillingUseCases::new(
            subscription_repo.clone(),
            invoice_repo.clone(),
            intents.clone(),
            plan_repo.clone(),
            gateways.clone(),
            finalizer,
            TEST_RETRY_LIMIT,
        ));

        let vouchers = Arc::new(VoucherQrUseCases::new(voucher_repo.clone()));
        let orders = Arc::new(OrderUseCases::new(order_repo.clone()));
        let wallet = Arc::new(WalletUseCases::new(wallet_repo.clone()));

        Self {
            intents,
            carts,
            order_repo,
            voucher_repo,
            provider_repo,
            plan_repo,
            membership_payment_repo,
            user_membership_repo,
            subscription_repo,
            invoice_repo,
            wallet_repo,
            mock_gateways,
            gateways,
            payments,
            billing,
            membership,
            vouchers,
            orders,
            wallet,
        }
    }

    pub fn app_state(&self) -> AppState {
        AppState {
            config: Arc::new(test_config()),
            payments: self.payments.clone(),
            billing: self.billing.clone(),
            membership: self.membership.clone(),
            vouchers: self.vouchers.clone(),
            orders: self.orders.clone(),
            wallet: self.wallet.clone(),
            gateways: self.gateways.clone(),
        }
    }

    // ------------------------------------------------------------------
    // Seeding helpers
    // ------------------------------------------------------------------

    pub fn seed_cart(&self, actor: &Actor, items: usize) -> Cart {
        let provider_id = Uuid::new_v4();
        let cart = Cart {
            id: Uuid::new_v4(),
            actor: actor.clone(),
            items: (0..items)
                .map(|i| factories::cart_item(provider_id, 1500 + i as i64 * 100, 1))
                .collect(),
        };
        self.carts.insert(cart.clone());
        cart
    }

    pub fn seed_provider(&self, voucher_discount_percent: Option<i32>) -> ProviderProfile {
        let provider = factories::provider(voucher_discount_percent);
        self.provider_repo.insert(provider.clone());
        provider
    }

    pub fn seed_plan(&self, monthly_price_cents: i64, yearly_price_cents: i64) -> MembershipPlan {
        let plan = factories::plan(monthly_price_cents, yearly_price_cents);
        self.plan_repo.insert(plan.clone());
        plan
    }

    // ------------------------------------------------------------------
    // Inspection helpers
    // ------------------------------------------------------------------

    pub fn orders_for_intent(&self, intent_id: Uuid) -> Vec<Order> {
        self.order_repo
            .all()
            .into_iter()
            .filter(|order| order.payment.payment_intent_id == intent_id)
            .collect()
    }

    pub fn vouchers_owned_by(&self, owner_user_id: Uuid) -> Vec<Voucher> {
        self.voucher_repo
            .vouchers
            .lock()
            .unwrap()
            .values()
            .filter(|voucher| voucher.owner_user_id == owner_user_id)
            .cloned()
            .collect()
    }

    pub fn charges_created(&self) -> usize {
        self.mock_gateways
            .values()
            .map(|mock| mock.charges_created())
            .sum()
    }

    pub fn refunds_issued(&self) -> usize {
        self.mock_gateways
            .values()
            .map(|mock| mock.refunds_issued())
            .sum()
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}
