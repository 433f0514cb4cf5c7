use std::fs::File;
use std::sync::Arc;

use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::{
    adapters::{http::app_state::AppState, persistence::PostgresPersistence},
    application::ports::payment_gateway::PaymentGatewayPort,
    application::use_cases::{
        billing::{BillingUseCases, SubscriptionInvoiceRepo, SubscriptionRepo},
        finalizer::Finalizer,
        gateway_factory::GatewayFactory,
        membership::{MembershipPaymentRepo, MembershipPlanRepo, MembershipUseCases,
            UserMembershipRepo},
        orders::{CartRepo, OrderRepo, OrderUseCases},
        payment_intent::{PaymentIntentRepo, PaymentIntentUseCases, ProviderRepo},
        voucher_qr::{VoucherQrUseCases, VoucherRepo},
        wallet::{WalletRepo, WalletUseCases},
    },
    domain::entities::gateway::Gateway,
    infra::{
        config::AppConfig,
        db::init_db,
        gateways::{mock::MockGateway, tabby::TabbyGateway, tamara::TamaraGateway, tap::TapGateway},
    },
};

pub async fn init_app_state() -> anyhow::Result<AppState> {
    let mut config = AppConfig::from_env();

    let pool = init_db(&config.database_url).await?;
    let postgres = Arc::new(PostgresPersistence::new(pool));

    // One adapter per gateway: live when credentials are configured,
    // mock otherwise. Mock mode keeps the whole claim/finalize path hot
    // in development and tests.
    let tap: Arc<dyn PaymentGatewayPort> = match config.tap_secret_key.take() {
        Some(secret) => Arc::new(TapGateway::new(
            secret,
            config.tap_webhook_key.take(),
            config.currency.clone(),
        )),
        None => {
            info!("TAP_SECRET_KEY not set, tap gateway runs in mock mode");
            Arc::new(MockGateway::new(Gateway::Tap))
        }
    };
    let tabby: Arc<dyn PaymentGatewayPort> = match config.tabby_secret_key.take() {
        Some(secret) => Arc::new(TabbyGateway::new(secret)),
        None => {
            info!("TABBY_SECRET_KEY not set, tabby gateway runs in mock mode");
            Arc::new(MockGateway::new(Gateway::Tabby))
        }
    };
    let tamara: Arc<dyn PaymentGatewayPort> = match config.tamara_api_token.take() {
        Some(token) => Arc::new(TamaraGateway::new(token)),
        None => {
            info!("TAMARA_API_TOKEN not set, tamara gateway runs in mock mode");
            Arc::new(MockGateway::new(Gateway::Tamara))
        }
    };
    let gateways = Arc::new(GatewayFactory::new(vec![tap, tabby, tamara]));

    let intent_repo = postgres.clone() as Arc<dyn PaymentIntentRepo>;
    let cart_repo = postgres.clone() as Arc<dyn CartRepo>;
    let order_repo = postgres.clone() as Arc<dyn OrderRepo>;
    let voucher_repo = postgres.clone() as Arc<dyn VoucherRepo>;
    let provider_repo = postgres.clone() as Arc<dyn ProviderRepo>;
    let plan_repo = postgres.clone() as Arc<dyn MembershipPlanRepo>;
    let membership_payment_repo = postgres.clone() as Arc<dyn MembershipPaymentRepo>;
    let user_membership_repo = postgres.clone() as Arc<dyn UserMembershipRepo>;
    let subscription_repo = postgres.clone() as Arc<dyn SubscriptionRepo>;
    let invoice_repo = postgres.clone() as Arc<dyn SubscriptionInvoiceRepo>;
    let wallet_repo = postgres.clone() as Arc<dyn WalletRepo>;

    let membership = Arc::new(MembershipUseCases::new(
        membership_payment_repo.clone(),
        user_membership_repo,
    ));

    let finalizer = Arc::new(Finalizer::new(
        cart_repo.clone(),
        order_repo.clone(),
        voucher_repo.clone(),
        membership.clone(),
        subscription_repo.clone(),
        invoice_repo.clone(),
        gateways.clone(),
    ));

    let payments = Arc::new(PaymentIntentUseCases::new(
        intent_repo.clone(),
        cart_repo,
        provider_repo,
        plan_repo.clone(),
        membership_payment_repo,
        gateways.clone(),
        finalizer.clone(),
    ));

    let billing = Arc::new(BillingUseCases::new(
        subscription_repo,
        invoice_repo,
        intent_repo,
        plan_repo,
        gateways.clone(),
        finalizer,
        config.subscription_retry_attempts,
    ));

    let vouchers = Arc::new(VoucherQrUseCases::new(voucher_repo));
    let orders = Arc::new(OrderUseCases::new(order_repo));
    let wallet = Arc::new(WalletUseCases::new(wallet_repo));

    Ok(AppState {
        config: Arc::new(config),
        payments,
        billing,
        membership,
        vouchers,
        orders,
        wallet,
        gateways,
    })
}

pub fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| "wafir_api=debug,tower_http=debug".into());

    // Console (pretty logs)
    let console_layer = fmt::layer()
        .with_target(false)
        .with_level(true)
        .pretty();

    // File (structured JSON logs)
    let file = File::create("app.log").expect("cannot create log file");
    let json_layer = fmt::layer()
        .json()
        .with_writer(file)
        .with_current_span(true)
        .with_span_list(true);

    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(json_layer)
        .try_init()
        .ok();
}
