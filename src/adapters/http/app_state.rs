use std::sync::Arc;

use crate::{
    application::use_cases::{
        billing::BillingUseCases, gateway_factory::GatewayFactory, membership::MembershipUseCases,
        orders::OrderUseCases, payment_intent::PaymentIntentUseCases, voucher_qr::VoucherQrUseCases,
        wallet::WalletUseCases,
    },
    infra::config::AppConfig,
};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub payments: Arc<PaymentIntentUseCases>,
    pub billing: Arc<BillingUseCases>,
    pub membership: Arc<MembershipUseCases>,
    pub vouchers: Arc<VoucherQrUseCases>,
    pub orders: Arc<OrderUseCases>,
    pub wallet: Arc<WalletUseCases>,
    pub gateways: Arc<GatewayFactory>,
}
