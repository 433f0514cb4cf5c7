use std::collections::HashMap;
use std::sync::Arc;

use crate::{
    app_error::{AppError, AppResult},
    application::ports::payment_gateway::PaymentGatewayPort,
    domain::entities::gateway::Gateway,
};

/// Resolves the adapter for a gateway. Built once at startup with one
/// adapter per gateway: the live integration when credentials are
/// configured, the mock adapter otherwise.
pub struct GatewayFactory {
    adapters: HashMap<Gateway, Arc<dyn PaymentGatewayPort>>,
}

impl GatewayFactory {
    pub fn new(adapters: Vec<Arc<dyn PaymentGatewayPort>>) -> Self {
        let adapters = adapters
            .into_iter()
            .map(|adapter| (adapter.gateway(), adapter))
            .collect();
        Self { adapters }
    }

    pub fn get(&self, gateway: Gateway) -> AppResult<Arc<dyn PaymentGatewayPort>> {
        self.adapters.get(&gateway).cloned().ok_or_else(|| {
            AppError::Internal(format!("no adapter registered for gateway {}", gateway))
        })
    }

    pub fn is_mock(&self, gateway: Gateway) -> bool {
        self.adapters
            .get(&gateway)
            .map(|adapter| adapter.mode().is_mock())
            .unwrap_or(false)
    }
}
