use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    app_error::{AppError, AppResult},
    domain::entities::{
        cart::Cart,
        order::{Order, OrderItem, OrderStatus, PaymentLink},
        payment_intent::Actor,
    },
};

// ============================================================================
// Repository Traits
// ============================================================================

#[async_trait]
pub trait CartRepo: Send + Sync {
    async fn get_for_actor(&self, actor: &Actor) -> AppResult<Option<Cart>>;
    async fn clear_for_actor(&self, actor: &Actor) -> AppResult<()>;
}

#[derive(Debug, Clone)]
pub struct NewOrder {
    pub actor: Actor,
    pub provider_id: Uuid,
    pub items: Vec<OrderItem>,
    pub total_cents: i64,
    pub payment: PaymentLink,
}

#[async_trait]
pub trait OrderRepo: Send + Sync {
    /// Create an order. The payment-intent linkage is unique; a replayed
    /// create for the same intent returns the existing order instead of a
    /// second one.
    async fn create(&self, input: &NewOrder) -> AppResult<Order>;
    async fn get(&self, id: Uuid) -> AppResult<Option<Order>>;
    async fn get_by_payment_intent(&self, intent_id: Uuid) -> AppResult<Option<Order>>;
    async fn list_by_provider(&self, provider_id: Uuid) -> AppResult<Vec<Order>>;
    /// Move expired pending orders to `ignored`; returns how many.
    async fn sweep_expired(&self, provider_id: Uuid, now: DateTime<Utc>) -> AppResult<u64>;
    /// Conditional status update, only out of `pending`. Returns the
    /// updated order or `None` if the order was already processed.
    async fn update_status(
        &self,
        id: Uuid,
        status: OrderStatus,
        cancel_reason: Option<&str>,
    ) -> AppResult<Option<Order>>;
}

// ============================================================================
// Use Cases
// ============================================================================

#[derive(Clone)]
pub struct OrderUseCases {
    orders: Arc<dyn OrderRepo>,
}

impl OrderUseCases {
    pub fn new(orders: Arc<dyn OrderRepo>) -> Self {
        Self { orders }
    }

    /// Orders for a provider's dashboard. Pending orders past their
    /// pickup window are swept to `ignored` first.
    pub async fn provider_orders(&self, provider_id: Uuid) -> AppResult<Vec<Order>> {
        let swept = self.orders.sweep_expired(provider_id, Utc::now()).await?;
        if swept > 0 {
            tracing::info!(provider_id = %provider_id, swept, "Expired pending orders ignored");
        }
        self.orders.list_by_provider(provider_id).await
    }

    /// Provider moves a pending order forward. Cancelling requires a
    /// reason; any terminal order rejects further updates.
    pub async fn set_status(
        &self,
        order_id: Uuid,
        status: OrderStatus,
        reason: Option<String>,
    ) -> AppResult<Order> {
        if !status.is_provider_settable() {
            return Err(AppError::Validation(format!(
                "cannot set order status to {}",
                status
            )));
        }
        if status == OrderStatus::Cancelled && reason.as_deref().unwrap_or("").trim().is_empty() {
            return Err(AppError::Validation(
                "reason required when cancelling".into(),
            ));
        }

        match self
            .orders
            .update_status(order_id, status, reason.as_deref())
            .await?
        {
            Some(order) => Ok(order),
            None => match self.orders.get(order_id).await? {
                Some(_) => Err(AppError::Conflict("order already processed".into())),
                None => Err(AppError::NotFound),
            },
        }
    }
}
