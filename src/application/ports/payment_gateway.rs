use async_trait::async_trait;
use uuid::Uuid;

use crate::{
    app_error::AppResult,
    domain::entities::gateway::{Gateway, NotificationOutcome, PaymentMode},
};

// ============================================================================
// Port Types - Gateway-agnostic shapes
// ============================================================================

/// Request to open a charge for a pending payment intent.
#[derive(Debug, Clone)]
pub struct ChargeRequest {
    pub intent_id: Uuid,
    pub amount_cents: i64,
    pub currency: String,
    pub description: String,
}

/// Result of creating a charge.
#[derive(Debug, Clone)]
pub struct ChargeReceipt {
    /// Gateway-assigned charge/order id, stored on the intent so the
    /// later notification can be resolved back to it.
    pub external_reference: String,
    /// Set when the charge settled synchronously (mock mode). The caller
    /// must still route the outcome through the regular claim path.
    pub settled: Option<NotificationOutcome>,
}

/// Result of charging a stored card token (recurring billing).
#[derive(Debug, Clone)]
pub struct TokenCharge {
    pub external_reference: String,
    pub approved: bool,
    pub decline_reason: Option<String>,
}

/// A gateway callback mapped into the uniform shape the core understands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayNotification {
    pub external_reference: String,
    pub outcome: NotificationOutcome,
    pub idempotency_key: String,
}

// ============================================================================
// Payment Gateway Port
// ============================================================================

/// Uniform interface to an external payment provider. The core depends
/// only on these operations; each concrete adapter maps them to its
/// gateway's wire format.
#[async_trait]
pub trait PaymentGatewayPort: Send + Sync {
    fn gateway(&self) -> Gateway;

    /// Live adapters talk to the real API; mock adapters settle locally
    /// and synthesize the confirmation inline.
    fn mode(&self) -> PaymentMode;

    /// Open a charge with the gateway. The intent stays `pending` until a
    /// notification (or inline mock settlement) resolves it.
    async fn create_charge(&self, request: &ChargeRequest) -> AppResult<ChargeReceipt>;

    /// Charge a stored card token without customer interaction. Only
    /// card gateways support this; BNPL adapters return a gateway error.
    async fn charge_token(
        &self,
        card_token: &str,
        amount_cents: i64,
        currency: &str,
    ) -> AppResult<TokenCharge>;

    /// Return captured funds for a charge.
    async fn refund(&self, external_reference: &str, amount_cents: i64) -> AppResult<()>;

    /// Header carrying the webhook signature, when the gateway signs its
    /// callbacks.
    fn signature_header(&self) -> Option<&'static str> {
        None
    }

    /// Verify a webhook signature. Default accepts everything, for
    /// gateways that do not sign callbacks.
    fn verify_signature(&self, payload: &[u8], signature: Option<&str>) -> AppResult<()> {
        let _ = (payload, signature);
        Ok(())
    }

    /// Map a raw callback payload into the uniform notification shape.
    /// `None` for events that are not decisive for a charge (interim
    /// statuses, unrelated event types) — the webhook acks and ignores
    /// them rather than failing a still-pending intent.
    fn parse_notification(
        &self,
        payload: &serde_json::Value,
    ) -> AppResult<Option<GatewayNotification>>;
}
