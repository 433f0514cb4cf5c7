use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use uuid::Uuid;

use crate::{
    app_error::{AppError, AppResult},
    application::ports::payment_gateway::{
        ChargeReceipt, ChargeRequest, GatewayNotification, PaymentGatewayPort, TokenCharge,
    },
    domain::entities::gateway::{Gateway, NotificationOutcome, PaymentMode},
};

/// Local stand-in for a gateway with no configured credentials. Simulates
/// every operation without I/O and, by default, settles charges inline —
/// through the exact same claim path a real webhook would take, so test
/// and production flows stay identical.
///
/// Token charges can be driven to a decline or a transport error by
/// embedding `declined` / `error` in the card token, which is how the
/// dunning paths are exercised without a real gateway.
pub struct MockGateway {
    gateway: Gateway,
    inline_settlement: bool,
    charges: AtomicUsize,
    refunds: AtomicUsize,
}

impl MockGateway {
    pub fn new(gateway: Gateway) -> Self {
        Self {
            gateway,
            inline_settlement: true,
            charges: AtomicUsize::new(0),
            refunds: AtomicUsize::new(0),
        }
    }

    /// A mock that leaves charges pending until a notification arrives,
    /// mimicking a live gateway's asynchronous confirmation.
    pub fn deferred(gateway: Gateway) -> Self {
        Self {
            inline_settlement: false,
            ..Self::new(gateway)
        }
    }

    pub fn charges_created(&self) -> usize {
        self.charges.load(Ordering::SeqCst)
    }

    pub fn refunds_issued(&self) -> usize {
        self.refunds.load(Ordering::SeqCst)
    }

    fn reference(&self) -> String {
        format!("mock_{}_{}", self.gateway, Uuid::new_v4().simple())
    }
}

#[async_trait]
impl PaymentGatewayPort for MockGateway {
    fn gateway(&self) -> Gateway {
        self.gateway
    }

    fn mode(&self) -> PaymentMode {
        PaymentMode::Mock
    }

    async fn create_charge(&self, request: &ChargeRequest) -> AppResult<ChargeReceipt> {
        self.charges.fetch_add(1, Ordering::SeqCst);
        let external_reference = self.reference();
        tracing::debug!(
            gateway = %self.gateway,
            intent_id = %request.intent_id,
            amount_cents = request.amount_cents,
            external_reference = %external_reference,
            "Mock: charge created"
        );
        Ok(ChargeReceipt {
            external_reference,
            settled: self
                .inline_settlement
                .then_some(NotificationOutcome::Success),
        })
    }

    async fn charge_token(
        &self,
        card_token: &str,
        amount_cents: i64,
        _currency: &str,
    ) -> AppResult<TokenCharge> {
        if card_token.contains("error") {
            return Err(AppError::Gateway("mock transport error".into()));
        }
        self.charges.fetch_add(1, Ordering::SeqCst);
        let approved = !card_token.contains("declined");
        tracing::debug!(
            gateway = %self.gateway,
            amount_cents,
            approved,
            "Mock: token charge"
        );
        Ok(TokenCharge {
            external_reference: self.reference(),
            approved,
            decline_reason: (!approved).then(|| "card declined".to_string()),
        })
    }

    async fn refund(&self, external_reference: &str, amount_cents: i64) -> AppResult<()> {
        self.refunds.fetch_add(1, Ordering::SeqCst);
        tracing::debug!(
            gateway = %self.gateway,
            external_reference = %external_reference,
            amount_cents,
            "Mock: refund"
        );
        Ok(())
    }

    fn parse_notification(
        &self,
        payload: &serde_json::Value,
    ) -> AppResult<Option<GatewayNotification>> {
        let external_reference = payload["id"]
            .as_str()
            .ok_or_else(|| AppError::Validation("missing id in mock notification".into()))?
            .to_string();
        let outcome = match payload["status"].as_str() {
            Some("success") => NotificationOutcome::Success,
            Some("failure") => NotificationOutcome::Failure,
            _ => return Ok(None),
        };
        Ok(Some(GatewayNotification {
            idempotency_key: format!("{}:{:?}", external_reference, outcome),
            external_reference,
            outcome,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn inline_mock_settles_immediately() {
        let mock = MockGateway::new(Gateway::Tap);
        let receipt = mock
            .create_charge(&ChargeRequest {
                intent_id: Uuid::new_v4(),
                amount_cents: 1000,
                currency: "SAR".into(),
                description: "test".into(),
            })
            .await
            .unwrap();
        assert_eq!(receipt.settled, Some(NotificationOutcome::Success));
        assert_eq!(mock.charges_created(), 1);
    }

    #[tokio::test]
    async fn deferred_mock_leaves_the_charge_pending() {
        let mock = MockGateway::deferred(Gateway::Tap);
        let receipt = mock
            .create_charge(&ChargeRequest {
                intent_id: Uuid::new_v4(),
                amount_cents: 1000,
                currency: "SAR".into(),
                description: "test".into(),
            })
            .await
            .unwrap();
        assert!(receipt.settled.is_none());
    }

    #[tokio::test]
    async fn token_scenarios_cover_decline_and_error() {
        let mock = MockGateway::new(Gateway::Tap);

        let ok = mock.charge_token("tok_good", 1000, "SAR").await.unwrap();
        assert!(ok.approved);

        let declined = mock
            .charge_token("tok_declined", 1000, "SAR")
            .await
            .unwrap();
        assert!(!declined.approved);
        assert!(declined.decline_reason.is_some());

        assert!(mock.charge_token("tok_error", 1000, "SAR").await.is_err());
    }

    #[test]
    fn notification_parsing_ignores_interim_events() {
        let mock = MockGateway::new(Gateway::Tap);
        let decisive = mock
            .parse_notification(&serde_json::json!({"id": "mock_1", "status": "success"}))
            .unwrap();
        assert!(decisive.is_some());

        let interim = mock
            .parse_notification(&serde_json::json!({"id": "mock_1", "status": "created"}))
            .unwrap();
        assert!(interim.is_none());
    }
}
