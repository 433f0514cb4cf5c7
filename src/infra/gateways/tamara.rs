use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use std::time::Duration;

use crate::{
    app_error::{AppError, AppResult},
    application::ports::payment_gateway::{
        ChargeReceipt, ChargeRequest, GatewayNotification, PaymentGatewayPort, TokenCharge,
    },
    domain::entities::gateway::{Gateway, NotificationOutcome, PaymentMode},
};

const TAMARA_API_BASE: &str = "https://api.tamara.co";
const HTTP_TIMEOUT_SECS: u64 = 15;

/// Tamara BNPL gateway. Checkout-redirect only; no stored-token charges.
pub struct TamaraGateway {
    client: reqwest::Client,
    api_token: SecretString,
    base_url: String,
}

impl TamaraGateway {
    pub fn new(api_token: SecretString) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(HTTP_TIMEOUT_SECS))
            .build()
            .expect("failed to build reqwest client");
        Self {
            client,
            api_token,
            base_url: TAMARA_API_BASE.to_string(),
        }
    }
}

fn amount_object(amount_cents: i64, currency: &str) -> serde_json::Value {
    serde_json::json!({
        "amount": amount_cents as f64 / 100.0,
        "currency": currency,
    })
}

#[async_trait]
impl PaymentGatewayPort for TamaraGateway {
    fn gateway(&self) -> Gateway {
        Gateway::Tamara
    }

    fn mode(&self) -> PaymentMode {
        PaymentMode::Live
    }

    async fn create_charge(&self, request: &ChargeRequest) -> AppResult<ChargeReceipt> {
        let response = self
            .client
            .post(format!("{}/checkout", self.base_url))
            .bearer_auth(self.api_token.expose_secret())
            .json(&serde_json::json!({
                "order_reference_id": request.intent_id.to_string(),
                "total_amount": amount_object(request.amount_cents, &request.currency),
                "description": request.description,
            }))
            .send()
            .await
            .map_err(|e| AppError::Gateway(format!("tamara request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(AppError::Gateway(format!(
                "tamara checkout rejected with HTTP {}",
                response.status()
            )));
        }
        let payload: serde_json::Value = response
            .json()
            .await
            .map_err(|e| AppError::Gateway(format!("tamara returned invalid JSON: {}", e)))?;
        let external_reference = payload["order_id"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| AppError::Gateway("tamara response missing order id".into()))?;

        tracing::info!(
            intent_id = %request.intent_id,
            external_reference = %external_reference,
            "Tamara checkout created"
        );
        Ok(ChargeReceipt {
            external_reference,
            settled: None,
        })
    }

    async fn charge_token(
        &self,
        _card_token: &str,
        _amount_cents: i64,
        _currency: &str,
    ) -> AppResult<TokenCharge> {
        Err(AppError::Gateway(
            "tamara does not support token charges".into(),
        ))
    }

    async fn refund(&self, external_reference: &str, amount_cents: i64) -> AppResult<()> {
        let response = self
            .client
            .post(format!(
                "{}/payments/simplified-refund/{}",
                self.base_url, external_reference
            ))
            .bearer_auth(self.api_token.expose_secret())
            .json(&serde_json::json!({
                "total_amount": amount_object(amount_cents, "SAR"),
                "comment": "empty cart reconciliation",
            }))
            .send()
            .await
            .map_err(|e| AppError::Gateway(format!("tamara refund failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(AppError::Gateway(format!(
                "tamara refund rejected with HTTP {}",
                response.status()
            )));
        }
        tracing::info!(external_reference = %external_reference, "Tamara refund issued");
        Ok(())
    }

    fn parse_notification(
        &self,
        payload: &serde_json::Value,
    ) -> AppResult<Option<GatewayNotification>> {
        let external_reference = payload["order_id"]
            .as_str()
            .ok_or_else(|| AppError::Validation("tamara notification missing order id".into()))?
            .to_string();
        let event_type = payload["event_type"].as_str().unwrap_or("");

        let outcome = match event_type {
            "order_approved" | "order_captured" => NotificationOutcome::Success,
            "order_declined" | "order_canceled" | "order_expired" => NotificationOutcome::Failure,
            _ => return Ok(None),
        };

        Ok(Some(GatewayNotification {
            idempotency_key: format!("{}:{}", external_reference, event_type),
            external_reference,
            outcome,
        }))
    }
}
