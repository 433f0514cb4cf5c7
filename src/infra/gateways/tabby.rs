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

const TABBY_API_BASE: &str = "https://api.tabby.ai/api/v2";
const HTTP_TIMEOUT_SECS: u64 = 15;

/// Tabby BNPL gateway. Checkout-redirect only; no stored-token charges.
pub struct TabbyGateway {
    client: reqwest::Client,
    secret_key: SecretString,
    base_url: String,
}

impl TabbyGateway {
    pub fn new(secret_key: SecretString) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(HTTP_TIMEOUT_SECS))
            .build()
            .expect("failed to build reqwest client");
        Self {
            client,
            secret_key,
            base_url: TABBY_API_BASE.to_string(),
        }
    }
}

fn cents_to_major_string(amount_cents: i64) -> String {
    format!("{}.{:02}", amount_cents / 100, amount_cents % 100)
}

#[async_trait]
impl PaymentGatewayPort for TabbyGateway {
    fn gateway(&self) -> Gateway {
        Gateway::Tabby
    }

    fn mode(&self) -> PaymentMode {
        PaymentMode::Live
    }

    async fn create_charge(&self, request: &ChargeRequest) -> AppResult<ChargeReceipt> {
        let response = self
            .client
            .post(format!("{}/checkout", self.base_url))
            .bearer_auth(self.secret_key.expose_secret())
            .json(&serde_json::json!({
                "payment": {
                    "amount": cents_to_major_string(request.amount_cents),
                    "currency": request.currency,
                    "description": request.description,
                },
                "reference_id": request.intent_id.to_string(),
            }))
            .send()
            .await
            .map_err(|e| AppError::Gateway(format!("tabby request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(AppError::Gateway(format!(
                "tabby checkout rejected with HTTP {}",
                response.status()
            )));
        }
        let payload: serde_json::Value = response
            .json()
            .await
            .map_err(|e| AppError::Gateway(format!("tabby returned invalid JSON: {}", e)))?;
        let external_reference = payload["payment"]["id"]
            .as_str()
            .or_else(|| payload["id"].as_str())
            .map(str::to_string)
            .ok_or_else(|| AppError::Gateway("tabby response missing payment id".into()))?;

        tracing::info!(
            intent_id = %request.intent_id,
            external_reference = %external_reference,
            "Tabby checkout created"
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
            "tabby does not support token charges".into(),
        ))
    }

    async fn refund(&self, external_reference: &str, amount_cents: i64) -> AppResult<()> {
        let response = self
            .client
            .post(format!(
                "{}/payments/{}/refunds",
                self.base_url, external_reference
            ))
            .bearer_auth(self.secret_key.expose_secret())
            .json(&serde_json::json!({
                "amount": cents_to_major_string(amount_cents),
            }))
            .send()
            .await
            .map_err(|e| AppError::Gateway(format!("tabby refund failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(AppError::Gateway(format!(
                "tabby refund rejected with HTTP {}",
                response.status()
            )));
        }
        tracing::info!(external_reference = %external_reference, "Tabby refund issued");
        Ok(())
    }

    fn parse_notification(
        &self,
        payload: &serde_json::Value,
    ) -> AppResult<Option<GatewayNotification>> {
        let external_reference = payload["id"]
            .as_str()
            .ok_or_else(|| AppError::Validation("tabby notification missing payment id".into()))?
            .to_string();
        let status = payload["status"].as_str().unwrap_or("").to_lowercase();

        let outcome = match status.as_str() {
            "authorized" | "captured" | "closed_captured" => NotificationOutcome::Success,
            "rejected" | "expired" | "closed" => NotificationOutcome::Failure,
            // "created" and other interim states carry no decision.
            _ => return Ok(None),
        };

        Ok(Some(GatewayNotification {
            idempotency_key: format!("{}:{}", external_reference, status),
            external_reference,
            outcome,
        }))
    }
}
