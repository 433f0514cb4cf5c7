use async_trait::async_trait;
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;
use std::time::Duration;
use subtle::ConstantTimeEq;

use crate::{
    app_error::{AppError, AppResult},
    application::ports::payment_gateway::{
        ChargeReceipt, ChargeRequest, GatewayNotification, PaymentGatewayPort, TokenCharge,
    },
    domain::entities::gateway::{Gateway, NotificationOutcome, PaymentMode},
};

const TAP_API_BASE: &str = "https://api.tap.company/v2";
const HTTP_TIMEOUT_SECS: u64 = 15;

type HmacSha256 = Hmac<Sha256>;

/// Tap card gateway. The only gateway that supports stored-token charges,
/// which makes it the one the billing scheduler rides on.
pub struct TapGateway {
    client: reqwest::Client,
    secret_key: SecretString,
    /// Webhook signing key; verification is skipped when not configured.
    webhook_key: Option<SecretString>,
    base_url: String,
    currency: String,
}

impl TapGateway {
    pub fn new(secret_key: SecretString, webhook_key: Option<SecretString>, currency: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(HTTP_TIMEOUT_SECS))
            .build()
            .expect("failed to build reqwest client");
        Self {
            client,
            secret_key,
            webhook_key,
            base_url: TAP_API_BASE.to_string(),
            currency,
        }
    }

    #[cfg(test)]
    fn with_base_url(mut self, base_url: String) -> Self {
        self.base_url = base_url;
        self
    }

    async fn post_charge(&self, body: serde_json::Value) -> AppResult<serde_json::Value> {
        let response = self
            .client
            .post(format!("{}/charges", self.base_url))
            .bearer_auth(self.secret_key.expose_secret())
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::Gateway(format!("tap request failed: {}", e)))?;

        let status = response.status();
        let payload: serde_json::Value = response
            .json()
            .await
            .map_err(|e| AppError::Gateway(format!("tap returned invalid JSON: {}", e)))?;

        if !status.is_success() {
            return Err(AppError::Gateway(format!(
                "tap charge rejected with HTTP {}",
                status
            )));
        }
        Ok(payload)
    }

    fn charge_id(payload: &serde_json::Value) -> AppResult<String> {
        payload["id"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| AppError::Gateway("tap response missing charge id".into()))
    }
}

fn cents_to_major(amount_cents: i64) -> f64 {
    amount_cents as f64 / 100.0
}

#[async_trait]
impl PaymentGatewayPort for TapGateway {
    fn gateway(&self) -> Gateway {
        Gateway::Tap
    }

    fn mode(&self) -> PaymentMode {
        PaymentMode::Live
    }

    async fn create_charge(&self, request: &ChargeRequest) -> AppResult<ChargeReceipt> {
        let payload = self
            .post_charge(serde_json::json!({
                "amount": cents_to_major(request.amount_cents),
                "currency": request.currency,
                "description": request.description,
                "reference": { "transaction": request.intent_id.to_string() },
                "source": { "id": "src_all" },
            }))
            .await?;

        let external_reference = Self::charge_id(&payload)?;
        tracing::info!(
            intent_id = %request.intent_id,
            external_reference = %external_reference,
            "Tap charge created"
        );
        Ok(ChargeReceipt {
            external_reference,
            settled: None,
        })
    }

    async fn charge_token(
        &self,
        card_token: &str,
        amount_cents: i64,
        currency: &str,
    ) -> AppResult<TokenCharge> {
        let payload = self
            .post_charge(serde_json::json!({
                "amount": cents_to_major(amount_cents),
                "currency": currency,
                "customer_initiated": false,
                "source": { "id": card_token },
            }))
            .await?;

        let external_reference = Self::charge_id(&payload)?;
        let status = payload["status"].as_str().unwrap_or("");
        let approved = status == "CAPTURED";
        Ok(TokenCharge {
            external_reference,
            approved,
            decline_reason: (!approved).then(|| status.to_string()),
        })
    }

    async fn refund(&self, external_reference: &str, amount_cents: i64) -> AppResult<()> {
        let response = self
            .client
            .post(format!("{}/refunds", self.base_url))
            .bearer_auth(self.secret_key.expose_secret())
            .json(&serde_json::json!({
                "charge_id": external_reference,
                "amount": cents_to_major(amount_cents),
                "currency": self.currency,
                "reason": "requested_by_customer",
            }))
            .send()
            .await
            .map_err(|e| AppError::Gateway(format!("tap refund failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(AppError::Gateway(format!(
                "tap refund rejected with HTTP {}",
                response.status()
            )));
        }
        tracing::info!(external_reference = %external_reference, "Tap refund issued");
        Ok(())
    }

    fn signature_header(&self) -> Option<&'static str> {
        Some("tap-signature")
    }

    fn verify_signature(&self, payload: &[u8], signature: Option<&str>) -> AppResult<()> {
        let Some(key) = &self.webhook_key else {
            // No signing key configured; accept as-is.
            return Ok(());
        };
        let signature = signature
            .ok_or_else(|| AppError::Validation("missing webhook signature".into()))?;
        let provided = hex::decode(signature.trim())
            .map_err(|_| AppError::Validation("malformed webhook signature".into()))?;

        let mut mac = HmacSha256::new_from_slice(key.expose_secret().as_bytes())
            .map_err(|_| AppError::Internal("invalid webhook key length".into()))?;
        mac.update(payload);
        let expected = mac.finalize().into_bytes();

        if bool::from(expected.as_slice().ct_eq(provided.as_slice())) {
            Ok(())
        } else {
            Err(AppError::Validation("webhook signature mismatch".into()))
        }
    }

    fn parse_notification(
        &self,
        payload: &serde_json::Value,
    ) -> AppResult<Option<GatewayNotification>> {
        let external_reference = payload["id"]
            .as_str()
            .ok_or_else(|| AppError::Validation("tap notification missing charge id".into()))?
            .to_string();
        let status = payload["status"].as_str().unwrap_or("");

        let outcome = match status {
            "CAPTURED" => NotificationOutcome::Success,
            "FAILED" | "DECLINED" | "CANCELLED" | "VOID" | "TIMEDOUT" => {
                NotificationOutcome::Failure
            }
            // INITIATED, IN_PROGRESS, AUTHORIZED and friends are interim.
            _ => return Ok(None),
        };

        Ok(Some(GatewayNotification {
            idempotency_key: format!("{}:{}", external_reference, status),
            external_reference,
            outcome,
        }))
    }
}
