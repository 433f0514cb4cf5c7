use std::net::SocketAddr;

use axum::http::HeaderValue;
use env_helpers::{get_env, get_env_default};
use secrecy::SecretString;

pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub database_url: String,
    pub cors_origin: HeaderValue,
    /// Settlement currency for every charge this deployment creates.
    pub currency: String,
    /// Gateway credentials. A gateway with no secret runs in mock mode:
    /// intent creation settles inline through the same claim path a real
    /// webhook would take.
    pub tap_secret_key: Option<SecretString>,
    pub tap_webhook_key: Option<SecretString>,
    pub tabby_secret_key: Option<SecretString>,
    pub tamara_api_token: Option<SecretString>,
    /// Failed recurring charges tolerated before a subscription is
    /// parked as past_due.
    pub subscription_retry_attempts: i32,
    /// Billing scheduler tick. Cycles are monthly, so hourly polling is
    /// already generous; the invoice-uniqueness guard keeps overlapping
    /// sweeps safe regardless.
    pub billing_poll_interval_secs: u64,
}

fn optional_secret(name: &str) -> Option<SecretString> {
    std::env::var(name)
        .ok()
        .filter(|value| !value.trim().is_empty())
        .map(|value| SecretString::new(value.into()))
}

impl AppConfig {
    pub fn from_env() -> Self {
        let bind_addr: SocketAddr = get_env_default("BIND_ADDR", "127.0.0.1:3001".parse().unwrap());
        let database_url: String = get_env("DATABASE_URL");
        let cors_origin: HeaderValue =
            get_env_default("CORS_ORIGIN", String::from("http://localhost:3000"))
                .parse()
                .expect("CORS_ORIGIN must be a valid header value");
        let currency: String = get_env_default("CURRENCY", String::from("SAR"));

        let subscription_retry_attempts: i32 = get_env_default("SUBSCRIPTION_RETRY_ATTEMPTS", 3);
        let billing_poll_interval_secs: u64 = get_env_default("BILLING_POLL_INTERVAL_SECS", 3600);

        Self {
            bind_addr,
            database_url,
            cors_origin,
            currency,
            tap_secret_key: optional_secret("TAP_SECRET_KEY"),
            tap_webhook_key: optional_secret("TAP_WEBHOOK_KEY"),
            tabby_secret_key: optional_secret("TABBY_SECRET_KEY"),
            tamara_api_token: optional_secret("TAMARA_API_TOKEN"),
            subscription_retry_attempts,
            billing_poll_interval_secs,
        }
    }
}
