use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::time::interval;
use tracing::{error, info};

use crate::application::use_cases::billing::BillingUseCases;

/// Periodic sweep over due subscriptions. Not reentrant per subscription
/// by construction: the invoice-uniqueness check inside the billing use
/// case keeps overlapping runs safe, so no lock is taken here.
pub async fn run_billing_loop(billing: Arc<BillingUseCases>, poll_interval_secs: u64) {
    let mut ticker = interval(Duration::from_secs(poll_interval_secs));

    info!(
        "Subscription billing worker started (polling every {}s)",
        poll_interval_secs
    );

    loop {
        ticker.tick().await;
        match billing.run_due_cycles(Utc::now()).await {
            Ok(processed) if processed > 0 => {
                info!(processed, "Billing sweep completed");
            }
            Ok(_) => {}
            Err(e) => {
                error!(error = %e, "Billing sweep failed");
            }
        }
    }
}
