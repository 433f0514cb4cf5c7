use dotenvy::dotenv;
use tracing::info;

use wafir_api::infra::{
    app::create_app, billing_scheduler::run_billing_loop, setup::init_app_state,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    let app_state = init_app_state().await?;

    let bind_addr = app_state.config.bind_addr;

    let app = create_app(app_state.clone());

    // Spawn the recurring billing sweep (after tracing is initialized)
    let billing = app_state.billing.clone();
    let poll_interval = app_state.config.billing_poll_interval_secs;
    tokio::spawn(async move {
        run_billing_loop(billing, poll_interval).await;
    });

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;

    info!("Backend listening at {}", &listener.local_addr()?);

    axum::serve(listener, app).await?;

    Ok(())
}
