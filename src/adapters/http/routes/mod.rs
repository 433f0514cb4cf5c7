pub mod orders;
pub mod payments;
pub mod subscriptions;
pub mod vouchers;
pub mod wallet;
pub mod webhooks;

use axum::Router;

use crate::adapters::http::app_state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .nest("/payments", payments::router())
        .nest("/webhooks", webhooks::router())
        .nest("/subscriptions", subscriptions::router())
        .nest("/vouchers", vouchers::router())
        .nest("/orders", orders::router())
        .nest("/wallet", wallet::router())
}
