use axum::{
    extract::{Path, State},
    routing::{get, patch},
    Json, Router,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    adapters::http::app_state::AppState,
    app_error::AppResult,
    domain::entities::order::{Order, OrderStatus},
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/provider/{provider_id}", get(provider_orders))
        .route("/{id}/status", patch(update_status))
}

/// Provider dashboard listing; expired pending orders are swept to
/// `ignored` on the way out.
async fn provider_orders(
    State(state): State<AppState>,
    Path(provider_id): Path<Uuid>,
) -> AppResult<Json<Vec<Order>>> {
    let orders = state.orders.provider_orders(provider_id).await?;
    Ok(Json(orders))
}

#[derive(Debug, Deserialize)]
struct UpdateStatusRequest {
    status: OrderStatus,
    reason: Option<String>,
}

async fn update_status(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<UpdateStatusRequest>,
) -> AppResult<Json<Order>> {
    let order = state
        .orders
        .set_status(id, body.status, body.reason)
        .await?;
    Ok(Json(order))
}
