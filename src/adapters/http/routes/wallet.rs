use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{adapters::http::app_state::AppState, app_error::AppResult};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/{user_id}", get(balance))
        .route("/{user_id}/withdraw", post(withdraw))
}

async fn balance(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> AppResult<Json<serde_json::Value>> {
    let balance = state.wallet.balance(user_id).await?;
    Ok(Json(serde_json::json!({ "balance_cents": balance })))
}

#[derive(Debug, Deserialize)]
struct WithdrawRequest {
    amount_cents: i64,
}

async fn withdraw(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    Json(body): Json<WithdrawRequest>,
) -> AppResult<Json<serde_json::Value>> {
    let new_balance = state.wallet.withdraw(user_id, body.amount_cents).await?;
    Ok(Json(serde_json::json!({ "balance_cents": new_balance })))
}
