use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use uuid::Uuid;

use crate::{
    adapters::http::app_state::AppState,
    app_error::AppResult,
    application::use_cases::voucher_qr::IssuedCode,
    domain::entities::voucher::Voucher,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/owned/{user_id}", get(list_owned))
        .route("/{id}/code", post(issue_code))
        .route("/redeem/{code}", post(redeem))
}

async fn list_owned(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> AppResult<Json<Vec<Voucher>>> {
    let vouchers = state.vouchers.vouchers_for_owner(user_id).await?;
    Ok(Json(vouchers))
}

/// Customer asks for a fresh QR code to show at the till.
async fn issue_code(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<IssuedCode>> {
    let issued = state.vouchers.issue_code(id, Utc::now()).await?;
    Ok(Json(issued))
}

/// Provider scans the code. Exactly one of two concurrent scans wins;
/// the loser gets a specific already-redeemed / expired / not-found
/// error.
async fn redeem(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> AppResult<Json<Voucher>> {
    let voucher = state.vouchers.redeem(&code, Utc::now()).await?;
    Ok(Json(voucher))
}
