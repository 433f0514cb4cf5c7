use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    adapters::http::app_state::AppState,
    app_error::{AppError, AppResult},
    application::use_cases::billing::PlanChangeOutcome,
    domain::entities::{
        gateway::Gateway,
        subscription::{Subscription, SubscriptionInvoice},
    },
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_subscription))
        .route("/user/{user_id}", get(get_subscription))
        .route("/user/{user_id}/change-plan", post(change_plan))
        .route("/user/{user_id}/cancel", post(cancel_subscription))
        .route("/{id}/invoices", get(list_invoices))
}

#[derive(Debug, Deserialize)]
struct CreateSubscriptionRequest {
    user_id: Uuid,
    plan_id: Uuid,
    gateway: Gateway,
    card_token: String,
    card_last4: Option<String>,
}

async fn create_subscription(
    State(state): State<AppState>,
    Json(body): Json<CreateSubscriptionRequest>,
) -> AppResult<Json<Subscription>> {
    let subscription = state
        .billing
        .create_subscription(
            body.user_id,
            body.plan_id,
            body.gateway,
            body.card_token,
            body.card_last4,
        )
        .await?;
    Ok(Json(subscription))
}

async fn get_subscription(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> AppResult<Json<Subscription>> {
    let subscription = state
        .billing
        .subscription_for_user(user_id)
        .await?
        .ok_or(AppError::NotFound)?;
    Ok(Json(subscription))
}

#[derive(Debug, Deserialize)]
struct ChangePlanRequest {
    new_plan_id: Uuid,
}

/// Upgrade charges the prorated difference now; downgrade is deferred to
/// the next cycle boundary.
async fn change_plan(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    Json(body): Json<ChangePlanRequest>,
) -> AppResult<Json<PlanChangeOutcome>> {
    let outcome = state
        .billing
        .request_plan_change(user_id, body.new_plan_id)
        .await?;
    Ok(Json(outcome))
}

async fn cancel_subscription(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> AppResult<Json<serde_json::Value>> {
    state.billing.cancel_subscription(user_id).await?;
    Ok(Json(serde_json::json!({ "canceled": true })))
}

async fn list_invoices(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Vec<SubscriptionInvoice>>> {
    let invoices = state.billing.invoices_for(id).await?;
    Ok(Json(invoices))
}
