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
    domain::entities::{
        gateway::Gateway,
        membership::MembershipCycle,
        payment_intent::{Actor, PaymentIntent},
    },
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/cart", post(create_cart_intent))
        .route("/voucher", post(create_voucher_intent))
        .route("/membership", post(create_membership_intent))
        .route("/{id}", get(poll_intent))
        .route("/{id}/cancel", post(cancel_intent))
}

/// Exactly one of `user_id` / `session_id`.
#[derive(Debug, Deserialize)]
struct ActorParams {
    user_id: Option<Uuid>,
    session_id: Option<String>,
}

impl ActorParams {
    fn into_actor(self) -> AppResult<Actor> {
        Actor::from_columns(self.user_id, self.session_id).ok_or_else(|| {
            AppError::Validation("exactly one of user_id or session_id is required".into())
        })
    }
}

#[derive(Debug, Deserialize)]
struct CartIntentRequest {
    #[serde(flatten)]
    actor: ActorParams,
    gateway: Gateway,
}

async fn create_cart_intent(
    State(state): State<AppState>,
    Json(body): Json<CartIntentRequest>,
) -> AppResult<Json<PaymentIntent>> {
    let actor = body.actor.into_actor()?;
    let intent = state.payments.create_cart_intent(actor, body.gateway).await?;
    Ok(Json(intent))
}

#[derive(Debug, Deserialize)]
struct VoucherIntentRequest {
    user_id: Uuid,
    provider_id: Uuid,
    face_value_cents: i64,
    gateway: Gateway,
}

async fn create_voucher_intent(
    State(state): State<AppState>,
    Json(body): Json<VoucherIntentRequest>,
) -> AppResult<Json<PaymentIntent>> {
    let intent = state
        .payments
        .create_voucher_intent(body.user_id, body.provider_id, body.face_value_cents, body.gateway)
        .await?;
    Ok(Json(intent))
}

#[derive(Debug, Deserialize)]
struct MembershipIntentRequest {
    user_id: Uuid,
    plan_id: Uuid,
    cycle: MembershipCycle,
    gateway: Gateway,
}

async fn create_membership_intent(
    State(state): State<AppState>,
    Json(body): Json<MembershipIntentRequest>,
) -> AppResult<Json<PaymentIntent>> {
    let intent = state
        .payments
        .create_membership_intent(body.user_id, body.plan_id, body.cycle, body.gateway)
        .await?;
    Ok(Json(intent))
}

/// Clients poll here while an async gateway flow (card 3-D-Secure, BNPL
/// approval) is in flight; the webhook and this poll converge on the same
/// terminal state.
async fn poll_intent(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<PaymentIntent>> {
    let intent = state.payments.poll(id).await?;
    Ok(Json(intent))
}

async fn cancel_intent(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<serde_json::Value>> {
    state.payments.cancel(id).await?;
    Ok(Json(serde_json::json!({ "cancelled": true })))
}
