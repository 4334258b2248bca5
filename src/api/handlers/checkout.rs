use std::sync::Arc;

use axum::{
    extract::{Path, State},
    Json,
};
use chrono::Utc;

use crate::{
    api::state::AppState,
    error::{AppError, Result},
    payments::{CheckoutRequest, CheckoutResponse, CheckoutService},
    service::ClaimStatusView,
};

fn checkout_service(state: &AppState) -> Result<&Arc<CheckoutService>> {
    state.checkout_service.as_ref().ok_or_else(|| {
        AppError::ServiceUnavailable("Payment processing is not configured".to_string())
    })
}

pub async fn start_checkout(
    State(state): State<AppState>,
    Json(request): Json<CheckoutRequest>,
) -> Result<Json<CheckoutResponse>> {
    let response = checkout_service(&state)?
        .start_booking_checkout(request)
        .await?;
    Ok(Json(response))
}

pub async fn claim_status(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> Result<Json<ClaimStatusView>> {
    let view = state
        .service_context
        .signup_service
        .claim_status(&token, Utc::now())
        .await?;
    Ok(Json(view))
}

pub async fn start_claim_checkout(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> Result<Json<CheckoutResponse>> {
    let response = checkout_service(&state)?
        .start_claim_checkout(&token, Utc::now())
        .await?;
    Ok(Json(response))
}
