use axum::{extract::State, http::HeaderMap, Json};
use chrono::Utc;

use crate::{
    api::state::AppState,
    error::{AppError, Result},
    payments::ReconcileOutcome,
};

pub async fn stripe_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: String,
) -> Result<Json<ReconcileOutcome>> {
    let reconciler = state.reconciler.as_ref().ok_or_else(|| {
        AppError::ServiceUnavailable("Payment webhooks are not configured".to_string())
    })?;

    let signature = headers
        .get("stripe-signature")
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| AppError::InvalidSignature("missing Stripe-Signature header".to_string()))?;

    let outcome = reconciler.handle_webhook(&body, signature, Utc::now()).await?;
    Ok(Json(outcome))
}
