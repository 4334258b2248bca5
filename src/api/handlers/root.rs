use axum::{extract::State, http::StatusCode, Json, response::IntoResponse};
use serde_json::json;

use crate::api::state::AppState;

pub async fn root() -> impl IntoResponse {
    Json(json!({
        "name": "Shala API",
        "version": env!("CARGO_PKG_VERSION"),
        "description": "Course booking, waitlists and payments for yoga studios",
        "status": "operational",
        "endpoints": {
            "health": "/health",
            "webhooks": "/api/webhooks/stripe",
            "checkout": "/api/checkout"
        }
    }))
}

pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let database = match sqlx::query("SELECT 1")
        .execute(&state.service_context.db_pool)
        .await
    {
        Ok(_) => "ok",
        Err(e) => {
            tracing::error!("Health check database ping failed: {}", e);
            "unavailable"
        }
    };

    let status = if database == "ok" {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status, Json(json!({
        "status": if database == "ok" { "healthy" } else { "degraded" },
        "database": database,
        "payments": state.checkout_service.is_some(),
        "timestamp": chrono::Utc::now().to_rfc3339()
    })))
}
