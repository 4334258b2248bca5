pub mod handlers;
pub mod state;

use axum::{
    Router,
    routing::{get, post},
};
use tower_http::{
    compression::CompressionLayer,
    cors::CorsLayer,
    trace::TraceLayer,
};

pub use state::AppState;

pub fn create_app(app_state: AppState) -> Router {
    Router::new()
        // Root and health endpoints
        .route("/", get(handlers::root::root))
        .route("/health", get(handlers::root::health_check))

        .nest("/api", api_routes())

        .with_state(app_state)

        // Middleware
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive()) // Configure properly for production
        .layer(TraceLayer::new_for_http())
}

fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/webhooks/stripe", post(handlers::webhooks::stripe_webhook))
        .route(
            "/organizations/:org_id/signups",
            get(handlers::signups::list_grouped).post(handlers::signups::create),
        )
        .nest("/signups", signup_routes())
        .route("/admin/offers/expire", post(handlers::signups::expire_offers))
        .route("/checkout", post(handlers::checkout::start_checkout))
        .route("/waitlist/claim/:token", get(handlers::checkout::claim_status))
        .route("/waitlist/claim/:token/checkout", post(handlers::checkout::start_claim_checkout))
}

fn signup_routes() -> Router<AppState> {
    Router::new()
        .route("/:id/mark-paid", post(handlers::signups::mark_paid))
        .route("/:id/cancel", post(handlers::signups::cancel))
        .route("/:id/refund", post(handlers::signups::refund))
        .route("/:id/offer", post(handlers::signups::offer))
}
