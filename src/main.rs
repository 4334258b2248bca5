use std::sync::Arc;
use sqlx::sqlite::SqlitePoolOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use shala::{
    api::{self, AppState},
    config::Settings,
    notifications::{LogNotifier, Notifier, SmtpNotifier},
    payments::{CheckoutService, PaymentGateway, Reconciler, StripeGateway, WebhookVerifier},
    repository::{SqliteCourseRepository, SqliteSignupRepository},
    service::ServiceContext,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "shala=debug,tower_http=debug,axum=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let settings = Settings::new().unwrap_or_else(|e| {
        tracing::warn!("Failed to load config: {}. Using defaults.", e);
        Settings::default()
    });

    tracing::info!("Starting Shala server on {}:{}", settings.server.host, settings.server.port);

    // Initialize database
    let db_pool = SqlitePoolOptions::new()
        .max_connections(settings.database.max_connections)
        .connect(&settings.database.url)
        .await?;

    // Run migrations
    sqlx::migrate!("./migrations")
        .run(&db_pool)
        .await?;

    // Initialize repositories
    let signup_repo = Arc::new(SqliteSignupRepository::new(db_pool.clone()));
    let course_repo = Arc::new(SqliteCourseRepository::new(db_pool.clone()));

    let notifier: Arc<dyn Notifier> = match SmtpNotifier::new(&settings.email)? {
        Some(smtp) => {
            tracing::info!("Email notifications via SMTP enabled");
            Arc::new(smtp)
        }
        None => {
            tracing::info!("Email disabled, notifications are logged only");
            Arc::new(LogNotifier)
        }
    };

    // Initialize Stripe if configured
    let (gateway, webhook_secret) = if settings.stripe.enabled {
        if let (Some(api_key), Some(webhook_secret)) =
            (settings.stripe.secret_key.clone(), settings.stripe.webhook_secret.clone())
        {
            tracing::info!("Stripe payment processing enabled");
            let gateway: Arc<dyn PaymentGateway> =
                Arc::new(StripeGateway::new(api_key, &settings.stripe.currency)?);
            (Some(gateway), Some(webhook_secret))
        } else {
            tracing::warn!("Stripe enabled but missing configuration");
            (None, None)
        }
    } else {
        tracing::info!("Stripe payment processing disabled");
        (None, None)
    };

    let service_context = Arc::new(ServiceContext::new(
        signup_repo.clone(),
        course_repo.clone(),
        notifier.clone(),
        gateway.clone(),
        &settings,
        db_pool.clone(),
    ));

    let checkout_service = gateway.map(|gateway| {
        Arc::new(CheckoutService::new(
            gateway,
            course_repo.clone(),
            signup_repo.clone(),
            settings.server.base_url.clone(),
        ))
    });

    let reconciler = webhook_secret.map(|secret| {
        Arc::new(Reconciler::new(
            WebhookVerifier::new(secret, settings.stripe.signature_tolerance_secs),
            signup_repo.clone(),
            course_repo.clone(),
            notifier.clone(),
        ))
    });

    let app_state = AppState::new(
        service_context,
        checkout_service,
        reconciler,
        Arc::new(settings.clone()),
    );
    let app = api::create_app(app_state);

    let listener = tokio::net::TcpListener::bind(
        format!("{}:{}", settings.server.host, settings.server.port)
    ).await?;

    tracing::info!("Server listening on http://{}:{}", settings.server.host, settings.server.port);

    axum::serve(listener, app).await?;

    Ok(())
}
