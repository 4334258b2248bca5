pub mod signup_service;

use std::sync::Arc;
use sqlx::SqlitePool;
use crate::config::Settings;
use crate::notifications::Notifier;
use crate::payments::PaymentGateway;
use crate::repository::*;
use signup_service::SignupService;

pub use signup_service::{ClaimStatus, ClaimStatusView, CreateBookingRequest};

pub struct ServiceContext {
    pub signup_repo: Arc<dyn SignupRepository>,
    pub course_repo: Arc<dyn CourseRepository>,
    pub notifier: Arc<dyn Notifier>,
    pub payment_gateway: Option<Arc<dyn PaymentGateway>>,
    pub signup_service: Arc<SignupService>,
    pub db_pool: SqlitePool,
}

impl ServiceContext {
    pub fn new(
        signup_repo: Arc<dyn SignupRepository>,
        course_repo: Arc<dyn CourseRepository>,
        notifier: Arc<dyn Notifier>,
        payment_gateway: Option<Arc<dyn PaymentGateway>>,
        settings: &Settings,
        db_pool: SqlitePool,
    ) -> Self {
        let signup_service = Arc::new(SignupService::new(
            signup_repo.clone(),
            course_repo.clone(),
            notifier.clone(),
            payment_gateway.clone(),
            settings.server.base_url.clone(),
            settings.studio.offer_window_hours,
        ));

        Self {
            signup_repo,
            course_repo,
            notifier,
            payment_gateway,
            signup_service,
            db_pool,
        }
    }
}
