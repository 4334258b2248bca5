use std::sync::Arc;
use crate::{
    config::Settings,
    payments::{CheckoutService, Reconciler},
    service::ServiceContext,
};

#[derive(Clone)]
pub struct AppState {
    pub service_context: Arc<ServiceContext>,
    /// Present only when a payment gateway is configured.
    pub checkout_service: Option<Arc<CheckoutService>>,
    /// Present only when a webhook secret is configured.
    pub reconciler: Option<Arc<Reconciler>>,
    pub settings: Arc<Settings>,
}

impl AppState {
    pub fn new(
        service_context: Arc<ServiceContext>,
        checkout_service: Option<Arc<CheckoutService>>,
        reconciler: Option<Arc<Reconciler>>,
        settings: Arc<Settings>,
    ) -> Self {
        Self {
            service_context,
            checkout_service,
            reconciler,
            settings,
        }
    }
}
