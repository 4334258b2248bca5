use std::collections::HashMap;

use async_trait::async_trait;

use crate::error::Result;

pub mod checkout;
pub mod reconciler;
pub mod stripe_client;
pub mod webhook;

#[cfg(any(test, feature = "test-utils"))]
pub mod fake;

pub use checkout::{CheckoutRequest, CheckoutResponse, CheckoutService};
pub use reconciler::{ReconcileOutcome, Reconciler};
pub use stripe_client::StripeGateway;
pub use webhook::{WebhookEvent, WebhookVerifier};

#[cfg(any(test, feature = "test-utils"))]
pub use fake::FakePaymentGateway;

/// What to charge for and where to send the payer afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckoutSessionRequest {
    pub product_name: String,
    pub description: Option<String>,
    pub amount_minor: i64,
    pub customer_email: String,
    pub metadata: HashMap<String, String>,
    pub success_url: String,
    pub cancel_url: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CheckoutLink {
    pub session_id: String,
    pub url: String,
}

/// Outbound calls to the payment provider.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_checkout_session(&self, request: CheckoutSessionRequest) -> Result<CheckoutLink>;
    async fn refund_payment(&self, payment_intent_id: &str) -> Result<()>;
}
