use std::sync::Mutex;

use async_trait::async_trait;

use crate::{
    error::{AppError, Result},
    payments::{CheckoutLink, CheckoutSessionRequest, PaymentGateway},
};

/// In-memory gateway that records every request.
#[derive(Default)]
pub struct FakePaymentGateway {
    checkouts: Mutex<Vec<CheckoutSessionRequest>>,
    refunds: Mutex<Vec<String>>,
}

impl FakePaymentGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn checkouts(&self) -> Vec<CheckoutSessionRequest> {
        self.checkouts.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn refunds(&self) -> Vec<String> {
        self.refunds.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl PaymentGateway for FakePaymentGateway {
    async fn create_checkout_session(&self, request: CheckoutSessionRequest) -> Result<CheckoutLink> {
        let mut checkouts = self
            .checkouts
            .lock()
            .map_err(|_| AppError::Internal("fake gateway poisoned".to_string()))?;
        let session_id = format!("cs_test_{}", checkouts.len() + 1);
        checkouts.push(request);

        Ok(CheckoutLink {
            url: format!("https://checkout.test/{}", session_id),
            session_id,
        })
    }

    async fn refund_payment(&self, payment_intent_id: &str) -> Result<()> {
        self.refunds
            .lock()
            .map_err(|_| AppError::Internal("fake gateway poisoned".to_string()))?
            .push(payment_intent_id.to_string());
        Ok(())
    }
}
