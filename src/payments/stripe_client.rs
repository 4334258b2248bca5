use async_trait::async_trait;
use stripe::{
    CheckoutSession, CheckoutSessionMode, Client, CreateCheckoutSession,
    CreateCheckoutSessionLineItems, CreateCheckoutSessionLineItemsPriceData,
    CreateCheckoutSessionLineItemsPriceDataProductData, CreateRefund, Currency, PaymentIntentId,
    Refund,
};

use crate::{
    error::{AppError, Result},
    payments::{CheckoutLink, CheckoutSessionRequest, PaymentGateway},
};

pub struct StripeGateway {
    client: Client,
    currency: Currency,
}

impl StripeGateway {
    pub fn new(api_key: String, currency: &str) -> Result<Self> {
        Ok(Self {
            client: Client::new(api_key),
            currency: parse_currency(currency)?,
        })
    }
}

fn parse_currency(code: &str) -> Result<Currency> {
    match code.to_ascii_lowercase().as_str() {
        "nok" => Ok(Currency::NOK),
        "sek" => Ok(Currency::SEK),
        "dkk" => Ok(Currency::DKK),
        "eur" => Ok(Currency::EUR),
        "usd" => Ok(Currency::USD),
        other => Err(AppError::Internal(format!("Unsupported currency: {}", other))),
    }
}

#[async_trait]
impl PaymentGateway for StripeGateway {
    async fn create_checkout_session(&self, request: CheckoutSessionRequest) -> Result<CheckoutLink> {
        let mut params = CreateCheckoutSession::new();
        params.mode = Some(CheckoutSessionMode::Payment);
        params.success_url = Some(request.success_url.as_str());
        params.cancel_url = Some(request.cancel_url.as_str());
        params.customer_email = Some(request.customer_email.as_str());

        params.line_items = Some(vec![CreateCheckoutSessionLineItems {
            price_data: Some(CreateCheckoutSessionLineItemsPriceData {
                currency: self.currency,
                unit_amount: Some(request.amount_minor),
                product_data: Some(CreateCheckoutSessionLineItemsPriceDataProductData {
                    name: request.product_name.clone(),
                    description: request.description.clone(),
                    ..Default::default()
                }),
                ..Default::default()
            }),
            quantity: Some(1),
            ..Default::default()
        }]);

        // The webhook reconciler reads everything it needs back from here.
        params.metadata = Some(request.metadata.clone());

        let session = CheckoutSession::create(&self.client, params)
            .await
            .map_err(|e| AppError::External(format!("Stripe error: {}", e)))?;

        let url = session
            .url
            .ok_or_else(|| AppError::External("No checkout URL returned".to_string()))?;

        Ok(CheckoutLink {
            session_id: session.id.to_string(),
            url,
        })
    }

    async fn refund_payment(&self, payment_intent_id: &str) -> Result<()> {
        let intent: PaymentIntentId = payment_intent_id
            .parse()
            .map_err(|_| AppError::BadRequest(format!("Invalid payment intent: {}", payment_intent_id)))?;

        let mut params = CreateRefund::new();
        params.payment_intent = Some(intent);

        let refund = Refund::create(&self.client, params)
            .await
            .map_err(|e| AppError::External(format!("Stripe refund error: {}", e)))?;

        tracing::info!("Refund {} issued for {}", refund.id, payment_intent_id);
        Ok(())
    }
}
