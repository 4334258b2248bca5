//! Stripe webhook verification and decoding.
//!
//! Payloads are checked against the `Stripe-Signature` header and then
//! decoded into [`WebhookEvent`], a closed set of the events the reconciler
//! acts on. Metadata flags and ids are validated here so nothing loosely
//! typed reaches the booking logic.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use subtle::ConstantTimeEq;
use uuid::Uuid;

use crate::{
    domain::Participant,
    error::{AppError, Result},
};

type HmacSha256 = Hmac<Sha256>;

pub const META_COURSE_ID: &str = "course_id";
pub const META_ORGANIZATION_ID: &str = "organization_id";
pub const META_CUSTOMER_NAME: &str = "customer_name";
pub const META_CUSTOMER_EMAIL: &str = "customer_email";
pub const META_CUSTOMER_PHONE: &str = "customer_phone";
pub const META_IS_DROP_IN: &str = "is_drop_in";
pub const META_SESSION_ID: &str = "session_id";
pub const META_IS_WAITLIST_CLAIM: &str = "is_waitlist_claim";
pub const META_CLAIM_TOKEN: &str = "claim_token";
pub const META_SIGNUP_ID: &str = "signup_id";

#[derive(Debug, Clone, PartialEq)]
pub enum WebhookEvent {
    CheckoutCompleted(CompletedCheckout),
    CheckoutExpired { session_id: String },
    PaymentFailed { payment_intent_id: String },
    ChargeRefunded { payment_intent_id: String },
    /// Any other event type; acknowledged without action.
    Unhandled { event_type: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompletedCheckout {
    pub session_id: String,
    pub payment_intent_id: String,
    pub amount_total_minor: Option<i64>,
    pub kind: CheckoutKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CheckoutKind {
    Booking(BookingCheckout),
    WaitlistClaim { signup_id: Uuid, claim_token: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct BookingCheckout {
    pub course_id: Uuid,
    pub organization_id: Uuid,
    pub participant: Participant,
    /// Course session booked as a single drop-in class.
    pub drop_in_session_id: Option<Uuid>,
}

/// Verifies Stripe webhook signatures and decodes events into the closed
/// set the reconciler handles. This is done locally rather than through
/// `stripe::Webhook::construct_event` because the booking metadata and the
/// checkout kinds need a strict decode of their own, and the clock is
/// injected so tolerance checks are testable.
pub struct WebhookVerifier {
    secret: String,
    tolerance_secs: i64,
}

impl WebhookVerifier {
    pub fn new(secret: String, tolerance_secs: i64) -> Self {
        Self {
            secret,
            tolerance_secs,
        }
    }

    /// Verify the signature header and decode the payload.
    pub fn construct_event(
        &self,
        payload: &str,
        signature_header: &str,
        now: DateTime<Utc>,
    ) -> Result<WebhookEvent> {
        verify_signature(payload, signature_header, &self.secret, self.tolerance_secs, now)?;
        decode_event(payload)
    }
}

pub fn compute_signature(secret: &str, timestamp: i64, payload: &str) -> Result<String> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| AppError::Internal(format!("Invalid webhook secret: {}", e)))?;
    mac.update(format!("{}.{}", timestamp, payload).as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Check a `t=<unix>,v1=<hex>[,v1=...]` header against the payload.
pub fn verify_signature(
    payload: &str,
    header: &str,
    secret: &str,
    tolerance_secs: i64,
    now: DateTime<Utc>,
) -> Result<()> {
    let mut timestamp = None;
    let mut signatures = Vec::new();
    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", value)) => timestamp = value.parse::<i64>().ok(),
            Some(("v1", value)) => signatures.push(value),
            _ => {}
        }
    }

    let timestamp = timestamp
        .ok_or_else(|| AppError::InvalidSignature("missing timestamp".to_string()))?;
    if signatures.is_empty() {
        return Err(AppError::InvalidSignature("missing v1 signature".to_string()));
    }
    if (now.timestamp() - timestamp).abs() > tolerance_secs {
        return Err(AppError::InvalidSignature("timestamp outside tolerance".to_string()));
    }

    let expected = compute_signature(secret, timestamp, payload)?;
    let matched = signatures
        .iter()
        .any(|candidate| bool::from(expected.as_bytes().ct_eq(candidate.as_bytes())));
    if !matched {
        return Err(AppError::InvalidSignature("signature mismatch".to_string()));
    }
    Ok(())
}

#[derive(Deserialize)]
struct RawEvent {
    #[serde(rename = "type")]
    event_type: String,
    data: RawEventData,
}

#[derive(Deserialize)]
struct RawEventData {
    object: serde_json::Value,
}

/// An id field that Stripe may send either bare or expanded.
#[derive(Deserialize)]
#[serde(untagged)]
enum Expandable {
    Id(String),
    Object { id: String },
}

impl Expandable {
    fn into_id(self) -> String {
        match self {
            Expandable::Id(id) | Expandable::Object { id } => id,
        }
    }
}

#[derive(Deserialize)]
struct RawCheckoutSession {
    id: String,
    payment_intent: Option<Expandable>,
    amount_total: Option<i64>,
    customer_email: Option<String>,
    customer_details: Option<RawCustomerDetails>,
    #[serde(default)]
    metadata: HashMap<String, String>,
}

#[derive(Deserialize)]
struct RawCustomerDetails {
    email: Option<String>,
    phone: Option<String>,
}

#[derive(Deserialize)]
struct RawPaymentIntent {
    id: String,
}

#[derive(Deserialize)]
struct RawCharge {
    payment_intent: Option<Expandable>,
}

pub fn decode_event(payload: &str) -> Result<WebhookEvent> {
    let raw: RawEvent = serde_json::from_str(payload)
        .map_err(|e| AppError::BadRequest(format!("Malformed event: {}", e)))?;

    match raw.event_type.as_str() {
        "checkout.session.completed" => {
            let session: RawCheckoutSession = parse_object(raw.data.object)?;
            decode_completed_checkout(session).map(WebhookEvent::CheckoutCompleted)
        }
        "checkout.session.expired" => {
            let session: RawCheckoutSession = parse_object(raw.data.object)?;
            Ok(WebhookEvent::CheckoutExpired { session_id: session.id })
        }
        "payment_intent.payment_failed" => {
            let intent: RawPaymentIntent = parse_object(raw.data.object)?;
            Ok(WebhookEvent::PaymentFailed { payment_intent_id: intent.id })
        }
        "charge.refunded" => {
            let charge: RawCharge = parse_object(raw.data.object)?;
            let payment_intent_id = charge
                .payment_intent
                .map(Expandable::into_id)
                .ok_or_else(|| AppError::BadRequest("Charge has no payment intent".to_string()))?;
            Ok(WebhookEvent::ChargeRefunded { payment_intent_id })
        }
        other => Ok(WebhookEvent::Unhandled { event_type: other.to_string() }),
    }
}

fn parse_object<T: serde::de::DeserializeOwned>(object: serde_json::Value) -> Result<T> {
    serde_json::from_value(object)
        .map_err(|e| AppError::BadRequest(format!("Malformed event object: {}", e)))
}

fn decode_completed_checkout(session: RawCheckoutSession) -> Result<CompletedCheckout> {
    let payment_intent_id = session
        .payment_intent
        .map(Expandable::into_id)
        .ok_or_else(|| AppError::BadRequest("Checkout session has no payment intent".to_string()))?;
    let metadata = &session.metadata;

    let kind = if flag(metadata, META_IS_WAITLIST_CLAIM)? {
        CheckoutKind::WaitlistClaim {
            signup_id: required_uuid(metadata, META_SIGNUP_ID)?,
            claim_token: required(metadata, META_CLAIM_TOKEN)?.to_string(),
        }
    } else {
        let details = session.customer_details.as_ref();
        let email = optional(metadata, META_CUSTOMER_EMAIL)
            .map(str::to_string)
            .or_else(|| session.customer_email.clone())
            .or_else(|| details.and_then(|d| d.email.clone()))
            .ok_or_else(|| AppError::BadRequest("Missing customer email".to_string()))?;
        let phone = optional(metadata, META_CUSTOMER_PHONE)
            .map(str::to_string)
            .or_else(|| details.and_then(|d| d.phone.clone()));

        let drop_in_session_id = if flag(metadata, META_IS_DROP_IN)? {
            Some(required_uuid(metadata, META_SESSION_ID)?)
        } else {
            None
        };

        CheckoutKind::Booking(BookingCheckout {
            course_id: required_uuid(metadata, META_COURSE_ID)?,
            organization_id: required_uuid(metadata, META_ORGANIZATION_ID)?,
            participant: Participant {
                name: required(metadata, META_CUSTOMER_NAME)?.to_string(),
                email,
                phone,
            },
            drop_in_session_id,
        })
    };

    Ok(CompletedCheckout {
        session_id: session.id,
        payment_intent_id,
        amount_total_minor: session.amount_total,
        kind,
    })
}

fn optional<'a>(metadata: &'a HashMap<String, String>, key: &str) -> Option<&'a str> {
    metadata
        .get(key)
        .map(|value| value.trim())
        .filter(|value| !value.is_empty())
}

fn required<'a>(metadata: &'a HashMap<String, String>, key: &str) -> Result<&'a str> {
    optional(metadata, key)
        .ok_or_else(|| AppError::BadRequest(format!("Missing metadata field: {}", key)))
}

fn required_uuid(metadata: &HashMap<String, String>, key: &str) -> Result<Uuid> {
    let value = required(metadata, key)?;
    Uuid::parse_str(value)
        .map_err(|_| AppError::BadRequest(format!("Invalid metadata field {}: {}", key, value)))
}

/// Absent means false; anything but "true"/"false" is rejected.
fn flag(metadata: &HashMap<String, String>, key: &str) -> Result<bool> {
    match optional(metadata, key) {
        None | Some("false") => Ok(false),
        Some("true") => Ok(true),
        Some(other) => Err(AppError::BadRequest(format!(
            "Invalid metadata flag {}: {}",
            key, other
        ))),
    }
}
