use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::{
    domain::{ClaimState, Course, PaymentStatus, SignupStatus},
    error::{AppError, Result},
    payments::{
        webhook::{
            META_CLAIM_TOKEN, META_COURSE_ID, META_CUSTOMER_EMAIL, META_CUSTOMER_NAME,
            META_CUSTOMER_PHONE, META_IS_DROP_IN, META_IS_WAITLIST_CLAIM, META_ORGANIZATION_ID,
            META_SESSION_ID, META_SIGNUP_ID,
        },
        CheckoutSessionRequest, PaymentGateway,
    },
    repository::{CourseRepository, SignupRepository},
};

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CheckoutRequest {
    pub course_id: Uuid,
    /// Book a single dated session instead of the whole course.
    pub session_id: Option<Uuid>,
    #[validate(length(min = 1, max = 200))]
    pub customer_name: String,
    #[validate(email)]
    pub customer_email: String,
    #[validate(length(max = 40))]
    pub customer_phone: Option<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CheckoutResponse {
    pub url: String,
    pub session_id: String,
    /// Free seats when checkout started. Placement is only decided once
    /// payment completes, so this is advisory.
    pub spots_available: Option<i64>,
}

/// Starts hosted checkouts. Nothing is written to storage here; the
/// reconciler creates or converts the signup when payment completes.
pub struct CheckoutService {
    gateway: Arc<dyn PaymentGateway>,
    courses: Arc<dyn CourseRepository>,
    signups: Arc<dyn SignupRepository>,
    base_url: String,
}

impl CheckoutService {
    pub fn new(
        gateway: Arc<dyn PaymentGateway>,
        courses: Arc<dyn CourseRepository>,
        signups: Arc<dyn SignupRepository>,
        base_url: String,
    ) -> Self {
        Self {
            gateway,
            courses,
            signups,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub async fn start_booking_checkout(&self, request: CheckoutRequest) -> Result<CheckoutResponse> {
        request.validate()?;

        let course = self.find_course(request.course_id).await?;

        let mut metadata = HashMap::new();
        metadata.insert(META_COURSE_ID.to_string(), course.id.to_string());
        metadata.insert(META_ORGANIZATION_ID.to_string(), course.organization_id.to_string());
        metadata.insert(META_CUSTOMER_NAME.to_string(), request.customer_name.trim().to_string());
        metadata.insert(META_CUSTOMER_EMAIL.to_string(), request.customer_email.trim().to_string());
        if let Some(phone) = request.customer_phone.as_deref().map(str::trim).filter(|p| !p.is_empty()) {
            metadata.insert(META_CUSTOMER_PHONE.to_string(), phone.to_string());
        }

        let description = match request.session_id {
            Some(session_id) => {
                let session = self
                    .courses
                    .find_session(session_id)
                    .await?
                    .filter(|session| session.course_id == course.id)
                    .ok_or_else(|| AppError::NotFound("Course session not found".to_string()))?;
                metadata.insert(META_IS_DROP_IN.to_string(), "true".to_string());
                metadata.insert(META_SESSION_ID.to_string(), session.id.to_string());
                Some(format!("Drop-in {}", session.session_date.format("%d.%m.%Y")))
            }
            None => {
                metadata.insert(META_IS_DROP_IN.to_string(), "false".to_string());
                course.time_schedule.clone()
            }
        };

        let confirmed = self.signups.count_confirmed(course.id).await?;
        let spots_available = (course.max_participants - confirmed).max(0);

        let link = self
            .gateway
            .create_checkout_session(CheckoutSessionRequest {
                product_name: course.name.clone(),
                description,
                amount_minor: course.price_minor,
                customer_email: request.customer_email.trim().to_string(),
                metadata,
                success_url: self.success_url(),
                cancel_url: self.cancel_url(&course),
            })
            .await?;

        tracing::info!(
            "Checkout {} started for course {} ({} spots available)",
            link.session_id,
            course.id,
            spots_available
        );

        Ok(CheckoutResponse {
            url: link.url,
            session_id: link.session_id,
            spots_available: Some(spots_available),
        })
    }

    /// Start payment for a waitlist offer identified by its claim token.
    pub async fn start_claim_checkout(&self, token: &str, now: DateTime<Utc>) -> Result<CheckoutResponse> {
        let signup = self
            .signups
            .find_by_claim_token(token)
            .await?
            .ok_or_else(|| AppError::InvalidClaim("Claim link is not valid".to_string()))?;

        match signup.claim_state(now) {
            ClaimState::Claimed => {
                return Err(AppError::Conflict("The offer has already been claimed".to_string()))
            }
            _ if signup.status != SignupStatus::Waitlist => {
                return Err(AppError::InvalidClaim("Signup is no longer on the waitlist".to_string()))
            }
            _ if signup.payment_status == PaymentStatus::Paid => {
                return Err(AppError::Conflict("This seat has already been paid for".to_string()))
            }
            ClaimState::Claimable => {}
            ClaimState::Expired => {
                return Err(AppError::OfferExpired("The offer has expired".to_string()))
            }
            ClaimState::NoOffer => {
                return Err(AppError::InvalidClaim("No open offer for this signup".to_string()))
            }
        }

        let course = self.find_course(signup.course_id).await?;

        let mut metadata = HashMap::new();
        metadata.insert(META_IS_WAITLIST_CLAIM.to_string(), "true".to_string());
        metadata.insert(META_CLAIM_TOKEN.to_string(), token.to_string());
        metadata.insert(META_SIGNUP_ID.to_string(), signup.id.to_string());
        metadata.insert(META_COURSE_ID.to_string(), course.id.to_string());
        metadata.insert(META_ORGANIZATION_ID.to_string(), course.organization_id.to_string());

        let link = self
            .gateway
            .create_checkout_session(CheckoutSessionRequest {
                product_name: course.name.clone(),
                description: Some("Waitlist seat".to_string()),
                amount_minor: course.price_minor,
                customer_email: signup.participant_email.clone(),
                metadata,
                success_url: self.success_url(),
                cancel_url: self.cancel_url(&course),
            })
            .await?;

        tracing::info!("Claim checkout {} started for signup {}", link.session_id, signup.id);

        Ok(CheckoutResponse {
            url: link.url,
            session_id: link.session_id,
            spots_available: None,
        })
    }

    async fn find_course(&self, id: Uuid) -> Result<Course> {
        self.courses
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound("Course not found".to_string()))
    }

    fn success_url(&self) -> String {
        format!("{}/booking/success?session_id={{CHECKOUT_SESSION_ID}}", self.base_url)
    }

    fn cancel_url(&self, course: &Course) -> String {
        format!("{}/courses/{}", self.base_url, course.id)
    }
}
