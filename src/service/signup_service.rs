use std::sync::Arc;

use chrono::{DateTime, Duration, Local, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::{
    classifier::{
        classify,
        time::{format_date_nb, format_time, resolve_session_at},
        ClassifiedSignups, ClassifyAt, SignupFilters,
    },
    domain::*,
    error::{AppError, Result},
    notifications::{send_best_effort, ConfirmationDetails, Notification, Notifier, OfferDetails},
    payments::PaymentGateway,
    repository::{CourseRepository, SignupRepository},
};

/// A booking entered by the teacher rather than through checkout.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateBookingRequest {
    pub course_id: Uuid,
    pub session_id: Option<Uuid>,
    #[validate(length(min = 1, max = 200))]
    pub participant_name: String,
    #[validate(email)]
    pub participant_email: String,
    #[validate(length(max = 40))]
    pub participant_phone: Option<String>,
    /// Paid outside the platform, e.g. cash at the door.
    #[serde(default)]
    pub paid: bool,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ClaimStatus {
    Valid,
    Expired,
    Claimed,
}

/// What the claim page needs to know about a token.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ClaimStatusView {
    pub status: ClaimStatus,
    pub signup_id: Uuid,
    pub course_name: String,
    pub participant_name: String,
    pub expires_at: Option<DateTime<Utc>>,
}

pub struct SignupService {
    signups: Arc<dyn SignupRepository>,
    courses: Arc<dyn CourseRepository>,
    notifier: Arc<dyn Notifier>,
    gateway: Option<Arc<dyn PaymentGateway>>,
    base_url: String,
    offer_window: Duration,
}

impl SignupService {
    pub fn new(
        signups: Arc<dyn SignupRepository>,
        courses: Arc<dyn CourseRepository>,
        notifier: Arc<dyn Notifier>,
        gateway: Option<Arc<dyn PaymentGateway>>,
        base_url: String,
        offer_window_hours: i64,
    ) -> Self {
        Self {
            signups,
            courses,
            notifier,
            gateway,
            base_url: base_url.trim_end_matches('/').to_string(),
            offer_window: Duration::hours(offer_window_hours),
        }
    }

    pub async fn grouped_signups(
        &self,
        organization_id: Uuid,
        filters: &SignupFilters,
        at: ClassifyAt,
    ) -> Result<ClassifiedSignups> {
        let signups = self.signups.list_for_organization(organization_id).await?;
        Ok(classify(&signups, filters, at))
    }

    pub async fn create_booking(
        &self,
        organization_id: Uuid,
        request: CreateBookingRequest,
    ) -> Result<Signup> {
        request.validate()?;

        let course = self
            .courses
            .find_by_id(request.course_id)
            .await?
            .filter(|course| course.organization_id == organization_id)
            .ok_or_else(|| AppError::NotFound("Course not found".to_string()))?;

        let (class_date, class_time) = match request.session_id {
            Some(session_id) => {
                let session = self
                    .courses
                    .find_session(session_id)
                    .await?
                    .filter(|session| session.course_id == course.id)
                    .ok_or_else(|| AppError::NotFound("Course session not found".to_string()))?;
                (Some(session.session_date), session.start_time)
            }
            None => (None, None),
        };

        let payment_status = if request.paid {
            PaymentStatus::Paid
        } else {
            PaymentStatus::Pending
        };

        let signup = self
            .signups
            .create_placed(
                NewSignup {
                    organization_id,
                    course_id: course.id,
                    course_session_id: request.session_id,
                    participant: Participant {
                        name: request.participant_name.trim().to_string(),
                        email: request.participant_email.trim().to_string(),
                        phone: request
                            .participant_phone
                            .map(|phone| phone.trim().to_string())
                            .filter(|phone| !phone.is_empty()),
                    },
                    payment_status,
                    stripe_checkout_session_id: None,
                    stripe_payment_intent_id: None,
                    amount_paid_minor: None,
                    class_date,
                    class_time,
                },
                course.max_participants,
            )
            .await?;

        tracing::info!("Teacher booked signup {} on course {} as {:?}", signup.id, course.id, signup.status);

        let notification = Notification::SignupConfirmation {
            to: signup.participant_email.clone(),
            details: ConfirmationDetails::for_signup(&signup, &course),
        };
        send_best_effort(self.notifier.as_ref(), notification).await;

        Ok(signup)
    }

    pub async fn mark_as_paid(&self, id: Uuid) -> Result<Signup> {
        let mut signup = self.find_signup(id).await?;

        if signup.status.is_cancelled() {
            return Err(AppError::BadRequest("Signup is cancelled".to_string()));
        }
        if signup.payment_status == PaymentStatus::Paid {
            return Ok(signup);
        }

        signup.payment_status = PaymentStatus::Paid;
        let updated = self.signups.update(&signup).await?;
        tracing::info!("Signup {} marked as paid", id);
        Ok(updated)
    }

    pub async fn cancel(&self, id: Uuid) -> Result<Signup> {
        let mut signup = self.find_signup(id).await?;

        if signup.status.is_cancelled() {
            return Ok(signup);
        }

        signup.cancel();
        let updated = self.signups.update(&signup).await?;
        tracing::info!("Signup {} cancelled", id);
        Ok(updated)
    }

    /// Refund the payment and cancel. Payments taken outside the platform
    /// are only marked as refunded.
    pub async fn cancel_with_refund(&self, id: Uuid) -> Result<Signup> {
        let mut signup = self.find_signup(id).await?;

        if signup.payment_status != PaymentStatus::Paid {
            return Err(AppError::BadRequest("Signup has no payment to refund".to_string()));
        }

        if let Some(payment_intent_id) = signup.stripe_payment_intent_id.as_deref() {
            let gateway = self.gateway.as_ref().ok_or_else(|| {
                AppError::ServiceUnavailable("Payment processing is not configured".to_string())
            })?;
            gateway.refund_payment(payment_intent_id).await?;
        }

        signup.cancel();
        signup.payment_status = PaymentStatus::Refunded;
        let updated = self.signups.update(&signup).await?;
        tracing::info!("Signup {} refunded and cancelled", id);
        Ok(updated)
    }

    /// Offer a waitlisted participant a seat, claimable by payment until
    /// the offer window closes. Someone who already paid when they joined
    /// the waitlist is confirmed straight away instead.
    pub async fn offer_seat(&self, id: Uuid, now: DateTime<Utc>) -> Result<Signup> {
        let mut signup = self.find_signup(id).await?;

        if signup.status != SignupStatus::Waitlist {
            return Err(AppError::BadRequest("Only waitlisted signups can be offered a seat".to_string()));
        }
        match signup.claim_state(now) {
            ClaimState::Claimable => {
                return Err(AppError::Conflict("An offer is already open".to_string()));
            }
            ClaimState::Claimed => {
                return Err(AppError::Conflict("The offer has already been claimed".to_string()));
            }
            ClaimState::Expired | ClaimState::NoOffer => {}
        }

        let course = self
            .courses
            .find_by_id(signup.course_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Course not found".to_string()))?;

        if signup.payment_status == PaymentStatus::Paid {
            signup.status = SignupStatus::Confirmed;
            signup.waitlist_position = None;
            if signup.offer_status.is_some() {
                signup.offer_status = Some(OfferStatus::Expired);
            }
            let updated = self.signups.update(&signup).await?;
            tracing::info!("Signup {} already paid, confirmed from waitlist", id);

            let notification = Notification::SignupConfirmation {
                to: updated.participant_email.clone(),
                details: ConfirmationDetails::for_signup(&updated, &course),
            };
            send_best_effort(self.notifier.as_ref(), notification).await;
            return Ok(updated);
        }

        let token = generate_claim_token();
        let expires_at = now + self.offer_window;
        signup.offer_status = Some(OfferStatus::Pending);
        signup.offer_expires_at = Some(expires_at);
        signup.offer_claim_token = Some(token.clone());
        let updated = self.signups.update(&signup).await?;

        tracing::info!("Seat offered to signup {} until {}", id, expires_at);

        let session_at = resolve_session_at(
            updated.class_date,
            updated.class_time,
            course.start_date,
            course.time_schedule.as_deref(),
        );
        let expires_local = expires_at.with_timezone(&Local).naive_local();
        let notification = Notification::WaitlistOffer {
            to: updated.participant_email.clone(),
            details: OfferDetails {
                course_name: course.name.clone(),
                date: session_at.map(|at| format_date_nb(at.date())).unwrap_or_default(),
                time: session_at.map(|at| format_time(at.time())).unwrap_or_default(),
                organization_name: course.organization_name.clone(),
                claim_url: format!("{}/waitlist/claim/{}", self.base_url, token),
                expires_at: format!(
                    "{} {}",
                    format_date_nb(expires_local.date()),
                    format_time(expires_local.time())
                ),
            },
        };
        send_best_effort(self.notifier.as_ref(), notification).await;

        Ok(updated)
    }

    pub async fn expire_offers(&self, now: DateTime<Utc>) -> Result<u64> {
        let expired = self.signups.expire_offers(now).await?;
        if expired > 0 {
            tracing::info!("Expired {} waitlist offers", expired);
        }
        Ok(expired)
    }

    pub async fn claim_status(&self, token: &str, now: DateTime<Utc>) -> Result<ClaimStatusView> {
        let signup = self
            .signups
            .find_by_claim_token(token)
            .await?
            .ok_or_else(|| AppError::NotFound("Claim link not found".to_string()))?;

        let status = match signup.claim_state(now) {
            ClaimState::Claimable => ClaimStatus::Valid,
            ClaimState::Expired => ClaimStatus::Expired,
            ClaimState::Claimed => ClaimStatus::Claimed,
            ClaimState::NoOffer => {
                return Err(AppError::NotFound("Claim link not found".to_string()));
            }
        };

        let course_name = self
            .courses
            .find_by_id(signup.course_id)
            .await?
            .map(|course| course.name)
            .unwrap_or_default();

        Ok(ClaimStatusView {
            status,
            signup_id: signup.id,
            course_name,
            participant_name: signup.participant_name,
            expires_at: signup.offer_expires_at,
        })
    }

    async fn find_signup(&self, id: Uuid) -> Result<Signup> {
        self.signups
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound("Signup not found".to_string()))
    }
}

fn generate_claim_token() -> String {
    use rand::RngCore;
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn claim_tokens_are_long_and_distinct() {
        let a = generate_claim_token();
        let b = generate_claim_token();
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
    }
}
