use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use subtle::ConstantTimeEq;
use uuid::Uuid;

use crate::{
    domain::{
        ClaimPayment, ClaimState, Course, NewSignup, PaymentStatus, Signup, SignupStatus,
    },
    error::{AppError, Result},
    notifications::{send_best_effort, ConfirmationDetails, Notification, Notifier},
    payments::webhook::{BookingCheckout, CheckoutKind, CompletedCheckout, WebhookEvent, WebhookVerifier},
    repository::{CourseRepository, SignupRepository},
};

/// What a webhook delivery did to the booking data.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ReconcileOutcome {
    Created {
        signup_id: Uuid,
        status: SignupStatus,
        waitlist_position: Option<i64>,
    },
    /// A signup for this payment intent already exists.
    Duplicate { signup_id: Uuid },
    Claimed { signup_id: Uuid },
    AlreadyClaimed { signup_id: Uuid },
    PaymentFailed { signup_id: Uuid },
    Refunded { signup_id: Uuid },
    /// No signup matches the payment intent.
    Unmatched,
    Ignored,
}

/// Sole writer of booking transitions driven by payment events.
///
/// Safe under at-least-once delivery: ordinary completions dedupe on the
/// payment intent id (backed by a unique index), claims on the offer
/// status transition.
pub struct Reconciler {
    verifier: WebhookVerifier,
    signups: Arc<dyn SignupRepository>,
    courses: Arc<dyn CourseRepository>,
    notifier: Arc<dyn Notifier>,
}

impl Reconciler {
    pub fn new(
        verifier: WebhookVerifier,
        signups: Arc<dyn SignupRepository>,
        courses: Arc<dyn CourseRepository>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            verifier,
            signups,
            courses,
            notifier,
        }
    }

    pub async fn handle_webhook(
        &self,
        payload: &str,
        signature: &str,
        now: DateTime<Utc>,
    ) -> Result<ReconcileOutcome> {
        let event = self.verifier.construct_event(payload, signature, now)?;
        self.reconcile(event, now).await
    }

    pub async fn reconcile(&self, event: WebhookEvent, now: DateTime<Utc>) -> Result<ReconcileOutcome> {
        match event {
            WebhookEvent::CheckoutCompleted(checkout) => self.handle_completed(checkout, now).await,
            WebhookEvent::CheckoutExpired { session_id } => {
                tracing::info!("Checkout session expired: {}", session_id);
                Ok(ReconcileOutcome::Ignored)
            }
            WebhookEvent::PaymentFailed { payment_intent_id } => {
                self.handle_failed_payment(&payment_intent_id).await
            }
            WebhookEvent::ChargeRefunded { payment_intent_id } => {
                self.handle_refund(&payment_intent_id).await
            }
            WebhookEvent::Unhandled { event_type } => {
                tracing::debug!("Unhandled webhook event type: {}", event_type);
                Ok(ReconcileOutcome::Ignored)
            }
        }
    }

    async fn handle_completed(
        &self,
        checkout: CompletedCheckout,
        now: DateTime<Utc>,
    ) -> Result<ReconcileOutcome> {
        let CompletedCheckout {
            session_id,
            payment_intent_id,
            amount_total_minor,
            kind,
        } = checkout;

        match kind {
            CheckoutKind::Booking(booking) => {
                self.complete_booking(booking, session_id, payment_intent_id, amount_total_minor)
                    .await
            }
            CheckoutKind::WaitlistClaim { signup_id, claim_token } => {
                let payment = ClaimPayment {
                    checkout_session_id: session_id,
                    payment_intent_id,
                    amount_paid_minor: amount_total_minor,
                };
                self.complete_claim(signup_id, &claim_token, payment, now).await
            }
        }
    }

    async fn complete_booking(
        &self,
        booking: BookingCheckout,
        session_id: String,
        payment_intent_id: String,
        amount_total_minor: Option<i64>,
    ) -> Result<ReconcileOutcome> {
        if let Some(existing) = self.signups.find_by_payment_intent(&payment_intent_id).await? {
            tracing::debug!("Replay of payment intent {}, signup {}", payment_intent_id, existing.id);
            return Ok(ReconcileOutcome::Duplicate { signup_id: existing.id });
        }

        let course = self
            .courses
            .find_by_id(booking.course_id)
            .await?
            .ok_or_else(|| AppError::BadRequest(format!("Unknown course: {}", booking.course_id)))?;
        if course.organization_id != booking.organization_id {
            return Err(AppError::BadRequest(format!(
                "Course {} does not belong to organization {}",
                course.id, booking.organization_id
            )));
        }

        let (class_date, class_time) = match booking.drop_in_session_id {
            Some(session_id) => {
                let session = self
                    .courses
                    .find_session(session_id)
                    .await?
                    .filter(|session| session.course_id == course.id)
                    .ok_or_else(|| AppError::BadRequest(format!("Unknown course session: {}", session_id)))?;
                (Some(session.session_date), session.start_time)
            }
            None => (None, None),
        };

        let new_signup = NewSignup {
            organization_id: booking.organization_id,
            course_id: course.id,
            course_session_id: booking.drop_in_session_id,
            participant: booking.participant,
            payment_status: PaymentStatus::Paid,
            stripe_checkout_session_id: Some(session_id),
            stripe_payment_intent_id: Some(payment_intent_id.clone()),
            amount_paid_minor: amount_total_minor,
            class_date,
            class_time,
        };

        // Capacity is decided now, not when checkout started.
        let signup = match self.signups.create_placed(new_signup, course.max_participants).await {
            Ok(signup) => signup,
            Err(AppError::Conflict(_)) => {
                // A concurrent delivery inserted first.
                let existing = self
                    .signups
                    .find_by_payment_intent(&payment_intent_id)
                    .await?
                    .ok_or_else(|| AppError::Internal(format!(
                        "Conflict on payment intent {} but no signup found",
                        payment_intent_id
                    )))?;
                return Ok(ReconcileOutcome::Duplicate { signup_id: existing.id });
            }
            Err(e) => return Err(e),
        };

        tracing::info!(
            "Created signup {} for course {} as {:?}",
            signup.id,
            course.id,
            signup.status
        );
        self.send_confirmation(&signup, &course).await;

        Ok(ReconcileOutcome::Created {
            signup_id: signup.id,
            status: signup.status,
            waitlist_position: signup.waitlist_position,
        })
    }

    async fn complete_claim(
        &self,
        signup_id: Uuid,
        claim_token: &str,
        payment: ClaimPayment,
        now: DateTime<Utc>,
    ) -> Result<ReconcileOutcome> {
        let signup = self
            .signups
            .find_by_id(signup_id)
            .await?
            .ok_or_else(|| AppError::InvalidClaim(format!("No signup {}", signup_id)))?;

        let token_matches = signup
            .offer_claim_token
            .as_deref()
            .map(|stored| bool::from(stored.as_bytes().ct_eq(claim_token.as_bytes())))
            .unwrap_or(false);
        if !token_matches {
            tracing::warn!("Claim token mismatch for signup {}", signup_id);
            return Err(AppError::InvalidClaim("Claim link is not valid".to_string()));
        }

        match signup.claim_state(now) {
            ClaimState::Claimed => {
                tracing::debug!("Offer for signup {} already claimed", signup_id);
                return Ok(ReconcileOutcome::AlreadyClaimed { signup_id });
            }
            _ if signup.status != SignupStatus::Waitlist => {
                tracing::warn!("Claim attempted on signup {} in status {:?}", signup_id, signup.status);
                return Err(AppError::InvalidClaim("Signup is no longer on the waitlist".to_string()));
            }
            ClaimState::Claimable => {}
            ClaimState::Expired => {
                tracing::warn!("Claim attempted on expired offer for signup {}", signup_id);
                return Err(AppError::OfferExpired("The offer has expired".to_string()));
            }
            ClaimState::NoOffer => {
                return Err(AppError::InvalidClaim("No open offer for this signup".to_string()));
            }
        }

        if signup.payment_status == PaymentStatus::Paid {
            tracing::warn!(
                "Signup {} was already paid, claim payment {} needs a manual refund",
                signup_id,
                payment.payment_intent_id
            );
        }

        let Some(claimed) = self.signups.claim_offer(signup_id, claim_token, &payment).await? else {
            tracing::debug!("Offer for signup {} claimed by a concurrent delivery", signup_id);
            return Ok(ReconcileOutcome::AlreadyClaimed { signup_id });
        };

        tracing::info!("Waitlist offer claimed, signup {} confirmed", signup_id);
        match self.courses.find_by_id(claimed.course_id).await {
            Ok(Some(course)) => self.send_confirmation(&claimed, &course).await,
            Ok(None) => tracing::warn!("Course {} missing, skipping confirmation", claimed.course_id),
            Err(e) => tracing::error!("Course lookup failed, skipping confirmation: {:?}", e),
        }

        Ok(ReconcileOutcome::Claimed { signup_id })
    }

    async fn handle_failed_payment(&self, payment_intent_id: &str) -> Result<ReconcileOutcome> {
        let Some(mut signup) = self.signups.find_by_payment_intent(payment_intent_id).await? else {
            tracing::warn!("Payment failed for unknown intent: {}", payment_intent_id);
            return Ok(ReconcileOutcome::Unmatched);
        };

        signup.payment_status = PaymentStatus::Failed;
        let signup = self.signups.update(&signup).await?;
        tracing::warn!("Payment failed for signup {}", signup.id);

        Ok(ReconcileOutcome::PaymentFailed { signup_id: signup.id })
    }

    async fn handle_refund(&self, payment_intent_id: &str) -> Result<ReconcileOutcome> {
        let Some(mut signup) = self.signups.find_by_payment_intent(payment_intent_id).await? else {
            tracing::warn!("Refund for unknown intent: {}", payment_intent_id);
            return Ok(ReconcileOutcome::Unmatched);
        };

        signup.cancel();
        signup.payment_status = PaymentStatus::Refunded;
        let signup = self.signups.update(&signup).await?;
        tracing::info!("Signup {} refunded and cancelled", signup.id);

        Ok(ReconcileOutcome::Refunded { signup_id: signup.id })
    }

    async fn send_confirmation(&self, signup: &Signup, course: &Course) {
        let notification = Notification::SignupConfirmation {
            to: signup.participant_email.clone(),
            details: ConfirmationDetails::for_signup(signup, course),
        };
        send_best_effort(self.notifier.as_ref(), notification).await;
    }
}
