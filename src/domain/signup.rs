use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A booking linking one participant to a course or a single drop-in session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Signup {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub course_id: Uuid,
    pub course_session_id: Option<Uuid>,
    pub participant_name: String,
    pub participant_email: String,
    pub participant_phone: Option<String>,
    pub status: SignupStatus,
    pub payment_status: PaymentStatus,
    pub waitlist_position: Option<i64>,
    pub offer_status: Option<OfferStatus>,
    pub offer_expires_at: Option<DateTime<Utc>>,
    pub offer_claim_token: Option<String>,
    pub stripe_checkout_session_id: Option<String>,
    pub stripe_payment_intent_id: Option<String>,
    pub amount_paid_minor: Option<i64>,
    /// Explicit class date for drop-ins that don't follow the course schedule.
    pub class_date: Option<NaiveDate>,
    pub class_time: Option<NaiveTime>,
    pub registered_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SignupStatus {
    Confirmed,
    Waitlist,
    Cancelled,
    CourseCancelled,
}

impl SignupStatus {
    /// Both the participant's and the studio's cancellations count.
    pub fn is_cancelled(self) -> bool {
        matches!(self, SignupStatus::Cancelled | SignupStatus::CourseCancelled)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Paid,
    Failed,
    Refunded,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum OfferStatus {
    Pending,
    Claimed,
    Expired,
}

/// Where a waitlist offer stands at a given instant.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ClaimState {
    Claimable,
    Claimed,
    Expired,
    NoOffer,
}

impl Signup {
    pub fn claim_state(&self, now: DateTime<Utc>) -> ClaimState {
        match self.offer_status {
            Some(OfferStatus::Claimed) => ClaimState::Claimed,
            Some(OfferStatus::Expired) => ClaimState::Expired,
            Some(OfferStatus::Pending) => match self.offer_expires_at {
                Some(expires_at) if expires_at > now => ClaimState::Claimable,
                Some(_) => ClaimState::Expired,
                None => ClaimState::NoOffer,
            },
            None => ClaimState::NoOffer,
        }
    }

    /// Cancel the signup. An offer still pending is withdrawn so its claim
    /// link can no longer bring the signup back.
    pub fn cancel(&mut self) {
        self.status = SignupStatus::Cancelled;
        self.waitlist_position = None;
        if self.offer_status == Some(OfferStatus::Pending) {
            self.offer_status = Some(OfferStatus::Expired);
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Participant {
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
}

/// Fields for a signup about to be inserted. Status and waitlist position
/// are decided by the repository at insert time from current capacity.
#[derive(Debug, Clone)]
pub struct NewSignup {
    pub organization_id: Uuid,
    pub course_id: Uuid,
    pub course_session_id: Option<Uuid>,
    pub participant: Participant,
    pub payment_status: PaymentStatus,
    pub stripe_checkout_session_id: Option<String>,
    pub stripe_payment_intent_id: Option<String>,
    pub amount_paid_minor: Option<i64>,
    pub class_date: Option<NaiveDate>,
    pub class_time: Option<NaiveTime>,
}

/// Payment details recorded when a waitlist offer is converted.
#[derive(Debug, Clone)]
pub struct ClaimPayment {
    pub checkout_session_id: String,
    pub payment_intent_id: String,
    pub amount_paid_minor: Option<i64>,
}

/// A signup joined with the schedule information of its course.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ScheduledSignup {
    #[serde(flatten)]
    pub signup: Signup,
    pub course_name: String,
    /// Studio-local wall-clock time of the class this signup attends.
    pub session_at: chrono::NaiveDateTime,
}
