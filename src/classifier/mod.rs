//! Read-side projection of signups for the teacher dashboard.
//!
//! Everything here is pure: callers pass the signups and the instant to
//! classify at, and get freshly built view models back.

pub mod collate;
pub mod exception;
pub mod filter;
pub mod grouping;
pub mod time;

use serde::Serialize;

use crate::domain::ScheduledSignup;

pub use exception::{detect_exception, ExceptionType};
pub use filter::{apply_filters, Mode, PaymentFilter, SignupFilters, StatusFilter, TimeFilter};
pub use grouping::{group_signups, AnnotatedSignup, GroupBuckets, GroupCounts, SignupGroup};
pub use time::ClassifyAt;

#[derive(Debug, Clone, Serialize)]
pub struct ClassifiedSignups {
    pub groups: Vec<SignupGroup>,
    pub has_active_filters: bool,
    /// Signups needing attention across the whole input, ignoring filters.
    pub needs_attention: usize,
}

pub fn classify(
    signups: &[ScheduledSignup],
    filters: &SignupFilters,
    at: ClassifyAt,
) -> ClassifiedSignups {
    let filtered = apply_filters(signups, filters, &at);
    let groups = group_signups(filtered, at.now);
    let needs_attention = signups
        .iter()
        .filter(|entry| detect_exception(&entry.signup, at.now).is_some())
        .count();

    ClassifiedSignups {
        groups,
        has_active_filters: filters.has_active_filters(),
        needs_attention,
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use chrono::{NaiveDate, TimeZone, Utc};
    use uuid::Uuid;

    use super::ClassifyAt;
    use crate::domain::{PaymentStatus, ScheduledSignup, Signup, SignupStatus};

    pub fn signup(name: &str, status: SignupStatus) -> Signup {
        let now = Utc::now();
        Signup {
            id: Uuid::new_v4(),
            organization_id: Uuid::nil(),
            course_id: Uuid::new_v4(),
            course_session_id: None,
            participant_name: name.to_string(),
            participant_email: format!("{}@example.com", name.to_lowercase().replace(' ', ".")),
            participant_phone: None,
            status,
            payment_status: PaymentStatus::Paid,
            waitlist_position: None,
            offer_status: None,
            offer_expires_at: None,
            offer_claim_token: None,
            stripe_checkout_session_id: None,
            stripe_payment_intent_id: None,
            amount_paid_minor: None,
            class_date: None,
            class_time: None,
            registered_at: now,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn scheduled(
        name: &str,
        status: SignupStatus,
        course_id: Uuid,
        date: NaiveDate,
    ) -> ScheduledSignup {
        let mut signup = signup(name, status);
        signup.course_id = course_id;
        ScheduledSignup {
            signup,
            course_name: "Morning Flow".to_string(),
            session_at: date.and_hms_opt(18, 0, 0).unwrap(),
        }
    }

    /// Noon UTC on `today`.
    pub fn at(today: NaiveDate) -> ClassifyAt {
        let now = Utc.from_utc_datetime(&today.and_hms_opt(12, 0, 0).unwrap());
        ClassifyAt::new(now, today)
    }
}
