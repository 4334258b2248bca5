use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::domain::{OfferStatus, PaymentStatus, Signup, SignupStatus};

/// Offers closer than this to their deadline need the teacher's attention.
const OFFER_EXPIRING_WINDOW_HOURS: i64 = 24;

/// Why a signup needs the teacher's attention.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ExceptionType {
    PaymentFailed,
    OfferExpiring,
    PendingPayment,
}

impl ExceptionType {
    /// Lower sorts first.
    pub fn priority(self) -> u8 {
        match self {
            ExceptionType::PaymentFailed => 1,
            ExceptionType::OfferExpiring => 2,
            ExceptionType::PendingPayment => 3,
        }
    }
}

/// Classify a signup at `now`. The first matching rule wins.
///
/// The result depends on wall-clock time: an offer drifts into
/// `OfferExpiring` once its deadline is less than a day away, so callers
/// must evaluate this per request rather than store it.
pub fn detect_exception(signup: &Signup, now: DateTime<Utc>) -> Option<ExceptionType> {
    if signup.payment_status == PaymentStatus::Failed {
        return Some(ExceptionType::PaymentFailed);
    }

    if signup.offer_status == Some(OfferStatus::Pending) {
        if let Some(expires_at) = signup.offer_expires_at {
            let remaining = expires_at - now;
            if remaining > Duration::zero()
                && remaining < Duration::hours(OFFER_EXPIRING_WINDOW_HOURS)
            {
                return Some(ExceptionType::OfferExpiring);
            }
        }
    }

    if signup.payment_status == PaymentStatus::Pending && signup.status == SignupStatus::Confirmed {
        return Some(ExceptionType::PendingPayment);
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::test_support::signup;

    #[test]
    fn failed_payment_wins_over_expiring_offer() {
        let now = Utc::now();
        let mut s = signup("Kari Nordmann", SignupStatus::Waitlist);
        s.payment_status = PaymentStatus::Failed;
        s.offer_status = Some(OfferStatus::Pending);
        s.offer_expires_at = Some(now + Duration::hours(3));

        assert_eq!(detect_exception(&s, now), Some(ExceptionType::PaymentFailed));
    }

    #[test]
    fn offer_expiry_boundaries() {
        let now = Utc::now();
        let mut s = signup("Kari Nordmann", SignupStatus::Waitlist);
        s.offer_status = Some(OfferStatus::Pending);

        s.offer_expires_at = Some(now + Duration::hours(23) + Duration::minutes(59));
        assert_eq!(detect_exception(&s, now), Some(ExceptionType::OfferExpiring));

        s.offer_expires_at = Some(now + Duration::hours(25));
        assert_eq!(detect_exception(&s, now), None);

        s.offer_expires_at = Some(now - Duration::minutes(1));
        assert_eq!(detect_exception(&s, now), None);

        s.offer_expires_at = None;
        assert_eq!(detect_exception(&s, now), None);
    }

    #[test]
    fn pending_payment_only_flags_confirmed_signups() {
        let now = Utc::now();
        let mut s = signup("Kari Nordmann", SignupStatus::Confirmed);
        s.payment_status = PaymentStatus::Pending;
        assert_eq!(detect_exception(&s, now), Some(ExceptionType::PendingPayment));

        s.status = SignupStatus::Waitlist;
        assert_eq!(detect_exception(&s, now), None);

        s.status = SignupStatus::Confirmed;
        s.payment_status = PaymentStatus::Paid;
        assert_eq!(detect_exception(&s, now), None);
    }

    #[test]
    fn same_signup_reclassifies_as_time_passes() {
        let now = Utc::now();
        let mut s = signup("Kari Nordmann", SignupStatus::Waitlist);
        s.offer_status = Some(OfferStatus::Pending);
        s.offer_expires_at = Some(now + Duration::hours(30));

        assert_eq!(detect_exception(&s, now), None);
        assert_eq!(
            detect_exception(&s, now + Duration::hours(8)),
            Some(ExceptionType::OfferExpiring)
        );
    }
}
