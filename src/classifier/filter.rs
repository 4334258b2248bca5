use serde::{Deserialize, Serialize};

use super::{exception::detect_exception, time::{end_of_week, ClassifyAt}};
use crate::domain::{PaymentStatus, ScheduledSignup, SignupStatus};

/// Baseline dataset selection applied before every other filter.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    #[default]
    Active,
    Ended,
    NeedsAttention,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TimeFilter {
    Today,
    ThisWeek,
    Upcoming,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StatusFilter {
    #[default]
    All,
    Confirmed,
    Waitlist,
    Cancelled,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PaymentFilter {
    #[default]
    All,
    Paid,
    Refunded,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SignupFilters {
    #[serde(default)]
    pub mode: Mode,
    pub time: Option<TimeFilter>,
    #[serde(default)]
    pub status: StatusFilter,
    #[serde(default)]
    pub payment: PaymentFilter,
    #[serde(default)]
    pub search: String,
}

impl Mode {
    /// Time filter a mode starts with; `Active` shows upcoming classes.
    pub fn default_time_filter(self) -> Option<TimeFilter> {
        match self {
            Mode::Active => Some(TimeFilter::Upcoming),
            Mode::Ended | Mode::NeedsAttention => None,
        }
    }
}

impl SignupFilters {
    pub fn for_mode(mode: Mode) -> Self {
        Self {
            mode,
            time: mode.default_time_filter(),
            ..Self::default()
        }
    }

    /// Whether anything differs from the mode's defaults.
    pub fn has_active_filters(&self) -> bool {
        self.time != self.mode.default_time_filter()
            || self.status != StatusFilter::All
            || self.payment != PaymentFilter::All
            || !self.search.trim().is_empty()
    }
}

fn matches_mode(entry: &ScheduledSignup, mode: Mode, at: &ClassifyAt) -> bool {
    let session_date = entry.session_at.date();
    let cancelled = entry.signup.status.is_cancelled();
    match mode {
        Mode::Active => session_date >= at.today && !cancelled,
        Mode::Ended => cancelled || session_date < at.today,
        Mode::NeedsAttention => detect_exception(&entry.signup, at.now).is_some(),
    }
}

fn matches_time(entry: &ScheduledSignup, time: TimeFilter, at: &ClassifyAt) -> bool {
    let session_date = entry.session_at.date();
    match time {
        TimeFilter::Today => session_date == at.today,
        TimeFilter::ThisWeek => session_date >= at.today && session_date <= end_of_week(at.today),
        TimeFilter::Upcoming => session_date >= at.today,
    }
}

fn matches_status(entry: &ScheduledSignup, status: StatusFilter) -> bool {
    match status {
        StatusFilter::All => true,
        StatusFilter::Confirmed => entry.signup.status == SignupStatus::Confirmed,
        StatusFilter::Waitlist => entry.signup.status == SignupStatus::Waitlist,
        StatusFilter::Cancelled => entry.signup.status.is_cancelled(),
    }
}

fn matches_payment(entry: &ScheduledSignup, payment: PaymentFilter) -> bool {
    match payment {
        PaymentFilter::All => true,
        PaymentFilter::Paid => entry.signup.payment_status == PaymentStatus::Paid,
        PaymentFilter::Refunded => entry.signup.payment_status == PaymentStatus::Refunded,
    }
}

fn matches_search(entry: &ScheduledSignup, needle: &str) -> bool {
    entry.signup.participant_name.to_lowercase().contains(needle)
        || entry.signup.participant_email.to_lowercase().contains(needle)
}

/// Narrow `signups` stage by stage: mode, time, status, payment, search.
pub fn apply_filters<'a>(
    signups: &'a [ScheduledSignup],
    filters: &SignupFilters,
    at: &ClassifyAt,
) -> Vec<&'a ScheduledSignup> {
    let needle = filters.search.trim().to_lowercase();

    signups
        .iter()
        .filter(|entry| matches_mode(entry, filters.mode, at))
        .filter(|entry| filters.time.map_or(true, |time| matches_time(entry, time, at)))
        .filter(|entry| matches_status(entry, filters.status))
        .filter(|entry| matches_payment(entry, filters.payment))
        .filter(|entry| needle.is_empty() || matches_search(entry, &needle))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::test_support::{at, scheduled};
    use chrono::{Duration, NaiveDate};
    use uuid::Uuid;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, d).unwrap()
    }

    #[test]
    fn search_matches_name_or_email_case_insensitively() {
        let course = Uuid::new_v4();
        let mut kari = scheduled("Kari Nordmann", SignupStatus::Confirmed, course, day(6));
        kari.signup.participant_email = "kari@x.no".to_string();
        let lars = scheduled("Lars Hansen", SignupStatus::Confirmed, course, day(6));
        let signups = vec![kari, lars];

        let filters = SignupFilters {
            search: "kari".to_string(),
            ..SignupFilters::for_mode(Mode::Active)
        };
        let found = apply_filters(&signups, &filters, &at(day(5)));
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].signup.participant_name, "Kari Nordmann");

        let by_email = SignupFilters {
            search: "  X.NO ".to_string(),
            ..SignupFilters::for_mode(Mode::Active)
        };
        assert_eq!(apply_filters(&signups, &by_email, &at(day(5))).len(), 1);
    }

    #[test]
    fn active_and_ended_modes_split_on_today_and_cancellation() {
        let course = Uuid::new_v4();
        let signups = vec![
            scheduled("Past", SignupStatus::Confirmed, course, day(4)),
            scheduled("Today", SignupStatus::Confirmed, course, day(5)),
            scheduled("Cancelled", SignupStatus::CourseCancelled, course, day(9)),
        ];
        let now = at(day(5));

        let active = apply_filters(&signups, &SignupFilters::for_mode(Mode::Active), &now);
        let names: Vec<_> = active.iter().map(|s| s.signup.participant_name.as_str()).collect();
        assert_eq!(names, vec!["Today"]);

        let ended = apply_filters(&signups, &SignupFilters::for_mode(Mode::Ended), &now);
        let names: Vec<_> = ended.iter().map(|s| s.signup.participant_name.as_str()).collect();
        assert_eq!(names, vec!["Past", "Cancelled"]);
    }

    #[test]
    fn this_week_runs_through_sunday() {
        let course = Uuid::new_v4();
        // 2025-03-05 is a Wednesday; the 9th is Sunday.
        let signups = vec![
            scheduled("Sunday", SignupStatus::Confirmed, course, day(9)),
            scheduled("Monday", SignupStatus::Confirmed, course, day(10)),
        ];
        let filters = SignupFilters {
            time: Some(TimeFilter::ThisWeek),
            ..SignupFilters::for_mode(Mode::Active)
        };
        let found = apply_filters(&signups, &filters, &at(day(5)));
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].signup.participant_name, "Sunday");
    }

    #[test]
    fn needs_attention_keeps_only_exceptions() {
        let course = Uuid::new_v4();
        let mut failed = scheduled("Failed", SignupStatus::Confirmed, course, day(2));
        failed.signup.payment_status = PaymentStatus::Failed;
        let mut offer = scheduled("Offer", SignupStatus::Waitlist, course, day(8));
        let now = at(day(5));
        offer.signup.offer_status = Some(crate::domain::OfferStatus::Pending);
        offer.signup.offer_expires_at = Some(now.now + Duration::hours(40));
        let signups = vec![failed, offer];

        let found = apply_filters(&signups, &SignupFilters::for_mode(Mode::NeedsAttention), &now);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].signup.participant_name, "Failed");
    }

    #[test]
    fn status_and_payment_filters_narrow_further() {
        let course = Uuid::new_v4();
        let mut refunded = scheduled("Refunded", SignupStatus::Cancelled, course, day(9));
        refunded.signup.payment_status = PaymentStatus::Refunded;
        let signups = vec![
            refunded,
            scheduled("Paid", SignupStatus::Confirmed, course, day(9)),
            scheduled("Waiting", SignupStatus::Waitlist, course, day(9)),
        ];
        let now = at(day(5));

        let cancelled = SignupFilters {
            status: StatusFilter::Cancelled,
            payment: PaymentFilter::Refunded,
            ..SignupFilters::for_mode(Mode::Ended)
        };
        assert_eq!(apply_filters(&signups, &cancelled, &now).len(), 1);

        let waitlist = SignupFilters {
            status: StatusFilter::Waitlist,
            ..SignupFilters::for_mode(Mode::Active)
        };
        let found = apply_filters(&signups, &waitlist, &now);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].signup.participant_name, "Waiting");
    }

    #[test]
    fn active_filters_compare_against_mode_defaults() {
        assert!(!SignupFilters::for_mode(Mode::Active).has_active_filters());
        assert!(!SignupFilters::for_mode(Mode::Ended).has_active_filters());

        let no_time = SignupFilters { time: None, ..SignupFilters::for_mode(Mode::Active) };
        assert!(no_time.has_active_filters());

        let upcoming_in_ended = SignupFilters {
            time: Some(TimeFilter::Upcoming),
            ..SignupFilters::for_mode(Mode::Ended)
        };
        assert!(upcoming_in_ended.has_active_filters());

        let blank_search = SignupFilters {
            search: "   ".to_string(),
            ..SignupFilters::for_mode(Mode::Active)
        };
        assert!(!blank_search.has_active_filters());
    }
}
