use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use super::{
    collate::compare_names,
    exception::{detect_exception, ExceptionType},
};
use crate::domain::{ScheduledSignup, SignupStatus};

/// A signup copied out of the input with its detected exception attached.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct AnnotatedSignup {
    #[serde(flatten)]
    pub entry: ScheduledSignup,
    pub exception_type: Option<ExceptionType>,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct GroupBuckets {
    pub exceptions: Vec<AnnotatedSignup>,
    pub confirmed: Vec<AnnotatedSignup>,
    pub waitlist: Vec<AnnotatedSignup>,
    pub cancelled: Vec<AnnotatedSignup>,
}

/// Counts by raw status, taken before exception routing.
#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq, Eq)]
pub struct GroupCounts {
    pub confirmed: usize,
    pub waitlist: usize,
    pub cancelled: usize,
    pub total: usize,
}

/// All signups for one course on one calendar day.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SignupGroup {
    pub course_id: Uuid,
    pub course_name: String,
    pub session_date: NaiveDate,
    pub session_at: NaiveDateTime,
    pub signups: GroupBuckets,
    pub counts: GroupCounts,
}

/// Partition by `(course, day)`, route each signup into exactly one bucket,
/// and order buckets and groups for display. Inputs are never modified.
pub fn group_signups<'a, I>(signups: I, now: DateTime<Utc>) -> Vec<SignupGroup>
where
    I: IntoIterator<Item = &'a ScheduledSignup>,
{
    let mut partitions: HashMap<(Uuid, NaiveDate), Vec<&ScheduledSignup>> = HashMap::new();
    for entry in signups {
        partitions
            .entry((entry.signup.course_id, entry.session_at.date()))
            .or_default()
            .push(entry);
    }

    let mut groups: Vec<SignupGroup> = partitions
        .into_iter()
        .map(|((course_id, session_date), members)| build_group(course_id, session_date, members, now))
        .collect();

    groups.sort_by(|a, b| {
        a.session_at
            .cmp(&b.session_at)
            .then_with(|| compare_names(&a.course_name, &b.course_name))
            .then_with(|| a.course_id.cmp(&b.course_id))
    });
    groups
}

fn build_group(
    course_id: Uuid,
    session_date: NaiveDate,
    members: Vec<&ScheduledSignup>,
    now: DateTime<Utc>,
) -> SignupGroup {
    let counts = count_raw(&members);
    // Members are non-empty by construction of the partition map.
    let session_at = members
        .iter()
        .map(|entry| entry.session_at)
        .min()
        .unwrap_or_else(|| session_date.and_time(chrono::NaiveTime::MIN));
    let course_name = members
        .first()
        .map(|entry| entry.course_name.clone())
        .unwrap_or_default();

    let mut buckets = GroupBuckets::default();
    for entry in members {
        let annotated = AnnotatedSignup {
            entry: entry.clone(),
            exception_type: detect_exception(&entry.signup, now),
        };
        route(&mut buckets, annotated);
    }

    buckets
        .exceptions
        .sort_by_key(|s| s.exception_type.map_or(u8::MAX, ExceptionType::priority));
    buckets
        .waitlist
        .sort_by_key(|s| s.entry.signup.waitlist_position.unwrap_or(i64::MAX));
    buckets.confirmed.sort_by(|a, b| {
        compare_names(&a.entry.signup.participant_name, &b.entry.signup.participant_name)
    });
    buckets.cancelled.sort_by(|a, b| {
        compare_names(&a.entry.signup.participant_name, &b.entry.signup.participant_name)
    });

    SignupGroup {
        course_id,
        course_name,
        session_date,
        session_at,
        signups: buckets,
        counts,
    }
}

/// Cancellation wins over any exception: a closed booking is shown with
/// the cancelled ones and keeps its exception only as an annotation.
fn route(buckets: &mut GroupBuckets, annotated: AnnotatedSignup) {
    let status = annotated.entry.signup.status;
    if status.is_cancelled() {
        buckets.cancelled.push(annotated);
    } else if annotated.exception_type.is_some() {
        buckets.exceptions.push(annotated);
    } else if status == SignupStatus::Confirmed {
        buckets.confirmed.push(annotated);
    } else {
        buckets.waitlist.push(annotated);
    }
}

fn count_raw(members: &[&ScheduledSignup]) -> GroupCounts {
    let mut counts = GroupCounts {
        total: members.len(),
        ..GroupCounts::default()
    };
    for entry in members {
        match entry.signup.status {
            SignupStatus::Confirmed => counts.confirmed += 1,
            SignupStatus::Waitlist => counts.waitlist += 1,
            SignupStatus::Cancelled | SignupStatus::CourseCancelled => counts.cancelled += 1,
        }
    }
    counts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::test_support::scheduled;
    use crate::domain::PaymentStatus;
    use chrono::{Duration, NaiveDate};

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, d).unwrap()
    }

    fn names(bucket: &[AnnotatedSignup]) -> Vec<&str> {
        bucket.iter().map(|s| s.entry.signup.participant_name.as_str()).collect()
    }

    #[test]
    fn waitlist_bucket_orders_by_position() {
        let course = Uuid::new_v4();
        let mut paid = scheduled("Anne", SignupStatus::Confirmed, course, day(10));
        paid.signup.payment_status = PaymentStatus::Paid;
        let mut second = scheduled("Second", SignupStatus::Waitlist, course, day(10));
        second.signup.waitlist_position = Some(2);
        let mut first = scheduled("First", SignupStatus::Waitlist, course, day(10));
        first.signup.waitlist_position = Some(1);
        let mut unplaced = scheduled("Unplaced", SignupStatus::Waitlist, course, day(10));
        unplaced.signup.waitlist_position = None;
        let input = vec![paid, unplaced, second, first];

        let groups = group_signups(&input, Utc::now());
        assert_eq!(groups.len(), 1);
        assert_eq!(names(&groups[0].signups.waitlist), vec!["First", "Second", "Unplaced"]);
        assert_eq!(names(&groups[0].signups.confirmed), vec!["Anne"]);
    }

    #[test]
    fn exceptions_are_not_duplicated_and_counts_use_raw_status() {
        let course = Uuid::new_v4();
        let mut failed = scheduled("Failed", SignupStatus::Confirmed, course, day(10));
        failed.signup.payment_status = PaymentStatus::Failed;
        let mut pending = scheduled("Pending", SignupStatus::Confirmed, course, day(10));
        pending.signup.payment_status = PaymentStatus::Pending;
        let mut paid = scheduled("Paid", SignupStatus::Confirmed, course, day(10));
        paid.signup.payment_status = PaymentStatus::Paid;
        let input = vec![pending, paid, failed];

        let groups = group_signups(&input, Utc::now());
        let group = &groups[0];
        assert_eq!(names(&group.signups.exceptions), vec!["Failed", "Pending"]);
        assert_eq!(names(&group.signups.confirmed), vec!["Paid"]);
        assert_eq!(group.counts.confirmed, 3);
        assert_eq!(group.counts.total, 3);
    }

    #[test]
    fn cancelled_signups_stay_in_cancelled_bucket() {
        let course = Uuid::new_v4();
        let mut refunded = scheduled("Refunded", SignupStatus::Cancelled, course, day(10));
        refunded.signup.payment_status = PaymentStatus::Refunded;
        let mut failed = scheduled("Failed", SignupStatus::Cancelled, course, day(10));
        failed.signup.payment_status = PaymentStatus::Failed;
        let input = vec![refunded, failed];

        let groups = group_signups(&input, Utc::now());
        let group = &groups[0];
        assert_eq!(names(&group.signups.cancelled), vec!["Failed", "Refunded"]);
        assert!(group.signups.exceptions.is_empty());
        assert!(group.signups.confirmed.is_empty());
        assert_eq!(
            group.signups.cancelled[0].exception_type,
            Some(ExceptionType::PaymentFailed)
        );
    }

    #[test]
    fn groups_split_by_course_and_day_sorted_soonest_first() {
        let yin = Uuid::new_v4();
        let flow = Uuid::new_v4();
        let mut later = scheduled("A", SignupStatus::Confirmed, yin, day(12));
        later.course_name = "Yin".to_string();
        let mut sooner = scheduled("B", SignupStatus::Confirmed, flow, day(10));
        sooner.course_name = "Flow".to_string();
        let mut same_course_other_day = scheduled("C", SignupStatus::Confirmed, flow, day(11));
        same_course_other_day.course_name = "Flow".to_string();
        let input = vec![later, same_course_other_day, sooner];

        let groups = group_signups(&input, Utc::now());
        let order: Vec<_> = groups.iter().map(|g| (g.course_name.as_str(), g.session_date)).collect();
        assert_eq!(order, vec![("Flow", day(10)), ("Flow", day(11)), ("Yin", day(12))]);
    }

    #[test]
    fn confirmed_bucket_uses_norwegian_name_order() {
        let course = Uuid::new_v4();
        let input = vec![
            scheduled("Åse", SignupStatus::Confirmed, course, day(10)),
            scheduled("Øystein", SignupStatus::Confirmed, course, day(10)),
            scheduled("Zara", SignupStatus::Confirmed, course, day(10)),
        ];
        let groups = group_signups(&input, Utc::now());
        assert_eq!(names(&groups[0].signups.confirmed), vec!["Zara", "Øystein", "Åse"]);
    }

    #[test]
    fn grouping_leaves_input_untouched() {
        let course = Uuid::new_v4();
        let mut offer = scheduled("Offer", SignupStatus::Waitlist, course, day(10));
        offer.signup.offer_status = Some(crate::domain::OfferStatus::Pending);
        offer.signup.offer_expires_at = Some(Utc::now() + Duration::hours(2));
        let input = vec![offer];
        let before = input.clone();

        let groups = group_signups(&input, Utc::now());
        assert_eq!(input, before);
        assert_eq!(
            groups[0].signups.exceptions[0].exception_type,
            Some(ExceptionType::OfferExpiring)
        );
    }
}
