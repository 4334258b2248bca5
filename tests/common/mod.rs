#![allow(dead_code)]

use std::sync::Arc;

use chrono::{DateTime, Duration, Local, NaiveDate, Utc};
use shala::{
    domain::{Course, CreateCourseRequest, NewSignup, Organization, Participant, PaymentStatus, Signup},
    payments::webhook::compute_signature,
    repository::{CourseRepository, SignupRepository, SqliteCourseRepository, SqliteSignupRepository},
};
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};

pub const WEBHOOK_SECRET: &str = "whsec_test_secret";

/// A single pinned connection so every query sees the same in-memory database.
pub async fn test_pool() -> anyhow::Result<SqlitePool> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await?;

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await?;

    Ok(pool)
}

pub struct Studio {
    pub pool: SqlitePool,
    pub signups: Arc<SqliteSignupRepository>,
    pub courses: Arc<SqliteCourseRepository>,
    pub organization: Organization,
    pub course: Course,
}

impl Studio {
    /// A studio with one upcoming course of `max_participants` seats.
    pub async fn new(max_participants: i64) -> anyhow::Result<Self> {
        let pool = test_pool().await?;
        let signups = Arc::new(SqliteSignupRepository::new(pool.clone()));
        let courses = Arc::new(SqliteCourseRepository::new(pool.clone()));

        let organization = courses.create_organization("Studio Prana").await?;
        let course = courses
            .create_course(CreateCourseRequest {
                organization_id: organization.id,
                name: "Morning Flow".to_string(),
                max_participants,
                location: Some("Sal 1".to_string()),
                time_schedule: Some("Mondays 18:00".to_string()),
                start_date: Some(Local::now().date_naive() + Duration::days(3)),
                price_minor: 25000,
            })
            .await?;

        Ok(Self {
            pool,
            signups,
            courses,
            organization,
            course,
        })
    }

    pub fn new_signup(&self, name: &str, payment_intent: Option<&str>) -> NewSignup {
        NewSignup {
            organization_id: self.organization.id,
            course_id: self.course.id,
            course_session_id: None,
            participant: Participant {
                name: name.to_string(),
                email: format!("{}@example.com", name.to_lowercase().replace(' ', ".")),
                phone: None,
            },
            payment_status: PaymentStatus::Paid,
            stripe_checkout_session_id: None,
            stripe_payment_intent_id: payment_intent.map(str::to_string),
            amount_paid_minor: Some(25000),
            class_date: None,
            class_time: None,
        }
    }

    pub fn unpaid_signup(&self, name: &str) -> NewSignup {
        NewSignup {
            payment_status: PaymentStatus::Pending,
            amount_paid_minor: None,
            ..self.new_signup(name, None)
        }
    }

    /// Book `count` participants through the placement rule. Those within
    /// capacity paid by card; the overflow was added unpaid by the teacher.
    pub async fn book(&self, count: usize) -> anyhow::Result<Vec<Signup>> {
        let mut booked = Vec::new();
        for i in 0..count {
            let name = format!("Participant {}", i);
            let new_signup = if (i as i64) < self.course.max_participants {
                self.new_signup(&name, Some(&format!("pi_existing_{}", i)))
            } else {
                self.unpaid_signup(&name)
            };
            let signup = self
                .signups
                .create_placed(new_signup, self.course.max_participants)
                .await?;
            booked.push(signup);
        }
        Ok(booked)
    }

    pub fn booking_event(&self, payment_intent: &str, name: &str) -> String {
        serde_json::json!({
            "id": format!("evt_{}", payment_intent),
            "type": "checkout.session.completed",
            "data": { "object": {
                "id": format!("cs_{}", payment_intent),
                "payment_intent": payment_intent,
                "amount_total": 25000,
                "customer_details": { "email": "kari@x.no", "phone": null },
                "metadata": {
                    "course_id": self.course.id.to_string(),
                    "organization_id": self.organization.id.to_string(),
                    "customer_name": name,
                    "is_drop_in": "false",
                },
            }}
        })
        .to_string()
    }
}

pub fn claim_event(signup: &Signup, token: &str, payment_intent: &str) -> String {
    serde_json::json!({
        "type": "checkout.session.completed",
        "data": { "object": {
            "id": format!("cs_{}", payment_intent),
            "payment_intent": payment_intent,
            "amount_total": 25000,
            "metadata": {
                "is_waitlist_claim": "true",
                "claim_token": token,
                "signup_id": signup.id.to_string(),
            },
        }}
    })
    .to_string()
}

pub fn refund_event(payment_intent: &str) -> String {
    serde_json::json!({
        "type": "charge.refunded",
        "data": { "object": { "id": "ch_1", "payment_intent": payment_intent } }
    })
    .to_string()
}

pub fn sign(payload: &str, now: DateTime<Utc>) -> String {
    let signature = compute_signature(WEBHOOK_SECRET, now.timestamp(), payload)
        .expect("valid secret");
    format!("t={},v1={}", now.timestamp(), signature)
}

pub fn today() -> NaiveDate {
    Local::now().date_naive()
}
