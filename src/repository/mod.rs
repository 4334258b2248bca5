use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use uuid::Uuid;
use crate::domain::*;
use crate::error::Result;

pub mod course_repository;
pub mod signup_repository;

pub use course_repository::SqliteCourseRepository;
pub use signup_repository::SqliteSignupRepository;

#[async_trait]
pub trait SignupRepository: Send + Sync {
    /// Insert a signup, confirming it while the course has free seats and
    /// waitlisting it otherwise. A reused payment intent id fails with
    /// `AppError::Conflict`.
    async fn create_placed(&self, signup: NewSignup, max_participants: i64) -> Result<Signup>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Signup>>;
    async fn find_by_payment_intent(&self, payment_intent_id: &str) -> Result<Option<Signup>>;
    async fn find_by_claim_token(&self, token: &str) -> Result<Option<Signup>>;
    async fn list_for_organization(&self, organization_id: Uuid) -> Result<Vec<ScheduledSignup>>;
    async fn count_confirmed(&self, course_id: Uuid) -> Result<i64>;
    async fn update(&self, signup: &Signup) -> Result<Signup>;
    /// Convert a pending offer into a paid confirmed seat. Returns `None`
    /// when the offer was no longer pending for this token.
    async fn claim_offer(
        &self,
        id: Uuid,
        token: &str,
        payment: &ClaimPayment,
    ) -> Result<Option<Signup>>;
    async fn expire_offers(&self, now: DateTime<Utc>) -> Result<u64>;
}

#[async_trait]
pub trait CourseRepository: Send + Sync {
    async fn create_organization(&self, name: &str) -> Result<Organization>;
    async fn create_course(&self, course: CreateCourseRequest) -> Result<Course>;
    async fn create_session(
        &self,
        course_id: Uuid,
        session_date: NaiveDate,
        start_time: Option<NaiveTime>,
    ) -> Result<CourseSession>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Course>>;
    async fn find_session(&self, id: Uuid) -> Result<Option<CourseSession>>;
}
