use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use sqlx::{FromRow, SqlitePool};
use uuid::Uuid;

use crate::{
    classifier::time::resolve_session_at,
    domain::{
        ClaimPayment, NewSignup, OfferStatus, PaymentStatus, ScheduledSignup, Signup, SignupStatus,
    },
    error::{AppError, Result},
    repository::SignupRepository,
};

const SIGNUP_COLUMNS: &str = r#"
    s.id, s.organization_id, s.course_id, s.course_session_id,
    s.participant_name, s.participant_email, s.participant_phone,
    s.status, s.payment_status, s.waitlist_position,
    s.offer_status, s.offer_expires_at, s.offer_claim_token,
    s.stripe_checkout_session_id, s.stripe_payment_intent_id, s.amount_paid_minor,
    s.class_date, s.class_time, s.registered_at, s.created_at, s.updated_at
"#;

#[derive(FromRow)]
struct SignupRow {
    id: String,
    organization_id: String,
    course_id: String,
    course_session_id: Option<String>,
    participant_name: String,
    participant_email: String,
    participant_phone: Option<String>,
    status: String,
    payment_status: String,
    waitlist_position: Option<i64>,
    offer_status: Option<String>,
    offer_expires_at: Option<NaiveDateTime>,
    offer_claim_token: Option<String>,
    stripe_checkout_session_id: Option<String>,
    stripe_payment_intent_id: Option<String>,
    amount_paid_minor: Option<i64>,
    class_date: Option<NaiveDate>,
    class_time: Option<NaiveTime>,
    registered_at: NaiveDateTime,
    created_at: NaiveDateTime,
    updated_at: NaiveDateTime,
}

#[derive(FromRow)]
struct ScheduledSignupRow {
    #[sqlx(flatten)]
    signup: SignupRow,
    course_name: String,
    course_start_date: Option<NaiveDate>,
    course_time_schedule: Option<String>,
}

pub struct SqliteSignupRepository {
    pool: SqlitePool,
}

impl SqliteSignupRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn parse_uuid(s: &str) -> Result<Uuid> {
        Uuid::parse_str(s).map_err(|e| AppError::Database(e.to_string()))
    }

    fn row_to_signup(row: SignupRow) -> Result<Signup> {
        Ok(Signup {
            id: Self::parse_uuid(&row.id)?,
            organization_id: Self::parse_uuid(&row.organization_id)?,
            course_id: Self::parse_uuid(&row.course_id)?,
            course_session_id: row
                .course_session_id
                .as_deref()
                .map(Self::parse_uuid)
                .transpose()?,
            participant_name: row.participant_name,
            participant_email: row.participant_email,
            participant_phone: row.participant_phone,
            status: Self::parse_status(&row.status)?,
            payment_status: Self::parse_payment_status(&row.payment_status)?,
            waitlist_position: row.waitlist_position,
            offer_status: row
                .offer_status
                .as_deref()
                .map(Self::parse_offer_status)
                .transpose()?,
            offer_expires_at: row
                .offer_expires_at
                .map(|dt| DateTime::from_naive_utc_and_offset(dt, Utc)),
            offer_claim_token: row.offer_claim_token,
            stripe_checkout_session_id: row.stripe_checkout_session_id,
            stripe_payment_intent_id: row.stripe_payment_intent_id,
            amount_paid_minor: row.amount_paid_minor,
            class_date: row.class_date,
            class_time: row.class_time,
            registered_at: DateTime::from_naive_utc_and_offset(row.registered_at, Utc),
            created_at: DateTime::from_naive_utc_and_offset(row.created_at, Utc),
            updated_at: DateTime::from_naive_utc_and_offset(row.updated_at, Utc),
        })
    }

    fn row_to_scheduled(row: ScheduledSignupRow) -> Result<ScheduledSignup> {
        let signup = Self::row_to_signup(row.signup)?;
        // Undated courses sort by booking time rather than dropping out.
        let session_at = resolve_session_at(
            signup.class_date,
            signup.class_time,
            row.course_start_date,
            row.course_time_schedule.as_deref(),
        )
        .unwrap_or_else(|| signup.created_at.naive_utc());

        Ok(ScheduledSignup {
            signup,
            course_name: row.course_name,
            session_at,
        })
    }

    fn parse_status(s: &str) -> Result<SignupStatus> {
        match s {
            "confirmed" => Ok(SignupStatus::Confirmed),
            "waitlist" => Ok(SignupStatus::Waitlist),
            "cancelled" => Ok(SignupStatus::Cancelled),
            "course_cancelled" => Ok(SignupStatus::CourseCancelled),
            _ => Err(AppError::Database(format!("Invalid signup status: {}", s))),
        }
    }

    fn status_to_str(status: SignupStatus) -> &'static str {
        match status {
            SignupStatus::Confirmed => "confirmed",
            SignupStatus::Waitlist => "waitlist",
            SignupStatus::Cancelled => "cancelled",
            SignupStatus::CourseCancelled => "course_cancelled",
        }
    }

    fn parse_payment_status(s: &str) -> Result<PaymentStatus> {
        match s {
            "pending" => Ok(PaymentStatus::Pending),
            "paid" => Ok(PaymentStatus::Paid),
            "failed" => Ok(PaymentStatus::Failed),
            "refunded" => Ok(PaymentStatus::Refunded),
            _ => Err(AppError::Database(format!("Invalid payment status: {}", s))),
        }
    }

    fn payment_status_to_str(status: PaymentStatus) -> &'static str {
        match status {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Paid => "paid",
            PaymentStatus::Failed => "failed",
            PaymentStatus::Refunded => "refunded",
        }
    }

    fn parse_offer_status(s: &str) -> Result<OfferStatus> {
        match s {
            "pending" => Ok(OfferStatus::Pending),
            "claimed" => Ok(OfferStatus::Claimed),
            "expired" => Ok(OfferStatus::Expired),
            _ => Err(AppError::Database(format!("Invalid offer status: {}", s))),
        }
    }

    fn offer_status_to_str(status: OfferStatus) -> &'static str {
        match status {
            OfferStatus::Pending => "pending",
            OfferStatus::Claimed => "claimed",
            OfferStatus::Expired => "expired",
        }
    }

    async fn find_one(&self, filter: &str, value: String) -> Result<Option<Signup>> {
        let sql = format!("SELECT {} FROM signups s WHERE {} = ?", SIGNUP_COLUMNS, filter);
        let row = sqlx::query_as::<_, SignupRow>(&sql)
            .bind(value)
            .fetch_optional(&self.pool)
            .await?;

        row.map(Self::row_to_signup).transpose()
    }
}

#[async_trait]
impl SignupRepository for SqliteSignupRepository {
    async fn create_placed(&self, signup: NewSignup, max_participants: i64) -> Result<Signup> {
        let id = Uuid::new_v4();
        let now = Utc::now().naive_utc();
        let course_id_str = signup.course_id.to_string();

        // Counting and inserting in one statement keeps two concurrent
        // completions from both taking the last seat.
        sqlx::query(
            r#"
            INSERT INTO signups (
                id, organization_id, course_id, course_session_id,
                participant_name, participant_email, participant_phone,
                status, payment_status, waitlist_position,
                stripe_checkout_session_id, stripe_payment_intent_id, amount_paid_minor,
                class_date, class_time, registered_at, created_at, updated_at
            )
            SELECT ?, ?, ?, ?, ?, ?, ?,
                CASE WHEN confirmed.n < ? THEN 'confirmed' ELSE 'waitlist' END,
                ?,
                CASE WHEN confirmed.n < ? THEN NULL ELSE confirmed.n - ? + 1 END,
                ?, ?, ?, ?, ?, ?, ?, ?
            FROM (
                SELECT COUNT(*) AS n FROM signups
                WHERE course_id = ? AND status = 'confirmed'
            ) AS confirmed
            "#
        )
        .bind(id.to_string())
        .bind(signup.organization_id.to_string())
        .bind(&course_id_str)
        .bind(signup.course_session_id.map(|id| id.to_string()))
        .bind(&signup.participant.name)
        .bind(&signup.participant.email)
        .bind(&signup.participant.phone)
        .bind(max_participants)
        .bind(Self::payment_status_to_str(signup.payment_status))
        .bind(max_participants)
        .bind(max_participants)
        .bind(&signup.stripe_checkout_session_id)
        .bind(&signup.stripe_payment_intent_id)
        .bind(signup.amount_paid_minor)
        .bind(signup.class_date)
        .bind(signup.class_time)
        .bind(now)
        .bind(now)
        .bind(now)
        .bind(&course_id_str)
        .execute(&self.pool)
        .await?;

        self.find_by_id(id).await?.ok_or_else(|| {
            AppError::Database("Failed to retrieve created signup".to_string())
        })
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Signup>> {
        self.find_one("s.id", id.to_string()).await
    }

    async fn find_by_payment_intent(&self, payment_intent_id: &str) -> Result<Option<Signup>> {
        self.find_one("s.stripe_payment_intent_id", payment_intent_id.to_string()).await
    }

    async fn find_by_claim_token(&self, token: &str) -> Result<Option<Signup>> {
        self.find_one("s.offer_claim_token", token.to_string()).await
    }

    async fn list_for_organization(&self, organization_id: Uuid) -> Result<Vec<ScheduledSignup>> {
        let sql = format!(
            r#"
            SELECT {},
                   c.name AS course_name,
                   c.start_date AS course_start_date,
                   c.time_schedule AS course_time_schedule
            FROM signups s
            INNER JOIN courses c ON c.id = s.course_id
            WHERE s.organization_id = ?
            ORDER BY s.created_at ASC
            "#,
            SIGNUP_COLUMNS
        );
        let rows = sqlx::query_as::<_, ScheduledSignupRow>(&sql)
            .bind(organization_id.to_string())
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter()
            .map(Self::row_to_scheduled)
            .collect()
    }

    async fn count_confirmed(&self, course_id: Uuid) -> Result<i64> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM signups WHERE course_id = ? AND status = 'confirmed'"
        )
        .bind(course_id.to_string())
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }

    async fn update(&self, signup: &Signup) -> Result<Signup> {
        let now = Utc::now().naive_utc();

        sqlx::query(
            r#"
            UPDATE signups
            SET participant_name = ?,
                participant_email = ?,
                participant_phone = ?,
                status = ?,
                payment_status = ?,
                waitlist_position = ?,
                offer_status = ?,
                offer_expires_at = ?,
                offer_claim_token = ?,
                stripe_checkout_session_id = ?,
                stripe_payment_intent_id = ?,
                amount_paid_minor = ?,
                updated_at = ?
            WHERE id = ?
            "#
        )
        .bind(&signup.participant_name)
        .bind(&signup.participant_email)
        .bind(&signup.participant_phone)
        .bind(Self::status_to_str(signup.status))
        .bind(Self::payment_status_to_str(signup.payment_status))
        .bind(signup.waitlist_position)
        .bind(signup.offer_status.map(Self::offer_status_to_str))
        .bind(signup.offer_expires_at.map(|dt| dt.naive_utc()))
        .bind(&signup.offer_claim_token)
        .bind(&signup.stripe_checkout_session_id)
        .bind(&signup.stripe_payment_intent_id)
        .bind(signup.amount_paid_minor)
        .bind(now)
        .bind(signup.id.to_string())
        .execute(&self.pool)
        .await?;

        self.find_by_id(signup.id).await?.ok_or_else(|| {
            AppError::NotFound(format!("Signup {} not found", signup.id))
        })
    }

    async fn claim_offer(
        &self,
        id: Uuid,
        token: &str,
        payment: &ClaimPayment,
    ) -> Result<Option<Signup>> {
        let now = Utc::now().naive_utc();

        // Only the transition out of 'pending' on a waitlisted signup wins;
        // a replay or a racing delivery sees zero rows affected. Payment
        // details already on the signup are kept so their refunds still match.
        let result = sqlx::query(
            r#"
            UPDATE signups
            SET status = 'confirmed',
                offer_status = 'claimed',
                payment_status = 'paid',
                waitlist_position = NULL,
                stripe_checkout_session_id = COALESCE(stripe_checkout_session_id, ?),
                stripe_payment_intent_id = COALESCE(stripe_payment_intent_id, ?),
                amount_paid_minor = COALESCE(amount_paid_minor, ?),
                updated_at = ?
            WHERE id = ? AND offer_claim_token = ?
              AND offer_status = 'pending' AND status = 'waitlist'
            "#
        )
        .bind(&payment.checkout_session_id)
        .bind(&payment.payment_intent_id)
        .bind(payment.amount_paid_minor)
        .bind(now)
        .bind(id.to_string())
        .bind(token)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        self.find_by_id(id).await
    }

    async fn expire_offers(&self, now: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE signups
            SET offer_status = 'expired', updated_at = ?
            WHERE offer_status = 'pending' AND offer_expires_at <= ?
            "#
        )
        .bind(Utc::now().naive_utc())
        .bind(now.naive_utc())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}
