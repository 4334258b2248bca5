use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use sqlx::{FromRow, SqlitePool};
use uuid::Uuid;

use crate::{
    domain::{Course, CourseSession, CreateCourseRequest, Organization},
    error::{AppError, Result},
    repository::CourseRepository,
};

#[derive(FromRow)]
struct CourseRow {
    id: String,
    organization_id: String,
    organization_name: String,
    name: String,
    max_participants: i64,
    location: Option<String>,
    time_schedule: Option<String>,
    start_date: Option<NaiveDate>,
    price_minor: i64,
    created_at: NaiveDateTime,
    updated_at: NaiveDateTime,
}

#[derive(FromRow)]
struct CourseSessionRow {
    id: String,
    course_id: String,
    session_date: NaiveDate,
    start_time: Option<NaiveTime>,
}

pub struct SqliteCourseRepository {
    pool: SqlitePool,
}

impl SqliteCourseRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_course(row: CourseRow) -> Result<Course> {
        Ok(Course {
            id: Uuid::parse_str(&row.id).map_err(|e| AppError::Database(e.to_string()))?,
            organization_id: Uuid::parse_str(&row.organization_id)
                .map_err(|e| AppError::Database(e.to_string()))?,
            organization_name: row.organization_name,
            name: row.name,
            max_participants: row.max_participants,
            location: row.location,
            time_schedule: row.time_schedule,
            start_date: row.start_date,
            price_minor: row.price_minor,
            created_at: DateTime::from_naive_utc_and_offset(row.created_at, Utc),
            updated_at: DateTime::from_naive_utc_and_offset(row.updated_at, Utc),
        })
    }

    fn row_to_session(row: CourseSessionRow) -> Result<CourseSession> {
        Ok(CourseSession {
            id: Uuid::parse_str(&row.id).map_err(|e| AppError::Database(e.to_string()))?,
            course_id: Uuid::parse_str(&row.course_id)
                .map_err(|e| AppError::Database(e.to_string()))?,
            session_date: row.session_date,
            start_time: row.start_time,
        })
    }
}

#[async_trait]
impl CourseRepository for SqliteCourseRepository {
    async fn create_organization(&self, name: &str) -> Result<Organization> {
        let id = Uuid::new_v4();
        let now = Utc::now();

        sqlx::query("INSERT INTO organizations (id, name, created_at) VALUES (?, ?, ?)")
            .bind(id.to_string())
            .bind(name)
            .bind(now.naive_utc())
            .execute(&self.pool)
            .await?;

        Ok(Organization {
            id,
            name: name.to_string(),
            created_at: now,
        })
    }

    async fn create_course(&self, course: CreateCourseRequest) -> Result<Course> {
        let id = Uuid::new_v4();
        let now = Utc::now().naive_utc();

        sqlx::query(
            r#"
            INSERT INTO courses (
                id, organization_id, name, max_participants, location,
                time_schedule, start_date, price_minor, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#
        )
        .bind(id.to_string())
        .bind(course.organization_id.to_string())
        .bind(&course.name)
        .bind(course.max_participants)
        .bind(&course.location)
        .bind(&course.time_schedule)
        .bind(course.start_date)
        .bind(course.price_minor)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;

        self.find_by_id(id).await?.ok_or_else(|| {
            AppError::Database("Failed to retrieve created course".to_string())
        })
    }

    async fn create_session(
        &self,
        course_id: Uuid,
        session_date: NaiveDate,
        start_time: Option<NaiveTime>,
    ) -> Result<CourseSession> {
        let id = Uuid::new_v4();

        sqlx::query(
            r#"
            INSERT INTO course_sessions (id, course_id, session_date, start_time, created_at)
            VALUES (?, ?, ?, ?, ?)
            "#
        )
        .bind(id.to_string())
        .bind(course_id.to_string())
        .bind(session_date)
        .bind(start_time)
        .bind(Utc::now().naive_utc())
        .execute(&self.pool)
        .await?;

        Ok(CourseSession {
            id,
            course_id,
            session_date,
            start_time,
        })
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Course>> {
        let row = sqlx::query_as::<_, CourseRow>(
            r#"
            SELECT c.id, c.organization_id, o.name AS organization_name, c.name,
                   c.max_participants, c.location, c.time_schedule, c.start_date,
                   c.price_minor, c.created_at, c.updated_at
            FROM courses c
            INNER JOIN organizations o ON o.id = c.organization_id
            WHERE c.id = ?
            "#
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_course).transpose()
    }

    async fn find_session(&self, id: Uuid) -> Result<Option<CourseSession>> {
        let row = sqlx::query_as::<_, CourseSessionRow>(
            r#"
            SELECT id, course_id, session_date, start_time
            FROM course_sessions
            WHERE id = ?
            "#
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_session).transpose()
    }
}
