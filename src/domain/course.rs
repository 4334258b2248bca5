use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Organization {
    pub id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Course {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub organization_name: String,
    pub name: String,
    pub max_participants: i64,
    pub location: Option<String>,
    /// Free-form schedule text such as "Mondays 18:00-19:30".
    pub time_schedule: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub price_minor: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A single dated occurrence of a course, bookable as a drop-in.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CourseSession {
    pub id: Uuid,
    pub course_id: Uuid,
    pub session_date: NaiveDate,
    pub start_time: Option<NaiveTime>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateCourseRequest {
    pub organization_id: Uuid,
    pub name: String,
    pub max_participants: i64,
    pub location: Option<String>,
    pub time_schedule: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub price_minor: i64,
}
