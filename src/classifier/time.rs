//! Date and time helpers shared by the classifier and the notifications.
//!
//! Class times are stored as studio-local wall-clock values; "today" is
//! derived from the server's local timezone, which deployments set to the
//! studio's zone.

use chrono::{
    DateTime, Datelike, Duration, Local, NaiveDate, NaiveDateTime, NaiveTime, Utc, Weekday,
};

/// The instant a classification runs at, plus the studio-local calendar day.
#[derive(Debug, Clone, Copy)]
pub struct ClassifyAt {
    pub now: DateTime<Utc>,
    pub today: NaiveDate,
}

impl ClassifyAt {
    pub fn new(now: DateTime<Utc>, today: NaiveDate) -> Self {
        Self { now, today }
    }

    pub fn local(now: DateTime<Utc>) -> Self {
        Self {
            now,
            today: now.with_timezone(&Local).date_naive(),
        }
    }
}

/// Last day of the current week, Sunday inclusive. On a Sunday this is today.
pub fn end_of_week(today: NaiveDate) -> NaiveDate {
    let days_until_sunday = 6 - today.weekday().num_days_from_monday() as i64;
    today + Duration::days(days_until_sunday)
}

/// Time of day in a free-form schedule string. `HH:MM` wins over `H.MM`,
/// and dotted runs like `01.09.2026` are dates, not times.
pub fn parse_time_of_day(schedule: &str) -> Option<NaiveTime> {
    scan_time(schedule, b':').or_else(|| scan_time(schedule, b'.'))
}

fn scan_time(schedule: &str, separator: u8) -> Option<NaiveTime> {
    let bytes = schedule.as_bytes();
    for (idx, &b) in bytes.iter().enumerate() {
        if b != separator {
            continue;
        }
        let hour_len = bytes[..idx]
            .iter()
            .rev()
            .take(2)
            .take_while(|c| c.is_ascii_digit())
            .count();
        if hour_len == 0 || idx + 3 > bytes.len() {
            continue;
        }
        let minutes = &bytes[idx + 1..idx + 3];
        if !minutes.iter().all(u8::is_ascii_digit) {
            continue;
        }
        if separator == b'.' {
            let before = (idx - hour_len).checked_sub(1).map(|i| bytes[i]);
            let after = bytes.get(idx + 3).copied();
            if before == Some(b'.') || after == Some(b'.') {
                continue;
            }
        }
        let hour: u32 = schedule[idx - hour_len..idx].parse().ok()?;
        let minute: u32 = schedule[idx + 1..idx + 3].parse().ok()?;
        if let Some(time) = NaiveTime::from_hms_opt(hour, minute, 0) {
            return Some(time);
        }
    }
    None
}

/// Resolve the wall-clock start of the class a signup attends.
///
/// Explicit drop-in date/time win over the course's own schedule. A missing
/// time falls back to the schedule text, then to midnight.
pub fn resolve_session_at(
    class_date: Option<NaiveDate>,
    class_time: Option<NaiveTime>,
    course_start_date: Option<NaiveDate>,
    time_schedule: Option<&str>,
) -> Option<NaiveDateTime> {
    let date = class_date.or(course_start_date)?;
    let time = class_time
        .or_else(|| time_schedule.and_then(parse_time_of_day))
        .unwrap_or(NaiveTime::MIN);
    Some(date.and_time(time))
}

const WEEKDAYS_NB: [&str; 7] = [
    "mandag", "tirsdag", "onsdag", "torsdag", "fredag", "lørdag", "søndag",
];

const MONTHS_NB: [&str; 12] = [
    "januar", "februar", "mars", "april", "mai", "juni",
    "juli", "august", "september", "oktober", "november", "desember",
];

/// Long Norwegian date, e.g. "mandag 3. mars 2025".
pub fn format_date_nb(date: NaiveDate) -> String {
    let weekday = WEEKDAYS_NB[weekday_index(date.weekday())];
    let month = MONTHS_NB[date.month0() as usize];
    format!("{} {}. {} {}", weekday, date.day(), month, date.year())
}

pub fn format_time(time: NaiveTime) -> String {
    time.format("%H:%M").to_string()
}

fn weekday_index(weekday: Weekday) -> usize {
    weekday.num_days_from_monday() as usize
}
