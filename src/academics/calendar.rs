use std::collections::BTreeSet;

use chrono::{DateTime, Datelike, Duration, NaiveDate};
use sqlx::{Pool, Sqlite};
use tracing::{info, instrument};

use crate::db;
use crate::error::AppError;
use crate::models::{NewSchoolDay, SchoolDay, TeachingBlock};

/// Weekday labels indexed by ISO ordinal - 1.
pub const WEEKDAY_NAMES: [&str; 7] = [
    "Lunes",
    "Martes",
    "Miércoles",
    "Jueves",
    "Viernes",
    "Sábado",
    "Domingo",
];

/// ISO weekday ordinal: Monday = 1 .. Sunday = 7.
pub fn weekday_ordinal(date: NaiveDate) -> u32 {
    date.weekday().number_from_monday()
}

pub fn weekday_name(date: NaiveDate) -> &'static str {
    WEEKDAY_NAMES[date.weekday().num_days_from_monday() as usize]
}

fn first_monday_of_year(date: NaiveDate) -> NaiveDate {
    let jan1 = date - Duration::days(i64::from(date.ordinal0()));
    let offset = (7 - jan1.weekday().num_days_from_monday()) % 7;
    jan1 + Duration::days(i64::from(offset))
}

fn monday_of_week(date: NaiveDate) -> NaiveDate {
    date - Duration::days(i64::from(date.weekday().num_days_from_monday()))
}

/// Week of the year counted from the first Monday on or after January 1.
/// Days before that Monday are week 0.
pub fn absolute_week(date: NaiveDate) -> i64 {
    let first_monday = first_monday_of_year(date);
    if date < first_monday {
        0
    } else {
        (date - first_monday).num_days() / 7 + 1
    }
}

/// Teaching week of `date` where the week holding `anchor` is week 1.
pub fn relative_week(date: NaiveDate, anchor: NaiveDate) -> i64 {
    if date.year() == anchor.year() {
        absolute_week(date) - absolute_week(anchor) + 1
    } else {
        // Absolute weeks restart every January; count Monday spans instead.
        (monday_of_week(date) - monday_of_week(anchor)).num_days() / 7 + 1
    }
}

fn parse_calendar_date(raw: &str) -> Result<NaiveDate, AppError> {
    let trimmed = raw.trim();
    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .or_else(|_| DateTime::parse_from_rfc3339(trimmed).map(|dt| dt.date_naive()))
        .map_err(|_| {
            AppError::Validation(format!(
                "Invalid calendar date '{}': expected YYYY-MM-DD",
                raw
            ))
        })
}

/// Derives weekday labels and teaching week numbers for a set of raw dates.
/// Output is sorted by date; repeated dates appear once.
pub fn build_school_days(year_id: i64, raw_dates: &[String]) -> Result<Vec<NewSchoolDay>, AppError> {
    if year_id <= 0 {
        return Err(AppError::Validation(
            "A school year is required to build a calendar".to_string(),
        ));
    }

    if raw_dates.is_empty() {
        return Err(AppError::Validation(
            "At least one teaching day is required".to_string(),
        ));
    }

    let dates = raw_dates
        .iter()
        .map(|raw| parse_calendar_date(raw))
        .collect::<Result<BTreeSet<_>, _>>()?;

    let Some(&anchor) = dates.first() else {
        return Err(AppError::Validation(
            "At least one teaching day is required".to_string(),
        ));
    };

    Ok(dates
        .into_iter()
        .map(|calendar_date| NewSchoolDay {
            year_id,
            calendar_date,
            weekday_name: weekday_name(calendar_date),
            weekday_ordinal: weekday_ordinal(calendar_date),
            week_number: relative_week(calendar_date, anchor),
        })
        .collect())
}

/// Registers the teaching days of a year. A year is populated once; any
/// existing school day for it rejects the whole request.
#[instrument(skip(pool, raw_dates), fields(dates = raw_dates.len()))]
pub async fn register_calendar(
    pool: &Pool<Sqlite>,
    year_id: i64,
    raw_dates: &[String],
) -> Result<Vec<SchoolDay>, AppError> {
    let days = build_school_days(year_id, raw_dates)?;

    let mut tx = db::begin_write(pool).await?;

    if !db::year_exists(&mut tx, year_id).await? {
        return Err(AppError::NotFound(format!("Year {} does not exist", year_id)));
    }

    let existing = db::count_school_days(&mut tx, year_id).await?;
    if existing > 0 {
        return Err(AppError::Conflict(format!(
            "Year {} already has {} school days registered",
            year_id, existing
        )));
    }

    db::insert_school_days(&mut tx, &days).await?;
    let stored = db::get_school_days(&mut tx, year_id).await?;
    tx.commit().await?;

    info!(count = stored.len(), "Registered school calendar");
    Ok(stored)
}

#[instrument(skip(pool))]
pub async fn school_calendar(pool: &Pool<Sqlite>, year_id: i64) -> Result<Vec<SchoolDay>, AppError> {
    let mut conn = pool.acquire().await?;
    if !db::year_exists(&mut conn, year_id).await? {
        return Err(AppError::NotFound(format!("Year {} does not exist", year_id)));
    }
    db::get_school_days(&mut conn, year_id).await
}

/// Adds a teaching block to a year. Overlaps with existing blocks are not
/// checked; the mapper assigns a day to the earliest block containing it.
#[instrument(skip(pool))]
pub async fn create_teaching_block(
    pool: &Pool<Sqlite>,
    year_id: i64,
    label: &str,
    start_date: NaiveDate,
    end_date: NaiveDate,
) -> Result<TeachingBlock, AppError> {
    if label.trim().is_empty() {
        return Err(AppError::Validation(
            "A teaching block needs a label".to_string(),
        ));
    }
    if start_date > end_date {
        return Err(AppError::Validation(format!(
            "Teaching block '{}' starts on {} after it ends on {}",
            label, start_date, end_date
        )));
    }

    let mut conn = pool.acquire().await?;
    if !db::year_exists(&mut conn, year_id).await? {
        return Err(AppError::NotFound(format!("Year {} does not exist", year_id)));
    }

    db::create_teaching_block(&mut conn, year_id, label.trim(), start_date, end_date).await
}

#[instrument(skip(pool))]
pub async fn teaching_blocks(
    pool: &Pool<Sqlite>,
    year_id: i64,
) -> Result<Vec<TeachingBlock>, AppError> {
    let mut conn = pool.acquire().await?;
    db::get_active_teaching_blocks(&mut conn, year_id).await
}
