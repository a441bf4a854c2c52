use std::collections::BTreeSet;

use sqlx::{Pool, Sqlite};
use tracing::{info, instrument};

use super::math::{mean, round2};
use crate::db;
use crate::error::AppError;
use crate::models::{
    AnnualAverage, CourseAverageWithCourse, StudentAnnualAverage, UpsertOutcome, Upserted,
};

pub fn distinct_courses(rows: &[CourseAverageWithCourse]) -> usize {
    rows.iter()
        .map(|row| row.course_id)
        .collect::<BTreeSet<_>>()
        .len()
}

/// Fails unless the student has an average for exactly `required` courses.
pub fn check_completeness(
    student_id: i64,
    rows: &[CourseAverageWithCourse],
    required: usize,
) -> Result<(), AppError> {
    let found = distinct_courses(rows);
    if found != required {
        return Err(AppError::Validation(format!(
            "Student {} has averages for {} distinct courses; {} are required",
            student_id, found, required
        )));
    }
    Ok(())
}

/// Mean of every usable course average.
pub fn annual_average(rows: &[CourseAverageWithCourse]) -> Result<f64, AppError> {
    mean(
        rows.iter()
            .filter_map(|row| row.course_average)
            .filter(|value| value.is_finite()),
    )
    .map(round2)
    .ok_or_else(|| AppError::Computation("No numeric course averages to combine".to_string()))
}

#[instrument(skip(pool))]
pub async fn calculate_annual_average(
    pool: &Pool<Sqlite>,
    required_courses: usize,
    student_id: i64,
    year_id: i64,
) -> Result<Upserted<AnnualAverage>, AppError> {
    let mut tx = db::begin_write(pool).await?;

    let rows = db::get_course_averages_with_course(&mut tx, student_id, year_id).await?;
    if rows.is_empty() {
        return Err(AppError::NotFound(format!(
            "No course averages for student {} in year {}",
            student_id, year_id
        )));
    }

    check_completeness(student_id, &rows, required_courses)?;
    let value = annual_average(&rows)?;

    let (id, outcome) = match db::find_annual_average(&mut tx, student_id, year_id).await? {
        Some(existing) => {
            db::update_annual_average(&mut tx, existing.id, value).await?;
            (existing.id, UpsertOutcome::Updated)
        }
        None => (
            db::insert_annual_average(&mut tx, student_id, year_id, value).await?,
            UpsertOutcome::Created,
        ),
    };

    tx.commit().await?;

    info!(average = value, outcome = ?outcome, "Annual average stored");
    Ok(Upserted {
        outcome,
        average: AnnualAverage {
            id,
            student_id,
            year_id,
            average: value,
        },
    })
}

/// Stored annual averages of the students in a tutor's group, by surname.
#[instrument(skip(pool))]
pub async fn annual_averages_by_tutor(
    pool: &Pool<Sqlite>,
    tutor_id: i64,
) -> Result<Vec<StudentAnnualAverage>, AppError> {
    let mut conn = pool.acquire().await?;
    if !db::tutor_exists(&mut conn, tutor_id).await? {
        return Err(AppError::NotFound(format!("Tutor {} does not exist", tutor_id)));
    }
    db::get_annual_averages_by_tutor(&mut conn, tutor_id).await
}

#[instrument(skip(pool))]
pub async fn annual_averages_by_student(
    pool: &Pool<Sqlite>,
    student_id: i64,
) -> Result<Vec<StudentAnnualAverage>, AppError> {
    let mut conn = pool.acquire().await?;
    db::get_annual_averages_by_student(&mut conn, student_id).await
}

#[instrument(skip(pool, student_ids))]
pub async fn annual_averages_for_students(
    pool: &Pool<Sqlite>,
    year_id: i64,
    student_ids: &[i64],
) -> Result<Vec<StudentAnnualAverage>, AppError> {
    let mut conn = pool.acquire().await?;
    db::get_annual_averages_for_students(&mut conn, year_id, student_ids).await
}
