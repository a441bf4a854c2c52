use sqlx::{Pool, Sqlite};
use tracing::{info, instrument};

use crate::db;
use crate::error::AppError;
use crate::models::{Evaluation, EvaluationKind};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QualificationEntry {
    pub student_id: i64,
    pub rating: Option<f64>,
}

/// Stores the ratings taken on one block day. The batch is written in one
/// transaction; a student already rated that day is overwritten.
#[instrument(skip(pool, entries), fields(count = entries.len()))]
pub async fn record_qualifications(
    pool: &Pool<Sqlite>,
    block_day_id: i64,
    entries: &[QualificationEntry],
) -> Result<usize, AppError> {
    if let Some(bad) = entries
        .iter()
        .find(|entry| entry.rating.is_some_and(|rating| !rating.is_finite() || rating < 0.0))
    {
        return Err(AppError::Validation(format!(
            "Rating for student {} must be a non-negative number",
            bad.student_id
        )));
    }

    let mut tx = db::begin_write(pool).await?;

    let block_day = db::get_schedule_block_day(&mut tx, block_day_id).await?;
    if !block_day.active {
        return Err(AppError::Validation(format!(
            "Schedule block day {} is inactive",
            block_day_id
        )));
    }

    for entry in entries {
        db::upsert_qualification(&mut tx, block_day.id, entry.student_id, entry.rating).await?;
    }

    tx.commit().await?;

    info!("Qualifications recorded");
    Ok(entries.len())
}

#[instrument(skip(pool))]
pub async fn record_evaluation(
    pool: &Pool<Sqlite>,
    student_id: i64,
    assignment_id: i64,
    teaching_block_id: i64,
    kind: EvaluationKind,
    score: f64,
) -> Result<Evaluation, AppError> {
    if !score.is_finite() || score < 0.0 {
        return Err(AppError::Validation(
            "Evaluation score must be a non-negative number".to_string(),
        ));
    }

    let mut tx = db::begin_write(pool).await?;

    let assignment = db::get_assignment(&mut tx, assignment_id).await?;
    let block = db::get_teaching_block(&mut tx, teaching_block_id).await?;
    if block.year_id != assignment.year_id {
        return Err(AppError::Validation(format!(
            "Teaching block {} is not part of year {}",
            block.id, assignment.year_id
        )));
    }

    let evaluation =
        db::create_evaluation(&mut tx, student_id, assignment.id, block.id, kind, score).await?;
    tx.commit().await?;

    Ok(evaluation)
}
