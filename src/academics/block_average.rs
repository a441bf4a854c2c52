use sqlx::{Pool, Sqlite};
use tracing::{info, instrument};

use super::math::{mean, round2};
use crate::config::MissingRatingPolicy;
use crate::db;
use crate::error::AppError;
use crate::models::{BlockAverage, EvaluationKind, UpsertOutcome, Upserted};

/// The three per-block components as unrounded means. `None` means nothing
/// was recorded.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BlockComponents {
    pub daily: Option<f64>,
    pub practice: Option<f64>,
    pub exam: Option<f64>,
}

impl BlockComponents {
    pub fn from_raw(
        ratings: &[Option<f64>],
        practice_scores: &[f64],
        exam_scores: &[f64],
        policy: MissingRatingPolicy,
    ) -> Self {
        Self {
            daily: daily_average(ratings, policy),
            practice: mean(practice_scores.iter().copied()),
            exam: mean(exam_scores.iter().copied()),
        }
    }

    /// Components as stored, each rounded to two decimals.
    pub fn rounded(&self) -> Self {
        Self {
            daily: self.daily.map(round2),
            practice: self.practice.map(round2),
            exam: self.exam.map(round2),
        }
    }

    /// Mean of the three components; an absent component counts as 0.
    pub fn block_average(&self) -> f64 {
        let total = self.daily.unwrap_or(0.0)
            + self.practice.unwrap_or(0.0)
            + self.exam.unwrap_or(0.0);
        round2(total / 3.0)
    }
}

pub fn daily_average(ratings: &[Option<f64>], policy: MissingRatingPolicy) -> Option<f64> {
    mean(ratings.iter().filter_map(|rating| policy.normalize(*rating)))
}

/// Recomputes and stores the block average of one student for one assignment.
#[instrument(skip(pool))]
pub async fn calculate_block_average(
    pool: &Pool<Sqlite>,
    policy: MissingRatingPolicy,
    student_id: i64,
    assignment_id: i64,
    teaching_block_id: i64,
) -> Result<Upserted<BlockAverage>, AppError> {
    let mut tx = db::begin_write(pool).await?;

    let assignment = db::get_assignment(&mut tx, assignment_id).await?;
    let block = db::get_teaching_block(&mut tx, teaching_block_id).await?;
    if block.year_id != assignment.year_id {
        return Err(AppError::Validation(format!(
            "Teaching block {} belongs to year {}, assignment {} to year {}",
            block.id, block.year_id, assignment.id, assignment.year_id
        )));
    }

    let ratings = db::get_block_ratings(&mut tx, student_id, assignment_id, block.id).await?;
    let practice = db::get_evaluation_scores(
        &mut tx,
        student_id,
        assignment_id,
        block.id,
        EvaluationKind::Practice,
    )
    .await?;
    let exams = db::get_evaluation_scores(
        &mut tx,
        student_id,
        assignment_id,
        block.id,
        EvaluationKind::Exam,
    )
    .await?;

    let components = BlockComponents::from_raw(&ratings, &practice, &exams, policy);
    let stored = components.rounded();
    let mut average = BlockAverage {
        id: 0,
        student_id,
        assignment_id,
        teaching_block_id: block.id,
        daily_average: stored.daily,
        practice_average: stored.practice,
        exam_average: stored.exam,
        block_average: components.block_average(),
    };

    let outcome =
        match db::find_block_average(&mut tx, student_id, assignment_id, block.id).await? {
            Some(existing) => {
                average.id = existing.id;
                db::update_block_average(&mut tx, &average).await?;
                UpsertOutcome::Updated
            }
            None => {
                average.id = db::insert_block_average(&mut tx, &average).await?;
                UpsertOutcome::Created
            }
        };

    tx.commit().await?;

    info!(
        block_average = average.block_average,
        ratings = ratings.len(),
        outcome = ?outcome,
        "Block average stored"
    );
    Ok(Upserted { outcome, average })
}

#[instrument(skip(pool))]
pub async fn student_block_averages(
    pool: &Pool<Sqlite>,
    student_id: i64,
    assignment_id: Option<i64>,
) -> Result<Vec<BlockAverage>, AppError> {
    let mut conn = pool.acquire().await?;
    db::get_student_block_averages(&mut conn, student_id, assignment_id).await
}
