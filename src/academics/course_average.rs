use sqlx::{Pool, Sqlite};
use tracing::{info, instrument};

use super::math::{mean, round2};
use crate::db;
use crate::error::AppError;
use crate::models::{BlockAverage, CourseAverage, TeachingBlock, UpsertOutcome, Upserted};

/// Blocks a course average is spread over.
pub const BLOCK_SLOTS: usize = 4;

pub type BlockSlots = [Option<f64>; BLOCK_SLOTS];

/// Places each block average in the slot of its block's position within the
/// year (`blocks` in calendar order). Averages of blocks not listed are
/// ignored.
pub fn assign_slots(
    blocks: &[TeachingBlock],
    averages: &[BlockAverage],
) -> Result<BlockSlots, AppError> {
    let mut slots: BlockSlots = [None; BLOCK_SLOTS];

    for average in averages {
        let Some(position) = blocks
            .iter()
            .position(|block| block.id == average.teaching_block_id)
        else {
            continue;
        };

        let slot = slots.get_mut(position).ok_or_else(|| {
            AppError::Validation(format!(
                "Teaching block {} is block {} of the year; only {} blocks are graded",
                average.teaching_block_id,
                position + 1,
                BLOCK_SLOTS
            ))
        })?;
        *slot = Some(average.block_average);
    }

    Ok(slots)
}

/// Mean of the filled slots.
pub fn course_average(slots: &BlockSlots) -> Result<f64, AppError> {
    mean(slots.iter().flatten().copied())
        .map(round2)
        .ok_or_else(|| {
            AppError::Computation("No block averages available for the course".to_string())
        })
}

#[instrument(skip(pool))]
pub async fn calculate_course_average(
    pool: &Pool<Sqlite>,
    student_id: i64,
    assignment_id: i64,
    year_id: i64,
) -> Result<Upserted<CourseAverage>, AppError> {
    let mut tx = db::begin_write(pool).await?;

    let assignment = db::get_assignment(&mut tx, assignment_id).await?;
    if assignment.year_id != year_id {
        return Err(AppError::Validation(format!(
            "Assignment {} belongs to year {}, not {}",
            assignment.id, assignment.year_id, year_id
        )));
    }

    let averages =
        db::get_block_averages_for_year(&mut tx, student_id, assignment_id, year_id).await?;
    if averages.is_empty() {
        return Err(AppError::NotFound(format!(
            "No block averages for student {} in assignment {} during year {}",
            student_id, assignment_id, year_id
        )));
    }

    let blocks = db::get_active_teaching_blocks(&mut tx, year_id).await?;
    let slots = assign_slots(&blocks, &averages)?;
    let [block1_average, block2_average, block3_average, block4_average] = slots;

    let mut average = CourseAverage {
        id: 0,
        student_id,
        assignment_id,
        year_id,
        block1_average,
        block2_average,
        block3_average,
        block4_average,
        course_average: course_average(&slots)?,
    };

    let outcome =
        match db::find_course_average(&mut tx, student_id, assignment_id, year_id).await? {
            Some(existing) => {
                average.id = existing.id;
                db::update_course_average(&mut tx, &average).await?;
                UpsertOutcome::Updated
            }
            None => {
                average.id = db::insert_course_average(&mut tx, &average).await?;
                UpsertOutcome::Created
            }
        };

    tx.commit().await?;

    info!(
        course_average = average.course_average,
        outcome = ?outcome,
        "Course average stored"
    );
    Ok(Upserted { outcome, average })
}

#[instrument(skip(pool))]
pub async fn student_course_averages(
    pool: &Pool<Sqlite>,
    student_id: i64,
    year_id: Option<i64>,
) -> Result<Vec<CourseAverage>, AppError> {
    let mut conn = pool.acquire().await?;
    db::get_student_course_averages(&mut conn, student_id, year_id).await
}
