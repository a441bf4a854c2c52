use sqlx::{Pool, Sqlite, SqliteConnection};
use tracing::{info, instrument, warn};

use crate::db;
use crate::error::AppError;
use crate::models::{NewScheduleBlockDay, Schedule, ScheduleBlockDay, SchoolDay, TeachingBlock};

/// Pairs every day with the first block whose range contains it. Days outside
/// every block produce nothing.
pub fn map_days_to_blocks(
    schedule: &Schedule,
    days: &[SchoolDay],
    blocks: &[TeachingBlock],
) -> Vec<NewScheduleBlockDay> {
    days.iter()
        .filter_map(|day| {
            blocks
                .iter()
                .find(|block| block.contains(day.calendar_date))
                .map(|block| NewScheduleBlockDay {
                    year_id: schedule.year_id,
                    schedule_id: schedule.id,
                    teaching_block_id: block.id,
                    school_day_id: day.id,
                })
        })
        .collect()
}

/// Computes the rows one schedule needs without writing them.
#[instrument(skip(conn))]
async fn plan_schedule(
    conn: &mut SqliteConnection,
    schedule: &Schedule,
) -> Result<Vec<NewScheduleBlockDay>, AppError> {
    let weekday = schedule.weekday.ok_or_else(|| {
        AppError::Validation(format!("Schedule {} has no weekday assigned", schedule.id))
    })?;

    if db::count_active_school_days(conn, schedule.year_id).await? == 0 {
        return Err(AppError::NotFound(format!(
            "No active school days registered for year {}",
            schedule.year_id
        )));
    }

    let blocks = db::get_active_teaching_blocks(conn, schedule.year_id).await?;
    if blocks.is_empty() {
        return Err(AppError::NotFound(format!(
            "No teaching blocks registered for year {}",
            schedule.year_id
        )));
    }

    let existing = db::count_schedule_block_days(conn, schedule.id, schedule.year_id).await?;
    if existing > 0 {
        return Err(AppError::Conflict(format!(
            "Schedule {} already has {} block days for year {}",
            schedule.id, existing, schedule.year_id
        )));
    }

    let days = db::get_active_school_days_on_weekday(conn, schedule.year_id, weekday).await?;
    let rows = map_days_to_blocks(schedule, &days, &blocks);

    let unmatched = days.len() - rows.len();
    if unmatched > 0 {
        warn!(
            schedule_id = schedule.id,
            unmatched, "School days outside every teaching block were skipped"
        );
    }

    Ok(rows)
}

#[instrument(skip(pool))]
pub async fn map_schedule_block_days(
    pool: &Pool<Sqlite>,
    schedule_id: i64,
) -> Result<Vec<ScheduleBlockDay>, AppError> {
    let mut tx = db::begin_write(pool).await?;

    let schedule = db::get_schedule(&mut tx, schedule_id).await?;
    if !schedule.active {
        return Err(AppError::Validation(format!("Schedule {} is inactive", schedule.id)));
    }
    let rows = plan_schedule(&mut tx, &schedule).await?;
    let inserted = db::insert_schedule_block_days(&mut tx, &rows).await?;

    tx.commit().await?;

    info!(count = inserted.len(), "Mapped schedule onto teaching blocks");
    Ok(inserted)
}

/// Maps every schedule a teacher holds in a year. Either all schedules are
/// mapped or none is.
#[instrument(skip(pool))]
pub async fn map_teacher_block_days(
    pool: &Pool<Sqlite>,
    teacher_id: i64,
    year_id: i64,
) -> Result<Vec<ScheduleBlockDay>, AppError> {
    let mut tx = db::begin_write(pool).await?;

    let schedules = db::get_teacher_schedules(&mut tx, teacher_id, year_id).await?;
    if schedules.is_empty() {
        return Err(AppError::NotFound(format!(
            "Teacher {} has no schedules in year {}",
            teacher_id, year_id
        )));
    }

    let mut rows = Vec::new();
    for schedule in &schedules {
        rows.extend(plan_schedule(&mut tx, schedule).await?);
    }

    let inserted = db::insert_schedule_block_days(&mut tx, &rows).await?;
    tx.commit().await?;

    info!(
        schedules = schedules.len(),
        count = inserted.len(),
        "Mapped teacher schedules onto teaching blocks"
    );
    Ok(inserted)
}

#[instrument(skip(pool))]
pub async fn schedule_block_days(
    pool: &Pool<Sqlite>,
    schedule_id: i64,
) -> Result<Vec<ScheduleBlockDay>, AppError> {
    let mut conn = pool.acquire().await?;
    db::get_schedule(&mut conn, schedule_id).await?;
    db::get_schedule_block_days(&mut conn, schedule_id).await
}
