use chrono::NaiveDate;
use sqlx::{Pool, QueryBuilder, Sqlite, SqliteConnection, Transaction};
use tracing::{info, instrument};

use crate::error::AppError;
use crate::models::{
    AnnualAverage, Assignment, BlockAverage, CourseAverage, CourseAverageWithCourse, Evaluation,
    EvaluationKind, NewSchoolDay, NewScheduleBlockDay, Schedule, ScheduleBlockDay, SchoolDay,
    StudentAnnualAverage, TeachingBlock,
};

/// Opens a transaction that holds the database write lock before its first
/// read. Concurrent writers wait on the busy timeout.
pub async fn begin_write(pool: &Pool<Sqlite>) -> Result<Transaction<'static, Sqlite>, AppError> {
    Ok(pool.begin_with("BEGIN IMMEDIATE").await?)
}

// Registries owned by the administration surface.

#[instrument(skip(conn))]
pub async fn year_exists(conn: &mut SqliteConnection, year_id: i64) -> Result<bool, AppError> {
    let found = sqlx::query_scalar::<_, i64>("SELECT id FROM years WHERE id = ?")
        .bind(year_id)
        .fetch_optional(&mut *conn)
        .await?;

    Ok(found.is_some())
}

#[instrument(skip(conn))]
pub async fn get_assignment(
    conn: &mut SqliteConnection,
    assignment_id: i64,
) -> Result<Assignment, AppError> {
    info!("Fetching assignment");
    let row = sqlx::query_as::<_, Assignment>(
        "SELECT id, teacher_id, course_id, grade_id, section_id, year_id
         FROM teacher_groups
         WHERE id = ?",
    )
    .bind(assignment_id)
    .fetch_optional(&mut *conn)
    .await?;

    row.ok_or_else(|| AppError::NotFound(format!("Assignment {} does not exist", assignment_id)))
}

#[instrument(skip(conn))]
pub async fn get_schedule(
    conn: &mut SqliteConnection,
    schedule_id: i64,
) -> Result<Schedule, AppError> {
    info!("Fetching schedule");
    let row = sqlx::query_as::<_, Schedule>(
        "SELECT s.id AS id, s.teacher_group_id AS teacher_group_id, tg.year_id AS year_id,
                s.weekday AS weekday, s.active AS active
         FROM schedules s
         JOIN teacher_groups tg ON tg.id = s.teacher_group_id
         WHERE s.id = ?",
    )
    .bind(schedule_id)
    .fetch_optional(&mut *conn)
    .await?;

    row.ok_or_else(|| AppError::NotFound(format!("Schedule {} does not exist", schedule_id)))
}

#[instrument(skip(conn))]
pub async fn get_teacher_schedules(
    conn: &mut SqliteConnection,
    teacher_id: i64,
    year_id: i64,
) -> Result<Vec<Schedule>, AppError> {
    info!("Fetching teacher schedules");
    let rows = sqlx::query_as::<_, Schedule>(
        "SELECT s.id AS id, s.teacher_group_id AS teacher_group_id, tg.year_id AS year_id,
                s.weekday AS weekday, s.active AS active
         FROM schedules s
         JOIN teacher_groups tg ON tg.id = s.teacher_group_id
         WHERE tg.teacher_id = ? AND tg.year_id = ? AND s.active = 1 AND tg.active = 1
         ORDER BY s.id",
    )
    .bind(teacher_id)
    .bind(year_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(rows)
}

#[instrument(skip(conn))]
pub async fn tutor_exists(conn: &mut SqliteConnection, tutor_id: i64) -> Result<bool, AppError> {
    let found = sqlx::query_scalar::<_, i64>("SELECT id FROM tutors WHERE id = ?")
        .bind(tutor_id)
        .fetch_optional(&mut *conn)
        .await?;

    Ok(found.is_some())
}

// School calendar.

#[instrument(skip(conn))]
pub async fn count_school_days(conn: &mut SqliteConnection, year_id: i64) -> Result<i64, AppError> {
    let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM school_days WHERE year_id = ?")
        .bind(year_id)
        .fetch_one(&mut *conn)
        .await?;

    Ok(count)
}

#[instrument(skip(conn))]
pub async fn count_active_school_days(
    conn: &mut SqliteConnection,
    year_id: i64,
) -> Result<i64, AppError> {
    let count = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM school_days WHERE year_id = ? AND active = 1",
    )
    .bind(year_id)
    .fetch_one(&mut *conn)
    .await?;

    Ok(count)
}

#[instrument(skip(conn, days), fields(count = days.len()))]
pub async fn insert_school_days(
    conn: &mut SqliteConnection,
    days: &[NewSchoolDay],
) -> Result<(), AppError> {
    info!("Inserting school days");
    for day in days {
        sqlx::query(
            "INSERT INTO school_days
             (year_id, calendar_date, weekday_name, weekday_ordinal, week_number)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(day.year_id)
        .bind(day.calendar_date)
        .bind(day.weekday_name)
        .bind(i64::from(day.weekday_ordinal))
        .bind(day.week_number)
        .execute(&mut *conn)
        .await?;
    }

    Ok(())
}

#[instrument(skip(conn))]
pub async fn get_school_days(
    conn: &mut SqliteConnection,
    year_id: i64,
) -> Result<Vec<SchoolDay>, AppError> {
    let rows = sqlx::query_as::<_, SchoolDay>(
        "SELECT id, year_id, calendar_date, weekday_name, weekday_ordinal, week_number, active
         FROM school_days
         WHERE year_id = ?
         ORDER BY calendar_date",
    )
    .bind(year_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(rows)
}

#[instrument(skip(conn))]
pub async fn get_active_school_days_on_weekday(
    conn: &mut SqliteConnection,
    year_id: i64,
    weekday_ordinal: i64,
) -> Result<Vec<SchoolDay>, AppError> {
    let rows = sqlx::query_as::<_, SchoolDay>(
        "SELECT id, year_id, calendar_date, weekday_name, weekday_ordinal, week_number, active
         FROM school_days
         WHERE year_id = ? AND weekday_ordinal = ? AND active = 1
         ORDER BY calendar_date",
    )
    .bind(year_id)
    .bind(weekday_ordinal)
    .fetch_all(&mut *conn)
    .await?;

    Ok(rows)
}

// Teaching blocks.

#[instrument(skip(conn))]
pub async fn create_teaching_block(
    conn: &mut SqliteConnection,
    year_id: i64,
    label: &str,
    start_date: NaiveDate,
    end_date: NaiveDate,
) -> Result<TeachingBlock, AppError> {
    info!("Creating teaching block");
    let res = sqlx::query(
        "INSERT INTO teaching_blocks (year_id, label, start_date, end_date)
         VALUES (?, ?, ?, ?)",
    )
    .bind(year_id)
    .bind(label)
    .bind(start_date)
    .bind(end_date)
    .execute(&mut *conn)
    .await?;

    Ok(TeachingBlock {
        id: res.last_insert_rowid(),
        year_id,
        label: label.to_string(),
        start_date,
        end_date,
        active: true,
    })
}

#[instrument(skip(conn))]
pub async fn get_teaching_block(
    conn: &mut SqliteConnection,
    block_id: i64,
) -> Result<TeachingBlock, AppError> {
    let row = sqlx::query_as::<_, TeachingBlock>(
        "SELECT id, year_id, label, start_date, end_date, active
         FROM teaching_blocks
         WHERE id = ?",
    )
    .bind(block_id)
    .fetch_optional(&mut *conn)
    .await?;

    row.ok_or_else(|| AppError::NotFound(format!("Teaching block {} does not exist", block_id)))
}

/// Active blocks of a year, in calendar order.
#[instrument(skip(conn))]
pub async fn get_active_teaching_blocks(
    conn: &mut SqliteConnection,
    year_id: i64,
) -> Result<Vec<TeachingBlock>, AppError> {
    let rows = sqlx::query_as::<_, TeachingBlock>(
        "SELECT id, year_id, label, start_date, end_date, active
         FROM teaching_blocks
         WHERE year_id = ? AND active = 1
         ORDER BY start_date, id",
    )
    .bind(year_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(rows)
}

// Schedule block days.

#[instrument(skip(conn))]
pub async fn count_schedule_block_days(
    conn: &mut SqliteConnection,
    schedule_id: i64,
    year_id: i64,
) -> Result<i64, AppError> {
    let count = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM schedule_block_days
         WHERE schedule_id = ? AND year_id = ? AND active = 1",
    )
    .bind(schedule_id)
    .bind(year_id)
    .fetch_one(&mut *conn)
    .await?;

    Ok(count)
}

#[instrument(skip(conn, rows), fields(count = rows.len()))]
pub async fn insert_schedule_block_days(
    conn: &mut SqliteConnection,
    rows: &[NewScheduleBlockDay],
) -> Result<Vec<ScheduleBlockDay>, AppError> {
    info!("Inserting schedule block days");
    let mut inserted = Vec::with_capacity(rows.len());

    for row in rows {
        let res = sqlx::query(
            "INSERT INTO schedule_block_days
             (year_id, schedule_id, teaching_block_id, school_day_id)
             VALUES (?, ?, ?, ?)",
        )
        .bind(row.year_id)
        .bind(row.schedule_id)
        .bind(row.teaching_block_id)
        .bind(row.school_day_id)
        .execute(&mut *conn)
        .await?;

        inserted.push(ScheduleBlockDay {
            id: res.last_insert_rowid(),
            year_id: row.year_id,
            schedule_id: row.schedule_id,
            teaching_block_id: row.teaching_block_id,
            school_day_id: row.school_day_id,
            active: true,
        });
    }

    Ok(inserted)
}

#[instrument(skip(conn))]
pub async fn get_schedule_block_days(
    conn: &mut SqliteConnection,
    schedule_id: i64,
) -> Result<Vec<ScheduleBlockDay>, AppError> {
    let rows = sqlx::query_as::<_, ScheduleBlockDay>(
        "SELECT sbd.id AS id, sbd.year_id AS year_id, sbd.schedule_id AS schedule_id,
                sbd.teaching_block_id AS teaching_block_id,
                sbd.school_day_id AS school_day_id, sbd.active AS active
         FROM schedule_block_days sbd
         JOIN school_days sd ON sd.id = sbd.school_day_id
         WHERE sbd.schedule_id = ?
         ORDER BY sd.calendar_date",
    )
    .bind(schedule_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(rows)
}

#[instrument(skip(conn))]
pub async fn get_schedule_block_day(
    conn: &mut SqliteConnection,
    block_day_id: i64,
) -> Result<ScheduleBlockDay, AppError> {
    let row = sqlx::query_as::<_, ScheduleBlockDay>(
        "SELECT id, year_id, schedule_id, teaching_block_id, school_day_id, active
         FROM schedule_block_days
         WHERE id = ?",
    )
    .bind(block_day_id)
    .fetch_optional(&mut *conn)
    .await?;

    row.ok_or_else(|| {
        AppError::NotFound(format!("Schedule block day {} does not exist", block_day_id))
    })
}

// Raw capture data.

#[instrument(skip(conn))]
pub async fn upsert_qualification(
    conn: &mut SqliteConnection,
    block_day_id: i64,
    student_id: i64,
    rating: Option<f64>,
) -> Result<(), AppError> {
    sqlx::query(
        "INSERT INTO qualifications (schedule_block_day_id, student_id, rating)
         VALUES (?, ?, ?)
         ON CONFLICT (schedule_block_day_id, student_id)
         DO UPDATE SET rating = excluded.rating, updated_at = CURRENT_TIMESTAMP",
    )
    .bind(block_day_id)
    .bind(student_id)
    .bind(rating)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Ratings of a student on every block day of the schedules that teach the
/// assignment's course to its grade and section.
#[instrument(skip(conn))]
pub async fn get_block_ratings(
    conn: &mut SqliteConnection,
    student_id: i64,
    assignment_id: i64,
    block_id: i64,
) -> Result<Vec<Option<f64>>, AppError> {
    let ratings = sqlx::query_scalar::<_, Option<f64>>(
        "SELECT q.rating AS rating
         FROM qualifications q
         JOIN schedule_block_days sbd ON sbd.id = q.schedule_block_day_id
         JOIN schedules s ON s.id = sbd.schedule_id
         JOIN teacher_groups tg ON tg.id = s.teacher_group_id
         JOIN teacher_groups a
           ON a.course_id = tg.course_id
          AND a.grade_id = tg.grade_id
          AND a.section_id = tg.section_id
          AND a.year_id = tg.year_id
         WHERE a.id = ? AND q.student_id = ? AND sbd.teaching_block_id = ? AND sbd.active = 1
         ORDER BY sbd.id",
    )
    .bind(assignment_id)
    .bind(student_id)
    .bind(block_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(ratings)
}

#[instrument(skip(conn))]
pub async fn create_evaluation(
    conn: &mut SqliteConnection,
    student_id: i64,
    assignment_id: i64,
    block_id: i64,
    kind: EvaluationKind,
    score: f64,
) -> Result<Evaluation, AppError> {
    info!("Recording evaluation");
    let res = sqlx::query(
        "INSERT INTO evaluations (student_id, teacher_group_id, teaching_block_id, kind, score)
         VALUES (?, ?, ?, ?, ?)",
    )
    .bind(student_id)
    .bind(assignment_id)
    .bind(block_id)
    .bind(kind.as_str())
    .bind(score)
    .execute(&mut *conn)
    .await?;

    Ok(Evaluation {
        id: res.last_insert_rowid(),
        student_id,
        assignment_id,
        teaching_block_id: block_id,
        kind: kind.to_string(),
        score,
    })
}

#[instrument(skip(conn))]
pub async fn get_evaluation_scores(
    conn: &mut SqliteConnection,
    student_id: i64,
    assignment_id: i64,
    block_id: i64,
    kind: EvaluationKind,
) -> Result<Vec<f64>, AppError> {
    let scores = sqlx::query_scalar::<_, f64>(
        "SELECT score FROM evaluations
         WHERE student_id = ? AND teacher_group_id = ? AND teaching_block_id = ? AND kind = ?
         ORDER BY id",
    )
    .bind(student_id)
    .bind(assignment_id)
    .bind(block_id)
    .bind(kind.as_str())
    .fetch_all(&mut *conn)
    .await?;

    Ok(scores)
}

// Block averages.

const BLOCK_AVERAGE_COLUMNS: &str = "ba.id AS id, ba.student_id AS student_id,
     ba.teacher_group_id AS teacher_group_id, ba.teaching_block_id AS teaching_block_id,
     ba.daily_average AS daily_average, ba.practice_average AS practice_average,
     ba.exam_average AS exam_average, ba.block_average AS block_average";

#[instrument(skip(conn))]
pub async fn find_block_average(
    conn: &mut SqliteConnection,
    student_id: i64,
    assignment_id: i64,
    block_id: i64,
) -> Result<Option<BlockAverage>, AppError> {
    let row = sqlx::query_as::<_, BlockAverage>(&format!(
        "SELECT {BLOCK_AVERAGE_COLUMNS}
         FROM block_averages ba
         WHERE ba.student_id = ? AND ba.teacher_group_id = ? AND ba.teaching_block_id = ?"
    ))
    .bind(student_id)
    .bind(assignment_id)
    .bind(block_id)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(row)
}

#[instrument(skip(conn, average))]
pub async fn insert_block_average(
    conn: &mut SqliteConnection,
    average: &BlockAverage,
) -> Result<i64, AppError> {
    let res = sqlx::query(
        "INSERT INTO block_averages
         (student_id, teacher_group_id, teaching_block_id,
          daily_average, practice_average, exam_average, block_average)
         VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(average.student_id)
    .bind(average.assignment_id)
    .bind(average.teaching_block_id)
    .bind(average.daily_average)
    .bind(average.practice_average)
    .bind(average.exam_average)
    .bind(average.block_average)
    .execute(&mut *conn)
    .await?;

    Ok(res.last_insert_rowid())
}

#[instrument(skip(conn, average), fields(id = average.id))]
pub async fn update_block_average(
    conn: &mut SqliteConnection,
    average: &BlockAverage,
) -> Result<(), AppError> {
    sqlx::query(
        "UPDATE block_averages
         SET daily_average = ?, practice_average = ?, exam_average = ?, block_average = ?,
             updated_at = CURRENT_TIMESTAMP
         WHERE id = ?",
    )
    .bind(average.daily_average)
    .bind(average.practice_average)
    .bind(average.exam_average)
    .bind(average.block_average)
    .bind(average.id)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Block averages of one student and assignment whose block is an active block
/// of `year_id`, in block order.
#[instrument(skip(conn))]
pub async fn get_block_averages_for_year(
    conn: &mut SqliteConnection,
    student_id: i64,
    assignment_id: i64,
    year_id: i64,
) -> Result<Vec<BlockAverage>, AppError> {
    let rows = sqlx::query_as::<_, BlockAverage>(&format!(
        "SELECT {BLOCK_AVERAGE_COLUMNS}
         FROM block_averages ba
         JOIN teaching_blocks tb ON tb.id = ba.teaching_block_id
         WHERE ba.student_id = ? AND ba.teacher_group_id = ? AND tb.year_id = ? AND tb.active = 1
         ORDER BY tb.start_date, tb.id"
    ))
    .bind(student_id)
    .bind(assignment_id)
    .bind(year_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(rows)
}

#[instrument(skip(conn))]
pub async fn get_student_block_averages(
    conn: &mut SqliteConnection,
    student_id: i64,
    assignment_id: Option<i64>,
) -> Result<Vec<BlockAverage>, AppError> {
    let rows = sqlx::query_as::<_, BlockAverage>(&format!(
        "SELECT {BLOCK_AVERAGE_COLUMNS}
         FROM block_averages ba
         JOIN teaching_blocks tb ON tb.id = ba.teaching_block_id
         WHERE ba.student_id = ? AND (? IS NULL OR ba.teacher_group_id = ?)
         ORDER BY ba.teacher_group_id, tb.start_date, tb.id"
    ))
    .bind(student_id)
    .bind(assignment_id)
    .bind(assignment_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(rows)
}

// Course averages.

const COURSE_AVERAGE_COLUMNS: &str = "id, student_id, teacher_group_id, year_id,
     block1_average, block2_average, block3_average, block4_average, course_average";

#[instrument(skip(conn))]
pub async fn find_course_average(
    conn: &mut SqliteConnection,
    student_id: i64,
    assignment_id: i64,
    year_id: i64,
) -> Result<Option<CourseAverage>, AppError> {
    let row = sqlx::query_as::<_, CourseAverage>(&format!(
        "SELECT {COURSE_AVERAGE_COLUMNS}
         FROM course_averages
         WHERE student_id = ? AND teacher_group_id = ? AND year_id = ?"
    ))
    .bind(student_id)
    .bind(assignment_id)
    .bind(year_id)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(row)
}

#[instrument(skip(conn, average))]
pub async fn insert_course_average(
    conn: &mut SqliteConnection,
    average: &CourseAverage,
) -> Result<i64, AppError> {
    let res = sqlx::query(
        "INSERT INTO course_averages
         (student_id, teacher_group_id, year_id,
          block1_average, block2_average, block3_average, block4_average, course_average)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(average.student_id)
    .bind(average.assignment_id)
    .bind(average.year_id)
    .bind(average.block1_average)
    .bind(average.block2_average)
    .bind(average.block3_average)
    .bind(average.block4_average)
    .bind(average.course_average)
    .execute(&mut *conn)
    .await?;

    Ok(res.last_insert_rowid())
}

#[instrument(skip(conn, average), fields(id = average.id))]
pub async fn update_course_average(
    conn: &mut SqliteConnection,
    average: &CourseAverage,
) -> Result<(), AppError> {
    sqlx::query(
        "UPDATE course_averages
         SET block1_average = ?, block2_average = ?, block3_average = ?, block4_average = ?,
             course_average = ?, updated_at = CURRENT_TIMESTAMP
         WHERE id = ?",
    )
    .bind(average.block1_average)
    .bind(average.block2_average)
    .bind(average.block3_average)
    .bind(average.block4_average)
    .bind(average.course_average)
    .bind(average.id)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

#[instrument(skip(conn))]
pub async fn get_course_averages_with_course(
    conn: &mut SqliteConnection,
    student_id: i64,
    year_id: i64,
) -> Result<Vec<CourseAverageWithCourse>, AppError> {
    let rows = sqlx::query_as::<_, CourseAverageWithCourse>(
        "SELECT tg.course_id AS course_id, ca.course_average AS course_average
         FROM course_averages ca
         JOIN teacher_groups tg ON tg.id = ca.teacher_group_id
         WHERE ca.student_id = ? AND ca.year_id = ?
         ORDER BY tg.course_id",
    )
    .bind(student_id)
    .bind(year_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(rows)
}

#[instrument(skip(conn))]
pub async fn get_student_course_averages(
    conn: &mut SqliteConnection,
    student_id: i64,
    year_id: Option<i64>,
) -> Result<Vec<CourseAverage>, AppError> {
    let rows = sqlx::query_as::<_, CourseAverage>(&format!(
        "SELECT {COURSE_AVERAGE_COLUMNS}
         FROM course_averages
         WHERE student_id = ? AND (? IS NULL OR year_id = ?)
         ORDER BY year_id, teacher_group_id"
    ))
    .bind(student_id)
    .bind(year_id)
    .bind(year_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(rows)
}

// Annual averages.

#[instrument(skip(conn))]
pub async fn find_annual_average(
    conn: &mut SqliteConnection,
    student_id: i64,
    year_id: i64,
) -> Result<Option<AnnualAverage>, AppError> {
    let row = sqlx::query_as::<_, AnnualAverage>(
        "SELECT id, student_id, year_id, average
         FROM annual_averages
         WHERE student_id = ? AND year_id = ?",
    )
    .bind(student_id)
    .bind(year_id)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(row)
}

#[instrument(skip(conn))]
pub async fn insert_annual_average(
    conn: &mut SqliteConnection,
    student_id: i64,
    year_id: i64,
    average: f64,
) -> Result<i64, AppError> {
    let res = sqlx::query(
        "INSERT INTO annual_averages (student_id, year_id, average)
         VALUES (?, ?, ?)",
    )
    .bind(student_id)
    .bind(year_id)
    .bind(average)
    .execute(&mut *conn)
    .await?;

    Ok(res.last_insert_rowid())
}

#[instrument(skip(conn))]
pub async fn update_annual_average(
    conn: &mut SqliteConnection,
    id: i64,
    average: f64,
) -> Result<(), AppError> {
    sqlx::query(
        "UPDATE annual_averages
         SET average = ?, updated_at = CURRENT_TIMESTAMP
         WHERE id = ?",
    )
    .bind(average)
    .bind(id)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

const STUDENT_ANNUAL_COLUMNS: &str =
    "p.id AS student_id, p.first_name AS first_name, p.last_name AS last_name,
     aa.year_id AS year_id, aa.average AS average";

#[instrument(skip(conn))]
pub async fn get_annual_averages_by_tutor(
    conn: &mut SqliteConnection,
    tutor_id: i64,
) -> Result<Vec<StudentAnnualAverage>, AppError> {
    let rows = sqlx::query_as::<_, StudentAnnualAverage>(&format!(
        "SELECT {STUDENT_ANNUAL_COLUMNS}
         FROM tutors t
         JOIN student_enrollments se
           ON se.grade_id = t.grade_id
          AND se.section_id = t.section_id
          AND se.year_id = t.year_id
          AND se.active = 1
         JOIN annual_averages aa ON aa.student_id = se.student_id AND aa.year_id = t.year_id
         JOIN persons p ON p.id = se.student_id
         WHERE t.id = ?
         ORDER BY p.last_name COLLATE NOCASE, p.first_name COLLATE NOCASE"
    ))
    .bind(tutor_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(rows)
}

#[instrument(skip(conn))]
pub async fn get_annual_averages_by_student(
    conn: &mut SqliteConnection,
    student_id: i64,
) -> Result<Vec<StudentAnnualAverage>, AppError> {
    let rows = sqlx::query_as::<_, StudentAnnualAverage>(&format!(
        "SELECT {STUDENT_ANNUAL_COLUMNS}
         FROM annual_averages aa
         JOIN persons p ON p.id = aa.student_id
         WHERE aa.student_id = ?
         ORDER BY aa.year_id"
    ))
    .bind(student_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(rows)
}

#[instrument(skip(conn, student_ids), fields(count = student_ids.len()))]
pub async fn get_annual_averages_for_students(
    conn: &mut SqliteConnection,
    year_id: i64,
    student_ids: &[i64],
) -> Result<Vec<StudentAnnualAverage>, AppError> {
    if student_ids.is_empty() {
        return Ok(Vec::new());
    }

    let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(format!(
        "SELECT {STUDENT_ANNUAL_COLUMNS}
         FROM annual_averages aa
         JOIN persons p ON p.id = aa.student_id
         WHERE aa.year_id = "
    ));
    builder.push_bind(year_id);
    builder.push(" AND aa.student_id IN (");
    let mut separated = builder.separated(", ");
    for student_id in student_ids {
        separated.push_bind(*student_id);
    }
    separated.push_unseparated(")");
    builder.push(" ORDER BY p.last_name COLLATE NOCASE, p.first_name COLLATE NOCASE");

    let rows = builder
        .build_query_as::<StudentAnnualAverage>()
        .fetch_all(&mut *conn)
        .await?;

    Ok(rows)
}
