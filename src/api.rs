use chrono::NaiveDate;
use rocket::State;
use rocket::http::Status;
use rocket::response::status::Custom;
use rocket::serde::{Deserialize, Serialize, json::Json};
use sqlx::{Pool, Sqlite};
use validator::Validate;

use crate::academics::{
    self, QualificationEntry, annual_averages_by_student, annual_averages_by_tutor,
    annual_averages_for_students, calculate_annual_average, calculate_block_average,
    calculate_course_average, create_teaching_block, map_schedule_block_days,
    map_teacher_block_days, record_evaluation, record_qualifications, register_calendar,
    school_calendar, student_block_averages, student_course_averages, teaching_blocks,
};
use crate::config::AcademicConfig;
use crate::models::{
    AnnualAverage, BlockAverage, CourseAverage, Evaluation, EvaluationKind, SchoolDay,
    ScheduleBlockDay, StudentAnnualAverage, TeachingBlock, UpsertOutcome, Upserted,
};
use crate::validation::{ApiError, AppErrorExt, JsonValidateExt, ToValidationResponse};

#[derive(Serialize, Deserialize, Validate)]
pub struct CalendarRequest {
    #[validate(length(min = 1, message = "At least one teaching day is required"))]
    pub dates: Vec<String>,
}

#[derive(Serialize, Deserialize, Validate)]
pub struct TeachingBlockRequest {
    #[validate(length(min = 1, max = 100, message = "Label must be 1-100 characters"))]
    pub label: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct BlockDaysResponse {
    pub created: usize,
    pub block_days: Vec<ScheduleBlockDay>,
}

impl From<Vec<ScheduleBlockDay>> for BlockDaysResponse {
    fn from(block_days: Vec<ScheduleBlockDay>) -> Self {
        Self {
            created: block_days.len(),
            block_days,
        }
    }
}

#[derive(Serialize, Deserialize, Validate)]
pub struct QualificationEntryRequest {
    #[validate(range(min = 1, message = "A student is required"))]
    pub student_id: i64,
    #[validate(range(min = 0.0, message = "Rating cannot be negative"))]
    pub rating: Option<f64>,
}

#[derive(Serialize, Deserialize, Validate)]
pub struct QualificationsRequest {
    #[validate(
        length(min = 1, message = "At least one qualification is required"),
        nested
    )]
    pub entries: Vec<QualificationEntryRequest>,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct QualificationsResponse {
    pub block_day_id: i64,
    pub recorded: usize,
}

#[derive(Serialize, Deserialize, Validate)]
pub struct EvaluationRequest {
    #[validate(range(min = 1, message = "A student is required"))]
    pub student_id: i64,
    #[validate(range(min = 1, message = "An assignment is required"))]
    pub assignment_id: i64,
    #[validate(range(min = 1, message = "A teaching block is required"))]
    pub teaching_block_id: i64,
    pub kind: EvaluationKind,
    #[validate(range(min = 0.0, message = "Score cannot be negative"))]
    pub score: f64,
}

#[derive(Serialize, Deserialize, Validate)]
pub struct BlockAverageRequest {
    #[validate(range(min = 1, message = "A student is required"))]
    pub student_id: i64,
    #[validate(range(min = 1, message = "An assignment is required"))]
    pub assignment_id: i64,
    #[validate(range(min = 1, message = "A teaching block is required"))]
    pub teaching_block_id: i64,
}

#[derive(Serialize, Deserialize, Validate)]
pub struct CourseAverageRequest {
    #[validate(range(min = 1, message = "A student is required"))]
    pub student_id: i64,
    #[validate(range(min = 1, message = "An assignment is required"))]
    pub assignment_id: i64,
    #[validate(range(min = 1, message = "A year is required"))]
    pub year_id: i64,
}

#[derive(Serialize, Deserialize, Validate)]
pub struct AnnualAverageRequest {
    #[validate(range(min = 1, message = "A student is required"))]
    pub student_id: i64,
    #[validate(range(min = 1, message = "A year is required"))]
    pub year_id: i64,
}

#[derive(Serialize, Deserialize, Validate)]
pub struct StudentsAnnualAveragesRequest {
    #[validate(range(min = 1, message = "A year is required"))]
    pub year_id: i64,
    #[validate(length(min = 1, message = "At least one student is required"))]
    pub student_ids: Vec<i64>,
}

/// Fresh rows answer 201, recalculations 200.
fn upserted<T>(result: Upserted<T>) -> Custom<Json<Upserted<T>>> {
    let status = match result.outcome {
        UpsertOutcome::Created => Status::Created,
        UpsertOutcome::Updated => Status::Ok,
    };
    Custom(status, Json(result))
}

#[get("/health")]
pub fn health() -> &'static str {
    "OK"
}

#[post("/years/<year_id>/calendar", data = "<request>")]
pub async fn api_register_calendar(
    year_id: i64,
    request: Json<CalendarRequest>,
    db: &State<Pool<Sqlite>>,
) -> Result<Custom<Json<Vec<SchoolDay>>>, ApiError> {
    let validated = request.validate_custom()?;

    let days = register_calendar(db, year_id, &validated.dates)
        .await
        .validate_custom()?;

    Ok(Custom(Status::Created, Json(days)))
}

#[get("/years/<year_id>/calendar")]
pub async fn api_get_calendar(
    year_id: i64,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<Vec<SchoolDay>>, ApiError> {
    school_calendar(db, year_id)
        .await
        .map(Json)
        .validate_custom()
}

#[post("/years/<year_id>/blocks", data = "<request>")]
pub async fn api_create_teaching_block(
    year_id: i64,
    request: Json<TeachingBlockRequest>,
    db: &State<Pool<Sqlite>>,
) -> Result<Custom<Json<TeachingBlock>>, ApiError> {
    let validated = request.validate_custom()?;

    let block = create_teaching_block(
        db,
        year_id,
        &validated.label,
        validated.start_date,
        validated.end_date,
    )
    .await
    .validate_custom()?;

    Ok(Custom(Status::Created, Json(block)))
}

#[get("/years/<year_id>/blocks")]
pub async fn api_get_teaching_blocks(
    year_id: i64,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<Vec<TeachingBlock>>, ApiError> {
    teaching_blocks(db, year_id)
        .await
        .map(Json)
        .validate_custom()
}

#[post("/schedules/<schedule_id>/block-days")]
pub async fn api_map_schedule_block_days(
    schedule_id: i64,
    db: &State<Pool<Sqlite>>,
) -> Result<Custom<Json<BlockDaysResponse>>, ApiError> {
    let block_days = map_schedule_block_days(db, schedule_id)
        .await
        .validate_custom()?;

    Ok(Custom(Status::Created, Json(block_days.into())))
}

#[post("/teachers/<teacher_id>/years/<year_id>/block-days")]
pub async fn api_map_teacher_block_days(
    teacher_id: i64,
    year_id: i64,
    db: &State<Pool<Sqlite>>,
) -> Result<Custom<Json<BlockDaysResponse>>, ApiError> {
    let block_days = map_teacher_block_days(db, teacher_id, year_id)
        .await
        .validate_custom()?;

    Ok(Custom(Status::Created, Json(block_days.into())))
}

#[get("/schedules/<schedule_id>/block-days")]
pub async fn api_get_schedule_block_days(
    schedule_id: i64,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<Vec<ScheduleBlockDay>>, ApiError> {
    academics::schedule_block_days(db, schedule_id)
        .await
        .map(Json)
        .validate_custom()
}

#[put("/block-days/<block_day_id>/qualifications", data = "<request>")]
pub async fn api_record_qualifications(
    block_day_id: i64,
    request: Json<QualificationsRequest>,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<QualificationsResponse>, ApiError> {
    let validated = request.validate_custom()?;

    let entries: Vec<QualificationEntry> = validated
        .entries
        .iter()
        .map(|entry| QualificationEntry {
            student_id: entry.student_id,
            rating: entry.rating,
        })
        .collect();

    let recorded = record_qualifications(db, block_day_id, &entries)
        .await
        .validate_custom()?;

    Ok(Json(QualificationsResponse {
        block_day_id,
        recorded,
    }))
}

#[post("/evaluations", data = "<request>")]
pub async fn api_record_evaluation(
    request: Json<EvaluationRequest>,
    db: &State<Pool<Sqlite>>,
) -> Result<Custom<Json<Evaluation>>, ApiError> {
    let validated = request.validate_custom()?;

    let evaluation = record_evaluation(
        db,
        validated.student_id,
        validated.assignment_id,
        validated.teaching_block_id,
        validated.kind,
        validated.score,
    )
    .await
    .validate_custom()?;

    Ok(Custom(Status::Created, Json(evaluation)))
}

#[post("/averages/block", data = "<request>")]
pub async fn api_calculate_block_average(
    request: Json<BlockAverageRequest>,
    db: &State<Pool<Sqlite>>,
    config: &State<AcademicConfig>,
) -> Result<Custom<Json<Upserted<BlockAverage>>>, ApiError> {
    let validated = request.validate_custom()?;

    calculate_block_average(
        db,
        config.missing_rating_policy,
        validated.student_id,
        validated.assignment_id,
        validated.teaching_block_id,
    )
    .await
    .map(upserted)
    .validate_custom()
}

#[post("/averages/course", data = "<request>")]
pub async fn api_calculate_course_average(
    request: Json<CourseAverageRequest>,
    db: &State<Pool<Sqlite>>,
) -> Result<Custom<Json<Upserted<CourseAverage>>>, ApiError> {
    let validated = request.validate_custom()?;

    calculate_course_average(
        db,
        validated.student_id,
        validated.assignment_id,
        validated.year_id,
    )
    .await
    .map(upserted)
    .validate_custom()
}

#[post("/averages/annual", data = "<request>")]
pub async fn api_calculate_annual_average(
    request: Json<AnnualAverageRequest>,
    db: &State<Pool<Sqlite>>,
    config: &State<AcademicConfig>,
) -> Result<Custom<Json<Upserted<AnnualAverage>>>, ApiError> {
    let validated = request.validate_custom()?;

    calculate_annual_average(
        db,
        config.required_courses,
        validated.student_id,
        validated.year_id,
    )
    .await
    .map(upserted)
    .validate_custom()
}

#[get("/students/<student_id>/block-averages?<assignment_id>")]
pub async fn api_get_student_block_averages(
    student_id: i64,
    assignment_id: Option<i64>,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<Vec<BlockAverage>>, ApiError> {
    student_block_averages(db, student_id, assignment_id)
        .await
        .map(Json)
        .validate_custom()
}

#[get("/students/<student_id>/course-averages?<year_id>")]
pub async fn api_get_student_course_averages(
    student_id: i64,
    year_id: Option<i64>,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<Vec<CourseAverage>>, ApiError> {
    student_course_averages(db, student_id, year_id)
        .await
        .map(Json)
        .validate_custom()
}

#[get("/annual-averages/tutor/<tutor_id>")]
pub async fn api_get_tutor_annual_averages(
    tutor_id: i64,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<Vec<StudentAnnualAverage>>, ApiError> {
    annual_averages_by_tutor(db, tutor_id)
        .await
        .map(Json)
        .validate_custom()
}

#[get("/annual-averages/student/<student_id>")]
pub async fn api_get_student_annual_averages(
    student_id: i64,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<Vec<StudentAnnualAverage>>, ApiError> {
    annual_averages_by_student(db, student_id)
        .await
        .map(Json)
        .validate_custom()
}

#[post("/annual-averages/students", data = "<request>")]
pub async fn api_students_annual_averages(
    request: Json<StudentsAnnualAveragesRequest>,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<Vec<StudentAnnualAverage>>, ApiError> {
    let validated = request.validate_custom()?;

    annual_averages_for_students(db, validated.year_id, &validated.student_ids)
        .await
        .map(Json)
        .validate_custom()
}

#[catch(404)]
pub fn not_found_api() -> ApiError {
    Status::NotFound.to_validation_response()
}

/// Bodies that fail to deserialize (unknown evaluation kind, bad date).
#[catch(422)]
pub fn unprocessable_api() -> ApiError {
    Status::UnprocessableEntity.to_validation_response()
}
