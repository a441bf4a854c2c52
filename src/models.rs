use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, sqlx::FromRow)]
pub struct SchoolDay {
    pub id: i64,
    pub year_id: i64,
    pub calendar_date: NaiveDate,
    pub weekday_name: String,
    pub weekday_ordinal: i64,
    pub week_number: i64,
    pub active: bool,
}

/// A school day derived from a raw date, not yet persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct NewSchoolDay {
    pub year_id: i64,
    pub calendar_date: NaiveDate,
    pub weekday_name: &'static str,
    pub weekday_ordinal: u32,
    pub week_number: i64,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, sqlx::FromRow)]
pub struct TeachingBlock {
    pub id: i64,
    pub year_id: i64,
    pub label: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub active: bool,
}

impl TeachingBlock {
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start_date <= date && date <= self.end_date
    }
}

/// A teacher's course for one grade and section in a year (a "teacher group").
#[derive(Debug, Serialize, Clone, PartialEq, sqlx::FromRow)]
pub struct Assignment {
    pub id: i64,
    pub teacher_id: i64,
    pub course_id: i64,
    pub grade_id: i64,
    pub section_id: i64,
    pub year_id: i64,
}

#[derive(Debug, Serialize, Clone, PartialEq, sqlx::FromRow)]
pub struct Schedule {
    pub id: i64,
    pub teacher_group_id: i64,
    pub year_id: i64,
    pub weekday: Option<i64>,
    pub active: bool,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, sqlx::FromRow)]
pub struct ScheduleBlockDay {
    pub id: i64,
    pub year_id: i64,
    pub schedule_id: i64,
    pub teaching_block_id: i64,
    pub school_day_id: i64,
    pub active: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NewScheduleBlockDay {
    pub year_id: i64,
    pub schedule_id: i64,
    pub teaching_block_id: i64,
    pub school_day_id: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EvaluationKind {
    #[serde(rename = "Práctica")]
    Practice,
    #[serde(rename = "Examen")]
    Exam,
}

impl EvaluationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EvaluationKind::Practice => "Práctica",
            EvaluationKind::Exam => "Examen",
        }
    }
}

impl fmt::Display for EvaluationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EvaluationKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Práctica" => Ok(EvaluationKind::Practice),
            "Examen" => Ok(EvaluationKind::Exam),
            other => Err(format!("Unknown evaluation type: {}", other)),
        }
    }
}

#[derive(Debug, Serialize, Clone, PartialEq, sqlx::FromRow)]
pub struct Evaluation {
    pub id: i64,
    pub student_id: i64,
    #[sqlx(rename = "teacher_group_id")]
    pub assignment_id: i64,
    pub teaching_block_id: i64,
    pub kind: String,
    pub score: f64,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, sqlx::FromRow)]
pub struct BlockAverage {
    pub id: i64,
    pub student_id: i64,
    #[sqlx(rename = "teacher_group_id")]
    pub assignment_id: i64,
    pub teaching_block_id: i64,
    pub daily_average: Option<f64>,
    pub practice_average: Option<f64>,
    pub exam_average: Option<f64>,
    pub block_average: f64,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, sqlx::FromRow)]
pub struct CourseAverage {
    pub id: i64,
    pub student_id: i64,
    #[sqlx(rename = "teacher_group_id")]
    pub assignment_id: i64,
    pub year_id: i64,
    pub block1_average: Option<f64>,
    pub block2_average: Option<f64>,
    pub block3_average: Option<f64>,
    pub block4_average: Option<f64>,
    pub course_average: f64,
}

#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct CourseAverageWithCourse {
    pub course_id: i64,
    pub course_average: Option<f64>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, sqlx::FromRow)]
pub struct AnnualAverage {
    pub id: i64,
    pub student_id: i64,
    pub year_id: i64,
    pub average: f64,
}

/// Annual average projected with the student's name for listings.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, sqlx::FromRow)]
pub struct StudentAnnualAverage {
    pub student_id: i64,
    pub first_name: String,
    pub last_name: String,
    pub year_id: i64,
    pub average: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UpsertOutcome {
    Created,
    Updated,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Upserted<T> {
    pub outcome: UpsertOutcome,
    pub average: T,
}
