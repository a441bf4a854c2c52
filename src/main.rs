#[macro_use]
extern crate rocket;

mod academics;
mod api;
mod config;
mod db;
mod env;
mod error;
mod models;
mod telemetry;
#[cfg(test)]
mod test;
mod validation;

use api::{
    api_calculate_annual_average, api_calculate_block_average, api_calculate_course_average,
    api_create_teaching_block, api_get_calendar, api_get_schedule_block_days,
    api_get_student_annual_averages, api_get_student_block_averages,
    api_get_student_course_averages, api_get_teaching_blocks, api_get_tutor_annual_averages,
    api_map_schedule_block_days, api_map_teacher_block_days, api_record_evaluation,
    api_record_qualifications, api_register_calendar, api_students_annual_averages, health,
    not_found_api, unprocessable_api,
};
use config::AcademicConfig;
use error::AppError;
use rocket::fairing::AdHoc;
use rocket::{Build, Rocket};
use sqlx::SqlitePool;
use sqlx::sqlite::SqliteConnectOptions;
use std::str::FromStr;
use telemetry::{TelemetryFairing, init_tracing, shutdown_telemetry};
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum Error {
    #[error("{0}")]
    Anyhow(anyhow::Error),
    #[error("{0}")]
    Figment(rocket::figment::Error),
    #[error("{0}")]
    Sqlx(#[from] sqlx::Error),
    #[error("Migration failed: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),
    #[error("Application error: {0}")]
    App(#[from] AppError),
    #[error("{0}")]
    Rocket(Box<rocket::Error>),
}

impl From<anyhow::Error> for Error {
    fn from(value: anyhow::Error) -> Self {
        Error::Anyhow(value)
    }
}

impl From<rocket::figment::Error> for Error {
    fn from(value: rocket::figment::Error) -> Self {
        Error::Figment(value)
    }
}

impl From<rocket::Error> for Error {
    fn from(value: rocket::Error) -> Self {
        Error::Rocket(Box::new(value))
    }
}

#[rocket::main]
async fn main() -> Result<(), Error> {
    env::load_environment()?;
    init_tracing()?;

    let database_url = env::database_url();
    let options = SqliteConnectOptions::from_str(&database_url)?.create_if_missing(true);
    let pool = SqlitePool::connect_with(options).await?;

    info!("Running database migrations...");
    sqlx::migrate!("./migrations").run(&pool).await?;
    info!("Migrations completed successfully");

    let result = init_rocket(pool).await.launch().await;
    shutdown_telemetry();
    result?;

    Ok(())
}

pub async fn init_rocket(pool: SqlitePool) -> Rocket<Build> {
    info!("Starting school tracker");

    rocket::build()
        .manage(pool)
        .attach(AdHoc::config::<AcademicConfig>())
        .mount(
            "/api",
            routes![
                api_register_calendar,
                api_get_calendar,
                api_create_teaching_block,
                api_get_teaching_blocks,
                api_map_schedule_block_days,
                api_map_teacher_block_days,
                api_get_schedule_block_days,
                api_record_qualifications,
                api_record_evaluation,
                api_calculate_block_average,
                api_calculate_course_average,
                api_calculate_annual_average,
                api_get_student_block_averages,
                api_get_student_course_averages,
                api_get_tutor_annual_averages,
                api_get_student_annual_averages,
                api_students_annual_averages,
            ],
        )
        .register("/api", catchers![not_found_api, unprocessable_api])
        .mount("/api", routes![health])
        .attach(TelemetryFairing)
}
