use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Once;

use rocket::local::asynchronous::Client;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};

use crate::academics::{create_teaching_block, register_calendar};
use crate::error::AppError;
use crate::init_rocket;

static INIT: Once = Once::new();

/// March 2025: Mondays 3, 10, 17, 24, 31 and Wednesdays 5, 12, 19, 26.
pub const MARCH_2025: [&str; 9] = [
    "2025-03-03",
    "2025-03-05",
    "2025-03-10",
    "2025-03-12",
    "2025-03-17",
    "2025-03-19",
    "2025-03-24",
    "2025-03-26",
    "2025-03-31",
];

pub fn date(raw: &str) -> chrono::NaiveDate {
    chrono::NaiveDate::parse_from_str(raw, "%Y-%m-%d").expect("valid test date")
}

pub fn raw_dates(dates: &[&str]) -> Vec<String> {
    dates.iter().map(|d| d.to_string()).collect()
}

struct TestPerson {
    key: String,
    first_name: String,
    last_name: String,
}

struct TestClassroom {
    key: String,
    grade: String,
    section: String,
}

struct TestAssignment {
    key: String,
    teacher: String,
    course: String,
    classroom: String,
    year: String,
}

struct TestSchedule {
    key: String,
    assignment: String,
    weekday: Option<i64>,
}

struct TestEnrollment {
    student: String,
    classroom: String,
    year: String,
}

struct TestTutor {
    key: String,
    teacher: String,
    classroom: String,
    year: String,
}

/// Builds the registry rows (years, people, courses, groups, schedules) the
/// calculators read but never write.
#[derive(Default)]
pub struct TestDbBuilder {
    years: Vec<String>,
    people: Vec<TestPerson>,
    courses: Vec<String>,
    classrooms: Vec<TestClassroom>,
    assignments: Vec<TestAssignment>,
    schedules: Vec<TestSchedule>,
    enrollments: Vec<TestEnrollment>,
    tutors: Vec<TestTutor>,
    file: Option<PathBuf>,
}

impl TestDbBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Backs the database with a file in the temp dir and opens a pool of
    /// several connections.
    pub fn on_disk(mut self, name: &str) -> Self {
        self.file = Some(std::env::temp_dir().join(format!(
            "school-tracker-{}-{}.db",
            std::process::id(),
            name
        )));
        self
    }

    pub fn year(mut self, label: &str) -> Self {
        self.years.push(label.to_string());
        self
    }

    pub fn person(mut self, key: &str, first_name: &str, last_name: &str) -> Self {
        self.people.push(TestPerson {
            key: key.to_string(),
            first_name: first_name.to_string(),
            last_name: last_name.to_string(),
        });
        self
    }

    pub fn course(mut self, name: &str) -> Self {
        self.courses.push(name.to_string());
        self
    }

    pub fn classroom(mut self, key: &str, grade: &str, section: &str) -> Self {
        self.classrooms.push(TestClassroom {
            key: key.to_string(),
            grade: grade.to_string(),
            section: section.to_string(),
        });
        self
    }

    pub fn assignment(
        mut self,
        key: &str,
        teacher: &str,
        course: &str,
        classroom: &str,
        year: &str,
    ) -> Self {
        self.assignments.push(TestAssignment {
            key: key.to_string(),
            teacher: teacher.to_string(),
            course: course.to_string(),
            classroom: classroom.to_string(),
            year: year.to_string(),
        });
        self
    }

    pub fn schedule(mut self, key: &str, assignment: &str, weekday: Option<i64>) -> Self {
        self.schedules.push(TestSchedule {
            key: key.to_string(),
            assignment: assignment.to_string(),
            weekday,
        });
        self
    }

    pub fn enroll(mut self, student: &str, classroom: &str, year: &str) -> Self {
        self.enrollments.push(TestEnrollment {
            student: student.to_string(),
            classroom: classroom.to_string(),
            year: year.to_string(),
        });
        self
    }

    pub fn tutor(mut self, key: &str, teacher: &str, classroom: &str, year: &str) -> Self {
        self.tutors.push(TestTutor {
            key: key.to_string(),
            teacher: teacher.to_string(),
            classroom: classroom.to_string(),
            year: year.to_string(),
        });
        self
    }

    pub async fn build(self) -> Result<TestDb, AppError> {
        INIT.call_once(|| {
            let _ = env_logger::Builder::from_env(
                env_logger::Env::default().default_filter_or("debug"),
            )
            .is_test(true)
            .try_init();
        });

        let pool = match &self.file {
            Some(path) => {
                remove_db_files(path);
                let options = SqliteConnectOptions::new()
                    .filename(path)
                    .create_if_missing(true);
                SqlitePoolOptions::new()
                    .max_connections(4)
                    .connect_with(options)
                    .await?
            }
            // One connection keeps the in-memory database alive and avoids
            // shared-cache table locks between connections.
            None => {
                SqlitePoolOptions::new()
                    .max_connections(1)
                    .connect("sqlite::memory:")
                    .await?
            }
        };

        sqlx::migrate!("./migrations").run(&pool).await?;

        let mut ids: HashMap<String, i64> = HashMap::new();

        for label in &self.years {
            let id = insert(&pool, "INSERT INTO years (label) VALUES (?)", &[label]).await?;
            ids.insert(format!("year:{}", label), id);
        }

        for person in &self.people {
            let id = insert(
                &pool,
                "INSERT INTO persons (first_name, last_name) VALUES (?, ?)",
                &[&person.first_name, &person.last_name],
            )
            .await?;
            ids.insert(format!("person:{}", person.key), id);
        }

        for name in &self.courses {
            let id = insert(&pool, "INSERT INTO courses (name) VALUES (?)", &[name]).await?;
            ids.insert(format!("course:{}", name), id);
        }

        let mut classrooms: HashMap<String, (i64, i64)> = HashMap::new();
        for classroom in &self.classrooms {
            let grade_id =
                insert(&pool, "INSERT INTO grades (name) VALUES (?)", &[&classroom.grade]).await?;
            let section_id = insert(
                &pool,
                "INSERT INTO sections (name) VALUES (?)",
                &[&classroom.section],
            )
            .await?;
            classrooms.insert(classroom.key.clone(), (grade_id, section_id));
        }

        let lookup = |ids: &HashMap<String, i64>, key: String| {
            ids.get(&key)
                .copied()
                .ok_or_else(|| AppError::Internal(format!("Unknown test fixture {}", key)))
        };
        let room = |key: &str| {
            classrooms
                .get(key)
                .copied()
                .ok_or_else(|| AppError::Internal(format!("Unknown test classroom {}", key)))
        };

        for assignment in &self.assignments {
            let (grade_id, section_id) = room(&assignment.classroom)?;
            let res = sqlx::query(
                "INSERT INTO teacher_groups (teacher_id, course_id, grade_id, section_id, year_id)
                 VALUES (?, ?, ?, ?, ?)",
            )
            .bind(lookup(&ids, format!("person:{}", assignment.teacher))?)
            .bind(lookup(&ids, format!("course:{}", assignment.course))?)
            .bind(grade_id)
            .bind(section_id)
            .bind(lookup(&ids, format!("year:{}", assignment.year))?)
            .execute(&pool)
            .await?;
            ids.insert(
                format!("assignment:{}", assignment.key),
                res.last_insert_rowid(),
            );
        }

        for schedule in &self.schedules {
            let res = sqlx::query(
                "INSERT INTO schedules (teacher_group_id, weekday, start_time, end_time)
                 VALUES (?, ?, '08:00', '09:30')",
            )
            .bind(lookup(&ids, format!("assignment:{}", schedule.assignment))?)
            .bind(schedule.weekday)
            .execute(&pool)
            .await?;
            ids.insert(format!("schedule:{}", schedule.key), res.last_insert_rowid());
        }

        for enrollment in &self.enrollments {
            let (grade_id, section_id) = room(&enrollment.classroom)?;
            sqlx::query(
                "INSERT INTO student_enrollments (student_id, year_id, grade_id, section_id)
                 VALUES (?, ?, ?, ?)",
            )
            .bind(lookup(&ids, format!("person:{}", enrollment.student))?)
            .bind(lookup(&ids, format!("year:{}", enrollment.year))?)
            .bind(grade_id)
            .bind(section_id)
            .execute(&pool)
            .await?;
        }

        for tutor in &self.tutors {
            let (grade_id, section_id) = room(&tutor.classroom)?;
            let res = sqlx::query(
                "INSERT INTO tutors (teacher_id, grade_id, section_id, year_id)
                 VALUES (?, ?, ?, ?)",
            )
            .bind(lookup(&ids, format!("person:{}", tutor.teacher))?)
            .bind(grade_id)
            .bind(section_id)
            .bind(lookup(&ids, format!("year:{}", tutor.year))?)
            .execute(&pool)
            .await?;
            ids.insert(format!("tutor:{}", tutor.key), res.last_insert_rowid());
        }

        Ok(TestDb {
            pool,
            ids,
            file: self.file,
        })
    }
}

fn remove_db_files(path: &Path) {
    for suffix in ["", "-wal", "-shm"] {
        let _ = std::fs::remove_file(format!("{}{}", path.display(), suffix));
    }
}

async fn insert(pool: &Pool<Sqlite>, sql: &str, values: &[&String]) -> Result<i64, AppError> {
    let mut query = sqlx::query(sql);
    for value in values {
        query = query.bind(value.as_str());
    }
    Ok(query.execute(pool).await?.last_insert_rowid())
}

pub struct TestDb {
    pub pool: Pool<Sqlite>,
    ids: HashMap<String, i64>,
    file: Option<PathBuf>,
}

impl Drop for TestDb {
    fn drop(&mut self) {
        if let Some(path) = &self.file {
            remove_db_files(path);
        }
    }
}

impl TestDb {
    fn id(&self, key: String) -> i64 {
        *self
            .ids
            .get(&key)
            .unwrap_or_else(|| panic!("no test fixture named {}", key))
    }

    pub fn year_id(&self, label: &str) -> i64 {
        self.id(format!("year:{}", label))
    }

    pub fn person_id(&self, key: &str) -> i64 {
        self.id(format!("person:{}", key))
    }

    pub fn course_id(&self, name: &str) -> i64 {
        self.id(format!("course:{}", name))
    }

    pub fn assignment_id(&self, key: &str) -> i64 {
        self.id(format!("assignment:{}", key))
    }

    pub fn schedule_id(&self, key: &str) -> i64 {
        self.id(format!("schedule:{}", key))
    }

    pub fn tutor_id(&self, key: &str) -> i64 {
        self.id(format!("tutor:{}", key))
    }

    pub async fn count(&self, table: &str) -> i64 {
        sqlx::query_scalar::<_, i64>(&format!("SELECT COUNT(*) FROM {}", table))
            .fetch_one(&self.pool)
            .await
            .expect("count query")
    }

    /// Registers the March 2025 calendar and a block covering the month.
    pub async fn seed_march(&self, year: &str) -> i64 {
        let year_id = self.year_id(year);
        register_calendar(&self.pool, year_id, &raw_dates(&MARCH_2025))
            .await
            .expect("calendar registered");
        create_teaching_block(
            &self.pool,
            year_id,
            "Bloque 1",
            date("2025-03-01"),
            date("2025-03-31"),
        )
        .await
        .expect("block created")
        .id
    }
}

/// One year, a mathematics teacher with Monday and Wednesday classes for 1A,
/// three enrolled students and a tutor for the classroom.
pub async fn create_standard_test_db() -> TestDb {
    standard_fixtures(TestDbBuilder::new())
        .build()
        .await
        .expect("Failed to build standard test database")
}

/// The standard fixtures on a file-backed pool with several connections.
pub async fn create_shared_test_db(name: &str) -> TestDb {
    standard_fixtures(TestDbBuilder::new().on_disk(name))
        .build()
        .await
        .expect("Failed to build shared test database")
}

fn standard_fixtures(builder: TestDbBuilder) -> TestDbBuilder {
    builder
        .year("2025")
        .person("garcia", "Lucía", "García")
        .person("ana", "Ana", "Zapata")
        .person("bruno", "Bruno", "Alvarez")
        .person("carla", "Carla", "Mendez")
        .course("Matemática")
        .classroom("1A", "Primero", "A")
        .assignment("math", "garcia", "Matemática", "1A", "2025")
        .schedule("math-monday", "math", Some(1))
        .schedule("math-wednesday", "math", Some(3))
        .enroll("ana", "1A", "2025")
        .enroll("bruno", "1A", "2025")
        .enroll("carla", "1A", "2025")
        .tutor("tutor-1A", "garcia", "1A", "2025")
}

pub async fn setup_test_client(test_db: TestDb) -> (Client, TestDb) {
    let rocket = init_rocket(test_db.pool.clone()).await;
    let client = Client::tracked(rocket)
        .await
        .expect("Failed to create test client");
    (client, test_db)
}
