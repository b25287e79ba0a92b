//! Common test utilities

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use uuid::Uuid;

use registrar::domain::{Course, CourseLevel, Instructor, Section, Semester, Student};
use registrar::{MemoryRecordStore, RecordStore, RegistrationEngine, RetryPolicy};

/// A memory store seeded with one course taught by one instructor
pub struct Campus {
    pub store: MemoryRecordStore,
    pub course_id: Uuid,
    pub instructor_id: Uuid,
}

impl Campus {
    pub fn new() -> Self {
        let store = MemoryRecordStore::new();
        let instructor_id = store
            .insert_instructor(Instructor::new("Dr. Knuth", "knuth@example.edu"))
            .unwrap();
        let course_id = store
            .insert_course(Course::new("Algorithms", CourseLevel::new(300).unwrap()))
            .unwrap();
        Self {
            store,
            course_id,
            instructor_id,
        }
    }

    pub fn student(&self, first_name: &str) -> Uuid {
        let email = format!("{}.{}@example.edu", first_name.to_lowercase(), Uuid::new_v4());
        self.store
            .insert_student(Student::new(first_name, "Tester", email))
            .unwrap()
    }

    pub fn section(&self, capacity: i32) -> Uuid {
        self.section_in(Semester::Fall, 2025, capacity)
    }

    pub fn section_in(&self, semester: Semester, year: i32, capacity: i32) -> Uuid {
        self.store
            .insert_section(
                Section::new(self.course_id, semester, year, Some(self.instructor_id), capacity)
                    .unwrap(),
            )
            .unwrap()
    }

    pub fn course(&self, title: &str, level: i32) -> Uuid {
        self.store
            .insert_course(Course::new(title, CourseLevel::new(level).unwrap()))
            .unwrap()
    }

    pub fn shared(&self) -> Arc<dyn RecordStore> {
        Arc::new(self.store.clone())
    }

    /// Engine with no backoff between retries
    pub fn engine(&self) -> RegistrationEngine {
        RegistrationEngine::new(self.shared())
            .with_retry_policy(RetryPolicy::new(3, Duration::ZERO))
    }

    pub fn available_seats(&self, section_id: Uuid) -> i32 {
        self.store
            .section(section_id)
            .unwrap()
            .expect("section exists")
            .available_seats
    }

    /// Counter equals capacity minus active enrollments
    pub fn assert_seats_consistent(&self, section_id: Uuid) {
        let section = self.store.section(section_id).unwrap().expect("section exists");
        let active = self.store.active_enrollment_count(section_id).unwrap();
        assert!(section.available_seats >= 0);
        assert!(section.available_seats <= section.capacity);
        assert_eq!(
            i64::from(section.available_seats),
            i64::from(section.capacity) - active,
            "seat counter drifted from enrollment rows"
        );
    }
}

/// Connect to the test database.
///
/// Every test seeds its own rows under fresh ids, so tests can share the
/// database without truncating it. Returns `None` when DATABASE_URL is
/// unset so database tests can skip.
pub async fn setup_test_db() -> Option<PgPool> {
    dotenvy::dotenv().ok();
    let database_url = match std::env::var("DATABASE_URL") {
        Ok(url) => url,
        Err(_) => {
            eprintln!("DATABASE_URL not set, skipping database test");
            return None;
        }
    };

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&database_url)
        .await
        .expect("Failed to connect to DB");

    Some(pool)
}

/// Seed a course and one section of the given capacity
pub async fn seed_pg_section(pool: &PgPool, capacity: i32) -> Uuid {
    let course_id: Uuid = sqlx::query_scalar(
        "INSERT INTO courses (title, level) VALUES ('Databases', 200) RETURNING course_id",
    )
    .fetch_one(pool)
    .await
    .expect("Failed to seed course");

    sqlx::query_scalar(
        r#"
        INSERT INTO sections (course_id, semester, year, capacity, available_seats)
        VALUES ($1, 'SPRING', 2025, $2, $2)
        RETURNING section_id
        "#,
    )
    .bind(course_id)
    .bind(capacity)
    .fetch_one(pool)
    .await
    .expect("Failed to seed section")
}

pub async fn seed_pg_student(pool: &PgPool, first_name: &str) -> Uuid {
    sqlx::query_scalar(
        r#"
        INSERT INTO students (first_name, last_name, email)
        VALUES ($1, 'Tester', $2)
        RETURNING student_id
        "#,
    )
    .bind(first_name)
    .bind(format!("{}-{}@example.edu", first_name, Uuid::new_v4()))
    .fetch_one(pool)
    .await
    .expect("Failed to seed student")
}
