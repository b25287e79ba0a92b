//! PostgreSQL Record Store
//!
//! Serializes seat changes on the section row with `SELECT ... FOR UPDATE`
//! and guards every counter update in SQL so it can never leave
//! `[0, capacity]`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::domain::{Enrollment, Grade, Section, Student};

use super::{
    EnrollmentFeedRecord, RecordStore, SectionListing, SectionSeats, StoreError, StoreResult,
    StoreTransaction, TranscriptRecord,
};

type SectionRow = (Uuid, Uuid, String, i32, Option<Uuid>, i32, i32);
type EnrollmentRow = (Uuid, Uuid, Uuid, String, Option<Decimal>, DateTime<Utc>);
type TranscriptRow = (
    Uuid,
    String,
    i32,
    String,
    i32,
    Option<String>,
    Option<Decimal>,
    String,
    DateTime<Utc>,
);
type FeedRow = (
    Uuid,
    Uuid,
    String,
    String,
    Uuid,
    String,
    String,
    i32,
    Option<Decimal>,
    String,
    DateTime<Utc>,
);
type ListingRow = (Uuid, String, i32, String, i32, Option<String>, i32, i32);
type SeatsRow = (Uuid, i32, i32, i64);

const ENROLLMENT_COLUMNS: &str =
    "enrollment_id, student_id, section_id, status, grade, created_at";

fn section_from_row(row: SectionRow) -> StoreResult<Section> {
    let (id, course_id, semester, year, instructor_id, capacity, available_seats) = row;
    let section = Section {
        id,
        course_id,
        semester: semester.parse()?,
        year,
        instructor_id,
        capacity,
        available_seats,
    };
    section.validate()?;
    Ok(section)
}

fn enrollment_from_row(row: EnrollmentRow) -> StoreResult<Enrollment> {
    let (id, student_id, section_id, status, grade, created_at) = row;
    let enrollment = Enrollment {
        id,
        student_id,
        section_id,
        status: status.parse()?,
        grade: grade.map(Grade::new).transpose()?,
        created_at,
    };
    enrollment.validate()?;
    Ok(enrollment)
}

fn transcript_from_row(row: TranscriptRow) -> StoreResult<TranscriptRecord> {
    let (enrollment_id, title, level, semester, year, instructor, grade, status, created_at) = row;
    Ok(TranscriptRecord {
        enrollment_id,
        course_title: title,
        course_level: level.try_into()?,
        semester: semester.parse()?,
        year,
        instructor_name: instructor,
        grade: grade.map(Grade::new).transpose()?,
        status: status.parse()?,
        created_at,
    })
}

fn feed_from_row(row: FeedRow) -> StoreResult<EnrollmentFeedRecord> {
    let (
        enrollment_id,
        student_id,
        first_name,
        last_name,
        section_id,
        title,
        semester,
        year,
        grade,
        status,
        created_at,
    ) = row;
    Ok(EnrollmentFeedRecord {
        enrollment_id,
        student_id,
        first_name,
        last_name,
        section_id,
        course_title: title,
        semester: semester.parse()?,
        year,
        grade: grade.map(Grade::new).transpose()?,
        status: status.parse()?,
        created_at,
    })
}

fn listing_from_row(row: ListingRow) -> StoreResult<SectionListing> {
    let (section_id, title, level, semester, year, instructor, capacity, available_seats) = row;
    Ok(SectionListing {
        section_id,
        course_title: title,
        course_level: level.try_into()?,
        semester: semester.parse()?,
        year,
        instructor_name: instructor,
        capacity,
        available_seats,
    })
}

fn seats_from_row(row: SeatsRow) -> SectionSeats {
    let (section_id, capacity, available_seats, active_enrollments) = row;
    SectionSeats {
        section_id,
        capacity,
        available_seats,
        active_enrollments,
    }
}

/// Record store backed by a PostgreSQL pool
#[derive(Debug, Clone)]
pub struct PgRecordStore {
    pool: PgPool,
}

impl PgRecordStore {
    /// Create a new PgRecordStore with a database pool
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RecordStore for PgRecordStore {
    async fn health_check(&self) -> StoreResult<bool> {
        crate::db::verify_connection(&self.pool).await?;
        Ok(true)
    }

    async fn begin(&self) -> StoreResult<Box<dyn StoreTransaction>> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgStoreTransaction { tx }))
    }

    async fn get_student(&self, student_id: Uuid) -> StoreResult<Option<Student>> {
        let row: Option<(Uuid, String, String, String)> = sqlx::query_as(
            r#"
            SELECT student_id, first_name, last_name, email
            FROM students
            WHERE student_id = $1
            "#,
        )
        .bind(student_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|(id, first_name, last_name, email)| Student {
            id,
            first_name,
            last_name,
            email,
        }))
    }

    async fn transcript_records(&self, student_id: Uuid) -> StoreResult<Vec<TranscriptRecord>> {
        let rows: Vec<TranscriptRow> = sqlx::query_as(
            r#"
            SELECT
                e.enrollment_id,
                c.title,
                c.level,
                s.semester,
                s.year,
                i.name,
                e.grade,
                e.status,
                e.created_at
            FROM enrollments e
            JOIN sections s ON s.section_id = e.section_id
            JOIN courses c ON c.course_id = s.course_id
            LEFT JOIN instructors i ON i.instructor_id = s.instructor_id
            WHERE e.student_id = $1
            ORDER BY e.created_at DESC, e.enrollment_id
            "#,
        )
        .bind(student_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(transcript_from_row).collect()
    }

    async fn recent_enrollments(&self, limit: usize) -> StoreResult<Vec<EnrollmentFeedRecord>> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows: Vec<FeedRow> = sqlx::query_as(
            r#"
            SELECT
                e.enrollment_id,
                st.student_id,
                st.first_name,
                st.last_name,
                s.section_id,
                c.title,
                s.semester,
                s.year,
                e.grade,
                e.status,
                e.created_at
            FROM enrollments e
            JOIN students st ON st.student_id = e.student_id
            JOIN sections s ON s.section_id = e.section_id
            JOIN courses c ON c.course_id = s.course_id
            ORDER BY e.created_at DESC, e.enrollment_id
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(feed_from_row).collect()
    }

    async fn completed_grades(&self, student_id: Uuid) -> StoreResult<Vec<Grade>> {
        let grades: Vec<Decimal> = sqlx::query_scalar(
            r#"
            SELECT grade FROM enrollments
            WHERE student_id = $1 AND status = 'COMPLETED' AND grade IS NOT NULL
            "#,
        )
        .bind(student_id)
        .fetch_all(&self.pool)
        .await?;

        grades
            .into_iter()
            .map(|g| Grade::new(g).map_err(StoreError::from))
            .collect()
    }

    async fn available_sections(&self) -> StoreResult<Vec<SectionListing>> {
        let rows: Vec<ListingRow> = sqlx::query_as(
            r#"
            SELECT
                s.section_id,
                c.title,
                c.level,
                s.semester,
                s.year,
                i.name,
                s.capacity,
                s.available_seats
            FROM sections s
            JOIN courses c ON c.course_id = s.course_id
            LEFT JOIN instructors i ON i.instructor_id = s.instructor_id
            WHERE s.available_seats > 0
            ORDER BY s.year DESC, c.title, s.section_id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(listing_from_row).collect()
    }

    async fn section_seats(&self, section_id: Uuid) -> StoreResult<Option<SectionSeats>> {
        let row: Option<SeatsRow> = sqlx::query_as(
            r#"
            SELECT
                s.section_id,
                s.capacity,
                s.available_seats,
                COUNT(e.enrollment_id) FILTER (WHERE e.status IN ('ENROLLED', 'COMPLETED'))
            FROM sections s
            LEFT JOIN enrollments e ON e.section_id = s.section_id
            WHERE s.section_id = $1
            GROUP BY s.section_id
            "#,
        )
        .bind(section_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(seats_from_row))
    }

    async fn seat_ledger(&self) -> StoreResult<Vec<SectionSeats>> {
        let rows: Vec<SeatsRow> = sqlx::query_as(
            r#"
            SELECT
                s.section_id,
                s.capacity,
                s.available_seats,
                COUNT(e.enrollment_id) FILTER (WHERE e.status IN ('ENROLLED', 'COMPLETED'))
            FROM sections s
            LEFT JOIN enrollments e ON e.section_id = s.section_id
            GROUP BY s.section_id
            ORDER BY s.section_id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(seats_from_row).collect())
    }
}

/// Open PostgreSQL transaction (READ COMMITTED plus explicit row locks)
struct PgStoreTransaction {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl StoreTransaction for PgStoreTransaction {
    async fn student_exists(&mut self, student_id: Uuid) -> StoreResult<bool> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM students WHERE student_id = $1)")
                .bind(student_id)
                .fetch_one(&mut *self.tx)
                .await?;
        Ok(exists)
    }

    async fn lock_section(&mut self, section_id: Uuid) -> StoreResult<Option<Section>> {
        let row: Option<SectionRow> = sqlx::query_as(
            r#"
            SELECT section_id, course_id, semester, year, instructor_id, capacity, available_seats
            FROM sections
            WHERE section_id = $1
            FOR UPDATE
            "#,
        )
        .bind(section_id)
        .fetch_optional(&mut *self.tx)
        .await?;

        row.map(section_from_row).transpose()
    }

    async fn find_active_enrollment(
        &mut self,
        student_id: Uuid,
        section_id: Uuid,
    ) -> StoreResult<Option<Enrollment>> {
        let row: Option<EnrollmentRow> = sqlx::query_as(&format!(
            r#"
            SELECT {ENROLLMENT_COLUMNS}
            FROM enrollments
            WHERE student_id = $1 AND section_id = $2
              AND status IN ('ENROLLED', 'COMPLETED')
            LIMIT 1
            "#
        ))
        .bind(student_id)
        .bind(section_id)
        .fetch_optional(&mut *self.tx)
        .await?;

        row.map(enrollment_from_row).transpose()
    }

    async fn find_enrollment(&mut self, enrollment_id: Uuid) -> StoreResult<Option<Enrollment>> {
        let row: Option<EnrollmentRow> = sqlx::query_as(&format!(
            "SELECT {ENROLLMENT_COLUMNS} FROM enrollments WHERE enrollment_id = $1"
        ))
        .bind(enrollment_id)
        .fetch_optional(&mut *self.tx)
        .await?;

        row.map(enrollment_from_row).transpose()
    }

    async fn lock_enrollment(&mut self, enrollment_id: Uuid) -> StoreResult<Option<Enrollment>> {
        let row: Option<EnrollmentRow> = sqlx::query_as(&format!(
            "SELECT {ENROLLMENT_COLUMNS} FROM enrollments WHERE enrollment_id = $1 FOR UPDATE"
        ))
        .bind(enrollment_id)
        .fetch_optional(&mut *self.tx)
        .await?;

        row.map(enrollment_from_row).transpose()
    }

    async fn insert_enrollment(&mut self, enrollment: &Enrollment) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO enrollments (enrollment_id, student_id, section_id, status, grade, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(enrollment.id)
        .bind(enrollment.student_id)
        .bind(enrollment.section_id)
        .bind(enrollment.status.as_str())
        .bind(enrollment.grade.map(|g| g.value()))
        .bind(enrollment.created_at)
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    async fn update_enrollment(&mut self, enrollment: &Enrollment) -> StoreResult<()> {
        let rows_affected = sqlx::query(
            r#"
            UPDATE enrollments
            SET status = $2, grade = $3
            WHERE enrollment_id = $1
            "#,
        )
        .bind(enrollment.id)
        .bind(enrollment.status.as_str())
        .bind(enrollment.grade.map(|g| g.value()))
        .execute(&mut *self.tx)
        .await?
        .rows_affected();

        if rows_affected == 0 {
            return Err(StoreError::Conflict(format!(
                "enrollment {} vanished during update",
                enrollment.id
            )));
        }
        Ok(())
    }

    async fn take_seat(&mut self, section_id: Uuid) -> StoreResult<i32> {
        let remaining: Option<i32> = sqlx::query_scalar(
            r#"
            UPDATE sections
            SET available_seats = available_seats - 1
            WHERE section_id = $1 AND available_seats > 0
            RETURNING available_seats
            "#,
        )
        .bind(section_id)
        .fetch_optional(&mut *self.tx)
        .await?;

        remaining.ok_or_else(|| {
            StoreError::Conflict(format!("no seat left in section {}", section_id))
        })
    }

    async fn release_seat(&mut self, section_id: Uuid) -> StoreResult<i32> {
        let remaining: Option<i32> = sqlx::query_scalar(
            r#"
            UPDATE sections
            SET available_seats = available_seats + 1
            WHERE section_id = $1 AND available_seats < capacity
            RETURNING available_seats
            "#,
        )
        .bind(section_id)
        .fetch_optional(&mut *self.tx)
        .await?;

        remaining.ok_or_else(|| {
            StoreError::Corrupt(format!(
                "section {} already has every seat available",
                section_id
            ))
        })
    }

    async fn commit(self: Box<Self>) -> StoreResult<()> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> StoreResult<()> {
        self.tx.rollback().await?;
        Ok(())
    }
}
