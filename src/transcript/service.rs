//! Academic Record Service
//!
//! Read-side projections over enrollment history: transcript rows and
//! grade point average. Nothing here writes or locks.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::domain::{CourseLevel, EnrollmentStatus, Grade, Semester};
use crate::store::{
    EnrollmentFeedRecord, RecordStore, SectionListing, SectionSeats, StoreResult,
    TranscriptRecord,
};

/// Upper bound on one page of the registration feed
pub const MAX_FEED_LIMIT: usize = 500;

/// One line of a student's transcript
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TranscriptRow {
    pub enrollment_id: Uuid,
    pub course_title: String,
    pub course_level: CourseLevel,
    pub semester: Semester,
    pub year: i32,
    pub instructor_name: Option<String>,
    #[serde(with = "rust_decimal::serde::float_option")]
    pub grade: Option<Decimal>,
    pub status: EnrollmentStatus,
    pub created_at: DateTime<Utc>,
}

impl From<TranscriptRecord> for TranscriptRow {
    fn from(record: TranscriptRecord) -> Self {
        Self {
            enrollment_id: record.enrollment_id,
            course_title: record.course_title,
            course_level: record.course_level,
            semester: record.semester,
            year: record.year,
            instructor_name: record.instructor_name,
            grade: record.grade.map(|g| g.value()),
            status: record.status,
            created_at: record.created_at,
        }
    }
}

/// One line of the registration feed
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnrollmentFeedRow {
    pub enrollment_id: Uuid,
    pub student_id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub section_id: Uuid,
    pub course_title: String,
    pub semester: Semester,
    pub year: i32,
    #[serde(with = "rust_decimal::serde::float_option")]
    pub grade: Option<Decimal>,
    pub status: EnrollmentStatus,
    pub created_at: DateTime<Utc>,
}

impl From<EnrollmentFeedRecord> for EnrollmentFeedRow {
    fn from(record: EnrollmentFeedRecord) -> Self {
        Self {
            enrollment_id: record.enrollment_id,
            student_id: record.student_id,
            first_name: record.first_name,
            last_name: record.last_name,
            section_id: record.section_id,
            course_title: record.course_title,
            semester: record.semester,
            year: record.year,
            grade: record.grade.map(|g| g.value()),
            status: record.status,
            created_at: record.created_at,
        }
    }
}

/// Student header, full transcript and GPA read from one snapshot
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AcademicRecord {
    pub student_id: Uuid,
    pub student_name: String,
    pub email: String,
    #[serde(with = "rust_decimal::serde::float_option")]
    pub gpa: Option<Decimal>,
    pub completed_courses: usize,
    pub transcript: Vec<TranscriptRow>,
}

/// Arithmetic mean of the grades, or `None` when there are none.
///
/// Unweighted: every completed enrollment counts once.
pub fn grade_point_average<I>(grades: I) -> Option<Decimal>
where
    I: IntoIterator<Item = Grade>,
{
    let (sum, count) = grades
        .into_iter()
        .fold((Decimal::ZERO, 0u32), |(sum, count), grade| {
            (sum + grade.value(), count + 1)
        });

    if count == 0 {
        None
    } else {
        Some((sum / Decimal::from(count)).normalize())
    }
}

/// Academic Record Aggregator
#[derive(Clone)]
pub struct AcademicRecordService {
    store: Arc<dyn RecordStore>,
}

impl AcademicRecordService {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    /// Every enrollment of the student, whatever its status, most recent
    /// first. An unknown student or one with no enrollments yields an
    /// empty transcript.
    pub async fn build_transcript(&self, student_id: Uuid) -> StoreResult<Vec<TranscriptRow>> {
        let mut rows: Vec<TranscriptRow> = self
            .store
            .transcript_records(student_id)
            .await?
            .into_iter()
            .map(TranscriptRow::from)
            .collect();

        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        tracing::debug!(
            student_id = %student_id,
            rows = rows.len(),
            "Transcript built"
        );

        Ok(rows)
    }

    /// Mean grade over COMPLETED enrollments; `None` means no completed
    /// coursework, which is distinct from a 0.0 average.
    pub async fn compute_gpa(&self, student_id: Uuid) -> StoreResult<Option<Decimal>> {
        let grades = self.store.completed_grades(student_id).await?;
        Ok(grade_point_average(grades))
    }

    /// Student header plus transcript and a GPA derived from the same rows.
    /// Returns `None` for an unknown student.
    pub async fn academic_record(&self, student_id: Uuid) -> StoreResult<Option<AcademicRecord>> {
        let student = match self.store.get_student(student_id).await? {
            Some(student) => student,
            None => return Ok(None),
        };

        let records = self.store.transcript_records(student_id).await?;
        let completed: Vec<Grade> = records
            .iter()
            .filter(|r| r.status == EnrollmentStatus::Completed)
            .filter_map(|r| r.grade)
            .collect();
        let completed_courses = completed.len();
        let gpa = grade_point_average(completed);

        let mut transcript: Vec<TranscriptRow> =
            records.into_iter().map(TranscriptRow::from).collect();
        transcript.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        Ok(Some(AcademicRecord {
            student_id,
            student_name: student.full_name(),
            email: student.email,
            gpa,
            completed_courses,
            transcript,
        }))
    }

    /// Newest enrollments across all students, any status. `limit` is
    /// clamped to `1..=MAX_FEED_LIMIT`.
    pub async fn recent_enrollments(&self, limit: usize) -> StoreResult<Vec<EnrollmentFeedRow>> {
        let limit = limit.clamp(1, MAX_FEED_LIMIT);
        let rows = self
            .store
            .recent_enrollments(limit)
            .await?
            .into_iter()
            .map(EnrollmentFeedRow::from)
            .collect();
        Ok(rows)
    }

    /// Sections a student can still register into
    pub async fn available_sections(&self) -> StoreResult<Vec<SectionListing>> {
        self.store.available_sections().await
    }

    pub async fn section_seats(&self, section_id: Uuid) -> StoreResult<Option<SectionSeats>> {
        self.store.section_seats(section_id).await
    }
}
