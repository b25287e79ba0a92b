//! Record Store module
//!
//! Data-access contract shared by the registration engine and the
//! academic record aggregator, with a PostgreSQL implementation and an
//! in-memory implementation for tests and local tooling.

mod error;
mod memory;
mod postgres;
mod records;

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::{Enrollment, Grade, Section, Student};

pub use error::{StoreError, StoreResult};
pub use memory::MemoryRecordStore;
pub use postgres::PgRecordStore;
pub use records::{EnrollmentFeedRecord, SectionListing, SectionSeats, TranscriptRecord};

/// Durable storage for the registration tables.
///
/// Read methods observe a point-in-time snapshot and never block writers.
/// All writes go through a [`StoreTransaction`] obtained from [`begin`].
///
/// # Thread Safety
/// Implementations must be `Send + Sync`; one store is shared by every
/// request handler.
///
/// [`begin`]: RecordStore::begin
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Check if the backing store is reachable.
    async fn health_check(&self) -> StoreResult<bool>;

    /// Open a new atomic unit of work.
    async fn begin(&self) -> StoreResult<Box<dyn StoreTransaction>>;

    /// Point lookup of a student.
    async fn get_student(&self, student_id: Uuid) -> StoreResult<Option<Student>>;

    /// Every enrollment of a student joined with section, course and
    /// instructor, most recent first.
    async fn transcript_records(&self, student_id: Uuid) -> StoreResult<Vec<TranscriptRecord>>;

    /// The newest `limit` enrollments of every student, whatever their
    /// status, ordered by `created_at` descending then enrollment id.
    async fn recent_enrollments(&self, limit: usize) -> StoreResult<Vec<EnrollmentFeedRecord>>;

    /// Grades of the student's COMPLETED enrollments.
    async fn completed_grades(&self, student_id: Uuid) -> StoreResult<Vec<Grade>>;

    /// Sections with at least one open seat, newest year first.
    async fn available_sections(&self) -> StoreResult<Vec<SectionListing>>;

    /// Seat counter and live active count of one section.
    async fn section_seats(&self, section_id: Uuid) -> StoreResult<Option<SectionSeats>>;

    /// Seat counter and live active count of every section.
    async fn seat_ledger(&self) -> StoreResult<Vec<SectionSeats>>;
}

/// An open transaction against the record store.
///
/// Dropping a transaction without calling [`commit`] discards every write
/// made through it.
///
/// Seat counters are only reachable through [`take_seat`] and
/// [`release_seat`], each of which must be paired with an enrollment
/// write inside the same transaction.
///
/// [`commit`]: StoreTransaction::commit
/// [`take_seat`]: StoreTransaction::take_seat
/// [`release_seat`]: StoreTransaction::release_seat
#[async_trait]
pub trait StoreTransaction: Send {
    async fn student_exists(&mut self, student_id: Uuid) -> StoreResult<bool>;

    /// Read a section and hold its row lock until the transaction ends.
    /// Concurrent lockers of the same section wait; other sections are
    /// unaffected.
    async fn lock_section(&mut self, section_id: Uuid) -> StoreResult<Option<Section>>;

    /// The ENROLLED or COMPLETED enrollment for the pair, if any.
    async fn find_active_enrollment(
        &mut self,
        student_id: Uuid,
        section_id: Uuid,
    ) -> StoreResult<Option<Enrollment>>;

    /// Read an enrollment without locking it.
    async fn find_enrollment(&mut self, enrollment_id: Uuid) -> StoreResult<Option<Enrollment>>;

    /// Read an enrollment and hold its row lock. Callers lock the owning
    /// section first.
    async fn lock_enrollment(&mut self, enrollment_id: Uuid) -> StoreResult<Option<Enrollment>>;

    async fn insert_enrollment(&mut self, enrollment: &Enrollment) -> StoreResult<()>;

    /// Persist status and grade of an existing enrollment.
    async fn update_enrollment(&mut self, enrollment: &Enrollment) -> StoreResult<()>;

    /// Decrement `available_seats` if it is positive and return the new
    /// value. Fails with [`StoreError::Conflict`] when no seat is left.
    async fn take_seat(&mut self, section_id: Uuid) -> StoreResult<i32>;

    /// Increment `available_seats` if it is below capacity and return the
    /// new value. Fails with [`StoreError::Corrupt`] when the counter is
    /// already at capacity.
    async fn release_seat(&mut self, section_id: Uuid) -> StoreResult<i32>;

    async fn commit(self: Box<Self>) -> StoreResult<()>;

    async fn rollback(self: Box<Self>) -> StoreResult<()>;
}
