//! In-memory Record Store
//!
//! Stores every table in `HashMap`s behind a single `RwLock` and stands in
//! for the section row lock with one async mutex per section. Writes made
//! inside a transaction are buffered and applied together on commit, so a
//! dropped transaction leaves no trace.
//!
//! Used by the test suite and the load test binary.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use uuid::Uuid;

use crate::domain::{
    Course, Enrollment, EnrollmentStatus, Grade, Instructor, Section, Student,
};

use super::{
    EnrollmentFeedRecord, RecordStore, SectionListing, SectionSeats, StoreError, StoreResult,
    StoreTransaction, TranscriptRecord,
};

#[derive(Default)]
struct Tables {
    students: HashMap<Uuid, Student>,
    instructors: HashMap<Uuid, Instructor>,
    courses: HashMap<Uuid, Course>,
    sections: HashMap<Uuid, Section>,
    enrollments: HashMap<Uuid, Enrollment>,
}

impl Tables {
    fn active_count(&self, section_id: Uuid) -> i64 {
        self.enrollments
            .values()
            .filter(|e| e.section_id == section_id && e.is_active())
            .count() as i64
    }

    fn seats(&self, section: &Section) -> SectionSeats {
        SectionSeats {
            section_id: section.id,
            capacity: section.capacity,
            available_seats: section.available_seats,
            active_enrollments: self.active_count(section.id),
        }
    }

    fn instructor_name(&self, section: &Section) -> Option<String> {
        section
            .instructor_id
            .and_then(|id| self.instructors.get(&id))
            .map(|i| i.name.clone())
    }
}

struct Inner {
    tables: RwLock<Tables>,
    section_locks: Mutex<HashMap<Uuid, Arc<AsyncMutex<()>>>>,
    healthy: AtomicBool,
    forced_conflicts: AtomicUsize,
}

/// In-memory record store.
///
/// Cloning is cheap and every clone shares the same tables.
#[derive(Clone)]
pub struct MemoryRecordStore {
    inner: Arc<Inner>,
}

impl Default for MemoryRecordStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryRecordStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                tables: RwLock::new(Tables::default()),
                section_locks: Mutex::new(HashMap::new()),
                healthy: AtomicBool::new(true),
                forced_conflicts: AtomicUsize::new(0),
            }),
        }
    }

    fn read(&self) -> StoreResult<RwLockReadGuard<'_, Tables>> {
        read_tables(&self.inner)
    }

    fn write(&self) -> StoreResult<RwLockWriteGuard<'_, Tables>> {
        write_tables(&self.inner)
    }

    fn ensure_healthy(&self) -> StoreResult<()> {
        if self.inner.healthy.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StoreError::Unavailable("memory store marked unhealthy".to_string()))
        }
    }

    // ==================== Fixture loading ====================

    pub fn insert_student(&self, student: Student) -> StoreResult<Uuid> {
        let id = student.id;
        self.write()?.students.insert(id, student);
        Ok(id)
    }

    pub fn insert_instructor(&self, instructor: Instructor) -> StoreResult<Uuid> {
        let id = instructor.id;
        self.write()?.instructors.insert(id, instructor);
        Ok(id)
    }

    pub fn insert_course(&self, course: Course) -> StoreResult<Uuid> {
        let id = course.id;
        self.write()?.courses.insert(id, course);
        Ok(id)
    }

    /// Add a section. Its counter must agree with the enrollments already
    /// stored for it (none, for a new section).
    pub fn insert_section(&self, section: Section) -> StoreResult<Uuid> {
        section.validate()?;
        let mut tables = self.write()?;
        if !tables.courses.contains_key(&section.course_id) {
            return Err(StoreError::Corrupt(format!(
                "section {} references unknown course {}",
                section.id, section.course_id
            )));
        }
        let seats = tables.seats(&section);
        if !seats.is_consistent() {
            return Err(StoreError::Corrupt(format!(
                "section {} counter {} disagrees with {} active enrollments",
                section.id, section.available_seats, seats.active_enrollments
            )));
        }
        let id = section.id;
        tables.sections.insert(id, section);
        Ok(id)
    }

    /// Load a historical enrollment in any status. Active enrollments take
    /// a seat from their section exactly as a registration would; loading
    /// one into a full section is a fixture error, not a lost race.
    pub fn insert_enrollment(&self, enrollment: Enrollment) -> StoreResult<Uuid> {
        enrollment.validate()?;
        let mut tables = self.write()?;
        if !tables.students.contains_key(&enrollment.student_id) {
            return Err(StoreError::Corrupt(format!(
                "enrollment {} references unknown student {}",
                enrollment.id, enrollment.student_id
            )));
        }
        if enrollment.is_active() && has_active_duplicate(&tables, &enrollment) {
            return Err(StoreError::UniqueViolation(
                "enrollments_active_student_section".to_string(),
            ));
        }
        let section = tables
            .sections
            .get_mut(&enrollment.section_id)
            .ok_or_else(|| {
                StoreError::Corrupt(format!(
                    "enrollment {} references unknown section {}",
                    enrollment.id, enrollment.section_id
                ))
            })?;
        if enrollment.is_active() {
            section
                .adjust_seats(-1)
                .map_err(|_| {
                    StoreError::Corrupt(format!("fixture overfills section {}", section.id))
                })?;
        }
        let id = enrollment.id;
        tables.enrollments.insert(id, enrollment);
        Ok(id)
    }

    // ==================== Inspection ====================

    pub fn section(&self, section_id: Uuid) -> StoreResult<Option<Section>> {
        Ok(self.read()?.sections.get(&section_id).cloned())
    }

    pub fn enrollment(&self, enrollment_id: Uuid) -> StoreResult<Option<Enrollment>> {
        Ok(self.read()?.enrollments.get(&enrollment_id).cloned())
    }

    pub fn active_enrollment_count(&self, section_id: Uuid) -> StoreResult<i64> {
        Ok(self.read()?.active_count(section_id))
    }

    // ==================== Fault injection ====================

    /// Toggle reachability; an unhealthy store fails every call with
    /// [`StoreError::Unavailable`].
    pub fn set_healthy(&self, healthy: bool) {
        self.inner.healthy.store(healthy, Ordering::SeqCst);
    }

    /// Make the next `count` seat decrements fail with
    /// [`StoreError::Conflict`] as if another transaction had won the row.
    pub fn force_seat_conflicts(&self, count: usize) {
        self.inner.forced_conflicts.store(count, Ordering::SeqCst);
    }

    fn section_lock(&self, section_id: Uuid) -> StoreResult<Arc<AsyncMutex<()>>> {
        let mut locks = self
            .inner
            .section_locks
            .lock()
            .map_err(|_| StoreError::Unavailable("section lock table poisoned".to_string()))?;
        Ok(locks
            .entry(section_id)
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone())
    }
}

fn read_tables(inner: &Inner) -> StoreResult<RwLockReadGuard<'_, Tables>> {
    inner
        .tables
        .read()
        .map_err(|_| StoreError::Unavailable("memory tables poisoned".to_string()))
}

fn write_tables(inner: &Inner) -> StoreResult<RwLockWriteGuard<'_, Tables>> {
    inner
        .tables
        .write()
        .map_err(|_| StoreError::Unavailable("memory tables poisoned".to_string()))
}

fn has_active_duplicate(tables: &Tables, enrollment: &Enrollment) -> bool {
    tables.enrollments.values().any(|e| {
        e.id != enrollment.id
            && e.student_id == enrollment.student_id
            && e.section_id == enrollment.section_id
            && e.is_active()
    })
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn health_check(&self) -> StoreResult<bool> {
        Ok(self.inner.healthy.load(Ordering::SeqCst))
    }

    async fn begin(&self) -> StoreResult<Box<dyn StoreTransaction>> {
        self.ensure_healthy()?;
        Ok(Box::new(MemoryTransaction {
            store: self.clone(),
            guards: HashMap::new(),
            writes: HashMap::new(),
            write_order: Vec::new(),
            inserted: HashSet::new(),
            seat_deltas: HashMap::new(),
        }))
    }

    async fn get_student(&self, student_id: Uuid) -> StoreResult<Option<Student>> {
        self.ensure_healthy()?;
        Ok(self.read()?.students.get(&student_id).cloned())
    }

    async fn transcript_records(&self, student_id: Uuid) -> StoreResult<Vec<TranscriptRecord>> {
        self.ensure_healthy()?;
        let tables = self.read()?;

        let mut records = tables
            .enrollments
            .values()
            .filter(|e| e.student_id == student_id)
            .map(|e| {
                let section = tables.sections.get(&e.section_id).ok_or_else(|| {
                    StoreError::Corrupt(format!("enrollment {} has no section", e.id))
                })?;
                let course = tables.courses.get(&section.course_id).ok_or_else(|| {
                    StoreError::Corrupt(format!("section {} has no course", section.id))
                })?;
                Ok(TranscriptRecord {
                    enrollment_id: e.id,
                    course_title: course.title.clone(),
                    course_level: course.level,
                    semester: section.semester,
                    year: section.year,
                    instructor_name: tables.instructor_name(section),
                    grade: e.grade,
                    status: e.status,
                    created_at: e.created_at,
                })
            })
            .collect::<StoreResult<Vec<_>>>()?;

        records.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| a.enrollment_id.cmp(&b.enrollment_id))
        });
        Ok(records)
    }

    async fn recent_enrollments(&self, limit: usize) -> StoreResult<Vec<EnrollmentFeedRecord>> {
        self.ensure_healthy()?;
        let tables = self.read()?;

        let mut enrollments: Vec<&Enrollment> = tables.enrollments.values().collect();
        enrollments.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| a.id.cmp(&b.id))
        });

        enrollments
            .into_iter()
            .take(limit)
            .map(|e| {
                let student = tables.students.get(&e.student_id).ok_or_else(|| {
                    StoreError::Corrupt(format!("enrollment {} has no student", e.id))
                })?;
                let section = tables.sections.get(&e.section_id).ok_or_else(|| {
                    StoreError::Corrupt(format!("enrollment {} has no section", e.id))
                })?;
                let course = tables.courses.get(&section.course_id).ok_or_else(|| {
                    StoreError::Corrupt(format!("section {} has no course", section.id))
                })?;
                Ok(EnrollmentFeedRecord {
                    enrollment_id: e.id,
                    student_id: student.id,
                    first_name: student.first_name.clone(),
                    last_name: student.last_name.clone(),
                    section_id: section.id,
                    course_title: course.title.clone(),
                    semester: section.semester,
                    year: section.year,
                    grade: e.grade,
                    status: e.status,
                    created_at: e.created_at,
                })
            })
            .collect()
    }

    async fn completed_grades(&self, student_id: Uuid) -> StoreResult<Vec<Grade>> {
        self.ensure_healthy()?;
        Ok(self
            .read()?
            .enrollments
            .values()
            .filter(|e| e.student_id == student_id && e.status == EnrollmentStatus::Completed)
            .filter_map(|e| e.grade)
            .collect())
    }

    async fn available_sections(&self) -> StoreResult<Vec<SectionListing>> {
        self.ensure_healthy()?;
        let tables = self.read()?;

        let mut listings = tables
            .sections
            .values()
            .filter(|s| s.has_open_seat())
            .map(|s| {
                let course = tables.courses.get(&s.course_id).ok_or_else(|| {
                    StoreError::Corrupt(format!("section {} has no course", s.id))
                })?;
                Ok(SectionListing {
                    section_id: s.id,
                    course_title: course.title.clone(),
                    course_level: course.level,
                    semester: s.semester,
                    year: s.year,
                    instructor_name: tables.instructor_name(s),
                    capacity: s.capacity,
                    available_seats: s.available_seats,
                })
            })
            .collect::<StoreResult<Vec<_>>>()?;

        listings.sort_by(|a, b| {
            b.year
                .cmp(&a.year)
                .then_with(|| a.course_title.cmp(&b.course_title))
                .then_with(|| a.section_id.cmp(&b.section_id))
        });
        Ok(listings)
    }

    async fn section_seats(&self, section_id: Uuid) -> StoreResult<Option<SectionSeats>> {
        self.ensure_healthy()?;
        let tables = self.read()?;
        Ok(tables.sections.get(&section_id).map(|s| tables.seats(s)))
    }

    async fn seat_ledger(&self) -> StoreResult<Vec<SectionSeats>> {
        self.ensure_healthy()?;
        let tables = self.read()?;
        let mut ledger: Vec<SectionSeats> =
            tables.sections.values().map(|s| tables.seats(s)).collect();
        ledger.sort_by_key(|s| s.section_id);
        Ok(ledger)
    }
}

/// Buffered unit of work over [`MemoryRecordStore`]
struct MemoryTransaction {
    store: MemoryRecordStore,
    guards: HashMap<Uuid, OwnedMutexGuard<()>>,
    writes: HashMap<Uuid, Enrollment>,
    write_order: Vec<Uuid>,
    inserted: HashSet<Uuid>,
    seat_deltas: HashMap<Uuid, i32>,
}

impl MemoryTransaction {
    /// Committed row overlaid with this transaction's buffered writes
    fn enrollment_view(&self, tables: &Tables, enrollment_id: Uuid) -> Option<Enrollment> {
        self.writes
            .get(&enrollment_id)
            .or_else(|| tables.enrollments.get(&enrollment_id))
            .cloned()
    }

    fn section_view(&self, tables: &Tables, section_id: Uuid) -> Option<Section> {
        tables.sections.get(&section_id).map(|s| {
            let mut section = s.clone();
            section.available_seats += self.seat_deltas.get(&section_id).copied().unwrap_or(0);
            section
        })
    }

    fn buffer_write(&mut self, enrollment: &Enrollment) {
        if self.writes.insert(enrollment.id, enrollment.clone()).is_none() {
            self.write_order.push(enrollment.id);
        }
    }

    async fn acquire(&mut self, section_id: Uuid) -> StoreResult<()> {
        if self.guards.contains_key(&section_id) {
            return Ok(());
        }
        let lock = self.store.section_lock(section_id)?;
        let guard = lock.lock_owned().await;
        self.guards.insert(section_id, guard);
        Ok(())
    }

    fn require_lock(&self, section_id: Uuid) -> StoreResult<()> {
        if self.guards.contains_key(&section_id) {
            Ok(())
        } else {
            Err(StoreError::Conflict(format!(
                "section {} modified without holding its lock",
                section_id
            )))
        }
    }
}

#[async_trait]
impl StoreTransaction for MemoryTransaction {
    async fn student_exists(&mut self, student_id: Uuid) -> StoreResult<bool> {
        self.store.ensure_healthy()?;
        Ok(self.store.read()?.students.contains_key(&student_id))
    }

    async fn lock_section(&mut self, section_id: Uuid) -> StoreResult<Option<Section>> {
        self.store.ensure_healthy()?;
        if !self.store.read()?.sections.contains_key(&section_id) {
            return Ok(None);
        }
        self.acquire(section_id).await?;
        let tables = self.store.read()?;
        Ok(self.section_view(&tables, section_id))
    }

    async fn find_active_enrollment(
        &mut self,
        student_id: Uuid,
        section_id: Uuid,
    ) -> StoreResult<Option<Enrollment>> {
        self.store.ensure_healthy()?;
        let tables = self.store.read()?;
        let candidates = tables
            .enrollments
            .keys()
            .chain(self.write_order.iter())
            .copied()
            .collect::<HashSet<_>>();

        Ok(candidates
            .into_iter()
            .filter_map(|id| self.enrollment_view(&tables, id))
            .find(|e| e.student_id == student_id && e.section_id == section_id && e.is_active()))
    }

    async fn find_enrollment(&mut self, enrollment_id: Uuid) -> StoreResult<Option<Enrollment>> {
        self.store.ensure_healthy()?;
        let tables = self.store.read()?;
        Ok(self.enrollment_view(&tables, enrollment_id))
    }

    async fn lock_enrollment(&mut self, enrollment_id: Uuid) -> StoreResult<Option<Enrollment>> {
        // Enrollment rows only change under their section's lock.
        let enrollment = self.find_enrollment(enrollment_id).await?;
        if let Some(ref e) = enrollment {
            self.require_lock(e.section_id)?;
        }
        Ok(enrollment)
    }

    async fn insert_enrollment(&mut self, enrollment: &Enrollment) -> StoreResult<()> {
        self.store.ensure_healthy()?;
        self.require_lock(enrollment.section_id)?;
        enrollment.validate()?;
        if self.find_active_enrollment(enrollment.student_id, enrollment.section_id)
            .await?
            .is_some()
            && enrollment.is_active()
        {
            return Err(StoreError::UniqueViolation(
                "enrollments_active_student_section".to_string(),
            ));
        }
        self.inserted.insert(enrollment.id);
        self.buffer_write(enrollment);
        Ok(())
    }

    async fn update_enrollment(&mut self, enrollment: &Enrollment) -> StoreResult<()> {
        self.store.ensure_healthy()?;
        self.require_lock(enrollment.section_id)?;
        enrollment.validate()?;
        let exists = {
            let tables = self.store.read()?;
            self.enrollment_view(&tables, enrollment.id).is_some()
        };
        if !exists {
            return Err(StoreError::Conflict(format!(
                "enrollment {} vanished during update",
                enrollment.id
            )));
        }
        self.buffer_write(enrollment);
        Ok(())
    }

    async fn take_seat(&mut self, section_id: Uuid) -> StoreResult<i32> {
        self.store.ensure_healthy()?;
        self.require_lock(section_id)?;

        let forced = self
            .store
            .inner
            .forced_conflicts
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if forced {
            return Err(StoreError::Conflict(format!(
                "injected conflict on section {}",
                section_id
            )));
        }

        let tables = self.store.read()?;
        let mut section = self
            .section_view(&tables, section_id)
            .ok_or_else(|| StoreError::Conflict(format!("section {} vanished", section_id)))?;
        drop(tables);

        let remaining = section
            .adjust_seats(-1)
            .map_err(|_| StoreError::Conflict(format!("no seat left in section {}", section_id)))?;
        *self.seat_deltas.entry(section_id).or_insert(0) -= 1;
        Ok(remaining)
    }

    async fn release_seat(&mut self, section_id: Uuid) -> StoreResult<i32> {
        self.store.ensure_healthy()?;
        self.require_lock(section_id)?;

        let tables = self.store.read()?;
        let mut section = self
            .section_view(&tables, section_id)
            .ok_or_else(|| StoreError::Conflict(format!("section {} vanished", section_id)))?;
        drop(tables);

        let remaining = section.adjust_seats(1)?;
        *self.seat_deltas.entry(section_id).or_insert(0) += 1;
        Ok(remaining)
    }

    async fn commit(self: Box<Self>) -> StoreResult<()> {
        self.store.ensure_healthy()?;
        let MemoryTransaction {
            store,
            guards,
            mut writes,
            write_order,
            inserted,
            seat_deltas,
        } = *self;

        {
            let mut tables = write_tables(&store.inner)?;

            // Validate everything before touching a row.
            let mut sections = Vec::with_capacity(seat_deltas.len());
            for (section_id, delta) in &seat_deltas {
                let mut section = tables.sections.get(section_id).cloned().ok_or_else(|| {
                    StoreError::Conflict(format!("section {} vanished", section_id))
                })?;
                section.adjust_seats(*delta)?;
                sections.push(section);
            }
            for id in &inserted {
                if tables.enrollments.contains_key(id) {
                    return Err(StoreError::UniqueViolation("enrollments_pkey".to_string()));
                }
            }

            for section in sections {
                tables.sections.insert(section.id, section);
            }
            for id in write_order {
                if let Some(enrollment) = writes.remove(&id) {
                    tables.enrollments.insert(id, enrollment);
                }
            }
        }

        drop(guards);
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> StoreResult<()> {
        Ok(())
    }
}
