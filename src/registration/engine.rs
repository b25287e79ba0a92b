//! Registration Engine
//!
//! Enrolls students into capacity-limited sections and applies the
//! DROPPED / COMPLETED transitions, keeping every section's
//! `available_seats` equal to `capacity - count(active enrollments)`.
//!
//! Every mutation locks the section row first, so all changes to one
//! section are serialized while other sections proceed in parallel.

use rand::Rng;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::domain::{Enrollment, EnrollmentStatus, Grade};
use crate::store::{RecordStore, StoreError, StoreTransaction};

use super::{
    CompleteEnrollmentCommand, DropEnrollmentCommand, Outcome, RegisterStudentCommand,
    RegistrationError,
};

/// Bounded retry of transactions that lost a race
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub max_attempts: u32,
    /// Base delay, multiplied by the attempt number
    pub backoff: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, backoff: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff,
        }
    }

    /// Linear backoff with up to one base delay of jitter
    fn delay_for(&self, attempt: u32) -> Duration {
        let base = u64::try_from(self.backoff.as_millis()).unwrap_or(u64::MAX);
        let jitter = rand::thread_rng().gen_range(0..=base);
        Duration::from_millis(base.saturating_mul(u64::from(attempt)).saturating_add(jitter))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_millis(50))
    }
}

/// Abort the transaction and report a business-rule rejection
async fn reject<T>(
    tx: Box<dyn StoreTransaction>,
    err: RegistrationError,
) -> Result<Outcome<T>, StoreError> {
    tx.rollback().await?;
    Ok(Outcome::Rejected(err))
}

/// Registration Engine
#[derive(Clone)]
pub struct RegistrationEngine {
    store: Arc<dyn RecordStore>,
    retry: RetryPolicy,
}

impl RegistrationEngine {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self {
            store,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    // =========================================================================
    // RegisterStudent
    // =========================================================================

    /// Enroll a student into a section.
    ///
    /// Checks, in order: student exists, section exists, no active
    /// enrollment for the pair, a seat is open. On success the ENROLLED row
    /// and the seat decrement commit together. Lost races are retried; once
    /// the retry budget is spent the caller sees `SectionFull`.
    pub async fn register_student(
        &self,
        command: RegisterStudentCommand,
    ) -> Result<Outcome<Enrollment>, StoreError> {
        let result = self
            .retry_on_conflict("register_student", move || self.try_register(command))
            .await;

        match result {
            Ok(Outcome::Accepted(enrollment)) => {
                tracing::info!(
                    enrollment_id = %enrollment.id,
                    student_id = %command.student_id,
                    section_id = %command.section_id,
                    "Student registered"
                );
                Ok(Outcome::Accepted(enrollment))
            }
            Ok(Outcome::Rejected(err)) => {
                tracing::debug!(
                    student_id = %command.student_id,
                    section_id = %command.section_id,
                    reason = err.error_code(),
                    "Registration rejected"
                );
                Ok(Outcome::Rejected(err))
            }
            Err(StoreError::Conflict(reason)) => {
                tracing::warn!(
                    student_id = %command.student_id,
                    section_id = %command.section_id,
                    %reason,
                    "Registration conflicts exhausted retries, reporting section full"
                );
                Ok(Outcome::Rejected(RegistrationError::SectionFull(
                    command.section_id,
                )))
            }
            Err(e) => {
                tracing::error!(
                    student_id = %command.student_id,
                    section_id = %command.section_id,
                    error = %e,
                    "Registration failed"
                );
                Err(e)
            }
        }
    }

    async fn try_register(
        &self,
        command: RegisterStudentCommand,
    ) -> Result<Outcome<Enrollment>, StoreError> {
        let RegisterStudentCommand {
            student_id,
            section_id,
        } = command;

        let mut tx = self.store.begin().await?;

        if !tx.student_exists(student_id).await? {
            return reject(tx, RegistrationError::StudentNotFound(student_id)).await;
        }

        let section = match tx.lock_section(section_id).await? {
            Some(section) => section,
            None => return reject(tx, RegistrationError::SectionNotFound(section_id)).await,
        };

        if tx
            .find_active_enrollment(student_id, section_id)
            .await?
            .is_some()
        {
            return reject(
                tx,
                RegistrationError::DuplicateEnrollment {
                    student_id,
                    section_id,
                },
            )
            .await;
        }

        if !section.has_open_seat() {
            return reject(tx, RegistrationError::SectionFull(section_id)).await;
        }

        let enrollment = Enrollment::enrolled(student_id, section_id);
        match tx.insert_enrollment(&enrollment).await {
            Ok(()) => {}
            // The transaction is aborted; dropping it rolls back.
            Err(StoreError::UniqueViolation(_)) => {
                return Ok(Outcome::Rejected(RegistrationError::DuplicateEnrollment {
                    student_id,
                    section_id,
                }));
            }
            Err(e) => return Err(e),
        }

        let remaining = tx.take_seat(section_id).await?;
        tx.commit().await?;

        tracing::debug!(
            section_id = %section_id,
            available_seats = remaining,
            "Seat taken"
        );

        Ok(Outcome::Accepted(enrollment))
    }

    // =========================================================================
    // DropEnrollment
    // =========================================================================

    /// Drop an ENROLLED or COMPLETED enrollment, clearing its grade and
    /// returning its seat to the section in the same transaction.
    pub async fn drop_enrollment(
        &self,
        command: DropEnrollmentCommand,
    ) -> Result<Outcome<Enrollment>, StoreError> {
        let outcome = self
            .retry_on_conflict("drop_enrollment", move || self.try_drop(command))
            .await?;

        if let Outcome::Accepted(ref enrollment) = outcome {
            tracing::info!(
                enrollment_id = %enrollment.id,
                section_id = %enrollment.section_id,
                "Enrollment dropped"
            );
        }
        Ok(outcome)
    }

    async fn try_drop(
        &self,
        command: DropEnrollmentCommand,
    ) -> Result<Outcome<Enrollment>, StoreError> {
        let enrollment_id = command.enrollment_id;
        let mut tx = self.store.begin().await?;

        let mut enrollment = match self.lock_for_transition(&mut *tx, enrollment_id).await? {
            Some(enrollment) => enrollment,
            None => return reject(tx, RegistrationError::EnrollmentNotFound(enrollment_id)).await,
        };

        if !enrollment.is_active() {
            let status = enrollment.status;
            return reject(
                tx,
                RegistrationError::EnrollmentNotActive {
                    enrollment_id,
                    status,
                },
            )
            .await;
        }

        enrollment.status = EnrollmentStatus::Dropped;
        enrollment.grade = None;
        tx.update_enrollment(&enrollment).await?;
        let remaining = tx.release_seat(enrollment.section_id).await?;
        tx.commit().await?;

        tracing::debug!(
            section_id = %enrollment.section_id,
            available_seats = remaining,
            "Seat released"
        );

        Ok(Outcome::Accepted(enrollment))
    }

    // =========================================================================
    // CompleteEnrollment
    // =========================================================================

    /// Record a grade and mark the enrollment COMPLETED. A completed
    /// enrollment may be re-graded; a dropped one may not. The seat stays
    /// taken.
    pub async fn complete_enrollment(
        &self,
        command: CompleteEnrollmentCommand,
    ) -> Result<Outcome<Enrollment>, StoreError> {
        let grade = match Grade::new(command.grade) {
            Ok(grade) => grade,
            Err(e) => {
                return Ok(Outcome::Rejected(RegistrationError::InvalidGrade(
                    e.to_string(),
                )))
            }
        };

        let outcome = self
            .retry_on_conflict("complete_enrollment", move || {
                self.try_complete(command.enrollment_id, grade)
            })
            .await?;

        if let Outcome::Accepted(ref enrollment) = outcome {
            tracing::info!(
                enrollment_id = %enrollment.id,
                grade = %grade,
                "Enrollment completed"
            );
        }
        Ok(outcome)
    }

    async fn try_complete(
        &self,
        enrollment_id: Uuid,
        grade: Grade,
    ) -> Result<Outcome<Enrollment>, StoreError> {
        let mut tx = self.store.begin().await?;

        let mut enrollment = match self.lock_for_transition(&mut *tx, enrollment_id).await? {
            Some(enrollment) => enrollment,
            None => return reject(tx, RegistrationError::EnrollmentNotFound(enrollment_id)).await,
        };

        if enrollment.status == EnrollmentStatus::Dropped {
            return reject(
                tx,
                RegistrationError::EnrollmentNotActive {
                    enrollment_id,
                    status: enrollment.status,
                },
            )
            .await;
        }

        enrollment.status = EnrollmentStatus::Completed;
        enrollment.grade = Some(grade);
        tx.update_enrollment(&enrollment).await?;
        tx.commit().await?;

        Ok(Outcome::Accepted(enrollment))
    }

    /// Lock the owning section, then the enrollment itself
    async fn lock_for_transition(
        &self,
        tx: &mut dyn StoreTransaction,
        enrollment_id: Uuid,
    ) -> Result<Option<Enrollment>, StoreError> {
        let section_id = match tx.find_enrollment(enrollment_id).await? {
            Some(enrollment) => enrollment.section_id,
            None => return Ok(None),
        };

        if tx.lock_section(section_id).await?.is_none() {
            return Err(StoreError::Corrupt(format!(
                "enrollment {} references missing section {}",
                enrollment_id, section_id
            )));
        }

        tx.lock_enrollment(enrollment_id).await
    }

    // =========================================================================
    // Retry
    // =========================================================================

    async fn retry_on_conflict<T, F, Fut>(
        &self,
        operation: &str,
        mut attempt_fn: F,
    ) -> Result<T, StoreError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, StoreError>>,
    {
        let max_attempts = self.retry.max_attempts;
        let mut attempt = 1;

        loop {
            match attempt_fn().await {
                Err(e) if e.is_retryable() && attempt < max_attempts => {
                    tracing::warn!(
                        operation,
                        attempt,
                        max_attempts,
                        error = %e,
                        "Transaction conflict, retrying"
                    );
                    tokio::time::sleep(self.retry.delay_for(attempt)).await;
                    attempt += 1;
                }
                result => return result,
            }
        }
    }
}
