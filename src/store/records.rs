//! Joined read models returned by the record store.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::domain::{CourseLevel, EnrollmentStatus, Grade, Semester};

/// One enrollment joined with its section, course and instructor
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TranscriptRecord {
    pub enrollment_id: Uuid,
    pub course_title: String,
    pub course_level: CourseLevel,
    pub semester: Semester,
    pub year: i32,
    pub instructor_name: Option<String>,
    pub grade: Option<Grade>,
    pub status: EnrollmentStatus,
    pub created_at: DateTime<Utc>,
}

/// One enrollment of the registration feed, joined with its student,
/// section and course
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnrollmentFeedRecord {
    pub enrollment_id: Uuid,
    pub student_id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub section_id: Uuid,
    pub course_title: String,
    pub semester: Semester,
    pub year: i32,
    pub grade: Option<Grade>,
    pub status: EnrollmentStatus,
    pub created_at: DateTime<Utc>,
}

/// A section with open seats, as listed on the registration screen
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SectionListing {
    pub section_id: Uuid,
    pub course_title: String,
    pub course_level: CourseLevel,
    pub semester: Semester,
    pub year: i32,
    pub instructor_name: Option<String>,
    pub capacity: i32,
    pub available_seats: i32,
}

/// Seat counter of a section next to its live active-enrollment count
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SectionSeats {
    pub section_id: Uuid,
    pub capacity: i32,
    pub available_seats: i32,
    pub active_enrollments: i64,
}

impl SectionSeats {
    /// Counter value implied by the enrollment rows
    pub fn expected_available(&self) -> i64 {
        i64::from(self.capacity) - self.active_enrollments
    }

    pub fn is_consistent(&self) -> bool {
        i64::from(self.available_seats) == self.expected_available()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_section_seats_consistency() {
        let seats = SectionSeats {
            section_id: Uuid::new_v4(),
            capacity: 30,
            available_seats: 28,
            active_enrollments: 2,
        };
        assert!(seats.is_consistent());

        let drifted = SectionSeats {
            available_seats: 27,
            ..seats
        };
        assert!(!drifted.is_consistent());
        assert_eq!(drifted.expected_available(), 28);
    }
}
