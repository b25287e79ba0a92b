//! Transcript module
//!
//! Academic record aggregation: transcripts, GPA and the registration feed.

mod service;

pub use service::{
    grade_point_average, AcademicRecord, AcademicRecordService, EnrollmentFeedRow,
    TranscriptRow, MAX_FEED_LIMIT,
};
