//! Scheduled Jobs
//!
//! Background checks run on an interval. The seat audit compares every
//! section's `available_seats` counter with its live count of active
//! enrollments and reports drift. It never repairs anything.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::interval;
use uuid::Uuid;

use crate::store::{RecordStore, SectionSeats, StoreError};

// =========================================================================
// Seat audit
// =========================================================================

/// A section whose counter disagrees with its enrollment rows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SeatDrift {
    pub section_id: Uuid,
    pub capacity: i32,
    pub available_seats: i32,
    pub expected_available: i64,
}

impl From<SectionSeats> for SeatDrift {
    fn from(seats: SectionSeats) -> Self {
        Self {
            section_id: seats.section_id,
            capacity: seats.capacity,
            available_seats: seats.available_seats,
            expected_available: seats.expected_available(),
        }
    }
}

/// Result of one pass over the seat ledger
#[derive(Debug, Clone, Serialize)]
pub struct SeatAuditReport {
    pub sections_checked: usize,
    pub drift: Vec<SeatDrift>,
    pub completed_at: DateTime<Utc>,
}

impl SeatAuditReport {
    pub fn is_clean(&self) -> bool {
        self.drift.is_empty()
    }
}

/// Check every section's counter against its active enrollments
pub async fn audit_seat_counts(store: &dyn RecordStore) -> Result<SeatAuditReport, StoreError> {
    let ledger = store.seat_ledger().await?;
    let sections_checked = ledger.len();

    let drift: Vec<SeatDrift> = ledger
        .into_iter()
        .filter(|seats| !seats.is_consistent())
        .map(SeatDrift::from)
        .collect();

    for d in &drift {
        tracing::warn!(
            section_id = %d.section_id,
            capacity = d.capacity,
            available_seats = d.available_seats,
            expected_available = d.expected_available,
            "Seat counter drift detected"
        );
    }

    if drift.is_empty() {
        tracing::debug!(sections_checked, "Seat audit clean");
    }

    Ok(SeatAuditReport {
        sections_checked,
        drift,
        completed_at: Utc::now(),
    })
}

// =========================================================================
// Job Scheduler
// =========================================================================

/// Configuration for job scheduler
#[derive(Debug, Clone)]
pub struct JobSchedulerConfig {
    /// Interval between seat audits (default: 5 minutes)
    pub seat_audit_interval: Duration,
}

impl Default for JobSchedulerConfig {
    fn default() -> Self {
        Self {
            seat_audit_interval: Duration::from_secs(300),
        }
    }
}

/// Job Scheduler - runs periodic checks
pub struct JobScheduler {
    store: Arc<dyn RecordStore>,
    config: JobSchedulerConfig,
}

impl JobScheduler {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self {
            store,
            config: JobSchedulerConfig::default(),
        }
    }

    pub fn with_config(store: Arc<dyn RecordStore>, config: JobSchedulerConfig) -> Self {
        Self { store, config }
    }

    /// Start the job scheduler in the background
    /// Returns a handle that can be used to abort the scheduler
    pub fn start(self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            self.run().await;
        })
    }

    async fn run(&self) {
        tracing::info!(
            seat_audit_interval_secs = self.config.seat_audit_interval.as_secs(),
            "Job scheduler started"
        );

        let mut seat_audit_interval = interval(self.config.seat_audit_interval);

        loop {
            seat_audit_interval.tick().await;
            if let Err(e) = audit_seat_counts(self.store.as_ref()).await {
                tracing::error!(error = %e, "Seat audit failed");
            }
        }
    }

    /// Run all jobs once (for manual trigger or testing)
    pub async fn run_all_once(&self) -> Result<SeatAuditReport, StoreError> {
        audit_seat_counts(self.store.as_ref()).await
    }
}
