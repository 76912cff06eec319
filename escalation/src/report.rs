//! Run reports: the structured outcome of one engine cycle.
//!
//! Returned to the scheduler, never persisted. Nothing escapes the engine
//! boundary as an error; a cycle that cannot even fetch its candidate set
//! comes back as a failure envelope (`success: false`) so the scheduler
//! can log it and retry on its own next tick.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// What was done for one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Reminder,
    FinalToAccountable,
}

impl std::fmt::Display for ActionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Reminder => write!(f, "reminder"),
            Self::FinalToAccountable => write!(f, "final_to_accountable"),
        }
    }
}

/// One escalation action taken during a cycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionRecord {
    pub request_id: String,
    #[serde(rename = "type")]
    pub kind: ActionKind,
    /// Ladder rung for reminders; absent on final notices.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tier: Option<u32>,
    /// Addresses a dispatch was attempted for, successful or not.
    pub recipients: Vec<String>,
}

/// One per-candidate failure. The cycle continues past these.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunError {
    pub request_id: String,
    pub error: String,
}

/// Aggregate outcome of one `run_cycle`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub cycle_id: Uuid,
    pub success: bool,
    /// Set only when the candidate set itself could not be fetched.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fatal_error: Option<String>,
    /// Candidates scanned this cycle.
    pub processed: usize,
    pub actions: Vec<ActionRecord>,
    pub errors: Vec<RunError>,
    /// Reminder candidates left untouched because no intermediary was on
    /// file. A gap, not an error; they come around again next cycle.
    pub skipped_no_recipient: usize,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
}

impl RunReport {
    /// Fresh report for a cycle starting at `started_at`.
    pub fn started(started_at: DateTime<Utc>) -> Self {
        Self {
            cycle_id: Uuid::new_v4(),
            success: true,
            fatal_error: None,
            processed: 0,
            actions: Vec::new(),
            errors: Vec::new(),
            skipped_no_recipient: 0,
            started_at,
            duration_ms: 0,
        }
    }

    /// Failure envelope for a cycle that could not fetch its candidates.
    pub fn fatal(started_at: DateTime<Utc>, error: impl Into<String>) -> Self {
        let mut report = Self::started(started_at);
        report.success = false;
        report.fatal_error = Some(error.into());
        report
    }

    /// One-line summary for logging.
    pub fn summary(&self) -> String {
        format!(
            "cycle={} success={} processed={} actions={} errors={} skipped={} duration_ms={}",
            self.cycle_id,
            self.success,
            self.processed,
            self.actions.len(),
            self.errors.len(),
            self.skipped_no_recipient,
            self.duration_ms,
        )
    }
}
