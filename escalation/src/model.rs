//! Core records: service requests and the directory data resolved for them.
//!
//! The engine mutates exactly two fields on a [`ServiceRequest`]
//! (`escalation_count`, `last_escalation_at`) plus the append-only `notes`
//! log; everything else is owned by the surrounding system.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle states of a service request.
///
/// Only `AwaitingResponsibleParty` is in scope for escalation. The engine
/// never transitions a request out of it; that is done by a human operator
/// in the surrounding system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    /// Tenant reported, awaiting action by the responsible party.
    AwaitingResponsibleParty,
    /// Someone has picked the request up.
    InProgress,
    /// Work done, pending confirmation.
    Resolved,
    /// Fully closed.
    Closed,
}

impl std::fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AwaitingResponsibleParty => write!(f, "awaiting_responsible_party"),
            Self::InProgress => write!(f, "in_progress"),
            Self::Resolved => write!(f, "resolved"),
            Self::Closed => write!(f, "closed"),
        }
    }
}

/// A tenant-reported service request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceRequest {
    /// Opaque identifier.
    pub id: String,
    pub status: RequestStatus,
    /// Set at creation, immutable afterwards.
    pub created_at: DateTime<Utc>,
    /// Reminder notices sent to the intermediary so far. Starts at 0 and
    /// never decreases; frozen once the ladder is exhausted.
    #[serde(default)]
    pub escalation_count: u32,
    /// When the most recent escalation notice (reminder or final) went out.
    #[serde(default)]
    pub last_escalation_at: Option<DateTime<Utc>>,
    /// Opaque foreign key into the directory; never changed by the engine.
    pub requester_ref: String,
    pub building_ref: String,
    pub unit_ref: String,
    /// Append-only log. The engine appends one line per final notice.
    #[serde(default)]
    pub notes: Vec<String>,
}

impl ServiceRequest {
    /// The instant the escalation interval is measured from: the last
    /// notice, or creation when no notice has gone out yet.
    pub fn reference_time(&self) -> DateTime<Utc> {
        self.last_escalation_at.unwrap_or(self.created_at)
    }

    /// Whole days the request has been open, truncated.
    pub fn days_open(&self, now: DateTime<Utc>) -> i64 {
        (now - self.created_at).num_days()
    }
}

/// A resolvable party with a delivery address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contact {
    pub name: String,
    pub address: String,
}

/// Labels used only in message content, never in policy decisions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectoryDisplay {
    pub building_name: String,
    pub unit_label: String,
    pub requester_name: String,
}

/// Directory data for one request's escalation parties.
///
/// Either contact may be absent; the engine treats a missing intermediary
/// as a non-fatal gap and a missing accountable party as an error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectoryRecord {
    pub intermediary_contact: Option<Contact>,
    pub accountable_contact: Option<Contact>,
    pub display: DirectoryDisplay,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn request_at(created: DateTime<Utc>) -> ServiceRequest {
        ServiceRequest {
            id: "req-1".to_string(),
            status: RequestStatus::AwaitingResponsibleParty,
            created_at: created,
            escalation_count: 0,
            last_escalation_at: None,
            requester_ref: "t-100".to_string(),
            building_ref: "b-1".to_string(),
            unit_ref: "u-12".to_string(),
            notes: Vec::new(),
        }
    }

    #[test]
    fn test_reference_time_prefers_last_escalation() {
        let created = Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap();
        let escalated = Utc.with_ymd_and_hms(2026, 3, 4, 9, 0, 0).unwrap();

        let mut req = request_at(created);
        assert_eq!(req.reference_time(), created);

        req.last_escalation_at = Some(escalated);
        assert_eq!(req.reference_time(), escalated);
    }

    #[test]
    fn test_status_serde_snake_case() {
        let json = serde_json::to_string(&RequestStatus::AwaitingResponsibleParty).unwrap();
        assert_eq!(json, "\"awaiting_responsible_party\"");

        let parsed: RequestStatus = serde_json::from_str("\"in_progress\"").unwrap();
        assert_eq!(parsed, RequestStatus::InProgress);
    }

    #[test]
    fn test_request_deserializes_without_escalation_fields() {
        // Records created before any escalation ran carry neither counter.
        let json = r#"{
            "id": "req-7",
            "status": "awaiting_responsible_party",
            "created_at": "2026-03-01T09:00:00Z",
            "requester_ref": "t-100",
            "building_ref": "b-1",
            "unit_ref": "u-12"
        }"#;
        let req: ServiceRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.escalation_count, 0);
        assert!(req.last_escalation_at.is_none());
        assert!(req.notes.is_empty());
    }

    #[test]
    fn test_days_open_truncates() {
        let created = Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap();
        let req = request_at(created);

        let almost_two = Utc.with_ymd_and_hms(2026, 3, 3, 8, 59, 59).unwrap();
        assert_eq!(req.days_open(almost_two), 1);

        let exactly_two = Utc.with_ymd_and_hms(2026, 3, 3, 9, 0, 0).unwrap();
        assert_eq!(req.days_open(exactly_two), 2);
    }
}
