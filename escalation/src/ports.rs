//! Collaborator contracts: the repository, directory, and notification
//! boundaries the engine drives.
//!
//! Each trait is object-safe so the engine can hold `Arc<dyn ...>` and be
//! wired against the JSON store, a real backend, or test fakes without
//! changing shape. None of these contracts carry retry or queueing
//! semantics of their own; the next scheduled cycle is the retry.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::model::{Contact, DirectoryRecord, RequestStatus, ServiceRequest};

/// Errors from the request repository.
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("request not found: {0}")]
    NotFound(String),

    #[error("repository unavailable: {0}")]
    Unavailable(String),

    #[error("repository I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("corrupt record: {0}")]
    Corrupt(String),
}

/// Errors from directory resolution.
#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("no directory entry for requester {0}")]
    UnknownRequester(String),

    #[error("directory unavailable: {0}")]
    Unavailable(String),
}

/// Errors from notification dispatch.
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("delivery to {address} failed: {reason}")]
    DeliveryFailed { address: String, reason: String },

    #[error("sender unavailable: {0}")]
    Unavailable(String),
}

/// Write-back payload for one escalation step.
///
/// This is the only mutation the engine ever issues: the new counter, the
/// new notice timestamp, and at most one note line (final notices only).
#[derive(Debug, Clone)]
pub struct EscalationUpdate {
    pub escalation_count: u32,
    pub last_escalation_at: DateTime<Utc>,
    pub note: Option<String>,
}

/// Store of service requests with time-stamped lifecycle fields.
#[async_trait]
pub trait RequestRepository: Send + Sync {
    /// All requests currently in `status`.
    async fn list_by_status(
        &self,
        status: RequestStatus,
    ) -> Result<Vec<ServiceRequest>, RepositoryError>;

    /// Apply one escalation write-back to a single record and return the
    /// updated record. Single-record semantics; no multi-record
    /// transactions exist or are needed.
    async fn apply_escalation(
        &self,
        id: &str,
        update: EscalationUpdate,
    ) -> Result<ServiceRequest, RepositoryError>;
}

/// Resolves a request's foreign keys to the parties relevant to escalation.
#[async_trait]
pub trait DirectoryResolver: Send + Sync {
    async fn resolve_parties(
        &self,
        requester_ref: &str,
        building_ref: &str,
        unit_ref: &str,
    ) -> Result<DirectoryRecord, DirectoryError>;
}

/// Delivers one message to one recipient, synchronously confirming or
/// failing. No retry, no queue.
#[async_trait]
pub trait NotificationSender: Send + Sync {
    async fn send(
        &self,
        from_label: &str,
        to: &Contact,
        subject: &str,
        body: &str,
    ) -> Result<(), NotifyError>;
}
