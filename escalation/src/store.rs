//! JSON-file-backed collaborators for the cycle runner.
//!
//! A daily batch over a small working set does not need a database. The
//! operational wiring reads `requests.json` and `directory.json` once at
//! startup, rewrites the requests file on each write-back, and appends
//! dispatched notices to an outbox JSONL file.

use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, RwLock};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::model::{Contact, DirectoryRecord, RequestStatus, ServiceRequest};
use crate::ports::{
    DirectoryError, DirectoryResolver, EscalationUpdate, NotificationSender, NotifyError,
    RepositoryError, RequestRepository,
};

/// Errors opening or persisting the JSON store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("parse error: {0}")]
    Parse(#[from] serde_json::Error),
}

/// File-backed request repository and directory resolver.
///
/// Directory entries are keyed by `requester_ref` and immutable for the
/// lifetime of the store; requests live behind a lock because write-backs
/// mutate them.
pub struct JsonStore {
    requests_path: PathBuf,
    requests: RwLock<Vec<ServiceRequest>>,
    directory: HashMap<String, DirectoryRecord>,
}

impl JsonStore {
    /// Load both files. The directory file maps requester_ref to a
    /// [`DirectoryRecord`].
    pub fn open(
        requests_path: impl Into<PathBuf>,
        directory_path: impl AsRef<Path>,
    ) -> Result<Self, StoreError> {
        let requests_path = requests_path.into();
        let requests: Vec<ServiceRequest> =
            serde_json::from_reader(File::open(&requests_path)?)?;
        let directory: HashMap<String, DirectoryRecord> =
            serde_json::from_reader(File::open(directory_path.as_ref())?)?;

        info!(
            requests = requests.len(),
            directory_entries = directory.len(),
            path = %requests_path.display(),
            "store loaded"
        );

        Ok(Self {
            requests_path,
            requests: RwLock::new(requests),
            directory,
        })
    }

    /// Wrap in an `Arc` for sharing across engine ports.
    pub fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    fn persist(&self, requests: &[ServiceRequest]) -> Result<(), StoreError> {
        // Write-then-rename so a crash mid-write never truncates the store.
        let tmp = self.requests_path.with_extension("json.tmp");
        let mut file = File::create(&tmp)?;
        serde_json::to_writer_pretty(&mut file, requests)?;
        file.flush()?;
        std::fs::rename(&tmp, &self.requests_path)?;
        Ok(())
    }
}

#[async_trait]
impl RequestRepository for JsonStore {
    async fn list_by_status(
        &self,
        status: RequestStatus,
    ) -> Result<Vec<ServiceRequest>, RepositoryError> {
        let requests = self
            .requests
            .read()
            .map_err(|_| RepositoryError::Unavailable("lock poisoned".to_string()))?;
        Ok(requests
            .iter()
            .filter(|r| r.status == status)
            .cloned()
            .collect())
    }

    async fn apply_escalation(
        &self,
        id: &str,
        update: EscalationUpdate,
    ) -> Result<ServiceRequest, RepositoryError> {
        let mut requests = self
            .requests
            .write()
            .map_err(|_| RepositoryError::Unavailable("lock poisoned".to_string()))?;

        let request = requests
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| RepositoryError::NotFound(id.to_string()))?;

        request.escalation_count = update.escalation_count;
        request.last_escalation_at = Some(update.last_escalation_at);
        if let Some(note) = update.note {
            request.notes.push(note);
        }
        let snapshot = request.clone();

        self.persist(&requests)
            .map_err(|e| RepositoryError::Unavailable(e.to_string()))?;
        Ok(snapshot)
    }
}

#[async_trait]
impl DirectoryResolver for JsonStore {
    async fn resolve_parties(
        &self,
        requester_ref: &str,
        _building_ref: &str,
        _unit_ref: &str,
    ) -> Result<DirectoryRecord, DirectoryError> {
        self.directory
            .get(requester_ref)
            .cloned()
            .ok_or_else(|| DirectoryError::UnknownRequester(requester_ref.to_string()))
    }
}

/// One dispatched notice, as written to the outbox file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutboxEntry {
    pub sent_at: DateTime<Utc>,
    pub from: String,
    pub to_name: String,
    pub to_address: String,
    pub subject: String,
    pub body: String,
}

/// Appends one JSON line per notice to an outbox file. Downstream mail
/// tooling picks the file up; this process never talks to a mail server.
pub struct OutboxNotifier {
    file: Mutex<File>,
}

impl OutboxNotifier {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path.as_ref())?;
        Ok(Self {
            file: Mutex::new(file),
        })
    }
}

#[async_trait]
impl NotificationSender for OutboxNotifier {
    async fn send(
        &self,
        from_label: &str,
        to: &Contact,
        subject: &str,
        body: &str,
    ) -> Result<(), NotifyError> {
        let entry = OutboxEntry {
            sent_at: Utc::now(),
            from: from_label.to_string(),
            to_name: to.name.clone(),
            to_address: to.address.clone(),
            subject: subject.to_string(),
            body: body.to_string(),
        };
        let line = serde_json::to_string(&entry)
            .map_err(|e| NotifyError::Unavailable(e.to_string()))?;

        let mut file = self
            .file
            .lock()
            .map_err(|_| NotifyError::Unavailable("outbox lock poisoned".to_string()))?;
        writeln!(file, "{line}").map_err(|e| NotifyError::DeliveryFailed {
            address: to.address.clone(),
            reason: e.to_string(),
        })?;
        file.flush().map_err(|e| NotifyError::DeliveryFailed {
            address: to.address.clone(),
            reason: e.to_string(),
        })
    }
}

/// Dry-run sender: traces each notice instead of delivering it.
pub struct LogNotifier;

#[async_trait]
impl NotificationSender for LogNotifier {
    async fn send(
        &self,
        from_label: &str,
        to: &Contact,
        subject: &str,
        _body: &str,
    ) -> Result<(), NotifyError> {
        info!(from = from_label, to = %to.address, subject, "dry-run notice");
        Ok(())
    }
}
