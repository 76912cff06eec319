//! Time-driven escalation engine for tenant service requests.
//!
//! An unresolved request is progressively surfaced to increasingly senior
//! responsible parties until someone resolves it:
//!
//! ```text
//! awaiting_responsible_party {count=0}
//!     │  3 days elapse
//!     ▼
//! reminder 1 → intermediary (managing agent)     count=1
//!     │  3 days elapse
//!     ▼
//! reminder 2 → intermediary                      count=2
//!     │  3 days elapse
//!     ▼
//! reminder 3 → intermediary                      count=3
//!     │  3 days elapse
//!     ▼
//! final notice → accountable party, CC intermediary   count stays 3
//!     │  3 days elapse
//!     ▼
//! final notice repeats until an operator changes the status
//! ```
//!
//! The policy is a pure function over an injected evaluation instant; the
//! engine drives one stateless cycle per scheduler tick and is safe to
//! re-run or double-invoke (at-least-once delivery, no locking). All
//! per-candidate failures are isolated; the cycle returns a structured
//! [`RunReport`] instead of raising past its boundary.

pub mod engine;
pub mod message;
pub mod model;
pub mod policy;
pub mod ports;
pub mod report;
pub mod store;

pub use engine::{EngineConfig, EscalationEngine};
pub use model::{Contact, DirectoryDisplay, DirectoryRecord, RequestStatus, ServiceRequest};
pub use policy::{evaluate, EscalationAction, MAX_REMINDERS, REMINDER_INTERVAL_DAYS};
pub use ports::{
    DirectoryError, DirectoryResolver, EscalationUpdate, NotificationSender, NotifyError,
    RepositoryError, RequestRepository,
};
pub use report::{ActionKind, ActionRecord, RunError, RunReport};
pub use store::{JsonStore, LogNotifier, OutboxEntry, OutboxNotifier, StoreError};
