//! Escalation policy: a pure decision function over request timestamps.
//!
//! All decisions are deterministic. The evaluation instant is injected by
//! the caller, so the ladder is testable without touching a system clock,
//! and calling the policy twice with the same `(now, request)` always
//! yields the same action. Idempotency of the whole engine falls out of
//! this re-entrancy plus the write-back advancing `last_escalation_at`;
//! there is no locking anywhere.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{RequestStatus, ServiceRequest};

/// Days that must elapse since the last notice (or creation, when no notice
/// has gone out) before the next rung of the ladder fires. A request exactly
/// at the boundary is eligible.
pub const REMINDER_INTERVAL_DAYS: i64 = 3;

/// Reminders sent to the intermediary before the accountable party is
/// pulled in.
pub const MAX_REMINDERS: u32 = 3;

/// What the engine should do for one request, right now.
///
/// Transient: produced by [`evaluate`], consumed within the same cycle,
/// never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EscalationAction {
    /// Nothing due yet.
    None,
    /// Send reminder number `tier` (1-indexed) to the intermediary.
    Reminder { tier: u32 },
    /// Ladder exhausted: notify the accountable party, CC the intermediary.
    FinalToAccountable,
}

impl std::fmt::Display for EscalationAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::None => write!(f, "none"),
            Self::Reminder { tier } => write!(f, "reminder({tier})"),
            Self::FinalToAccountable => write!(f, "final_to_accountable"),
        }
    }
}

/// Decide which action applies to `request` at the instant `now`.
///
/// The caller filters to in-scope requests already; a request in any other
/// status still gets `None` here rather than a panic or a bogus reminder.
/// Elapsed days use truncating floor semantics, so partial days never
/// round up.
pub fn evaluate(now: DateTime<Utc>, request: &ServiceRequest) -> EscalationAction {
    if request.status != RequestStatus::AwaitingResponsibleParty {
        return EscalationAction::None;
    }

    // num_days truncates toward zero, which also covers a reference time
    // in the future (negative elapsed stays below the threshold).
    let elapsed_days = (now - request.reference_time()).num_days();
    if elapsed_days < REMINDER_INTERVAL_DAYS {
        return EscalationAction::None;
    }

    if request.escalation_count < MAX_REMINDERS {
        EscalationAction::Reminder {
            tier: request.escalation_count + 1,
        }
    } else {
        EscalationAction::FinalToAccountable
    }
}
