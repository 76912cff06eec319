//! Escalation engine: one full evaluation cycle over the candidate set.
//!
//! Invoked as a short-lived, stateless unit of work by an external timer.
//! Per-candidate flow:
//!
//! ```text
//! list candidates (status = awaiting_responsible_party)
//!     │  per candidate, independently:
//!     ├─ policy evaluate ─ none ─────────────→ skip
//!     ├─ resolve directory parties
//!     │    reminder, no intermediary ────────→ skip (gap, retried next cycle)
//!     │    final, no accountable ────────────→ error record
//!     ├─ dispatch notices one recipient at a time,
//!     │    collecting success/failure independently
//!     └─ write back (count + 1, last_escalation_at = now, note on final)
//!        only after at least one dispatch attempt
//! aggregate outcomes → RunReport
//! ```
//!
//! Candidates share no mutable state, so processing fans out over a
//! bounded task set. There is no locking across concurrent invocations:
//! a second scheduler racing the write-back may double-send one notice,
//! which this domain accepts (at-least-once; duplicate reminders beat a
//! silent ladder). A conditional write on `escalation_count` at the
//! repository boundary would tighten this if ever needed.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::message;
use crate::model::{RequestStatus, ServiceRequest};
use crate::policy::{self, EscalationAction};
use crate::ports::{
    DirectoryResolver, EscalationUpdate, NotificationSender, RequestRepository,
};
use crate::report::{ActionKind, ActionRecord, RunError, RunReport};

/// Tunables for one engine instance.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Upper bound on concurrently processed candidates.
    pub max_parallel: usize,
    /// Whole-cycle deadline. Candidates still pending when it expires are
    /// aborted and reported as errors; write-backs already applied stand.
    pub cycle_deadline: Duration,
    /// Sender identity on outbound notices.
    pub from_label: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_parallel: 4,
            cycle_deadline: Duration::from_secs(180),
            from_label: "Service Desk <noreply@servicedesk.local>".to_string(),
        }
    }
}

/// Orchestrates pull → evaluate → dispatch → write-back for every candidate.
pub struct EscalationEngine {
    repository: Arc<dyn RequestRepository>,
    directory: Arc<dyn DirectoryResolver>,
    notifier: Arc<dyn NotificationSender>,
    config: EngineConfig,
}

/// Result of processing one candidate, folded into the report.
enum CandidateOutcome {
    /// Policy said nothing is due.
    NoAction,
    /// Reminder due but no intermediary on file; left for the next cycle.
    SkippedNoRecipient,
    /// A notice went out (or was attempted); per-recipient failures ride
    /// along without suppressing the action record.
    Acted {
        action: ActionRecord,
        errors: Vec<RunError>,
    },
    /// The candidate could not be processed at all.
    Failed(RunError),
}

struct CandidateResult {
    request_id: String,
    outcome: CandidateOutcome,
}

impl EscalationEngine {
    pub fn new(
        repository: Arc<dyn RequestRepository>,
        directory: Arc<dyn DirectoryResolver>,
        notifier: Arc<dyn NotificationSender>,
    ) -> Self {
        Self::with_config(repository, directory, notifier, EngineConfig::default())
    }

    pub fn with_config(
        repository: Arc<dyn RequestRepository>,
        directory: Arc<dyn DirectoryResolver>,
        notifier: Arc<dyn NotificationSender>,
        config: EngineConfig,
    ) -> Self {
        Self {
            repository,
            directory,
            notifier,
            config,
        }
    }

    /// Run one cycle at the current wall-clock instant.
    pub async fn run_cycle(&self) -> RunReport {
        self.run_cycle_at(Utc::now()).await
    }

    /// Run one cycle with an injected evaluation instant.
    ///
    /// Every policy decision and write-back timestamp in the cycle uses
    /// `now`, so consecutive runs at the same instant are no-ops after the
    /// first one's write-backs land.
    pub async fn run_cycle_at(&self, now: DateTime<Utc>) -> RunReport {
        let started = tokio::time::Instant::now();
        let deadline = started + self.config.cycle_deadline;

        let candidates = match self
            .repository
            .list_by_status(RequestStatus::AwaitingResponsibleParty)
            .await
        {
            Ok(candidates) => candidates,
            Err(e) => {
                warn!(error = %e, "could not fetch candidate set, aborting cycle");
                let mut report = RunReport::fatal(now, e.to_string());
                report.duration_ms = started.elapsed().as_millis() as u64;
                return report;
            }
        };

        let mut report = RunReport::started(now);
        report.processed = candidates.len();
        info!(
            cycle_id = %report.cycle_id,
            candidates = candidates.len(),
            "escalation cycle started"
        );

        let sem = Arc::new(Semaphore::new(self.config.max_parallel.max(1)));
        let mut join_set: JoinSet<CandidateResult> = JoinSet::new();
        let mut pending: HashSet<String> = HashSet::new();

        for request in candidates {
            pending.insert(request.id.clone());

            let sem = sem.clone();
            let repository = self.repository.clone();
            let directory = self.directory.clone();
            let notifier = self.notifier.clone();
            let from_label = self.config.from_label.clone();

            join_set.spawn(async move {
                let _permit = sem.acquire().await.expect("semaphore closed");
                process_candidate(repository, directory, notifier, &from_label, now, request)
                    .await
            });
        }

        while !join_set.is_empty() {
            match tokio::time::timeout_at(deadline, join_set.join_next()).await {
                Ok(Some(Ok(result))) => {
                    pending.remove(&result.request_id);
                    fold_outcome(&mut report, result.outcome);
                }
                Ok(Some(Err(e))) => {
                    // Panicked candidate task; its id stays in `pending` and
                    // is reported after the loop.
                    warn!(error = %e, "candidate task failed");
                }
                Ok(None) => break,
                Err(_) => {
                    warn!(
                        remaining = pending.len(),
                        "cycle deadline hit, aborting unfinished candidates"
                    );
                    join_set.abort_all();
                    let mut ids: Vec<String> = pending.drain().collect();
                    ids.sort();
                    for request_id in ids {
                        report.errors.push(RunError {
                            request_id,
                            error: "cycle deadline exceeded before processing completed"
                                .to_string(),
                        });
                    }
                    break;
                }
            }
        }

        // Anything still pending here belongs to a panicked task.
        for request_id in pending {
            report.errors.push(RunError {
                request_id,
                error: "candidate processing aborted unexpectedly".to_string(),
            });
        }

        report.duration_ms = started.elapsed().as_millis() as u64;
        info!("{}", report.summary());
        report
    }
}

fn fold_outcome(report: &mut RunReport, outcome: CandidateOutcome) {
    match outcome {
        CandidateOutcome::NoAction => {}
        CandidateOutcome::SkippedNoRecipient => report.skipped_no_recipient += 1,
        CandidateOutcome::Acted { action, errors } => {
            report.actions.push(action);
            report.errors.extend(errors);
        }
        CandidateOutcome::Failed(error) => report.errors.push(error),
    }
}

/// Process one candidate end to end. All failures are caught here and
/// turned into outcomes; nothing propagates past the candidate boundary.
async fn process_candidate(
    repository: Arc<dyn RequestRepository>,
    directory: Arc<dyn DirectoryResolver>,
    notifier: Arc<dyn NotificationSender>,
    from_label: &str,
    now: DateTime<Utc>,
    request: ServiceRequest,
) -> CandidateResult {
    let request_id = request.id.clone();

    let outcome = match policy::evaluate(now, &request) {
        EscalationAction::None => {
            debug!(request_id = %request.id, "nothing due");
            CandidateOutcome::NoAction
        }
        EscalationAction::Reminder { tier } => {
            send_reminder(repository, directory, notifier, from_label, now, &request, tier).await
        }
        EscalationAction::FinalToAccountable => {
            send_final(repository, directory, notifier, from_label, now, &request).await
        }
    };

    CandidateResult {
        request_id,
        outcome,
    }
}

async fn send_reminder(
    repository: Arc<dyn RequestRepository>,
    directory: Arc<dyn DirectoryResolver>,
    notifier: Arc<dyn NotificationSender>,
    from_label: &str,
    now: DateTime<Utc>,
    request: &ServiceRequest,
    tier: u32,
) -> CandidateOutcome {
    let record = match directory
        .resolve_parties(&request.requester_ref, &request.building_ref, &request.unit_ref)
        .await
    {
        Ok(record) => record,
        Err(e) => {
            return CandidateOutcome::Failed(RunError {
                request_id: request.id.clone(),
                error: format!("directory resolution failed: {e}"),
            })
        }
    };

    let Some(intermediary) = record.intermediary_contact else {
        // No one to remind. Intentionally no write-back, so the candidate
        // stays eligible next cycle instead of silently advancing.
        debug!(request_id = %request.id, "no intermediary on file, leaving for next cycle");
        return CandidateOutcome::SkippedNoRecipient;
    };

    let notice = message::reminder(request, &record.display, tier, now);
    let mut errors = Vec::new();

    info!(
        request_id = %request.id,
        tier,
        to = %intermediary.address,
        "sending reminder"
    );
    if let Err(e) = notifier
        .send(from_label, &intermediary, &notice.subject, &notice.body)
        .await
    {
        warn!(request_id = %request.id, error = %e, "reminder delivery failed");
        errors.push(RunError {
            request_id: request.id.clone(),
            error: format!("reminder delivery to {} failed: {e}", intermediary.address),
        });
    }

    // A dispatch was attempted, so the ladder advances whether or not it
    // landed; the next cycle re-fires if need be.
    let update = EscalationUpdate {
        escalation_count: request.escalation_count + 1,
        last_escalation_at: now,
        note: None,
    };
    if let Err(e) = repository.apply_escalation(&request.id, update).await {
        warn!(request_id = %request.id, error = %e, "write-back failed");
        errors.push(RunError {
            request_id: request.id.clone(),
            error: format!("write-back failed: {e}"),
        });
    }

    CandidateOutcome::Acted {
        action: ActionRecord {
            request_id: request.id.clone(),
            kind: ActionKind::Reminder,
            tier: Some(tier),
            recipients: vec![intermediary.address],
        },
        errors,
    }
}

async fn send_final(
    repository: Arc<dyn RequestRepository>,
    directory: Arc<dyn DirectoryResolver>,
    notifier: Arc<dyn NotificationSender>,
    from_label: &str,
    now: DateTime<Utc>,
    request: &ServiceRequest,
) -> CandidateOutcome {
    let record = match directory
        .resolve_parties(&request.requester_ref, &request.building_ref, &request.unit_ref)
        .await
    {
        Ok(record) => record,
        Err(e) => {
            return CandidateOutcome::Failed(RunError {
                request_id: request.id.clone(),
                error: format!("directory resolution failed: {e}"),
            })
        }
    };

    let Some(accountable) = record.accountable_contact else {
        return CandidateOutcome::Failed(RunError {
            request_id: request.id.clone(),
            error: "no accountable contact on file for final escalation".to_string(),
        });
    };

    let notice = message::final_to_accountable(request, &record.display, now);
    let mut errors = Vec::new();
    let mut recipients = Vec::new();

    info!(
        request_id = %request.id,
        to = %accountable.address,
        "sending final escalation notice"
    );
    recipients.push(accountable.address.clone());
    if let Err(e) = notifier
        .send(from_label, &accountable, &notice.subject, &notice.body)
        .await
    {
        warn!(request_id = %request.id, error = %e, "final notice delivery failed");
        errors.push(RunError {
            request_id: request.id.clone(),
            error: format!("final delivery to {} failed: {e}", accountable.address),
        });
    }

    // CC the intermediary when one exists. Its outcome is independent: a
    // failed CC never suppresses the owner notice and vice versa.
    if let Some(intermediary) = record.intermediary_contact {
        let cc = message::final_cc(&notice);
        recipients.push(intermediary.address.clone());
        if let Err(e) = notifier
            .send(from_label, &intermediary, &cc.subject, &cc.body)
            .await
        {
            warn!(request_id = %request.id, error = %e, "final CC delivery failed");
            errors.push(RunError {
                request_id: request.id.clone(),
                error: format!("final CC to {} failed: {e}", intermediary.address),
            });
        }
    }

    // Count stays frozen at its ceiling; only the timestamp and the notes
    // log move on repeated finals.
    let update = EscalationUpdate {
        escalation_count: request.escalation_count.max(crate::policy::MAX_REMINDERS),
        last_escalation_at: now,
        note: Some(message::final_note_line(now, &accountable.name)),
    };
    if let Err(e) = repository.apply_escalation(&request.id, update).await {
        warn!(request_id = %request.id, error = %e, "write-back failed");
        errors.push(RunError {
            request_id: request.id.clone(),
            error: format!("write-back failed: {e}"),
        });
    }

    CandidateOutcome::Acted {
        action: ActionRecord {
            request_id: request.id.clone(),
            kind: ActionKind::FinalToAccountable,
            tier: None,
            recipients,
        },
        errors,
    }
}
