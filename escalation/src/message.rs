//! Outbound notice composition.
//!
//! Plain-text subject/body pairs built from directory display metadata.
//! Nothing composed here feeds back into policy decisions, and no
//! templating engine is involved.

use chrono::{DateTime, Utc};

use crate::model::{DirectoryDisplay, ServiceRequest};
use crate::policy::MAX_REMINDERS;

/// One outbound message, addressed by the engine.
#[derive(Debug, Clone)]
pub struct Notice {
    pub subject: String,
    pub body: String,
}

/// Reminder to the intermediary: tier N of the ladder.
pub fn reminder(
    request: &ServiceRequest,
    display: &DirectoryDisplay,
    tier: u32,
    now: DateTime<Utc>,
) -> Notice {
    let subject = format!(
        "Reminder {tier}/{MAX_REMINDERS}: open service request {} at {}",
        request.id, display.building_name
    );
    let body = format!(
        "Service request {id} was reported by {requester} ({building}, unit \
         {unit}) and has been awaiting action for {days} days.\n\n\
         This is reminder {tier} of {max}. Please arrange the work or update \
         the request status.",
        id = request.id,
        requester = display.requester_name,
        building = display.building_name,
        unit = display.unit_label,
        days = request.days_open(now),
        tier = tier,
        max = MAX_REMINDERS,
    );
    Notice { subject, body }
}

/// Final notice to the accountable party after the reminder ladder is
/// exhausted.
pub fn final_to_accountable(
    request: &ServiceRequest,
    display: &DirectoryDisplay,
    now: DateTime<Utc>,
) -> Notice {
    let subject = format!(
        "Final escalation: unresolved service request at {}",
        display.building_name
    );
    let body = format!(
        "Service request {id}, reported by {requester} ({building}, unit \
         {unit}), is still unresolved after {days} days and {max} reminders \
         to the managing agent.\n\n\
         As the accountable party for this building you are asked to \
         intervene directly.",
        id = request.id,
        requester = display.requester_name,
        building = display.building_name,
        unit = display.unit_label,
        days = request.days_open(now),
        max = MAX_REMINDERS,
    );
    Notice { subject, body }
}

/// CC copy of a final notice, sent to the intermediary for their records.
pub fn final_cc(notice: &Notice) -> Notice {
    Notice {
        subject: format!("Copy: {}", notice.subject),
        body: format!(
            "For your records, the following notice was sent to the property \
             owner.\n\n{}",
            notice.body
        ),
    }
}

/// The line appended to a request's notes when a final notice goes out.
pub fn final_note_line(now: DateTime<Utc>, accountable_name: &str) -> String {
    format!(
        "{}: final escalation notice sent to {}",
        now.format("%Y-%m-%d"),
        accountable_name
    )
}
