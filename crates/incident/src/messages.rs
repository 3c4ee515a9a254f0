//! Channel message texts.
//!
//! Only plain mrkdwn plus the single button the request prompt needs; richer
//! layouts belong to the UI layer.

use chrono::{DateTime, Utc};
use serde_json::json;

use crate::messaging::OutgoingMessage;
use crate::model::{Incident, IncidentId, IncidentRequest, IncidentStatus};

/// Action id of the "create incident" button on request prompts.
pub const ACTION_CREATE_INCIDENT: &str = "create_incident";

pub const CREATE_FAILED: &str = ":x: Failed to create the incident. Please try again.";
pub const REQUEST_MISSING: &str =
    ":hourglass: This incident request was not found or has expired. Please declare it again.";

fn channel_ref(incident: &Incident) -> String {
    if incident.channel_id.is_empty() {
        format!("#{}", incident.channel_name)
    } else {
        format!("<#{}>", incident.channel_id)
    }
}

fn or_placeholder(value: &str) -> &str {
    if value.trim().is_empty() {
        "_not provided_"
    } else {
        value
    }
}

/// Channel topic: status, severity and lead at a glance.
#[must_use]
pub fn topic(incident: &Incident) -> String {
    let severity = incident.severity_id.as_deref().unwrap_or("unset");
    let lead = incident
        .lead_id
        .as_deref()
        .map_or_else(|| "unassigned".to_string(), |lead| format!("<@{lead}>"));
    format!(
        "Status: {} | Severity: {severity} | Lead: {lead}",
        incident.status.label()
    )
}

/// Channel purpose: the description, falling back to the title.
#[must_use]
pub fn purpose(incident: &Incident) -> String {
    if incident.description.trim().is_empty() {
        incident.title.clone()
    } else {
        incident.description.clone()
    }
}

/// First message in the incident channel; edited in place on detail changes.
#[must_use]
pub fn welcome(incident: &Incident) -> OutgoingMessage {
    let mut text = format!(
        ":rotating_light: *Incident #{}: {}*\n\n\
         *Description:* {}\n*Category:* {}\n*Severity:* {}\n\
         *Status:* {}\n*Declared by:* <@{}>\n*Lead:* {}",
        incident.id,
        or_placeholder(&incident.title),
        or_placeholder(&incident.description),
        incident.category_id,
        incident.severity_id.as_deref().unwrap_or("unset"),
        incident.status.label(),
        incident.creator_id,
        incident
            .lead_id
            .as_deref()
            .map_or_else(|| "unassigned".to_string(), |lead| format!("<@{lead}>")),
    );
    if !incident.asset_ids.is_empty() {
        let assets: Vec<&str> = incident.asset_ids.iter().map(String::as_str).collect();
        text.push_str(&format!("\n*Assets:* {}", assets.join(", ")));
    }
    OutgoingMessage::text(text)
}

/// Notice in the channel the incident was declared from.
#[must_use]
pub fn declared(incident: &Incident) -> OutgoingMessage {
    let mut text = format!(
        ":rotating_light: Incident #{} declared by <@{}>: *{}*\nJoin {}",
        incident.id,
        incident.creator_id,
        or_placeholder(&incident.title),
        channel_ref(incident)
    );
    if let Some(link) = incident.channel_link() {
        text.push_str(&format!(" (<{link}|open in Slack>)"));
    }
    OutgoingMessage::text(text)
}

/// Notice for the announcement channel.
#[must_use]
pub fn announcement(incident: &Incident) -> OutgoingMessage {
    OutgoingMessage::text(format!(
        ":mega: New incident #{} ({}): *{}* in {}",
        incident.id,
        incident.severity_id.as_deref().unwrap_or("severity unset"),
        or_placeholder(&incident.title),
        channel_ref(incident)
    ))
}

#[must_use]
pub fn status_changed(
    incident_id: IncidentId,
    status: IncidentStatus,
    actor: &str,
    note: Option<&str>,
) -> OutgoingMessage {
    let mut text = format!(
        "Incident #{incident_id} is now *{}* (changed by <@{actor}>)",
        status.label()
    );
    if let Some(note) = note.filter(|n| !n.trim().is_empty()) {
        text.push_str(&format!("\n> {}", note.trim()));
    }
    OutgoingMessage::text(text)
}

/// Prompt asking whether to turn a request into an incident.
#[must_use]
pub fn request_prompt(request: &IncidentRequest, now: DateTime<Utc>) -> OutgoingMessage {
    let minutes = request.remaining(now).num_minutes();
    let summary = format!(
        "*Create an incident?*\n*Title:* {}\n*Description:* {}\n\
         _This request expires in {minutes} min._",
        or_placeholder(&request.title),
        or_placeholder(&request.description),
    );
    OutgoingMessage::text(format!("Create an incident? {}", request.title)).with_blocks(json!([
        {
            "type": "section",
            "text": { "type": "mrkdwn", "text": summary }
        },
        {
            "type": "actions",
            "elements": [{
                "type": "button",
                "action_id": ACTION_CREATE_INCIDENT,
                "style": "danger",
                "text": { "type": "plain_text", "text": "Create incident" },
                "value": request.id
            }]
        }
    ]))
}

/// Replacement for a consumed prompt.
#[must_use]
pub fn request_consumed(incident: &Incident) -> OutgoingMessage {
    OutgoingMessage::text(format!(
        ":white_check_mark: Incident #{} created: {}",
        incident.id,
        channel_ref(incident)
    ))
}
