//! Incident domain types.
//!
//! The [`Incident`] aggregate and its [`StatusHistory`] are the durable
//! records. [`InviteDetail`] and [`InvitationResult`] are transient and only
//! describe the outcome of one invitation batch. [`IncidentRequest`] is the
//! short-lived draft shown behind a "create incident?" prompt.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Error;

/// Incident number. Positive, strictly increasing, never reused.
pub type IncidentId = i64;

/// Record kind used in not-found errors for incident requests.
pub const REQUEST_KIND: &str = "incident request";

/// Note attached to the first history entry of every incident.
pub const INITIAL_HISTORY_NOTE: &str = "Incident created";

/// Category used when none was supplied.
pub const DEFAULT_CATEGORY: &str = "unknown";

/// Incident status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IncidentStatus {
    /// Impact is being assessed
    Triage,
    /// Responders are actively working the incident
    Handling,
    /// Mitigated, watching for recurrence
    Monitoring,
    /// Done
    Closed,
}

impl IncidentStatus {
    pub const ALL: [Self; 4] = [Self::Triage, Self::Handling, Self::Monitoring, Self::Closed];

    /// Status a new incident starts in.
    #[must_use]
    pub const fn initial(triage: bool) -> Self {
        if triage {
            Self::Triage
        } else {
            Self::Handling
        }
    }

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Triage => "triage",
            Self::Handling => "handling",
            Self::Monitoring => "monitoring",
            Self::Closed => "closed",
        }
    }

    /// Display label used in channel messages and topics.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Triage => ":mag: Triage",
            Self::Handling => ":fire_engine: Handling",
            Self::Monitoring => ":eyes: Monitoring",
            Self::Closed => ":white_check_mark: Closed",
        }
    }
}

impl fmt::Display for IncidentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IncidentStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Self::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| {
                Error::Validation(format!(
                    "unknown status '{wanted}' (expected triage, handling, monitoring or closed)"
                ))
            })
    }
}

/// The incident aggregate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Incident {
    pub id: IncidentId,
    pub title: String,
    pub description: String,
    pub category_id: String,
    pub severity_id: Option<String>,
    /// Channel the incident was declared from
    pub origin_channel_id: String,
    pub origin_channel_name: String,
    /// Dedicated incident channel
    pub channel_id: String,
    pub channel_name: String,
    pub creator_id: String,
    pub lead_id: Option<String>,
    pub status: IncidentStatus,
    /// Workspace the channel lives in; empty when unknown
    #[serde(default)]
    pub team_id: String,
    #[serde(default)]
    pub asset_ids: BTreeSet<String>,
    /// Access-restricted incident
    #[serde(default)]
    pub private: bool,
    /// Members currently joined; only meaningful when `private`
    #[serde(default)]
    pub joined_members: BTreeSet<String>,
    pub welcome_message_ts: Option<String>,
    pub declared_message_ts: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Incident {
    /// Slack deep link to the incident channel, if the team is known.
    #[must_use]
    pub fn channel_link(&self) -> Option<String> {
        if self.team_id.is_empty() || self.channel_id.is_empty() {
            return None;
        }
        Some(format!(
            "slack://channel?team={}&id={}",
            self.team_id, self.channel_id
        ))
    }
}

/// Normalized detail changes, applied by the store in a single write.
///
/// Status and membership are never part of a detail change.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DetailChanges {
    pub title: Option<String>,
    pub description: Option<String>,
    /// `Some(None)` clears the lead
    pub lead_id: Option<Option<String>>,
    pub severity_id: Option<String>,
    pub asset_ids: Option<BTreeSet<String>>,
}

impl DetailChanges {
    pub fn apply(&self, incident: &mut Incident) {
        if let Some(title) = &self.title {
            incident.title.clone_from(title);
        }
        if let Some(description) = &self.description {
            incident.description.clone_from(description);
        }
        if let Some(lead) = &self.lead_id {
            incident.lead_id.clone_from(lead);
        }
        if let Some(severity) = &self.severity_id {
            incident.severity_id = Some(severity.clone());
        }
        if let Some(assets) = &self.asset_ids {
            incident.asset_ids.clone_from(assets);
        }
    }
}

/// One append-only status history entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusHistory {
    pub id: Uuid,
    pub incident_id: IncidentId,
    pub status: IncidentStatus,
    pub changed_by: String,
    pub changed_at: DateTime<Utc>,
    pub note: Option<String>,
}

impl StatusHistory {
    #[must_use]
    pub fn new(
        incident_id: IncidentId,
        status: IncidentStatus,
        changed_by: impl Into<String>,
        note: Option<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            incident_id,
            status,
            changed_by: changed_by.into(),
            changed_at: Utc::now(),
            note,
        }
    }
}

/// History entry with the actor's display name resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusHistoryWithUser {
    #[serde(flatten)]
    pub entry: StatusHistory,
    pub user_name: String,
}

/// Stored user record (the part of the auth user the engine reads).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub display_name: Option<String>,
}

impl User {
    /// Best name to show for this user.
    #[must_use]
    pub fn preferred_name(&self) -> &str {
        self.display_name
            .as_deref()
            .filter(|name| !name.is_empty())
            .unwrap_or(&self.name)
    }
}

/// Outcome tag of one invitation entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InviteStatus {
    /// Reference resolved to a user, invite not sent yet
    Resolved,
    /// Invite call succeeded
    Success,
    /// Resolution or invite failed; see `error`
    Failed,
}

/// Resolution and invitation outcome for one configured reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InviteDetail {
    /// Resolved user id; empty if unresolved
    pub user_id: String,
    /// The reference as configured (`U123`, `B456`, `@alice`, `@oncall`)
    pub source_config: String,
    pub display_name: Option<String>,
    pub status: InviteStatus,
    pub error: Option<String>,
}

impl InviteDetail {
    pub(crate) fn resolved(
        user_id: impl Into<String>,
        source: impl Into<String>,
        display_name: Option<String>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            source_config: source.into(),
            display_name,
            status: InviteStatus::Resolved,
            error: None,
        }
    }

    pub(crate) fn failed(source: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            user_id: String::new(),
            source_config: source.into(),
            display_name: None,
            status: InviteStatus::Failed,
            error: Some(error.into()),
        }
    }
}

/// Result of an invitation batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvitationResult {
    pub details: Vec<InviteDetail>,
}

impl InvitationResult {
    #[must_use]
    pub fn succeeded(&self) -> usize {
        self.count(InviteStatus::Success)
    }

    #[must_use]
    pub fn failed(&self) -> usize {
        self.count(InviteStatus::Failed)
    }

    fn count(&self, status: InviteStatus) -> usize {
        self.details.iter().filter(|d| d.status == status).count()
    }
}

/// Draft incident behind an interactive prompt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncidentRequest {
    pub id: String,
    pub origin_channel_id: String,
    pub origin_message_ts: Option<String>,
    /// Bot's own prompt message
    pub prompt_message_ts: Option<String>,
    pub title: String,
    pub description: String,
    pub category_id: String,
    pub severity_id: Option<String>,
    #[serde(default)]
    pub asset_ids: Vec<String>,
    pub requested_by: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl IncidentRequest {
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Remaining lifetime, zero once expired.
    #[must_use]
    pub fn remaining(&self, now: DateTime<Utc>) -> Duration {
        (self.expires_at - now).max(Duration::zero())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_parse() {
        assert_eq!(
            "Monitoring".parse::<IncidentStatus>().unwrap(),
            IncidentStatus::Monitoring
        );
        assert_eq!(
            " closed ".parse::<IncidentStatus>().unwrap(),
            IncidentStatus::Closed
        );
        assert!(matches!(
            "resolved".parse::<IncidentStatus>(),
            Err(Error::Validation(_))
        ));
    }

    #[test]
    fn test_status_serde_tags() {
        let json = serde_json::to_string(&IncidentStatus::Handling).unwrap();
        assert_eq!(json, "\"handling\"");
    }

    #[test]
    fn test_initial_status() {
        assert_eq!(IncidentStatus::initial(true), IncidentStatus::Triage);
        assert_eq!(IncidentStatus::initial(false), IncidentStatus::Handling);
    }

    #[test]
    fn test_user_preferred_name() {
        let mut user = User {
            id: "U1".to_string(),
            name: "alice".to_string(),
            display_name: Some(String::new()),
        };
        assert_eq!(user.preferred_name(), "alice");
        user.display_name = Some("Alice A.".to_string());
        assert_eq!(user.preferred_name(), "Alice A.");
    }

    #[test]
    fn test_invitation_counts() {
        let result = InvitationResult {
            details: vec![
                InviteDetail::failed("B1", "bot not found"),
                InviteDetail {
                    status: InviteStatus::Success,
                    ..InviteDetail::resolved("U1", "U1", None)
                },
            ],
        };
        assert_eq!(result.succeeded(), 1);
        assert_eq!(result.failed(), 1);
    }
}
