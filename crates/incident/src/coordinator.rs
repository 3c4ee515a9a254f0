//! Incident creation pipeline and the operations exposed to callers.
//!
//! Creation runs these steps in order. Hard steps abort and return an error;
//! soft steps log a warning and the pipeline continues.
//!
//! | # | step | failure |
//! |---|------|---------|
//! | 1 | validate creator and severity | hard, nothing touched |
//! | 2 | allocate incident number | hard |
//! | 3 | look up team id | soft, deep links degrade |
//! | 4 | build the aggregate and its channel name | - |
//! | 5 | create the channel | hard, nothing persisted |
//! | 6 | purpose, topic, creator invite, bookmark, welcome, declared notice | soft |
//! | 7 | save the incident | hard |
//! | 8 | initial status history entry | hard, reported as [`Error::InitialHistoryMissing`] |
//! | 9 | category invitations | soft |
//! | 10 | announcement channel notice | soft |

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, error, info, instrument, warn};

use crate::allocator::SequenceAllocator;
use crate::config::Config;
use crate::content::ContentGenerator;
use crate::dispatch::AsyncDispatcher;
use crate::error::{CreateStep, Error, Result};
use crate::invite::InvitationResolver;
use crate::ledger::StatusLedger;
use crate::messages;
use crate::messaging::Messenger;
use crate::model::{
    DetailChanges, Incident, IncidentId, IncidentStatus, InvitationResult, StatusHistory,
    StatusHistoryWithUser, DEFAULT_CATEGORY,
};
use crate::naming;
use crate::store::IncidentStore;

/// Input of the creation pipeline.
#[derive(Debug, Clone, Default)]
pub struct NewIncident {
    pub title: String,
    pub description: String,
    pub category_id: String,
    pub severity_id: Option<String>,
    pub asset_ids: Vec<String>,
    pub origin_channel_id: String,
    /// Looked up from the platform when empty
    pub origin_channel_name: String,
    pub creator_id: String,
    /// Start in triage (otherwise handling)
    pub initial_triage: bool,
    /// Access-restricted incident with a private channel
    pub private: bool,
}

/// Detail changes; `None` leaves a field untouched.
#[derive(Debug, Clone, Default)]
pub struct IncidentUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    /// `Some(None)` clears the lead
    pub lead_id: Option<Option<String>>,
    pub severity_id: Option<String>,
    pub asset_ids: Option<Vec<String>>,
}

impl IncidentUpdate {
    fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.lead_id.is_none()
            && self.severity_id.is_none()
            && self.asset_ids.is_none()
    }
}

/// Orchestrates incident creation and all later mutations.
///
/// Cheap to clone; clones share the same collaborators.
#[derive(Clone)]
pub struct IncidentCoordinator {
    pub(crate) config: Arc<Config>,
    pub(crate) store: Arc<dyn IncidentStore>,
    pub(crate) messenger: Arc<dyn Messenger>,
    pub(crate) allocator: SequenceAllocator,
    pub(crate) ledger: StatusLedger,
    pub(crate) resolver: InvitationResolver,
    pub(crate) dispatcher: AsyncDispatcher,
    pub(crate) generator: Option<Arc<dyn ContentGenerator>>,
}

impl IncidentCoordinator {
    pub fn new(
        config: Config,
        store: Arc<dyn IncidentStore>,
        messenger: Arc<dyn Messenger>,
    ) -> Self {
        let dispatcher = config
            .max_in_flight
            .map_or_else(AsyncDispatcher::new, AsyncDispatcher::bounded);
        Self {
            allocator: SequenceAllocator::new(Arc::clone(&store)),
            ledger: StatusLedger::new(Arc::clone(&store)).with_directory(Arc::clone(&messenger)),
            resolver: InvitationResolver::new(Arc::clone(&messenger)),
            config: Arc::new(config),
            store,
            messenger,
            dispatcher,
            generator: None,
        }
    }

    /// Attach a title/description generator for incident requests.
    #[must_use]
    pub fn with_generator(mut self, generator: Arc<dyn ContentGenerator>) -> Self {
        self.generator = Some(generator);
        self
    }

    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    #[must_use]
    pub fn ledger(&self) -> &StatusLedger {
        &self.ledger
    }

    #[must_use]
    pub fn dispatcher(&self) -> &AsyncDispatcher {
        &self.dispatcher
    }

    // =========================================================================
    // Creation
    // =========================================================================

    #[instrument(skip_all, fields(creator = %new.creator_id, origin = %new.origin_channel_id))]
    pub async fn create_incident(&self, new: NewIncident) -> Result<Incident> {
        // 1. Validate
        let creator_id = new.creator_id.trim().to_string();
        if creator_id.is_empty() {
            return Err(Error::validation("creator must not be empty"));
        }
        let severity_id = self.validate_severity(new.severity_id.as_deref())?;

        // 2. Allocate
        let id = self
            .allocator
            .next()
            .await
            .map_err(|e| Error::at(CreateStep::AllocateNumber, e))?;

        // 3. Team id for deep links
        let team_id = match self.messenger.identity().await {
            Ok(identity) => identity.team_id,
            Err(e) => {
                warn!(incident_id = id, error = %e, "Could not determine team id");
                String::new()
            }
        };

        // 4. Aggregate
        let title = new.title.trim().to_string();
        let category_id = match new.category_id.trim() {
            "" => DEFAULT_CATEGORY.to_string(),
            category => category.to_string(),
        };
        let origin_channel_name = if new.origin_channel_name.is_empty() {
            self.channel_name_of(&new.origin_channel_id).await
        } else {
            new.origin_channel_name.clone()
        };
        let now = Utc::now();
        let mut incident = Incident {
            id,
            channel_name: naming::channel_name(&self.config.channel_prefix, id, &title),
            title,
            description: new.description.trim().to_string(),
            category_id,
            severity_id,
            origin_channel_id: new.origin_channel_id.clone(),
            origin_channel_name,
            channel_id: String::new(),
            creator_id: creator_id.clone(),
            lead_id: None,
            status: IncidentStatus::initial(new.initial_triage),
            team_id,
            asset_ids: clean_set(new.asset_ids),
            private: new.private,
            joined_members: BTreeSet::new(),
            welcome_message_ts: None,
            declared_message_ts: None,
            created_at: now,
            updated_at: now,
        };

        // 5. Channel
        let channel = self
            .messenger
            .create_channel(&incident.channel_name, incident.private)
            .await
            .map_err(|e| Error::at(CreateStep::ProvisionChannel, e))?;
        incident.channel_id = channel.id;
        info!(
            incident_id = id,
            channel_id = %incident.channel_id,
            channel_name = %incident.channel_name,
            "Incident channel created"
        );

        // 6. Best-effort channel setup
        self.prepare_channel(&mut incident).await;

        // 7. Persist
        self.store
            .put_incident(&incident)
            .await
            .map_err(|e| Error::at(CreateStep::PersistIncident, e))?;

        // 8. Audit trail
        if let Err(e) = self.ledger.record_initial(&incident, &creator_id).await {
            error!(
                incident_id = id,
                error = %e,
                "Incident saved without its initial status history"
            );
            return Err(Error::InitialHistoryMissing {
                incident_id: id,
                source: Box::new(e),
            });
        }

        // 9. Category invitations
        self.invite_category(&incident).await;

        // 10. Announcement
        self.announce(&incident).await;

        info!(
            incident_id = id,
            status = %incident.status,
            category = %incident.category_id,
            "Incident created"
        );
        Ok(incident)
    }

    fn validate_severity(&self, severity: Option<&str>) -> Result<Option<String>> {
        let Some(severity) = severity.map(str::trim).filter(|s| !s.is_empty()) else {
            return Ok(None);
        };
        if self.config.catalog.severity(severity).is_none() {
            return Err(Error::validation(format!("unknown severity '{severity}'")));
        }
        Ok(Some(severity.to_string()))
    }

    async fn channel_name_of(&self, channel_id: &str) -> String {
        if channel_id.is_empty() {
            return String::new();
        }
        match self.messenger.conversation_info(channel_id).await {
            Ok(info) => info.name,
            Err(e) => {
                debug!(channel_id, error = %e, "Could not look up origin channel name");
                String::new()
            }
        }
    }

    async fn prepare_channel(&self, incident: &mut Incident) {
        let channel_id = incident.channel_id.clone();

        if let Err(e) = self
            .messenger
            .set_purpose(&channel_id, &messages::purpose(incident))
            .await
        {
            warn!(incident_id = incident.id, error = %e, "Failed to set channel purpose");
        }

        if let Err(e) = self
            .messenger
            .set_topic(&channel_id, &messages::topic(incident))
            .await
        {
            warn!(incident_id = incident.id, error = %e, "Failed to set channel topic");
        }

        match self
            .messenger
            .invite_users(&channel_id, std::slice::from_ref(&incident.creator_id))
            .await
        {
            Ok(()) => {
                if incident.private {
                    incident.joined_members.insert(incident.creator_id.clone());
                }
            }
            Err(e) if e.api_code() == Some("already_in_channel") => {
                if incident.private {
                    incident.joined_members.insert(incident.creator_id.clone());
                }
            }
            Err(e) => warn!(incident_id = incident.id, error = %e, "Failed to invite creator"),
        }

        if let Some(base) = &self.config.frontend_url {
            let link = format!("{base}/incidents/{}", incident.id);
            if let Err(e) = self
                .messenger
                .add_bookmark(&channel_id, "Incident details", &link)
                .await
            {
                warn!(incident_id = incident.id, error = %e, "Failed to add bookmark");
            }
        }

        match self
            .messenger
            .post_message(&channel_id, &messages::welcome(incident))
            .await
        {
            Ok(ts) => incident.welcome_message_ts = Some(ts),
            Err(e) => {
                warn!(incident_id = incident.id, error = %e, "Failed to post welcome message");
            }
        }

        if !incident.origin_channel_id.is_empty() && incident.origin_channel_id != channel_id {
            match self
                .messenger
                .post_message(&incident.origin_channel_id, &messages::declared(incident))
                .await
            {
                Ok(ts) => incident.declared_message_ts = Some(ts),
                Err(e) => {
                    warn!(incident_id = incident.id, error = %e, "Failed to post declared notice");
                }
            }
        }
    }

    async fn invite_category(&self, incident: &Incident) {
        let Some(category) = self.config.catalog.category(&incident.category_id) else {
            debug!(category = %incident.category_id, "Category not configured, no invitations");
            return;
        };
        if !category.has_invitees() {
            return;
        }

        match self
            .resolver
            .invite_by_list(
                &category.invite_users,
                &category.invite_groups,
                &incident.channel_id,
            )
            .await
        {
            Ok(result) => {
                for detail in result.details.iter().filter(|d| d.error.is_some()) {
                    warn!(
                        incident_id = incident.id,
                        reference = %detail.source_config,
                        error = detail.error.as_deref().unwrap_or_default(),
                        "Category invitation failed"
                    );
                }
                info!(
                    incident_id = incident.id,
                    category = %category.id,
                    succeeded = result.succeeded(),
                    failed = result.failed(),
                    "Category invitations processed"
                );
            }
            Err(e) => warn!(incident_id = incident.id, error = %e, "Category invitations failed"),
        }
    }

    async fn announce(&self, incident: &Incident) {
        let Some(channel) = &self.config.announcement_channel else {
            return;
        };
        if *channel == incident.origin_channel_id {
            return;
        }
        if let Err(e) = self
            .messenger
            .post_message(channel, &messages::announcement(incident))
            .await
        {
            warn!(incident_id = incident.id, error = %e, "Failed to post announcement");
        }
    }

    // =========================================================================
    // Status
    // =========================================================================

    /// Transition an incident and tell its channel about it.
    pub async fn update_status(
        &self,
        incident_id: IncidentId,
        status: IncidentStatus,
        actor: &str,
        note: Option<&str>,
    ) -> Result<StatusHistory> {
        let entry = self
            .ledger
            .transition(incident_id, status, actor, note)
            .await?;

        match self.store.get_incident(incident_id).await {
            Ok(incident) => {
                if let Err(e) = self
                    .messenger
                    .post_message(
                        &incident.channel_id,
                        &messages::status_changed(
                            incident_id,
                            status,
                            &entry.changed_by,
                            entry.note.as_deref(),
                        ),
                    )
                    .await
                {
                    warn!(incident_id, error = %e, "Failed to post status change");
                }
                self.refresh_channel_texts(&incident).await;
            }
            Err(e) => {
                warn!(incident_id, error = %e, "Could not reload incident after status change");
            }
        }

        Ok(entry)
    }

    pub async fn status_history(
        &self,
        incident_id: IncidentId,
    ) -> Result<Vec<StatusHistoryWithUser>> {
        self.ledger.history(incident_id).await
    }

    /// Write a missing initial history entry for an incident.
    ///
    /// This is the repair path for [`Error::InitialHistoryMissing`]. Returns
    /// `true` if an entry was written.
    pub async fn repair_initial_history(&self, incident_id: IncidentId) -> Result<bool> {
        let incident = self.store.get_incident(incident_id).await?;
        let creator = incident.creator_id.clone();
        self.ledger.ensure_initial_entry(&incident, &creator).await
    }

    // =========================================================================
    // Invitations and membership
    // =========================================================================

    pub async fn invite_users_by_list(
        &self,
        user_refs: &[String],
        group_refs: &[String],
        channel_id: &str,
    ) -> Result<InvitationResult> {
        self.resolver
            .invite_by_list(user_refs, group_refs, channel_id)
            .await
    }

    /// Add a user to a private incident.
    pub async fn join_incident(&self, incident_id: IncidentId, user_id: &str) -> Result<Incident> {
        let user_id = user_id.trim();
        if user_id.is_empty() {
            return Err(Error::validation("user must not be empty"));
        }
        let incident = self.store.get_incident(incident_id).await?;
        if !incident.private {
            return Err(Error::validation(format!(
                "incident {incident_id} is not access-restricted"
            )));
        }
        if incident.joined_members.contains(user_id) {
            return Ok(incident);
        }

        match self
            .messenger
            .invite_users(&incident.channel_id, &[user_id.to_string()])
            .await
        {
            Ok(()) => {}
            Err(e) if e.api_code() == Some("already_in_channel") => {}
            Err(e) => return Err(e.into()),
        }

        let incident = self.store.add_joined_member(incident_id, user_id).await?;
        info!(incident_id, user_id, "User joined private incident");
        Ok(incident)
    }

    /// Re-read the member list of a private incident's channel.
    pub async fn refresh_members(&self, incident_id: IncidentId) -> Result<Incident> {
        let incident = self.store.get_incident(incident_id).await?;
        if !incident.private {
            return Err(Error::validation(format!(
                "incident {incident_id} is not access-restricted"
            )));
        }

        let mut members = BTreeSet::new();
        let mut cursor: Option<String> = None;
        loop {
            let page = self
                .messenger
                .conversation_members(&incident.channel_id, cursor.as_deref())
                .await?;
            members.extend(page.members);
            match page.next_cursor.filter(|c| !c.is_empty()) {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }

        debug!(incident_id, members = members.len(), "Refreshed incident members");
        Ok(self.store.set_joined_members(incident_id, &members).await?)
    }

    // =========================================================================
    // Details
    // =========================================================================

    /// Change title, description, lead, severity or assets.
    ///
    /// The channel name is never changed.
    pub async fn update_details(
        &self,
        incident_id: IncidentId,
        update: IncidentUpdate,
        actor: &str,
    ) -> Result<Incident> {
        if actor.trim().is_empty() {
            return Err(Error::validation("actor must not be empty"));
        }
        if update.is_empty() {
            return Err(Error::validation("no changes supplied"));
        }
        let severity = match update.severity_id.as_deref() {
            Some(severity) => Some(
                self.validate_severity(Some(severity))?
                    .ok_or_else(|| Error::validation("severity must not be empty"))?,
            ),
            None => None,
        };

        let changes = DetailChanges {
            title: update.title.map(|t| t.trim().to_string()),
            description: update.description.map(|d| d.trim().to_string()),
            lead_id: update
                .lead_id
                .map(|lead| lead.map(|l| l.trim().to_string()).filter(|l| !l.is_empty())),
            severity_id: severity,
            asset_ids: update.asset_ids.map(clean_set),
        };

        let incident = self
            .store
            .update_incident_details(incident_id, &changes)
            .await?;
        info!(incident_id, actor, "Incident details updated");

        if let Err(e) = self
            .messenger
            .set_purpose(&incident.channel_id, &messages::purpose(&incident))
            .await
        {
            warn!(incident_id, error = %e, "Failed to refresh channel purpose");
        }
        self.refresh_channel_texts(&incident).await;
        Ok(incident)
    }

    /// Topic and welcome message reflect the current incident.
    async fn refresh_channel_texts(&self, incident: &Incident) {
        if let Err(e) = self
            .messenger
            .set_topic(&incident.channel_id, &messages::topic(incident))
            .await
        {
            warn!(incident_id = incident.id, error = %e, "Failed to refresh channel topic");
        }

        if let Some(ts) = &incident.welcome_message_ts {
            if let Err(e) = self
                .messenger
                .update_message(&incident.channel_id, ts, &messages::welcome(incident))
                .await
            {
                warn!(incident_id = incident.id, error = %e, "Failed to edit welcome message");
            }
        }
    }

    // =========================================================================
    // Queries
    // =========================================================================

    pub async fn incident(&self, incident_id: IncidentId) -> Result<Incident> {
        Ok(self.store.get_incident(incident_id).await?)
    }

    pub async fn incident_for_channel(&self, channel_id: &str) -> Result<Incident> {
        if channel_id.trim().is_empty() {
            return Err(Error::validation("channel id must not be empty"));
        }
        Ok(self.store.get_incident_by_channel(channel_id).await?)
    }

    pub async fn incidents_since(&self, since: DateTime<Utc>) -> Result<Vec<Incident>> {
        Ok(self.store.list_incidents_since(since).await?)
    }
}

fn clean_set(values: Vec<String>) -> BTreeSet<String> {
    values
        .into_iter()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .collect()
}
