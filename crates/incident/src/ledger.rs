//! Status state machine and its append-only audit trail.
//!
//! Any status can move to any other status; the only rejected transition is
//! the identity one. Every accepted transition writes a [`StatusHistory`]
//! entry first and updates the incident's status field second:
//!
//! - history write fails: the status field is left untouched
//! - status write fails: the history entry stays (no rollback); the error is
//!   returned and logged, and history remains the source of truth
//!
//! No in-process lock serializes concurrent transitions for one incident; the
//! no-op check is as strong as the store's read-after-write consistency.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, error, info, instrument, warn};

use crate::error::{Error, Result};
use crate::messaging::Messenger;
use crate::model::{
    Incident, IncidentId, IncidentStatus, StatusHistory, StatusHistoryWithUser,
    INITIAL_HISTORY_NOTE,
};
use crate::store::IncidentStore;

#[derive(Clone)]
pub struct StatusLedger {
    store: Arc<dyn IncidentStore>,
    directory: Option<Arc<dyn Messenger>>,
}

impl StatusLedger {
    pub fn new(store: Arc<dyn IncidentStore>) -> Self {
        Self {
            store,
            directory: None,
        }
    }

    /// Use the messaging directory as a second source of display names.
    #[must_use]
    pub fn with_directory(mut self, directory: Arc<dyn Messenger>) -> Self {
        self.directory = Some(directory);
        self
    }

    /// Write the "Incident created" entry for a freshly saved incident.
    pub async fn record_initial(&self, incident: &Incident, actor: &str) -> Result<StatusHistory> {
        let entry = StatusHistory::new(
            incident.id,
            incident.status,
            actor,
            Some(INITIAL_HISTORY_NOTE.to_string()),
        );
        self.store.add_status_history(&entry).await?;
        debug!(incident_id = incident.id, status = %incident.status, "Recorded initial status");
        Ok(entry)
    }

    /// Write the initial entry only if the incident has no history at all.
    ///
    /// Returns `true` when an entry was written.
    pub async fn ensure_initial_entry(&self, incident: &Incident, actor: &str) -> Result<bool> {
        if !self.store.get_status_histories(incident.id).await?.is_empty() {
            return Ok(false);
        }
        self.record_initial(incident, actor).await?;
        info!(incident_id = incident.id, "Repaired missing initial status history");
        Ok(true)
    }

    #[instrument(skip_all, fields(incident_id = incident_id, status = %new_status))]
    pub async fn transition(
        &self,
        incident_id: IncidentId,
        new_status: IncidentStatus,
        actor: &str,
        note: Option<&str>,
    ) -> Result<StatusHistory> {
        validate_id(incident_id)?;
        let actor = actor.trim();
        if actor.is_empty() {
            return Err(Error::validation("actor must not be empty"));
        }

        let incident = self.store.get_incident(incident_id).await?;
        if incident.status == new_status {
            return Err(Error::NoOpTransition {
                id: incident_id,
                status: new_status,
            });
        }

        let note = note.map(str::trim).filter(|n| !n.is_empty()).map(String::from);
        let entry = StatusHistory::new(incident_id, new_status, actor, note);
        self.store.add_status_history(&entry).await?;

        if let Err(e) = self.store.update_incident_status(incident_id, new_status).await {
            error!(
                incident_id,
                history_id = %entry.id,
                error = %e,
                "Status history written but incident status update failed"
            );
            return Err(e.into());
        }

        info!(
            incident_id,
            from = %incident.status,
            to = %new_status,
            actor,
            "Incident status changed"
        );
        Ok(entry)
    }

    /// History oldest-first, each entry with the actor's display name.
    pub async fn history(&self, incident_id: IncidentId) -> Result<Vec<StatusHistoryWithUser>> {
        validate_id(incident_id)?;
        // Surface unknown incidents as not-found rather than an empty trail.
        self.store.get_incident(incident_id).await?;

        let mut entries = self.store.get_status_histories(incident_id).await?;
        entries.sort_by_key(|entry| entry.changed_at);

        let mut names: HashMap<String, String> = HashMap::new();
        let mut enriched = Vec::with_capacity(entries.len());
        for entry in entries {
            let user_name = match names.get(&entry.changed_by) {
                Some(name) => name.clone(),
                None => {
                    let name = self.display_name(&entry.changed_by).await;
                    names.insert(entry.changed_by.clone(), name.clone());
                    name
                }
            };
            enriched.push(StatusHistoryWithUser { entry, user_name });
        }
        Ok(enriched)
    }

    /// Best-known display name; falls back to the raw id and never fails.
    async fn display_name(&self, user_id: &str) -> String {
        match self.store.get_user(user_id).await {
            Ok(user) => return user.preferred_name().to_string(),
            Err(e) if !e.is_not_found() => {
                warn!(user_id, error = %e, "Failed to load user for history");
            }
            Err(_) => {}
        }

        if let Some(directory) = &self.directory {
            match directory.user_info(user_id).await {
                Ok(user) => return user.preferred_name().to_string(),
                Err(e) => debug!(user_id, error = %e, "Directory lookup failed for history"),
            }
        }

        user_id.to_string()
    }
}

fn validate_id(incident_id: IncidentId) -> Result<()> {
    if incident_id <= 0 {
        return Err(Error::validation(format!(
            "incident id must be positive, got {incident_id}"
        )));
    }
    Ok(())
}
