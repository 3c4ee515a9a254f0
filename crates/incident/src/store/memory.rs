//! In-memory [`IncidentStore`] for tests and single-process deployments.

use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use super::IncidentStore;
use crate::error::StoreError;
use crate::model::{
    DetailChanges, Incident, IncidentId, IncidentRequest, IncidentStatus, StatusHistory, User,
    REQUEST_KIND,
};

#[derive(Default)]
struct Tables {
    incidents: HashMap<IncidentId, Incident>,
    histories: HashMap<IncidentId, Vec<StatusHistory>>,
    requests: HashMap<String, IncidentRequest>,
    users: HashMap<String, User>,
}

/// Store backed by process memory.
#[derive(Default)]
pub struct MemoryStore {
    counter: AtomicI64,
    tables: RwLock<Tables>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start numbering after `last_issued` (e.g. when migrating data).
    #[must_use]
    pub fn with_last_issued(last_issued: IncidentId) -> Self {
        Self {
            counter: AtomicI64::new(last_issued),
            tables: RwLock::default(),
        }
    }

    /// Number of stored requests, expired ones included.
    pub async fn request_count(&self) -> usize {
        self.tables.read().await.requests.len()
    }

    /// Change one incident under the write lock and return the result.
    async fn modify_incident<F>(&self, id: IncidentId, change: F) -> Result<Incident, StoreError>
    where
        F: FnOnce(&mut Incident) + Send,
    {
        let mut tables = self.tables.write().await;
        let incident = tables
            .incidents
            .get_mut(&id)
            .ok_or_else(|| StoreError::not_found("incident", id))?;
        change(incident);
        incident.updated_at = Utc::now();
        Ok(incident.clone())
    }
}

#[async_trait]
impl IncidentStore for MemoryStore {
    async fn allocate_next_incident_number(&self) -> Result<IncidentId, StoreError> {
        Ok(self.counter.fetch_add(1, Ordering::SeqCst) + 1)
    }

    async fn put_incident(&self, incident: &Incident) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        tables.incidents.insert(incident.id, incident.clone());
        Ok(())
    }

    async fn get_incident(&self, id: IncidentId) -> Result<Incident, StoreError> {
        self.tables
            .read()
            .await
            .incidents
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("incident", id))
    }

    async fn get_incident_by_channel(&self, channel_id: &str) -> Result<Incident, StoreError> {
        self.tables
            .read()
            .await
            .incidents
            .values()
            .find(|incident| incident.channel_id == channel_id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("incident", format!("channel {channel_id}")))
    }

    async fn list_incidents_since(
        &self,
        since: DateTime<Utc>,
    ) -> Result<Vec<Incident>, StoreError> {
        let tables = self.tables.read().await;
        let mut incidents: Vec<Incident> = tables
            .incidents
            .values()
            .filter(|incident| incident.created_at >= since)
            .cloned()
            .collect();
        incidents.sort_by_key(|incident| incident.id);
        Ok(incidents)
    }

    async fn update_incident_status(
        &self,
        id: IncidentId,
        status: IncidentStatus,
    ) -> Result<(), StoreError> {
        self.modify_incident(id, |incident| incident.status = status)
            .await
            .map(|_| ())
    }

    async fn update_incident_details(
        &self,
        id: IncidentId,
        changes: &DetailChanges,
    ) -> Result<Incident, StoreError> {
        self.modify_incident(id, |incident| changes.apply(incident))
            .await
    }

    async fn add_joined_member(
        &self,
        id: IncidentId,
        user_id: &str,
    ) -> Result<Incident, StoreError> {
        self.modify_incident(id, |incident| {
            incident.joined_members.insert(user_id.to_string());
        })
        .await
    }

    async fn set_joined_members(
        &self,
        id: IncidentId,
        members: &BTreeSet<String>,
    ) -> Result<Incident, StoreError> {
        self.modify_incident(id, |incident| {
            incident.joined_members.clone_from(members);
        })
        .await
    }

    async fn add_status_history(&self, entry: &StatusHistory) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        tables
            .histories
            .entry(entry.incident_id)
            .or_default()
            .push(entry.clone());
        Ok(())
    }

    async fn get_status_histories(&self, id: IncidentId) -> Result<Vec<StatusHistory>, StoreError> {
        Ok(self
            .tables
            .read()
            .await
            .histories
            .get(&id)
            .cloned()
            .unwrap_or_default())
    }

    async fn save_incident_request(&self, request: &IncidentRequest) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        tables.requests.insert(request.id.clone(), request.clone());
        Ok(())
    }

    async fn get_incident_request(&self, id: &str) -> Result<IncidentRequest, StoreError> {
        self.tables
            .read()
            .await
            .requests
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::not_found(REQUEST_KIND, id))
    }

    async fn delete_incident_request(&self, id: &str) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        tables
            .requests
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| StoreError::not_found(REQUEST_KIND, id))
    }

    async fn take_incident_request(&self, id: &str) -> Result<IncidentRequest, StoreError> {
        self.tables
            .write()
            .await
            .requests
            .remove(id)
            .ok_or_else(|| StoreError::not_found(REQUEST_KIND, id))
    }

    async fn put_user(&self, user: &User) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        tables.users.insert(user.id.clone(), user.clone());
        Ok(())
    }

    async fn get_user(&self, id: &str) -> Result<User, StoreError> {
        self.tables
            .read()
            .await
            .users
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("user", id))
    }
}
