//! Storage collaborator.
//!
//! The engine only talks to persistence through [`IncidentStore`]. Every
//! method reports a missing record as [`StoreError::NotFound`] so callers can
//! tell "expired" from "failed".

mod memory;

pub use memory::MemoryStore;

use std::collections::BTreeSet;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::StoreError;
use crate::model::{
    DetailChanges, Incident, IncidentId, IncidentRequest, IncidentStatus, StatusHistory, User,
};

/// Persistence interface consumed by the engine.
#[async_trait]
pub trait IncidentStore: Send + Sync {
    /// Atomically increment and return the global incident counter.
    async fn allocate_next_incident_number(&self) -> Result<IncidentId, StoreError>;

    /// Insert an incident when it is first persisted. Later changes go through
    /// the narrow update methods so concurrent writers never clobber each other.
    async fn put_incident(&self, incident: &Incident) -> Result<(), StoreError>;

    async fn get_incident(&self, id: IncidentId) -> Result<Incident, StoreError>;

    async fn get_incident_by_channel(&self, channel_id: &str) -> Result<Incident, StoreError>;

    /// Incidents created at or after `since`, ordered by id.
    async fn list_incidents_since(&self, since: DateTime<Utc>) -> Result<Vec<Incident>, StoreError>;

    async fn update_incident_status(
        &self,
        id: IncidentId,
        status: IncidentStatus,
    ) -> Result<(), StoreError>;

    /// Apply detail changes in one write; status and membership are untouched.
    async fn update_incident_details(
        &self,
        id: IncidentId,
        changes: &DetailChanges,
    ) -> Result<Incident, StoreError>;

    /// Add one user to the joined-member set.
    async fn add_joined_member(
        &self,
        id: IncidentId,
        user_id: &str,
    ) -> Result<Incident, StoreError>;

    /// Replace the joined-member set.
    async fn set_joined_members(
        &self,
        id: IncidentId,
        members: &BTreeSet<String>,
    ) -> Result<Incident, StoreError>;

    /// Append a history entry. Entries are never modified afterwards.
    async fn add_status_history(&self, entry: &StatusHistory) -> Result<(), StoreError>;

    /// All entries for an incident in insertion order.
    async fn get_status_histories(&self, id: IncidentId) -> Result<Vec<StatusHistory>, StoreError>;

    async fn save_incident_request(&self, request: &IncidentRequest) -> Result<(), StoreError>;

    async fn get_incident_request(&self, id: &str) -> Result<IncidentRequest, StoreError>;

    async fn delete_incident_request(&self, id: &str) -> Result<(), StoreError>;

    /// Remove and return a request in one step. Of several concurrent callers
    /// exactly one gets the request; the rest see not-found.
    async fn take_incident_request(&self, id: &str) -> Result<IncidentRequest, StoreError>;

    async fn put_user(&self, user: &User) -> Result<(), StoreError>;

    async fn get_user(&self, id: &str) -> Result<User, StoreError>;
}
