//! Shared fakes for integration tests.

#![allow(dead_code)]

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use incident::{
    Catalog, Category, ChannelInfo, Config, DetailChanges, DirectoryUser, Identity, Incident,
    IncidentCoordinator, IncidentId, IncidentRequest, IncidentStatus, IncidentStore, MemberPage,
    MemoryStore, MessagingError, Messenger, OutgoingMessage, SeverityLevel, StatusHistory,
    StoreError, User, UserGroup,
};

// =============================================================================
// Messenger
// =============================================================================

/// Everything the fake messenger knows and everything it was asked to do.
#[derive(Default)]
pub struct FakeState {
    pub team_id: String,
    pub users: Vec<DirectoryUser>,
    pub bots: HashMap<String, String>,
    pub groups: Vec<UserGroup>,
    pub group_members: HashMap<String, Vec<String>>,
    pub member_pages: Vec<MemberPage>,
    /// Methods that fail with `fake_failure`
    pub failing: HashSet<&'static str>,
    /// Error returned by `invite_users` instead of the generic failure
    pub invite_error: Option<MessagingError>,

    pub calls: Vec<&'static str>,
    pub created_channels: Vec<(String, bool)>,
    pub invites: Vec<(String, Vec<String>)>,
    pub posts: Vec<(String, OutgoingMessage)>,
    pub updates: Vec<(String, String, OutgoingMessage)>,
    pub topics: Vec<(String, String)>,
    pub purposes: Vec<(String, String)>,
    pub bookmarks: Vec<(String, String, String)>,
    next_id: usize,
}

/// In-memory stand-in for the messaging platform.
pub struct FakeMessenger {
    state: Mutex<FakeState>,
    /// Yield to the runtime before every call so concurrent work interleaves
    yielding: AtomicBool,
}

impl FakeMessenger {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(FakeState {
                team_id: "T0001".to_string(),
                ..Default::default()
            }),
            yielding: AtomicBool::new(false),
        }
    }

    /// Make every call a suspension point.
    pub fn yield_on_calls(&self) {
        self.yielding.store(true, Ordering::SeqCst);
    }

    pub fn state(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap()
    }

    pub fn fail(&self, method: &'static str) {
        self.state().failing.insert(method);
    }

    pub fn add_user(&self, id: &str, name: &str, real_name: &str) {
        self.state().users.push(DirectoryUser {
            id: id.to_string(),
            name: name.to_string(),
            real_name: real_name.to_string(),
            ..Default::default()
        });
    }

    pub fn calls_to(&self, method: &str) -> usize {
        self.state().calls.iter().filter(|c| **c == method).count()
    }

    async fn pause(&self) {
        if self.yielding.load(Ordering::SeqCst) {
            tokio::task::yield_now().await;
        }
    }

    fn enter(&self, method: &'static str) -> Result<MutexGuard<'_, FakeState>, MessagingError> {
        let mut state = self.state();
        state.calls.push(method);
        if state.failing.contains(method) {
            return Err(MessagingError::Api {
                method: method.to_string(),
                error: "fake_failure".to_string(),
            });
        }
        Ok(state)
    }
}

#[async_trait]
impl Messenger for FakeMessenger {
    async fn identity(&self) -> Result<Identity, MessagingError> {
        self.pause().await;
        let state = self.enter("identity")?;
        Ok(Identity {
            user_id: "UBOT".to_string(),
            team_id: state.team_id.clone(),
            bot_id: Some("BBOT".to_string()),
        })
    }

    async fn create_channel(
        &self,
        name: &str,
        private: bool,
    ) -> Result<ChannelInfo, MessagingError> {
        self.pause().await;
        let mut state = self.enter("create_channel")?;
        state.next_id += 1;
        state.created_channels.push((name.to_string(), private));
        Ok(ChannelInfo {
            id: format!("CINC{}", state.next_id),
            name: name.to_string(),
            is_private: private,
        })
    }

    async fn set_purpose(&self, channel_id: &str, purpose: &str) -> Result<(), MessagingError> {
        self.pause().await;
        let mut state = self.enter("set_purpose")?;
        state.purposes.push((channel_id.to_string(), purpose.to_string()));
        Ok(())
    }

    async fn set_topic(&self, channel_id: &str, topic: &str) -> Result<(), MessagingError> {
        self.pause().await;
        let mut state = self.enter("set_topic")?;
        state.topics.push((channel_id.to_string(), topic.to_string()));
        Ok(())
    }

    async fn invite_users(
        &self,
        channel_id: &str,
        user_ids: &[String],
    ) -> Result<(), MessagingError> {
        self.pause().await;
        let mut state = self.enter("invite_users")?;
        state.invites.push((channel_id.to_string(), user_ids.to_vec()));
        match state.invite_error.clone() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    async fn add_bookmark(
        &self,
        channel_id: &str,
        title: &str,
        link: &str,
    ) -> Result<(), MessagingError> {
        self.pause().await;
        let mut state = self.enter("add_bookmark")?;
        state
            .bookmarks
            .push((channel_id.to_string(), title.to_string(), link.to_string()));
        Ok(())
    }

    async fn post_message(
        &self,
        channel_id: &str,
        message: &OutgoingMessage,
    ) -> Result<String, MessagingError> {
        self.pause().await;
        let mut state = self.enter("post_message")?;
        state.next_id += 1;
        state.posts.push((channel_id.to_string(), message.clone()));
        Ok(format!("1700000000.{:06}", state.next_id))
    }

    async fn update_message(
        &self,
        channel_id: &str,
        ts: &str,
        message: &OutgoingMessage,
    ) -> Result<(), MessagingError> {
        self.pause().await;
        let mut state = self.enter("update_message")?;
        state
            .updates
            .push((channel_id.to_string(), ts.to_string(), message.clone()));
        Ok(())
    }

    async fn conversation_info(&self, channel_id: &str) -> Result<ChannelInfo, MessagingError> {
        self.pause().await;
        let _state = self.enter("conversation_info")?;
        Ok(ChannelInfo {
            id: channel_id.to_string(),
            name: format!("name-of-{}", channel_id.to_lowercase()),
            is_private: false,
        })
    }

    async fn conversation_members(
        &self,
        _channel_id: &str,
        cursor: Option<&str>,
    ) -> Result<MemberPage, MessagingError> {
        self.pause().await;
        let state = self.enter("conversation_members")?;
        let index = cursor.and_then(|c| c.parse::<usize>().ok()).unwrap_or(0);
        Ok(state.member_pages.get(index).cloned().unwrap_or_default())
    }

    async fn list_users(&self) -> Result<Vec<DirectoryUser>, MessagingError> {
        self.pause().await;
        let state = self.enter("list_users")?;
        Ok(state.users.clone())
    }

    async fn user_info(&self, user_id: &str) -> Result<DirectoryUser, MessagingError> {
        self.pause().await;
        let state = self.enter("user_info")?;
        state
            .users
            .iter()
            .find(|u| u.id == user_id)
            .cloned()
            .ok_or_else(|| MessagingError::Api {
                method: "users.info".to_string(),
                error: "user_not_found".to_string(),
            })
    }

    async fn bot_user_id(&self, bot_id: &str) -> Result<String, MessagingError> {
        self.pause().await;
        let state = self.enter("bot_user_id")?;
        state.bots.get(bot_id).cloned().ok_or_else(|| MessagingError::Api {
            method: "bots.info".to_string(),
            error: "bot_not_found".to_string(),
        })
    }

    async fn list_user_groups(&self) -> Result<Vec<UserGroup>, MessagingError> {
        self.pause().await;
        let state = self.enter("list_user_groups")?;
        Ok(state.groups.clone())
    }

    async fn user_group_members(&self, group_id: &str) -> Result<Vec<String>, MessagingError> {
        self.pause().await;
        let state = self.enter("user_group_members")?;
        state
            .group_members
            .get(group_id)
            .cloned()
            .ok_or_else(|| MessagingError::Api {
                method: "usergroups.users.list".to_string(),
                error: "no_such_subteam".to_string(),
            })
    }
}

// =============================================================================
// Store
// =============================================================================

/// Memory store with switches that make individual operations fail.
#[derive(Default)]
pub struct FlakyStore {
    pub inner: MemoryStore,
    pub fail_allocate: AtomicBool,
    pub fail_put_incident: AtomicBool,
    pub fail_add_history: AtomicBool,
    pub fail_status_update: AtomicBool,
    pub fail_delete_request: AtomicBool,
    pub history_writes: AtomicUsize,
    pub status_updates: AtomicUsize,
}

fn check(flag: &AtomicBool, what: &str) -> Result<(), StoreError> {
    if flag.load(Ordering::SeqCst) {
        Err(StoreError::Backend(format!("{what} unavailable")))
    } else {
        Ok(())
    }
}

impl FlakyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(flag: &AtomicBool, value: bool) {
        flag.store(value, Ordering::SeqCst);
    }
}

#[async_trait]
impl IncidentStore for FlakyStore {
    async fn allocate_next_incident_number(&self) -> Result<IncidentId, StoreError> {
        check(&self.fail_allocate, "counter")?;
        self.inner.allocate_next_incident_number().await
    }

    async fn put_incident(&self, incident: &Incident) -> Result<(), StoreError> {
        check(&self.fail_put_incident, "incidents")?;
        self.inner.put_incident(incident).await
    }

    async fn get_incident(&self, id: IncidentId) -> Result<Incident, StoreError> {
        self.inner.get_incident(id).await
    }

    async fn get_incident_by_channel(&self, channel_id: &str) -> Result<Incident, StoreError> {
        self.inner.get_incident_by_channel(channel_id).await
    }

    async fn list_incidents_since(
        &self,
        since: DateTime<Utc>,
    ) -> Result<Vec<Incident>, StoreError> {
        self.inner.list_incidents_since(since).await
    }

    async fn update_incident_status(
        &self,
        id: IncidentId,
        status: IncidentStatus,
    ) -> Result<(), StoreError> {
        check(&self.fail_status_update, "incidents")?;
        self.status_updates.fetch_add(1, Ordering::SeqCst);
        self.inner.update_incident_status(id, status).await
    }

    async fn update_incident_details(
        &self,
        id: IncidentId,
        changes: &DetailChanges,
    ) -> Result<Incident, StoreError> {
        check(&self.fail_put_incident, "incidents")?;
        self.inner.update_incident_details(id, changes).await
    }

    async fn add_joined_member(
        &self,
        id: IncidentId,
        user_id: &str,
    ) -> Result<Incident, StoreError> {
        check(&self.fail_put_incident, "incidents")?;
        self.inner.add_joined_member(id, user_id).await
    }

    async fn set_joined_members(
        &self,
        id: IncidentId,
        members: &BTreeSet<String>,
    ) -> Result<Incident, StoreError> {
        check(&self.fail_put_incident, "incidents")?;
        self.inner.set_joined_members(id, members).await
    }

    async fn add_status_history(&self, entry: &StatusHistory) -> Result<(), StoreError> {
        check(&self.fail_add_history, "status history")?;
        self.history_writes.fetch_add(1, Ordering::SeqCst);
        self.inner.add_status_history(entry).await
    }

    async fn get_status_histories(&self, id: IncidentId) -> Result<Vec<StatusHistory>, StoreError> {
        self.inner.get_status_histories(id).await
    }

    async fn save_incident_request(&self, request: &IncidentRequest) -> Result<(), StoreError> {
        self.inner.save_incident_request(request).await
    }

    async fn get_incident_request(&self, id: &str) -> Result<IncidentRequest, StoreError> {
        self.inner.get_incident_request(id).await
    }

    async fn delete_incident_request(&self, id: &str) -> Result<(), StoreError> {
        check(&self.fail_delete_request, "requests")?;
        self.inner.delete_incident_request(id).await
    }

    async fn take_incident_request(&self, id: &str) -> Result<IncidentRequest, StoreError> {
        check(&self.fail_delete_request, "requests")?;
        self.inner.take_incident_request(id).await
    }

    async fn put_user(&self, user: &User) -> Result<(), StoreError> {
        self.inner.put_user(user).await
    }

    async fn get_user(&self, id: &str) -> Result<User, StoreError> {
        self.inner.get_user(id).await
    }
}

// =============================================================================
// Wiring
// =============================================================================

pub fn catalog() -> Catalog {
    Catalog {
        categories: vec![
            Category {
                id: "database".to_string(),
                name: "Database".to_string(),
                description: "Database incidents".to_string(),
                invite_users: vec!["UDBA0001".to_string(), "@carol".to_string()],
                invite_groups: vec![],
            },
            Category {
                id: "frontend".to_string(),
                name: "Frontend".to_string(),
                description: String::new(),
                invite_users: vec![],
                invite_groups: vec![],
            },
        ],
        severities: vec![
            SeverityLevel {
                id: "sev1".to_string(),
                name: "SEV1".to_string(),
                description: "Customer facing outage".to_string(),
            },
            SeverityLevel {
                id: "sev2".to_string(),
                name: "SEV2".to_string(),
                description: String::new(),
            },
        ],
    }
}

pub fn config() -> Config {
    Config::default().with_catalog(catalog())
}

pub struct Harness {
    pub coordinator: IncidentCoordinator,
    pub store: Arc<FlakyStore>,
    pub messenger: Arc<FakeMessenger>,
}

pub fn harness_with(config: Config) -> Harness {
    let store = Arc::new(FlakyStore::new());
    let messenger = Arc::new(FakeMessenger::new());
    let coordinator = IncidentCoordinator::new(config, store.clone(), messenger.clone());
    Harness {
        coordinator,
        store,
        messenger,
    }
}

pub fn harness() -> Harness {
    harness_with(config())
}

pub fn new_incident(title: &str) -> incident::NewIncident {
    incident::NewIncident {
        title: title.to_string(),
        description: String::new(),
        category_id: "unknown".to_string(),
        severity_id: None,
        asset_ids: vec![],
        origin_channel_id: "CORIGIN".to_string(),
        origin_channel_name: "general".to_string(),
        creator_id: "UCREATOR".to_string(),
        initial_triage: true,
        private: false,
    }
}
