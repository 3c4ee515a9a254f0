//! Incident requests: drafts shown behind a "create incident?" prompt.
//!
//! A request lives until it is consumed into an incident or its expiry
//! passes. Reads never hand out an expired request.

use chrono::Utc;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::content::{suggest, Proposal};
use crate::coordinator::{IncidentCoordinator, NewIncident};
use crate::error::{Error, Result};
use crate::messages;
use crate::messaging::OutgoingMessage;
use crate::model::{Incident, IncidentRequest, DEFAULT_CATEGORY};

/// Input for a new incident request.
#[derive(Debug, Clone, Default)]
pub struct RequestDraft {
    pub origin_channel_id: String,
    pub origin_message_ts: Option<String>,
    pub title: String,
    pub description: String,
    pub category_id: String,
    pub severity_id: Option<String>,
    pub asset_ids: Vec<String>,
    pub requested_by: String,
    /// Conversation text handed to the content generator, if any
    pub context: Option<String>,
}

impl IncidentCoordinator {
    /// Save a request and show its prompt in the origin channel.
    #[instrument(
        skip_all,
        fields(channel = %draft.origin_channel_id, requested_by = %draft.requested_by)
    )]
    pub async fn open_request(&self, draft: RequestDraft) -> Result<IncidentRequest> {
        if draft.origin_channel_id.trim().is_empty() {
            return Err(Error::validation("origin channel must not be empty"));
        }
        if draft.requested_by.trim().is_empty() {
            return Err(Error::validation("requester must not be empty"));
        }

        let mut proposal = Proposal {
            title: draft.title,
            description: draft.description,
            category_id: draft.category_id,
        };
        if let (Some(generator), Some(context)) = (&self.generator, draft.context.as_deref()) {
            if let Some(generated) = suggest(generator.as_ref(), context).await {
                proposal = proposal.enhance(&generated, &self.config.catalog);
            }
        }

        let now = Utc::now();
        let mut request = IncidentRequest {
            id: Uuid::new_v4().to_string(),
            origin_channel_id: draft.origin_channel_id,
            origin_message_ts: draft.origin_message_ts,
            prompt_message_ts: None,
            title: proposal.title.trim().to_string(),
            description: proposal.description.trim().to_string(),
            category_id: match proposal.category_id.trim() {
                "" => DEFAULT_CATEGORY.to_string(),
                category => category.to_string(),
            },
            severity_id: draft.severity_id.filter(|s| !s.trim().is_empty()),
            asset_ids: draft.asset_ids,
            requested_by: draft.requested_by,
            created_at: now,
            expires_at: now + self.config.request_ttl,
        };

        match self
            .messenger
            .post_message(
                &request.origin_channel_id,
                &messages::request_prompt(&request, now),
            )
            .await
        {
            Ok(ts) => request.prompt_message_ts = Some(ts),
            Err(e) => warn!(request_id = %request.id, error = %e, "Failed to post request prompt"),
        }

        self.store.save_incident_request(&request).await?;
        info!(
            request_id = %request.id,
            expires_at = %request.expires_at,
            "Incident request opened"
        );
        Ok(request)
    }

    /// Load a live request. Expired requests are removed and reported as
    /// [`Error::RequestExpired`].
    pub async fn request(&self, request_id: &str) -> Result<IncidentRequest> {
        let request_id = request_id.trim();
        if request_id.is_empty() {
            return Err(Error::validation("request id must not be empty"));
        }

        let request = self.store.get_incident_request(request_id).await?;
        if request.is_expired_at(Utc::now()) {
            if let Err(e) = self.store.delete_incident_request(request_id).await {
                debug!(request_id, error = %e, "Could not remove expired request");
            }
            return Err(Error::RequestExpired(request_id.to_string()));
        }
        Ok(request)
    }

    /// Turn a request into an incident and consume it.
    ///
    /// The request is claimed before the pipeline runs, so a repeated click
    /// finds it missing instead of creating a second incident. If creation
    /// fails before the incident is persisted the request is put back.
    #[instrument(skip(self))]
    pub async fn create_from_request(
        &self,
        request_id: &str,
        actor: &str,
        channel_id: &str,
    ) -> Result<Incident> {
        let request_id = request_id.trim();
        if request_id.is_empty() {
            return Err(Error::validation("request id must not be empty"));
        }

        let request = self.store.take_incident_request(request_id).await?;
        if request.is_expired_at(Utc::now()) {
            return Err(Error::RequestExpired(request_id.to_string()));
        }

        let created = self
            .create_incident(NewIncident {
                title: request.title.clone(),
                description: request.description.clone(),
                category_id: request.category_id.clone(),
                severity_id: request.severity_id.clone(),
                asset_ids: request.asset_ids.clone(),
                origin_channel_id: request.origin_channel_id.clone(),
                origin_channel_name: String::new(),
                creator_id: actor.to_string(),
                initial_triage: self.config.initial_triage,
                private: false,
            })
            .await;

        let incident = match created {
            Ok(incident) => incident,
            Err(e @ Error::InitialHistoryMissing { .. }) => return Err(e),
            Err(e) => {
                if let Err(restore_err) = self.store.save_incident_request(&request).await {
                    warn!(request_id, error = %restore_err, "Failed to restore request");
                }
                return Err(e);
            }
        };

        if let Some(ts) = &request.prompt_message_ts {
            let prompt_channel = if channel_id.is_empty() {
                request.origin_channel_id.as_str()
            } else {
                channel_id
            };
            if let Err(e) = self
                .messenger
                .update_message(prompt_channel, ts, &messages::request_consumed(&incident))
                .await
            {
                warn!(request_id, error = %e, "Failed to update request prompt");
            }
        }

        Ok(incident)
    }

    /// Fire-and-forget variant of [`Self::create_from_request`] for button
    /// callbacks. Failures are reported in `channel_id` and logged.
    pub fn handle_create_incident_action_async(
        &self,
        request_id: &str,
        actor: &str,
        channel_id: &str,
    ) -> JoinHandle<()> {
        let coordinator = self.clone();
        let request_id = request_id.to_string();
        let actor = actor.to_string();
        let channel_id = channel_id.to_string();

        self.dispatcher.dispatch("create_incident_from_request", async move {
            match coordinator
                .create_from_request(&request_id, &actor, &channel_id)
                .await
            {
                Ok(incident) => {
                    debug!(incident_id = incident.id, "Incident created from request");
                    Ok(())
                }
                Err(e) => {
                    let notice = if e.is_missing_request() {
                        messages::REQUEST_MISSING
                    } else {
                        messages::CREATE_FAILED
                    };
                    if !channel_id.is_empty() {
                        if let Err(post_err) = coordinator
                            .messenger
                            .post_message(&channel_id, &OutgoingMessage::text(notice))
                            .await
                        {
                            warn!(error = %post_err, "Failed to report creation failure");
                        }
                    }
                    Err(e)
                }
            }
        })
    }
}
