//! HTTP server for Slack slash commands and interactions.
//!
//! Slack expects an answer within three seconds, so every handler verifies,
//! parses and acknowledges; the actual work goes through the coordinator's
//! dispatcher.

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::Json,
    routing::{get, post},
    Router,
};
use incident::messages::ACTION_CREATE_INCIDENT;
use incident::{IncidentCoordinator, RequestDraft};
use serde_json::{json, Value};
use tower::ServiceBuilder;
use tower_http::{limit::RequestBodyLimitLayer, trace::TraceLayer};
use tracing::{debug, info, warn};

use crate::commands::{self, Command, SlashCommand, HELP};
use crate::form::parse_form;
use crate::interactions::InteractionPayload;
use crate::webhooks::{
    validate_request_timestamp, verify_slack_signature, SIGNATURE_HEADER, TIMESTAMP_HEADER,
};

/// Slack payloads are small; anything bigger is not from Slack.
const MAX_BODY_BYTES: usize = 1024 * 1024;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub coordinator: IncidentCoordinator,
    /// Slack signing secret; `None` disables verification
    pub signing_secret: Option<String>,
    pub max_request_age_secs: i64,
}

/// Build the HTTP router for the bot.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/slack/commands", post(slash_command_handler))
        .route("/slack/interactions", post(interaction_handler))
        .route("/health", get(health_check))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES)),
        )
        .with_state(state)
}

/// Health check endpoint.
async fn health_check() -> Json<Value> {
    Json(json!({ "status": "healthy" }))
}

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

/// Check signature and freshness when a signing secret is configured.
fn verify_request(state: &AppState, headers: &HeaderMap, body: &[u8]) -> Result<(), StatusCode> {
    let Some(secret) = &state.signing_secret else {
        return Ok(());
    };

    let (Some(timestamp), Some(signature)) = (
        header(headers, TIMESTAMP_HEADER),
        header(headers, SIGNATURE_HEADER),
    ) else {
        warn!("Missing Slack signature headers");
        return Err(StatusCode::UNAUTHORIZED);
    };

    let Ok(timestamp_secs) = timestamp.parse::<i64>() else {
        warn!(timestamp, "Malformed Slack request timestamp");
        return Err(StatusCode::BAD_REQUEST);
    };
    if !validate_request_timestamp(timestamp_secs, state.max_request_age_secs) {
        warn!(timestamp = timestamp_secs, "Slack request timestamp is stale");
        return Err(StatusCode::BAD_REQUEST);
    }

    if !verify_slack_signature(body, timestamp, signature, secret) {
        warn!("Invalid Slack request signature");
        return Err(StatusCode::UNAUTHORIZED);
    }
    debug!("Slack signature verified");
    Ok(())
}

fn ephemeral(text: &str) -> Json<Value> {
    Json(json!({ "response_type": "ephemeral", "text": text }))
}

/// Handle `/incident` slash commands.
pub async fn slash_command_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, StatusCode> {
    verify_request(&state, &headers, &body)?;

    let form = parse_form(&body);
    let Some(invocation) = SlashCommand::from_form(&form) else {
        warn!("Slash command without user or channel");
        return Err(StatusCode::BAD_REQUEST);
    };

    let command = match commands::parse(&invocation.text) {
        Ok(command) => command,
        Err(message) => return Ok(ephemeral(&message)),
    };
    info!(
        user_id = %invocation.user_id,
        channel_id = %invocation.channel_id,
        command = ?command,
        "Received slash command"
    );

    let coordinator = state.coordinator.clone();
    let dispatcher = coordinator.dispatcher().clone();
    let SlashCommand {
        user_id, channel_id, ..
    } = invocation;

    let reply = match command {
        Command::Help => HELP,
        Command::Declare { title } => {
            dispatcher.dispatch("open_request", async move {
                coordinator
                    .open_request(RequestDraft {
                        origin_channel_id: channel_id,
                        title,
                        requested_by: user_id,
                        ..Default::default()
                    })
                    .await
                    .map(|_| ())
            });
            ":hourglass_flowing_sand: Preparing an incident request..."
        }
        Command::Status { status, note } => {
            dispatcher.dispatch("update_status", async move {
                let incident = coordinator.incident_for_channel(&channel_id).await?;
                coordinator
                    .update_status(incident.id, status, &user_id, note.as_deref())
                    .await
                    .map(|_| ())
            });
            ":arrows_counterclockwise: Updating the incident status..."
        }
        Command::Invite { users, groups } => {
            dispatcher.dispatch("invite_users", async move {
                let incident = coordinator.incident_for_channel(&channel_id).await?;
                let result = coordinator
                    .invite_users_by_list(&users, &groups, &incident.channel_id)
                    .await?;
                info!(
                    incident_id = incident.id,
                    succeeded = result.succeeded(),
                    failed = result.failed(),
                    "Processed invite command"
                );
                Ok::<(), incident::Error>(())
            });
            ":incoming_envelope: Sending invitations..."
        }
    };

    Ok(ephemeral(reply))
}

/// Handle interactive component callbacks.
pub async fn interaction_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<StatusCode, StatusCode> {
    verify_request(&state, &headers, &body)?;

    let payload = InteractionPayload::from_form(&parse_form(&body)).map_err(|e| {
        warn!(error = %e, "Rejected interaction payload");
        StatusCode::BAD_REQUEST
    })?;

    if !payload.is_block_actions() {
        debug!(kind = %payload.kind, "Ignoring unhandled interaction type");
        return Ok(StatusCode::OK);
    }

    for request_id in payload.action_values(ACTION_CREATE_INCIDENT) {
        info!(request_id, user_id = %payload.user.id, "Create incident button clicked");
        drop(state.coordinator.handle_create_incident_action_async(
            request_id,
            &payload.user.id,
            payload.channel_id(),
        ));
    }

    Ok(StatusCode::OK)
}
