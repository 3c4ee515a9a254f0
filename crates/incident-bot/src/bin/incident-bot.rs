//! Incident bot binary.
//!
//! Serves Slack slash commands and interactions backed by the incident engine.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use incident::{IncidentCoordinator, MemoryStore, Messenger};
use incident_bot::{server, Args};
use slack::SlackClient;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

fn init_tracing(json: bool) -> Result<()> {
    let filter = EnvFilter::from_default_env()
        .add_directive("incident=info".parse()?)
        .add_directive("incident_bot=info".parse()?);

    if json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(fmt::layer())
            .with(filter)
            .init();
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.json_logs)?;

    info!("Starting incident bot...");

    let config = incident::Config::from_env().context("Failed to load incident configuration")?;
    info!(
        channel_prefix = %config.channel_prefix,
        categories = config.catalog.categories.len(),
        severities = config.catalog.severities.len(),
        "Loaded incident configuration"
    );

    let mut slack =
        SlackClient::new(&args.slack_bot_token).context("Failed to create Slack client")?;
    if let Some(api_url) = &args.slack_api_url {
        slack = slack.with_api_url(api_url.as_str());
    }
    let messenger: Arc<dyn Messenger> = Arc::new(slack);

    // Non-fatal: deep links degrade until the identity can be resolved
    match messenger.identity().await {
        Ok(identity) => info!(
            team_id = %identity.team_id,
            bot_user = %identity.user_id,
            "Connected to Slack"
        ),
        Err(e) => warn!(error = %e, "Could not verify Slack credentials"),
    }

    let signing_secret = args.signing_secret();
    if signing_secret.is_none() {
        warn!("SLACK_SIGNING_SECRET is not set - Slack requests will not be verified");
    }

    let coordinator = IncidentCoordinator::new(config, Arc::new(MemoryStore::new()), messenger);

    let state = server::AppState {
        coordinator,
        signing_secret,
        max_request_age_secs: args.max_request_age_secs,
    };
    let app = server::build_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], args.port));
    let listener = TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    info!(port = args.port, "Incident bot listening");

    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}
