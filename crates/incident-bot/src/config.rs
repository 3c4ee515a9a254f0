//! Command-line and environment settings for the bot service.
//!
//! Engine settings (channel prefix, catalog, request TTL, ...) are read by
//! [`incident::Config::from_env`]; this covers the HTTP and Slack side.

use clap::Parser;

#[derive(Debug, Clone, Parser)]
#[command(name = "incident-bot")]
#[command(about = "Slack bot for declaring and coordinating incidents")]
#[command(version)]
pub struct Args {
    /// HTTP listen port
    #[arg(long, env = "INCIDENT_BOT_PORT", default_value_t = 8080)]
    pub port: u16,

    /// Slack bot token (`xoxb-...`)
    #[arg(long, env = "SLACK_BOT_TOKEN", hide_env_values = true)]
    pub slack_bot_token: String,

    /// Slack signing secret; requests are not verified without it
    #[arg(long, env = "SLACK_SIGNING_SECRET", hide_env_values = true)]
    pub slack_signing_secret: Option<String>,

    /// Maximum age of a signed request, in seconds
    #[arg(long, env = "SLACK_MAX_REQUEST_AGE_SECS", default_value_t = 300)]
    pub max_request_age_secs: i64,

    /// Override the Slack Web API root
    #[arg(long, env = "SLACK_API_URL")]
    pub slack_api_url: Option<String>,

    /// Emit logs as JSON
    #[arg(long, env = "INCIDENT_BOT_JSON_LOGS")]
    pub json_logs: bool,
}

impl Args {
    /// Signing secret, treating an empty value as unset.
    #[must_use]
    pub fn signing_secret(&self) -> Option<String> {
        self.slack_signing_secret
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
    }
}
