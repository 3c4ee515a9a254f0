//! Engine configuration.
//!
//! Scalar settings come from environment variables; categories and severities
//! come from a YAML catalog file:
//!
//! ```yaml
//! categories:
//!   - id: database
//!     name: Database
//!     invite_users: ["U024BE7LH", "@dba-lead"]
//!     invite_groups: ["@dba-oncall"]
//! severities:
//!   - id: sev1
//!     name: SEV1
//!     description: Customer facing outage
//! ```

use std::env;
use std::path::Path;

use chrono::Duration;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{Error, Result};

const ENV_CHANNEL_PREFIX: &str = "INCIDENT_CHANNEL_PREFIX";
const ENV_INITIAL_TRIAGE: &str = "INCIDENT_INITIAL_TRIAGE";
const ENV_FRONTEND_URL: &str = "INCIDENT_FRONTEND_URL";
const ENV_ANNOUNCEMENT_CHANNEL: &str = "INCIDENT_ANNOUNCEMENT_CHANNEL";
const ENV_REQUEST_TTL_SECS: &str = "INCIDENT_REQUEST_TTL_SECS";
const ENV_MAX_DISPATCH: &str = "INCIDENT_MAX_IN_FLIGHT";
const ENV_CATALOG_FILE: &str = "INCIDENT_CATALOG_FILE";

const DEFAULT_CHANNEL_PREFIX: &str = "inc";
const DEFAULT_REQUEST_TTL_SECS: i64 = 60 * 60;

/// Incident engine configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Prefix of every incident channel name.
    pub channel_prefix: String,
    /// New incidents start in triage; otherwise they start in handling.
    pub initial_triage: bool,
    /// Front-end base URL used for the channel bookmark.
    pub frontend_url: Option<String>,
    /// Channel that gets a notice for every new incident.
    pub announcement_channel: Option<String>,
    /// Lifetime of an incident request prompt.
    pub request_ttl: Duration,
    /// Upper bound on concurrently dispatched background units.
    pub max_in_flight: Option<usize>,
    /// Categories and severities.
    pub catalog: Catalog,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            channel_prefix: DEFAULT_CHANNEL_PREFIX.to_string(),
            initial_triage: true,
            frontend_url: None,
            announcement_channel: None,
            request_ttl: Duration::seconds(DEFAULT_REQUEST_TTL_SECS),
            max_in_flight: None,
            catalog: Catalog::default(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        let catalog = match env::var(ENV_CATALOG_FILE).ok().filter(|s| !s.is_empty()) {
            Some(path) => Catalog::from_file(&path)?,
            None => {
                debug!("{ENV_CATALOG_FILE} not set, starting with an empty catalog");
                Catalog::default()
            }
        };

        let config = Self {
            channel_prefix: env::var(ENV_CHANNEL_PREFIX)
                .ok()
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| DEFAULT_CHANNEL_PREFIX.to_string()),
            initial_triage: env::var(ENV_INITIAL_TRIAGE)
                .map(|v| !(v.eq_ignore_ascii_case("false") || v == "0"))
                .unwrap_or(true),
            frontend_url: env::var(ENV_FRONTEND_URL)
                .ok()
                .filter(|s| !s.is_empty())
                .map(|s| s.trim_end_matches('/').to_string()),
            announcement_channel: env::var(ENV_ANNOUNCEMENT_CHANNEL)
                .ok()
                .filter(|s| !s.is_empty()),
            request_ttl: Duration::seconds(
                env::var(ENV_REQUEST_TTL_SECS)
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .filter(|secs: &i64| *secs > 0)
                    .unwrap_or(DEFAULT_REQUEST_TTL_SECS),
            ),
            max_in_flight: env::var(ENV_MAX_DISPATCH)
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|n: &usize| *n > 0),
            catalog,
        };

        info!(
            prefix = %config.channel_prefix,
            categories = config.catalog.categories.len(),
            severities = config.catalog.severities.len(),
            "Incident configuration loaded"
        );

        Ok(config)
    }

    /// Builder-style catalog override.
    #[must_use]
    pub fn with_catalog(mut self, catalog: Catalog) -> Self {
        self.catalog = catalog;
        self
    }
}

/// Configured categories and severities.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Catalog {
    #[serde(default)]
    pub categories: Vec<Category>,
    #[serde(default)]
    pub severities: Vec<SeverityLevel>,
}

impl Catalog {
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).map_err(|e| Error::Config(format!("invalid catalog: {e}")))
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read {}: {e}", path.display())))?;
        Self::from_yaml(&raw)
    }

    #[must_use]
    pub fn category(&self, id: &str) -> Option<&Category> {
        self.categories.iter().find(|c| c.id == id)
    }

    #[must_use]
    pub fn severity(&self, id: &str) -> Option<&SeverityLevel> {
        self.severities.iter().find(|s| s.id == id)
    }
}

/// Incident category and who gets pulled in for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// User ids, bot ids or `@names`
    #[serde(default)]
    pub invite_users: Vec<String>,
    /// Group handles or ids
    #[serde(default)]
    pub invite_groups: Vec<String>,
}

impl Category {
    #[must_use]
    pub fn has_invitees(&self) -> bool {
        !self.invite_users.is_empty() || !self.invite_groups.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeverityLevel {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
}
