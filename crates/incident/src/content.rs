//! Generated-content collaborator.
//!
//! A generator turns chat context into a suggested title, description and
//! category. Anything it returns that does not parse is treated as "no
//! enhancement available".

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::config::Catalog;
use crate::error::Result;

/// Produces raw (ideally JSON) suggestions from conversation context.
#[async_trait]
pub trait ContentGenerator: Send + Sync {
    async fn generate(&self, context: &str) -> Result<String>;
}

/// Parsed suggestion.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct GeneratedContent {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub category: String,
}

impl GeneratedContent {
    /// Parse generator output; accepts a bare object or one wrapped in a
    /// fenced code block. Returns `None` for anything else.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        let body = trimmed
            .strip_prefix("```json")
            .or_else(|| trimmed.strip_prefix("```"))
            .and_then(|rest| rest.trim_end().strip_suffix("```"))
            .unwrap_or(trimmed)
            .trim();

        let parsed: Self = serde_json::from_str(body).ok()?;
        if parsed.title.trim().is_empty()
            && parsed.description.trim().is_empty()
            && parsed.category.trim().is_empty()
        {
            return None;
        }
        Some(parsed)
    }
}

/// Fields a caller supplied by hand; generated values only fill the gaps.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Proposal {
    pub title: String,
    pub description: String,
    pub category_id: String,
}

impl Proposal {
    /// Merge a suggestion into this proposal.
    ///
    /// Non-empty manual values win; a suggested category is only taken when
    /// the catalog knows it.
    #[must_use]
    pub fn enhance(mut self, generated: &GeneratedContent, catalog: &Catalog) -> Self {
        if self.title.trim().is_empty() {
            self.title = generated.title.trim().to_string();
        }
        if self.description.trim().is_empty() {
            self.description = generated.description.trim().to_string();
        }
        if self.category_id.trim().is_empty() {
            let suggested = generated.category.trim();
            if catalog.category(suggested).is_some() {
                self.category_id = suggested.to_string();
            } else if !suggested.is_empty() {
                debug!(category = suggested, "Ignoring unknown generated category");
            }
        }
        self
    }
}

/// Ask the generator for a suggestion; every failure degrades to `None`.
pub async fn suggest(generator: &dyn ContentGenerator, context: &str) -> Option<GeneratedContent> {
    if context.trim().is_empty() {
        return None;
    }
    match generator.generate(context).await {
        Ok(raw) => {
            let parsed = GeneratedContent::parse(&raw);
            if parsed.is_none() {
                warn!("Generated content was malformed, using manual values");
            }
            parsed
        }
        Err(e) => {
            warn!(error = %e, "Content generation failed, using manual values");
            None
        }
    }
}
