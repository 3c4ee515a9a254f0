//! Incident channel naming.
//!
//! Channel names are `<prefix>-<number>-<slug>`, where the slug is the title
//! lowercased with every run of characters outside `[a-z0-9]` collapsed to a
//! single `-`. An empty slug drops the trailing segment entirely.

use std::sync::LazyLock;

use regex::Regex;

use crate::model::IncidentId;

/// Slack's limit on channel name length.
pub const MAX_CHANNEL_NAME_LEN: usize = 80;

static NON_SLUG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^a-z0-9]+").expect("static regex is valid"));

/// Lowercase ASCII slug of `title`.
#[must_use]
pub fn slugify(title: &str) -> String {
    let lowered = title.to_lowercase();
    NON_SLUG
        .replace_all(&lowered, "-")
        .trim_matches('-')
        .to_string()
}

/// Deterministic channel name for an incident.
///
/// Examples:
/// - `("inc", 1, "database outage")` -> `inc-1-database-outage`
/// - `("inc", 3, "")` -> `inc-3`
#[must_use]
pub fn channel_name(prefix: &str, id: IncidentId, title: &str) -> String {
    let prefix = slugify(prefix);
    let base = if prefix.is_empty() {
        id.to_string()
    } else {
        format!("{prefix}-{id}")
    };

    let slug = slugify(title);
    if slug.is_empty() {
        return base;
    }

    let room = MAX_CHANNEL_NAME_LEN.saturating_sub(base.len() + 1);
    // Slug is pure ASCII, so byte slicing is safe.
    let slug = slug[..slug.len().min(room)].trim_end_matches('-');
    if slug.is_empty() {
        base
    } else {
        format!("{base}-{slug}")
    }
}
