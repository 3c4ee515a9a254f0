//! Invitation resolution.
//!
//! Turns configured references into concrete user ids and invites them in one
//! batch call. A bad reference only ever affects its own [`InviteDetail`];
//! the batch itself fails only when the target channel is missing.
//!
//! Accepted user references:
//! - `U024BE7LH`, `W012A3CDE`, `<@U024BE7LH>` - user ids, used as-is
//! - `B01ABCDEF` - bot ids, translated to the bot's user id
//! - `@alice`, `alice`, `Alice Liddell` - directory lookup by name
//!
//! Accepted group references: `@dba-oncall`, `dba-oncall`, `S0614TZR7`,
//! `<!subteam^S0614TZR7|@dba-oncall>`.

use std::collections::HashSet;
use std::sync::{Arc, LazyLock};

use futures::future::join_all;
use regex::Regex;
use tracing::{debug, info, instrument, warn};

use crate::error::{Error, MessagingError, Result};
use crate::messaging::{DirectoryUser, Messenger, UserGroup};
use crate::model::{InvitationResult, InviteDetail, InviteStatus};

/// Failure reason for bot ids that cannot be translated.
pub const BOT_NOT_FOUND: &str = "bot not found";
/// Failure reason for names with no directory match.
pub const USER_NOT_FOUND: &str = "user not found";

static USER_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[UW][A-Z0-9]+$").expect("static regex is valid"));
static BOT_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^B[A-Z0-9]+$").expect("static regex is valid"));
static GROUP_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^S[A-Z0-9]+$").expect("static regex is valid"));

#[derive(Debug, PartialEq, Eq)]
enum UserRef<'a> {
    User(&'a str),
    Bot(&'a str),
    Name(&'a str),
    Empty,
}

#[derive(Debug, PartialEq, Eq)]
enum GroupRef<'a> {
    Id(&'a str),
    Handle(&'a str),
    Empty,
}

fn classify_user(raw: &str) -> UserRef<'_> {
    let mut reference = raw.trim();
    if let Some(inner) = reference.strip_prefix("<@").and_then(|r| r.strip_suffix('>')) {
        reference = inner.split('|').next().unwrap_or(inner);
    }
    if USER_ID.is_match(reference) {
        return UserRef::User(reference);
    }
    if BOT_ID.is_match(reference) {
        return UserRef::Bot(reference);
    }
    let name = reference.trim_start_matches('@').trim();
    if name.is_empty() {
        UserRef::Empty
    } else {
        UserRef::Name(name)
    }
}

fn classify_group(raw: &str) -> GroupRef<'_> {
    let mut reference = raw.trim();
    if let Some(inner) = reference
        .strip_prefix("<!subteam^")
        .and_then(|r| r.strip_suffix('>'))
    {
        reference = inner.split('|').next().unwrap_or(inner);
    }
    if GROUP_ID.is_match(reference) {
        return GroupRef::Id(reference);
    }
    let handle = reference.trim_start_matches('@').trim();
    if handle.is_empty() {
        GroupRef::Empty
    } else {
        GroupRef::Handle(handle)
    }
}

/// Resolves references and runs batch invitations.
#[derive(Clone)]
pub struct InvitationResolver {
    messenger: Arc<dyn Messenger>,
}

impl InvitationResolver {
    pub fn new(messenger: Arc<dyn Messenger>) -> Self {
        Self { messenger }
    }

    /// Resolve user and group references into invite details.
    ///
    /// Every user reference yields exactly one detail. Every group yields one
    /// detail per member, or none if the group cannot be looked up.
    #[instrument(skip_all, fields(users = user_refs.len(), groups = group_refs.len()))]
    pub async fn resolve(&self, user_refs: &[String], group_refs: &[String]) -> Vec<InviteDetail> {
        let mut details = Vec::with_capacity(user_refs.len());
        let mut directory: Option<Result<Vec<DirectoryUser>, MessagingError>> = None;

        for raw in user_refs {
            let detail = match classify_user(raw) {
                UserRef::User(id) => InviteDetail::resolved(id, raw.as_str(), None),
                UserRef::Bot(bot_id) => self.resolve_bot(raw, bot_id).await,
                UserRef::Name(name) => {
                    if directory.is_none() {
                        directory = Some(self.messenger.list_users().await);
                    }
                    match directory.as_ref() {
                        Some(Ok(users)) => resolve_name(users, raw, name),
                        Some(Err(e)) => {
                            warn!(reference = %raw, error = %e, "User directory unavailable");
                            InviteDetail::failed(raw.as_str(), format!("user lookup failed: {e}"))
                        }
                        None => InviteDetail::failed(raw.as_str(), USER_NOT_FOUND),
                    }
                }
                UserRef::Empty => InviteDetail::failed(raw.as_str(), "empty user reference"),
            };
            details.push(detail);
        }

        details.extend(self.expand_groups(group_refs).await);

        debug!(
            total = details.len(),
            resolved = details
                .iter()
                .filter(|d| d.status == InviteStatus::Resolved)
                .count(),
            "Resolved invitation references"
        );
        details
    }

    /// Invite every resolved detail in one call and record the outcome.
    ///
    /// Details that failed resolution are passed through untouched.
    #[instrument(skip(self, details), fields(count = details.len()))]
    pub async fn invite(
        &self,
        channel_id: &str,
        mut details: Vec<InviteDetail>,
    ) -> Result<Vec<InviteDetail>> {
        if channel_id.trim().is_empty() {
            return Err(Error::validation("channel id must not be empty"));
        }

        let mut seen = HashSet::new();
        let user_ids: Vec<String> = details
            .iter()
            .filter(|d| d.status == InviteStatus::Resolved)
            .filter(|d| seen.insert(d.user_id.clone()))
            .map(|d| d.user_id.clone())
            .collect();

        if user_ids.is_empty() {
            debug!("No resolved users to invite");
            return Ok(details);
        }

        let outcome = match self.messenger.invite_users(channel_id, &user_ids).await {
            Ok(()) => Ok(()),
            Err(e) if e.api_code() == Some("already_in_channel") => Ok(()),
            Err(e) => Err(e.to_string()),
        };

        for detail in details
            .iter_mut()
            .filter(|d| d.status == InviteStatus::Resolved)
        {
            match &outcome {
                Ok(()) => {
                    detail.status = InviteStatus::Success;
                    detail.error = None;
                }
                Err(message) => {
                    detail.status = InviteStatus::Failed;
                    detail.error = Some(message.clone());
                }
            }
        }

        match &outcome {
            Ok(()) => info!(invited = user_ids.len(), "Invited users to channel"),
            Err(message) => warn!(
                attempted = user_ids.len(),
                error = %message,
                "Batch invite failed"
            ),
        }
        Ok(details)
    }

    /// Resolve and invite in one go.
    pub async fn invite_by_list(
        &self,
        user_refs: &[String],
        group_refs: &[String],
        channel_id: &str,
    ) -> Result<InvitationResult> {
        if channel_id.trim().is_empty() {
            return Err(Error::validation("channel id must not be empty"));
        }
        let resolved = self.resolve(user_refs, group_refs).await;
        let details = self.invite(channel_id, resolved).await?;
        Ok(InvitationResult { details })
    }

    async fn resolve_bot(&self, raw: &str, bot_id: &str) -> InviteDetail {
        match self.messenger.bot_user_id(bot_id).await {
            Ok(user_id) if !user_id.is_empty() => InviteDetail::resolved(user_id, raw, None),
            Ok(_) => {
                warn!(bot_id, "Bot has no invitable user");
                InviteDetail::failed(raw, BOT_NOT_FOUND)
            }
            Err(e) => {
                warn!(bot_id, error = %e, "Bot lookup failed");
                InviteDetail::failed(raw, BOT_NOT_FOUND)
            }
        }
    }

    async fn expand_groups(&self, group_refs: &[String]) -> Vec<InviteDetail> {
        let needs_listing = group_refs
            .iter()
            .any(|raw| matches!(classify_group(raw), GroupRef::Handle(_)));
        let groups: Vec<UserGroup> = if needs_listing {
            match self.messenger.list_user_groups().await {
                Ok(groups) => groups,
                Err(e) => {
                    warn!(error = %e, "Failed to list user groups, skipping group handles");
                    Vec::new()
                }
            }
        } else {
            Vec::new()
        };

        let targets: Vec<(&String, String)> = group_refs
            .iter()
            .filter_map(|raw| {
                let group_id = match classify_group(raw) {
                    GroupRef::Id(id) => Some(id.to_string()),
                    GroupRef::Handle(handle) => groups
                        .iter()
                        .find(|g| {
                            g.handle.eq_ignore_ascii_case(handle)
                                || g.name.eq_ignore_ascii_case(handle)
                        })
                        .map(|g| g.id.clone()),
                    GroupRef::Empty => None,
                };
                if group_id.is_none() {
                    warn!(reference = %raw, "Group not found, skipping");
                }
                group_id.map(|id| (raw, id))
            })
            .collect();

        let lookups = targets.iter().map(|(raw, group_id)| async move {
            match self.messenger.user_group_members(group_id).await {
                Ok(members) => members
                    .into_iter()
                    .map(|member| InviteDetail::resolved(member, raw.as_str(), None))
                    .collect::<Vec<_>>(),
                Err(e) => {
                    warn!(
                        reference = %raw,
                        group_id = %group_id,
                        error = %e,
                        "Group lookup failed, skipping"
                    );
                    Vec::new()
                }
            }
        });

        join_all(lookups).await.into_iter().flatten().collect()
    }
}

fn resolve_name(users: &[DirectoryUser], raw: &str, name: &str) -> InviteDetail {
    users
        .iter()
        .filter(|user| !user.deleted)
        .find(|user| user.matches_name(name))
        .map_or_else(
            || InviteDetail::failed(raw, USER_NOT_FOUND),
            |user| {
                InviteDetail::resolved(
                    user.id.as_str(),
                    raw,
                    Some(user.preferred_name().to_string()),
                )
            },
        )
}
