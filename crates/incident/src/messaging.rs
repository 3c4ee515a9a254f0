//! Messaging platform collaborator.
//!
//! The engine never talks to Slack directly; it consumes [`Messenger`], which
//! the `slack` crate implements against the Web API and tests implement in
//! memory. Calls may fail transiently; the engine does not retry them.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::MessagingError;

/// Who the bot is and which workspace it lives in.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub user_id: String,
    pub team_id: String,
    #[serde(default)]
    pub bot_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelInfo {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub is_private: bool,
}

/// One page of channel members.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemberPage {
    pub members: Vec<String>,
    /// `None` on the last page
    pub next_cursor: Option<String>,
}

/// Directory entry for a workspace user (bots included).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryUser {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub real_name: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub is_bot: bool,
    #[serde(default)]
    pub deleted: bool,
}

impl DirectoryUser {
    /// Whether `wanted` matches the primary, real or display name.
    #[must_use]
    pub fn matches_name(&self, wanted: &str) -> bool {
        [&self.name, &self.real_name, &self.display_name]
            .into_iter()
            .any(|candidate| !candidate.is_empty() && candidate.eq_ignore_ascii_case(wanted))
    }

    /// Best human-facing name.
    #[must_use]
    pub fn preferred_name(&self) -> &str {
        [&self.display_name, &self.real_name]
            .into_iter()
            .find(|candidate| !candidate.is_empty())
            .unwrap_or(&self.name)
    }
}

/// User group (a.k.a. handle like `@dba-oncall`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserGroup {
    pub id: String,
    pub handle: String,
    #[serde(default)]
    pub name: String,
}

/// Message body: fallback text plus optional block layout.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct OutgoingMessage {
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blocks: Option<serde_json::Value>,
}

impl OutgoingMessage {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            blocks: None,
        }
    }

    #[must_use]
    pub fn with_blocks(mut self, blocks: serde_json::Value) -> Self {
        self.blocks = Some(blocks);
        self
    }
}

/// Remote messaging API consumed by the engine.
#[async_trait]
pub trait Messenger: Send + Sync {
    /// Bot identity and team ("who am I").
    async fn identity(&self) -> Result<Identity, MessagingError>;

    async fn create_channel(&self, name: &str, private: bool)
        -> Result<ChannelInfo, MessagingError>;

    async fn set_purpose(&self, channel_id: &str, purpose: &str) -> Result<(), MessagingError>;

    async fn set_topic(&self, channel_id: &str, topic: &str) -> Result<(), MessagingError>;

    /// Invite users in a single call. The call succeeds or fails as a whole.
    async fn invite_users(&self, channel_id: &str, user_ids: &[String])
        -> Result<(), MessagingError>;

    async fn add_bookmark(
        &self,
        channel_id: &str,
        title: &str,
        link: &str,
    ) -> Result<(), MessagingError>;

    /// Post a message and return its timestamp.
    async fn post_message(
        &self,
        channel_id: &str,
        message: &OutgoingMessage,
    ) -> Result<String, MessagingError>;

    async fn update_message(
        &self,
        channel_id: &str,
        ts: &str,
        message: &OutgoingMessage,
    ) -> Result<(), MessagingError>;

    async fn conversation_info(&self, channel_id: &str) -> Result<ChannelInfo, MessagingError>;

    async fn conversation_members(
        &self,
        channel_id: &str,
        cursor: Option<&str>,
    ) -> Result<MemberPage, MessagingError>;

    /// Full user directory.
    async fn list_users(&self) -> Result<Vec<DirectoryUser>, MessagingError>;

    async fn user_info(&self, user_id: &str) -> Result<DirectoryUser, MessagingError>;

    /// Translate a bot id into the user id it can be invited as.
    async fn bot_user_id(&self, bot_id: &str) -> Result<String, MessagingError>;

    async fn list_user_groups(&self) -> Result<Vec<UserGroup>, MessagingError>;

    async fn user_group_members(&self, group_id: &str) -> Result<Vec<String>, MessagingError>;
}
