//! Slack Web API response shapes.
//!
//! Only the fields the engine reads are modelled; everything else in the
//! payloads is ignored.

use incident::{ChannelInfo, DirectoryUser, UserGroup};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub(crate) struct AuthTest {
    pub user_id: String,
    pub team_id: String,
    #[serde(default)]
    pub bot_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Conversation {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub is_private: bool,
}

impl From<Conversation> for ChannelInfo {
    fn from(c: Conversation) -> Self {
        Self {
            id: c.id,
            name: c.name,
            is_private: c.is_private,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct ConversationResponse {
    pub channel: Conversation,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct ResponseMetadata {
    #[serde(default)]
    pub next_cursor: String,
}

impl ResponseMetadata {
    /// Slack signals the last page with an empty cursor.
    pub fn cursor(&self) -> Option<String> {
        (!self.next_cursor.is_empty()).then(|| self.next_cursor.clone())
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct MembersResponse {
    #[serde(default)]
    pub members: Vec<String>,
    #[serde(default)]
    pub response_metadata: ResponseMetadata,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct Profile {
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub real_name: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SlackUser {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub real_name: Option<String>,
    #[serde(default)]
    pub deleted: bool,
    #[serde(default)]
    pub is_bot: bool,
    #[serde(default)]
    pub profile: Profile,
}

impl From<SlackUser> for DirectoryUser {
    fn from(u: SlackUser) -> Self {
        let real_name = u
            .real_name
            .filter(|n| !n.is_empty())
            .unwrap_or(u.profile.real_name);
        Self {
            id: u.id,
            name: u.name,
            real_name,
            display_name: u.profile.display_name,
            is_bot: u.is_bot,
            deleted: u.deleted,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct UsersListResponse {
    #[serde(default)]
    pub members: Vec<SlackUser>,
    #[serde(default)]
    pub response_metadata: ResponseMetadata,
}

#[derive(Debug, Deserialize)]
pub(crate) struct UserInfoResponse {
    pub user: SlackUser,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Bot {
    #[serde(default)]
    pub user_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct BotInfoResponse {
    pub bot: Bot,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SlackUserGroup {
    pub id: String,
    #[serde(default)]
    pub handle: String,
    #[serde(default)]
    pub name: String,
}

impl From<SlackUserGroup> for UserGroup {
    fn from(g: SlackUserGroup) -> Self {
        Self {
            id: g.id,
            handle: g.handle,
            name: g.name,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct UserGroupsResponse {
    #[serde(default)]
    pub usergroups: Vec<SlackUserGroup>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct UserGroupUsersResponse {
    #[serde(default)]
    pub users: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct PostMessageResponse {
    pub ts: String,
}

/// Write calls whose success payload carries nothing we need.
#[derive(Debug, Deserialize)]
pub(crate) struct Empty {}

// =============================================================================
// Request bodies
// =============================================================================

#[derive(Debug, Serialize)]
pub(crate) struct CreateConversation<'a> {
    pub name: &'a str,
    pub is_private: bool,
}

#[derive(Debug, Serialize)]
pub(crate) struct SetPurpose<'a> {
    pub channel: &'a str,
    pub purpose: &'a str,
}

#[derive(Debug, Serialize)]
pub(crate) struct SetTopic<'a> {
    pub channel: &'a str,
    pub topic: &'a str,
}

#[derive(Debug, Serialize)]
pub(crate) struct Invite<'a> {
    pub channel: &'a str,
    /// Comma-separated user ids
    pub users: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct AddBookmark<'a> {
    pub channel_id: &'a str,
    pub title: &'a str,
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub link: &'a str,
}

#[derive(Debug, Serialize)]
pub(crate) struct PostMessage<'a> {
    pub channel: &'a str,
    pub text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blocks: Option<&'a serde_json::Value>,
}

#[derive(Debug, Serialize)]
pub(crate) struct UpdateMessage<'a> {
    pub channel: &'a str,
    pub ts: &'a str,
    pub text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blocks: Option<&'a serde_json::Value>,
}
