//! Slack Web API client.
//!
//! Reads go out as GET with query parameters, writes as JSON POST. Every
//! response carries an `ok` flag; `ok: false` becomes
//! [`MessagingError::Api`] with Slack's error code so callers can match on
//! codes like `already_in_channel`.

use async_trait::async_trait;
use incident::{
    ChannelInfo, DirectoryUser, Identity, MemberPage, MessagingError, Messenger, OutgoingMessage,
    UserGroup,
};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, RETRY_AFTER};
use reqwest::StatusCode;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use tracing::{debug, instrument, warn};

use crate::models::{
    AddBookmark, AuthTest, BotInfoResponse, ConversationResponse, CreateConversation, Empty,
    Invite, MembersResponse, PostMessage, PostMessageResponse, SetPurpose, SetTopic,
    UpdateMessage, UserGroupUsersResponse, UserGroupsResponse, UserInfoResponse,
    UsersListResponse,
};

/// Slack Web API base URL
const SLACK_API_URL: &str = "https://slack.com/api";

/// Page size for cursor-paginated reads
const PAGE_LIMIT: &str = "200";

/// Retry hint used when a 429 arrives without `Retry-After`
const DEFAULT_RETRY_AFTER_SECS: u64 = 1;

/// Slack bot-token client.
#[derive(Debug, Clone)]
pub struct SlackClient {
    client: reqwest::Client,
    api_url: String,
}

impl SlackClient {
    /// Create a client authenticated with a bot token (`xoxb-...`).
    pub fn new(bot_token: &str) -> Result<Self, MessagingError> {
        if bot_token.trim().is_empty() {
            return Err(MessagingError::NotConfigured(
                "bot token is empty".to_string(),
            ));
        }

        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", bot_token.trim()))
                .map_err(|e| MessagingError::NotConfigured(format!("invalid bot token: {e}")))?,
        );

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .build()
            .map_err(|e| {
                MessagingError::NotConfigured(format!("failed to build HTTP client: {e}"))
            })?;

        Ok(Self {
            client,
            api_url: SLACK_API_URL.to_string(),
        })
    }

    /// Point the client at another API root (tests, proxies).
    #[must_use]
    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = api_url.into().trim_end_matches('/').to_string();
        self
    }

    fn url(&self, method: &str) -> String {
        format!("{}/{method}", self.api_url)
    }

    async fn get<R: DeserializeOwned>(
        &self,
        method: &str,
        query: &[(&str, &str)],
    ) -> Result<R, MessagingError> {
        let response = self
            .client
            .get(self.url(method))
            .query(query)
            .send()
            .await
            .map_err(|e| MessagingError::Transport(format!("{method}: {e}")))?;
        decode(method, response).await
    }

    async fn post<B: Serialize + Sync, R: DeserializeOwned>(
        &self,
        method: &str,
        body: &B,
    ) -> Result<R, MessagingError> {
        let response = self
            .client
            .post(self.url(method))
            .json(body)
            .send()
            .await
            .map_err(|e| MessagingError::Transport(format!("{method}: {e}")))?;
        decode(method, response).await
    }
}

/// Unwrap Slack's `{ "ok": ..., "error": ... }` envelope.
async fn decode<R: DeserializeOwned>(
    method: &str,
    response: reqwest::Response,
) -> Result<R, MessagingError> {
    let status = response.status();
    if status == StatusCode::TOO_MANY_REQUESTS {
        let retry_after_secs = response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(DEFAULT_RETRY_AFTER_SECS);
        warn!(method, retry_after_secs, "Slack rate limit hit");
        return Err(MessagingError::RateLimited { retry_after_secs });
    }
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(MessagingError::Transport(format!(
            "{method} returned {status}: {body}"
        )));
    }

    let body: Value = response
        .json()
        .await
        .map_err(|e| MessagingError::Transport(format!("{method}: invalid response: {e}")))?;

    if !body.get("ok").and_then(Value::as_bool).unwrap_or(false) {
        let error = body
            .get("error")
            .and_then(Value::as_str)
            .unwrap_or("unknown_error")
            .to_string();
        debug!(method, error = %error, "Slack API call failed");
        return Err(MessagingError::Api {
            method: method.to_string(),
            error,
        });
    }

    serde_json::from_value(body)
        .map_err(|e| MessagingError::Transport(format!("{method}: unexpected response shape: {e}")))
}

// =============================================================================
// Messenger
// =============================================================================

#[async_trait]
impl Messenger for SlackClient {
    async fn identity(&self) -> Result<Identity, MessagingError> {
        let auth: AuthTest = self.get("auth.test", &[]).await?;
        Ok(Identity {
            user_id: auth.user_id,
            team_id: auth.team_id,
            bot_id: auth.bot_id,
        })
    }

    #[instrument(skip(self))]
    async fn create_channel(
        &self,
        name: &str,
        private: bool,
    ) -> Result<ChannelInfo, MessagingError> {
        let response: ConversationResponse = self
            .post(
                "conversations.create",
                &CreateConversation {
                    name,
                    is_private: private,
                },
            )
            .await?;
        Ok(response.channel.into())
    }

    async fn set_purpose(&self, channel_id: &str, purpose: &str) -> Result<(), MessagingError> {
        let _: Empty = self
            .post(
                "conversations.setPurpose",
                &SetPurpose {
                    channel: channel_id,
                    purpose,
                },
            )
            .await?;
        Ok(())
    }

    async fn set_topic(&self, channel_id: &str, topic: &str) -> Result<(), MessagingError> {
        let _: Empty = self
            .post(
                "conversations.setTopic",
                &SetTopic {
                    channel: channel_id,
                    topic,
                },
            )
            .await?;
        Ok(())
    }

    #[instrument(skip(self, user_ids), fields(count = user_ids.len()))]
    async fn invite_users(
        &self,
        channel_id: &str,
        user_ids: &[String],
    ) -> Result<(), MessagingError> {
        let _: Empty = self
            .post(
                "conversations.invite",
                &Invite {
                    channel: channel_id,
                    users: user_ids.join(","),
                },
            )
            .await?;
        Ok(())
    }

    async fn add_bookmark(
        &self,
        channel_id: &str,
        title: &str,
        link: &str,
    ) -> Result<(), MessagingError> {
        let _: Empty = self
            .post(
                "bookmarks.add",
                &AddBookmark {
                    channel_id,
                    title,
                    kind: "link",
                    link,
                },
            )
            .await?;
        Ok(())
    }

    async fn post_message(
        &self,
        channel_id: &str,
        message: &OutgoingMessage,
    ) -> Result<String, MessagingError> {
        let response: PostMessageResponse = self
            .post(
                "chat.postMessage",
                &PostMessage {
                    channel: channel_id,
                    text: &message.text,
                    blocks: message.blocks.as_ref(),
                },
            )
            .await?;
        Ok(response.ts)
    }

    async fn update_message(
        &self,
        channel_id: &str,
        ts: &str,
        message: &OutgoingMessage,
    ) -> Result<(), MessagingError> {
        let _: Empty = self
            .post(
                "chat.update",
                &UpdateMessage {
                    channel: channel_id,
                    ts,
                    text: &message.text,
                    blocks: message.blocks.as_ref(),
                },
            )
            .await?;
        Ok(())
    }

    async fn conversation_info(&self, channel_id: &str) -> Result<ChannelInfo, MessagingError> {
        let response: ConversationResponse = self
            .get("conversations.info", &[("channel", channel_id)])
            .await?;
        Ok(response.channel.into())
    }

    async fn conversation_members(
        &self,
        channel_id: &str,
        cursor: Option<&str>,
    ) -> Result<MemberPage, MessagingError> {
        let mut query = vec![("channel", channel_id), ("limit", PAGE_LIMIT)];
        if let Some(cursor) = cursor {
            query.push(("cursor", cursor));
        }
        let response: MembersResponse = self.get("conversations.members", &query).await?;
        Ok(MemberPage {
            next_cursor: response.response_metadata.cursor(),
            members: response.members,
        })
    }

    /// Walks every page of `users.list`.
    #[instrument(skip(self))]
    async fn list_users(&self) -> Result<Vec<DirectoryUser>, MessagingError> {
        let mut users = Vec::new();
        let mut cursor: Option<String> = None;
        loop {
            let page: UsersListResponse = {
                let mut query = vec![("limit", PAGE_LIMIT)];
                if let Some(cursor) = cursor.as_deref() {
                    query.push(("cursor", cursor));
                }
                self.get("users.list", &query).await?
            };
            users.extend(page.members.into_iter().map(DirectoryUser::from));
            match page.response_metadata.cursor() {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }
        debug!(count = users.len(), "Listed workspace users");
        Ok(users)
    }

    async fn user_info(&self, user_id: &str) -> Result<DirectoryUser, MessagingError> {
        let response: UserInfoResponse = self.get("users.info", &[("user", user_id)]).await?;
        Ok(response.user.into())
    }

    async fn bot_user_id(&self, bot_id: &str) -> Result<String, MessagingError> {
        let response: BotInfoResponse = self.get("bots.info", &[("bot", bot_id)]).await?;
        response
            .bot
            .user_id
            .filter(|id| !id.is_empty())
            .ok_or_else(|| MessagingError::Api {
                method: "bots.info".to_string(),
                error: "bot_has_no_user".to_string(),
            })
    }

    async fn list_user_groups(&self) -> Result<Vec<UserGroup>, MessagingError> {
        let response: UserGroupsResponse = self.get("usergroups.list", &[]).await?;
        Ok(response.usergroups.into_iter().map(UserGroup::from).collect())
    }

    async fn user_group_members(&self, group_id: &str) -> Result<Vec<String>, MessagingError> {
        let response: UserGroupUsersResponse = self
            .get("usergroups.users.list", &[("usergroup", group_id)])
            .await?;
        Ok(response.users)
    }
}
