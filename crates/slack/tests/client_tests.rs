//! `SlackClient` against a mocked Web API.

use incident::{MessagingError, Messenger, OutgoingMessage};
use serde_json::json;
use slack::SlackClient;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn client(server: &MockServer) -> SlackClient {
    SlackClient::new("xoxb-test")
        .unwrap()
        .with_api_url(server.uri())
}

#[test]
fn test_empty_token_is_rejected() {
    let err = SlackClient::new("  ").unwrap_err();
    assert!(matches!(err, MessagingError::NotConfigured(_)));
}

#[tokio::test]
async fn test_post_message_returns_timestamp() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat.postMessage"))
        .and(header("authorization", "Bearer xoxb-test"))
        .and(body_partial_json(json!({ "channel": "C1", "text": "hello" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "ok": true,
            "channel": "C1",
            "ts": "1700000000.000200"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let ts = client(&server)
        .await
        .post_message("C1", &OutgoingMessage::text("hello"))
        .await
        .unwrap();

    assert_eq!(ts, "1700000000.000200");
}

#[tokio::test]
async fn test_create_channel_maps_conversation() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/conversations.create"))
        .and(body_partial_json(json!({ "name": "inc-1-db", "is_private": true })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "ok": true,
            "channel": { "id": "C0INC1", "name": "inc-1-db", "is_private": true }
        })))
        .mount(&server)
        .await;

    let channel = client(&server)
        .await
        .create_channel("inc-1-db", true)
        .await
        .unwrap();

    assert_eq!(channel.id, "C0INC1");
    assert!(channel.is_private);
}

#[tokio::test]
async fn test_api_error_code_is_preserved() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/conversations.invite"))
        .and(body_partial_json(json!({ "channel": "C1", "users": "U1,U2" })))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "ok": false, "error": "already_in_channel" })),
        )
        .mount(&server)
        .await;

    let err = client(&server)
        .await
        .invite_users("C1", &["U1".to_string(), "U2".to_string()])
        .await
        .unwrap_err();

    assert_eq!(err.api_code(), Some("already_in_channel"));
    assert_eq!(err.to_string(), "conversations.invite failed: already_in_channel");
}

#[tokio::test]
async fn test_rate_limit_carries_retry_after() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/conversations.setTopic"))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "30"))
        .mount(&server)
        .await;

    let err = client(&server)
        .await
        .set_topic("C1", "Status: Triage")
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        MessagingError::RateLimited {
            retry_after_secs: 30
        }
    ));
}

#[tokio::test]
async fn test_server_error_is_transport_failure() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/auth.test"))
        .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
        .mount(&server)
        .await;

    let err = client(&server).await.identity().await.unwrap_err();

    assert!(matches!(err, MessagingError::Transport(ref m) if m.contains("502")));
}

#[tokio::test]
async fn test_identity() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/auth.test"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "ok": true,
            "user_id": "UBOT",
            "team_id": "T0001",
            "bot_id": "BBOT"
        })))
        .mount(&server)
        .await;

    let identity = client(&server).await.identity().await.unwrap();

    assert_eq!(identity.team_id, "T0001");
    assert_eq!(identity.bot_id.as_deref(), Some("BBOT"));
}

#[tokio::test]
async fn test_list_users_follows_cursor() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/users.list"))
        .and(query_param("cursor", "page2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "ok": true,
            "members": [{ "id": "U2", "name": "bob", "deleted": true }],
            "response_metadata": { "next_cursor": "" }
        })))
        .with_priority(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/users.list"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "ok": true,
            "members": [{
                "id": "U1",
                "name": "alice",
                "real_name": "Alice Liddell",
                "profile": { "display_name": "ali" }
            }],
            "response_metadata": { "next_cursor": "page2" }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let users = client(&server).await.list_users().await.unwrap();

    assert_eq!(users.len(), 2);
    assert_eq!(users[0].real_name, "Alice Liddell");
    assert_eq!(users[0].display_name, "ali");
    assert!(users[1].deleted);
}

#[tokio::test]
async fn test_conversation_members_page() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/conversations.members"))
        .and(query_param("channel", "C1"))
        .and(query_param("cursor", "next"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "ok": true,
            "members": ["U3"],
            "response_metadata": { "next_cursor": "" }
        })))
        .mount(&server)
        .await;

    let page = client(&server)
        .await
        .conversation_members("C1", Some("next"))
        .await
        .unwrap();

    assert_eq!(page.members, ["U3"]);
    assert_eq!(page.next_cursor, None);
}

#[tokio::test]
async fn test_bot_without_user_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/bots.info"))
        .and(query_param("bot", "B1"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "ok": true, "bot": { "id": "B1" } })),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/bots.info"))
        .and(query_param("bot", "B2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "ok": true,
            "bot": { "id": "B2", "user_id": "UB2" }
        })))
        .mount(&server)
        .await;

    let slack = client(&server).await;
    assert!(slack.bot_user_id("B1").await.is_err());
    assert_eq!(slack.bot_user_id("B2").await.unwrap(), "UB2");
}

#[tokio::test]
async fn test_user_groups() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/usergroups.list"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "ok": true,
            "usergroups": [{ "id": "S1", "handle": "oncall", "name": "On-call" }]
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/usergroups.users.list"))
        .and(query_param("usergroup", "S1"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "ok": true, "users": ["U1", "U2"] })),
        )
        .mount(&server)
        .await;

    let slack = client(&server).await;
    let groups = slack.list_user_groups().await.unwrap();
    assert_eq!(groups[0].handle, "oncall");
    assert_eq!(slack.user_group_members("S1").await.unwrap(), ["U1", "U2"]);
}
