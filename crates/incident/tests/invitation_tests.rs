//! Invitation resolution and batch invite tests.

mod common;

use std::sync::Arc;

use common::FakeMessenger;
use incident::{
    Error, InvitationResolver, InviteStatus, MessagingError, UserGroup, BOT_NOT_FOUND,
    USER_NOT_FOUND,
};

fn refs(values: &[&str]) -> Vec<String> {
    values.iter().map(ToString::to_string).collect()
}

fn resolver() -> (InvitationResolver, Arc<FakeMessenger>) {
    let messenger = Arc::new(FakeMessenger::new());
    (InvitationResolver::new(messenger.clone()), messenger)
}

#[tokio::test]
async fn test_partial_failure_is_isolated() {
    let (resolver, messenger) = resolver();
    messenger.add_user("UALICE01", "alice", "Alice Liddell");

    let result = resolver
        .invite_by_list(&refs(&["U1XX", "@alice", "B999"]), &[], "CINC1")
        .await
        .unwrap();

    let details = &result.details;
    assert_eq!(details.len(), 3);
    assert_eq!(details[0].user_id, "U1XX");
    assert_eq!(details[0].status, InviteStatus::Success);
    assert_eq!(details[1].user_id, "UALICE01");
    assert_eq!(details[1].status, InviteStatus::Success);
    assert_eq!(details[1].display_name.as_deref(), Some("Alice Liddell"));
    assert_eq!(details[2].status, InviteStatus::Failed);
    assert_eq!(details[2].error.as_deref(), Some(BOT_NOT_FOUND));
    assert_eq!(details[2].source_config, "B999");

    let state = messenger.state();
    assert_eq!(
        state.invites,
        [("CINC1".to_string(), refs(&["U1XX", "UALICE01"]))]
    );
}

#[tokio::test]
async fn test_unresolvable_references_fail_with_distinct_reasons() {
    let (resolver, messenger) = resolver();

    let result = resolver
        .invite_by_list(&refs(&["U1", "B404", "@nobody"]), &[], "CINC1")
        .await
        .unwrap();

    let reasons: Vec<_> = result.details.iter().map(|d| d.error.as_deref()).collect();
    assert_eq!(reasons, [None, Some(BOT_NOT_FOUND), Some(USER_NOT_FOUND)]);
    assert_eq!(result.details[0].status, InviteStatus::Success);
    assert_eq!(messenger.state().invites[0].1, refs(&["U1"]));
}

#[tokio::test]
async fn test_batch_failure_marks_every_resolved_entry() {
    let (resolver, messenger) = resolver();
    messenger.state().invite_error = Some(MessagingError::Api {
        method: "conversations.invite".to_string(),
        error: "not_in_channel".to_string(),
    });

    let result = resolver
        .invite_by_list(&refs(&["U1", "U2"]), &[], "CINC1")
        .await
        .expect("batch failure is reported per entry");

    assert_eq!(result.failed(), 2);
    let errors: Vec<_> = result.details.iter().map(|d| d.error.clone()).collect();
    assert!(errors[0].as_deref().unwrap().contains("not_in_channel"));
    assert_eq!(errors[0], errors[1]);
}

#[tokio::test]
async fn test_already_in_channel_counts_as_success() {
    let (resolver, messenger) = resolver();
    messenger.state().invite_error = Some(MessagingError::Api {
        method: "conversations.invite".to_string(),
        error: "already_in_channel".to_string(),
    });

    let result = resolver
        .invite_by_list(&refs(&["U100"]), &[], "CINC1")
        .await
        .unwrap();

    assert_eq!(result.succeeded(), 1);
    assert_eq!(result.details[0].error, None);
}

#[tokio::test]
async fn test_bot_reference_resolves_to_its_user() {
    let (resolver, messenger) = resolver();
    messenger
        .state()
        .bots
        .insert("B0PAGER".to_string(), "UPAGERBOT".to_string());

    let details = resolver.resolve(&refs(&["B0PAGER"]), &[]).await;

    assert_eq!(details[0].user_id, "UPAGERBOT");
    assert_eq!(details[0].status, InviteStatus::Resolved);
}

#[tokio::test]
async fn test_unknown_and_empty_names() {
    let (resolver, messenger) = resolver();
    messenger.add_user("UBOB0001", "bob", "");

    let details = resolver
        .resolve(&refs(&["@nobody", "  ", "<@UBOB0001|bob>", "@BOB"]), &[])
        .await;

    assert_eq!(details[0].error.as_deref(), Some(USER_NOT_FOUND));
    assert_eq!(details[1].error.as_deref(), Some("empty user reference"));
    assert_eq!(details[2].user_id, "UBOB0001");
    assert_eq!(details[3].user_id, "UBOB0001");
    assert_eq!(messenger.calls_to("list_users"), 1, "directory is read once per batch");
}

#[tokio::test]
async fn test_directory_failure_fails_only_name_references() {
    let (resolver, messenger) = resolver();
    messenger.fail("list_users");

    let details = resolver.resolve(&refs(&["U100", "@alice"]), &[]).await;

    assert_eq!(details[0].status, InviteStatus::Resolved);
    assert_eq!(details[1].status, InviteStatus::Failed);
    assert!(details[1]
        .error
        .as_deref()
        .unwrap()
        .starts_with("user lookup failed"));
}

#[tokio::test]
async fn test_groups_expand_and_missing_groups_are_skipped() {
    let (resolver, messenger) = resolver();
    {
        let mut state = messenger.state();
        state.groups = vec![UserGroup {
            id: "S0ONCALL".to_string(),
            handle: "oncall".to_string(),
            name: "On-call".to_string(),
        }];
        state
            .group_members
            .insert("S0ONCALL".to_string(), refs(&["U100", "U300"]));
    }

    let result = resolver
        .invite_by_list(
            &refs(&["U100"]),
            &refs(&["@oncall", "@ghosts", "S0MISSING"]),
            "CINC1",
        )
        .await
        .unwrap();

    let members: Vec<&str> = result.details.iter().map(|d| d.user_id.as_str()).collect();
    assert_eq!(members, ["U100", "U100", "U300"]);
    assert!(result
        .details
        .iter()
        .all(|d| d.status == InviteStatus::Success));

    let state = messenger.state();
    assert_eq!(state.invites.len(), 1);
    assert_eq!(state.invites[0].1, refs(&["U100", "U300"]), "ids are deduplicated");
}

#[tokio::test]
async fn test_nothing_resolved_makes_no_invite_call() {
    let (resolver, messenger) = resolver();

    let result = resolver
        .invite_by_list(&refs(&["@nobody"]), &[], "CINC1")
        .await
        .unwrap();

    assert_eq!(result.failed(), 1);
    assert_eq!(messenger.calls_to("invite_users"), 0);
}

#[tokio::test]
async fn test_empty_channel_is_rejected() {
    let (resolver, messenger) = resolver();

    let err = resolver
        .invite_by_list(&refs(&["U100"]), &[], " ")
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Validation(_)));
    assert!(messenger.state().calls.is_empty());
}
