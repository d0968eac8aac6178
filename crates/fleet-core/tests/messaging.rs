//! Integration tests for delivery, idempotency and mailbox fallback

mod common;

use common::{disk_harness, memory_harness};
use fleet_core::messaging::{ChannelType, DeliveryChannel, MessageStatus};
use fleet_core::{MemberKind, NewMember, Priority, SendRequest, TeamScope};
use fleet_store::StoreExt;
use tempfile::TempDir;

fn add_session_member(team: &TeamScope<'_>, id: &str, session: Option<&str>) {
    team.members()
        .add_member(NewMember::teammate(id, MemberKind::Session))
        .unwrap();
    if let Some(sid) = session {
        team.members().attach(id, sid, None, None).unwrap();
    }
}

#[test]
fn test_repeated_message_id_is_sent_once() {
    let h = memory_harness();
    h.create_alpha();
    let team = h.fleet.team("alpha").unwrap();
    add_session_member(&team, "coder-1", Some("s1"));

    let first = team
        .messages()
        .send(SendRequest::new("lead", "coder-1", "rebase on main").with_id("M1"))
        .unwrap();
    assert!(!first.duplicate);
    assert_eq!(first.row.status, MessageStatus::Delivered);
    assert_eq!(first.row.channel, Some(DeliveryChannel::Inbox));

    let again = team
        .messages()
        .send(SendRequest::new("lead", "coder-1", "rebase on main").with_id("M1"))
        .unwrap();
    assert!(again.duplicate);
    assert_eq!(team.messages().rows().len(), 1);

    let inbox: Vec<serde_json::Value> = h.fleet.store().read_jsonl("terminals/inbox/s1.jsonl");
    assert_eq!(inbox.len(), 1);
}

#[test]
fn test_unbound_recipient_gets_mailbox() {
    let h = memory_harness();
    h.create_alpha();
    let team = h.fleet.team("alpha").unwrap();
    add_session_member(&team, "coder-1", None);

    let sent = team
        .messages()
        .send(SendRequest::new("lead", "coder-1", "pick up T3").with_priority(Priority::High))
        .unwrap();
    assert_eq!(sent.row.status, MessageStatus::Queued);
    assert_eq!(sent.row.channel, Some(DeliveryChannel::Mailbox));

    let queued = team.messages().inbox("coder-1", false).unwrap();
    assert_eq!(queued.len(), 1);
    assert_eq!(queued[0].priority, Priority::High);

    let attached = team.members().attach("coder-1", "s7", None, None).unwrap();
    assert_eq!(attached.flushed, 1);
    assert!(team.messages().inbox("coder-1", false).unwrap().is_empty());
    let inbox: Vec<serde_json::Value> = h.fleet.store().read_jsonl("terminals/inbox/s7.jsonl");
    assert_eq!(inbox.len(), 1);
}

#[test]
fn test_unwritable_inbox_falls_back_to_mailbox() {
    let dir = TempDir::new().unwrap();
    let h = disk_harness(&dir);
    h.create_alpha();
    let team = h.fleet.team("alpha").unwrap();
    add_session_member(&team, "coder-1", Some("s1"));
    std::fs::create_dir_all(dir.path().join("terminals/inbox/s1.jsonl")).unwrap();

    let sent = team
        .messages()
        .send(SendRequest::new("lead", "coder-1", "status?"))
        .unwrap();
    assert_eq!(sent.row.status, MessageStatus::Queued);
    assert_eq!(sent.row.channel, Some(DeliveryChannel::MailboxFallback));
    assert_eq!(sent.row.retry_count, 2);
    assert_eq!(team.messages().inbox("coder-1", true).unwrap().len(), 1);
    assert!(team.messages().inbox("coder-1", false).unwrap().is_empty());
}

#[test]
fn test_broadcast_skips_lead_and_is_idempotent() {
    let h = memory_harness();
    h.create_alpha();
    let team = h.fleet.team("alpha").unwrap();
    add_session_member(&team, "coder-1", Some("s1"));
    add_session_member(&team, "coder-2", None);
    add_session_member(&team, "reviewer-1", None);

    let exclude = vec!["reviewer-1".to_string()];
    let outcome = team
        .messages()
        .broadcast("coder-1", "freeze main", Priority::Normal, &exclude, Some("B1"), ChannelType::Broadcast)
        .unwrap();
    assert_eq!(outcome.recipients, vec!["coder-2"]);
    assert_eq!(outcome.queued, 1);
    assert!(team.messages().get("B1-coder-2").is_some());

    let retry = team
        .messages()
        .broadcast("coder-1", "freeze main", Priority::Normal, &exclude, Some("B1"), ChannelType::Broadcast)
        .unwrap();
    assert_eq!(retry.duplicates, 1);
    assert_eq!(team.messages().rows().len(), 1);

    let announced = team.messages().announce("coder-1", "release cut", Priority::Urgent).unwrap();
    assert!(announced.recipients.contains(&"lead".to_string()));
    assert_eq!(announced.recipients.len(), 3);
}

#[test]
fn test_ack_appends_one_row() {
    let h = memory_harness();
    h.create_alpha();
    let team = h.fleet.team("alpha").unwrap();
    add_session_member(&team, "coder-1", Some("s1"));
    team.messages()
        .send(SendRequest::new("lead", "coder-1", "ship it").with_id("M2"))
        .unwrap();

    let acked = team.messages().ack("M2", "coder-1").unwrap();
    assert_eq!(acked.status, MessageStatus::Acknowledged);
    assert_eq!(acked.acknowledged_by.as_deref(), Some("coder-1"));
    team.messages().ack("M2", "coder-1").unwrap();

    assert_eq!(team.messages().rows().len(), 2);
    assert_eq!(team.messages().current().len(), 1);
    assert!(team.messages().open_messages(Some("coder-1")).is_empty());
}
