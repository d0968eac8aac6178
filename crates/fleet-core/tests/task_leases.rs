//! Integration tests for the task ledger and lease protocol

mod common;

use chrono::Duration;
use common::{flaky_harness, memory_harness};
use fleet_core::{MemberKind, NewMember, NewTask, TaskStatus, TeamScope};

fn task(title: &str) -> NewTask {
    NewTask {
        title: title.to_string(),
        ..Default::default()
    }
}

fn add_coders(team: &TeamScope<'_>) {
    for id in ["coder-1", "coder-2"] {
        team.members()
            .add_member(NewMember::teammate(id, MemberKind::Session))
            .unwrap();
    }
}

fn events_of(team: &TeamScope<'_>, event_type: &str) -> usize {
    team.events()
        .all()
        .iter()
        .filter(|e| e.event_type == event_type)
        .count()
}

#[test]
fn test_dependencies_block_until_completed() {
    let h = memory_harness();
    h.create_alpha();
    let team = h.fleet.team("alpha").unwrap();
    add_coders(&team);

    team.tasks().add(task("Lexer")).unwrap();
    let parser = team
        .tasks()
        .add(NewTask {
            depends_on: vec!["T1".to_string()],
            ..task("Parser")
        })
        .unwrap();
    assert_eq!(parser.task_id, "T2");
    assert_eq!(parser.status, TaskStatus::Blocked);

    let err = team.tasks().claim("T2", "coder-2", None, false).unwrap_err();
    assert!(err.is_conflict());
    assert!(err.to_string().contains("T1"));

    team.tasks().claim("T1", "coder-1", None, false).unwrap();
    team.tasks()
        .update_status("T1", TaskStatus::Completed, Some("coder-1"), None, false)
        .unwrap();

    assert_eq!(team.tasks().get("T2").unwrap().status, TaskStatus::Pending);
    assert!(team.tasks().claim_of("T1").is_none());
    team.tasks().claim("T2", "coder-2", None, false).unwrap();
}

#[test]
fn test_unknown_dependency_is_rejected() {
    let h = memory_harness();
    h.create_alpha();
    let team = h.fleet.team("alpha").unwrap();

    let err = team
        .tasks()
        .add(NewTask {
            depends_on: vec!["T9".to_string()],
            ..task("Parser")
        })
        .unwrap_err();
    assert_eq!(err.error_code(), "FLEET_VALIDATION");
    assert!(team.tasks().list(None, None).is_empty());
}

#[test]
fn test_claims_are_exclusive_unless_forced() {
    let h = memory_harness();
    h.create_alpha();
    let team = h.fleet.team("alpha").unwrap();
    add_coders(&team);
    team.tasks().add(task("Lexer")).unwrap();

    team.tasks().claim("T1", "coder-1", None, false).unwrap();
    let err = team.tasks().claim("T1", "coder-2", None, false).unwrap_err();
    assert!(err.is_conflict());

    let forced = team.tasks().claim("T1", "coder-2", None, true).unwrap();
    assert_eq!(forced.task.claimed_by.as_deref(), Some("coder-2"));
    assert_eq!(forced.claim.previous_owner.as_deref(), Some("coder-1"));
    assert!(forced.claim.force_claim);
    assert_eq!(
        team.tasks().claim_of("T1").unwrap().claimed_by,
        "coder-2"
    );
}

#[test]
fn test_overlapping_files_conflict() {
    let h = memory_harness();
    h.create_alpha();
    let team = h.fleet.team("alpha").unwrap();
    add_coders(&team);
    team.tasks()
        .add(NewTask {
            files: vec!["src/lexer.rs".to_string()],
            ..task("Lexer")
        })
        .unwrap();
    team.tasks()
        .add(NewTask {
            files: vec!["./src/lexer.rs".to_string(), "src/token.rs".to_string()],
            ..task("Tokens")
        })
        .unwrap();

    team.tasks().claim("T1", "coder-1", None, false).unwrap();
    let err = team.tasks().claim("T2", "coder-2", None, false).unwrap_err();
    assert!(err.is_conflict());
    assert!(err.to_string().contains("T1"));

    let forced = team.tasks().claim("T2", "coder-2", None, true).unwrap();
    assert_eq!(forced.conflicts.len(), 1);
    assert_eq!(forced.conflicts[0].task_id, "T1");
}

#[test]
fn test_expired_lease_returns_task_once() {
    let h = memory_harness();
    h.create_alpha();
    let team = h.fleet.team("alpha").unwrap();
    add_coders(&team);
    team.tasks().add(task("Lexer")).unwrap();
    team.tasks().claim("T1", "coder-1", Some(5), false).unwrap();

    h.clock.advance(Duration::seconds(6));
    let expired = team.tasks().expire_stale_claims().unwrap();
    assert_eq!(expired.len(), 1);
    assert_eq!(expired[0].previous_owner, "coder-1");
    assert!(team.tasks().expire_stale_claims().unwrap().is_empty());

    let task = team.tasks().get("T1").unwrap();
    assert_eq!(task.status, TaskStatus::Pending);
    assert!(task.claimed_by.is_none());
    assert!(team.tasks().claim_of("T1").is_none());
    assert_eq!(events_of(&team, "TaskClaimExpired"), 1);

    team.tasks().claim("T1", "coder-2", None, false).unwrap();
}

#[test]
fn test_expired_in_progress_task_keeps_status() {
    let h = memory_harness();
    h.create_alpha();
    let team = h.fleet.team("alpha").unwrap();
    add_coders(&team);
    team.tasks().add(task("Lexer")).unwrap();
    team.tasks().claim("T1", "coder-1", Some(5), false).unwrap();
    team.tasks()
        .update_status("T1", TaskStatus::InProgress, Some("coder-1"), None, false)
        .unwrap();

    h.clock.advance(Duration::seconds(60 * 60));
    team.tasks().expire_stale_claims().unwrap();

    let task = team.tasks().get("T1").unwrap();
    assert_eq!(task.status, TaskStatus::InProgress);
    assert!(task.claimed_by.is_none());
}

#[test]
fn test_release_returns_task_to_pending() {
    let h = memory_harness();
    h.create_alpha();
    let team = h.fleet.team("alpha").unwrap();
    add_coders(&team);
    team.tasks().add(task("Lexer")).unwrap();
    team.tasks().claim("T1", "coder-1", None, false).unwrap();

    assert!(team.tasks().release("T1", "coder-2", false).unwrap_err().is_conflict());
    let task = team.tasks().release("T1", "coder-1", false).unwrap();
    assert_eq!(task.status, TaskStatus::Pending);
    assert!(team.tasks().claim_of("T1").is_none());
    assert_eq!(events_of(&team, "TaskClaimReleased"), 1);
}

#[test]
fn test_terminal_tasks_need_force_to_reopen() {
    let h = memory_harness();
    h.create_alpha();
    let team = h.fleet.team("alpha").unwrap();
    team.tasks().add(task("Lexer")).unwrap();
    team.tasks()
        .update_status("T1", TaskStatus::Cancelled, None, Some("dropped".into()), false)
        .unwrap();

    let err = team
        .tasks()
        .update_status("T1", TaskStatus::Pending, None, None, false)
        .unwrap_err();
    assert!(err.is_conflict());
    let task = team
        .tasks()
        .update_status("T1", TaskStatus::Pending, None, None, true)
        .unwrap();
    assert_eq!(task.status, TaskStatus::Pending);
    assert_eq!(task.history.len(), 3);
}

#[test]
fn test_status_update_into_ownership_checks_file_overlap() {
    let h = memory_harness();
    h.create_alpha();
    let team = h.fleet.team("alpha").unwrap();
    add_coders(&team);
    for title in ["Lexer", "Tokens"] {
        team.tasks()
            .add(NewTask {
                files: vec!["src/lexer.rs".to_string()],
                ..task(title)
            })
            .unwrap();
    }
    team.tasks().claim("T1", "coder-1", None, false).unwrap();

    let err = team
        .tasks()
        .update_status("T2", TaskStatus::InProgress, Some("coder-2"), None, false)
        .unwrap_err();
    assert!(err.is_conflict());
    assert!(err.to_string().contains("T1"));
    assert_eq!(team.tasks().get("T2").unwrap().status, TaskStatus::Pending);
    assert!(team.tasks().claim_of("T2").is_none());

    // the owner moving its own claimed task forward is not an overlap
    team.tasks()
        .update_status("T1", TaskStatus::InProgress, Some("coder-1"), None, false)
        .unwrap();
    let forced = team
        .tasks()
        .update_status("T2", TaskStatus::Claimed, Some("coder-2"), None, true)
        .unwrap();
    assert_eq!(forced.claimed_by.as_deref(), Some("coder-2"));
}

#[test]
fn test_failed_board_save_leaves_claims_and_events_untouched() {
    let (h, store) = flaky_harness();
    h.create_alpha();
    let team = h.fleet.team("alpha").unwrap();
    add_coders(&team);
    team.tasks().add(task("Lexer")).unwrap();

    store.fail_writes_to("tasks.json");
    assert!(team.tasks().claim("T1", "coder-1", None, false).is_err());
    assert_eq!(events_of(&team, "TaskClaimed"), 0);
    assert!(team.tasks().claim_of("T1").is_none());
    assert!(team.tasks().get("T1").unwrap().claimed_by.is_none());

    store.heal();
    team.tasks().claim("T1", "coder-1", None, false).unwrap();
    assert_eq!(events_of(&team, "TaskClaimed"), 1);

    store.fail_writes_to("tasks.json");
    assert!(team.tasks().release("T1", "coder-1", false).is_err());
    assert!(team.tasks().claim_of("T1").is_some());
    assert_eq!(events_of(&team, "TaskClaimReleased"), 0);

    h.clock.advance(Duration::seconds(60 * 60));
    assert!(team.tasks().expire_stale_claims().is_err());
    assert!(team.tasks().claim_of("T1").is_some());
    assert_eq!(events_of(&team, "TaskClaimExpired"), 0);

    store.heal();
    assert_eq!(team.tasks().expire_stale_claims().unwrap().len(), 1);
    assert_eq!(events_of(&team, "TaskClaimExpired"), 1);
}

#[test]
fn test_heartbeat_loop_only_keeps_reporting_members_leases() {
    let h = memory_harness();
    h.create_alpha();
    let team = h.fleet.team("alpha").unwrap();
    add_coders(&team);
    for (member, session) in [("coder-1", "s1"), ("coder-2", "s2")] {
        team.members()
            .session_start(member, session, None, None)
            .unwrap();
    }
    team.tasks().add(task("Lexer")).unwrap();
    team.tasks().add(task("Parser")).unwrap();
    team.tasks().claim("T1", "coder-1", Some(60), false).unwrap();
    team.tasks().claim("T2", "coder-2", Some(60), false).unwrap();

    // coder-2 keeps reporting in while coder-1 has gone silent
    for _ in 0..4 {
        h.clock.advance(Duration::seconds(30));
        team.members().heartbeat(None).unwrap();
        team.members().heartbeat(Some("coder-2")).unwrap();
    }

    let lapsed = team.tasks().get("T1").unwrap();
    assert_eq!(lapsed.status, TaskStatus::Pending);
    assert!(lapsed.claimed_by.is_none());
    assert!(team.tasks().claim_of("T1").is_none());
    assert_eq!(events_of(&team, "TaskClaimExpired"), 1);

    let kept = team.tasks().get("T2").unwrap();
    assert_eq!(kept.claimed_by.as_deref(), Some("coder-2"));
    assert!(team.tasks().claim_of("T2").is_some());
}
