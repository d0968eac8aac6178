//! Integration tests for member lifecycle, worker bridging and healing

mod common;

use common::memory_harness;
use fleet_core::events::InterruptMode;
use fleet_core::{MemberKind, MemberStatus, NewMember, NewTask, SpawnOptions, TaskStatus, TeamScope};

fn lexer_task(team: &TeamScope<'_>) {
    team.tasks()
        .add(NewTask {
            title: "Lexer".to_string(),
            ..Default::default()
        })
        .unwrap();
}

fn count(team: &TeamScope<'_>, event_type: &str) -> usize {
    team.events()
        .all()
        .iter()
        .filter(|e| e.event_type == event_type)
        .count()
}

#[test]
fn test_restart_respawns_with_owned_tasks() {
    let h = memory_harness();
    h.create_alpha();
    let team = h.fleet.team("alpha").unwrap();
    team.members().spawn("coder-1", SpawnOptions::default()).unwrap();
    lexer_task(&team);
    team.tasks().claim("T1", "coder-1", None, false).unwrap();

    let outcome = team.members().restart("coder-1").unwrap();
    assert!(outcome.respawned);
    assert_eq!(outcome.resumed_tasks, vec!["T1"]);

    assert_eq!(h.host.calls_starting_with("kill-pane"), vec!["kill-pane %1"]);
    let typed = h.host.calls_starting_with("send-keys %2");
    assert_eq!(typed.len(), 1);
    assert!(typed[0].contains("T1 (Lexer, claimed)"));
    assert_eq!(team.members().get("coder-1").unwrap().pane_id(), Some("%2"));
}

#[test]
fn test_restart_of_session_member_is_requested() {
    let h = memory_harness();
    h.create_alpha();
    let team = h.fleet.team("alpha").unwrap();
    team.members()
        .add_member(NewMember::teammate("coder-1", MemberKind::Session))
        .unwrap();

    let outcome = team.members().restart("coder-1").unwrap();
    assert!(!outcome.respawned);
    assert_eq!(
        team.members().get("coder-1").unwrap().status,
        MemberStatus::RestartRequested
    );
    assert!(h.host.calls().is_empty());
}

#[test]
fn test_replace_hands_over_claims_and_workers() {
    let h = memory_harness();
    h.create_alpha();
    let team = h.fleet.team("alpha").unwrap();
    team.members().spawn("coder-1", SpawnOptions::default()).unwrap();
    lexer_task(&team);
    team.tasks().claim("T1", "coder-1", None, false).unwrap();
    team.workers()
        .register("W1", Some("T1"), Some("coder-1"), true)
        .unwrap();

    let outcome = team.members().replace("coder-1", "coder-9", true, true).unwrap();
    assert_eq!(outcome.transferred_tasks, vec!["T1"]);
    assert_eq!(outcome.transferred_workers, 1);
    assert!(outcome.spawned);

    let old = team.members().get("coder-1").unwrap();
    assert_eq!(old.status, MemberStatus::Replaced);
    assert_eq!(old.replaced_by.as_deref(), Some("coder-9"));
    assert_eq!(
        team.tasks().claim_of("T1").unwrap().previous_owner.as_deref(),
        Some("coder-1")
    );
    assert_eq!(
        team.workers().board().workers[0].member_id.as_deref(),
        Some("coder-9")
    );
    assert!(team.members().replace("lead", "lead-2", false, false).is_err());
}

#[test]
fn test_worker_success_completes_task_once() {
    let h = memory_harness();
    h.create_alpha();
    let team = h.fleet.team("alpha").unwrap();
    team.members()
        .add_member(NewMember::teammate("coder-1", MemberKind::Worker))
        .unwrap();
    lexer_task(&team);
    team.tasks().claim("T1", "coder-1", None, false).unwrap();
    team.workers()
        .register("W1", Some("T1"), Some("coder-1"), true)
        .unwrap();
    let again = team
        .workers()
        .register("W1", None, None, false)
        .unwrap();
    assert!(again.auto_complete);

    assert_eq!(team.workers().bridge().unwrap(), 0);
    team.workers()
        .attach_result("W1", "completed", Some("lexer merged".to_string()))
        .unwrap();
    assert_eq!(team.workers().bridge().unwrap(), 1);
    assert_eq!(team.workers().bridge().unwrap(), 0);

    assert_eq!(team.tasks().get("T1").unwrap().status, TaskStatus::Completed);
    assert!(team.workers().board().workers[0].reported);
    let completed: Vec<_> = team
        .events()
        .all()
        .into_iter()
        .filter(|e| e.event_type == "TaskCompleted")
        .collect();
    assert_eq!(completed.len(), 2);
    assert_eq!(completed[0].str_field("workerTaskId"), Some("W1"));
}

#[test]
fn test_worker_failure_is_reported_not_completed() {
    let h = memory_harness();
    h.create_alpha();
    let team = h.fleet.team("alpha").unwrap();
    lexer_task(&team);
    team.workers().register("W2", Some("T1"), None, true).unwrap();
    team.workers().attach_result("W2", "failed", None).unwrap();

    assert_eq!(team.recovery().reconcile().unwrap().bridged_workers, 1);
    assert_eq!(count(&team, "TaskWorkerFinished"), 1);
    assert_eq!(count(&team, "TaskCompleted"), 0);
    assert_eq!(team.tasks().get("T1").unwrap().status, TaskStatus::Pending);
    assert_eq!(team.scaling().inputs().unwrap().failure_rate_24h, 1);
}

#[test]
fn test_interrupt_falls_back_from_pane_to_signal() {
    let h = memory_harness();
    h.create_alpha();
    let team = h.fleet.team("alpha").unwrap();
    team.members()
        .add_member(NewMember::teammate("coder-1", MemberKind::Session))
        .unwrap();
    team.members().attach("coder-1", "s1", Some(4242), None).unwrap();

    let mode = team.members().interrupt("coder-1", None).unwrap();
    assert_eq!(mode, InterruptMode::Signal);
    assert_eq!(h.host.calls(), vec!["kill -INT 4242"]);
    assert_eq!(count(&team, "TeammateInterrupted"), 1);
}

#[test]
fn test_auto_heal_restores_lost_panes_only() {
    let h = memory_harness();
    h.create_alpha();
    let team = h.fleet.team("alpha").unwrap();
    team.members().spawn("coder-1", SpawnOptions::default()).unwrap();
    team.members().spawn("reviewer-1", SpawnOptions::default()).unwrap();
    team.members().pause("reviewer-1").unwrap();
    h.host.kill_externally("%1");
    h.host.kill_externally("%2");

    let healed = team.recovery().auto_heal().unwrap();
    assert_eq!(healed, vec!["coder-1"]);
    assert_eq!(count(&team, "TeammateHealed"), 1);
    assert_eq!(
        team.members().get("reviewer-1").unwrap().status,
        MemberStatus::Paused
    );
    assert_eq!(team.scaling().inputs().unwrap().restart_rate_24h, 1);
}
