//! Integration tests for event ordering, cursors and compaction

mod common;

use common::{disk_harness, memory_harness};
use fleet_core::events::{EventFilter, EventKind};
use fleet_store::{DocumentStore, StoreExt};
use std::thread;
use tempfile::TempDir;

fn idle(member: &str) -> EventKind {
    EventKind::TeammateIdle {
        member_id: member.to_string(),
        idle_seconds: 200,
    }
}

#[test]
fn test_concurrent_emits_get_contiguous_ids() {
    let dir = TempDir::new().unwrap();
    let h = disk_harness(&dir);
    h.create_alpha();

    let handles: Vec<_> = (0..8)
        .map(|n| {
            let fleet = h.fleet.clone();
            thread::spawn(move || {
                let team = fleet.team("alpha").unwrap();
                for _ in 0..25 {
                    team.emit(idle(&format!("coder-{}", n))).unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let team = h.fleet.team("alpha").unwrap();
    let ids: Vec<u64> = team.events().all().iter().map(|e| e.id).collect();
    let expected: Vec<u64> = (1..=ids.len() as u64).collect();
    assert_eq!(ids, expected);
    assert_eq!(
        ids.len(),
        200 + team
            .events()
            .all()
            .iter()
            .filter(|e| e.event_type != "TeammateIdle")
            .count()
    );
}

#[test]
fn test_consumer_cursor_advances() {
    let h = memory_harness();
    h.create_alpha();
    let team = h.fleet.team("alpha").unwrap();
    team.emit(idle("coder-1")).unwrap();

    let filter = EventFilter::for_consumer("lead").with_types(["TeammateIdle"]);
    assert_eq!(team.events().check(&filter).unwrap().len(), 1);
    assert!(team.events().check(&filter).unwrap().is_empty());

    team.emit(idle("coder-2")).unwrap();
    let next = team.events().check(&filter).unwrap();
    assert_eq!(next.len(), 1);
    assert_eq!(next[0].str_field("memberId"), Some("coder-2"));
    assert_eq!(team.events().cursor("lead"), next[0].id);

    let replay = EventFilter {
        since_id: Some(0),
        ..filter
    };
    assert_eq!(team.events().check(&replay).unwrap().len(), 2);
}

#[test]
fn test_compaction_keeps_numbering() {
    let h = memory_harness();
    h.create_alpha();
    let team = h.fleet.team("alpha").unwrap();
    for _ in 0..20 {
        team.emit(idle("coder-1")).unwrap();
    }
    let last = team.events().all().last().unwrap().id;

    let dropped = team.events().compact(5).unwrap();
    assert_eq!(team.events().all().len(), 5);
    assert_eq!(dropped as u64, last - 5);

    let next = team.emit(idle("coder-1")).unwrap();
    assert_eq!(next.id, last + 1);
}

#[test]
fn test_unknown_event_rows_survive() {
    let h = memory_harness();
    h.create_alpha();
    let team = h.fleet.team("alpha").unwrap();
    let key = team.paths().events();
    h.fleet
        .store()
        .append_line(
            &key,
            r#"{"id":99,"ts":"2026-03-01T09:00:00Z","type":"CustomSignal","detail":"x"}"#,
        )
        .unwrap();

    let events = team.events().all();
    let custom = events.iter().find(|e| e.event_type == "CustomSignal").unwrap();
    assert!(custom.kind().is_none());
    assert_eq!(custom.str_field("detail"), Some("x"));

    let raw: Vec<String> = h.fleet.store().read_lines(&key).unwrap();
    assert!(raw.iter().any(|l| l.contains("CustomSignal")));
}
