use presencerelay::matcher::{match_processes, poll};
use presencerelay::{
    ActivityEvent, ApplicationSignature, Catalog, MatchState, ProcessRecord,
};

fn single_game_catalog() -> Catalog {
    Catalog::new(vec![ApplicationSignature::new("game1", "Game One", ["game1.exe"])])
}

#[test]
fn game1_started_then_stopped() {
    let catalog = single_game_catalog();
    let mut state = MatchState::new();

    let started = poll(
        &catalog,
        &[ProcessRecord::new(100, r"C:\Games\game1.exe")],
        &mut state,
        1_000,
    );
    assert_eq!(started.len(), 1);
    match &started[0] {
        ActivityEvent::Started(record) => {
            assert_eq!(record.application_id, "game1");
            assert_eq!(record.pid, 100);
        }
        other => panic!("expected a start, got {other:?}"),
    }

    let stopped = poll(&catalog, &[], &mut state, 2_000);
    assert_eq!(stopped.len(), 1);
    assert!(matches!(&stopped[0], ActivityEvent::Stopped(r) if r.pid == 100));
    assert!(state.is_empty());

    assert!(poll(&catalog, &[], &mut state, 3_000).is_empty());
}

#[test]
fn unchanged_process_list_emits_nothing() {
    let catalog = single_game_catalog();
    let mut state = MatchState::new();
    let processes = [
        ProcessRecord::new(100, "/games/game1.exe"),
        ProcessRecord::new(200, "/usr/bin/bash"),
    ];

    assert_eq!(poll(&catalog, &processes, &mut state, 1).len(), 1);
    assert!(poll(&catalog, &processes, &mut state, 2).is_empty());
    assert!(poll(&catalog, &processes, &mut state, 3).is_empty());
}

#[test]
fn start_timestamp_survives_later_polls() {
    let catalog = single_game_catalog();
    let mut state = MatchState::new();
    let processes = [ProcessRecord::new(100, "/games/game1.exe")];

    poll(&catalog, &processes, &mut state, 1_000);
    let first = state.get(100).cloned().unwrap();

    poll(&catalog, &processes, &mut state, 9_000);
    let second = state.get(100).cloned().unwrap();

    assert_eq!(first.start_timestamp, 1_000);
    assert_eq!(second.start_timestamp, first.start_timestamp);
}

#[test]
fn one_record_per_matching_pid_and_none_otherwise() {
    let catalog = single_game_catalog();
    let processes = [
        ProcessRecord::new(1, "/games/game1.exe"),
        ProcessRecord::new(2, "/games/game1.exe"),
        ProcessRecord::new(3, "/games/notgame1.exe"),
        ProcessRecord::new(4, ""),
    ];

    let mut pids: Vec<u32> = match_processes(&processes, &catalog, 0)
        .into_iter()
        .map(|r| r.pid)
        .collect();
    pids.sort_unstable();
    assert_eq!(pids, vec![1, 2]);
}

#[test]
fn two_copies_of_one_game_stop_independently() {
    let catalog = single_game_catalog();
    let mut state = MatchState::new();

    poll(
        &catalog,
        &[
            ProcessRecord::new(1, "/games/game1.exe"),
            ProcessRecord::new(2, "/games/game1.exe"),
        ],
        &mut state,
        0,
    );
    let events = poll(&catalog, &[ProcessRecord::new(2, "/games/game1.exe")], &mut state, 1);

    assert_eq!(events.len(), 1);
    assert!(matches!(&events[0], ActivityEvent::Stopped(r) if r.pid == 1));
    assert_eq!(state.len(), 1);
}

#[test]
fn catalog_order_is_preserved_from_json() {
    let catalog = Catalog::from_json(
        r#"[
            { "id": "b", "name": "B", "executables": [{ "name": "shared.exe" }] },
            { "id": "a", "name": "A", "executables": [{ "name": "shared.exe" }] }
        ]"#,
    )
    .unwrap();

    let ids: Vec<&str> = catalog.iter().map(|s| s.id.as_str()).collect();
    assert_eq!(ids, vec!["b", "a"]);

    let records = match_processes(&[ProcessRecord::new(5, "/x/shared.exe")], &catalog, 0);
    assert_eq!(records[0].application_id, "b");
}
