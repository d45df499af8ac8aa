use std::thread;
use std::time::Duration;

use uva_runtime::{FaultOutcome, NodeRole, UvaError};
use uva_runtime::handshake::GateOutcome;

use crate::support::{connect_node, server_config, start, Backing, PAGE};

#[test]
fn participant_sees_what_the_authority_initialized() {
    let backing = Backing::new(2);
    let window = backing.window;
    let server = start(server_config(window));

    // The authority never faults, so its window may alias the participant's memory.
    // SAFETY: `backing` outlives both coordinators.
    let mut authority = unsafe { connect_node(&server, window, NodeRole::Authority) };
    assert_eq!(authority.startup_gate(NodeRole::Authority).unwrap(), GateOutcome::Passed);
    authority.store(window.begin() + 8, b"constructed").unwrap();

    let begin = window.begin();
    let participant = {
        let server = server.clone();
        thread::spawn(move || {
            // SAFETY: `backing` is kept alive until this thread is joined.
            let mut coordinator = unsafe { connect_node(&server, window, NodeRole::Participant) };
            coordinator.startup_gate(NodeRole::Participant).unwrap();
            let outcome = coordinator.handle_fault(begin + PAGE + 3).unwrap();
            let stats = coordinator.stats();
            coordinator.finalize().unwrap();
            (outcome, stats)
        })
    };

    thread::sleep(Duration::from_millis(150));
    assert!(!participant.is_finished(), "participant passed the gate before init completed");

    assert_eq!(authority.complete_init().unwrap(), GateOutcome::Passed);
    assert_eq!(authority.complete_init().unwrap(), GateOutcome::AlreadyPassed);

    let (outcome, stats) = participant.join().unwrap();
    assert_eq!(outcome, FaultOutcome::Fetched);
    assert_eq!(stats.fetches, 1);
    assert_eq!(stats.mapped_pages, 2);
    assert_eq!(backing.bytes(begin + 8, 11), b"constructed");
    assert!(server.init_complete());

    authority.finalize().unwrap();
    server.shutdown();
}

#[test]
fn remote_operations_reach_the_canonical_store() {
    let backing = Backing::new(1);
    let window = backing.window;
    let heap = uva_runtime::AddressWindow::from_len(window.end() + PAGE, 256).unwrap();
    let server = start(
        server_config(window)
            .with_heap(heap)
            .with_initializers(0)
            .with_gate(false),
    );
    // SAFETY: nothing here faults; the window is only addressed remotely.
    let mut coordinator = unsafe { connect_node(&server, window, NodeRole::Participant) };
    coordinator.startup_gate(NodeRole::Participant).unwrap();

    let begin = window.begin();
    let pattern: Vec<u8> = (1..=32).collect();
    coordinator.store(begin, &pattern).unwrap();
    coordinator.memmove_remote(begin + 4, begin, 16).unwrap();
    coordinator.memcpy_remote(begin + 64, begin + 4, 4).unwrap();
    coordinator.memset_remote(begin + 100, 0xEE, 3).unwrap();

    let mut expected = pattern.clone();
    expected.copy_within(0..16, 4);
    assert_eq!(coordinator.load(begin, 32).unwrap(), expected);
    assert_eq!(coordinator.load(begin + 64, 4).unwrap(), vec![1, 2, 3, 4]);
    assert_eq!(server.snapshot(begin + 100, 4).unwrap(), vec![0xEE, 0xEE, 0xEE, 0]);

    assert_eq!(coordinator.mmap_remote(begin, 8).unwrap(), begin);
    assert_eq!(coordinator.load(begin, 10).unwrap(), vec![0, 0, 0, 0, 0, 0, 0, 0, 5, 6]);

    let first = coordinator.heap_alloc(24).unwrap();
    let second = coordinator.heap_alloc(8).unwrap();
    assert_eq!(first, heap.begin());
    assert_eq!(second, heap.begin() + 32);
    assert_eq!(coordinator.heap_alloc(4096).unwrap(), 0);

    coordinator.finalize().unwrap();
    assert!(matches!(coordinator.load(begin, 1), Err(UvaError::InvalidState { .. })));
    server.shutdown();
}

#[test]
fn server_drops_a_node_that_leaves_the_window() {
    let backing = Backing::new(1);
    let window = backing.window;
    let server = start(server_config(window).with_initializers(0).with_gate(false));
    // SAFETY: nothing here faults.
    let mut coordinator = unsafe { connect_node(&server, window, NodeRole::Participant) };
    coordinator.startup_gate(NodeRole::Participant).unwrap();

    assert!(coordinator.store(window.end(), &[1]).is_err());
    assert!(coordinator.load(window.begin(), 1).is_err());
    coordinator.finalize().unwrap();
    server.shutdown();
}

#[test]
fn denied_participant_reports_permission_denied() {
    let backing = Backing::new(1);
    let window = backing.window;
    let server = start(
        server_config(window)
            .with_initializers(0)
            .with_denied_participants(true),
    );
    // SAFETY: nothing here faults.
    let coordinator = unsafe { connect_node(&server, window, NodeRole::Participant) };
    assert!(matches!(
        coordinator.startup_gate(NodeRole::Participant),
        Err(UvaError::PermissionDenied { token: 0 })
    ));
    server.shutdown();
}
