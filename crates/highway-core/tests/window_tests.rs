// Host-side tests for the incremental event window.

use highway_core::chart::{EventKind, Lane, NoteModifiers, TimedEvent};
use highway_core::window::EventWindow;

fn note(start_ms: f64, duration_ms: f64, lane: Lane) -> TimedEvent {
    TimedEvent {
        start_ms,
        duration_ms,
        lane,
        kind: EventKind::Note(NoteModifiers::default()),
    }
}

#[test]
fn empty_sequence_always_returns_zero() {
    let mut window = EventWindow::new();
    assert_eq!(window.query(&[], 0.0), 0);
    assert_eq!(window.query(&[], 12345.0), 0);
    assert_eq!(window.query(&[], -50.0), 0);
}

#[test]
fn single_sustain_activity_over_time() {
    // One event {start: 1000, duration: 500}. Queries at 900/1000/1400/1600
    // must imply inactive, active, active, inactive.
    let events = vec![note(1000.0, 500.0, Lane::Fret(0))];
    let mut window = EventWindow::new();

    let at_900 = window.query(&events, 900.0);
    assert_eq!(at_900, 0);
    assert!(events[at_900].start_ms > 900.0, "not started yet at 900");

    let at_1000 = window.query(&events, 1000.0);
    assert_eq!(at_1000, 0);

    let at_1400 = window.query(&events, 1400.0);
    assert_eq!(at_1400, 0);
    assert!(events[at_1400].is_open_at(1400.0), "sustain covers 1400");

    let at_1600 = window.query(&events, 1600.0);
    assert_eq!(at_1600, 1, "past the sustain the answer moves past the end");
}

#[test]
fn query_is_monotonic_for_increasing_times() {
    let events = vec![
        note(0.0, 100.0, Lane::Fret(0)),
        note(250.0, 0.0, Lane::Fret(1)),
        note(500.0, 1000.0, Lane::Fret(2)),
        note(750.0, 0.0, Lane::Fret(3)),
        note(2000.0, 0.0, Lane::Fret(0)),
    ];
    let mut window = EventWindow::new();
    let mut prev = 0;
    let mut t = 0.0;
    while t < 3000.0 {
        let idx = window.query(&events, t);
        assert!(idx >= prev, "window moved backward at t={t}: {idx} < {prev}");
        prev = idx;
        t += 16.0;
    }
}

#[test]
fn earlier_sustain_wins_over_later_short_notes() {
    // A long note on lane 0 starts well before a burst of short notes on
    // other lanes; while it is still open the window must keep answering
    // with its index even though the scan cursor has moved past it.
    let events = vec![
        note(0.0, 5000.0, Lane::Fret(0)),
        note(100.0, 0.0, Lane::Fret(1)),
        note(200.0, 0.0, Lane::Fret(2)),
        note(300.0, 0.0, Lane::Fret(3)),
    ];
    let mut window = EventWindow::new();
    assert_eq!(window.query(&events, 400.0), 0);
    assert_eq!(window.query(&events, 4999.0), 0);
    assert_eq!(window.query(&events, 5001.0), 4);
}

#[test]
fn zero_duration_events_never_count_as_open() {
    let events = vec![note(100.0, 0.0, Lane::Fret(0)), note(900.0, 0.0, Lane::Fret(1))];
    let mut window = EventWindow::new();
    // Both started, neither sustains: answer is the first not-yet-started.
    assert_eq!(window.query(&events, 500.0), 1);
    assert_eq!(window.query(&events, 1000.0), 2);
}

#[test]
fn duplicate_start_times_keep_insertion_order() {
    let events = vec![
        note(500.0, 800.0, Lane::Fret(0)),
        note(500.0, 800.0, Lane::Fret(1)),
        note(500.0, 800.0, Lane::Fret(2)),
    ];
    let mut window = EventWindow::new();
    // All three are open; the lowest index (first inserted) wins.
    assert_eq!(window.query(&events, 600.0), 0);
}

#[test]
fn same_lane_keeps_only_most_recent_event_open() {
    // Lane 0 plays a short sustain, then another; after the first closes the
    // second is the lane's open event.
    let events = vec![
        note(0.0, 200.0, Lane::Fret(0)),
        note(300.0, 200.0, Lane::Fret(0)),
    ];
    let mut window = EventWindow::new();
    assert_eq!(window.query(&events, 100.0), 0);
    assert_eq!(window.query(&events, 400.0), 1);
}

#[test]
fn backward_jump_resets_and_rescans() {
    let events = vec![
        note(0.0, 100.0, Lane::Fret(0)),
        note(1000.0, 500.0, Lane::Fret(1)),
        note(2000.0, 0.0, Lane::Fret(2)),
    ];
    let mut window = EventWindow::new();
    assert_eq!(window.query(&events, 2500.0), 3);

    // Seek back into the middle sustain: the cursor invalidates and the
    // forward rescan finds it open again.
    assert_eq!(window.query(&events, 1200.0), 1);

    // And back to the very beginning.
    assert_eq!(window.query(&events, 50.0), 0);
}

#[test]
fn forward_query_after_reset_stays_correct() {
    let events = vec![note(100.0, 0.0, Lane::Fret(0)), note(600.0, 400.0, Lane::Fret(1))];
    let mut window = EventWindow::new();
    window.query(&events, 2000.0);
    window.query(&events, 0.0); // reset
    assert_eq!(window.query(&events, 700.0), 1);
    assert_eq!(window.query(&events, 1100.0), 2);
}
