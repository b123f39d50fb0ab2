// Host-side tests for the frame driver and progress throttling.

use std::collections::HashSet;

use highway_core::chart::{EventKind, Lane, NoteModifiers, TimedEvent};
use highway_core::constants::{HORIZON_MS, PROGRESS_MIN_INTERVAL_MS, STRIKE_LINE_Z};
use highway_core::driver::{note_position, FrameDriver, HighwayView, ProgressThrottle};

fn note(start_ms: f64, duration_ms: f64, lane: Lane) -> TimedEvent {
    TimedEvent {
        start_ms,
        duration_ms,
        lane,
        kind: EventKind::Note(NoteModifiers::default()),
    }
}

#[derive(Default)]
struct RecordingView {
    live: HashSet<usize>,
    spawns: Vec<usize>,
    evictions: Vec<usize>,
    updates: usize,
}

impl HighwayView for RecordingView {
    fn spawn(&mut self, index: usize, _event: &TimedEvent) {
        assert!(self.live.insert(index), "double spawn of {index}");
        self.spawns.push(index);
    }
    fn update(&mut self, index: usize, _event: &TimedEvent, _now_ms: f64) {
        assert!(self.live.contains(&index), "update of dead {index}");
        self.updates += 1;
    }
    fn evict(&mut self, index: usize) {
        assert!(self.live.remove(&index), "evict of dead {index}");
        self.evictions.push(index);
    }
}

#[test]
fn spawns_only_events_inside_the_horizon() {
    let events = vec![
        note(500.0, 0.0, Lane::Fret(0)),
        note(1_000.0, 0.0, Lane::Fret(1)),
        note(HORIZON_MS + 1_000.0, 0.0, Lane::Fret(2)),
    ];
    let mut driver = FrameDriver::new();
    let mut view = RecordingView::default();

    driver.tick(&events, 0.0, &mut view);
    assert_eq!(view.spawns, vec![0, 1], "third note is past the horizon");

    driver.tick(&events, 1_100.0, &mut view);
    assert!(view.live.contains(&2), "scrolled into the horizon");
}

#[test]
fn passed_notes_are_evicted() {
    let events = vec![note(100.0, 0.0, Lane::Fret(0)), note(5_000.0, 0.0, Lane::Fret(1))];
    let mut driver = FrameDriver::new();
    let mut view = RecordingView::default();

    driver.tick(&events, 0.0, &mut view);
    assert!(view.live.contains(&0));

    driver.tick(&events, 200.0, &mut view);
    assert!(!view.live.contains(&0), "zero-duration note behind now");
    assert_eq!(view.evictions, vec![0]);
}

#[test]
fn open_sustain_survives_past_its_start() {
    let events = vec![
        note(100.0, 2_000.0, Lane::Fret(0)),
        note(300.0, 0.0, Lane::Fret(1)),
    ];
    let mut driver = FrameDriver::new();
    let mut view = RecordingView::default();

    driver.tick(&events, 0.0, &mut view);
    driver.tick(&events, 1_500.0, &mut view);
    assert!(view.live.contains(&0), "sustain still open at 1500");
    // The window starts at the open sustain, so the short note between it
    // and `now` is still inside the index range and stays live.
    assert!(view.live.contains(&1));

    driver.tick(&events, 2_200.0, &mut view);
    assert!(!view.live.contains(&0), "sustain closed at 2100");
    assert!(!view.live.contains(&1), "window start moved past it");
}

#[test]
fn live_set_is_stable_across_repeated_frames() {
    let events: Vec<TimedEvent> = (0..100)
        .map(|i| note(i as f64 * 50.0, 0.0, Lane::Fret((i % 5) as u8)))
        .collect();
    let mut driver = FrameDriver::new();
    let mut view = RecordingView::default();

    let mut t = 0.0;
    while t < 6_000.0 {
        driver.tick(&events, t, &mut view);
        assert_eq!(driver.live_count(), view.live.len());
        t += 16.0;
    }
    // Everything before `now` minus the horizon tail has been evicted and
    // every event was spawned exactly once on the way through.
    assert_eq!(view.spawns.len(), 100);
}

#[test]
fn backward_seek_tears_down_and_respawns() {
    let events: Vec<TimedEvent> = (0..20)
        .map(|i| note(i as f64 * 500.0, 0.0, Lane::Fret((i % 5) as u8)))
        .collect();
    let mut driver = FrameDriver::new();
    let mut view = RecordingView::default();

    driver.tick(&events, 8_000.0, &mut view);
    let live_late: Vec<usize> = view.live.iter().copied().collect();
    assert!(live_late.iter().all(|&i| i >= 16));

    driver.tick(&events, 1_000.0, &mut view);
    assert!(view.live.contains(&2), "respawned after the jump back");
    assert!(
        view.live.iter().all(|&i| events[i].start_ms <= 1_000.0 + HORIZON_MS),
        "live set rebuilt for the new window"
    );
}

#[test]
fn note_position_crosses_strike_line_at_start_time() {
    let ev = note(1_000.0, 0.0, Lane::Fret(2));
    let at_start = note_position(&ev, 1_000.0);
    assert!((at_start.z - STRIKE_LINE_Z).abs() < 1e-6);
    assert_eq!(at_start.x, 0.0, "fret 2 is the center lane");

    let before = note_position(&ev, 0.0);
    let closer = note_position(&ev, 500.0);
    assert!(before.z < closer.z, "notes approach the strike line over time");
}

#[test]
fn progress_throttle_limits_emission_rate() {
    let mut throttle = ProgressThrottle::new(PROGRESS_MIN_INTERVAL_MS);
    let mut emitted = 0;
    // 60fps for two seconds of wall time.
    let mut wall = 0.0;
    while wall < 2_000.0 {
        if throttle.poll(wall, wall / 2_000.0).is_some() {
            emitted += 1;
        }
        wall += 16.0;
    }
    let max_allowed = (2_000.0 / PROGRESS_MIN_INTERVAL_MS) as i32 + 1;
    assert!(
        emitted <= max_allowed,
        "{emitted} emissions exceed throttle bound {max_allowed}"
    );
    assert!(emitted >= 2, "throttle must still let progress through");
}

#[test]
fn progress_throttle_reset_emits_immediately() {
    let mut throttle = ProgressThrottle::new(PROGRESS_MIN_INTERVAL_MS);
    assert!(throttle.poll(0.0, 0.1).is_some());
    assert!(throttle.poll(10.0, 0.2).is_none());
    throttle.reset();
    assert!(throttle.poll(11.0, 0.3).is_some(), "seek resets the throttle");
}
