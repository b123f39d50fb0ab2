// Host-side tests for scheduling math, the volume curve and end detection.

use highway_core::sched::{
    end_timer_delay_ms, gain_for_volume, source_start, volume_for_gain, EndDetector, SourceStart,
};

#[test]
fn mid_buffer_join_uses_read_offset() {
    // Seeked to 30s into a chart whose audio starts at chart time 2s: the
    // buffer begins immediately, 28s in.
    match source_start(30_000.0, 2_000.0) {
        SourceStart::Immediate { offset_sec } => assert!((offset_sec - 28.0).abs() < 1e-9),
        other => panic!("expected immediate start, got {other:?}"),
    }
}

#[test]
fn chart_time_before_audio_defers_the_source() {
    // Chart time 1s, audio begins at 3.5s: schedule 2.5s in the future with
    // a read offset of zero.
    match source_start(1_000.0, 3_500.0) {
        SourceStart::Deferred { delay_sec } => assert!((delay_sec - 2.5).abs() < 1e-9),
        other => panic!("expected deferred start, got {other:?}"),
    }
}

#[test]
fn negative_start_delay_joins_mid_buffer_from_time_zero() {
    // A negative delay means audio content precedes chart time zero, so even
    // chart time 0 is a mid-buffer join.
    match source_start(0.0, -4_000.0) {
        SourceStart::Immediate { offset_sec } => assert!((offset_sec - 4.0).abs() < 1e-9),
        other => panic!("expected immediate start, got {other:?}"),
    }
}

#[test]
fn start_boundary_is_immediate_with_zero_offset() {
    match source_start(2_000.0, 2_000.0) {
        SourceStart::Immediate { offset_sec } => assert_eq!(offset_sec, 0.0),
        other => panic!("expected immediate start, got {other:?}"),
    }
}

#[test]
fn volume_curve_is_power_scaled_and_round_trips() {
    assert_eq!(gain_for_volume(0.0), 0.0);
    assert_eq!(gain_for_volume(1.0), 1.0);
    assert!((gain_for_volume(0.5) - 0.25).abs() < 1e-12);

    // Out-of-range input clamps instead of escaping [0, 1].
    assert_eq!(gain_for_volume(1.5), 1.0);
    assert_eq!(gain_for_volume(-0.2), 0.0);

    for i in 0..=20 {
        let v = i as f64 / 20.0;
        let back = volume_for_gain(gain_for_volume(v));
        assert!((back - v).abs() < 1e-12, "round trip failed at {v}");
    }
}

#[test]
fn end_fires_once_when_all_sources_complete() {
    let mut det = EndDetector::new();
    let session = det.begin(3);
    assert!(!det.source_ended(session));
    assert!(!det.source_ended(session));
    assert!(det.source_ended(session), "last completion fires end");
    assert!(!det.source_ended(session), "never twice per session");
}

#[test]
fn cancelled_session_ignores_late_callbacks() {
    let mut det = EndDetector::new();
    let session = det.begin(2);
    assert!(!det.source_ended(session));
    // Pause stops the sources; their onended callbacks still arrive but
    // must not read as a natural end.
    det.cancel();
    assert!(!det.source_ended(session));
    assert!(!det.timer_fired(session));
}

#[test]
fn stale_session_callbacks_never_cross_into_a_new_session() {
    let mut det = EndDetector::new();
    let old = det.begin(1);
    let new = det.begin(2);
    // A leftover timer from the superseded session fires late.
    assert!(!det.timer_fired(old));
    // The new session still needs both of its own completions.
    assert!(!det.source_ended(new));
    assert!(det.source_ended(new));
}

#[test]
fn zero_buffer_sessions_end_via_timer() {
    let mut det = EndDetector::new();
    let session = det.begin(1);
    assert!(det.timer_fired(session));
    assert!(!det.timer_fired(session), "timer end also fires only once");
}

#[test]
fn end_timer_delay_is_remaining_chart_time() {
    assert_eq!(end_timer_delay_ms(5_000.0, 0.0), 5_000.0);
    assert_eq!(end_timer_delay_ms(5_000.0, 4_250.0), 750.0);
    // Past the end (seek beyond, rounding) the timer fires immediately
    // rather than going negative.
    assert_eq!(end_timer_delay_ms(5_000.0, 6_000.0), 0.0);
}
