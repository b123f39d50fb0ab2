//! Per-frame orchestration: pull chart time, window the event stream, and
//! keep the set of live visuals in sync with what the highway should show.
//!
//! The scene layer is external; the driver talks to it through
//! [`HighwayView`] using opaque event indices and never assumes anything
//! about what a handle looks like.

use fnv::FnvHashSet;
use glam::Vec3;
use smallvec::SmallVec;

use crate::chart::{Lane, TimedEvent};
use crate::constants::{HIGHWAY_LENGTH, HORIZON_MS, LANE_SPACING, STRIKE_LINE_Z};
use crate::window::EventWindow;

/// Sink for visual updates, implemented by the scene layer.
pub trait HighwayView {
    /// A new event entered the horizon.
    fn spawn(&mut self, index: usize, event: &TimedEvent);
    /// A live event needs its interpolated position recomputed.
    fn update(&mut self, index: usize, event: &TimedEvent, now_ms: f64);
    /// An event left the active window and should be torn down.
    fn evict(&mut self, index: usize);
}

/// World-space x coordinate for a lane.
pub fn lane_x(lane: Lane) -> f32 {
    match lane {
        // Center fret 2 of five on x = 0.
        Lane::Fret(i) => (i as f32 - 2.0) * LANE_SPACING,
        Lane::Open | Lane::Solo | Lane::Freestyle => 0.0,
    }
}

/// Interpolated highway position for an event at the given chart time.
/// Events scroll from the far end of the highway toward the strike line,
/// crossing it exactly when `start_ms == now_ms`.
pub fn note_position(event: &TimedEvent, now_ms: f64) -> Vec3 {
    let ahead = ((event.start_ms - now_ms) / HORIZON_MS) as f32;
    Vec3::new(lane_x(event.lane), 0.0, STRIKE_LINE_Z - ahead * HIGHWAY_LENGTH)
}

/// Keeps one event stream's live visual set consistent each frame.
///
/// Live events are the ones in `[earliest_active, now + horizon]`; the
/// spawn cursor only moves forward, and a backward jump in chart time tears
/// everything down and rebuilds from the window's reset cursor.
pub struct FrameDriver {
    window: EventWindow,
    live: FnvHashSet<usize>,
    next_spawn: usize,
    last_now_ms: f64,
}

impl FrameDriver {
    pub fn new() -> Self {
        Self {
            window: EventWindow::new(),
            live: FnvHashSet::default(),
            next_spawn: 0,
            last_now_ms: f64::NEG_INFINITY,
        }
    }

    /// Number of currently live visuals (diagnostics/tests).
    pub fn live_count(&self) -> usize {
        self.live.len()
    }

    /// Advance to `now_ms`, driving the view. Returns the earliest active
    /// index the window reported.
    pub fn tick(
        &mut self,
        events: &[TimedEvent],
        now_ms: f64,
        view: &mut dyn HighwayView,
    ) -> usize {
        // Backward jump: evict everything and respawn from scratch. Seeks
        // are rare next to forward frames, so the rebuild cost is accepted.
        if now_ms < self.last_now_ms {
            let torn_down: SmallVec<[usize; 16]> = self.live.drain().collect();
            for idx in torn_down {
                view.evict(idx);
            }
            self.next_spawn = 0;
        }
        self.last_now_ms = now_ms;

        let first = self.window.query(events, now_ms);
        let horizon_end_ms = now_ms + HORIZON_MS;

        // Recompute positions for survivors, collect the rest for eviction.
        let mut gone: SmallVec<[usize; 16]> = SmallVec::new();
        for &idx in &self.live {
            let ev = &events[idx];
            if idx >= first && ev.start_ms <= horizon_end_ms {
                view.update(idx, ev, now_ms);
            } else {
                gone.push(idx);
            }
        }
        for idx in gone {
            self.live.remove(&idx);
            view.evict(idx);
        }

        // Spawn newly-entering events up to the horizon.
        if self.next_spawn < first {
            self.next_spawn = first;
        }
        while self.next_spawn < events.len() && events[self.next_spawn].start_ms <= horizon_end_ms {
            let idx = self.next_spawn;
            self.next_spawn += 1;
            if self.live.insert(idx) {
                view.spawn(idx, &events[idx]);
                view.update(idx, &events[idx], now_ms);
            }
        }

        first
    }
}

impl Default for FrameDriver {
    fn default() -> Self {
        Self::new()
    }
}

/// Rate limit for progress notifications: never emits more often than the
/// configured interval, regardless of frame rate.
pub struct ProgressThrottle {
    min_interval_ms: f64,
    last_emit_ms: Option<f64>,
}

impl ProgressThrottle {
    pub fn new(min_interval_ms: f64) -> Self {
        Self {
            min_interval_ms,
            last_emit_ms: None,
        }
    }

    /// Offer a progress value at `wall_now_ms`; returns it back when enough
    /// wall time has passed since the last emission.
    pub fn poll(&mut self, wall_now_ms: f64, percent: f64) -> Option<f64> {
        match self.last_emit_ms {
            Some(last) if wall_now_ms - last < self.min_interval_ms => None,
            _ => {
                self.last_emit_ms = Some(wall_now_ms);
                Some(percent)
            }
        }
    }

    /// Forget the last emission so the next poll emits immediately (used
    /// after a seek so listeners see the new position without delay).
    pub fn reset(&mut self) {
        self.last_emit_ms = None;
    }
}
