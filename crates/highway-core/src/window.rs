//! Incremental index over a time-sorted event sequence.
//!
//! Answers "earliest event still active at time T" in amortized O(1) per
//! frame under forward playback. Sustained events can start before the
//! visible window yet still be active inside it, so a purely forward cursor
//! is not enough: a per-lane table remembers the most recent event scanned
//! for each lane and a single bounded pass over the lanes finds the earliest
//! one whose span still covers the query time.

use fnv::FnvHashMap;

use crate::chart::{Lane, TimedEvent};

/// Cursor state over one event sequence.
///
/// `last_scanned` is the highest index whose `start_ms` has been passed by a
/// query; `open_by_lane` holds, per lane, the most recent scanned index for
/// that lane. Both reset whenever playback jumps backward; seeks are assumed
/// infrequent relative to forward frame advancement, so the rescan-forward
/// cost after a reset is accepted.
#[derive(Debug, Default)]
pub struct EventWindow {
    last_scanned: Option<usize>,
    open_by_lane: FnvHashMap<Lane, usize>,
}

impl EventWindow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        self.last_scanned = None;
        self.open_by_lane.clear();
    }

    /// Lowest index still relevant at `now_ms`: the earliest lane-open
    /// sustain covering `now_ms`, or failing that the first event that has
    /// not started yet (which may be `events.len()` past the end).
    ///
    /// Events sharing a `start_ms` keep their insertion order. An empty
    /// sequence always yields 0.
    pub fn query(&mut self, events: &[TimedEvent], now_ms: f64) -> usize {
        if events.is_empty() {
            return 0;
        }

        // Backward jump invalidates the cursor entirely.
        if let Some(last) = self.last_scanned {
            if now_ms < events[last].start_ms {
                self.reset();
            }
        }

        // Advance over every event that has started by now, recording each
        // lane's most recent index.
        loop {
            let next = self.last_scanned.map_or(0, |i| i + 1);
            if next >= events.len() || events[next].start_ms >= now_ms {
                break;
            }
            self.open_by_lane.insert(events[next].lane, next);
            self.last_scanned = Some(next);
        }

        // The earliest still-open sustain across all lanes wins.
        let mut earliest: Option<usize> = None;
        for &idx in self.open_by_lane.values() {
            if events[idx].is_open_at(now_ms) {
                earliest = Some(earliest.map_or(idx, |e| e.min(idx)));
            }
        }

        earliest.unwrap_or_else(|| self.last_scanned.map_or(0, |i| i + 1))
    }
}
