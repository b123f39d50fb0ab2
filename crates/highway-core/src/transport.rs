//! Per-instance transport: the playback clock, end detection and volume,
//! orchestrated behind the public play/pause/seek surface.
//!
//! The platform audio layer sits behind [`PlayCommand`]: every successful
//! `play()` describes exactly what that layer must do (how to start each
//! buffer, and whether to arm a zero-buffer end timer). `pause`, `seek` and
//! `dispose` invalidate the running session so stale source/timer callbacks
//! cannot fire a spurious end notification.

use crate::clock::{DeviceClock, PlaybackClock};
use crate::constants::DEFAULT_VOLUME;
use crate::sched::{
    end_timer_delay_ms, gain_for_volume, source_start, EndDetector, SessionId, SourceStart,
};

/// What the platform audio layer must do after a `play()` transition.
#[derive(Clone, Copy, Debug)]
pub struct PlayCommand {
    pub session: SessionId,
    /// Start rule for every decoded buffer of this instance.
    pub start: SourceStart,
    /// With zero decoded buffers there is nothing to complete naturally, so
    /// a timer covers end detection instead.
    pub end_timer_ms: Option<f64>,
}

/// One instance's transport over a shared device clock.
///
/// Within one instance, `pause` -> `seek` -> `play` issued in sequence apply
/// in that order; callers serialize concurrent calls (the frontends gate on
/// a busy/loading state).
pub struct Transport<C: DeviceClock> {
    time_source: C,
    clock: PlaybackClock,
    detector: EndDetector,
    end_ms: f64,
    volume: f64,
    disposed: bool,
}

impl<C: DeviceClock> Transport<C> {
    pub fn new(time_source: C, chart_end_ms: f64) -> Self {
        Self {
            time_source,
            clock: PlaybackClock::new(),
            detector: EndDetector::new(),
            end_ms: chart_end_ms,
            volume: DEFAULT_VOLUME,
            disposed: false,
        }
    }

    pub fn is_playing(&self) -> bool {
        !self.disposed && self.clock.is_playing()
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    /// Current chart time in milliseconds. Frozen while paused.
    pub fn current_ms(&self) -> f64 {
        self.clock.current_ms(&self.time_source)
    }

    pub fn end_ms(&self) -> f64 {
        self.end_ms
    }

    /// Recompute the end time once decoded buffer lengths are known (the
    /// fallback input to the end-time formula).
    pub fn set_end_ms(&mut self, chart_end_ms: f64) {
        self.end_ms = chart_end_ms;
    }

    /// Fraction of the chart played, in [0, 1].
    pub fn progress(&self) -> f64 {
        if self.end_ms <= 0.0 {
            return 0.0;
        }
        (self.current_ms() / self.end_ms).clamp(0.0, 1.0)
    }

    /// Perceptual volume in [0, 1].
    pub fn volume(&self) -> f64 {
        self.volume
    }

    /// Store a perceptual volume and return the power-scaled gain the
    /// platform layer should apply to its gain control.
    pub fn set_volume(&mut self, volume: f64) -> f64 {
        self.volume = volume.clamp(0.0, 1.0);
        gain_for_volume(self.volume)
    }

    /// Gain value for the currently stored volume.
    pub fn gain(&self) -> f64 {
        gain_for_volume(self.volume)
    }

    /// Transition to playing. Returns `None` when already playing or
    /// disposed; otherwise the command the audio layer must carry out.
    ///
    /// `source_count` is the number of decoded buffers about to start;
    /// `start_delay_ms` is the chart's audio offset.
    pub fn play(&mut self, source_count: usize, start_delay_ms: f64) -> Option<PlayCommand> {
        if self.disposed || self.clock.is_playing() {
            return None;
        }
        let chart_ms = self.clock.chart_ms_at_sync();
        let session = self
            .detector
            .begin(if source_count == 0 { 1 } else { source_count });
        self.clock.play(&self.time_source);
        Some(PlayCommand {
            session,
            start: source_start(chart_ms, start_delay_ms),
            end_timer_ms: if source_count == 0 {
                Some(end_timer_delay_ms(self.end_ms, chart_ms))
            } else {
                None
            },
        })
    }

    /// Freeze the chart clock and invalidate the running session so the
    /// platform's stop of its sources cannot read as a natural end. Only this
    /// instance stops; the shared device is never suspended here.
    pub fn pause(&mut self) -> bool {
        if self.disposed {
            return false;
        }
        self.detector.cancel();
        self.clock.pause(&self.time_source)
    }

    /// Jump to `percent` of the chart. Lands paused regardless of prior
    /// state; the caller decides whether to play again immediately.
    pub fn seek(&mut self, percent: f64) {
        if self.disposed {
            return;
        }
        self.detector.cancel();
        let target = percent.clamp(0.0, 1.0) * self.end_ms;
        self.clock.seek_to_ms(target);
    }

    /// Jump to an absolute chart time (used for the initial preview seek).
    pub fn seek_to_ms(&mut self, target_ms: f64) {
        if self.disposed {
            return;
        }
        self.detector.cancel();
        self.clock.seek_to_ms(target_ms.clamp(0.0, self.end_ms));
    }

    /// A buffer source reported natural completion. True exactly once per
    /// play session, when the last source of a still-playing instance ends;
    /// the transport then freezes at the current chart time.
    pub fn source_ended(&mut self, session: SessionId) -> bool {
        if self.disposed || !self.clock.is_playing() {
            return false;
        }
        if self.detector.source_ended(session) {
            self.clock.pause(&self.time_source);
            true
        } else {
            false
        }
    }

    /// The zero-buffer end timer elapsed. Same contract as
    /// [`Transport::source_ended`].
    pub fn timer_fired(&mut self, session: SessionId) -> bool {
        if self.disposed || !self.clock.is_playing() {
            return false;
        }
        if self.detector.timer_fired(session) {
            self.clock.pause(&self.time_source);
            true
        } else {
            false
        }
    }

    /// Terminal. Further transitions are no-ops.
    pub fn dispose(&mut self) {
        self.detector.cancel();
        self.clock.pause(&self.time_source);
        self.disposed = true;
    }
}
