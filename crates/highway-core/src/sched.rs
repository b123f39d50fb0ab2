//! Scheduling math for joining audio playback mid-stream, the perceptual
//! volume curve, and end-of-playback detection.
//!
//! The platform layer owns the actual buffer sources; everything here is the
//! platform-independent contract it applies.

/// How a decoded buffer should be started for a given sync point.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum SourceStart {
    /// Chart time is at or past the audio start: begin immediately with an
    /// internal read offset into the buffer (mid-buffer join).
    Immediate { offset_sec: f64 },
    /// Chart time is before the audio start: the chart clock runs but audio
    /// has not begun; schedule the source for a future device time with a
    /// read offset of zero.
    Deferred { delay_sec: f64 },
}

/// Sample-accurate start decision for arbitrary seek positions, including
/// negative start delays.
pub fn source_start(chart_ms_at_sync: f64, start_delay_ms: f64) -> SourceStart {
    let offset_sec = (chart_ms_at_sync - start_delay_ms) / 1000.0;
    if offset_sec >= 0.0 {
        SourceStart::Immediate { offset_sec }
    } else {
        SourceStart::Deferred {
            delay_sec: -offset_sec,
        }
    }
}

/// Gain value to apply for a perceptual volume in [0, 1]. The underlying
/// control is power-scaled (v^2) so the public contract stays roughly
/// linear-perceptual.
pub fn gain_for_volume(volume: f64) -> f64 {
    let v = volume.clamp(0.0, 1.0);
    v * v
}

/// Inverse of [`gain_for_volume`].
pub fn volume_for_gain(gain: f64) -> f64 {
    gain.max(0.0).sqrt()
}

/// Identifies one play session. Every `play()` begins a new session;
/// callbacks stamped with a superseded id are ignored, which is what keeps a
/// pause-triggered stop or a seek-during-end race from firing a stale end
/// notification.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SessionId(u64);

/// Tracks natural completion of a play session's sources.
///
/// With one or more buffers, end fires when all of them report completion.
/// With zero buffers the platform arms a timer instead and reports through
/// [`EndDetector::timer_fired`]. Either way the detector fires at most once
/// per session.
#[derive(Debug)]
pub struct EndDetector {
    session: u64,
    pending: usize,
    fired: bool,
}

impl EndDetector {
    pub fn new() -> Self {
        Self {
            session: 0,
            pending: 0,
            fired: false,
        }
    }

    /// Begin a new play session expecting `source_count` natural completions.
    pub fn begin(&mut self, source_count: usize) -> SessionId {
        self.session += 1;
        self.pending = source_count;
        self.fired = false;
        SessionId(self.session)
    }

    /// Invalidate the current session. Outstanding callbacks carrying the old
    /// id become no-ops. Called on pause, seek and dispose.
    pub fn cancel(&mut self) {
        self.session += 1;
        self.pending = 0;
        self.fired = false;
    }

    /// One source reported natural completion. Returns true exactly when this
    /// was the last pending source of the current session.
    pub fn source_ended(&mut self, id: SessionId) -> bool {
        if id.0 != self.session || self.fired {
            return false;
        }
        self.pending = self.pending.saturating_sub(1);
        if self.pending == 0 {
            self.fired = true;
            true
        } else {
            false
        }
    }

    /// The zero-buffer end timer elapsed. Returns true unless the session was
    /// superseded or end already fired.
    pub fn timer_fired(&mut self, id: SessionId) -> bool {
        if id.0 != self.session || self.fired {
            return false;
        }
        self.fired = true;
        true
    }
}

impl Default for EndDetector {
    fn default() -> Self {
        Self::new()
    }
}

/// Delay to arm the zero-buffer end timer with. Re-armed on every play and
/// seek, cancelled on pause and dispose.
pub fn end_timer_delay_ms(chart_end_ms: f64, chart_now_ms: f64) -> f64 {
    (chart_end_ms - chart_now_ms).max(0.0)
}
