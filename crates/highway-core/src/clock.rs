//! Per-instance playback clock over a shared, never-reset device time base.
//!
//! The device clock (WebAudio context time, or a wall clock when no audio
//! device exists) is monotonic and shared across all player instances; each
//! instance superimposes its own paused/seeking state on it and derives a
//! private logical "chart time" in milliseconds.

use instant::Instant;

/// Monotonic time source shared by every instance in the process.
///
/// Implementations must never reset to zero while any instance is alive.
pub trait DeviceClock {
    /// Current device time in seconds.
    fn now_sec(&self) -> f64;

    /// Known output latency of the rendering path, subtracted from reported
    /// chart time so visuals line up with what is audible.
    fn output_latency_sec(&self) -> f64 {
        0.0
    }
}

/// Wall-clock fallback for unsupported environments. Same state machine,
/// different time source; transparent to the frame driver.
#[derive(Debug)]
pub struct WallClock {
    origin: Instant,
}

impl WallClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for WallClock {
    fn default() -> Self {
        Self::new()
    }
}

impl DeviceClock for WallClock {
    fn now_sec(&self) -> f64 {
        self.origin.elapsed().as_secs_f64()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Phase {
    Paused,
    Playing,
}

/// Reconciles the shared device clock against one instance's chart time.
///
/// Mutated only by play/pause/seek transitions; the render loop reads it but
/// never writes. While paused the reported chart time is frozen at the last
/// sync point; while playing it advances with the device clock.
#[derive(Clone, Copy, Debug)]
pub struct PlaybackClock {
    phase: Phase,
    chart_ms_at_sync: f64,
    device_sec_at_sync: f64,
}

impl PlaybackClock {
    /// Fresh clock: paused at chart time zero.
    pub fn new() -> Self {
        Self {
            phase: Phase::Paused,
            chart_ms_at_sync: 0.0,
            device_sec_at_sync: 0.0,
        }
    }

    pub fn is_playing(&self) -> bool {
        self.phase == Phase::Playing
    }

    /// Current chart time in milliseconds.
    pub fn current_ms(&self, clock: &dyn DeviceClock) -> f64 {
        match self.phase {
            Phase::Paused => self.chart_ms_at_sync,
            Phase::Playing => {
                let elapsed_sec =
                    clock.now_sec() - self.device_sec_at_sync - clock.output_latency_sec();
                self.chart_ms_at_sync + elapsed_sec * 1000.0
            }
        }
    }

    /// Chart time the last transition synced at. This is the buffer-relative
    /// anchor the audio scheduler computes start offsets from.
    pub fn chart_ms_at_sync(&self) -> f64 {
        self.chart_ms_at_sync
    }

    /// Start advancing from the frozen chart time. Returns false if already
    /// playing (idempotent).
    pub fn play(&mut self, clock: &dyn DeviceClock) -> bool {
        if self.phase == Phase::Playing {
            return false;
        }
        self.device_sec_at_sync = clock.now_sec();
        self.phase = Phase::Playing;
        true
    }

    /// Freeze chart time at its current value. Returns false if already
    /// paused.
    pub fn pause(&mut self, clock: &dyn DeviceClock) -> bool {
        if self.phase == Phase::Paused {
            return false;
        }
        self.chart_ms_at_sync = self.current_ms(clock);
        self.phase = Phase::Paused;
        true
    }

    /// Jump to an absolute chart time. Always lands paused, whatever the
    /// prior state; the caller decides whether to play again immediately.
    pub fn seek_to_ms(&mut self, target_ms: f64) {
        self.chart_ms_at_sync = target_ms;
        self.phase = Phase::Paused;
    }
}

impl Default for PlaybackClock {
    fn default() -> Self {
        Self::new()
    }
}
