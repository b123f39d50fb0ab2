use thiserror::Error;

use crate::chart::{Difficulty, Instrument};

/// Failure taxonomy for one player instance.
///
/// None of these are allowed to escape the top-level API as a panic; the
/// frontend surfaces them as an error notification plus a terminal state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlayerError {
    /// The requested instrument/difficulty has no events in the chart.
    /// Fatal to the load operation, not to the instance.
    #[error("no {instrument:?} track at {difficulty:?} difficulty")]
    MissingTrack {
        instrument: Instrument,
        difficulty: Difficulty,
    },

    /// A single audio file failed to decode. Recoverable; the scheduler
    /// runs with whatever buffers did decode.
    #[error("audio decode failed for {file}")]
    Decode { file: String },

    /// Fetching source bytes failed for a reason other than cancellation.
    #[error("audio fetch failed for {file}: {reason}")]
    Fetch { file: String, reason: String },

    /// An in-flight load was superseded or explicitly cancelled. Not
    /// reported as an error to listeners.
    #[error("load cancelled")]
    Cancelled,

    /// No audio device in this environment. Recoverable; playback degrades
    /// to a silent wall-clock transport.
    #[error("audio device unavailable")]
    DeviceUnavailable,
}

impl PlayerError {
    /// Cancellation is cooperative, not a failure.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, PlayerError::Cancelled)
    }
}
