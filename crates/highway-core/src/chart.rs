//! Chart-side data model: timestamped events, lanes, tracks and metadata.
//!
//! Everything here is immutable once the parsing layer hands it over. Event
//! sequences are always pre-sorted ascending by start time; the query layer
//! (`window`, `driver`) relies on that invariant and never re-sorts.

use fnv::FnvHashMap;

use crate::error::PlayerError;

/// A mutually-exclusive track within the event stream. At most one sustained
/// event per lane can be open at any chart time.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Lane {
    /// Fret lanes, numbered from the left (0..=4 on a standard highway).
    Fret(u8),
    /// Open strum, rendered across the whole highway width.
    Open,
    /// Solo section span.
    Solo,
    /// Freestyle/flex section span.
    Freestyle,
}

/// Explicit modifier set replacing the original flag bit-mask.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct NoteModifiers {
    pub star: bool,
    pub hopo: bool,
    pub tap: bool,
}

/// Visual variant a note renders as. Tap wins over hopo when both flags are
/// set, matching the original flag-combination mapping.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum NoteVariant {
    Strum,
    Hopo,
    Tap,
    StarStrum,
    StarHopo,
    StarTap,
}

/// Pure lookup from modifier combination to visual variant.
pub fn note_variant(m: NoteModifiers) -> NoteVariant {
    match (m.star, m.hopo, m.tap) {
        (false, false, false) => NoteVariant::Strum,
        (false, true, false) => NoteVariant::Hopo,
        (false, _, true) => NoteVariant::Tap,
        (true, false, false) => NoteVariant::StarStrum,
        (true, true, false) => NoteVariant::StarHopo,
        (true, _, true) => NoteVariant::StarTap,
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SpanKind {
    Solo,
    Freestyle,
}

/// Event payload beyond its timing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EventKind {
    Note(NoteModifiers),
    Span(SpanKind),
}

/// One timestamped, possibly-duration-bearing event on the highway.
#[derive(Clone, Copy, Debug)]
pub struct TimedEvent {
    pub start_ms: f64,
    /// Always >= 0; zero means the event closes immediately (no sustain).
    pub duration_ms: f64,
    pub lane: Lane,
    pub kind: EventKind,
}

impl TimedEvent {
    pub fn end_ms(&self) -> f64 {
        self.start_ms + self.duration_ms
    }

    /// Whether a previously-started sustain still covers `now_ms`.
    /// Zero-duration events are never considered open.
    pub fn is_open_at(&self, now_ms: f64) -> bool {
        self.duration_ms > 0.0 && self.start_ms + self.duration_ms > now_ms
    }
}

/// Key the scene layer uses to pick an opaque visual handle for an event.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct VisualKey {
    pub lane: Lane,
    pub variant: NoteVariant,
}

impl VisualKey {
    pub fn for_event(ev: &TimedEvent) -> VisualKey {
        let variant = match ev.kind {
            EventKind::Note(m) => note_variant(m),
            // Spans reuse the plain strum handle slot for their lane key.
            EventKind::Span(_) => NoteVariant::Strum,
        };
        VisualKey {
            lane: ev.lane,
            variant,
        }
    }

    /// Stable string id for handing the key across an FFI/JS boundary.
    pub fn id(&self) -> String {
        let lane = match self.lane {
            Lane::Fret(i) => return format!("fret{}:{}", i, variant_id(self.variant)),
            Lane::Open => "open",
            Lane::Solo => "solo",
            Lane::Freestyle => "freestyle",
        };
        format!("{}:{}", lane, variant_id(self.variant))
    }
}

fn variant_id(v: NoteVariant) -> &'static str {
    match v {
        NoteVariant::Strum => "strum",
        NoteVariant::Hopo => "hopo",
        NoteVariant::Tap => "tap",
        NoteVariant::StarStrum => "star-strum",
        NoteVariant::StarHopo => "star-hopo",
        NoteVariant::StarTap => "star-tap",
    }
}

/// Chart metadata supplied by the parsing layer, already in milliseconds.
#[derive(Clone, Copy, Debug, Default)]
pub struct ChartMeta {
    pub audio_length_ms: f64,
    /// Offset between chart time zero and audio sample zero. May be negative.
    pub start_delay_ms: f64,
    /// Optional initial-seek hint (e.g. the chart's preview position).
    pub preview_start_ms: Option<f64>,
}

/// Chart end time used for seeking and end-of-playback detection.
///
/// Guaranteed non-negative and positive whenever any length input is
/// positive, even for corrupt metadata such as a hugely negative start delay.
pub fn chart_end_time_ms(meta: &ChartMeta, fallback_audio_ms: f64) -> f64 {
    (meta.start_delay_ms + meta.audio_length_ms)
        .max(meta.audio_length_ms)
        .max(fallback_audio_ms)
        .max(0.0)
}

/// The full ordered event sequence for one instrument/difficulty, plus
/// section spans windowed the same way.
#[derive(Clone, Debug, Default)]
pub struct ChartTimeline {
    /// Pre-sorted ascending by `start_ms`.
    pub events: Vec<TimedEvent>,
    /// Solo/freestyle section spans, same shape and sort invariant.
    pub spans: Vec<TimedEvent>,
    pub meta: ChartMeta,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Instrument {
    Guitar,
    Bass,
    Drums,
    Keys,
    Vocals,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
    Expert,
}

/// Instrument/difficulty-qualified track lookup over one parsed chart.
#[derive(Default)]
pub struct TrackSet {
    tracks: FnvHashMap<(Instrument, Difficulty), ChartTimeline>,
}

impl TrackSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(
        &mut self,
        instrument: Instrument,
        difficulty: Difficulty,
        timeline: ChartTimeline,
    ) {
        self.tracks.insert((instrument, difficulty), timeline);
    }

    /// Fails when the requested track is absent; fatal to the load operation
    /// but never to the instance.
    pub fn timeline(
        &self,
        instrument: Instrument,
        difficulty: Difficulty,
    ) -> Result<&ChartTimeline, PlayerError> {
        self.tracks.get(&(instrument, difficulty)).ok_or(
            PlayerError::MissingTrack {
                instrument,
                difficulty,
            },
        )
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }
}
