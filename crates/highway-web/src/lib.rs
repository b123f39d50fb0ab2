#![cfg(target_arch = "wasm32")]
//! WASM front-end for the note-highway player.
//!
//! Exposes one `HighwayPlayer` per chart instance to the host page. The
//! parsing layer (JS side) feeds pre-sorted events and metadata in; the
//! scene layer receives spawn/update/evict callbacks with opaque indices;
//! audio rides the process-shared `AudioContext`.

pub mod audio;
pub mod fetch;
pub mod frame;

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use js_sys::Function;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::spawn_local;

use highway_core::chart::{
    chart_end_time_ms, ChartMeta, ChartTimeline, EventKind, Lane, NoteModifiers, SpanKind,
    TimedEvent,
};
use highway_core::clock::WallClock;
use highway_core::constants::PROGRESS_MIN_INTERVAL_MS;
use highway_core::driver::{FrameDriver, ProgressThrottle};
use highway_core::error::PlayerError;
use highway_core::sched::SessionId;
use highway_core::transport::Transport;

use crate::audio::{InstanceAudio, TimeSource, WebAudioClock};
use crate::fetch::LoadHandle;
use crate::frame::{FrameOutcome, FrameTarget, SceneBindings, SceneAdapter};

#[wasm_bindgen(start)]
pub fn start() -> Result<(), JsValue> {
    console_error_panic_hook::set_once();
    console_log::init_with_level(log::Level::Info).ok();
    log::info!("highway-web starting");
    Ok(())
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum LoadState {
    Idle,
    Loading,
    Ready,
    Failed,
    Disposed,
}

struct Instance {
    transport: Transport<TimeSource>,
    audio: InstanceAudio,
    timeline: ChartTimeline,
    notes_driver: FrameDriver,
    spans_driver: FrameDriver,
    throttle: ProgressThrottle,
    scene: SceneBindings,
    on_progress: Option<Function>,
    on_end: Option<Function>,
    on_error: Option<Function>,
    state: LoadState,
    load: Option<LoadHandle>,
    load_seq: u64,
    pending_urls: Vec<String>,
    wall: WallClock,
}

impl Instance {
    fn new(meta: ChartMeta) -> Self {
        // No audio device is recoverable: same transport over a wall clock,
        // silent output, invisible to the frame driver.
        let (time_source, audio) = match audio::register_instance() {
            Ok(ctx) => (
                TimeSource::Device(WebAudioClock::new(ctx.clone())),
                InstanceAudio::new(Some(ctx), highway_core::sched::gain_for_volume(
                    highway_core::constants::DEFAULT_VOLUME,
                )),
            ),
            Err(e) => {
                log::warn!("{e}; falling back to wall-clock transport");
                (TimeSource::Wall(WallClock::new()), InstanceAudio::new(None, 0.0))
            }
        };
        let end_ms = chart_end_time_ms(&meta, 0.0);
        Self {
            transport: Transport::new(time_source, end_ms),
            audio,
            timeline: ChartTimeline {
                events: Vec::new(),
                spans: Vec::new(),
                meta,
            },
            notes_driver: FrameDriver::new(),
            spans_driver: FrameDriver::new(),
            throttle: ProgressThrottle::new(PROGRESS_MIN_INTERVAL_MS),
            scene: SceneBindings::default(),
            on_progress: None,
            on_end: None,
            on_error: None,
            state: LoadState::Idle,
            load: None,
            load_seq: 0,
            pending_urls: Vec::new(),
            wall: WallClock::new(),
        }
    }

    fn recompute_end(&mut self) {
        let end = chart_end_time_ms(&self.timeline.meta, self.audio.longest_buffer_ms());
        self.transport.set_end_ms(end);
    }

    fn fail(&mut self, err: &PlayerError) {
        // Cancellation is cooperative, not an error, and never terminal.
        if err.is_cancellation() {
            return;
        }
        log::error!("player error: {err}");
        self.state = LoadState::Failed;
        if let Some(cb) = &self.on_error {
            let _ = cb.call1(&JsValue::NULL, &JsValue::from_str(&err.to_string()));
        }
    }

    fn gate_open(&self, op: &str) -> bool {
        match self.state {
            LoadState::Idle | LoadState::Ready => true,
            s => {
                log::warn!("{op} ignored in {s:?} state");
                false
            }
        }
    }
}

impl FrameTarget for Instance {
    fn frame(&mut self) -> FrameOutcome {
        if self.state == LoadState::Disposed {
            return FrameOutcome {
                keep_going: false,
                progress: None,
            };
        }
        let now_ms = self.transport.current_ms();
        {
            let mut notes = SceneAdapter {
                bindings: &self.scene,
                stream: "note",
            };
            self.notes_driver.tick(&self.timeline.events, now_ms, &mut notes);
        }
        {
            let mut spans = SceneAdapter {
                bindings: &self.scene,
                stream: "span",
            };
            self.spans_driver.tick(&self.timeline.spans, now_ms, &mut spans);
        }

        let progress = if self.transport.is_playing() {
            let wall_ms = self.wall.now_sec() * 1000.0;
            self.throttle.poll(wall_ms, self.transport.progress())
        } else {
            None
        };
        FrameOutcome {
            keep_going: true,
            progress,
        }
    }

    fn progress_callback(&self) -> Option<Function> {
        self.on_progress.clone()
    }
}

// Called from source onended / end-timer closures. The end notification is
// emitted after the borrow is released.
fn handle_session_end(inst: &Rc<RefCell<Instance>>, session: SessionId, from_timer: bool) {
    let fired = {
        let mut i = inst.borrow_mut();
        let fired = if from_timer {
            i.transport.timer_fired(session)
        } else {
            i.transport.source_ended(session)
        };
        if fired {
            i.audio.clear_end_timer();
        }
        fired
    };
    if fired {
        let cb = inst.borrow().on_end.clone();
        if let Some(cb) = cb {
            let _ = cb.call0(&JsValue::NULL);
        }
    }
}

async fn run_load(inst: Rc<RefCell<Instance>>, seq: u64, urls: Vec<String>) {
    for url in &urls {
        // Bail out quietly once this load has been superseded.
        let (still_current, ctx, signal) = {
            let i = inst.borrow();
            (
                i.load_seq == seq && i.state == LoadState::Loading,
                i.audio.context().cloned(),
                i.load.as_ref().and_then(|l| l.signal()),
            )
        };
        if !still_current {
            return;
        }
        let Some(ctx) = ctx else {
            // Wall-clock mode: nothing to decode, zero usable buffers.
            break;
        };

        let bytes = match fetch::fetch_bytes(url, signal).await {
            Ok(b) => b,
            Err(e) if e.is_cancellation() => return,
            Err(e) => {
                inst.borrow_mut().fail(&e);
                return;
            }
        };

        match fetch::decode_audio(&ctx, url, &bytes).await {
            Ok(buffer) => {
                let mut i = inst.borrow_mut();
                if i.load_seq == seq {
                    i.audio.push_buffer(buffer);
                }
            }
            Err(e) => {
                // Per-file decode failure: keep going with the rest.
                log::warn!("{e}");
            }
        }
    }

    let mut i = inst.borrow_mut();
    if i.load_seq != seq || i.state != LoadState::Loading {
        return;
    }
    i.recompute_end();
    if let Some(preview_ms) = i.timeline.meta.preview_start_ms {
        i.transport.seek_to_ms(preview_ms);
        i.throttle.reset();
    }
    i.load = None;
    i.state = LoadState::Ready;
    log::info!(
        "chart ready: {} buffers, end at {:.0}ms",
        i.audio.buffer_count(),
        i.transport.end_ms()
    );
}

/// One chart player instance, the unit the host page creates per preview.
#[wasm_bindgen]
pub struct HighwayPlayer {
    inner: Rc<RefCell<Instance>>,
}

#[wasm_bindgen]
impl HighwayPlayer {
    /// `audio_length_ms`/`start_delay_ms` come from the parsed chart
    /// metadata; `preview_start_ms < 0` means no initial-seek hint.
    #[wasm_bindgen(constructor)]
    pub fn new(audio_length_ms: f64, start_delay_ms: f64, preview_start_ms: f64) -> HighwayPlayer {
        let meta = ChartMeta {
            audio_length_ms,
            start_delay_ms,
            preview_start_ms: (preview_start_ms >= 0.0).then_some(preview_start_ms),
        };
        let inner = Rc::new(RefCell::new(Instance::new(meta)));
        frame::start_loop(inner.clone());
        HighwayPlayer { inner }
    }

    /// Append one note event. The parsing layer guarantees ascending
    /// `start_ms` order; out-of-order pushes are rejected to protect the
    /// window invariant.
    pub fn push_note(
        &self,
        start_ms: f64,
        duration_ms: f64,
        fret: u8,
        open: bool,
        star: bool,
        hopo: bool,
        tap: bool,
    ) {
        let lane = if open { Lane::Open } else { Lane::Fret(fret) };
        let ev = TimedEvent {
            start_ms,
            duration_ms: duration_ms.max(0.0),
            lane,
            kind: EventKind::Note(NoteModifiers { star, hopo, tap }),
        };
        let mut i = self.inner.borrow_mut();
        if let Some(last) = i.timeline.events.last() {
            if ev.start_ms < last.start_ms {
                log::warn!("out-of-order note at {start_ms}ms dropped");
                return;
            }
        }
        i.timeline.events.push(ev);
    }

    /// Append one solo/freestyle section span.
    pub fn push_span(&self, start_ms: f64, duration_ms: f64, freestyle: bool) {
        let (lane, kind) = if freestyle {
            (Lane::Freestyle, SpanKind::Freestyle)
        } else {
            (Lane::Solo, SpanKind::Solo)
        };
        let ev = TimedEvent {
            start_ms,
            duration_ms: duration_ms.max(0.0),
            lane,
            kind: EventKind::Span(kind),
        };
        let mut i = self.inner.borrow_mut();
        if let Some(last) = i.timeline.spans.last() {
            if ev.start_ms < last.start_ms {
                log::warn!("out-of-order span at {start_ms}ms dropped");
                return;
            }
        }
        i.timeline.spans.push(ev);
    }

    /// Queue an audio file for the next `load()`.
    pub fn add_audio_url(&self, url: String) {
        self.inner.borrow_mut().pending_urls.push(url);
    }

    /// Fetch and decode the queued audio files. A load in flight is
    /// cancelled and superseded by this one.
    pub fn load(&self) {
        let (seq, urls) = {
            let mut i = self.inner.borrow_mut();
            if i.state == LoadState::Disposed {
                return;
            }
            if let Some(prev) = i.load.take() {
                prev.cancel();
            }
            i.load_seq += 1;
            i.load = Some(LoadHandle::new());
            i.state = LoadState::Loading;
            (i.load_seq, i.pending_urls.clone())
        };
        let inst = self.inner.clone();
        spawn_local(run_load(inst, seq, urls));
    }

    pub fn play(&self) {
        let command = {
            let mut i = self.inner.borrow_mut();
            if !i.gate_open("play") {
                return;
            }
            if let Some(ctx) = i.audio.context() {
                audio::resume_if_suspended(ctx);
            }
            let start_delay_ms = i.timeline.meta.start_delay_ms;
            let buffer_count = i.audio.buffer_count();
            i.transport.play(buffer_count, start_delay_ms)
        };
        let Some(command) = command else { return };

        let weak = Rc::downgrade(&self.inner);
        let on_source_ended: Rc<dyn Fn(SessionId)> = Rc::new(end_callback(weak.clone(), false));
        let on_timer: Rc<dyn Fn(SessionId)> = Rc::new(end_callback(weak, true));

        let mut i = self.inner.borrow_mut();
        i.audio
            .start_sources(command.start, command.session, on_source_ended);
        if let Some(delay_ms) = command.end_timer_ms {
            i.audio.arm_end_timer(delay_ms, command.session, on_timer);
        }
    }

    pub fn pause(&self) {
        let mut i = self.inner.borrow_mut();
        if !i.gate_open("pause") {
            return;
        }
        // Order matters: invalidate the session before the sources stop so
        // their onended callbacks read as stale, not as a natural end.
        i.transport.pause();
        i.audio.stop_sources();
        i.audio.clear_end_timer();
    }

    /// Seek to a fraction of the chart. Lands paused; callers that want
    /// playback to continue call `play()` right after.
    pub fn seek(&self, percent: f64) {
        let mut i = self.inner.borrow_mut();
        if !i.gate_open("seek") {
            return;
        }
        i.transport.seek(percent);
        i.audio.stop_sources();
        i.audio.clear_end_timer();
        i.throttle.reset();
    }

    pub fn dispose(&self) {
        let mut i = self.inner.borrow_mut();
        if i.state == LoadState::Disposed {
            return;
        }
        if let Some(load) = i.load.take() {
            load.cancel();
        }
        i.transport.dispose();
        i.audio.dispose();
        i.state = LoadState::Disposed;
    }

    #[wasm_bindgen(getter)]
    pub fn chart_current_time_ms(&self) -> f64 {
        self.inner.borrow().transport.current_ms()
    }

    #[wasm_bindgen(getter)]
    pub fn chart_end_time_ms(&self) -> f64 {
        self.inner.borrow().transport.end_ms()
    }

    #[wasm_bindgen(getter)]
    pub fn volume(&self) -> f64 {
        self.inner.borrow().transport.volume()
    }

    #[wasm_bindgen(setter)]
    pub fn set_volume(&self, volume: f64) {
        let mut i = self.inner.borrow_mut();
        let gain = i.transport.set_volume(volume);
        i.audio.set_gain(gain);
    }

    #[wasm_bindgen(getter)]
    pub fn is_playing(&self) -> bool {
        self.inner.borrow().transport.is_playing()
    }

    pub fn set_on_progress(&self, callback: Function) {
        self.inner.borrow_mut().on_progress = Some(callback);
    }

    pub fn set_on_end(&self, callback: Function) {
        self.inner.borrow_mut().on_end = Some(callback);
    }

    pub fn set_on_error(&self, callback: Function) {
        self.inner.borrow_mut().on_error = Some(callback);
    }

    /// Install the scene layer's spawn/update/evict callbacks.
    pub fn set_scene(&self, spawn: Function, update: Function, evict: Function) {
        self.inner.borrow_mut().scene = SceneBindings {
            spawn: Some(spawn),
            update: Some(update),
            evict: Some(evict),
        };
    }
}

fn end_callback(weak: Weak<RefCell<Instance>>, from_timer: bool) -> impl Fn(SessionId) {
    move |session| {
        if let Some(inst) = weak.upgrade() {
            handle_session_end(&inst, session, from_timer);
        }
    }
}
