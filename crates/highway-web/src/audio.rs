//! WebAudio plumbing: the process-wide shared device registry, the device
//! clock implementation, and per-instance buffer source scheduling.
//!
//! One `AudioContext` serves every player instance in the page. The registry
//! creates it lazily on the first instance and never tears it down while the
//! clamped-at-zero instance count could go back up; instances only own their
//! private gain node.

use std::cell::RefCell;
use std::rc::Rc;

use wasm_bindgen::closure::Closure;
use wasm_bindgen::JsCast;
use web_sys as web;

use highway_core::clock::{DeviceClock, WallClock};
use highway_core::error::PlayerError;
use highway_core::sched::{SessionId, SourceStart};

thread_local! {
    static DEVICE: RefCell<SharedDevice> = RefCell::new(SharedDevice::default());
}

#[derive(Default)]
struct SharedDevice {
    ctx: Option<web::AudioContext>,
    active_instances: u32,
}

/// Register one instance against the shared device, creating the
/// `AudioContext` on first use.
pub fn register_instance() -> Result<web::AudioContext, PlayerError> {
    DEVICE.with(|d| {
        let mut d = d.borrow_mut();
        if d.ctx.is_none() {
            match web::AudioContext::new() {
                Ok(ctx) => d.ctx = Some(ctx),
                Err(e) => {
                    log::warn!("AudioContext unavailable: {:?}", e);
                    return Err(PlayerError::DeviceUnavailable);
                }
            }
        }
        d.active_instances += 1;
        Ok(d.ctx.as_ref().unwrap().clone())
    })
}

/// Drop one instance's claim. The device itself outlives all instances so a
/// later instance (or a resumed one) never races its teardown.
pub fn release_instance() {
    DEVICE.with(|d| {
        let mut d = d.borrow_mut();
        d.active_instances = d.active_instances.saturating_sub(1);
    });
}

pub fn active_instances() -> u32 {
    DEVICE.with(|d| d.borrow().active_instances)
}

/// Resume a suspended context. Distinct from instance play/pause: the device
/// may be suspended process-wide pending a user gesture, any instance may
/// trigger the resume, and redundant calls are safe.
pub fn resume_if_suspended(ctx: &web::AudioContext) {
    if ctx.state() == web::AudioContextState::Suspended {
        if let Err(e) = ctx.resume() {
            log::warn!("AudioContext resume failed: {:?}", e);
        }
    }
}

/// Device clock over the shared context's never-reset currentTime.
pub struct WebAudioClock {
    ctx: web::AudioContext,
}

impl WebAudioClock {
    pub fn new(ctx: web::AudioContext) -> Self {
        Self { ctx }
    }
}

impl DeviceClock for WebAudioClock {
    fn now_sec(&self) -> f64 {
        self.ctx.current_time()
    }

    fn output_latency_sec(&self) -> f64 {
        self.ctx.base_latency()
    }
}

/// Instance time source: the shared audio device, or a silent wall clock
/// when the environment has no audio device. Same state machine either way;
/// the frame driver cannot tell the difference.
pub enum TimeSource {
    Device(WebAudioClock),
    Wall(WallClock),
}

impl DeviceClock for TimeSource {
    fn now_sec(&self) -> f64 {
        match self {
            TimeSource::Device(c) => c.now_sec(),
            TimeSource::Wall(c) => c.now_sec(),
        }
    }

    fn output_latency_sec(&self) -> f64 {
        match self {
            TimeSource::Device(c) => c.output_latency_sec(),
            TimeSource::Wall(c) => c.output_latency_sec(),
        }
    }
}

/// One instance's slice of the audio graph: a private gain node feeding the
/// shared destination, the decoded buffers, and whatever sources are live
/// for the current play session.
pub struct InstanceAudio {
    ctx: Option<web::AudioContext>,
    gain: Option<web::GainNode>,
    buffers: Vec<web::AudioBuffer>,
    sources: Vec<web::AudioBufferSourceNode>,
    // onended closures must outlive their sources
    ended_closures: Vec<Closure<dyn FnMut()>>,
    end_timer: Option<i32>,
    timer_closure: Option<Closure<dyn FnMut()>>,
}

impl InstanceAudio {
    /// Wire a gain node for this instance into the shared graph. `None`
    /// context produces a silent instance (wall-clock mode).
    pub fn new(ctx: Option<web::AudioContext>, initial_gain: f64) -> Self {
        let gain = ctx.as_ref().and_then(|ctx| match web::GainNode::new(ctx) {
            Ok(g) => {
                g.gain().set_value(initial_gain as f32);
                if let Err(e) = g.connect_with_audio_node(&ctx.destination()) {
                    log::error!("gain connect error: {:?}", e);
                    return None;
                }
                Some(g)
            }
            Err(e) => {
                log::error!("GainNode error: {:?}", e);
                None
            }
        });
        Self {
            ctx,
            gain,
            buffers: Vec::new(),
            sources: Vec::new(),
            ended_closures: Vec::new(),
            end_timer: None,
            timer_closure: None,
        }
    }

    pub fn push_buffer(&mut self, buffer: web::AudioBuffer) {
        self.buffers.push(buffer);
    }

    pub fn buffer_count(&self) -> usize {
        self.buffers.len()
    }

    /// Longest decoded buffer in milliseconds; the fallback chart length
    /// when metadata is unusable.
    pub fn longest_buffer_ms(&self) -> f64 {
        self.buffers
            .iter()
            .map(|b| b.duration() * 1000.0)
            .fold(0.0, f64::max)
    }

    pub fn set_gain(&self, gain: f64) {
        if let Some(g) = &self.gain {
            g.gain().set_value(gain as f32);
        }
    }

    /// Start every decoded buffer under the given session. `Immediate`
    /// starts read mid-buffer right now; `Deferred` schedules the device-time
    /// start in the future with a read offset of zero.
    pub fn start_sources(
        &mut self,
        start: SourceStart,
        session: SessionId,
        on_source_ended: Rc<dyn Fn(SessionId)>,
    ) {
        // Idempotent: never layer a new session's sources over an old one's.
        self.stop_sources();
        let Some(ctx) = self.ctx.clone() else {
            return;
        };
        let Some(gain) = self.gain.clone() else {
            return;
        };
        for buffer in &self.buffers {
            let src = match web::AudioBufferSourceNode::new(&ctx) {
                Ok(s) => s,
                Err(e) => {
                    log::error!("AudioBufferSourceNode error: {:?}", e);
                    continue;
                }
            };
            src.set_buffer(Some(buffer));
            if let Err(e) = src.connect_with_audio_node(&gain) {
                log::error!("source connect error: {:?}", e);
                continue;
            }

            let cb = on_source_ended.clone();
            let ended = Closure::wrap(Box::new(move || cb(session)) as Box<dyn FnMut()>);
            src.set_onended(Some(ended.as_ref().unchecked_ref()));
            self.ended_closures.push(ended);

            let started = match start {
                SourceStart::Immediate { offset_sec } => {
                    src.start_with_when_and_grain_offset(0.0, offset_sec)
                }
                SourceStart::Deferred { delay_sec } => {
                    src.start_with_when(ctx.current_time() + delay_sec)
                }
            };
            if let Err(e) = started {
                log::error!("source start error: {:?}", e);
                continue;
            }
            self.sources.push(src);
        }
    }

    /// Stop this instance's sources only; the shared device keeps running
    /// for everyone else. Detaches onended first so the stop cannot be
    /// mistaken for natural completion even before the session guard.
    pub fn stop_sources(&mut self) {
        for src in self.sources.drain(..) {
            src.set_onended(None);
            let _ = src.stop();
        }
        self.ended_closures.clear();
    }

    /// Arm the zero-buffer end timer. Replaces any previous timer.
    pub fn arm_end_timer(
        &mut self,
        delay_ms: f64,
        session: SessionId,
        on_timer: Rc<dyn Fn(SessionId)>,
    ) {
        self.clear_end_timer();
        let Some(window) = web::window() else {
            return;
        };
        let closure = Closure::wrap(Box::new(move || on_timer(session)) as Box<dyn FnMut()>);
        match window.set_timeout_with_callback_and_timeout_and_arguments_0(
            closure.as_ref().unchecked_ref(),
            delay_ms.max(0.0).round() as i32,
        ) {
            Ok(handle) => {
                self.end_timer = Some(handle);
                self.timer_closure = Some(closure);
            }
            Err(e) => log::error!("end timer error: {:?}", e),
        }
    }

    pub fn clear_end_timer(&mut self) {
        if let Some(handle) = self.end_timer.take() {
            if let Some(window) = web::window() {
                window.clear_timeout_with_handle(handle);
            }
        }
        self.timer_closure = None;
    }

    /// Tear down this instance's slice of the graph.
    pub fn dispose(&mut self) {
        self.stop_sources();
        self.clear_end_timer();
        self.buffers.clear();
        if let Some(g) = self.gain.take() {
            let _ = g.disconnect();
        }
        if self.ctx.take().is_some() {
            release_instance();
        }
    }

    pub fn has_device(&self) -> bool {
        self.ctx.is_some()
    }

    pub fn context(&self) -> Option<&web::AudioContext> {
        self.ctx.as_ref()
    }
}
