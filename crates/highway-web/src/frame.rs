//! The per-instance animation loop and the bridge from the frame driver to
//! the host page's scene layer.

use std::cell::RefCell;
use std::rc::Rc;

use js_sys::Function;
use wasm_bindgen::closure::Closure;
use wasm_bindgen::{JsCast, JsValue};
use web_sys as web;

use highway_core::chart::{TimedEvent, VisualKey};
use highway_core::driver::{note_position, HighwayView};

/// Opaque visual-handle callbacks supplied by the host scene layer.
#[derive(Default, Clone)]
pub struct SceneBindings {
    pub spawn: Option<Function>,
    pub update: Option<Function>,
    pub evict: Option<Function>,
}

/// Adapts one event stream ("note" or "span") onto the JS scene callbacks.
/// A missing or throwing handle is logged and skipped, never fatal.
pub struct SceneAdapter<'a> {
    pub bindings: &'a SceneBindings,
    pub stream: &'static str,
}

impl HighwayView for SceneAdapter<'_> {
    fn spawn(&mut self, index: usize, event: &TimedEvent) {
        let Some(f) = &self.bindings.spawn else {
            return;
        };
        let key = VisualKey::for_event(event).id();
        let args = js_sys::Array::of4(
            &self.stream.into(),
            &(index as u32).into(),
            &key.as_str().into(),
            &event.duration_ms.into(),
        );
        if f.apply(&JsValue::NULL, &args).is_err() {
            log::warn!("no visual handle for {} {}; skipping", self.stream, key);
        }
    }

    fn update(&mut self, index: usize, event: &TimedEvent, now_ms: f64) {
        let Some(f) = &self.bindings.update else {
            return;
        };
        let pos = note_position(event, now_ms);
        let args = js_sys::Array::of4(
            &self.stream.into(),
            &(index as u32).into(),
            &(pos.x as f64).into(),
            &(pos.z as f64).into(),
        );
        if f.apply(&JsValue::NULL, &args).is_err() {
            log::warn!("scene update failed for {} {index}", self.stream);
        }
    }

    fn evict(&mut self, index: usize) {
        let Some(f) = &self.bindings.evict else {
            return;
        };
        if f
            .call2(
                &JsValue::NULL,
                &self.stream.into(),
                &(index as u32).into(),
            )
            .is_err()
        {
            log::warn!("scene evict failed for {} {index}", self.stream);
        }
    }
}

/// What one animation tick produced. Progress is emitted by the loop after
/// the instance borrow is released, so a listener that synchronously calls
/// back into the player cannot hit a re-entrant borrow.
pub struct FrameOutcome {
    pub keep_going: bool,
    pub progress: Option<f64>,
}

pub trait FrameTarget {
    fn frame(&mut self) -> FrameOutcome;
    fn progress_callback(&self) -> Option<Function>;
}

/// Drive the target from requestAnimationFrame until it asks to stop.
pub fn start_loop<T: FrameTarget + 'static>(target: Rc<RefCell<T>>) {
    let tick: Rc<RefCell<Option<Closure<dyn FnMut()>>>> = Rc::new(RefCell::new(None));
    let tick_clone = tick.clone();
    let target_tick = target.clone();
    *tick.borrow_mut() = Some(Closure::wrap(Box::new(move || {
        let outcome = target_tick.borrow_mut().frame();
        if let Some(percent) = outcome.progress {
            let cb = target_tick.borrow().progress_callback();
            if let Some(cb) = cb {
                let _ = cb.call1(&JsValue::NULL, &percent.into());
            }
        }
        if !outcome.keep_going {
            // Disposed: stop rescheduling. The closure leaks with its Rc
            // cycle, same as the forget()-style listeners elsewhere.
            return;
        }
        if let Some(w) = web::window() {
            let _ = w.request_animation_frame(
                tick_clone
                    .borrow()
                    .as_ref()
                    .unwrap()
                    .as_ref()
                    .unchecked_ref(),
            );
        }
    }) as Box<dyn FnMut()>));
    if let Some(w) = web::window() {
        let _ = w.request_animation_frame(tick.borrow().as_ref().unwrap().as_ref().unchecked_ref());
    }
}
