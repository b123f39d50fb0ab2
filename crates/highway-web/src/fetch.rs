//! Cancellable fetch + decode of audio source bytes.
//!
//! Each load owns an `AbortController`; a superseding load cancels its
//! predecessor before starting. Cancellation is cooperative and never
//! reported as an error.

use js_sys::ArrayBuffer;
use wasm_bindgen::{JsCast, JsValue};
use wasm_bindgen_futures::JsFuture;
use web_sys as web;

use highway_core::error::PlayerError;

/// Handle for one in-flight load request.
pub struct LoadHandle {
    controller: Option<web::AbortController>,
}

impl LoadHandle {
    pub fn new() -> Self {
        let controller = web::AbortController::new()
            .map_err(|e| log::warn!("AbortController unavailable: {:?}", e))
            .ok();
        Self { controller }
    }

    pub fn signal(&self) -> Option<web::AbortSignal> {
        self.controller.as_ref().map(|c| c.signal())
    }

    /// Cancel the request. Safe to call more than once.
    pub fn cancel(&self) {
        if let Some(c) = &self.controller {
            c.abort();
        }
    }
}

impl Default for LoadHandle {
    fn default() -> Self {
        Self::new()
    }
}

fn is_abort(e: &JsValue) -> bool {
    js_sys::Reflect::get(e, &JsValue::from_str("name"))
        .ok()
        .and_then(|n| n.as_string())
        .is_some_and(|n| n == "AbortError")
}

fn classify(file: &str, e: JsValue) -> PlayerError {
    if is_abort(&e) {
        PlayerError::Cancelled
    } else {
        PlayerError::Fetch {
            file: file.to_string(),
            reason: format!("{:?}", e),
        }
    }
}

/// Fetch one file's bytes, honoring the load's abort signal. The signal is
/// passed by value so callers never hold instance state across the await.
pub async fn fetch_bytes(
    url: &str,
    signal: Option<web::AbortSignal>,
) -> Result<ArrayBuffer, PlayerError> {
    let window = web::window().ok_or(PlayerError::DeviceUnavailable)?;

    let init = web::RequestInit::new();
    if let Some(signal) = &signal {
        init.set_signal(Some(signal));
    }

    let resp_value = JsFuture::from(window.fetch_with_str_and_init(url, &init))
        .await
        .map_err(|e| classify(url, e))?;
    let resp: web::Response = resp_value
        .dyn_into()
        .map_err(|e| classify(url, e))?;
    if !resp.ok() {
        return Err(PlayerError::Fetch {
            file: url.to_string(),
            reason: format!("HTTP {}", resp.status()),
        });
    }

    let buf_promise = resp.array_buffer().map_err(|e| classify(url, e))?;
    let buf_value = JsFuture::from(buf_promise)
        .await
        .map_err(|e| classify(url, e))?;
    buf_value.dyn_into().map_err(|e| classify(url, e))
}

/// Decode fetched bytes into an audio buffer. Per-file failures are
/// recoverable; the scheduler runs with whatever subset decoded.
pub async fn decode_audio(
    ctx: &web::AudioContext,
    file: &str,
    bytes: &ArrayBuffer,
) -> Result<web::AudioBuffer, PlayerError> {
    let promise = ctx.decode_audio_data(bytes).map_err(|_| PlayerError::Decode {
        file: file.to_string(),
    })?;
    let decoded = JsFuture::from(promise).await.map_err(|_| PlayerError::Decode {
        file: file.to_string(),
    })?;
    decoded.dyn_into().map_err(|_| PlayerError::Decode {
        file: file.to_string(),
    })
}
