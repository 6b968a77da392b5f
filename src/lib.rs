// gesture_core: hand-pointer stabilization and dwell selection, Rust/WASM.
// The host feeds tracker packets and hit rectangles; every gating decision lives here.

mod arbiter;
mod config;
mod dwell;
mod error;
mod filter;
mod pinch;
mod sample;
mod scroll;
mod session;
mod stabilizer;
mod types;

use wasm_bindgen::prelude::*;

pub use arbiter::{HoverArbiter, HoverCandidate};
pub use config::{
    Axis, DwellConfig, EngineConfig, PinchConfig, ResumePolicy, ScrollConfig, StabilizerSettings,
};
pub use dwell::{DwellPhase, DwellRuntimeState, DwellTarget};
pub use error::EngineError;
pub use filter::{OneEuroFilter2D, SmoothDamp};
pub use pinch::{PinchTarget, PinchVisual};
pub use sample::{HandPayload, Landmark, PayloadPoint, ReceivedSample, SampleSlot};
pub use scroll::{ScrollController, ScrollFrame};
pub use session::{CursorFrame, FrameOutput, InputSession, Interactive, TargetFrame};
pub use stabilizer::{PointerStabilizer, StabilizedState};
pub use types::*;

/// Initialize panic hook for better error messages in browser console.
#[wasm_bindgen(start)]
pub fn init() {
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();
}

/// Main engine interface exposed to JavaScript.
/// One `tick` per rendered frame returns the whole frame as JSON to keep JS↔WASM crossings low.
#[wasm_bindgen]
pub struct Engine {
    session: InputSession,
}

#[wasm_bindgen]
impl Engine {
    #[wasm_bindgen(constructor)]
    pub fn new(config_json: &str) -> Result<Engine, JsValue> {
        let config = EngineConfig::from_json(config_json).map_err(to_js)?;
        let session = InputSession::new(config).map_err(to_js)?;
        Ok(Engine { session })
    }

    /// Hand one tracker packet to the engine. `received_at_us` is the host's monotonic clock.
    pub fn push_sample(&self, payload_json: &str, received_at_us: u64) -> Result<(), JsValue> {
        self.session
            .publish_json(payload_json, Timestamp::from_micros(received_at_us))
            .map_err(to_js)
    }

    /// Register a dwell region. `region_json` is `{ "rect": {x, y, width, height}, "viewport"?: {...} }`.
    pub fn add_dwell_target(&mut self, id: u32, region_json: &str, now_us: u64) -> Result<(), JsValue> {
        let region = parse_region(region_json).map_err(to_js)?;
        self.session
            .add_dwell_target(TargetId::new(id), region, Timestamp::from_micros(now_us))
            .map_err(to_js)
    }

    /// Register a dwell region with its own `DwellConfig` JSON.
    pub fn add_dwell_target_with(
        &mut self,
        id: u32,
        config_json: &str,
        region_json: &str,
        now_us: u64,
    ) -> Result<(), JsValue> {
        let config = parse_dwell_config(config_json).map_err(to_js)?;
        let region = parse_region(region_json).map_err(to_js)?;
        self.session
            .add_dwell_target_with(TargetId::new(id), config, region, Timestamp::from_micros(now_us))
            .map_err(to_js)
    }

    pub fn add_pinch_target(&mut self, id: u32, region_json: &str) -> Result<(), JsValue> {
        let region = parse_region(region_json).map_err(to_js)?;
        self.session
            .add_pinch_target(TargetId::new(id), region)
            .map_err(to_js)
    }

    /// Update a region after layout moved it.
    pub fn set_region(&mut self, id: u32, region_json: &str) -> Result<(), JsValue> {
        let region = parse_region(region_json).map_err(to_js)?;
        self.session
            .set_region(TargetId::new(id), region)
            .map_err(to_js)
    }

    pub fn remove_target(&mut self, id: u32) -> Result<(), JsValue> {
        self.session.remove_target(TargetId::new(id)).map_err(to_js)
    }

    pub fn start_cooldown(&mut self, id: u32, now_us: u64, seconds: f64) -> Result<(), JsValue> {
        self.session
            .start_cooldown(TargetId::new(id), Timestamp::from_micros(now_us), seconds)
            .map_err(to_js)
    }

    pub fn start_cooldown_all(&mut self, now_us: u64, seconds: f64) {
        self.session
            .start_cooldown_all(Timestamp::from_micros(now_us), seconds);
    }

    /// No-op when the engine was built without a scroll config.
    pub fn set_scroll_position(&mut self, position: f64) {
        if let Some(scroll) = self.session.scroll_mut() {
            scroll.set_position(position);
        }
    }

    /// Advance one frame. Returns the `FrameOutput` as JSON.
    pub fn tick(&mut self, now_us: u64, dt_sec: f64) -> Result<String, JsValue> {
        let frame = self.session.tick(Timestamp::from_micros(now_us), dt_sec);
        serde_json::to_string(&frame)
            .map_err(|e| JsValue::from_str(&format!("Serialization error: {}", e)))
    }
}

fn parse_region(json: &str) -> Result<HitRegion, EngineError> {
    Ok(serde_json::from_str(json)?)
}

fn parse_dwell_config(json: &str) -> Result<DwellConfig, EngineError> {
    serde_json::from_str(json).map_err(|e| EngineError::InvalidConfig(e.to_string()))
}

fn to_js(err: EngineError) -> JsValue {
    JsValue::from_str(&err.to_string())
}
