//! Platform abstraction layer
//!
//! Browser bindings for the simulation. The wire helpers are plain Rust so
//! they build and test on every target; the `wasm_bindgen` surface is only
//! compiled for wasm32.

use serde::{Deserialize, Serialize};

use crate::consts::MAX_FRAME_DT;
use crate::sim::{SimEvent, TickInput};

/// Input record as sent by the browser driver
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WireInput {
    pub move_x: f32,
    pub move_y: f32,
    pub nitro: bool,
    pub drift_dir: i8,
}

impl From<WireInput> for TickInput {
    fn from(w: WireInput) -> Self {
        TickInput {
            move_x: w.move_x,
            move_y: w.move_y,
            nitro: w.nitro,
            drift_dir: w.drift_dir.signum(),
        }
    }
}

/// Parse a browser input record; missing fields read as neutral
pub fn parse_input(json: &str) -> Result<TickInput, serde_json::Error> {
    serde_json::from_str::<WireInput>(json).map(TickInput::from)
}

/// Driver-side frame cap. Non-finite values pass through so the engine drops them.
pub fn capped_dt(dt: f32) -> f32 {
    if dt.is_finite() {
        dt.min(MAX_FRAME_DT)
    } else {
        dt
    }
}

/// Split an event into its wire name and JSON payload
pub fn event_to_wire(event: &SimEvent) -> Result<(&'static str, String), serde_json::Error> {
    Ok((event.name(), serde_json::to_string(event)?))
}

#[cfg(target_arch = "wasm32")]
mod web {
    use wasm_bindgen::prelude::*;

    use super::{capped_dt, event_to_wire, parse_input};
    use crate::meta::MetaUpdate;
    use crate::sim::{BuffKind, EndReason, Simulation, StartOptions};
    use crate::tuning::Tuning;

    fn to_js<E: std::fmt::Display>(e: E) -> JsValue {
        JsValue::from_str(&e.to_string())
    }

    #[wasm_bindgen(start)]
    pub fn init() {
        console_error_panic_hook::set_once();
        // a host page may already have installed a logger
        let _ = console_log::init_with_level(log::Level::Info);
    }

    /// Simulation handle exported to JavaScript
    #[wasm_bindgen]
    pub struct WasmSimulation {
        sim: Simulation,
    }

    #[wasm_bindgen]
    impl WasmSimulation {
        /// Build an engine, optionally from a (partial) tuning JSON document
        #[wasm_bindgen(constructor)]
        pub fn new(tuning_json: Option<String>) -> Result<WasmSimulation, JsValue> {
            let tuning = match tuning_json {
                Some(json) => Tuning::from_json(&json).map_err(to_js)?,
                None => Tuning::default(),
            };
            let sim = Simulation::new(tuning).map_err(to_js)?;
            Ok(Self { sim })
        }

        /// Route every event to `handler(name, payloadJson)`
        #[wasm_bindgen(js_name = setEventHandler)]
        pub fn set_event_handler(&mut self, handler: js_sys::Function) {
            self.sim.on_event(move |event| {
                let Ok((name, payload)) = event_to_wire(event) else {
                    return;
                };
                if let Err(e) = handler.call2(
                    &JsValue::NULL,
                    &JsValue::from_str(name),
                    &JsValue::from_str(&payload),
                ) {
                    log::warn!("event handler threw on `{name}`: {e:?}");
                }
            });
        }

        pub fn reset(&mut self) {
            self.sim.reset();
        }

        /// Start a run; `opts_json` follows `StartOptions` (`seed`, `apply_queued`, `ghost`)
        pub fn start(&mut self, opts_json: Option<String>) -> Result<(), JsValue> {
            let opts = match opts_json {
                Some(json) => serde_json::from_str::<StartOptions>(&json).map_err(to_js)?,
                None => StartOptions::default(),
            };
            self.sim.start(opts);
            Ok(())
        }

        /// Advance by `dt` seconds with a `{moveX, moveY, nitro, driftDir}` input record.
        /// Frames longer than `MAX_FRAME_DT` (tab switches, hitches) are capped here.
        pub fn update(&mut self, dt: f32, input_json: &str) -> Result<(), JsValue> {
            let input = parse_input(input_json).map_err(to_js)?;
            self.sim.update(capped_dt(dt), &input);
            Ok(())
        }

        pub fn revive(&mut self) -> bool {
            self.sim.revive()
        }

        /// End the live run (`"hit"` or `"quit"`), returning the payload JSON
        pub fn end(&mut self, reason: Option<String>) -> Result<Option<String>, JsValue> {
            let reason = match reason.as_deref() {
                Some("hit") => EndReason::Hit,
                _ => EndReason::Quit,
            };
            self.sim
                .end(reason)
                .map(|p| serde_json::to_string(&p))
                .transpose()
                .map_err(to_js)
        }

        #[wasm_bindgen(js_name = setSeed)]
        pub fn set_seed(&mut self, seed: f64) -> bool {
            self.sim.set_seed(seed)
        }

        pub fn seed(&self) -> u32 {
            self.sim.seed()
        }

        #[wasm_bindgen(js_name = snapshotJson)]
        pub fn snapshot_json(&self) -> Result<String, JsValue> {
            serde_json::to_string(self.sim.state()).map_err(to_js)
        }

        #[wasm_bindgen(js_name = ghostFrameJson)]
        pub fn ghost_frame_json(&self) -> Result<Option<String>, JsValue> {
            self.sim
                .ghost_frame()
                .map(|f| serde_json::to_string(&f))
                .transpose()
                .map_err(to_js)
        }

        #[wasm_bindgen(js_name = setMetaJson)]
        pub fn set_meta_json(&mut self, json: &str) -> Result<(), JsValue> {
            let update: MetaUpdate = serde_json::from_str(json).map_err(to_js)?;
            self.sim.set_meta(update);
            Ok(())
        }

        #[wasm_bindgen(js_name = queueBuff)]
        pub fn queue_buff(&mut self, kind: &str, count: u32) -> bool {
            match BuffKind::parse(kind) {
                Some(kind) => {
                    self.sim.queue_buff(kind, count);
                    true
                }
                None => false,
            }
        }

        #[wasm_bindgen(js_name = clearQueued)]
        pub fn clear_queued(&mut self) {
            self.sim.clear_queued();
        }

        #[wasm_bindgen(js_name = previewJson)]
        pub fn preview_json(&self) -> Result<String, JsValue> {
            serde_json::to_string(&self.sim.preview()).map_err(to_js)
        }
    }
}

#[cfg(target_arch = "wasm32")]
pub use web::WasmSimulation;
