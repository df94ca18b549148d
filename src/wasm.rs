//! JS bindings for the PWA shell. Enabled with the `wasm` feature.
//!
//! The shell owns storage and rendering: it passes in the stored best score,
//! forwards key/swipe input, and reads back a snapshot object after each call.

use rand::rngs::StdRng;
use rand::SeedableRng;
use wasm_bindgen::prelude::*;

use crate::config::Config;
use crate::engine::Direction;
use crate::input;
use crate::session::GameSession;

#[wasm_bindgen(start)]
pub fn init() {
    console_error_panic_hook::set_once();
}

#[wasm_bindgen]
pub struct WasmSession {
    inner: GameSession<StdRng>,
}

#[wasm_bindgen]
impl WasmSession {
    /// `seed` comes from the JS side (e.g. `crypto.getRandomValues`).
    #[wasm_bindgen(constructor)]
    pub fn new(size: usize, target: u32, best_score: f64, seed: u64) -> Result<WasmSession, JsValue> {
        let config = Config { size, target, ..Config::default() };
        config.validate().map_err(|e| JsValue::from_str(&e.to_string()))?;
        let best = if best_score.is_finite() && best_score > 0.0 { best_score as u64 } else { 0 };
        let inner = GameSession::new(config.session(), best, StdRng::seed_from_u64(seed));
        Ok(WasmSession { inner })
    }

    /// Apply a move by code (0 = up, 1 = down, 2 = left, 3 = right).
    /// Unknown codes leave the session untouched.
    pub fn step(&mut self, direction: u8) -> Result<JsValue, JsValue> {
        if let Some(dir) = Direction::from_code(direction) {
            self.inner.play(dir);
        }
        self.snapshot()
    }

    /// Apply a move from a `KeyboardEvent.key` token.
    #[wasm_bindgen(js_name = stepKey)]
    pub fn step_key(&mut self, key: &str) -> Result<JsValue, JsValue> {
        if let Some(dir) = input::direction_for_key(key) {
            self.inner.play(dir);
        }
        self.snapshot()
    }

    /// Apply a move from a touch displacement in CSS pixels.
    #[wasm_bindgen(js_name = stepSwipe)]
    pub fn step_swipe(&mut self, dx: f64, dy: f64) -> Result<JsValue, JsValue> {
        if let Some(dir) = input::direction_for_swipe(dx, dy, input::SWIPE_THRESHOLD_PX) {
            self.inner.play(dir);
        }
        self.snapshot()
    }

    #[wasm_bindgen(js_name = keepPlaying)]
    pub fn keep_playing(&mut self) -> Result<JsValue, JsValue> {
        self.inner.keep_playing();
        self.snapshot()
    }

    #[wasm_bindgen(js_name = newGame)]
    pub fn new_game(&mut self) -> Result<JsValue, JsValue> {
        self.inner.new_game();
        self.snapshot()
    }

    #[wasm_bindgen(js_name = bestScore)]
    pub fn best_score(&self) -> f64 {
        self.inner.best_score() as f64
    }

    pub fn snapshot(&self) -> Result<JsValue, JsValue> {
        serde_wasm_bindgen::to_value(&self.inner.snapshot())
            .map_err(|e| JsValue::from_str(&format!("Serialization error: {}", e)))
    }
}
