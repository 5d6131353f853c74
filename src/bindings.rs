//! WASM-exposed piano handle.
//!
//! The page creates one `PianoHandle` per mount, forwards UI events to it and
//! pulls audio blocks from an AudioWorklet through `render`.

use wasm_bindgen::prelude::*;

use crate::config::EngineConfig;
use crate::input::{InputEvent, Piano};

fn to_js(e: impl std::fmt::Display) -> JsValue {
    JsValue::from_str(&e.to_string())
}

#[wasm_bindgen]
pub struct PianoHandle {
    piano: Piano,
}

#[wasm_bindgen]
impl PianoHandle {
    /// Create and initialize a piano. `config` may be `undefined` for the
    /// defaults.
    #[wasm_bindgen(constructor)]
    pub fn new(config: JsValue) -> Result<PianoHandle, JsValue> {
        let config = if config.is_undefined() || config.is_null() {
            EngineConfig::default()
        } else {
            serde_wasm_bindgen::from_value::<EngineConfig>(config).map_err(to_js)?
        };
        config.validate().map_err(to_js)?;
        Ok(PianoHandle::from_config(config))
    }

    #[wasm_bindgen(js_name = sampleRate)]
    pub fn sample_rate(&self) -> f64 {
        self.piano
            .engine()
            .context()
            .map_or(self.piano.engine().config().sample_rate, |ctx| ctx.sample_rate())
    }

    pub fn resume(&mut self) {
        self.piano.engine_mut().resume();
    }

    #[wasm_bindgen(js_name = noteOn)]
    pub fn note_on(&mut self, note: &str) {
        self.piano.engine_mut().note_on(note);
    }

    #[wasm_bindgen(js_name = noteOff)]
    pub fn note_off(&mut self, note: &str) {
        self.piano.engine_mut().note_off(note);
    }

    #[wasm_bindgen(js_name = setSustainPedal)]
    pub fn set_sustain_pedal(&mut self, down: bool) {
        self.piano.engine_mut().set_sustain_pedal(down);
    }

    #[wasm_bindgen(js_name = sustainPedal)]
    pub fn sustain_pedal(&self) -> bool {
        self.piano.engine().sustain_pedal()
    }

    #[wasm_bindgen(js_name = stopAllNotes)]
    pub fn stop_all_notes(&mut self) {
        self.piano.engine_mut().stop_all_notes();
    }

    #[wasm_bindgen(js_name = setMasterVolume)]
    pub fn set_master_volume(&mut self, volume: f32) {
        self.piano.engine_mut().set_master_volume(volume);
    }

    #[wasm_bindgen(js_name = masterVolume)]
    pub fn master_volume(&self) -> f32 {
        self.piano.engine().master_volume()
    }

    /// Feed a UI event such as `{ type: "pointerDown", note: "C4" }`.
    #[wasm_bindgen(js_name = handleEvent)]
    pub fn handle_event(&mut self, event: JsValue) -> Result<(), JsValue> {
        let event: InputEvent = serde_wasm_bindgen::from_value(event).map_err(to_js)?;
        self.piano.handle(event);
        Ok(())
    }

    /// Notes currently held down, for drawing pressed keys.
    #[wasm_bindgen(js_name = pressedNotes)]
    pub fn pressed_notes(&self) -> Vec<String> {
        self.piano
            .pressed_notes()
            .into_iter()
            .map(|n| n.to_string())
            .collect()
    }

    /// Render `frames` mono samples for AudioWorklet playback.
    pub fn render(&mut self, frames: usize) -> Vec<f32> {
        let mut out = vec![0.0_f32; frames];
        self.piano.engine().render(&mut out);
        out
    }

    pub fn destroy(&mut self) {
        self.piano.destroy();
    }
}

impl PianoHandle {
    pub fn from_config(config: EngineConfig) -> Self {
        let mut piano = Piano::new(config);
        piano.initialize();
        PianoHandle { piano }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handle_plays_and_renders() {
        let mut handle = PianoHandle::from_config(EngineConfig::default());
        assert_eq!(handle.sample_rate(), 48_000.0);
        handle.resume();
        handle.set_master_volume(1.0);
        handle.note_on("A4");
        let out = handle.render(4800);
        assert_eq!(out.len(), 4800);
        assert!(out.iter().any(|s| s.abs() > 0.1));

        handle.stop_all_notes();
        handle.render(48_000);
        assert!(handle.render(128).iter().all(|&s| s == 0.0));

        handle.destroy();
        assert!(handle.render(16).iter().all(|&s| s == 0.0));
    }
}
