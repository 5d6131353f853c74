pub mod bindings;
pub mod config;
pub mod dsp;
pub mod engine;
pub mod error;
pub mod input;
pub mod note;

pub use config::{EngineConfig, OutputKind};
pub use engine::{NoteEngine, NoteState};
pub use error::PianoError;
pub use input::{InputEvent, Piano};
pub use note::{Note, PitchClass};

use wasm_bindgen::prelude::*;

/// The crate version, read from Cargo.toml at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// WASM-exposed: return the keytone-core version string.
#[wasm_bindgen]
pub fn core_version() -> String {
    VERSION.to_string()
}

/// WASM-exposed: equal-tempered frequency of a note token, `undefined` if
/// the token is not a note.
#[wasm_bindgen(js_name = noteFrequency)]
pub fn note_frequency(note: &str) -> Option<f64> {
    note::note_to_frequency(note)
}

/// WASM-exposed: every key of the default keyboard, lowest first.
#[wasm_bindgen(js_name = allNotes)]
pub fn all_notes() -> Vec<String> {
    note::all_notes()
}

/// WASM-exposed: whether a note token is a black key.
#[wasm_bindgen(js_name = isBlackKey)]
pub fn is_black_key(note: &str) -> bool {
    note::is_black_key(note)
}

/// WASM-exposed: computer keyboard label for a piano key, if mapped.
#[wasm_bindgen(js_name = keyForNote)]
pub fn key_for_note(note: &str) -> Option<String> {
    let note = note.parse::<Note>().ok()?;
    input::key_for_note(note).map(str::to_string)
}
