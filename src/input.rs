//! Key-state input model.
//!
//! UI events arrive as `InputEvent` messages and are turned into engine
//! calls. A note can be held by the pointer and by a computer key at the
//! same time; it sounds once and is released when the last holder lets go.

use std::collections::{BTreeSet, HashMap, HashSet};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::EngineConfig;
use crate::dsp::output::AudioOutput;
use crate::engine::NoteEngine;
use crate::note::{Note, PitchClass};

/// Octave played by the computer keyboard row.
const KEYBOARD_OCTAVE: i32 = 4;

/// Home row for white keys, the row above for black keys.
const KEY_MAPPINGS: [(&str, PitchClass); 12] = [
    ("a", PitchClass::C),
    ("w", PitchClass::CSharp),
    ("s", PitchClass::D),
    ("e", PitchClass::DSharp),
    ("d", PitchClass::E),
    ("f", PitchClass::F),
    ("t", PitchClass::FSharp),
    ("g", PitchClass::G),
    ("y", PitchClass::GSharp),
    ("h", PitchClass::A),
    ("u", PitchClass::ASharp),
    ("j", PitchClass::B),
];

/// Note played by a computer key, case-insensitive.
pub fn note_for_key(key: &str) -> Option<Note> {
    let key = key.to_lowercase();
    KEY_MAPPINGS
        .iter()
        .find(|(k, _)| *k == key)
        .map(|(_, pitch)| Note::new(*pitch, KEYBOARD_OCTAVE))
}

/// Computer key label for a piano key, if it has one.
pub fn key_for_note(note: Note) -> Option<&'static str> {
    if note.octave() != KEYBOARD_OCTAVE {
        return None;
    }
    KEY_MAPPINGS
        .iter()
        .find(|(_, pitch)| *pitch == note.pitch())
        .map(|(k, _)| *k)
}

fn is_sustain_key(key: &str) -> bool {
    key == " " || key.eq_ignore_ascii_case("space") || key.eq_ignore_ascii_case("spacebar")
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum InputEvent {
    PointerDown { note: Note },
    /// Pointer button released anywhere.
    PointerUp,
    PointerEnter { note: Note },
    PointerLeave { note: Note },
    KeyDown {
        key: String,
        #[serde(default)]
        repeat: bool,
    },
    KeyUp { key: String },
    /// The window lost focus.
    Blur,
}

/// Which keys are held and by what.
#[derive(Debug, Default)]
pub struct InputState {
    pointer_held: bool,
    pointer_notes: HashSet<Note>,
    key_notes: HashMap<String, Note>,
}

impl InputState {
    pub fn is_pressed(&self, note: Note) -> bool {
        self.pointer_notes.contains(&note) || self.key_notes.values().any(|n| *n == note)
    }

    pub fn pointer_held(&self) -> bool {
        self.pointer_held
    }

    pub fn pressed_notes(&self) -> BTreeSet<Note> {
        self.pointer_notes
            .iter()
            .chain(self.key_notes.values())
            .copied()
            .collect()
    }
}

/// A playable piano: the engine plus its input state.
pub struct Piano {
    engine: NoteEngine,
    input: InputState,
}

impl Piano {
    pub fn new(config: EngineConfig) -> Self {
        Piano {
            engine: NoteEngine::new(config),
            input: InputState::default(),
        }
    }

    pub fn initialize(&mut self) {
        self.engine.initialize();
    }

    pub fn initialize_with(&mut self, output: Box<dyn AudioOutput>) {
        self.engine.initialize_with(output);
    }

    pub fn engine(&self) -> &NoteEngine {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut NoteEngine {
        &mut self.engine
    }

    pub fn input(&self) -> &InputState {
        &self.input
    }

    /// Notes currently held down by any input, for drawing pressed keys.
    pub fn pressed_notes(&self) -> BTreeSet<Note> {
        self.input.pressed_notes()
    }

    pub fn handle(&mut self, event: InputEvent) {
        match event {
            InputEvent::PointerDown { note } => {
                self.input.pointer_held = true;
                self.press_pointer(note);
            }
            InputEvent::PointerEnter { note } => {
                if self.input.pointer_held {
                    self.press_pointer(note);
                }
            }
            InputEvent::PointerLeave { note } => {
                if self.input.pointer_notes.remove(&note) {
                    self.release_if_free(note);
                }
            }
            InputEvent::PointerUp => {
                self.input.pointer_held = false;
                let notes: Vec<Note> = self.input.pointer_notes.drain().collect();
                for note in notes {
                    self.release_if_free(note);
                }
            }
            InputEvent::KeyDown { key, repeat } => self.key_down(&key, repeat),
            InputEvent::KeyUp { key } => self.key_up(&key),
            InputEvent::Blur => {
                self.input = InputState::default();
                self.engine.stop_all_notes();
            }
        }
    }

    pub fn destroy(&mut self) {
        self.input = InputState::default();
        self.engine.destroy();
    }

    fn key_down(&mut self, key: &str, repeat: bool) {
        if is_sustain_key(key) {
            if !repeat {
                self.engine.set_sustain_pedal(true);
            }
            return;
        }
        if repeat {
            return;
        }
        let Some(note) = note_for_key(key) else {
            debug!(key, "unmapped key");
            return;
        };
        let key = key.to_lowercase();
        if self.input.key_notes.contains_key(&key) {
            return;
        }
        let was_pressed = self.input.is_pressed(note);
        self.input.key_notes.insert(key, note);
        if !was_pressed {
            self.sound(note);
        }
    }

    fn key_up(&mut self, key: &str) {
        if is_sustain_key(key) {
            self.engine.set_sustain_pedal(false);
            return;
        }
        if let Some(note) = self.input.key_notes.remove(&key.to_lowercase()) {
            self.release_if_free(note);
        }
    }

    fn press_pointer(&mut self, note: Note) {
        let was_pressed = self.input.is_pressed(note);
        if self.input.pointer_notes.insert(note) && !was_pressed {
            self.sound(note);
        }
    }

    fn sound(&mut self, note: Note) {
        self.engine.resume();
        self.engine.start_note(note);
    }

    fn release_if_free(&mut self, note: Note) {
        if !self.input.is_pressed(note) {
            self.engine.stop_note(note);
        }
    }
}
