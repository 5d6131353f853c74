//! Note Audio Engine — note-on/note-off/pedal events in, one voice per note out.
//!
//! The engine owns its audio context, the map from notes to live voices and
//! the sustain pedal state. None of its control operations return errors:
//! a note that cannot be played is logged and dropped.

use std::collections::{BTreeSet, HashMap, HashSet};

use tracing::{debug, warn};

use crate::config::{EngineConfig, OutputKind};
use crate::dsp::context::{AudioContext, ContextState};
use crate::dsp::output::{AudioOutput, OfflineOutput};
use crate::dsp::voice::VoiceId;
use crate::error::{PianoError, Result};
use crate::note::Note;

/// What a single key is doing, from the engine's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoteState {
    Idle,
    /// Attack, decay or held by its key.
    Sounding,
    /// Key released while the pedal is down.
    SustainedHeld,
}

pub struct NoteEngine {
    config: EngineConfig,
    context: Option<AudioContext>,
    destroyed: bool,
    voices: HashMap<Note, VoiceId>,
    /// Released voices still fading out, cut if their note is pressed again.
    tails: HashMap<Note, VoiceId>,
    sustain_pedal: bool,
    sustained: HashSet<Note>,
    master_volume: f32,
}

impl NoteEngine {
    /// Create an engine with no audio output yet; call `initialize` next.
    pub fn new(config: EngineConfig) -> Self {
        let master_volume = config.master_volume.clamp(0.0, 1.0);
        NoteEngine {
            config,
            context: None,
            destroyed: false,
            voices: HashMap::new(),
            tails: HashMap::new(),
            sustain_pedal: false,
            sustained: HashSet::new(),
            master_volume,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Acquire the configured output. On failure the engine stays silent
    /// and every later call is a no-op.
    pub fn initialize(&mut self) {
        match open_output(&self.config) {
            Ok(output) => self.initialize_with(output),
            Err(e) => warn!("audio unavailable, piano will stay silent: {e}"),
        }
    }

    /// Like `initialize`, with an explicitly supplied output.
    pub fn initialize_with(&mut self, output: Box<dyn AudioOutput>) {
        if self.destroyed {
            warn!("initialize called on a destroyed engine");
            return;
        }
        if self.context.is_some() {
            debug!("audio engine already initialized");
            return;
        }
        match AudioContext::open(output, self.master_volume) {
            Ok(context) => self.context = Some(context),
            Err(e) => warn!("audio unavailable, piano will stay silent: {e}"),
        }
    }

    /// Whether notes can currently produce sound.
    pub fn is_available(&self) -> bool {
        self.context
            .as_ref()
            .is_some_and(|ctx| ctx.state() != ContextState::Closed)
    }

    /// Start a suspended output. Calling it again is harmless.
    pub fn resume(&mut self) {
        if let Some(ctx) = self.context.as_mut() {
            if let Err(e) = ctx.resume() {
                warn!("failed to resume audio context: {e}");
            }
        }
    }

    /// Press a key given its note token, e.g. `"C#4"`.
    pub fn note_on(&mut self, note: &str) {
        match self.resolve(note) {
            Ok(note) => self.start_note(note),
            Err(e) => warn!("note on rejected: {e}"),
        }
    }

    /// Release a key given its note token.
    pub fn note_off(&mut self, note: &str) {
        match self.resolve(note) {
            Ok(note) => self.stop_note(note),
            Err(e) => warn!("note off rejected: {e}"),
        }
    }

    /// Press a key. A note that is already sounding is cut and restarted.
    pub fn start_note(&mut self, note: Note) {
        if !self.in_range(note, "note on") || !self.check_live("note on") {
            return;
        }
        let Some(ctx) = self.context.as_ref() else {
            return;
        };

        if let Some(old) = self.voices.remove(&note) {
            ctx.stop_voice(old);
            debug!(%note, "retriggered");
        }
        if let Some(tail) = self.tails.remove(&note) {
            if ctx.stop_voice(tail) {
                debug!(%note, "release tail cut");
            }
        }
        self.sustained.remove(&note);

        match ctx.start_voice(self.config.waveform, note.frequency(), &self.config.envelope) {
            Ok(id) => {
                debug!(%note, frequency = note.frequency(), "voice started");
                self.voices.insert(note, id);
            }
            Err(e) => warn!(%note, "failed to start voice: {e}"),
        }
    }

    /// Release a key. With the pedal down the note keeps sounding until the
    /// pedal comes up.
    pub fn stop_note(&mut self, note: Note) {
        if !self.in_range(note, "note off") || self.is_dead("note off") {
            return;
        }
        if self.sustain_pedal {
            if self.voices.contains_key(&note) {
                self.sustained.insert(note);
            }
            return;
        }
        self.release(note);
    }

    /// Pedal down only records the flag. Pedal up releases every note whose
    /// key came up while it was down.
    pub fn set_sustain_pedal(&mut self, down: bool) {
        if self.is_dead("sustain pedal") {
            return;
        }
        self.sustain_pedal = down;
        if !down {
            for note in std::mem::take(&mut self.sustained) {
                self.release(note);
            }
        }
    }

    pub fn sustain_pedal(&self) -> bool {
        self.sustain_pedal
    }

    /// Release everything regardless of the pedal, and forget the pedal:
    /// after focus loss its physical state is unknown.
    pub fn stop_all_notes(&mut self) {
        if self.is_dead("stop all notes") {
            return;
        }
        self.sustained.clear();
        self.sustain_pedal = false;
        let notes: Vec<Note> = self.voices.keys().copied().collect();
        for note in notes {
            self.release(note);
        }
    }

    /// Clamp to [0, 1] and apply immediately.
    pub fn set_master_volume(&mut self, volume: f32) {
        if self.is_dead("set master volume") {
            return;
        }
        if volume.is_nan() {
            warn!("ignoring NaN master volume");
            return;
        }
        self.master_volume = volume.clamp(0.0, 1.0);
        if let Some(ctx) = self.context.as_ref() {
            ctx.set_master_gain(self.master_volume);
        }
    }

    pub fn master_volume(&self) -> f32 {
        self.master_volume
    }

    /// Stop every voice and release the output. The engine cannot be used
    /// afterwards.
    pub fn destroy(&mut self) {
        if self.destroyed {
            return;
        }
        self.stop_all_notes();
        if let Some(mut ctx) = self.context.take() {
            if let Err(e) = ctx.close() {
                warn!("failed to close audio context: {e}");
            }
        }
        self.tails.clear();
        self.destroyed = true;
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    /// Pull a mono block from a host-rendered output. Silent when no output
    /// is available.
    pub fn render(&self, out: &mut [f32]) {
        match self.context.as_ref() {
            Some(ctx) => ctx.render(out),
            None => out.fill(0.0),
        }
    }

    /// The audio context, if initialized.
    pub fn context(&self) -> Option<&AudioContext> {
        self.context.as_ref()
    }

    pub fn current_time(&self) -> f64 {
        self.context.as_ref().map_or(0.0, AudioContext::current_time)
    }

    pub fn note_state(&self, note: Note) -> NoteState {
        if self.sustained.contains(&note) {
            NoteState::SustainedHeld
        } else if self.voices.contains_key(&note) {
            NoteState::Sounding
        } else {
            NoteState::Idle
        }
    }

    /// A voice exists for the note and has not been released.
    pub fn is_sounding(&self, note: Note) -> bool {
        self.voices.contains_key(&note)
    }

    pub fn is_sustained(&self, note: Note) -> bool {
        self.sustained.contains(&note)
    }

    pub fn active_notes(&self) -> BTreeSet<Note> {
        self.voices.keys().copied().collect()
    }

    pub fn sustained_notes(&self) -> BTreeSet<Note> {
        self.sustained.iter().copied().collect()
    }

    fn resolve(&self, token: &str) -> Result<Note> {
        token.parse()
    }

    /// Warns and returns false for notes outside the keyboard.
    fn in_range(&self, note: Note, op: &str) -> bool {
        let range = self.config.range;
        if range.contains(note) {
            return true;
        }
        let e = PianoError::NoteOutOfRange {
            note: note.to_string(),
            lowest: range.lowest.to_string(),
            highest: range.highest.to_string(),
        };
        warn!("{op} rejected: {e}");
        false
    }

    fn is_dead(&self, op: &str) -> bool {
        if self.destroyed {
            warn!("{op} called after destroy");
        }
        self.destroyed
    }

    fn check_live(&self, op: &str) -> bool {
        if self.is_dead(op) {
            return false;
        }
        if self.context.is_none() {
            warn!("{op} ignored: audio context not initialized");
            return false;
        }
        true
    }

    fn release(&mut self, note: Note) {
        self.sustained.remove(&note);
        let Some(id) = self.voices.remove(&note) else {
            return;
        };
        if let Some(ctx) = self.context.as_ref() {
            if let Some(stop) = ctx.release_voice(id, &self.config.envelope) {
                debug!(%note, stop, "voice released");
                self.tails.insert(note, id);
            }
        }
    }
}

fn open_output(config: &EngineConfig) -> Result<Box<dyn AudioOutput>> {
    match config.output {
        OutputKind::Offline => Ok(Box::new(OfflineOutput::new(config.sample_rate))),
        #[cfg(feature = "device")]
        OutputKind::Device => Ok(Box::new(crate::dsp::output::DeviceOutput::open_default()?)),
        #[cfg(not(feature = "device"))]
        OutputKind::Device => Err(PianoError::AudioUnavailable(
            "built without the `device` feature".into(),
        )),
    }
}
