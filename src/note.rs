//! Note table — pitch classes, note identifiers and equal-tempered frequencies.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::PianoError;

/// Reference pitch for A4 in Hz.
pub const A4_FREQUENCY: f64 = 440.0;
const A4_INDEX: i64 = 4 * 12 + 9;

/// Octaves accepted when parsing a token, the MIDI span.
pub const MIN_OCTAVE: i32 = -1;
pub const MAX_OCTAVE: i32 = 9;

/// The twelve equal-tempered semitone names, spelled with sharps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PitchClass {
    C,
    CSharp,
    D,
    DSharp,
    E,
    F,
    FSharp,
    G,
    GSharp,
    A,
    ASharp,
    B,
}

impl PitchClass {
    pub const ALL: [PitchClass; 12] = [
        PitchClass::C,
        PitchClass::CSharp,
        PitchClass::D,
        PitchClass::DSharp,
        PitchClass::E,
        PitchClass::F,
        PitchClass::FSharp,
        PitchClass::G,
        PitchClass::GSharp,
        PitchClass::A,
        PitchClass::ASharp,
        PitchClass::B,
    ];

    /// Semitone index within the octave, C = 0.
    pub fn semitone(self) -> i32 {
        self as i32
    }

    pub fn from_semitone(semitone: i32) -> PitchClass {
        Self::ALL[semitone.rem_euclid(12) as usize]
    }

    pub fn name(self) -> &'static str {
        match self {
            PitchClass::C => "C",
            PitchClass::CSharp => "C#",
            PitchClass::D => "D",
            PitchClass::DSharp => "D#",
            PitchClass::E => "E",
            PitchClass::F => "F",
            PitchClass::FSharp => "F#",
            PitchClass::G => "G",
            PitchClass::GSharp => "G#",
            PitchClass::A => "A",
            PitchClass::ASharp => "A#",
            PitchClass::B => "B",
        }
    }

    /// Sharps are the black keys.
    pub fn is_sharp(self) -> bool {
        matches!(
            self,
            PitchClass::CSharp
                | PitchClass::DSharp
                | PitchClass::FSharp
                | PitchClass::GSharp
                | PitchClass::ASharp
        )
    }
}

/// A note identifier: pitch class plus octave, e.g. `C#4`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Note {
    pitch: PitchClass,
    octave: i32,
}

impl Note {
    pub fn new(pitch: PitchClass, octave: i32) -> Self {
        Note { pitch, octave }
    }

    pub fn pitch(self) -> PitchClass {
        self.pitch
    }

    pub fn octave(self) -> i32 {
        self.octave
    }

    /// Signed distance in semitones from A4.
    pub fn semitones_from_a4(self) -> i64 {
        self.index() - A4_INDEX
    }

    /// Equal-tempered frequency referenced to A4 = 440 Hz.
    pub fn frequency(self) -> f64 {
        A4_FREQUENCY * 2.0_f64.powf(self.semitones_from_a4() as f64 / 12.0)
    }

    pub fn is_black_key(self) -> bool {
        self.pitch.is_sharp()
    }

    /// The note `semitones` above (or below, if negative) this one.
    pub fn transpose(self, semitones: i32) -> Note {
        let index = self.index() + i64::from(semitones);
        Note {
            pitch: PitchClass::from_semitone(index.rem_euclid(12) as i32),
            octave: index.div_euclid(12) as i32,
        }
    }

    fn index(self) -> i64 {
        i64::from(self.octave) * 12 + i64::from(self.pitch.semitone())
    }
}

impl Ord for Note {
    fn cmp(&self, other: &Self) -> Ordering {
        self.index().cmp(&other.index())
    }
}

impl PartialOrd for Note {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Note {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.pitch.name(), self.octave)
    }
}

/// Parses `C4`, `F#3`, `Bb5`. Flats are normalised to the enharmonic sharp,
/// so `Cb4` becomes `B3`.
impl FromStr for Note {
    type Err = PianoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let unknown = || PianoError::UnknownNote(s.to_string());
        let mut chars = s.chars();

        let base = match chars.next().ok_or_else(unknown)? {
            'C' => 0,
            'D' => 2,
            'E' => 4,
            'F' => 5,
            'G' => 7,
            'A' => 9,
            'B' => 11,
            _ => return Err(unknown()),
        };

        let rest = chars.as_str();
        let (offset, octave_str) = match rest.as_bytes().first() {
            Some(b'#') => (1, &rest[1..]),
            Some(b'b') => (-1, &rest[1..]),
            _ => (0, rest),
        };

        let digits = octave_str.strip_prefix('-').unwrap_or(octave_str);
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(unknown());
        }
        let octave: i32 = octave_str.parse().map_err(|_| unknown())?;
        if !(MIN_OCTAVE..=MAX_OCTAVE).contains(&octave) {
            return Err(unknown());
        }

        Ok(Note::new(PitchClass::C, octave).transpose(base + offset))
    }
}

impl TryFrom<String> for Note {
    type Error = PianoError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Note> for String {
    fn from(note: Note) -> Self {
        note.to_string()
    }
}

/// Frequency of a note token, or `None` if the token does not parse.
pub fn note_to_frequency(note: &str) -> Option<f64> {
    note.parse::<Note>().ok().map(Note::frequency)
}

/// Whether a note token names a black key. Unparseable tokens are white.
pub fn is_black_key(note: &str) -> bool {
    note.parse::<Note>().is_ok_and(Note::is_black_key)
}

/// The contiguous run of playable keys, inclusive at both ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyboardRange {
    pub lowest: Note,
    pub highest: Note,
}

impl Default for KeyboardRange {
    /// C3 up to and including C6.
    fn default() -> Self {
        KeyboardRange {
            lowest: Note::new(PitchClass::C, 3),
            highest: Note::new(PitchClass::C, 6),
        }
    }
}

impl KeyboardRange {
    pub fn contains(&self, note: Note) -> bool {
        self.lowest <= note && note <= self.highest
    }

    pub fn len(&self) -> usize {
        (self.highest.index() - self.lowest.index() + 1).max(0) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All notes in ascending order.
    pub fn notes(&self) -> impl Iterator<Item = Note> + '_ {
        (0..self.len() as i32).map(|i| self.lowest.transpose(i))
    }
}

/// Every key of the default keyboard as a note token, lowest first.
pub fn all_notes() -> Vec<String> {
    KeyboardRange::default().notes().map(|n| n.to_string()).collect()
}
