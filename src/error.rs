use thiserror::Error;

#[derive(Error, Debug)]
pub enum PianoError {
    #[error("unknown note: {0:?}")]
    UnknownNote(String),

    #[error("note {note} is outside the keyboard range {lowest}..={highest}")]
    NoteOutOfRange {
        note: String,
        lowest: String,
        highest: String,
    },

    #[error("audio output unavailable: {0}")]
    AudioUnavailable(String),

    #[error("audio context is closed")]
    ContextClosed,

    #[error("audio device error: {0}")]
    Device(String),

    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error("config parse error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, PianoError>;
