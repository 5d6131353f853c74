//! DSP — the audio graph behind the piano.
//!
//! A small Rust counterpart of a browser audio context: a sample clock,
//! scheduled gain automation, one oscillator voice per sounding note and a
//! master gain stage. Rendering is pulled by the host (AudioWorklet, tests)
//! or pushed to a device stream with the `device` feature.

pub mod context;
pub mod envelope;
pub mod mixer;
pub mod oscillator;
pub mod output;
pub mod param;
pub mod voice;
