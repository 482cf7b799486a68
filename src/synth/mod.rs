//! Plucked-string preview synthesis.
//!
//! The engine consumes a snapshot's notes/chords plus the derived conflict
//! set and renders one Karplus-Strong voice per sounding event. It is a
//! preview, not an instrument model: plausibility over fidelity.

pub mod engine;
pub mod voice;

pub use engine::{preview_events, EngineState, PluckEngine, PreviewEvent, CONFLICT_GAIN, NOTE_GAIN};
pub use voice::PluckVoice;

/// Equal-tempered frequency for a MIDI-style pitch, 440 Hz anchor at 69.
pub fn pitch_to_freq(pitch: i32) -> f32 {
    440.0 * 2.0_f32.powf((pitch as f32 - 69.0) / 12.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn a440_reference() {
        assert!((pitch_to_freq(69) - 440.0).abs() < 1e-3);
    }

    #[test]
    fn octave_doubles_frequency() {
        assert!((pitch_to_freq(81) - 880.0).abs() < 1e-2);
        assert!((pitch_to_freq(57) - 220.0).abs() < 1e-2);
    }

    #[test]
    fn low_e_string_frequency() {
        // MIDI 40 is the low E on a guitar, ~82.4 Hz.
        let f = pitch_to_freq(40);
        assert!((82.0..83.0).contains(&f), "got {f}");
    }
}
