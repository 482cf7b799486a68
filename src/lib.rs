pub mod dsp;
pub mod edit; // Gesture state machine and segment staging
pub mod score; // Notes, chords, segments and the conflict relation
pub mod service;
pub mod synth; // Plucked-string preview rendering

/// Number of string lanes on the timeline.
pub const STRING_COUNT: usize = 6;
/// Highest fret a tab coordinate may address.
pub const MAX_FRET: u8 = 24;
/// Largest block the preview engine renders in one call.
pub const MAX_BLOCK_SIZE: usize = 2048;
