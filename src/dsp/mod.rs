//! Low-level DSP primitives used by the pluck voices.
//!
//! These components are allocation-free once constructed and safe to embed
//! directly inside voice structs. They stay focused on the signal math; the
//! synth layer owns scheduling and lifecycle.

/// Fixed-length feedback delay line (the vibrating string).
pub mod delay;
/// One-pole damping lowpass and the body-resonance stage.
pub mod filter;
/// Deterministic noise source for pluck excitation.
pub mod noise;

pub use delay::DelayLine;
pub use filter::{BodyFilter, OnePole};
pub use noise::NoiseSource;
