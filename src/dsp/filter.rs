use std::f32::consts::TAU;

/// One-pole lowpass.
///
/// Sits in the feedback path of a pluck voice to emulate string damping:
/// every trip around the loop loses a little high-frequency energy, so the
/// tone darkens as it decays.
pub struct OnePole {
    coeff: f32,
    z: f32,
}

impl OnePole {
    pub fn lowpass(cutoff_hz: f32, sample_rate: f32) -> Self {
        // Standard RC smoothing coefficient; cutoff clamped below Nyquist.
        let cutoff = cutoff_hz.clamp(1.0, sample_rate * 0.45);
        let coeff = 1.0 - (-TAU * cutoff / sample_rate).exp();

        Self { coeff, z: 0.0 }
    }

    #[inline]
    pub fn next_sample(&mut self, sample: f32) -> f32 {
        self.z += self.coeff * (sample - self.z);
        self.z
    }

    pub fn reset(&mut self) {
        self.z = 0.0;
    }
}

/// Body-resonance stage: dry signal plus a resonant bandpass tap.
///
/// The core is a topology-preserving state-variable filter; blending its
/// bandpass output back onto the input gives the gentle midrange bump that
/// stands in for guitar-body coloration. The center frequency varies
/// slightly per string.
pub struct BodyFilter {
    ic1eq: f32, // First integrator's memory
    ic2eq: f32, // Second integrator's memory
    g: f32,
    k: f32,
    amount: f32,
}

impl BodyFilter {
    /// `amount` is the linear gain of the bandpass tap added to the dry path.
    pub fn peaking(center_hz: f32, resonance: f32, amount: f32, sample_rate: f32) -> Self {
        let center = center_hz.clamp(1.0, sample_rate * 0.45);
        let g = (std::f32::consts::PI * center / sample_rate).tan();
        let k = 2.0 - (2.0 * resonance.clamp(0.0, 0.95));

        Self {
            ic1eq: 0.0,
            ic2eq: 0.0,
            g,
            k,
            amount,
        }
    }

    #[inline]
    pub fn next_sample(&mut self, sample: f32) -> f32 {
        let h = 1.0 / (1.0 + self.g * (self.g + self.k));
        let v3 = sample - self.ic2eq;
        let v1 = h * (self.ic1eq + self.g * v3);
        let v2 = self.ic2eq + self.g * v1;

        self.ic1eq = 2.0 * v1 - self.ic1eq;
        self.ic2eq = 2.0 * v2 - self.ic2eq;

        // v1 is the bandpass tap.
        sample + self.amount * v1
    }

    pub fn reset(&mut self) {
        self.ic1eq = 0.0;
        self.ic2eq = 0.0;
    }
}
