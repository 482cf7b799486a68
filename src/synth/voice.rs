use crate::dsp::{BodyFilter, DelayLine, NoiseSource, OnePole};

/*
One pluck voice = the Karplus-Strong loop:

    noise burst ──►(+)──► delay line (1/f seconds) ──► output
                    ▲                │
                    └── × feedback ◄─┴── damping lowpass

A short burst of filtered noise energizes a delay line one pitch period
long. Each round trip is scaled by a feedback coefficient just below 1 and
lowpass filtered, so the recirculating waveform settles toward a decaying
quasi-periodic tone: a string. A resonant body stage colors the output and
an amplitude envelope bounds the voice to its scheduled duration.

The feedback coefficient is pitch- and string-dependent:

    0.86 - f/4000 + (5 - string) * 0.02, clamped to [0.6, 0.92]

so bass strings ring longer and treble strings die faster.
*/

/// Seconds of filtered noise used to excite the string.
const BURST_SECS: f32 = 0.03;
/// Attack time of the amplitude envelope.
const RISE_SECS: f32 = 0.005;
/// Level below which a decaying voice counts as silent.
const SILENCE_FLOOR: f32 = 1e-4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EnvStage {
    /// Rising/holding until the scheduled duration elapses.
    Sounding,
    /// Exponential release tail.
    Decay,
    Done,
}

/// Rise-hold-decay amplitude envelope, advanced once per sample.
struct PluckEnvelope {
    stage: EnvStage,
    level: f32,
    rise_coeff: f32,
    decay_mul: f32,
    samples_until_decay: u32,
}

impl PluckEnvelope {
    fn new(sample_rate: f32, duration_secs: f32) -> Self {
        // Release tail proportional to the event length, capped at 250 ms.
        let tail_secs = (duration_secs * 0.25).clamp(0.01, 0.25);

        // Decay multiplier that loses 60 dB across the tail.
        let tail_samples = (tail_secs * sample_rate).max(1.0);
        let decay_mul = (-(1000.0f32.ln()) / tail_samples).exp();

        Self {
            stage: EnvStage::Sounding,
            level: 0.0,
            rise_coeff: 1.0 - (-1.0 / (RISE_SECS * sample_rate)).exp(),
            decay_mul,
            samples_until_decay: (duration_secs * sample_rate).max(1.0) as u32,
        }
    }

    #[inline]
    fn next_level(&mut self) -> f32 {
        match self.stage {
            EnvStage::Sounding => {
                self.level += self.rise_coeff * (1.0 - self.level);
                self.samples_until_decay -= 1;
                if self.samples_until_decay == 0 {
                    self.stage = EnvStage::Decay;
                }
            }
            EnvStage::Decay => {
                self.level *= self.decay_mul;
                if self.level < SILENCE_FLOOR {
                    self.level = 0.0;
                    self.stage = EnvStage::Done;
                }
            }
            EnvStage::Done => {}
        }
        self.level
    }

    fn is_active(&self) -> bool {
        self.stage != EnvStage::Done
    }
}

/// One synthesized string excitation.
pub struct PluckVoice {
    delay: DelayLine,
    damping: OnePole,
    body: BodyFilter,
    excite_filter: OnePole,
    noise: NoiseSource,
    env: PluckEnvelope,
    feedback: f32,
    gain: f32,
    burst_remaining: u32,
    /// Last sample read back from the delay line, fed around the loop.
    recirculating: f32,
}

impl PluckVoice {
    /// Loop gain for a given frequency and string lane.
    pub fn feedback_coefficient(freq: f32, string: u8) -> f32 {
        let string = string.min(5);
        (0.86 - freq / 4000.0 + (5 - string) as f32 * 0.02).clamp(0.6, 0.92)
    }

    pub fn new(
        sample_rate: f32,
        freq: f32,
        string: u8,
        gain: f32,
        duration_secs: f32,
        seed: u32,
    ) -> Self {
        let period = (sample_rate / freq).round().max(2.0) as usize;

        // Damping cutoff rises with pitch so high notes keep their sparkle
        // while the loop still loses treble every round trip.
        let damping = OnePole::lowpass(2_000.0 + freq * 4.0, sample_rate);

        // Body resonance sits low and shifts a little per string.
        let body = BodyFilter::peaking(100.0 + string as f32 * 12.0, 0.4, 0.25, sample_rate);

        Self {
            delay: DelayLine::new(period),
            damping,
            body,
            excite_filter: OnePole::lowpass((freq * 8.0).clamp(1_000.0, 6_000.0), sample_rate),
            noise: NoiseSource::new(seed),
            env: PluckEnvelope::new(sample_rate, duration_secs),
            feedback: Self::feedback_coefficient(freq, string),
            gain,
            burst_remaining: (BURST_SECS * sample_rate).max(1.0) as u32,
            recirculating: 0.0,
        }
    }

    pub fn is_active(&self) -> bool {
        self.env.is_active()
    }

    #[inline]
    fn next_sample(&mut self) -> f32 {
        let excitation = if self.burst_remaining > 0 {
            self.burst_remaining -= 1;
            self.excite_filter.next_sample(self.noise.next_sample())
        } else {
            0.0
        };

        let fed_back = self.damping.next_sample(self.recirculating) * self.feedback;
        let loop_sample = excitation + fed_back;
        self.recirculating = self.delay.next_sample(loop_sample);

        self.body.next_sample(loop_sample) * self.env.next_level() * self.gain
    }

    /// Mix this voice into `out`, stopping early once the envelope finishes.
    pub fn render_add(&mut self, out: &mut [f32]) {
        for slot in out.iter_mut() {
            if !self.is_active() {
                break;
            }
            *slot += self.next_sample();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_RATE: f32 = 8_000.0;

    fn render_to_silence(voice: &mut PluckVoice, max_blocks: usize) -> Vec<f32> {
        let mut all = Vec::new();
        let mut block = [0.0f32; 256];
        for _ in 0..max_blocks {
            block.fill(0.0);
            voice.render_add(&mut block);
            all.extend_from_slice(&block);
            if !voice.is_active() {
                break;
            }
        }
        all
    }

    fn peak(samples: &[f32]) -> f32 {
        samples.iter().fold(0.0f32, |acc, &s| acc.max(s.abs()))
    }

    #[test]
    fn voice_sounds_then_fades_out() {
        let mut voice = PluckVoice::new(SAMPLE_RATE, 220.0, 2, 0.5, 0.2, 1);
        let samples = render_to_silence(&mut voice, 64);

        assert!(peak(&samples) > 0.01, "voice should produce audible output");
        assert!(!voice.is_active(), "voice should finish within duration + tail");

        let tail = &samples[samples.len().saturating_sub(16)..];
        assert!(peak(tail) < 1e-3, "voice should end in silence");
    }

    #[test]
    fn voice_finishes_within_duration_plus_tail() {
        let duration = 0.2f32;
        let mut voice = PluckVoice::new(SAMPLE_RATE, 220.0, 2, 0.5, duration, 1);
        let samples = render_to_silence(&mut voice, 64);

        // Duration plus the capped release tail, with a small margin.
        let limit = ((duration + 0.25) * SAMPLE_RATE * 1.1) as usize + 256;
        assert!(
            samples.len() <= limit,
            "voice ran {} samples, limit {limit}",
            samples.len()
        );
    }

    #[test]
    fn quieter_gain_renders_strictly_quieter() {
        // Identical events apart from gain; same seed gives identical noise.
        let mut loud = PluckVoice::new(SAMPLE_RATE, 220.0, 2, 0.5, 0.2, 1);
        let mut soft = PluckVoice::new(SAMPLE_RATE, 220.0, 2, 0.25, 0.2, 1);

        let loud_peak = peak(&render_to_silence(&mut loud, 64));
        let soft_peak = peak(&render_to_silence(&mut soft, 64));

        assert!(
            soft_peak < loud_peak,
            "conflict gain must be audibly quieter: {soft_peak} vs {loud_peak}"
        );
    }

    #[test]
    fn same_seed_renders_identically() {
        let mut a = PluckVoice::new(SAMPLE_RATE, 330.0, 3, 0.55, 0.1, 9);
        let mut b = PluckVoice::new(SAMPLE_RATE, 330.0, 3, 0.55, 0.1, 9);

        assert_eq!(render_to_silence(&mut a, 64), render_to_silence(&mut b, 64));
    }

    #[test]
    fn feedback_coefficient_clamps_and_orders_strings() {
        // Low open E on string 0 hits the upper clamp.
        assert_eq!(PluckVoice::feedback_coefficient(82.4, 0), 0.92);
        // High pitch on the top string hits the lower clamp.
        assert_eq!(PluckVoice::feedback_coefficient(2_500.0, 5), 0.6);

        // At equal frequency, lower strings ring longer.
        let bass = PluckVoice::feedback_coefficient(440.0, 1);
        let treble = PluckVoice::feedback_coefficient(440.0, 4);
        assert!(bass > treble);
    }
}
