use std::collections::HashSet;

use crate::score::{Chord, EventKey, Note, TabTuning};
use crate::synth::{pitch_to_freq, PluckVoice};

/// Gain for a plain note event.
pub const NOTE_GAIN: f32 = 0.55;
/// Gain for one chord tab slot.
pub const CHORD_SLOT_GAIN: f32 = 0.5;
/// Gain for any event flagged by the conflict relation.
pub const CONFLICT_GAIN: f32 = 0.25;

/// Shared epoch offset: everything starts slightly in the future so the
/// first voices are never scheduled into the past.
pub const SCHEDULE_SLACK_SECS: f32 = 0.05;
/// How long after the playthrough length the engine keeps its resources
/// before auto-stopping.
pub const RELEASE_GRACE_SECS: f32 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Idle,
    Playing,
}

/// One gain-weighted sounding event resolved for playback.
#[derive(Debug, Clone, Copy)]
pub struct PreviewEvent {
    pub key: EventKey,
    pub string: u8,
    pub pitch: i32,
    /// Seconds from the shared epoch.
    pub start_secs: f32,
    pub duration_secs: f32,
    pub gain: f32,
}

/// Build the playback event list: one record per note, one per chord slot.
///
/// Chord slots resolve their pitch through the tuning table and fall back to
/// the slot's recorded original pitch when the lookup has no entry. Conflict
/// membership only affects gain; conflicting events still play, just muted.
pub fn preview_events(
    notes: &[Note],
    chords: &[Chord],
    conflict_set: &HashSet<EventKey>,
    fps: f32,
    tuning: Option<&TabTuning>,
) -> Vec<PreviewEvent> {
    if fps <= 0.0 {
        return Vec::new();
    }

    let gain_for = |key: EventKey, base: f32| {
        if conflict_set.contains(&key) {
            CONFLICT_GAIN
        } else {
            base
        }
    };

    let mut events = Vec::new();

    for note in notes {
        let key = EventKey::Note(note.id);
        events.push(PreviewEvent {
            key,
            string: note.tab.string,
            pitch: note.pitch,
            start_secs: note.start as f32 / fps,
            duration_secs: note.length as f32 / fps,
            gain: gain_for(key, NOTE_GAIN),
        });
    }

    for chord in chords {
        for (slot, tab) in chord.tabs.iter().enumerate() {
            let key = EventKey::ChordSlot(chord.id, slot);
            let pitch = tuning
                .and_then(|t| t.pitch_of(*tab))
                .or_else(|| chord.original_pitches.get(slot).copied())
                .unwrap_or(0);

            events.push(PreviewEvent {
                key,
                string: tab.string,
                pitch,
                start_secs: chord.start as f32 / fps,
                duration_secs: chord.length as f32 / fps,
                gain: gain_for(key, CHORD_SLOT_GAIN),
            });
        }
    }

    events
}

struct ScheduledVoice {
    start_sample: u64,
    voice: PluckVoice,
}

/// Preview playback engine: `Idle → Playing → Idle`.
///
/// Owns every synthesis resource (delay lines, filters, noise states) for
/// the duration of one playing episode. `stop` frees them unconditionally;
/// otherwise they are released 0.5 s after the last event ends.
pub struct PluckEngine {
    sample_rate: f32,
    state: EngineState,
    voices: Vec<ScheduledVoice>,
    /// Samples rendered since `play`.
    clock: u64,
    /// Sample position of the automatic stop.
    stop_at: u64,
}

impl PluckEngine {
    pub fn new(sample_rate: f32) -> Self {
        Self {
            sample_rate,
            state: EngineState::Idle,
            voices: Vec::new(),
            clock: 0,
            stop_at: 0,
        }
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    pub fn is_playing(&self) -> bool {
        self.state == EngineState::Playing
    }

    /// Playback position in seconds since `play`, for playhead display.
    pub fn position_secs(&self) -> f32 {
        self.clock as f32 / self.sample_rate
    }

    /// Start a playthrough. No-op while already playing or when the event
    /// list resolves to nothing.
    pub fn play(
        &mut self,
        notes: &[Note],
        chords: &[Chord],
        conflict_set: &HashSet<EventKey>,
        fps: f32,
        tuning: Option<&TabTuning>,
    ) {
        if self.state == EngineState::Playing {
            return;
        }

        let events = preview_events(notes, chords, conflict_set, fps, tuning);
        if events.is_empty() {
            return;
        }

        let mut playthrough_secs = 0.0f32;
        let mut voices = Vec::new();

        for (index, event) in events.iter().enumerate() {
            playthrough_secs = playthrough_secs.max(event.start_secs + event.duration_secs);

            // Unpitched events contribute to the playthrough length but no voice.
            if event.pitch <= 0 {
                continue;
            }
            let freq = pitch_to_freq(event.pitch);
            if !freq.is_finite() || freq <= 0.0 {
                continue;
            }

            let start_secs = SCHEDULE_SLACK_SECS + event.start_secs;
            voices.push(ScheduledVoice {
                start_sample: (start_secs * self.sample_rate) as u64,
                voice: PluckVoice::new(
                    self.sample_rate,
                    freq,
                    event.string,
                    event.gain,
                    event.duration_secs,
                    0x9E37_79B9 ^ index as u32,
                ),
            });
        }

        let total_secs = SCHEDULE_SLACK_SECS + playthrough_secs + RELEASE_GRACE_SECS;

        self.voices = voices;
        self.clock = 0;
        self.stop_at = (total_secs * self.sample_rate) as u64;
        self.state = EngineState::Playing;
    }

    /// Unconditional, immediate teardown of all voices.
    pub fn stop(&mut self) {
        self.voices.clear();
        self.clock = 0;
        self.state = EngineState::Idle;
    }

    /// Render the next block. Emits silence while idle.
    pub fn render_block(&mut self, out: &mut [f32]) {
        out.fill(0.0);
        if self.state != EngineState::Playing {
            return;
        }

        let block_len = out.len() as u64;
        for scheduled in &mut self.voices {
            if scheduled.start_sample >= self.clock + block_len {
                continue;
            }
            if !scheduled.voice.is_active() {
                continue;
            }
            let offset = scheduled.start_sample.saturating_sub(self.clock) as usize;
            scheduled.voice.render_add(&mut out[offset..]);
        }

        self.clock += block_len;
        if self.clock >= self.stop_at {
            self.stop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::score::{conflicts, sounding_events, ChordId, NoteId, TabCoord};

    const SAMPLE_RATE: f32 = 8_000.0;
    const FPS: f32 = 8.0;

    fn note(id: u64, string: u8, start: u32, length: u32, pitch: i32) -> Note {
        Note {
            id: NoteId(id),
            tab: TabCoord::new(string, 0),
            start,
            length,
            pitch,
        }
    }

    fn chord(id: u64, start: u32, length: u32, tabs: Vec<TabCoord>) -> Chord {
        let original_pitches = tabs.iter().map(|t| 40 + t.string as i32).collect();
        Chord {
            id: ChordId(id),
            start,
            length,
            tabs,
            original_pitches,
        }
    }

    fn render_until_idle(engine: &mut PluckEngine, max_blocks: usize) -> Vec<f32> {
        let mut all = Vec::new();
        let mut block = [0.0f32; 256];
        for _ in 0..max_blocks {
            engine.render_block(&mut block);
            all.extend_from_slice(&block);
            if !engine.is_playing() {
                break;
            }
        }
        all
    }

    #[test]
    fn play_with_no_events_is_a_noop() {
        let mut engine = PluckEngine::new(SAMPLE_RATE);
        engine.play(&[], &[], &HashSet::new(), FPS, None);

        assert_eq!(engine.state(), EngineState::Idle);
    }

    #[test]
    fn play_while_playing_is_a_noop() {
        let notes = vec![note(1, 0, 0, 8, 45)];
        let mut engine = PluckEngine::new(SAMPLE_RATE);

        engine.play(&notes, &[], &HashSet::new(), FPS, None);
        assert!(engine.is_playing());
        let stop_at = engine.stop_at;

        // A second play must not reschedule anything.
        let more = vec![note(2, 1, 0, 64, 50)];
        engine.play(&more, &[], &HashSet::new(), FPS, None);
        assert_eq!(engine.stop_at, stop_at);
    }

    #[test]
    fn renders_audible_output_and_auto_stops() {
        let notes = vec![note(1, 0, 0, 4, 45)];
        let mut engine = PluckEngine::new(SAMPLE_RATE);
        engine.play(&notes, &[], &HashSet::new(), FPS, None);

        let samples = render_until_idle(&mut engine, 256);
        let peak = samples.iter().fold(0.0f32, |acc, &s| acc.max(s.abs()));

        assert!(peak > 0.01, "expected audible output, peak {peak}");
        assert_eq!(engine.state(), EngineState::Idle, "engine should auto-stop");

        // Auto-stop lands 0.5 s after the playthrough length.
        let expected = (SCHEDULE_SLACK_SECS + 4.0 / FPS + RELEASE_GRACE_SECS) * SAMPLE_RATE;
        assert!(
            (samples.len() as f32) < expected + 512.0,
            "rendered {} samples, expected about {expected}",
            samples.len()
        );
    }

    #[test]
    fn stop_is_immediate_regardless_of_auto_stop() {
        let notes = vec![note(1, 0, 0, 64, 45)];
        let mut engine = PluckEngine::new(SAMPLE_RATE);
        engine.play(&notes, &[], &HashSet::new(), FPS, None);

        let mut block = [0.0f32; 256];
        engine.render_block(&mut block);
        assert!(engine.is_playing());

        engine.stop();
        assert_eq!(engine.state(), EngineState::Idle);

        engine.render_block(&mut block);
        assert!(
            block.iter().all(|&s| s == 0.0),
            "stopped engine must render silence"
        );
    }

    #[test]
    fn note_and_chord_gains() {
        let notes = vec![note(1, 0, 0, 4, 45)];
        let chords = vec![chord(
            2,
            8,
            4,
            vec![TabCoord::new(2, 2), TabCoord::new(3, 2)],
        )];

        let events = preview_events(&notes, &chords, &HashSet::new(), FPS, None);
        assert_eq!(events.len(), 3);
        assert_eq!(events[0].gain, NOTE_GAIN);
        assert_eq!(events[1].gain, CHORD_SLOT_GAIN);
        assert_eq!(events[2].gain, CHORD_SLOT_GAIN);
    }

    #[test]
    fn conflicting_events_are_muted_below_clean_ones() {
        // Two overlapping notes on one string conflict; a third is clean.
        let notes = vec![
            note(1, 0, 0, 8, 45),
            note(2, 0, 4, 8, 47),
            note(3, 1, 0, 8, 50),
        ];
        let conflict_set = conflicts(&sounding_events(&notes, &[]));
        let events = preview_events(&notes, &[], &conflict_set, FPS, None);

        assert_eq!(events[0].gain, CONFLICT_GAIN);
        assert_eq!(events[1].gain, CONFLICT_GAIN);
        assert_eq!(events[2].gain, NOTE_GAIN);
        assert!(events[0].gain < events[2].gain);
    }

    #[test]
    fn chord_slot_pitch_resolution_prefers_tuning() {
        let tuning = TabTuning::standard();
        let chords = vec![chord(1, 0, 4, vec![TabCoord::new(0, 5)])];

        let events = preview_events(&[], &chords, &HashSet::new(), FPS, Some(&tuning));
        // String 0 fret 5 resolves through the table: 40 + 5.
        assert_eq!(events[0].pitch, 45);

        // Without the table the slot falls back to its original pitch.
        let events = preview_events(&[], &chords, &HashSet::new(), FPS, None);
        assert_eq!(events[0].pitch, 40);
    }

    #[test]
    fn unpitched_events_are_skipped_silently() {
        let notes = vec![note(1, 0, 0, 4, 0)];
        let mut engine = PluckEngine::new(SAMPLE_RATE);
        engine.play(&notes, &[], &HashSet::new(), FPS, None);

        // The event still drives the playthrough window but renders nothing.
        assert!(engine.is_playing());
        let samples = render_until_idle(&mut engine, 256);
        assert!(samples.iter().all(|&s| s == 0.0));
    }
}
