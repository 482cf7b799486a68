use std::collections::HashSet;

use super::model::{Chord, ChordId, Note, NoteId};

/*
Conflict Detection
==================

Two events conflict when they sound on the same string at overlapping times:
one string cannot play two notes at once. The relation is derived from the
note/chord collections every time they change and is never persisted.

Intervals are half-open: an event occupies [start, start + length). Two
events that abut (a.end == b.start) share a frame boundary but no frame, so
they do not conflict.

The pairwise scan is quadratic in the number of sounding events. That is the
simplest correct formulation and is kept deliberately; benches/conflict_bench.rs
tracks how it behaves as scores grow.
*/

/// Identifies one sounding event: a note, or one slot of a chord.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKey {
    Note(NoteId),
    /// Chord id plus slot index within the chord's tab list.
    ChordSlot(ChordId, usize),
}

/// One sounding event flattened out of the note/chord collections.
#[derive(Debug, Clone, Copy)]
pub struct SoundingEvent {
    pub key: EventKey,
    pub string: u8,
    pub start: u32,
    /// Exclusive end frame.
    pub end: u32,
}

impl SoundingEvent {
    fn overlaps(&self, other: &SoundingEvent) -> bool {
        self.string == other.string && self.start < other.end && other.start < self.end
    }
}

/// Flatten notes and chord slots into one event list.
///
/// Produces one record per note and one per chord tab slot, in input order.
pub fn sounding_events(notes: &[Note], chords: &[Chord]) -> Vec<SoundingEvent> {
    let mut events = Vec::with_capacity(notes.len() + chords.iter().map(Chord::slot_count).sum::<usize>());

    for note in notes {
        events.push(SoundingEvent {
            key: EventKey::Note(note.id),
            string: note.tab.string,
            start: note.start,
            end: note.end(),
        });
    }

    for chord in chords {
        for (slot, tab) in chord.tabs.iter().enumerate() {
            events.push(SoundingEvent {
                key: EventKey::ChordSlot(chord.id, slot),
                string: tab.string,
                start: chord.start,
                end: chord.end(),
            });
        }
    }

    events
}

/// Compute the conflict set: every event that overlaps a same-string peer.
///
/// The relation is symmetric: when a pair overlaps, both keys are flagged.
pub fn conflicts(events: &[SoundingEvent]) -> HashSet<EventKey> {
    let mut flagged = HashSet::new();

    for (i, a) in events.iter().enumerate() {
        for b in &events[i + 1..] {
            if a.overlaps(b) {
                flagged.insert(a.key);
                flagged.insert(b.key);
            }
        }
    }

    flagged
}
