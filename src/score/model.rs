use serde::{Deserialize, Serialize};

use crate::{MAX_FRET, STRING_COUNT};

/// A physical playing position: which string, which fret.
///
/// String 0 is the low E string; string 5 is the high e string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TabCoord {
    pub string: u8,
    pub fret: u8,
}

impl TabCoord {
    pub fn new(string: u8, fret: u8) -> Self {
        Self { string, fret }
    }

    /// Check the coordinate addresses a real position on the instrument.
    pub fn is_valid(&self) -> bool {
        (self.string as usize) < STRING_COUNT && self.fret <= MAX_FRET
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NoteId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChordId(pub u64);

/// A single note on the timeline.
///
/// Owned exclusively by the committed snapshot. During a drag the controller
/// keeps a transient lane/start override and only mutates the canonical note
/// through a collaborator call on release.
#[derive(Debug, Clone, PartialEq)]
pub struct Note {
    pub id: NoteId,
    pub tab: TabCoord,
    /// First frame the note sounds on.
    pub start: u32,
    /// Length in frames, always >= 1.
    pub length: u32,
    /// MIDI-style note number.
    pub pitch: i32,
}

impl Note {
    /// One past the last sounding frame (half-open interval).
    pub fn end(&self) -> u32 {
        self.start + self.length
    }
}

/// A group of simultaneously-sounding tab slots.
///
/// The slot count is fixed for the chord's lifetime: re-voicing happens by
/// changing `(string, fret)` per slot, never by adding or removing slots.
/// Slot-count changes go through disband + regroup on the collaborator side.
#[derive(Debug, Clone, PartialEq)]
pub struct Chord {
    pub id: ChordId,
    pub start: u32,
    pub length: u32,
    /// One tab coordinate per originally-grouped note.
    pub tabs: Vec<TabCoord>,
    /// Parallel fallback pitches for slots whose tab cannot be resolved.
    pub original_pitches: Vec<i32>,
}

impl Chord {
    pub fn end(&self) -> u32 {
        self.start + self.length
    }

    pub fn slot_count(&self) -> usize {
        self.tabs.len()
    }
}

/// A contiguous time range reconstructed to a single tab coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Segment {
    pub start: u32,
    /// Exclusive end frame; always `> start`.
    pub end: u32,
    pub tab: TabCoord,
}

impl Segment {
    pub fn len(&self) -> u32 {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }
}

/// The full editor state delivered by the collaborator.
///
/// Replaced wholesale whenever a mutation commits; nothing in this crate
/// performs incremental merges.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    pub notes: Vec<Note>,
    pub chords: Vec<Chord>,
    /// Ordered partition of `[0, total_frames)`, or empty before the first
    /// segmentation pass.
    pub segments: Vec<Segment>,
    pub frames_per_measure: u32,
    /// Frames per second: converts frame positions to playback time.
    pub fps: f32,
    pub total_frames: u32,
}

impl Snapshot {
    pub fn note(&self, id: NoteId) -> Option<&Note> {
        self.notes.iter().find(|n| n.id == id)
    }

    pub fn chord(&self, id: ChordId) -> Option<&Chord> {
        self.chords.iter().find(|c| c.id == id)
    }

    /// Number of whole measures in the bar grid.
    pub fn measure_count(&self) -> usize {
        if self.frames_per_measure == 0 {
            return 0;
        }
        (self.total_frames / self.frames_per_measure) as usize
    }

    /// Iterate the bar grid as `[start, end)` frame windows.
    pub fn measures(&self) -> impl Iterator<Item = std::ops::Range<u32>> + '_ {
        let fpm = self.frames_per_measure;
        (0..self.measure_count() as u32).map(move |m| (m * fpm)..((m + 1) * fpm))
    }

    /// The measure index a frame falls into.
    pub fn measure_of(&self, frame: u32) -> usize {
        if self.frames_per_measure == 0 {
            return 0;
        }
        (frame / self.frames_per_measure) as usize
    }

    /// Check the segment list is a contiguous partition of the timeline.
    ///
    /// An empty list is accepted: it means the score has not been segmented
    /// yet. A non-empty list must start at 0, end at `total_frames`, chain
    /// `end[i] == start[i+1]` and contain no degenerate segment.
    pub fn segments_form_partition(&self) -> bool {
        if self.segments.is_empty() {
            return true;
        }

        let mut cursor = 0u32;
        for seg in &self.segments {
            if seg.start != cursor || seg.is_empty() {
                return false;
            }
            cursor = seg.end;
        }
        cursor == self.total_frames
    }
}

/// Tab-to-pitch lookup for one instrument tuning.
///
/// Used by the preview synth to resolve the sounding pitch of a chord slot;
/// slots the table cannot resolve fall back to their recorded original pitch.
#[derive(Debug, Clone)]
pub struct TabTuning {
    open_midi: [i32; STRING_COUNT],
}

impl TabTuning {
    pub fn new(open_midi: [i32; STRING_COUNT]) -> Self {
        Self { open_midi }
    }

    /// Standard guitar tuning, low E (string 0) to high e (string 5).
    pub fn standard() -> Self {
        Self {
            open_midi: [40, 45, 50, 55, 59, 64],
        }
    }

    /// MIDI pitch for a tab coordinate, or `None` if the coordinate is
    /// outside the instrument.
    pub fn pitch_of(&self, tab: TabCoord) -> Option<i32> {
        if !tab.is_valid() {
            return None;
        }
        Some(self.open_midi[tab.string as usize] + tab.fret as i32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot_with(segments: Vec<Segment>, total_frames: u32) -> Snapshot {
        Snapshot {
            segments,
            frames_per_measure: 16,
            fps: 8.0,
            total_frames,
            ..Default::default()
        }
    }

    #[test]
    fn tab_coord_validity() {
        assert!(TabCoord::new(0, 0).is_valid());
        assert!(TabCoord::new(5, MAX_FRET).is_valid());
        assert!(!TabCoord::new(6, 0).is_valid());
        assert!(!TabCoord::new(0, MAX_FRET + 1).is_valid());
    }

    #[test]
    fn note_end_is_half_open() {
        let note = Note {
            id: NoteId(1),
            tab: TabCoord::new(0, 3),
            start: 4,
            length: 2,
            pitch: 43,
        };
        assert_eq!(note.end(), 6);
    }

    #[test]
    fn measure_grid_covers_timeline() {
        let snap = snapshot_with(Vec::new(), 64);
        assert_eq!(snap.measure_count(), 4);

        let measures: Vec<_> = snap.measures().collect();
        assert_eq!(measures[0], 0..16);
        assert_eq!(measures[3], 48..64);
        assert_eq!(snap.measure_of(0), 0);
        assert_eq!(snap.measure_of(15), 0);
        assert_eq!(snap.measure_of(16), 1);
    }

    #[test]
    fn empty_segment_list_is_a_valid_partition() {
        assert!(snapshot_with(Vec::new(), 64).segments_form_partition());
    }

    #[test]
    fn contiguous_segments_form_partition() {
        let tab = TabCoord::new(0, 0);
        let segs = vec![
            Segment { start: 0, end: 20, tab },
            Segment { start: 20, end: 64, tab },
        ];
        assert!(snapshot_with(segs, 64).segments_form_partition());
    }

    #[test]
    fn gapped_or_degenerate_segments_rejected() {
        let tab = TabCoord::new(0, 0);

        let gapped = vec![
            Segment { start: 0, end: 20, tab },
            Segment { start: 24, end: 64, tab },
        ];
        assert!(!snapshot_with(gapped, 64).segments_form_partition());

        let degenerate = vec![
            Segment { start: 0, end: 0, tab },
            Segment { start: 0, end: 64, tab },
        ];
        assert!(!snapshot_with(degenerate, 64).segments_form_partition());

        let short = vec![Segment { start: 0, end: 32, tab }];
        assert!(!snapshot_with(short, 64).segments_form_partition());
    }

    #[test]
    fn standard_tuning_pitches() {
        let tuning = TabTuning::standard();
        // Open low E and open high e.
        assert_eq!(tuning.pitch_of(TabCoord::new(0, 0)), Some(40));
        assert_eq!(tuning.pitch_of(TabCoord::new(5, 0)), Some(64));
        // Fifth fret of string 0 matches open string 1.
        assert_eq!(
            tuning.pitch_of(TabCoord::new(0, 5)),
            tuning.pitch_of(TabCoord::new(1, 0))
        );
        assert_eq!(tuning.pitch_of(TabCoord::new(6, 0)), None);
    }
}
