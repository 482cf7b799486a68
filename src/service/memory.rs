use crate::score::{Chord, ChordId, Note, NoteId, Segment, Snapshot, TabCoord, TabTuning};
use crate::service::{ExportPayload, OptimalTabs, ServiceError, ServiceResult, Stamp, TabService};
use crate::{MAX_FRET, STRING_COUNT};

/// In-memory reference implementation of the collaborator contract.
///
/// The production collaborator lives on the server; this one backs the
/// driver app and the tests. It honors the contract exactly: every mutation
/// either applies completely and returns a full snapshot clone, or rejects
/// and leaves the state untouched. The proposal operations (optimals,
/// alternatives, segmentation) return the simplest correct results; the
/// real algorithms are out of scope.
pub struct MemoryService {
    snapshot: Snapshot,
    tuning: TabTuning,
    next_id: u64,
}

impl MemoryService {
    pub fn new(frames_per_measure: u32, fps: f32, measures: u32) -> Self {
        Self {
            snapshot: Snapshot {
                frames_per_measure,
                fps,
                total_frames: frames_per_measure * measures,
                ..Default::default()
            },
            tuning: TabTuning::standard(),
            next_id: 1,
        }
    }

    pub fn snapshot(&self) -> Snapshot {
        self.snapshot.clone()
    }

    pub fn tuning(&self) -> &TabTuning {
        &self.tuning
    }

    fn ok(&self) -> ServiceResult {
        Ok(self.snapshot.clone())
    }

    fn fresh_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// Grow the timeline by whole measures until it covers `end`.
    fn ensure_covers(&mut self, end: u32) {
        let fpm = self.snapshot.frames_per_measure.max(1);
        while self.snapshot.total_frames < end {
            self.snapshot.total_frames += fpm;
        }
    }

    fn note_index(&self, id: NoteId) -> Result<usize, ServiceError> {
        self.snapshot
            .notes
            .iter()
            .position(|n| n.id == id)
            .ok_or_else(|| ServiceError::Rejected(format!("no such note: {}", id.0)))
    }

    fn chord_index(&self, id: ChordId) -> Result<usize, ServiceError> {
        self.snapshot
            .chords
            .iter()
            .position(|c| c.id == id)
            .ok_or_else(|| ServiceError::Rejected(format!("no such chord: {}", id.0)))
    }

    fn check_tab(tab: TabCoord) -> Result<(), ServiceError> {
        if tab.is_valid() {
            Ok(())
        } else {
            Err(ServiceError::Rejected(format!(
                "invalid tab coordinate: string {} fret {}",
                tab.string, tab.fret
            )))
        }
    }

    fn check_length(length: u32) -> Result<(), ServiceError> {
        if length >= 1 {
            Ok(())
        } else {
            Err(ServiceError::Rejected(
                "length must be at least one frame".into(),
            ))
        }
    }

    fn check_stamps(payload: &ExportPayload) -> Result<(), ServiceError> {
        if payload.frames_per_measure == 0 {
            return Err(ServiceError::Rejected(
                "frames_per_measure must be positive".into(),
            ));
        }
        if payload.fps <= 0.0 {
            return Err(ServiceError::Rejected("fps must be positive".into()));
        }
        for (i, stamp) in payload.stamps.iter().enumerate() {
            if !stamp.tab.is_valid() {
                return Err(ServiceError::Rejected(format!(
                    "stamp {i} has an invalid tab coordinate"
                )));
            }
            if stamp.duration == 0 {
                return Err(ServiceError::Rejected(format!(
                    "stamp {i} has zero duration"
                )));
            }
        }
        Ok(())
    }

    fn notes_from_stamps(&mut self, stamps: &[Stamp], offset: u32) -> Vec<Note> {
        stamps
            .iter()
            .map(|stamp| Note {
                id: NoteId(self.fresh_id()),
                tab: stamp.tab,
                start: stamp.time + offset,
                length: stamp.duration,
                pitch: self.tuning.pitch_of(stamp.tab).unwrap_or(0),
            })
            .collect()
    }
}

impl TabService for MemoryService {
    fn add_note(&mut self, tab: TabCoord, start: u32, length: u32) -> ServiceResult {
        Self::check_tab(tab)?;
        Self::check_length(length)?;

        let pitch = self.tuning.pitch_of(tab).unwrap_or(0);
        let id = NoteId(self.fresh_id());
        self.ensure_covers(start + length);
        self.snapshot.notes.push(Note {
            id,
            tab,
            start,
            length,
            pitch,
        });
        self.ok()
    }

    fn delete_note(&mut self, id: NoteId) -> ServiceResult {
        let index = self.note_index(id)?;
        self.snapshot.notes.remove(index);
        self.ok()
    }

    fn assign_tab(&mut self, id: NoteId, tab: TabCoord) -> ServiceResult {
        Self::check_tab(tab)?;
        let pitch = self.tuning.pitch_of(tab).unwrap_or(0);
        let index = self.note_index(id)?;

        let note = &mut self.snapshot.notes[index];
        note.tab = tab;
        note.pitch = pitch;
        self.ok()
    }

    fn set_note_start(&mut self, id: NoteId, start: u32) -> ServiceResult {
        let index = self.note_index(id)?;
        let end = start + self.snapshot.notes[index].length;
        self.snapshot.notes[index].start = start;
        self.ensure_covers(end);
        self.ok()
    }

    fn set_note_length(&mut self, id: NoteId, length: u32) -> ServiceResult {
        Self::check_length(length)?;
        let index = self.note_index(id)?;
        let end = self.snapshot.notes[index].start + length;
        self.snapshot.notes[index].length = length;
        self.ensure_covers(end);
        self.ok()
    }

    fn note_optimals(&mut self, id: NoteId) -> Result<OptimalTabs, ServiceError> {
        let index = self.note_index(id)?;
        let pitch = self.snapshot.notes[index].pitch;

        // Every position sounding the same pitch. The real ranking algorithm
        // is external; nothing here is blocked.
        let mut possible = Vec::new();
        for string in 0..STRING_COUNT as u8 {
            for fret in 0..=MAX_FRET {
                let tab = TabCoord::new(string, fret);
                if self.tuning.pitch_of(tab) == Some(pitch) {
                    possible.push(tab);
                }
            }
        }

        Ok(OptimalTabs {
            possible,
            blocked: Vec::new(),
        })
    }

    fn make_chord(&mut self, notes: &[NoteId]) -> ServiceResult {
        if notes.len() < 2 {
            return Err(ServiceError::Rejected(
                "a chord needs at least two notes".into(),
            ));
        }

        let mut indices = Vec::with_capacity(notes.len());
        for id in notes {
            indices.push(self.note_index(*id)?);
        }

        let members: Vec<Note> = indices
            .iter()
            .map(|&i| self.snapshot.notes[i].clone())
            .collect();
        let start = members.iter().map(|n| n.start).min().unwrap_or(0);
        let end = members.iter().map(Note::end).max().unwrap_or(start + 1);

        let chord = Chord {
            id: ChordId(self.fresh_id()),
            start,
            length: (end - start).max(1),
            tabs: members.iter().map(|n| n.tab).collect(),
            original_pitches: members.iter().map(|n| n.pitch).collect(),
        };

        self.snapshot.notes.retain(|n| !notes.contains(&n.id));
        self.snapshot.chords.push(chord);
        self.ok()
    }

    fn delete_chord(&mut self, id: ChordId) -> ServiceResult {
        let index = self.chord_index(id)?;
        self.snapshot.chords.remove(index);
        self.ok()
    }

    fn disband_chord(&mut self, id: ChordId) -> ServiceResult {
        let index = self.chord_index(id)?;
        let chord = self.snapshot.chords.remove(index);

        for (slot, tab) in chord.tabs.iter().enumerate() {
            let pitch = self
                .tuning
                .pitch_of(*tab)
                .or_else(|| chord.original_pitches.get(slot).copied())
                .unwrap_or(0);
            let id = NoteId(self.fresh_id());
            self.snapshot.notes.push(Note {
                id,
                tab: *tab,
                start: chord.start,
                length: chord.length,
                pitch,
            });
        }
        self.ok()
    }

    fn set_chord_tabs(&mut self, id: ChordId, tabs: Vec<TabCoord>) -> ServiceResult {
        for tab in &tabs {
            Self::check_tab(*tab)?;
        }
        let index = self.chord_index(id)?;
        let chord = &mut self.snapshot.chords[index];

        // Slot count is fixed for the chord's lifetime.
        if tabs.len() != chord.slot_count() {
            return Err(ServiceError::Rejected(format!(
                "chord has {} slots, got {} tabs",
                chord.slot_count(),
                tabs.len()
            )));
        }

        chord.tabs = tabs;
        self.ok()
    }

    fn set_chord_start(&mut self, id: ChordId, start: u32) -> ServiceResult {
        let index = self.chord_index(id)?;
        let end = start + self.snapshot.chords[index].length;
        self.snapshot.chords[index].start = start;
        self.ensure_covers(end);
        self.ok()
    }

    fn set_chord_length(&mut self, id: ChordId, length: u32) -> ServiceResult {
        Self::check_length(length)?;
        let index = self.chord_index(id)?;
        let end = self.snapshot.chords[index].start + length;
        self.snapshot.chords[index].length = length;
        self.ensure_covers(end);
        self.ok()
    }

    fn shift_chord_octave(&mut self, id: ChordId, direction: i8) -> ServiceResult {
        if direction != 1 && direction != -1 {
            return Err(ServiceError::Rejected(
                "octave shift must be +1 or -1".into(),
            ));
        }
        let index = self.chord_index(id)?;
        let chord = &self.snapshot.chords[index];

        let mut shifted = Vec::with_capacity(chord.slot_count());
        for tab in &chord.tabs {
            let fret = tab.fret as i32 + direction as i32 * 12;
            if !(0..=MAX_FRET as i32).contains(&fret) {
                return Err(ServiceError::Rejected(
                    "octave shift leaves the fretboard".into(),
                ));
            }
            shifted.push(TabCoord::new(tab.string, fret as u8));
        }

        let chord = &mut self.snapshot.chords[index];
        chord.tabs = shifted;
        for pitch in &mut chord.original_pitches {
            *pitch += direction as i32 * 12;
        }
        self.ok()
    }

    fn chord_alternatives(&mut self, id: ChordId) -> Result<Vec<Vec<TabCoord>>, ServiceError> {
        let index = self.chord_index(id)?;
        // The fingering proposer is external; the reference service offers
        // only the current assignment.
        Ok(vec![self.snapshot.chords[index].tabs.clone()])
    }

    fn generate_segments(&mut self) -> ServiceResult {
        if self.snapshot.total_frames == 0 {
            return Err(ServiceError::Rejected("timeline is empty".into()));
        }

        // Boundaries at every event start; each segment carries the tab of
        // the event starting there, or the previous tab when none does.
        let mut boundaries: Vec<u32> = std::iter::once(0)
            .chain(self.snapshot.notes.iter().map(|n| n.start))
            .chain(self.snapshot.chords.iter().map(|c| c.start))
            .filter(|&b| b < self.snapshot.total_frames)
            .collect();
        boundaries.sort_unstable();
        boundaries.dedup();

        let tab_at = |frame: u32| -> Option<TabCoord> {
            self.snapshot
                .notes
                .iter()
                .find(|n| n.start == frame)
                .map(|n| n.tab)
                .or_else(|| {
                    self.snapshot
                        .chords
                        .iter()
                        .find(|c| c.start == frame)
                        .and_then(|c| c.tabs.first().copied())
                })
        };

        let mut segments = Vec::with_capacity(boundaries.len());
        let mut current_tab = TabCoord::new(0, 0);
        for (i, &start) in boundaries.iter().enumerate() {
            let end = boundaries
                .get(i + 1)
                .copied()
                .unwrap_or(self.snapshot.total_frames);
            if let Some(tab) = tab_at(start) {
                current_tab = tab;
            }
            segments.push(Segment {
                start,
                end,
                tab: current_tab,
            });
        }

        self.snapshot.segments = segments;
        self.ok()
    }

    fn apply_segments(&mut self, segments: Vec<Segment>) -> ServiceResult {
        let candidate = Snapshot {
            segments: segments.clone(),
            ..self.snapshot.clone()
        };
        if !candidate.segments_form_partition() {
            return Err(ServiceError::Rejected(
                "segments must form a contiguous partition of the timeline".into(),
            ));
        }
        for seg in &segments {
            Self::check_tab(seg.tab)?;
        }

        self.snapshot.segments = segments;
        self.ok()
    }

    fn insert_boundary(&mut self, time: u32, coord: Option<TabCoord>) -> ServiceResult {
        if let Some(tab) = coord {
            Self::check_tab(tab)?;
        }
        let index = self
            .snapshot
            .segments
            .iter()
            .position(|s| s.start < time && time < s.end)
            .ok_or_else(|| {
                ServiceError::Rejected("boundary must fall strictly inside a segment".into())
            })?;

        let original = self.snapshot.segments[index];
        self.snapshot.segments[index].end = time;
        self.snapshot.segments.insert(
            index + 1,
            Segment {
                start: time,
                end: original.end,
                tab: coord.unwrap_or(original.tab),
            },
        );
        self.ok()
    }

    fn shift_boundary(&mut self, index: usize, new_time: u32) -> ServiceResult {
        if index + 1 >= self.snapshot.segments.len() {
            return Err(ServiceError::Rejected(format!("no such boundary: {index}")));
        }

        let lo = self.snapshot.segments[index].start + 1;
        let hi = self.snapshot.segments[index + 1].end - 1;
        if !(lo..=hi).contains(&new_time) {
            return Err(ServiceError::Rejected(
                "boundary shift would empty a segment".into(),
            ));
        }

        self.snapshot.segments[index].end = new_time;
        self.snapshot.segments[index + 1].start = new_time;
        self.ok()
    }

    fn delete_boundary(&mut self, index: usize) -> ServiceResult {
        if index + 1 >= self.snapshot.segments.len() {
            return Err(ServiceError::Rejected(format!("no such boundary: {index}")));
        }

        // Merge keeps the left segment's tab.
        let right = self.snapshot.segments.remove(index + 1);
        self.snapshot.segments[index].end = right.end;
        self.ok()
    }

    fn add_bars(&mut self, count: u32) -> ServiceResult {
        self.snapshot.total_frames += count * self.snapshot.frames_per_measure;
        self.ok()
    }

    fn reorder_bars(&mut self, from: usize, to: usize) -> ServiceResult {
        let count = self.snapshot.measure_count();
        if from >= count || to >= count {
            return Err(ServiceError::Rejected(format!(
                "bar index out of range: {} measures",
                count
            )));
        }
        if from == to {
            return self.ok();
        }

        // Old measure order with `from` moved to position `to`; events keep
        // their offset within their starting measure.
        let mut order: Vec<usize> = (0..count).collect();
        let moved = order.remove(from);
        order.insert(to, moved);

        let mut new_index_of = vec![0usize; count];
        for (new_index, &old_index) in order.iter().enumerate() {
            new_index_of[old_index] = new_index;
        }

        let fpm = self.snapshot.frames_per_measure;
        let remap = |start: u32| -> u32 {
            let measure = (start / fpm) as usize;
            let offset = start % fpm;
            if measure >= count {
                return start;
            }
            new_index_of[measure] as u32 * fpm + offset
        };

        for note in &mut self.snapshot.notes {
            note.start = remap(note.start);
        }
        for chord in &mut self.snapshot.chords {
            chord.start = remap(chord.start);
        }
        self.ok()
    }

    fn remove_bar(&mut self, index: usize) -> ServiceResult {
        let count = self.snapshot.measure_count();
        if index >= count {
            return Err(ServiceError::Rejected(format!(
                "bar index out of range: {} measures",
                count
            )));
        }

        let fpm = self.snapshot.frames_per_measure;
        let cut_lo = index as u32 * fpm;
        let cut_hi = cut_lo + fpm;

        self.snapshot.notes.retain(|n| !(cut_lo..cut_hi).contains(&n.start));
        self.snapshot
            .chords
            .retain(|c| !(cut_lo..cut_hi).contains(&c.start));
        for note in &mut self.snapshot.notes {
            if note.start >= cut_hi {
                note.start -= fpm;
            }
        }
        for chord in &mut self.snapshot.chords {
            if chord.start >= cut_hi {
                chord.start -= fpm;
            }
        }

        // Collapse the removed window out of the segment partition.
        let collapse = |frame: u32| -> u32 {
            if frame <= cut_lo {
                frame
            } else if frame >= cut_hi {
                frame - fpm
            } else {
                cut_lo
            }
        };
        for seg in &mut self.snapshot.segments {
            seg.start = collapse(seg.start);
            seg.end = collapse(seg.end);
        }
        self.snapshot.segments.retain(|s| !s.is_empty());

        self.snapshot.total_frames -= fpm;
        self.ok()
    }

    fn export(&self) -> ExportPayload {
        let mut stamps: Vec<Stamp> = self
            .snapshot
            .notes
            .iter()
            .map(|n| Stamp {
                time: n.start,
                tab: n.tab,
                duration: n.length,
            })
            .chain(self.snapshot.chords.iter().flat_map(|c| {
                c.tabs.iter().map(move |tab| Stamp {
                    time: c.start,
                    tab: *tab,
                    duration: c.length,
                })
            }))
            .collect();
        stamps.sort_by_key(|s| (s.time, s.tab.string));

        ExportPayload {
            stamps,
            frames_per_measure: self.snapshot.frames_per_measure,
            fps: self.snapshot.fps,
            total_frames: self.snapshot.total_frames,
        }
    }

    fn import(&mut self, payload: ExportPayload) -> ServiceResult {
        Self::check_stamps(&payload)?;

        let notes = self.notes_from_stamps(&payload.stamps, 0);
        let content_end = notes.iter().map(Note::end).max().unwrap_or(0);

        self.snapshot = Snapshot {
            notes,
            chords: Vec::new(),
            segments: Vec::new(),
            frames_per_measure: payload.frames_per_measure,
            fps: payload.fps,
            total_frames: payload.total_frames,
        };
        self.ensure_covers(content_end);
        self.ok()
    }

    fn append_import(&mut self, payload: ExportPayload) -> ServiceResult {
        Self::check_stamps(&payload)?;

        let offset = self.snapshot.total_frames;
        let notes = self.notes_from_stamps(&payload.stamps, offset);
        let content_end = notes.iter().map(Note::end).max().unwrap_or(offset);

        self.snapshot.notes.extend(notes);
        self.snapshot.total_frames += payload.total_frames;
        self.ensure_covers(content_end);
        self.ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FPM: u32 = 16;
    const FPS: f32 = 8.0;

    fn service() -> MemoryService {
        MemoryService::new(FPM, FPS, 4)
    }

    fn service_with_notes(specs: &[(u8, u8, u32, u32)]) -> (MemoryService, Vec<NoteId>) {
        let mut svc = service();
        let mut ids = Vec::new();
        for &(string, fret, start, length) in specs {
            let snap = svc
                .add_note(TabCoord::new(string, fret), start, length)
                .unwrap();
            ids.push(snap.notes.last().unwrap().id);
        }
        (svc, ids)
    }

    #[test]
    fn add_note_resolves_pitch_from_tuning() {
        let (svc, _) = service_with_notes(&[(0, 5, 0, 4)]);
        let snap = svc.snapshot();
        assert_eq!(snap.notes[0].pitch, 45);
    }

    #[test]
    fn add_note_rejects_invalid_input() {
        let mut svc = service();
        assert!(svc.add_note(TabCoord::new(6, 0), 0, 4).is_err());
        assert!(svc.add_note(TabCoord::new(0, 0), 0, 0).is_err());
        assert!(svc.snapshot().notes.is_empty(), "rejected call must not apply");
    }

    #[test]
    fn timeline_grows_to_cover_moved_notes() {
        let (mut svc, ids) = service_with_notes(&[(0, 0, 0, 4)]);
        let snap = svc.set_note_start(ids[0], 70).unwrap();

        assert!(snap.total_frames >= 74);
        assert_eq!(snap.total_frames % FPM, 0, "growth is whole measures");
    }

    #[test]
    fn make_chord_fixes_slot_count() {
        let (mut svc, ids) = service_with_notes(&[(0, 3, 4, 4), (1, 2, 4, 4)]);
        let snap = svc.make_chord(&ids).unwrap();

        assert!(snap.notes.is_empty());
        assert_eq!(snap.chords.len(), 1);
        let chord = &snap.chords[0];
        assert_eq!(chord.slot_count(), 2);
        assert_eq!(chord.start, 4);

        let id = chord.id;
        // Wrong arity is refused; the slot count is fixed.
        assert!(svc.set_chord_tabs(id, vec![TabCoord::new(0, 0)]).is_err());
        assert!(svc
            .set_chord_tabs(id, vec![TabCoord::new(0, 5), TabCoord::new(1, 4)])
            .is_ok());
    }

    #[test]
    fn disband_restores_one_note_per_slot() {
        let (mut svc, ids) = service_with_notes(&[(2, 0, 0, 8), (3, 2, 0, 8)]);
        let snap = svc.make_chord(&ids).unwrap();
        let chord_id = snap.chords[0].id;

        let snap = svc.disband_chord(chord_id).unwrap();
        assert!(snap.chords.is_empty());
        assert_eq!(snap.notes.len(), 2);
        assert!(snap.notes.iter().all(|n| n.start == 0 && n.length == 8));
    }

    #[test]
    fn octave_shift_moves_all_slots_or_none() {
        let (mut svc, ids) = service_with_notes(&[(0, 2, 0, 4), (1, 20, 0, 4)]);
        let snap = svc.make_chord(&ids).unwrap();
        let chord_id = snap.chords[0].id;

        // Fret 20 + 12 leaves the fretboard: whole shift refused.
        assert!(svc.shift_chord_octave(chord_id, 1).is_err());
        let snap = svc.snapshot();
        assert_eq!(snap.chords[0].tabs[0].fret, 2, "failed shift must not apply");

        // Fret 2 - 12 is negative: also refused.
        assert!(svc.shift_chord_octave(chord_id, -1).is_err());
    }

    #[test]
    fn optimals_list_every_position_with_the_same_pitch() {
        // String 0 fret 5 sounds A2 (45), same as open string 1.
        let (mut svc, ids) = service_with_notes(&[(0, 5, 0, 4)]);
        let optimals = svc.note_optimals(ids[0]).unwrap();

        assert!(optimals.possible.contains(&TabCoord::new(0, 5)));
        assert!(optimals.possible.contains(&TabCoord::new(1, 0)));
        assert!(optimals.blocked.is_empty());
    }

    #[test]
    fn alternatives_offer_at_least_the_current_voicing() {
        let (mut svc, ids) = service_with_notes(&[(0, 3, 0, 4), (1, 2, 0, 4)]);
        let snap = svc.make_chord(&ids).unwrap();
        let chord_id = snap.chords[0].id;

        let alternatives = svc.chord_alternatives(chord_id).unwrap();
        assert!(alternatives.contains(&snap.chords[0].tabs));
    }

    #[test]
    fn generated_segments_form_partition() {
        let (mut svc, _) = service_with_notes(&[(0, 3, 8, 4), (2, 1, 24, 8)]);
        let snap = svc.generate_segments().unwrap();

        assert!(snap.segments_form_partition());
        assert!(snap.segments.len() >= 3);
        assert_eq!(snap.segments[1].tab, TabCoord::new(0, 3));
    }

    #[test]
    fn boundary_insert_shift_delete_keep_partition() {
        let (mut svc, _) = service_with_notes(&[(0, 0, 0, 4)]);
        svc.generate_segments().unwrap();

        let snap = svc.insert_boundary(10, Some(TabCoord::new(1, 1))).unwrap();
        assert!(snap.segments_form_partition());

        let snap = svc.shift_boundary(0, 5).unwrap();
        assert!(snap.segments_form_partition());
        assert_eq!(snap.segments[0].end, 5);
        assert_eq!(snap.segments[1].start, 5);

        let boundaries = snap.segments.len() - 1;
        let snap = svc.delete_boundary(0).unwrap();
        assert!(snap.segments_form_partition());
        assert_eq!(snap.segments.len() - 1, boundaries - 1);
    }

    #[test]
    fn shift_boundary_refuses_to_empty_a_neighbor() {
        let (mut svc, _) = service_with_notes(&[(0, 0, 0, 4)]);
        svc.generate_segments().unwrap();
        svc.insert_boundary(10, None).unwrap();

        // Segment 0 spans [0,10): its end may not move to 0.
        assert!(svc.shift_boundary(0, 0).is_err());
        assert!(svc.snapshot().segments_form_partition());
    }

    #[test]
    fn reorder_bars_moves_events_with_their_measure() {
        let (mut svc, _) = service_with_notes(&[(0, 0, 2, 4), (1, 0, FPM + 2, 4)]);
        let snap = svc.reorder_bars(1, 0).unwrap();

        // The measure-1 note now starts in measure 0, offset preserved.
        let starts: Vec<u32> = snap.notes.iter().map(|n| n.start).collect();
        assert!(starts.contains(&2));
        assert!(starts.contains(&(FPM + 2)));
        let moved = snap.notes.iter().find(|n| n.tab.string == 1).unwrap();
        assert_eq!(moved.start, 2);
    }

    #[test]
    fn reorder_to_same_index_changes_nothing() {
        let (mut svc, _) = service_with_notes(&[(0, 0, 2, 4)]);
        let before = svc.snapshot();
        let after = svc.reorder_bars(0, 0).unwrap();
        assert_eq!(before, after);
    }

    #[test]
    fn remove_bar_drops_and_shifts_events() {
        let (mut svc, _) = service_with_notes(&[(0, 0, 2, 4), (1, 0, FPM + 2, 4)]);
        svc.generate_segments().unwrap();
        let snap = svc.remove_bar(0).unwrap();

        assert_eq!(snap.notes.len(), 1);
        assert_eq!(snap.notes[0].start, 2);
        assert_eq!(snap.total_frames, 3 * FPM);
        assert!(snap.segments_form_partition());
    }

    #[test]
    fn export_import_round_trip_preserves_layout() {
        let (mut svc, ids) = service_with_notes(&[(0, 3, 0, 4), (1, 2, 0, 4), (4, 7, 20, 8)]);
        svc.make_chord(&ids[..2]).unwrap();

        let payload = svc.export();
        assert_eq!(payload.stamps.len(), 3);

        let mut other = MemoryService::new(FPM, FPS, 1);
        let snap = other.import(payload.clone()).unwrap();

        // Ids differ; positions, durations and pitches must not.
        let mut exported: Vec<(u32, u8, u8, u32)> = payload
            .stamps
            .iter()
            .map(|s| (s.time, s.tab.string, s.tab.fret, s.duration))
            .collect();
        let mut imported: Vec<(u32, u8, u8, u32)> = snap
            .notes
            .iter()
            .map(|n| (n.start, n.tab.string, n.tab.fret, n.length))
            .collect();
        exported.sort_unstable();
        imported.sort_unstable();
        assert_eq!(exported, imported);
        assert_eq!(snap.fps, FPS);
        assert_eq!(snap.frames_per_measure, FPM);
    }

    #[test]
    fn append_import_offsets_by_existing_length() {
        let (mut svc, _) = service_with_notes(&[(0, 0, 0, 4)]);
        let total_before = svc.snapshot().total_frames;

        let payload = ExportPayload {
            stamps: vec![Stamp {
                time: 0,
                tab: TabCoord::new(2, 2),
                duration: 4,
            }],
            frames_per_measure: FPM,
            fps: FPS,
            total_frames: FPM,
        };
        let snap = svc.append_import(payload).unwrap();

        assert_eq!(snap.notes.len(), 2);
        assert_eq!(snap.notes[1].start, total_before);
        assert_eq!(snap.total_frames, total_before + FPM);
    }

    #[test]
    fn import_with_bad_values_rejects_before_applying() {
        let mut svc = service();
        let before = svc.snapshot();

        let payload = ExportPayload {
            stamps: vec![Stamp {
                time: 0,
                tab: TabCoord::new(9, 0),
                duration: 4,
            }],
            frames_per_measure: FPM,
            fps: FPS,
            total_frames: FPM,
        };
        assert!(svc.import(payload).is_err());
        assert_eq!(svc.snapshot(), before);
    }
}
