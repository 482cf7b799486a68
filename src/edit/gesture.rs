use std::collections::BTreeSet;

use crate::edit::segments::SegmentEditor;
use crate::score::{ChordId, NoteId, Snapshot, TabCoord};
use crate::service::{ServiceError, TabService};
use crate::{MAX_FRET, STRING_COUNT};

/*
Gesture State Machine
=====================

Exactly one gesture owns pointer input at a time:

            press on …
    ┌─────────────────────────────────────────────┐
    │ empty space      → RectSelecting            │
    │ note glyph       → DraggingNote             │
    │ chord glyph      → DraggingChord            │
    │ boundary handle  → DraggingSegmentBoundary  │
    │ bar chip         → ReorderingBar            │
    └─────────────────────────────────────────────┘
       Idle ──press──► <gesture> ──release──► Idle

New gestures start only from Idle, so overlapping drags cannot be expressed
at all. Pointer moves update in-memory preview state synchronously and never
block; mutations happen once, on release, and each call of a commit sequence
completes before the next is issued. The preview is destroyed on release no
matter what the service said; a failed drag snaps back on the next render
because the stale preview is simply gone.
*/

/// Pointer displacement below this (on both axes) is a click, not a drag.
pub const DRAG_THRESHOLD: f32 = 4.0;

/// A pointer position in view units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointerPoint {
    pub x: f32,
    pub y: f32,
}

impl PointerPoint {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// Mapping between view units and timeline coordinates.
///
/// Owned by the driver and rebuilt per frame; the controller only ever reads
/// it through these conversions.
#[derive(Debug, Clone, Copy)]
pub struct TimelineView {
    /// Horizontal view units per frame.
    pub units_per_frame: f32,
    /// Vertical view units per string lane.
    pub units_per_lane: f32,
    /// Drawable bounds, used to clamp the selection rectangle.
    pub width: f32,
    pub height: f32,
    pub total_frames: u32,
    pub frames_per_measure: u32,
}

impl TimelineView {
    /// The frame under an x position, rounded to whole frames and clamped
    /// to `[0, total_frames]`.
    pub fn frame_at(&self, x: f32) -> u32 {
        if self.units_per_frame <= 0.0 {
            return 0;
        }
        let frame = (x / self.units_per_frame).round();
        frame.clamp(0.0, self.total_frames as f32) as u32
    }

    /// The string lane under a y position, clamped to the six lanes.
    pub fn lane_at(&self, y: f32) -> u8 {
        if self.units_per_lane <= 0.0 {
            return 0;
        }
        let lane = (y / self.units_per_lane).floor();
        lane.clamp(0.0, (STRING_COUNT - 1) as f32) as u8
    }

    /// The measure index under an x position.
    pub fn measure_at(&self, x: f32) -> usize {
        let fpm = self.frames_per_measure.max(1);
        let count = (self.total_frames / fpm).max(1) as usize;
        ((self.frame_at(x) / fpm) as usize).min(count - 1)
    }

    pub fn clamp(&self, p: PointerPoint) -> PointerPoint {
        PointerPoint::new(p.x.clamp(0.0, self.width), p.y.clamp(0.0, self.height))
    }
}

/// What the pointer went down on. Hit testing belongs to the renderer; the
/// controller only needs the classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PressTarget {
    Background,
    Note(NoteId),
    Chord(ChordId),
    /// The handle between staged segments `i` and `i + 1`.
    Boundary(usize),
    Bar(usize),
}

/// The current selection: a set of notes, or one chord.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    pub notes: BTreeSet<NoteId>,
    pub chord: Option<ChordId>,
}

impl Selection {
    pub fn only_note(id: NoteId) -> Self {
        Self {
            notes: BTreeSet::from([id]),
            chord: None,
        }
    }

    pub fn only_chord(id: ChordId) -> Self {
        Self {
            notes: BTreeSet::new(),
            chord: Some(id),
        }
    }

    pub fn clear(&mut self) {
        self.notes.clear();
        self.chord = None;
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_empty() && self.chord.is_none()
    }

    /// The selected note when exactly one note and nothing else is selected.
    pub fn single_note(&self) -> Option<NoteId> {
        if self.chord.is_none() && self.notes.len() == 1 {
            self.notes.iter().next().copied()
        } else {
            None
        }
    }
}

/// A synthesized note awaiting fret/length confirmation.
///
/// Created by a below-threshold click on empty space; no mutation is issued
/// until the user confirms, and `validate` runs before the call so an
/// incomplete draft never reaches the collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DraftNote {
    pub string: u8,
    pub start: u32,
    pub length: u32,
    pub fret: u8,
}

impl DraftNote {
    /// Local validation, reported immediately without a service call.
    pub fn validate(&self) -> Result<(), String> {
        if (self.string as usize) >= STRING_COUNT {
            return Err(format!("string must be 0..{}", STRING_COUNT - 1));
        }
        if self.fret > MAX_FRET {
            return Err(format!("fret must be 0..{MAX_FRET}"));
        }
        if self.length == 0 {
            return Err("length must be at least one frame".into());
        }
        Ok(())
    }
}

/// Live preview of a note drag, read by the renderer only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NotePreview {
    pub id: NoteId,
    pub string: u8,
    pub start: u32,
}

/// Live preview of a chord drag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChordPreview {
    pub id: ChordId,
    pub start: u32,
}

#[derive(Debug, Clone, Copy)]
enum Gesture {
    Idle,
    RectSelecting {
        anchor: PointerPoint,
        current: PointerPoint,
        additive: bool,
    },
    DraggingNote {
        id: NoteId,
        origin_string: u8,
        origin_start: u32,
        string: u8,
        start: u32,
    },
    DraggingChord {
        id: ChordId,
        origin_start: u32,
        start: u32,
    },
    DraggingSegmentBoundary {
        index: usize,
    },
    ReorderingBar {
        from: usize,
        over: usize,
    },
}

/// Result of a release: the snapshot from the last successful call of the
/// commit sequence (if any call was issued), and the first failure (the
/// sequence stops there). Both can be present when the first of two calls
/// succeeded and the second did not.
#[derive(Debug, Default)]
pub struct GestureOutcome {
    pub snapshot: Option<Snapshot>,
    pub error: Option<ServiceError>,
}

/// The single-active-gesture interaction controller.
///
/// One owned state value, threaded through press/move/release. Callbacks
/// never reach around it through shared handles.
#[derive(Debug)]
pub struct GestureController {
    gesture: Gesture,
    selection: Selection,
    draft: Option<DraftNote>,
}

impl Default for GestureController {
    fn default() -> Self {
        Self::new()
    }
}

impl GestureController {
    pub fn new() -> Self {
        Self {
            gesture: Gesture::Idle,
            selection: Selection::default(),
            draft: None,
        }
    }

    pub fn is_idle(&self) -> bool {
        matches!(self.gesture, Gesture::Idle)
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn draft(&self) -> Option<&DraftNote> {
        self.draft.as_ref()
    }

    pub fn draft_mut(&mut self) -> Option<&mut DraftNote> {
        self.draft.as_mut()
    }

    pub fn take_draft(&mut self) -> Option<DraftNote> {
        self.draft.take()
    }

    pub fn clear_draft(&mut self) {
        self.draft = None;
    }

    /// The rubber-band rectangle, normalized to (min, max) corners.
    pub fn rect(&self) -> Option<(PointerPoint, PointerPoint)> {
        match self.gesture {
            Gesture::RectSelecting {
                anchor, current, ..
            } => Some((
                PointerPoint::new(anchor.x.min(current.x), anchor.y.min(current.y)),
                PointerPoint::new(anchor.x.max(current.x), anchor.y.max(current.y)),
            )),
            _ => None,
        }
    }

    pub fn note_preview(&self) -> Option<NotePreview> {
        match self.gesture {
            Gesture::DraggingNote {
                id, string, start, ..
            } => Some(NotePreview { id, string, start }),
            _ => None,
        }
    }

    pub fn chord_preview(&self) -> Option<ChordPreview> {
        match self.gesture {
            Gesture::DraggingChord { id, start, .. } => Some(ChordPreview { id, start }),
            _ => None,
        }
    }

    /// The in-flight bar reorder as `(from, over)`.
    pub fn bar_reorder(&self) -> Option<(usize, usize)> {
        match self.gesture {
            Gesture::ReorderingBar { from, over } => Some((from, over)),
            _ => None,
        }
    }

    pub fn dragging_boundary(&self) -> Option<usize> {
        match self.gesture {
            Gesture::DraggingSegmentBoundary { index } => Some(index),
            _ => None,
        }
    }

    /// Pointer down. Only `Idle` accepts a new gesture; any transient draft
    /// is discarded on entry.
    pub fn press(
        &mut self,
        target: PressTarget,
        pos: PointerPoint,
        additive: bool,
        snapshot: &Snapshot,
    ) {
        if !self.is_idle() {
            return;
        }
        self.draft = None;

        match target {
            PressTarget::Background => {
                self.gesture = Gesture::RectSelecting {
                    anchor: pos,
                    current: pos,
                    additive,
                };
            }
            PressTarget::Note(id) => {
                let Some(note) = snapshot.note(id) else {
                    return;
                };
                // A grabbed glyph immediately becomes the sole selection.
                self.selection = Selection::only_note(id);
                self.gesture = Gesture::DraggingNote {
                    id,
                    origin_string: note.tab.string,
                    origin_start: note.start,
                    string: note.tab.string,
                    start: note.start,
                };
            }
            PressTarget::Chord(id) => {
                let Some(chord) = snapshot.chord(id) else {
                    return;
                };
                self.selection = Selection::only_chord(id);
                self.gesture = Gesture::DraggingChord {
                    id,
                    origin_start: chord.start,
                    start: chord.start,
                };
            }
            PressTarget::Boundary(index) => {
                self.gesture = Gesture::DraggingSegmentBoundary { index };
            }
            PressTarget::Bar(index) => {
                self.gesture = Gesture::ReorderingBar {
                    from: index,
                    over: index,
                };
            }
        }
    }

    /// Pointer move: synchronous preview updates only, never a mutation.
    pub fn pointer_move(
        &mut self,
        pos: PointerPoint,
        view: &TimelineView,
        staged: &mut SegmentEditor,
    ) {
        match &mut self.gesture {
            Gesture::Idle => {}
            Gesture::RectSelecting { current, .. } => {
                *current = view.clamp(pos);
            }
            Gesture::DraggingNote { string, start, .. } => {
                *string = view.lane_at(pos.y);
                *start = view.frame_at(pos.x);
            }
            Gesture::DraggingChord { start, .. } => {
                // Chord slots sit on independent rows; only time moves.
                *start = view.frame_at(pos.x);
            }
            Gesture::DraggingSegmentBoundary { index } => {
                staged.drag_boundary(*index, view.frame_at(pos.x));
            }
            Gesture::ReorderingBar { over, .. } => {
                *over = view.measure_at(pos.x);
            }
        }
    }

    /// Pointer up: commit the gesture. The preview state is destroyed before
    /// any service call is made, so a rejected mutation leaves nothing stale
    /// behind.
    pub fn release<S: TabService + ?Sized>(
        &mut self,
        snapshot: &Snapshot,
        view: &TimelineView,
        staged: &SegmentEditor,
        service: &mut S,
    ) -> GestureOutcome {
        let gesture = std::mem::replace(&mut self.gesture, Gesture::Idle);
        let mut outcome = GestureOutcome::default();

        match gesture {
            Gesture::Idle => {}

            Gesture::RectSelecting {
                anchor,
                current,
                additive,
            } => {
                let dx = (current.x - anchor.x).abs();
                let dy = (current.y - anchor.y).abs();

                if dx < DRAG_THRESHOLD && dy < DRAG_THRESHOLD {
                    // A click: synthesize a draft note at the press location
                    // and wait for confirmation. No call yet.
                    if !additive {
                        self.selection.clear();
                    }
                    let start = view
                        .frame_at(anchor.x)
                        .min(snapshot.total_frames.saturating_sub(1));
                    self.draft = Some(DraftNote {
                        string: view.lane_at(anchor.y),
                        start,
                        length: (snapshot.frames_per_measure / 4).max(1),
                        fret: 0,
                    });
                } else {
                    let lane_lo = view.lane_at(anchor.y.min(current.y));
                    let lane_hi = view.lane_at(anchor.y.max(current.y));
                    let frame_lo = view.frame_at(anchor.x.min(current.x));
                    let frame_hi = view.frame_at(anchor.x.max(current.x));

                    let hits = snapshot.notes.iter().filter(|n| {
                        (lane_lo..=lane_hi).contains(&n.tab.string)
                            && n.start < frame_hi
                            && frame_lo < n.end()
                    });

                    if additive {
                        self.selection.notes.extend(hits.map(|n| n.id));
                    } else {
                        self.selection = Selection {
                            notes: hits.map(|n| n.id).collect(),
                            chord: None,
                        };
                    }
                }
            }

            Gesture::DraggingNote {
                id,
                origin_string,
                origin_start,
                string,
                start,
            } => {
                // Diff the preview against the origin; unchanged axes cost
                // nothing. Both changed: reassign first, then move, in order.
                if string != origin_string {
                    let fret = snapshot.note(id).map(|n| n.tab.fret).unwrap_or(0);
                    match service.assign_tab(id, TabCoord::new(string, fret)) {
                        Ok(snap) => outcome.snapshot = Some(snap),
                        Err(err) => {
                            outcome.error = Some(err);
                            return outcome;
                        }
                    }
                }
                if start != origin_start {
                    match service.set_note_start(id, start) {
                        Ok(snap) => outcome.snapshot = Some(snap),
                        Err(err) => {
                            outcome.error = Some(err);
                            return outcome;
                        }
                    }
                }
            }

            Gesture::DraggingChord {
                id,
                origin_start,
                start,
            } => {
                if start != origin_start {
                    match service.set_chord_start(id, start) {
                        Ok(snap) => outcome.snapshot = Some(snap),
                        Err(err) => outcome.error = Some(err),
                    }
                }
            }

            Gesture::DraggingSegmentBoundary { index } => {
                let committed = snapshot.segments.get(index).map(|s| s.end);
                if let Some(staged_time) = staged.boundary(index) {
                    if committed != Some(staged_time) {
                        match service.shift_boundary(index, staged_time) {
                            Ok(snap) => outcome.snapshot = Some(snap),
                            Err(err) => outcome.error = Some(err),
                        }
                    }
                }
            }

            Gesture::ReorderingBar { from, over } => {
                // Dropping on the origin chip is a no-op.
                if from != over {
                    match service.reorder_bars(from, over) {
                        Ok(snap) => outcome.snapshot = Some(snap),
                        Err(err) => outcome.error = Some(err),
                    }
                }
            }
        }

        outcome
    }

    /// Abandon the active gesture without committing anything.
    pub fn cancel(&mut self) {
        self.gesture = Gesture::Idle;
    }

    /// Delete the current single selection (one note, or the chord). Not a
    /// gesture: legal whenever the selection is non-empty, even mid-draft.
    pub fn delete_selection<S: TabService + ?Sized>(&mut self, service: &mut S) -> GestureOutcome {
        let mut outcome = GestureOutcome::default();

        let result = if let Some(chord) = self.selection.chord {
            Some(service.delete_chord(chord))
        } else {
            self.selection.single_note().map(|id| service.delete_note(id))
        };

        match result {
            Some(Ok(snap)) => {
                self.selection.clear();
                outcome.snapshot = Some(snap);
            }
            Some(Err(err)) => outcome.error = Some(err),
            None => {}
        }
        outcome
    }
}
