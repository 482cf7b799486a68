//! Mouse hit testing: terminal cells to press targets and pointer points.
//!
//! All pointer math is relative to the lane area's origin so the controller
//! sees one consistent coordinate space regardless of which strip the press
//! landed in (the chips, lanes and segment strips share an x origin).

use ratatui::layout::Rect;

use tabedit::edit::{PointerPoint, PressTarget, SegmentEditor, TimelineView};
use tabedit::score::Snapshot;

use crate::ui::LayoutRects;

/// Whether a terminal cell falls inside a layout rect.
pub fn in_rect(rect: Rect, col: u16, row: u16) -> bool {
    col >= rect.x && col < rect.x + rect.width && row >= rect.y && row < rect.y + rect.height
}

/// The staged boundary whose handle sits under an x position, if any.
pub fn boundary_at(staged: &SegmentEditor, view: &TimelineView, x: f32) -> Option<usize> {
    (0..staged.len().saturating_sub(1)).find(|&index| {
        let handle_x = staged.staged()[index].end as f32 * view.units_per_frame;
        (x - handle_x).abs() <= 0.5
    })
}

/// Pointer position in view units, relative to the lane area.
pub fn pointer_at(lanes: Rect, col: u16, row: u16) -> PointerPoint {
    PointerPoint::new(col as f32 - lanes.x as f32, row as f32 - lanes.y as f32)
}

/// Classify a press. `None` means the press landed somewhere inert.
pub fn hit_test(
    snapshot: &Snapshot,
    staged: &SegmentEditor,
    layout: &LayoutRects,
    view: &TimelineView,
    col: u16,
    row: u16,
) -> Option<(PressTarget, PointerPoint)> {
    let pos = pointer_at(layout.lanes, col, row);

    if in_rect(layout.chips, col, row) {
        return Some((PressTarget::Bar(view.measure_at(pos.x)), pos));
    }

    if in_rect(layout.segments, col, row) {
        // Only the thin handle between two staged segments is interactive.
        if let Some(index) = boundary_at(staged, view, pos.x) {
            return Some((PressTarget::Boundary(index), pos));
        }
        return None;
    }

    if in_rect(layout.lanes, col, row) {
        let lane = view.lane_at(pos.y);
        let frame = view.frame_at(pos.x);

        for note in &snapshot.notes {
            if note.tab.string == lane && (note.start..note.end()).contains(&frame) {
                return Some((PressTarget::Note(note.id), pos));
            }
        }
        for chord in &snapshot.chords {
            if (chord.start..chord.end()).contains(&frame)
                && chord.tabs.iter().any(|tab| tab.string == lane)
            {
                return Some((PressTarget::Chord(chord.id), pos));
            }
        }
        return Some((PressTarget::Background, pos));
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use tabedit::score::{Note, NoteId, TabCoord};

    fn layout() -> LayoutRects {
        LayoutRects {
            chips: Rect::new(1, 3, 64, 1),
            lanes: Rect::new(1, 5, 64, 6),
            segments: Rect::new(1, 13, 64, 2),
        }
    }

    fn view() -> TimelineView {
        TimelineView {
            units_per_frame: 1.0,
            units_per_lane: 1.0,
            width: 64.0,
            height: 6.0,
            total_frames: 64,
            frames_per_measure: 16,
        }
    }

    fn snapshot() -> Snapshot {
        Snapshot {
            notes: vec![Note {
                id: NoteId(1),
                tab: TabCoord::new(2, 3),
                start: 8,
                length: 4,
                pitch: 53,
            }],
            frames_per_measure: 16,
            fps: 8.0,
            total_frames: 64,
            ..Default::default()
        }
    }

    #[test]
    fn press_on_note_glyph_targets_the_note() {
        let snap = snapshot();
        let staged = SegmentEditor::new();

        // Lane 2 is row 5 + 2; frame 9 is column 1 + 9.
        let (target, pos) = hit_test(&snap, &staged, &layout(), &view(), 10, 7).unwrap();
        assert_eq!(target, PressTarget::Note(NoteId(1)));
        assert_eq!(pos, PointerPoint::new(9.0, 2.0));
    }

    #[test]
    fn press_off_glyphs_is_background() {
        let snap = snapshot();
        let staged = SegmentEditor::new();

        let (target, _) = hit_test(&snap, &staged, &layout(), &view(), 40, 7).unwrap();
        assert_eq!(target, PressTarget::Background);
    }

    #[test]
    fn press_on_chip_row_targets_the_measure() {
        let snap = snapshot();
        let staged = SegmentEditor::new();

        let (target, _) = hit_test(&snap, &staged, &layout(), &view(), 1 + 20, 3).unwrap();
        assert_eq!(target, PressTarget::Bar(1));
    }

    #[test]
    fn press_outside_every_strip_is_inert() {
        let snap = snapshot();
        let staged = SegmentEditor::new();

        assert!(hit_test(&snap, &staged, &layout(), &view(), 70, 0).is_none());
    }

    #[test]
    fn press_on_segment_body_is_inert_but_handle_is_not() {
        let snap = snapshot();
        let mut staged = SegmentEditor::new();
        let with_segments = Snapshot {
            segments: vec![
                tabedit::score::Segment {
                    start: 0,
                    end: 20,
                    tab: TabCoord::new(0, 0),
                },
                tabedit::score::Segment {
                    start: 20,
                    end: 64,
                    tab: TabCoord::new(0, 0),
                },
            ],
            ..snapshot()
        };
        staged.rederive(&with_segments);

        // Column 1 + 20 sits on the staged boundary.
        let (target, _) = hit_test(&snap, &staged, &layout(), &view(), 21, 13).unwrap();
        assert_eq!(target, PressTarget::Boundary(0));

        assert!(hit_test(&snap, &staged, &layout(), &view(), 40, 13).is_none());
    }
}
