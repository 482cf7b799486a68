//! TUI for tabedit
//!
//! Renders the six string lanes, the bar-chip strip, the staged segment
//! partition and a waveform scope, and reports the interactive areas back to
//! the input layer so mouse hits can be mapped onto the timeline.

mod timeline;
mod transport;
mod waveform;

use std::collections::HashSet;

use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    Frame,
};

use tabedit::edit::{ChordPreview, DraftNote, NotePreview, PointerPoint, Selection, StagedSegment};
use tabedit::score::{EventKey, Snapshot};
use tabedit::STRING_COUNT;

/// Everything the renderer reads for one frame. Preview state comes from the
/// controller and is never written back.
pub struct Scene<'a> {
    pub snapshot: &'a Snapshot,
    pub conflict_set: &'a HashSet<EventKey>,
    pub selection: &'a Selection,
    pub draft: Option<DraftNote>,
    pub note_preview: Option<NotePreview>,
    pub chord_preview: Option<ChordPreview>,
    pub rect: Option<(PointerPoint, PointerPoint)>,
    pub bar_reorder: Option<(usize, usize)>,
    pub dragging_boundary: Option<usize>,
    pub staged: &'a [StagedSegment],
    pub status: Option<&'a str>,
    pub playing: bool,
    pub position_secs: f32,
    pub audio: &'a [f32],
}

/// Interactive areas of the last rendered frame, in terminal cells.
#[derive(Debug, Clone, Copy, Default)]
pub struct LayoutRects {
    pub chips: Rect,
    pub lanes: Rect,
    pub segments: Rect,
}

/// Render one frame and report where the interactive strips ended up.
pub fn render(frame: &mut Frame, scene: &Scene) -> LayoutRects {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(4),                       // Transport + status
            Constraint::Length(1),                       // Bar chips
            Constraint::Length(STRING_COUNT as u16 + 3), // Lanes + playhead
            Constraint::Length(4),                       // Segment strip
            Constraint::Min(5),                          // Waveform
            Constraint::Length(1),                       // Help bar
        ])
        .split(frame.area());

    transport::render_transport(frame, chunks[0], scene);
    let chips = timeline::render_chips(frame, chunks[1], scene);
    let lanes = timeline::render_lanes(frame, chunks[2], scene);
    let segments = timeline::render_segments(frame, chunks[3], scene);
    waveform::render_waveform(frame, chunks[4], scene.audio, scene.playing);
    transport::render_help(frame, chunks[5]);

    LayoutRects {
        chips,
        lanes,
        segments,
    }
}
