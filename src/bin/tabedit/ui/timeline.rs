//! Timeline widgets: bar chips, string lanes and the segment strip.
//!
//! Everything is rendered cell by cell against the same horizontal mapping
//! (cells per frame), so the three strips stay aligned and mouse hits can be
//! translated back with the inverse of the same math.

use ratatui::{
    layout::Rect,
    style::{Color, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame,
};

use tabedit::score::EventKey;
use tabedit::synth::engine::SCHEDULE_SLACK_SECS;
use tabedit::STRING_COUNT;

use super::Scene;

fn units_per_frame(width: u16, total_frames: u32) -> f32 {
    width as f32 / total_frames.max(1) as f32
}

/// One row of bar chips, aligned with the lane area below it.
pub fn render_chips(frame: &mut Frame, area: Rect, scene: &Scene) -> Rect {
    let inner = Rect {
        x: area.x + 1,
        y: area.y,
        width: area.width.saturating_sub(2),
        height: 1,
    };
    if inner.width == 0 {
        return inner;
    }

    let upf = units_per_frame(inner.width, scene.snapshot.total_frames);
    let fpm = scene.snapshot.frames_per_measure.max(1);

    let mut cells: Vec<char> = vec!['─'; inner.width as usize];
    for measure in 0..scene.snapshot.measure_count() {
        let col = ((measure as u32 * fpm) as f32 * upf).round() as usize;
        for (i, ch) in format!("▏{}", measure + 1).chars().enumerate() {
            if col + i < cells.len() {
                cells[col + i] = ch;
            }
        }
    }

    let spans: Vec<Span> = cells
        .iter()
        .enumerate()
        .map(|(x, &ch)| {
            let measure = ((x as f32 / upf) as u32 / fpm) as usize;
            let style = match scene.bar_reorder {
                Some((from, _)) if measure == from => Style::default().fg(Color::Yellow),
                Some((_, over)) if measure == over => Style::default().fg(Color::Cyan),
                _ => Style::default().fg(Color::DarkGray),
            };
            Span::styled(ch.to_string(), style)
        })
        .collect();

    frame.render_widget(Paragraph::new(Line::from(spans)), inner);
    inner
}

/// The six string lanes plus a playhead row.
pub fn render_lanes(frame: &mut Frame, area: Rect, scene: &Scene) -> Rect {
    let block = Block::default().title(" Timeline ").borders(Borders::ALL);
    let inner = block.inner(area);
    frame.render_widget(block, area);
    if inner.width == 0 || inner.height == 0 {
        return inner;
    }

    let upf = units_per_frame(inner.width, scene.snapshot.total_frames);
    let mut lines: Vec<Line> = Vec::with_capacity(STRING_COUNT + 1);

    for lane in 0..STRING_COUNT as u8 {
        let mut spans = Vec::with_capacity(inner.width as usize);
        for x in 0..inner.width {
            let frame_lo = (x as f32 / upf) as u32;
            let frame_hi = (((x + 1) as f32 / upf).ceil() as u32).max(frame_lo + 1);
            spans.push(lane_cell(scene, lane, frame_lo, frame_hi, x));
        }
        lines.push(Line::from(spans));
    }

    // Playhead row under the lanes, offset back by the scheduling slack so
    // the marker lines up with the frame actually sounding.
    let mut playhead = vec![' '; inner.width as usize];
    if scene.playing {
        let frame_pos = (scene.position_secs - SCHEDULE_SLACK_SECS).max(0.0) * scene.snapshot.fps;
        let col = (frame_pos * upf) as usize;
        if col < playhead.len() {
            playhead[col] = '▲';
        }
    }
    lines.push(Line::from(Span::styled(
        playhead.into_iter().collect::<String>(),
        Style::default().fg(Color::Yellow),
    )));

    frame.render_widget(Paragraph::new(lines), inner);
    Rect {
        height: STRING_COUNT as u16,
        ..inner
    }
}

/// Decide what one lane cell shows. Previews win over the committed model;
/// the dragged glyph travels instead of doubling up.
fn lane_cell(scene: &Scene, lane: u8, frame_lo: u32, frame_hi: u32, x: u16) -> Span<'static> {
    let overlaps = |start: u32, end: u32| start < frame_hi && frame_lo < end;

    if let Some(preview) = scene.note_preview {
        if preview.string == lane {
            if let Some(note) = scene.snapshot.note(preview.id) {
                if overlaps(preview.start, preview.start + note.length) {
                    return Span::styled("▓", Style::default().fg(Color::Cyan));
                }
            }
        }
    }
    if let Some(preview) = scene.chord_preview {
        if let Some(chord) = scene.snapshot.chord(preview.id) {
            if chord.tabs.iter().any(|tab| tab.string == lane)
                && overlaps(preview.start, preview.start + chord.length)
            {
                return Span::styled("█", Style::default().fg(Color::Cyan));
            }
        }
    }
    if let Some(draft) = scene.draft {
        if draft.string == lane && overlaps(draft.start, draft.start + draft.length) {
            return Span::styled("◆", Style::default().fg(Color::Magenta));
        }
    }

    for note in &scene.snapshot.notes {
        if note.tab.string != lane || !overlaps(note.start, note.end()) {
            continue;
        }
        if scene.note_preview.map(|p| p.id) == Some(note.id) {
            continue;
        }
        let style = if scene.conflict_set.contains(&EventKey::Note(note.id)) {
            Style::default().fg(Color::Red)
        } else if scene.selection.notes.contains(&note.id) {
            Style::default().fg(Color::Yellow)
        } else {
            Style::default().fg(Color::Green)
        };
        return Span::styled("▓", style);
    }

    for chord in &scene.snapshot.chords {
        if !overlaps(chord.start, chord.end()) {
            continue;
        }
        if scene.chord_preview.map(|p| p.id) == Some(chord.id) {
            continue;
        }
        if let Some(slot) = chord.tabs.iter().position(|tab| tab.string == lane) {
            let style = if scene
                .conflict_set
                .contains(&EventKey::ChordSlot(chord.id, slot))
            {
                Style::default().fg(Color::Red)
            } else if scene.selection.chord == Some(chord.id) {
                Style::default().fg(Color::Yellow)
            } else {
                Style::default().fg(Color::Blue)
            };
            return Span::styled("█", style);
        }
    }

    // Rubber band overlay on empty cells.
    if let Some((min, max)) = scene.rect {
        let cell_x = x as f32;
        let cell_y = lane as f32;
        if (min.x..=max.x).contains(&cell_x) && (min.y..=max.y).contains(&cell_y) {
            return Span::styled("·", Style::default().fg(Color::Cyan));
        }
    }

    let fpm = scene.snapshot.frames_per_measure.max(1);
    let crosses_measure = (frame_lo..frame_hi).any(|f| f > 0 && f % fpm == 0);
    if crosses_measure {
        return Span::styled("┊", Style::default().fg(Color::DarkGray));
    }
    Span::styled("─", Style::default().fg(Color::DarkGray))
}

/// The staged segment partition: a rail row with boundary handles and a
/// label row showing each segment's (string, fret), with `-` for a cleared
/// field awaiting re-entry.
pub fn render_segments(frame: &mut Frame, area: Rect, scene: &Scene) -> Rect {
    let block = Block::default()
        .title(" Segments (staged) ")
        .borders(Borders::ALL);
    let inner = block.inner(area);
    frame.render_widget(block, area);
    if inner.width == 0 || inner.height == 0 {
        return inner;
    }

    let upf = units_per_frame(inner.width, scene.snapshot.total_frames);

    let boundary_cols: Vec<(usize, usize)> = (0..scene.staged.len().saturating_sub(1))
        .map(|i| (i, (scene.staged[i].end as f32 * upf).round() as usize))
        .collect();

    let mut rail = Vec::with_capacity(inner.width as usize);
    for x in 0..inner.width as usize {
        if let Some((index, _)) = boundary_cols.iter().find(|(_, col)| *col == x) {
            let style = if scene.dragging_boundary == Some(*index) {
                Style::default().fg(Color::Yellow)
            } else {
                Style::default().fg(Color::White)
            };
            rail.push(Span::styled("┃", style));
        } else if scene.staged.is_empty() {
            rail.push(Span::raw(" "));
        } else {
            rail.push(Span::styled("═", Style::default().fg(Color::DarkGray)));
        }
    }

    let mut labels = vec![' '; inner.width as usize];
    for seg in scene.staged {
        let col = (seg.start as f32 * upf).round() as usize;
        let string = seg.string.map_or("-".into(), |v| v.to_string());
        let fret = seg.fret.map_or("-".into(), |v| v.to_string());
        for (i, ch) in format!("{string}/{fret}").chars().enumerate() {
            if col + i < labels.len() {
                labels[col + i] = ch;
            }
        }
    }

    let lines = vec![
        Line::from(rail),
        Line::from(Span::styled(
            labels.into_iter().collect::<String>(),
            Style::default().fg(Color::Gray),
        )),
    ];
    frame.render_widget(Paragraph::new(lines), inner);

    Rect {
        height: inner.height.min(2),
        ..inner
    }
}
