//! Transport bar: play state, position, score stats, status line.

use ratatui::{
    layout::Rect,
    style::{Color, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame,
};

use super::Scene;

/// Render the transport block: one info line, one status/hint line.
pub fn render_transport(frame: &mut Frame, area: Rect, scene: &Scene) {
    let block = Block::default().title(" tabedit ").borders(Borders::ALL);

    let snapshot = scene.snapshot;
    let play_symbol = if scene.playing { "▶" } else { "■" };
    let play_state = if scene.playing { "Playing" } else { "Stopped" };

    let fpm = snapshot.frames_per_measure.max(1);
    let frame_pos = (scene.position_secs * snapshot.fps) as u32;
    let current_bar = (frame_pos / fpm + 1).min(snapshot.measure_count().max(1) as u32);

    let selected = scene.selection.notes.len() + usize::from(scene.selection.chord.is_some());

    let info = Line::from(vec![
        Span::styled(
            format!(" {} {}  ", play_symbol, play_state),
            Style::default().fg(if scene.playing {
                Color::Green
            } else {
                Color::Yellow
            }),
        ),
        Span::styled(
            format!("Bar {}/{}  ", current_bar, snapshot.measure_count()),
            Style::default().fg(Color::White),
        ),
        Span::styled(
            format!(
                "{} notes, {} chords  ",
                snapshot.notes.len(),
                snapshot.chords.len()
            ),
            Style::default().fg(Color::DarkGray),
        ),
        Span::styled(
            format!("{} conflicted  ", scene.conflict_set.len()),
            Style::default().fg(if scene.conflict_set.is_empty() {
                Color::DarkGray
            } else {
                Color::Red
            }),
        ),
        Span::styled(
            format!("{} selected", selected),
            Style::default().fg(Color::Cyan),
        ),
    ]);

    // Second line: pending draft beats status, status beats silence.
    let detail = if let Some(draft) = scene.draft {
        Line::from(Span::styled(
            format!(
                " draft note: string {} fret {} length {} | digits set fret, +/- length, Enter adds, Esc discards",
                draft.string, draft.fret, draft.length
            ),
            Style::default().fg(Color::Magenta),
        ))
    } else if let Some(status) = scene.status {
        Line::from(Span::styled(
            format!(" {status}"),
            Style::default().fg(Color::Red),
        ))
    } else {
        Line::from("")
    };

    frame.render_widget(Paragraph::new(vec![info, detail]).block(block), area);
}

/// Render the help bar.
pub fn render_help(frame: &mut Frame, area: Rect) {
    let help = Paragraph::new(
        " [Q] Quit  [Space] Preview  [Shift+Drag] Add to selection  [D] Delete  [B] Add bar  [G] Segment  [A] Apply  [E] Export  [I] Import  [Right-click strip] Split/merge",
    )
    .style(Style::default().fg(Color::DarkGray));
    frame.render_widget(help, area);
}
