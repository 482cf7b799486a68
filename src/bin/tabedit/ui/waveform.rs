//! Waveform scope for the preview output.

use ratatui::{
    layout::Rect,
    style::{Color, Style},
    symbols,
    widgets::{Axis, Block, Borders, Chart, Dataset, GraphType},
    Frame,
};

/// Render the scope. The buffer holds the freshest samples from the audio
/// tap; it is downsampled to roughly two points per column.
pub fn render_waveform(frame: &mut Frame, area: Rect, audio_buffer: &[f32], playing: bool) {
    let block = Block::default().title(" Preview ").borders(Borders::ALL);

    let max_points = (area.width as usize).saturating_mul(2).max(1);
    let step = (audio_buffer.len() / max_points).max(1);

    let data: Vec<(f64, f64)> = audio_buffer
        .iter()
        .step_by(step)
        .enumerate()
        .map(|(i, &sample)| (i as f64, sample as f64))
        .collect();

    let color = if playing { Color::Cyan } else { Color::DarkGray };
    let dataset = Dataset::default()
        .marker(symbols::Marker::Braille)
        .graph_type(GraphType::Line)
        .style(Style::default().fg(color))
        .data(&data);

    let chart = Chart::new(vec![dataset])
        .block(block)
        .x_axis(
            Axis::default()
                .bounds([0.0, data.len().saturating_sub(1).max(1) as f64])
                .style(Style::default().fg(Color::DarkGray)),
        )
        .y_axis(
            Axis::default()
                .bounds([-1.0, 1.0])
                .style(Style::default().fg(Color::DarkGray)),
        );

    frame.render_widget(chart, area);
}
