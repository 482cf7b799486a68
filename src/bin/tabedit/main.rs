//! tabedit - terminal tablature editor
//!
//! Run with: cargo run

mod app;
mod audio;
mod input;
mod ui;

use app::EditorApp;

fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;

    let mut terminal = ratatui::init();
    crossterm::execute!(std::io::stdout(), crossterm::event::EnableMouseCapture)?;

    let result = EditorApp::new().and_then(|mut app| app.run(&mut terminal));

    let _ = crossterm::execute!(std::io::stdout(), crossterm::event::DisableMouseCapture);
    ratatui::restore();
    result
}
