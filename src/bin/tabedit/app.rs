//! tabedit - application wiring and event loop
//!
//! One thread owns everything except the audio callback: gestures, mutation
//! dispatch and rendering all run here. The preview engine sits behind a
//! mutex shared with the cpal stream, the same split the audio thread gets
//! in the rest of the stack.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use color_eyre::eyre::Result as EyreResult;
use crossterm::event::{
    self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers, MouseButton, MouseEvent,
    MouseEventKind,
};
use ratatui::DefaultTerminal;
use rtrb::{Consumer, RingBuffer};

use tabedit::edit::{GestureController, GestureOutcome, SegmentEditor, TimelineView};
use tabedit::score::{conflicts, sounding_events, EventKey, Snapshot, TabCoord, TabTuning};
use tabedit::service::{ExportPayload, MemoryService, ServiceError, TabService};
use tabedit::synth::PluckEngine;
use tabedit::MAX_FRET;

use crate::audio;
use crate::input;
use crate::ui::{self, LayoutRects, Scene};

/// Samples kept for the waveform row.
const VIS_BUFFER_SIZE: usize = 512;
/// Ring buffer between the audio callback and the UI.
const TAP_CAPACITY: usize = 8192;

const EXPORT_PATH: &str = "tabedit_export.json";

pub struct EditorApp {
    service: MemoryService,
    snapshot: Snapshot,
    conflict_set: HashSet<EventKey>,
    controller: GestureController,
    segments: SegmentEditor,
    tuning: TabTuning,

    engine: Arc<Mutex<PluckEngine>>,
    /// Keeps the output stream alive; `None` when no device was found.
    _stream: Option<cpal::Stream>,
    audio_rx: Consumer<f32>,
    audio_buffer: Vec<f32>,

    layout: LayoutRects,
    status: Option<String>,
    should_quit: bool,
}

impl EditorApp {
    pub fn new() -> EyreResult<Self> {
        let (tap_tx, tap_rx) = RingBuffer::<f32>::new(TAP_CAPACITY);

        // A missing output device degrades to a silent editor rather than
        // refusing to start.
        let (stream, engine, status) = match audio::start(tap_tx) {
            Ok((stream, engine)) => (Some(stream), engine, None),
            Err(err) => (
                None,
                Arc::new(Mutex::new(PluckEngine::new(audio::FALLBACK_SAMPLE_RATE))),
                Some(format!("audio unavailable: {err}")),
            ),
        };

        let mut service = MemoryService::new(16, 8.0, 4);
        seed_score(&mut service)?;
        let snapshot = service.snapshot();

        let mut app = Self {
            service,
            snapshot: Snapshot::default(),
            conflict_set: HashSet::new(),
            controller: GestureController::new(),
            segments: SegmentEditor::new(),
            tuning: TabTuning::standard(),

            engine,
            _stream: stream,
            audio_rx: tap_rx,
            audio_buffer: vec![0.0; VIS_BUFFER_SIZE],

            layout: LayoutRects::default(),
            status,
            should_quit: false,
        };
        app.apply_snapshot(snapshot);
        Ok(app)
    }

    /// Run the event loop: render, then poll input at ~60fps.
    pub fn run(&mut self, terminal: &mut DefaultTerminal) -> EyreResult<()> {
        while !self.should_quit {
            self.poll_audio();

            let mut layout = self.layout;
            terminal.draw(|frame| {
                layout = ui::render(frame, &self.scene());
            })?;
            self.layout = layout;

            if event::poll(Duration::from_millis(16))? {
                match event::read()? {
                    Event::Key(key) if key.kind == KeyEventKind::Press => self.handle_key(key),
                    Event::Mouse(mouse) => self.handle_mouse(mouse),
                    _ => {}
                }
            }
        }

        Ok(())
    }

    fn scene(&self) -> Scene<'_> {
        let (playing, position_secs) = {
            let engine = self.engine.lock().unwrap();
            (engine.is_playing(), engine.position_secs())
        };

        Scene {
            snapshot: &self.snapshot,
            conflict_set: &self.conflict_set,
            selection: self.controller.selection(),
            draft: self.controller.draft().copied(),
            note_preview: self.controller.note_preview(),
            chord_preview: self.controller.chord_preview(),
            rect: self.controller.rect(),
            bar_reorder: self.controller.bar_reorder(),
            dragging_boundary: self.controller.dragging_boundary(),
            staged: self.segments.staged(),
            status: self.status.as_deref(),
            playing,
            position_secs,
            audio: &self.audio_buffer,
        }
    }

    /// View mapping for the current lane area: one terminal cell per unit.
    fn view(&self) -> TimelineView {
        let width = self.layout.lanes.width.max(1) as f32;
        TimelineView {
            units_per_frame: width / self.snapshot.total_frames.max(1) as f32,
            units_per_lane: 1.0,
            width,
            height: self.layout.lanes.height.max(1) as f32,
            total_frames: self.snapshot.total_frames,
            frames_per_measure: self.snapshot.frames_per_measure,
        }
    }

    /// Replace the committed model wholesale and re-derive everything that
    /// hangs off it: the conflict set and the segment staging copy.
    fn apply_snapshot(&mut self, snapshot: Snapshot) {
        self.conflict_set = conflicts(&sounding_events(&snapshot.notes, &snapshot.chords));
        self.segments.rederive(&snapshot);
        self.snapshot = snapshot;
    }

    fn handle_outcome(&mut self, outcome: GestureOutcome) {
        if let Some(snapshot) = outcome.snapshot {
            self.apply_snapshot(snapshot);
        }
        if let Some(error) = outcome.error {
            self.status = Some(error.to_string());
        }
    }

    fn commit<F>(&mut self, call: F)
    where
        F: FnOnce(&mut Self) -> Result<Snapshot, ServiceError>,
    {
        match call(self) {
            Ok(snapshot) => {
                self.status = None;
                self.apply_snapshot(snapshot);
            }
            Err(error) => self.status = Some(error.to_string()),
        }
    }

    fn handle_mouse(&mut self, mouse: MouseEvent) {
        let view = self.view();
        match mouse.kind {
            MouseEventKind::Down(MouseButton::Left) => {
                let hit = input::hit_test(
                    &self.snapshot,
                    &self.segments,
                    &self.layout,
                    &view,
                    mouse.column,
                    mouse.row,
                );
                if let Some((target, pos)) = hit {
                    let additive = mouse.modifiers.contains(KeyModifiers::SHIFT);
                    self.status = None;
                    self.controller.press(target, pos, additive, &self.snapshot);
                }
            }
            MouseEventKind::Drag(MouseButton::Left) => {
                let pos = input::pointer_at(self.layout.lanes, mouse.column, mouse.row);
                self.controller.pointer_move(pos, &view, &mut self.segments);
            }
            MouseEventKind::Up(MouseButton::Left) => {
                let outcome =
                    self.controller
                        .release(&self.snapshot, &view, &self.segments, &mut self.service);
                self.handle_outcome(outcome);
            }
            // Right-click on the segment strip: merge at a handle, split
            // anywhere else.
            MouseEventKind::Down(MouseButton::Right) => {
                if input::in_rect(self.layout.segments, mouse.column, mouse.row) {
                    let pos = input::pointer_at(self.layout.lanes, mouse.column, mouse.row);
                    match input::boundary_at(&self.segments, &view, pos.x) {
                        Some(index) => self.commit(move |app| app.service.delete_boundary(index)),
                        None => {
                            let time = view.frame_at(pos.x);
                            self.commit(move |app| app.service.insert_boundary(time, None));
                        }
                    }
                }
            }
            _ => {}
        }
    }

    fn handle_key(&mut self, key: KeyEvent) {
        // Draft confirmation keys take precedence while a draft is pending.
        if self.controller.draft().is_some() {
            match key.code {
                KeyCode::Char(c @ '0'..='9') => {
                    if let Some(draft) = self.controller.draft_mut() {
                        let digit = (c as u8 - b'0') as u32;
                        let combined = draft.fret as u32 * 10 + digit;
                        draft.fret = if combined <= MAX_FRET as u32 {
                            combined as u8
                        } else {
                            digit as u8
                        };
                    }
                    return;
                }
                KeyCode::Char('+') | KeyCode::Char('=') => {
                    if let Some(draft) = self.controller.draft_mut() {
                        draft.length += 1;
                    }
                    return;
                }
                KeyCode::Char('-') => {
                    if let Some(draft) = self.controller.draft_mut() {
                        draft.length = draft.length.saturating_sub(1).max(1);
                    }
                    return;
                }
                KeyCode::Enter => {
                    self.confirm_draft();
                    return;
                }
                KeyCode::Esc => {
                    self.controller.clear_draft();
                    return;
                }
                _ => {}
            }
        }

        match key.code {
            KeyCode::Char('q') | KeyCode::Char('Q') | KeyCode::Esc => self.should_quit = true,
            KeyCode::Char(' ') => self.toggle_playback(),
            KeyCode::Delete | KeyCode::Backspace | KeyCode::Char('d') => {
                let outcome = self.controller.delete_selection(&mut self.service);
                self.handle_outcome(outcome);
            }
            KeyCode::Char('b') => self.commit(|app| app.service.add_bars(1)),
            KeyCode::Char('g') => self.commit(|app| app.service.generate_segments()),
            KeyCode::Char('a') => self.apply_staged_segments(),
            KeyCode::Char('e') => self.export_to_file(),
            KeyCode::Char('i') => self.import_from_file(false),
            KeyCode::Char('I') => self.import_from_file(true),
            _ => {}
        }
    }

    fn confirm_draft(&mut self) {
        let Some(draft) = self.controller.draft().copied() else {
            return;
        };
        // Local validation: an incomplete draft never reaches the service.
        if let Err(message) = draft.validate() {
            self.status = Some(message);
            return;
        }

        self.controller.clear_draft();
        self.commit(move |app| {
            app.service
                .add_note(TabCoord::new(draft.string, draft.fret), draft.start, draft.length)
        });
    }

    fn apply_staged_segments(&mut self) {
        match self.segments.to_apply() {
            Ok(list) => self.commit(move |app| app.service.apply_segments(list)),
            // Field-level failure: reported immediately, no call issued.
            Err(error) => self.status = Some(error.to_string()),
        }
    }

    fn toggle_playback(&mut self) {
        let mut engine = self.engine.lock().unwrap();
        if engine.is_playing() {
            engine.stop();
        } else {
            engine.play(
                &self.snapshot.notes,
                &self.snapshot.chords,
                &self.conflict_set,
                self.snapshot.fps,
                Some(&self.tuning),
            );
        }
    }

    fn export_to_file(&mut self) {
        let payload = self.service.export();
        self.status = match std::fs::write(EXPORT_PATH, payload.to_json()) {
            Ok(()) => Some(format!("exported to {EXPORT_PATH}")),
            Err(err) => Some(format!("export failed: {err}")),
        };
    }

    fn import_from_file(&mut self, append: bool) {
        let text = match std::fs::read_to_string(EXPORT_PATH) {
            Ok(text) => text,
            Err(err) => {
                self.status = Some(format!("cannot read {EXPORT_PATH}: {err}"));
                return;
            }
        };

        // Structural validation happens before any mutation call.
        match ExportPayload::from_json(&text) {
            Ok(payload) => self.commit(move |app| {
                if append {
                    app.service.append_import(payload)
                } else {
                    app.service.import(payload)
                }
            }),
            Err(error) => self.status = Some(error.to_string()),
        }
    }

    /// Drain the audio tap, keeping the freshest samples for the waveform.
    fn poll_audio(&mut self) {
        let mut new_samples = Vec::new();
        while let Ok(sample) = self.audio_rx.pop() {
            new_samples.push(sample);
        }

        if !new_samples.is_empty() {
            self.audio_buffer.extend(new_samples);
            if self.audio_buffer.len() > VIS_BUFFER_SIZE {
                let excess = self.audio_buffer.len() - VIS_BUFFER_SIZE;
                self.audio_buffer.drain(0..excess);
            }
        }
    }
}

/// Seed the reference service with a small riff so the editor opens onto
/// something draggable.
fn seed_score(service: &mut MemoryService) -> EyreResult<()> {
    for &(string, fret, start, length) in &[
        (0u8, 3u8, 0u32, 4u32),
        (2, 2, 4, 4),
        (3, 2, 8, 4),
        (2, 0, 12, 4),
        (0, 3, 16, 8),
        (4, 3, 24, 4),
        (5, 3, 28, 4),
    ] {
        service.add_note(TabCoord::new(string, fret), start, length)?;
    }

    // One strummed chord near the end.
    let mut members = Vec::new();
    for &(string, fret) in &[(1u8, 2u8), (2, 2), (3, 1)] {
        let snap = service.add_note(TabCoord::new(string, fret), 32, 8)?;
        members.push(snap.notes.last().expect("note was just added").id);
    }
    service.make_chord(&members)?;
    service.generate_segments()?;
    Ok(())
}
