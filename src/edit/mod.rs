//! Direct-manipulation editing: the gesture state machine and the segment
//! staging editor.
//!
//! Nothing in this module talks to the platform. The driver feeds pointer
//! positions in view units and receives either updated preview state (read
//! by the renderer only) or the result of a committed mutation sequence.

pub mod gesture;
pub mod segments;

pub use gesture::{
    ChordPreview, DraftNote, GestureController, GestureOutcome, NotePreview, PointerPoint,
    PressTarget, Selection, TimelineView, DRAG_THRESHOLD,
};
pub use segments::{ApplyError, SegmentEditor, SegmentField, StagedSegment};
