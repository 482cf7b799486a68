//! Canonical in-memory model of the tablature timeline.
//!
//! Everything here is plain data owned by the committed [`Snapshot`]. The
//! conflict relation is derived on demand and never stored; gesture previews
//! live in `edit` and never touch these types until a mutation commits.

pub mod conflict;
pub mod model;

pub use conflict::{conflicts, sounding_events, EventKey, SoundingEvent};
pub use model::{Chord, ChordId, Note, NoteId, Segment, Snapshot, TabCoord, TabTuning};
