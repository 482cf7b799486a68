//! Collaborator contract.
//!
//! Every mutation is a complete request/response: the service applies the
//! whole operation and returns the full new snapshot, or rejects it and
//! leaves the previous snapshot untouched. The editor core never computes a
//! partial update itself and never merges: the latest snapshot wins.

pub mod memory;

pub use memory::MemoryService;

use serde::{Deserialize, Serialize};

use crate::score::{ChordId, NoteId, Segment, Snapshot, TabCoord};

/// Errors surfaced by a collaborator call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceError {
    /// The operation was refused; the message is shown to the user verbatim.
    Rejected(String),
    /// A bulk-import payload failed structural validation. Raised before any
    /// mutation is attempted.
    MalformedImport(String),
}

impl std::fmt::Display for ServiceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ServiceError::Rejected(msg) => write!(f, "{}", msg),
            ServiceError::MalformedImport(msg) => write!(f, "import rejected: {}", msg),
        }
    }
}

impl std::error::Error for ServiceError {}

pub type ServiceResult = Result<Snapshot, ServiceError>;

/// Fret suggestions for one note.
#[derive(Debug, Clone, Default)]
pub struct OptimalTabs {
    pub possible: Vec<TabCoord>,
    /// Positions ruled out by surrounding material.
    pub blocked: Vec<TabCoord>,
}

/// One exported sounding event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stamp {
    pub time: u32,
    pub tab: TabCoord,
    pub duration: u32,
}

/// Bulk import/export payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportPayload {
    pub stamps: Vec<Stamp>,
    pub frames_per_measure: u32,
    pub fps: f32,
    pub total_frames: u32,
}

impl ExportPayload {
    /// Parse and structurally validate a JSON payload.
    ///
    /// Validation happens here, before any mutation call: a payload missing
    /// its stamps list (or shaped wrong) never reaches the service.
    pub fn from_json(text: &str) -> Result<Self, ServiceError> {
        let value: serde_json::Value = serde_json::from_str(text)
            .map_err(|e| ServiceError::MalformedImport(format!("not valid JSON: {e}")))?;

        let object = value
            .as_object()
            .ok_or_else(|| ServiceError::MalformedImport("payload must be an object".into()))?;

        match object.get("stamps") {
            None => {
                return Err(ServiceError::MalformedImport("missing stamps list".into()));
            }
            Some(stamps) if !stamps.is_array() => {
                return Err(ServiceError::MalformedImport("stamps must be a list".into()));
            }
            Some(_) => {}
        }

        serde_json::from_value(value)
            .map_err(|e| ServiceError::MalformedImport(format!("bad payload shape: {e}")))
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).expect("payload serializes")
    }
}

/// The full collaborator surface the editor core calls.
///
/// Mutating operations return the complete new snapshot. The original system
/// serviced these over the network; the core only relies on the contract:
/// one call, one whole result, no partial application.
pub trait TabService {
    // Notes
    fn add_note(&mut self, tab: TabCoord, start: u32, length: u32) -> ServiceResult;
    fn delete_note(&mut self, id: NoteId) -> ServiceResult;
    fn assign_tab(&mut self, id: NoteId, tab: TabCoord) -> ServiceResult;
    fn set_note_start(&mut self, id: NoteId, start: u32) -> ServiceResult;
    fn set_note_length(&mut self, id: NoteId, length: u32) -> ServiceResult;
    fn note_optimals(&mut self, id: NoteId) -> Result<OptimalTabs, ServiceError>;

    // Chords
    fn make_chord(&mut self, notes: &[NoteId]) -> ServiceResult;
    fn delete_chord(&mut self, id: ChordId) -> ServiceResult;
    fn disband_chord(&mut self, id: ChordId) -> ServiceResult;
    fn set_chord_tabs(&mut self, id: ChordId, tabs: Vec<TabCoord>) -> ServiceResult;
    fn set_chord_start(&mut self, id: ChordId, start: u32) -> ServiceResult;
    fn set_chord_length(&mut self, id: ChordId, length: u32) -> ServiceResult;
    fn shift_chord_octave(&mut self, id: ChordId, direction: i8) -> ServiceResult;
    fn chord_alternatives(&mut self, id: ChordId) -> Result<Vec<Vec<TabCoord>>, ServiceError>;

    // Segments
    fn generate_segments(&mut self) -> ServiceResult;
    fn apply_segments(&mut self, segments: Vec<Segment>) -> ServiceResult;
    fn insert_boundary(&mut self, time: u32, coord: Option<TabCoord>) -> ServiceResult;
    fn shift_boundary(&mut self, index: usize, new_time: u32) -> ServiceResult;
    fn delete_boundary(&mut self, index: usize) -> ServiceResult;

    // Bars
    fn add_bars(&mut self, count: u32) -> ServiceResult;
    fn reorder_bars(&mut self, from: usize, to: usize) -> ServiceResult;
    fn remove_bar(&mut self, index: usize) -> ServiceResult;

    // Bulk I/O
    fn export(&self) -> ExportPayload;
    fn import(&mut self, payload: ExportPayload) -> ServiceResult;
    fn append_import(&mut self, payload: ExportPayload) -> ServiceResult;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_stamps_is_a_structural_error() {
        let err = ExportPayload::from_json(r#"{"frames_per_measure": 16}"#).unwrap_err();
        assert_eq!(
            err,
            ServiceError::MalformedImport("missing stamps list".into())
        );
    }

    #[test]
    fn non_list_stamps_is_a_structural_error() {
        let err = ExportPayload::from_json(r#"{"stamps": 5}"#).unwrap_err();
        assert_eq!(err, ServiceError::MalformedImport("stamps must be a list".into()));
    }

    #[test]
    fn non_object_payload_is_rejected() {
        assert!(matches!(
            ExportPayload::from_json("[1, 2, 3]"),
            Err(ServiceError::MalformedImport(_))
        ));
        assert!(matches!(
            ExportPayload::from_json("not json"),
            Err(ServiceError::MalformedImport(_))
        ));
    }

    #[test]
    fn payload_round_trips_through_json() {
        let payload = ExportPayload {
            stamps: vec![Stamp {
                time: 4,
                tab: TabCoord::new(2, 3),
                duration: 8,
            }],
            frames_per_measure: 16,
            fps: 8.0,
            total_frames: 64,
        };

        let parsed = ExportPayload::from_json(&payload.to_json()).unwrap();
        assert_eq!(parsed, payload);
    }
}
