use crate::score::{Segment, Snapshot, TabCoord};
use crate::{MAX_FRET, STRING_COUNT};

/// Which field of a staged segment failed apply-time validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentField {
    String,
    Fret,
}

impl std::fmt::Display for SegmentField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SegmentField::String => write!(f, "string"),
            SegmentField::Fret => write!(f, "fret"),
        }
    }
}

/// Field-level validation error raised before a bulk apply.
///
/// Reported immediately; no collaborator call is issued for an invalid
/// staging list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ApplyError {
    pub index: usize,
    pub field: SegmentField,
}

impl std::fmt::Display for ApplyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "segment {} is missing a valid {}", self.index, self.field)
    }
}

impl std::error::Error for ApplyError {}

/// One segment in the staging copy.
///
/// The coordinate fields are free-form: the user may clear either one while
/// editing and the gap only becomes an error at apply time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StagedSegment {
    pub start: u32,
    pub end: u32,
    pub string: Option<u8>,
    pub fret: Option<u8>,
}

/// Editable staging copy of the committed segment partition.
///
/// Derived from the snapshot and re-derived (discarding any un-applied
/// local edits) every time a new snapshot arrives. Edits here never touch
/// the committed model; they reach it through `apply_segments` or
/// `shift_boundary` on the collaborator.
#[derive(Debug, Default)]
pub struct SegmentEditor {
    staged: Vec<StagedSegment>,
}

impl SegmentEditor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_snapshot(snapshot: &Snapshot) -> Self {
        let mut editor = Self::new();
        editor.rederive(snapshot);
        editor
    }

    /// Full replace from the committed partition. Local edits are discarded.
    pub fn rederive(&mut self, snapshot: &Snapshot) {
        self.staged = snapshot
            .segments
            .iter()
            .map(|seg| StagedSegment {
                start: seg.start,
                end: seg.end,
                string: Some(seg.tab.string),
                fret: Some(seg.tab.fret),
            })
            .collect();
    }

    pub fn staged(&self) -> &[StagedSegment] {
        &self.staged
    }

    pub fn len(&self) -> usize {
        self.staged.len()
    }

    pub fn is_empty(&self) -> bool {
        self.staged.is_empty()
    }

    pub fn set_string(&mut self, index: usize, string: Option<u8>) {
        if let Some(seg) = self.staged.get_mut(index) {
            seg.string = string;
        }
    }

    pub fn set_fret(&mut self, index: usize, fret: Option<u8>) {
        if let Some(seg) = self.staged.get_mut(index) {
            seg.fret = fret;
        }
    }

    /// The staged time of the boundary between segments `index` and
    /// `index + 1`, if that boundary exists.
    pub fn boundary(&self, index: usize) -> Option<u32> {
        if index + 1 < self.staged.len() {
            Some(self.staged[index].end)
        } else {
            None
        }
    }

    /// Drag the boundary between `index` and `index + 1` to `new_time`.
    ///
    /// The time is clamped so both neighbors keep at least one frame, then
    /// written symmetrically to `staged[index].end` and
    /// `staged[index + 1].start`. Only the staging copy moves; the committed
    /// partition is untouched until the gesture's release commits.
    pub fn drag_boundary(&mut self, index: usize, new_time: u32) {
        if index + 1 >= self.staged.len() {
            return;
        }

        let lo = self.staged[index].start + 1;
        let hi = self.staged[index + 1].end.saturating_sub(1);
        let clamped = new_time.clamp(lo, hi.max(lo));

        self.staged[index].end = clamped;
        self.staged[index + 1].start = clamped;
    }

    /// Validate every staged segment and produce the list to send in a bulk
    /// apply. Fails with the index and field of the first incomplete entry.
    pub fn to_apply(&self) -> Result<Vec<Segment>, ApplyError> {
        self.staged
            .iter()
            .enumerate()
            .map(|(index, seg)| {
                let string = seg
                    .string
                    .filter(|&s| (s as usize) < STRING_COUNT)
                    .ok_or(ApplyError {
                        index,
                        field: SegmentField::String,
                    })?;
                let fret = seg.fret.filter(|&f| f <= MAX_FRET).ok_or(ApplyError {
                    index,
                    field: SegmentField::Fret,
                })?;
                Ok(Segment {
                    start: seg.start,
                    end: seg.end,
                    tab: TabCoord::new(string, fret),
                })
            })
            .collect()
    }

    /// True when the staged list is still a contiguous partition.
    pub fn partition_holds(&self, total_frames: u32) -> bool {
        if self.staged.is_empty() {
            return true;
        }
        let mut cursor = 0u32;
        for seg in &self.staged {
            if seg.start != cursor || seg.end <= seg.start {
                return false;
            }
            cursor = seg.end;
        }
        cursor == total_frames
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(boundaries: &[u32], total: u32) -> Snapshot {
        let mut segments = Vec::new();
        let mut cursor = 0;
        for &b in boundaries {
            segments.push(Segment {
                start: cursor,
                end: b,
                tab: TabCoord::new(0, 0),
            });
            cursor = b;
        }
        segments.push(Segment {
            start: cursor,
            end: total,
            tab: TabCoord::new(0, 0),
        });

        Snapshot {
            segments,
            frames_per_measure: 16,
            fps: 8.0,
            total_frames: total,
            ..Default::default()
        }
    }

    #[test]
    fn rederive_discards_local_edits() {
        let snap = snapshot(&[20], 64);
        let mut editor = SegmentEditor::from_snapshot(&snap);

        editor.set_fret(0, Some(9));
        editor.drag_boundary(0, 30);

        editor.rederive(&snap);
        assert_eq!(editor.staged()[0].fret, Some(0));
        assert_eq!(editor.staged()[0].end, 20);
    }

    #[test]
    fn drag_clamps_to_keep_neighbors_nonempty() {
        let snap = snapshot(&[20], 64);
        let mut editor = SegmentEditor::from_snapshot(&snap);

        // Far left: clamps to start + 1.
        editor.drag_boundary(0, 0);
        assert_eq!(editor.staged()[0].end, 1);
        assert_eq!(editor.staged()[1].start, 1);
        assert!(editor.partition_holds(64));

        // Far right: clamps to end - 1.
        editor.drag_boundary(0, 1000);
        assert_eq!(editor.staged()[0].end, 63);
        assert_eq!(editor.staged()[1].start, 63);
        assert!(editor.partition_holds(64));
    }

    #[test]
    fn partition_survives_any_drag_sequence() {
        let snap = snapshot(&[10, 20, 40], 64);
        let mut editor = SegmentEditor::from_snapshot(&snap);

        for (index, time) in [(0usize, 15u32), (2, 21), (1, 19), (0, 1), (2, 63)] {
            editor.drag_boundary(index, time);
            assert!(
                editor.partition_holds(64),
                "partition broke after dragging boundary {index} to {time}"
            );
        }
    }

    #[test]
    fn drag_on_missing_boundary_is_ignored() {
        let snap = snapshot(&[], 64);
        let mut editor = SegmentEditor::from_snapshot(&snap);

        editor.drag_boundary(0, 10);
        assert_eq!(editor.staged()[0].end, 64);
        assert_eq!(editor.boundary(0), None);
    }

    #[test]
    fn apply_requires_both_coordinate_fields() {
        let snap = snapshot(&[20], 64);
        let mut editor = SegmentEditor::from_snapshot(&snap);

        editor.set_string(1, None);
        let err = editor.to_apply().unwrap_err();
        assert_eq!(
            err,
            ApplyError {
                index: 1,
                field: SegmentField::String
            }
        );

        editor.set_string(1, Some(3));
        editor.set_fret(0, None);
        let err = editor.to_apply().unwrap_err();
        assert_eq!(
            err,
            ApplyError {
                index: 0,
                field: SegmentField::Fret
            }
        );

        editor.set_fret(0, Some(2));
        let applied = editor.to_apply().unwrap();
        assert_eq!(applied.len(), 2);
        assert_eq!(applied[1].tab, TabCoord::new(3, 0));
    }

    #[test]
    fn apply_rejects_out_of_range_values() {
        let snap = snapshot(&[], 64);
        let mut editor = SegmentEditor::from_snapshot(&snap);

        editor.set_string(0, Some(6));
        assert_eq!(
            editor.to_apply().unwrap_err().field,
            SegmentField::String
        );
    }
}
