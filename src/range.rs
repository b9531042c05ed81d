//! Component E: ranges — a pair of owned cursors spanning text.
//!
//! A range owns its start and end cursor outright (they are not shared with
//! anything else); the pair moves together as the buffer is edited and can
//! become invalid as one well-defined unit when it degenerates to empty and
//! was configured not to allow that.

use crate::cursor::{CursorId, InsertBehavior, Position};

/// Whether a range is allowed to become empty (start == end) as a result of
/// edits, or whether it should instead be invalidated the moment that
/// happens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum EmptyBehavior {
    /// An empty range remains valid, e.g. a zero-width bookmark.
    #[default]
    AllowEmpty,
    /// The range becomes invalid as soon as start == end. A once-invalid
    /// range never revalidates itself.
    InvalidateIfEmpty,
}

/// Opaque handle into a buffer's range arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RangeId(pub(crate) usize);

/// Callback a host can attach to a range to be notified when it moves or is
/// invalidated, instead of polling. Mirrors the original's feedback-object
/// pattern, kept as a trait object so a host can close over whatever state
/// it needs (a view's selection highlight, a diagnostic's anchor, etc).
///
/// The buffer guards against feedback reentrancy: a callback that itself
/// edits the buffer sees that edit queued, not executed inline, so a single
/// edit never recurses through the same range twice (see
/// `crate::observer`).
pub trait RangeFeedback {
    /// Called after the range's start or end cursor moved because of an
    /// edit (not because of an explicit `set_range` call).
    fn on_range_moved(&mut self, _range: RangeId, _start: Position, _end: Position) {}

    /// Called once, the first time the range becomes invalid.
    fn on_range_invalid(&mut self, _range: RangeId) {}
}

/// Opaque handle to whatever a host uses to identify one view, for a
/// range's optional view affinity. The kernel never interprets this value.
pub type ViewId = u64;

/// Arena-held state for a live range. Never exposed directly.
pub(crate) struct RangeState {
    pub(crate) start: CursorId,
    pub(crate) end: CursorId,
    pub(crate) empty_behavior: EmptyBehavior,
    pub(crate) valid: bool,
    pub(crate) feedback: Option<Box<dyn RangeFeedback>>,
    /// Opaque host-defined payload (e.g. a highlight color or diagnostic
    /// id), same treatment as a line's attribute spans — the kernel stores
    /// it but never interprets it.
    pub(crate) attribute: Option<u32>,
    /// If set, this range should only be considered visible in the named
    /// view; `None` means visible in every view.
    pub(crate) view_affinity: Option<ViewId>,
    /// Rendering stack order among overlapping ranges in the same view;
    /// higher paints on top. Meaningless on its own — a host's renderer
    /// defines the scale.
    pub(crate) z_depth: i32,
}

impl RangeState {
    pub(crate) fn new(start: CursorId, end: CursorId, empty_behavior: EmptyBehavior) -> Self {
        RangeState {
            start,
            end,
            empty_behavior,
            valid: true,
            feedback: None,
            attribute: None,
            view_affinity: None,
            z_depth: 0,
        }
    }
}

/// A snapshot view of a range's current endpoints and validity, returned by
/// `Buffer::range` so hosts don't need arena access to read a range's shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RangeSnapshot {
    pub start: Position,
    pub end: Position,
    pub valid: bool,
}

impl RangeSnapshot {
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Whether `pos` falls within `[start, end)`. A degenerate (empty) range
    /// never contains anything.
    pub fn contains(&self, pos: Position) -> bool {
        !self.is_empty() && self.start <= pos && pos < self.end
    }

    /// The single line this range sits on, if it doesn't span multiple
    /// lines. Single-line ranges are cheaper for a `Block` to index.
    pub fn single_line(&self) -> Option<usize> {
        (self.start.line == self.end.line).then_some(self.start.line)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contains_excludes_end() {
        let r = RangeSnapshot {
            start: Position::new(1, 0),
            end: Position::new(1, 5),
            valid: true,
        };
        assert!(r.contains(Position::new(1, 0)));
        assert!(r.contains(Position::new(1, 4)));
        assert!(!r.contains(Position::new(1, 5)));
    }

    #[test]
    fn empty_range_contains_nothing() {
        let r = RangeSnapshot {
            start: Position::new(1, 3),
            end: Position::new(1, 3),
            valid: true,
        };
        assert!(r.is_empty());
        assert!(!r.contains(Position::new(1, 3)));
    }

    #[test]
    fn single_line_detection() {
        let r = RangeSnapshot {
            start: Position::new(1, 0),
            end: Position::new(2, 0),
            valid: true,
        };
        assert_eq!(r.single_line(), None);
        let r2 = RangeSnapshot {
            start: Position::new(1, 0),
            end: Position::new(1, 9),
            valid: true,
        };
        assert_eq!(r2.single_line(), Some(1));
    }
}

// `InsertBehavior` is re-exported here for convenience since every range's
// two cursors typically want `StayOnInsert` (start) / `MoveOnInsert` (end),
// matching a selection's usual feel.
pub use crate::cursor::InsertBehavior as RangeCursorInsertBehavior;
