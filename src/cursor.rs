//! Component D: auto-tracking cursors.
//!
//! A cursor is a (line, column) position that moves as the buffer around it
//! is edited — it is never just a plain coordinate pair. The kernel hands
//! hosts a [`CursorId`] (an arena handle, not a pointer) so that moving a
//! cursor never requires the host to re-fetch it, and so the arena can be
//! relocated freely as blocks split and merge.

use std::fmt;

/// A line/column position in UTF-16 code units, as seen from outside the
/// kernel. Internally a cursor additionally caches which block currently
/// holds it; that address is private to [`crate::buffer::Buffer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Position {
    pub line: usize,
    pub column: usize,
}

impl Position {
    pub fn new(line: usize, column: usize) -> Self {
        Position { line, column }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// How a cursor reacts when text is inserted exactly at its position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum InsertBehavior {
    /// The cursor stays put; inserted text appears after it. This is the
    /// right behavior for a cursor marking "the text that was here before",
    /// e.g. a fold boundary's far edge.
    #[default]
    StayOnInsert,
    /// The cursor moves to the end of the inserted text, as if it had been
    /// typed through. This is the right behavior for a caret a user is
    /// actively typing at.
    MoveOnInsert,
}

/// Opaque handle into a buffer's cursor arena. Stable across edits; only
/// invalidated by explicit removal of the cursor itself (plain cursors never
/// become invalid from edits the way a [`crate::range::Range`] can).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CursorId(pub(crate) usize);

/// The address and behavior the arena keeps for a live cursor. Never exposed
/// directly; hosts interact through [`CursorId`] plus `Buffer` accessor
/// methods, matching the "never a raw pointer to a block" design rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct CursorState {
    pub(crate) block: usize,
    pub(crate) line_in_block: usize,
    pub(crate) column: usize,
    pub(crate) insert_behavior: InsertBehavior,
    /// `false` once an explicit [`crate::buffer::Buffer::set_cursor_position`]
    /// targets a line outside the document's valid range — an invalid
    /// cursor's `block`/`line_in_block` are stale and must not be read until
    /// the cursor is repositioned back into range. The cursor stays out of
    /// its last block's cursor list while invalid; `Buffer` tracks it in a
    /// buffer-level invalid-cursor set instead.
    pub(crate) valid: bool,
}

impl CursorState {
    pub(crate) fn new(block: usize, line_in_block: usize, column: usize, insert_behavior: InsertBehavior) -> Self {
        CursorState {
            block,
            line_in_block,
            column,
            insert_behavior,
            valid: true,
        }
    }
}
