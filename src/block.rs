//! Component B: a block — a contiguous run of lines, the unit the buffer
//! splits, merges, and binary-searches over.
//!
//! A block never knows its own global start line; the buffer maintains that
//! (see `Buffer::fix_start_lines`) so that inserting a block doesn't require
//! renumbering anything the block itself holds. What a block *does* own is
//! its lines, the set of cursors currently resolved into it, and a small
//! cache of which ranges touch which of its lines, so per-line queries (the
//! hot path for rendering and feedback dispatch) stay cheap.

use smallvec::SmallVec;

use crate::cursor::CursorId;
use crate::line::TextLine;
use crate::range::RangeId;

/// Target block size. Blocks are split once they exceed `2 * BLOCK_SIZE`
/// lines and merged with a neighbor once they fall below `BLOCK_SIZE / 2`;
/// the gap between the two thresholds (split-at-double, merge-below-half)
/// keeps a single-line insert/remove from thrashing the split/merge
/// boundary.
pub const BLOCK_SIZE: usize = 64;

/// A contiguous run of lines plus the cursors and range-cache entries
/// currently resolved into it. Indices inside a block (`line_in_block`) are
/// always relative to the start of this block, never to the buffer.
#[derive(Debug)]
pub struct Block {
    lines: Vec<TextLine>,
    /// Cursors currently resolved into this block, kept sorted by
    /// `(line_in_block, column)` so that fixups after an edit can binary
    /// search to the first affected cursor instead of scanning all of them.
    pub(crate) cursors: Vec<CursorId>,
    /// Per-line cache of ranges that are entirely contained within one line
    /// of this block. Indexed by `line_in_block`.
    cached_ranges_for_line: Vec<SmallVec<[RangeId; 2]>>,
    /// Ranges that span more than one line but stay within this block (they
    /// don't fit the per-line cache, and aren't worth a full buffer-level
    /// multi-block index entry either).
    overflow_ranges: SmallVec<[RangeId; 1]>,
}

impl Block {
    /// A fresh block holding exactly `lines`.
    pub fn new(lines: Vec<TextLine>) -> Self {
        let cached_ranges_for_line = lines.iter().map(|_| SmallVec::new()).collect();
        Block {
            lines,
            cursors: Vec::new(),
            cached_ranges_for_line,
            overflow_ranges: SmallVec::new(),
        }
    }

    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    pub fn line(&self, line_in_block: usize) -> &TextLine {
        &self.lines[line_in_block]
    }

    pub fn line_mut(&mut self, line_in_block: usize) -> &mut TextLine {
        &mut self.lines[line_in_block]
    }

    pub fn lines(&self) -> &[TextLine] {
        &self.lines
    }

    /// True once the block has grown past the split threshold.
    pub fn needs_split(&self) -> bool {
        self.lines.len() > 2 * BLOCK_SIZE
    }

    /// True once the block has shrunk past the merge threshold. The buffer
    /// only acts on this for non-terminal blocks — a single remaining block
    /// is allowed to be arbitrarily small (or empty).
    pub fn needs_merge(&self) -> bool {
        self.lines.len() < BLOCK_SIZE / 2
    }

    /// Splits this block at `at` (a line-in-block index), keeping
    /// `[0, at)` here and returning a new block holding `[at, end)`.
    /// Cursors and per-line range-cache entries for the moved lines move
    /// with them, reindexed relative to the new block's start.
    ///
    /// Caller (`Buffer`) is responsible for fixing up every cursor whose
    /// `block` field pointed at `self` and now must point at the returned
    /// block instead — this method only relocates `self`'s own bookkeeping
    /// of *which* cursors moved, returning their ids.
    pub fn split(&mut self, at: usize) -> (Block, Vec<CursorId>) {
        assert!(at <= self.lines.len(), "split point out of range");
        let moved_lines = self.lines.split_off(at);
        let moved_cache = self.cached_ranges_for_line.split_off(at);

        // This block can't itself decide which side of `at` a cursor now
        // falls on without consulting the arena for its line-in-block, so
        // it hands every cursor id it held back to the caller, which
        // re-homes each one (via `adopt_cursor`/`remove_cursor` on the two
        // halves) after checking the arena.
        let all_cursor_ids = std::mem::take(&mut self.cursors);

        let new_block = Block {
            lines: moved_lines,
            cursors: Vec::new(),
            cached_ranges_for_line: moved_cache,
            overflow_ranges: SmallVec::new(),
        };

        // Multi-line overflow ranges are conservatively left on the first
        // half; `Buffer` promotes any that now cross the new boundary into
        // the buffer-level multi-block index.

        (new_block, all_cursor_ids)
    }

    /// Appends `other`'s lines after this block's own, and absorbs its
    /// range caches. Cursor ids belonging to `other` are returned so
    /// `Buffer` can rewrite their `line_in_block` by this block's
    /// pre-merge length and re-home them here.
    pub fn merge(&mut self, other: Block) -> Vec<CursorId> {
        let offset = self.lines.len();
        self.lines.extend(other.lines);
        self.cached_ranges_for_line.extend(other.cached_ranges_for_line);
        self.overflow_ranges.extend(other.overflow_ranges);
        let _ = offset;
        other.cursors
    }

    /// Adds `cursor` to this block's sorted cursor set at the given
    /// `(line_in_block, column)` key.
    pub fn adopt_cursor(&mut self, cursor: CursorId, line_in_block: usize, column: usize, key_of: impl Fn(CursorId) -> (usize, usize)) {
        let key = (line_in_block, column);
        let pos = self.cursors.partition_point(|&c| key_of(c) < key);
        self.cursors.insert(pos, cursor);
    }

    pub fn remove_cursor(&mut self, cursor: CursorId) {
        if let Some(pos) = self.cursors.iter().position(|&c| c == cursor) {
            self.cursors.remove(pos);
        }
    }

    /// Wraps the line at `line_in_block` at `column`, inserting a new line
    /// right after it. Returns the line-in-block index of the inserted
    /// line (always `line_in_block + 1`) so `Buffer` can fix up cursors at
    /// or after that point.
    ///
    /// The new line is marked modified iff `column > 0`, or the original
    /// line was empty, or the original line was already modified; otherwise
    /// it inherits `saved_on_disk` from the original.
    /// The original line itself is only marked modified if text actually
    /// moved out of it (`column < original length`) — wrapping right at a
    /// line's end leaves that line's own flags untouched.
    pub fn wrap_line(&mut self, line_in_block: usize, column: usize) -> usize {
        let original_length = self.lines[line_in_block].length();
        let original_modified = self.lines[line_in_block].modified();
        let original_saved_on_disk = self.lines[line_in_block].saved_on_disk();

        let mut new_line = self.lines[line_in_block].split_off(column);
        if column > 0 || original_length == 0 || original_modified {
            new_line.set_modified(true);
        } else if original_saved_on_disk {
            new_line.set_saved_on_disk(true);
        }
        if column < original_length {
            self.lines[line_in_block].set_modified(true);
        }

        let insert_at = line_in_block + 1;
        self.lines.insert(insert_at, new_line);
        self.cached_ranges_for_line.insert(insert_at, SmallVec::new());
        insert_at
    }

    /// Unwraps (merges) the line at `line_in_block` into the line before
    /// it. `line_in_block` must be nonzero; merging the block's first line
    /// into the previous block's last line is `Buffer`'s job (it moves a
    /// line across the block boundary first). Returns the UTF-16 column in
    /// the surviving line where the merge point landed, so `Buffer` can
    /// place a cursor there.
    ///
    /// The merged line is modified iff either source line was non-empty and
    /// either was modified; it inherits `saved_on_disk` only when the
    /// predecessor was empty and the absorbed line was already saved on
    /// disk.
    pub fn unwrap_line(&mut self, line_in_block: usize) -> usize {
        assert!(line_in_block > 0, "unwrap_line requires a predecessor in the same block");
        let predecessor_length = self.lines[line_in_block - 1].length();
        let predecessor_modified = self.lines[line_in_block - 1].modified();
        let removed_length = self.lines[line_in_block].length();
        let removed_modified = self.lines[line_in_block].modified();
        let removed_saved_on_disk = self.lines[line_in_block].saved_on_disk();

        let removed = self.lines.remove(line_in_block);
        self.lines[line_in_block - 1].append(removed);
        self.cached_ranges_for_line.remove(line_in_block);

        let merged_modified =
            (predecessor_length > 0 && predecessor_modified) || (removed_length > 0 && (predecessor_length > 0 || removed_modified));
        self.lines[line_in_block - 1].set_modified(merged_modified);
        if predecessor_length == 0 && removed_saved_on_disk {
            self.lines[line_in_block - 1].set_saved_on_disk(true);
        }

        predecessor_length
    }

    /// Cross-block variant of [`Self::unwrap_line`]: `line_in_block` is a
    /// line just moved in from a neighboring block (see
    /// `Buffer::unwrap_line`'s block-boundary case), merging into its new
    /// predecessor at `line_in_block - 1`. The original draws a sharper line
    /// here than the in-block case: the predecessor's own modified/
    /// saved-on-disk flags are kept as-is, and `modified` is forced only
    /// when the absorbed line is non-empty — the absorbed line's own
    /// `modified` flag and the predecessor's length never enter into it,
    /// unlike [`Self::unwrap_line`]'s symmetric formula.
    pub fn unwrap_line_across_block_boundary(&mut self, line_in_block: usize) -> usize {
        assert!(line_in_block > 0, "unwrap_line_across_block_boundary requires a predecessor in the same block");
        let predecessor_length = self.lines[line_in_block - 1].length();
        let removed_length = self.lines[line_in_block].length();

        let removed = self.lines.remove(line_in_block);
        self.lines[line_in_block - 1].append(removed);
        self.cached_ranges_for_line.remove(line_in_block);

        if removed_length > 0 {
            self.lines[line_in_block - 1].set_modified(true);
        }

        predecessor_length
    }

    /// Inserts `text` into the line at `line_in_block` at `column`.
    pub fn insert_text(&mut self, line_in_block: usize, column: usize, text: &str) {
        self.lines[line_in_block].insert_text(column, text);
    }

    /// Removes `[start, end)` from the line at `line_in_block`, returning
    /// the removed text.
    pub fn remove_text(&mut self, line_in_block: usize, start: usize, end: usize) -> String {
        self.lines[line_in_block].remove_text(start, end)
    }

    /// Marks every line in this block saved-on-disk (and, by the invariant,
    /// no longer modified). Called on every block after a successful save.
    pub fn mark_all_lines_saved(&mut self) {
        for line in &mut self.lines {
            line.set_saved_on_disk(true);
        }
    }

    /// Moves this block's first line out, for `Buffer` to prepend to the
    /// previous block when `unwrap_line` targets a block boundary.
    pub fn pop_front_line(&mut self) -> TextLine {
        if !self.cached_ranges_for_line.is_empty() {
            self.cached_ranges_for_line.remove(0);
        }
        self.lines.remove(0)
    }

    /// Appends a line at the end of this block (the far side of a
    /// cross-block unwrap), returning its new `line_in_block` index.
    pub fn push_back_line(&mut self, line: TextLine) -> usize {
        self.lines.push(line);
        self.cached_ranges_for_line.push(SmallVec::new());
        self.lines.len() - 1
    }

    /// Registers `range` as touching only `line_in_block` (a single-line
    /// range). Moves it out of the overflow list first if it was already
    /// tracked there (a range can shrink from multi-line to single-line).
    pub fn cache_single_line_range(&mut self, line_in_block: usize, range: RangeId) {
        self.overflow_ranges.retain(|&r| r != range);
        let slot = &mut self.cached_ranges_for_line[line_in_block];
        if !slot.contains(&range) {
            slot.push(range);
        }
    }

    /// Registers `range` as spanning multiple lines but staying within this
    /// block, evicting it from any per-line cache slot it was in.
    pub fn cache_overflow_range(&mut self, range: RangeId) {
        for slot in &mut self.cached_ranges_for_line {
            slot.retain(|&r| r != range);
        }
        if !self.overflow_ranges.contains(&range) {
            self.overflow_ranges.push(range);
        }
    }

    pub fn uncache_range(&mut self, range: RangeId) {
        for slot in &mut self.cached_ranges_for_line {
            slot.retain(|&r| r != range);
        }
        self.overflow_ranges.retain(|&r| r != range);
    }

    /// All ranges touching `line_in_block`: the per-line cache plus every
    /// multi-line overflow range (the overflow list is small by
    /// construction, so a linear scan here is cheap).
    pub fn ranges_for_line(&self, line_in_block: usize) -> impl Iterator<Item = RangeId> + '_ {
        self.cached_ranges_for_line[line_in_block]
            .iter()
            .copied()
            .chain(self.overflow_ranges.iter().copied())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block_of(n: usize) -> Block {
        Block::new((0..n).map(|i| TextLine::new(format!("line {i}"))).collect())
    }

    #[test]
    fn wrap_then_unwrap_restores_original_text() {
        let mut b = block_of(1);
        let original = b.line(0).text().to_string();
        let split_col = 2;
        let new_idx = b.wrap_line(0, split_col);
        assert_eq!(new_idx, 1);
        assert_eq!(b.line_count(), 2);
        b.unwrap_line(1);
        assert_eq!(b.line_count(), 1);
        assert_eq!(b.line(0).text(), original);
    }

    #[test]
    fn split_moves_lines_past_the_boundary() {
        let mut b = block_of(10);
        let (tail, _moved) = b.split(6);
        assert_eq!(b.line_count(), 6);
        assert_eq!(tail.line_count(), 4);
        assert_eq!(tail.line(0).text(), "line 6");
    }

    #[test]
    fn merge_concatenates_lines_in_order() {
        let mut a = block_of(3);
        let b = block_of(2);
        a.merge(b);
        assert_eq!(a.line_count(), 5);
        assert_eq!(a.line(3).text(), "line 0");
    }

    #[test]
    fn needs_split_and_merge_thresholds() {
        let small = block_of(1);
        assert!(small.needs_merge());
        assert!(!small.needs_split());
        let big = block_of(2 * BLOCK_SIZE + 1);
        assert!(big.needs_split());
        assert!(!big.needs_merge());
    }

    #[test]
    fn range_cache_moves_between_single_and_overflow() {
        let mut b = block_of(3);
        let r = RangeId(1);
        b.cache_single_line_range(0, r);
        assert_eq!(b.ranges_for_line(0).count(), 1);
        b.cache_overflow_range(r);
        assert_eq!(b.ranges_for_line(0).count(), 1);
        assert_eq!(b.ranges_for_line(1).count(), 1);
        b.uncache_range(r);
        assert_eq!(b.ranges_for_line(0).count(), 0);
    }
}
