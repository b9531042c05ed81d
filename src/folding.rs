//! Component G: the folding tree.
//!
//! Folding ranges form a well-nested forest over line coordinates: any two
//! ranges are either disjoint or one strictly contains the other, never
//! partially overlapping. Each range's endpoints are ordinary
//! [`crate::cursor::CursorId`]s (with [`crate::cursor::InsertBehavior::MoveOnInsert`]
//! at the end so the fold grows to cover text typed at its boundary), so a
//! fold tracks edits the same way anything else built on cursors does — this
//! module never stores raw line numbers, only cursor ids, and asks its
//! caller (`Buffer`) to resolve them to positions when it needs to compare
//! or export them.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use slab::Slab;

use crate::cursor::{CursorId, Position};
use crate::digest::ContentDigest;
use crate::error::FoldingError;

/// Stable handle for a folding range, valid for as long as the range exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FoldId(pub(crate) usize);

/// Per-range flags. `Persistent` ranges survive an `on_edit_end` cull even
/// when their start line no longer looks like a fold start; `Folded` marks
/// whether the range is currently collapsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FoldFlags {
    pub persistent: bool,
    pub folded: bool,
}

struct FoldNode {
    start: CursorId,
    end: CursorId,
    parent: Option<FoldId>,
    children: Vec<FoldId>,
    flags: FoldFlags,
}

/// The folding tree itself. Positions are resolved lazily through a
/// caller-supplied function rather than cached here, since the buffer's
/// cursor arena is the single source of truth for where a cursor currently
/// sits.
#[derive(Default)]
pub struct FoldingManager {
    nodes: Slab<FoldNode>,
    roots: Vec<FoldId>,
}

/// Serializable snapshot of one folding range, used for export/import.
#[derive(Debug, Serialize, Deserialize, PartialEq)]
struct FoldRecord {
    start_line: usize,
    start_column: usize,
    end_line: usize,
    end_column: usize,
    persistent: bool,
    folded: bool,
    children: Vec<usize>,
}

/// A full export: the digest of the document the ranges were computed
/// against, plus the forest, flattened into a `Vec` where each record's
/// `children` are indices back into the same vec (so it round-trips without
/// needing stable ids across the wire).
#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct FoldingExport {
    digest: String,
    roots: Vec<usize>,
    records: Vec<FoldRecord>,
}

impl FoldingManager {
    pub fn new() -> Self {
        FoldingManager::default()
    }

    /// Inserts a new folding range `[start, end)`, resolving positions
    /// through `pos_of` to find where in the tree it belongs. Rejects a
    /// range that would partially overlap an existing one.
    pub fn add_range(
        &mut self,
        start: CursorId,
        end: CursorId,
        flags: FoldFlags,
        pos_of: impl Fn(CursorId) -> Position,
    ) -> Result<FoldId, FoldingError> {
        let (start_pos, end_pos) = (pos_of(start), pos_of(end));
        if start_pos >= end_pos {
            return Err(FoldingError::InvalidRange);
        }

        // Find the innermost existing range that contains [start_pos, end_pos),
        // and check every sibling at that level for a partial overlap.
        let parent = self.find_containing(self.roots.clone(), start_pos, end_pos, &pos_of)?;
        let siblings = match parent {
            Some(p) => self.nodes[p.0].children.clone(),
            None => self.roots.clone(),
        };
        for sibling in &siblings {
            let (s, e) = self.bounds(*sibling, &pos_of);
            let disjoint = end_pos <= s || start_pos >= e;
            // Well-nesting allows the candidate to sit fully inside a
            // sibling (it gets reparented under it on the next iteration of
            // `find_containing`, not reached here) or to fully contain a
            // sibling (the adoption loop below reparents the sibling under
            // the candidate instead). Only a genuine partial overlap — where
            // neither contains the other and they're not disjoint — is
            // rejected.
            let candidate_nested_in_sibling = start_pos >= s && end_pos <= e;
            let sibling_nested_in_candidate = s >= start_pos && e <= end_pos;
            if !disjoint && !candidate_nested_in_sibling && !sibling_nested_in_candidate {
                return Err(FoldingError::PartialOverlap);
            }
        }

        let id = FoldId(self.nodes.insert(FoldNode {
            start,
            end,
            parent,
            children: Vec::new(),
            flags,
        }));

        // Any sibling fully nested inside the new range becomes its child.
        let mut adopted = Vec::new();
        let mut remaining = Vec::new();
        for sibling in siblings {
            let (s, e) = self.bounds(sibling, &pos_of);
            if s >= start_pos && e <= end_pos {
                self.nodes[sibling.0].parent = Some(id);
                adopted.push(sibling);
            } else {
                remaining.push(sibling);
            }
        }
        remaining.push(id);
        remaining.sort_by_key(|r| self.bounds(*r, &pos_of).0);
        self.nodes[id.0].children = adopted;

        match parent {
            Some(p) => self.nodes[p.0].children = remaining,
            None => self.roots = remaining,
        }

        Ok(id)
    }

    fn bounds(&self, id: FoldId, pos_of: &impl Fn(CursorId) -> Position) -> (Position, Position) {
        let node = &self.nodes[id.0];
        (pos_of(node.start), pos_of(node.end))
    }

    fn find_containing(
        &self,
        candidates: Vec<FoldId>,
        start: Position,
        end: Position,
        pos_of: &impl Fn(CursorId) -> Position,
    ) -> Result<Option<FoldId>, FoldingError> {
        for c in candidates {
            let (s, e) = self.bounds(c, pos_of);
            if start >= s && end <= e {
                return self.find_containing(self.nodes[c.0].children.clone(), start, end, pos_of).map(|inner| inner.or(Some(c)));
            }
        }
        Ok(None)
    }

    /// Removes a range, promoting its children to its former parent.
    pub fn remove_range(&mut self, id: FoldId) -> Result<(), FoldingError> {
        let node = self.nodes.try_remove(id.0).ok_or(FoldingError::UnknownId(id.0 as i64))?;
        let siblings = match node.parent {
            Some(p) => &mut self.nodes[p.0].children,
            None => &mut self.roots,
        };
        siblings.retain(|&c| c != id);
        siblings.extend(node.children.iter().copied());
        for child in &node.children {
            self.nodes[child.0].parent = node.parent;
        }
        Ok(())
    }

    /// Folds `id`, per spec §4.G's `foldRange(id)`.
    pub fn fold_range(&mut self, id: FoldId) -> Result<(), FoldingError> {
        self.nodes.get_mut(id.0).ok_or(FoldingError::UnknownId(id.0 as i64))?.flags.folded = true;
        Ok(())
    }

    /// Unfolds `id`, per spec §4.G's `unfoldRange(id, remove)`: if `remove`
    /// is true, or the range isn't `Persistent`, it is also removed from the
    /// tree and its children are re-parented to its former parent. Returns
    /// whether the node was removed, so the caller (which owns the node's
    /// two endpoint cursors) knows to free them.
    pub fn unfold_range(&mut self, id: FoldId, remove: bool) -> Result<bool, FoldingError> {
        let node = self.nodes.get_mut(id.0).ok_or(FoldingError::UnknownId(id.0 as i64))?;
        node.flags.folded = false;
        if remove || !node.flags.persistent {
            self.remove_range(id)?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    pub fn is_folded(&self, id: FoldId) -> Result<bool, FoldingError> {
        Ok(self.nodes.get(id.0).ok_or(FoldingError::UnknownId(id.0 as i64))?.flags.folded)
    }

    pub fn endpoints(&self, id: FoldId) -> Option<(CursorId, CursorId)> {
        self.nodes.get(id.0).map(|n| (n.start, n.end))
    }

    /// Every folding range (at any nesting depth) whose start cursor
    /// currently resolves to `line`, in no particular order.
    pub fn folding_ranges_starting_on_line(&self, line: usize, pos_of: impl Fn(CursorId) -> Position) -> Vec<FoldId> {
        self.nodes
            .iter()
            .filter(|(_, node)| pos_of(node.start).line == line)
            .map(|(idx, _)| FoldId(idx))
            .collect()
    }

    /// The topmost folded ranges: folded ranges with no folded ancestor.
    /// Sorted and non-overlapping by construction (well-nestedness), so
    /// mapping a document line to its visible line is an `O(k)` walk over
    /// just this list rather than the whole tree.
    pub fn folded_topmost(&self, pos_of: impl Fn(CursorId) -> Position) -> Vec<(FoldId, Position, Position)> {
        let mut out = Vec::new();
        self.collect_folded_topmost(&self.roots, false, &pos_of, &mut out);
        out.sort_by_key(|(_, s, _)| *s);
        out
    }

    fn collect_folded_topmost(
        &self,
        ids: &[FoldId],
        ancestor_folded: bool,
        pos_of: &impl Fn(CursorId) -> Position,
        out: &mut Vec<(FoldId, Position, Position)>,
    ) {
        for &id in ids {
            let node = &self.nodes[id.0];
            let is_folded = node.flags.folded;
            if is_folded && !ancestor_folded {
                let (s, e) = self.bounds(id, pos_of);
                out.push((id, s, e));
            }
            self.collect_folded_topmost(&node.children, ancestor_folded || is_folded, pos_of, out);
        }
    }

    /// Maps a document line to its visible-line number, given the current
    /// set of topmost folded ranges (as produced by [`Self::folded_topmost`]).
    /// A line hidden inside a fold maps to the same visible line as the
    /// fold's start.
    pub fn line_to_visible(topmost: &[(FoldId, Position, Position)], line: usize) -> usize {
        let mut hidden = 0usize;
        for (_, start, end) in topmost {
            if start.line >= line {
                break;
            }
            if end.line <= line {
                hidden += end.line - start.line;
            } else {
                hidden += line - start.line;
            }
        }
        line - hidden
    }

    /// Inverse of [`Self::line_to_visible`]: the document line a visible
    /// line number currently refers to. Walks the sorted topmost list once,
    /// accumulating the hidden span of every fold that lies entirely before
    /// the target in visible space.
    pub fn visible_to_line(topmost: &[(FoldId, Position, Position)], visible_line: usize) -> usize {
        let mut cumulative_hidden = 0usize;
        for (_, start, end) in topmost {
            let visible_start = start.line - cumulative_hidden;
            if visible_start > visible_line + cumulative_hidden {
                break;
            }
            cumulative_hidden += end.line - start.line;
        }
        visible_line + cumulative_hidden
    }

    /// Culls ranges whose start line no longer satisfies `is_fold_start`.
    /// Non-persistent top-level-visible folds are culled immediately;
    /// nested or currently-hidden ones are left for the next time their
    /// ancestor unfolds and exposes them.
    pub fn on_edit_end(&mut self, pos_of: impl Fn(CursorId) -> Position, is_fold_start: impl Fn(usize) -> bool) {
        let topmost = self.folded_topmost(&pos_of);
        let hidden_ids: std::collections::HashSet<FoldId> = topmost.iter().map(|(id, ..)| *id).flat_map(|id| self.descendants(id)).collect();

        let mut to_cull = Vec::new();
        self.scan_for_cull(&self.roots.clone(), &pos_of, &is_fold_start, &hidden_ids, &mut to_cull);
        for id in to_cull {
            let _ = self.remove_range(id);
        }
    }

    fn descendants(&self, id: FoldId) -> Vec<FoldId> {
        let mut out = vec![id];
        let mut i = 0;
        while i < out.len() {
            out.extend(self.nodes[out[i].0].children.clone());
            i += 1;
        }
        out
    }

    fn scan_for_cull(
        &self,
        ids: &[FoldId],
        pos_of: &impl Fn(CursorId) -> Position,
        is_fold_start: &impl Fn(usize) -> bool,
        hidden: &std::collections::HashSet<FoldId>,
        out: &mut Vec<FoldId>,
    ) {
        for &id in ids {
            let node = &self.nodes[id.0];
            let start_line = pos_of(node.start).line;
            if !node.flags.persistent && !hidden.contains(&id) && !is_fold_start(start_line) {
                out.push(id);
            } else {
                self.scan_for_cull(&node.children, pos_of, is_fold_start, hidden, out);
            }
        }
    }

    /// Exports the whole tree along with `digest`, the content digest of
    /// the document it was computed against, for later validation on
    /// import.
    pub fn export(&self, digest: ContentDigest, pos_of: impl Fn(CursorId) -> Position) -> FoldingExport {
        let mut records = Vec::new();
        let mut index_of: HashMap<FoldId, usize> = HashMap::new();
        self.flatten(&self.roots.clone(), &pos_of, &mut records, &mut index_of);
        let roots = self.roots.iter().map(|id| index_of[id]).collect();
        FoldingExport {
            digest: digest.to_string(),
            roots,
            records,
        }
    }

    fn flatten(
        &self,
        ids: &[FoldId],
        pos_of: &impl Fn(CursorId) -> Position,
        records: &mut Vec<FoldRecord>,
        index_of: &mut HashMap<FoldId, usize>,
    ) {
        for &id in ids {
            let node = &self.nodes[id.0];
            let (s, e) = (pos_of(node.start), pos_of(node.end));
            self.flatten(&node.children, pos_of, records, index_of);
            let children = node.children.iter().map(|c| index_of[c]).collect();
            let idx = records.len();
            records.push(FoldRecord {
                start_line: s.line,
                start_column: s.column,
                end_line: e.line,
                end_column: e.column,
                persistent: node.flags.persistent,
                folded: node.flags.folded,
                children,
            });
            index_of.insert(id, idx);
        }
    }

    /// Imports a previously exported tree, provided `current_digest`
    /// matches the digest the export was taken against. A mismatch
    /// silently discards the import and leaves the current tree
    /// untouched, returning `false` — per the crash-recovery error policy,
    /// a stale export is not an error, just stale.
    pub fn import(
        &mut self,
        export: &FoldingExport,
        current_digest: ContentDigest,
        mut make_cursor: impl FnMut(Position) -> CursorId,
    ) -> bool {
        if export.digest != current_digest.to_string() {
            return false;
        }
        self.nodes.clear();
        self.roots.clear();
        let mut built: HashMap<usize, FoldId> = HashMap::new();
        for (idx, record) in export.records.iter().enumerate() {
            let start = make_cursor(Position::new(record.start_line, record.start_column));
            let end = make_cursor(Position::new(record.end_line, record.end_column));
            let children = record.children.iter().map(|c| built[c]).collect();
            let id = FoldId(self.nodes.insert(FoldNode {
                start,
                end,
                parent: None,
                children,
                flags: FoldFlags {
                    persistent: record.persistent,
                    folded: record.folded,
                },
            }));
            for c in &self.nodes[id.0].children {
                self.nodes[c.0].parent = Some(id);
            }
            built.insert(idx, id);
        }
        self.roots = export.roots.iter().map(|idx| built[idx]).collect();
        true
    }
}
