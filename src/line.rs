//! Component A: a single line of text and its attributes.
//!
//! A `TextLine` owns its text plus the handful of per-line flags the rest of
//! the kernel needs: whether the line has been touched since the last save,
//! and the end-of-line marker it was loaded with (so a mixed-line-ending file
//! can be round-tripped without normalizing it).

use unicode_segmentation::UnicodeSegmentation;

/// End-of-line convention a line was loaded with, or that new lines inherit
/// from [`crate::config::BufferConfig::default_eol`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum EndOfLine {
    /// `\n`
    #[default]
    Unix,
    /// `\r\n`
    Windows,
    /// `\r` (legacy Mac)
    Mac,
}

impl EndOfLine {
    /// The literal terminator bytes, for save and swap-journal encoding.
    pub fn as_str(self) -> &'static str {
        match self {
            EndOfLine::Unix => "\n",
            EndOfLine::Windows => "\r\n",
            EndOfLine::Mac => "\r",
        }
    }
}

/// An opaque, host-defined attribute attached to a column span of a line.
/// The kernel never interprets `tag` — syntax highlighting, spell-check
/// squiggles, and similar out-of-kernel concerns are the only things that
/// assign it meaning. Kept as a flat `Vec` per line rather
/// than a fancier interval structure since a single line's attribute count
/// is small and the common case is "no attributes at all".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttributeSpan {
    pub start_column: usize,
    pub end_column: usize,
    pub tag: u32,
}

/// A single line's text plus its dirty/eol/attribute metadata. Lines never
/// contain the line terminator itself; termination is implied by position
/// (all lines but the last are terminated) or recorded separately when
/// saving.
#[derive(Debug, Clone, PartialEq)]
pub struct TextLine {
    text: String,
    /// Set whenever the line's text changes; cleared by a save pass (see
    /// [`crate::buffer::Buffer::save`]), which also sets [`Self::saved_on_disk`].
    /// Drives the swap journal's "only record touched lines" behavior and
    /// the save path's minimal-diff bookkeeping.
    modified: bool,
    /// True if this exact content was written to disk at some revision.
    /// `modified ⇒ ¬saved_on_disk` holds immediately after any save pass
    /// clears `modified` and sets this — but the two flags are
    /// independent the rest of the time (a freshly split line inherits
    /// `saved_on_disk` from its parent without itself being `modified`; see
    /// [`crate::block::Block::wrap_line`]).
    saved_on_disk: bool,
    /// Whether this line contributed a terminator other than the buffer's
    /// default when it was loaded (e.g. a lone `\r\n` line inside an
    /// otherwise Unix file).
    eol: EndOfLine,
    attributes: Vec<AttributeSpan>,
}

impl TextLine {
    /// Builds a fresh, unmodified line. Used for newly split lines on
    /// `wrapLine`, where the new line inherits its predecessor's modified
    /// flag and eol explicitly rather than defaulting them, so this
    /// constructor deliberately leaves both at their "never touched" default
    /// and callers override as needed.
    pub fn new(text: impl Into<String>) -> Self {
        TextLine {
            text: text.into(),
            modified: false,
            saved_on_disk: false,
            eol: EndOfLine::default(),
            attributes: Vec::new(),
        }
    }

    /// Builds a line carrying a specific eol, used when loading a file whose
    /// lines don't all share one terminator.
    pub fn with_eol(text: impl Into<String>, eol: EndOfLine) -> Self {
        TextLine {
            text: text.into(),
            modified: false,
            saved_on_disk: false,
            eol,
            attributes: Vec::new(),
        }
    }

    /// The line's text, excluding any terminator.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Length in UTF-16 code units, matching the column space the rest of the
    /// kernel addresses lines in (per the design notes: columns are UTF-16
    /// offsets, matching a host UI's likely text-layout API).
    pub fn length(&self) -> usize {
        self.text.encode_utf16().count()
    }

    /// True if the line has no characters at all. Distinguished from a
    /// whitespace-only line for the end-of-file-terminator policy (see
    /// [`crate::codec`]).
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    pub fn modified(&self) -> bool {
        self.modified
    }

    /// Setting `modified` to `true` clears `saved_on_disk` in the same
    /// step, maintaining the invariant `modified ⇒ ¬saved_on_disk`.
    pub fn set_modified(&mut self, modified: bool) {
        self.modified = modified;
        if modified {
            self.saved_on_disk = false;
        }
    }

    pub fn saved_on_disk(&self) -> bool {
        self.saved_on_disk
    }

    /// Setting `saved_on_disk` to `true` clears `modified` in the same
    /// step; this is how a save pass commits a line (see
    /// [`crate::buffer::Buffer::save`]).
    pub fn set_saved_on_disk(&mut self, saved_on_disk: bool) {
        self.saved_on_disk = saved_on_disk;
        if saved_on_disk {
            self.modified = false;
        }
    }

    pub fn eol(&self) -> EndOfLine {
        self.eol
    }

    pub fn set_eol(&mut self, eol: EndOfLine) {
        self.eol = eol;
    }

    pub fn attributes(&self) -> &[AttributeSpan] {
        &self.attributes
    }

    /// Replaces the attribute span list wholesale. Hosts (syntax
    /// highlighting, spell-check) own the meaning of `tag`; the kernel only
    /// stores and shifts these spans as text moves around them.
    pub fn set_attributes(&mut self, attributes: Vec<AttributeSpan>) {
        self.attributes = attributes;
    }

    /// The UTF-16 column of the first non-whitespace character, or `None`
    /// if the line is empty or entirely whitespace. This operation itself
    /// can't go out of range; an `InvalidIndex` only arises if the caller
    /// misuses the result on an out-of-range column elsewhere.
    pub fn first_non_whitespace_column(&self) -> Option<usize> {
        let mut column = 0usize;
        for ch in self.text.chars() {
            if !ch.is_whitespace() {
                return Some(column);
            }
            column += ch.len_utf16();
        }
        None
    }

    /// Truncates the line to `[0, column)`, discarding the rest (and any
    /// attribute spans that started at or past it). Marks the line
    /// modified.
    pub fn truncate(&mut self, column: usize) {
        let byte_offset = utf16_column_to_byte_offset(&self.text, column);
        self.text.truncate(byte_offset);
        self.attributes.retain(|a| a.start_column < column);
        for a in &mut self.attributes {
            a.end_column = a.end_column.min(column);
        }
        self.set_modified(true);
    }

    /// Inserts `text` at UTF-16 column `column`, marking the line modified
    /// and shifting attribute spans at or after `column` by `text`'s width.
    pub fn insert_text(&mut self, column: usize, text: &str) {
        let byte_offset = utf16_column_to_byte_offset(&self.text, column);
        self.text.insert_str(byte_offset, text);
        let width = text.encode_utf16().count();
        for a in &mut self.attributes {
            if a.start_column >= column {
                a.start_column += width;
            }
            if a.end_column >= column {
                a.end_column += width;
            }
        }
        self.set_modified(true);
    }

    /// Removes the UTF-16 column range `[start, end)`, marking the line
    /// modified. Returns the removed text. Attribute spans inside the
    /// removed range collapse to `start`; spans after it shift back.
    pub fn remove_text(&mut self, start: usize, end: usize) -> String {
        let byte_start = utf16_column_to_byte_offset(&self.text, start);
        let byte_end = utf16_column_to_byte_offset(&self.text, end);
        let removed = self.text[byte_start..byte_end].to_string();
        self.text.replace_range(byte_start..byte_end, "");
        let width = end - start;
        for a in &mut self.attributes {
            a.start_column = clamp_after_removal(a.start_column, start, end, width);
            a.end_column = clamp_after_removal(a.end_column, start, end, width);
        }
        self.attributes.retain(|a| a.start_column < a.end_column);
        self.set_modified(true);
        removed
    }

    /// Splits this line at `column`, keeping `[0, column)` here and
    /// returning `[column, end)` as a new, unmodified-by-default line whose
    /// attribute spans are rebased to the new line's coordinates. Neither
    /// line's `modified`/`saved_on_disk` flags are touched here — the
    /// caller (`Block::wrap_line`) applies the modified/saved-on-disk
    /// propagation rules, which depend on the pre-split state of both
    /// halves.
    pub fn split_off(&mut self, column: usize) -> TextLine {
        let byte_offset = utf16_column_to_byte_offset(&self.text, column);
        let tail = self.text.split_off(byte_offset);
        let eol = self.eol;
        let mut tail_attributes = Vec::new();
        self.attributes.retain_mut(|a| {
            if a.start_column >= column {
                tail_attributes.push(AttributeSpan {
                    start_column: a.start_column - column,
                    end_column: a.end_column.saturating_sub(column),
                    tag: a.tag,
                });
                false
            } else {
                if a.end_column > column {
                    a.end_column = column;
                }
                true
            }
        });
        let mut new_line = TextLine::with_eol(tail, eol);
        new_line.attributes = tail_attributes;
        new_line
    }

    /// Appends `other`'s text (and rebased attribute spans) to the end of
    /// this line, consuming it. The caller (`Block::unwrap_line`) is
    /// responsible for the `modified`/`saved_on_disk` merge rule — whether
    /// appending counts as a real content change depends on whether either
    /// side actually had text, which this method doesn't decide.
    pub fn append(&mut self, other: TextLine) {
        let offset = self.length();
        for a in other.attributes {
            self.attributes.push(AttributeSpan {
                start_column: a.start_column + offset,
                end_column: a.end_column + offset,
                tag: a.tag,
            });
        }
        self.text.push_str(&other.text);
    }

    /// Grapheme-cluster boundaries, for host-side cursor-movement policies
    /// that want to step by user-perceived character rather than by UTF-16
    /// code unit.
    pub fn grapheme_boundaries(&self) -> Vec<usize> {
        self.text.grapheme_indices(true).map(|(i, _)| i).collect()
    }
}

/// Remaps a single attribute-span boundary across a `[start, end)` removal:
/// boundaries before `start` are untouched, boundaries inside the removed
/// span collapse to `start`, and boundaries after it shift back by `width`.
fn clamp_after_removal(column: usize, start: usize, end: usize, width: usize) -> usize {
    if column <= start {
        column
    } else if column <= end {
        start
    } else {
        column - width
    }
}

/// Converts a UTF-16 code-unit offset into a byte offset into `s`'s UTF-8
/// encoding. Panics if `column` is past the end of the line — callers
/// validate columns before calling into the kernel, so this is an invariant
/// violation rather than a reachable error.
fn utf16_column_to_byte_offset(s: &str, column: usize) -> usize {
    if column == 0 {
        return 0;
    }
    let mut utf16_count = 0;
    for (byte_idx, ch) in s.char_indices() {
        if utf16_count == column {
            return byte_idx;
        }
        utf16_count += ch.len_utf16();
    }
    assert!(
        utf16_count == column,
        "column {} out of range for line of length {}",
        column,
        utf16_count
    );
    s.len()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_and_remove_roundtrip() {
        let mut line = TextLine::new("hello world");
        line.insert_text(5, ",");
        assert_eq!(line.text(), "hello, world");
        let removed = line.remove_text(5, 6);
        assert_eq!(removed, ",");
        assert_eq!(line.text(), "hello world");
    }

    #[test]
    fn split_and_append_roundtrip() {
        let mut a = TextLine::new("hello world");
        let b = a.split_off(5);
        assert_eq!(a.text(), "hello");
        assert_eq!(b.text(), " world");
        a.append(b);
        assert_eq!(a.text(), "hello world");
    }

    #[test]
    fn length_counts_utf16_units() {
        let line = TextLine::new("a\u{1F600}b"); // emoji is a surrogate pair
        assert_eq!(line.length(), 4);
    }

    #[test]
    fn empty_vs_whitespace_only() {
        assert!(TextLine::new("").is_empty());
        assert!(!TextLine::new(" ").is_empty());
    }

    #[test]
    fn modified_flag_set_by_mutation() {
        let mut line = TextLine::new("x");
        assert!(!line.modified());
        line.insert_text(1, "y");
        assert!(line.modified());
    }

    #[test]
    fn modified_and_saved_on_disk_are_mutually_exclusive() {
        let mut line = TextLine::new("x");
        line.set_saved_on_disk(true);
        assert!(line.saved_on_disk());
        assert!(!line.modified());
        line.insert_text(1, "y");
        assert!(line.modified());
        assert!(!line.saved_on_disk());
    }

    #[test]
    fn first_non_whitespace_column_skips_leading_indent() {
        assert_eq!(TextLine::new("    foo").first_non_whitespace_column(), Some(4));
        assert_eq!(TextLine::new("foo").first_non_whitespace_column(), Some(0));
        assert_eq!(TextLine::new("    ").first_non_whitespace_column(), None);
        assert_eq!(TextLine::new("").first_non_whitespace_column(), None);
    }

    #[test]
    fn attribute_spans_shift_with_insert_and_remove() {
        let mut line = TextLine::new("abcdef");
        line.set_attributes(vec![AttributeSpan {
            start_column: 2,
            end_column: 4,
            tag: 7,
        }]);
        line.insert_text(0, "XX");
        assert_eq!(line.attributes()[0].start_column, 4);
        assert_eq!(line.attributes()[0].end_column, 6);
        line.remove_text(0, 2);
        assert_eq!(line.attributes()[0].start_column, 2);
        assert_eq!(line.attributes()[0].end_column, 4);
    }

    #[test]
    fn split_off_rebases_attribute_spans() {
        let mut a = TextLine::new("hello world");
        a.set_attributes(vec![AttributeSpan {
            start_column: 7,
            end_column: 9,
            tag: 1,
        }]);
        let b = a.split_off(5);
        assert!(a.attributes().is_empty());
        assert_eq!(b.attributes()[0].start_column, 2);
        assert_eq!(b.attributes()[0].end_column, 4);
    }
}
