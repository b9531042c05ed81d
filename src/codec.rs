//! Load-time text framing: splitting raw bytes into lines, detecting the
//! end-of-line convention(s) in use, and the line-length-limit hard-wrap
//! search. Encoding *detection* itself (codepage sniffing, BOM-driven
//! decoding) is a host concern reached through [`Decoded`] — this module
//! starts from already-decoded `str` content.

use crate::line::{EndOfLine, TextLine};

/// The result a host's decoder hands to [`split_into_lines`]: already valid
/// UTF-8 text, plus whether the host's decoder had to fall back or guess
/// (surfaced to the buffer as a soft `encoding_errors` flag, never a hard
/// failure, per the error taxonomy).
pub struct Decoded {
    pub text: String,
    pub encoding_errors: bool,
    pub had_byte_order_mark: bool,
}

/// Load-time statistics [`crate::buffer::Buffer::load`] hands back to the
/// host alongside the populated buffer: whether any raw line exceeded the
/// configured length limit and had to be hard-wrapped, and the longest raw
/// line seen before wrapping.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadStats {
    pub too_long_wrapped: bool,
    pub longest_line_seen: usize,
}

/// Splits `text` into lines, recording each line's own end-of-line
/// convention (a file may mix `\n` and `\r\n`) and applying
/// `line_length_limit` as a hard-wrap search, per the documented
/// whitespace-preferred tie-break. Returns the split lines plus the
/// [`LoadStats`] describing whether (and how badly) the limit was hit.
pub fn split_into_lines(text: &str, line_length_limit: Option<usize>) -> (Vec<TextLine>, LoadStats) {
    let mut lines = Vec::new();
    let mut stats = LoadStats::default();
    let mut rest = text;
    loop {
        let (content, eol, consumed) = take_one_line(rest);
        let raw_len = content.encode_utf16().count();
        stats.longest_line_seen = stats.longest_line_seen.max(raw_len);
        let chunks = wrap_to_limit(content, line_length_limit);
        if chunks.len() > 1 {
            stats.too_long_wrapped = true;
        }
        for chunk in chunks {
            lines.push(TextLine::with_eol(chunk, eol));
        }
        rest = &rest[consumed..];
        if rest.is_empty() {
            break;
        }
    }
    if lines.is_empty() {
        lines.push(TextLine::new(""));
    }
    (lines, stats)
}

/// Finds the next line terminator in `rest`, returning the line's content,
/// its eol kind, and how many bytes of `rest` the line plus terminator
/// consumed.
fn take_one_line(rest: &str) -> (&str, EndOfLine, usize) {
    match rest.find(['\n', '\r']) {
        None => (rest, EndOfLine::Unix, rest.len()),
        Some(idx) => {
            if rest.as_bytes()[idx] == b'\r' {
                if rest.as_bytes().get(idx + 1) == Some(&b'\n') {
                    (&rest[..idx], EndOfLine::Windows, idx + 2)
                } else {
                    (&rest[..idx], EndOfLine::Mac, idx + 1)
                }
            } else {
                (&rest[..idx], EndOfLine::Unix, idx + 1)
            }
        }
    }
}

/// Splits `content` into one or more chunks no longer than `limit` UTF-16
/// units. The search for a wrap point scans backward from the limit over
/// the last 10% of the window and prefers whitespace over punctuation when
/// both appear in that window; if neither appears, it hard-wraps exactly at
/// the limit.
fn wrap_to_limit(content: &str, limit: Option<usize>) -> Vec<&str> {
    let Some(limit) = limit else {
        return vec![content];
    };
    if limit == 0 {
        return vec![content];
    }
    let mut out = Vec::new();
    let mut remaining = content;
    loop {
        let len = remaining.encode_utf16().count();
        if len <= limit {
            out.push(remaining);
            break;
        }
        let split_at = find_wrap_point(remaining, limit);
        let byte_idx = utf16_len_to_byte_idx(remaining, split_at);
        out.push(&remaining[..byte_idx]);
        remaining = &remaining[byte_idx..];
    }
    out
}

fn utf16_len_to_byte_idx(s: &str, utf16_len: usize) -> usize {
    let mut count = 0;
    for (byte_idx, ch) in s.char_indices() {
        if count == utf16_len {
            return byte_idx;
        }
        count += ch.len_utf16();
    }
    s.len()
}

/// Returns the UTF-16 column to hard-wrap at, preferring the last
/// whitespace character within the final 10% of `[0, limit)`, then the last
/// punctuation character in that same window, then `limit` itself.
fn find_wrap_point(s: &str, limit: usize) -> usize {
    let window_start = limit - (limit / 10).max(1);
    let mut whitespace_at = None;
    let mut punctuation_at = None;
    let mut utf16_idx = 0;
    for ch in s.chars() {
        if utf16_idx >= window_start && utf16_idx < limit {
            if ch.is_whitespace() {
                whitespace_at = Some(utf16_idx + ch.len_utf16());
            } else if ch.is_ascii_punctuation() {
                punctuation_at = Some(utf16_idx + ch.len_utf16());
            }
        }
        utf16_idx += ch.len_utf16();
        if utf16_idx >= limit {
            break;
        }
    }
    whitespace_at.or(punctuation_at).unwrap_or(limit)
}
