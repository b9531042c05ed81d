//! Buffer-level configuration.
//!
//! A plain struct rather than a file-backed config layer — parsing a config
//! file is a host concern, same as everything else this crate treats as an
//! external collaborator. Values here are consulted by the buffer's edit
//! primitives and by the swap journal.

use crate::line::EndOfLine;

/// Tunables for one [`crate::buffer::Buffer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferConfig {
    /// End-of-line convention applied to newly created lines (existing
    /// lines loaded from a mixed-eol file keep their own).
    pub default_eol: EndOfLine,
    /// Maximum UTF-16 units a single line may hold before a load-time
    /// hard-wrap kicks in. `None` disables the limit.
    pub line_length_limit: Option<usize>,
    /// Whether a save appends a trailing line terminator when the document
    /// doesn't already end with one empty line.
    pub new_line_at_eof: bool,
    /// Seconds between swap-journal fsyncs; `0` disables periodic syncing
    /// (the journal still flushes before a clean save).
    pub swap_sync_interval_secs: u32,
    /// Whether swap-journaling is enabled at all for this buffer.
    pub swap_enabled: bool,
}

impl Default for BufferConfig {
    fn default() -> Self {
        BufferConfig {
            default_eol: EndOfLine::Unix,
            line_length_limit: None,
            new_line_at_eof: true,
            swap_sync_interval_secs: 15,
            swap_enabled: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_matches_documented_values() {
        let cfg = BufferConfig::default();
        assert_eq!(cfg.swap_sync_interval_secs, 15);
        assert!(cfg.swap_enabled);
        assert!(cfg.new_line_at_eof);
    }
}
