//! textbuffer-core — a headless, block-structured text buffer kernel.
//!
//! This crate is the text-engine at the center of a source-code editor: a
//! piece-managed, block-structured buffer together with the subsystems a
//! higher-level editor builds commands out of — auto-tracking cursors and
//! ranges, a well-nested folding tree, reversible undo history, and a
//! crash-recovery journal. It does not render anything, does not know about
//! syntax highlighting or spell checking, and does not talk to the
//! filesystem beyond the abstract load/save contract in [`buffer`] — those
//! are all a host's job.
//!
//! # Architecture
//!
//! ```text
//!   Buffer (components C, I)
//!     ├─ Vec<Block>              — components B: contiguous runs of lines
//!     │    ├─ TextLine            — component A
//!     │    ├─ cursor cache        — which CursorIds resolve into this block
//!     │    └─ range cache         — which RangeIds touch which line
//!     ├─ Slab<CursorState>        — component D: the cursor arena
//!     ├─ Slab<RangeState>         — component E: the range arena
//!     ├─ History                  — component F: reversible edit log
//!     └─ FoldingManager           — component G: the fold tree
//!
//!   SwapJournal (component H) — crash-recovery log, owned per-Buffer
//!   PrivilegeHelper trait — the privileged-save RPC contract
//! ```
//!
//! # Quick start
//!
//! ```
//! use textbuffer_core::{Buffer, BufferConfig, InsertBehavior};
//! use textbuffer_core::cursor::Position;
//!
//! let mut buffer = Buffer::new(BufferConfig::default());
//! buffer.edit_start();
//! buffer.insert_text(0, 0, "fn main() {}");
//! buffer.edit_end(|_| false);
//! assert_eq!(buffer.line_text(0), "fn main() {}");
//!
//! let cursor = buffer.create_cursor(Position::new(0, 3), InsertBehavior::StayOnInsert);
//! buffer.edit_start();
//! buffer.insert_text(0, 0, "// ");
//! buffer.edit_end(|_| false);
//! assert_eq!(buffer.cursor(cursor), Position::new(0, 6));
//! ```

pub mod block;
pub mod buffer;
pub mod codec;
pub mod config;
pub mod cursor;
pub mod digest;
pub mod error;
pub mod folding;
pub mod history;
pub mod line;
pub mod observer;
pub mod privilege;
pub mod range;
pub mod swap;

pub use buffer::{Buffer, LoadReport};
pub use config::BufferConfig;
pub use cursor::{CursorId, InsertBehavior, Position};
pub use digest::ContentDigest;
pub use error::{BufferError, FoldingError, IoError, RecoveryError};
pub use folding::{FoldFlags, FoldId, FoldingExport};
pub use line::{EndOfLine, TextLine};
pub use observer::ChangeEvent;
pub use range::{EmptyBehavior, RangeId, RangeSnapshot, ViewId};
