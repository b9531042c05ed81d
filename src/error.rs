//! Error taxonomy for the text-engine kernel.
//!
//! Per the component contracts, most argument-validation failures are
//! programmer errors (callers are expected to uphold preconditions, since the
//! editor mediates all input) and are therefore asserted, not returned as
//! `Result`. The error types here cover the remaining categories: I/O,
//! encoding, swap-journal recovery, and command-level misuse that a host is
//! expected to recover from rather than crash on.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Failure surfaced by [`crate::Buffer::load`] / [`crate::Buffer::save`] and by the
/// swap journal's own file handling.
#[derive(Debug, Error)]
pub enum IoError {
    /// The underlying file could not be opened, read, written, or renamed.
    #[error("I/O error on {path}: {source}")]
    Io {
        /// Path the operation was attempted against.
        path: PathBuf,
        /// Underlying OS error.
        #[source]
        source: io::Error,
    },
    /// A write succeeded to a staging file but the final rename failed and the
    /// privilege-helper escalation (if attempted) also failed.
    #[error("failed to commit save to {path}: {reason}")]
    CommitFailed {
        /// Final destination path.
        path: PathBuf,
        /// Human-readable reason, usually relayed from the privilege helper.
        reason: String,
    },
}

/// Failure of the folding-range well-nesting rule, or of the import contract.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FoldingError {
    /// The candidate range partially overlaps an existing range; neither
    /// strictly contains the other, so no well-nested placement exists.
    #[error("folding range partially overlaps an existing range")]
    PartialOverlap,
    /// The candidate range is empty or otherwise invalid (`start >= end`).
    #[error("folding range is empty or invalid")]
    InvalidRange,
    /// `id` does not name a currently known folding range.
    #[error("unknown folding range id {0}")]
    UnknownId(i64),
}

/// Outcome of replaying a swap journal.
#[derive(Debug, Error)]
pub enum RecoveryError {
    /// The journal's header or digest did not match; recovery did not run at
    /// all and the journal was discarded.
    #[error("swap journal digest mismatch, discarding")]
    DigestMismatch,
    /// The journal could be read but not opened (missing, wrong magic, etc).
    #[error("swap journal unreadable: {0}")]
    Unreadable(#[source] io::Error),
    /// Replay reached the end of the file in the middle of a `StartEdit`/
    /// `FinishEdit` bracket. The document was still replayed as far as
    /// possible and is handed back to the caller, marked modified.
    #[error("swap journal replay truncated mid-transaction")]
    Truncated,
}

/// Errors the edit-primitive façade can return to a host. Argument-validity
/// failures (out-of-range line/column, editing outside a transaction) are
/// invariant violations and panic instead — see the module documentation.
#[derive(Debug, Error)]
pub enum BufferError {
    /// Load/save I/O failure.
    #[error(transparent)]
    Io(#[from] IoError),
    /// Folding-tree operation rejected.
    #[error(transparent)]
    Folding(#[from] FoldingError),
    /// Swap-journal recovery problem.
    #[error(transparent)]
    Recovery(#[from] RecoveryError),
}
