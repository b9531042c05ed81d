//! The privileged-save helper's RPC contract.
//!
//! When a host can't write a file directly (it's owned by another user, or
//! lives under a directory the editor process can't write to), it hands the
//! save off to a separate, privileged helper process. This module defines
//! only the contract that helper is expected to implement; the helper
//! process itself, and any UI prompting the user to authorize it, live
//! entirely outside this crate.

use std::path::PathBuf;

use log::debug;

use crate::digest::ContentDigest;

/// Arguments one privileged-save RPC call carries.
#[derive(Debug, Clone)]
pub struct SaveRequest {
    /// Where the new content was staged by the caller.
    pub source_file: PathBuf,
    /// The file to overwrite.
    pub target_file: PathBuf,
    /// Digest of `source_file`'s contents, checked by the helper before it
    /// commits — protects against the staged file being swapped out from
    /// under the helper between staging and the privileged write.
    pub checksum: ContentDigest,
    /// Owning user id to apply to the final file.
    pub owner_id: u32,
    /// Owning group id to apply to the final file.
    pub group_id: u32,
}

/// Outcome of a privileged-save attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveOutcome {
    Committed,
    ChecksumMismatch,
    Failed { reason: String },
}

/// Implemented by whatever actually talks to the privileged helper process
/// (a D-Bus/polkit client, a setuid helper invoked over a pipe, etc). This
/// crate ships no implementation — only hosts that need privileged saves
/// need one, and the transport is entirely platform-specific.
///
/// An implementation MUST stage its own copy of the source content in the
/// *same directory* as `target_file` before handing control to the
/// privileged side, and commit with an atomic rename rather than a
/// remove-then-write: staging anywhere else (e.g. a shared system temp
/// directory) reopens the TOCTOU/symlink attack this RPC exists to close.
pub trait PrivilegeHelper {
    fn save(&mut self, request: SaveRequest) -> SaveOutcome;
}

/// A `PrivilegeHelper` that always reports failure, used where a host
/// hasn't wired up a real transport yet but still wants the call site to
/// type-check and log.
#[derive(Debug, Default)]
pub struct UnavailablePrivilegeHelper;

impl PrivilegeHelper for UnavailablePrivilegeHelper {
    fn save(&mut self, request: SaveRequest) -> SaveOutcome {
        debug!("privileged save requested for {:?} but no helper is configured", request.target_file);
        SaveOutcome::Failed {
            reason: "no privilege helper configured".into(),
        }
    }
}
