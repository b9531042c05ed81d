//! Component H: the crash-recovery swap journal.
//!
//! An append-only binary log of edit primitives, written alongside the
//! document being edited so that a crash leaves behind enough to replay
//! unsaved work. The wire format and opcode bytes here are a fixed on-disk
//! layout, not an encoding this crate is free to redesign — a journal
//! written by one version must stay readable by the next.

use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use log::{debug, warn};

use crate::cursor::Position;
use crate::digest::ContentDigest;
use crate::error::RecoveryError;
use crate::history::EditKind;

/// Magic header every swap file begins with, length-prefixed as a `u32`
/// followed by the UTF-8 bytes, immediately followed by the 20-byte content
/// digest and then the record stream.
pub const MAGIC: &str = "Kate Swap File 2.0";

/// The swap journal's own lifecycle, independent of the document's.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JournalState {
    /// Not currently writing a swap file (swapping disabled, or the buffer
    /// has no unsaved changes yet).
    Idle,
    /// Actively appending records as edits happen.
    Recording,
    /// Fully flushed to disk and fsynced; the in-memory document and the
    /// journal agree.
    Synced,
}

/// One journaled edit primitive, tagged by its single-byte opcode exactly as
/// the wire format requires.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Record {
    /// `S` — opens a transaction bracket.
    StartEdit,
    /// `E` — closes a transaction bracket.
    FinishEdit,
    /// `W` — a line was wrapped at `(line, column)`.
    WrapLine { line: u32, column: u32 },
    /// `U` — the line at `line + 1` was unwrapped into `line`.
    UnwrapLine { line: u32 },
    /// `I` — `text` was inserted at `(line, column)`.
    InsertText { line: u32, column: u32, text: String },
    /// `R` — `length` UTF-16 units were removed starting at `(line, column)`.
    RemoveText { line: u32, column: u32, length: u32 },
}

impl Record {
    fn opcode(&self) -> u8 {
        match self {
            Record::StartEdit => b'S',
            Record::FinishEdit => b'E',
            Record::WrapLine { .. } => b'W',
            Record::UnwrapLine { .. } => b'U',
            Record::InsertText { .. } => b'I',
            Record::RemoveText { .. } => b'R',
        }
    }

    /// Appends this record's wire encoding to `out`.
    pub fn encode(&self, out: &mut Vec<u8>) {
        out.push(self.opcode());
        match self {
            Record::StartEdit | Record::FinishEdit => {}
            Record::WrapLine { line, column } => {
                out.extend_from_slice(&line.to_le_bytes());
                out.extend_from_slice(&column.to_le_bytes());
            }
            Record::UnwrapLine { line } => {
                out.extend_from_slice(&line.to_le_bytes());
            }
            Record::InsertText { line, column, text } => {
                out.extend_from_slice(&line.to_le_bytes());
                out.extend_from_slice(&column.to_le_bytes());
                let bytes = text.as_bytes();
                out.extend_from_slice(&(bytes.len() as u32).to_le_bytes());
                out.extend_from_slice(bytes);
            }
            Record::RemoveText { line, column, length } => {
                out.extend_from_slice(&line.to_le_bytes());
                out.extend_from_slice(&column.to_le_bytes());
                out.extend_from_slice(&length.to_le_bytes());
            }
        }
    }

    /// Reads exactly one record from `r`, or `None` at a clean end-of-file
    /// (no bytes at all before the opcode). Any other short read is a
    /// [`RecoveryError::Truncated`] — the record stream ended mid-entry.
    pub fn decode(r: &mut impl Read) -> Result<Option<Record>, RecoveryError> {
        let mut opcode = [0u8; 1];
        match r.read(&mut opcode) {
            Ok(0) => return Ok(None),
            Ok(_) => {}
            Err(e) => return Err(RecoveryError::Unreadable(e)),
        }

        let read_u32 = |r: &mut dyn Read| -> Result<u32, RecoveryError> {
            let mut buf = [0u8; 4];
            r.read_exact(&mut buf).map_err(|_| RecoveryError::Truncated)?;
            Ok(u32::from_le_bytes(buf))
        };

        let record = match opcode[0] {
            b'S' => Record::StartEdit,
            b'E' => Record::FinishEdit,
            b'W' => {
                let line = read_u32(r)?;
                let column = read_u32(r)?;
                Record::WrapLine { line, column }
            }
            b'U' => {
                let line = read_u32(r)?;
                Record::UnwrapLine { line }
            }
            b'I' => {
                let line = read_u32(r)?;
                let column = read_u32(r)?;
                let len = read_u32(r)? as usize;
                let mut buf = vec![0u8; len];
                r.read_exact(&mut buf).map_err(|_| RecoveryError::Truncated)?;
                let text = String::from_utf8(buf).map_err(|_| RecoveryError::Truncated)?;
                Record::InsertText { line, column, text }
            }
            b'R' => {
                let line = read_u32(r)?;
                let column = read_u32(r)?;
                let length = read_u32(r)?;
                Record::RemoveText { line, column, length }
            }
            _ => return Err(RecoveryError::Truncated),
        };
        Ok(Some(record))
    }
}

/// Derives a swap-file path for `document_path`, matching the original's
/// `.<filename>.kate-swp` sibling-file convention so existing tooling that
/// looks for one still finds it.
pub fn swap_path_for(document_path: &Path) -> PathBuf {
    let dir = document_path.parent().unwrap_or_else(|| Path::new("."));
    let name = document_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    dir.join(format!(".{name}.kate-swp"))
}

/// An in-progress or completed swap journal for one document.
pub struct SwapJournal {
    path: PathBuf,
    state: JournalState,
    buffered: Vec<u8>,
    sync_interval_secs: u32,
}

impl SwapJournal {
    /// `sync_interval_secs` of `0` disables the periodic fsync timer
    /// entirely, matching the original's `swapSyncInterval() != 0` guard.
    pub fn new(path: PathBuf, sync_interval_secs: u32) -> Self {
        SwapJournal {
            path,
            state: JournalState::Idle,
            buffered: Vec::new(),
            sync_interval_secs,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn state(&self) -> JournalState {
        self.state
    }

    /// Milliseconds between fsyncs, or `None` if syncing is disabled. The
    /// original configures this in seconds and multiplies by 1000 when
    /// arming its (single-shot) timer; this crate keeps that unit
    /// translation at the same boundary so a host's timer wheel can use it
    /// directly.
    pub fn sync_interval_millis(&self) -> Option<u32> {
        (self.sync_interval_secs != 0).then(|| self.sync_interval_secs * 1000)
    }

    /// Writes the header (magic + digest) if this is a fresh journal, then
    /// begins recording.
    pub fn start(&mut self, digest: ContentDigest) -> io::Result<()> {
        self.buffered.clear();
        let magic_bytes = MAGIC.as_bytes();
        self.buffered.extend_from_slice(&(magic_bytes.len() as u32).to_le_bytes());
        self.buffered.extend_from_slice(magic_bytes);
        self.buffered.extend_from_slice(digest.as_bytes());
        self.state = JournalState::Recording;
        debug!("swap journal started at {:?}", self.path);
        Ok(())
    }

    /// Appends one record to the in-memory buffer. A full `fsync` still
    /// only happens on [`Self::flush`], matching the original's
    /// write-buffered-then-timer-fsync behavior.
    pub fn append(&mut self, record: &Record) {
        record.encode(&mut self.buffered);
        self.state = JournalState::Recording;
    }

    /// Writes the buffered records to `self.path` and `fsync`s (`fdatasync`
    /// where available through the platform's `File::sync_data`). Called
    /// either by a host's periodic timer (see
    /// [`Self::sync_interval_millis`]) or right before a clean save.
    pub fn flush(&mut self) -> io::Result<()> {
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&self.path)?;
        file.write_all(&self.buffered)?;
        file.sync_data()?;
        self.state = JournalState::Synced;
        debug!("swap journal synced to {:?}", self.path);
        Ok(())
    }

    /// Removes the swap file once the document has been saved cleanly and
    /// no recovery is needed anymore.
    pub fn discard(&mut self) -> io::Result<()> {
        if self.path.exists() {
            std::fs::remove_file(&self.path)?;
        }
        self.state = JournalState::Idle;
        Ok(())
    }

    /// Reads and validates the header of a swap file on disk without
    /// replaying it, for a host to decide whether to offer recovery.
    pub fn peek(path: &Path, expected_digest: ContentDigest) -> Result<bool, RecoveryError> {
        let mut file = std::fs::File::open(path).map_err(RecoveryError::Unreadable)?;
        let (_magic, digest) = read_header(&mut file)?;
        Ok(digest == *expected_digest.as_bytes())
    }

    /// Replays every record in the swap file at `path`, calling `apply` for
    /// each. If the digest doesn't match `expected_digest` the file is
    /// discarded without replaying anything
    /// ([`RecoveryError::DigestMismatch`]). If the record stream ends in
    /// the middle of a transaction bracket, replay still applies everything
    /// readable and returns [`RecoveryError::Truncated`] alongside how many
    /// records were applied — the caller marks the resulting document
    /// modified either way.
    pub fn recover(path: &Path, expected_digest: ContentDigest, mut apply: impl FnMut(&Record)) -> Result<usize, RecoveryError> {
        let mut file = std::fs::File::open(path).map_err(RecoveryError::Unreadable)?;
        let (_magic, digest) = read_header(&mut file)?;
        if digest != *expected_digest.as_bytes() {
            warn!("swap journal digest mismatch for {:?}, discarding", path);
            return Err(RecoveryError::DigestMismatch);
        }

        let mut applied = 0usize;
        let mut in_transaction = false;
        loop {
            match Record::decode(&mut file) {
                Ok(Some(record)) => {
                    match record {
                        Record::StartEdit => in_transaction = true,
                        Record::FinishEdit => in_transaction = false,
                        _ => {}
                    }
                    apply(&record);
                    applied += 1;
                }
                Ok(None) => {
                    if in_transaction {
                        warn!("swap journal {:?} truncated mid-transaction", path);
                        return Err(RecoveryError::Truncated);
                    }
                    return Ok(applied);
                }
                Err(RecoveryError::Truncated) => {
                    warn!("swap journal {:?} truncated mid-record", path);
                    return Err(RecoveryError::Truncated);
                }
                Err(e) => return Err(e),
            }
        }
    }
}

fn read_header(file: &mut std::fs::File) -> Result<(String, [u8; 20]), RecoveryError> {
    let mut len_buf = [0u8; 4];
    file.read_exact(&mut len_buf).map_err(RecoveryError::Unreadable)?;
    let len = u32::from_le_bytes(len_buf) as usize;
    let mut magic_buf = vec![0u8; len];
    file.read_exact(&mut magic_buf).map_err(RecoveryError::Unreadable)?;
    let magic = String::from_utf8(magic_buf).map_err(|_| RecoveryError::Truncated)?;
    let mut digest = [0u8; 20];
    file.read_exact(&mut digest).map_err(RecoveryError::Unreadable)?;
    Ok((magic, digest))
}

/// Translates a [`crate::history::EditKind`] plus its position into the
/// journal record it corresponds to, for `Buffer` to append on every edit.
///
/// `EditKind::InsertText` only carries a length, not the inserted text
/// itself, so it can't be turned into a `Record::InsertText` here — the
/// wire format needs the actual UTF-8 bytes. `Buffer::insert_text` appends
/// its own `Record::InsertText` directly with the real text instead of
/// going through this function; this match arm exists only to make that
/// omission loud if a future caller routes an insert through here by
/// mistake, rather than silently journaling placeholder bytes that would
/// corrupt crash recovery.
pub fn record_for(pos: Position, kind: &EditKind) -> Record {
    match kind {
        EditKind::WrapLine => Record::WrapLine {
            line: pos.line as u32,
            column: pos.column as u32,
        },
        EditKind::UnwrapLine => Record::UnwrapLine { line: pos.line as u32 },
        EditKind::InsertText { .. } => {
            unreachable!("insert_text journals its own Record::InsertText with the real text")
        }
        EditKind::RemoveText { len } => Record::RemoveText {
            line: pos.line as u32,
            column: pos.column as u32,
            length: *len as u32,
        },
    }
}
