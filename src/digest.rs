//! Git-blob-compatible content digest.
//!
//! Used to validate a swap journal against the document it was recorded for,
//! and to validate a folding-state export against the buffer it was exported
//! from. Both use the same algorithm: a SHA-1 over a git "blob" framing of the
//! content (`"blob " + decimal length + NUL + bytes`), chosen so the digest
//! can be produced and cross-checked with any tool that understands git's
//! object format.

use sha1::{Digest, Sha1};

/// 20-byte SHA-1 digest, formatted as lowercase hex when displayed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContentDigest([u8; 20]);

impl ContentDigest {
    /// Computes the digest of `contents` under the git-blob framing.
    pub fn of(contents: &[u8]) -> Self {
        let mut hasher = Sha1::new();
        hasher.update(b"blob ");
        hasher.update(contents.len().to_string().as_bytes());
        hasher.update(b"\0");
        hasher.update(contents);
        let out = hasher.finalize();
        let mut bytes = [0u8; 20];
        bytes.copy_from_slice(&out);
        ContentDigest(bytes)
    }

    /// Raw bytes, for wire serialization.
    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    /// Reconstructs a digest previously obtained from [`ContentDigest::as_bytes`].
    pub fn from_bytes(bytes: [u8; 20]) -> Self {
        ContentDigest(bytes)
    }
}

impl std::fmt::Display for ContentDigest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for b in &self.0 {
            write!(f, "{:02x}", b)?;
        }
        Ok(())
    }
}
