//! Error types for carkit_core.

use cid::Cid;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using carkit_core's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during store and archive operations.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error occurred during file or stream operations.
    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    /// Block is not present in the store.
    #[error("Block not found: {cid}")]
    NotFound { cid: Cid },

    /// A block reachable from an archive root is not present in the source store.
    #[error("Missing block while walking DAG: {cid}")]
    MissingBlock { cid: Cid },

    /// Archive header is unreadable or has an unsupported version.
    #[error("Malformed archive header: {reason}")]
    MalformedHeader { reason: String },

    /// A block frame does not start with a parseable CID.
    #[error("Malformed archive entry at offset {offset}: {reason}")]
    MalformedEntry { offset: u64, reason: String },

    /// Block bytes do not hash to the CID they were stored under.
    #[error("Integrity mismatch at offset {offset}: expected {cid}, got {actual}")]
    IntegrityMismatch { cid: Cid, actual: Cid, offset: u64 },

    /// Input ended in the middle of a frame.
    #[error("Truncated archive at offset {offset}: expected {expected} bytes, got {actual}")]
    TruncatedArchive {
        offset: u64,
        expected: u64,
        actual: u64,
    },

    /// A block appeared in an archive before anything referenced it.
    #[error("Unexpected block at offset {offset}: {cid} is not referenced by a root or an earlier block")]
    UnexpectedBlock { cid: Cid, offset: u64 },

    /// An archive needs at least one root.
    #[error("Archive root list is empty")]
    EmptyRoots,

    /// Codec code outside the supported set.
    #[error("Unsupported codec: 0x{code:x}")]
    UnsupportedCodec { code: u64 },

    /// Multihash code outside the supported set.
    #[error("Unsupported hash function: 0x{code:x}")]
    UnsupportedHash { code: u64 },

    /// Invalid CID text or bytes.
    #[error("Invalid CID: {reason}")]
    InvalidCid { reason: String },

    /// Node encoding or decoding failed.
    #[error("Codec error: {reason}")]
    Codec { reason: String },

    /// A stored block file no longer matches its CID.
    #[error("Corrupted block at {path}: {reason}")]
    CorruptedBlock { path: PathBuf, reason: String },

    /// Store is invalid or not initialized.
    #[error("Invalid store at {path}: {reason}")]
    InvalidStore { path: PathBuf, reason: String },
}

impl Error {
    /// Create a NotFound error.
    pub fn not_found(cid: Cid) -> Self {
        Error::NotFound { cid }
    }

    /// Create a MissingBlock error.
    pub fn missing_block(cid: Cid) -> Self {
        Error::MissingBlock { cid }
    }

    /// Create a MalformedHeader error.
    pub fn malformed_header(reason: impl Into<String>) -> Self {
        Error::MalformedHeader {
            reason: reason.into(),
        }
    }

    /// Create a MalformedEntry error.
    pub fn malformed_entry(offset: u64, reason: impl Into<String>) -> Self {
        Error::MalformedEntry {
            offset,
            reason: reason.into(),
        }
    }

    /// Create an IntegrityMismatch error.
    pub fn integrity_mismatch(cid: Cid, actual: Cid, offset: u64) -> Self {
        Error::IntegrityMismatch {
            cid,
            actual,
            offset,
        }
    }

    /// Create a TruncatedArchive error.
    pub fn truncated(offset: u64, expected: u64, actual: u64) -> Self {
        Error::TruncatedArchive {
            offset,
            expected,
            actual,
        }
    }

    /// Create an UnexpectedBlock error.
    pub fn unexpected_block(cid: Cid, offset: u64) -> Self {
        Error::UnexpectedBlock { cid, offset }
    }

    /// Create an InvalidCid error.
    pub fn invalid_cid(reason: impl Into<String>) -> Self {
        Error::InvalidCid {
            reason: reason.into(),
        }
    }

    /// Create a Codec error.
    pub fn codec(reason: impl Into<String>) -> Self {
        Error::Codec {
            reason: reason.into(),
        }
    }

    /// Create a CorruptedBlock error.
    pub fn corrupted_block(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Error::CorruptedBlock {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create an InvalidStore error.
    pub fn invalid_store(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Error::InvalidStore {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

// Additional From implementations for external error types

impl From<tempfile::PersistError> for Error {
    fn from(err: tempfile::PersistError) -> Self {
        Error::Io { source: err.error }
    }
}

impl From<cid::Error> for Error {
    fn from(err: cid::Error) -> Self {
        Error::invalid_cid(err.to_string())
    }
}
