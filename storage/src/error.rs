//! Typed errors for the log reader and sinks

use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors surfaced by log readers and event sinks. IO and format errors are
/// fatal to the operation that raised them; the producer aborts its session
/// on the first sink error.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Underlying filesystem failure, tagged with the file it hit.
    #[error("{path}: {source}")]
    Io {
        /// File the operation was acting on
        path: PathBuf,
        /// The OS-level error
        #[source]
        source: io::Error,
    },

    /// The file does not start with the log magic.
    #[error("{path}: not a qrsdp event log (bad magic)")]
    BadMagic {
        /// Offending file
        path: PathBuf,
    },

    /// Major version is newer than this reader understands.
    #[error("{path}: unsupported log version {found} (expected {expected})")]
    UnsupportedVersion {
        /// Offending file
        path: PathBuf,
        /// Version found in the header
        found: u16,
        /// Version this reader supports
        expected: u16,
    },

    /// Header declares a record size other than the fixed 26 bytes.
    #[error("{path}: record size {found} does not match {expected}")]
    RecordSizeMismatch {
        /// Offending file
        path: PathBuf,
        /// Record size found in the header
        found: u32,
        /// Expected record size
        expected: u32,
    },

    /// Footer tail does not carry the index magic.
    #[error("{path}: bad index magic in footer")]
    BadIndexMagic {
        /// Offending file
        path: PathBuf,
    },

    /// LZ4 round-trip failed or produced an unexpected byte count.
    #[error("{path}: lz4 error: {detail}")]
    Lz4 {
        /// Offending file
        path: PathBuf,
        /// What went wrong
        detail: String,
    },

    /// A chunk's declared sizes are inconsistent with its record count.
    #[error("{path}: corrupt chunk at offset {offset}")]
    CorruptChunk {
        /// Offending file
        path: PathBuf,
        /// Chunk file offset
        offset: u64,
    },

    /// Chunk index out of range for a random-access read.
    #[error("chunk {idx} out of range ({count} chunks)")]
    ChunkOutOfRange {
        /// Requested chunk index
        idx: u32,
        /// Number of chunks in the file
        count: u32,
    },
}

impl StorageError {
    /// Wrap an IO error with the path it occurred on.
    pub fn io(path: &Path, source: io::Error) -> Self {
        Self::Io { path: path.to_path_buf(), source }
    }
}
