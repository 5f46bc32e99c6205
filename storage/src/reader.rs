//! Log reader: header validation, footer or scan indexing, chunk queries

use crate::error::StorageError;
use crate::format::{
    ChunkHeader, DiskEventRecord, FileHeader, IndexEntry, IndexTail, CHUNK_HEADER_SIZE,
    FILE_HEADER_SIZE, INDEX_MAGIC, INDEX_TAIL_SIZE, LOG_MAGIC, LOG_VERSION_MAJOR, RECORD_SIZE,
};
use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Reads `.qrsdp` event logs produced by the file sink. Construction
/// validates the header and builds the chunk index, preferring the footer
/// when `HAS_INDEX` is set and falling back to a sequential chunk-header
/// scan otherwise (crash recovery).
#[derive(Debug)]
pub struct EventLogReader {
    path: PathBuf,
    file: BufReader<File>,
    header: FileHeader,
    index: Vec<IndexEntry>,
}

impl EventLogReader {
    /// Open a log file read-only and index its chunks.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Io`] on filesystem failures,
    /// [`StorageError::BadMagic`] / [`StorageError::UnsupportedVersion`] /
    /// [`StorageError::RecordSizeMismatch`] for header problems, and
    /// [`StorageError::BadIndexMagic`] when the footer is corrupt.
    pub fn open(path: &Path) -> Result<Self, StorageError> {
        let file = File::open(path).map_err(|e| StorageError::io(path, e))?;
        let mut file = BufReader::new(file);

        let (magic, header) =
            FileHeader::read_from(&mut file).map_err(|e| StorageError::io(path, e))?;
        if magic != LOG_MAGIC {
            return Err(StorageError::BadMagic { path: path.to_path_buf() });
        }
        if header.version_major != LOG_VERSION_MAJOR {
            return Err(StorageError::UnsupportedVersion {
                path: path.to_path_buf(),
                found: header.version_major,
                expected: LOG_VERSION_MAJOR,
            });
        }
        if header.record_size != RECORD_SIZE {
            return Err(StorageError::RecordSizeMismatch {
                path: path.to_path_buf(),
                found: header.record_size,
                expected: RECORD_SIZE,
            });
        }

        let mut reader =
            Self { path: path.to_path_buf(), file, header, index: Vec::new() };
        if reader.header.has_index() {
            reader.build_index_from_footer()?;
        } else {
            reader.build_index_by_scanning()?;
        }
        debug!(
            path = %reader.path.display(),
            chunks = reader.index.len(),
            indexed = reader.header.has_index(),
            "opened event log"
        );
        Ok(reader)
    }

    /// Parsed file header.
    #[must_use]
    pub const fn header(&self) -> &FileHeader {
        &self.header
    }

    /// Chunk index entries, for inspection.
    #[must_use]
    pub fn index(&self) -> &[IndexEntry] {
        &self.index
    }

    /// Number of chunks in the file.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn chunk_count(&self) -> u32 {
        self.index.len() as u32
    }

    /// Total records across every chunk.
    #[must_use]
    pub fn total_records(&self) -> u64 {
        self.index.iter().map(|e| u64::from(e.record_count)).sum()
    }

    /// Read and decompress one chunk by 0-based index.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::ChunkOutOfRange`] for a bad index and IO /
    /// LZ4 / corruption errors from the chunk itself.
    pub fn read_chunk(&mut self, idx: u32) -> Result<Vec<DiskEventRecord>, StorageError> {
        let count = self.chunk_count();
        if idx >= count {
            return Err(StorageError::ChunkOutOfRange { idx, count });
        }
        let offset = self.index[idx as usize].file_offset;
        self.decompress_chunk_at(offset)
    }

    /// All records from chunks whose `[first_ts_ns, last_ts_ns]` overlaps
    /// `[ts_start, ts_end]`. Filtering is at chunk granularity: the result
    /// may include records outside the query range, and callers needing
    /// exact bounds must post-filter.
    ///
    /// # Errors
    ///
    /// Returns IO / LZ4 / corruption errors from any overlapping chunk.
    pub fn read_range(
        &mut self,
        ts_start: u64,
        ts_end: u64,
    ) -> Result<Vec<DiskEventRecord>, StorageError> {
        let offsets: Vec<u64> = self
            .index
            .iter()
            .filter(|e| e.first_ts_ns <= ts_end && e.last_ts_ns >= ts_start)
            .map(|e| e.file_offset)
            .collect();
        let mut out = Vec::new();
        for offset in offsets {
            out.extend(self.decompress_chunk_at(offset)?);
        }
        Ok(out)
    }

    /// Every record in the file, in order.
    ///
    /// # Errors
    ///
    /// Returns IO / LZ4 / corruption errors from any chunk.
    pub fn read_all(&mut self) -> Result<Vec<DiskEventRecord>, StorageError> {
        let offsets: Vec<u64> = self.index.iter().map(|e| e.file_offset).collect();
        let mut out = Vec::with_capacity(usize::try_from(self.total_records()).unwrap_or(0));
        for offset in offsets {
            out.extend(self.decompress_chunk_at(offset)?);
        }
        Ok(out)
    }

    fn build_index_from_footer(&mut self) -> Result<(), StorageError> {
        let tail_seek = -(i64::try_from(INDEX_TAIL_SIZE).unwrap_or(16));
        self.file
            .seek(SeekFrom::End(tail_seek))
            .map_err(|e| StorageError::io(&self.path, e))?;
        let (magic, tail) =
            IndexTail::read_from(&mut self.file).map_err(|e| StorageError::io(&self.path, e))?;
        if magic != INDEX_MAGIC {
            return Err(StorageError::BadIndexMagic { path: self.path.clone() });
        }

        self.file
            .seek(SeekFrom::Start(tail.index_start_offset))
            .map_err(|e| StorageError::io(&self.path, e))?;
        self.index.reserve(tail.chunk_count as usize);
        for _ in 0..tail.chunk_count {
            let entry = IndexEntry::read_from(&mut self.file)
                .map_err(|e| StorageError::io(&self.path, e))?;
            self.index.push(entry);
        }
        Ok(())
    }

    /// Walk chunk headers from offset 64, synthesizing index entries.
    /// Trailing bytes that do not parse as a plausible chunk end the scan,
    /// which drops a torn final chunk instead of failing the open.
    fn build_index_by_scanning(&mut self) -> Result<(), StorageError> {
        let file_len = self
            .file
            .get_ref()
            .metadata()
            .map_err(|e| StorageError::io(&self.path, e))?
            .len();
        let mut pos = FILE_HEADER_SIZE;
        self.file.seek(SeekFrom::Start(pos)).map_err(|e| StorageError::io(&self.path, e))?;

        while pos + CHUNK_HEADER_SIZE <= file_len {
            let chunk_header = match ChunkHeader::read_from(&mut self.file) {
                Ok(h) => h,
                Err(_) => break,
            };
            let plausible = chunk_header.record_count > 0
                && chunk_header.uncompressed_size == chunk_header.record_count * RECORD_SIZE;
            let end = pos + CHUNK_HEADER_SIZE + u64::from(chunk_header.compressed_size);
            if !plausible || end > file_len {
                break;
            }
            self.index.push(IndexEntry {
                file_offset: pos,
                first_ts_ns: chunk_header.first_ts_ns,
                last_ts_ns: chunk_header.last_ts_ns,
                record_count: chunk_header.record_count,
                reserved: 0,
            });
            pos = end;
            self.file.seek(SeekFrom::Start(pos)).map_err(|e| StorageError::io(&self.path, e))?;
        }
        Ok(())
    }

    fn decompress_chunk_at(
        &mut self,
        offset: u64,
    ) -> Result<Vec<DiskEventRecord>, StorageError> {
        self.file.seek(SeekFrom::Start(offset)).map_err(|e| StorageError::io(&self.path, e))?;
        let chunk_header =
            ChunkHeader::read_from(&mut self.file).map_err(|e| StorageError::io(&self.path, e))?;

        if chunk_header.uncompressed_size != chunk_header.record_count * RECORD_SIZE {
            return Err(StorageError::CorruptChunk { path: self.path.clone(), offset });
        }

        let mut compressed = vec![0u8; chunk_header.compressed_size as usize];
        self.file.read_exact(&mut compressed).map_err(|e| StorageError::io(&self.path, e))?;

        let raw =
            lz4_flex::block::decompress(&compressed, chunk_header.uncompressed_size as usize)
                .map_err(|e| StorageError::Lz4 { path: self.path.clone(), detail: e.to_string() })?;
        if raw.len() != chunk_header.uncompressed_size as usize {
            return Err(StorageError::Lz4 {
                path: self.path.clone(),
                detail: format!(
                    "decompressed {} bytes, expected {}",
                    raw.len(),
                    chunk_header.uncompressed_size
                ),
            });
        }

        let mut records = Vec::with_capacity(chunk_header.record_count as usize);
        let mut cursor = raw.as_slice();
        for _ in 0..chunk_header.record_count {
            records.push(
                DiskEventRecord::read_from(&mut cursor)
                    .map_err(|e| StorageError::io(&self.path, e))?,
            );
        }
        Ok(records)
    }
}
