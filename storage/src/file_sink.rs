//! Disk-backed event sink writing the chunked, indexed log format

use crate::error::StorageError;
use crate::format::{
    ChunkHeader, DiskEventRecord, FileHeader, IndexEntry, IndexTail, CHUNK_HEADER_SIZE,
    DEFAULT_CHUNK_CAPACITY, FILE_HEADER_SIZE, HEADER_FLAGS_OFFSET, HEADER_FLAG_HAS_INDEX,
};
use crate::sink::EventSink;
use byteorder::{LittleEndian, WriteBytesExt};
use common::{EventRecord, TradingSession};
use std::fs::File;
use std::io::{self, BufWriter, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Chunked LZ4 file sink. Opens the file and writes the header immediately;
/// buffers records up to `chunk_capacity`, then compresses and appends one
/// chunk at a time. `close` writes the footer index and flips the
/// `HAS_INDEX` header flag; a file that never reached `close` stays readable
/// through the reader's scan path.
pub struct BinaryFileSink {
    path: PathBuf,
    file: Option<BufWriter<File>>,
    chunk_capacity: usize,
    buffer: Vec<DiskEventRecord>,
    raw_buf: Vec<u8>,
    compress_buf: Vec<u8>,
    index: Vec<IndexEntry>,
    total_records: u64,
    position: u64,
}

impl BinaryFileSink {
    /// Create the file and write its header.
    ///
    /// `chunk_capacity` is records per chunk; zero selects the default.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Io`] when the file cannot be created or the
    /// header write fails.
    pub fn create(
        path: &Path,
        session: &TradingSession,
        chunk_capacity: u32,
    ) -> Result<Self, StorageError> {
        let cap = if chunk_capacity > 0 { chunk_capacity } else { DEFAULT_CHUNK_CAPACITY };
        let file = File::create(path).map_err(|e| StorageError::io(path, e))?;
        let mut writer = BufWriter::new(file);

        let header = FileHeader::for_session(session, cap);
        header.write_to(&mut writer).map_err(|e| StorageError::io(path, e))?;

        let cap = cap as usize;
        Ok(Self {
            path: path.to_path_buf(),
            file: Some(writer),
            chunk_capacity: cap,
            buffer: Vec::with_capacity(cap),
            raw_buf: Vec::new(),
            compress_buf: Vec::new(),
            index: Vec::new(),
            total_records: 0,
            position: FILE_HEADER_SIZE,
        })
    }

    /// Records written across all chunks (excluding the unflushed buffer).
    #[must_use]
    pub const fn records_written(&self) -> u64 {
        self.total_records
    }

    /// Chunks written so far.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn chunks_written(&self) -> u32 {
        self.index.len() as u32
    }

    /// Path this sink writes to.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// True until `close` has run.
    #[must_use]
    pub const fn is_open(&self) -> bool {
        self.file.is_some()
    }

    #[allow(clippy::cast_possible_truncation)]
    fn flush_chunk(&mut self) -> Result<(), StorageError> {
        if self.buffer.is_empty() {
            return Ok(());
        }

        let record_count = self.buffer.len() as u32;
        self.raw_buf.clear();
        for rec in &self.buffer {
            rec.write_to(&mut self.raw_buf).map_err(|e| StorageError::io(&self.path, e))?;
        }

        let bound = lz4_flex::block::get_maximum_output_size(self.raw_buf.len());
        if self.compress_buf.len() < bound {
            self.compress_buf.resize(bound, 0);
        }
        let compressed_len = lz4_flex::block::compress_into(&self.raw_buf, &mut self.compress_buf)
            .map_err(|e| StorageError::Lz4 { path: self.path.clone(), detail: e.to_string() })?;

        let first_ts_ns = self.buffer[0].ts_ns;
        let last_ts_ns = self.buffer[self.buffer.len() - 1].ts_ns;

        // Index entry records the chunk's offset before the write moves it.
        self.index.push(IndexEntry {
            file_offset: self.position,
            first_ts_ns,
            last_ts_ns,
            record_count,
            reserved: 0,
        });

        let chunk_header = ChunkHeader {
            uncompressed_size: self.raw_buf.len() as u32,
            compressed_size: compressed_len as u32,
            record_count,
            chunk_flags: 0,
            first_ts_ns,
            last_ts_ns,
        };

        let Some(writer) = self.file.as_mut() else {
            return Err(closed_error(&self.path));
        };
        chunk_header.write_to(writer).map_err(|e| StorageError::io(&self.path, e))?;
        writer
            .write_all(&self.compress_buf[..compressed_len])
            .map_err(|e| StorageError::io(&self.path, e))?;

        self.position += CHUNK_HEADER_SIZE + compressed_len as u64;
        self.total_records += u64::from(record_count);
        self.buffer.clear();
        Ok(())
    }

    #[allow(clippy::cast_possible_truncation)]
    fn write_index(&mut self) -> Result<(), StorageError> {
        if self.index.is_empty() {
            return Ok(());
        }

        let index_start = self.position;
        let chunk_count = self.index.len() as u32;
        let Some(writer) = self.file.as_mut() else {
            return Err(closed_error(&self.path));
        };
        for entry in &self.index {
            entry.write_to(writer).map_err(|e| StorageError::io(&self.path, e))?;
        }
        IndexTail { chunk_count, index_start_offset: index_start }
            .write_to(writer)
            .map_err(|e| StorageError::io(&self.path, e))?;

        // Flip HAS_INDEX in the already-written header.
        writer.flush().map_err(|e| StorageError::io(&self.path, e))?;
        let file = writer.get_mut();
        file.seek(SeekFrom::Start(HEADER_FLAGS_OFFSET))
            .map_err(|e| StorageError::io(&self.path, e))?;
        file.write_u32::<LittleEndian>(HEADER_FLAG_HAS_INDEX)
            .map_err(|e| StorageError::io(&self.path, e))?;
        file.seek(SeekFrom::End(0)).map_err(|e| StorageError::io(&self.path, e))?;
        Ok(())
    }
}

fn closed_error(path: &Path) -> StorageError {
    StorageError::Io {
        path: path.to_path_buf(),
        source: io::Error::new(io::ErrorKind::Other, "sink is closed"),
    }
}

impl EventSink for BinaryFileSink {
    fn append(&mut self, rec: &EventRecord) -> Result<(), StorageError> {
        self.buffer.push(DiskEventRecord::from(rec));
        if self.buffer.len() >= self.chunk_capacity {
            self.flush_chunk()?;
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<(), StorageError> {
        self.flush_chunk()?;
        let Some(writer) = self.file.as_mut() else {
            return Err(closed_error(&self.path));
        };
        writer.flush().map_err(|e| StorageError::io(&self.path, e))?;
        Ok(())
    }

    fn close(&mut self) -> Result<(), StorageError> {
        if self.file.is_none() {
            return Ok(());
        }
        self.flush_chunk()?;
        self.write_index()?;
        if let Some(mut writer) = self.file.take() {
            writer.flush().map_err(|e| StorageError::io(&self.path, e))?;
            writer.get_mut().sync_all().map_err(|e| StorageError::io(&self.path, e))?;
        }
        debug!(
            path = %self.path.display(),
            records = self.total_records,
            chunks = self.index.len(),
            "closed event log"
        );
        Ok(())
    }
}

impl Drop for BinaryFileSink {
    fn drop(&mut self) {
        if self.file.is_some() {
            if let Err(e) = self.close() {
                warn!(error = %e, "failed to close event log on drop");
            }
        }
    }
}
