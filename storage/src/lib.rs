//! Binary event-log persistence for simulated sessions
//!
//! The on-disk format is a 64-byte file header, a sequence of LZ4-compressed
//! record chunks, and an optional footer index that makes chunk lookup O(1).
//! Files without the footer (e.g. after a crash) remain readable via a
//! sequential header scan.

#![deny(warnings)]
#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![deny(dead_code)]
#![deny(unused)]
#![deny(missing_docs)]
#![forbid(unsafe_code)]

pub mod error;
pub mod file_sink;
pub mod format;
pub mod reader;
pub mod sink;

pub use error::StorageError;
pub use file_sink::BinaryFileSink;
pub use format::{ChunkHeader, DiskEventRecord, FileHeader, IndexEntry, IndexTail};
pub use reader::EventLogReader;
pub use sink::{EventSink, InMemorySink, MultiplexSink};
