//! On-disk layout: header, chunk, index and record encodings
//!
//! Every multi-byte field is little-endian and written through explicit
//! encoders; no struct is ever reinterpreted as raw bytes.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use common::{EventRecord, EventType, Side, TradingSession};
use std::io::{self, Read, Write};

/// File magic, first eight bytes of every log.
pub const LOG_MAGIC: [u8; 8] = *b"QRSDPLOG";
/// Footer index magic.
pub const INDEX_MAGIC: [u8; 4] = *b"QIDX";
/// Current major format version; readers reject anything else.
pub const LOG_VERSION_MAJOR: u16 = 1;
/// Current minor format version.
pub const LOG_VERSION_MINOR: u16 = 0;
/// Fixed size of one persisted record.
pub const RECORD_SIZE: u32 = 26;
/// Encoded file header size.
pub const FILE_HEADER_SIZE: u64 = 64;
/// Encoded chunk header size.
pub const CHUNK_HEADER_SIZE: u64 = 32;
/// Encoded index entry size.
pub const INDEX_ENTRY_SIZE: u64 = 32;
/// Encoded index tail size.
pub const INDEX_TAIL_SIZE: u64 = 16;
/// Byte offset of `header_flags` within the file header.
pub const HEADER_FLAGS_OFFSET: u64 = 52;
/// Records per chunk when the caller does not choose.
pub const DEFAULT_CHUNK_CAPACITY: u32 = 4096;
/// Header flag: the footer index was written on close.
pub const HEADER_FLAG_HAS_INDEX: u32 = 0x1;

/// 64-byte file header carrying the session parameters the file was
/// generated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileHeader {
    /// Major format version
    pub version_major: u16,
    /// Minor format version
    pub version_minor: u16,
    /// Size of one persisted record (always 26)
    pub record_size: u32,
    /// Session RNG seed
    pub seed: u64,
    /// Opening mid price in ticks
    pub p0_ticks: i32,
    /// Tick size in price-4 units
    pub tick_size: u32,
    /// Session length in seconds
    pub session_seconds: u32,
    /// Book levels per side
    pub levels_per_side: u32,
    /// Opening spread in ticks
    pub initial_spread_ticks: u32,
    /// Opening depth per level
    pub initial_depth: u32,
    /// Records per chunk
    pub chunk_capacity: u32,
    /// Flag bits (`HEADER_FLAG_HAS_INDEX`)
    pub header_flags: u32,
    /// Market open in nanoseconds after midnight
    pub market_open_ns: u64,
}

impl FileHeader {
    /// Build a header from session parameters, with no flags set.
    #[must_use]
    pub fn for_session(session: &TradingSession, chunk_capacity: u32) -> Self {
        Self {
            version_major: LOG_VERSION_MAJOR,
            version_minor: LOG_VERSION_MINOR,
            record_size: RECORD_SIZE,
            seed: session.seed,
            p0_ticks: session.p0_ticks,
            tick_size: session.tick_size,
            session_seconds: session.session_seconds,
            levels_per_side: session.levels_per_side,
            initial_spread_ticks: session.initial_spread_ticks,
            initial_depth: session.initial_depth,
            chunk_capacity,
            header_flags: 0,
            market_open_ns: u64::from(session.market_open_seconds) * 1_000_000_000,
        }
    }

    /// True if the footer index was written.
    #[must_use]
    pub const fn has_index(&self) -> bool {
        self.header_flags & HEADER_FLAG_HAS_INDEX != 0
    }

    /// Encode, magic first.
    ///
    /// # Errors
    ///
    /// Returns any error from the underlying writer.
    pub fn write_to<W: Write>(&self, w: &mut W) -> io::Result<()> {
        w.write_all(&LOG_MAGIC)?;
        w.write_u16::<LittleEndian>(self.version_major)?;
        w.write_u16::<LittleEndian>(self.version_minor)?;
        w.write_u32::<LittleEndian>(self.record_size)?;
        w.write_u64::<LittleEndian>(self.seed)?;
        w.write_i32::<LittleEndian>(self.p0_ticks)?;
        w.write_u32::<LittleEndian>(self.tick_size)?;
        w.write_u32::<LittleEndian>(self.session_seconds)?;
        w.write_u32::<LittleEndian>(self.levels_per_side)?;
        w.write_u32::<LittleEndian>(self.initial_spread_ticks)?;
        w.write_u32::<LittleEndian>(self.initial_depth)?;
        w.write_u32::<LittleEndian>(self.chunk_capacity)?;
        w.write_u32::<LittleEndian>(self.header_flags)?;
        w.write_u64::<LittleEndian>(self.market_open_ns)?;
        Ok(())
    }

    /// Decode the fields after the magic; returns the raw magic separately
    /// so the caller can validate it.
    ///
    /// # Errors
    ///
    /// Returns any error from the underlying reader (including EOF inside
    /// the header).
    pub fn read_from<R: Read>(r: &mut R) -> io::Result<([u8; 8], Self)> {
        let mut magic = [0u8; 8];
        r.read_exact(&mut magic)?;
        let header = Self {
            version_major: r.read_u16::<LittleEndian>()?,
            version_minor: r.read_u16::<LittleEndian>()?,
            record_size: r.read_u32::<LittleEndian>()?,
            seed: r.read_u64::<LittleEndian>()?,
            p0_ticks: r.read_i32::<LittleEndian>()?,
            tick_size: r.read_u32::<LittleEndian>()?,
            session_seconds: r.read_u32::<LittleEndian>()?,
            levels_per_side: r.read_u32::<LittleEndian>()?,
            initial_spread_ticks: r.read_u32::<LittleEndian>()?,
            initial_depth: r.read_u32::<LittleEndian>()?,
            chunk_capacity: r.read_u32::<LittleEndian>()?,
            header_flags: r.read_u32::<LittleEndian>()?,
            market_open_ns: r.read_u64::<LittleEndian>()?,
        };
        Ok((magic, header))
    }
}

/// 32-byte header preceding each compressed chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ChunkHeader {
    /// Raw payload size before compression
    pub uncompressed_size: u32,
    /// Compressed payload size following this header
    pub compressed_size: u32,
    /// Records in the chunk
    pub record_count: u32,
    /// Reserved flag bits
    pub chunk_flags: u32,
    /// Timestamp of the first record
    pub first_ts_ns: u64,
    /// Timestamp of the last record
    pub last_ts_ns: u64,
}

impl ChunkHeader {
    /// Encode little-endian.
    ///
    /// # Errors
    ///
    /// Returns any error from the underlying writer.
    pub fn write_to<W: Write>(&self, w: &mut W) -> io::Result<()> {
        w.write_u32::<LittleEndian>(self.uncompressed_size)?;
        w.write_u32::<LittleEndian>(self.compressed_size)?;
        w.write_u32::<LittleEndian>(self.record_count)?;
        w.write_u32::<LittleEndian>(self.chunk_flags)?;
        w.write_u64::<LittleEndian>(self.first_ts_ns)?;
        w.write_u64::<LittleEndian>(self.last_ts_ns)?;
        Ok(())
    }

    /// Decode little-endian.
    ///
    /// # Errors
    ///
    /// Returns any error from the underlying reader.
    pub fn read_from<R: Read>(r: &mut R) -> io::Result<Self> {
        Ok(Self {
            uncompressed_size: r.read_u32::<LittleEndian>()?,
            compressed_size: r.read_u32::<LittleEndian>()?,
            record_count: r.read_u32::<LittleEndian>()?,
            chunk_flags: r.read_u32::<LittleEndian>()?,
            first_ts_ns: r.read_u64::<LittleEndian>()?,
            last_ts_ns: r.read_u64::<LittleEndian>()?,
        })
    }
}

/// 32-byte footer index entry, one per chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct IndexEntry {
    /// File offset of the chunk header
    pub file_offset: u64,
    /// Timestamp of the chunk's first record
    pub first_ts_ns: u64,
    /// Timestamp of the chunk's last record
    pub last_ts_ns: u64,
    /// Records in the chunk
    pub record_count: u32,
    /// Reserved, written as zero
    pub reserved: u32,
}

impl IndexEntry {
    /// Encode little-endian.
    ///
    /// # Errors
    ///
    /// Returns any error from the underlying writer.
    pub fn write_to<W: Write>(&self, w: &mut W) -> io::Result<()> {
        w.write_u64::<LittleEndian>(self.file_offset)?;
        w.write_u64::<LittleEndian>(self.first_ts_ns)?;
        w.write_u64::<LittleEndian>(self.last_ts_ns)?;
        w.write_u32::<LittleEndian>(self.record_count)?;
        w.write_u32::<LittleEndian>(self.reserved)?;
        Ok(())
    }

    /// Decode little-endian.
    ///
    /// # Errors
    ///
    /// Returns any error from the underlying reader.
    pub fn read_from<R: Read>(r: &mut R) -> io::Result<Self> {
        Ok(Self {
            file_offset: r.read_u64::<LittleEndian>()?,
            first_ts_ns: r.read_u64::<LittleEndian>()?,
            last_ts_ns: r.read_u64::<LittleEndian>()?,
            record_count: r.read_u32::<LittleEndian>()?,
            reserved: r.read_u32::<LittleEndian>()?,
        })
    }
}

/// 16-byte index tail at the very end of an indexed file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexTail {
    /// Number of index entries in the footer
    pub chunk_count: u32,
    /// Offset of the first index entry
    pub index_start_offset: u64,
}

impl IndexTail {
    /// Encode little-endian, magic between count and offset.
    ///
    /// # Errors
    ///
    /// Returns any error from the underlying writer.
    pub fn write_to<W: Write>(&self, w: &mut W) -> io::Result<()> {
        w.write_u32::<LittleEndian>(self.chunk_count)?;
        w.write_all(&INDEX_MAGIC)?;
        w.write_u64::<LittleEndian>(self.index_start_offset)?;
        Ok(())
    }

    /// Decode; returns the raw magic for the caller to validate.
    ///
    /// # Errors
    ///
    /// Returns any error from the underlying reader.
    pub fn read_from<R: Read>(r: &mut R) -> io::Result<([u8; 4], Self)> {
        let chunk_count = r.read_u32::<LittleEndian>()?;
        let mut magic = [0u8; 4];
        r.read_exact(&mut magic)?;
        let index_start_offset = r.read_u64::<LittleEndian>()?;
        Ok((magic, Self { chunk_count, index_start_offset }))
    }
}

/// Packed 26-byte on-disk record: the in-memory record minus its flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiskEventRecord {
    /// Simulated nanoseconds since session start
    pub ts_ns: u64,
    /// Raw event-type byte
    pub event_type: u8,
    /// Raw side byte
    pub side: u8,
    /// Signed price in ticks
    pub price_ticks: i32,
    /// Quantity
    pub qty: u32,
    /// Per-session order identifier
    pub order_id: u64,
}

impl DiskEventRecord {
    /// Encode little-endian (26 bytes).
    ///
    /// # Errors
    ///
    /// Returns any error from the underlying writer.
    pub fn write_to<W: Write>(&self, w: &mut W) -> io::Result<()> {
        w.write_u64::<LittleEndian>(self.ts_ns)?;
        w.write_u8(self.event_type)?;
        w.write_u8(self.side)?;
        w.write_i32::<LittleEndian>(self.price_ticks)?;
        w.write_u32::<LittleEndian>(self.qty)?;
        w.write_u64::<LittleEndian>(self.order_id)?;
        Ok(())
    }

    /// Decode little-endian.
    ///
    /// # Errors
    ///
    /// Returns any error from the underlying reader.
    pub fn read_from<R: Read>(r: &mut R) -> io::Result<Self> {
        Ok(Self {
            ts_ns: r.read_u64::<LittleEndian>()?,
            event_type: r.read_u8()?,
            side: r.read_u8()?,
            price_ticks: r.read_i32::<LittleEndian>()?,
            qty: r.read_u32::<LittleEndian>()?,
            order_id: r.read_u64::<LittleEndian>()?,
        })
    }

    /// Lift back into an in-memory record (flags zero). `None` if the type
    /// or side byte is out of range.
    #[must_use]
    pub fn to_event_record(&self) -> Option<EventRecord> {
        Some(EventRecord {
            ts_ns: self.ts_ns,
            event_type: EventType::from_u8(self.event_type)?,
            side: Side::from_u8(self.side)?,
            price_ticks: self.price_ticks,
            qty: self.qty,
            order_id: self.order_id,
            flags: 0,
        })
    }
}

impl From<&EventRecord> for DiskEventRecord {
    fn from(rec: &EventRecord) -> Self {
        Self {
            ts_ns: rec.ts_ns,
            event_type: rec.event_type.as_u8(),
            side: rec.side.as_u8(),
            price_ticks: rec.price_ticks,
            qty: rec.qty,
            order_id: rec.order_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::{IntensityParams, QueueReactiveParams};

    fn sample_session() -> TradingSession {
        TradingSession {
            seed: 42,
            p0_ticks: 10_000,
            session_seconds: 23_400,
            levels_per_side: 5,
            tick_size: 100,
            initial_spread_ticks: 2,
            initial_depth: 5,
            market_open_seconds: 34_200,
            intensity: IntensityParams::default(),
            queue_reactive: QueueReactiveParams::default(),
        }
    }

    #[test]
    fn encoded_sizes_match_the_format() {
        let mut buf = Vec::new();
        FileHeader::for_session(&sample_session(), 4096).write_to(&mut buf).unwrap();
        assert_eq!(buf.len() as u64, FILE_HEADER_SIZE);

        buf.clear();
        ChunkHeader::default().write_to(&mut buf).unwrap();
        assert_eq!(buf.len() as u64, CHUNK_HEADER_SIZE);

        buf.clear();
        IndexEntry::default().write_to(&mut buf).unwrap();
        assert_eq!(buf.len() as u64, INDEX_ENTRY_SIZE);

        buf.clear();
        IndexTail { chunk_count: 0, index_start_offset: 0 }.write_to(&mut buf).unwrap();
        assert_eq!(buf.len() as u64, INDEX_TAIL_SIZE);

        buf.clear();
        DiskEventRecord::from(&sample_record()).write_to(&mut buf).unwrap();
        assert_eq!(buf.len() as u64, u64::from(RECORD_SIZE));
    }

    fn sample_record() -> EventRecord {
        EventRecord {
            ts_ns: 1_000_000,
            event_type: EventType::AddBid,
            side: Side::Bid,
            price_ticks: 9_999,
            qty: 1,
            order_id: 7,
            flags: common::FLAG_SHIFT_DOWN,
        }
    }

    #[test]
    fn header_flags_offset_is_stable() {
        let mut header = FileHeader::for_session(&sample_session(), 4096);
        header.header_flags = HEADER_FLAG_HAS_INDEX;
        let mut buf = Vec::new();
        header.write_to(&mut buf).unwrap();
        let at_offset =
            u32::from_le_bytes(buf[HEADER_FLAGS_OFFSET as usize..][..4].try_into().unwrap());
        assert_eq!(at_offset, HEADER_FLAG_HAS_INDEX);
    }

    #[test]
    fn file_header_round_trip() {
        let header = FileHeader::for_session(&sample_session(), 128);
        let mut buf = Vec::new();
        header.write_to(&mut buf).unwrap();
        let (magic, decoded) = FileHeader::read_from(&mut buf.as_slice()).unwrap();
        assert_eq!(magic, LOG_MAGIC);
        assert_eq!(decoded, header);
        assert_eq!(decoded.market_open_ns, 34_200_000_000_000);
    }

    #[test]
    fn disk_record_round_trip_strips_flags() {
        let rec = sample_record();
        let disk = DiskEventRecord::from(&rec);
        let mut buf = Vec::new();
        disk.write_to(&mut buf).unwrap();
        let decoded = DiskEventRecord::read_from(&mut buf.as_slice()).unwrap();
        assert_eq!(decoded, disk);

        let lifted = decoded.to_event_record().unwrap();
        assert_eq!(lifted.flags, 0);
        assert_eq!(lifted.event_type, rec.event_type);
        assert_eq!(lifted.order_id, rec.order_id);
    }

    #[test]
    fn bad_type_byte_does_not_lift() {
        let disk = DiskEventRecord {
            ts_ns: 0,
            event_type: 9,
            side: 0,
            price_ticks: 0,
            qty: 0,
            order_id: 0,
        };
        assert!(disk.to_event_record().is_none());
    }

    #[test]
    fn index_tail_round_trip() {
        let tail = IndexTail { chunk_count: 7, index_start_offset: 4096 };
        let mut buf = Vec::new();
        tail.write_to(&mut buf).unwrap();
        let (magic, decoded) = IndexTail::read_from(&mut buf.as_slice()).unwrap();
        assert_eq!(magic, INDEX_MAGIC);
        assert_eq!(decoded, tail);
    }
}
