//! End-to-end persistence tests: write with the file sink, read back with
//! the reader, including crash-recovery and range-query behavior.

use common::{EventRecord, EventType, Side, TradingSession};
use std::fs::OpenOptions;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;
use storage::format::{HEADER_FLAGS_OFFSET, INDEX_TAIL_SIZE};
use storage::{BinaryFileSink, EventLogReader, EventSink};
use tempfile::TempDir;

fn make_records(n: u64) -> Vec<EventRecord> {
    (0..n)
        .map(|i| EventRecord {
            ts_ns: i * 1_000_000,
            event_type: EventType::from_u8((i % 6) as u8).unwrap(),
            side: if i % 2 == 0 { Side::Bid } else { Side::Ask },
            price_ticks: 50_000 + (i % 20) as i32,
            qty: 1,
            order_id: i + 1,
            flags: if i % 7 == 0 { common::FLAG_SHIFT_UP } else { 0 },
        })
        .collect()
}

fn write_log(path: &Path, records: &[EventRecord], chunk_capacity: u32) {
    let mut sink = BinaryFileSink::create(path, &TradingSession::default(), chunk_capacity).unwrap();
    for rec in records {
        sink.append(rec).unwrap();
    }
    sink.close().unwrap();
}

#[test]
fn fifty_records_round_trip_in_seven_chunks() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("day.qrsdp");
    let records = make_records(50);
    write_log(&path, &records, 8);

    let mut reader = EventLogReader::open(&path).unwrap();
    assert_eq!(reader.chunk_count(), 7); // 6 full chunks of 8 plus one of 2
    assert_eq!(reader.total_records(), 50);
    assert!(reader.header().has_index());

    let read = reader.read_all().unwrap();
    assert_eq!(read.len(), 50);
    for (disk, orig) in read.iter().zip(&records) {
        assert_eq!(disk.ts_ns, orig.ts_ns);
        assert_eq!(disk.event_type, orig.event_type.as_u8());
        assert_eq!(disk.side, orig.side.as_u8());
        assert_eq!(disk.price_ticks, orig.price_ticks);
        assert_eq!(disk.qty, orig.qty);
        assert_eq!(disk.order_id, orig.order_id);
    }

    // The last, partial chunk decompresses on its own too.
    let tail_chunk = reader.read_chunk(6).unwrap();
    assert_eq!(tail_chunk.len(), 2);
    assert_eq!(tail_chunk[0].order_id, 49);
}

#[test]
fn scan_recovery_after_lost_footer() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("crashed.qrsdp");
    let records = make_records(50);
    write_log(&path, &records, 8);

    // Simulate a crash before close: clear HAS_INDEX and drop the footer.
    let index_start = {
        let mut file = OpenOptions::new().read(true).open(&path).unwrap();
        file.seek(SeekFrom::End(-(INDEX_TAIL_SIZE as i64))).unwrap();
        let mut tail = [0u8; 16];
        file.read_exact(&mut tail).unwrap();
        u64::from_le_bytes(tail[8..16].try_into().unwrap())
    };
    let mut file = OpenOptions::new().write(true).open(&path).unwrap();
    file.set_len(index_start).unwrap();
    file.seek(SeekFrom::Start(HEADER_FLAGS_OFFSET)).unwrap();
    file.write_all(&0u32.to_le_bytes()).unwrap();
    drop(file);

    let mut reader = EventLogReader::open(&path).unwrap();
    assert!(!reader.header().has_index());
    assert_eq!(reader.chunk_count(), 7);
    assert_eq!(reader.total_records(), 50);

    let read = reader.read_all().unwrap();
    assert_eq!(read.len(), 50);
    assert_eq!(read[49].order_id, 50);
}

#[test]
fn empty_log_reports_zero_chunks() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("empty.qrsdp");
    write_log(&path, &[], 8);

    let mut reader = EventLogReader::open(&path).unwrap();
    assert_eq!(reader.chunk_count(), 0);
    assert_eq!(reader.total_records(), 0);
    assert!(reader.read_all().unwrap().is_empty());
}

#[test]
fn range_query_is_chunk_granular() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("range.qrsdp");
    // 40 records at 1ms spacing, 8 per chunk: chunk k covers [8k, 8k+7] ms.
    write_log(&path, &make_records(40), 8);
    let mut reader = EventLogReader::open(&path).unwrap();

    // No overlap past the end of the data.
    let none = reader.read_range(1_000_000_000, 2_000_000_000).unwrap();
    assert!(none.is_empty());

    // A query inside chunk 1 returns the whole chunk.
    let one = reader.read_range(9_000_000, 10_000_000).unwrap();
    assert_eq!(one.len(), 8);
    assert_eq!(one[0].ts_ns, 8_000_000);

    // Straddling the chunk 1 / chunk 2 boundary returns both chunks.
    let two = reader.read_range(15_000_000, 16_000_000).unwrap();
    assert_eq!(two.len(), 16);
}

#[test]
fn bad_magic_is_rejected() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("not_a_log.qrsdp");
    std::fs::write(&path, b"definitely not a qrsdp log, nope").unwrap();
    let err = EventLogReader::open(&path).unwrap_err();
    assert!(matches!(err, storage::StorageError::BadMagic { .. }));
}

#[test]
fn chunk_index_out_of_range_is_typed() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("small.qrsdp");
    write_log(&path, &make_records(4), 8);
    let mut reader = EventLogReader::open(&path).unwrap();
    let err = reader.read_chunk(5).unwrap_err();
    assert!(matches!(err, storage::StorageError::ChunkOutOfRange { idx: 5, count: 1 }));
}
