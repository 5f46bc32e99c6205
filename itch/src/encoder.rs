//! Per-symbol ITCH 5.0 encoder

use crate::messages::{
    ADD_ORDER_SIZE, MSG_ADD_ORDER, MSG_ORDER_DELETE, MSG_ORDER_EXECUTED, MSG_STOCK_DIRECTORY,
    MSG_SYSTEM_EVENT, ORDER_DELETE_SIZE, ORDER_EXECUTED_SIZE, STOCK_DIRECTORY_SIZE,
    SYSTEM_EVENT_SIZE,
};
use common::{EventRecord, EventType};

/// Encodes event records into ITCH 5.0 messages for one symbol. Carries the
/// symbol (space-padded to 8 bytes), the locate code, the tick size used to
/// scale tick prices into price-4 units, and the monotonic match number for
/// executions.
#[derive(Debug, Clone)]
pub struct ItchEncoder {
    symbol: [u8; 8],
    locate: u16,
    tick_size: u32,
    match_number: u64,
}

impl ItchEncoder {
    /// Build an encoder. `symbol` is truncated or right-padded with spaces
    /// to exactly 8 bytes.
    #[must_use]
    pub fn new(symbol: &str, locate: u16, tick_size: u32) -> Self {
        let mut padded = [b' '; 8];
        for (dst, src) in padded.iter_mut().zip(symbol.bytes()) {
            *dst = src;
        }
        Self { symbol: padded, locate, tick_size, match_number: 1 }
    }

    /// Match number the next execution will carry.
    #[must_use]
    pub const fn next_match_number(&self) -> u64 {
        self.match_number
    }

    /// Encode one record: adds become 'A', cancels 'D', executions 'E'.
    /// Executions advance the match number on every call.
    #[must_use]
    #[allow(clippy::cast_sign_loss)]
    pub fn encode(&mut self, rec: &EventRecord) -> Vec<u8> {
        match rec.event_type {
            EventType::AddBid | EventType::AddAsk => {
                let mut out = Vec::with_capacity(ADD_ORDER_SIZE);
                out.push(MSG_ADD_ORDER);
                out.extend_from_slice(&self.locate.to_be_bytes());
                out.extend_from_slice(&0u16.to_be_bytes()); // tracking number
                push_timestamp48(&mut out, rec.ts_ns);
                out.extend_from_slice(&rec.order_id.to_be_bytes());
                out.push(if rec.event_type == EventType::AddBid { b'B' } else { b'S' });
                out.extend_from_slice(&rec.qty.to_be_bytes());
                out.extend_from_slice(&self.symbol);
                let price = (rec.price_ticks as u32).wrapping_mul(self.tick_size);
                out.extend_from_slice(&price.to_be_bytes());
                out
            }
            EventType::CancelBid | EventType::CancelAsk => {
                let mut out = Vec::with_capacity(ORDER_DELETE_SIZE);
                out.push(MSG_ORDER_DELETE);
                out.extend_from_slice(&self.locate.to_be_bytes());
                out.extend_from_slice(&0u16.to_be_bytes());
                push_timestamp48(&mut out, rec.ts_ns);
                out.extend_from_slice(&rec.order_id.to_be_bytes());
                out
            }
            EventType::ExecuteBuy | EventType::ExecuteSell => {
                let mut out = Vec::with_capacity(ORDER_EXECUTED_SIZE);
                out.push(MSG_ORDER_EXECUTED);
                out.extend_from_slice(&self.locate.to_be_bytes());
                out.extend_from_slice(&0u16.to_be_bytes());
                push_timestamp48(&mut out, rec.ts_ns);
                out.extend_from_slice(&rec.order_id.to_be_bytes());
                out.extend_from_slice(&rec.qty.to_be_bytes());
                out.extend_from_slice(&self.match_number.to_be_bytes());
                self.match_number += 1;
                out
            }
        }
    }

    /// Encode an 'S' System Event message.
    #[must_use]
    pub fn encode_system_event(&self, event_code: u8, ts_ns: u64) -> Vec<u8> {
        let mut out = Vec::with_capacity(SYSTEM_EVENT_SIZE);
        out.push(MSG_SYSTEM_EVENT);
        out.extend_from_slice(&self.locate.to_be_bytes());
        out.extend_from_slice(&0u16.to_be_bytes());
        push_timestamp48(&mut out, ts_ns);
        out.push(event_code);
        out
    }

    /// Encode an 'R' Stock Directory message for this symbol with the
    /// standard field defaults: NASDAQ Global Select, normal financial
    /// status, 100-share round lots, production authenticity.
    #[must_use]
    pub fn encode_stock_directory(&self, ts_ns: u64) -> Vec<u8> {
        let mut out = Vec::with_capacity(STOCK_DIRECTORY_SIZE);
        out.push(MSG_STOCK_DIRECTORY);
        out.extend_from_slice(&self.locate.to_be_bytes());
        out.extend_from_slice(&0u16.to_be_bytes());
        push_timestamp48(&mut out, ts_ns);
        out.extend_from_slice(&self.symbol);
        out.push(b'Q'); // market category: NASDAQ Global Select
        out.push(b'N'); // financial status: normal
        out.extend_from_slice(&100u32.to_be_bytes()); // round lot size
        out.push(b'N'); // round lots only
        out.push(b'A'); // issue classification
        out.extend_from_slice(b"Z "); // issue sub-type
        out.push(b'P'); // authenticity: production
        out.push(b'N'); // short sale threshold
        out.push(b' '); // ipo flag
        out.push(b' '); // luld reference price tier
        out.push(b'N'); // etp flag
        out.extend_from_slice(&0u32.to_be_bytes()); // etp leverage factor
        out.push(b'N'); // inverse indicator
        out
    }
}

/// Append the low 48 bits of `ts_ns` in big-endian order.
fn push_timestamp48(out: &mut Vec<u8>, ts_ns: u64) {
    let be = ts_ns.to_be_bytes();
    out.extend_from_slice(&be[2..8]);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::{decode_message, DecodedMessage};
    use common::Side;

    fn record(event_type: EventType, ts_ns: u64, order_id: u64, price_ticks: i32, qty: u32) -> EventRecord {
        EventRecord {
            ts_ns,
            event_type,
            side: Side::Bid,
            price_ticks,
            qty,
            order_id,
            flags: 0,
        }
    }

    #[test]
    fn add_order_wire_layout() {
        let mut enc = ItchEncoder::new("AAPL", 1, 100);
        let bytes = enc.encode(&record(EventType::AddBid, 1_000_000, 42, 10_050, 10));
        assert_eq!(bytes.len(), ADD_ORDER_SIZE);
        assert_eq!(bytes[0], b'A');
        assert_eq!(&bytes[1..3], &1u16.to_be_bytes());
        assert_eq!(bytes[19], b'B');
        assert_eq!(&bytes[20..24], &10u32.to_be_bytes());
        assert_eq!(&bytes[24..32], b"AAPL    ");
        assert_eq!(&bytes[32..36], &1_005_000u32.to_be_bytes());

        match decode_message(&bytes).unwrap() {
            DecodedMessage::AddOrder {
                stock_locate,
                timestamp_ns,
                order_reference,
                buy_sell,
                shares,
                stock,
                price,
            } => {
                assert_eq!(stock_locate, 1);
                assert_eq!(timestamp_ns, 1_000_000);
                assert_eq!(order_reference, 42);
                assert_eq!(buy_sell, b'B');
                assert_eq!(shares, 10);
                assert_eq!(&stock, b"AAPL    ");
                assert_eq!(price, 1_005_000);
            }
            other => panic!("expected AddOrder, got {other:?}"),
        }
    }

    #[test]
    fn ask_adds_are_sell_side() {
        let mut enc = ItchEncoder::new("AAPL", 1, 100);
        let bytes = enc.encode(&record(EventType::AddAsk, 0, 1, 10_000, 1));
        assert_eq!(bytes[19], b'S');
    }

    #[test]
    fn delete_and_execute_layouts() {
        let mut enc = ItchEncoder::new("MSFT", 7, 100);

        let del = enc.encode(&record(EventType::CancelAsk, 5_000, 9, 10_000, 1));
        assert_eq!(del.len(), ORDER_DELETE_SIZE);
        assert_eq!(del[0], b'D');
        assert_eq!(&del[11..19], &9u64.to_be_bytes());

        let exec = enc.encode(&record(EventType::ExecuteBuy, 6_000, 10, 10_001, 1));
        assert_eq!(exec.len(), ORDER_EXECUTED_SIZE);
        assert_eq!(exec[0], b'E');
        match decode_message(&exec).unwrap() {
            DecodedMessage::OrderExecuted { match_number, executed_shares, .. } => {
                assert_eq!(match_number, 1);
                assert_eq!(executed_shares, 1);
            }
            other => panic!("expected OrderExecuted, got {other:?}"),
        }
    }

    #[test]
    fn match_number_is_monotonic_per_execution() {
        let mut enc = ItchEncoder::new("AAPL", 1, 100);
        assert_eq!(enc.next_match_number(), 1);
        for expected in 1..=5u64 {
            let bytes = enc.encode(&record(EventType::ExecuteSell, 0, expected, 9_999, 1));
            match decode_message(&bytes).unwrap() {
                DecodedMessage::OrderExecuted { match_number, .. } => {
                    assert_eq!(match_number, expected);
                }
                other => panic!("expected OrderExecuted, got {other:?}"),
            }
        }
        // Cancels do not advance it.
        let _ = enc.encode(&record(EventType::CancelBid, 0, 6, 9_999, 1));
        assert_eq!(enc.next_match_number(), 6);
    }

    #[test]
    fn long_symbols_truncate_and_short_ones_pad() {
        let mut enc = ItchEncoder::new("VERYLONGNAME", 1, 100);
        let bytes = enc.encode(&record(EventType::AddBid, 0, 1, 1, 1));
        assert_eq!(&bytes[24..32], b"VERYLONG");

        let mut enc = ItchEncoder::new("GE", 1, 100);
        let bytes = enc.encode(&record(EventType::AddBid, 0, 1, 1, 1));
        assert_eq!(&bytes[24..32], b"GE      ");
    }

    #[test]
    fn timestamp_keeps_low_48_bits() {
        let enc = ItchEncoder::new("AAPL", 1, 100);
        let ts = 0xFFFF_1234_5678_9ABC;
        let bytes = enc.encode_system_event(crate::messages::EVENT_START_OF_MARKET, ts);
        assert_eq!(bytes.len(), SYSTEM_EVENT_SIZE);
        match decode_message(&bytes).unwrap() {
            DecodedMessage::SystemEvent { timestamp_ns, event_code, .. } => {
                assert_eq!(timestamp_ns, 0x1234_5678_9ABC);
                assert_eq!(event_code, b'Q');
            }
            other => panic!("expected SystemEvent, got {other:?}"),
        }
    }

    #[test]
    fn stock_directory_carries_defaults() {
        let enc = ItchEncoder::new("AAPL", 3, 100);
        let bytes = enc.encode_stock_directory(1_000);
        assert_eq!(bytes.len(), STOCK_DIRECTORY_SIZE);
        match decode_message(&bytes).unwrap() {
            DecodedMessage::StockDirectory { stock_locate, stock, round_lot_size, .. } => {
                assert_eq!(stock_locate, 3);
                assert_eq!(&stock, b"AAPL    ");
                assert_eq!(round_lot_size, 100);
            }
            other => panic!("expected StockDirectory, got {other:?}"),
        }
    }
}
