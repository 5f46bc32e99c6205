//! ITCH 5.0 message constants and decoding
//!
//! Message sizes follow the NASDAQ ITCH 5.0 specification for the subset in
//! use: System Event (12), Stock Directory (39), Add Order (36), Order
//! Delete (19), Order Executed (31). All multi-byte fields are network byte
//! order; timestamps are the low 48 bits of a nanosecond count, big-endian.

use thiserror::Error;

/// 'S' System Event message type byte.
pub const MSG_SYSTEM_EVENT: u8 = b'S';
/// 'R' Stock Directory message type byte.
pub const MSG_STOCK_DIRECTORY: u8 = b'R';
/// 'A' Add Order (no MPID) message type byte.
pub const MSG_ADD_ORDER: u8 = b'A';
/// 'D' Order Delete message type byte.
pub const MSG_ORDER_DELETE: u8 = b'D';
/// 'E' Order Executed message type byte.
pub const MSG_ORDER_EXECUTED: u8 = b'E';

/// System Event: start of messages.
pub const EVENT_START_OF_MESSAGES: u8 = b'O';
/// System Event: start of system hours.
pub const EVENT_START_OF_SYSTEM: u8 = b'S';
/// System Event: start of market hours.
pub const EVENT_START_OF_MARKET: u8 = b'Q';
/// System Event: end of market hours.
pub const EVENT_END_OF_MARKET: u8 = b'M';
/// System Event: end of messages.
pub const EVENT_END_OF_MESSAGES: u8 = b'E';

/// Encoded size of a System Event message.
pub const SYSTEM_EVENT_SIZE: usize = 12;
/// Encoded size of a Stock Directory message.
pub const STOCK_DIRECTORY_SIZE: usize = 39;
/// Encoded size of an Add Order message.
pub const ADD_ORDER_SIZE: usize = 36;
/// Encoded size of an Order Delete message.
pub const ORDER_DELETE_SIZE: usize = 19;
/// Encoded size of an Order Executed message.
pub const ORDER_EXECUTED_SIZE: usize = 31;

/// Errors from the wire pipeline: decoding and framing.
#[derive(Debug, Error)]
pub enum WireError {
    /// First byte is not a known message type.
    #[error("unknown ITCH message type {0:#04x}")]
    UnknownMessageType(u8),

    /// Buffer is shorter than the fixed size for its message type.
    #[error("truncated message: got {got} bytes, need {need}")]
    Truncated {
        /// Bytes available
        got: usize,
        /// Bytes the message type requires
        need: usize,
    },

    /// A message block cannot fit in a MoldUDP64 packet at all.
    #[error("message of {len} bytes exceeds the packet payload limit")]
    MessageTooLarge {
        /// Offending message length
        len: usize,
    },

    /// A MoldUDP64 packet's count field disagrees with its payload.
    #[error("malformed MoldUDP64 packet")]
    MalformedPacket,
}

/// A decoded ITCH message, used by the listener tool and round-trip tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodedMessage {
    /// 'S' System Event
    SystemEvent {
        /// Locate code
        stock_locate: u16,
        /// Nanoseconds (low 48 bits)
        timestamp_ns: u64,
        /// Event code byte
        event_code: u8,
    },
    /// 'R' Stock Directory
    StockDirectory {
        /// Locate code
        stock_locate: u16,
        /// Nanoseconds (low 48 bits)
        timestamp_ns: u64,
        /// Space-padded 8-byte symbol
        stock: [u8; 8],
        /// Round lot size
        round_lot_size: u32,
    },
    /// 'A' Add Order
    AddOrder {
        /// Locate code
        stock_locate: u16,
        /// Nanoseconds (low 48 bits)
        timestamp_ns: u64,
        /// Order reference number
        order_reference: u64,
        /// b'B' or b'S'
        buy_sell: u8,
        /// Displayed shares
        shares: u32,
        /// Space-padded 8-byte symbol
        stock: [u8; 8],
        /// Price in price-4 units
        price: u32,
    },
    /// 'D' Order Delete
    OrderDelete {
        /// Locate code
        stock_locate: u16,
        /// Nanoseconds (low 48 bits)
        timestamp_ns: u64,
        /// Order reference number
        order_reference: u64,
    },
    /// 'E' Order Executed
    OrderExecuted {
        /// Locate code
        stock_locate: u16,
        /// Nanoseconds (low 48 bits)
        timestamp_ns: u64,
        /// Order reference number
        order_reference: u64,
        /// Shares executed
        executed_shares: u32,
        /// Monotonic match number
        match_number: u64,
    },
}

/// Decode one ITCH message from `data`.
///
/// # Errors
///
/// [`WireError::UnknownMessageType`] for an unrecognized first byte,
/// [`WireError::Truncated`] when `data` is shorter than the type's fixed
/// size.
pub fn decode_message(data: &[u8]) -> Result<DecodedMessage, WireError> {
    let Some(&msg_type) = data.first() else {
        return Err(WireError::Truncated { got: 0, need: 1 });
    };
    match msg_type {
        MSG_SYSTEM_EVENT => {
            require(data, SYSTEM_EVENT_SIZE)?;
            Ok(DecodedMessage::SystemEvent {
                stock_locate: read_u16(data, 1),
                timestamp_ns: read_u48(data, 5),
                event_code: data[11],
            })
        }
        MSG_STOCK_DIRECTORY => {
            require(data, STOCK_DIRECTORY_SIZE)?;
            Ok(DecodedMessage::StockDirectory {
                stock_locate: read_u16(data, 1),
                timestamp_ns: read_u48(data, 5),
                stock: read_stock(data, 11),
                round_lot_size: read_u32(data, 21),
            })
        }
        MSG_ADD_ORDER => {
            require(data, ADD_ORDER_SIZE)?;
            Ok(DecodedMessage::AddOrder {
                stock_locate: read_u16(data, 1),
                timestamp_ns: read_u48(data, 5),
                order_reference: read_u64(data, 11),
                buy_sell: data[19],
                shares: read_u32(data, 20),
                stock: read_stock(data, 24),
                price: read_u32(data, 32),
            })
        }
        MSG_ORDER_DELETE => {
            require(data, ORDER_DELETE_SIZE)?;
            Ok(DecodedMessage::OrderDelete {
                stock_locate: read_u16(data, 1),
                timestamp_ns: read_u48(data, 5),
                order_reference: read_u64(data, 11),
            })
        }
        MSG_ORDER_EXECUTED => {
            require(data, ORDER_EXECUTED_SIZE)?;
            Ok(DecodedMessage::OrderExecuted {
                stock_locate: read_u16(data, 1),
                timestamp_ns: read_u48(data, 5),
                order_reference: read_u64(data, 11),
                executed_shares: read_u32(data, 19),
                match_number: read_u64(data, 23),
            })
        }
        other => Err(WireError::UnknownMessageType(other)),
    }
}

fn require(data: &[u8], need: usize) -> Result<(), WireError> {
    if data.len() < need {
        return Err(WireError::Truncated { got: data.len(), need });
    }
    Ok(())
}

fn read_u16(data: &[u8], at: usize) -> u16 {
    u16::from_be_bytes([data[at], data[at + 1]])
}

fn read_u32(data: &[u8], at: usize) -> u32 {
    u32::from_be_bytes([data[at], data[at + 1], data[at + 2], data[at + 3]])
}

fn read_u64(data: &[u8], at: usize) -> u64 {
    u64::from_be_bytes([
        data[at],
        data[at + 1],
        data[at + 2],
        data[at + 3],
        data[at + 4],
        data[at + 5],
        data[at + 6],
        data[at + 7],
    ])
}

/// Load a 6-byte big-endian timestamp into the low 48 bits.
fn read_u48(data: &[u8], at: usize) -> u64 {
    u64::from_be_bytes([
        0,
        0,
        data[at],
        data[at + 1],
        data[at + 2],
        data[at + 3],
        data[at + 4],
        data[at + 5],
    ])
}

fn read_stock(data: &[u8], at: usize) -> [u8; 8] {
    let mut stock = [0u8; 8];
    stock.copy_from_slice(&data[at..at + 8]);
    stock
}
