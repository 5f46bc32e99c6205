//! Event, book and intensity types shared by every subsystem

use std::fmt;

/// Event category for competing-intensity sampling (6-way categorical).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum EventType {
    /// Limit order added on the bid side
    AddBid = 0,
    /// Limit order added on the ask side
    AddAsk = 1,
    /// Cancellation on the bid side
    CancelBid = 2,
    /// Cancellation on the ask side
    CancelAsk = 3,
    /// Market buy consuming the best ask
    ExecuteBuy = 4,
    /// Market sell consuming the best bid
    ExecuteSell = 5,
}

impl EventType {
    /// All categories in fixed traversal order, used for categorical draws.
    pub const ALL: [Self; 6] = [
        Self::AddBid,
        Self::AddAsk,
        Self::CancelBid,
        Self::CancelAsk,
        Self::ExecuteBuy,
        Self::ExecuteSell,
    ];

    /// Decode from the on-disk byte.
    #[must_use]
    pub const fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(Self::AddBid),
            1 => Some(Self::AddAsk),
            2 => Some(Self::CancelBid),
            3 => Some(Self::CancelAsk),
            4 => Some(Self::ExecuteBuy),
            5 => Some(Self::ExecuteSell),
            _ => None,
        }
    }

    /// Encode to the on-disk byte.
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    /// True for `AddBid` / `AddAsk`.
    #[must_use]
    pub const fn is_add(self) -> bool {
        matches!(self, Self::AddBid | Self::AddAsk)
    }

    /// True for `CancelBid` / `CancelAsk`.
    #[must_use]
    pub const fn is_cancel(self) -> bool {
        matches!(self, Self::CancelBid | Self::CancelAsk)
    }

    /// True for `ExecuteBuy` / `ExecuteSell`.
    #[must_use]
    pub const fn is_execute(self) -> bool {
        matches!(self, Self::ExecuteBuy | Self::ExecuteSell)
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::AddBid => "ADD_BID",
            Self::AddAsk => "ADD_ASK",
            Self::CancelBid => "CANCEL_BID",
            Self::CancelAsk => "CANCEL_ASK",
            Self::ExecuteBuy => "EXECUTE_BUY",
            Self::ExecuteSell => "EXECUTE_SELL",
        };
        f.write_str(name)
    }
}

/// Book side for records and sampled attributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Side {
    /// Bid (buy) side
    Bid = 0,
    /// Ask (sell) side
    Ask = 1,
    /// Not applicable
    Na = 2,
}

impl Side {
    /// Decode from the on-disk byte.
    #[must_use]
    pub const fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(Self::Bid),
            1 => Some(Self::Ask),
            2 => Some(Self::Na),
            _ => None,
        }
    }

    /// Encode to the on-disk byte.
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }
}

/// Record flag: the best ask moved up on this event.
pub const FLAG_SHIFT_UP: u32 = 0x1;
/// Record flag: the best bid moved down on this event.
pub const FLAG_SHIFT_DOWN: u32 = 0x2;
/// Record flag: queue depths were reinitialized after a shift.
pub const FLAG_REINIT: u32 = 0x4;

/// One simulated market event, as appended to a sink.
///
/// `flags` is in-memory only; the persisted record strips it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventRecord {
    /// Simulated nanoseconds since session start
    pub ts_ns: u64,
    /// Event category
    pub event_type: EventType,
    /// Side the event acted on
    pub side: Side,
    /// Signed price in ticks
    pub price_ticks: i32,
    /// Quantity (always 1 in the unit-size model)
    pub qty: u32,
    /// Monotonic per-session order identifier
    pub order_id: u64,
    /// Shift / reinit flag bits
    pub flags: u32,
}

/// Event applied to the book before a record is emitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimEvent {
    /// Event category
    pub event_type: EventType,
    /// Side the event acts on
    pub side: Side,
    /// Target price in ticks
    pub price_ticks: i32,
    /// Quantity
    pub qty: u32,
    /// Order identifier assigned by the producer
    pub order_id: u64,
}

/// Attributes drawn for an event before the order id is assigned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventAttrs {
    /// Side the event acts on
    pub side: Side,
    /// Target price in ticks
    pub price_ticks: i32,
    /// Quantity
    pub qty: u32,
}

/// A single price level: price and resting depth.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Level {
    /// Price in ticks
    pub price_ticks: i32,
    /// Resting quantity
    pub depth: u32,
}

/// Features derived from the top of the book, input to intensity models.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BookFeatures {
    /// Best bid price in ticks
    pub best_bid_ticks: i32,
    /// Best ask price in ticks
    pub best_ask_ticks: i32,
    /// Depth at the best bid
    pub q_bid_best: u32,
    /// Depth at the best ask
    pub q_ask_best: u32,
    /// `best_ask - best_bid` in ticks
    pub spread_ticks: i32,
    /// `(q_bid - q_ask) / (q_bid + q_ask + eps)`, in [-1, 1]
    pub imbalance: f64,
}

/// Full book state handed to an intensity model: top-of-book features plus
/// per-level depths for both sides.
#[derive(Debug, Clone, Default)]
pub struct BookState {
    /// Derived top-of-book features
    pub features: BookFeatures,
    /// Bid depths, index 0 = best
    pub bid_depths: Vec<u32>,
    /// Ask depths, index 0 = best
    pub ask_depths: Vec<u32>,
}

/// The six competing arrival rates, one per event category.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Intensities {
    /// Rate of bid-side adds
    pub add_bid: f64,
    /// Rate of ask-side adds
    pub add_ask: f64,
    /// Rate of bid-side cancels
    pub cancel_bid: f64,
    /// Rate of ask-side cancels
    pub cancel_ask: f64,
    /// Rate of market buys
    pub exec_buy: f64,
    /// Rate of market sells
    pub exec_sell: f64,
}

impl Intensities {
    /// Sum of all six rates.
    #[must_use]
    pub fn total(&self) -> f64 {
        self.add_bid + self.add_ask + self.cancel_bid + self.cancel_ask + self.exec_buy
            + self.exec_sell
    }

    /// Rate for one category.
    #[must_use]
    pub const fn at(&self, t: EventType) -> f64 {
        match t {
            EventType::AddBid => self.add_bid,
            EventType::AddAsk => self.add_ask,
            EventType::CancelBid => self.cancel_bid,
            EventType::CancelAsk => self.cancel_ask,
            EventType::ExecuteBuy => self.exec_buy,
            EventType::ExecuteSell => self.exec_sell,
        }
    }
}
