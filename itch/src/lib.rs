//! ITCH 5.0 wire pipeline
//!
//! Simulated events are encoded as big-endian ITCH 5.0 messages (the
//! five-message subset S/R/A/D/E), framed into MTU-bounded MoldUDP64
//! packets with a contiguous per-session sequence number, and handed to a
//! fire-and-forget UDP sender.

#![deny(warnings)]
#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![deny(dead_code)]
#![deny(unused)]
#![deny(missing_docs)]
#![forbid(unsafe_code)]

pub mod encoder;
pub mod messages;
pub mod mold;
pub mod udp;

pub use encoder::ItchEncoder;
pub use messages::{decode_message, DecodedMessage, WireError};
pub use mold::{parse_packet, MoldPacket, MoldUdp64Framer};
pub use udp::UdpSender;
