//! Core types for the QRSDP market-event simulator

#![deny(warnings)]
#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![deny(dead_code)]
#![deny(unused)]
#![deny(missing_docs)]
#![forbid(unsafe_code)]

pub mod rng;
pub mod session;
pub mod types;

pub use rng::Rng;
pub use session::*;
pub use types::*;
