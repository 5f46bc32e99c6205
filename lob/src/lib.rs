//! Counts-only multi-level order book
//!
//! The book tracks up to [`MAX_LEVELS`] price levels per side with aggregate
//! depths only (no per-order FIFO queues). Best prices move exclusively
//! through depletion shifts.

#![deny(warnings)]
#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![deny(dead_code)]
#![deny(unused)]
#![deny(missing_docs)]
#![forbid(unsafe_code)]

pub mod book;

pub use book::{MultiLevelBook, MAX_LEVELS};
