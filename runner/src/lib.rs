//! Session orchestration: multi-day runs, per-security threads, seed
//! derivation, price chaining, manifest and report output

#![deny(warnings)]
#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![deny(dead_code)]
#![deny(unused)]
#![deny(missing_docs)]
#![forbid(unsafe_code)]

pub mod calibrate;
pub mod config;
pub mod dates;
pub mod manifest;
pub mod report;
pub mod runner;

pub use calibrate::{calibrate_curves, CalibrateOptions, CalibrationSummary};
pub use config::{parse_securities_spec, ModelType, RunConfig, SecurityConfig};
pub use runner::{
    install_shutdown_handler, shutdown_requested, DayResult, RunResult, SessionRunner,
    SEED_STRIDE,
};
