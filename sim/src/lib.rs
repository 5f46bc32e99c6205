//! Queue-reactive stochastic event generation
//!
//! The producer advances continuous simulated time by sampling inter-arrival
//! gaps from competing Poisson intensities whose rates react to the current
//! book state, then draws the event category and its attributes and applies
//! the event to the book.

#![deny(warnings)]
#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![deny(dead_code)]
#![deny(unused)]
#![deny(missing_docs)]
#![forbid(unsafe_code)]

pub mod attrs;
pub mod curves;
pub mod estimator;
pub mod intensity;
pub mod producer;
pub mod rng;
pub mod sampler;

pub use attrs::AttributeSampler;
pub use curves::{default_hlr_params, CurveIntensityModel, HlrParams, IntensityCurve, TailRule};
pub use estimator::IntensityEstimator;
pub use intensity::{IntensityModel, SimpleImbalanceIntensity};
pub use producer::Producer;
pub use rng::Xoshiro256PlusPlus;
