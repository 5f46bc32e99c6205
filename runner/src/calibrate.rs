//! Curve calibration: estimate per-level intensity curves from event logs
//!
//! Replays each log through a book, measuring how long every level dwelt at
//! each queue size before an event hit it, then converts the dwell-time
//! statistics into [`HlrParams`] curves ready to drive the per-level model.

use anyhow::{bail, Context, Result};
use common::{BookSeed, EventType, SimEvent};
use lob::MultiLevelBook;
use sim::{HlrParams, IntensityCurve, IntensityEstimator, TailRule};
use std::path::PathBuf;
use storage::EventLogReader;
use tracing::{debug, info};

/// Calibration inputs and knobs.
#[derive(Debug, Clone)]
pub struct CalibrateOptions {
    /// Levels per side for the output curves (0 = from the first file's
    /// header)
    pub levels: u32,
    /// Largest tabulated queue size
    pub n_max: usize,
    /// Spread sensitivity stamped into the output parameters
    pub spread_sensitivity: f64,
}

impl Default for CalibrateOptions {
    fn default() -> Self {
        Self { levels: 0, n_max: 100, spread_sensitivity: 0.3 }
    }
}

/// Calibration output: the curves plus counting statistics.
#[derive(Debug, Clone)]
pub struct CalibrationSummary {
    /// Estimated curve parameters
    pub params: HlrParams,
    /// Events replayed across all inputs
    pub total_events: u64,
    /// Sojourns that contributed to the estimate
    pub sojourns_recorded: u64,
}

/// Dwell-time tracking for one level of one side.
#[derive(Debug, Clone, Copy, Default)]
struct LevelTracker {
    last_event_time: f64,
    last_depth: u32,
    initialized: bool,
}

/// Estimate intensity curves from one or more event logs.
///
/// # Errors
///
/// Fails when no inputs are given or any input cannot be read.
pub fn calibrate_curves(
    inputs: &[PathBuf],
    options: &CalibrateOptions,
) -> Result<CalibrationSummary> {
    if inputs.is_empty() {
        bail!("calibration requires at least one input log");
    }

    let k = if options.levels > 0 {
        options.levels as usize
    } else {
        let probe = EventLogReader::open(&inputs[0])
            .with_context(|| format!("cannot probe {}", inputs[0].display()))?;
        let from_header = probe.header().levels_per_side as usize;
        if from_header > 0 {
            from_header
        } else {
            5
        }
    };

    let mut bid_estimators = vec![IntensityEstimator::new(); k];
    let mut ask_estimators = vec![IntensityEstimator::new(); k];
    let mut total_events = 0u64;
    let mut sojourns_recorded = 0u64;

    for input in inputs {
        info!(input = %input.display(), "calibrating from log");
        let mut reader = EventLogReader::open(input)?;
        let header = *reader.header();
        let file_k = header.levels_per_side as usize;
        let use_k = if file_k > 0 { k.min(file_k) } else { k };

        let mut book = MultiLevelBook::new();
        book.seed(&BookSeed {
            p0_ticks: header.p0_ticks,
            levels_per_side: header.levels_per_side,
            initial_depth: if header.initial_depth > 0 { header.initial_depth } else { 5 },
            initial_spread_ticks: if header.initial_spread_ticks > 0 {
                header.initial_spread_ticks
            } else {
                2
            },
        });

        let mut bid_trackers = vec![LevelTracker::default(); book.num_levels()];
        let mut ask_trackers = vec![LevelTracker::default(); book.num_levels()];
        snapshot_levels(&book, 0.0, &mut bid_trackers, &mut ask_trackers);

        let records = reader.read_all()?;
        total_events += records.len() as u64;

        for rec in &records {
            let Some(event_type) = EventType::from_u8(rec.event_type) else {
                continue;
            };
            #[allow(clippy::cast_precision_loss)]
            let t = rec.ts_ns as f64 * 1e-9;

            let (is_bid_side, level) = classify(&book, event_type, rec.price_ticks);

            if let Some(level) = level.filter(|&l| l < use_k) {
                let tracker = if is_bid_side {
                    &mut bid_trackers[level]
                } else {
                    &mut ask_trackers[level]
                };
                if tracker.initialized {
                    let dt = t - tracker.last_event_time;
                    if dt > 0.0 {
                        let estimator = if is_bid_side {
                            &mut bid_estimators[level]
                        } else {
                            &mut ask_estimators[level]
                        };
                        estimator.record_sojourn(tracker.last_depth, dt, event_type);
                        sojourns_recorded += 1;
                    }
                }
            }

            let prev_bid = book.best_bid().price_ticks;
            let prev_ask = book.best_ask().price_ticks;
            let ev = SimEvent {
                event_type,
                side: common::Side::from_u8(rec.side).unwrap_or(common::Side::Na),
                price_ticks: rec.price_ticks,
                qty: rec.qty,
                order_id: rec.order_id,
            };
            book.apply(&ev);

            if book.best_bid().price_ticks != prev_bid || book.best_ask().price_ticks != prev_ask
            {
                snapshot_levels(&book, t, &mut bid_trackers, &mut ask_trackers);
            } else if let Some(level) = level.filter(|&l| l < use_k) {
                let tracker = if is_bid_side {
                    &mut bid_trackers[level]
                } else {
                    &mut ask_trackers[level]
                };
                tracker.last_event_time = t;
                tracker.last_depth =
                    if is_bid_side { book.bid_depth_at(level) } else { book.ask_depth_at(level) };
                tracker.initialized = true;
            }
        }
        debug!(events = records.len(), "log replayed");
    }

    let extract = |est: &IntensityEstimator, event_type: EventType| -> IntensityCurve {
        #[allow(clippy::cast_possible_truncation)]
        let values: Vec<f64> =
            (0..=options.n_max).map(|n| est.lambda_type(n as u32, event_type)).collect();
        IntensityCurve::from_table(values, TailRule::Flat)
    };

    let params = HlrParams {
        k,
        n_max: options.n_max,
        spread_sensitivity: options.spread_sensitivity,
        imbalance_sensitivity: 1.0,
        add_bid: bid_estimators.iter().map(|e| extract(e, EventType::AddBid)).collect(),
        add_ask: ask_estimators.iter().map(|e| extract(e, EventType::AddAsk)).collect(),
        cancel_bid: bid_estimators.iter().map(|e| extract(e, EventType::CancelBid)).collect(),
        cancel_ask: ask_estimators.iter().map(|e| extract(e, EventType::CancelAsk)).collect(),
        exec_buy: extract(&ask_estimators[0], EventType::ExecuteBuy),
        exec_sell: extract(&bid_estimators[0], EventType::ExecuteSell),
    };

    info!(events = total_events, sojourns = sojourns_recorded, k, "calibration complete");
    Ok(CalibrationSummary { params, total_events, sojourns_recorded })
}

/// Locate the level an event targets, against the pre-apply book. A
/// spread-improving add with no matching level is attributed to the best
/// level; executions always hit the best.
fn classify(
    book: &MultiLevelBook,
    event_type: EventType,
    price_ticks: i32,
) -> (bool, Option<usize>) {
    match event_type {
        EventType::AddBid | EventType::CancelBid => {
            let found = find_level(book, price_ticks, true);
            let level = if found.is_none() && event_type == EventType::AddBid {
                Some(0)
            } else {
                found
            };
            (true, level)
        }
        EventType::AddAsk | EventType::CancelAsk => {
            let found = find_level(book, price_ticks, false);
            let level = if found.is_none() && event_type == EventType::AddAsk {
                Some(0)
            } else {
                found
            };
            (false, level)
        }
        EventType::ExecuteSell => (true, Some(0)),
        EventType::ExecuteBuy => (false, Some(0)),
    }
}

fn find_level(book: &MultiLevelBook, price_ticks: i32, is_bid: bool) -> Option<usize> {
    (0..book.num_levels()).find(|&level| {
        let at_level =
            if is_bid { book.bid_price_at(level) } else { book.ask_price_at(level) };
        at_level == price_ticks
    })
}

fn snapshot_levels(
    book: &MultiLevelBook,
    t: f64,
    bid_trackers: &mut [LevelTracker],
    ask_trackers: &mut [LevelTracker],
) {
    for (level, tracker) in bid_trackers.iter_mut().enumerate() {
        *tracker = LevelTracker {
            last_event_time: t,
            last_depth: book.bid_depth_at(level),
            initialized: true,
        };
    }
    for (level, tracker) in ask_trackers.iter_mut().enumerate() {
        *tracker = LevelTracker {
            last_event_time: t,
            last_depth: book.ask_depth_at(level),
            initialized: true,
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RunConfig;
    use crate::runner::SessionRunner;
    use tempfile::TempDir;

    #[test]
    fn calibration_recovers_positive_rates_from_a_run() {
        let dir = TempDir::new().unwrap();
        let config = RunConfig {
            run_id: "cal".to_owned(),
            output_dir: dir.path().to_path_buf(),
            base_seed: 404,
            session_seconds: 3,
            num_days: 1,
            levels_per_side: 3,
            initial_depth: 5,
            chunk_capacity: 128,
            ..RunConfig::default()
        };
        let result = SessionRunner.run(&config).unwrap();
        assert!(result.total_events > 0);

        let input = dir.path().join(&result.days[0].filename);
        let summary =
            calibrate_curves(&[input], &CalibrateOptions::default()).unwrap();

        assert_eq!(summary.params.k, 3);
        assert_eq!(summary.total_events, result.total_events);
        assert!(summary.sojourns_recorded > 0);
        assert!(summary.params.has_curves());
        // Something arrived at the best level, so its add curve has mass.
        let best_add = &summary.params.add_bid[0];
        let has_mass = (0..=summary.params.n_max).any(|n| best_add.value(n) > 0.0);
        assert!(has_mass);
    }

    #[test]
    fn calibration_with_no_inputs_is_an_error() {
        assert!(calibrate_curves(&[], &CalibrateOptions::default()).is_err());
    }
}
