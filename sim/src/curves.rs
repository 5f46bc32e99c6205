//! Queue-size-dependent intensity curves (HLR-style per-level model)

use crate::intensity::{floor, IntensityModel, MIN_INTENSITY};
use anyhow::{Context, Result};
use common::{BookState, EventType, Intensities};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Behavior of a curve beyond its tabulated range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TailRule {
    /// Repeat the last table value for n > `n_max`.
    #[default]
    Flat,
    /// Zero for n > `n_max`.
    Zero,
}

/// Intensity as a function of queue size: a table for n in 0..=`n_max` and
/// a tail rule beyond it. Negative and non-finite table entries become
/// zero; small positive entries are lifted to the intensity floor.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct IntensityCurve {
    table: Vec<f64>,
    tail: TailRule,
}

impl IntensityCurve {
    /// Build from a table of values for n = 0..=n_max.
    #[must_use]
    pub fn from_table(values: Vec<f64>, tail: TailRule) -> Self {
        let table = values
            .into_iter()
            .map(|v| {
                if !v.is_finite() || v < 0.0 {
                    0.0
                } else if v > 0.0 && v < MIN_INTENSITY {
                    MIN_INTENSITY
                } else {
                    v
                }
            })
            .collect();
        Self { table, tail }
    }

    /// Curve value at queue size `n`.
    #[must_use]
    pub fn value(&self, n: usize) -> f64 {
        if self.table.is_empty() {
            return 0.0;
        }
        if n < self.table.len() {
            return self.table[n].max(0.0);
        }
        match self.tail {
            TailRule::Flat => self.table[self.table.len() - 1].max(0.0),
            TailRule::Zero => 0.0,
        }
    }

    /// Largest tabulated queue size.
    #[must_use]
    pub fn n_max(&self) -> usize {
        self.table.len().saturating_sub(1)
    }

    /// True when no table was installed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// The clamped table values.
    #[must_use]
    pub fn table(&self) -> &[f64] {
        &self.table
    }
}

/// Per-level curve parameters: K levels per side, one add and one cancel
/// curve per level, and market curves keyed on the best opposite depth.
#[derive(Debug, Clone, PartialEq)]
pub struct HlrParams {
    /// Levels per side covered by the curves
    pub k: usize,
    /// Largest tabulated queue size
    pub n_max: usize,
    /// Spread feedback strength (neutral at spread = 2)
    pub spread_sensitivity: f64,
    /// Imbalance feedback on executions
    pub imbalance_sensitivity: f64,
    /// Add curves per bid level
    pub add_bid: Vec<IntensityCurve>,
    /// Add curves per ask level
    pub add_ask: Vec<IntensityCurve>,
    /// Cancel curves per bid level
    pub cancel_bid: Vec<IntensityCurve>,
    /// Cancel curves per ask level
    pub cancel_ask: Vec<IntensityCurve>,
    /// Market-buy curve, a function of best-ask depth
    pub exec_buy: IntensityCurve,
    /// Market-sell curve, a function of best-bid depth
    pub exec_sell: IntensityCurve,
}

/// Wire shape of the curve file: raw tables keyed by the published names.
#[derive(Serialize, Deserialize)]
struct HlrParamsFile {
    #[serde(rename = "K")]
    k: usize,
    n_max: usize,
    #[serde(default = "default_spread_sensitivity")]
    spread_sensitivity: f64,
    #[serde(default = "default_imbalance_sensitivity")]
    imbalance_sensitivity: f64,
    #[serde(rename = "lambda_L_bid")]
    lambda_l_bid: Vec<Vec<f64>>,
    #[serde(rename = "lambda_L_ask")]
    lambda_l_ask: Vec<Vec<f64>>,
    #[serde(rename = "lambda_C_bid")]
    lambda_c_bid: Vec<Vec<f64>>,
    #[serde(rename = "lambda_C_ask")]
    lambda_c_ask: Vec<Vec<f64>>,
    #[serde(rename = "lambda_M_buy")]
    lambda_m_buy: Vec<f64>,
    #[serde(rename = "lambda_M_sell")]
    lambda_m_sell: Vec<f64>,
}

const fn default_spread_sensitivity() -> f64 {
    0.3
}

const fn default_imbalance_sensitivity() -> f64 {
    1.0
}

impl HlrParams {
    /// True once curves have been populated.
    #[must_use]
    pub fn has_curves(&self) -> bool {
        !self.add_bid.is_empty()
    }

    /// Parse from the JSON curve-file format.
    ///
    /// # Errors
    ///
    /// Returns a `serde_json` error for malformed input.
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        let file: HlrParamsFile = serde_json::from_str(json)?;
        let curves =
            |tables: Vec<Vec<f64>>| -> Vec<IntensityCurve> {
                tables.into_iter().map(|t| IntensityCurve::from_table(t, TailRule::Flat)).collect()
            };
        Ok(Self {
            k: file.k,
            n_max: file.n_max,
            spread_sensitivity: file.spread_sensitivity,
            imbalance_sensitivity: file.imbalance_sensitivity,
            add_bid: curves(file.lambda_l_bid),
            add_ask: curves(file.lambda_l_ask),
            cancel_bid: curves(file.lambda_c_bid),
            cancel_ask: curves(file.lambda_c_ask),
            exec_buy: IntensityCurve::from_table(file.lambda_m_buy, TailRule::Flat),
            exec_sell: IntensityCurve::from_table(file.lambda_m_sell, TailRule::Flat),
        })
    }

    /// Serialize to the JSON curve-file format.
    ///
    /// # Errors
    ///
    /// Returns a `serde_json` error when serialization fails.
    pub fn to_json(&self) -> serde_json::Result<String> {
        let tables = |curves: &[IntensityCurve]| -> Vec<Vec<f64>> {
            curves.iter().map(|c| c.table().to_vec()).collect()
        };
        let file = HlrParamsFile {
            k: self.k,
            n_max: self.n_max,
            spread_sensitivity: self.spread_sensitivity,
            imbalance_sensitivity: self.imbalance_sensitivity,
            lambda_l_bid: tables(&self.add_bid),
            lambda_l_ask: tables(&self.add_ask),
            lambda_c_bid: tables(&self.cancel_bid),
            lambda_c_ask: tables(&self.cancel_ask),
            lambda_m_buy: self.exec_buy.table().to_vec(),
            lambda_m_sell: self.exec_sell.table().to_vec(),
        };
        serde_json::to_string_pretty(&file)
    }

    /// Load curves from a JSON file.
    ///
    /// # Errors
    ///
    /// Fails on IO errors or malformed JSON, with the path in context.
    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("cannot read curve file {}", path.display()))?;
        Self::from_json(&json)
            .with_context(|| format!("cannot parse curve file {}", path.display()))
    }

    /// Write curves to a JSON file.
    ///
    /// # Errors
    ///
    /// Fails on IO or serialization errors, with the path in context.
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = self.to_json().context("cannot serialize curve parameters")?;
        std::fs::write(path, json)
            .with_context(|| format!("cannot write curve file {}", path.display()))
    }
}

/// Qualitative starter curves: add intensity falls with existing depth
/// (fastest at the best level), cancels grow concavely with queue size,
/// market arrivals are depth-independent for non-empty queues.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn default_hlr_params(k: usize, n_max: usize) -> HlrParams {
    let k = k.max(1);
    let n_max = n_max.max(1);

    let table = |f: &dyn Fn(usize) -> f64| -> Vec<f64> {
        (0..=n_max).map(|n| f(n).max(0.0)).collect()
    };
    let add_best = |n: usize| 15.0 / (1.0 + 0.12 * n as f64);
    let add_deeper = |n: usize| 5.0 / (1.0 + 0.2 * n as f64);
    let cancel = |n: usize| if n == 0 { 0.0 } else { 0.3 * n as f64 / (1.0 + 0.02 * n as f64) };
    let market = |n: usize| if n == 0 { 0.0 } else { 8.0 };

    let add_curves: Vec<IntensityCurve> = (0..k)
        .map(|i| {
            let f: &dyn Fn(usize) -> f64 = if i == 0 { &add_best } else { &add_deeper };
            IntensityCurve::from_table(table(f), TailRule::Flat)
        })
        .collect();
    let cancel_curves: Vec<IntensityCurve> =
        (0..k).map(|_| IntensityCurve::from_table(table(&cancel), TailRule::Flat)).collect();
    let market_curve = IntensityCurve::from_table(table(&market), TailRule::Flat);

    HlrParams {
        k,
        n_max,
        spread_sensitivity: default_spread_sensitivity(),
        imbalance_sensitivity: default_imbalance_sensitivity(),
        add_bid: add_curves.clone(),
        add_ask: add_curves,
        cancel_bid: cancel_curves.clone(),
        cancel_ask: cancel_curves,
        exec_buy: market_curve.clone(),
        exec_sell: market_curve,
    }
}

/// Intensity model driven by per-level curves. Each `compute` also caches
/// the per-(level, type) breakdown so the producer can sample a
/// (type, level) pair directly.
#[derive(Debug, Clone)]
pub struct CurveIntensityModel {
    params: HlrParams,
    weights: Vec<f64>,
}

impl CurveIntensityModel {
    /// Build from curve parameters.
    #[must_use]
    pub fn new(params: HlrParams) -> Self {
        let weights = vec![0.0; 4 * params.k + 2];
        Self { params, weights }
    }

    /// Map a sampled weight index back to (event type, level hint). Indices
    /// follow the weight layout; the two trailing slots are executions,
    /// which carry no level hint.
    #[must_use]
    pub fn decode_weight_index(index: usize, k: usize) -> (EventType, Option<usize>) {
        if index < k {
            (EventType::AddBid, Some(index))
        } else if index < 2 * k {
            (EventType::AddAsk, Some(index - k))
        } else if index < 3 * k {
            (EventType::CancelBid, Some(index - 2 * k))
        } else if index < 4 * k {
            (EventType::CancelAsk, Some(index - 3 * k))
        } else if index == 4 * k {
            (EventType::ExecuteBuy, None)
        } else {
            (EventType::ExecuteSell, None)
        }
    }
}

impl IntensityModel for CurveIntensityModel {
    fn compute(&mut self, state: &BookState) -> Intensities {
        let k = self.params.k;
        self.weights.iter_mut().for_each(|w| *w = 0.0);

        if state.bid_depths.len() < k || state.ask_depths.len() < k {
            return Intensities {
                add_bid: MIN_INTENSITY,
                add_ask: MIN_INTENSITY,
                cancel_bid: MIN_INTENSITY,
                cancel_ask: MIN_INTENSITY,
                exec_buy: MIN_INTENSITY,
                exec_sell: MIN_INTENSITY,
            };
        }

        // Spread feedback mirrors the imbalance model: wide spreads attract
        // limit orders and dampen executions, neutral at spread = 2.
        let s_s = self.params.spread_sensitivity;
        let (add_mult, exec_mult) = if s_s > 0.0 {
            let delta = f64::from(state.features.spread_ticks) - 2.0;
            ((s_s * delta).exp(), (-s_s * delta).exp())
        } else {
            (1.0, 1.0)
        };

        let mut add_bid = 0.0;
        let mut add_ask = 0.0;
        let mut cancel_bid = 0.0;
        let mut cancel_ask = 0.0;

        for i in 0..k {
            let n_bid = state.bid_depths[i] as usize;
            let n_ask = state.ask_depths[i] as usize;

            let lb = self.params.add_bid.get(i).map_or(0.0, |c| c.value(n_bid)) * add_mult;
            let la = self.params.add_ask.get(i).map_or(0.0, |c| c.value(n_ask)) * add_mult;
            let cb = self.params.cancel_bid.get(i).map_or(0.0, |c| c.value(n_bid));
            let ca = self.params.cancel_ask.get(i).map_or(0.0, |c| c.value(n_ask));

            add_bid += lb;
            add_ask += la;
            cancel_bid += cb;
            cancel_ask += ca;

            self.weights[i] = lb;
            self.weights[k + i] = la;
            self.weights[2 * k + i] = cb;
            self.weights[3 * k + i] = ca;
        }

        // Executions are boosted on the heavier side, pulling the price
        // back toward balance.
        let i_s = self.params.imbalance_sensitivity;
        let (imb_buy, imb_sell) = if i_s > 0.0 {
            let total_bid: f64 = state.bid_depths[..k].iter().map(|&d| f64::from(d)).sum();
            let total_ask: f64 = state.ask_depths[..k].iter().map(|&d| f64::from(d)).sum();
            let total = total_bid + total_ask;
            if total > 0.0 {
                let imbalance = (total_bid - total_ask) / total;
                (1.0 + i_s * (-imbalance).max(0.0), 1.0 + i_s * imbalance.max(0.0))
            } else {
                (1.0, 1.0)
            }
        } else {
            (1.0, 1.0)
        };

        let exec_buy =
            self.params.exec_buy.value(state.ask_depths[0] as usize) * exec_mult * imb_buy;
        let exec_sell =
            self.params.exec_sell.value(state.bid_depths[0] as usize) * exec_mult * imb_sell;
        self.weights[4 * k] = exec_buy;
        self.weights[4 * k + 1] = exec_sell;

        Intensities {
            add_bid: floor(add_bid),
            add_ask: floor(add_ask),
            cancel_bid: floor(cancel_bid),
            cancel_ask: floor(cancel_ask),
            exec_buy: floor(exec_buy),
            exec_sell: floor(exec_sell),
        }
    }

    fn per_level_weights(&self) -> Option<&[f64]> {
        Some(&self.weights)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::BookFeatures;

    fn state(k: usize, depth: u32, spread: i32) -> BookState {
        BookState {
            features: BookFeatures {
                best_bid_ticks: 9_999,
                best_ask_ticks: 9_999 + spread,
                q_bid_best: depth,
                q_ask_best: depth,
                spread_ticks: spread,
                imbalance: 0.0,
            },
            bid_depths: vec![depth; k],
            ask_depths: vec![depth; k],
        }
    }

    #[test]
    fn curve_tail_rules() {
        let flat = IntensityCurve::from_table(vec![1.0, 2.0, 3.0], TailRule::Flat);
        assert!((flat.value(1) - 2.0).abs() < f64::EPSILON);
        assert!((flat.value(50) - 3.0).abs() < f64::EPSILON);

        let zero = IntensityCurve::from_table(vec![1.0, 2.0, 3.0], TailRule::Zero);
        assert!((zero.value(2) - 3.0).abs() < f64::EPSILON);
        assert!(zero.value(3).abs() < f64::EPSILON);
    }

    #[test]
    fn curve_sanitizes_bad_entries() {
        let curve =
            IntensityCurve::from_table(vec![-1.0, f64::NAN, 1e-20, 2.0], TailRule::Flat);
        assert!(curve.value(0).abs() < f64::EPSILON);
        assert!(curve.value(1).abs() < f64::EPSILON);
        assert!((curve.value(2) - MIN_INTENSITY).abs() < f64::EPSILON);
        assert!((curve.value(3) - 2.0).abs() < f64::EPSILON);
    }

    #[test]
    fn default_params_have_expected_shape() {
        let params = default_hlr_params(5, 100);
        assert_eq!(params.add_bid.len(), 5);
        assert_eq!(params.cancel_ask.len(), 5);
        assert_eq!(params.exec_buy.n_max(), 100);
        assert!(params.has_curves());
        // Market curve is zero at n=0 so an empty queue cannot be hit.
        assert!(params.exec_sell.value(0).abs() < f64::EPSILON);
        assert!((params.exec_sell.value(1) - 8.0).abs() < f64::EPSILON);
        // Add intensity falls with depth.
        assert!(params.add_bid[0].value(0) > params.add_bid[0].value(10));
    }

    #[test]
    fn json_round_trip_preserves_curves() {
        let params = default_hlr_params(3, 20);
        let json = params.to_json().unwrap();
        let back = HlrParams::from_json(&json).unwrap();
        assert_eq!(back, params);
    }

    #[test]
    fn json_defaults_for_missing_sensitivities() {
        let json = r#"{
            "K": 1, "n_max": 1,
            "lambda_L_bid": [[1.0, 1.0]], "lambda_L_ask": [[1.0, 1.0]],
            "lambda_C_bid": [[0.0, 0.5]], "lambda_C_ask": [[0.0, 0.5]],
            "lambda_M_buy": [0.0, 2.0], "lambda_M_sell": [0.0, 2.0]
        }"#;
        let params = HlrParams::from_json(json).unwrap();
        assert!((params.spread_sensitivity - 0.3).abs() < f64::EPSILON);
        assert!((params.imbalance_sensitivity - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn save_and_load_round_trip() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("curves.json");
        let params = default_hlr_params(2, 10);
        params.save(&path).unwrap();
        let back = HlrParams::load(&path).unwrap();
        assert_eq!(back, params);
    }

    #[test]
    fn weight_index_decode_covers_the_layout() {
        let k = 4;
        assert_eq!(
            CurveIntensityModel::decode_weight_index(0, k),
            (EventType::AddBid, Some(0))
        );
        assert_eq!(
            CurveIntensityModel::decode_weight_index(k + 2, k),
            (EventType::AddAsk, Some(2))
        );
        assert_eq!(
            CurveIntensityModel::decode_weight_index(2 * k + 3, k),
            (EventType::CancelBid, Some(3))
        );
        assert_eq!(
            CurveIntensityModel::decode_weight_index(3 * k + 1, k),
            (EventType::CancelAsk, Some(1))
        );
        assert_eq!(CurveIntensityModel::decode_weight_index(4 * k, k), (EventType::ExecuteBuy, None));
        assert_eq!(
            CurveIntensityModel::decode_weight_index(4 * k + 1, k),
            (EventType::ExecuteSell, None)
        );
    }

    #[test]
    fn weights_match_aggregates() {
        let mut model = CurveIntensityModel::new(default_hlr_params(3, 20));
        let intens = model.compute(&state(3, 5, 2));
        let w = model.per_level_weights().unwrap();
        assert_eq!(w.len(), 4 * 3 + 2);
        let add_bid_sum: f64 = w[0..3].iter().sum();
        assert!((add_bid_sum - intens.add_bid).abs() < 1e-9);
        assert!((w[12] - intens.exec_buy).abs() < 1e-9);
        assert!((w[13] - intens.exec_sell).abs() < 1e-9);
    }

    #[test]
    fn short_state_returns_floor_rates() {
        let mut model = CurveIntensityModel::new(default_hlr_params(5, 20));
        let intens = model.compute(&state(2, 5, 2));
        assert!((intens.total() - 6.0 * MIN_INTENSITY).abs() < 1e-15);
    }
}
