//! Intensity models: book state in, six competing rates out

use common::{BookState, Intensities, IntensityParams};

/// Floor applied to every component rate so the total stays strictly
/// positive.
pub const MIN_INTENSITY: f64 = 1e-12;

/// Deterministic map from book state to the six category rates. `compute`
/// takes `&mut self` so curve-based models can cache their per-level
/// breakdown for the weight-sampling path.
pub trait IntensityModel {
    /// Rates for the current book state. Every component is >= the floor.
    fn compute(&mut self, state: &BookState) -> Intensities;

    /// Per-(level, type) weights from the most recent `compute`, laid out
    /// `[add_bid[0..K), add_ask[0..K), cancel_bid[0..K), cancel_ask[0..K),
    /// exec_buy, exec_sell]`. `None` when the model samples types from the
    /// aggregate rates only.
    fn per_level_weights(&self) -> Option<&[f64]> {
        None
    }
}

/// Imbalance-driven intensities: adds mean-revert against the heavy side,
/// executions chase it, cancels scale with resting depth, and the spread
/// feeds back multiplicatively with spread = 2 as the neutral point.
#[derive(Debug, Clone)]
pub struct SimpleImbalanceIntensity {
    params: IntensityParams,
}

impl SimpleImbalanceIntensity {
    /// Build from model parameters.
    #[must_use]
    pub const fn new(params: IntensityParams) -> Self {
        Self { params }
    }
}

impl IntensityModel for SimpleImbalanceIntensity {
    fn compute(&mut self, state: &BookState) -> Intensities {
        let f = &state.features;
        let imb = if f.imbalance.is_nan() { 0.0 } else { f.imbalance };

        let mut total_bid_depth: f64 = state.bid_depths.iter().map(|&d| f64::from(d)).sum();
        let mut total_ask_depth: f64 = state.ask_depths.iter().map(|&d| f64::from(d)).sum();
        if total_bid_depth == 0.0 {
            total_bid_depth = f64::from(f.q_bid_best);
        }
        if total_ask_depth == 0.0 {
            total_ask_depth = f64::from(f.q_ask_best);
        }

        let p = &self.params;
        let s_i = if p.imbalance_sensitivity > 0.0 { p.imbalance_sensitivity } else { 1.0 };
        let s_c = if p.cancel_sensitivity > 0.0 { p.cancel_sensitivity } else { 1.0 };

        // Wide spread attracts limit orders and dampens executions:
        // exp(+/- s_S * (spread - 2)), neutral at a two-tick spread.
        let spread_delta = f64::from(f.spread_ticks) - 2.0;
        let (add_mult, exec_mult) = if p.spread_sensitivity > 0.0 {
            ((p.spread_sensitivity * spread_delta).exp(), (-p.spread_sensitivity * spread_delta).exp())
        } else {
            (1.0, 1.0)
        };

        let eps_exec = if p.epsilon_exec > 0.0 { p.epsilon_exec } else { 0.05 };

        Intensities {
            add_bid: floor(p.base_add * (1.0 - s_i * imb) * add_mult),
            add_ask: floor(p.base_add * (1.0 + s_i * imb) * add_mult),
            cancel_bid: floor(p.base_cancel * s_c * total_bid_depth),
            cancel_ask: floor(p.base_cancel * s_c * total_ask_depth),
            exec_buy: floor(p.base_exec * (eps_exec + (-s_i * imb).max(0.0)) * exec_mult),
            exec_sell: floor(p.base_exec * (eps_exec + (s_i * imb).max(0.0)) * exec_mult),
        }
    }
}

/// Clamp a rate into [`MIN_INTENSITY`], mapping NaN and infinities there too.
pub(crate) fn floor(x: f64) -> f64 {
    if x.is_finite() && x > MIN_INTENSITY {
        x
    } else {
        MIN_INTENSITY
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::BookFeatures;

    fn state(q_bid: u32, q_ask: u32, spread: i32) -> BookState {
        let sum = f64::from(q_bid) + f64::from(q_ask) + 1e-9;
        BookState {
            features: BookFeatures {
                best_bid_ticks: 9_999,
                best_ask_ticks: 9_999 + spread,
                q_bid_best: q_bid,
                q_ask_best: q_ask,
                spread_ticks: spread,
                imbalance: (f64::from(q_bid) - f64::from(q_ask)) / sum,
            },
            bid_depths: vec![q_bid, q_bid],
            ask_depths: vec![q_ask, q_ask],
        }
    }

    #[test]
    fn balanced_book_gives_symmetric_rates() {
        let mut model = SimpleImbalanceIntensity::new(IntensityParams::default());
        let intens = model.compute(&state(10, 10, 2));
        assert!((intens.add_bid - intens.add_ask).abs() < 1e-12);
        assert!((intens.exec_buy - intens.exec_sell).abs() < 1e-12);
        assert!(intens.total() > 0.0);
    }

    #[test]
    fn bid_heavy_book_boosts_sell_pressure() {
        let mut model = SimpleImbalanceIntensity::new(IntensityParams::default());
        let intens = model.compute(&state(30, 5, 2));
        // Positive imbalance: asks look attractive to add, sells to execute.
        assert!(intens.add_ask > intens.add_bid);
        assert!(intens.exec_sell > intens.exec_buy);
        assert!(intens.cancel_bid > intens.cancel_ask);
    }

    #[test]
    fn wide_spread_attracts_adds_and_dampens_executions() {
        let mut model = SimpleImbalanceIntensity::new(IntensityParams::default());
        let narrow = model.compute(&state(10, 10, 2));
        let wide = model.compute(&state(10, 10, 5));
        assert!(wide.add_bid > narrow.add_bid);
        assert!(wide.exec_buy < narrow.exec_buy);
    }

    #[test]
    fn rates_never_reach_zero() {
        let mut model = SimpleImbalanceIntensity::new(IntensityParams {
            base_add: 0.0,
            base_cancel: 0.0,
            base_exec: 0.0,
            ..IntensityParams::default()
        });
        let intens = model.compute(&state(0, 0, 2));
        for t in common::EventType::ALL {
            assert!(intens.at(t) >= MIN_INTENSITY);
        }
    }

    #[test]
    fn nan_imbalance_is_treated_as_flat() {
        let mut model = SimpleImbalanceIntensity::new(IntensityParams::default());
        let mut s = state(10, 10, 2);
        s.features.imbalance = f64::NAN;
        let intens = model.compute(&s);
        assert!((intens.add_bid - intens.add_ask).abs() < 1e-12);
    }
}
