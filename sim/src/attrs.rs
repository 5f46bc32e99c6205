//! Attribute sampling: side, price level and quantity for a drawn event

use common::{BookFeatures, EventAttrs, EventType, Rng, Side};
use lob::MultiLevelBook;

/// Unit-size attribute sampler. Adds pick a level with probability
/// proportional to `exp(-alpha * k)` (or land one tick inside the spread
/// when price improvement fires); cancels pick a level weighted by resting
/// depth; executions always hit the best opposite level. Quantity is 1.
///
/// A level hint from the per-level weight path overrides the add/cancel
/// level draw; executions ignore hints.
#[derive(Debug, Clone)]
pub struct AttributeSampler {
    alpha: f64,
    spread_improve_coeff: f64,
    weight_buf: Vec<f64>,
}

impl AttributeSampler {
    /// Build with a level-decay coefficient and a spread-improvement
    /// coefficient (0 disables improvement).
    #[must_use]
    pub fn new(alpha: f64, spread_improve_coeff: f64) -> Self {
        Self { alpha, spread_improve_coeff, weight_buf: Vec::new() }
    }

    /// Draw attributes for `event_type` against the current book.
    pub fn sample(
        &mut self,
        rng: &mut dyn Rng,
        event_type: EventType,
        book: &MultiLevelBook,
        features: &BookFeatures,
        level_hint: Option<usize>,
    ) -> EventAttrs {
        match event_type {
            EventType::AddBid => {
                if let Some(h) = level_hint {
                    return EventAttrs {
                        side: Side::Bid,
                        price_ticks: book.bid_price_at(h),
                        qty: 1,
                    };
                }
                if self.improves_spread(rng, features) {
                    return EventAttrs {
                        side: Side::Bid,
                        price_ticks: features.best_bid_ticks + 1,
                        qty: 1,
                    };
                }
                let level = self.sample_add_level(rng, book.num_levels());
                EventAttrs { side: Side::Bid, price_ticks: book.bid_price_at(level), qty: 1 }
            }
            EventType::AddAsk => {
                if let Some(h) = level_hint {
                    return EventAttrs {
                        side: Side::Ask,
                        price_ticks: book.ask_price_at(h),
                        qty: 1,
                    };
                }
                if self.improves_spread(rng, features) {
                    return EventAttrs {
                        side: Side::Ask,
                        price_ticks: features.best_ask_ticks - 1,
                        qty: 1,
                    };
                }
                let level = self.sample_add_level(rng, book.num_levels());
                EventAttrs { side: Side::Ask, price_ticks: book.ask_price_at(level), qty: 1 }
            }
            EventType::CancelBid => {
                let level = level_hint
                    .unwrap_or_else(|| self.sample_cancel_level(rng, true, book));
                EventAttrs { side: Side::Bid, price_ticks: book.bid_price_at(level), qty: 1 }
            }
            EventType::CancelAsk => {
                let level = level_hint
                    .unwrap_or_else(|| self.sample_cancel_level(rng, false, book));
                EventAttrs { side: Side::Ask, price_ticks: book.ask_price_at(level), qty: 1 }
            }
            EventType::ExecuteBuy => {
                EventAttrs { side: Side::Ask, price_ticks: features.best_ask_ticks, qty: 1 }
            }
            EventType::ExecuteSell => {
                EventAttrs { side: Side::Bid, price_ticks: features.best_bid_ticks, qty: 1 }
            }
        }
    }

    /// Price-improvement gate: fires with probability
    /// `min(1, (spread - 1) * coeff)` when the spread is open.
    fn improves_spread(&self, rng: &mut dyn Rng, features: &BookFeatures) -> bool {
        if self.spread_improve_coeff <= 0.0 || features.spread_ticks <= 1 {
            return false;
        }
        let p = ((f64::from(features.spread_ticks) - 1.0) * self.spread_improve_coeff).min(1.0);
        rng.uniform() < p
    }

    #[allow(clippy::cast_precision_loss)]
    fn sample_add_level(&mut self, rng: &mut dyn Rng, num_levels: usize) -> usize {
        if num_levels <= 1 {
            return 0;
        }
        self.weight_buf.clear();
        let mut total = 0.0;
        for k in 0..num_levels {
            let w = (-self.alpha * k as f64).exp();
            self.weight_buf.push(w);
            total += w;
        }
        Self::draw_from_buf(rng, &self.weight_buf, total)
    }

    fn sample_cancel_level(
        &mut self,
        rng: &mut dyn Rng,
        is_bid: bool,
        book: &MultiLevelBook,
    ) -> usize {
        let n = book.num_levels();
        if n == 0 {
            return 0;
        }
        self.weight_buf.clear();
        let mut total = 0.0;
        for k in 0..n {
            let d = if is_bid { book.bid_depth_at(k) } else { book.ask_depth_at(k) };
            let w = f64::from(d);
            self.weight_buf.push(w);
            total += w;
        }
        Self::draw_from_buf(rng, &self.weight_buf, total)
    }

    fn draw_from_buf(rng: &mut dyn Rng, weights: &[f64], total: f64) -> usize {
        if total <= 0.0 {
            return 0;
        }
        let u = rng.uniform();
        let mut cum = 0.0;
        for (k, &w) in weights.iter().enumerate() {
            cum += w;
            if u < cum / total {
                return k;
            }
        }
        weights.len() - 1
    }
}
