//! The counts-only book and its depletion-shift mechanics

use common::{BookFeatures, BookSeed, BookState, EventType, Level, Rng, SimEvent};
use tracing::warn;

/// Hard cap on price levels per side.
pub const MAX_LEVELS: usize = 64;

const IMBALANCE_EPS: f64 = 1e-9;

/// Counts-only order book: `num_levels` contiguous price levels per side,
/// aggregate depth at each. Invariants after every apply: bid prices strictly
/// decreasing with index, ask prices strictly increasing,
/// `best_bid < best_ask`.
#[derive(Debug, Clone)]
pub struct MultiLevelBook {
    bids: [Level; MAX_LEVELS],
    asks: [Level; MAX_LEVELS],
    num_levels: usize,
    initial_depth: u32,
}

impl Default for MultiLevelBook {
    fn default() -> Self {
        Self {
            bids: [Level::default(); MAX_LEVELS],
            asks: [Level::default(); MAX_LEVELS],
            num_levels: 0,
            initial_depth: common::DEFAULT_INITIAL_DEPTH,
        }
    }
}

impl MultiLevelBook {
    /// Create an empty book; call [`seed`](Self::seed) before use.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Install `levels_per_side` levels around `p0_ticks`.
    ///
    /// With spread `s`, the best bid lands at `p0 - s/2` and the best ask at
    /// `p0 + s - s/2`; deeper levels step one tick away per index.
    #[allow(clippy::cast_possible_wrap, clippy::cast_possible_truncation)]
    pub fn seed(&mut self, s: &BookSeed) {
        self.num_levels = (s.levels_per_side as usize).min(MAX_LEVELS).max(1);
        self.initial_depth = if s.initial_depth > 0 {
            s.initial_depth
        } else {
            common::DEFAULT_INITIAL_DEPTH
        };
        let spread = if s.initial_spread_ticks > 0 {
            s.initial_spread_ticks
        } else {
            common::DEFAULT_INITIAL_SPREAD_TICKS
        };
        let half = (spread / 2) as i32;
        let best_bid = s.p0_ticks - half;
        let best_ask = s.p0_ticks + spread as i32 - half;

        for k in 0..self.num_levels {
            let offset = k as i32;
            self.bids[k] = Level { price_ticks: best_bid - offset, depth: self.initial_depth };
            self.asks[k] = Level { price_ticks: best_ask + offset, depth: self.initial_depth };
        }
    }

    /// Apply one simulated event.
    ///
    /// Adds at prices outside the ladder are discarded (the attribute
    /// sampler is expected not to produce them); cancels saturate at zero;
    /// executions decrement the best opposite level and shift the side when
    /// it is depleted.
    pub fn apply(&mut self, e: &SimEvent) {
        match e.event_type {
            EventType::AddBid => {
                if let Some(idx) = self.bid_index_for(e.price_ticks) {
                    self.bids[idx].depth += e.qty;
                }
            }
            EventType::AddAsk => {
                if let Some(idx) = self.ask_index_for(e.price_ticks) {
                    self.asks[idx].depth += e.qty;
                }
            }
            EventType::CancelBid => {
                if let Some(idx) = self.bid_index_for(e.price_ticks) {
                    self.bids[idx].depth = self.bids[idx].depth.saturating_sub(e.qty);
                }
            }
            EventType::CancelAsk => {
                if let Some(idx) = self.ask_index_for(e.price_ticks) {
                    self.asks[idx].depth = self.asks[idx].depth.saturating_sub(e.qty);
                }
            }
            EventType::ExecuteBuy => {
                if self.num_levels > 0 {
                    if e.price_ticks != self.asks[0].price_ticks {
                        warn!(
                            price = e.price_ticks,
                            best_ask = self.asks[0].price_ticks,
                            "execute-buy price is not the best ask"
                        );
                    }
                    if self.asks[0].depth > 0 {
                        self.asks[0].depth -= 1;
                        if self.asks[0].depth == 0 {
                            self.shift_asks();
                        }
                    }
                }
            }
            EventType::ExecuteSell => {
                if self.num_levels > 0 {
                    if e.price_ticks != self.bids[0].price_ticks {
                        warn!(
                            price = e.price_ticks,
                            best_bid = self.bids[0].price_ticks,
                            "execute-sell price is not the best bid"
                        );
                    }
                    if self.bids[0].depth > 0 {
                        self.bids[0].depth -= 1;
                        if self.bids[0].depth == 0 {
                            self.shift_bids();
                        }
                    }
                }
            }
        }
        self.enforce_invariants();
    }

    /// Top-of-book features for the intensity models.
    #[must_use]
    pub fn features(&self) -> BookFeatures {
        if self.num_levels == 0 {
            return BookFeatures::default();
        }
        let best_bid = self.bids[0].price_ticks;
        let best_ask = self.asks[0].price_ticks;
        let q_bid = self.bids[0].depth;
        let q_ask = self.asks[0].depth;
        let sum = f64::from(q_bid) + f64::from(q_ask) + IMBALANCE_EPS;
        BookFeatures {
            best_bid_ticks: best_bid,
            best_ask_ticks: best_ask,
            q_bid_best: q_bid,
            q_ask_best: q_ask,
            spread_ticks: best_ask - best_bid,
            imbalance: (f64::from(q_bid) - f64::from(q_ask)) / sum,
        }
    }

    /// Full state snapshot (features plus per-level depths).
    #[must_use]
    pub fn state(&self) -> BookState {
        BookState {
            features: self.features(),
            bid_depths: (0..self.num_levels).map(|k| self.bids[k].depth).collect(),
            ask_depths: (0..self.num_levels).map(|k| self.asks[k].depth).collect(),
        }
    }

    /// Best bid level.
    #[must_use]
    pub fn best_bid(&self) -> Level {
        if self.num_levels == 0 { Level::default() } else { self.bids[0] }
    }

    /// Best ask level.
    #[must_use]
    pub fn best_ask(&self) -> Level {
        if self.num_levels == 0 { Level::default() } else { self.asks[0] }
    }

    /// Number of active levels per side.
    #[must_use]
    pub const fn num_levels(&self) -> usize {
        self.num_levels
    }

    /// Bid price at level `k` (clamped to the deepest level).
    #[must_use]
    pub fn bid_price_at(&self, k: usize) -> i32 {
        self.bids[k.min(self.num_levels.saturating_sub(1))].price_ticks
    }

    /// Ask price at level `k` (clamped to the deepest level).
    #[must_use]
    pub fn ask_price_at(&self, k: usize) -> i32 {
        self.asks[k.min(self.num_levels.saturating_sub(1))].price_ticks
    }

    /// Bid depth at level `k` (zero out of range).
    #[must_use]
    pub fn bid_depth_at(&self, k: usize) -> u32 {
        if k < self.num_levels { self.bids[k].depth } else { 0 }
    }

    /// Ask depth at level `k` (zero out of range).
    #[must_use]
    pub fn ask_depth_at(&self, k: usize) -> u32 {
        if k < self.num_levels { self.asks[k].depth } else { 0 }
    }

    /// Redraw every level's depth from Poisson(`depth_mean`). Used by the
    /// queue-reactive extension after a price shift.
    pub fn reinitialize(&mut self, rng: &mut dyn Rng, depth_mean: f64) {
        let mu = if depth_mean > 0.0 { depth_mean } else { f64::from(self.initial_depth) };
        for k in 0..self.num_levels {
            self.bids[k].depth = poisson_sample(rng, mu);
            self.asks[k].depth = poisson_sample(rng, mu);
        }
    }

    fn bid_index_for(&self, price_ticks: i32) -> Option<usize> {
        if self.num_levels == 0 {
            return None;
        }
        let idx = self.bids[0].price_ticks - price_ticks;
        self.level_index(idx)
    }

    fn ask_index_for(&self, price_ticks: i32) -> Option<usize> {
        if self.num_levels == 0 {
            return None;
        }
        let idx = price_ticks - self.asks[0].price_ticks;
        self.level_index(idx)
    }

    fn level_index(&self, idx: i32) -> Option<usize> {
        match usize::try_from(idx) {
            Ok(k) if k < self.num_levels => Some(k),
            _ => None,
        }
    }

    /// Slide all bid levels up one index and synthesize a new deepest level
    /// one tick below the old deepest.
    fn shift_bids(&mut self) {
        let n = self.num_levels;
        if n == 1 {
            self.bids[0].price_ticks -= 1;
            self.bids[0].depth = self.initial_depth;
            return;
        }
        for i in 0..n - 1 {
            self.bids[i] = self.bids[i + 1];
        }
        self.bids[n - 1].price_ticks = self.bids[n - 2].price_ticks - 1;
        self.bids[n - 1].depth = self.initial_depth;
    }

    fn shift_asks(&mut self) {
        let n = self.num_levels;
        if n == 1 {
            self.asks[0].price_ticks += 1;
            self.asks[0].depth = self.initial_depth;
            return;
        }
        for i in 0..n - 1 {
            self.asks[i] = self.asks[i + 1];
        }
        self.asks[n - 1].price_ticks = self.asks[n - 2].price_ticks + 1;
        self.asks[n - 1].depth = self.initial_depth;
    }

    fn enforce_invariants(&self) {
        if self.num_levels == 0 {
            return;
        }
        debug_assert!(
            self.bids[0].price_ticks < self.asks[0].price_ticks,
            "crossed book: bid {} >= ask {}",
            self.bids[0].price_ticks,
            self.asks[0].price_ticks
        );
        for k in 1..self.num_levels {
            debug_assert!(
                self.bids[k].price_ticks < self.bids[k - 1].price_ticks,
                "bid ladder not strictly decreasing at level {k}"
            );
            debug_assert!(
                self.asks[k].price_ticks > self.asks[k - 1].price_ticks,
                "ask ladder not strictly increasing at level {k}"
            );
        }
        if self.bids[0].price_ticks >= self.asks[0].price_ticks {
            warn!(
                best_bid = self.bids[0].price_ticks,
                best_ask = self.asks[0].price_ticks,
                "book invariant violated"
            );
        }
    }
}

/// Inverse-CDF Poisson draw; returns a nonnegative integer.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn poisson_sample(rng: &mut dyn Rng, mean: f64) -> u32 {
    if mean <= 0.0 {
        return 0;
    }
    if mean > 1e6 {
        return mean as u32;
    }
    let mut u = rng.uniform();
    if u <= 0.0 || u >= 1.0 {
        u = 0.5;
    }
    let mut p = (-mean).exp();
    let mut s = p;
    let mut k = 0u32;
    while u > s {
        k += 1;
        p *= mean / f64::from(k);
        s += p;
    }
    k
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::Side;

    /// Fixed-sequence RNG for deterministic unit tests.
    struct SeqRng {
        values: Vec<f64>,
        pos: usize,
    }

    impl SeqRng {
        fn new(values: Vec<f64>) -> Self {
            Self { values, pos: 0 }
        }
    }

    impl Rng for SeqRng {
        fn uniform(&mut self) -> f64 {
            let v = self.values[self.pos % self.values.len()];
            self.pos += 1;
            v
        }

        fn seed(&mut self, _seed: u64) {
            self.pos = 0;
        }
    }

    fn seeded_book(p0: i32, levels: u32, depth: u32, spread: u32) -> MultiLevelBook {
        let mut book = MultiLevelBook::new();
        book.seed(&BookSeed {
            p0_ticks: p0,
            levels_per_side: levels,
            initial_depth: depth,
            initial_spread_ticks: spread,
        });
        book
    }

    fn event(event_type: EventType, side: Side, price_ticks: i32) -> SimEvent {
        SimEvent { event_type, side, price_ticks, qty: 1, order_id: 1 }
    }

    #[test]
    fn seed_installs_symmetric_ladder() {
        let book = seeded_book(10_000, 3, 5, 2);
        assert_eq!(book.best_bid().price_ticks, 9_999);
        assert_eq!(book.best_ask().price_ticks, 10_001);
        assert_eq!(book.bid_price_at(2), 9_997);
        assert_eq!(book.ask_price_at(2), 10_003);
        assert_eq!(book.bid_depth_at(0), 5);
        assert_eq!(book.features().spread_ticks, 2);
    }

    #[test]
    fn levels_capped_at_maximum() {
        let book = seeded_book(10_000, 200, 5, 2);
        assert_eq!(book.num_levels(), MAX_LEVELS);
    }

    #[test]
    fn add_and_cancel_adjust_depth() {
        let mut book = seeded_book(10_000, 3, 5, 2);
        book.apply(&event(EventType::AddBid, Side::Bid, 9_998));
        assert_eq!(book.bid_depth_at(1), 6);
        book.apply(&event(EventType::CancelBid, Side::Bid, 9_998));
        assert_eq!(book.bid_depth_at(1), 5);
    }

    #[test]
    fn out_of_range_add_is_discarded() {
        let mut book = seeded_book(10_000, 3, 5, 2);
        // Inside the spread: no matching level, so nothing changes.
        book.apply(&event(EventType::AddBid, Side::Bid, 10_000));
        let state = book.state();
        assert!(state.bid_depths.iter().all(|&d| d == 5));
    }

    #[test]
    fn cancel_saturates_at_zero() {
        let mut book = seeded_book(10_000, 2, 1, 2);
        let cancel = SimEvent {
            event_type: EventType::CancelAsk,
            side: Side::Ask,
            price_ticks: 10_001,
            qty: 10,
            order_id: 1,
        };
        book.apply(&cancel);
        assert_eq!(book.ask_depth_at(0), 0);
    }

    #[test]
    fn execute_sell_depletion_shifts_bid_ladder() {
        let mut book = seeded_book(10_000, 3, 1, 2);
        assert_eq!(book.best_bid(), Level { price_ticks: 9_999, depth: 1 });

        book.apply(&event(EventType::ExecuteSell, Side::Bid, 9_999));

        assert_eq!(book.best_bid(), Level { price_ticks: 9_998, depth: 1 });
        assert_eq!(book.bid_price_at(1), 9_997);
        assert_eq!(book.bid_price_at(2), 9_996);
        assert_eq!(book.bid_depth_at(2), 1);
        assert!(book.best_bid().price_ticks < book.best_ask().price_ticks);
    }

    #[test]
    fn execute_buy_depletion_shifts_ask_ladder() {
        let mut book = seeded_book(10_000, 3, 1, 2);
        book.apply(&event(EventType::ExecuteBuy, Side::Ask, 10_001));
        assert_eq!(book.best_ask(), Level { price_ticks: 10_002, depth: 1 });
        assert_eq!(book.ask_price_at(2), 10_004);
    }

    #[test]
    fn execute_without_depletion_keeps_prices() {
        let mut book = seeded_book(10_000, 3, 5, 2);
        book.apply(&event(EventType::ExecuteBuy, Side::Ask, 10_001));
        assert_eq!(book.best_ask(), Level { price_ticks: 10_001, depth: 4 });
    }

    #[test]
    fn single_level_book_shifts() {
        let mut book = seeded_book(10_000, 1, 1, 2);
        book.apply(&event(EventType::ExecuteSell, Side::Bid, 9_999));
        assert_eq!(book.best_bid(), Level { price_ticks: 9_998, depth: 1 });
    }

    #[test]
    fn features_report_signed_imbalance() {
        let mut book = seeded_book(10_000, 2, 5, 2);
        book.apply(&SimEvent {
            event_type: EventType::AddBid,
            side: Side::Bid,
            price_ticks: 9_999,
            qty: 5,
            order_id: 1,
        });
        let f = book.features();
        // q_bid=10, q_ask=5 -> (10-5)/(15+eps) ~ 0.333
        assert!(f.imbalance > 0.33 && f.imbalance < 0.34);
    }

    #[test]
    fn reinitialize_redraws_depths() {
        let mut book = seeded_book(10_000, 2, 5, 2);
        let mut rng = SeqRng::new(vec![0.01]);
        book.reinitialize(&mut rng, 3.0);
        // u=0.01 is below exp(-3) cumulative start -> k=0 for each draw.
        assert_eq!(book.bid_depth_at(0), 0);
        assert_eq!(book.ask_depth_at(0), 0);
        // Prices untouched.
        assert_eq!(book.best_bid().price_ticks, 9_999);
    }

    #[test]
    fn poisson_sample_mean_zero_is_zero() {
        let mut rng = SeqRng::new(vec![0.9]);
        assert_eq!(poisson_sample(&mut rng, 0.0), 0);
    }

    #[test]
    fn poisson_sample_tracks_mean() {
        let mut rng = SeqRng::new(vec![0.5]);
        // Median of Poisson(10) is 10; the inverse-CDF walk at u=0.5 lands nearby.
        let k = poisson_sample(&mut rng, 10.0);
        assert!((8..=12).contains(&k));
    }
}
