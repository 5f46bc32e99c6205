//! Session configuration and results

/// Default depth installed at each level when a session seeds the book.
pub const DEFAULT_INITIAL_DEPTH: u32 = 50;
/// Default spread at session open, in ticks.
pub const DEFAULT_INITIAL_SPREAD_TICKS: u32 = 2;
/// Default market open, seconds after midnight (09:30).
pub const DEFAULT_MARKET_OPEN_SECONDS: u32 = 34_200;

/// Parameters for the imbalance-driven intensity model.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IntensityParams {
    /// Base limit-order arrival rate
    pub base_add: f64,
    /// Base per-unit cancellation rate
    pub base_cancel: f64,
    /// Base market-order arrival rate
    pub base_exec: f64,
    /// Spread feedback strength (neutral at spread = 2 ticks)
    pub spread_sensitivity: f64,
    /// Imbalance feedback strength
    pub imbalance_sensitivity: f64,
    /// Cancellation scaling applied to total resting depth
    pub cancel_sensitivity: f64,
    /// Baseline execution share when imbalance is flat
    pub epsilon_exec: f64,
}

impl Default for IntensityParams {
    fn default() -> Self {
        Self {
            base_add: 22.0,
            base_cancel: 0.2,
            base_exec: 30.0,
            spread_sensitivity: 0.3,
            imbalance_sensitivity: 1.0,
            cancel_sensitivity: 1.0,
            epsilon_exec: 0.5,
        }
    }
}

/// Queue-reactive extension: after a price shift, the whole book may be
/// redrawn from a Poisson depth distribution.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QueueReactiveParams {
    /// Probability that a shift triggers a depth reinitialization (0 = never)
    pub theta_reinit: f64,
    /// Mean of the Poisson depth draw on reinitialization
    pub reinit_depth_mean: f64,
}

impl Default for QueueReactiveParams {
    fn default() -> Self {
        Self { theta_reinit: 0.0, reinit_depth_mean: 10.0 }
    }
}

/// Immutable description of one intraday session. The producer reseeds its
/// RNG and book from this; it is never mutated.
#[derive(Debug, Clone, PartialEq)]
pub struct TradingSession {
    /// RNG seed for the session
    pub seed: u64,
    /// Opening mid price in ticks
    pub p0_ticks: i32,
    /// Session length in simulated seconds
    pub session_seconds: u32,
    /// Book levels per side (capped at the book maximum)
    pub levels_per_side: u32,
    /// Tick size in price-4 units (100 = $0.01)
    pub tick_size: u32,
    /// Spread at open, in ticks
    pub initial_spread_ticks: u32,
    /// Depth installed at every level at open (0 = default)
    pub initial_depth: u32,
    /// Market open, seconds after midnight (stamps the log header)
    pub market_open_seconds: u32,
    /// Intensity model parameters
    pub intensity: IntensityParams,
    /// Queue-reactive reinitialization parameters
    pub queue_reactive: QueueReactiveParams,
}

impl Default for TradingSession {
    fn default() -> Self {
        Self {
            seed: 0,
            p0_ticks: 10_000,
            session_seconds: 23_400,
            levels_per_side: 5,
            tick_size: 100,
            initial_spread_ticks: DEFAULT_INITIAL_SPREAD_TICKS,
            initial_depth: DEFAULT_INITIAL_DEPTH,
            market_open_seconds: DEFAULT_MARKET_OPEN_SECONDS,
            intensity: IntensityParams::default(),
            queue_reactive: QueueReactiveParams::default(),
        }
    }
}

/// Seeding instructions for the book at session start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BookSeed {
    /// Opening mid price in ticks
    pub p0_ticks: i32,
    /// Levels per side
    pub levels_per_side: u32,
    /// Depth at every level
    pub initial_depth: u32,
    /// Opening spread in ticks
    pub initial_spread_ticks: u32,
}

impl From<&TradingSession> for BookSeed {
    fn from(s: &TradingSession) -> Self {
        Self {
            p0_ticks: s.p0_ticks,
            levels_per_side: s.levels_per_side,
            initial_depth: if s.initial_depth > 0 { s.initial_depth } else { DEFAULT_INITIAL_DEPTH },
            initial_spread_ticks: if s.initial_spread_ticks > 0 {
                s.initial_spread_ticks
            } else {
                DEFAULT_INITIAL_SPREAD_TICKS
            },
        }
    }
}

/// Outcome of one session run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionResult {
    /// Mid price at the close, in ticks
    pub close_ticks: i32,
    /// Number of records appended to the sink
    pub events_written: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn book_seed_applies_defaults_for_zero_fields() {
        let session = TradingSession { initial_depth: 0, initial_spread_ticks: 0, ..TradingSession::default() };
        let seed = BookSeed::from(&session);
        assert_eq!(seed.initial_depth, DEFAULT_INITIAL_DEPTH);
        assert_eq!(seed.initial_spread_ticks, DEFAULT_INITIAL_SPREAD_TICKS);
    }

    #[test]
    fn book_seed_preserves_explicit_fields() {
        let session = TradingSession { initial_depth: 7, initial_spread_ticks: 4, ..TradingSession::default() };
        let seed = BookSeed::from(&session);
        assert_eq!(seed.initial_depth, 7);
        assert_eq!(seed.initial_spread_ticks, 4);
    }
}
