//! Run configuration

use anyhow::{anyhow, bail, Result};
use chrono::NaiveDate;
use common::{IntensityParams, QueueReactiveParams, DEFAULT_MARKET_OPEN_SECONDS};
use sim::HlrParams;
use std::path::PathBuf;
use std::str::FromStr;

/// Which intensity model drives a security.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ModelType {
    /// Imbalance-driven aggregate rates
    #[default]
    Simple,
    /// Per-level queue-size curves
    Hlr,
}

impl FromStr for ModelType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "simple" => Ok(Self::Simple),
            "hlr" => Ok(Self::Hlr),
            other => Err(anyhow!("unknown model '{other}' (expected 'simple' or 'hlr')")),
        }
    }
}

/// Per-security overrides for a multi-security run.
#[derive(Debug, Clone)]
pub struct SecurityConfig {
    /// Ticker symbol; names the output subdirectory
    pub symbol: String,
    /// Opening mid price in ticks
    pub p0_ticks: i32,
    /// Tick size in price-4 units
    pub tick_size: u32,
    /// Book levels per side
    pub levels_per_side: u32,
    /// Opening spread in ticks
    pub initial_spread_ticks: u32,
    /// Opening depth per level
    pub initial_depth: u32,
    /// Intensity model parameters
    pub intensity: IntensityParams,
    /// Queue-reactive parameters
    pub queue_reactive: QueueReactiveParams,
    /// Model selection
    pub model: ModelType,
}

/// Full configuration for a run: either single-security (the top-level
/// fields) or multi-security (`securities` non-empty, one thread each).
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Run identifier recorded in the manifest
    pub run_id: String,
    /// Output directory (created if missing)
    pub output_dir: PathBuf,
    /// Base seed; day and security seeds derive from it
    pub base_seed: u64,
    /// Opening mid price in ticks
    pub p0_ticks: i32,
    /// Session length in simulated seconds
    pub session_seconds: u32,
    /// Book levels per side
    pub levels_per_side: u32,
    /// Tick size in price-4 units
    pub tick_size: u32,
    /// Opening spread in ticks
    pub initial_spread_ticks: u32,
    /// Opening depth per level
    pub initial_depth: u32,
    /// Intensity model parameters
    pub intensity: IntensityParams,
    /// Queue-reactive parameters
    pub queue_reactive: QueueReactiveParams,
    /// Model selection
    pub model: ModelType,
    /// Curves for the HLR model; defaults are built when absent
    pub hlr_params: Option<HlrParams>,
    /// Trading days to simulate (0 = run until shutdown)
    pub num_days: u32,
    /// Records per chunk in the log files (0 = default)
    pub chunk_capacity: u32,
    /// First trading date
    pub start_date: NaiveDate,
    /// Per-security configs; empty selects single-security mode
    pub securities: Vec<SecurityConfig>,
    /// Market open, seconds after midnight
    pub market_open_seconds: u32,
    /// Pace event emission against the wall clock
    pub realtime: bool,
    /// Wall-clock speed multiplier for realtime mode
    pub speed: f64,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            run_id: "run_0".to_owned(),
            output_dir: PathBuf::from("output/run_0"),
            base_seed: 0,
            p0_ticks: 10_000,
            session_seconds: 23_400,
            levels_per_side: 5,
            tick_size: 100,
            initial_spread_ticks: 2,
            initial_depth: 5,
            intensity: IntensityParams::default(),
            queue_reactive: QueueReactiveParams::default(),
            model: ModelType::Simple,
            hlr_params: None,
            num_days: 5,
            chunk_capacity: 0,
            start_date: NaiveDate::from_ymd_opt(2026, 1, 2).unwrap_or_default(),
            securities: Vec::new(),
            market_open_seconds: DEFAULT_MARKET_OPEN_SECONDS,
            realtime: false,
            speed: 1.0,
        }
    }
}

impl RunConfig {
    /// Build the per-security list from a `SYM:P0,SYM:P0,...` spec,
    /// inheriting every other parameter from the top-level fields.
    ///
    /// # Errors
    ///
    /// Fails on an empty spec, a malformed entry, or a duplicate symbol.
    pub fn with_securities_spec(mut self, spec: &str) -> Result<Self> {
        self.securities = parse_securities_spec(spec)?
            .into_iter()
            .map(|(symbol, p0_ticks)| SecurityConfig {
                symbol,
                p0_ticks,
                tick_size: self.tick_size,
                levels_per_side: self.levels_per_side,
                initial_spread_ticks: self.initial_spread_ticks,
                initial_depth: self.initial_depth,
                intensity: self.intensity,
                queue_reactive: self.queue_reactive,
                model: self.model,
            })
            .collect();
        Ok(self)
    }
}

/// Parse a `SYM:P0,SYM:P0,...` securities spec into (symbol, price) pairs.
///
/// # Errors
///
/// Fails on empty input, an entry without `SYMBOL:TICKS` shape, a
/// non-numeric price, or a repeated symbol.
pub fn parse_securities_spec(spec: &str) -> Result<Vec<(String, i32)>> {
    let mut out: Vec<(String, i32)> = Vec::new();
    for entry in spec.split(',') {
        let entry = entry.trim();
        if entry.is_empty() {
            continue;
        }
        let (symbol, price) = entry
            .split_once(':')
            .ok_or_else(|| anyhow!("malformed securities entry '{entry}' (expected SYMBOL:TICKS)"))?;
        if symbol.is_empty() {
            bail!("empty symbol in securities entry '{entry}'");
        }
        let p0: i32 = price
            .parse()
            .map_err(|_| anyhow!("invalid price in securities entry '{entry}'"))?;
        if out.iter().any(|(s, _)| s == symbol) {
            bail!("duplicate symbol '{symbol}' in securities spec");
        }
        out.push((symbol.to_owned(), p0));
    }
    if out.is_empty() {
        bail!("securities spec is empty");
    }
    Ok(out)
}
