//! The session runner: day loop, per-security threads, shutdown handling

use crate::config::{ModelType, RunConfig, SecurityConfig};
use crate::dates::{format_date, next_business_day};
use crate::manifest::write_manifest;
use anyhow::{bail, Context, Result};
use common::{IntensityParams, QueueReactiveParams, TradingSession};
use lob::MultiLevelBook;
use sim::{
    default_hlr_params, AttributeSampler, CurveIntensityModel, IntensityModel, Producer,
    SimpleImbalanceIntensity, Xoshiro256PlusPlus,
};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use storage::{BinaryFileSink, EventLogReader, EventSink};
use tracing::{info, warn};

/// Seed distance between adjacent securities, keeping their per-day seed
/// ranges disjoint for runs of up to this many days.
pub const SEED_STRIDE: u64 = 1024;

/// Level-decay coefficient for the attribute sampler.
const ATTR_ALPHA: f64 = 0.5;
/// Spread-improvement coefficient for the attribute sampler.
const ATTR_SPREAD_IMPROVE: f64 = 0.5;

static SHUTDOWN: AtomicBool = AtomicBool::new(false);

/// Install a Ctrl-C / SIGTERM handler that requests cooperative shutdown.
///
/// # Errors
///
/// Fails when the process-wide handler cannot be installed (e.g. called
/// twice).
pub fn install_shutdown_handler() -> Result<()> {
    ctrlc::set_handler(|| {
        SHUTDOWN.store(true, Ordering::Relaxed);
    })
    .context("cannot install shutdown handler")
}

/// True once shutdown has been requested; checked between events.
#[must_use]
pub fn shutdown_requested() -> bool {
    SHUTDOWN.load(Ordering::Relaxed)
}

/// Outcome of one simulated trading day.
#[derive(Debug, Clone)]
pub struct DayResult {
    /// Symbol (empty in single-security mode)
    pub symbol: String,
    /// Trading date, `YYYY-MM-DD`
    pub date: String,
    /// Log file path relative to the output directory
    pub filename: String,
    /// Seed the day ran with
    pub seed: u64,
    /// Opening mid price in ticks
    pub open_ticks: i32,
    /// Closing mid price in ticks
    pub close_ticks: i32,
    /// Records written
    pub events_written: u64,
    /// Chunks written
    pub chunks_written: u32,
    /// Size of the log file
    pub file_size_bytes: u64,
    /// Wall-clock seconds spent generating and writing
    pub write_seconds: f64,
    /// Wall-clock seconds spent on the read-back verification
    pub read_seconds: f64,
}

/// Outcome of a whole run.
#[derive(Debug, Clone, Default)]
pub struct RunResult {
    /// Per-day results, grouped by security in multi-security mode
    pub days: Vec<DayResult>,
    /// Total wall-clock seconds
    pub total_elapsed_seconds: f64,
    /// Total records across all days
    pub total_events: u64,
}

/// Drives consecutive trading sessions with price chaining: each day opens
/// at the previous day's close. Multi-security runs use one thread per
/// security, each with a private RNG, book, model, samplers and sink.
#[derive(Debug, Default)]
pub struct SessionRunner;

/// Everything one security's day loop needs; built from either the
/// top-level config (single-security) or one `SecurityConfig`.
struct SecurityPlan {
    symbol: String,
    p0_ticks: i32,
    tick_size: u32,
    levels_per_side: u32,
    initial_spread_ticks: u32,
    initial_depth: u32,
    intensity: IntensityParams,
    queue_reactive: QueueReactiveParams,
    model: ModelType,
    seed_offset: u64,
}

impl SecurityPlan {
    fn single(config: &RunConfig) -> Self {
        Self {
            symbol: String::new(),
            p0_ticks: config.p0_ticks,
            tick_size: config.tick_size,
            levels_per_side: config.levels_per_side,
            initial_spread_ticks: config.initial_spread_ticks,
            initial_depth: config.initial_depth,
            intensity: config.intensity,
            queue_reactive: config.queue_reactive,
            model: config.model,
            seed_offset: 0,
        }
    }

    fn for_security(sec: &SecurityConfig, index: u64) -> Self {
        Self {
            symbol: sec.symbol.clone(),
            p0_ticks: sec.p0_ticks,
            tick_size: sec.tick_size,
            levels_per_side: sec.levels_per_side,
            initial_spread_ticks: sec.initial_spread_ticks,
            initial_depth: sec.initial_depth,
            intensity: sec.intensity,
            queue_reactive: sec.queue_reactive,
            model: sec.model,
            seed_offset: index * SEED_STRIDE,
        }
    }
}

impl SessionRunner {
    /// Run every configured day (and security), then write the manifest.
    /// A shutdown request ends the run cleanly after the current event;
    /// completed days keep their files and appear in the manifest.
    ///
    /// # Errors
    ///
    /// Fails on the first fatal sink/reader error or when any security
    /// thread fails; partial output up to that point is left on disk.
    pub fn run(&self, config: &RunConfig) -> Result<RunResult> {
        std::fs::create_dir_all(&config.output_dir).with_context(|| {
            format!("cannot create output directory {}", config.output_dir.display())
        })?;

        let run_start = Instant::now();
        let mut result = RunResult::default();

        if config.securities.is_empty() {
            let days = run_security_days(config, &SecurityPlan::single(config))?;
            collect_days(&mut result, days);
        } else {
            let outcomes: Vec<Result<Vec<DayResult>>> = std::thread::scope(|scope| {
                let handles: Vec<_> = config
                    .securities
                    .iter()
                    .enumerate()
                    .map(|(i, sec)| {
                        let plan = SecurityPlan::for_security(sec, i as u64);
                        scope.spawn(move || run_security_days(config, &plan))
                    })
                    .collect();
                handles
                    .into_iter()
                    .map(|h| match h.join() {
                        Ok(r) => r,
                        Err(_) => Err(anyhow::anyhow!("security thread panicked")),
                    })
                    .collect()
            });
            for (outcome, sec) in outcomes.into_iter().zip(&config.securities) {
                let days = outcome
                    .with_context(|| format!("security {} failed", sec.symbol))?;
                collect_days(&mut result, days);
            }
        }

        result.total_elapsed_seconds = run_start.elapsed().as_secs_f64();
        write_manifest(config, &result.days)?;
        info!(
            days = result.days.len(),
            events = result.total_events,
            elapsed_s = result.total_elapsed_seconds,
            "run complete"
        );
        Ok(result)
    }
}

fn collect_days(result: &mut RunResult, days: Vec<DayResult>) {
    for day in days {
        result.total_events += day.events_written;
        result.days.push(day);
    }
}

fn build_model(config: &RunConfig, plan: &SecurityPlan) -> Box<dyn IntensityModel> {
    match plan.model {
        ModelType::Simple => Box::new(SimpleImbalanceIntensity::new(plan.intensity)),
        ModelType::Hlr => {
            let params = config.hlr_params.clone().unwrap_or_else(|| {
                default_hlr_params(plan.levels_per_side as usize, 100)
            });
            Box::new(CurveIntensityModel::new(params))
        }
    }
}

/// The per-security day loop. Runs on its own thread in multi-security
/// mode; everything it touches is private to this call.
#[allow(clippy::too_many_lines)]
fn run_security_days(config: &RunConfig, plan: &SecurityPlan) -> Result<Vec<DayResult>> {
    let sub_dir = if plan.symbol.is_empty() {
        config.output_dir.clone()
    } else {
        config.output_dir.join(&plan.symbol)
    };
    std::fs::create_dir_all(&sub_dir)
        .with_context(|| format!("cannot create {}", sub_dir.display()))?;

    let base_seed = config.base_seed + plan.seed_offset;
    let mut rng = Xoshiro256PlusPlus::new(base_seed);
    let mut book = MultiLevelBook::new();
    let mut model = build_model(config, plan);
    let mut attr_sampler = AttributeSampler::new(ATTR_ALPHA, ATTR_SPREAD_IMPROVE);
    let mut producer = Producer::new(&mut rng, &mut book, model.as_mut(), &mut attr_sampler);

    let mut days = Vec::new();
    let mut current_date = config.start_date;
    let mut next_p0 = plan.p0_ticks;
    let infinite = config.num_days == 0;
    let mut day_idx: u32 = 0;

    while infinite || day_idx < config.num_days {
        if shutdown_requested() {
            info!(symbol = %plan.symbol, "shutdown requested, stopping day loop");
            break;
        }

        let day_seed = base_seed + u64::from(day_idx);
        let date_str = format_date(current_date);
        let filename = if plan.symbol.is_empty() {
            format!("{date_str}.qrsdp")
        } else {
            format!("{}/{date_str}.qrsdp", plan.symbol)
        };
        let filepath: PathBuf = config.output_dir.join(&filename);

        let session = TradingSession {
            seed: day_seed,
            p0_ticks: next_p0,
            session_seconds: config.session_seconds,
            levels_per_side: plan.levels_per_side,
            tick_size: plan.tick_size,
            initial_spread_ticks: plan.initial_spread_ticks,
            initial_depth: plan.initial_depth,
            market_open_seconds: config.market_open_seconds,
            intensity: plan.intensity,
            queue_reactive: plan.queue_reactive,
        };

        let mut sink = BinaryFileSink::create(&filepath, &session, config.chunk_capacity)?;

        let write_start = Instant::now();
        producer.start_session(&session);
        let wall_start = Instant::now();
        loop {
            if shutdown_requested() {
                break;
            }
            if !producer.step_one_event(&mut sink)? {
                break;
            }
            if config.realtime && config.speed > 0.0 {
                let wall_target = producer.current_time() / config.speed;
                let wall_elapsed = wall_start.elapsed().as_secs_f64();
                if wall_target > wall_elapsed {
                    std::thread::sleep(Duration::from_secs_f64(wall_target - wall_elapsed));
                }
            }
        }
        let session_result = producer.finish();
        let write_seconds = write_start.elapsed().as_secs_f64();

        let chunks_written = {
            sink.close()?;
            sink.chunks_written()
        };
        let file_size_bytes = std::fs::metadata(&filepath)
            .with_context(|| format!("cannot stat {}", filepath.display()))?
            .len();

        // Sequential read-back check, skipped under realtime pacing.
        let mut read_seconds = 0.0;
        if !config.realtime && !shutdown_requested() {
            let read_start = Instant::now();
            let mut reader = EventLogReader::open(&filepath)?;
            let records = reader.read_all()?;
            if records.len() as u64 != session_result.events_written {
                bail!(
                    "read-back mismatch in {}: {} records on disk, {} written",
                    filepath.display(),
                    records.len(),
                    session_result.events_written
                );
            }
            read_seconds = read_start.elapsed().as_secs_f64();
        }

        info!(
            symbol = %plan.symbol,
            date = %date_str,
            seed = day_seed,
            events = session_result.events_written,
            chunks = chunks_written,
            close = session_result.close_ticks,
            "day complete"
        );

        days.push(DayResult {
            symbol: plan.symbol.clone(),
            date: date_str,
            filename,
            seed: day_seed,
            open_ticks: next_p0,
            close_ticks: session_result.close_ticks,
            events_written: session_result.events_written,
            chunks_written,
            file_size_bytes,
            write_seconds,
            read_seconds,
        });

        if shutdown_requested() && session_result.events_written == 0 {
            warn!(symbol = %plan.symbol, "dropping empty day cut short by shutdown");
            let _ = days.pop();
            break;
        }

        next_p0 = session_result.close_ticks;
        current_date = next_business_day(current_date);
        day_idx += 1;
    }

    Ok(days)
}
