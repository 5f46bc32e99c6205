//! Manifest JSON output
//!
//! Version 1.0 for single-security runs, 1.1 (with a `securities` array)
//! for multi-security runs.

use crate::config::RunConfig;
use crate::runner::DayResult;
use anyhow::{Context, Result};
use serde::Serialize;
use std::path::Path;

#[derive(Serialize)]
struct SessionEntry {
    date: String,
    seed: u64,
    file: String,
}

#[derive(Serialize)]
struct SecurityEntry {
    symbol: String,
    p0_ticks: i32,
    tick_size: u32,
    levels_per_side: u32,
    initial_spread_ticks: u32,
    initial_depth: u32,
    sessions: Vec<SessionEntry>,
}

#[derive(Serialize)]
struct SingleSecurityManifest<'a> {
    format_version: &'static str,
    run_id: &'a str,
    producer: &'static str,
    base_seed: u64,
    seed_strategy: &'static str,
    session_seconds: u32,
    tick_size: u32,
    p0_ticks: i32,
    levels_per_side: u32,
    initial_spread_ticks: u32,
    initial_depth: u32,
    sessions: Vec<SessionEntry>,
}

#[derive(Serialize)]
struct MultiSecurityManifest<'a> {
    format_version: &'static str,
    run_id: &'a str,
    producer: &'static str,
    base_seed: u64,
    seed_strategy: &'static str,
    session_seconds: u32,
    securities: Vec<SecurityEntry>,
}

fn sessions_for<'a>(
    days: impl Iterator<Item = &'a DayResult>,
) -> Vec<SessionEntry> {
    days.map(|d| SessionEntry { date: d.date.clone(), seed: d.seed, file: d.filename.clone() })
        .collect()
}

/// Write `manifest.json` into the run's output directory.
///
/// # Errors
///
/// Fails when serialization or the file write fails.
pub fn write_manifest(config: &RunConfig, days: &[DayResult]) -> Result<()> {
    let path = config.output_dir.join("manifest.json");
    let json = if config.securities.is_empty() {
        let manifest = SingleSecurityManifest {
            format_version: "1.0",
            run_id: &config.run_id,
            producer: "qrsdp",
            base_seed: config.base_seed,
            seed_strategy: "sequential",
            session_seconds: config.session_seconds,
            tick_size: config.tick_size,
            p0_ticks: config.p0_ticks,
            levels_per_side: config.levels_per_side,
            initial_spread_ticks: config.initial_spread_ticks,
            initial_depth: config.initial_depth,
            sessions: sessions_for(days.iter()),
        };
        serde_json::to_string_pretty(&manifest).context("cannot serialize manifest")?
    } else {
        let securities = config
            .securities
            .iter()
            .map(|sec| SecurityEntry {
                symbol: sec.symbol.clone(),
                p0_ticks: sec.p0_ticks,
                tick_size: sec.tick_size,
                levels_per_side: sec.levels_per_side,
                initial_spread_ticks: sec.initial_spread_ticks,
                initial_depth: sec.initial_depth,
                sessions: sessions_for(days.iter().filter(|d| d.symbol == sec.symbol)),
            })
            .collect();
        let manifest = MultiSecurityManifest {
            format_version: "1.1",
            run_id: &config.run_id,
            producer: "qrsdp",
            base_seed: config.base_seed,
            seed_strategy: "sequential",
            session_seconds: config.session_seconds,
            securities,
        };
        serde_json::to_string_pretty(&manifest).context("cannot serialize manifest")?
    };
    write_with_newline(&path, &json)
}

fn write_with_newline(path: &Path, json: &str) -> Result<()> {
    std::fs::write(path, format!("{json}\n"))
        .with_context(|| format!("cannot write manifest {}", path.display()))
}
