//! Performance report: per-day throughput and compression, markdown

use crate::config::RunConfig;
use crate::runner::RunResult;
use anyhow::{Context, Result};
use std::fmt::Write as _;
use std::path::Path;
use storage::format::{DEFAULT_CHUNK_CAPACITY, RECORD_SIZE};

/// Write a markdown performance report for a finished run.
///
/// # Errors
///
/// Fails when the parent directory cannot be created or the write fails.
#[allow(clippy::cast_precision_loss)]
pub fn write_performance_report(
    config: &RunConfig,
    result: &RunResult,
    path: &Path,
) -> Result<()> {
    let mut doc = String::new();

    let _ = writeln!(doc, "# Performance Results\n");
    let _ = writeln!(doc, "Auto-generated by `qrsdp run`.\n");

    let _ = writeln!(doc, "## Run Configuration\n");
    let _ = writeln!(doc, "| Parameter | Value |");
    let _ = writeln!(doc, "|:----------|:------|");
    let _ = writeln!(doc, "| run_id | {} |", config.run_id);
    let _ = writeln!(doc, "| base_seed | {} |", config.base_seed);
    let _ = writeln!(doc, "| num_days | {} |", config.num_days);
    let _ = writeln!(doc, "| session_seconds | {} |", config.session_seconds);
    let _ = writeln!(doc, "| p0_ticks | {} |", config.p0_ticks);
    let _ = writeln!(doc, "| tick_size | {} |", config.tick_size);
    let _ = writeln!(doc, "| levels_per_side | {} |", config.levels_per_side);
    let _ = writeln!(doc, "| initial_depth | {} |", config.initial_depth);
    let chunk_capacity = if config.chunk_capacity > 0 {
        config.chunk_capacity
    } else {
        DEFAULT_CHUNK_CAPACITY
    };
    let _ = writeln!(doc, "| chunk_capacity | {chunk_capacity} |");
    let _ = writeln!(doc, "| base_add | {:.1} |", config.intensity.base_add);
    let _ = writeln!(doc, "| base_cancel | {:.1} |", config.intensity.base_cancel);
    let _ = writeln!(doc, "| base_exec | {:.1} |", config.intensity.base_exec);
    let _ = writeln!(doc);

    let _ = writeln!(doc, "## Per-Day Results\n");
    let _ = writeln!(
        doc,
        "| Date | Events | File Size | Compression | Write ev/s | Read ev/s | Open | Close |"
    );
    let _ = writeln!(
        doc,
        "|:-----|-------:|----------:|------------:|-----------:|----------:|-----:|------:|"
    );

    let mut total_file_bytes = 0u64;
    let mut total_raw_bytes = 0u64;
    let mut total_write_secs = 0.0f64;
    let mut total_read_secs = 0.0f64;
    for d in &result.days {
        let raw = d.events_written * u64::from(RECORD_SIZE);
        let ratio =
            if d.file_size_bytes > 0 { raw as f64 / d.file_size_bytes as f64 } else { 0.0 };
        let write_eps =
            if d.write_seconds > 0.0 { d.events_written as f64 / d.write_seconds } else { 0.0 };
        let read_eps =
            if d.read_seconds > 0.0 { d.events_written as f64 / d.read_seconds } else { 0.0 };
        total_file_bytes += d.file_size_bytes;
        total_raw_bytes += raw;
        total_write_secs += d.write_seconds;
        total_read_secs += d.read_seconds;
        let _ = writeln!(
            doc,
            "| {} | {} | {} B | {ratio:.2}x | {write_eps:.0} | {read_eps:.0} | {} | {} |",
            d.date, d.events_written, d.file_size_bytes, d.open_ticks, d.close_ticks
        );
    }

    let _ = writeln!(doc, "\n## Aggregate\n");
    let _ = writeln!(doc, "| Metric | Value |");
    let _ = writeln!(doc, "|:-------|:------|");
    let _ = writeln!(doc, "| Total events | {} |", result.total_events);
    let _ = writeln!(
        doc,
        "| Total file size | {} B ({:.2} MB) |",
        total_file_bytes,
        total_file_bytes as f64 / (1024.0 * 1024.0)
    );
    let _ = writeln!(
        doc,
        "| Total raw size | {} B ({:.2} MB) |",
        total_raw_bytes,
        total_raw_bytes as f64 / (1024.0 * 1024.0)
    );
    let overall_ratio = if total_file_bytes > 0 {
        total_raw_bytes as f64 / total_file_bytes as f64
    } else {
        0.0
    };
    let mean_write = if total_write_secs > 0.0 {
        result.total_events as f64 / total_write_secs
    } else {
        0.0
    };
    let mean_read =
        if total_read_secs > 0.0 { result.total_events as f64 / total_read_secs } else { 0.0 };
    let _ = writeln!(doc, "| Overall compression | {overall_ratio:.2}x |");
    let _ = writeln!(doc, "| Mean write throughput | {mean_write:.0} events/sec |");
    let _ = writeln!(doc, "| Mean read throughput | {mean_read:.0} events/sec |");
    let _ = writeln!(doc, "| Total wall time | {:.2} s |", result.total_elapsed_seconds);

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("cannot create report directory {}", parent.display()))?;
    }
    std::fs::write(path, doc)
        .with_context(|| format!("cannot write performance report {}", path.display()))
}
