//! Multi-day orchestration tests: determinism across runs, price chaining,
//! seed derivation and manifest output.

use runner::{ModelType, RunConfig, SessionRunner, SEED_STRIDE};
use std::path::Path;
use tempfile::TempDir;

fn small_config(output_dir: &Path, base_seed: u64) -> RunConfig {
    RunConfig {
        run_id: format!("run_{base_seed}"),
        output_dir: output_dir.to_path_buf(),
        base_seed,
        session_seconds: 2,
        num_days: 3,
        levels_per_side: 3,
        initial_depth: 5,
        chunk_capacity: 64,
        ..RunConfig::default()
    }
}

#[test]
fn identical_configs_produce_identical_files() {
    let dir_a = TempDir::new().unwrap();
    let dir_b = TempDir::new().unwrap();

    let result_a = SessionRunner.run(&small_config(dir_a.path(), 12_345)).unwrap();
    let result_b = SessionRunner.run(&small_config(dir_b.path(), 12_345)).unwrap();

    assert_eq!(result_a.days.len(), 3);
    assert_eq!(result_a.total_events, result_b.total_events);
    assert!(result_a.total_events > 0);

    for (day_a, day_b) in result_a.days.iter().zip(&result_b.days) {
        let bytes_a = std::fs::read(dir_a.path().join(&day_a.filename)).unwrap();
        let bytes_b = std::fs::read(dir_b.path().join(&day_b.filename)).unwrap();
        assert_eq!(bytes_a, bytes_b, "day {} differs between runs", day_a.date);
    }
}

#[test]
fn different_seeds_produce_different_streams() {
    let dir_a = TempDir::new().unwrap();
    let dir_b = TempDir::new().unwrap();
    let a = SessionRunner.run(&small_config(dir_a.path(), 1)).unwrap();
    let b = SessionRunner.run(&small_config(dir_b.path(), 2)).unwrap();
    let bytes_a = std::fs::read(dir_a.path().join(&a.days[0].filename)).unwrap();
    let bytes_b = std::fs::read(dir_b.path().join(&b.days[0].filename)).unwrap();
    assert_ne!(bytes_a, bytes_b);
}

#[test]
fn days_chain_prices_seeds_and_business_dates() {
    let dir = TempDir::new().unwrap();
    let result = SessionRunner.run(&small_config(dir.path(), 77)).unwrap();

    for (i, day) in result.days.iter().enumerate() {
        assert_eq!(day.seed, 77 + i as u64);
    }
    for pair in result.days.windows(2) {
        assert_eq!(pair[1].open_ticks, pair[0].close_ticks);
    }
    // 2026-01-02 is a Friday; the next two trading days skip the weekend.
    let dates: Vec<&str> = result.days.iter().map(|d| d.date.as_str()).collect();
    assert_eq!(dates, vec!["2026-01-02", "2026-01-05", "2026-01-06"]);
}

#[test]
fn single_security_manifest_is_v1_0() {
    let dir = TempDir::new().unwrap();
    SessionRunner.run(&small_config(dir.path(), 5)).unwrap();

    let manifest: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(dir.path().join("manifest.json")).unwrap())
            .unwrap();
    assert_eq!(manifest["format_version"], "1.0");
    assert_eq!(manifest["producer"], "qrsdp");
    assert_eq!(manifest["seed_strategy"], "sequential");
    assert_eq!(manifest["base_seed"], 5);
    let sessions = manifest["sessions"].as_array().unwrap();
    assert_eq!(sessions.len(), 3);
    assert_eq!(sessions[0]["date"], "2026-01-02");
    assert_eq!(sessions[0]["file"], "2026-01-02.qrsdp");
}

#[test]
fn multi_security_run_writes_v1_1_manifest_and_subdirs() {
    let dir = TempDir::new().unwrap();
    let config = {
        let mut c = small_config(dir.path(), 9);
        c.num_days = 2;
        c.with_securities_spec("AAPL:10000,MSFT:25000").unwrap()
    };
    let result = SessionRunner.run(&config).unwrap();
    assert_eq!(result.days.len(), 4);

    // Each security runs from its own seed range and writes its own files.
    let aapl: Vec<_> = result.days.iter().filter(|d| d.symbol == "AAPL").collect();
    let msft: Vec<_> = result.days.iter().filter(|d| d.symbol == "MSFT").collect();
    assert_eq!(aapl.len(), 2);
    assert_eq!(msft.len(), 2);
    assert_eq!(aapl[0].seed, 9);
    assert_eq!(msft[0].seed, 9 + SEED_STRIDE);
    assert!(dir.path().join("AAPL/2026-01-02.qrsdp").exists());
    assert!(dir.path().join("MSFT/2026-01-05.qrsdp").exists());
    assert_eq!(msft[0].open_ticks, 25_000);

    let manifest: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(dir.path().join("manifest.json")).unwrap())
            .unwrap();
    assert_eq!(manifest["format_version"], "1.1");
    let securities = manifest["securities"].as_array().unwrap();
    assert_eq!(securities.len(), 2);
    assert_eq!(securities[0]["symbol"], "AAPL");
    assert_eq!(securities[0]["sessions"].as_array().unwrap().len(), 2);
    assert_eq!(securities[1]["sessions"][0]["file"], "MSFT/2026-01-02.qrsdp");
}

#[test]
fn hlr_model_runs_end_to_end() {
    let dir = TempDir::new().unwrap();
    let config = RunConfig {
        model: ModelType::Hlr,
        num_days: 1,
        ..small_config(dir.path(), 31)
    };
    let result = SessionRunner.run(&config).unwrap();
    assert_eq!(result.days.len(), 1);
    assert!(result.total_events > 0);
}

#[test]
fn report_writes_next_to_the_manifest() {
    let dir = TempDir::new().unwrap();
    let config = small_config(dir.path(), 13);
    let result = SessionRunner.run(&config).unwrap();
    let report_path = dir.path().join("performance-results.md");
    runner::report::write_performance_report(&config, &result, &report_path).unwrap();
    let report = std::fs::read_to_string(&report_path).unwrap();
    assert!(report.contains("# Performance Results"));
    assert!(report.contains("2026-01-02"));
}
