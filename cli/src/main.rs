//! qrsdp - queue-reactive stochastic limit-order-book simulator CLI

#![deny(warnings)]
#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![deny(dead_code)]
#![deny(unused)]
#![deny(missing_docs)]
#![forbid(unsafe_code)]

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use common::{IntensityParams, QueueReactiveParams};
use itch::messages::{EVENT_END_OF_MARKET, EVENT_START_OF_MARKET};
use itch::{decode_message, parse_packet, ItchEncoder, MoldUdp64Framer, UdpSender};
use runner::report::write_performance_report;
use runner::{
    calibrate_curves, dates, install_shutdown_handler, CalibrateOptions, ModelType, RunConfig,
    SessionRunner,
};
use sim::HlrParams;
use std::net::{Ipv4Addr, UdpSocket};
use std::path::PathBuf;
use std::time::Duration;
use storage::EventLogReader;
use tracing::{info, warn, Level};

#[derive(Parser)]
#[command(name = "qrsdp")]
#[command(about = "Queue-reactive stochastic limit-order-book simulator")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
#[allow(clippy::large_enum_variant)]
enum Commands {
    /// Generate one or more simulated trading days
    Run(RunArgs),
    /// Inspect a .qrsdp event log
    Info(InfoArgs),
    /// Stream a .qrsdp event log as ITCH 5.0 in MoldUDP64 packets over UDP
    Stream(StreamArgs),
    /// Estimate per-level intensity curves from event logs
    Calibrate(CalibrateArgs),
    /// Receive MoldUDP64 packets and print the decoded ITCH messages
    Listen(ListenArgs),
}

#[derive(Args)]
struct RunArgs {
    /// Base seed; per-day and per-security seeds derive from it
    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Number of trading days (0 = run until shutdown)
    #[arg(long, default_value_t = 5)]
    days: u32,

    /// Simulated seconds per session
    #[arg(long, default_value_t = 23_400)]
    seconds: u32,

    /// Opening price in ticks
    #[arg(long, default_value_t = 10_000)]
    p0: i32,

    /// Output directory (default: output/run_<seed>)
    #[arg(long)]
    output: Option<PathBuf>,

    /// First trading date, YYYY-MM-DD
    #[arg(long, default_value = "2026-01-02")]
    start_date: String,

    /// Records per compressed chunk (0 = default)
    #[arg(long, default_value_t = 0)]
    chunk_size: u32,

    /// Initial depth per level
    #[arg(long, default_value_t = 5)]
    depth: u32,

    /// Price levels per side
    #[arg(long, default_value_t = 5)]
    levels: u32,

    /// Tick size in price-4 units (100 = $0.01)
    #[arg(long, default_value_t = 100)]
    tick_size: u32,

    /// Initial spread in ticks
    #[arg(long, default_value_t = 2)]
    spread: u32,

    /// Multi-security spec: SYM:P0,SYM:P0,...
    #[arg(long)]
    securities: Option<String>,

    /// Intensity model: simple | hlr
    #[arg(long, default_value = "simple")]
    model: String,

    /// JSON curve file for the hlr model (defaults are built when absent)
    #[arg(long)]
    hlr_curves: Option<PathBuf>,

    /// Base limit-order arrival rate
    #[arg(long, default_value_t = 22.0)]
    base_add: f64,

    /// Base per-unit cancellation rate
    #[arg(long, default_value_t = 0.2)]
    base_cancel: f64,

    /// Base market-order arrival rate
    #[arg(long, default_value_t = 30.0)]
    base_exec: f64,

    /// Spread feedback strength
    #[arg(long, default_value_t = 0.3)]
    spread_sensitivity: f64,

    /// Imbalance feedback strength
    #[arg(long, default_value_t = 1.0)]
    imbalance_sensitivity: f64,

    /// Cancellation depth scaling
    #[arg(long, default_value_t = 1.0)]
    cancel_sensitivity: f64,

    /// Baseline execution share at flat imbalance
    #[arg(long, default_value_t = 0.5)]
    epsilon_exec: f64,

    /// Probability that a price shift reinitializes queue depths
    #[arg(long, default_value_t = 0.0)]
    theta_reinit: f64,

    /// Poisson mean for reinitialized depths
    #[arg(long, default_value_t = 10.0)]
    reinit_depth_mean: f64,

    /// Pace event generation against the wall clock
    #[arg(long)]
    realtime: bool,

    /// Wall-clock speed multiplier for --realtime
    #[arg(long, default_value_t = 1.0)]
    speed: f64,

    /// Performance report path (default: <output>/performance-results.md)
    #[arg(long)]
    perf_doc: Option<PathBuf>,
}

#[derive(Args)]
struct InfoArgs {
    /// Log file to inspect
    file: PathBuf,

    /// Also list the per-chunk index
    #[arg(long)]
    chunks: bool,

    /// Print the first N records
    #[arg(long, default_value_t = 0)]
    head: u32,
}

#[derive(Args)]
struct StreamArgs {
    /// Log file to stream
    file: PathBuf,

    /// Symbol carried in the ITCH messages
    #[arg(long, default_value = "SIM")]
    symbol: String,

    /// Stock locate code
    #[arg(long, default_value_t = 1)]
    locate: u16,

    /// MoldUDP64 session identifier (max 10 bytes)
    #[arg(long, default_value = "QRSDP00001")]
    session_id: String,

    /// Unicast destination host; multicast is used when absent
    #[arg(long)]
    host: Option<String>,

    /// Multicast group
    #[arg(long, default_value = "239.1.1.1")]
    multicast_group: Ipv4Addr,

    /// Destination UDP port
    #[arg(long, default_value_t = 5_001)]
    port: u16,

    /// Multicast TTL
    #[arg(long, default_value_t = 1)]
    ttl: u32,

    /// Playback speed multiplier (0 = send as fast as possible)
    #[arg(long, default_value_t = 0.0)]
    speed: f64,
}

#[derive(Args)]
struct CalibrateArgs {
    /// Input .qrsdp log (repeatable)
    #[arg(long, required = true)]
    input: Vec<PathBuf>,

    /// Output JSON curve file
    #[arg(long, default_value = "hlr_curves.json")]
    output: PathBuf,

    /// Levels per side for the curves (0 = from the first file's header)
    #[arg(long, default_value_t = 0)]
    levels: u32,

    /// Largest tabulated queue size
    #[arg(long, default_value_t = 100)]
    n_max: usize,

    /// Spread sensitivity stamped into the output
    #[arg(long, default_value_t = 0.3)]
    spread_sensitivity: f64,
}

#[derive(Args)]
struct ListenArgs {
    /// UDP port to listen on
    #[arg(long, default_value_t = 5_001)]
    port: u16,

    /// Multicast group to join; plain unicast reception when absent
    #[arg(long)]
    multicast_group: Option<Ipv4Addr>,

    /// Stop after this many packets (0 = until interrupted)
    #[arg(long, default_value_t = 0)]
    max_packets: u64,
}

fn main() {
    tracing_subscriber::fmt().with_max_level(Level::INFO).with_target(false).init();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let code = i32::from(e.use_stderr());
            let _ = e.print();
            std::process::exit(code);
        }
    };

    let outcome = match cli.command {
        Commands::Run(args) => cmd_run(&args),
        Commands::Info(args) => cmd_info(&args),
        Commands::Stream(args) => cmd_stream(&args),
        Commands::Calibrate(args) => cmd_calibrate(&args),
        Commands::Listen(args) => cmd_listen(&args),
    };
    if let Err(e) = outcome {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}

fn cmd_run(args: &RunArgs) -> Result<()> {
    install_shutdown_handler()?;

    let model: ModelType = args.model.parse()?;
    let start_date = dates::parse_date(&args.start_date)?;
    let hlr_params = match &args.hlr_curves {
        Some(path) => Some(HlrParams::load(path)?),
        None => None,
    };
    let output_dir =
        args.output.clone().unwrap_or_else(|| PathBuf::from(format!("output/run_{}", args.seed)));
    let perf_doc =
        args.perf_doc.clone().unwrap_or_else(|| output_dir.join("performance-results.md"));

    let mut config = RunConfig {
        run_id: format!("run_{}", args.seed),
        output_dir,
        base_seed: args.seed,
        p0_ticks: args.p0,
        session_seconds: args.seconds,
        levels_per_side: args.levels,
        tick_size: args.tick_size,
        initial_spread_ticks: args.spread,
        initial_depth: args.depth,
        intensity: IntensityParams {
            base_add: args.base_add,
            base_cancel: args.base_cancel,
            base_exec: args.base_exec,
            spread_sensitivity: args.spread_sensitivity,
            imbalance_sensitivity: args.imbalance_sensitivity,
            cancel_sensitivity: args.cancel_sensitivity,
            epsilon_exec: args.epsilon_exec,
        },
        queue_reactive: QueueReactiveParams {
            theta_reinit: args.theta_reinit,
            reinit_depth_mean: args.reinit_depth_mean,
        },
        model,
        hlr_params,
        num_days: args.days,
        chunk_capacity: args.chunk_size,
        start_date,
        realtime: args.realtime,
        speed: args.speed,
        ..RunConfig::default()
    };
    if let Some(spec) = &args.securities {
        config = config.with_securities_spec(spec)?;
    }

    info!(
        seed = config.base_seed,
        days = config.num_days,
        seconds = config.session_seconds,
        output = %config.output_dir.display(),
        "starting run"
    );

    let result = SessionRunner.run(&config)?;

    for d in &result.days {
        let label = if d.symbol.is_empty() { d.date.clone() } else { format!("{} {}", d.symbol, d.date) };
        info!(
            day = %label,
            seed = d.seed,
            events = d.events_written,
            chunks = d.chunks_written,
            file_bytes = d.file_size_bytes,
            open = d.open_ticks,
            close = d.close_ticks,
            "day summary"
        );
    }
    info!(
        total_events = result.total_events,
        elapsed_s = result.total_elapsed_seconds,
        "run summary"
    );

    write_performance_report(&config, &result, &perf_doc)?;
    info!(report = %perf_doc.display(), manifest = %config.output_dir.join("manifest.json").display(), "artifacts written");
    Ok(())
}

fn cmd_info(args: &InfoArgs) -> Result<()> {
    let mut reader = EventLogReader::open(&args.file)?;
    let header = *reader.header();

    println!("=== File Header ===");
    println!("  version:             {}.{}", header.version_major, header.version_minor);
    println!("  record_size:         {} bytes", header.record_size);
    println!("  seed:                {}", header.seed);
    println!("  p0_ticks:            {}", header.p0_ticks);
    println!("  tick_size:           {}", header.tick_size);
    println!("  session_seconds:     {}", header.session_seconds);
    println!("  levels_per_side:     {}", header.levels_per_side);
    println!("  initial_spread:      {} ticks", header.initial_spread_ticks);
    println!("  initial_depth:       {}", header.initial_depth);
    println!("  chunk_capacity:      {}", header.chunk_capacity);
    println!("  market_open_ns:      {}", header.market_open_ns);
    println!("  has_index:           {}", if header.has_index() { "yes" } else { "no" });

    let index = reader.index().to_vec();
    let total = reader.total_records();
    let first_ts = index.first().map_or(0, |e| e.first_ts_ns);
    let last_ts = index.last().map_or(0, |e| e.last_ts_ns);
    #[allow(clippy::cast_precision_loss)]
    let duration_sec = (last_ts.saturating_sub(first_ts)) as f64 / 1e9;

    println!();
    println!("=== Summary ===");
    println!("  chunks:              {}", reader.chunk_count());
    println!("  total_records:       {total}");
    println!("  time_range:          {first_ts} - {last_ts} ns");
    println!("  duration:            {duration_sec:.3} s");
    if duration_sec > 0.0 {
        #[allow(clippy::cast_precision_loss)]
        let eps = total as f64 / duration_sec;
        println!("  events_per_second:   {eps:.0}");
    }

    if args.chunks {
        println!();
        println!("=== Chunks ===");
        for (i, entry) in index.iter().enumerate() {
            println!(
                "  [{i}] offset={} records={} ts=[{} - {}]",
                entry.file_offset, entry.record_count, entry.first_ts_ns, entry.last_ts_ns
            );
        }
    }

    if args.head > 0 {
        println!();
        println!("=== First {} records ===", args.head);
        let records = reader.read_all()?;
        for rec in records.iter().take(args.head as usize) {
            match rec.to_event_record() {
                Some(ev) => println!(
                    "  ts={} {} side={} price={} qty={} order_id={} ",
                    ev.ts_ns, ev.event_type, ev.side.as_u8(), ev.price_ticks, ev.qty, ev.order_id
                ),
                None => println!("  ts={} (unknown type {})", rec.ts_ns, rec.event_type),
            }
        }
    }

    Ok(())
}

fn cmd_stream(args: &StreamArgs) -> Result<()> {
    let mut reader = EventLogReader::open(&args.file)?;
    let tick_size = reader.header().tick_size;
    let records = reader.read_all()?;

    let sender = match &args.host {
        Some(host) => UdpSender::unicast(host, args.port)
            .with_context(|| format!("cannot create unicast sender to {host}:{}", args.port))?,
        None => UdpSender::multicast(args.multicast_group, args.port, args.ttl)
            .context("cannot create multicast sender")?,
    };
    info!(dest = %sender.dest(), records = records.len(), "streaming event log");

    let mut encoder = ItchEncoder::new(&args.symbol, args.locate, tick_size);
    let mut framer = MoldUdp64Framer::new(&args.session_id);
    framer.set_send_callback(move |packet: &[u8]| {
        sender.send(packet);
    });

    let first_ts = records.first().map_or(0, |r| r.ts_ns);
    let last_ts = records.last().map_or(0, |r| r.ts_ns);
    framer.add_message(&encoder.encode_stock_directory(first_ts))?;
    framer.add_message(&encoder.encode_system_event(EVENT_START_OF_MARKET, first_ts))?;

    let mut prev_ts = first_ts;
    let mut streamed = 0u64;
    for disk in &records {
        let Some(rec) = disk.to_event_record() else {
            warn!(ts_ns = disk.ts_ns, raw_type = disk.event_type, "skipping unknown record");
            continue;
        };
        if args.speed > 0.0 && rec.ts_ns > prev_ts {
            #[allow(clippy::cast_precision_loss)]
            let gap_s = (rec.ts_ns - prev_ts) as f64 / 1e9 / args.speed;
            std::thread::sleep(Duration::from_secs_f64(gap_s));
        }
        prev_ts = rec.ts_ns;
        framer.add_message(&encoder.encode(&rec))?;
        streamed += 1;
    }

    framer.add_message(&encoder.encode_system_event(EVENT_END_OF_MARKET, last_ts))?;
    framer.emit();

    info!(records = streamed, last_seq = framer.next_sequence_number() - 1, "stream complete");
    Ok(())
}

fn cmd_calibrate(args: &CalibrateArgs) -> Result<()> {
    let options = CalibrateOptions {
        levels: args.levels,
        n_max: args.n_max,
        spread_sensitivity: args.spread_sensitivity,
    };
    let summary = calibrate_curves(&args.input, &options)?;

    summary.params.save(&args.output)?;
    info!(
        events = summary.total_events,
        sojourns = summary.sojourns_recorded,
        levels = summary.params.k,
        output = %args.output.display(),
        "calibrated curves written"
    );
    for (level, curve) in summary.params.add_bid.iter().enumerate() {
        println!(
            "  level {level} add_bid: n=0:{:.2} n=1:{:.2} n=5:{:.2} n=10:{:.2}",
            curve.value(0),
            curve.value(1),
            curve.value(5),
            curve.value(10)
        );
    }
    println!(
        "  exec_buy:  n=1:{:.2} n=5:{:.2}   exec_sell: n=1:{:.2} n=5:{:.2}",
        summary.params.exec_buy.value(1),
        summary.params.exec_buy.value(5),
        summary.params.exec_sell.value(1),
        summary.params.exec_sell.value(5)
    );
    Ok(())
}

fn cmd_listen(args: &ListenArgs) -> Result<()> {
    install_shutdown_handler()?;

    let socket = UdpSocket::bind(("0.0.0.0", args.port))
        .with_context(|| format!("cannot bind udp port {}", args.port))?;
    if let Some(group) = args.multicast_group {
        socket
            .join_multicast_v4(&group, &Ipv4Addr::UNSPECIFIED)
            .with_context(|| format!("cannot join multicast group {group}"))?;
    }
    socket.set_read_timeout(Some(Duration::from_millis(250)))?;
    info!(port = args.port, multicast = ?args.multicast_group, "listening");

    let mut buf = [0u8; 2048];
    let mut packets = 0u64;
    while !runner::shutdown_requested() {
        let n = match socket.recv_from(&mut buf) {
            Ok((n, _)) => n,
            Err(e)
                if e.kind() == std::io::ErrorKind::WouldBlock
                    || e.kind() == std::io::ErrorKind::TimedOut =>
            {
                continue;
            }
            Err(e) => return Err(e.into()),
        };

        match parse_packet(&buf[..n]) {
            Ok(packet) => {
                let mut seq = packet.sequence_number;
                for msg in &packet.messages {
                    match decode_message(msg) {
                        Ok(decoded) => println!("[seq={seq}] {decoded:?}"),
                        Err(e) => warn!(seq, error = %e, "undecodable message"),
                    }
                    seq += 1;
                }
            }
            Err(e) => warn!(bytes = n, error = %e, "undecodable packet"),
        }

        packets += 1;
        if args.max_packets > 0 && packets >= args.max_packets {
            break;
        }
    }
    info!(packets, "listener stopped");
    Ok(())
}
