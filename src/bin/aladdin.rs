//! Command-line entry point: loads a trace and configuration, runs the
//! optimization pipeline, schedules the result, and writes the reporter's
//! fixed set of output files.

use aladdin::Datapath;
use aladdin_sched::FixedLatencyMemory;
use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;

/// Pre-RTL power-performance simulator for fixed-function hardware
/// accelerators.
#[derive(Parser, Debug)]
#[command(name = "aladdin", version, about)]
struct Args {
    /// Gzip-compressed (or plain) dynamic instruction trace.
    trace: PathBuf,

    /// Configuration file (loop unrolling, partitioning, pipelining, ...).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory to write the activity CSV, stats, and summary files into.
    #[arg(short, long, default_value = ".")]
    out_dir: PathBuf,

    /// Benchmark name used to namespace output files.
    #[arg(short, long, default_value = "run")]
    bench: String,

    /// Fixed round-trip latency (in cycles) for the built-in memory model;
    /// a real deployment wires a co-simulator through the same interface
    /// instead of passing this flag.
    #[arg(long, default_value_t = 8)]
    mock_memory_latency: u32,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    let mut datapath = Datapath::new();

    if args.trace.extension().and_then(|e| e.to_str()) == Some("gz") {
        let built = aladdin_trace::build_from_gzip_path(&args.trace)
            .with_context(|| format!("reading trace {}", args.trace.display()))?;
        datapath.table = built.table;
        datapath.graph = built.graph;
    } else {
        let file = std::fs::File::open(&args.trace)
            .with_context(|| format!("opening trace {}", args.trace.display()))?;
        datapath.load_trace(std::io::BufReader::new(file))?;
    }
    log::info!("loaded {} node(s) from {}", datapath.graph.num_nodes(), args.trace.display());

    if let Some(config_path) = &args.config {
        let file = std::fs::File::open(config_path)
            .with_context(|| format!("opening configuration {}", config_path.display()))?;
        datapath.load_config(std::io::BufReader::new(file))?;
    }

    datapath.optimize().context("running optimization pipeline")?;
    log::info!("optimized graph has {} edge(s)", datapath.graph.num_edges());

    datapath
        .schedule(FixedLatencyMemory::new(args.mock_memory_latency))
        .context("scheduling")?;
    log::info!("scheduled in {} cycle(s)", datapath.activity.len());

    std::fs::create_dir_all(&args.out_dir)
        .with_context(|| format!("creating output directory {}", args.out_dir.display()))?;
    datapath
        .write_reports(&args.out_dir, &args.bench)
        .context("writing reports")?;

    Ok(())
}
