use clap::Parser;
use crypto_hashes::sha256;
use log::{debug, info, warn};
use mining::prelude::*;
use mining::utils;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Target that is never met, so benchmark runs only measure hashing
const BENCHMARK_BITS: u32 = 0x0300_0001;

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Standalone proof-of-work miner running against an in-memory devnet
#[derive(Parser, Debug)]
#[command(name = "miner")]
#[command(about = "Multi-threaded proof-of-work miner", long_about = None)]
struct Args {
    /// Number of worker threads (defaults to CPU count)
    #[arg(short, long)]
    threads: Option<usize>,

    /// Payout script as hex, or an address hashed into a P2PKH-shaped script
    #[arg(short, long)]
    address: Option<String>,

    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Chain parameters to mine with (regtest, mainnet)
    #[arg(long, default_value = "regtest")]
    chain: String,

    /// Hash for the given number of seconds and report throughput
    #[arg(long)]
    benchmark: Option<u64>,

    /// Seconds between statistics reports
    #[arg(long, default_value = "10")]
    stats_interval: u64,

    /// Stop after this many seconds
    #[arg(long)]
    duration: Option<u64>,

    /// Print statistics as JSON
    #[arg(long)]
    json: bool,

    /// Log level
    #[arg(short, long, default_value = "info")]
    log_level: String,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Initialize logging
    env_logger::Builder::from_default_env()
        .filter_level(args.log_level.parse()?)
        .init();

    let params = ChainParams::for_network(&args.chain)
        .ok_or_else(|| format!("unknown chain '{}', expected regtest or mainnet", args.chain))?;

    let mut config = match &args.config {
        Some(path) => MiningConfig::load(path)?,
        None => MiningConfig::default(),
    };
    if let Some(threads) = args.threads {
        config.threads = threads;
    }
    if let Some(address) = &args.address {
        config.payout_script = payout_script(address);
    }
    if config.payout_script.is_empty() {
        warn!("No payout address given, paying to a throwaway script");
        config.payout_script = payout_script("devnet-miner");
    }

    info!("Miner starting on {} with {} threads", params.name, config.threads);

    let mempool = Arc::new(InMemoryMempool::new());
    let chain = match args.benchmark {
        Some(_) => DevnetChain::with_bits(params.clone(), BENCHMARK_BITS),
        None => DevnetChain::new(params.clone()),
    };
    let hasher: Arc<dyn PowHasher> = Arc::new(DoubleSha256);
    let chain = Arc::new(chain.with_mempool(mempool.clone()).with_hasher(hasher.clone()));

    let controller = MiningController::new(
        params.clone(),
        chain.clone(),
        mempool,
        chain.clone(),
        hasher,
    );

    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
    })?;

    controller.start(config)?;

    let run_for = args.benchmark.or(args.duration).map(Duration::from_secs);
    let stats_interval = Duration::from_secs(args.stats_interval.max(1));
    let started = Instant::now();
    let mut last_report = Instant::now();

    while running.load(Ordering::SeqCst) {
        if run_for.is_some_and(|limit| started.elapsed() >= limit) {
            break;
        }
        thread::sleep(POLL_INTERVAL);

        if last_report.elapsed() >= stats_interval {
            last_report = Instant::now();
            report(&controller, chain.height(), args.json)?;
        }
        for event in controller.drain_events() {
            debug!("{:?}", event);
        }
    }

    info!("Shutting down miner");
    controller.stop();

    if args.benchmark.is_some() {
        print_benchmark(&controller, &params, args.json)?;
    } else {
        report(&controller, chain.height(), args.json)?;
    }
    Ok(())
}

/// Decodes a hex script, or derives `OP_DUP OP_HASH160 <20 bytes> OP_EQUALVERIFY OP_CHECKSIG`
fn payout_script(address: &str) -> Vec<u8> {
    if let Ok(script) = hex::decode(address) {
        if !script.is_empty() {
            return script;
        }
    }
    let digest = sha256(address.as_bytes());
    let mut script = vec![0x76, 0xa9, 0x14];
    script.extend_from_slice(&digest[..20]);
    script.extend_from_slice(&[0x88, 0xac]);
    script
}

fn report(controller: &MiningController, height: u64, json: bool) -> Result<(), serde_json::Error> {
    let stats = controller.stats();
    if json {
        println!("{}", serde_json::to_string(&stats)?);
        return Ok(());
    }

    println!("{}", stats.format_summary());
    println!("  Chain Height: {}", height);
    if let Some(eta) = controller.estimated_time_to_block() {
        println!("  Est. Time To Block: {}s", eta.as_secs());
    }
    Ok(())
}

fn print_benchmark(controller: &MiningController, params: &ChainParams, json: bool) -> Result<(), serde_json::Error> {
    let stats = controller.stats();
    let easiest = Target::new(params.pow_limit);
    let blocks_per_day = utils::expected_blocks_per_day(stats.hash_rate, &easiest);

    if json {
        let report = serde_json::json!({
            "hashes": stats.hashes_computed,
            "seconds": stats.elapsed.as_secs_f64(),
            "hash_rate": stats.hash_rate,
            "expected_blocks_per_day": blocks_per_day,
        });
        println!("{}", report);
        return Ok(());
    }

    println!("Benchmark results ({}):", params.name);
    println!("  Hashes: {}", stats.hashes_computed);
    println!("  Duration: {:.1}s", stats.elapsed.as_secs_f64());
    println!("  Hash Rate: {}", utils::format_hash_rate(stats.hash_rate));
    println!("  Expected Blocks/Day at pow limit: {:.4}", blocks_per_day);
    Ok(())
}
