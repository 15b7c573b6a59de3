//! Drive one shared ring with a paced producer and a polling `BatchWorker`,
//! then print a JSON summary of what was written, read and overwritten.

use std::path::PathBuf;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{bail, Context};
use serde::Serialize;
use tracing::info;

use ringshare_core::buffering::{samples_to_secs, RingDiagnosticsSnapshot};
use ringshare_core::{
    BatchWorker, RingRegistry, SinkHandle, StubSink, WorkerConfig, DEFAULT_CAPACITY,
    DEFAULT_RING_KEY, SAMPLE_RATE,
};

#[derive(Debug)]
struct Args {
    seconds: f64,
    block: usize,
    capacity: usize,
    consumer_ms: u64,
    min_batch: usize,
    unpaced: bool,
    output: Option<PathBuf>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Summary {
    seconds: f64,
    block: usize,
    capacity: usize,
    consumer_ms: u64,
    unpaced: bool,
    wall_ms: f64,
    batches: usize,
    samples_consumed: usize,
    secs_consumed: f64,
    short_polls: usize,
    ring: RingDiagnosticsSnapshot,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("ringshare_core=info,ringbench=info")),
        )
        .init();

    if let Err(e) = run() {
        eprintln!("ringbench failed: {e:#}");
        std::process::exit(1);
    }
}

fn parse_args() -> anyhow::Result<Args> {
    let mut args = Args {
        seconds: 5.0,
        block: 320,
        capacity: DEFAULT_CAPACITY,
        consumer_ms: 500,
        min_batch: SAMPLE_RATE as usize * 2,
        unpaced: false,
        output: None,
    };

    let mut it = std::env::args().skip(1);
    while let Some(arg) = it.next() {
        let mut value = |name: &str| it.next().with_context(|| format!("missing value for {name}"));
        match arg.as_str() {
            "--seconds" => args.seconds = value("--seconds")?.parse().context("invalid --seconds")?,
            "--block" => args.block = value("--block")?.parse().context("invalid --block")?,
            "--capacity" => {
                args.capacity = value("--capacity")?.parse().context("invalid --capacity")?
            }
            "--consumer-ms" => {
                args.consumer_ms = value("--consumer-ms")?
                    .parse()
                    .context("invalid --consumer-ms")?
            }
            "--min-batch" => {
                args.min_batch = value("--min-batch")?.parse().context("invalid --min-batch")?
            }
            "--unpaced" => args.unpaced = true,
            "--output" => args.output = Some(PathBuf::from(value("--output")?)),
            "--help" | "-h" => {
                println!(
                    "Usage: ringbench [--seconds <s>] [--block <samples>] [--capacity <samples>] \\
  [--consumer-ms <ms>] [--min-batch <samples>] [--unpaced] [--output <file.json>]"
                );
                std::process::exit(0);
            }
            other => bail!("unknown argument: {other}"),
        }
    }

    if args.block == 0 || args.seconds <= 0.0 {
        bail!("--block and --seconds must be positive");
    }
    Ok(args)
}

fn run() -> anyhow::Result<()> {
    let args = parse_args()?;
    let registry = RingRegistry::new();

    let worker = BatchWorker::new(
        WorkerConfig {
            ring_key: DEFAULT_RING_KEY.into(),
            ring_capacity: args.capacity,
            poll_interval_ms: args.consumer_ms,
            min_batch_samples: args.min_batch,
            max_batch_samples: args.capacity,
            ..WorkerConfig::default()
        },
        SinkHandle::new(StubSink::new()),
        registry.clone(),
    );
    worker.warm_up()?;
    worker.start()?;

    let producer = registry.attach(DEFAULT_RING_KEY, args.capacity)?;
    let total = (args.seconds * SAMPLE_RATE as f64) as usize;
    let block_period = Duration::from_secs_f64(args.block as f64 / SAMPLE_RATE as f64);
    info!(total, block = args.block, "producer starting");

    // 440 Hz tone so a real sink would have something to hear.
    let step = 2.0 * std::f32::consts::PI * 440.0 / SAMPLE_RATE as f32;
    let mut block = vec![0f32; args.block];
    let started = Instant::now();
    let mut written = 0usize;
    while written < total {
        let n = args.block.min(total - written);
        for (i, s) in block[..n].iter_mut().enumerate() {
            *s = 0.25 * ((written + i) as f32 * step).sin();
        }
        producer.write(&block[..n])?;
        written += n;

        if !args.unpaced {
            let due = block_period * (written / args.block) as u32;
            if let Some(wait) = due.checked_sub(started.elapsed()) {
                thread::sleep(wait);
            }
        }
    }

    // One more poll so the tail gets a chance to drain.
    thread::sleep(Duration::from_millis(args.consumer_ms + 50));
    worker.stop()?;
    let wall = started.elapsed();

    let snap = worker.diagnostics_snapshot();
    let summary = Summary {
        seconds: args.seconds,
        block: args.block,
        capacity: args.capacity,
        consumer_ms: args.consumer_ms,
        unpaced: args.unpaced,
        wall_ms: wall.as_secs_f64() * 1_000.0,
        batches: snap.batches,
        samples_consumed: snap.samples_consumed,
        secs_consumed: samples_to_secs(snap.samples_consumed),
        short_polls: snap.short_polls,
        ring: producer.diagnostics(),
    };
    producer.detach();

    let json = serde_json::to_string_pretty(&summary)?;
    match args.output {
        Some(path) => {
            std::fs::write(&path, &json)
                .with_context(|| format!("writing {}", path.display()))?;
            info!(path = %path.display(), "summary written");
        }
        None => println!("{json}"),
    }
    Ok(())
}
