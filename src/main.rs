//! Slotring - demo pipeline runner
//!
//! Pushes a stream of events from one or more producer threads through a ring
//! buffer into a batch consumer and reports the throughput.

use anyhow::{bail, Context};
use clap::Parser;
use slotring::disruptor::{
    BatchEventProcessor, ClaimWait, DefaultEventFactory, EventHandler, EventProcessor,
    HandlerResult, ProducerType, RingBuffer, RingBufferConfig, Slot, ThreadBuilder,
    WaitStrategyKind,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::Instant;
use tracing::{debug, info};

/// Command line arguments
#[derive(Parser, Debug)]
#[command(name = "slotring")]
#[command(about = "Run events through a ring buffer pipeline and report throughput")]
#[command(version)]
pub struct Args {
    /// Ring buffer capacity (rounded up to a power of 2)
    #[arg(short, long, default_value = "1024")]
    pub capacity: usize,

    /// Producer type: single or multi
    #[arg(short, long, default_value = "single")]
    pub producer_type: ProducerType,

    /// Consumer wait strategy: blocking, yielding or busy-spin
    #[arg(short, long, default_value = "blocking")]
    pub wait_strategy: WaitStrategyKind,

    /// Slots kept free between producers and the consumer
    #[arg(long, default_value = "0")]
    pub reserve_threshold: usize,

    /// How producers wait on a full ring: busy-spin or yielding
    #[arg(long, default_value = "yielding")]
    pub claim_wait: ClaimWait,

    /// JSON file with the ring buffer configuration; overrides the flags above
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Total number of events to publish
    #[arg(short, long, default_value = "1000000")]
    pub events: u64,

    /// Number of producer threads
    #[arg(long, default_value = "1")]
    pub producers: usize,

    /// Pin the consumer thread to this CPU core
    #[arg(long)]
    pub consumer_core: Option<usize>,

    /// Log level
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

#[derive(Debug, Default)]
struct ValueEvent {
    value: u64,
}

/// Sums every value it sees
#[derive(Debug, Default)]
struct SummingHandler {
    sum: u64,
    count: u64,
    batches: u64,
}

impl EventHandler<ValueEvent> for SummingHandler {
    fn on_event(&mut self, slot: &Slot<ValueEvent>) -> HandlerResult {
        self.sum = self.sum.wrapping_add(slot.value);
        self.count += 1;
        Ok(())
    }

    fn on_end_of_batch(&mut self) -> HandlerResult {
        self.batches += 1;
        Ok(())
    }

    fn on_completion(&mut self) {
        info!(
            events = self.count,
            batches = self.batches,
            sum = self.sum,
            "consumer finished"
        );
    }
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logging(&args.log_level)?;

    let config = load_config(&args)?;
    validate_config(&config, &args)?;
    info!(?config, events = args.events, producers = args.producers, "starting pipeline");

    run_pipeline(&config, &args)
}

/// Initialize logging based on the specified level; `RUST_LOG` wins when set
fn init_logging(level: &str) -> anyhow::Result<()> {
    let filter = match level.to_lowercase().as_str() {
        "trace" => "trace",
        "debug" => "debug",
        "info" => "info",
        "warn" => "warn",
        "error" => "error",
        _ => "info",
    };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_thread_names(true)
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to initialise logging: {e}"))
}

fn load_config(args: &Args) -> anyhow::Result<RingBufferConfig> {
    match &args.config {
        Some(path) => {
            let json = std::fs::read_to_string(path)
                .with_context(|| format!("reading config file {}", path.display()))?;
            RingBufferConfig::from_json_str(&json)
                .with_context(|| format!("parsing config file {}", path.display()))
        }
        None => Ok(RingBufferConfig::new(args.capacity)
            .producer_type(args.producer_type)
            .wait_strategy(args.wait_strategy)
            .reserve_threshold(args.reserve_threshold)
            .claim_wait(args.claim_wait)),
    }
}

fn validate_config(config: &RingBufferConfig, args: &Args) -> anyhow::Result<()> {
    config.validate()?;

    if args.producers == 0 {
        bail!("At least one producer is required");
    }
    if args.producers > 1 && config.producer_type.is_single() {
        bail!(
            "{} producers need the multi producer type, got {}",
            args.producers,
            config.producer_type
        );
    }

    debug!("configuration validation passed");
    Ok(())
}

fn run_pipeline(config: &RingBufferConfig, args: &Args) -> anyhow::Result<()> {
    let ring = Arc::new(RingBuffer::with_config(
        DefaultEventFactory::<ValueEvent>::new(),
        config,
    )?);

    let processor = BatchEventProcessor::new(
        Arc::clone(&ring),
        ring.create_barrier(Vec::new()),
        SummingHandler::default(),
    );
    ring.add_gating_sequences(&[processor.sequence()])?;
    let handle = processor.handle();

    let mut consumer_builder = ThreadBuilder::new().thread_name("consumer");
    if let Some(core) = args.consumer_core {
        consumer_builder = consumer_builder.pin_at_core(core);
    }
    let consumer = consumer_builder.spawn_processor(processor)?;

    let started = Instant::now();
    let producers = args.producers as u64;
    let producer_threads = (0..producers)
        .map(|id| {
            let ring = Arc::clone(&ring);
            let count = args.events / producers + u64::from(id < args.events % producers);
            thread::Builder::new()
                .name(format!("producer-{id}"))
                .spawn(move || {
                    for value in 0..count {
                        let mut claimed = ring.claim_next();
                        claimed.value = value;
                        claimed.publish();
                    }
                })
        })
        .collect::<std::io::Result<Vec<_>>>()?;

    for producer in producer_threads {
        producer
            .join()
            .map_err(|_| anyhow::anyhow!("producer thread panicked"))?;
    }

    let last = args.events as i64 - 1;
    let consumed = handle.sequence();
    while consumed.get() < last {
        thread::yield_now();
    }
    let elapsed = started.elapsed();
    handle.halt();

    consumer
        .join()
        .map_err(|_| anyhow::anyhow!("consumer thread panicked"))?
        .transpose()?;

    let per_second = args.events as f64 / elapsed.as_secs_f64().max(f64::EPSILON);
    info!(
        events = args.events,
        elapsed_ms = elapsed.as_millis() as u64,
        ops_per_second = per_second as u64,
        capacity = ring.capacity(),
        "pipeline complete"
    );
    Ok(())
}
