//! Counter loop binary.
//!
//! # Usage
//!
//! ```bash
//! # Ten ticks, 50ms apart, effects on two worker threads
//! loopframe-counter --ticks 10 --interval-ms 50
//!
//! # Effects on the tokio blocking pool, with every update traced
//! RUST_LOG=debug loopframe-counter --effect-workers 0
//! ```

use std::{
    thread,
    time::{Duration, Instant},
};

use clap::Parser;
use loopframe_demo::{CounterConfig, counter_controller};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Counter loop driven by a timer
#[derive(Parser, Debug)]
#[command(name = "loopframe-counter")]
#[command(about = "Counts timer ticks through a Loopframe loop")]
#[command(version)]
struct Args {
    /// Ticks to count before exiting
    #[arg(long, default_value = "20")]
    ticks: u64,

    /// Milliseconds between ticks
    #[arg(long, default_value = "100")]
    interval_ms: u64,

    /// Effect worker threads (0 uses the tokio blocking pool)
    #[arg(long, default_value = "2")]
    effect_workers: usize,

    /// Seed for fetched values
    #[arg(long, default_value = "0")]
    seed: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::registry().with(fmt::layer()).with(filter).init();

    let runtime = tokio::runtime::Runtime::new()?;
    let config = CounterConfig {
        interval: Duration::from_millis(args.interval_ms),
        effect_workers: args.effect_workers,
        seed: args.seed,
    };
    let controller = counter_controller(&config, runtime.handle());

    tracing::info!(ticks = args.ticks, "counter starting");
    controller.start()?;

    // halfway through, restart and continue from the stopped model
    let halfway = args.ticks / 2;
    let deadline = config.deadline(args.ticks);
    wait_for_ticks(|| controller.model().ticks, halfway, deadline);
    controller.restart()?;
    tracing::info!(ticks = controller.model().ticks, "counter restarted");

    wait_for_ticks(|| controller.model().ticks, args.ticks, deadline);
    controller.stop()?;

    let model = controller.model();
    tracing::info!(ticks = model.ticks, total = model.total, "counter finished");
    controller.dispose()?;
    Ok(())
}

fn wait_for_ticks(ticks: impl Fn() -> u64, target: u64, timeout: Duration) {
    // no deadline when the timeout does not fit an Instant
    let deadline = Instant::now().checked_add(timeout);
    while ticks() < target {
        if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
            tracing::warn!(target, "gave up waiting for ticks");
            return;
        }
        thread::sleep(Duration::from_millis(5));
    }
}
