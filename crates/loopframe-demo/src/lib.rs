//! Counter application on Loopframe.
//!
//! A timer emits `Tick` events. Every tick asks the fetcher for a value; the
//! fetched value comes back as a `Loaded` event and is added to the running
//! total. The binary `loopframe-counter` runs this loop under a controller,
//! restarting it halfway to show the model surviving a restart.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod counter;
mod fetcher;
mod ticker;

use std::time::Duration;

use loopframe_core::{TracingLogger, connectables};
use loopframe_runtime::{ContextFactory, Controller, LoopBuilder};
use tokio::runtime::Handle;

pub use counter::{CounterEffect, CounterEvent, CounterModel, init, update};
pub use fetcher::Fetcher;
pub use ticker::TickSource;

/// Runtime settings of the counter.
#[derive(Debug, Clone)]
pub struct CounterConfig {
    /// Delay between ticks.
    pub interval: Duration,
    /// Effect worker threads. Zero runs effects on the tokio blocking pool.
    pub effect_workers: usize,
    /// Seed of the fetcher's value generator.
    pub seed: u64,
}

impl Default for CounterConfig {
    fn default() -> Self {
        Self { interval: Duration::from_millis(100), effect_workers: 2, seed: 0 }
    }
}

impl CounterConfig {
    /// Time allowed for `ticks` ticks, with ten ticks of slack. Saturates
    /// instead of overflowing.
    pub fn deadline(&self, ticks: u64) -> Duration {
        let ticks = u32::try_from(ticks).unwrap_or(u32::MAX).saturating_add(10);
        self.interval.saturating_mul(ticks)
    }
}

/// Controller for the counter loop, ticking on `handle`.
///
/// Models are logged at `info` level through a view.
pub fn counter_controller(
    config: &CounterConfig,
    handle: &Handle,
) -> Controller<CounterModel, CounterEvent, CounterEffect> {
    let effect_context = if config.effect_workers == 0 {
        ContextFactory::tokio(handle.clone())
    } else {
        ContextFactory::pooled("counter-effect", config.effect_workers)
    };

    let builder = LoopBuilder::new(update, Fetcher::new(config.seed))
        .init(init)
        .subscribe_to(TickSource::new(handle.clone(), config.interval))
        .effect_context(effect_context)
        .logger(TracingLogger::new("counter"));

    let controller = Controller::new(builder, CounterModel::default());
    let view = connectables::from_consumer::<CounterModel, CounterEvent, _>(|model| {
        tracing::info!(ticks = model.ticks, total = model.total, pending = model.pending, "model");
    });
    if let Err(err) = controller.connect(view) {
        tracing::warn!(%err, "running without model view");
    }
    controller
}
