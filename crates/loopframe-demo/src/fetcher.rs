//! Effect handler producing values for ticks.

use std::sync::Arc;

use loopframe_core::{
    Connectable, Connection, ConnectionError, ConnectionGuard, Consumer, Disposable, GuardRelease,
};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::{CounterEffect, CounterEvent};

/// Answers `Fetch` with a `Loaded` value derived from the seed and the tick,
/// and logs `Report` effects.
///
/// The value for a tick depends only on seed and tick, so a run is
/// reproducible regardless of which effect worker handles the fetch.
pub struct Fetcher {
    seed: u64,
    guard: ConnectionGuard,
}

impl Fetcher {
    /// Fetcher with the given seed.
    pub fn new(seed: u64) -> Self {
        Self { seed, guard: ConnectionGuard::new("fetcher") }
    }

    /// Value fetched for `tick`, in `1..=100`.
    pub fn value_for(seed: u64, tick: u64) -> u64 {
        ChaCha8Rng::seed_from_u64(seed ^ tick).gen_range(1..=100)
    }
}

impl Connectable<CounterEffect, CounterEvent> for Fetcher {
    fn connect(
        &self,
        output: Arc<dyn Consumer<CounterEvent>>,
    ) -> Result<Box<dyn Connection<CounterEffect>>, ConnectionError> {
        let release = self.guard.acquire()?;
        Ok(Box::new(FetchConnection { seed: self.seed, output, release }))
    }
}

struct FetchConnection {
    seed: u64,
    output: Arc<dyn Consumer<CounterEvent>>,
    release: GuardRelease,
}

impl Disposable for FetchConnection {
    fn dispose(&self) {
        self.release.release();
    }
}

impl Connection<CounterEffect> for FetchConnection {
    fn accept(&self, effect: CounterEffect) {
        match effect {
            CounterEffect::Fetch { tick } => {
                let value = Fetcher::value_for(self.seed, tick);
                tracing::debug!(tick, value, "fetched");
                self.output.accept(CounterEvent::Loaded { tick, value });
            },
            CounterEffect::Report { ticks, total } => {
                tracing::info!(ticks, total, "progress");
            },
        }
    }
}
