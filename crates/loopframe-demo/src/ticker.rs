//! Timer event source.

use std::{sync::Arc, time::Duration};

use loopframe_core::{Consumer, Disposable, EventSource};
use tokio::{runtime::Handle, task::AbortHandle, time::MissedTickBehavior};

use crate::CounterEvent;

/// Emits [`CounterEvent::Tick`] every `interval` on a tokio runtime.
///
/// Each subscription runs its own timer task; disposing the subscription
/// aborts it.
pub struct TickSource {
    handle: Handle,
    interval: Duration,
}

impl TickSource {
    /// Source ticking every `interval` on `handle`.
    pub fn new(handle: Handle, interval: Duration) -> Self {
        Self { handle, interval }
    }
}

impl EventSource<CounterEvent> for TickSource {
    fn subscribe(&self, consumer: Arc<dyn Consumer<CounterEvent>>) -> Box<dyn Disposable> {
        let period = self.interval;
        let task = self.handle.spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // the first tick completes immediately
            interval.tick().await;
            loop {
                interval.tick().await;
                consumer.accept(CounterEvent::Tick);
            }
        });
        tracing::debug!(?period, "ticker subscribed");
        Box::new(TickSubscription { task: task.abort_handle() })
    }
}

struct TickSubscription {
    task: AbortHandle,
}

impl Disposable for TickSubscription {
    fn dispose(&self) {
        self.task.abort();
        tracing::debug!("ticker unsubscribed");
    }
}
