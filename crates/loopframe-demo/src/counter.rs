//! Counter domain: model, events, effects and transition functions.

use loopframe_core::{First, Next};

/// Ticks seen and the sum of the values fetched for them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CounterModel {
    /// Ticks received.
    pub ticks: u64,
    /// Sum of loaded values.
    pub total: u64,
    /// Fetches dispatched but not yet loaded.
    pub pending: u32,
}

/// Events of the counter loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CounterEvent {
    /// Timer fired.
    Tick,
    /// Value fetched for a tick.
    Loaded {
        /// Tick the value belongs to
        tick: u64,
        /// Fetched value
        value: u64,
    },
}

/// Effects of the counter loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CounterEffect {
    /// Fetch the value for a tick.
    Fetch {
        /// Tick to fetch for
        tick: u64,
    },
    /// Log progress.
    Report {
        /// Ticks so far
        ticks: u64,
        /// Total so far
        total: u64,
    },
}

/// Ticks between progress reports.
pub const REPORT_EVERY: u64 = 10;

/// Start a run. Fetches in flight when the previous run stopped are lost, so
/// the pending count starts over.
pub fn init(model: &CounterModel) -> First<CounterModel, CounterEffect> {
    let model = CounterModel { pending: 0, ..model.clone() };
    let report = CounterEffect::Report { ticks: model.ticks, total: model.total };
    First::first_with(model, [report])
}

/// Apply one event.
pub fn update(model: &CounterModel, event: &CounterEvent) -> Next<CounterModel, CounterEffect> {
    match *event {
        CounterEvent::Tick => {
            let tick = model.ticks + 1;
            Next::next_with(
                CounterModel { ticks: tick, pending: model.pending + 1, ..model.clone() },
                [CounterEffect::Fetch { tick }],
            )
        },
        CounterEvent::Loaded { tick, value } => {
            let next = CounterModel {
                total: model.total + value,
                pending: model.pending.saturating_sub(1),
                ..model.clone()
            };
            if tick % REPORT_EVERY == 0 {
                let report = CounterEffect::Report { ticks: next.ticks, total: next.total };
                Next::next_with(next, [report])
            } else {
                Next::next(next)
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tick_requests_fetch() {
        let next = update(&CounterModel::default(), &CounterEvent::Tick);

        assert_eq!(next.model(), Some(&CounterModel { ticks: 1, total: 0, pending: 1 }));
        assert_eq!(next.effects(), &[CounterEffect::Fetch { tick: 1 }]);
    }

    #[test]
    fn loaded_adds_value_and_reports_on_boundary() {
        let model = CounterModel { ticks: 10, total: 5, pending: 2 };

        let quiet = update(&model, &CounterEvent::Loaded { tick: 9, value: 3 });
        assert_eq!(quiet.model(), Some(&CounterModel { ticks: 10, total: 8, pending: 1 }));
        assert!(!quiet.has_effects());

        let loud = update(&model, &CounterEvent::Loaded { tick: 10, value: 3 });
        assert_eq!(loud.effects(), &[CounterEffect::Report { ticks: 10, total: 8 }]);
    }

    #[test]
    fn init_clears_pending_fetches() {
        let first = init(&CounterModel { ticks: 4, total: 40, pending: 3 });

        assert_eq!(first.model(), &CounterModel { ticks: 4, total: 40, pending: 0 });
        assert_eq!(first.effects(), &[CounterEffect::Report { ticks: 4, total: 40 }]);
    }
}
