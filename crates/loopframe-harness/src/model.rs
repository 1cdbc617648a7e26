//! Counter domain for model-based testing.
//!
//! Events are generated by proptest or libfuzzer and applied both to a real
//! loop and to [`replay`], a plain sequential fold over the same update
//! function. The loop must end in the same model.

use arbitrary::Arbitrary;
use loopframe_core::{First, Next};

/// Events of the counter loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Arbitrary)]
pub enum CounterEvent {
    /// Add one.
    Increment,
    /// Subtract one.
    Decrement,
    /// Add a signed amount.
    Add(i8),
    /// Return to zero. No change when already zero.
    Reset,
    /// Ask the effect handler to load a value.
    Request(u8),
    /// A loaded value, added to the counter.
    Loaded(i16),
}

/// Effects of the counter loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CounterEffect {
    /// Load the value with this key.
    Load(u8),
    /// Report the current count.
    Report(i64),
}

/// Update function of the counter loop.
pub fn counter_update(model: &i64, event: &CounterEvent) -> Next<i64, CounterEffect> {
    match *event {
        CounterEvent::Increment => Next::next(model.wrapping_add(1)),
        CounterEvent::Decrement => Next::next(model.wrapping_sub(1)),
        CounterEvent::Add(0) => Next::no_change(),
        CounterEvent::Add(amount) => Next::next(model.wrapping_add(i64::from(amount))),
        CounterEvent::Reset if *model == 0 => Next::no_change(),
        CounterEvent::Reset => Next::next_with(0, [CounterEffect::Report(0)]),
        CounterEvent::Request(key) => Next::dispatch([CounterEffect::Load(key)]),
        CounterEvent::Loaded(value) => {
            let count = model.wrapping_add(i64::from(value));
            Next::next_with(count, [CounterEffect::Report(count)])
        },
    }
}

/// Init function of the counter loop: keep the model, report it.
pub fn counter_init(model: &i64) -> First<i64, CounterEffect> {
    First::first_with(*model, [CounterEffect::Report(*model)])
}

/// Effect handler reply: every `Load(key)` answers `Loaded(key)`.
pub fn load_reply(effect: &CounterEffect) -> Option<CounterEvent> {
    match *effect {
        CounterEffect::Load(key) => Some(CounterEvent::Loaded(i16::from(key))),
        CounterEffect::Report(_) => None,
    }
}

/// Sequential reference: the final model and all effects, in order.
pub fn replay(start: i64, events: &[CounterEvent]) -> (i64, Vec<CounterEffect>) {
    let mut model = start;
    let mut effects = Vec::new();
    for event in events {
        let (next, produced) = counter_update(&model, event).into_parts();
        if let Some(next) = next {
            model = next;
        }
        effects.extend(produced);
    }
    (model, effects)
}

/// Every intermediate model `replay` passes through, starting model
/// included, skipping events that change nothing.
pub fn published_models(start: i64, events: &[CounterEvent]) -> Vec<i64> {
    let mut model = start;
    let mut published = vec![start];
    for event in events {
        if let Some(next) = counter_update(&model, event).into_parts().0 {
            model = next;
            published.push(model);
        }
    }
    published
}
