//! Fuzz target for event serialization
//!
//! Arbitrary event sequences through a loop on a sequential event context
//!
//! # Strategy
//!
//! - Random events: every counter event kind, including no-op transitions
//! - No replies: the effect handler never answers, so the event stream is
//!   exactly what the fuzzer dispatched
//! - Start model: arbitrary, including extremes
//!
//! # Invariants
//!
//! - Final model equals a sequential fold over the same events
//! - Effects reach the handler in the order the fold produces them
//! - Observers see each published model once, in order
//! - Dispose releases the effect handler exactly once

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use loopframe_core::Consumer;
use loopframe_harness::{
    model::{counter_update, published_models, replay, CounterEffect, CounterEvent},
    RecordingConnectable, RecordingConsumer, DEFAULT_TIMEOUT,
};
use loopframe_runtime::{ContextFactory, LoopBuilder, LoopFactory};

#[derive(Debug, Arbitrary)]
struct Scenario {
    start: i64,
    events: Vec<CounterEvent>,
}

fuzz_target!(|scenario: Scenario| {
    let events: Vec<CounterEvent> = scenario.events.into_iter().take(256).collect();

    let handler = RecordingConnectable::<CounterEffect, CounterEvent>::new();
    let builder = LoopBuilder::new(counter_update, handler.clone())
        .event_context(ContextFactory::sequential("fuzz-event"))
        .effect_context(ContextFactory::immediate());
    let event_loop = builder.start_from(scenario.start).expect("loop starts");

    let models = RecordingConsumer::<i64>::new();
    let sink = models.clone();
    let _observer = event_loop.observe(move |model: &i64| sink.accept(*model)).expect("observe");

    for event in &events {
        event_loop.dispatch_event(*event).expect("loop is running");
    }

    let expected_models = published_models(scenario.start, &events);
    let (expected_model, expected_effects) = replay(scenario.start, &events);
    assert!(models.wait_for(expected_models.len(), DEFAULT_TIMEOUT), "models missing");
    assert!(handler.wait_for_values(expected_effects.len(), DEFAULT_TIMEOUT), "effects missing");

    event_loop.dispose();
    assert_eq!(models.values(), expected_models);
    assert_eq!(handler.values(), expected_effects);
    assert_eq!(event_loop.most_recent_model(), expected_model);
    assert_eq!(handler.dispose_count(), 1);
});
