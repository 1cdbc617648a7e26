//! Fuzz target for the controller lifecycle
//!
//! Arbitrary sequences of controller operations and dispatched events
//!
//! # Strategy
//!
//! - Lifecycle ops: start, stop, restart, replace model, dispose in any order
//! - Events: dispatched through a manual event source, dropped while idle
//! - Immediate contexts, so every operation completes before the next
//!
//! # Invariants
//!
//! - Operations succeed exactly when the state machine allows them
//! - The model survives stop/start unchanged
//! - The event source has a live subscription only while running
//! - Disposed is terminal

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use loopframe_core::connectables;
use loopframe_harness::{
    model::{counter_update, CounterEffect, CounterEvent},
    ManualEventSource,
};
use loopframe_runtime::{ContextFactory, Controller, ControllerState, LoopBuilder};

#[derive(Debug, Clone, Arbitrary)]
enum LifecycleOp {
    Start,
    Stop,
    Restart,
    ReplaceModel(i32),
    Emit(CounterEvent),
    Dispose,
}

fuzz_target!(|ops: Vec<LifecycleOp>| {
    let source = ManualEventSource::new();
    let handler = connectables::from_action::<CounterEffect, CounterEvent, _>(|| {});
    let builder = LoopBuilder::new(counter_update, handler)
        .subscribe_to(source.clone())
        .event_context(ContextFactory::immediate())
        .effect_context(ContextFactory::immediate());
    let controller = Controller::new(builder, 0i64);

    let mut expected_state = ControllerState::Idle;
    let mut expected_model = 0i64;

    for op in ops.into_iter().take(128) {
        let running = expected_state == ControllerState::Running;
        let idle = expected_state == ControllerState::Idle;
        match op {
            LifecycleOp::Start => {
                assert_eq!(controller.start().is_ok(), idle);
                if idle {
                    expected_state = ControllerState::Running;
                }
            }
            LifecycleOp::Stop => {
                assert_eq!(controller.stop().is_ok(), running);
                if running {
                    expected_state = ControllerState::Idle;
                }
            }
            LifecycleOp::Restart => {
                assert_eq!(controller.restart().is_ok(), running);
            }
            LifecycleOp::ReplaceModel(model) => {
                assert_eq!(controller.replace_model(i64::from(model)).is_ok(), idle);
                if idle {
                    expected_model = i64::from(model);
                }
            }
            LifecycleOp::Emit(event) => {
                let delivered = source.emit(event);
                assert_eq!(delivered, usize::from(running));
                if running {
                    if let Some(model) = counter_update(&expected_model, &event).into_parts().0 {
                        expected_model = model;
                    }
                }
            }
            LifecycleOp::Dispose => {
                assert_eq!(controller.dispose().is_ok(), idle);
                if idle {
                    expected_state = ControllerState::Disposed;
                }
            }
        }

        assert_eq!(controller.state(), expected_state);
        assert_eq!(controller.model(), expected_model);
        assert_eq!(source.subscriber_count(), usize::from(expected_state == ControllerState::Running));
    }
});
