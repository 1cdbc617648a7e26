//! Controller lifecycle and view binding.

use std::{
    sync::{Arc, Mutex, OnceLock, mpsc},
    thread,
    time::Duration,
};

use loopframe_core::{
    Connectable, Connection, ConnectionError, Consumer, Disposable, First, connectables,
};
use loopframe_harness::{
    DEFAULT_TIMEOUT, ManualEventSource, RecordingConnectable, RecordingConsumer,
    model::{CounterEffect, CounterEvent, counter_update},
    wait_until,
};
use loopframe_runtime::{
    ContextFactory, Controller, ControllerError, ControllerState, LoopBuilder, SequentialContext,
};

type Counter = Controller<i64, CounterEvent, CounterEffect>;

fn controller(source: &ManualEventSource<CounterEvent>, model: i64) -> Counter {
    let handler = connectables::from_action::<CounterEffect, CounterEvent, _>(|| {});
    let builder = LoopBuilder::new(counter_update, handler).subscribe_to(source.clone());
    Controller::new(builder, model)
}

#[test]
fn restart_resumes_from_model_observed_at_stop() {
    let source = ManualEventSource::new();
    let controller = controller(&source, 100);

    controller.start().expect("start");
    source.emit(CounterEvent::Add(5));
    assert!(wait_until(DEFAULT_TIMEOUT, || controller.model() == 105));
    controller.stop().expect("stop");

    assert!(!controller.is_running());
    assert_eq!(controller.model(), 105);

    controller.start().expect("start again");
    source.emit(CounterEvent::Increment);
    assert!(wait_until(DEFAULT_TIMEOUT, || controller.model() == 106));
    controller.stop().expect("stop");
}

#[test]
fn source_is_released_between_runs() {
    let source = ManualEventSource::new();
    let controller = controller(&source, 0);

    controller.start().expect("start");
    assert_eq!(source.subscriber_count(), 1);
    controller.stop().expect("stop");
    assert_eq!(source.subscriber_count(), 0);

    controller.restart().expect_err("restart while idle");
    controller.start().expect("start");
    controller.restart().expect("restart");
    assert_eq!(source.subscriber_count(), 1);
    assert_eq!(source.unsubscribe_count(), 2);
}

#[test]
fn init_runs_on_each_start_with_carried_model() {
    let source = ManualEventSource::new();
    let controller = controller(&source, 1).with_init(|model: &i64| First::first(model * 10));

    controller.start().expect("start");
    assert_eq!(controller.model(), 10);
    controller.stop().expect("stop");
    controller.start().expect("start");
    assert_eq!(controller.model(), 100);
}

#[test]
fn self_driving_view_counts_to_three() {
    let source = ManualEventSource::new();
    let controller = controller(&source, 0);
    let view = RecordingConnectable::with_reply(|model: &i64| {
        (*model < 3).then_some(CounterEvent::Increment)
    });

    controller.connect(view.clone()).expect("connect");
    controller.start().expect("start");

    assert!(view.wait_for_values(4, DEFAULT_TIMEOUT));
    assert_eq!(view.values(), vec![0, 1, 2, 3]);
    assert_eq!(controller.model(), 3);
    controller.stop().expect("stop");
}

#[test]
fn view_receives_models_on_model_context() {
    let source = ManualEventSource::new();
    let context = Arc::new(SequentialContext::spawn("view-model").expect("spawn"));
    let controller = controller(&source, 0).with_model_context(context);
    let view = RecordingConnectable::<i64, CounterEvent>::new();

    controller.connect(view.clone()).expect("connect");
    controller.start().expect("start");
    source.emit(CounterEvent::Add(2));

    assert!(view.wait_for_values(2, DEFAULT_TIMEOUT));
    assert_eq!(view.values(), vec![0, 2]);
    controller.stop().expect("stop");
}

/// View that hands its output consumer to the test.
#[derive(Clone, Default)]
struct ProbeView {
    output: Arc<Mutex<Option<Arc<dyn Consumer<CounterEvent>>>>>,
    models: RecordingConsumer<i64>,
}

struct ProbeConnection {
    models: RecordingConsumer<i64>,
}

impl Disposable for ProbeConnection {
    fn dispose(&self) {}
}

impl Connection<i64> for ProbeConnection {
    fn accept(&self, model: i64) {
        self.models.accept(model);
    }
}

impl Connectable<i64, CounterEvent> for ProbeView {
    fn connect(
        &self,
        output: Arc<dyn Consumer<CounterEvent>>,
    ) -> Result<Box<dyn Connection<i64>>, ConnectionError> {
        *self.output.lock().expect("lock") = Some(output);
        Ok(Box::new(ProbeConnection { models: self.models.clone() }))
    }
}

impl ProbeView {
    fn emit(&self, event: CounterEvent) {
        let output = self.output.lock().expect("lock").clone().expect("connected");
        output.accept(event);
    }
}

#[test]
fn view_events_reach_running_loop_and_are_dropped_while_idle() {
    let source = ManualEventSource::new();
    let controller = controller(&source, 0);
    let view = ProbeView::default();
    controller.connect(view.clone()).expect("connect");

    view.emit(CounterEvent::Add(50));
    controller.start().expect("start");
    assert_eq!(controller.model(), 0);

    view.emit(CounterEvent::Add(1));
    assert!(view.models.wait_for(2, DEFAULT_TIMEOUT));
    assert_eq!(view.models.values(), vec![0, 1]);
    controller.stop().expect("stop");
}

#[test]
fn view_binding_rules() {
    let source = ManualEventSource::new();
    let controller = controller(&source, 0);
    let view = RecordingConnectable::<i64, CounterEvent>::new();

    controller.connect(view.clone()).expect("connect");
    assert!(matches!(
        controller.connect(RecordingConnectable::<i64, CounterEvent>::new()),
        Err(ControllerError::Connection(ConnectionError::LimitExceeded { .. }))
    ));

    controller.start().expect("start");
    assert!(matches!(
        controller.disconnect(),
        Err(ControllerError::InvalidState { state: ControllerState::Running, .. })
    ));
    controller.stop().expect("stop");

    controller.disconnect().expect("disconnect");
    assert_eq!(view.dispose_count(), 1);
    assert!(matches!(controller.disconnect(), Err(ControllerError::NotConnected)));
}

#[test]
fn dispose_is_terminal_and_releases_view() {
    let source = ManualEventSource::new();
    let controller = controller(&source, 7);
    let view = RecordingConnectable::<i64, CounterEvent>::new();
    controller.connect(view.clone()).expect("connect");

    controller.dispose().expect("dispose");

    assert_eq!(view.dispose_count(), 1);
    assert_eq!(controller.state(), ControllerState::Disposed);
    assert!(matches!(
        controller.start(),
        Err(ControllerError::InvalidState { state: ControllerState::Disposed, .. })
    ));
    assert!(controller.replace_model(1).is_err());
    assert_eq!(controller.model(), 7);
}

#[test]
fn dropping_running_controller_disposes_loop() {
    let source = ManualEventSource::new();
    let controller = controller(&source, 0);

    controller.start().expect("start");
    assert_eq!(source.subscriber_count(), 1);
    drop(controller);

    assert_eq!(source.subscriber_count(), 0);
}

#[test]
fn builder_failure_leaves_controller_idle() {
    let handler = RecordingConnectable::<CounterEffect, CounterEvent>::new();
    let _held = handler.connect(Arc::new(RecordingConsumer::<CounterEvent>::new())).expect("connect");
    let builder = LoopBuilder::new(counter_update, handler)
        .event_context(ContextFactory::immediate())
        .effect_context(ContextFactory::immediate());
    let controller = Controller::new(builder, 0);

    assert!(matches!(controller.start(), Err(ControllerError::Loop(_))));
    assert_eq!(controller.state(), ControllerState::Idle);
}

/// View that reads the controller state whenever a model arrives.
fn state_reading_view(
    shared: Arc<OnceLock<Arc<Counter>>>,
    pause_on: i64,
) -> (
    RecordingConsumer<i64>,
    RecordingConsumer<ControllerState>,
    impl Connectable<i64, CounterEvent>,
) {
    let models = RecordingConsumer::<i64>::new();
    let states = RecordingConsumer::<ControllerState>::new();
    let (seen, observed) = (models.clone(), states.clone());
    let view = connectables::from_consumer::<i64, CounterEvent, _>(move |model: i64| {
        seen.accept(model);
        if model == pause_on {
            thread::sleep(Duration::from_millis(200));
        }
        if let Some(controller) = shared.get() {
            observed.accept(controller.state());
        }
    });
    (models, states, view)
}

fn finishes(operation: impl FnOnce() -> Result<(), ControllerError> + Send + 'static) -> bool {
    let (done, finished) = mpsc::channel();
    thread::spawn(move || {
        let _ = done.send(operation().is_ok());
    });
    finished.recv_timeout(DEFAULT_TIMEOUT) == Ok(true)
}

#[test]
fn view_reading_state_during_start_does_not_block() {
    let source = ManualEventSource::new();
    let shared = Arc::new(OnceLock::new());
    let (models, states, view) = state_reading_view(Arc::clone(&shared), i64::MIN);
    let controller = Arc::new(controller(&source, 0));
    controller.connect(view).expect("connect");
    let _ = shared.set(Arc::clone(&controller));

    let starting = Arc::clone(&controller);
    assert!(finishes(move || starting.start()));

    assert_eq!(models.values(), vec![0]);
    assert_eq!(states.values(), vec![ControllerState::Starting]);
    assert_eq!(controller.state(), ControllerState::Running);
    controller.stop().expect("stop");
}

#[test]
fn view_reading_state_during_stop_does_not_block() {
    let source = ManualEventSource::new();
    let shared = Arc::new(OnceLock::new());
    let (models, states, view) = state_reading_view(Arc::clone(&shared), 1);
    let controller = Arc::new(controller(&source, 0));
    controller.connect(view).expect("connect");
    let _ = shared.set(Arc::clone(&controller));
    controller.start().expect("start");

    source.emit(CounterEvent::Increment);
    assert!(models.wait_for(2, DEFAULT_TIMEOUT));
    let stopping = Arc::clone(&controller);
    assert!(finishes(move || stopping.stop()));

    assert_eq!(controller.state(), ControllerState::Idle);
    assert_eq!(controller.model(), 1);
    assert!(matches!(
        states.values().last(),
        Some(ControllerState::Running | ControllerState::Stopping)
    ));
}
