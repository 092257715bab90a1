mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use common::{config_file, options, MockRuntime, SAMPLE_CONFIG, UNSPAWNABLE_STACK};
use pyfx::{HostEvent, HostHooks, LifecycleController, Status};
use tracing::{Event, Subscriber};
use tracing_subscriber::layer::{Context, Layer, SubscriberExt};

const WAIT: Duration = Duration::from_secs(5);

fn hooks(runtime: MockRuntime) -> (tempfile::TempDir, HostHooks<MockRuntime>) {
    let (dir, path) = config_file(SAMPLE_CONFIG);
    let controller = LifecycleController::with_options(runtime, options(path, Duration::from_millis(20)));
    (dir, HostHooks::new(controller))
}

/// Counts events delivered on threads where it is the default subscriber
struct EventCounter(Arc<AtomicUsize>);

impl<S: Subscriber> Layer<S> for EventCounter {
    fn on_event(&self, _event: &Event<'_>, _ctx: Context<'_, S>) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

fn count_events(f: impl FnOnce()) -> usize {
    let events = Arc::new(AtomicUsize::new(0));
    let subscriber = tracing_subscriber::registry().with(EventCounter(Arc::clone(&events)));
    tracing::subscriber::with_default(subscriber, f);
    events.load(Ordering::SeqCst)
}

#[test]
fn test_attach_starts_and_detach_stops() {
    let (_dir, hooks) = hooks(MockRuntime::new());

    assert!(hooks.handle(HostEvent::Attach));
    assert!(hooks.controller().running());
    assert!(hooks.controller().runtime().wait_for(WAIT, |rt| rt.initializations() == 1));

    assert!(hooks.handle(HostEvent::Detach));
    assert!(!hooks.controller().running());
    assert_eq!(hooks.controller().runtime().finalizations(), 1);
}

#[test]
fn test_thread_events_are_ignored() {
    let (_dir, hooks) = hooks(MockRuntime::new());

    assert!(hooks.handle(HostEvent::ThreadAttach));
    assert!(hooks.handle(HostEvent::ThreadDetach));
    assert!(!hooks.controller().running());
    assert!(hooks.controller().runtime().calls().is_empty());
}

#[test]
fn test_detach_without_attach() {
    let (_dir, hooks) = hooks(MockRuntime::new());
    hooks.detach();
    assert_eq!(hooks.controller().status(), Status::Stopped);
}

#[test]
fn test_manual_api_and_hooks_share_state() {
    let (_dir, hooks) = hooks(MockRuntime::new());

    hooks.controller().start().unwrap();
    hooks.attach().unwrap();
    assert!(hooks.controller().runtime().wait_for(WAIT, |rt| rt.initializations() == 1));

    hooks.detach();
    hooks.controller().stop();
    assert_eq!(hooks.controller().runtime().initializations(), 1);
    assert_eq!(hooks.controller().runtime().finalizations(), 1);
}

#[test]
fn test_attach_succeeds_even_if_runtime_init_fails() {
    // Init happens on the worker thread, after attach has returned
    let (_dir, hooks) = hooks(MockRuntime::new().failing_init(1));

    assert!(hooks.handle(HostEvent::Attach));
    assert!(hooks.controller().runtime().wait_for(WAIT, |_| hooks.controller().status() == Status::Failed));

    assert!(hooks.handle(HostEvent::Detach));
    assert_eq!(hooks.controller().status(), Status::Stopped);
}

#[test]
fn test_attach_fails_when_worker_cannot_spawn() {
    let (_dir, path) = config_file(SAMPLE_CONFIG);
    let controller = LifecycleController::with_options(
        MockRuntime::new(),
        options(path, Duration::from_millis(20)).with_stack_size(UNSPAWNABLE_STACK),
    );
    let hooks = HostHooks::new(controller);

    assert!(!hooks.handle(HostEvent::Attach));
    assert_eq!(hooks.controller().status(), Status::Stopped);
    assert!(hooks.controller().runtime().calls().is_empty());

    assert!(hooks.handle(HostEvent::Detach));
}

#[test]
fn test_detach_logs_on_calling_thread() {
    let (_dir, hooks) = hooks(MockRuntime::new());
    assert!(hooks.handle(HostEvent::Attach));
    assert!(hooks.controller().runtime().wait_for(WAIT, |rt| rt.initializations() == 1));

    assert!(count_events(|| hooks.detach()) > 0);
    assert_eq!(hooks.controller().runtime().finalizations(), 1);
}

#[test]
fn test_unload_stops_without_emitting_on_calling_thread() {
    let (_dir, hooks) = hooks(MockRuntime::new());
    assert!(hooks.handle(HostEvent::Attach));
    assert!(hooks.controller().runtime().wait_for(WAIT, |rt| rt.initializations() == 1));

    assert_eq!(count_events(|| hooks.unload()), 0);
    assert!(!hooks.controller().running());
    assert_eq!(hooks.controller().runtime().finalizations(), 1);
}
