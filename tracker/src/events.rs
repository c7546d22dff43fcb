//! Synchronous publish/subscribe for context mutations and suite finalization.
//!
//! Delivery is synchronous, on the posting thread, in registration order, so
//! a listener observes the context only after the mutation that triggered the
//! event is complete. Listeners must not block indefinitely or they stall the
//! mutating worker. A listener returning an error is logged and skipped; it
//! never prevents delivery to later listeners.

use std::sync::Arc;

use parking_lot::RwLock;
use tracing::warn;

use crate::context::{ClassContext, ExecutionContext, MethodContext, SessionContext};

/// Reference to the context node an update event is about.
#[derive(Clone)]
pub enum ContextRef {
    Execution(Arc<ExecutionContext>),
    Class(Arc<ClassContext>),
    Method(Arc<MethodContext>),
    Session(Arc<SessionContext>),
}

impl ContextRef {
    /// Name of the referenced node, for logging.
    pub fn name(&self) -> String {
        match self {
            ContextRef::Execution(execution) => execution.name().to_string(),
            ContextRef::Class(class) => class.name().to_string(),
            ContextRef::Method(method) => method.name().to_string(),
            ContextRef::Session(session) => session.session_key(),
        }
    }
}

/// Events broadcast by the context tree.
#[derive(Clone)]
pub enum Event {
    /// A context node was mutated. Fired per mutation.
    ContextUpdate(ContextRef),
    /// The report model is complete. Fired exactly once per suite.
    FinalizeExecution(Arc<ExecutionContext>),
}

/// Receives context events. Subscribe via [`EventBus::subscribe`];
/// no unsubscribe is provided.
pub trait EventListener: Send + Sync {
    fn on_context_update(&self, _context: &ContextRef) -> anyhow::Result<()> {
        Ok(())
    }

    fn on_finalize_execution(&self, _execution: &Arc<ExecutionContext>) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Process-wide publish channel, owned by the run coordinator and passed by
/// reference to every context-mutating operation.
#[derive(Default)]
pub struct EventBus {
    listeners: RwLock<Vec<Arc<dyn EventListener>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, listener: Arc<dyn EventListener>) {
        self.listeners.write().push(listener);
    }

    /// Deliver `event` to all currently registered listeners, in registration
    /// order, on the calling thread.
    pub fn post(&self, event: &Event) {
        // Snapshot so a listener subscribing during delivery cannot deadlock.
        let listeners: Vec<Arc<dyn EventListener>> = self.listeners.read().clone();
        for listener in &listeners {
            let result = match event {
                Event::ContextUpdate(context) => listener.on_context_update(context),
                Event::FinalizeExecution(execution) => listener.on_finalize_execution(execution),
            };
            if let Err(err) = result {
                warn!(error = %err, "event listener failed");
            }
        }
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.read().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::RecordingListener;
    use anyhow::anyhow;

    struct FailingListener;

    impl EventListener for FailingListener {
        fn on_context_update(&self, _context: &ContextRef) -> anyhow::Result<()> {
            Err(anyhow!("listener broke"))
        }
    }

    fn sample_update() -> Event {
        let execution = ExecutionContext::new("suite");
        Event::ContextUpdate(ContextRef::Execution(execution))
    }

    #[test]
    fn delivers_in_registration_order() {
        let bus = EventBus::new();
        let log = RecordingListener::new_log();
        bus.subscribe(Arc::new(RecordingListener::with_log("first", log.clone())));
        bus.subscribe(Arc::new(RecordingListener::with_log("second", log.clone())));

        bus.post(&sample_update());

        let entries = log.lock().clone();
        assert_eq!(entries, vec!["first:update:suite", "second:update:suite"]);
    }

    #[test]
    fn failing_listener_does_not_stop_delivery() {
        let bus = EventBus::new();
        bus.subscribe(Arc::new(FailingListener));
        let recorder = Arc::new(RecordingListener::named("after"));
        bus.subscribe(recorder.clone());

        bus.post(&sample_update());

        assert_eq!(recorder.updates(), 1);
    }

    #[test]
    fn finalize_reaches_finalize_hook_only() {
        let bus = EventBus::new();
        let recorder = Arc::new(RecordingListener::named("r"));
        bus.subscribe(recorder.clone());

        bus.post(&Event::FinalizeExecution(ExecutionContext::new("suite")));

        assert_eq!(recorder.updates(), 0);
        assert_eq!(recorder.finalizations(), 1);
    }
}
