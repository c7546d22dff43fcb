//! Run coordination: wires test-runner callbacks into the context tree.
//!
//! One `ExecutionController` exists per suite run. It owns the root
//! execution context, the event bus and the sequence counter, tracks which
//! method context each worker thread is currently executing, and fires the
//! finalize event exactly once when the suite ends.

use std::collections::HashMap;
use std::sync::Arc;
use std::thread::{self, ThreadId};

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::context::{
    ExecutionContext, MethodContext, MethodType, SessionContext, SessionRequest, Status,
};
use crate::counter::SequenceCounter;
use crate::events::{ContextRef, Event, EventBus, EventListener};

pub struct ExecutionController {
    execution: Arc<ExecutionContext>,
    events: EventBus,
    counter: SequenceCounter,
    current_methods: Mutex<HashMap<ThreadId, Arc<MethodContext>>>,
    current_sessions: Mutex<HashMap<ThreadId, Arc<SessionContext>>>,
}

impl ExecutionController {
    /// Start tracking a suite run. Creates the root execution context.
    pub fn new(suite_name: &str) -> Self {
        Self {
            execution: ExecutionContext::new(suite_name),
            events: EventBus::new(),
            counter: SequenceCounter::new(),
            current_methods: Mutex::new(HashMap::new()),
            current_sessions: Mutex::new(HashMap::new()),
        }
    }

    pub fn execution_context(&self) -> &Arc<ExecutionContext> {
        &self.execution
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn subscribe(&self, listener: Arc<dyn EventListener>) {
        self.events.subscribe(listener);
    }

    /// Test-runner callback: a method execution begins on this thread.
    ///
    /// Creates the class context lazily, allocates the run index, remembers
    /// the context as current for the calling thread and publishes an update.
    pub fn start_method(
        &self,
        class_name: &str,
        method_name: &str,
        method_type: MethodType,
        parameter_values: Vec<String>,
    ) -> Arc<MethodContext> {
        let class = self.execution.get_or_create_class(class_name);
        let method = class.create_method_context(method_name, method_type, &self.counter);
        method.set_parameter_values(parameter_values);

        self.current_methods
            .lock()
            .insert(thread::current().id(), Arc::clone(&method));

        debug!(method = %method, thread = method.thread_name(), "method started");
        self.events
            .post(&Event::ContextUpdate(ContextRef::Method(Arc::clone(
                &method,
            ))));
        method
    }

    /// Test-runner callback: the method execution on this thread ended.
    pub fn finish_method(&self, method: &Arc<MethodContext>, status: Status) {
        method.set_status(status);
        self.current_methods.lock().remove(&thread::current().id());
        debug!(method = %method, ?status, "method finished");
        self.events
            .post(&Event::ContextUpdate(ContextRef::Method(Arc::clone(
                method,
            ))));
    }

    /// The method context the calling thread is currently executing.
    pub fn current_method_context(&self) -> Option<Arc<MethodContext>> {
        self.current_methods
            .lock()
            .get(&thread::current().id())
            .cloned()
    }

    /// Session-request callback: a new remote session was requested on this
    /// thread. Links it to the current method, if any.
    pub fn create_session_context(&self, request: &SessionRequest) -> Arc<SessionContext> {
        let session = SessionContext::new(request);
        if let Some(method) = self.current_method_context() {
            method.add_session_context(&session, &self.events);
        }
        self.current_sessions
            .lock()
            .insert(thread::current().id(), Arc::clone(&session));
        self.events
            .post(&Event::ContextUpdate(ContextRef::Session(Arc::clone(
                &session,
            ))));
        session
    }

    /// The session context most recently created on the calling thread.
    pub fn current_session_context(&self) -> Option<Arc<SessionContext>> {
        self.current_sessions
            .lock()
            .get(&thread::current().id())
            .cloned()
    }

    /// Suite-end callback. Publishes the finalize event with the root
    /// execution context, exactly once; repeated calls are ignored.
    ///
    /// All method/class/session mutations must be complete before calling.
    pub fn finalize(&self) -> bool {
        if !self.execution.mark_finalized() {
            warn!("execution already finalized, ignoring repeated finalize");
            return false;
        }
        self.events
            .post(&Event::FinalizeExecution(Arc::clone(&self.execution)));
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::RecordingListener;

    #[test]
    fn start_method_tracks_current_context_per_thread() {
        let controller = ExecutionController::new("suite");
        let method =
            controller.start_method("LoginTest", "test_login", MethodType::TestMethod, vec![]);

        let current = controller.current_method_context().expect("current");
        assert_eq!(*current, *method);

        controller.finish_method(&method, Status::Passed);
        assert!(controller.current_method_context().is_none());
        assert_eq!(method.status(), Status::Passed);
    }

    #[test]
    fn same_class_is_reused_across_methods() {
        let controller = ExecutionController::new("suite");
        let first =
            controller.start_method("LoginTest", "test_a", MethodType::TestMethod, vec![]);
        let second =
            controller.start_method("LoginTest", "test_b", MethodType::TestMethod, vec![]);

        let first_class = first.class_context().expect("class");
        let second_class = second.class_context().expect("class");
        assert!(Arc::ptr_eq(&first_class, &second_class));
        assert_eq!(first_class.read_method_contexts().len(), 2);
    }

    #[test]
    fn session_links_to_current_method() {
        let controller = ExecutionController::new("suite");
        let method =
            controller.start_method("LoginTest", "test_login", MethodType::TestMethod, vec![]);
        let session = controller.create_session_context(&SessionRequest::new("default"));

        assert_eq!(method.read_session_contexts().len(), 1);
        assert_eq!(session.read_method_contexts().len(), 1);
        assert_eq!(*session.parent_method().expect("parent"), *method);
        let current = controller.current_session_context().expect("current");
        assert!(Arc::ptr_eq(&current, &session));
    }

    #[test]
    fn finalize_fires_exactly_once() {
        let controller = ExecutionController::new("suite");
        let listener = Arc::new(RecordingListener::named("report"));
        controller.subscribe(listener.clone());

        assert!(controller.finalize());
        assert!(!controller.finalize());
        assert_eq!(listener.finalizations(), 1);
    }
}
