//! Method-level context: one test or configuration-method execution.

use std::any::Any;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, Weak};
use std::thread;

use parking_lot::{Mutex, RwLock};
use serde::Serialize;

use crate::context::class::ClassContext;
use crate::context::session::SessionContext;
use crate::counter::SequenceCounter;
use crate::events::{ContextRef, Event, EventBus};
use crate::evidence::Screenshot;
use crate::steps::TestStepController;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MethodType {
    TestMethod,
    ConfigurationMethod,
}

/// Closed result classification of a method execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    NoRun,
    Passed,
    /// Passed after at least one retry.
    Recovered,
    Skipped,
    Failed,
    /// Failed, but the failure was declared expected.
    FailedExpected,
    /// Failed and scheduled for re-execution.
    Retried,
}

impl Status {
    pub fn is_passed(self) -> bool {
        matches!(self, Status::Passed | Status::Recovered)
    }

    pub fn is_failed(self) -> bool {
        matches!(self, Status::Failed | Status::FailedExpected | Status::Retried)
    }
}

/// Weighting of a method's failures in suite-level reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureCorridor {
    High,
    Mid,
    Low,
}

/// Context of one method execution.
///
/// Created when the test runner begins executing a method and retained for
/// the final report. Mutated throughout the method body by the executing
/// thread and occasionally by asynchronous collectors; all mutable state sits
/// behind interior locks. Identity (`run_index` + name) is fixed at
/// construction and defines equality.
pub struct MethodContext {
    name: String,
    method_type: MethodType,
    method_run_index: usize,
    thread_name: String,
    parent: Weak<ClassContext>,
    status: RwLock<Status>,
    retry_number: RwLock<u32>,
    parameter_values: RwLock<Vec<String>>,
    failure_corridor: RwLock<FailureCorridor>,
    priority_message: Mutex<Option<String>>,
    infos: Mutex<Vec<String>>,
    attributes: Mutex<Vec<Arc<dyn Any + Send + Sync>>>,
    sessions: Mutex<Vec<Arc<SessionContext>>>,
    related: Mutex<Vec<Arc<MethodContext>>>,
    depends_on: Mutex<Vec<Arc<MethodContext>>>,
    steps: Mutex<TestStepController>,
}

impl MethodContext {
    pub(crate) fn new(
        name: &str,
        method_type: MethodType,
        parent: Weak<ClassContext>,
        counter: &SequenceCounter,
    ) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            method_type,
            method_run_index: counter.next(),
            thread_name: current_thread_name(),
            parent,
            status: RwLock::new(Status::NoRun),
            retry_number: RwLock::new(0),
            parameter_values: RwLock::new(Vec::new()),
            failure_corridor: RwLock::new(FailureCorridor::High),
            priority_message: Mutex::new(None),
            infos: Mutex::new(Vec::new()),
            attributes: Mutex::new(Vec::new()),
            sessions: Mutex::new(Vec::new()),
            related: Mutex::new(Vec::new()),
            depends_on: Mutex::new(Vec::new()),
            steps: Mutex::new(TestStepController::new()),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn method_type(&self) -> MethodType {
        self.method_type
    }

    /// Globally unique, monotonically increasing across the whole run
    /// regardless of thread. Assigned once, never reused.
    pub fn run_index(&self) -> usize {
        self.method_run_index
    }

    /// Identity of the worker that created this context ("name#id").
    pub fn thread_name(&self) -> &str {
        &self.thread_name
    }

    pub fn class_context(&self) -> Option<Arc<ClassContext>> {
        self.parent.upgrade()
    }

    pub fn status(&self) -> Status {
        *self.status.read()
    }

    pub fn set_status(&self, status: Status) {
        *self.status.write() = status;
    }

    pub fn is_status_one_of(&self, statuses: &[Status]) -> bool {
        let current = self.status();
        statuses.iter().any(|status| *status == current)
    }

    pub fn is_config_method(&self) -> bool {
        self.method_type == MethodType::ConfigurationMethod
    }

    pub fn is_test_method(&self) -> bool {
        !self.is_config_method()
    }

    pub fn retry_number(&self) -> u32 {
        *self.retry_number.read()
    }

    pub fn set_retry_number(&self, retry_number: u32) {
        *self.retry_number.write() = retry_number;
    }

    pub fn parameter_values(&self) -> Vec<String> {
        self.parameter_values.read().clone()
    }

    pub fn set_parameter_values(&self, values: Vec<String>) {
        *self.parameter_values.write() = values;
    }

    pub fn failure_corridor(&self) -> FailureCorridor {
        *self.failure_corridor.read()
    }

    pub fn set_failure_corridor(&self, corridor: FailureCorridor) {
        *self.failure_corridor.write() = corridor;
    }

    /// Append to the priority message unless it is already contained.
    /// At most one message exists; duplicates are detected by substring
    /// containment. Legacy report feature.
    pub fn add_priority_message(&self, message: &str) {
        let mut priority = self.priority_message.lock();
        let current = priority.get_or_insert_with(String::new);
        if !current.contains(message) {
            current.push_str(message);
        }
    }

    pub fn priority_message(&self) -> Option<String> {
        self.priority_message.lock().clone()
    }

    pub fn add_info(&self, info: impl Into<String>) {
        self.infos.lock().push(info.into());
    }

    pub fn read_infos(&self) -> Vec<String> {
        self.infos.lock().clone()
    }

    /// Attach an opaque metadata object (e.g. a resolved annotation).
    pub fn add_attribute<T: Any + Send + Sync>(&self, value: T) {
        self.attributes.lock().push(Arc::new(value));
    }

    /// First attached metadata object of type `T`, if any.
    pub fn get_attribute<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        self.attributes
            .lock()
            .iter()
            .find_map(|attribute| Arc::clone(attribute).downcast::<T>().ok())
    }

    /// Link a session to this method. Idempotent: linking the same session
    /// twice is a no-op. On first link the session back-links this method and
    /// a context-update event is published, in that order, after both sides
    /// are updated.
    pub fn add_session_context(
        self: &Arc<Self>,
        session: &Arc<SessionContext>,
        events: &EventBus,
    ) {
        {
            let mut sessions = self.sessions.lock();
            if sessions.iter().any(|s| Arc::ptr_eq(s, session)) {
                return;
            }
            sessions.push(Arc::clone(session));
        }
        session.add_method_context(self);
        session.set_parent(self);
        events.post(&Event::ContextUpdate(ContextRef::Method(Arc::clone(self))));
    }

    pub fn read_session_contexts(&self) -> Vec<Arc<SessionContext>> {
        self.sessions.lock().clone()
    }

    /// Record a traceability link to another method execution. Duplicates
    /// are allowed.
    pub fn add_related_method_context(&self, related: Arc<MethodContext>) {
        self.related.lock().push(related);
    }

    pub fn read_related_method_contexts(&self) -> Vec<Arc<MethodContext>> {
        self.related.lock().clone()
    }

    /// Record a dependency on another method execution. Deduplicated by
    /// identity.
    pub fn add_depends_on_method(&self, dependency: Arc<MethodContext>) {
        let mut depends_on = self.depends_on.lock();
        if !depends_on.iter().any(|existing| **existing == *dependency) {
            depends_on.push(dependency);
        }
    }

    pub fn read_depends_on_method_contexts(&self) -> Vec<Arc<MethodContext>> {
        self.depends_on.lock().clone()
    }

    /// Access the step controller. All step/action/assertion bookkeeping of
    /// this method goes through here.
    pub fn with_steps<R>(&self, f: impl FnOnce(&mut TestStepController) -> R) -> R {
        f(&mut self.steps.lock())
    }

    /// Open (or switch to) the named step; returns its id.
    pub fn test_step(&self, name: &str) -> u64 {
        self.with_steps(|steps| steps.test_step(name).id())
    }

    /// Record a fatal error on the current step's current action.
    pub fn add_error(&self, error: anyhow::Error) {
        self.with_steps(|steps| steps.add_error(error));
    }

    /// Record an optional assertion; does not fail the method by itself.
    pub fn add_optional_assertion(&self, error: anyhow::Error) {
        self.with_steps(|steps| steps.add_optional_assertion(error));
    }

    pub fn add_log_message(&self, message: impl Into<String>) {
        self.with_steps(|steps| steps.add_log_message(message));
    }

    /// Publish screenshots into the current step's current action.
    pub fn add_screenshots(&self, screenshots: impl IntoIterator<Item = Screenshot>) {
        self.with_steps(|steps| steps.add_screenshots(screenshots));
    }

    pub fn last_failed_step_index(&self) -> Option<usize> {
        self.with_steps(|steps| steps.last_failed_step_index())
    }

    /// True if any non-optional assertion was recorded.
    pub fn has_failed_assertions(&self) -> bool {
        self.with_steps(|steps| steps.read_errors().any(|error| !error.is_optional()))
    }

    /// Stable identity string: derived from run index and name only, never
    /// from mutable state.
    pub fn identity(&self) -> String {
        format!(
            "MethodContext{{run_index={}, name='{}'}}",
            self.method_run_index, self.name
        )
    }
}

impl fmt::Debug for MethodContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.identity())
    }
}

impl fmt::Display for MethodContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.identity())
    }
}

impl PartialEq for MethodContext {
    fn eq(&self, other: &Self) -> bool {
        self.method_run_index == other.method_run_index && self.name == other.name
    }
}

impl Eq for MethodContext {}

impl Hash for MethodContext {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.method_run_index.hash(state);
        self.name.hash(state);
    }
}

fn current_thread_name() -> String {
    let thread = thread::current();
    let id = format!("{:?}", thread.id());
    let id = id
        .trim_start_matches("ThreadId(")
        .trim_end_matches(')')
        .to_string();
    format!("{}#{}", thread.name().unwrap_or("unnamed"), id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::ContextFixture;
    use anyhow::anyhow;

    #[test]
    fn status_queries_are_pure_reads() {
        let fixture = ContextFixture::new();
        let method = fixture.test_method("test_status");

        assert_eq!(method.status(), Status::NoRun);
        assert!(method.is_status_one_of(&[Status::NoRun, Status::Failed]));
        assert!(!method.is_status_one_of(&[Status::Passed]));

        method.set_status(Status::Skipped);
        assert!(method.is_status_one_of(&[Status::Skipped]));
        assert!(method.is_test_method());
        assert!(!method.is_config_method());
    }

    #[test]
    fn errors_route_through_the_step_controller() {
        let fixture = ContextFixture::new();
        let method = fixture.test_method("test_steps");

        method.test_step("act");
        method.add_optional_assertion(anyhow!("soft"));
        assert!(!method.has_failed_assertions());
        assert_eq!(method.last_failed_step_index(), None);

        method.add_error(anyhow!("hard"));
        assert!(method.has_failed_assertions());
        assert_eq!(method.last_failed_step_index(), Some(0));
    }

    #[test]
    fn thread_name_is_captured_at_construction() {
        let fixture = ContextFixture::new();
        let method = fixture.test_method("test_thread");
        assert!(method.thread_name().contains('#'));
    }
}
