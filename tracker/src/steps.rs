//! Per-method step log: ordered steps, each with ordered actions, each
//! carrying log messages, assertions and screenshots.
//!
//! The controller keeps two cursors, the current step and that step's current
//! action. All attachment operations (errors, optional assertions, log
//! messages, screenshots) go to the current cursors only. Steps get stable
//! numeric ids so the "last failed step" marker survives reordering-free
//! positional lookups without relying on reference identity.

use crate::evidence::Screenshot;

/// Name of the step that collects entries recorded outside any named step.
pub const INTERNAL_STEP: &str = "Internal";

/// One recorded assertion or error.
#[derive(Debug)]
pub struct ErrorContext {
    error: anyhow::Error,
    optional: bool,
}

impl ErrorContext {
    pub fn new(error: anyhow::Error, optional: bool) -> Self {
        Self { error, optional }
    }

    pub fn error(&self) -> &anyhow::Error {
        &self.error
    }

    /// Optional assertions record a failure without failing the owning
    /// method by themselves.
    pub fn is_optional(&self) -> bool {
        self.optional
    }
}

/// One action within a step.
#[derive(Debug, Default)]
pub struct TestStepAction {
    name: String,
    log_messages: Vec<String>,
    assertions: Vec<ErrorContext>,
    screenshots: Vec<Screenshot>,
}

impl TestStepAction {
    fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn add_log_message(&mut self, message: impl Into<String>) {
        self.log_messages.push(message.into());
    }

    pub fn add_assertion(&mut self, error_context: ErrorContext) {
        self.assertions.push(error_context);
    }

    pub fn add_screenshot(&mut self, screenshot: Screenshot) {
        self.screenshots.push(screenshot);
    }

    pub fn read_log_messages(&self) -> impl Iterator<Item = &str> {
        self.log_messages.iter().map(String::as_str)
    }

    pub fn read_errors(&self) -> impl Iterator<Item = &ErrorContext> {
        self.assertions.iter()
    }

    pub fn read_screenshots(&self) -> impl Iterator<Item = &Screenshot> {
        self.screenshots.iter()
    }
}

/// One named step, holding an ordered sequence of actions.
#[derive(Debug)]
pub struct TestStep {
    id: u64,
    name: String,
    actions: Vec<TestStepAction>,
}

impl TestStep {
    fn new(id: u64, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            actions: Vec::new(),
        }
    }

    /// Controller-assigned id, stable for the lifetime of the method.
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn actions(&self) -> &[TestStepAction] {
        &self.actions
    }

    /// The most recently opened action, created on demand.
    pub fn current_action(&mut self) -> &mut TestStepAction {
        if self.actions.is_empty() {
            let name = self.name.clone();
            self.actions.push(TestStepAction::new(name));
        }
        let last = self.actions.len() - 1;
        &mut self.actions[last]
    }

    /// Open a new action and make it current.
    pub fn open_action(&mut self, name: impl Into<String>) -> &mut TestStepAction {
        self.actions.push(TestStepAction::new(name));
        let last = self.actions.len() - 1;
        &mut self.actions[last]
    }
}

/// Append-only sequence of steps with current-step/current-action cursors.
#[derive(Debug, Default)]
pub struct TestStepController {
    steps: Vec<TestStep>,
    current: Option<usize>,
    next_step_id: u64,
    last_failed_step_id: Option<u64>,
}

impl TestStepController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the named step, creating it if absent, and make it current.
    pub fn test_step(&mut self, name: &str) -> &mut TestStep {
        let position = match self.steps.iter().position(|step| step.name() == name) {
            Some(position) => position,
            None => {
                let id = self.next_step_id;
                self.next_step_id += 1;
                self.steps.push(TestStep::new(id, name));
                self.steps.len() - 1
            }
        };
        self.current = Some(position);
        &mut self.steps[position]
    }

    /// The current step. Entries recorded before any named step was opened
    /// land in an implicit internal step.
    pub fn current_step(&mut self) -> &mut TestStep {
        match self.current {
            Some(position) => &mut self.steps[position],
            None => self.test_step(INTERNAL_STEP),
        }
    }

    pub fn steps(&self) -> &[TestStep] {
        &self.steps
    }

    pub fn add_log_message(&mut self, message: impl Into<String>) {
        self.current_step().current_action().add_log_message(message);
    }

    /// Record a fatal (non-optional) error on the current action and mark
    /// the current step as the last failed one.
    pub fn add_error(&mut self, error: anyhow::Error) {
        self.add_assertion(ErrorContext::new(error, false));
    }

    /// Record an optional assertion. Does not mark the step as failed.
    pub fn add_optional_assertion(&mut self, error: anyhow::Error) {
        self.add_assertion(ErrorContext::new(error, true));
    }

    pub fn add_assertion(&mut self, error_context: ErrorContext) {
        let fatal = !error_context.is_optional();
        let step = self.current_step();
        let id = step.id();
        step.current_action().add_assertion(error_context);
        if fatal {
            self.last_failed_step_id = Some(id);
        }
    }

    pub fn add_screenshots(&mut self, screenshots: impl IntoIterator<Item = Screenshot>) {
        let action = self.current_step().current_action();
        for screenshot in screenshots {
            action.add_screenshot(screenshot);
        }
    }

    /// Explicitly mark a step as the last failed one, by id.
    pub fn set_failed_step(&mut self, step_id: u64) {
        self.last_failed_step_id = Some(step_id);
    }

    /// Positional index of the most recently recorded failing step.
    ///
    /// `None` if no failing step was ever recorded.
    pub fn last_failed_step_index(&self) -> Option<usize> {
        let id = self.last_failed_step_id?;
        self.steps.iter().position(|step| step.id() == id)
    }

    /// All recorded assertions, flattened over steps → actions → assertions
    /// in order. Lazy and restartable: each call yields a fresh iterator.
    pub fn read_errors(&self) -> impl Iterator<Item = &ErrorContext> {
        self.steps
            .iter()
            .flat_map(|step| step.actions().iter())
            .flat_map(TestStepAction::read_errors)
    }
}
