//! Test-only helpers: deterministic builders and scripted collaborators.

use std::sync::Arc;

use anyhow::Result;
use parking_lot::Mutex;

use crate::context::{ClassContext, ExecutionContext, MethodContext, MethodType};
use crate::counter::SequenceCounter;
use crate::events::{ContextRef, EventListener};
use crate::evidence::{Screenshot, ScreenshotCollector};

/// Shared log for ordering assertions across listeners.
pub type EventLog = Arc<Mutex<Vec<String>>>;

/// Listener that appends `"name:kind:context"` entries to a log.
pub struct RecordingListener {
    name: String,
    log: EventLog,
}

impl RecordingListener {
    pub fn new_log() -> EventLog {
        Arc::new(Mutex::new(Vec::new()))
    }

    pub fn named(name: &str) -> Self {
        Self::with_log(name, Self::new_log())
    }

    pub fn with_log(name: &str, log: EventLog) -> Self {
        Self {
            name: name.to_string(),
            log,
        }
    }

    pub fn entries(&self) -> Vec<String> {
        self.log.lock().clone()
    }

    pub fn updates(&self) -> usize {
        self.log
            .lock()
            .iter()
            .filter(|entry| entry.contains(":update:"))
            .count()
    }

    pub fn finalizations(&self) -> usize {
        self.log
            .lock()
            .iter()
            .filter(|entry| entry.contains(":finalize:"))
            .count()
    }
}

impl EventListener for RecordingListener {
    fn on_context_update(&self, context: &ContextRef) -> Result<()> {
        self.log
            .lock()
            .push(format!("{}:update:{}", self.name, context.name()));
        Ok(())
    }

    fn on_finalize_execution(&self, execution: &Arc<ExecutionContext>) -> Result<()> {
        self.log
            .lock()
            .push(format!("{}:finalize:{}", self.name, execution.name()));
        Ok(())
    }
}

/// Screenshot collector returning a fixed set of paths.
pub struct StaticScreenshotCollector {
    screenshots: Vec<Screenshot>,
}

impl StaticScreenshotCollector {
    pub fn empty() -> Self {
        Self {
            screenshots: Vec::new(),
        }
    }

    pub fn with_paths(paths: &[&str]) -> Self {
        Self {
            screenshots: paths.iter().map(|path| Screenshot::new(*path)).collect(),
        }
    }
}

impl ScreenshotCollector for StaticScreenshotCollector {
    fn take_screenshots(&self) -> Result<Option<Vec<Screenshot>>> {
        Ok(Some(self.screenshots.clone()))
    }
}

/// Screenshot collector that always fails, for isolation tests.
pub struct FailingScreenshotCollector;

impl ScreenshotCollector for FailingScreenshotCollector {
    fn take_screenshots(&self) -> Result<Option<Vec<Screenshot>>> {
        Err(anyhow::anyhow!("screenshot collector broke"))
    }
}

/// A standalone execution/class pair for building method contexts without a
/// controller.
pub struct ContextFixture {
    pub execution: Arc<ExecutionContext>,
    pub class: Arc<ClassContext>,
    pub counter: SequenceCounter,
}

impl ContextFixture {
    pub fn new() -> Self {
        let execution = ExecutionContext::new("test-suite");
        let class = execution.get_or_create_class("TestClass");
        Self {
            execution,
            class,
            counter: SequenceCounter::new(),
        }
    }

    pub fn test_method(&self, name: &str) -> Arc<MethodContext> {
        self.class
            .create_method_context(name, MethodType::TestMethod, &self.counter)
    }
}

impl Default for ContextFixture {
    fn default() -> Self {
        Self::new()
    }
}
