//! Suite-level root of the context tree.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Local};
use parking_lot::Mutex;

use crate::context::class::ClassContext;
use crate::context::method::{MethodContext, Status};

/// Root context of one suite run. Created once at suite start; identity
/// (name, run id, start time) is immutable afterwards. Owns all class
/// contexts, created lazily on first method execution in a class.
pub struct ExecutionContext {
    name: String,
    run_id: String,
    started: DateTime<Local>,
    classes: Mutex<Vec<Arc<ClassContext>>>,
    finalized: AtomicBool,
}

impl ExecutionContext {
    pub fn new(name: impl Into<String>) -> Arc<Self> {
        let started = Local::now();
        Arc::new(Self {
            name: name.into(),
            run_id: started.format("%Y%m%d-%H%M%S%.3f").to_string(),
            started,
            classes: Mutex::new(Vec::new()),
            finalized: AtomicBool::new(false),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn started_at(&self) -> DateTime<Local> {
        self.started
    }

    /// The class context for `class_name`, created on first use. The same
    /// object is returned for every later call with the same name.
    pub fn get_or_create_class(self: &Arc<Self>, class_name: &str) -> Arc<ClassContext> {
        let mut classes = self.classes.lock();
        if let Some(class) = classes.iter().find(|c| c.name() == class_name) {
            return Arc::clone(class);
        }
        let class = ClassContext::new(class_name, Arc::downgrade(self));
        classes.push(Arc::clone(&class));
        class
    }

    /// Snapshot of the owned class contexts, in creation order.
    pub fn read_class_contexts(&self) -> Vec<Arc<ClassContext>> {
        self.classes.lock().clone()
    }

    /// All method contexts of the run, grouped by class in creation order.
    pub fn read_method_contexts(&self) -> Vec<Arc<MethodContext>> {
        self.read_class_contexts()
            .iter()
            .flat_map(|class| class.read_method_contexts())
            .collect()
    }

    /// Method counts per status, for suite-level reporting.
    pub fn status_counts(&self) -> BTreeMap<Status, usize> {
        let mut counts = BTreeMap::new();
        for method in self.read_method_contexts() {
            *counts.entry(method.status()).or_insert(0) += 1;
        }
        counts
    }

    /// Flip the one-shot finalized flag. Returns `true` exactly once.
    pub(crate) fn mark_finalized(&self) -> bool {
        self.finalized
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized.load(Ordering::Acquire)
    }
}
