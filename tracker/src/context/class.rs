//! Class-level context: owns the method contexts of one test class.

use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::context::execution::ExecutionContext;
use crate::context::method::{MethodContext, MethodType};
use crate::counter::SequenceCounter;

pub struct ClassContext {
    name: String,
    parent: Weak<ExecutionContext>,
    methods: Mutex<Vec<Arc<MethodContext>>>,
}

impl ClassContext {
    pub(crate) fn new(name: impl Into<String>, parent: Weak<ExecutionContext>) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            parent,
            methods: Mutex::new(Vec::new()),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn execution_context(&self) -> Option<Arc<ExecutionContext>> {
        self.parent.upgrade()
    }

    /// Create a method context for one execution of `name` in this class.
    ///
    /// Allocates the run index from `counter` and captures the calling
    /// thread's identity. Never fails.
    pub fn create_method_context(
        self: &Arc<Self>,
        name: &str,
        method_type: MethodType,
        counter: &SequenceCounter,
    ) -> Arc<MethodContext> {
        let method = MethodContext::new(name, method_type, Arc::downgrade(self), counter);
        self.methods.lock().push(Arc::clone(&method));
        method
    }

    /// Snapshot of the owned method contexts, in creation order.
    pub fn read_method_contexts(&self) -> Vec<Arc<MethodContext>> {
        self.methods.lock().clone()
    }
}
