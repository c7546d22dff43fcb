//! The run hierarchy: suite → class → method → remote session.
//!
//! Nodes are shared via `Arc` and mutated through interior locks. Ownership
//! points downward (`ExecutionContext` owns classes, classes own methods);
//! upward links are `Weak`. Methods and sessions reference each other
//! many-to-many: a session may be reused across methods and a method may use
//! several sessions.

mod class;
mod execution;
mod method;
mod session;

pub use class::ClassContext;
pub use execution::ExecutionContext;
pub use method::{FailureCorridor, MethodContext, MethodType, Status};
pub use session::{EXCLUSIVE_PREFIX, NodeInfo, SessionContext, SessionRequest};
