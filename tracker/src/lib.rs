//! Live state tracking for a running test suite.
//!
//! This crate keeps the run hierarchy of a test execution — suite → class →
//! method → remote session — while parallel worker threads mutate it, and
//! provides a bounded-retry polling engine for awaiting asynchronous
//! conditions within a deadline. The architecture separates:
//!
//! - **[`context`]**: the concurrent context tree. Nodes are shared via `Arc`,
//!   mutated through interior locks, and identified by a stable run index.
//! - **[`sequence`]**: the `Timer` polling engine. Re-runs a caller-supplied
//!   task until it passes or the deadline elapses, with a hard floor on poll
//!   interval and duration and a fatal-vs-retryable failure taxonomy.
//! - **[`events`]**: synchronous publish/subscribe that broadcasts context
//!   mutations and the one-shot suite finalization to report listeners.
//! - **[`evidence`]**: pluggable screenshot/video/source collector registries
//!   the core calls into on failures; their logic stays external.
//!
//! The [`controller`] module owns the wiring: it receives test-runner
//! callbacks, allocates run indices, and fires finalization exactly once.

pub mod config;
pub mod context;
pub mod controller;
pub mod counter;
pub mod events;
pub mod evidence;
pub mod format;
pub mod logging;
pub mod report;
pub mod sequence;
pub mod steps;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
