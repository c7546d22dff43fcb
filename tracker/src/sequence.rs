//! Bounded-retry polling engine.
//!
//! [`Timer`] repeatedly runs a caller-supplied [`Sequence`] until it passes
//! or the configured duration elapses. "Ran to completion" and "counts as
//! pass" are decoupled: a task may finish without error yet report failure
//! through its pass state, which lets callers poll for conditions that
//! legitimately fail several times before becoming true. Unrecoverable
//! failures (resource exhaustion, invalid arguments) bail out immediately
//! instead of wasting the timeout budget.

use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use tracing::{debug, error, trace, warn};

use crate::context::MethodContext;

/// Hard floor for the poll interval. Callers below it are clamped upward to
/// avoid busy-looping.
pub const MIN_SLEEP_TIME: Duration = Duration::from_millis(50);
/// Hard floor for the maximum duration. Callers below it are clamped upward
/// to avoid premature timeouts.
pub const MIN_DURATION: Duration = Duration::from_millis(100);

/// Classified failure reported by one sequence attempt.
#[derive(Debug)]
pub enum SequenceFailure {
    /// Retried until the deadline; the last one becomes the timeout cause.
    Transient(anyhow::Error),
    /// Programmer error. Never retried, propagated immediately.
    Invalid(anyhow::Error),
    /// Resource exhaustion. Never retried, escalated as a system failure.
    Fatal(anyhow::Error),
}

impl SequenceFailure {
    pub fn transient(error: impl Into<anyhow::Error>) -> Self {
        SequenceFailure::Transient(error.into())
    }

    pub fn invalid(error: impl Into<anyhow::Error>) -> Self {
        SequenceFailure::Invalid(error.into())
    }

    pub fn fatal(error: impl Into<anyhow::Error>) -> Self {
        SequenceFailure::Fatal(error.into())
    }
}

/// A unit of work re-run on an interval until success or deadline.
///
/// The implementor owns the output slot; set it during a successful attempt
/// and hand it out through [`take_output`](Sequence::take_output).
pub trait Sequence {
    type Output;

    /// One attempt. An `Ok` return counts as success unless
    /// [`pass_state`](Sequence::pass_state) overrides it.
    fn run(&mut self) -> Result<(), SequenceFailure>;

    /// Explicit pass/fail override. `None` means "ran without failure counts
    /// as success".
    fn pass_state(&self) -> Option<bool> {
        None
    }

    /// Output produced by the most recent attempt, if any.
    fn take_output(&mut self) -> Option<Self::Output> {
        None
    }

    /// Return a packed result on timeout instead of raising it.
    fn skip_throwing(&self) -> bool {
        false
    }

    /// Attach the last observed failure to the calling thread's method
    /// context on timeout. Legacy behavior, off by default.
    fn add_failure_to_method_context(&self) -> bool {
        false
    }
}

/// Timeout raised when a sequence exhausts its duration.
///
/// Displays the caller-supplied message first when present (most specific
/// context outermost), then the configured duration and poll interval. The
/// last transient failure is the source.
#[derive(Debug)]
pub struct TimeoutError {
    duration: Duration,
    sleep_time: Duration,
    message: Option<String>,
    cause: Option<anyhow::Error>,
}

impl TimeoutError {
    pub fn duration(&self) -> Duration {
        self.duration
    }

    pub fn sleep_time(&self) -> Duration {
        self.sleep_time
    }

    /// The last transient failure observed before the deadline, if any.
    pub fn cause(&self) -> Option<&anyhow::Error> {
        self.cause.as_ref()
    }
}

impl fmt::Display for TimeoutError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(message) = &self.message {
            write!(f, "{message}: ")?;
        }
        write!(
            f,
            "sequence execution timed out after {} ms (polling every {} ms)",
            self.duration.as_millis(),
            self.sleep_time.as_millis()
        )
    }
}

impl StdError for TimeoutError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.cause
            .as_ref()
            .map(|err| err.as_ref() as &(dyn StdError + 'static))
    }
}

/// Failure of a sequence execution as a whole.
#[derive(Debug)]
pub enum SequenceError {
    /// The duration elapsed without a passing attempt.
    Timeout(TimeoutError),
    /// The task reported a programmer error; no retry happened.
    InvalidArgument(anyhow::Error),
    /// The task reported resource exhaustion; no retry happened.
    System(anyhow::Error),
}

impl fmt::Display for SequenceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SequenceError::Timeout(err) => err.fmt(f),
            SequenceError::InvalidArgument(err) => write!(f, "invalid argument: {err}"),
            SequenceError::System(err) => write!(f, "system failure: {err}"),
        }
    }
}

impl StdError for SequenceError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            SequenceError::Timeout(err) => Some(err),
            SequenceError::InvalidArgument(err) | SequenceError::System(err) => {
                Some(err.as_ref() as &(dyn StdError + 'static))
            }
        }
    }
}

/// Result of a sequence execution that did not raise.
///
/// Successful executions carry the output and no failure. Timed-out
/// executions are returned packed (instead of raised) when the task produced
/// output or opted out of throwing; they carry the timeout with the last
/// observed failure as its cause.
#[derive(Debug)]
pub struct PackedResponse<T> {
    response: Option<T>,
    successful: bool,
    timeout: Option<TimeoutError>,
}

impl<T> PackedResponse<T> {
    pub fn is_successful(&self) -> bool {
        self.successful
    }

    pub fn response(&self) -> Option<&T> {
        self.response.as_ref()
    }

    pub fn into_response(self) -> Option<T> {
        self.response
    }

    /// The last failure observed during polling, if any.
    pub fn failure(&self) -> Option<&anyhow::Error> {
        self.timeout.as_ref().and_then(TimeoutError::cause)
    }

    pub fn timeout(&self) -> Option<&TimeoutError> {
        self.timeout.as_ref()
    }
}

/// Cooperative cancellation for a detached sequence.
///
/// Cancelling stops the polling loop at the next iteration boundary; the
/// running attempt is never interrupted forcibly.
pub struct CancelHandle {
    token: Arc<AtomicBool>,
    thread: thread::JoinHandle<()>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.token.store(true, Ordering::Release);
    }

    pub fn is_finished(&self) -> bool {
        self.thread.is_finished()
    }

    /// Wait for the polling thread to end. Does not cancel by itself.
    pub fn join(self) {
        if self.thread.join().is_err() {
            warn!("detached sequence thread panicked");
        }
    }
}

/// Polling executor with a poll interval and a maximum duration.
///
/// Both timings are clamped upward to [`MIN_SLEEP_TIME`] and
/// [`MIN_DURATION`] with a warning, as a safety net against misconfigured
/// callers.
pub struct Timer {
    sleep_time: Duration,
    duration: Duration,
    error_message: Option<String>,
    method_context: Option<Arc<MethodContext>>,
}

impl Timer {
    pub fn new(sleep_time: Duration, duration: Duration) -> Self {
        if sleep_time > duration {
            error!(
                sleep_time_ms = sleep_time.as_millis() as u64,
                duration_ms = duration.as_millis() as u64,
                "sleep time greater than duration results in a single attempt"
            );
        }
        Self {
            sleep_time,
            duration,
            error_message: None,
            method_context: None,
        }
    }

    /// Human-readable context wrapped around a timeout, outermost.
    pub fn with_error_message(mut self, message: impl Into<String>) -> Self {
        self.error_message = Some(message.into());
        self
    }

    /// Method context receiving the last observed failure when a timed-out
    /// task asked for it (legacy opt-in).
    pub fn with_method_context(mut self, method_context: Arc<MethodContext>) -> Self {
        self.method_context = Some(method_context);
        self
    }

    pub fn sleep_time(&self) -> Duration {
        self.sleep_time
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    fn check_timer_values(&mut self) {
        if self.sleep_time < MIN_SLEEP_TIME {
            warn!(
                sleep_time_ms = self.sleep_time.as_millis() as u64,
                floor_ms = MIN_SLEEP_TIME.as_millis() as u64,
                "invalid timer sleep time, clamping to floor"
            );
            self.sleep_time = MIN_SLEEP_TIME;
        }
        if self.duration < MIN_DURATION {
            warn!(
                duration_ms = self.duration.as_millis() as u64,
                floor_ms = MIN_DURATION.as_millis() as u64,
                "invalid timer duration, clamping to floor"
            );
            self.duration = MIN_DURATION;
        }
    }

    /// Run `sequence` until it passes or the duration elapses.
    ///
    /// On success, returns the packed output with no stored failure. On
    /// exhaustion, returns a packed result when the task produced output or
    /// opted out of throwing, otherwise raises the timeout. Invalid-argument
    /// and resource-exhaustion failures propagate immediately, unretried.
    pub fn execute_sequence<S: Sequence>(
        &mut self,
        sequence: &mut S,
    ) -> Result<PackedResponse<S::Output>, SequenceError> {
        self.execute_with_token(sequence, None)
    }

    fn execute_with_token<S: Sequence>(
        &mut self,
        sequence: &mut S,
        token: Option<&AtomicBool>,
    ) -> Result<PackedResponse<S::Output>, SequenceError> {
        self.check_timer_values();
        let start = Instant::now();
        let mut caught: Option<anyhow::Error> = None;
        let mut run_count: u32 = 1;

        while start.elapsed() <= self.duration {
            if let Some(token) = token {
                if token.load(Ordering::Acquire) {
                    debug!("sequence cancelled, stopping poll loop");
                    break;
                }
            }

            trace!(run_count, "starting sequence iteration");
            let success = match sequence.run() {
                Ok(()) => match sequence.pass_state() {
                    None => {
                        trace!(run_count, "iteration successful without pass state");
                        true
                    }
                    Some(pass) => {
                        trace!(run_count, pass, "iteration finished with pass state");
                        pass
                    }
                },
                Err(SequenceFailure::Fatal(err)) => {
                    return Err(SequenceError::System(err));
                }
                Err(SequenceFailure::Invalid(err)) => {
                    // Jump out immediately, never retried.
                    return Err(SequenceError::InvalidArgument(err));
                }
                Err(SequenceFailure::Transient(err)) => {
                    debug!(run_count, error = %err, "sequence iteration failed");
                    caught = Some(err);
                    false
                }
            };
            run_count += 1;

            if success {
                return Ok(PackedResponse {
                    response: sequence.take_output(),
                    successful: true,
                    timeout: None,
                });
            }

            thread::sleep(self.sleep_time);
        }

        if sequence.add_failure_to_method_context() {
            if let (Some(method), Some(err)) = (&self.method_context, &caught) {
                method.add_error(anyhow::anyhow!("{err:#}"));
            }
        }

        let timeout = TimeoutError {
            duration: self.duration,
            sleep_time: self.sleep_time,
            message: self.error_message.clone(),
            cause: caught,
        };

        let response = sequence.take_output();
        if response.is_some() || sequence.skip_throwing() {
            return Ok(PackedResponse {
                response,
                successful: false,
                timeout: Some(timeout),
            });
        }

        Err(SequenceError::Timeout(timeout))
    }

    /// Run the sequence on a separate thread, without blocking the caller.
    ///
    /// A resulting timeout is logged instead of propagated. The returned
    /// handle cancels cooperatively: the loop stops at the next iteration
    /// boundary after [`CancelHandle::cancel`].
    pub fn execute_sequence_detached<S>(mut self, mut sequence: S) -> Result<CancelHandle>
    where
        S: Sequence + Send + 'static,
    {
        let token = Arc::new(AtomicBool::new(false));
        let thread_token = Arc::clone(&token);
        let thread = thread::Builder::new()
            .name("timer-sequence".to_string())
            .spawn(move || {
                match self.execute_with_token(&mut sequence, Some(&thread_token)) {
                    Ok(_) => {}
                    Err(SequenceError::Timeout(err)) => {
                        warn!(error = %err, "timeout in detached sequence");
                    }
                    Err(err) => {
                        warn!(error = %err, "detached sequence failed");
                    }
                }
            })
            .context("spawn sequence thread")?;

        Ok(CancelHandle { token, thread })
    }
}

impl fmt::Display for Timer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Timer{{duration={} ms, sleep_time={} ms}}",
            self.duration.as_millis(),
            self.sleep_time.as_millis()
        )
    }
}
