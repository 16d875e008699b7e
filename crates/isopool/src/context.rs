//! The contract between a worker slot and the isolated runner it drives.
//!
//! An [`ExecutionContext`] is a single-use runner: it accepts exactly one
//! [`Message`], eventually invokes exactly one of its two registered handlers,
//! and is then terminated by its owner. Contexts are produced on demand by a
//! [`ContextFactory`]; any `Fn() -> C` closure is a factory.
//!
//! Handlers are `Send` so a context may invoke them from whichever thread (or
//! task) ran the work. They never touch pool state directly; the handlers a
//! slot registers only post a completion message back to the coordinator.

use core::fmt;

/// The message delivered to an execution context: the name of the job to run
/// and its input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message<P> {
    /// Name of the job the context should run.
    pub identifier: String,
    /// Input for the job, moved across the isolation boundary.
    pub payload: P,
}

/// Error reported by an execution context.
///
/// Mirrors what an isolated runner can tell its owner about a failure: the
/// error text plus the line and source location it originated from. The
/// [`fmt::Display`] implementation renders the diagnostic handed to a task's
/// failure handler:
///
/// ```text
/// <text>
/// error in worker at line <line> in <source>
/// ```
///
/// # Example
///
/// ```
/// use isopool::ContextError;
///
/// let err = ContextError::new("boom", 12, "f.js");
/// assert_eq!(err.to_string(), "boom\nerror in worker at line 12 in f.js");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextError {
    /// Error text.
    pub text: String,
    /// Line the error was raised at, or `0` when unknown.
    pub line: u32,
    /// Source location (file, script or thread name) the error came from.
    pub source: String,
}

impl ContextError {
    /// Builds a context error from its parts.
    pub fn new(text: impl Into<String>, line: u32, source: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            line,
            source: source.into(),
        }
    }
}

impl fmt::Display for ContextError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}\nerror in worker at line {} in {}",
            self.text, self.line, self.source
        )
    }
}

impl core::error::Error for ContextError {}

/// Builds a [`ContextError`] located at the macro's call site.
///
/// Accepts the same arguments as [`format!`].
///
/// ```
/// let err = isopool::context_error!("bad input: {}", 7);
/// assert_eq!(err.text, "bad input: 7");
/// assert!(err.line > 0);
/// ```
#[macro_export]
macro_rules! context_error {
    ($($arg:tt)*) => {
        $crate::ContextError::new(::std::format!($($arg)*), ::core::line!(), ::core::file!())
    };
}

/// Handler invoked with the job's result when a context succeeds.
pub type SuccessHandler<R> = Box<dyn FnOnce(R) + Send + 'static>;

/// Handler invoked with the reported error when a context fails.
pub type ErrorHandler = Box<dyn FnOnce(ContextError) + Send + 'static>;

/// An isolated, single-use runner for one job.
///
/// The owning slot registers both handlers, sends one message and later
/// terminates the context once a handler has fired. Implementations must
/// invoke at most one handler, at most once; a second emission is ignored by
/// the pool.
pub trait ExecutionContext<P, R> {
    /// Registers the handler to invoke with the job's result.
    fn on_success(&mut self, handler: SuccessHandler<R>);

    /// Registers the handler to invoke when the job fails.
    fn on_error(&mut self, handler: ErrorHandler);

    /// Starts the job described by `message`. Must not block on the job.
    fn send(&mut self, message: Message<P>);

    /// Tears the context down. It is never reused afterwards.
    fn terminate(&mut self);
}

/// Produces a fresh [`ExecutionContext`] for every assignment.
pub trait ContextFactory<P, R> {
    /// The context type this factory builds.
    type Context: ExecutionContext<P, R>;

    /// Builds a new, unstarted context.
    fn spawn(&self) -> Self::Context;
}

impl<P, R, C, F> ContextFactory<P, R> for F
where
    F: Fn() -> C,
    C: ExecutionContext<P, R>,
{
    type Context = C;

    fn spawn(&self) -> C {
        self()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn diagnostic_contains_text_line_and_source() {
        let msg = ContextError::new("boom", 12, "f.js").to_string();
        assert!(msg.contains("boom"));
        assert!(msg.contains("12"));
        assert!(msg.contains("f.js"));
        assert_eq!(msg, "boom\nerror in worker at line 12 in f.js");
    }

    #[test]
    fn macro_captures_call_site() {
        let expected_line = line!() + 1;
        let err = context_error!("value {} out of range", 42);
        assert_eq!(err.text, "value 42 out of range");
        assert_eq!(err.line, expected_line);
        assert_eq!(err.source, file!());
    }
}
