//! Execution context backends built on a [`Registry`] of named jobs.
//!
//! - [`ThreadContext`] runs each job on its own freshly spawned OS thread.
//! - [`TokioContext`] runs each job on Tokio's blocking pool (requires the
//!   `async-tokio` feature).
//!
//! Both catch panics raised by a job and report them as a [`ContextError`],
//! so a misbehaving job only ever fails its own task.

mod thread;
#[cfg(feature = "async-tokio")]
mod tokio;

pub use self::thread::*;
#[cfg(feature = "async-tokio")]
pub use self::tokio::*;

use crate::{ContextError, ErrorHandler, Message, Registry, SuccessHandler};
use core::any::Any;
#[cfg(feature = "async-tokio")]
use parking_lot::Mutex;
use std::panic::{AssertUnwindSafe, catch_unwind};
#[cfg(feature = "async-tokio")]
use std::sync::Arc;

/// The handlers registered on a context, shared with the code running the
/// job. Taking them out guarantees at most one emission.
pub(crate) struct Outlet<R> {
    on_success: Option<SuccessHandler<R>>,
    on_error: Option<ErrorHandler>,
}

impl<R> Outlet<R> {
    pub(crate) const fn new() -> Self {
        Self {
            on_success: None,
            on_error: None,
        }
    }

    pub(crate) fn set_success(&mut self, handler: SuccessHandler<R>) {
        self.on_success = Some(handler);
    }

    pub(crate) fn set_error(&mut self, handler: ErrorHandler) {
        self.on_error = Some(handler);
    }

    /// Moves the handlers out, leaving this outlet empty.
    pub(crate) fn take(&mut self) -> Self {
        Self {
            on_success: self.on_success.take(),
            on_error: self.on_error.take(),
        }
    }

    /// Invokes the handler matching `result`. Missing handlers are skipped.
    pub(crate) fn emit(self, result: Result<R, ContextError>) {
        match result {
            Ok(value) => {
                if let Some(handler) = self.on_success {
                    handler(value);
                }
            }
            Err(error) => {
                if let Some(handler) = self.on_error {
                    handler(error);
                }
            }
        }
    }
}

/// Emission rights for a job moved onto another executor.
///
/// If the job is dropped before it reports, for instance because the
/// executor shut down and discarded it, the guard fails the task so its slot
/// is still released.
#[cfg(feature = "async-tokio")]
pub(crate) struct Emitter<R> {
    outlet: Arc<Mutex<Outlet<R>>>,
    source: String,
}

#[cfg(feature = "async-tokio")]
impl<R> Emitter<R> {
    pub(crate) fn new(outlet: Arc<Mutex<Outlet<R>>>, source: String) -> Self {
        Self { outlet, source }
    }

    pub(crate) fn source(&self) -> &str {
        &self.source
    }

    /// Reports `result` through whichever handler is still registered.
    pub(crate) fn emit(self, result: Result<R, ContextError>) {
        let handlers = self.outlet.lock().take();
        handlers.emit(result);
    }
}

#[cfg(feature = "async-tokio")]
impl<R> Drop for Emitter<R> {
    fn drop(&mut self) {
        // Empty after `emit` or `terminate`.
        let handlers = self.outlet.lock().take();
        handlers.emit(Err(ContextError::new(
            "context cancelled before running",
            0,
            self.source.as_str(),
        )));
    }
}

/// Runs the job named by `message`, turning a panic into a [`ContextError`]
/// attributed to `source`.
pub(crate) fn run_guarded<P, R>(
    registry: &Registry<P, R>,
    message: Message<P>,
    source: &str,
) -> Result<R, ContextError> {
    catch_unwind(AssertUnwindSafe(|| registry.run(message)))
        .unwrap_or_else(|panic| Err(ContextError::new(panic_text(&*panic), 0, source)))
}

fn panic_text(panic: &(dyn Any + Send)) -> String {
    if let Some(text) = panic.downcast_ref::<&str>() {
        format!("job panicked: {text}")
    } else if let Some(text) = panic.downcast_ref::<String>() {
        format!("job panicked: {text}")
    } else {
        "job panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn emit_routes_to_one_handler() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let (ok, err) = (log.clone(), log.clone());
        let mut outlet = Outlet::<u8>::new();
        outlet.set_success(Box::new(move |v| ok.lock().unwrap().push(format!("ok {v}"))));
        outlet.set_error(Box::new(move |e| err.lock().unwrap().push(format!("err {}", e.text))));

        outlet.take().emit(Ok(3));
        // Handlers are gone after the first emission.
        outlet.take().emit(Err(ContextError::new("late", 0, "test")));

        assert_eq!(*log.lock().unwrap(), vec!["ok 3".to_string()]);
    }

    #[cfg(feature = "async-tokio")]
    #[test]
    fn dropped_emitter_fails_the_task_once() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let outlet = Arc::new(parking_lot::Mutex::new(Outlet::<u8>::new()));
        let err = log.clone();
        outlet
            .lock()
            .set_error(Box::new(move |e| err.lock().unwrap().push(e.to_string())));

        drop(Emitter::new(outlet.clone(), "lost-job".to_string()));
        drop(Emitter::new(outlet, "lost-job".to_string()));

        assert_eq!(
            *log.lock().unwrap(),
            vec!["context cancelled before running\nerror in worker at line 0 in lost-job".to_string()]
        );
    }

    #[cfg(feature = "async-tokio")]
    #[test]
    fn emitted_result_suppresses_cancellation() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let outlet = Arc::new(parking_lot::Mutex::new(Outlet::<u8>::new()));
        let (ok, err) = (log.clone(), log.clone());
        {
            let mut outlet = outlet.lock();
            outlet.set_success(Box::new(move |v| ok.lock().unwrap().push(format!("ok {v}"))));
            outlet.set_error(Box::new(move |e| err.lock().unwrap().push(e.text)));
        }

        Emitter::new(outlet, "job".to_string()).emit(Ok(7));

        assert_eq!(*log.lock().unwrap(), vec!["ok 7".to_string()]);
    }

    #[test]
    fn panics_become_context_errors() {
        let registry = Registry::new().with("explode", |_: ()| -> Result<(), ContextError> {
            panic!("kaboom")
        });
        let err = run_guarded(
            &registry,
            Message {
                identifier: "explode".into(),
                payload: (),
            },
            "unit-test",
        )
        .unwrap_err();

        assert_eq!(err.text, "job panicked: kaboom");
        assert_eq!(err.line, 0);
        assert_eq!(err.source, "unit-test");
    }
}
