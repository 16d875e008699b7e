use super::{Outlet, run_guarded};
use crate::{ContextError, ErrorHandler, ExecutionContext, Message, Registry, SuccessHandler};
use parking_lot::Mutex;
use std::sync::Arc;
use std::thread;

/// Execution context that runs its job on a dedicated OS thread.
///
/// Every [`ExecutionContext::send`] spawns one thread named
/// `isopool-<identifier>`, which runs the registry job and reports through
/// the registered handlers. [`ExecutionContext::terminate`] detaches the
/// thread and drops any handler it still holds; an OS thread cannot be
/// killed, so a job that is still running is left to finish and its result
/// is discarded.
pub struct ThreadContext<P, R> {
    registry: Arc<Registry<P, R>>,
    outlet: Arc<Mutex<Outlet<R>>>,
    handle: Option<thread::JoinHandle<()>>,
}

impl<P, R> ThreadContext<P, R> {
    /// Creates an unstarted context running jobs from `registry`.
    pub fn new(registry: Arc<Registry<P, R>>) -> Self {
        Self {
            registry,
            outlet: Arc::new(Mutex::new(Outlet::new())),
            handle: None,
        }
    }

    /// Returns a factory building one [`ThreadContext`] per call, all sharing
    /// `registry`.
    pub fn factory(registry: Registry<P, R>) -> impl Fn() -> Self {
        let registry = Arc::new(registry);
        move || Self::new(Arc::clone(&registry))
    }
}

impl<P, R> ExecutionContext<P, R> for ThreadContext<P, R>
where
    P: Send + 'static,
    R: Send + 'static,
{
    fn on_success(&mut self, handler: SuccessHandler<R>) {
        self.outlet.lock().set_success(handler);
    }

    fn on_error(&mut self, handler: ErrorHandler) {
        self.outlet.lock().set_error(handler);
    }

    fn send(&mut self, message: Message<P>) {
        let name = thread_name(&message.identifier);
        let source = name.clone();
        let registry = Arc::clone(&self.registry);
        let outlet = Arc::clone(&self.outlet);

        let spawned = thread::Builder::new().name(name).spawn(move || {
            let result = run_guarded(&registry, message, &source);
            let handlers = outlet.lock().take();
            handlers.emit(result);
        });

        match spawned {
            Ok(handle) => self.handle = Some(handle),
            Err(_e) => {
                #[cfg(feature = "tracing")]
                tracing::error!("Failed to spawn worker thread: {_e}");
                let handlers = self.outlet.lock().take();
                handlers.emit(Err(ContextError::new(
                    "failed to spawn worker thread",
                    0,
                    "isopool",
                )));
            }
        }
    }

    fn terminate(&mut self) {
        drop(self.outlet.lock().take());
        // Detach; the job has already reported by the time the pool
        // terminates a context.
        self.handle.take();
    }
}

/// Thread names cannot carry NUL bytes, so those are escaped.
fn thread_name(identifier: &str) -> String {
    format!("isopool-{}", identifier.replace('\0', "\\0"))
}
