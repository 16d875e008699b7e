use super::{Emitter, Outlet, run_guarded};
use crate::{ErrorHandler, ExecutionContext, Message, Registry, SuccessHandler};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

/// Execution context that runs its job on Tokio's blocking thread pool.
///
/// The runtime is captured as a [`Handle`] when the factory is built, so the
/// coordinator itself does not need to run inside that runtime.
/// [`ExecutionContext::terminate`] aborts the task handle; a blocking job that
/// has already started runs to completion and its result is discarded.
pub struct TokioContext<P, R> {
    registry: Arc<Registry<P, R>>,
    runtime: Handle,
    outlet: Arc<Mutex<Outlet<R>>>,
    task: Option<JoinHandle<()>>,
}

impl<P, R> TokioContext<P, R> {
    /// Creates an unstarted context running jobs from `registry`.
    pub fn new(registry: Arc<Registry<P, R>>, runtime: Handle) -> Self {
        Self {
            registry,
            runtime,
            outlet: Arc::new(Mutex::new(Outlet::new())),
            task: None,
        }
    }

    /// Returns a factory building one [`TokioContext`] per call on `runtime`.
    pub fn factory(registry: Registry<P, R>, runtime: Handle) -> impl Fn() -> Self {
        let registry = Arc::new(registry);
        move || Self::new(Arc::clone(&registry), runtime.clone())
    }
}

impl<P, R> ExecutionContext<P, R> for TokioContext<P, R>
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
        let source = format!("tokio-blocking:{}", message.identifier);
        let registry = Arc::clone(&self.registry);
        let emitter = Emitter::new(Arc::clone(&self.outlet), source);

        // A runtime that has shut down drops the closure unrun; the emitter
        // then fails the task.
        self.task = Some(self.runtime.spawn_blocking(move || {
            let result = run_guarded(&registry, message, emitter.source());
            emitter.emit(result);
        }));
    }

    fn terminate(&mut self) {
        drop(self.outlet.lock().take());
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Dispatch, Pool, Task, context_error};
    use std::cell::RefCell;
    use std::rc::Rc;

    #[tokio::test(flavor = "current_thread")]
    async fn drains_on_a_single_threaded_host() {
        let registry = Registry::new()
            .with("len", |s: String| Ok(s.len()))
            .with("reject", |s: String| Err(context_error!("rejected {s}")));
        let mut pool: Pool<String, usize, _> =
            Pool::new(2, TokioContext::factory(registry, Handle::current())).unwrap();
        pool.init().unwrap();

        let log = Rc::new(RefCell::new(Vec::new()));
        for (identifier, input) in [("len", "a"), ("len", "abcd"), ("reject", "x"), ("len", "")] {
            let (ok, err) = (log.clone(), log.clone());
            pool.submit(Task::new(
                identifier,
                input.to_string(),
                move |n| ok.borrow_mut().push(format!("{input}={n}")),
                move |msg| err.borrow_mut().push(msg),
            ))
            .unwrap();
        }
        assert_eq!(pool.pending_count(), 2);

        assert_eq!(pool.drain().await, 4);

        let mut log = log.borrow().clone();
        log.sort();
        assert_eq!(log.len(), 4);
        assert_eq!(&log[..3], &["=0", "a=1", "abcd=4"]);
        assert!(log[3].starts_with("rejected x\nerror in worker at line "));
        assert_eq!(pool.stats().idle, 2);
    }

    #[test]
    fn shut_down_runtime_fails_the_task() {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .build()
            .unwrap();
        let handle = runtime.handle().clone();
        drop(runtime);

        let registry = Registry::new().with("id", |n: u8| Ok(n));
        let mut pool: Pool<u8, u8, _> = Pool::new(1, TokioContext::factory(registry, handle)).unwrap();
        pool.init().unwrap();

        let failures = Rc::new(RefCell::new(Vec::new()));
        let sink = failures.clone();
        pool.submit(Task::new(
            "id",
            1,
            |v| panic!("unexpected success: {v}"),
            move |msg| sink.borrow_mut().push(msg),
        ))
        .unwrap();

        assert_eq!(pool.blocking_drain(), 1);
        assert_eq!(
            *failures.borrow(),
            vec!["context cancelled before running\nerror in worker at line 0 in tokio-blocking:id".to_string()]
        );
        assert_eq!(pool.idle_count(), 1);
        assert_eq!(pool.stats().failed, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn pump_one_processes_a_single_completion() {
        let registry = Registry::new().with("id", |n: u8| Ok(n));
        let mut pool: Pool<u8, u8, _> =
            Pool::new(1, TokioContext::factory(registry, Handle::current())).unwrap();
        pool.init().unwrap();

        assert!(!pool.pump_one().await);

        let first = pool.submit(Task::new("id", 1, |_| {}, |_| {})).unwrap();
        let second = pool.submit(Task::new("id", 2, |_| {}, |_| {})).unwrap();
        assert!(matches!(first, Dispatch::Started(_)));
        assert_eq!(second, Dispatch::Queued { position: 0 });

        assert!(pool.pump_one().await);
        assert_eq!(pool.pending_count(), 0);
        assert_eq!(pool.busy_count(), 1);

        assert!(pool.pump_one().await);
        assert_eq!(pool.idle_count(), 1);
        assert!(!pool.pump_one().await);
    }
}
