use crate::Message;
use core::fmt;

/// Callback invoked with a task's result.
pub type SuccessCallback<R> = Box<dyn FnOnce(R) + 'static>;

/// Callback invoked with a task's failure diagnostic.
pub type FailureCallback = Box<dyn FnOnce(String) + 'static>;

/// One unit of work plus its two completion handlers.
///
/// A task is immutable once built and is owned by exactly one place at a
/// time: the pool's pending queue, or the slot executing it. Its handlers run
/// on the coordinator thread, so they need not be `Send`.
///
/// A task without an identifier is accepted by [`crate::Pool::submit`] but is
/// never executed, and neither handler fires.
///
/// # Example
///
/// ```
/// use isopool::Task;
///
/// let task = Task::new(
///     "square",
///     7_u64,
///     |n: u64| println!("got {n}"),
///     |err| eprintln!("{err}"),
/// );
/// assert_eq!(task.identifier(), Some("square"));
/// assert_eq!(*task.payload(), 7);
/// ```
pub struct Task<P, R> {
    identifier: Option<String>,
    payload: P,
    handlers: TaskHandlers<R>,
}

impl<P, R> Task<P, R> {
    /// Builds a task that runs the job named `identifier` on `payload`.
    pub fn new(
        identifier: impl Into<String>,
        payload: P,
        on_success: impl FnOnce(R) + 'static,
        on_failure: impl FnOnce(String) + 'static,
    ) -> Self {
        Self {
            identifier: Some(identifier.into()),
            payload,
            handlers: TaskHandlers::new(on_success, on_failure),
        }
    }

    /// Builds a task without an identifier. Such a task is never dispatched.
    pub fn anonymous(
        payload: P,
        on_success: impl FnOnce(R) + 'static,
        on_failure: impl FnOnce(String) + 'static,
    ) -> Self {
        Self {
            identifier: None,
            payload,
            handlers: TaskHandlers::new(on_success, on_failure),
        }
    }

    /// Name of the job to run, or `None` for a task that will be discarded.
    pub fn identifier(&self) -> Option<&str> {
        self.identifier.as_deref()
    }

    /// Input handed to the execution context.
    pub fn payload(&self) -> &P {
        &self.payload
    }

    /// Splits the task into the message for its context and the handlers the
    /// slot keeps. Returns `None` when the task has no identifier.
    pub(crate) fn into_job(self) -> Option<Job<P, R>> {
        let identifier = self.identifier?;
        Some(Job {
            message: Message {
                identifier,
                payload: self.payload,
            },
            handlers: self.handlers,
        })
    }
}

impl<P: fmt::Debug, R> fmt::Debug for Task<P, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("identifier", &self.identifier)
            .field("payload", &self.payload)
            .finish_non_exhaustive()
    }
}

/// The pair of handlers belonging to a task.
///
/// Both resolution methods consume `self`, so exactly one handler can fire,
/// exactly once.
pub(crate) struct TaskHandlers<R> {
    on_success: SuccessCallback<R>,
    on_failure: FailureCallback,
}

impl<R> TaskHandlers<R> {
    fn new(
        on_success: impl FnOnce(R) + 'static,
        on_failure: impl FnOnce(String) + 'static,
    ) -> Self {
        Self {
            on_success: Box::new(on_success),
            on_failure: Box::new(on_failure),
        }
    }

    pub(crate) fn succeed(self, result: R) {
        (self.on_success)(result);
    }

    pub(crate) fn fail(self, diagnostic: String) {
        (self.on_failure)(diagnostic);
    }
}

/// A validated task: it has an identifier and is ready to be assigned.
pub(crate) struct Job<P, R> {
    pub(crate) message: Message<P>,
    pub(crate) handlers: TaskHandlers<R>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn anonymous_task_yields_no_job() {
        let fired = Rc::new(RefCell::new(false));
        let (a, b) = (fired.clone(), fired.clone());
        let task: Task<u8, u8> = Task::anonymous(
            1,
            move |_| *a.borrow_mut() = true,
            move |_| *b.borrow_mut() = true,
        );
        assert_eq!(task.identifier(), None);
        assert!(task.into_job().is_none());
        assert!(!*fired.borrow());
    }

    #[test]
    fn job_carries_identifier_and_payload() {
        let task: Task<Vec<u8>, ()> = Task::new("sum", vec![1, 2, 3], |_| {}, |_| {});
        let job = task.into_job().unwrap();
        assert_eq!(job.message.identifier, "sum");
        assert_eq!(job.message.payload, vec![1, 2, 3]);
    }

    #[test]
    fn handlers_route_to_matching_callback() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let (ok, err) = (log.clone(), log.clone());
        let handlers = TaskHandlers::new(
            move |n: u32| ok.borrow_mut().push(format!("ok {n}")),
            move |msg| err.borrow_mut().push(format!("err {msg}")),
        );
        handlers.fail("nope".to_string());
        assert_eq!(*log.borrow(), vec!["err nope".to_string()]);
    }
}
