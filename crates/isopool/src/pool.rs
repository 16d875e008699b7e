//! Fixed-capacity pool that matches idle slots to pending tasks.
//!
//! The [`Pool`] owns `N` [`WorkerSlot`]s, an idle collection and an unbounded
//! FIFO of pending work. It is driven from a single coordinator thread:
//!
//! - [`Pool::submit`] hands a task to an idle slot (the slot starts a fresh
//!   execution context and returns immediately) or queues it.
//! - Contexts report back by message; the host drains those reports with
//!   [`Pool::try_pump`], [`Pool::drain`] or [`Pool::blocking_drain`]. Each
//!   report fires the task's handler and releases the slot, which is handed
//!   straight to the oldest pending task or returned to the idle collection.
//!
//! Every mutating operation takes `&mut self` and task handlers never receive
//! the pool, so the coordinator cannot be re-entered. No locks are involved.
//!
//! [`WorkerSlot`]: crate::slot::WorkerSlot

use crate::{
    ContextFactory, Dispatch, Error, ExecutionContext, PoolStats, Result, SlotId, SlotStatus, Task,
    slot::{Completion, CompletionReceiver, CompletionSender, Outcome, WorkerSlot},
    task::Job,
};
use core::fmt;
use std::collections::VecDeque;
use std::panic::{AssertUnwindSafe, catch_unwind, resume_unwind};
use tokio::sync::mpsc;

/// A fixed set of recyclable worker slots fed from a FIFO queue.
///
/// `P` is the payload type sent to each context and `R` the result type it
/// reports. `F` builds one fresh context per assignment.
///
/// # Example
///
/// ```
/// use isopool::{ErrorHandler, ExecutionContext, Message, Pool, SuccessHandler, Task};
/// use std::{cell::Cell, rc::Rc};
///
/// /// Completes synchronously with the payload doubled.
/// #[derive(Default)]
/// struct Doubler {
///     on_success: Option<SuccessHandler<u32>>,
/// }
///
/// impl ExecutionContext<u32, u32> for Doubler {
///     fn on_success(&mut self, handler: SuccessHandler<u32>) {
///         self.on_success = Some(handler);
///     }
///     fn on_error(&mut self, _handler: ErrorHandler) {}
///     fn send(&mut self, message: Message<u32>) {
///         if let Some(handler) = self.on_success.take() {
///             handler(message.payload * 2);
///         }
///     }
///     fn terminate(&mut self) {}
/// }
///
/// let mut pool: Pool<u32, u32, _> = Pool::new(2, Doubler::default).unwrap();
/// pool.init().unwrap();
///
/// let seen = Rc::new(Cell::new(0_u32));
/// let sink = seen.clone();
/// pool.submit(Task::new("double", 21, move |n| sink.set(n), |_| {})).unwrap();
///
/// assert_eq!(pool.try_pump(), 1);
/// assert_eq!(seen.get(), 42);
/// assert_eq!(pool.stats().idle, 2);
/// ```
pub struct Pool<P, R, F>
where
    F: ContextFactory<P, R>,
{
    capacity: usize,
    factory: F,
    slots: Vec<WorkerSlot<F::Context, R>>,
    idle: VecDeque<SlotId>,
    pending: VecDeque<Job<P, R>>,
    completions_tx: CompletionSender<R>,
    completions_rx: CompletionReceiver<R>,
    completed: u64,
    failed: u64,
    discarded: u64,
}

impl<P, R, F> Pool<P, R, F>
where
    F: ContextFactory<P, R>,
    R: Send + 'static,
{
    /// Constructs a pool of `capacity` slots. No slot exists until
    /// [`Pool::init`] is called.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidCapacity`] if `capacity` is zero.
    pub fn new(capacity: usize, factory: F) -> Result<Self> {
        if capacity == 0 {
            return Err(Error::InvalidCapacity);
        }

        let (completions_tx, completions_rx) = mpsc::unbounded_channel();

        Ok(Self {
            capacity,
            factory,
            slots: Vec::with_capacity(capacity),
            idle: VecDeque::with_capacity(capacity),
            pending: VecDeque::new(),
            completions_tx,
            completions_rx,
            completed: 0,
            failed: 0,
            discarded: 0,
        })
    }

    /// Creates the pool's slots, all idle. No context is spawned here;
    /// contexts are created lazily, one per assignment.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AlreadyInitialized`] on a second call.
    #[cfg_attr(feature = "tracing", tracing::instrument(name = "pool_init", skip_all, fields(capacity = self.capacity)))]
    pub fn init(&mut self) -> Result<()> {
        if self.is_initialized() {
            return Err(Error::AlreadyInitialized);
        }

        for index in 0..self.capacity {
            let id = SlotId::new(index);
            self.slots.push(WorkerSlot::new(id, self.completions_tx.clone()));
            self.idle.push_back(id);
        }

        #[cfg(feature = "tracing")]
        tracing::info!("Pool initialized with {} idle slots", self.capacity);

        Ok(())
    }

    /// Dispatches `task` to an idle slot, or queues it behind earlier
    /// pending tasks when every slot is busy.
    ///
    /// Dispatch is synchronous; execution is not. The task's outcome is only
    /// observable through its handlers once the host drains completions.
    ///
    /// A task without an identifier is dropped: neither handler fires and
    /// [`Dispatch::Discarded`] is returned.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotInitialized`] if [`Pool::init`] has not been
    /// called. The task is dropped without firing a handler.
    pub fn submit(&mut self, task: Task<P, R>) -> Result<Dispatch> {
        if !self.is_initialized() {
            #[cfg(feature = "tracing")]
            tracing::warn!("Task submitted before pool initialization");
            return Err(Error::NotInitialized);
        }

        let Some(job) = task.into_job() else {
            self.discarded += 1;
            #[cfg(feature = "tracing")]
            tracing::warn!("Discarding task without identifier");
            return Ok(Dispatch::Discarded);
        };

        match self.idle.pop_front() {
            Some(slot) => {
                #[cfg(feature = "tracing")]
                tracing::debug!(slot = %slot, identifier = %job.message.identifier, "Dispatching task");
                self.assign(slot, job);
                Ok(Dispatch::Started(slot))
            }
            None => {
                let position = self.pending.len();
                #[cfg(feature = "tracing")]
                tracing::debug!(position, identifier = %job.message.identifier, "All slots busy, queueing task");
                self.pending.push_back(job);
                Ok(Dispatch::Queued { position })
            }
        }
    }

    /// Processes every completion already delivered, without blocking.
    ///
    /// Returns the number of tasks whose handler fired. A panic raised by a
    /// handler propagates to the caller after the task's slot has been
    /// released; the pool stays usable.
    pub fn try_pump(&mut self) -> usize {
        let mut processed = 0;
        while let Ok(completion) = self.completions_rx.try_recv() {
            if self.complete(completion) {
                processed += 1;
            }
        }
        processed
    }

    /// Waits for the next completion and processes it.
    ///
    /// Returns `false` immediately when no slot is busy, since nothing can
    /// complete.
    pub async fn pump_one(&mut self) -> bool {
        while self.busy_count() > 0 {
            let Some(completion) = self.completions_rx.recv().await else {
                return false;
            };
            if self.complete(completion) {
                return true;
            }
        }
        false
    }

    /// Processes completions until no slot is busy and nothing is pending.
    ///
    /// Returns the number of tasks whose handler fired. Runs on any executor,
    /// including a current-thread runtime.
    pub async fn drain(&mut self) -> usize {
        let mut processed = self.try_pump();
        while self.pump_one().await {
            processed += 1;
        }
        processed
    }

    /// Blocking variant of [`Pool::drain`] for hosts without an async
    /// runtime.
    ///
    /// # Panics
    ///
    /// Panics if called from within an asynchronous execution context.
    pub fn blocking_drain(&mut self) -> usize {
        let mut processed = self.try_pump();
        while self.busy_count() > 0 {
            let Some(completion) = self.completions_rx.blocking_recv() else {
                break;
            };
            if self.complete(completion) {
                processed += 1;
            }
        }
        processed
    }

    fn assign(&mut self, slot: SlotId, job: Job<P, R>) {
        self.slots[slot.index()].assign(&self.factory, job);
    }

    /// Hands a freed slot to the oldest pending task, or parks it as idle.
    fn release(&mut self, slot: SlotId) {
        match self.pending.pop_front() {
            Some(job) => {
                #[cfg(feature = "tracing")]
                tracing::debug!(slot = %slot, identifier = %job.message.identifier, "Reassigning slot to pending task");
                self.assign(slot, job);
            }
            None => self.idle.push_back(slot),
        }
    }

    /// Routes one completion: fires the task's handler, releases the slot and
    /// terminates the context. Returns `false` for a stale completion.
    fn complete(&mut self, completion: Completion<R>) -> bool {
        let Completion {
            slot,
            ticket,
            outcome,
        } = completion;

        let Some(assignment) = self
            .slots
            .get_mut(slot.index())
            .and_then(|worker| worker.finish(ticket))
        else {
            #[cfg(feature = "tracing")]
            tracing::warn!(slot = %slot, ticket, "Ignoring stale completion");
            return false;
        };

        #[cfg(feature = "tracing")]
        let _identifier = assignment.identifier().to_owned();
        let (handlers, mut context) = assignment.into_parts();

        let fired = match outcome {
            Outcome::Success(result) => {
                self.completed += 1;
                #[cfg(feature = "tracing")]
                tracing::debug!(slot = %slot, identifier = %_identifier, "Task completed");
                catch_unwind(AssertUnwindSafe(|| handlers.succeed(result)))
            }
            Outcome::Failure(error) => {
                self.failed += 1;
                #[cfg(feature = "tracing")]
                tracing::debug!(slot = %slot, identifier = %_identifier, error = %error.text, "Task failed");
                catch_unwind(AssertUnwindSafe(|| handlers.fail(error.to_string())))
            }
        };

        // The slot is recycled even if the handler panicked; the panic is
        // re-raised once the pool is consistent again.
        self.release(slot);
        context.terminate();
        self.debug_check_invariants();

        if let Err(panic) = fired {
            resume_unwind(panic);
        }
        true
    }

    fn debug_check_invariants(&self) {
        if cfg!(debug_assertions) {
            let busy = self.busy_count();
            assert_eq!(self.idle.len() + busy, self.slots.len());
            assert!(
                self.slots
                    .iter()
                    .enumerate()
                    .all(|(index, slot)| slot.id().index() == index)
            );
            assert!(
                self.idle
                    .iter()
                    .all(|id| self.slots[id.index()].status() == SlotStatus::Idle)
            );
            assert!(self.pending.is_empty() || self.idle.is_empty());
        }
    }
}

impl<P, R, F> Pool<P, R, F>
where
    F: ContextFactory<P, R>,
{
    /// Number of slots this pool manages.
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Whether [`Pool::init`] has created the slots.
    pub fn is_initialized(&self) -> bool {
        !self.slots.is_empty()
    }

    /// Number of slots waiting for work.
    pub fn idle_count(&self) -> usize {
        self.idle.len()
    }

    /// Number of slots currently executing a task.
    pub fn busy_count(&self) -> usize {
        self.slots
            .iter()
            .filter(|slot| slot.status() == SlotStatus::Busy)
            .count()
    }

    /// Number of tasks queued behind busy slots.
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Returns the state of `slot`, or `None` if no such slot exists.
    pub fn slot_status(&self, slot: SlotId) -> Option<SlotStatus> {
        self.slots.get(slot.index()).map(WorkerSlot::status)
    }

    /// Returns the identifier of the task `slot` is executing, if any.
    pub fn running(&self, slot: SlotId) -> Option<&str> {
        self.slots.get(slot.index()).and_then(WorkerSlot::running)
    }

    /// Takes a snapshot of the pool's bookkeeping.
    pub fn stats(&self) -> PoolStats {
        PoolStats {
            capacity: self.capacity,
            idle: self.idle_count(),
            busy: self.busy_count(),
            pending: self.pending_count(),
            completed: self.completed,
            failed: self.failed,
            discarded: self.discarded,
        }
    }
}

impl<P, R, F> fmt::Debug for Pool<P, R, F>
where
    F: ContextFactory<P, R>,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pool")
            .field("capacity", &self.capacity)
            .field("idle", &self.idle)
            .field("busy", &self.busy_count())
            .field("pending", &self.pending.len())
            .finish_non_exhaustive()
    }
}

impl<P, R, F> Drop for Pool<P, R, F>
where
    F: ContextFactory<P, R>,
{
    /// Terminates every live context. Their tasks' handlers never fire, and
    /// pending tasks are dropped.
    fn drop(&mut self) {
        for slot in &mut self.slots {
            if let Some(mut context) = slot.abandon() {
                #[cfg(feature = "tracing")]
                tracing::debug!(slot = %slot.id(), "Terminating live context on drop");
                context.terminate();
            }
        }
    }
}
