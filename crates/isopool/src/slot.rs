//! Reusable worker slots.
//!
//! A [`WorkerSlot`] wraps one execution position of the pool. Each
//! assignment spawns a fresh context from the factory, registers handlers that
//! post a [`Completion`] back to the coordinator, and forwards the job's
//! message. The slot itself never blocks and never sees the job's result
//! directly: the coordinator hands the completion back through
//! [`WorkerSlot::finish`].
//!
//! Every assignment is tagged with a ticket. A completion carrying a ticket
//! that does not match the slot's current assignment is stale (the context
//! emitted more than once, or after being terminated) and is rejected.

use crate::{
    ContextError, ContextFactory, ExecutionContext, SlotStatus,
    task::{Job, TaskHandlers},
};
use core::fmt;
use tokio::sync::mpsc;

/// Stable index of a slot within its pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct SlotId(usize);

impl SlotId {
    pub(crate) const fn new(index: usize) -> Self {
        Self(index)
    }

    /// Returns the slot's index in the pool, in `0..capacity`.
    pub const fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for SlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "slot-{}", self.0)
    }
}

/// What a context reported.
#[derive(Debug)]
pub(crate) enum Outcome<R> {
    Success(R),
    Failure(ContextError),
}

/// A context's report, routed back to the coordinator.
#[derive(Debug)]
pub(crate) struct Completion<R> {
    pub(crate) slot: SlotId,
    pub(crate) ticket: u64,
    pub(crate) outcome: Outcome<R>,
}

pub(crate) type CompletionSender<R> = mpsc::UnboundedSender<Completion<R>>;
pub(crate) type CompletionReceiver<R> = mpsc::UnboundedReceiver<Completion<R>>;

/// The work a busy slot is holding.
pub(crate) struct Assignment<C, R> {
    ticket: u64,
    identifier: String,
    handlers: TaskHandlers<R>,
    context: C,
}

impl<C, R> Assignment<C, R> {
    pub(crate) fn identifier(&self) -> &str {
        &self.identifier
    }

    pub(crate) fn into_parts(self) -> (TaskHandlers<R>, C) {
        (self.handlers, self.context)
    }
}

pub(crate) enum SlotState<C, R> {
    Idle,
    Busy(Assignment<C, R>),
}

pub(crate) struct WorkerSlot<C, R> {
    id: SlotId,
    state: SlotState<C, R>,
    completions: CompletionSender<R>,
    next_ticket: u64,
}

impl<C, R> WorkerSlot<C, R> {
    pub(crate) fn new(id: SlotId, completions: CompletionSender<R>) -> Self {
        Self {
            id,
            state: SlotState::Idle,
            completions,
            next_ticket: 0,
        }
    }

    pub(crate) const fn id(&self) -> SlotId {
        self.id
    }

    pub(crate) fn status(&self) -> SlotStatus {
        match self.state {
            SlotState::Idle => SlotStatus::Idle,
            SlotState::Busy(_) => SlotStatus::Busy,
        }
    }

    pub(crate) fn running(&self) -> Option<&str> {
        match &self.state {
            SlotState::Idle => None,
            SlotState::Busy(assignment) => Some(assignment.identifier()),
        }
    }

    /// Spawns a context for `job` and starts it. Returns without waiting.
    ///
    /// The slot must be idle.
    pub(crate) fn assign<P, F>(&mut self, factory: &F, job: Job<P, R>)
    where
        F: ContextFactory<P, R, Context = C>,
        C: ExecutionContext<P, R>,
        R: Send + 'static,
    {
        debug_assert!(
            matches!(self.state, SlotState::Idle),
            "{} assigned while busy",
            self.id
        );

        let ticket = self.next_ticket;
        self.next_ticket = self.next_ticket.wrapping_add(1);

        let Job { message, handlers } = job;
        let identifier = message.identifier.clone();
        let mut context = factory.spawn();

        let slot = self.id;
        let tx = self.completions.clone();
        context.on_success(Box::new(move |result| {
            // The receiver only goes away with the pool itself.
            let _ = tx.send(Completion {
                slot,
                ticket,
                outcome: Outcome::Success(result),
            });
        }));

        let tx = self.completions.clone();
        context.on_error(Box::new(move |error| {
            let _ = tx.send(Completion {
                slot,
                ticket,
                outcome: Outcome::Failure(error),
            });
        }));

        context.send(message);

        #[cfg(feature = "tracing")]
        tracing::trace!(slot = %self.id, ticket, identifier = %identifier, "Context started");

        self.state = SlotState::Busy(Assignment {
            ticket,
            identifier,
            handlers,
            context,
        });
    }

    /// Takes the current assignment if `ticket` matches it, leaving the slot
    /// idle. Returns `None` for a stale completion.
    pub(crate) fn finish(&mut self, ticket: u64) -> Option<Assignment<C, R>> {
        if !matches!(&self.state, SlotState::Busy(a) if a.ticket == ticket) {
            return None;
        }

        match core::mem::replace(&mut self.state, SlotState::Idle) {
            SlotState::Busy(assignment) => Some(assignment),
            SlotState::Idle => None,
        }
    }

    /// Drops the current assignment without firing either handler and
    /// returns its context so the caller can terminate it.
    pub(crate) fn abandon(&mut self) -> Option<C> {
        match core::mem::replace(&mut self.state, SlotState::Idle) {
            SlotState::Busy(assignment) => Some(assignment.context),
            SlotState::Idle => None,
        }
    }
}
