use crate::SlotId;

/// Observable state of a worker slot.
///
/// A slot is created idle, becomes busy when a task is assigned, and returns
/// to idle (or straight to busy with the next pending task) when its context
/// reports back. There is no terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum SlotStatus {
    /// No task and no live context; waiting in the pool's idle collection.
    Idle,
    /// Executing exactly one task in exactly one live context.
    Busy,
}

/// What [`crate::Pool::submit`] did with a task.
///
/// This is informational only; the task's outcome is always delivered
/// asynchronously through its handlers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum Dispatch {
    /// The task was handed to an idle slot and its context started.
    Started(SlotId),
    /// No slot was idle; the task waits at `position` (0-based) in the
    /// pending queue.
    Queued {
        /// Zero-based index in the pending queue at submission time.
        position: usize,
    },
    /// The task has no identifier and was dropped without firing a handler.
    Discarded,
}

/// A point-in-time snapshot of pool bookkeeping.
///
/// `idle + busy == capacity` holds for every snapshot taken after
/// `init()`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct PoolStats {
    pub capacity: usize,
    pub idle: usize,
    pub busy: usize,
    pub pending: usize,
    /// Tasks whose success handler fired.
    pub completed: u64,
    /// Tasks whose failure handler fired.
    pub failed: u64,
    /// Tasks dropped for lacking an identifier.
    pub discarded: u64,
}
