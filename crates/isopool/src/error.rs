//! Error types for the pool coordinator.
//!
//! These errors describe misuse of the [`crate::Pool`] API only. Failures that
//! happen inside an execution context never surface here: they are absorbed
//! by the owning slot and delivered to the task's own failure handler as a
//! [`crate::ContextError`] diagnostic.
//!
//! ## Error Cases
//! - `InvalidCapacity`: the pool was constructed with zero slots.
//! - `AlreadyInitialized`: `init()` was called a second time.
//! - `NotInitialized`: a task was submitted before `init()`.

/// A result type defaulting to the pool's [`Error`].
pub type Result<T, E = Error> = core::result::Result<T, E>;

/// All pool-level errors `isopool` can produce.
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// The pool was constructed with a capacity of zero.
    #[error("Pool capacity must be greater than 0")]
    InvalidCapacity,

    /// `init()` was already called on this pool.
    #[error("Pool is already initialized")]
    AlreadyInitialized,

    /// A task was submitted before `init()`. The task is dropped and neither
    /// of its handlers fires.
    #[error("Pool is not initialized; call `init()` before submitting tasks")]
    NotInitialized,
}
