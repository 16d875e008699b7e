use crate::{ContextError, Message};
use std::collections::HashMap;
use std::sync::Arc;

/// A job runnable inside an execution context.
pub type JobFn<P, R> = dyn Fn(P) -> Result<R, ContextError> + Send + Sync + 'static;

/// Named jobs an execution context can run.
///
/// A [`Message`]'s identifier selects the job; its payload is the job's
/// input. Registries are cheap to clone and shared by every context a
/// factory builds.
///
/// # Example
///
/// ```
/// use isopool::{Message, Registry, context_error};
///
/// let registry = Registry::new()
///     .with("half", |n: u32| {
///         if n % 2 == 0 { Ok(n / 2) } else { Err(context_error!("{n} is odd")) }
///     });
///
/// let ok = registry.run(Message { identifier: "half".into(), payload: 8 });
/// assert_eq!(ok, Ok(4));
///
/// let err = registry.run(Message { identifier: "half".into(), payload: 3 }).unwrap_err();
/// assert_eq!(err.text, "3 is odd");
/// ```
pub struct Registry<P, R> {
    jobs: HashMap<String, Arc<JobFn<P, R>>>,
}

impl<P, R> Registry<P, R> {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self {
            jobs: HashMap::new(),
        }
    }

    /// Registers `job` under `identifier`, replacing any previous job with
    /// that name.
    pub fn register<J>(&mut self, identifier: impl Into<String>, job: J) -> &mut Self
    where
        J: Fn(P) -> Result<R, ContextError> + Send + Sync + 'static,
    {
        self.jobs.insert(identifier.into(), Arc::new(job));
        self
    }

    /// Builder-style [`Registry::register`].
    #[must_use]
    pub fn with<J>(mut self, identifier: impl Into<String>, job: J) -> Self
    where
        J: Fn(P) -> Result<R, ContextError> + Send + Sync + 'static,
    {
        self.register(identifier, job);
        self
    }

    /// Whether a job is registered under `identifier`.
    pub fn contains(&self, identifier: &str) -> bool {
        self.jobs.contains_key(identifier)
    }

    /// Registered identifiers, in no particular order.
    pub fn identifiers(&self) -> impl Iterator<Item = &str> {
        self.jobs.keys().map(String::as_str)
    }

    /// Runs the job named by `message` on the calling thread.
    ///
    /// # Errors
    ///
    /// Returns the job's own error, or a [`ContextError`] when no job is
    /// registered under the message's identifier.
    pub fn run(&self, message: Message<P>) -> Result<R, ContextError> {
        let Message {
            identifier,
            payload,
        } = message;

        match self.jobs.get(&identifier) {
            Some(job) => job(payload),
            None => Err(crate::context_error!(
                "no job registered under `{identifier}`"
            )),
        }
    }
}

impl<P, R> Default for Registry<P, R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P, R> Clone for Registry<P, R> {
    fn clone(&self) -> Self {
        Self {
            jobs: self.jobs.clone(),
        }
    }
}
