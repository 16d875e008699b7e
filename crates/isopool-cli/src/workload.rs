//! Demo jobs and the task plan submitted to the pool.

use crate::config::RunConfig;
use isopool::{Registry, context_error};

pub const FIB: &str = "fib";
pub const COLLATZ: &str = "collatz";
pub const FAIL: &str = "fail";

/// Jobs every context can run, keyed by task identifier.
pub fn registry() -> Registry<u64, u64> {
    Registry::new()
        .with(FIB, |n: u64| Ok(fib(n)))
        .with(COLLATZ, |n: u64| {
            if n == 0 {
                return Err(context_error!("collatz is undefined for 0"));
            }
            Ok(collatz_steps(n))
        })
        .with(FAIL, |n: u64| Err(context_error!("task {n} was asked to fail")))
}

/// Identifier and payload of each task, in submission order.
///
/// Even tasks compute a Fibonacci number near `fib_n`, odd tasks count Collatz
/// steps, and every `fail_every`-th task (1-based) fails on purpose.
pub fn plan(config: &RunConfig) -> impl Iterator<Item = (&'static str, u64)> + '_ {
    (0..config.tasks).map(|i| {
        let ordinal = i + 1;
        if config.fail_every > 0 && ordinal % config.fail_every == 0 {
            (FAIL, i as u64)
        } else if i % 2 == 0 {
            (FIB, u64::from(config.fib_n.saturating_sub((i % 5) as u32)))
        } else {
            (COLLATZ, 27 + i as u64)
        }
    })
}

fn fib(n: u64) -> u64 {
    if n < 2 { n } else { fib(n - 1) + fib(n - 2) }
}

fn collatz_steps(mut n: u64) -> u64 {
    let mut steps = 0;
    while n != 1 {
        n = if n % 2 == 0 { n / 2 } else { 3 * n + 1 };
        steps += 1;
    }
    steps
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Backend;
    use isopool::Message;

    fn config(tasks: usize, fail_every: usize) -> RunConfig {
        RunConfig {
            workers: 2,
            tasks,
            backend: Backend::Thread,
            fib_n: 10,
            fail_every,
            json: false,
        }
    }

    fn run(identifier: &str, payload: u64) -> Result<u64, isopool::ContextError> {
        registry().run(Message {
            identifier: identifier.to_string(),
            payload,
        })
    }

    #[test]
    fn jobs_compute_expected_values() {
        assert_eq!(run(FIB, 10), Ok(55));
        assert_eq!(run(FIB, 1), Ok(1));
        assert_eq!(run(COLLATZ, 27), Ok(111));
        assert_eq!(run(COLLATZ, 1), Ok(0));
    }

    #[test]
    fn failing_jobs_report_location() {
        let err = run(FAIL, 3).unwrap_err();
        assert_eq!(err.text, "task 3 was asked to fail");
        assert!(err.source.ends_with("workload.rs"));
        assert!(err.line > 0);

        assert!(run(COLLATZ, 0).is_err());
    }

    #[test]
    fn plan_alternates_jobs_and_injects_failures() {
        let plan: Vec<_> = plan(&config(6, 3)).collect();
        assert_eq!(
            plan,
            vec![
                (FIB, 10),
                (COLLATZ, 28),
                (FAIL, 2),
                (COLLATZ, 30),
                (FIB, 6),
                (FAIL, 5),
            ]
        );
    }

    #[test]
    fn plan_without_failures() {
        assert!(plan(&config(20, 0)).all(|(job, _)| job != FAIL));
    }
}
