use anyhow::bail;
use clap::{Parser, ValueEnum};

/// Largest `FIB_N` accepted. The `fib` job is deliberately naive, so larger
/// inputs would run for minutes per task.
pub const MAX_FIB_N: u32 = 45;

/// Which execution context backs each slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum Backend {
    /// One freshly spawned OS thread per task.
    Thread,
    /// Tokio's blocking thread pool.
    Tokio,
}

/// Runtime configuration for the `isopool` binary.
///
/// All values are parsed from CLI arguments or environment variables (a
/// `.env` file is loaded first), with defaults that finish in well under a
/// second on a laptop.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "isopool",
    version,
    about = "Runs a demo workload through an isopool worker pool"
)]
pub struct CliArgs {
    /// Number of slots in the pool, i.e. how many tasks may run at once.
    ///
    /// Defaults to the number of logical CPUs.
    ///
    /// Environment variable: `NUM_WORKERS`
    #[arg(long, env = "NUM_WORKERS")]
    pub workers: Option<usize>,

    /// Number of tasks to submit.
    ///
    /// Tasks beyond the pool's capacity wait in FIFO order for a free slot.
    ///
    /// Environment variable: `NUM_TASKS`
    #[arg(long, env = "NUM_TASKS", default_value_t = 32)]
    pub tasks: usize,

    /// Execution context backing each slot.
    ///
    /// Environment variable: `POOL_BACKEND`
    #[arg(long, env = "POOL_BACKEND", value_enum, default_value_t = Backend::Thread)]
    pub backend: Backend,

    /// Upper input for the `fib` job.
    ///
    /// Environment variable: `FIB_N`
    #[arg(long, env = "FIB_N", default_value_t = 30)]
    pub fib_n: u32,

    /// Route every k-th task to a job that always fails. `0` disables
    /// failures.
    ///
    /// Environment variable: `FAIL_EVERY`
    #[arg(long, env = "FAIL_EVERY", default_value_t = 0)]
    pub fail_every: usize,

    /// Print the final pool statistics as JSON on stdout.
    #[arg(long, default_value_t = false)]
    pub json: bool,
}

#[derive(Debug, Clone)]
pub struct RunConfig {
    pub workers: usize,
    pub tasks: usize,
    pub backend: Backend,
    pub fib_n: u32,
    pub fail_every: usize,
    pub json: bool,
}

impl TryFrom<CliArgs> for RunConfig {
    type Error = anyhow::Error;

    fn try_from(args: CliArgs) -> Result<Self, Self::Error> {
        let workers = args.workers.unwrap_or_else(num_cpus::get);

        if workers == 0 {
            bail!("NUM_WORKERS must be greater than 0");
        }

        if args.fib_n > MAX_FIB_N {
            bail!(
                "FIB_N ({}) exceeds the supported maximum ({})",
                args.fib_n,
                MAX_FIB_N
            );
        }

        Ok(Self {
            workers,
            tasks: args.tasks,
            backend: args.backend,
            fib_n: args.fib_n,
            fail_every: args.fail_every,
            json: args.json,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> anyhow::Result<RunConfig> {
        let args = CliArgs::try_parse_from(std::iter::once("isopool").chain(args.iter().copied()))?;
        RunConfig::try_from(args)
    }

    #[test]
    fn explicit_flags_are_used() {
        let config = parse(&[
            "--workers",
            "3",
            "--tasks",
            "9",
            "--backend",
            "tokio",
            "--fib-n",
            "12",
            "--fail-every",
            "4",
            "--json",
        ])
        .unwrap();

        assert_eq!(config.workers, 3);
        assert_eq!(config.tasks, 9);
        assert_eq!(config.backend, Backend::Tokio);
        assert_eq!(config.fib_n, 12);
        assert_eq!(config.fail_every, 4);
        assert!(config.json);
    }

    #[test]
    fn zero_workers_is_rejected() {
        let err = parse(&["--workers", "0"]).unwrap_err();
        assert!(err.to_string().contains("NUM_WORKERS"));
    }

    #[test]
    fn oversized_fib_is_rejected() {
        let err = parse(&["--workers", "1", "--fib-n", "90"]).unwrap_err();
        assert!(err.to_string().contains("FIB_N"));
    }
}
