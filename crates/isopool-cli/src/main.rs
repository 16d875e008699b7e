#![doc = include_str!("../README.md")]

mod config;
mod telemetry;
mod workload;

use clap::Parser;
use config::{Backend, CliArgs, RunConfig};
use isopool::{ContextFactory, Dispatch, Pool, PoolStats, Task, ThreadContext, TokioContext};
use std::time::{Duration, Instant};
use telemetry::init_tracing;
use tokio::runtime::Handle;

// Using mimalloc for better performance under contention, especially in musl
// environments.
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

// The coordinator is single-threaded; all parallelism lives in the contexts.
#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    // Load from .env
    let _ = dotenvy::dotenv();
    let args = CliArgs::parse();
    let config = RunConfig::try_from(args)?;

    init_tracing();
    log_startup_info(&config);

    let registry = workload::registry();
    let (stats, elapsed) = match config.backend {
        Backend::Thread => {
            let pool = Pool::new(config.workers, ThreadContext::factory(registry))?;
            run(pool, &config).await?
        }
        Backend::Tokio => {
            let factory = TokioContext::factory(registry, Handle::current());
            let pool = Pool::new(config.workers, factory)?;
            run(pool, &config).await?
        }
    };

    tracing::info!(
        completed = stats.completed,
        failed = stats.failed,
        discarded = stats.discarded,
        "Workload finished in {:?}",
        elapsed
    );

    if config.json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
    }

    Ok(())
}

/// Submits the configured workload, then drains the pool until every task has
/// reported back.
async fn run<F>(mut pool: Pool<u64, u64, F>, config: &RunConfig) -> anyhow::Result<(PoolStats, Duration)>
where
    F: ContextFactory<u64, u64>,
{
    pool.init()?;
    let start = Instant::now();

    for (index, (job, payload)) in workload::plan(config).enumerate() {
        let task = Task::new(
            job,
            payload,
            move |result: u64| tracing::info!(task = index, job, payload, result, "Task succeeded"),
            move |diagnostic| tracing::warn!(task = index, job, payload, "Task failed: {diagnostic}"),
        );

        match pool.submit(task)? {
            Dispatch::Started(slot) => tracing::debug!(task = index, %slot, "Started"),
            Dispatch::Queued { position } => tracing::debug!(task = index, position, "Queued"),
            Dispatch::Discarded => tracing::warn!(task = index, "Discarded"),
        }
    }

    tracing::info!(
        busy = pool.busy_count(),
        pending = pool.pending_count(),
        "All tasks submitted"
    );

    pool.drain().await;
    Ok((pool.stats(), start.elapsed()))
}

fn log_startup_info(config: &RunConfig) {
    if cfg!(debug_assertions) {
        tracing::info!("Starting isopool with full config: {:#?}", config);
    } else {
        tracing::info!(
            "Starting isopool with {} workers on the {:?} backend",
            config.workers,
            config.backend
        );
    }
}
