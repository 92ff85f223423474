use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use entity_locker::{EntityId, EntityLocker, LockableEntity, LockerConfig};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::info;
use tracing_subscriber::EnvFilter;

type Entity = LockableEntity<EntityId>;

#[derive(Parser)]
#[command(name = "entity-locker")]
#[command(about = "Run lock contention scenarios against the entity locker")]
struct Cli {
    /// JSON engine configuration
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// How long each protected task runs
    #[arg(long, global = true, default_value_t = 2000)]
    task_ms: u64,

    /// Lock acquisition timeout
    #[arg(long, global = true, default_value_t = 10_000)]
    timeout_ms: u64,

    #[command(subcommand)]
    scenario: Scenario,
}

#[derive(Subcommand)]
enum Scenario {
    /// Workers lock disjoint entities and run in parallel
    Parallel {
        #[arg(long, default_value_t = 3)]
        workers: u32,
    },
    /// Workers go through the global lock and run one at a time
    Global {
        #[arg(long, default_value_t = 3)]
        workers: u32,
    },
    /// One worker lists the same entity several times
    Reentrant {
        #[arg(long, default_value_t = 3)]
        repeat: usize,
    },
    /// Workers lock wide disjoint sets and escalate to the global lock
    Escalation {
        #[arg(long, default_value_t = 1)]
        threshold: usize,
        #[arg(long, default_value_t = 3)]
        workers: u32,
        #[arg(long, default_value_t = 3)]
        width: u32,
    },
    /// Two global-lock workers with a timeout shorter than the task
    Timeout,
}

#[derive(Clone, Copy)]
enum LockPath {
    Entity,
    Global,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => LockerConfig::from_path(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => LockerConfig::new(),
    };
    let task = Duration::from_millis(cli.task_ms);
    let timeout = Duration::from_millis(cli.timeout_ms);

    let (locker, batches, path, timeout) = match cli.scenario {
        Scenario::Parallel { workers } => (
            EntityLocker::from_config(&config)?,
            disjoint_batches(workers, 1),
            LockPath::Entity,
            timeout,
        ),
        Scenario::Global { workers } => (
            EntityLocker::from_config(&config)?,
            disjoint_batches(workers, 1),
            LockPath::Global,
            timeout,
        ),
        Scenario::Reentrant { repeat } => {
            let entity = Arc::new(Entity::new(EntityId::new(1)));
            (
                EntityLocker::from_config(&config)?,
                vec![vec![entity; repeat]],
                LockPath::Entity,
                timeout,
            )
        }
        Scenario::Escalation {
            threshold,
            workers,
            width,
        } => (
            EntityLocker::from_config(&config.clone().escalation_threshold(threshold))?,
            disjoint_batches(workers, width),
            LockPath::Entity,
            timeout,
        ),
        Scenario::Timeout => (
            EntityLocker::from_config(&config)?,
            disjoint_batches(2, 1),
            LockPath::Global,
            task / 2,
        ),
    };

    info!(?locker, "starting scenario");
    let start = Instant::now();
    let outcomes = run_workers(&locker, batches, path, task, timeout).await?;
    let elapsed = start.elapsed();

    for (worker, outcome) in outcomes.iter().enumerate() {
        match outcome {
            Ok(()) => println!("worker {}: ok", worker),
            Err(err) => println!("worker {}: {}", worker, err),
        }
    }
    println!("elapsed: {} ms", elapsed.as_millis());
    println!("{}", locker.stats());

    Ok(())
}

/// `workers` groups of `width` distinct entities, no entity shared between groups.
fn disjoint_batches(workers: u32, width: u32) -> Vec<Vec<Arc<Entity>>> {
    (0..workers)
        .map(|worker| {
            (0..width)
                .map(|offset| Arc::new(Entity::new(batch_entity_id(worker, width, offset))))
                .collect()
        })
        .collect()
}

/// Computed in `u64`, so any `u32` arguments fit.
fn batch_entity_id(worker: u32, width: u32, offset: u32) -> EntityId {
    EntityId::new(u64::from(worker) * u64::from(width) + u64::from(offset) + 1)
}

async fn run_workers(
    locker: &EntityLocker,
    batches: Vec<Vec<Arc<Entity>>>,
    path: LockPath,
    task: Duration,
    timeout: Duration,
) -> Result<Vec<entity_locker::Result<()>>> {
    let mut handles = Vec::with_capacity(batches.len());

    for ids in batches {
        let locker = locker.clone();
        handles.push(tokio::task::spawn_blocking(move || match path {
            LockPath::Entity => locker.execute(&ids, |ids| simulate_work(ids, task), timeout),
            LockPath::Global => {
                locker.execute_with_global_lock(&ids, |ids| simulate_work(ids, task), timeout)
            }
        }));
    }

    let mut outcomes = Vec::with_capacity(handles.len());
    for handle in handles {
        outcomes.push(handle.await.context("worker panicked")?);
    }
    Ok(outcomes)
}

fn simulate_work(ids: &[Arc<Entity>], task: Duration) {
    let ids: Vec<u64> = ids.iter().map(|entity| entity.id().as_u64()).collect();
    info!(?ids, "protected task running");
    std::thread::sleep(task);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disjoint_batches_do_not_share_ids() {
        let batches = disjoint_batches(3, 2);
        let ids: Vec<u64> = batches
            .iter()
            .flatten()
            .map(|entity| entity.id().as_u64())
            .collect();
        assert_eq!(ids, vec![1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn test_batch_entity_id_at_u32_limits() {
        let id = batch_entity_id(u32::MAX, u32::MAX, u32::MAX - 1);
        assert_eq!(id.as_u64(), u64::from(u32::MAX) * u64::from(u32::MAX) + u64::from(u32::MAX));
        assert!(batch_entity_id(u32::MAX, u32::MAX, 0) > batch_entity_id(u32::MAX - 1, u32::MAX, u32::MAX - 1));
    }
}
