//! Bounded-concurrency batch parsing and persistence.
//!
//! A fixed pool of workers drains a shared queue of `(index, raw)` jobs.
//! Every job runs in its own sub-task raced against the item timeout, so a
//! slow or failing item is recorded in its own slot and never stalls or
//! fails its siblings. Results are reassembled by input index.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinSet;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use crate::builder::EmailParser;
use crate::error::{ParseError, Result};
use crate::repository::EmailRepository;
use crate::types::{BatchItemResult, BatchResult, millis};

pub const DEFAULT_MAX_WORKERS: usize = 5;
pub const MAX_WORKERS_LIMIT: usize = 100;
pub const DEFAULT_ITEM_TIMEOUT: Duration = Duration::from_millis(500);

/// Concurrency and deadline settings for one batch call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchOptions {
    /// Upper bound on parallel workers, 1..=100
    pub max_workers: usize,

    /// Deadline for parsing and persisting a single item
    pub item_timeout: Duration,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            max_workers: DEFAULT_MAX_WORKERS,
            item_timeout: DEFAULT_ITEM_TIMEOUT,
        }
    }
}

impl BatchOptions {
    #[must_use]
    pub const fn new(max_workers: usize, item_timeout: Duration) -> Self {
        Self {
            max_workers,
            item_timeout,
        }
    }

    /// Replace out-of-range values with the defaults.
    #[must_use]
    pub fn sanitized(self) -> Self {
        let max_workers = if (1..=MAX_WORKERS_LIMIT).contains(&self.max_workers) {
            self.max_workers
        } else {
            DEFAULT_MAX_WORKERS
        };
        let item_timeout = if self.item_timeout.is_zero() {
            DEFAULT_ITEM_TIMEOUT
        } else {
            self.item_timeout
        };
        Self {
            max_workers,
            item_timeout,
        }
    }
}

struct Job {
    index: usize,
    raw: String,
}

type JobQueue = Arc<Mutex<VecDeque<Job>>>;

/// Runs parse + persist over many raw messages with bounded parallelism
#[derive(Clone)]
pub struct BatchSupervisor {
    parser: Arc<dyn EmailParser>,
    repo: Arc<dyn EmailRepository>,
}

impl BatchSupervisor {
    #[must_use]
    pub fn new(parser: Arc<dyn EmailParser>, repo: Arc<dyn EmailRepository>) -> Self {
        Self { parser, repo }
    }

    /// Process every raw message and return one result per input, in input
    /// order. Only an empty input is rejected; per-item failures are recorded
    /// in their slots.
    pub async fn run(&self, raws: Vec<String>, options: BatchOptions) -> Result<BatchResult> {
        if raws.is_empty() {
            warn!("empty batch input");
            return Err(ParseError::EmptyBatch);
        }

        let options = options.sanitized();
        let total = raws.len();
        let worker_count = options.max_workers.min(total);
        let started = Instant::now();

        info!(
            items = total,
            max_workers = worker_count,
            item_timeout_ms = millis(options.item_timeout),
            "batch started"
        );

        let queue: JobQueue = Arc::new(Mutex::new(
            raws.into_iter()
                .enumerate()
                .map(|(index, raw)| Job { index, raw })
                .collect(),
        ));
        let (result_tx, mut result_rx) = mpsc::unbounded_channel();

        let mut workers = JoinSet::new();
        for worker_id in 0..worker_count {
            let queue = Arc::clone(&queue);
            let results = result_tx.clone();
            let parser = Arc::clone(&self.parser);
            let repo = Arc::clone(&self.repo);
            let item_timeout = options.item_timeout;

            workers.spawn(async move {
                run_worker(worker_id, queue, results, parser, repo, item_timeout).await;
            });
        }
        drop(result_tx);

        let mut slots: Vec<Option<BatchItemResult>> = vec![None; total];
        while let Some(result) = result_rx.recv().await {
            if let Some(slot) = slots.get_mut(result.index) {
                *slot = Some(result);
            }
        }

        while let Some(joined) = workers.join_next().await {
            if let Err(e) = joined {
                error!(error = %e, "batch worker panicked");
            }
        }

        let results = slots
            .into_iter()
            .enumerate()
            .map(|(index, slot)| {
                slot.unwrap_or_else(|| {
                    BatchItemResult::failed(index, "item was not processed", Duration::ZERO)
                })
            })
            .collect();
        let batch = BatchResult::from_results(results);

        info!(
            succeeded = batch.succeeded,
            failed = batch.failed,
            duration_ms = millis(started.elapsed()),
            "batch finished"
        );

        Ok(batch)
    }
}

async fn run_worker(
    worker_id: usize,
    queue: JobQueue,
    results: mpsc::UnboundedSender<BatchItemResult>,
    parser: Arc<dyn EmailParser>,
    repo: Arc<dyn EmailRepository>,
    item_timeout: Duration,
) {
    debug!(worker_id, "batch worker started");

    loop {
        let Some(job) = queue.lock().await.pop_front() else {
            break;
        };

        let result = process_item(&parser, &repo, job, item_timeout).await;
        if results.send(result).is_err() {
            break;
        }
    }

    debug!(worker_id, "batch worker stopped");
}

/// Run one job in its own task with a deadline. A task that misses the
/// deadline is aborted and reported as a timeout.
async fn process_item(
    parser: &Arc<dyn EmailParser>,
    repo: &Arc<dyn EmailRepository>,
    job: Job,
    item_timeout: Duration,
) -> BatchItemResult {
    let started = Instant::now();
    let Job { index, raw } = job;
    let parser = Arc::clone(parser);
    let repo = Arc::clone(repo);

    let task = tokio::spawn(async move {
        let entity = tokio::task::spawn_blocking(move || parser.parse(raw.as_bytes()))
            .await
            .map_err(|e| ParseError::Aborted(e.to_string()))??;
        repo.save(&entity).await?;
        Ok::<_, ParseError>(entity.id)
    });
    let abort = task.abort_handle();

    let outcome = match timeout(item_timeout, task).await {
        Ok(Ok(outcome)) => outcome,
        Ok(Err(join_error)) => Err(ParseError::Aborted(join_error.to_string())),
        Err(_) => {
            abort.abort();
            Err(ParseError::Timeout(item_timeout))
        }
    };

    let elapsed = started.elapsed();
    match outcome {
        Ok(id) => BatchItemResult::succeeded(index, id, elapsed),
        Err(e) => {
            warn!(
                index,
                duration_ms = millis(elapsed),
                error = %e,
                "batch item failed"
            );
            BatchItemResult::failed(index, e.to_string(), elapsed)
        }
    }
}
