//! Three-stage dispatch: one producer pulling pages, N consumers posting
//! batches, one sink collecting results.
//!
//! Stages share a [`CancellationToken`]. The first stage to fail cancels it,
//! the rest stop at their next suspension point, and that first error is what
//! [`dispatch`] returns. POSTs still in flight at that point are dropped,
//! which aborts the request.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, trace, warn};

use super::entity::Job;
use crate::domain::{Batch, START_CURSOR};
use crate::trainer::{TrainResult, TrainingService};
use crate::{Error, Result};

/// Totals for one finished dispatch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchSummary {
    /// Pages pulled from the index.
    pub pages: u64,
    /// Batches the trainer accepted.
    pub batches: u64,
    /// Examples across those batches.
    pub examples: u64,
}

#[derive(Debug)]
enum StageReport {
    Produced { pages: u64 },
    Consumed { worker: usize, batches: u64 },
    Collected { batches: u64, examples: u64 },
    Stopped,
}

type Stages = JoinSet<Result<StageReport>>;

fn spawn_stage<F>(stages: &mut Stages, cancel: &CancellationToken, stage: F)
where
    F: Future<Output = Result<StageReport>> + Send + 'static,
{
    let cancel = cancel.clone();
    stages.spawn(async move {
        let result = stage.await;
        if result.is_err() {
            cancel.cancel();
        }
        result
    });
}

/// Pull every page of `job` and post it to the trainer.
///
/// Succeeds only when pagination ended after at least one page and every
/// batch was accepted.
pub async fn dispatch(job: &Arc<Job>) -> Result<DispatchSummary> {
    let config = job.config().clone();
    let capacity = config.channel_capacity.max(1);
    let workers = config.batch_workers.max(1);

    let cancel = CancellationToken::new();
    let mut stages = Stages::new();

    let (batch_tx, batch_rx) = mpsc::channel::<Batch>(capacity);
    let (result_tx, mut result_rx) = mpsc::channel::<TrainResult>(capacity);

    spawn_stage(&mut stages, &cancel, produce(job.clone(), batch_tx, cancel.clone()));

    let batch_rx = Arc::new(Mutex::new(batch_rx));
    for worker in 0..workers {
        spawn_stage(
            &mut stages,
            &cancel,
            consume(
                worker,
                job.trainer(),
                batch_rx.clone(),
                result_tx.clone(),
                config.batch_retries,
                config.retry_backoff(),
                cancel.clone(),
            ),
        );
    }
    drop(batch_rx);
    // The sink ends once every consumer has dropped its sender.
    drop(result_tx);

    let job_id = job.id();
    spawn_stage(&mut stages, &cancel, async move {
        let mut batches = 0u64;
        let mut examples = 0u64;
        while let Some(result) = result_rx.recv().await {
            batches += 1;
            examples += result.examples as u64;
            trace!(
                job_id,
                sequence = result.sequence,
                status = result.status,
                "Batch accepted"
            );
        }
        Ok(StageReport::Collected { batches, examples })
    });

    let mut summary = DispatchSummary::default();
    let mut first_error: Option<Error> = None;

    while let Some(joined) = stages.join_next().await {
        match joined {
            Ok(Ok(StageReport::Produced { pages })) => summary.pages = pages,
            Ok(Ok(StageReport::Collected { batches, examples })) => {
                summary.batches = batches;
                summary.examples = examples;
            }
            Ok(Ok(StageReport::Consumed { worker, batches })) => {
                debug!(job_id, worker, batches, "Consumer finished");
            }
            Ok(Ok(StageReport::Stopped)) => {}
            Ok(Err(Error::Cancelled)) => {}
            Ok(Err(e)) => {
                if first_error.is_none() {
                    first_error = Some(e);
                }
            }
            Err(e) => {
                error!(job_id, "Dispatch stage panicked: {}", e);
                cancel.cancel();
                if first_error.is_none() {
                    first_error = Some(Error::Other(format!("dispatch stage panicked: {e}")));
                }
            }
        }
    }

    if let Some(e) = first_error {
        return Err(e);
    }
    if cancel.is_cancelled() {
        return Err(Error::Cancelled);
    }
    Ok(summary)
}

async fn produce(
    job: Arc<Job>,
    batch_tx: mpsc::Sender<Batch>,
    cancel: CancellationToken,
) -> Result<StageReport> {
    let puller = job.puller();

    let end = tokio::select! {
        _ = cancel.cancelled() => return Ok(StageReport::Stopped),
        end = puller.pull(START_CURSOR, |batch| {
            let batch_tx = batch_tx.clone();
            let job = job.clone();
            async move {
                let next = batch.next_cursor.clone();
                batch_tx.send(batch).await.map_err(|_| Error::Cancelled)?;
                if let Some(next) = next {
                    job.advance_cursor(&next);
                }
                Ok(())
            }
        }) => end,
    };

    match end {
        Error::NoMoreData { pages } if pages > 0 => {
            debug!(job_id = job.id(), pages, "Producer finished");
            Ok(StageReport::Produced { pages })
        }
        Error::Cancelled => Ok(StageReport::Stopped),
        e => Err(e),
    }
}

async fn consume(
    worker: usize,
    trainer: Arc<dyn TrainingService>,
    batch_rx: Arc<Mutex<mpsc::Receiver<Batch>>>,
    result_tx: mpsc::Sender<TrainResult>,
    retries: u32,
    backoff: Duration,
    cancel: CancellationToken,
) -> Result<StageReport> {
    let mut batches = 0u64;

    loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            batch = async { batch_rx.lock().await.recv().await } => batch,
        };
        let Some(batch) = next else {
            break;
        };

        let result = post_with_retry(trainer.as_ref(), &batch, retries, backoff, &cancel).await?;
        batches += 1;
        if result_tx.send(result).await.is_err() {
            return Ok(StageReport::Stopped);
        }
    }

    Ok(StageReport::Consumed { worker, batches })
}

/// POST one batch, retrying transport failures up to `retries` more times.
async fn post_with_retry(
    trainer: &dyn TrainingService,
    batch: &Batch,
    retries: u32,
    backoff: Duration,
    cancel: &CancellationToken,
) -> Result<TrainResult> {
    let mut attempt = 0u32;
    loop {
        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(Error::Cancelled),
            outcome = trainer.train(batch) => outcome,
        };
        match outcome {
            Ok(result) => return Ok(result),
            Err(e @ Error::Transport(_)) if attempt < retries => {
                attempt += 1;
                warn!(
                    sequence = batch.sequence,
                    attempt,
                    retries,
                    error = %e,
                    "Batch post failed, retrying"
                );
                tokio::select! {
                    _ = cancel.cancelled() => return Err(Error::Cancelled),
                    _ = tokio::time::sleep(backoff) => {}
                }
            }
            Err(e) => return Err(e),
        }
    }
}
