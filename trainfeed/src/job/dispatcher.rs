//! Workers that drain the job queue.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::entity::Job;
use crate::Error;
use crate::service::JobService;

/// Configuration for the job dispatcher.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatcherConfig {
    /// Jobs executed concurrently.
    pub workers: usize,
    /// Poll interval in milliseconds.
    pub poll_interval_ms: u64,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            workers: 1,
            poll_interval_ms: 500,
        }
    }
}

/// Pops submitted jobs and runs them to a terminal state.
pub struct JobDispatcher {
    config: DispatcherConfig,
    cancellation_token: CancellationToken,
    tasks: Mutex<Option<JoinSet<()>>>,
}

impl JobDispatcher {
    pub fn new(config: DispatcherConfig) -> Self {
        Self {
            config,
            cancellation_token: CancellationToken::new(),
            tasks: Mutex::new(Some(JoinSet::new())),
        }
    }

    /// Spawn the worker tasks.
    pub fn start(&self, service: Arc<JobService>) {
        let poll_interval = Duration::from_millis(self.config.poll_interval_ms);
        let workers = self.config.workers.max(1);

        info!("Starting job dispatcher with {} workers", workers);

        let mut tasks = self.tasks.lock();
        let Some(join_set) = tasks.as_mut() else {
            warn!("Job dispatcher already stopped");
            return;
        };

        for i in 0..workers {
            let service = service.clone();
            let cancellation_token = self.cancellation_token.clone();
            let notifier = service.notifier();

            join_set.spawn(async move {
                debug!("Dispatcher worker {} started", i);

                loop {
                    // Drain before waiting so a notification sent while
                    // busy is not lost.
                    while !cancellation_token.is_cancelled() {
                        let Some(job) = service.next_job() else {
                            break;
                        };
                        execute(i, &job).await;
                    }

                    tokio::select! {
                        _ = cancellation_token.cancelled() => break,
                        _ = notifier.notified() => {}
                        _ = tokio::time::sleep(poll_interval) => {}
                    }
                }

                debug!("Dispatcher worker {} shutting down", i);
            });
        }
    }

    /// Stop the workers and wait for running jobs to return.
    pub async fn stop(&self) {
        info!("Stopping job dispatcher");
        self.cancellation_token.cancel();

        let join_set = self.tasks.lock().take();
        if let Some(mut join_set) = join_set {
            while let Some(result) = join_set.join_next().await {
                if let Err(e) = result {
                    error!("Dispatcher worker panicked: {}", e);
                }
            }
        }
        info!("Job dispatcher stopped");
    }
}

async fn execute(worker: usize, job: &Arc<Job>) {
    debug!(job_id = job.id(), worker, "Dispatching job");

    match job.initialize().await {
        Ok(()) => {}
        Err(e @ Error::InvalidStateTransition { .. }) => {
            warn!(
                job_id = job.id(),
                status = %job.status(),
                error = %e,
                "Job is not dispatchable"
            );
            return;
        }
        Err(e) => {
            if let Err(te) = job.fail(e.to_string()) {
                error!(job_id = job.id(), "Could not mark job failed: {}", te);
            }
            return;
        }
    }

    // The outcome is recorded on the job; only a refused start goes unrecorded.
    match job.run().await {
        Ok(summary) => {
            debug!(job_id = job.id(), worker, pages = summary.pages, "Job finished")
        }
        Err(e) if job.status().is_terminal() => {
            debug!(job_id = job.id(), worker, error = %e, "Job finished with error")
        }
        Err(e) => warn!(
            job_id = job.id(),
            status = %job.status(),
            error = %e,
            "Job did not run"
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::JobStatus;
    use crate::domain::descriptor::sample_descriptor;
    use crate::job::DispatchConfig;
    use crate::testing::{FakeIndex, FakeTrainer};

    fn job(id: u64, index: FakeIndex, trainer: FakeTrainer) -> Arc<Job> {
        Arc::new(Job::with_backends(
            id,
            sample_descriptor(),
            crate::domain::ConnectionDescriptor::new(1, "idx", "8983"),
            Arc::new(index),
            Arc::new(trainer),
            DispatchConfig {
                batch_workers: 2,
                ..DispatchConfig::default()
            },
        ))
    }

    async fn wait_terminal(job: &Job) {
        for _ in 0..200 {
            if job.status().is_terminal() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("job {} never finished: {:?}", job.id(), job.status());
    }

    #[tokio::test]
    async fn test_dispatcher_runs_queued_jobs() {
        let service = Arc::new(JobService::new(
            crate::testing::http_client(),
            DispatchConfig::default(),
        ));
        let ok = job(1, FakeIndex::uniform(3, 1), FakeTrainer::stopped());
        let unreachable = job(2, FakeIndex::uniform(1, 1), FakeTrainer::unreachable());
        service.enqueue(ok.clone());
        service.enqueue(unreachable.clone());

        let dispatcher = JobDispatcher::new(DispatcherConfig {
            workers: 1,
            poll_interval_ms: 10,
        });
        dispatcher.start(service.clone());

        wait_terminal(&ok).await;
        wait_terminal(&unreachable).await;
        dispatcher.stop().await;

        assert_eq!(ok.status(), JobStatus::Completed);
        assert_eq!(unreachable.status(), JobStatus::Failed);
        assert!(
            unreachable
                .error_message()
                .unwrap()
                .contains("Training service unavailable")
        );
        assert_eq!(service.queue_len(), 0);
        assert!(dispatcher.cancellation_token.is_cancelled());
    }

    #[tokio::test]
    async fn test_stop_without_jobs() {
        let service = Arc::new(JobService::new(
            crate::testing::http_client(),
            DispatchConfig::default(),
        ));
        let dispatcher = JobDispatcher::new(DispatcherConfig::default());
        dispatcher.start(service);
        dispatcher.stop().await;
        assert!(dispatcher.cancellation_token.is_cancelled());
        assert!(dispatcher.tasks.lock().is_none());
    }

    #[tokio::test]
    async fn test_execute_leaves_finished_job_alone() {
        let trainer = Arc::new(FakeTrainer::running());
        let job = Arc::new(Job::with_backends(
            1,
            sample_descriptor(),
            crate::domain::ConnectionDescriptor::new(1, "idx", "8983"),
            Arc::new(FakeIndex::uniform(1, 1)),
            trainer.clone(),
            DispatchConfig::default(),
        ));
        job.run().await.unwrap();

        execute(0, &job).await;

        assert_eq!(job.status(), JobStatus::Completed);
        assert_eq!(job.error_message(), None);
        assert_eq!(trainer.attempts(), 1);
    }

    #[tokio::test]
    async fn test_execute_does_not_fail_a_running_job() {
        let job = job(
            1,
            FakeIndex::uniform(1, 1),
            FakeTrainer::running().stalling(Duration::from_secs(60)),
        );
        let running = tokio::spawn({
            let job = job.clone();
            async move { job.run().await }
        });
        for _ in 0..200 {
            if job.status() == JobStatus::Running {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(job.status(), JobStatus::Running);

        execute(0, &job).await;

        assert_eq!(job.status(), JobStatus::Running);
        assert_eq!(job.error_message(), None);
        running.abort();
    }
}
