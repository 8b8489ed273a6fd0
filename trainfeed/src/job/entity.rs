//! A single pull-and-dispatch job.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use tracing::{debug, info, warn};

use super::config::DispatchConfig;
use super::pipeline::{self, DispatchSummary};
use crate::domain::{ConnectionDescriptor, JobDescriptor, JobStatus, START_CURSOR};
use crate::solr::{CursorPuller, SearchIndex, SolrClient};
use crate::trainer::{TrainerClient, TrainingService};
use crate::{Error, Result};

#[derive(Debug)]
struct JobState {
    status: JobStatus,
    error_message: Option<String>,
    started_at: Option<DateTime<Utc>>,
    finished_at: Option<DateTime<Utc>>,
    summary: Option<DispatchSummary>,
}

/// Point-in-time view of a job.
#[derive(Debug, Clone, Serialize)]
pub struct JobSnapshot {
    pub job_id: u64,
    pub solr_id: u64,
    pub collection: String,
    pub status: JobStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub cursor_mark: String,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<DispatchSummary>,
}

/// One submission: a Solr connection, a query descriptor and the lifecycle
/// state of pulling it into the trainer.
///
/// Status only moves along the [`JobStatus`] transition graph, and status and
/// error message are written under one lock, so a job reaches exactly one
/// terminal state.
pub struct Job {
    id: u64,
    connection: ConnectionDescriptor,
    descriptor: RwLock<JobDescriptor>,
    state: Mutex<JobState>,
    index: Arc<dyn SearchIndex>,
    trainer: Arc<dyn TrainingService>,
    config: DispatchConfig,
    created_at: DateTime<Utc>,
}

impl std::fmt::Debug for Job {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Job")
            .field("id", &self.id)
            .field("connection", &self.connection)
            .field("status", &self.status())
            .finish_non_exhaustive()
    }
}

impl Job {
    /// Create a `Pending` job talking to Solr and the trainer over HTTP.
    pub fn create(
        id: u64,
        descriptor: JobDescriptor,
        connection: ConnectionDescriptor,
        client: reqwest::Client,
        config: DispatchConfig,
    ) -> Self {
        let index = Arc::new(SolrClient::new(client.clone()));
        let trainer = Arc::new(TrainerClient::new(client, descriptor.trainer_base_url()));
        Self::with_backends(id, descriptor, connection, index, trainer, config)
    }

    /// Create a `Pending` job over the given backends.
    pub fn with_backends(
        id: u64,
        descriptor: JobDescriptor,
        connection: ConnectionDescriptor,
        index: Arc<dyn SearchIndex>,
        trainer: Arc<dyn TrainingService>,
        config: DispatchConfig,
    ) -> Self {
        // Pulls always begin at the first page; the cursor only records
        // progress from there.
        let descriptor = JobDescriptor {
            cursor_mark: START_CURSOR.to_string(),
            ..descriptor
        };
        Self {
            id,
            connection,
            descriptor: RwLock::new(descriptor),
            state: Mutex::new(JobState {
                status: JobStatus::Pending,
                error_message: None,
                started_at: None,
                finished_at: None,
                summary: None,
            }),
            index,
            trainer,
            config,
            created_at: Utc::now(),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn connection(&self) -> &ConnectionDescriptor {
        &self.connection
    }

    pub fn descriptor(&self) -> JobDescriptor {
        self.descriptor.read().clone()
    }

    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    pub fn status(&self) -> JobStatus {
        self.state.lock().status
    }

    pub fn error_message(&self) -> Option<String> {
        self.state.lock().error_message.clone()
    }

    /// Current position in the result set.
    pub fn cursor_mark(&self) -> String {
        self.descriptor.read().cursor_mark.clone()
    }

    pub fn snapshot(&self) -> JobSnapshot {
        let descriptor = self.descriptor.read();
        let state = self.state.lock();
        JobSnapshot {
            job_id: self.id,
            solr_id: self.connection.id,
            collection: descriptor.collection.clone(),
            status: state.status,
            error_message: state.error_message.clone(),
            cursor_mark: descriptor.cursor_mark.clone(),
            created_at: self.created_at,
            started_at: state.started_at,
            finished_at: state.finished_at,
            summary: state.summary.clone(),
        }
    }

    fn transition(&self, target: JobStatus) -> Result<()> {
        let mut state = self.state.lock();
        state.status = state.status.transition_to(target)?;
        debug!(job_id = self.id, status = %target, "Job status changed");
        Ok(())
    }

    /// Make sure the trainer is running, starting it if needed.
    ///
    /// Moves `Pending -> Init -> Pending`. On failure the job is left in
    /// `Init` and the error is [`Error::RemoteUnavailable`].
    pub async fn initialize(&self) -> Result<()> {
        self.transition(JobStatus::Init)?;

        let status = self.trainer.status().await.map_err(|e| {
            Error::RemoteUnavailable(format!("status check failed: {}", e))
        })?;

        if !status.running {
            info!(job_id = self.id, "Training service is not running, starting it");
            self.trainer
                .start()
                .await
                .map_err(|e| Error::RemoteUnavailable(format!("start failed: {}", e)))?;
        }

        self.transition(JobStatus::Pending)
    }

    /// Pull every page and push it through the trainer.
    ///
    /// Moves `Pending -> Running -> Completed | Failed`; on failure the error
    /// text is recorded on the job and the error is returned.
    pub async fn run(self: &Arc<Self>) -> Result<DispatchSummary> {
        {
            let mut state = self.state.lock();
            state.status = state.status.transition_to(JobStatus::Running)?;
            state.started_at = Some(Utc::now());
        }

        let descriptor = self.descriptor();
        info!(
            job_id = self.id,
            solr = %self.connection.base_url(),
            collection = %descriptor.collection,
            rows = descriptor.rows,
            workers = self.config.batch_workers,
            "Job running"
        );

        let result = pipeline::dispatch(self).await;

        let mut state = self.state.lock();
        state.finished_at = Some(Utc::now());
        match &result {
            Ok(summary) => {
                state.status = state.status.transition_to(JobStatus::Completed)?;
                state.summary = Some(summary.clone());
                info!(
                    job_id = self.id,
                    pages = summary.pages,
                    batches = summary.batches,
                    examples = summary.examples,
                    "Job completed"
                );
            }
            Err(e) => {
                state.status = state.status.transition_to(JobStatus::Failed)?;
                state.error_message = Some(e.to_string());
                warn!(job_id = self.id, error = %e, "Job failed");
            }
        }
        result
    }

    /// Mark a job that never got to run as `Failed`.
    pub fn fail(&self, reason: impl Into<String>) -> Result<()> {
        let reason = reason.into();
        let mut state = self.state.lock();
        state.status = state.status.transition_to(JobStatus::Failed)?;
        state.finished_at = Some(Utc::now());
        warn!(job_id = self.id, error = %reason, "Job failed");
        state.error_message = Some(reason);
        Ok(())
    }

    pub(crate) fn puller(&self) -> CursorPuller {
        CursorPuller::new(self.index.clone(), self.connection.clone(), self.descriptor())
    }

    pub(crate) fn trainer(&self) -> Arc<dyn TrainingService> {
        self.trainer.clone()
    }

    /// Record the cursor of the next unseen page.
    pub(crate) fn advance_cursor(&self, next: &str) {
        let mut descriptor = self.descriptor.write();
        if descriptor.cursor_mark != next {
            descriptor.cursor_mark = next.to_string();
        }
    }
}
