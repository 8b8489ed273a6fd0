//! Job submission and lookup, shared by the control plane and the dispatcher.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::Notify;
use tracing::info;
use work_queue::WorkQueue;

use crate::domain::{ConnectionDescriptor, JobDescriptor, JobStatus};
use crate::job::{ConnectionRegistry, DispatchConfig, Job, JobRegistry, JobSnapshot};
use crate::{Error, Result};

/// What `/get_job_status` reports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobStatusView {
    pub job_id: u64,
    pub job_status: JobStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

/// Owns the registries and the pending-job queue.
pub struct JobService {
    connections: ConnectionRegistry,
    jobs: JobRegistry,
    queue: WorkQueue<Arc<Job>>,
    notifier: Arc<Notify>,
    client: reqwest::Client,
    config: DispatchConfig,
}

impl JobService {
    pub fn new(client: reqwest::Client, config: DispatchConfig) -> Self {
        Self {
            connections: ConnectionRegistry::new(),
            jobs: JobRegistry::new(),
            queue: WorkQueue::new(),
            notifier: Arc::new(Notify::new()),
            client,
            config,
        }
    }

    pub fn register_connection(&self, host: &str, port: &str) -> Result<ConnectionDescriptor> {
        let connection = self.connections.register(host, port)?;
        info!(
            solr_id = connection.id,
            url = %connection.base_url(),
            "Registered Solr connection"
        );
        Ok(connection)
    }

    /// Validate, register and enqueue a new job.
    ///
    /// Nothing is registered when the descriptor is invalid or names an
    /// unknown connection.
    pub fn submit_job(&self, descriptor: JobDescriptor) -> Result<Arc<Job>> {
        descriptor.validate()?;
        let connection = self
            .connections
            .get(descriptor.solr_id)
            .ok_or_else(|| Error::not_found("Solr connection", descriptor.solr_id.to_string()))?;

        let id = self.jobs.next_id();
        let job = Arc::new(Job::create(
            id,
            descriptor,
            connection,
            self.client.clone(),
            self.config.clone(),
        ));
        self.jobs.register(job.clone());
        self.enqueue(job.clone());

        info!(
            job_id = id,
            solr_id = job.connection().id,
            collection = %job.descriptor().collection,
            "Job submitted"
        );
        Ok(job)
    }

    pub fn job(&self, id: u64) -> Result<Arc<Job>> {
        self.jobs
            .get(id)
            .ok_or_else(|| Error::not_found("Job", id.to_string()))
    }

    pub fn job_status(&self, id: u64) -> Result<JobStatusView> {
        let job = self.job(id)?;
        let snapshot = job.snapshot();
        Ok(JobStatusView {
            job_id: snapshot.job_id,
            job_status: snapshot.status,
            error_message: snapshot.error_message,
        })
    }

    pub fn job_snapshot(&self, id: u64) -> Result<JobSnapshot> {
        Ok(self.job(id)?.snapshot())
    }

    /// Jobs cannot be cancelled yet; unknown ids are still reported as such.
    pub fn cancel_job(&self, id: u64) -> Result<()> {
        self.job(id)?;
        Err(Error::NotImplemented(format!(
            "cancelling job {id} is not supported"
        )))
    }

    /// Queue a job for the dispatcher and wake a worker.
    pub fn enqueue(&self, job: Arc<Job>) {
        self.queue.push_back(job);
        self.notifier.notify_one();
    }

    pub fn next_job(&self) -> Option<Arc<Job>> {
        self.queue.pop_front()
    }

    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    /// Ids of queued jobs, front first.
    pub fn queued_job_ids(&self) -> Vec<u64> {
        self.queue.snapshot().iter().map(|job| job.id()).collect()
    }

    /// Empty the queue, returning what was still waiting.
    pub fn drain_queue(&self) -> Vec<Arc<Job>> {
        self.queue.drain()
    }

    pub fn job_count(&self) -> usize {
        self.jobs.len()
    }

    pub fn status_counts(&self) -> BTreeMap<JobStatus, usize> {
        self.jobs.status_counts()
    }

    pub fn notifier(&self) -> Arc<Notify> {
        self.notifier.clone()
    }
}
