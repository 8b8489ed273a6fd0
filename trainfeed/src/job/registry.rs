//! Concurrent id-keyed registries for connections and jobs.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;

use super::entity::Job;
use crate::domain::{ConnectionDescriptor, JobStatus};
use crate::{Error, Result};

/// Registered jobs by id. Ids start at 1 and are never reused.
#[derive(Debug)]
pub struct JobRegistry {
    jobs: DashMap<u64, Arc<Job>>,
    next_id: AtomicU64,
}

impl Default for JobRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl JobRegistry {
    pub fn new() -> Self {
        Self {
            jobs: DashMap::new(),
            next_id: AtomicU64::new(1),
        }
    }

    /// Reserve the next job id.
    pub fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    pub fn register(&self, job: Arc<Job>) {
        self.jobs.insert(job.id(), job);
    }

    pub fn get(&self, id: u64) -> Option<Arc<Job>> {
        self.jobs.get(&id).map(|entry| entry.value().clone())
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    /// Number of jobs in each status.
    pub fn status_counts(&self) -> BTreeMap<JobStatus, usize> {
        let mut counts = BTreeMap::new();
        for entry in self.jobs.iter() {
            *counts.entry(entry.value().status()).or_insert(0) += 1;
        }
        counts
    }
}

/// Registered Solr endpoints by id.
#[derive(Debug)]
pub struct ConnectionRegistry {
    connections: DashMap<u64, ConnectionDescriptor>,
    next_id: AtomicU64,
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self {
            connections: DashMap::new(),
            next_id: AtomicU64::new(1),
        }
    }

    /// Validate and store a new endpoint, returning it with its id.
    pub fn register(&self, host: &str, port: &str) -> Result<ConnectionDescriptor> {
        let host = host.trim();
        if host.is_empty() {
            return Err(Error::validation("host must not be empty"));
        }
        let port = port.trim();
        match port.parse::<u16>() {
            Ok(p) if p > 0 => {}
            _ => {
                return Err(Error::validation(format!(
                    "port must be a number between 1 and 65535, got '{port}'"
                )));
            }
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let connection = ConnectionDescriptor::new(id, host, port);
        self.connections.insert(id, connection.clone());
        Ok(connection)
    }

    pub fn get(&self, id: u64) -> Option<ConnectionDescriptor> {
        self.connections.get(&id).map(|entry| entry.value().clone())
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}
