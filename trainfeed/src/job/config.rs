//! Tuning knobs for batch dispatch.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration shared by every job's dispatch pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchConfig {
    /// Concurrent consumers posting batches to the trainer.
    pub batch_workers: usize,
    /// Capacity of the batch and result hand-off channels.
    pub channel_capacity: usize,
    /// Extra attempts per batch after a transport failure. Zero aborts the
    /// job on the first failed POST.
    pub batch_retries: u32,
    /// Pause between attempts in milliseconds.
    pub retry_backoff_ms: u64,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            batch_workers: 10,
            channel_capacity: 32,
            batch_retries: 0,
            retry_backoff_ms: 500,
        }
    }
}

impl DispatchConfig {
    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }
}
